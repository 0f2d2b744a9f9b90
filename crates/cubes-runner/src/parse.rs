//! Response parsing into decisions and synthesis updates.
//!
//! Models are asked for bare JSON but do not always comply. Every response
//! goes through the same recovery strategies before it is judged:
//!
//! 1. Direct `serde_json` parse
//! 2. Extract JSON from a markdown code block
//! 3. Strip trailing commas and retry
//! 4. Code block, then strip trailing commas
//! 5. The outermost `{ ... }` span, for JSON wrapped in prose
//!
//! Recovery never invents content: a decision without `goal` or `intent`
//! is rejected, and optional fields that do not match the schema are
//! dropped rather than guessed.

use serde_json::{Map, Value};
use tracing::debug;

use cubes_agents::SynthesisUpdate;
use cubes_types::{BehaviorDecision, DecisionTarget, LearningUpdate, PersonalityShift, TransientEffects};

use crate::error::RunnerError;

/// Parse a decision response.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] if no strategy yields a JSON object or
/// the object lacks a non-blank `goal` or `intent`.
pub fn parse_decision(raw: &str) -> Result<BehaviorDecision, RunnerError> {
    let object = parse_object(raw)?;
    convert_decision(&object)
}

/// Parse a synthesis response.
///
/// # Errors
///
/// Returns [`RunnerError::Parse`] if no strategy yields a JSON object, the
/// object does not match the synthesis schema, or `summary` is blank.
pub fn parse_synthesis(raw: &str) -> Result<SynthesisUpdate, RunnerError> {
    let object = parse_object(raw)?;
    let mut update: SynthesisUpdate = serde_json::from_value(Value::Object(object))
        .map_err(|e| RunnerError::Parse(format!("synthesis schema mismatch: {e}")))?;
    update.summary = update.summary.trim().to_owned();
    if update.summary.is_empty() {
        return Err(RunnerError::Parse("synthesis missing summary".to_owned()));
    }
    update.core_beliefs = clean_list(update.core_beliefs);
    update.meta_goals = clean_list(update.meta_goals);
    Ok(update)
}

/// Run the recovery strategies until one yields a JSON object.
fn parse_object(raw: &str) -> Result<Map<String, Value>, RunnerError> {
    let trimmed = raw.trim();
    let block = extract_json_from_codeblock(trimmed);
    let outer = outermost_object(trimmed);

    let candidates = [
        Some(trimmed.to_owned()),
        block.map(ToOwned::to_owned),
        Some(strip_trailing_commas(trimmed)),
        block.map(strip_trailing_commas),
        outer.map(strip_trailing_commas),
    ];

    for (strategy, candidate) in candidates.iter().enumerate() {
        let Some(text) = candidate else { continue };
        if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(text) {
            if strategy > 0 {
                debug!(strategy = strategy.saturating_add(1), "response recovered");
            }
            return Ok(object);
        }
    }

    Err(RunnerError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Convert a JSON object into a validated decision.
fn convert_decision(object: &Map<String, Value>) -> Result<BehaviorDecision, RunnerError> {
    let goal = required_text(object, "goal")?;
    let intent = required_text(object, "intent")?;

    let target = optional::<DecisionTarget>(object, "target");
    let transient = optional::<TransientEffects>(object, "transient").filter(|t| !t.is_empty());
    let learning = optional::<LearningUpdate>(object, "learning")
        .map(|l| LearningUpdate {
            add_traits: clean_list(l.add_traits),
            add_facts: clean_list(l.add_facts),
            add_preferences: clean_list(l.add_preferences),
        })
        .filter(|l| !l.is_empty());
    let mood = object
        .get("mood")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToOwned::to_owned);
    let personality_shift = optional::<PersonalityShift>(object, "personalityShift")
        .filter(|s| *s != PersonalityShift::None);
    let ttl_ms = object.get("ttlMs").and_then(Value::as_u64);

    Ok(BehaviorDecision {
        goal,
        intent,
        target,
        transient,
        learning,
        mood,
        personality_shift,
        ttl_ms,
    })
}

fn required_text(object: &Map<String, Value>, field: &str) -> Result<String, RunnerError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| RunnerError::Parse(format!("decision missing {field}")))
}

/// Deserialize an optional field, dropping it if it does not fit.
fn optional<T: serde::de::DeserializeOwned>(object: &Map<String, Value>, field: &str) -> Option<T> {
    let value = object.get(field).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(field, error = %e, "ignoring malformed optional field");
            None
        }
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract the contents of the first markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = text.get(open.checked_add(3)?..)?;
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let body_start = after_fence.find('\n').and_then(|nl| nl.checked_add(1))?;
    let body = after_fence.get(body_start..)?;
    let close = body.find("```")?;
    body.get(..close).map(str::trim)
}

/// The span from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    text.get(start..=end)
}

/// Strip trailing commas before closing braces and brackets (common LLM
/// error). Commas inside string literals are left alone.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let rest = chars.clone().find(|n| !n.is_whitespace());
            if matches!(rest, Some('}' | ']')) {
                continue;
            }
        }
        result.push(c);
    }

    result
}
