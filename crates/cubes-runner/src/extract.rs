//! Plain-text extraction from loosely shaped inference responses.
//!
//! Different runtimes (and different versions of the local proxy) wrap the
//! completion text differently. Rather than assume one schema, the body is
//! matched against a fixed, ordered list of known shapes and the first one
//! that yields non-blank text wins:
//!
//! 1. the body itself is a JSON string
//! 2. `.response`
//! 3. `.reply`
//! 4. `.message` as a string
//! 5. `.text`
//! 6. `.message.content`
//! 7. `.choices[0].message.content` (`OpenAI` chat completions)
//! 8. `.content[0].text` (Anthropic messages)

use serde_json::Value;
use tracing::trace;

use crate::error::RunnerError;

/// A named accessor for one known response shape.
type Shape = (&'static str, fn(&Value) -> Option<&str>);

const SHAPES: [Shape; 8] = [
    ("direct", direct),
    ("response", response_field),
    ("reply", reply_field),
    ("message", message_string),
    ("text", text_field),
    ("message.content", message_content),
    ("choices[0].message.content", openai_choice),
    ("content[0].text", anthropic_block),
];

/// Pull the completion text out of a response body.
///
/// # Errors
///
/// Returns [`RunnerError::NoUsableText`] when no known shape yields
/// non-blank text.
pub fn extract_text(body: &Value) -> Result<String, RunnerError> {
    SHAPES
        .iter()
        .find_map(|(name, shape)| {
            let text = shape(body)?.trim();
            if text.is_empty() {
                return None;
            }
            trace!(shape = name, "inference text extracted");
            Some(text.to_owned())
        })
        .ok_or(RunnerError::NoUsableText)
}

/// Interpret a raw HTTP body: JSON when it parses, otherwise the text itself.
pub fn extract_from_body(body: String) -> Result<String, RunnerError> {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => extract_text(&value),
        Err(_) => extract_text(&Value::String(body)),
    }
}

fn direct(v: &Value) -> Option<&str> {
    v.as_str()
}

fn response_field(v: &Value) -> Option<&str> {
    v.get("response")?.as_str()
}

fn reply_field(v: &Value) -> Option<&str> {
    v.get("reply")?.as_str()
}

fn message_string(v: &Value) -> Option<&str> {
    v.get("message")?.as_str()
}

fn text_field(v: &Value) -> Option<&str> {
    v.get("text")?.as_str()
}

fn message_content(v: &Value) -> Option<&str> {
    v.get("message")?.get("content")?.as_str()
}

fn openai_choice(v: &Value) -> Option<&str> {
    v.get("choices")?.get(0)?.get("message")?.get("content")?.as_str()
}

fn anthropic_block(v: &Value) -> Option<&str> {
    v.get("content")?.get(0)?.get("text")?.as_str()
}
