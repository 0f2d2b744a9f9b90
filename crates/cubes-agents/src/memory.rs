//! Per-cube durable memory: traits, facts, preferences, episodes, skills.
//!
//! [`MemoryStore`] owns one [`AgentMemory`] per cube behind a mutex so it
//! can be shared with in-flight inference tasks. Memory is created lazily
//! by [`MemoryStore::initialize`]; every other mutation fails with
//! [`AgentError::MemoryNotInitialized`] until then, since that indicates a
//! sequencing bug upstream rather than an external failure.
//!
//! ## Bounds
//!
//! - traits: unbounded, deduplicated
//! - facts: last 20, deduplicated
//! - preferences: last 10, deduplicated
//! - episodes: ring buffer of the last 50
//! - synthesis history: last 10
//!
//! Beliefs and goals are unbounded but deduplicated when synthesis appends
//! to them.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Mutex;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use cubes_types::{
    AgentId, AgentMemory, ConversationStats, Emotion, EmotionalState, Episode, EpisodeId,
    IntentTag, LearningUpdate, Personality, SkillVector, SynthesisRecord, Tone,
};

use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bounds and thresholds for the memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Maximum facts retained (default: 20).
    pub max_facts: usize,
    /// Maximum preferences retained (default: 10).
    pub max_preferences: usize,
    /// Episodic ring buffer size (default: 50).
    pub max_episodes: usize,
    /// Synthesis records retained (default: 10).
    pub max_synthesis_history: usize,
    /// Interactions between synthesis passes (default: 10).
    pub synthesis_interval: u32,
    /// Episodes required before a synthesis may run (default: 3).
    pub min_synthesis_episodes: usize,
    /// Most recent items per list shown in the prompt context (default: 8).
    pub context_items: usize,
    /// Upper bound on the rendered context, in characters (default: 1200).
    pub context_max_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_facts: 20,
            max_preferences: 10,
            max_episodes: 50,
            max_synthesis_history: 10,
            synthesis_interval: 10,
            min_synthesis_episodes: 3,
            context_items: 8,
            context_max_chars: 1200,
        }
    }
}

// ---------------------------------------------------------------------------
// Deltas
// ---------------------------------------------------------------------------

/// One interaction's worth of changes, applied by [`MemoryStore::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDelta {
    /// Classified intent of the user's message, if there was one.
    pub intent: Option<IntentTag>,
    /// Dominant emotion of the exchange.
    pub emotion: Option<Emotion>,
    /// Explicit tone; derived from `intent` when absent.
    pub tone: Option<Tone>,
    /// The user's message.
    pub user_message: Option<String>,
    /// Summary to record as an episode. No episode is recorded without one.
    pub episode_summary: Option<String>,
    /// Traits to append.
    pub add_traits: Vec<String>,
    /// Facts to append.
    pub add_facts: Vec<String>,
    /// Preferences to append.
    pub add_preferences: Vec<String>,
}

/// Parsed result of a synthesis pass, in the inference wire format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisUpdate {
    /// Short summary of the consolidated period.
    pub summary: String,
    /// Beliefs to append.
    #[serde(default)]
    pub core_beliefs: Vec<String>,
    /// Goals to append.
    #[serde(default)]
    pub meta_goals: Vec<String>,
    /// Replacement philosophy, if any.
    #[serde(default)]
    pub philosophy_statement: Option<String>,
    /// Skill deltas by wire name; unknown names are ignored.
    #[serde(default)]
    pub skill_changes: BTreeMap<String, f64>,
}

// ---------------------------------------------------------------------------
// Personality seeds
// ---------------------------------------------------------------------------

/// Traits a fresh memory starts with.
pub const fn seed_traits(personality: Personality) -> &'static [&'static str] {
    match personality {
        Personality::Calm => &["patient", "observant", "gentle"],
        Personality::Extrovert => &["outgoing", "talkative", "warm"],
        Personality::Curious => &["inquisitive", "restless", "eager to learn"],
        Personality::Chaotic => &["impulsive", "playful", "unpredictable"],
        Personality::Neutral => &["balanced", "easygoing"],
    }
}

/// Skills a fresh memory starts with.
pub fn seed_skills(personality: Personality) -> SkillVector {
    let base = SkillVector::default();
    match personality {
        Personality::Calm => SkillVector {
            empathy: 0.65,
            logic: 0.6,
            assertiveness: 0.35,
            ..base
        },
        Personality::Extrovert => SkillVector {
            social: 0.7,
            assertiveness: 0.6,
            ..base
        },
        Personality::Curious => SkillVector {
            curiosity: 0.75,
            creativity: 0.6,
            ..base
        },
        Personality::Chaotic => SkillVector {
            creativity: 0.7,
            logic: 0.35,
            ..base
        },
        Personality::Neutral => base,
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Shared store of every cube's memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: MemoryConfig,
    memories: Mutex<BTreeMap<AgentId, AgentMemory>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub const fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            memories: Mutex::new(BTreeMap::new()),
        }
    }

    /// The store's configuration.
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Return the cube's memory, seeding it first if absent.
    ///
    /// Idempotent: an existing memory is returned unchanged.
    pub fn initialize(
        &self,
        id: &AgentId,
        personality: Personality,
        name: &str,
    ) -> Result<AgentMemory, AgentError> {
        let mut memories = self
            .memories
            .lock()
            .map_err(|_poisoned| AgentError::StoreUnavailable)?;
        if let Some(existing) = memories.get(id) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let memory = AgentMemory {
            agent_id: id.clone(),
            name: name.to_owned(),
            personality,
            traits: seed_traits(personality)
                .iter()
                .map(|t| (*t).to_owned())
                .collect(),
            facts: Vec::new(),
            preferences: Vec::new(),
            emotional_state: EmotionalState::default(),
            stats: ConversationStats::default(),
            episodes: Vec::new(),
            core_beliefs: Vec::new(),
            meta_goals: Vec::new(),
            skills: seed_skills(personality),
            synthesis_history: Vec::new(),
            philosophy: None,
            created_at: now,
            updated_at: now,
        };
        info!(agent_id = %id, %personality, "memory initialized");
        memories.insert(id.clone(), memory.clone());
        Ok(memory)
    }

    /// The cube's memory, if initialized.
    pub fn get(&self, id: &AgentId) -> Option<AgentMemory> {
        self.memories.lock().ok()?.get(id).cloned()
    }

    /// Apply one interaction's changes.
    ///
    /// `messages` and `interactions_since_synthesis` always increase by one;
    /// the praise, criticism and question counters only on a matching intent.
    pub fn update(&self, id: &AgentId, delta: MemoryDelta) -> Result<AgentMemory, AgentError> {
        self.with_memory(id, |memory, config| {
            let now = Utc::now();
            let stats = &mut memory.stats;
            stats.messages = stats.messages.saturating_add(1);
            stats.interactions_since_synthesis = stats.interactions_since_synthesis.saturating_add(1);
            match delta.intent {
                Some(IntentTag::Praise) => stats.praises = stats.praises.saturating_add(1),
                Some(IntentTag::Criticism) => {
                    stats.criticisms = stats.criticisms.saturating_add(1);
                }
                Some(IntentTag::Question) => stats.questions = stats.questions.saturating_add(1),
                Some(IntentTag::Greeting | IntentTag::Statement) | None => {}
            }

            if delta.emotion.is_some() {
                memory.emotional_state.dominant_emotion = delta.emotion;
            }
            if let Some(tone) = delta.tone.or_else(|| delta.intent.map(Tone::from)) {
                memory.emotional_state.last_interaction_tone = Some(tone);
            }

            append_unique(&mut memory.traits, delta.add_traits, None);
            append_unique(&mut memory.facts, delta.add_facts, Some(config.max_facts));
            append_unique(
                &mut memory.preferences,
                delta.add_preferences,
                Some(config.max_preferences),
            );

            if let Some(summary) = delta.episode_summary {
                memory.episodes.push(Episode {
                    id: EpisodeId::new(),
                    at: now,
                    intent: delta.intent,
                    user_message: delta.user_message,
                    summary,
                });
                truncate_front(&mut memory.episodes, config.max_episodes);
            }

            memory.updated_at = now;
        })
    }

    /// Record durable learning from a planner decision.
    ///
    /// Unlike [`update`](Self::update) this is not an interaction and leaves
    /// the conversation counters alone.
    pub fn learn(&self, id: &AgentId, learning: &LearningUpdate) -> Result<AgentMemory, AgentError> {
        self.with_memory(id, |memory, config| {
            append_unique(&mut memory.traits, learning.add_traits.clone(), None);
            append_unique(
                &mut memory.facts,
                learning.add_facts.clone(),
                Some(config.max_facts),
            );
            append_unique(
                &mut memory.preferences,
                learning.add_preferences.clone(),
                Some(config.max_preferences),
            );
            memory.updated_at = Utc::now();
        })
    }

    /// Whether enough interactions have accumulated for a synthesis pass.
    pub fn should_synthesize(&self, id: &AgentId) -> bool {
        self.get(id).is_some_and(|memory| {
            memory.stats.interactions_since_synthesis >= self.config.synthesis_interval
        })
    }

    /// The `n` most recent episodes, oldest first.
    pub fn recent_episodes(&self, id: &AgentId, n: usize) -> Vec<Episode> {
        self.get(id)
            .map(|memory| {
                let skip = memory.episodes.len().saturating_sub(n);
                memory.episodes.into_iter().skip(skip).collect()
            })
            .unwrap_or_default()
    }

    /// Apply a successful synthesis pass and reset the interaction counter.
    pub fn apply_synthesis(
        &self,
        id: &AgentId,
        update: SynthesisUpdate,
        episodes_considered: u32,
    ) -> Result<AgentMemory, AgentError> {
        self.with_memory(id, |memory, config| {
            let now = Utc::now();
            append_unique(&mut memory.core_beliefs, update.core_beliefs, None);
            append_unique(&mut memory.meta_goals, update.meta_goals, None);

            for (name, delta) in &update.skill_changes {
                match memory.skills.get_mut(name) {
                    Some(level) if delta.is_finite() => {
                        *level = (*level + delta).clamp(0.0, 1.0);
                    }
                    _ => debug!(skill = %name, "synthesis skill change ignored"),
                }
            }

            if let Some(philosophy) = update
                .philosophy_statement
                .map(|p| p.trim().to_owned())
                .filter(|p| !p.is_empty())
            {
                memory.philosophy = Some(philosophy);
            }

            memory.synthesis_history.push(SynthesisRecord {
                at: now,
                summary: update.summary,
                episodes_considered,
            });
            truncate_front(&mut memory.synthesis_history, config.max_synthesis_history);

            memory.stats.interactions_since_synthesis = 0;
            memory.updated_at = now;
        })
    }

    /// Forget everything about a cube. Returns whether it had a memory.
    pub fn reset(&self, id: &AgentId) -> bool {
        let removed = self
            .memories
            .lock()
            .is_ok_and(|mut memories| memories.remove(id).is_some());
        if removed {
            info!(agent_id = %id, "memory reset");
        }
        removed
    }

    /// Copy of every memory, for persistence.
    pub fn export(&self) -> BTreeMap<AgentId, AgentMemory> {
        self.memories
            .lock()
            .map(|memories| memories.clone())
            .unwrap_or_default()
    }

    /// Load persisted memories, replacing any in-memory entry with the same id.
    pub fn restore(&self, saved: BTreeMap<AgentId, AgentMemory>) -> usize {
        let Ok(mut memories) = self.memories.lock() else {
            return 0;
        };
        let count = saved.len();
        memories.extend(saved);
        count
    }

    /// Render a bounded prompt fragment describing the memory.
    ///
    /// Sections with nothing to say are omitted; only the most recent
    /// items of each list are shown.
    pub fn build_context(&self, memory: &AgentMemory) -> String {
        build_context(memory, &self.config)
    }

    fn with_memory(
        &self,
        id: &AgentId,
        apply: impl FnOnce(&mut AgentMemory, &MemoryConfig),
    ) -> Result<AgentMemory, AgentError> {
        let mut memories = self
            .memories
            .lock()
            .map_err(|_poisoned| AgentError::StoreUnavailable)?;
        let memory = memories
            .get_mut(id)
            .ok_or_else(|| AgentError::MemoryNotInitialized(id.clone()))?;
        apply(memory, &self.config);
        Ok(memory.clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Append items that are not already present (case-insensitive), then keep
/// only the last `cap` entries.
fn append_unique(list: &mut Vec<String>, items: Vec<String>, cap: Option<usize>) {
    for item in items {
        let item = item.trim();
        if item.is_empty() || list.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            continue;
        }
        list.push(item.to_owned());
    }
    if let Some(cap) = cap {
        truncate_front(list, cap);
    }
}

fn truncate_front<T>(list: &mut Vec<T>, cap: usize) {
    let excess = list.len().saturating_sub(cap);
    if excess > 0 {
        list.drain(..excess);
    }
}

fn recent(items: &[String], n: usize) -> &[String] {
    items.get(items.len().saturating_sub(n)..).unwrap_or_default()
}

fn build_context(memory: &AgentMemory, config: &MemoryConfig) -> String {
    let mut out = String::new();
    let n = config.context_items;

    for (label, items) in [
        ("Traits", recent(&memory.traits, n)),
        ("Facts you know", recent(&memory.facts, n)),
        ("Preferences", recent(&memory.preferences, n)),
        ("Core beliefs", recent(&memory.core_beliefs, n)),
    ] {
        if !items.is_empty() {
            let _ = writeln!(out, "{label}: {}", items.join("; "));
        }
    }

    if let Some(philosophy) = &memory.philosophy {
        let _ = writeln!(out, "Philosophy: {philosophy}");
    }

    let EmotionalState {
        dominant_emotion,
        last_interaction_tone,
    } = &memory.emotional_state;
    match (dominant_emotion, last_interaction_tone) {
        (None, None) => {}
        (Some(emotion), None) => {
            let _ = writeln!(out, "Emotional state: feeling {}", emotion.as_str());
        }
        (None, Some(tone)) => {
            let _ = writeln!(out, "Emotional state: last exchange felt {}", tone_word(*tone));
        }
        (Some(emotion), Some(tone)) => {
            let _ = writeln!(
                out,
                "Emotional state: feeling {}, last exchange felt {}",
                emotion.as_str(),
                tone_word(*tone)
            );
        }
    }

    let stats = &memory.stats;
    if stats.messages > 0 {
        let _ = writeln!(
            out,
            "Conversations: {} messages ({} praise, {} criticism, {} questions)",
            stats.messages, stats.praises, stats.criticisms, stats.questions
        );
    }

    truncate_chars(out.trim_end(), config.context_max_chars)
}

const fn tone_word(tone: Tone) -> &'static str {
    match tone {
        Tone::Positive => "friendly",
        Tone::Negative => "hostile",
        Tone::Inquisitive => "inquisitive",
        Tone::Neutral => "neutral",
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text.get(..cut).unwrap_or_default().to_owned(),
        None => text.to_owned(),
    }
}
