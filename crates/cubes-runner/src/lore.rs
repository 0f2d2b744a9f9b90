//! World lore, ranked by keyword overlap with the current context.
//!
//! Lore fragments come from the world roster. Before each decision the
//! planner asks for the few fragments that share the most keywords with
//! the context text, so the model knows what the cubes know about their
//! world without the whole book in every prompt.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Fragments included in one prompt.
pub const DEFAULT_LORE_LIMIT: usize = 3;

/// Title words shorter than this do not count as keywords.
const MIN_TITLE_WORD_LEN: usize = 4;

/// One piece of world knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreFragment {
    /// Stable identifier.
    pub id: String,
    /// Short title.
    pub title: String,
    /// The fragment itself.
    pub text: String,
    /// Words or phrases that make this fragment relevant.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// All lore known to the cubes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoreBook {
    fragments: Vec<LoreFragment>,
}

impl LoreBook {
    /// Wrap a list of fragments.
    pub const fn new(fragments: Vec<LoreFragment>) -> Self {
        Self { fragments }
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether there is no lore at all.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Up to `limit` fragments sharing at least one keyword with `context`,
    /// best first. Equal scores keep roster order.
    pub fn relevant(&self, context: &str, limit: usize) -> Vec<&LoreFragment> {
        let lowered = context.to_lowercase();
        let words: BTreeSet<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut scored: Vec<(usize, &LoreFragment)> = self
            .fragments
            .iter()
            .map(|fragment| (score(fragment, &lowered, &words), fragment))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by_key(|(score, _)| Reverse(*score));
        scored.into_iter().take(limit).map(|(_, f)| f).collect()
    }

    /// Relevant fragments rendered one per line, or empty.
    pub fn render_context(&self, context: &str, limit: usize) -> String {
        self.relevant(context, limit)
            .into_iter()
            .map(|f| format!("- {}: {}", f.title, f.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Keyword hits of `fragment` in the lowercased context. A title word
/// counts only when no keyword already covers it.
fn score(fragment: &LoreFragment, lowered: &str, words: &BTreeSet<&str>) -> usize {
    let keywords: Vec<String> = fragment
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let keyword_words: BTreeSet<&str> = keywords
        .iter()
        .flat_map(|k| k.split(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    let keyword_hits = keywords
        .iter()
        .filter(|k| {
            if k.contains(' ') {
                lowered.contains(k.as_str())
            } else {
                words.contains(k.as_str())
            }
        })
        .count();

    let title = fragment.title.to_lowercase();
    let title_hits = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= MIN_TITLE_WORD_LEN && !keyword_words.contains(w))
        .filter(|w| words.contains(w))
        .count();

    keyword_hits.saturating_add(title_hits)
}
