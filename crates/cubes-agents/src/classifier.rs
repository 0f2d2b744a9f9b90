//! Keyword-based intent and emotion classification.
//!
//! Deliberately approximate: words are matched against fixed keyword
//! families, no parsing or model is involved. Callers depend on the
//! [`IntentClassifier`] trait so a model-backed classifier can replace
//! [`KeywordClassifier`] without touching them.

use std::collections::BTreeSet;

use cubes_types::{Emotion, IntentTag};

// ---------------------------------------------------------------------------
// Keyword families
// ---------------------------------------------------------------------------

/// Words that mark a compliment.
const PRAISE_KEYWORDS: &[&str] = &[
    "good", "great", "love", "awesome", "amazing", "nice", "well done", "thank", "beautiful",
    "smart", "clever", "cute", "brilliant", "proud",
];

/// Words that mark a complaint or insult.
const CRITICISM_KEYWORDS: &[&str] = &[
    "bad", "stupid", "hate", "boring", "ugly", "dumb", "annoying", "wrong", "useless", "lazy",
    "shut up", "terrible",
];

/// Words that open or close a conversation.
const GREETING_KEYWORDS: &[&str] = &[
    "hello", "hi", "hey", "howdy", "greetings", "good morning", "good evening", "bye",
    "goodbye", "see you",
];

/// Words that open a question even without a question mark.
const QUESTION_OPENERS: &[&str] = &[
    "what", "why", "how", "who", "where", "when", "which", "can", "could", "do", "does", "are",
    "is", "will", "would",
];

/// Stems shorter than this only match whole words.
const MIN_PREFIX_STEM_LEN: usize = 5;

/// Emotion keyword families. A stem of at least [`MIN_PREFIX_STEM_LEN`]
/// characters matches a word it prefixes (`laugh` matches `laughing`);
/// shorter stems list their inflections (`cry`, `crying`), so `mad` never
/// matches `made`. Phrases match anywhere.
const EMOTION_KEYWORDS: &[(Emotion, &[&str])] = &[
    (
        Emotion::Happy,
        &[
            "happy", "joy", "joyful", "glad", "gladly", "delight", "excit", "yay", "wonderful",
            "smile", "laugh", "cheer", "fun",
        ],
    ),
    (
        Emotion::Sad,
        &[
            "sad", "sadly", "sadness", "sorry", "lonely", "miss", "missed", "misses", "missing",
            "cry", "cried", "cries", "crying", "tears", "gloom", "unhappy", "alone",
        ],
    ),
    (
        Emotion::Curious,
        &[
            "curious", "wonder", "explore", "discover", "interesting", "what if", "mystery",
            "learn",
        ],
    ),
    (
        Emotion::Reflective,
        &[
            "think", "ponder", "remember", "reflect", "consider", "meaning", "quiet", "perhaps",
            "memory",
        ],
    ),
    (
        Emotion::Frustrated,
        &[
            "angry", "annoy", "frustrat", "ugh", "hate", "hated", "hates", "stuck", "upset",
            "mad", "grr",
        ],
    ),
];

/// Words too common to be useful as concepts.
const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "from",
    "have", "here", "into", "just", "like", "more", "much", "only", "other", "over", "really",
    "should", "some", "than", "that", "their", "them", "then", "there", "these", "they", "this",
    "very", "want", "were", "what", "when", "where", "which", "while", "will", "with", "would",
    "your", "you're",
];

/// Maximum number of concepts extracted from one message.
const MAX_CONCEPTS: usize = 8;

// ---------------------------------------------------------------------------
// Classifier interface
// ---------------------------------------------------------------------------

/// Result of classifying one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Coarse intent.
    pub intent: IntentTag,
    /// First matching emotion family, if any.
    pub emotion: Option<Emotion>,
    /// Salient words, in order of first appearance.
    pub concepts: Vec<String>,
}

/// Turns free text into an intent, an emotion and a list of concepts.
pub trait IntentClassifier: Send + Sync {
    /// Classify `text`.
    fn classify(&self, text: &str) -> Classification;
}

/// Classifier backed by fixed keyword lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Classification {
        let normalized = text.to_lowercase();
        let words = tokenize(&normalized);
        Classification {
            intent: classify_intent(&normalized, &words),
            emotion: detect_emotion_in(&normalized, &words),
            concepts: extract_concepts(&words),
        }
    }
}

// ---------------------------------------------------------------------------
// Matching helpers
// ---------------------------------------------------------------------------

fn tokenize(normalized: &str) -> Vec<&str> {
    normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Exact word match for single words, substring match for phrases.
fn has_keyword(normalized: &str, words: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| {
        if keyword.contains(' ') {
            normalized.contains(keyword)
        } else {
            words.contains(keyword)
        }
    })
}

/// Prefix match for long stems, exact match for short ones, substring
/// match for phrases.
fn has_stem(normalized: &str, words: &[&str], stems: &[&str]) -> bool {
    stems.iter().any(|stem| {
        if stem.contains(' ') {
            normalized.contains(stem)
        } else if stem.chars().count() < MIN_PREFIX_STEM_LEN {
            words.contains(stem)
        } else {
            words.iter().any(|w| w.starts_with(stem))
        }
    })
}

fn classify_intent(normalized: &str, words: &[&str]) -> IntentTag {
    if has_keyword(normalized, words, CRITICISM_KEYWORDS) {
        return IntentTag::Criticism;
    }
    if has_keyword(normalized, words, PRAISE_KEYWORDS) {
        return IntentTag::Praise;
    }
    let opens_question = words
        .first()
        .is_some_and(|first| QUESTION_OPENERS.contains(first));
    if normalized.trim_end().ends_with('?') || opens_question {
        return IntentTag::Question;
    }
    if has_keyword(normalized, words, GREETING_KEYWORDS) {
        return IntentTag::Greeting;
    }
    IntentTag::Statement
}

fn detect_emotion_in(normalized: &str, words: &[&str]) -> Option<Emotion> {
    EMOTION_KEYWORDS
        .iter()
        .find(|(_, stems)| has_stem(normalized, words, stems))
        .map(|(emotion, _)| *emotion)
}

fn extract_concepts(words: &[&str]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    words
        .iter()
        .filter(|w| w.chars().count() >= 4 && !STOPWORDS.contains(*w))
        .filter(|w| seen.insert(**w))
        .take(MAX_CONCEPTS)
        .map(|w| (*w).to_owned())
        .collect()
}

/// First matching emotion family in priority order
/// (happy, sad, curious, reflective, frustrated).
pub fn detect_emotion(text: &str) -> Option<Emotion> {
    let normalized = text.to_lowercase();
    let words = tokenize(&normalized);
    detect_emotion_in(&normalized, &words)
}

/// Whether `text` contains any of the given words or phrases.
pub fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    let normalized = text.to_lowercase();
    let words = tokenize(&normalized);
    has_keyword(&normalized, &words, keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(text: &str) -> IntentTag {
        KeywordClassifier.classify(text).intent
    }

    #[test]
    fn intents() {
        assert_eq!(intent("You are so clever!"), IntentTag::Praise);
        assert_eq!(intent("that was a stupid jump"), IntentTag::Criticism);
        assert_eq!(intent("where is the red book?"), IntentTag::Question);
        assert_eq!(intent("why do you glow"), IntentTag::Question);
        assert_eq!(intent("hey there"), IntentTag::Greeting);
        assert_eq!(intent("the garden is north"), IntentTag::Statement);
    }

    #[test]
    fn criticism_outranks_praise() {
        assert_eq!(intent("good grief, you are useless"), IntentTag::Criticism);
    }

    #[test]
    fn greeting_words_are_whole_words() {
        // "this" must not count as "hi".
        assert_eq!(intent("this rock is heavy"), IntentTag::Statement);
    }

    #[test]
    fn emotion_priority_order() {
        assert_eq!(detect_emotion("I'm sad but also happy"), Some(Emotion::Happy));
        assert_eq!(detect_emotion("feeling lonely, wondering"), Some(Emotion::Sad));
        assert_eq!(detect_emotion("let's explore"), Some(Emotion::Curious));
        assert_eq!(detect_emotion("I keep pondering"), Some(Emotion::Reflective));
        assert_eq!(detect_emotion("ugh, stuck again"), Some(Emotion::Frustrated));
        assert_eq!(detect_emotion("a plain stone"), None);
    }

    #[test]
    fn stems_match_inflections() {
        assert_eq!(detect_emotion("they were laughing"), Some(Emotion::Happy));
        assert_eq!(detect_emotion("so frustrating"), Some(Emotion::Frustrated));
        assert_eq!(detect_emotion("she was crying"), Some(Emotion::Sad));
        assert_eq!(detect_emotion("I missed you"), Some(Emotion::Sad));
    }

    #[test]
    fn short_stems_do_not_match_longer_words() {
        assert_eq!(detect_emotion("made a friend"), None);
        assert_eq!(detect_emotion("on a mission"), None);
        assert_eq!(detect_emotion("a crystal ball"), None);
        assert_eq!(detect_emotion("what does this function do"), None);
        assert_eq!(detect_emotion("I am mad"), Some(Emotion::Frustrated));
    }

    #[test]
    fn concepts_skip_short_and_common_words() {
        let c = KeywordClassifier.classify("Tell me about the ancient library, the ancient one");
        assert_eq!(c.concepts, vec!["tell", "ancient", "library"]);
    }

    #[test]
    fn mentions_phrase() {
        assert!(mentions_any("Oh great, yeah right", &["yeah right"]));
        assert!(!mentions_any("righteous", &["right"]));
    }
}
