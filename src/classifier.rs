//! Greeting vs. content routing, decided before any retrieval cost.
//!
//! Classification is a pure function of the query text and a
//! [`GreetingTable`]. The table ships with English and Arabic defaults and
//! can be replaced from the `[classifier]` config section, since the exact
//! wording of greetings is a corpus policy rather than structure.
//!
//! # Rules (first match wins)
//!
//! 1. Longer than `max_chars` after trimming → [`QueryKind::Content`].
//! 2. Normalized text is a salutation, a salutation followed by a suffix
//!    (`"hi there"`), or a conversational opener (`"how are you"`) →
//!    [`QueryKind::Greeting`].
//! 3. At most `max_tokens` words and equal to a bare greeting word →
//!    [`QueryKind::Greeting`].
//! 4. Otherwise [`QueryKind::Content`].
//!
//! Normalization trims, lowercases (Latin script), collapses whitespace,
//! drops commas, and strips trailing `! ? . ؟`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    Greeting,
    Content,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Greeting => "GREETING",
            QueryKind::Content => "CONTENT",
        }
    }
}

/// Writing system of a query, used to pick canned replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Latin,
    Arabic,
}

impl Script {
    /// [`Script::Arabic`] if any character falls in an Arabic block.
    pub fn detect(text: &str) -> Self {
        if text.chars().any(is_arabic) {
            Script::Arabic
        } else {
            Script::Latin
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Script::Latin => "latin",
            Script::Arabic => "arabic",
        }
    }
}

/// Arabic, Arabic Supplement, Arabic Extended-A, and both presentation
/// form blocks.
pub fn is_arabic(c: char) -> bool {
    matches!(
        c,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

/// Greeting pattern table and thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GreetingTable {
    /// Queries longer than this (in characters) are always content.
    pub max_chars: usize,
    /// Word limit for the bare-word fallback.
    pub max_tokens: usize,
    /// Exact salutations, e.g. `"hello"`, `"good morning"`, `"مرحبا"`.
    pub salutations: Vec<String>,
    /// Words that may follow a salutation, e.g. `"there"` in `"hi there"`.
    pub suffixes: Vec<String>,
    /// Conversational openers, e.g. `"how are you"`.
    pub openers: Vec<String>,
    /// Short greeting words accepted by the fallback rule.
    pub bare_words: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for GreetingTable {
    fn default() -> Self {
        Self {
            max_chars: 120,
            max_tokens: 3,
            salutations: strings(&[
                "hi",
                "hello",
                "hey",
                "greetings",
                "good morning",
                "good afternoon",
                "good evening",
                "howdy",
                "مرحبا",
                "أهلا",
                "اهلا",
                "السلام عليكم",
                "اهلين",
                "هلا",
            ]),
            suffixes: strings(&["there", "you"]),
            openers: strings(&["how are you", "what's up", "whats up", "كيف حالك"]),
            bare_words: strings(&["hi", "hello", "hey", "مرحبا", "أهلا", "هلا", "اهلين"]),
        }
    }
}

impl GreetingTable {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chars == 0 {
            return Err("max_chars must be > 0".to_string());
        }
        let all = self
            .salutations
            .iter()
            .chain(&self.suffixes)
            .chain(&self.openers)
            .chain(&self.bare_words);
        for entry in all {
            if normalize(entry).is_empty() {
                return Err(format!("empty greeting pattern: {:?}", entry));
            }
        }
        Ok(())
    }
}

/// Canonical form used on both sides of every comparison.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    let words: Vec<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == ',' || c == '،')
        .filter(|w| !w.is_empty())
        .collect();
    words
        .join(" ")
        .trim_end_matches(|c: char| matches!(c, '!' | '?' | '.' | '؟') || c.is_whitespace())
        .to_string()
}

/// Pure greeting/content classifier over a [`GreetingTable`].
#[derive(Debug, Clone)]
pub struct QueryClassifier {
    max_chars: usize,
    max_tokens: usize,
    salutations: HashSet<String>,
    suffixes: Vec<String>,
    openers: HashSet<String>,
    bare_words: HashSet<String>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self::new(&GreetingTable::default())
    }
}

impl QueryClassifier {
    pub fn new(table: &GreetingTable) -> Self {
        let set = |items: &[String]| items.iter().map(|s| normalize(s)).collect::<HashSet<_>>();
        Self {
            max_chars: table.max_chars,
            max_tokens: table.max_tokens,
            salutations: set(&table.salutations),
            suffixes: table.suffixes.iter().map(|s| normalize(s)).collect(),
            openers: set(&table.openers),
            bare_words: set(&table.bare_words),
        }
    }

    pub fn classify(&self, query: &str) -> QueryKind {
        let trimmed = query.trim();
        if trimmed.is_empty() || trimmed.chars().count() > self.max_chars {
            return QueryKind::Content;
        }

        let normalized = normalize(trimmed);

        if self.salutations.contains(&normalized)
            || self.openers.contains(&normalized)
            || self.is_suffixed_salutation(&normalized)
        {
            return QueryKind::Greeting;
        }

        if trimmed.split_whitespace().count() <= self.max_tokens
            && self.bare_words.contains(&normalized)
        {
            return QueryKind::Greeting;
        }

        QueryKind::Content
    }

    pub fn is_greeting(&self, query: &str) -> bool {
        self.classify(query) == QueryKind::Greeting
    }

    fn is_suffixed_salutation(&self, normalized: &str) -> bool {
        self.suffixes.iter().any(|suffix| {
            normalized
                .strip_suffix(suffix.as_str())
                .and_then(|head| head.strip_suffix(' '))
                .is_some_and(|head| self.salutations.contains(head))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(q: &str) -> QueryKind {
        QueryClassifier::default().classify(q)
    }

    #[test]
    fn test_english_greetings() {
        for q in [
            "Hello",
            "hi",
            "Hi there!",
            "HEY YOU",
            "Good morning.",
            "How are you?",
            "what's up",
            "What’s up?",
            "  howdy  ",
        ] {
            assert_eq!(classify(q), QueryKind::Greeting, "{:?}", q);
        }
    }

    #[test]
    fn test_arabic_greetings() {
        for q in ["مرحبا", "أهلا!", "السلام عليكم", "كيف حالك؟", "هلا"] {
            assert_eq!(classify(q), QueryKind::Greeting, "{:?}", q);
        }
    }

    #[test]
    fn test_content_questions() {
        for q in [
            "What is your educational background?",
            "Hello, what are the strategic goals?",
            "hi there how many indicators are listed",
            "ما هي أهداف الاستراتيجية؟",
            "",
        ] {
            assert_eq!(classify(q), QueryKind::Content, "{:?}", q);
        }
    }

    #[test]
    fn test_length_ceiling_forces_content() {
        let table = GreetingTable {
            max_chars: 4,
            ..GreetingTable::default()
        };
        let classifier = QueryClassifier::new(&table);
        assert_eq!(classifier.classify("hey"), QueryKind::Greeting);
        assert_eq!(classifier.classify("hello"), QueryKind::Content);
    }

    #[test]
    fn test_bare_word_fallback_respects_token_limit() {
        let table = GreetingTable {
            salutations: Vec::new(),
            openers: Vec::new(),
            bare_words: strings(&["yo", "hey hey hey hey"]),
            ..GreetingTable::default()
        };
        let classifier = QueryClassifier::new(&table);
        assert_eq!(classifier.classify("Yo!"), QueryKind::Greeting);
        assert_eq!(classifier.classify("hey hey hey hey"), QueryKind::Content);
    }

    #[test]
    fn test_custom_table_replaces_defaults() {
        let table = GreetingTable {
            salutations: strings(&["bonjour"]),
            suffixes: Vec::new(),
            openers: Vec::new(),
            bare_words: Vec::new(),
            ..GreetingTable::default()
        };
        let classifier = QueryClassifier::new(&table);
        assert!(classifier.is_greeting("Bonjour!"));
        assert!(!classifier.is_greeting("hello"));
    }

    #[test]
    fn test_deterministic() {
        let classifier = QueryClassifier::default();
        for q in ["Hello", "What is the vision?", "مرحبا"] {
            let first = classifier.classify(q);
            for _ in 0..10 {
                assert_eq!(classifier.classify(q), first);
            }
        }
    }

    #[test]
    fn test_script_detection() {
        assert_eq!(Script::detect("When was it founded?"), Script::Latin);
        assert_eq!(Script::detect("متى تأسست؟"), Script::Arabic);
        assert_eq!(Script::detect("KPI رؤية 2030"), Script::Arabic);
        assert_eq!(Script::detect(""), Script::Latin);
    }

    #[test]
    fn test_labels_match_serialization() {
        for kind in [QueryKind::Greeting, QueryKind::Content] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn test_validate_rejects_blank_patterns() {
        let table = GreetingTable {
            openers: strings(&["  ?"]),
            ..GreetingTable::default()
        };
        assert!(table.validate().is_err());
        assert!(GreetingTable::default().validate().is_ok());
    }
}
