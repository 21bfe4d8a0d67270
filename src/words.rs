use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[#\w\-']+").expect("word pattern is valid"))
}

/// Extracts the word part of a whitespace token: `"world,"` becomes
/// `"world"`, `"#rust"` stays `"#rust"`. Returns `None` for tokens made of
/// punctuation only.
pub fn normalize_word(token: &str) -> Option<String> {
    word_regex()
        .find(token)
        .map(|m| m.as_str().trim().to_string())
        .filter(|w| !w.is_empty())
}

fn compare_words(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Vocabulary collected by clicking words on the card. Unique ignoring
/// case, kept sorted case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevantWords {
    words: Vec<String>,
}

impl RelevantWords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(text: &str) -> Self {
        let mut words = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                words.insert_raw(line.to_string());
            }
        }
        words
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words
            .binary_search_by(|w| compare_words(w, word))
            .is_ok()
    }

    /// Normalizes `token` and adds it. Returns the stored form when the word
    /// was new.
    pub fn insert_token(&mut self, token: &str) -> Option<String> {
        let word = normalize_word(token)?;
        self.insert_raw(word.clone()).then_some(word)
    }

    fn insert_raw(&mut self, word: String) -> bool {
        match self.words.binary_search_by(|w| compare_words(w, &word)) {
            Ok(_) => false,
            Err(pos) => {
                self.words.insert(pos, word);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// One word per line, each line newline-terminated.
    pub fn to_lines(&self) -> String {
        self.words.iter().map(|w| format!("{}\n", w)).collect()
    }
}
