//! Profanity filter over a static word list.
//!
//! Matching is case-insensitive and token based: text is split into words
//! (letters and digits, with inner apostrophes such as "don't" or "don’t"), and a listed
//! entry matches only whole words. "badger" does not match "bad". Entries with
//! several words ("bad word") match a contiguous run of tokens.

use std::{fs, path::Path, sync::OnceLock};

use regex::Regex;

use crate::{errors::Error, Result};

fn token_re() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").expect("valid regex"))
}

/// Map typographic apostrophes (U+2018, U+2019) to `'`.
pub(crate) fn fold_apostrophes(text: &str) -> String {
    text.replace(|c: char| matches!(c, '\u{2018}' | '\u{2019}'), "'")
}

fn tokenize(text: &str) -> Vec<String> {
    token_re()
        .find_iter(&fold_apostrophes(text))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[derive(Clone, Debug)]
struct Entry {
    word: String,
    tokens: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct WordListFilter {
    entries: Vec<Entry>,
}

impl WordListFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = words
            .into_iter()
            .filter_map(|w| {
                let word = w.as_ref().trim();
                let tokens = tokenize(word);
                if tokens.is_empty() {
                    return None;
                }
                Some(Entry {
                    word: word.to_string(),
                    tokens,
                })
            })
            .collect();
        Self { entries }
    }

    /// Load a line-delimited word list. Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(Error::Config("word list path is empty".to_string()));
        }
        let txt = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read word list {}: {e}", path.display()))
        })?;

        let filter = Self::new(
            txt.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );
        if filter.is_empty() {
            return Err(Error::Config(format!(
                "word list {} contains no words",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), words = filter.len(), "loaded word list");
        Ok(filter)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff `text` contains at least one listed word.
    pub fn contains(&self, text: &str) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let tokens = tokenize(text);
        self.entries.iter().any(|e| contains_run(&tokens, &e.tokens))
    }

    /// Listed entries found in `text`, in list order, without duplicates.
    pub fn matches(&self, text: &str) -> Vec<&str> {
        let tokens = tokenize(text);
        let mut out: Vec<&str> = Vec::new();
        for e in &self.entries {
            if contains_run(&tokens, &e.tokens) && !out.contains(&e.word.as_str()) {
                out.push(&e.word);
            }
        }
        out
    }
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
