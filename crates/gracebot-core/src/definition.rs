//! Canned keyword definitions.
//!
//! Keys are matched case-insensitively after trimming. When two entries
//! normalize to the same key the later one wins.

use std::{collections::HashMap, fmt, fs, path::Path};

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

use crate::{errors::Error, filter::fold_apostrophes, Result};

const QUESTION_PREFIXES: &[&str] = &[
    "what is ",
    "what's ",
    "whats ",
    "what are ",
    "define ",
    "definition of ",
    "meaning of ",
    "tell me about ",
];

const ARTICLES: &[&str] = &["a ", "an ", "the "];

fn normalize_key(s: &str) -> String {
    fold_apostrophes(s.trim()).to_lowercase()
}

#[derive(Clone, Debug, Default)]
pub struct DefinitionLookup {
    definitions: HashMap<String, String>,
}

impl DefinitionLookup {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut definitions = HashMap::new();
        for (k, v) in entries {
            let key = normalize_key(k.as_ref());
            if key.is_empty() {
                continue;
            }
            definitions.insert(key, v.into());
        }
        Self { definitions }
    }

    /// Load a JSON object of `"keyword": "definition"` pairs.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(Error::Config("definition source path is empty".to_string()));
        }
        let txt = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read definition source {}: {e}",
                path.display()
            ))
        })?;
        let entries: OrderedEntries = serde_json::from_str(&txt).map_err(|e| {
            Error::Config(format!(
                "invalid definition source {}: {e}",
                path.display()
            ))
        })?;

        let lookup = Self::new(entries.0);
        tracing::debug!(path = %path.display(), terms = lookup.len(), "loaded definitions");
        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definition for `term`, or `None` when the term is unknown.
    pub fn lookup(&self, term: &str) -> Option<&str> {
        self.definitions
            .get(&normalize_key(term))
            .map(String::as_str)
    }

    /// Pull the asked-about term out of a question such as "What is a bot?".
    ///
    /// Returns `None` when nothing is left after stripping the question form.
    pub fn extract_term(text: &str) -> Option<String> {
        let mut s = fold_apostrophes(text.trim())
            .trim_end_matches(&['?', '!', '.', ' '][..])
            .to_lowercase();

        for prefix in QUESTION_PREFIXES {
            if s == prefix.trim_end() {
                return None;
            }
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest.trim_start().to_string();
                break;
            }
        }
        for article in ARTICLES {
            if let Some(rest) = s.strip_prefix(article) {
                s = rest.trim_start().to_string();
                break;
            }
        }

        let s = s.trim();
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    }

    /// Definition answering `text`, if it asks about a known term.
    pub fn answer(&self, text: &str) -> Option<&str> {
        let term = Self::extract_term(text)?;
        self.lookup(&term)
    }
}

/// JSON object entries in document order (duplicate keys included).
struct OrderedEntries(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of keyword to definition strings")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((k, v)) = map.next_entry::<String, String>()? {
                    out.push((k, v));
                }
                Ok(OrderedEntries(out))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
