//! Canonical entry shape shared by every source.
//!
//! The on-disk format is JSONL, one entry per line, UTF-8, non-ASCII kept
//! as-is. Kaikki dumps carry many more fields than these; everything the
//! pipeline does not consume is dropped at the first deserialization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Entry {
    pub word: String,

    /// Primary source language label. Raw wiktextract lines spell this
    /// `lang`; the canonical shape uses `language`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    /// Accepted on input only; `language_label` resolves the fallback.
    #[serde(skip_serializing)]
    pub lang: String,

    pub senses: Vec<Sense>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forms: Vec<Form>,

    /// Origin tag ("kaikki", "stardict", "tatoeba").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Sense {
    pub glosses: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub raw_glosses: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,

    /// Wiktextract link tokens, `[[text, target], …]`. Only consumed as
    /// pivot input for gloss retargeting.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Vec<String>>,

    /// Present in kaikki language datasets; input to the translation map.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub translations: Vec<Translation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct Example {
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub translation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Form {
    pub form: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Translation {
    pub lang: String,
    pub word: String,
}

impl Entry {
    /// `language` with the raw-dump `lang` fallback.
    pub fn language_label(&self) -> &str {
        if self.language.is_empty() { &self.lang } else { &self.language }
    }

    /// Whether any sense carries a non-whitespace gloss.
    pub fn has_content(&self) -> bool {
        self.senses.iter().any(Sense::is_content_bearing)
    }
}

impl Sense {
    /// Content-bearing iff at least one of glosses/raw_glosses contains a
    /// non-whitespace string. Non-content senses survive only as example
    /// carriers.
    pub fn is_content_bearing(&self) -> bool {
        self.glosses
            .iter()
            .chain(self.raw_glosses.iter())
            .any(|g| !g.trim().is_empty())
    }

    /// Dedup identity of a sense during enrichment.
    pub fn gloss_key(&self) -> Vec<String> {
        self.glosses.clone()
    }
}

impl Example {
    pub fn new(text: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            translation: translation.into(),
        }
    }

    /// Pair identity: exact `(text, translation)` equality.
    pub fn pair(&self) -> (String, String) {
        (self.text.clone(), self.translation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_fallback() {
        let entry: Entry = serde_json::from_str(r#"{"word":"kuća","lang":"Serbian"}"#).unwrap();
        assert_eq!(entry.language_label(), "Serbian");

        let entry: Entry =
            serde_json::from_str(r#"{"word":"kuća","language":"Serbian"}"#).unwrap();
        assert_eq!(entry.language_label(), "Serbian");
    }

    #[test]
    fn wire_format_is_lean() {
        let entry = Entry {
            word: "kuća".to_string(),
            language: "Serbian".to_string(),
            senses: vec![Sense {
                glosses: vec!["house".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let line = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            line,
            r#"{"word":"kuća","language":"Serbian","senses":[{"glosses":["house"]}]}"#
        );
    }

    #[test]
    fn non_ascii_stays_unescaped() {
        let example = Example::new("Кућа је велика.", "The house is big.");
        let line = serde_json::to_string(&example).unwrap();
        assert!(line.contains("Кућа"));
    }

    #[test]
    fn content_checks() {
        let mut sense = Sense::default();
        assert!(!sense.is_content_bearing());
        sense.raw_glosses.push("  ".to_string());
        assert!(!sense.is_content_bearing());
        sense.glosses.push("a house".to_string());
        assert!(sense.is_content_bearing());

        let entry = Entry {
            senses: vec![Sense::default()],
            ..Default::default()
        };
        assert!(!entry.has_content());
    }
}
