//! Deterministic on-disk cache layout.
//!
//! Every artifact the pipeline touches lives under one user-chosen cache
//! root. Each source owns its own subtree; the assembler owns `combined/`.
//! Nothing outside this module builds cache paths by hand.

use std::path::{Path, PathBuf};

pub const RAW_DIR: &str = "raw";
pub const FILTERED_DIR: &str = "filtered";
pub const LANGUAGES_DIR: &str = "languages";
pub const TRANSLATIONS_DIR: &str = "translations";
pub const STARDICT_DIR: &str = "stardict";
pub const DOWNLOADS_DIR: &str = "downloads";
pub const TATOEBA_DIR: &str = "tatoeba";
pub const COMBINED_DIR: &str = "combined";
pub const META_SUFFIX: &str = ".meta.json";

/// Replace runs of characters outside `[A-Za-z0-9]` with `_`.
///
/// Used for filenames derived from language names, where `Serbo-Croatian`
/// becomes `Serbo_Croatian`. Falls back to `"language"` for degenerate input.
pub fn slug(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    if out.is_empty() { "language".to_string() } else { out }
}

/// Kaikki's own file naming: spaces, hyphens and apostrophes stripped, case
/// preserved (`Serbo-Croatian` → `SerboCroatian`).
pub fn kaikki_slug(language: &str) -> String {
    language
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '\''))
        .collect()
}

/// Helper struct to manage cache paths.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Example: `cache/raw`
    pub fn dir_raw(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }
    /// Example: `cache/raw/raw-wiktextract-data.jsonl.gz`
    pub fn path_raw_dump(&self, basename: &str) -> PathBuf {
        self.dir_raw().join(basename)
    }

    /// Example: `cache/filtered`
    pub fn dir_filtered(&self) -> PathBuf {
        self.root.join(FILTERED_DIR)
    }
    /// Example: `cache/filtered/Serbo_Croatian.jsonl`
    pub fn path_filtered(&self, language: &str) -> PathBuf {
        self.dir_filtered().join(format!("{}.jsonl", slug(language)))
    }
    /// Example: `cache/filtered/Serbo_Croatian.meta.json`
    pub fn path_filtered_meta(&self, language: &str) -> PathBuf {
        self.dir_filtered()
            .join(format!("{}{META_SUFFIX}", slug(language)))
    }

    /// Example: `cache/languages`
    pub fn dir_languages(&self) -> PathBuf {
        self.root.join(LANGUAGES_DIR)
    }
    /// Example: `cache/languages/kaikki.org-dictionary-SerboCroatian.jsonl`
    pub fn path_language_dataset(&self, language: &str) -> PathBuf {
        self.dir_languages()
            .join(format!("kaikki.org-dictionary-{}.jsonl", kaikki_slug(language)))
    }

    /// Example: `cache/translations`
    pub fn dir_translations(&self) -> PathBuf {
        self.root.join(TRANSLATIONS_DIR)
    }
    /// Example: `cache/translations/English_to_Russian.json`
    pub fn path_translation_map(&self, source_lang: &str, target_lang: &str) -> PathBuf {
        self.dir_translations().join(format!(
            "{}_to_{}.json",
            kaikki_slug(source_lang),
            kaikki_slug(target_lang)
        ))
    }

    /// Example: `cache/stardict`
    pub fn dir_stardict(&self) -> PathBuf {
        self.root.join(STARDICT_DIR)
    }
    /// Example: `cache/stardict/downloads`
    pub fn dir_stardict_downloads(&self) -> PathBuf {
        self.dir_stardict().join(DOWNLOADS_DIR)
    }
    /// Example: `cache/stardict/downloads/srp-eng-0.2.tar.xz`
    pub fn path_stardict_archive(&self, pair: &str, version: &str) -> PathBuf {
        self.dir_stardict_downloads()
            .join(format!("{pair}-{version}.tar.xz"))
    }
    /// Example: `cache/stardict/srp-eng`
    pub fn dir_stardict_pair(&self, pair: &str) -> PathBuf {
        self.dir_stardict().join(pair)
    }
    /// Example: `cache/stardict/srp-eng/0.2`
    pub fn dir_stardict_version(&self, pair: &str, version: &str) -> PathBuf {
        self.dir_stardict_pair(pair).join(version)
    }
    /// Normalized JSONL produced from parsed StarDict trees.
    ///
    /// Example: `cache/stardict/filtered/Serbian__Russian.jsonl`
    pub fn path_stardict_entries(&self, cache_key: &str) -> PathBuf {
        self.dir_stardict()
            .join(FILTERED_DIR)
            .join(format!("{cache_key}.jsonl"))
    }

    /// Example: `cache/tatoeba`
    pub fn dir_tatoeba(&self) -> PathBuf {
        self.root.join(TATOEBA_DIR)
    }

    /// Example: `cache/combined`
    pub fn dir_combined(&self) -> PathBuf {
        self.root.join(COMBINED_DIR)
    }
    /// Example: `cache/combined/Croatian_Serbian__to__Russian.jsonl`
    pub fn path_combined(&self, source_langs: &[String], target_lang: &str) -> PathBuf {
        let sources = slug(&source_langs.join("-"));
        self.dir_combined()
            .join(format!("{sources}__to__{}.jsonl", slug(target_lang)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert_eq!(slug("Serbo-Croatian"), "Serbo_Croatian");
        assert_eq!(slug("  Ancient Greek  "), "Ancient_Greek");
        assert_eq!(slug("a--b  c"), "a_b_c");
        assert_eq!(slug("???"), "_");
        assert_eq!(slug(""), "language");
    }

    #[test]
    fn kaikki_slug_rules() {
        assert_eq!(kaikki_slug("Serbo-Croatian"), "SerboCroatian");
        assert_eq!(kaikki_slug("Ancient Greek"), "AncientGreek");
        assert_eq!(kaikki_slug("O'odham"), "Oodham");
        assert_eq!(kaikki_slug("Russian"), "Russian");
    }

    #[test]
    fn layout_paths() {
        let layout = CacheLayout::new("cache");
        assert_eq!(
            layout.path_filtered("Serbo-Croatian"),
            PathBuf::from("cache/filtered/Serbo_Croatian.jsonl")
        );
        assert_eq!(
            layout.path_filtered_meta("Serbo-Croatian"),
            PathBuf::from("cache/filtered/Serbo_Croatian.meta.json")
        );
        assert_eq!(
            layout.path_language_dataset("Serbo-Croatian"),
            PathBuf::from("cache/languages/kaikki.org-dictionary-SerboCroatian.jsonl")
        );
        assert_eq!(
            layout.path_translation_map("English", "Russian"),
            PathBuf::from("cache/translations/English_to_Russian.json")
        );
        assert_eq!(
            layout.path_stardict_archive("srp-eng", "2023.09.10"),
            PathBuf::from("cache/stardict/downloads/srp-eng-2023.09.10.tar.xz")
        );
        assert_eq!(
            layout.path_combined(
                &["Croatian".to_string(), "Serbian".to_string()],
                "Russian"
            ),
            PathBuf::from("cache/combined/Croatian_Serbian__to__Russian.jsonl")
        );
    }
}
