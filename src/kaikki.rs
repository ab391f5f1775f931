//! Kaikki (wiktextract) source.
//!
//! Owns the `raw/`, `filtered/`, `languages/` and `translations/` cache
//! subtrees. All downloads are idempotent; the filtered per-language subset
//! is additionally guarded by an mtime-stamped sidecar so a refreshed raw
//! dump invalidates it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::download::fetch;
use crate::error::{DownloadError, ParseError};
use crate::lang::kaikki_canonical;
use crate::models::Entry;
use crate::path::{CacheLayout, kaikki_slug};
use crate::progress::ProgressReporter;
use crate::utils::{mtime_secs, skip_because_file_exists};
use crate::{DictionarySource, Map};

pub const RAW_DUMP_URL: &str = "https://kaikki.org/dictionary/raw-wiktextract-data.jsonl.gz";
pub const RAW_DUMP_BASENAME: &str = "raw-wiktextract-data.jsonl.gz";

/// Lowercase headword → ordered unique target-language translations.
/// BTreeMap so the on-disk form has sorted keys.
pub type TranslationMap = BTreeMap<String, Vec<String>>;

/// Sidecar metadata of a filtered language subset.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SubsetMeta {
    pub language: String,
    pub count: u64,
    pub source_mtime: i64,
}

/// Cheap per-line probe for the filter pass; avoids deserializing whole
/// entries just to read the language label.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LangProbe {
    language: String,
    lang: String,
}

impl LangProbe {
    fn label(&self) -> &str {
        if self.language.is_empty() { &self.lang } else { &self.language }
    }
}

pub struct KaikkiSource<'a> {
    layout: CacheLayout,
    reporter: &'a dyn ProgressReporter,
    /// Suppress the console skip notes (progress still goes through the
    /// reporter).
    pub quiet: bool,
    translation_cache: Map<(String, String), TranslationMap>,
}

impl<'a> KaikkiSource<'a> {
    pub fn new(layout: CacheLayout, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            layout,
            reporter,
            quiet: false,
            translation_cache: Map::default(),
        }
    }

    fn language_dataset_url(language: &str) -> String {
        let quoted = language.replace(' ', "%20").replace('\'', "%27");
        let slug = kaikki_slug(language);
        format!("https://kaikki.org/dictionary/{quoted}/kaikki.org-dictionary-{slug}.jsonl")
    }

    /// Idempotent download of the monolithic gzip dump.
    pub fn ensure_raw_dump(&self) -> Result<PathBuf> {
        let target = self.layout.path_raw_dump(RAW_DUMP_BASENAME);
        if target.exists() {
            if !self.quiet {
                skip_because_file_exists("raw dump download", &target);
            }
            return Ok(target);
        }
        fetch(RAW_DUMP_URL, &target, self.reporter)?;
        Ok(target)
    }

    /// Idempotent download of the kaikki per-language dataset.
    pub fn ensure_language_dataset(&self, language: &str) -> Result<PathBuf> {
        let language = kaikki_canonical(language);
        let target = self.layout.path_language_dataset(language);
        if target.exists() {
            tracing::debug!("language dataset already cached: {}", target.display());
            return Ok(target);
        }
        let url = Self::language_dataset_url(language);
        fetch(&url, &target, self.reporter)?;
        Ok(target)
    }

    /// Per-language subset of the raw dump, cached by the raw dump's mtime.
    ///
    /// Falls back to the unfiltered per-language dataset when the raw dump
    /// matches nothing; zero entries from both is a `DownloadError`.
    pub fn ensure_filtered_language(&self, language: &str) -> Result<(PathBuf, u64)> {
        let language = kaikki_canonical(language);
        let raw_dump = self.ensure_raw_dump()?;

        fs::create_dir_all(self.layout.dir_filtered())?;
        let filtered_path = self.layout.path_filtered(language);
        let meta_path = self.layout.path_filtered_meta(language);
        let raw_mtime = mtime_secs(&raw_dump)?;

        if filtered_path.exists()
            && meta_path.exists()
            && let Ok(text) = fs::read_to_string(&meta_path)
        {
            // an unreadable sidecar is treated as stale, not fatal
            let meta: SubsetMeta = serde_json::from_str(&text).unwrap_or_default();
            if meta.source_mtime == raw_mtime && meta.count > 0 {
                return Ok((filtered_path, meta.count));
            }
        }

        let tmp_path = filtered_path.with_extension("tmp");
        let mut count = self.filter_raw_dump(&raw_dump, &tmp_path, language)?;

        if count == 0 {
            let _ = fs::remove_file(&tmp_path);
            let dataset = self.ensure_language_dataset(language)?;
            count = copy_jsonl(&dataset, &tmp_path)?;
            if count == 0 {
                let _ = fs::remove_file(&tmp_path);
                return Err(DownloadError::new(
                    Self::language_dataset_url(language),
                    format!("no entries found for language '{language}' in kaikki dumps"),
                )
                .into());
            }
        }

        fs::rename(&tmp_path, &filtered_path)?;
        let meta = SubsetMeta {
            language: language.to_string(),
            count,
            source_mtime: raw_mtime,
        };
        fs::write(&meta_path, serde_json::to_string(&meta)?)?;

        Ok((filtered_path, count))
    }

    fn filter_raw_dump(&self, raw_dump: &Path, dest: &Path, language: &str) -> Result<u64> {
        let reader_file = File::open(raw_dump)?;
        let reader = BufReader::new(GzDecoder::new(reader_file));
        let mut writer = BufWriter::new(File::create(dest)?);

        let mut handle = self
            .reporter
            .task(&format!("Filtering {language}"), None);

        let mut count = 0u64;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            handle.advance(1);

            // Invalid JSON in the raw dump is fatal; there is no path to
            // blame a single language for it.
            let probe: LangProbe = serde_json::from_str(&line)
                .map_err(|e| ParseError::new(None, &e))?;

            if probe.label() == language {
                writeln!(writer, "{line}")?;
                count += 1;
            }
        }
        writer.flush()?;
        Ok(count)
    }

    /// Translation map `lowercase headword -> sorted unique translations`,
    /// extracted from the source-language dataset and cached by its mtime.
    pub fn load_translation_map(
        &mut self,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<&TranslationMap> {
        let source_lang = kaikki_canonical(source_lang).to_string();
        let target_lang = kaikki_canonical(target_lang).to_string();
        let key = (source_lang.to_lowercase(), target_lang.to_lowercase());

        if !self.translation_cache.contains_key(&key) {
            let mapping = self.build_translation_map(&source_lang, &target_lang)?;
            self.translation_cache.insert(key.clone(), mapping);
        }
        Ok(&self.translation_cache[&key])
    }

    fn build_translation_map(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslationMap> {
        fs::create_dir_all(self.layout.dir_translations())?;
        let cache_path = self.layout.path_translation_map(source_lang, target_lang);
        let source_dump = self.ensure_language_dataset(source_lang)?;

        if cache_path.exists() && mtime_secs(&cache_path)? >= mtime_secs(&source_dump)? {
            let text = fs::read_to_string(&cache_path)?;
            return Ok(serde_json::from_str(&text)?);
        }

        let mut handle = self
            .reporter
            .task(&format!("Mapping {source_lang} -> {target_lang}"), None);

        let mut mapping = TranslationMap::new();
        let reader = BufReader::new(File::open(&source_dump)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            handle.advance(1);
            // per-language datasets occasionally carry junk lines; skip them
            let Ok(entry) = serde_json::from_str::<Entry>(&line) else {
                continue;
            };
            if entry.word.is_empty() {
                continue;
            }
            let translations: BTreeSet<String> = entry
                .senses
                .iter()
                .flat_map(|sense| sense.translations.iter())
                .filter(|tr| tr.lang == target_lang && !tr.word.is_empty())
                .map(|tr| tr.word.clone())
                .collect();
            if !translations.is_empty() {
                mapping.insert(
                    entry.word.to_lowercase(),
                    translations.into_iter().collect(),
                );
            }
        }

        let tmp_path = cache_path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_string(&mapping)?)?;
        fs::rename(&tmp_path, &cache_path)?;

        Ok(mapping)
    }

    /// Rewrite a corpus with glosses retargeted through the translation map,
    /// writing a `<stem>__to_<slug>.jsonl` sibling. Cached by mtime.
    pub fn ensure_translated_glosses(
        &mut self,
        base_path: &Path,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<PathBuf> {
        let translation_map = self.load_translation_map(source_lang, target_lang)?.clone();

        let target_lang = kaikki_canonical(target_lang);
        let stem = base_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("corpus");
        let localized_path = base_path
            .with_file_name(format!("{stem}__to_{}.jsonl", kaikki_slug(target_lang)));

        if localized_path.exists()
            && mtime_secs(&localized_path)? >= mtime_secs(base_path)?
        {
            return Ok(localized_path);
        }

        let tmp_path = localized_path.with_extension("tmp");
        let reader = BufReader::new(File::open(base_path)?);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut entry: Entry = serde_json::from_str(&line)
                .map_err(|e| ParseError::new(Some(base_path), &e))?;
            apply_translation_glosses(&mut entry, &translation_map);
            writeln!(writer, "{}", serde_json::to_string(&entry)?)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &localized_path)?;

        Ok(localized_path)
    }
}

impl DictionarySource for KaikkiSource<'_> {
    fn ensure_download_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.layout.dir_raw())?;
        fs::create_dir_all(self.layout.dir_filtered())?;
        fs::create_dir_all(self.layout.dir_languages())?;
        fs::create_dir_all(self.layout.dir_translations())?;
        Ok(())
    }

    fn get_entries(&mut self, in_lang: &str, _out_lang: &str) -> Result<(PathBuf, u64)> {
        self.ensure_filtered_language(in_lang)
    }
}

/// Replace a sense's glosses with target-language translations when the map
/// knows any of its pivot tokens.
///
/// Pivot candidates, in order: the first token of each link, then each gloss
/// lowercased, then each gloss truncated at the first `;` or `(`. A sense
/// with no hits is left untouched.
pub fn apply_translation_glosses(entry: &mut Entry, translation_map: &TranslationMap) {
    for sense in &mut entry.senses {
        let mut translations: BTreeSet<String> = BTreeSet::new();

        for link in &sense.links {
            if let Some(pivot) = link.first() {
                if let Some(found) = translation_map.get(&pivot.to_lowercase()) {
                    translations.extend(found.iter().cloned());
                }
            }
        }

        if translations.is_empty() {
            for gloss in &sense.glosses {
                let candidate = gloss.to_lowercase();
                if let Some(found) = translation_map.get(&candidate) {
                    translations.extend(found.iter().cloned());
                    continue;
                }
                let stripped = candidate
                    .split(';')
                    .next()
                    .unwrap_or("")
                    .split('(')
                    .next()
                    .unwrap_or("")
                    .trim();
                if let Some(found) = translation_map.get(stripped) {
                    translations.extend(found.iter().cloned());
                }
            }
        }

        if !translations.is_empty() {
            let ordered: Vec<String> = translations.into_iter().collect();
            sense.glosses = ordered.clone();
            sense.raw_glosses = ordered;
        }
    }
}

fn copy_jsonl(src: &Path, dest: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(src)?);
    let mut writer = BufWriter::new(File::create(dest)?);
    let mut count = 0u64;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        writeln!(writer, "{line}")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}
