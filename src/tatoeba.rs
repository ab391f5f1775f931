//! Tatoeba example source.
//!
//! A narrow capability compared to the dictionary sources: it never
//! contributes headwords on its own authority, it only enriches entries with
//! aligned example sentences (and a fallback gloss) during assembly.
//!
//! Sentence and link exports are downloaded per language, filtered to short
//! sentences, aligned through the link table, and cached as one
//! `pairs.json` per language-pair key.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use unicode_normalization::UnicodeNormalization;

use crate::download::fetch;
use crate::models::Example;
use crate::normalize;
use crate::path::CacheLayout;
use crate::progress::ProgressReporter;
use crate::{Map, Set};

const TATOEBA_EXPORT_ROOT: &str = "https://downloads.tatoeba.org/exports/per_language";
const TATOEBA_LINKS_ROOT: &str = "https://downloads.tatoeba.org/exports";

/// Example sentences are only useful as dictionary examples while short.
const MAX_WORDS: usize = 3;

const SENTENCE_FILES: &[&str] = &[
    "sentences.tar.bz2",
    "sentences.csv.bz2",
    "sentences.tsv.bz2",
    "sentences.csv",
    "sentences.tsv",
];
const LINK_FILES: &[&str] = &[
    "links.tar.bz2",
    "links.csv.bz2",
    "links.tsv.bz2",
    "links.csv",
    "links.tsv",
];

/// Enrichment capability consumed by the assembler.
pub trait ExampleProvider {
    /// All merge keys the provider knows examples for.
    fn vocabulary(&mut self) -> Result<Set<String>>;
    fn examples_for(&mut self, word: &str) -> Result<Vec<Example>>;
    fn gloss_for(&mut self, word: &str) -> Result<Option<String>>;
}

type PairMap = Map<String, Vec<(String, String)>>;

pub struct TatoebaExamples<'a> {
    source_langs: Vec<String>,
    target_langs: Vec<String>,
    root: PathBuf,
    reporter: &'a dyn ProgressReporter,
    pairs: Option<PairMap>,
}

impl<'a> TatoebaExamples<'a> {
    /// `source_lang` / `target_lang` are tatoeba (ISO 639-3) codes.
    pub fn new(
        source_lang: &str,
        target_lang: &str,
        layout: &CacheLayout,
        reporter: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            source_langs: expand_language(source_lang),
            target_langs: expand_language(target_lang),
            root: layout.dir_tatoeba(),
            reporter,
            pairs: None,
        }
    }

    fn cache_key(&self) -> String {
        format!(
            "{}__{}",
            self.source_langs.join("-"),
            self.target_langs.join("-")
        )
    }

    fn pairs_cache_path(&self) -> PathBuf {
        self.root.join(self.cache_key()).join("pairs.json")
    }

    fn download_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    fn load_pairs(&mut self) -> Result<&PairMap> {
        if self.pairs.is_none() {
            self.pairs = Some(self.build_or_read_pairs()?);
        }
        Ok(self.pairs.as_ref().expect("pairs were just set"))
    }

    fn build_or_read_pairs(&self) -> Result<PairMap> {
        let cache = self.pairs_cache_path();
        if cache.exists() {
            let text = fs::read_to_string(&cache)
                .with_context(|| format!("failed to read cached tatoeba data {}", cache.display()))?;
            return serde_json::from_str(&text)
                .with_context(|| format!("corrupted tatoeba cache {}", cache.display()));
        }

        if let Some(parent) = cache.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(self.download_dir())?;

        let pairs = self.collect_pairs()?;
        let tmp = cache.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string(&pairs)?)?;
        fs::rename(&tmp, &cache)?;
        Ok(pairs)
    }

    fn collect_pairs(&self) -> Result<PairMap> {
        let source_sentences = self.collect_sentences(&self.source_langs)?;
        if source_sentences.is_empty() {
            return Ok(PairMap::default());
        }
        let target_sentences = self.collect_sentences(&self.target_langs)?;
        if target_sentences.is_empty() {
            return Ok(PairMap::default());
        }
        let links = self.collect_links()?;
        if links.is_empty() {
            return Ok(PairMap::default());
        }

        // key -> unique ordered pairs, sorted for run-to-run stability
        let mut seen: Map<String, Set<(String, String)>> = Map::default();
        for (source_id, target_ids) in &links {
            let Some(source_text) = source_sentences.get(source_id) else {
                continue;
            };
            let key = normalise(source_text);
            if key.is_empty() {
                continue;
            }
            for target_id in target_ids {
                let Some(target_text) = target_sentences.get(target_id) else {
                    continue;
                };
                seen.entry(key.clone())
                    .or_default()
                    .insert((source_text.clone(), target_text.clone()));
            }
        }

        let mut pairs = PairMap::default();
        for (key, pair_set) in seen {
            let mut ordered: Vec<(String, String)> = pair_set.into_iter().collect();
            ordered.sort_by_key(|(src, tgt)| (src.to_lowercase(), tgt.to_lowercase()));
            pairs.insert(key, ordered);
        }
        Ok(pairs)
    }

    fn collect_sentences(&self, langs: &[String]) -> Result<Map<String, String>> {
        let mut sentences = Map::default();
        for lang in langs {
            let mut candidates: Vec<String> = vec![
                format!("{lang}_sentences.tsv.bz2"),
                format!("{lang}_sentences.csv.bz2"),
                format!("{lang}_sentences.tsv"),
                format!("{lang}_sentences.csv"),
            ];
            candidates.extend(SENTENCE_FILES.iter().map(|f| (*f).to_string()));

            let Some(path) = self.download_first_available(lang, &candidates) else {
                tracing::warn!("no tatoeba sentences export found for {lang}");
                continue;
            };
            with_export_reader(&path, "sentences", |reader| {
                read_sentence_rows(reader, lang, &mut sentences)
            })?;
        }
        Ok(sentences)
    }

    fn collect_links(&self) -> Result<Map<String, Set<String>>> {
        let mut links = Map::default();
        for lang in &self.source_langs {
            let mut candidates: Vec<String> = Vec::new();
            for target in &self.target_langs {
                let pair = format!("{lang}-{target}");
                candidates.extend([
                    format!("{pair}_links.tsv.bz2"),
                    format!("{pair}_links.csv.bz2"),
                    format!("{pair}_links.tsv"),
                    format!("{pair}_links.csv"),
                ]);
            }
            candidates.extend([
                format!("{lang}_links.tsv.bz2"),
                format!("{lang}_links.csv.bz2"),
                format!("{lang}_links.tsv"),
                format!("{lang}_links.csv"),
            ]);
            candidates.extend(LINK_FILES.iter().map(|f| (*f).to_string()));

            let Some(path) = self.download_first_available(lang, &candidates) else {
                tracing::warn!("no tatoeba links export found for {lang}");
                continue;
            };
            with_export_reader(&path, "links", |reader| read_link_rows(reader, &mut links))?;
        }
        Ok(links)
    }

    fn download_first_available(&self, lang: &str, candidates: &[String]) -> Option<PathBuf> {
        for name in candidates {
            let local_name = if name.starts_with(&format!("{lang}_")) {
                name.clone()
            } else {
                format!("{lang}_{name}")
            };
            let destination = self.download_dir().join(&local_name);
            if destination.exists() {
                return Some(destination);
            }
            let url = format!("{TATOEBA_EXPORT_ROOT}/{lang}/{name}");
            match fetch(&url, &destination, self.reporter) {
                Ok(()) => return Some(destination),
                Err(e) => tracing::debug!("tatoeba candidate unavailable: {e}"),
            }
        }
        // last resort: the global links dataset
        if candidates.iter().any(|c| c.contains("links")) {
            return self.ensure_global_links();
        }
        None
    }

    fn ensure_global_links(&self) -> Option<PathBuf> {
        let global_dir = self.root.join("global");
        for filename in ["links.csv.bz2", "links.csv", "links.tar.bz2"] {
            let destination = global_dir.join(filename);
            if destination.exists() {
                return Some(destination);
            }
            let url = format!("{TATOEBA_LINKS_ROOT}/{filename}");
            if fetch(&url, &destination, self.reporter).is_ok() {
                return Some(destination);
            }
        }
        None
    }
}

impl ExampleProvider for TatoebaExamples<'_> {
    fn vocabulary(&mut self) -> Result<Set<String>> {
        Ok(self.load_pairs()?.keys().cloned().collect())
    }

    fn examples_for(&mut self, word: &str) -> Result<Vec<Example>> {
        if word.is_empty() {
            return Ok(Vec::new());
        }
        let key = normalise(word);
        let pairs = self.load_pairs()?;
        Ok(pairs
            .get(&key)
            .map(|examples| {
                examples
                    .iter()
                    .map(|(src, tgt)| Example::new(src.clone(), tgt.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn gloss_for(&mut self, word: &str) -> Result<Option<String>> {
        let examples = self.examples_for(word)?;
        Ok(examples.first().map(|e| e.translation.clone()))
    }
}

/// `{sr, hr, srp, hrv}` collapse into the Serbo-Croatian sentence pool.
fn expand_language(code: &str) -> Vec<String> {
    let normalized = code.trim().to_lowercase();
    if matches!(normalized.as_str(), "srp" | "hrv" | "sr" | "hr") {
        vec!["hrv".to_string(), "srp".to_string()]
    } else {
        vec![normalized]
    }
}

/// NFC, collapsed whitespace, outer quotes and brackets stripped.
fn clean_text(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    let mut out = String::with_capacity(nfc.len());
    let mut in_gap = true;
    for c in nfc.chars() {
        if c.is_whitespace() {
            if !in_gap {
                out.push(' ');
                in_gap = true;
            }
        } else {
            out.push(c);
            in_gap = false;
        }
    }
    let stripped = out.trim_matches([
        ' ', '\'', '"', '“', '”', '‘', '’', '(', ')', '[', ']', '{', '}', '«', '»',
    ]);
    stripped.to_string()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Merge-key normalization of a sentence or headword; shares the headword
/// key rules (Serbian folding included, a no-op for Latin text).
fn normalise(text: &str) -> String {
    normalize::key(&clean_text(text), true)
}

/// Open a tatoeba export, transparently unpacking `.bz2` and `.tar.bz2`.
fn with_export_reader<F>(path: &std::path::Path, member_prefix: &str, mut read: F) -> Result<()>
where
    F: FnMut(&mut dyn BufRead) -> Result<()>,
{
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if name.ends_with(".tar.bz2") {
        let decoder = bzip2::read::BzDecoder::new(File::open(path)?);
        let mut archive = tar::Archive::new(decoder);
        for entry in archive.entries()? {
            let entry = entry?;
            let member_name = entry
                .path()?
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_lowercase();
            if member_name.starts_with(member_prefix)
                && (member_name.ends_with(".csv") || member_name.ends_with(".tsv"))
            {
                let mut reader = BufReader::new(entry);
                return read(&mut reader);
            }
        }
        Ok(())
    } else if name.ends_with(".bz2") {
        let mut reader = BufReader::new(bzip2::read::BzDecoder::new(File::open(path)?));
        read(&mut reader)
    } else {
        let mut reader = BufReader::new(File::open(path)?);
        read(&mut reader)
    }
}

fn iter_rows(reader: &mut dyn BufRead, mut row: impl FnMut(Vec<&str>)) -> Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = if trimmed.contains('\t') {
            trimmed.split('\t').collect()
        } else {
            trimmed.split(',').collect()
        };
        row(fields);
    }
    Ok(())
}

/// Rows are `id <tab> lang <tab> text`; only matching-language, short,
/// non-empty sentences are kept.
fn read_sentence_rows(
    reader: &mut dyn BufRead,
    lang_code: &str,
    sentences: &mut Map<String, String>,
) -> Result<()> {
    iter_rows(reader, |fields| {
        if fields.len() < 3 {
            return;
        }
        let (id, lang, text) = (fields[0], fields[1], fields[2]);
        if !lang.eq_ignore_ascii_case(lang_code) {
            return;
        }
        let cleaned = clean_text(text);
        if cleaned.is_empty() || word_count(&cleaned) > MAX_WORDS {
            return;
        }
        sentences.insert(id.to_string(), cleaned);
    })
}

/// Rows are `source_id <tab> target_id`.
fn read_link_rows(reader: &mut dyn BufRead, links: &mut Map<String, Set<String>>) -> Result<()> {
    iter_rows(reader, |fields| {
        if fields.len() < 2 {
            return;
        }
        links
            .entry(fields[0].to_string())
            .or_default()
            .insert(fields[1].to_string());
    })
}
