pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod kaikki;
pub mod kindle;
pub mod lang;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod path;
pub mod progress;
pub mod stardict;
pub mod tatoeba;
pub mod translit;
pub mod utils;

use anyhow::Result;
use fxhash::FxBuildHasher;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::error::ChainError;
use crate::kaikki::KaikkiSource;
use crate::merge::{append_examples, dedup_entry, merge_into};
use crate::models::{Entry, Example, Sense};
use crate::path::CacheLayout;
use crate::progress::ProgressReporter;
use crate::stardict::StarDictSource;
use crate::tatoeba::ExampleProvider;
use crate::utils::{CHECK_C, WARN_C, pretty_println_at_path};

pub type Map<K, V> = IndexMap<K, V, FxBuildHasher>; // Preserve insertion order
pub type Set<K> = IndexSet<K, FxBuildHasher>;

/// Capability shared by the dictionary sources: each one can materialize a
/// per-language corpus on disk and report how many entries it holds.
pub trait DictionarySource {
    fn ensure_download_dirs(&self) -> Result<()>;
    fn get_entries(&mut self, in_lang: &str, out_lang: &str) -> Result<(PathBuf, u64)>;
}

#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Keep only the first n headwords in insertion order. <= 0 keeps all.
    pub max_entries: i64,
    pub quiet: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct SourceCount {
    pub source: &'static str,
    pub language: String,
    pub count: u64,
}

/// Assembly report returned alongside the combined corpus path.
#[derive(Debug, Serialize, Clone, Default)]
pub struct Stats {
    pub kaikki_total: u64,
    pub kaikki_unique: u64,
    pub tatoeba_total: u64,
    pub tatoeba_unique: u64,
    pub overlap: u64,
    pub enriched_from_tatoeba: u64,
    pub final_headword_count: u64,
    pub source_counts: Vec<SourceCount>,
}

struct CorpusRecord {
    source: &'static str,
    language: String,
    path: PathBuf,
    count: u64,
}

pub struct Assembler<'a> {
    layout: CacheLayout,
    pub kaikki: KaikkiSource<'a>,
    pub stardict: Option<StarDictSource<'a>>,
}

impl<'a> Assembler<'a> {
    pub fn new(
        layout: CacheLayout,
        reporter: &'a dyn ProgressReporter,
        with_stardict: bool,
    ) -> Self {
        let kaikki = KaikkiSource::new(layout.clone(), reporter);
        let stardict = with_stardict.then(|| StarDictSource::new(layout.clone(), reporter));
        Self {
            layout,
            kaikki,
            stardict,
        }
    }

    /// Assemble one bilingual corpus.
    ///
    /// Expands the input language across its cluster, ingests every
    /// configured source, merges by headword key, optionally enriches from
    /// an example provider, and persists one JSONL under `combined/`.
    pub fn assemble(
        &mut self,
        in_lang: &str,
        out_lang: &str,
        mut provider: Option<&mut dyn ExampleProvider>,
        options: &AssembleOptions,
    ) -> Result<(PathBuf, Stats)> {
        let expanded = lang::expand_related(in_lang);
        let serbian = lang::serbian_mode(in_lang);
        let mut stats = Stats::default();
        self.kaikki.quiet = options.quiet;

        tracing::debug!("assembling {expanded:?} -> {out_lang} (serbian_mode: {serbian})");

        let mut records = self.ingest(&expanded, out_lang, &mut stats)?;

        // English glosses only help English-target dictionaries.
        if lang::iso_code(out_lang) != Some("en") {
            for record in &mut records {
                if record.source == "kaikki" {
                    record.path =
                        self.kaikki
                            .ensure_translated_glosses(&record.path, "English", out_lang)?;
                }
            }
        }

        let mut index: Map<String, Entry> = Map::default();
        let mut kaikki_keys: Set<String> = Set::default();
        let mut swept: Set<PathBuf> = Set::default();

        for record in &records {
            // cluster members may share one corpus file; sweep it once
            if !swept.insert(record.path.clone()) {
                continue;
            }
            if record.source == "kaikki" {
                stats.kaikki_total += record.count;
            }
            self.sweep_corpus(record, in_lang, serbian, &mut index, &mut kaikki_keys)?;
        }
        stats.kaikki_unique = kaikki_keys.len() as u64;

        if let Some(provider) = provider.take() {
            self.enrich(provider, in_lang, serbian, &mut index, &mut stats)?;
        }

        // the enrichment pass owns deduplication; the bare merge is additive
        for entry in index.values_mut() {
            dedup_entry(entry);
        }

        if options.max_entries > 0 && index.len() as i64 > options.max_entries {
            index.truncate(options.max_entries as usize);
        }
        stats.final_headword_count = index.len() as u64;

        let combined_path = self.persist(&index, &expanded, out_lang)?;
        if !options.quiet {
            pretty_println_at_path(
                &format!("{CHECK_C} Assembled {} headwords", index.len()),
                &combined_path,
            );
        }

        Ok((combined_path, stats))
    }

    fn ingest(
        &mut self,
        expanded: &[String],
        out_lang: &str,
        stats: &mut Stats,
    ) -> Result<Vec<CorpusRecord>> {
        let mut records = Vec::new();

        for language in expanded {
            let (path, count) = self.kaikki.get_entries(language, out_lang)?;
            stats.source_counts.push(SourceCount {
                source: "kaikki",
                language: language.clone(),
                count,
            });
            records.push(CorpusRecord {
                source: "kaikki",
                language: language.clone(),
                path,
                count,
            });
        }

        if let Some(stardict) = &mut self.stardict {
            for language in expanded {
                match stardict.get_entries(language, out_lang) {
                    Ok((path, count)) => {
                        stats.source_counts.push(SourceCount {
                            source: "stardict",
                            language: language.clone(),
                            count,
                        });
                        records.push(CorpusRecord {
                            source: "stardict",
                            language: language.clone(),
                            path,
                            count,
                        });
                    }
                    Err(e) if e.downcast_ref::<ChainError>().is_some() => {
                        tracing::warn!(
                            "{WARN_C} no stardict source for {language} -> {out_lang}: {e}"
                        );
                        stats.source_counts.push(SourceCount {
                            source: "stardict",
                            language: language.clone(),
                            count: 0,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(records)
    }

    /// Stream one corpus file into the index. Malformed lines are skipped
    /// here (retargeted files are rewritten by us, plain ones were already
    /// validated by the filter pass).
    fn sweep_corpus(
        &self,
        record: &CorpusRecord,
        in_lang: &str,
        serbian: bool,
        index: &mut Map<String, Entry>,
        kaikki_keys: &mut Set<String>,
    ) -> Result<()> {
        tracing::debug!(
            "sweeping {} ({} / {})",
            record.path.display(),
            record.source,
            record.language
        );
        let reader = BufReader::new(File::open(&record.path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let Ok(mut entry) = serde_json::from_str::<Entry>(&line) else {
                tracing::debug!("skipping malformed line in {}", record.path.display());
                continue;
            };
            if entry.word.is_empty() {
                continue;
            }

            let key = normalize::key(&entry.word, serbian);
            if key.is_empty() {
                continue;
            }
            entry.word = normalize::display(&entry.word, serbian);

            let label = entry.language_label();
            entry.language = if label.is_empty() {
                in_lang.to_string()
            } else {
                label.to_string()
            };

            if serbian {
                for form in &mut entry.forms {
                    form.form = normalize::display(&form.form, true);
                }
            }
            for sense in &mut entry.senses {
                for example in &mut sense.examples {
                    example.text = normalize::display(&example.text, serbian);
                    example.translation = normalize::display(&example.translation, false);
                }
            }

            if entry.source.is_none() {
                entry.source = Some(record.source.to_string());
            }

            if record.source == "kaikki" {
                kaikki_keys.insert(key.clone());
            }

            match index.get_mut(&key) {
                Some(target) => merge_into(target, entry),
                None => {
                    index.insert(key, entry);
                }
            }
        }
        Ok(())
    }

    fn enrich(
        &self,
        provider: &mut dyn ExampleProvider,
        in_lang: &str,
        serbian: bool,
        index: &mut Map<String, Entry>,
        stats: &mut Stats,
    ) -> Result<()> {
        for entry in index.values_mut() {
            let examples = provider.examples_for(&entry.word)?;
            let gloss = provider.gloss_for(&entry.word)?;
            if examples.is_empty() && gloss.is_none() {
                continue;
            }

            let mut changed = false;
            if entry.senses.is_empty() {
                entry.senses.push(Sense::default());
            }
            let sense = &mut entry.senses[0];

            if let Some(gloss) = gloss
                && sense.glosses.is_empty()
            {
                sense.glosses = vec![gloss.clone()];
                sense.raw_glosses = vec![gloss];
                changed = true;
            }

            let added = append_examples(sense, normalize_examples(examples, serbian));
            if added > 0 {
                changed = true;
            }
            if changed {
                stats.enriched_from_tatoeba += 1;
            }
        }

        let vocab = provider.vocabulary()?;
        stats.tatoeba_total = vocab.len() as u64;

        let mut missing: Vec<String> = vocab
            .iter()
            .filter(|key| !index.contains_key(*key))
            .cloned()
            .collect();
        stats.tatoeba_unique = missing.len() as u64;
        stats.overlap = stats.tatoeba_total - stats.tatoeba_unique;
        missing.sort(); // vocabulary is a set; fix the synthesis order

        for key in missing {
            let examples = provider.examples_for(&key)?;
            let gloss = provider.gloss_for(&key)?;

            let word = examples
                .first()
                .map(|example| example.text.clone())
                .unwrap_or_else(|| key.clone());
            let mut sense = Sense::default();
            if let Some(gloss) = gloss {
                sense.glosses = vec![gloss.clone()];
                sense.raw_glosses = vec![gloss];
            }
            append_examples(&mut sense, normalize_examples(examples, serbian));

            let entry = Entry {
                word: normalize::display(&word, serbian),
                language: in_lang.to_string(),
                senses: vec![sense],
                source: Some("tatoeba".to_string()),
                ..Default::default()
            };
            index.insert(key, entry);
        }

        Ok(())
    }

    fn persist(
        &self,
        index: &Map<String, Entry>,
        expanded: &[String],
        out_lang: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(self.layout.dir_combined())?;
        let combined_path = self.layout.path_combined(expanded, out_lang);
        let tmp_path = combined_path.with_extension("tmp");

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for entry in index.values() {
            writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp_path, &combined_path)?;

        Ok(combined_path)
    }
}

fn normalize_examples(examples: Vec<Example>, serbian: bool) -> Vec<Example> {
    examples
        .into_iter()
        .map(|example| Example {
            text: normalize::display(&example.text, serbian),
            translation: normalize::display(&example.translation, false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write as _;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use crate::kaikki::RAW_DUMP_BASENAME;
    use crate::progress::NoopProgress;

    struct StubProvider {
        mapping: Map<String, (Vec<(String, String)>, Option<String>)>,
    }

    impl StubProvider {
        fn new(entries: &[(&str, &[(&str, &str)], Option<&str>)]) -> Self {
            let mut mapping = Map::default();
            for (key, examples, gloss) in entries {
                mapping.insert(
                    (*key).to_string(),
                    (
                        examples
                            .iter()
                            .map(|(s, t)| ((*s).to_string(), (*t).to_string()))
                            .collect(),
                        gloss.map(str::to_string),
                    ),
                );
            }
            Self { mapping }
        }
    }

    impl ExampleProvider for StubProvider {
        fn vocabulary(&mut self) -> Result<Set<String>> {
            Ok(self.mapping.keys().cloned().collect())
        }

        fn examples_for(&mut self, word: &str) -> Result<Vec<Example>> {
            Ok(self
                .mapping
                .get(&word.to_lowercase())
                .map(|(examples, _)| {
                    examples
                        .iter()
                        .map(|(s, t)| Example::new(s.clone(), t.clone()))
                        .collect()
                })
                .unwrap_or_default())
        }

        fn gloss_for(&mut self, word: &str) -> Result<Option<String>> {
            Ok(self
                .mapping
                .get(&word.to_lowercase())
                .and_then(|(_, gloss)| gloss.clone()))
        }
    }

    fn write_gz_dump(layout: &CacheLayout, lines: &[&str]) {
        let path = layout.path_raw_dump(RAW_DUMP_BASENAME);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::fast());
        for line in lines {
            writeln!(encoder, "{line}").unwrap();
        }
        encoder.finish().unwrap();
    }

    fn read_entries(path: &std::path::Path) -> Vec<Entry> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn enrichment_adopts_gloss_and_examples() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[r#"{"language":"English","word":"House","senses":[{"glosses":[],"examples":[]}]}"#],
        );

        let mut provider = StubProvider::new(&[(
            "house",
            &[("House", "Дом")],
            Some("дом"),
        )]);

        let mut assembler = Assembler::new(layout, &NoopProgress, false);
        let (path, stats) = assembler
            .assemble(
                "English",
                "English",
                Some(&mut provider),
                &AssembleOptions {
                    quiet: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word, "House");
        assert_eq!(entries[0].senses[0].glosses, vec!["дом"]);
        assert_eq!(
            entries[0].senses[0].examples,
            vec![Example::new("House", "Дом")]
        );

        assert_eq!(stats.kaikki_total, 1);
        assert_eq!(stats.kaikki_unique, 1);
        assert_eq!(stats.tatoeba_total, 1);
        assert_eq!(stats.overlap, 1);
        assert_eq!(stats.tatoeba_unique, 0);
        assert_eq!(stats.enriched_from_tatoeba, 1);
        assert_eq!(stats.final_headword_count, 1);
    }

    #[test]
    fn provider_vocabulary_synthesizes_missing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[r#"{"language":"English","word":"story"}"#],
        );

        let mut provider = StubProvider::new(&[(
            "dobar dan",
            &[("Добар дан!", "Good day!")],
            Some("good day"),
        )]);

        let mut assembler = Assembler::new(layout, &NoopProgress, false);
        let (path, stats) = assembler
            .assemble(
                "English",
                "English",
                Some(&mut provider),
                &AssembleOptions {
                    quiet: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 2);
        let synthesized = &entries[1];
        assert_eq!(synthesized.word, "Добар дан!");
        assert_eq!(synthesized.source.as_deref(), Some("tatoeba"));
        assert_eq!(synthesized.senses[0].glosses, vec!["good day"]);
        assert_eq!(stats.tatoeba_unique, 1);
        assert_eq!(stats.overlap, 0);
    }

    #[test]
    fn serbian_cluster_merges_across_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[
                r#"{"language":"Serbo-Croatian","word":"кућа","senses":[{"glosses":["house"],"examples":[{"text":"Кућа је велика.","translation":"The house is big."}]}]}"#,
                r#"{"language":"Serbo-Croatian","word":"Kuća","senses":[{"glosses":["home"],"examples":[{"text":"Kuća je velika.","translation":"The house is big."}]}]}"#,
            ],
        );

        let mut assembler = Assembler::new(layout, &NoopProgress, false);
        let (path, stats) = assembler
            .assemble(
                "Serbian",
                "English",
                None,
                &AssembleOptions {
                    quiet: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.word, "kuća");
        assert_eq!(entry.senses.len(), 2);
        // the transliterated and latin examples collapse into one pair
        let examples: Vec<&Example> = entry
            .senses
            .iter()
            .flat_map(|s| s.examples.iter())
            .collect();
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].text, "Kuća je velika.");

        // the cluster shares one filtered corpus; it is swept exactly once
        assert_eq!(stats.kaikki_total, 2);
        assert_eq!(stats.final_headword_count, 1);
    }

    #[test]
    fn chain_failure_demotes_stardict_to_zero_count() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[r#"{"language":"Serbo-Croatian","word":"кућа","senses":[{"glosses":["house"]}]}"#],
        );

        let mut assembler = Assembler::new(layout, &NoopProgress, true);
        // nothing answers here, so the direct pair and both pivot legs fail;
        // get_entries surfaces that as a ChainError
        assembler
            .stardict
            .as_mut()
            .unwrap()
            .base_url = "http://127.0.0.1:1/dictionaries".to_string();

        let (path, stats) = assembler
            .assemble(
                "Serbian",
                "English",
                None,
                &AssembleOptions {
                    quiet: true,
                    ..Default::default()
                },
            )
            .unwrap();

        // assembly survives on the kaikki corpus alone
        let entries = read_entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word, "kuća");

        let stardict_counts: Vec<&SourceCount> = stats
            .source_counts
            .iter()
            .filter(|c| c.source == "stardict")
            .collect();
        assert_eq!(stardict_counts.len(), 2);
        assert!(stardict_counts.iter().all(|c| c.count == 0));
    }

    #[test]
    fn out_of_charset_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[
                r#"{"language":"English","word":"???"}"#,
                r#"{"language":"English","word":"kept"}"#,
            ],
        );

        let mut assembler = Assembler::new(layout, &NoopProgress, false);
        let (path, _) = assembler
            .assemble(
                "English",
                "English",
                None,
                &AssembleOptions {
                    quiet: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].word, "kept");
    }

    #[test]
    fn max_entries_caps_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[
                r#"{"language":"English","word":"alpha"}"#,
                r#"{"language":"English","word":"beta"}"#,
                r#"{"language":"English","word":"gamma"}"#,
            ],
        );

        let mut assembler = Assembler::new(layout, &NoopProgress, false);
        let (path, stats) = assembler
            .assemble(
                "English",
                "English",
                None,
                &AssembleOptions {
                    max_entries: 2,
                    quiet: true,
                },
            )
            .unwrap();

        let entries = read_entries(&path);
        assert_eq!(stats.final_headword_count, 2);
        assert_eq!(
            entries.iter().map(|e| e.word.as_str()).collect::<Vec<_>>(),
            vec!["alpha", "beta"]
        );
    }

    #[test]
    fn assembly_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        write_gz_dump(
            &layout,
            &[
                r#"{"language":"English","word":"alpha","senses":[{"glosses":["a"]}]}"#,
                r#"{"language":"English","word":"beta","senses":[{"glosses":["b"]}]}"#,
            ],
        );

        let mut assembler = Assembler::new(layout, &NoopProgress, false);
        let options = AssembleOptions {
            quiet: true,
            ..Default::default()
        };
        let (path1, _) = assembler
            .assemble("English", "English", None, &options)
            .unwrap();
        let first = fs::read(&path1).unwrap();

        let (path2, _) = assembler
            .assemble("English", "English", None, &options)
            .unwrap();
        let second = fs::read(&path2).unwrap();

        assert_eq!(path1, path2);
        assert_eq!(first, second);
    }
}
