use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use wtk::kaikki::{KaikkiSource, RAW_DUMP_BASENAME, SubsetMeta};
use wtk::models::Entry;
use wtk::path::CacheLayout;
use wtk::progress::NoopProgress;
use wtk::tatoeba::TatoebaExamples;
use wtk::translit::contains_cyrillic;
use wtk::{AssembleOptions, Assembler};

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

fn write_language_dataset(layout: &CacheLayout, language: &str, lines: &[&str]) {
    let path = layout.path_language_dataset(language);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

/// Lay out an extracted StarDict triplet so the source finds it cached and
/// never goes to the network.
fn write_stardict_pair(layout: &CacheLayout, pair: &str, records: &[(&str, &str)]) {
    let dir = layout.dir_stardict_version(pair, "2024.12.18");
    fs::create_dir_all(&dir).unwrap();

    let mut blob: Vec<u8> = Vec::new();
    let mut index: Vec<u8> = Vec::new();
    for (word, definition) in records {
        let offset = blob.len() as u32;
        blob.extend_from_slice(definition.as_bytes());
        let size = definition.len() as u32;

        index.extend_from_slice(word.as_bytes());
        index.push(0);
        index.extend_from_slice(&offset.to_be_bytes());
        index.extend_from_slice(&size.to_be_bytes());
    }

    let base = dir.join(pair);
    fs::write(base.with_extension("dict"), &blob).unwrap();
    fs::write(base.with_extension("idx"), &index).unwrap();
    fs::write(
        base.with_extension("ifo"),
        format!("StarDict's dict ifo file\nbookname={pair}\nwordcount={}\n", records.len()),
    )
    .unwrap();
}

fn read_entries(path: &Path) -> Vec<Entry> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn kaikki_filter_writes_subset_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());
    write_gz_dump(
        &layout,
        &[
            r#"{"language":"Icelandic","word":"hús"}"#,
            r#"{"language":"English","word":"story"}"#,
        ],
    );

    let source = KaikkiSource::new(layout.clone(), &NoopProgress);
    let (path, count) = source.ensure_filtered_language("Icelandic").unwrap();
    assert_eq!(count, 1);

    let entries = read_entries(&path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].word, "hús");

    let meta: SubsetMeta = serde_json::from_str(
        &fs::read_to_string(layout.path_filtered_meta("Icelandic")).unwrap(),
    )
    .unwrap();
    assert_eq!(meta.count, 1);

    // calling again returns the same cached result
    let (path2, count2) = source.ensure_filtered_language("Icelandic").unwrap();
    assert_eq!(path, path2);
    assert_eq!(count, count2);
}

/// Full Serbian -> Russian assembly: cluster expansion, gloss retargeting
/// through the English translation map, StarDict merging across scripts,
/// and Tatoeba enrichment.
#[test]
fn serbian_russian_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());

    write_gz_dump(
        &layout,
        &[
            r#"{"language":"Serbo-Croatian","word":"кућа","senses":[{"glosses":["house"],"links":[["house","house#English"]],"examples":[{"text":"Кућа је велика.","translation":"The house is big."}]}]}"#,
            r#"{"language":"Serbo-Croatian","word":"прича","senses":[{"glosses":["story; tale"]}]}"#,
        ],
    );
    write_language_dataset(
        &layout,
        "English",
        &[
            r#"{"word":"house","senses":[{"translations":[{"lang":"Russian","word":"дом"}]}]}"#,
            r#"{"word":"story","senses":[{"translations":[{"lang":"Russian","word":"рассказ"}]}]}"#,
        ],
    );

    // direct pairs for both cluster members; no chaining needed
    write_stardict_pair(&layout, "srp-rus", &[("кућа", "дом; здание")]);
    write_stardict_pair(&layout, "hrv-rus", &[("kuća", "дом")]);

    // pre-built pair cache keyed like the provider builds it
    let pairs_cache = layout
        .dir_tatoeba()
        .join("hrv-srp__rus")
        .join("pairs.json");
    fs::create_dir_all(pairs_cache.parent().unwrap()).unwrap();
    fs::write(
        &pairs_cache,
        r#"{"kuća":[["Кућа је велика.","Дом большой."]]}"#,
    )
    .unwrap();

    let mut provider = TatoebaExamples::new("srp", "rus", &layout, &NoopProgress);
    let mut assembler = Assembler::new(layout.clone(), &NoopProgress, true);
    let options = AssembleOptions {
        quiet: true,
        ..Default::default()
    };

    let (combined_path, stats) = assembler
        .assemble("Serbian", "Russian", Some(&mut provider), &options)
        .unwrap();

    let entries = read_entries(&combined_path);
    assert_eq!(entries.len(), 2);

    // кућа: kaikki entry retargeted to ["дом"], stardict senses merged in
    let kuca = &entries[0];
    assert_eq!(kuca.word, "kuća");
    assert_eq!(kuca.source.as_deref(), Some("kaikki"));
    assert_eq!(kuca.senses.len(), 2);
    assert_eq!(kuca.senses[0].glosses, vec!["дом"]);
    assert_eq!(kuca.senses[0].raw_glosses, vec!["дом"]);
    assert_eq!(kuca.senses[1].glosses, vec!["дом", "здание"]);

    // examples: the kaikki pair plus the tatoeba pair, transliterated; the
    // texts coincide but the translations differ, so both pairs survive
    let examples = &kuca.senses[0].examples;
    assert_eq!(examples.len(), 2);
    assert!(examples.iter().all(|e| e.text == "Kuća je velika."));
    assert_eq!(examples[0].translation, "The house is big.");
    assert_eq!(examples[1].translation, "Дом большой.");

    // прича: retargeted through the "story" prefix lookup
    let prica = &entries[1];
    assert_eq!(prica.word, "priča");
    assert_eq!(prica.senses[0].glosses, vec!["рассказ"]);

    // serbian mode: no cyrillic survives in words or example texts
    for entry in &entries {
        assert!(!contains_cyrillic(&entry.word), "{}", entry.word);
        for sense in &entry.senses {
            for example in &sense.examples {
                assert!(!contains_cyrillic(&example.text), "{}", example.text);
            }
        }
    }

    assert_eq!(stats.kaikki_total, 2);
    assert_eq!(stats.kaikki_unique, 2);
    assert_eq!(stats.tatoeba_total, 1);
    assert_eq!(stats.overlap, 1);
    assert_eq!(stats.tatoeba_unique, 0);
    assert_eq!(stats.enriched_from_tatoeba, 1);
    assert_eq!(stats.final_headword_count, 2);

    // identical inputs => byte-identical output
    let first = fs::read(&combined_path).unwrap();
    let mut provider = TatoebaExamples::new("srp", "rus", &layout, &NoopProgress);
    let (combined_path_2, _) = assembler
        .assemble("Serbian", "Russian", Some(&mut provider), &options)
        .unwrap();
    assert_eq!(combined_path, combined_path_2);
    assert_eq!(first, fs::read(&combined_path_2).unwrap());
}

/// English targets skip gloss retargeting entirely.
#[test]
fn english_target_keeps_glosses() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());
    write_gz_dump(
        &layout,
        &[r#"{"language":"Serbo-Croatian","word":"кућа","senses":[{"glosses":["house"]}]}"#],
    );

    let mut assembler = Assembler::new(layout.clone(), &NoopProgress, false);
    let (combined_path, _) = assembler
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

    let entries = read_entries(&combined_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].word, "kuća");
    assert_eq!(entries[0].senses[0].glosses, vec!["house"]);
    // no localized sibling was produced
    let localized: Vec<_> = fs::read_dir(layout.dir_filtered())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().contains("__to_"))
        .collect();
    assert!(localized.is_empty());
}

/// No direct Serbian-Russian archive exists: the source composes the cached
/// Serbian-English and English-Russian pairs through the pivot instead.
#[test]
fn missing_direct_pair_chains_through_english() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());

    write_gz_dump(
        &layout,
        &[
            r#"{"language":"Serbo-Croatian","word":"кућа","senses":[{"glosses":["house"],"links":[["house","house#English"]]}]}"#,
        ],
    );
    write_language_dataset(
        &layout,
        "English",
        &[r#"{"word":"house","senses":[{"translations":[{"lang":"Russian","word":"дом"}]}]}"#],
    );

    // only the pivot legs are available on disk
    write_stardict_pair(&layout, "srp-eng", &[("кућа", "house")]);
    write_stardict_pair(&layout, "hrv-eng", &[]);
    write_stardict_pair(&layout, "eng-rus", &[("house", "дом")]);

    let mut assembler = Assembler::new(layout.clone(), &NoopProgress, true);
    // direct srp-rus / hrv-rus lookups hit a dead endpoint and fail fast
    assembler
        .stardict
        .as_mut()
        .unwrap()
        .base_url = "http://127.0.0.1:1/dictionaries".to_string();

    let (combined_path, stats) = assembler
        .assemble(
            "Serbian",
            "Russian",
            None,
            &AssembleOptions {
                quiet: true,
                ..Default::default()
            },
        )
        .unwrap();

    // the chained cache keeps the source-script headword
    let chained = read_entries(&layout.path_stardict_entries("Serbian__Russian__chained"));
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].word, "кућа");
    assert_eq!(chained[0].senses[0].glosses, vec!["дом"]);
    assert_eq!(chained[0].senses[0].raw_glosses, vec!["дом"]);

    let entries = read_entries(&combined_path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].word, "kuća");
    assert!(entries[0].senses.iter().any(|s| s.glosses == vec!["дом"]));

    let stardict_counts: Vec<(&str, u64)> = stats
        .source_counts
        .iter()
        .filter(|c| c.source == "stardict")
        .map(|c| (c.language.as_str(), c.count))
        .collect();
    assert_eq!(stardict_counts, vec![("Croatian", 0), ("Serbian", 1)]);
}

/// A StarDict-only word enters the corpus as its own entry.
#[test]
fn stardict_contributes_new_headwords() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());
    write_gz_dump(
        &layout,
        &[r#"{"language":"Serbo-Croatian","word":"кућа","senses":[{"glosses":["house"]}]}"#],
    );
    write_stardict_pair(&layout, "srp-eng", &[("стан", "apartment | flat")]);
    write_stardict_pair(&layout, "hrv-eng", &[]);

    let mut assembler = Assembler::new(layout.clone(), &NoopProgress, true);
    let (combined_path, _) = assembler
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

    let entries = read_entries(&combined_path);
    let words: Vec<&str> = entries.iter().map(|e| e.word.as_str()).collect();
    assert_eq!(words, vec!["kuća", "stan"]);

    let stan = &entries[1];
    assert_eq!(stan.source.as_deref(), Some("stardict"));
    assert_eq!(stan.senses[0].glosses, vec!["apartment", "flat"]);
}
