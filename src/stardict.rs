//! FreeDict StarDict source.
//!
//! Resolves a `<src>-<tgt>` pair directory on download.freedict.org, picks
//! the newest published version, downloads and extracts the `.tar.xz`
//! archive, and parses the StarDict triplet (`.ifo`, `.idx[.gz]`,
//! `.dict[.dz]`) into the canonical entry shape. When no direct pair exists
//! the source chains through English.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use flate2::read::GzDecoder;
use regex::Regex;

use crate::download::{fetch, fetch_text, probe};
use crate::error::{ChainError, DownloadError};
use crate::lang::freedict_code;
use crate::models::{Entry, Sense};
use crate::path::{CacheLayout, slug};
use crate::progress::ProgressReporter;
use crate::{DictionarySource, Map};

const FREEDICT_BASE_URL: &str = "https://download.freedict.org/dictionaries";
const PIVOT_LANG: &str = "English";

// Both dotted semver ("0.2") and date versions ("2023.09.10") sort
// lexicographically here, matching the directory listing.
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([0-9]+(?:\.[0-9]+)*)/""#).unwrap());
static TAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*\.tar\.xz)""#).unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

const FALLBACK_VERSIONS: &[&str] = &[
    "2024.12.18",
    "2024.09.10",
    "2024.04.22",
    "2023.12.18",
    "2023.09.10",
    "2023.04.22",
    "2022.12.18",
    "2022.09.10",
    "0.2",
    "0.1.3",
    "0.1.2",
    "0.1.1",
    "0.1",
    "1.0",
    "1.3",
];

pub struct StarDictSource<'a> {
    layout: CacheLayout,
    reporter: &'a dyn ProgressReporter,
    /// Root of the FreeDict download tree. Points at the official mirror;
    /// overridable for mirrors and offline fixtures.
    pub base_url: String,
}

impl<'a> StarDictSource<'a> {
    pub fn new(layout: CacheLayout, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            layout,
            reporter,
            base_url: FREEDICT_BASE_URL.to_string(),
        }
    }

    fn pair_code(&self, in_lang: &str, out_lang: &str) -> Result<String, DownloadError> {
        let in_code = freedict_code(in_lang).ok_or_else(|| {
            DownloadError::new(self.base_url.clone(), format!("no freedict code for {in_lang}"))
        })?;
        let out_code = freedict_code(out_lang).ok_or_else(|| {
            DownloadError::new(self.base_url.clone(), format!("no freedict code for {out_lang}"))
        })?;
        Ok(format!("{in_code}-{out_code}"))
    }

    /// Parsed entries of one bilingual pair, in index order.
    fn load_pair_entries(&self, in_lang: &str, out_lang: &str) -> Result<Vec<Entry>> {
        let pair = self.pair_code(in_lang, out_lang)?;
        let dict_dir = self.ensure_dictionary(&pair)?;
        tracing::info!("parsing stardict files from {}", dict_dir.display());
        parse_stardict_dir(&dict_dir, in_lang)
    }

    fn direct_pair(&self, in_lang: &str, out_lang: &str) -> Result<(PathBuf, u64)> {
        let entries = self.load_pair_entries(in_lang, out_lang)?;
        let cache_key = format!("{}__{}", slug(in_lang), slug(out_lang));
        let path = self.write_entries(&cache_key, &entries)?;
        Ok((path, entries.len() as u64))
    }

    /// Compose `in_lang -> English -> out_lang`. Cached per pair; any leg
    /// failure is a `ChainError` (recoverable for the assembler).
    fn chained_pair(&self, in_lang: &str, out_lang: &str) -> Result<(PathBuf, u64)> {
        let cache_key = format!("{}__{}__chained", slug(in_lang), slug(out_lang));
        let cached = self.layout.path_stardict_entries(&cache_key);
        if cached.exists() {
            let count = BufReader::new(File::open(&cached)?)
                .lines()
                .count() as u64;
            return Ok((cached, count));
        }

        tracing::info!("attempting chained translation {in_lang} -> {PIVOT_LANG} -> {out_lang}");

        let first = self.load_pair_entries(in_lang, PIVOT_LANG).map_err(|e| {
            ChainError::new(format!("cannot chain {in_lang} -> {PIVOT_LANG} -> {out_lang}: {e}"))
        })?;
        let second = self.load_pair_entries(PIVOT_LANG, out_lang).map_err(|e| {
            ChainError::new(format!("cannot chain {in_lang} -> {PIVOT_LANG} -> {out_lang}: {e}"))
        })?;

        let chained = chain_entries(&first, &second);
        let path = self.write_entries(&cache_key, &chained)?;
        Ok((path, chained.len() as u64))
    }

    fn write_entries(&self, cache_key: &str, entries: &[Entry]) -> Result<PathBuf> {
        let path = self.layout.path_stardict_entries(cache_key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        for entry in entries {
            writeln!(writer, "{}", serde_json::to_string(entry)?)?;
        }
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Directory containing the extracted StarDict triplet for `pair`,
    /// downloading and extracting on first use.
    fn ensure_dictionary(&self, pair: &str) -> Result<PathBuf> {
        let pair_dir = self.layout.dir_stardict_pair(pair);
        if pair_dir.exists() {
            let mut versions: Vec<PathBuf> = fs::read_dir(&pair_dir)?
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            versions.sort();
            if let Some(latest) = versions.last()
                && let Some(found) = find_stardict_dir(latest)
            {
                tracing::debug!("using cached {pair}");
                return Ok(found);
            }
        }

        let version = self.find_latest_version(pair)?;
        let archive = self.layout.path_stardict_archive(pair, &version);
        if !archive.exists() {
            let url = self.resolve_archive_url(pair, &version)?;
            fetch(&url, &archive, self.reporter)?;
        }

        let extract_dir = self.layout.dir_stardict_version(pair, &version);
        fs::create_dir_all(&extract_dir)?;
        let reader = xz2::read::XzDecoder::new(File::open(&archive)?);
        tar::Archive::new(reader)
            .unpack(&extract_dir)
            .map_err(|e| {
                DownloadError::new(
                    format!("{}/{pair}/{version}/", self.base_url),
                    format!("failed to extract {}: {e}", archive.display()),
                )
            })?;

        find_stardict_dir(&extract_dir).ok_or_else(|| {
            DownloadError::new(
                format!("{}/{pair}/{version}/", self.base_url),
                format!("no stardict files found under {}", extract_dir.display()),
            )
            .into()
        })
    }

    /// Newest published version of a pair: parse the directory listing, or
    /// probe a fixed fallback list when the listing is unavailable.
    fn find_latest_version(&self, pair: &str) -> Result<String, DownloadError> {
        let index_url = format!("{}/{pair}/", self.base_url);
        match fetch_text(&index_url) {
            Ok(html) => {
                if let Some(version) = latest_version_in_listing(&html) {
                    return Ok(version);
                }
            }
            Err(e) => tracing::warn!("could not fetch version listing for {pair}: {e}"),
        }

        for version in FALLBACK_VERSIONS {
            if probe(&format!("{}/{pair}/{version}/", self.base_url)) {
                return Ok((*version).to_string());
            }
        }

        Err(DownloadError::new(
            index_url,
            format!("no published version found for {pair}"),
        ))
    }

    /// Archive URL inside a version directory: parse hrefs for `.tar.xz`
    /// (preferring names containing "stardict"), then probe known filename
    /// templates. No silent success beyond these.
    fn resolve_archive_url(&self, pair: &str, version: &str) -> Result<String, DownloadError> {
        let version_url = format!("{}/{pair}/{version}/", self.base_url);

        match fetch_text(&version_url) {
            Ok(html) => {
                if let Some(name) = pick_tar_href(&html) {
                    return Ok(format!("{version_url}{name}"));
                }
            }
            Err(e) => tracing::warn!("could not fetch archive listing for {pair}: {e}"),
        }

        let candidates = [
            format!("freedict-{pair}.tar.xz"),
            format!("{pair}.tar.xz"),
            format!("freedict-{pair}-{version}.tar.xz"),
        ];
        for name in &candidates {
            let url = format!("{version_url}{name}");
            if probe(&url) {
                return Ok(url);
            }
        }

        Err(DownloadError::new(
            version_url,
            format!("no downloadable archive found for {pair} {version}"),
        ))
    }
}

impl DictionarySource for StarDictSource<'_> {
    fn ensure_download_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.layout.dir_stardict())?;
        fs::create_dir_all(self.layout.dir_stardict_downloads())?;
        Ok(())
    }

    /// Direct pair, falling back to English-pivot chaining when the direct
    /// archive cannot be obtained.
    fn get_entries(&mut self, in_lang: &str, out_lang: &str) -> Result<(PathBuf, u64)> {
        self.ensure_download_dirs()?;
        match self.direct_pair(in_lang, out_lang) {
            Ok(result) => Ok(result),
            Err(e) if e.downcast_ref::<DownloadError>().is_some() => {
                tracing::warn!("no direct stardict pair for {in_lang} -> {out_lang}: {e}");
                self.chained_pair(in_lang, out_lang)
            }
            Err(e) => Err(e),
        }
    }
}

pub fn latest_version_in_listing(html: &str) -> Option<String> {
    VERSION_RE
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .max()
}

pub fn pick_tar_href(html: &str) -> Option<String> {
    let hrefs: Vec<String> = TAR_RE.captures_iter(html).map(|c| c[1].to_string()).collect();
    hrefs
        .iter()
        .find(|h| h.to_lowercase().contains("stardict"))
        .or_else(|| hrefs.first())
        .cloned()
}

#[derive(Debug)]
struct StarDictFiles {
    ifo: PathBuf,
    idx: PathBuf,
    dict: PathBuf,
}

fn stardict_files(dir: &Path) -> Option<StarDictFiles> {
    let ifo = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|e| e == "ifo"))?;

    // Base names routinely contain dots ("freedict-srp-eng-0.2.ifo"), so
    // sibling paths are built on the full string, not Path::with_extension.
    let base = ifo.to_str()?.strip_suffix(".ifo")?.to_string();

    let idx = [format!("{base}.idx"), format!("{base}.idx.gz")]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())?;
    let dict = [format!("{base}.dict.dz"), format!("{base}.dict")]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())?;

    Some(StarDictFiles { ifo, idx, dict })
}

/// The directory holding the triplet: the root itself, or the first
/// subdirectory (archives usually nest one or two levels).
fn find_stardict_dir(root: &Path) -> Option<PathBuf> {
    if stardict_files(root).is_some() {
        return Some(root.to_path_buf());
    }
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).ok()?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if stardict_files(&path).is_some() {
                    return Some(path);
                }
                stack.push(path);
            }
        }
    }
    None
}

/// Line-oriented `key=value` metadata from the `.ifo` file.
pub fn read_ifo_metadata(path: &Path) -> Result<Map<String, String>> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let mut metadata = Map::default();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(metadata)
}

/// UTF-8 with latin-1 fallback, the index encoding convention.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Records of a `.idx` blob: NUL-terminated word, big-endian u32 offset,
/// big-endian u32 size. Truncated trailing records are ignored.
pub fn parse_index_bytes(data: &[u8]) -> Vec<(String, u32, u32)> {
    let mut index = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let Some(nul) = data[pos..].iter().position(|&b| b == 0) else {
            break;
        };
        let word = decode_text(&data[pos..pos + nul]);
        let numbers_at = pos + nul + 1;
        if numbers_at + 8 > data.len() {
            break;
        }
        let offset = u32::from_be_bytes(data[numbers_at..numbers_at + 4].try_into().unwrap());
        let size = u32::from_be_bytes(data[numbers_at + 4..numbers_at + 8].try_into().unwrap());
        index.push((word, offset, size));
        pos = numbers_at + 8;
    }
    index
}

fn read_maybe_gz(path: &Path, gz: bool) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    if gz {
        GzDecoder::new(File::open(path)?).read_to_end(&mut data)?;
    } else {
        File::open(path)?.read_to_end(&mut data)?;
    }
    Ok(data)
}

pub fn read_index(path: &Path) -> Result<Vec<(String, u32, u32)>> {
    let gz = path.extension().is_some_and(|e| e == "gz");
    Ok(parse_index_bytes(&read_maybe_gz(path, gz)?))
}

/// `word -> definition` in index order; dictzip blobs are plain gzip.
pub fn read_definitions(
    dict_path: &Path,
    index: &[(String, u32, u32)],
) -> Result<Map<String, String>> {
    let dz = dict_path.extension().is_some_and(|e| e == "dz");
    let blob = read_maybe_gz(dict_path, dz)?;

    let mut definitions = Map::default();
    for (word, offset, size) in index {
        let start = *offset as usize;
        let end = start + *size as usize;
        if end > blob.len() {
            continue;
        }
        let definition = decode_text(&blob[start..end]);
        definitions.insert(word.clone(), definition.trim().to_string());
    }
    Ok(definitions)
}

/// Glosses from one definition string: strip HTML tags, split on `;`, `|`
/// or newlines, trim, drop empties; fall back to the whole stripped text.
pub fn extract_glosses(definition: &str) -> Vec<String> {
    let text = HTML_TAG_RE.replace_all(definition, "");
    let glosses: Vec<String> = text
        .split(|c| matches!(c, ';' | '|' | '\n'))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    if glosses.is_empty() {
        let whole = text.trim();
        if whole.is_empty() {
            Vec::new()
        } else {
            vec![whole.to_string()]
        }
    } else {
        glosses
    }
}

/// Parse an extracted StarDict directory into canonical entries.
///
/// One entry per index word, in file order; content-free entries are
/// dropped. Headwords keep their source script; surface rewriting happens
/// once, in the assembler's merge step.
pub fn parse_stardict_dir(dict_dir: &Path, in_lang: &str) -> Result<Vec<Entry>> {
    let files = stardict_files(dict_dir).ok_or_else(|| {
        DownloadError::new(
            dict_dir.display().to_string(),
            "missing .ifo/.idx/.dict files",
        )
    })?;

    let metadata = read_ifo_metadata(&files.ifo)?;
    tracing::debug!(
        "stardict '{}', {} words declared",
        metadata.get("bookname").map_or("?", |s| s.as_str()),
        metadata.get("wordcount").map_or("?", |s| s.as_str()),
    );

    let index = read_index(&files.idx)?;
    let definitions = read_definitions(&files.dict, &index)?;

    let mut entries = Vec::with_capacity(definitions.len());
    for (word, definition) in &definitions {
        let glosses = extract_glosses(definition);
        let entry = Entry {
            word: word.clone(),
            language: in_lang.to_string(),
            senses: vec![Sense {
                glosses: glosses.clone(),
                raw_glosses: glosses,
                ..Default::default()
            }],
            ..Default::default()
        };
        if entry.has_content() {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Compose two bilingual corpora through their shared pivot: glosses of
/// `first` are looked up (lowercased) as headwords of `second`; the union of
/// hits becomes the chained entry's sorted gloss list.
pub fn chain_entries(first: &[Entry], second: &[Entry]) -> Vec<Entry> {
    let mut pivot_map: Map<String, Vec<String>> = Map::default();
    for entry in second {
        if entry.word.is_empty() {
            continue;
        }
        let glosses: Vec<String> = entry
            .senses
            .iter()
            .flat_map(|s| s.glosses.iter().cloned())
            .collect();
        if !glosses.is_empty() {
            pivot_map.insert(entry.word.to_lowercase(), glosses);
        }
    }

    let mut chained = Vec::new();
    for entry in first {
        let mut final_glosses: std::collections::BTreeSet<String> = Default::default();
        for sense in &entry.senses {
            for pivot_word in &sense.glosses {
                if let Some(glosses) = pivot_map.get(pivot_word.to_lowercase().trim()) {
                    final_glosses.extend(glosses.iter().cloned());
                }
            }
        }
        if final_glosses.is_empty() {
            continue;
        }
        let glosses: Vec<String> = final_glosses.into_iter().collect();
        chained.push(Entry {
            word: entry.word.clone(),
            language: entry.language.clone(),
            senses: vec![Sense {
                glosses: glosses.clone(),
                raw_glosses: glosses,
                ..Default::default()
            }],
            ..Default::default()
        });
    }
    chained
}
