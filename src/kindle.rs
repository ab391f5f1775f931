//! Kindle packaging boundary.
//!
//! Assembly ends at a corpus artifact; everything Kindle-specific (locale
//! resolution, OPF metadata patching, invoking the external `kindlegen`
//! binary) lives behind the `Packager` trait so the core never interprets
//! another tool's behavior.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PackagingError;

/// Locale codes the Kindle firmware accepts in dictionary metadata.
pub const KINDLE_SUPPORTED_LANGS: &[&str] = &[
    "af", "sq", "ar", "ar-dz", "ar-bh", "ar-eg", "ar-iq", "ar-jo", "ar-kw", "ar-lb", "ar-ly",
    "ar-ma", "ar-om", "ar-qa", "ar-sa", "ar-sy", "ar-tn", "ar-ae", "ar-ye", "hy", "az", "eu",
    "be", "bn", "bg", "ca", "zh", "zh-hk", "zh-cn", "zh-sg", "zh-tw", "hr", "cs", "da", "nl",
    "nl-be", "en", "en-au", "en-bz", "en-ca", "en-ie", "en-jm", "en-nz", "en-ph", "en-za",
    "en-tt", "en-gb", "en-us", "en-zw", "et", "fo", "fa", "fi", "fr", "fr-be", "fr-ca", "fr-lu",
    "fr-mc", "fr-ch", "ka", "de", "de-at", "de-li", "de-lu", "de-ch", "el", "gu", "he", "hi",
    "hu", "is", "id", "it", "it-ch", "ja", "kn", "kk", "x-kok", "ko", "lv", "lt", "mk", "ms",
    "ms-bn", "ml", "mt", "mr", "ne", "no", "no-bok", "no-nyn", "or", "pl", "pt", "pt-br", "pa",
    "rm", "ro", "ro-mo", "ru", "ru-mo", "sz", "sa", "sr-latn", "sk", "sl", "sb", "es", "es-ar",
    "es-bo", "es-cl", "es-co", "es-cr", "es-do", "es-ec", "es-sv", "es-gt", "es-hn", "es-mx",
    "es-ni", "es-pa", "es-py", "es-pe", "es-pr", "es-uy", "es-ve", "sx", "sw", "sv", "sv-fi",
    "ta", "tt", "te", "th", "ts", "tn", "tr", "uk", "ur", "uz", "vi", "xh", "zu",
];

// Codes Kindle does not take verbatim.
const LOCALE_OVERRIDES: &[(&str, &str)] = &[("sr", "hr"), ("en", "en-us")];

fn supported(code: &str) -> bool {
    KINDLE_SUPPORTED_LANGS.contains(&code)
}

/// Kindle locale for an ISO code, or the validated override.
pub fn kindle_lang_code(
    code: Option<&str>,
    override_code: Option<&str>,
) -> Result<String, PackagingError> {
    if let Some(over) = override_code {
        let normalized = over.to_lowercase();
        if supported(&normalized) {
            return Ok(normalized);
        }
        return Err(PackagingError::new(format!(
            "kindle language override '{over}' is not supported by Kindle"
        )));
    }

    let Some(code) = code else {
        return Ok("en".to_string());
    };

    let mut normalized = code.to_lowercase();
    if supported(&normalized) {
        return Ok(normalized);
    }

    if let Some((_, mapped)) = LOCALE_OVERRIDES.iter().find(|(from, _)| *from == normalized) {
        normalized = (*mapped).to_string();
    }
    if normalized == "en" {
        return Ok("en-us".to_string());
    }

    Ok(if supported(&normalized) {
        normalized
    } else {
        "en".to_string()
    })
}

/// A corpus ready for packaging.
#[derive(Debug, Clone)]
pub struct CorpusArtifact {
    pub path: PathBuf,
    pub kindle_in_code: String,
    pub kindle_out_code: String,
    pub title: String,
    pub entry_count: u64,
}

/// MOBI packaging boundary.
pub trait Packager {
    /// Package `artifact` into `out_dir`, returning the final artifact path.
    fn package(&self, artifact: &CorpusArtifact, out_dir: &Path) -> Result<PathBuf, PackagingError>;
}

static DC_LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<dc:language>[^<]*</dc:language>").unwrap());
static DC_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<dc:date>[^<]*</dc:date>").unwrap());
static IN_LANG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<DictionaryInLanguage>[^<]*</DictionaryInLanguage>").unwrap());
static OUT_LANG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<DictionaryOutLanguage>[^<]*</DictionaryOutLanguage>").unwrap());

/// Rewrite the locale-bearing OPF metadata in place.
pub fn patch_opf_languages(
    opf_path: &Path,
    in_code: &str,
    out_code: &str,
) -> Result<(), PackagingError> {
    let read_err = |e| PackagingError::new(format!("failed to read {}: {e}", opf_path.display()));
    let mut content = fs::read_to_string(opf_path).map_err(read_err)?;

    content = DC_LANGUAGE_RE
        .replace_all(&content, format!("<dc:language>{in_code}</dc:language>"))
        .into_owned();
    content = IN_LANG_RE
        .replace_all(
            &content,
            format!("<DictionaryInLanguage>{in_code}</DictionaryInLanguage>"),
        )
        .into_owned();
    content = OUT_LANG_RE
        .replace_all(
            &content,
            format!("<DictionaryOutLanguage>{out_code}</DictionaryOutLanguage>"),
        )
        .into_owned();

    let today = chrono::Utc::now().format("%Y-%m-%d");
    content = DC_DATE_RE
        .replace_all(&content, format!("<dc:date>{today}</dc:date>"))
        .into_owned();

    fs::write(opf_path, content)
        .map_err(|e| PackagingError::new(format!("failed to write {}: {e}", opf_path.display())))?;
    Ok(())
}

/// Adapter around the external `kindlegen` binary.
pub struct KindlegenPackager {
    pub kindlegen_path: PathBuf,
    /// Forwarded to the external tree builder; assembly itself ignores them.
    pub include_pos: bool,
    pub try_fix_inflections: bool,
}

impl KindlegenPackager {
    pub fn new(kindlegen_path: impl Into<PathBuf>) -> Self {
        Self {
            kindlegen_path: kindlegen_path.into(),
            include_pos: false,
            try_fix_inflections: true,
        }
    }

    fn run_kindlegen(&self, opf_path: &Path, mobi_name: &str) -> Result<(), PackagingError> {
        if self.kindlegen_path.as_os_str().is_empty() {
            return Err(PackagingError::new(
                "kindlegen not found; install Kindle Previewer or pass --kindlegen-path",
            ));
        }

        let output = Command::new(&self.kindlegen_path)
            .arg(opf_path)
            .arg("-o")
            .arg(mobi_name)
            .output()
            .map_err(|e| {
                PackagingError::new(format!(
                    "failed to run {}: {e}",
                    self.kindlegen_path.display()
                ))
            })?;

        // kindlegen exits 1 for builds that finished with warnings
        let code = output.status.code().unwrap_or(-1);
        if code != 0 && code != 1 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(PackagingError::new(format!(
                "kindlegen exited with {code}: {}",
                if stderr.trim().is_empty() { stdout } else { stderr }
            )));
        }
        Ok(())
    }

    fn find_opf(tree: &Path) -> Option<PathBuf> {
        let direct = tree.join("OEBPS").join("content.opf");
        if direct.exists() {
            return Some(direct);
        }
        let mut stack = vec![tree.to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).ok()?.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|e| e == "opf") {
                    return Some(path);
                }
            }
        }
        None
    }
}

impl Packager for KindlegenPackager {
    /// Expects the OPF tree produced by the (external) tree builder as a
    /// sibling of the corpus artifact.
    fn package(&self, artifact: &CorpusArtifact, out_dir: &Path) -> Result<PathBuf, PackagingError> {
        let tree = artifact.path.with_extension("opf-tree");
        let opf_path = Self::find_opf(&tree).ok_or_else(|| {
            PackagingError::new(format!("no .opf found under {}", tree.display()))
        })?;

        patch_opf_languages(&opf_path, &artifact.kindle_in_code, &artifact.kindle_out_code)?;

        let mobi_name = format!("{}.mobi", crate::path::slug(&artifact.title));
        self.run_kindlegen(&opf_path, &mobi_name)?;

        let produced = opf_path
            .parent()
            .map(|p| p.join(&mobi_name))
            .filter(|p| p.exists())
            .ok_or_else(|| PackagingError::new("kindlegen produced no .mobi file"))?;

        let target = out_dir.join(&mobi_name);
        fs::create_dir_all(out_dir)
            .and_then(|()| fs::rename(&produced, &target))
            .map_err(|e| PackagingError::new(format!("failed to move artifact: {e}")))?;

        Ok(target)
    }
}
