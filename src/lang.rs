//! Language registry: canonical names, ISO-ish codes, FreeDict codes, and
//! the related-language clusters used by the assembler.

/// One supported language.
///
/// `name` is the canonical English name, as it appears in the kaikki
/// `language` field. `freedict` is the ISO 639-3 code used in FreeDict pair
/// directories, absent when FreeDict publishes nothing for the language.
#[derive(Debug, Clone, Copy)]
pub struct LanguageInfo {
    pub name: &'static str,
    pub iso: &'static str,
    pub freedict: Option<&'static str>,
}

pub const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo { name: "Albanian", iso: "sq", freedict: Some("sqi") },
    LanguageInfo { name: "Arabic", iso: "ar", freedict: Some("ara") },
    LanguageInfo { name: "Bulgarian", iso: "bg", freedict: Some("bul") },
    LanguageInfo { name: "Chinese", iso: "zh", freedict: None },
    LanguageInfo { name: "Croatian", iso: "hr", freedict: Some("hrv") },
    LanguageInfo { name: "Czech", iso: "cs", freedict: Some("ces") },
    LanguageInfo { name: "Danish", iso: "da", freedict: Some("dan") },
    LanguageInfo { name: "Dutch", iso: "nl", freedict: Some("nld") },
    LanguageInfo { name: "English", iso: "en", freedict: Some("eng") },
    LanguageInfo { name: "Esperanto", iso: "eo", freedict: Some("epo") },
    LanguageInfo { name: "Finnish", iso: "fi", freedict: Some("fin") },
    LanguageInfo { name: "French", iso: "fr", freedict: Some("fra") },
    LanguageInfo { name: "German", iso: "de", freedict: Some("deu") },
    LanguageInfo { name: "Greek", iso: "el", freedict: Some("ell") },
    LanguageInfo { name: "Hebrew", iso: "he", freedict: Some("heb") },
    LanguageInfo { name: "Hindi", iso: "hi", freedict: Some("hin") },
    LanguageInfo { name: "Hungarian", iso: "hu", freedict: Some("hun") },
    LanguageInfo { name: "Icelandic", iso: "is", freedict: Some("isl") },
    LanguageInfo { name: "Indonesian", iso: "id", freedict: Some("ind") },
    LanguageInfo { name: "Irish", iso: "ga", freedict: Some("gle") },
    LanguageInfo { name: "Italian", iso: "it", freedict: Some("ita") },
    LanguageInfo { name: "Japanese", iso: "ja", freedict: Some("jpn") },
    LanguageInfo { name: "Korean", iso: "ko", freedict: Some("kor") },
    LanguageInfo { name: "Latvian", iso: "lv", freedict: Some("lav") },
    LanguageInfo { name: "Lithuanian", iso: "lt", freedict: Some("lit") },
    LanguageInfo { name: "Macedonian", iso: "mk", freedict: Some("mkd") },
    LanguageInfo { name: "Norwegian Bokmål", iso: "nb", freedict: Some("nob") },
    LanguageInfo { name: "Persian", iso: "fa", freedict: Some("fas") },
    LanguageInfo { name: "Polish", iso: "pl", freedict: Some("pol") },
    LanguageInfo { name: "Portuguese", iso: "pt", freedict: Some("por") },
    LanguageInfo { name: "Romanian", iso: "ro", freedict: Some("ron") },
    LanguageInfo { name: "Russian", iso: "ru", freedict: Some("rus") },
    LanguageInfo { name: "Serbian", iso: "sr", freedict: Some("srp") },
    LanguageInfo { name: "Serbo-Croatian", iso: "sh", freedict: Some("hbs") },
    LanguageInfo { name: "Slovak", iso: "sk", freedict: Some("slk") },
    LanguageInfo { name: "Slovene", iso: "sl", freedict: Some("slv") },
    LanguageInfo { name: "Spanish", iso: "es", freedict: Some("spa") },
    LanguageInfo { name: "Swedish", iso: "sv", freedict: Some("swe") },
    LanguageInfo { name: "Thai", iso: "th", freedict: Some("tha") },
    LanguageInfo { name: "Turkish", iso: "tr", freedict: Some("tur") },
    LanguageInfo { name: "Ukrainian", iso: "uk", freedict: Some("ukr") },
    LanguageInfo { name: "Vietnamese", iso: "vi", freedict: Some("vie") },
];

/// Languages whose datasets should be assembled together, plus the iso codes
/// that trigger the expansion. Currently only the Serbo-Croatian cluster;
/// new clusters are added here, not in the assembler.
#[derive(Debug, Clone, Copy)]
pub struct RelatedCluster {
    pub isos: &'static [&'static str],
    pub members: &'static [&'static str],
}

pub const RELATED_CLUSTERS: &[RelatedCluster] = &[RelatedCluster {
    isos: &["sr", "hr"],
    members: &["Serbian", "Croatian"],
}];

// Kaikki publishes Serbian and Croatian only under the merged header.
const KAIKKI_FALLBACKS: &[(&str, &str)] = &[
    ("Croatian", "Serbo-Croatian"),
    ("Serbian", "Serbo-Croatian"),
];

pub fn info(language: &str) -> Option<&'static LanguageInfo> {
    LANGUAGES
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(language))
}

/// Canonical name for kaikki downloads. Applied at the source boundary,
/// before slugging.
pub fn kaikki_canonical(language: &str) -> &str {
    KAIKKI_FALLBACKS
        .iter()
        .find(|(from, _)| *from == language)
        .map_or(language, |(_, to)| *to)
}

pub fn iso_code(language: &str) -> Option<&'static str> {
    info(language).map(|l| l.iso)
}

pub fn freedict_code(language: &str) -> Option<&'static str> {
    info(language).and_then(|l| l.freedict)
}

fn cluster_of(language: &str) -> Option<&'static RelatedCluster> {
    let iso = iso_code(language)?;
    RELATED_CLUSTERS.iter().find(|c| c.isos.contains(&iso))
}

/// Whether entries of this language need Cyrillic→Latin folding.
pub fn serbian_mode(language: &str) -> bool {
    cluster_of(language).is_some()
}

/// Sorted union of the language and its cluster members; a singleton when
/// the language belongs to no cluster.
pub fn expand_related(language: &str) -> Vec<String> {
    let mut langs = vec![language.to_string()];
    if let Some(cluster) = cluster_of(language) {
        for member in cluster.members {
            if !langs.iter().any(|l| l == member) {
                langs.push((*member).to_string());
            }
        }
        langs.sort();
    }
    langs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups() {
        assert_eq!(iso_code("Serbian"), Some("sr"));
        assert_eq!(iso_code("serbian"), Some("sr"));
        assert_eq!(freedict_code("English"), Some("eng"));
        assert_eq!(freedict_code("Chinese"), None);
        assert!(info("Klingon").is_none());
    }

    #[test]
    fn kaikki_fallbacks() {
        assert_eq!(kaikki_canonical("Serbian"), "Serbo-Croatian");
        assert_eq!(kaikki_canonical("Croatian"), "Serbo-Croatian");
        assert_eq!(kaikki_canonical("Russian"), "Russian");
    }

    #[test]
    fn serbian_cluster_expansion() {
        assert_eq!(expand_related("Serbian"), vec!["Croatian", "Serbian"]);
        assert_eq!(expand_related("Croatian"), vec!["Croatian", "Serbian"]);
        assert_eq!(expand_related("Russian"), vec!["Russian"]);
        assert!(serbian_mode("Serbian"));
        assert!(serbian_mode("Croatian"));
        assert!(!serbian_mode("Serbo-Croatian"));
        assert!(!serbian_mode("English"));
    }
}
