use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::lang;
use crate::path::slug;

#[derive(Debug, Parser)]
#[command(version, about = "Assemble Kindle dictionaries from kaikki, FreeDict and Tatoeba")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assemble (and optionally package) a dictionary for a language pair
    Build(BuildArgs),

    /// Persist default options to the config file
    Init(InitArgs),

    /// Show supported languages
    Langs,
}

#[derive(Parser, Debug, Default)]
pub struct BuildArgs {
    /// Input language, canonical name (e.g. "Serbian")
    pub in_lang: String,

    /// Output language; defaults to the configured default_out_lang
    pub out_lang: Option<String>,

    /// Comma-separated extra input languages, each assembled into its own
    /// extra_<name>/ subdirectory
    #[arg(long)]
    pub merge_in_langs: Option<String>,

    /// Override the auto title
    #[arg(long, default_value = "")]
    pub title: String,

    /// Override the auto short name
    #[arg(long, default_value = "")]
    pub shortname: String,

    /// Override the auto output directory
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Path to kindlegen; packaging is skipped when empty
    #[arg(long, default_value = "")]
    pub kindlegen_path: String,

    /// Kindle locale override (must be a code Kindle supports)
    #[arg(long)]
    pub kindle_lang: Option<String>,

    /// Debug: keep only the first n headwords. <= 0 keeps all
    #[arg(long, default_value_t = 0)]
    pub max_entries: i64,

    /// Include part-of-speech headers (forwarded to the packager)
    #[arg(long)]
    pub include_pos: bool,

    /// Fix lookup for inflections (forwarded to the packager)
    #[arg(long)]
    pub try_fix_inflections: bool,

    /// Cache directory for downloads
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Skip the FreeDict/StarDict source
    #[arg(long)]
    pub no_stardict: bool,

    /// Skip Tatoeba example enrichment
    #[arg(long)]
    pub no_tatoeba: bool,

    /// Less console output
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Parser, Debug, Default)]
pub struct InitArgs {
    /// Default output language for future builds
    #[arg(long)]
    pub default_out_lang: Option<String>,

    /// Cache directory for future builds
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Comma-separated extra input languages for future builds
    #[arg(long)]
    pub merge_in_langs: Option<String>,
}

/// Derived naming for one build of `in_lang -> out_lang`.
#[derive(Debug, Clone)]
pub struct BuildNames {
    pub title: String,
    pub shortname: String,
    pub outdir: PathBuf,
}

pub fn build_names(args: &BuildArgs, in_lang: &str, out_lang: &str) -> BuildNames {
    let title = if args.title.is_empty() {
        format!("{in_lang}-{out_lang} dictionary")
    } else {
        args.title.clone()
    };

    let shortname = if args.shortname.is_empty() {
        let short_in = lang::iso_code(in_lang).unwrap_or(in_lang);
        let short_out = lang::iso_code(out_lang).unwrap_or(out_lang);
        format!("{short_in}-{short_out}").to_lowercase()
    } else {
        args.shortname.clone()
    };

    let outdir = args
        .outdir
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}-{}", slug(in_lang), slug(out_lang))));

    BuildNames {
        title,
        shortname,
        outdir,
    }
}

/// Extra input languages: the CLI flag wins over the configured default.
pub fn merge_langs(args: &BuildArgs, configured: &str) -> Vec<String> {
    let raw = args.merge_in_langs.as_deref().unwrap_or(configured);
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Cli {
    pub fn parse_cli() -> Self {
        Self::parse()
    }
}
