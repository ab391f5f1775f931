use std::fs;
use std::process::ExitCode;

use anyhow::{Result, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use wtk::cli::{BuildArgs, Cli, Command, InitArgs, build_names, merge_langs};
use wtk::config::{load_config, save_config};
use wtk::error::ParseError;
use wtk::kindle::{CorpusArtifact, KindlegenPackager, Packager, kindle_lang_code};
use wtk::lang::{self, LANGUAGES};
use wtk::path::{CacheLayout, slug};
use wtk::progress::{ConsoleProgress, NoopProgress, ProgressReporter};
use wtk::tatoeba::{ExampleProvider, TatoebaExamples};
use wtk::{AssembleOptions, Assembler};

fn setup_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" })),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_level(true)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_cli();
    setup_tracing(cli.verbose);
    tracing::debug!("{cli:#?}");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(e: &anyhow::Error) {
    if let Some(parse_error) = e.downcast_ref::<ParseError>() {
        eprintln!("error: {parse_error}");
        for line in &parse_error.excerpt {
            eprintln!("  | {line}");
        }
    } else {
        eprintln!("error: {e:#}");
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build(args) => run_build(&args),
        Command::Init(args) => run_init(args),
        Command::Langs => {
            print_langs();
            Ok(())
        }
    }
}

fn print_langs() {
    println!("{:<20} {:<5} {}", "language", "iso", "freedict");
    for info in LANGUAGES {
        println!(
            "{:<20} {:<5} {}",
            info.name,
            info.iso,
            info.freedict.unwrap_or("-")
        );
    }
}

fn run_init(args: InitArgs) -> Result<()> {
    let mut config = load_config();
    if let Some(value) = args.default_out_lang {
        require_known(&value)?;
        config.default_out_lang = value;
    }
    if let Some(value) = args.cache_dir {
        config.cache_dir = value;
    }
    if let Some(value) = args.merge_in_langs {
        config.merge_in_langs = value;
    }
    let path = save_config(&config)?;
    println!("Saved: {}", path.display());
    Ok(())
}

fn require_known(language: &str) -> Result<()> {
    if lang::info(language).is_none() {
        let supported: Vec<&str> = LANGUAGES.iter().map(|l| l.name).collect();
        bail!(
            "unsupported language '{language}'. Supported: {}",
            supported.join(" | ")
        );
    }
    Ok(())
}

fn run_build(args: &BuildArgs) -> Result<()> {
    let config = load_config();
    let out_lang = args
        .out_lang
        .clone()
        .unwrap_or_else(|| config.default_out_lang.clone());

    require_known(&args.in_lang)?;
    require_known(&out_lang)?;

    let cache_dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| config.cache_dir.clone());
    let layout = CacheLayout::new(cache_dir);

    let console = ConsoleProgress;
    let noop = NoopProgress;
    let reporter: &dyn ProgressReporter = if args.quiet { &noop } else { &console };

    let extras = merge_langs(args, &config.merge_in_langs);
    for extra in &extras {
        require_known(extra)?;
    }

    let names = build_names(args, &args.in_lang, &out_lang);
    let options = AssembleOptions {
        max_entries: args.max_entries,
        quiet: args.quiet,
    };

    let in_langs: Vec<&String> = std::iter::once(&args.in_lang).chain(extras.iter()).collect();
    for (i, in_lang) in in_langs.into_iter().enumerate() {
        let (title, outdir) = if i == 0 {
            (names.title.clone(), names.outdir.clone())
        } else {
            (
                format!("{} (extra: {in_lang})", names.title),
                names.outdir.join(format!("extra_{}", slug(in_lang))),
            )
        };
        fs::create_dir_all(&outdir)?;

        let mut assembler = Assembler::new(layout.clone(), reporter, !args.no_stardict);

        let mut provider_storage = if args.no_tatoeba {
            None
        } else {
            match (lang::freedict_code(in_lang), lang::freedict_code(&out_lang)) {
                (Some(source), Some(target)) => {
                    Some(TatoebaExamples::new(source, target, &layout, reporter))
                }
                _ => {
                    tracing::warn!("no tatoeba codes for {in_lang} -> {out_lang}; skipping examples");
                    None
                }
            }
        };
        let provider = provider_storage
            .as_mut()
            .map(|p| p as &mut dyn ExampleProvider);

        let (combined_path, stats) = assembler.assemble(in_lang, &out_lang, provider, &options)?;

        if !args.quiet {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        if args.kindlegen_path.is_empty() {
            tracing::info!("no kindlegen path given; skipping MOBI packaging");
            continue;
        }

        let kindle_in = kindle_lang_code(lang::iso_code(in_lang), args.kindle_lang.as_deref())?;
        let kindle_out = kindle_lang_code(lang::iso_code(&out_lang), None)?;
        let artifact = CorpusArtifact {
            path: combined_path,
            kindle_in_code: kindle_in,
            kindle_out_code: kindle_out,
            title,
            entry_count: stats.final_headword_count,
        };
        let packager = KindlegenPackager {
            kindlegen_path: args.kindlegen_path.clone().into(),
            include_pos: args.include_pos || config.include_pos,
            try_fix_inflections: args.try_fix_inflections || config.try_fix_inflections,
        };
        let packaged = packager.package(&artifact, &outdir)?;
        println!("DONE: {}", packaged.display());
    }

    Ok(())
}
