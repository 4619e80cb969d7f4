use super::CliError;
use anyhow::Context;
use dkfiles_core::decay::{DescriptorTokenizer, select_roots};
use dkfiles_core::domain::{DecayCatalog, DecayConventions};
use dkfiles_core::parser::{parse_dec_source, read_header};
use dkfiles_core::pipelines::{
    CatalogRunnerConfig, DEFAULT_DKFILES_DIR, DEFAULT_FILE_PATTERN, DEFAULT_OUTPUT_PATH,
    FilePipeline, load_conventions, render_human_summary, run_catalog,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(clap::Args)]
pub(super) struct CatalogArgs {
    /// Directory holding the decay files
    #[arg(long, default_value = DEFAULT_DKFILES_DIR)]
    dkfiles_dir: PathBuf,

    /// JSON catalog output path
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// File-name glob selecting decay files
    #[arg(long, default_value = DEFAULT_FILE_PATTERN)]
    pattern: String,

    /// Only catalog the first N files (sorted by name)
    #[arg(short = 'n', long = "num-files", value_name = "N")]
    num_files: Option<usize>,

    #[command(flatten)]
    conventions: ConventionsFlag,
}

#[derive(clap::Args)]
pub(super) struct InspectArgs {
    /// Decay file to inspect
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(flatten)]
    conventions: ConventionsFlag,
}

#[derive(clap::Args)]
pub(super) struct TokenizeArgs {
    /// Free-text decay descriptor, e.g. "[B0 -> K+ pi-]cc"
    #[arg(value_name = "DESCRIPTOR")]
    descriptor: String,

    #[command(flatten)]
    conventions: ConventionsFlag,
}

#[derive(clap::Args)]
pub(super) struct ConventionsFlag {
    /// JSON file overriding the signal marker, ignored keywords and conjugate folding
    #[arg(long, value_name = "PATH")]
    conventions: Option<PathBuf>,
}

impl ConventionsFlag {
    fn load(&self) -> Result<DecayConventions, CliError> {
        match &self.conventions {
            Some(path) => load_conventions(path).map_err(CliError::Compute),
            None => Ok(DecayConventions::default()),
        }
    }
}

impl CatalogArgs {
    fn into_config(self) -> Result<CatalogRunnerConfig, CliError> {
        let conventions = self.conventions.load()?;
        Ok(CatalogRunnerConfig {
            dkfiles_dir: self.dkfiles_dir,
            output_path: self.output,
            pattern: self.pattern,
            limit: self.num_files,
            conventions,
        })
    }
}

pub(super) fn run_catalog_command(args: CatalogArgs) -> Result<i32, CliError> {
    let config = args.into_config()?;
    debug!(
        pattern = %config.pattern,
        limit = ?config.limit,
        marker = %config.conventions.signal_marker,
        "starting catalog run"
    );
    let report = run_catalog(&config).map_err(CliError::Compute)?;
    println!("{}", render_human_summary(&report));
    println!("JSON catalog: {}", config.output_path.display());
    Ok(0)
}

pub(super) fn run_inspect_command(args: InspectArgs) -> Result<i32, CliError> {
    let conventions = args.conventions.load()?;
    let source = read_decay_file(&args.file)?;
    let header = read_header(&source);
    let dec = parse_dec_source(&source).map_err(CliError::Compute)?;
    let pipeline = FilePipeline::new(conventions).map_err(CliError::Compute)?;

    println!("File: {}", args.file.display());
    println!("EventType: {}", header.event_type.as_deref().unwrap_or("(none)"));
    println!("Descriptor: {}", header.descriptor.as_deref().unwrap_or("(none)"));
    if let Some(nickname) = header.nickname.as_deref() {
        println!("NickName: {}", nickname);
    }

    println!("Mothers:");
    for (mother, modes) in dec.mother_record().iter() {
        let conjugate = dec
            .mother_record()
            .conjugate_source(mother)
            .map(|source| format!(", conjugate of {}", source))
            .unwrap_or_default();
        println!("  {} ({} mode(s){})", mother, modes.len(), conjugate);
        for mode in modes {
            println!(
                "    {:.4}  {}  [{}]",
                mode.branching_fraction,
                mode.daughters.join(" "),
                mode.model
            );
        }
    }

    if !dec.alias_table().is_empty() {
        println!("Aliases:");
        for (alias, target) in dec.alias_table().iter() {
            println!("  {} -> {}", alias, target);
        }
    }

    let pairs = dec.charge_conj().pairs().collect::<Vec<_>>();
    if !pairs.is_empty() {
        println!("ChargeConj:");
        for (particle, partner) in pairs {
            println!("  {} <-> {}", particle, partner);
        }
    }

    let roots = select_roots(dec.mother_record(), pipeline.conventions());
    println!("Roots: {}", render_list(&roots));

    let analysis = pipeline.analyze(&dec, header.descriptor.as_deref());
    println!("Descriptors:");
    for descriptor in &analysis.descriptors {
        println!("  {}", descriptor);
    }
    println!("Trees:");
    for tree in &analysis.trees {
        let json = serde_json::to_string(tree).context("failed to render decay tree")?;
        println!("  {}", json);
    }
    let particles = analysis.particles.iter().cloned().collect::<Vec<_>>();
    println!("Particles: {}", render_list(&particles));
    if !analysis.issues.is_empty() {
        println!("Issues:");
        for issue in &analysis.issues {
            let json = serde_json::to_string(issue).context("failed to render issue")?;
            println!("  {}", json);
        }
    }

    Ok(0)
}

pub(super) fn run_tokenize_command(args: TokenizeArgs) -> Result<i32, CliError> {
    let conventions = args.conventions.load()?;
    let tokenized = DescriptorTokenizer::from_conventions(&conventions).tokenize(&args.descriptor);

    for particle in &tokenized.particles {
        println!("{}", particle);
    }
    for token in &tokenized.ambiguous_tokens {
        eprintln!("ambiguous token kept whole: {}", token);
    }
    Ok(0)
}

fn read_decay_file(path: &Path) -> Result<String, CliError> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read decay file '{}'", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn render_list(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}
