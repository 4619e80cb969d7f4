use super::file::{FileOutcome, FilePipeline, FileRecord, FileStatus, SkippedFile};
use crate::domain::{DecayConventions, DkError, PipelineResult};
use globset::{Glob, GlobMatcher};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub const DEFAULT_DKFILES_DIR: &str = "DecFiles/dkfiles";
pub const DEFAULT_OUTPUT_PATH: &str = "frontend/public/data.json";
pub const DEFAULT_FILE_PATTERN: &str = "*.dec";
const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Clone)]
pub struct CatalogRunnerConfig {
    pub dkfiles_dir: PathBuf,
    pub output_path: PathBuf,
    pub pattern: String,
    pub limit: Option<usize>,
    pub conventions: DecayConventions,
}

impl Default for CatalogRunnerConfig {
    fn default() -> Self {
        Self {
            dkfiles_dir: PathBuf::from(DEFAULT_DKFILES_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            pattern: DEFAULT_FILE_PATTERN.to_string(),
            limit: None,
            conventions: DecayConventions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogReport {
    pub generated_at_unix_seconds: u64,
    pub file_count: usize,
    pub succeeded_file_count: usize,
    pub degraded_file_count: usize,
    pub skipped_file_count: usize,
    pub files: Vec<FileRecord>,
    pub skipped_files: Vec<SkippedFile>,
    pub unique_particles: Vec<String>,
}

/// Run-owned fold of per-file outcomes.
#[derive(Debug, Default)]
pub struct CatalogAccumulator {
    files: Vec<FileRecord>,
    skipped: Vec<SkippedFile>,
    particles: BTreeSet<String>,
}

impl CatalogAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Cataloged(record) => {
                self.particles.extend(record.particles.iter().cloned());
                self.files.push(record);
            }
            FileOutcome::Skipped(skipped) => self.skipped.push(skipped),
        }
    }

    pub fn cataloged_count(&self) -> usize {
        self.files.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Sorts records by event type, then filename.
    pub fn finalize(mut self) -> CatalogReport {
        self.files.sort_by(|left, right| {
            left.event_type
                .cmp(&right.event_type)
                .then_with(|| left.filename.cmp(&right.filename))
        });

        let file_count = self.files.len();
        let degraded_file_count = self
            .files
            .iter()
            .filter(|record| record.status == FileStatus::Degraded)
            .count();

        CatalogReport {
            generated_at_unix_seconds: current_unix_timestamp_seconds(),
            file_count,
            succeeded_file_count: file_count.saturating_sub(degraded_file_count),
            degraded_file_count,
            skipped_file_count: self.skipped.len(),
            files: self.files,
            skipped_files: self.skipped,
            unique_particles: self.particles.into_iter().collect(),
        }
    }
}

pub fn run_catalog(config: &CatalogRunnerConfig) -> PipelineResult<CatalogReport> {
    let pipeline = FilePipeline::new(config.conventions.clone())?;
    let paths = collect_decay_files(&config.dkfiles_dir, &config.pattern, config.limit)
        .map_err(DkError::from)?;
    let total = paths.len();
    info!(
        directory = %normalize_path(&config.dkfiles_dir),
        total,
        "cataloguing decay files"
    );

    let mut accumulator = CatalogAccumulator::new();
    for (index, path) in paths.iter().enumerate() {
        accumulator.fold(pipeline.process_file(path));
        let processed = index + 1;
        if processed % PROGRESS_INTERVAL == 0 {
            info!(processed, total, "catalog progress");
        }
    }

    let report = accumulator.finalize();
    write_report_file(&config.output_path, &report).map_err(DkError::from)?;
    info!(
        files = report.file_count,
        particles = report.unique_particles.len(),
        output = %normalize_path(&config.output_path),
        "catalog written"
    );
    Ok(report)
}

pub fn render_human_summary(report: &CatalogReport) -> String {
    let mut lines = vec![
        format!(
            "Catalogued files: {} ({} complete, {} degraded)",
            report.file_count, report.succeeded_file_count, report.degraded_file_count
        ),
        format!("Skipped files: {}", report.skipped_file_count),
        format!("Unique particles: {}", report.unique_particles.len()),
    ];

    for record in report
        .files
        .iter()
        .filter(|record| record.status == FileStatus::Degraded)
    {
        let kinds = record
            .issues
            .iter()
            .filter(|issue| issue.degrades_file())
            .map(|issue| issue.kind())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "  degraded: {} [{}] ({})",
            record.filename, record.event_type, kinds
        ));
    }

    lines.join("\n")
}

pub fn load_conventions(path: impl AsRef<Path>) -> PipelineResult<DecayConventions> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| CatalogError::ReadConventions {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source)
        .map_err(|source| CatalogError::ParseConventions {
            path: path.to_path_buf(),
            source,
        })
        .map_err(DkError::from)
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
    #[error("failed to read directory '{}': {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read conventions '{}': {source}", path.display())]
    ReadConventions {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse conventions '{}': {source}", path.display())]
    ParseConventions {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to create report directory '{}': {source}", path.display())]
    ReportDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize report '{}': {source}", path.display())]
    SerializeReport {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write report '{}': {source}", path.display())]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<CatalogError> for DkError {
    fn from(error: CatalogError) -> Self {
        let message = error.to_string();
        match error {
            CatalogError::Pattern { .. } => DkError::input_validation("INPUT.FILE_PATTERN", message),
            CatalogError::ParseConventions { .. } => {
                DkError::input_validation("INPUT.CONVENTIONS", message)
            }
            CatalogError::ReadConventions { .. } => {
                DkError::io_system("IO.CONVENTIONS", message)
            }
            CatalogError::ReadDirectory { .. }
            | CatalogError::ReportDirectory { .. }
            | CatalogError::WriteReport { .. } => DkError::io_system("IO.CATALOG_FILESYSTEM", message),
            CatalogError::SerializeReport { .. } => DkError::internal("SYS.CATALOG_REPORT", message),
        }
    }
}

/// Regular files directly under `directory` whose name matches `pattern`,
/// sorted by name and cut to `limit`.
pub fn collect_decay_files(
    directory: &Path,
    pattern: &str,
    limit: Option<usize>,
) -> Result<Vec<PathBuf>, CatalogError> {
    let matcher = compile_pattern(pattern)?;
    let entries = fs::read_dir(directory).map_err(|source| CatalogError::ReadDirectory {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| CatalogError::ReadDirectory {
            path: directory.to_path_buf(),
            source,
        })?;
        let file_type = entry
            .file_type()
            .map_err(|source| CatalogError::ReadDirectory {
                path: entry.path(),
                source,
            })?;
        if file_type.is_file() && matcher.is_match(entry.file_name()) {
            paths.push(entry.path());
        }
    }

    paths.sort();
    if let Some(limit) = limit {
        paths.truncate(limit);
    }
    Ok(paths)
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher, CatalogError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| CatalogError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn write_report_file(report_path: &Path, report: &CatalogReport) -> Result<(), CatalogError> {
    if let Some(parent_dir) = report_path.parent()
        && !parent_dir.as_os_str().is_empty()
    {
        fs::create_dir_all(parent_dir).map_err(|source| CatalogError::ReportDirectory {
            path: parent_dir.to_path_buf(),
            source,
        })?;
    }

    let report_json =
        serde_json::to_string_pretty(report).map_err(|source| CatalogError::SerializeReport {
            path: report_path.to_path_buf(),
            source,
        })?;
    fs::write(report_path, report_json).map_err(|source| CatalogError::WriteReport {
        path: report_path.to_path_buf(),
        source,
    })
}

fn current_unix_timestamp_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
