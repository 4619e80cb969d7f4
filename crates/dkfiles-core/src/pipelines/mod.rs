//! Per-file cataloguing and the batch driver that folds files into one report.

pub mod catalog;
pub mod file;

pub use catalog::{
    CatalogAccumulator, CatalogError, CatalogReport, CatalogRunnerConfig, DEFAULT_DKFILES_DIR,
    DEFAULT_FILE_PATTERN, DEFAULT_OUTPUT_PATH, collect_decay_files, load_conventions,
    render_human_summary, run_catalog,
};
pub use file::{
    DescriptorField, FileAnalysis, FileOutcome, FilePipeline, FileRecord, FileStatus,
    NO_DESCRIPTOR_FALLBACK, SkipReason, SkippedFile,
};
