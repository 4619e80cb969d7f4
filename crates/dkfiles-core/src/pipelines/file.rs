use crate::decay::{
    AliasNormalizer, DecayTree, DecayTreeBuilder, DescriptorTokenizer, ModeExpander,
    ModeSelection, RootOutcome, classify_roots, marker_pattern, select_roots,
};
use crate::domain::{DecayCatalog, DecayConventions, DecayIssue, DkResult};
use crate::parser::{parse_dec_source, read_header};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const NO_DESCRIPTOR_FALLBACK: &str = "No descriptor found";

/// `descriptor` is a plain string for one descriptor and a list otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DescriptorField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Complete,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub event_type: String,
    pub filename: String,
    pub descriptor: DescriptorField,
    pub descriptors: Vec<String>,
    pub particles: Vec<String>,
    #[serde(rename = "decay_structures")]
    pub decay_structures: Vec<DecayTree>,
    pub status: FileStatus,
    pub issues: Vec<DecayIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingEventType,
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Cataloged(FileRecord),
    Skipped(SkippedFile),
}

/// Descriptors, trees and particles derived from one parsed decay file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileAnalysis {
    pub descriptors: Vec<String>,
    pub trees: Vec<DecayTree>,
    pub particles: BTreeSet<String>,
    pub issues: Vec<DecayIssue>,
}

impl FileAnalysis {
    pub fn is_degraded(&self) -> bool {
        self.issues.iter().any(DecayIssue::degrades_file)
    }
}

#[derive(Debug, Clone)]
pub struct FilePipeline {
    conventions: DecayConventions,
    tokenizer: DescriptorTokenizer,
    marker: Regex,
}

impl FilePipeline {
    pub fn new(conventions: DecayConventions) -> DkResult<Self> {
        let marker = marker_pattern(&conventions.signal_marker)?;
        Ok(Self {
            tokenizer: DescriptorTokenizer::from_conventions(&conventions),
            conventions,
            marker,
        })
    }

    pub fn conventions(&self) -> &DecayConventions {
        &self.conventions
    }

    pub fn process_file(&self, path: &Path) -> FileOutcome {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        match fs::read(path) {
            Ok(bytes) => self.process_source(&filename, &String::from_utf8_lossy(&bytes)),
            Err(source) => {
                warn!(file = %filename, error = %source, "skipping unreadable decay file");
                FileOutcome::Skipped(SkippedFile {
                    filename,
                    reason: SkipReason::Unreadable {
                        reason: source.to_string(),
                    },
                })
            }
        }
    }

    pub fn process_source(&self, filename: &str, source: &str) -> FileOutcome {
        let header = read_header(source);
        let Some(event_type) = header.event_type else {
            debug!(file = filename, "skipping decay file without an event type");
            return FileOutcome::Skipped(SkippedFile {
                filename: filename.to_string(),
                reason: SkipReason::MissingEventType,
            });
        };

        let analysis = match parse_dec_source(source) {
            Ok(dec) => self.analyze(&dec, header.descriptor.as_deref()),
            Err(error) => FileAnalysis {
                issues: vec![DecayIssue::InvalidGrammar {
                    reason: format!("[{}] {}", error.placeholder(), error.message()),
                }],
                ..FileAnalysis::default()
            },
        };

        let status = if analysis.is_degraded() {
            warn!(
                file = filename,
                event_type = %event_type,
                issues = analysis.issues.len(),
                "decay file catalogued with its header descriptor"
            );
            FileStatus::Degraded
        } else {
            FileStatus::Complete
        };

        let fallback = header
            .descriptor
            .unwrap_or_else(|| NO_DESCRIPTOR_FALLBACK.to_string());
        let (descriptor, descriptors) = match analysis.descriptors.len() {
            0 => (DescriptorField::One(fallback.clone()), vec![fallback]),
            1 => (
                DescriptorField::One(analysis.descriptors[0].clone()),
                analysis.descriptors,
            ),
            _ => (
                DescriptorField::Many(analysis.descriptors.clone()),
                analysis.descriptors,
            ),
        };

        FileOutcome::Cataloged(FileRecord {
            event_type,
            filename: filename.to_string(),
            descriptor,
            descriptors,
            particles: analysis.particles.into_iter().collect(),
            decay_structures: analysis.trees,
            status,
            issues: analysis.issues,
        })
    }

    /// Tokenizes the header descriptor, detects the root and, for a single
    /// root, pairs each expanded descriptor with its decay tree.
    pub fn analyze<C: DecayCatalog>(
        &self,
        catalog: &C,
        header_descriptor: Option<&str>,
    ) -> FileAnalysis {
        let marker = self.conventions.signal_marker.as_str();
        let record = catalog.mother_record();
        let aliases = catalog.alias_table();
        let mut analysis = FileAnalysis::default();

        if let Some(descriptor) = header_descriptor {
            let lowered_aliases = aliases.lowercased();
            let normalizer = AliasNormalizer::new(&lowered_aliases, marker);
            let tokenized = self.tokenizer.tokenize(descriptor);
            analysis.particles.extend(
                tokenized
                    .particles
                    .iter()
                    .map(|token| normalizer.normalize(token)),
            );
            analysis.issues.extend(
                tokenized
                    .ambiguous_tokens
                    .into_iter()
                    .map(|token| DecayIssue::TokenizationAmbiguity { token }),
            );
        }

        match classify_roots(select_roots(record, &self.conventions)) {
            RootOutcome::NoRoot => {
                if !record.is_empty() {
                    analysis.issues.push(DecayIssue::NoQualifyingRoot {
                        mother_count: record.len(),
                    });
                }
            }
            RootOutcome::Multiple(roots) => {
                analysis
                    .issues
                    .push(DecayIssue::MultipleQualifyingRoots { roots });
            }
            RootOutcome::Single(root) => {
                let descriptors = catalog.expanded_descriptors(&root, marker).into_vec();
                if descriptors.is_empty() {
                    analysis
                        .issues
                        .push(DecayIssue::MissingModeExpansion { root });
                    return analysis;
                }

                let builder = DecayTreeBuilder::new(record, AliasNormalizer::new(aliases, marker))
                    .with_selection(ModeSelection::AllModes);
                let expansion = ModeExpander::new(builder, &self.marker).expand(&root, descriptors);

                for tree in &expansion.trees {
                    analysis
                        .particles
                        .extend(tree.particles().iter().map(|name| name.to_lowercase()));
                }
                analysis.issues.extend(
                    expansion
                        .truncated
                        .into_iter()
                        .map(|particle| DecayIssue::CyclicDefinition { particle }),
                );
                analysis.descriptors = expansion.descriptors;
                analysis.trees = expansion.trees;
            }
        }

        analysis
    }
}
