use super::alias::AliasNormalizer;
use super::tree::{DecayTree, DecayTreeBuilder, ModeSelection};
use crate::domain::{AliasTable, DEFAULT_SIGNAL_MARKER, DkError, DkResult, MotherRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static DEFAULT_MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    marker_pattern(DEFAULT_SIGNAL_MARKER).expect("default signal marker pattern should compile")
});

/// Word-final, case-insensitive occurrences of `marker` inside free text.
pub fn marker_pattern(marker: &str) -> DkResult<Regex> {
    Regex::new(&format!(r"(?i){}\b", regex::escape(marker))).map_err(|source| {
        DkError::input_validation(
            "INPUT.SIGNAL_MARKER",
            format!("signal marker '{}' cannot be matched: {}", marker, source),
        )
    })
}

pub fn strip_marker_from_descriptor(descriptor: &str, pattern: &Regex) -> String {
    pattern.replace_all(descriptor, "").into_owned()
}

/// Index-aligned descriptor strings and trees of one root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModeExpansion {
    pub descriptors: Vec<String>,
    pub trees: Vec<DecayTree>,
    /// Particles whose expansion was cut by the cycle guard.
    pub truncated: BTreeSet<String>,
}

impl ModeExpansion {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

pub struct ModeExpander<'a> {
    builder: DecayTreeBuilder<'a>,
    pattern: &'a Regex,
}

impl<'a> ModeExpander<'a> {
    pub fn new(builder: DecayTreeBuilder<'a>, pattern: &'a Regex) -> Self {
        Self { builder, pattern }
    }

    /// Pairs the i-th selected mode of `root` with the i-th descriptor. The
    /// descriptor list decides how many pairs exist; extra modes are dropped.
    pub fn expand(&self, root: &str, descriptors: Vec<String>) -> ModeExpansion {
        let modes = self.builder.selected_modes(root);
        let mut expansion = ModeExpansion::default();

        for (mode, descriptor) in modes.iter().zip(descriptors) {
            expansion
                .descriptors
                .push(strip_marker_from_descriptor(&descriptor, self.pattern));
            expansion
                .trees
                .push(self.builder.build_traced(root, mode, &mut expansion.truncated));
        }

        expansion
    }
}

/// Expands every declared mode of `root` with the default signal marker.
pub fn expand_modes(
    root: &str,
    record: &MotherRecord,
    aliases: &AliasTable,
    descriptors: Vec<String>,
) -> ModeExpansion {
    let normalizer = AliasNormalizer::new(aliases, DEFAULT_SIGNAL_MARKER);
    let builder = DecayTreeBuilder::new(record, normalizer).with_selection(ModeSelection::AllModes);
    ModeExpander::new(builder, &DEFAULT_MARKER_PATTERN).expand(root, descriptors)
}
