pub mod errors;

pub use errors::{DkError, DkErrorCategory, DkResult, ParserResult, PipelineResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conventional suffix marking the signal particle of a decay file.
pub const DEFAULT_SIGNAL_MARKER: &str = "sig";

/// Charge-conjugation markers and generator names that show up in descriptors
/// but never name a particle.
pub const DEFAULT_IGNORED_KEYWORDS: [&str; 8] =
    ["cc", "os", "ss", "pp", "photos", "pythia", "evtgen", "jetset"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecayConventions {
    pub signal_marker: String,
    pub ignored_keywords: Vec<String>,
    /// Drop a `CDecay` root when the mother it mirrors is also a root.
    pub fold_conjugate_roots: bool,
}

impl Default for DecayConventions {
    fn default() -> Self {
        Self {
            signal_marker: DEFAULT_SIGNAL_MARKER.to_string(),
            ignored_keywords: DEFAULT_IGNORED_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
            fold_conjugate_roots: false,
        }
    }
}

impl DecayConventions {
    pub fn carries_marker(&self, raw_name: &str) -> bool {
        contains_ignore_ascii_case(raw_name, &self.signal_marker)
    }

    pub fn is_ignored_keyword(&self, token: &str) -> bool {
        self.ignored_keywords
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(token))
    }
}

/// One decay channel of a mother: branching fraction, ordered daughters and
/// the generator model closing the line.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayMode {
    pub branching_fraction: f64,
    pub daughters: Vec<String>,
    pub model: String,
    pub model_params: Vec<String>,
}

impl DecayMode {
    pub fn new(
        branching_fraction: f64,
        daughters: Vec<String>,
        model: impl Into<String>,
        model_params: Vec<String>,
    ) -> Self {
        Self {
            branching_fraction,
            daughters,
            model: model.into(),
            model_params,
        }
    }

    pub fn from_daughters<I, S>(daughters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            1.0,
            daughters.into_iter().map(Into::into).collect(),
            "PHSP",
            Vec::new(),
        )
    }
}

/// Declared mothers in file order with their decay modes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotherRecord {
    order: Vec<String>,
    modes: BTreeMap<String, Vec<DecayMode>>,
    conjugate_sources: BTreeMap<String, String>,
}

impl MotherRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and leaves the record untouched when `mother` is
    /// already declared.
    pub fn insert(&mut self, mother: impl Into<String>, modes: Vec<DecayMode>) -> bool {
        let mother = mother.into();
        if self.modes.contains_key(&mother) {
            return false;
        }
        self.order.push(mother.clone());
        self.modes.insert(mother, modes);
        true
    }

    /// Inserts a mother whose modes were derived from `source` by charge
    /// conjugation.
    pub fn insert_conjugate(
        &mut self,
        mother: impl Into<String>,
        source: impl Into<String>,
        modes: Vec<DecayMode>,
    ) -> bool {
        let mother = mother.into();
        if !self.insert(mother.clone(), modes) {
            return false;
        }
        self.conjugate_sources.insert(mother, source.into());
        true
    }

    pub fn conjugate_source(&self, name: &str) -> Option<&str> {
        self.conjugate_sources.get(name).map(String::as_str)
    }

    pub fn mother_names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modes.contains_key(name)
    }

    pub fn modes(&self, name: &str) -> &[DecayMode] {
        self.modes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first_mode(&self, name: &str) -> Option<&DecayMode> {
        self.modes(name).first()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DecayMode])> {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.modes(name)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn from_daughter_lists<M, S>(entries: impl IntoIterator<Item = (S, Vec<M>)>) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        S: Into<String>,
    {
        let mut record = Self::new();
        for (mother, modes) in entries {
            let modes = modes.into_iter().map(DecayMode::from_daughters).collect();
            record.insert(mother, modes);
        }
        record
    }
}

/// Raw particle name to canonical name. Absent entries map to themselves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct AliasTable(BTreeMap<String, String>);

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.0.insert(alias.into(), target.into());
    }

    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Copy of the table keyed by lower-cased alias, for resolving tokenizer
    /// output which is always lower case.
    pub fn lowercased(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(alias, target)| (alias.to_lowercase(), target.to_lowercase()))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(alias, target)| (alias.as_str(), target.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<A, T> FromIterator<(A, T)> for AliasTable
where
    A: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (A, T)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(alias, target)| (alias.into(), target.into()))
                .collect(),
        )
    }
}

/// Symmetric `ChargeConj` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChargeConjTable(BTreeMap<String, String>);

impl ChargeConjTable {
    pub fn insert(&mut self, particle: impl Into<String>, partner: impl Into<String>) {
        let particle = particle.into();
        let partner = partner.into();
        self.0.insert(partner.clone(), particle.clone());
        self.0.insert(particle, partner);
    }

    pub fn partner(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Each declared pair once, lower name first.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(particle, partner)| particle <= partner)
            .map(|(particle, partner)| (particle.as_str(), partner.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Textual expansion of a root's decay modes as returned by a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorExpansion {
    Absent,
    Single(String),
    Many(Vec<String>),
}

impl DescriptorExpansion {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Absent => Vec::new(),
            Self::Single(descriptor) => vec![descriptor],
            Self::Many(descriptors) => descriptors,
        }
    }
}

/// Read-only view of one parsed decay file.
pub trait DecayCatalog {
    fn mother_record(&self) -> &MotherRecord;

    fn alias_table(&self) -> &AliasTable;

    /// Descriptor text per decay mode of `root`, with raw particle names.
    /// `marker` is the signal marker used to recognise names while
    /// expanding.
    fn expanded_descriptors(&self, root: &str, marker: &str) -> DescriptorExpansion;

    fn mother_names(&self) -> &[String] {
        self.mother_record().mother_names()
    }
}

/// Per-file condition recorded while cataloguing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecayIssue {
    TokenizationAmbiguity { token: String },
    NoQualifyingRoot { mother_count: usize },
    MultipleQualifyingRoots { roots: Vec<String> },
    CyclicDefinition { particle: String },
    MissingModeExpansion { root: String },
    InvalidGrammar { reason: String },
}

impl DecayIssue {
    /// Whether the issue forces the file onto the fallback descriptor.
    pub fn degrades_file(&self) -> bool {
        !matches!(
            self,
            Self::TokenizationAmbiguity { .. } | Self::CyclicDefinition { .. }
        )
    }

    /// The serialized `kind` tag.
    pub fn kind(&self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|value| value.get("kind").and_then(|kind| kind.as_str()).map(str::to_string))
            .unwrap_or_default()
    }
}

pub(crate) fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

pub(crate) fn strip_suffix_ignore_ascii_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    if suffix.is_empty() || value.len() < suffix.len() {
        return None;
    }
    let split = value.len() - suffix.len();
    if !value.is_char_boundary(split) {
        return None;
    }
    value[split..]
        .eq_ignore_ascii_case(suffix)
        .then(|| &value[..split])
}
