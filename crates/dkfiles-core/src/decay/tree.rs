//! Recursive decay-tree construction.
//!
//! A tree is serialized as a nested JSON array, `["B0", "K+", ["J/psi", "mu+", "mu-"]]`:
//! the first element is the mother label, the rest are leaves or sub-trees in
//! daughter order.

use super::alias::AliasNormalizer;
use crate::domain::{AliasTable, DEFAULT_SIGNAL_MARKER, DecayMode, MotherRecord};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecayNode {
    Leaf(String),
    Decay(DecayTree),
}

impl DecayNode {
    pub fn label(&self) -> &str {
        match self {
            Self::Leaf(name) => name,
            Self::Decay(tree) => tree.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecayTree {
    pub mother: String,
    pub children: Vec<DecayNode>,
}

impl DecayTree {
    pub fn new(mother: impl Into<String>, children: Vec<DecayNode>) -> Self {
        Self {
            mother: mother.into(),
            children,
        }
    }

    pub fn label(&self) -> &str {
        &self.mother
    }

    /// Every label in the tree, mothers included.
    pub fn particles(&self) -> BTreeSet<String> {
        let mut particles = BTreeSet::new();
        self.collect_particles(&mut particles);
        particles
    }

    fn collect_particles(&self, particles: &mut BTreeSet<String>) {
        particles.insert(self.mother.clone());
        for child in &self.children {
            match child {
                DecayNode::Leaf(name) => {
                    particles.insert(name.clone());
                }
                DecayNode::Decay(tree) => tree.collect_particles(particles),
            }
        }
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                DecayNode::Leaf(_) => 0,
                DecayNode::Decay(tree) => tree.depth(),
            })
            .max()
            .unwrap_or(0)
    }
}

impl Display for DecayTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.mother)?;
        if self.children.is_empty() {
            return Ok(());
        }
        f.write_str(" ->")?;
        for child in &self.children {
            match child {
                DecayNode::Leaf(name) => write!(f, " {name}")?,
                DecayNode::Decay(tree) => write!(f, " ({tree})")?,
            }
        }
        Ok(())
    }
}

impl Serialize for DecayTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.children.len() + 1))?;
        seq.serialize_element(&self.mother)?;
        for child in &self.children {
            seq.serialize_element(child)?;
        }
        seq.end()
    }
}

impl Serialize for DecayNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Leaf(name) => serializer.serialize_str(name),
            Self::Decay(tree) => tree.serialize(serializer),
        }
    }
}

/// Which of a root's declared modes produce trees. Daughters are always
/// expanded through their first mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeSelection {
    FirstMode,
    #[default]
    AllModes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelStyle {
    /// Alias-resolved, marker-stripped names.
    #[default]
    Canonical,
    /// Names exactly as written in the decay file.
    Raw,
}

/// One frame of the current root-to-leaf path. Frames borrow their parent,
/// so sibling branches never observe each other's visits.
struct VisitedPath<'p> {
    raw: &'p str,
    canonical: String,
    parent: Option<&'p VisitedPath<'p>>,
}

impl VisitedPath<'_> {
    fn contains(&self, raw: &str, canonical: &str) -> bool {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if current.raw == raw || current.canonical == canonical {
                return true;
            }
            frame = current.parent;
        }
        false
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecayTreeBuilder<'a> {
    record: &'a MotherRecord,
    normalizer: AliasNormalizer<'a>,
    selection: ModeSelection,
    labels: LabelStyle,
}

impl<'a> DecayTreeBuilder<'a> {
    pub fn new(record: &'a MotherRecord, normalizer: AliasNormalizer<'a>) -> Self {
        Self {
            record,
            normalizer,
            selection: ModeSelection::default(),
            labels: LabelStyle::default(),
        }
    }

    pub fn with_selection(mut self, selection: ModeSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_labels(mut self, labels: LabelStyle) -> Self {
        self.labels = labels;
        self
    }

    /// Declared modes of `mother` retained by the selection strategy.
    pub fn selected_modes(&self, mother: &str) -> &'a [DecayMode] {
        let modes = self.record.modes(mother);
        match self.selection {
            ModeSelection::AllModes => modes,
            ModeSelection::FirstMode => &modes[..modes.len().min(1)],
        }
    }

    pub fn build(&self, mother: &str, mode: &DecayMode) -> DecayTree {
        self.build_traced(mother, mode, &mut BTreeSet::new())
    }

    /// Like [`Self::build`], recording in `truncated` every particle whose
    /// expansion was cut because it already sits on the current path.
    pub fn build_traced(
        &self,
        mother: &str,
        mode: &DecayMode,
        truncated: &mut BTreeSet<String>,
    ) -> DecayTree {
        let canonical = self.normalizer.normalize(mother);
        self.expand(mother, canonical, mode, None, truncated)
    }

    pub fn build_selected(&self, root: &str) -> Vec<DecayTree> {
        let mut truncated = BTreeSet::new();
        self.selected_modes(root)
            .iter()
            .map(|mode| self.build_traced(root, mode, &mut truncated))
            .collect()
    }

    fn expand(
        &self,
        mother: &str,
        canonical: String,
        mode: &DecayMode,
        parent: Option<&VisitedPath<'_>>,
        truncated: &mut BTreeSet<String>,
    ) -> DecayTree {
        let label = self.label(mother, &canonical);
        let frame = VisitedPath {
            raw: mother,
            canonical,
            parent,
        };

        let children = mode
            .daughters
            .iter()
            .map(|daughter| {
                match self.expand_daughter(daughter, &frame, truncated) {
                    Some(tree) => DecayNode::Decay(tree),
                    None => {
                        let canonical = self.normalizer.normalize(daughter);
                        DecayNode::Leaf(self.label(daughter, &canonical))
                    }
                }
            })
            .collect();

        DecayTree::new(label, children)
    }

    fn expand_daughter(
        &self,
        daughter: &str,
        path: &VisitedPath<'_>,
        truncated: &mut BTreeSet<String>,
    ) -> Option<DecayTree> {
        let mode = self.record.first_mode(daughter)?;
        let canonical = self.normalizer.normalize(daughter);
        if path.contains(daughter, &canonical) {
            debug!(particle = daughter, "cyclic decay definition truncated to a leaf");
            truncated.insert(daughter.to_string());
            return None;
        }
        Some(self.expand(daughter, canonical, mode, Some(path), truncated))
    }

    fn label(&self, raw: &str, canonical: &str) -> String {
        match self.labels {
            LabelStyle::Canonical => canonical.to_string(),
            LabelStyle::Raw => raw.to_string(),
        }
    }
}

/// Builds the canonical tree for one selected mode of `mother` using the
/// default signal marker.
pub fn build_tree(
    mother: &str,
    mode: &DecayMode,
    record: &MotherRecord,
    aliases: &AliasTable,
) -> DecayTree {
    let normalizer = AliasNormalizer::new(aliases, DEFAULT_SIGNAL_MARKER);
    DecayTreeBuilder::new(record, normalizer).build(mother, mode)
}

#[cfg(test)]
mod tests {
    use super::{DecayNode, DecayTree, DecayTreeBuilder, LabelStyle, ModeSelection, build_tree};
    use crate::decay::alias::AliasNormalizer;
    use crate::domain::{AliasTable, DecayMode, MotherRecord};
    use std::collections::BTreeSet;

    fn leaf(name: &str) -> DecayNode {
        DecayNode::Leaf(name.to_string())
    }

    fn first_mode(record: &MotherRecord, mother: &str) -> DecayMode {
        record
            .first_mode(mother)
            .cloned()
            .expect("mother should have a mode")
    }

    #[test]
    fn nested_mothers_are_expanded_with_canonical_labels() {
        let record = MotherRecord::from_daughter_lists([
            ("B0sig", vec![vec!["MyJ/psi", "K+", "pi-"]]),
            ("MyJ/psi", vec![vec!["mu+", "mu-"], vec!["e+", "e-"]]),
        ]);
        let aliases: AliasTable = [("MyJ/psi", "J/psi")].into_iter().collect();

        let tree = build_tree("B0sig", &first_mode(&record, "B0sig"), &record, &aliases);

        assert_eq!(
            tree,
            DecayTree::new(
                "B0",
                vec![
                    DecayNode::Decay(DecayTree::new("J/psi", vec![leaf("mu+"), leaf("mu-")])),
                    leaf("K+"),
                    leaf("pi-"),
                ]
            )
        );
        let json = serde_json::to_string(&tree).expect("tree should serialize");
        assert_eq!(json, r#"["B0",["J/psi","mu+","mu-"],"K+","pi-"]"#);
        assert_eq!(tree.to_string(), "B0 -> (J/psi -> mu+ mu-) K+ pi-");
    }

    #[test]
    fn mutual_recursion_terminates_with_leaf() {
        let record =
            MotherRecord::from_daughter_lists([("A", vec![vec!["B"]]), ("B", vec![vec!["A"]])]);
        let aliases = AliasTable::new();
        let normalizer = AliasNormalizer::new(&aliases, "sig");
        let builder = DecayTreeBuilder::new(&record, normalizer);
        let mut truncated = BTreeSet::new();

        let tree = builder.build_traced("A", &first_mode(&record, "A"), &mut truncated);

        assert_eq!(
            serde_json::to_string(&tree).expect("tree should serialize"),
            r#"["A",["B","A"]]"#
        );
        assert_eq!(tree.depth(), 2);
        assert_eq!(truncated, BTreeSet::from(["A".to_string()]));
    }

    #[test]
    fn self_reference_is_cut_immediately() {
        let record = MotherRecord::from_daughter_lists([("X", vec![vec!["X", "gamma"]])]);
        let tree = build_tree("X", &first_mode(&record, "X"), &record, &AliasTable::new());

        assert_eq!(tree, DecayTree::new("X", vec![leaf("X"), leaf("gamma")]));
    }

    #[test]
    fn alias_equivalent_names_count_as_visited() {
        let record = MotherRecord::from_daughter_lists([
            ("B0sig", vec![vec!["B0"]]),
            ("B0", vec![vec!["B0sig"]]),
        ]);
        let tree = build_tree("B0sig", &first_mode(&record, "B0sig"), &record, &AliasTable::new());

        assert_eq!(tree, DecayTree::new("B0", vec![leaf("B0")]));
    }

    #[test]
    fn sibling_branches_expand_independently() {
        let record = MotherRecord::from_daughter_lists([
            ("Rsig", vec![vec!["X", "X"]]),
            ("X", vec![vec!["Y", "z"]]),
            ("Y", vec![vec!["w"]]),
        ]);
        let tree = build_tree("Rsig", &first_mode(&record, "Rsig"), &record, &AliasTable::new());

        assert_eq!(
            serde_json::to_string(&tree).expect("tree should serialize"),
            r#"["R",["X",["Y","w"],"z"],["X",["Y","w"],"z"]]"#
        );
        assert_eq!(
            tree.particles(),
            ["R", "X", "Y", "w", "z"]
                .into_iter()
                .map(String::from)
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn long_cycle_depth_is_bounded_by_distinct_particles() {
        let names: Vec<String> = (0..50).map(|index| format!("P{index}")).collect();
        let mut entries = Vec::new();
        for (index, name) in names.iter().enumerate() {
            let next = names[(index + 1) % names.len()].clone();
            entries.push((name.clone(), vec![vec![next]]));
        }
        let record = MotherRecord::from_daughter_lists(entries);
        let tree = build_tree("P0", &first_mode(&record, "P0"), &record, &AliasTable::new());

        assert_eq!(tree.depth(), names.len());
    }

    #[test]
    fn mother_without_modes_stays_a_leaf() {
        let mut record = MotherRecord::from_daughter_lists([("Asig", vec![vec!["B", "C"]])]);
        record.insert("B", Vec::new());

        let tree = build_tree("Asig", &first_mode(&record, "Asig"), &record, &AliasTable::new());
        assert_eq!(tree, DecayTree::new("A", vec![leaf("B"), leaf("C")]));
    }

    #[test]
    fn raw_labels_and_first_mode_selection() {
        let record = MotherRecord::from_daughter_lists([
            ("D*+sig", vec![vec!["MyD0", "pi+"], vec!["D+", "pi0"]]),
            ("MyD0", vec![vec!["K-", "pi+"]]),
        ]);
        let aliases: AliasTable = [("MyD0", "D0")].into_iter().collect();
        let normalizer = AliasNormalizer::new(&aliases, "sig");

        let raw = DecayTreeBuilder::new(&record, normalizer).with_labels(LabelStyle::Raw);
        let all = raw.build_selected("D*+sig");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].to_string(), "D*+sig -> (MyD0 -> K- pi+) pi+");
        assert_eq!(all[1].to_string(), "D*+sig -> D+ pi0");

        let first = raw.with_selection(ModeSelection::FirstMode);
        assert_eq!(first.selected_modes("D*+sig").len(), 1);
        assert!(first.selected_modes("pi+").is_empty());
    }
}
