//! Descriptor tokenizing, alias normalization, root detection and decay-tree
//! reconstruction.

pub mod alias;
pub mod modes;
pub mod roots;
pub mod tokenizer;
pub mod tree;

pub use alias::{AliasNormalizer, normalize};
pub use modes::{
    ModeExpander, ModeExpansion, expand_modes, marker_pattern, strip_marker_from_descriptor,
};
pub use roots::{RootOutcome, classify_roots, detect_roots, fold_conjugate_roots, select_roots};
pub use tokenizer::{DescriptorTokenizer, TokenizedDescriptor, tokenize};
pub use tree::{DecayNode, DecayTree, DecayTreeBuilder, LabelStyle, ModeSelection, build_tree};
