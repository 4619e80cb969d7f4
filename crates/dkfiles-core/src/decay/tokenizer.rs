//! Descriptor tokenizer.
//!
//! Turns a free-text decay descriptor such as `[B0 -> K+ pi- {, gamma}]cc`
//! into the set of particle names it mentions. Names written without
//! whitespace between them (`K+pi-`) are split at the charge/primeness
//! suffix that ends the first name.

use crate::domain::DecayConventions;
use std::collections::BTreeSet;
use tracing::debug;

const SYNTAX_OPERATORS: [&str; 11] = ["=>", "->", "...", "[", "]", "(", ")", "{", "}", ",", ";"];
const LEADING_MARKERS: [char; 2] = ['~', '^'];
const NAME_SUFFIXES: [char; 5] = ['+', '-', '0', '*', '\''];
const ANTI_PREFIX: &str = "anti-";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenizedDescriptor {
    /// Lower-cased particle names.
    pub particles: BTreeSet<String>,
    /// Glued tokens kept whole because no clean split exists.
    pub ambiguous_tokens: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorTokenizer {
    conventions: DecayConventions,
}

impl DescriptorTokenizer {
    pub fn from_conventions(conventions: &DecayConventions) -> Self {
        Self {
            conventions: conventions.clone(),
        }
    }

    pub fn tokenize(&self, descriptor: &str) -> TokenizedDescriptor {
        let mut tokenized = TokenizedDescriptor::default();
        let padded = pad_syntax_operators(descriptor);

        for token in padded.split_whitespace() {
            if SYNTAX_OPERATORS.contains(&token) || self.conventions.is_ignored_keyword(token) {
                continue;
            }
            if !is_particle_candidate(token) {
                continue;
            }

            match split_glued_token(token, &self.conventions.signal_marker) {
                GluedSplit::Pieces(pieces) => {
                    for piece in pieces {
                        if !self.conventions.is_ignored_keyword(piece) {
                            tokenized.particles.insert(piece.to_lowercase());
                        }
                    }
                }
                GluedSplit::Ambiguous => {
                    debug!(token, "keeping glued descriptor token unsplit");
                    let lowered = token.to_lowercase();
                    tokenized.ambiguous_tokens.insert(lowered.clone());
                    tokenized.particles.insert(lowered);
                }
            }
        }

        tokenized
    }
}

pub fn tokenize(descriptor: &str) -> BTreeSet<String> {
    DescriptorTokenizer::default().tokenize(descriptor).particles
}

fn pad_syntax_operators(descriptor: &str) -> String {
    let mut padded = descriptor.to_string();
    for operator in SYNTAX_OPERATORS {
        padded = padded.replace(operator, &format!(" {operator} "));
    }
    padded
}

fn starts_name(character: char) -> bool {
    character.is_alphanumeric() || LEADING_MARKERS.contains(&character)
}

fn is_particle_candidate(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    starts_name(first) && !token.chars().all(|character| character.is_ascii_digit())
}

enum GluedSplit<'a> {
    Pieces(Vec<&'a str>),
    Ambiguous,
}

fn split_glued_token<'a>(token: &'a str, marker: &str) -> GluedSplit<'a> {
    let characters: Vec<(usize, char)> = token.char_indices().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    for window in characters.windows(2) {
        let (index, character) = window[0];
        let (next_index, next) = window[1];

        if is_anti_hyphen(token, start, index) {
            continue;
        }

        if NAME_SUFFIXES.contains(&character)
            && !NAME_SUFFIXES.contains(&next)
            && starts_name(next)
            && !is_trailing_marker(&token[next_index..], marker)
        {
            pieces.push(&token[start..next_index]);
            start = next_index;
        }
    }
    pieces.push(&token[start..]);

    if pieces.len() > 1 && !pieces.iter().all(|piece| is_particle_candidate(piece)) {
        return GluedSplit::Ambiguous;
    }
    GluedSplit::Pieces(pieces)
}

/// `B0sig` is one marked name, not `B0` glued to `sig`.
fn is_trailing_marker(rest: &str, marker: &str) -> bool {
    if marker.is_empty() || rest.len() < marker.len() || !rest.is_char_boundary(marker.len()) {
        return false;
    }
    let (head, tail) = rest.split_at(marker.len());
    head.eq_ignore_ascii_case(marker)
        && tail
            .chars()
            .next()
            .is_none_or(|character| !character.is_alphanumeric())
}

/// The hyphen of a leading `anti-` belongs to the name, not to a charge.
fn is_anti_hyphen(token: &str, piece_start: usize, index: usize) -> bool {
    index + 1 == piece_start + ANTI_PREFIX.len()
        && token
            .get(piece_start..piece_start + ANTI_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ANTI_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::{DescriptorTokenizer, tokenize};
    use crate::domain::DecayConventions;
    use std::collections::BTreeSet;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn glued_charged_particles_are_split() {
        assert_eq!(tokenize("K+pi-"), set(&["k+", "pi-"]));
        assert_eq!(tokenize("mu+mu-"), set(&["mu+", "mu-"]));
        assert_eq!(tokenize("pi0pi0"), set(&["pi0"]));
    }

    #[test]
    fn consecutive_suffixes_do_not_split() {
        assert_eq!(tokenize("K*0"), set(&["k*0"]));
        assert_eq!(tokenize("D*+"), set(&["d*+"]));
        assert_eq!(tokenize("eta'"), set(&["eta'"]));
    }

    #[test]
    fn anti_prefix_hyphen_is_part_of_the_name() {
        assert_eq!(tokenize("anti-B0"), set(&["anti-b0"]));
        assert_eq!(tokenize("K+anti-K*0"), set(&["k+", "anti-k*0"]));
    }

    #[test]
    fn syntax_keywords_and_numbers_are_discarded() {
        let tokens = tokenize("[B0 => (K*0 -> K+ pi-) ... mu+ mu-]CC 3 PHOTOS ; ,");
        assert_eq!(tokens, set(&["b0", "k*0", "k+", "pi-", "mu+", "mu-"]));
    }

    #[test]
    fn keywords_glued_to_a_name_are_dropped() {
        assert_eq!(tokenize("[B0 -> K+pi-]cc"), set(&["b0", "k+", "pi-"]));
        assert_eq!(tokenize("K+cc"), set(&["k+"]));
        assert_eq!(tokenize("mu+PHOTOS"), set(&["mu+"]));
    }

    #[test]
    fn leading_markers_are_allowed_but_other_symbols_are_not() {
        assert_eq!(tokenize("^K+ ~chi_10 @foo +"), set(&["^k+", "~chi_10"]));
    }

    #[test]
    fn descriptor_with_radiative_photon_keeps_gamma() {
        assert_eq!(
            tokenize("B0sig -> K+ pi- {, gamma}"),
            set(&["b0sig", "k+", "pi-", "gamma"])
        );
        assert_eq!(tokenize("B_s0SIG -> pi0sigma+"), set(&["b_s0sig", "pi0", "sigma+"]));
    }

    #[test]
    fn unsplittable_glued_token_is_reported_and_kept_whole() {
        let tokenized = DescriptorTokenizer::default().tokenize("X+1 K+");

        assert_eq!(tokenized.particles, set(&["x+1", "k+"]));
        assert_eq!(tokenized.ambiguous_tokens, set(&["x+1"]));
    }

    #[test]
    fn tokenizing_is_idempotent_on_its_output() {
        let descriptors = [
            "[B0 -> (J/psi(1S) -> mu+mu-) (K*(892)0 -> K+ pi-)]cc",
            "[Lambda_b0 -> p+ K- anti-K*0 {,gamma}]cc",
            "B_s0 -> (phi(1020) -> K+K-) X+1 eta'",
            "K+cc pi-os",
            "",
        ];

        for descriptor in descriptors {
            let first = tokenize(descriptor);
            let joined = first.iter().cloned().collect::<Vec<_>>().join(" ");
            assert_eq!(tokenize(&joined), first, "descriptor: {descriptor}");
        }
    }

    #[test]
    fn configured_keywords_replace_the_defaults() {
        let conventions = DecayConventions {
            ignored_keywords: vec!["gamma".to_string()],
            ..DecayConventions::default()
        };
        let tokenized =
            DescriptorTokenizer::from_conventions(&conventions).tokenize("B0 -> K+ pi- gamma cc");

        assert_eq!(tokenized.particles, set(&["b0", "k+", "pi-", "cc"]));
    }
}
