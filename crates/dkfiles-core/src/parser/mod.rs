//! EvtGen decay-file reader.
//!
//! Produces the mother → mode → daughter records, alias table and
//! charge-conjugation pairs of one `.dec` file. Statements other than decay
//! modes occupy one line; a decay mode may span lines and ends at `;`.

pub mod header;

pub use header::{DecHeader, read_header};

use crate::decay::{AliasNormalizer, DecayTreeBuilder, LabelStyle, ModeSelection};
use crate::domain::{
    AliasTable, ChargeConjTable, DecayCatalog, DecayMode,
    DescriptorExpansion, DkError, MotherRecord, ParserResult,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const MODE_TERMINATOR: &str = ";";
const PHOTOS_FLAG: &str = "PHOTOS";
const ANTI_PREFIX: &str = "anti-";

const KNOWN_MODELS: [&str; 72] = [
    "BaryonPCR",
    "BC_SMN",
    "BC_TMN",
    "BC_VMN",
    "BCL",
    "BGL",
    "BSTOGLLISRFSR",
    "BSTOGLLMNT",
    "BTO3PI_CP",
    "BTODDALITZCPK",
    "BTOKPIPI",
    "BTOSLLALI",
    "BTOSLLBALL",
    "BTOSLLMS",
    "BTOVLNUBALL",
    "BTOXSGAMMA",
    "BTOXSLL",
    "CLN",
    "D_DALITZ",
    "D_hhhh",
    "DMIX",
    "DToKpienu",
    "ETA_DALITZ",
    "ETA2MUMUGAMMA",
    "FLATQ2",
    "FLATSQDALITZ",
    "GENERIC_DALITZ",
    "GOITY_ROBERTS",
    "HELAMP",
    "HQET",
    "HQET2",
    "ISGW",
    "ISGW2",
    "JETSET",
    "KKLAMBDAC",
    "KSTARNUNU",
    "LAMBDAB2LAMBDAV",
    "Lb2Lll",
    "LbAmpGen",
    "LLSW",
    "LNUGAMMA",
    "OMEGA_DALITZ",
    "PARTWAVE",
    "PHOTOS",
    "PHSP",
    "PHSPDECAYTIMECUT",
    "PHSPFLATLIFETIME",
    "PI0_DALITZ",
    "PYTHIA",
    "SLN",
    "SLPOLE",
    "SSD_CP",
    "SSD_DirectCP",
    "SSS_CP",
    "STS",
    "STS_CP",
    "SVP_HELAMP",
    "SVS",
    "SVS_CP",
    "SVV_CP",
    "SVV_HELAMP",
    "SVV_NONCPEIGEN",
    "TAUHADNU",
    "TAULNUNU",
    "TAUOLA",
    "TAUSCALARNU",
    "TAUVECTORNU",
    "TSS",
    "VLL",
    "VSP_PWAVE",
    "VSS",
    "VSS_BMIX",
];

/// Parsed contents of one decay file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecFile {
    record: MotherRecord,
    aliases: AliasTable,
    charge_conj: ChargeConjTable,
    definitions: BTreeMap<String, String>,
    model_aliases: BTreeSet<String>,
}

impl DecFile {
    pub fn charge_conj(&self) -> &ChargeConjTable {
        &self.charge_conj
    }

    fn is_model_name(&self, token: &str) -> bool {
        KNOWN_MODELS.contains(&token) || self.model_aliases.contains(token)
    }

    fn is_model_parameter(&self, token: &str) -> bool {
        token.parse::<f64>().is_ok() || self.definitions.contains_key(token)
    }
}

impl DecayCatalog for DecFile {
    fn mother_record(&self) -> &MotherRecord {
        &self.record
    }

    fn alias_table(&self) -> &AliasTable {
        &self.aliases
    }

    fn expanded_descriptors(&self, root: &str, marker: &str) -> DescriptorExpansion {
        let normalizer = AliasNormalizer::new(&self.aliases, marker);
        let mut descriptors: Vec<String> = DecayTreeBuilder::new(&self.record, normalizer)
            .with_selection(ModeSelection::AllModes)
            .with_labels(LabelStyle::Raw)
            .build_selected(root)
            .iter()
            .map(ToString::to_string)
            .collect();

        match descriptors.len() {
            0 => DescriptorExpansion::Absent,
            1 => DescriptorExpansion::Single(descriptors.remove(0)),
            _ => DescriptorExpansion::Many(descriptors),
        }
    }
}

enum Declaration {
    Block {
        mother: String,
        modes: Vec<DecayMode>,
        line: usize,
    },
    Conjugate {
        mother: String,
        line: usize,
    },
    Copy {
        target: String,
        source: String,
        line: usize,
    },
}

struct OpenBlock {
    mother: String,
    line: usize,
    modes: Vec<DecayMode>,
    pending: Vec<String>,
    pending_line: usize,
}

impl OpenBlock {
    fn new(mother: &str, line: usize) -> Self {
        Self {
            mother: mother.to_string(),
            line,
            modes: Vec::new(),
            pending: Vec::new(),
            pending_line: line,
        }
    }

    fn push_tokens(&mut self, tokens: &[&str], line: usize, file: &DecFile) -> ParserResult<()> {
        for token in tokens {
            if *token == MODE_TERMINATOR {
                let mode = parse_mode(&self.pending, self.pending_line, &self.mother, file)?;
                self.modes.push(mode);
                self.pending.clear();
                continue;
            }
            if self.pending.is_empty() {
                self.pending_line = line;
            }
            self.pending.push((*token).to_string());
        }
        Ok(())
    }

    fn close(self, line: usize) -> ParserResult<Declaration> {
        if !self.pending.is_empty() {
            return Err(DkError::input_validation(
                "INPUT.DEC_UNTERMINATED_MODE",
                format!(
                    "decay mode of '{}' starting at line {} is not terminated by ';' before Enddecay at line {}",
                    self.mother, self.pending_line, line
                ),
            ));
        }
        Ok(Declaration::Block {
            mother: self.mother,
            modes: self.modes,
            line: self.line,
        })
    }
}

pub fn parse_dec_source(source: &str) -> ParserResult<DecFile> {
    let mut file = DecFile::default();
    let mut declarations = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        let tokens = line_tokens(raw_line);
        let Some(&directive) = tokens.first() else {
            continue;
        };

        if let Some(mut block) = open.take() {
            if directive == "Enddecay" {
                declarations.push(block.close(line)?);
            } else {
                block.push_tokens(&tokens, line, &file)?;
                open = Some(block);
            }
            continue;
        }

        match directive {
            "Alias" => {
                let args = directive_args(&tokens, 2, line)?;
                file.aliases.insert(args[0], args[1]);
            }
            "ChargeConj" => {
                let args = directive_args(&tokens, 2, line)?;
                file.charge_conj.insert(args[0], args[1]);
            }
            "Define" => {
                let args = directive_args(&tokens, 2, line)?;
                file.definitions
                    .insert(args[0].to_string(), args[1].to_string());
            }
            "ModelAlias" => {
                let args = directive_args(&tokens, 1, line)?;
                file.model_aliases.insert(args[0].to_string());
            }
            "Decay" => {
                let args = directive_args(&tokens, 1, line)?;
                open = Some(OpenBlock::new(args[0], line));
            }
            "CDecay" => {
                let args = directive_args(&tokens, 1, line)?;
                declarations.push(Declaration::Conjugate {
                    mother: args[0].to_string(),
                    line,
                });
            }
            "CopyDecay" => {
                let args = directive_args(&tokens, 2, line)?;
                declarations.push(Declaration::Copy {
                    target: args[0].to_string(),
                    source: args[1].to_string(),
                    line,
                });
            }
            "End" => break,
            other => debug!(directive = other, line, "ignoring decay-file directive"),
        }
    }

    if let Some(block) = open {
        return Err(DkError::input_validation(
            "INPUT.DEC_UNTERMINATED_DECAY",
            format!(
                "decay block for '{}' opened at line {} has no Enddecay",
                block.mother, block.line
            ),
        ));
    }

    file.record = resolve_declarations(declarations, &file.charge_conj)?;
    Ok(file)
}

fn resolve_declarations(
    declarations: Vec<Declaration>,
    charge_conj: &ChargeConjTable,
) -> ParserResult<MotherRecord> {
    let mut blocks: BTreeMap<String, Vec<DecayMode>> = BTreeMap::new();
    for declaration in &declarations {
        if let Declaration::Block { mother, modes, .. } = declaration {
            blocks
                .entry(mother.clone())
                .or_insert_with(|| modes.clone());
        }
    }

    let mut record = MotherRecord::new();
    for declaration in declarations {
        let (mother, line, inserted) = match declaration {
            Declaration::Block { mother, modes, line } => {
                let inserted = record.insert(mother.clone(), modes);
                (mother, line, inserted)
            }
            Declaration::Conjugate { mother, line } => {
                let partner = conjugate_mother(&mother, charge_conj);
                let source = blocks.get(&partner).ok_or_else(|| {
                    DkError::input_validation(
                        "INPUT.DEC_CDECAY_PARTNER",
                        format!(
                            "CDecay '{}' at line {} refers to '{}', which has no decay block",
                            mother, line, partner
                        ),
                    )
                })?;
                let modes = source
                    .iter()
                    .map(|mode| conjugate_mode(mode, charge_conj))
                    .collect();
                let inserted = record.insert_conjugate(mother.clone(), partner, modes);
                (mother, line, inserted)
            }
            Declaration::Copy {
                target,
                source,
                line,
            } => {
                let modes = blocks
                    .get(&source)
                    .cloned()
                    .or_else(|| record.contains(&source).then(|| record.modes(&source).to_vec()))
                    .ok_or_else(|| {
                        DkError::input_validation(
                            "INPUT.DEC_COPYDECAY_SOURCE",
                            format!(
                                "CopyDecay '{}' at line {} refers to undeclared '{}'",
                                target, line, source
                            ),
                        )
                    })?;
                let inserted = record.insert(target.clone(), modes);
                (target, line, inserted)
            }
        };

        if !inserted {
            warn!(mother = %mother, line, "duplicate decay declaration ignored");
        }
    }

    Ok(record)
}

fn parse_mode(
    tokens: &[String],
    line: usize,
    mother: &str,
    file: &DecFile,
) -> ParserResult<DecayMode> {
    let Some((fraction, rest)) = tokens.split_first() else {
        return Err(DkError::input_validation(
            "INPUT.DEC_EMPTY_MODE",
            format!("empty decay mode of '{}' at line {}", mother, line),
        ));
    };
    let branching_fraction = fraction.parse::<f64>().map_err(|_| {
        DkError::input_validation(
            "INPUT.DEC_BRANCHING_FRACTION",
            format!(
                "decay mode of '{}' at line {} starts with '{}' instead of a branching fraction",
                mother, line, fraction
            ),
        )
    })?;

    let model_index = rest
        .iter()
        .position(|token| file.is_model_name(token))
        .or_else(|| fallback_model_index(rest, file));
    let (daughters, model_tokens) = match model_index {
        Some(index) => rest.split_at(index),
        None => (rest, &rest[rest.len()..]),
    };

    let mut model_tokens = model_tokens.iter();
    let mut model = model_tokens.next().cloned().unwrap_or_default();
    if model == PHOTOS_FLAG
        && let Some(next) = model_tokens.next()
    {
        model = next.clone();
    }

    Ok(DecayMode::new(
        branching_fraction,
        daughters.to_vec(),
        model,
        model_tokens.cloned().collect(),
    ))
}

/// Unknown model names are recognised as an upper-case identifier followed
/// only by numeric or `Define`d parameters.
fn fallback_model_index(rest: &[String], file: &DecFile) -> Option<usize> {
    (1..rest.len()).find(|&index| {
        is_upper_identifier(&rest[index])
            && rest[index + 1..]
                .iter()
                .all(|token| file.is_model_parameter(token))
    })
}

fn is_upper_identifier(token: &str) -> bool {
    let mut characters = token.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_uppercase())
        && characters.all(|character| {
            character.is_ascii_uppercase() || character.is_ascii_digit() || character == '_'
        })
}

fn conjugate_mode(mode: &DecayMode, charge_conj: &ChargeConjTable) -> DecayMode {
    DecayMode::new(
        mode.branching_fraction,
        mode.daughters
            .iter()
            .map(|daughter| {
                charge_conj
                    .partner(daughter)
                    .map(str::to_string)
                    .or_else(|| flip_charge(daughter))
                    .unwrap_or_else(|| daughter.clone())
            })
            .collect(),
        mode.model.clone(),
        mode.model_params.clone(),
    )
}

/// Partner whose block a `CDecay` mother mirrors. Neutral names without an
/// `anti-` spelling map to their `anti-` form.
fn conjugate_mother(mother: &str, charge_conj: &ChargeConjTable) -> String {
    charge_conj
        .partner(mother)
        .map(str::to_string)
        .or_else(|| flip_charge(mother))
        .unwrap_or_else(|| format!("{ANTI_PREFIX}{mother}"))
}

/// Drops an `anti-` spelling or swaps the last charge sign.
fn flip_charge(name: &str) -> Option<String> {
    if let Some(index) = name.find(ANTI_PREFIX) {
        return Some(format!(
            "{}{}",
            &name[..index],
            &name[index + ANTI_PREFIX.len()..]
        ));
    }
    let index = name.rfind(['+', '-'])?;
    let flipped = if name[index..].starts_with('+') { '-' } else { '+' };
    Some(format!("{}{}{}", &name[..index], flipped, &name[index + 1..]))
}

fn directive_args<'t>(tokens: &[&'t str], count: usize, line: usize) -> ParserResult<Vec<&'t str>> {
    let args = &tokens[1..];
    if args.len() < count {
        return Err(DkError::input_validation(
            "INPUT.DEC_DIRECTIVE_ARGUMENTS",
            format!(
                "directive '{}' at line {} expects {} argument(s), found {}",
                tokens[0],
                line,
                count,
                args.len()
            ),
        ));
    }
    Ok(args.to_vec())
}

fn line_tokens(line: &str) -> Vec<&str> {
    let content = line.split_once('#').map_or(line, |(before, _)| before);
    let mut tokens = Vec::new();
    for word in content.split_whitespace() {
        for piece in word.split_inclusive(';') {
            match piece.strip_suffix(';') {
                Some(stem) => {
                    if !stem.is_empty() {
                        tokens.push(stem);
                    }
                    tokens.push(MODE_TERMINATOR);
                }
                None => tokens.push(piece),
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::{conjugate_mother, flip_charge, line_tokens, parse_dec_source};
    use crate::domain::ChargeConjTable;
    use crate::domain::{DecayCatalog, DescriptorExpansion, DkErrorCategory};

    const BD_KSTGAMMA: &str = "\
# EventType: 11102202
# Descriptor: [B0 -> (K*0 -> K+ pi-) gamma]cc
Alias      MyK*0      K*0
Alias      Myanti-K*0 anti-K*0
ChargeConj MyK*0      Myanti-K*0
Define dm 0.507e12
#
Decay B0sig
1.000        MyK*0     gamma          HELAMP 1.0 0.0 1.0 0.0;
Enddecay
CDecay anti-B0sig
#
Decay MyK*0
1.000        K+        pi-                    VSS;
Enddecay
CDecay Myanti-K*0
End
";

    #[test]
    fn line_tokens_split_terminators_and_drop_comments() {
        assert_eq!(
            line_tokens("0.5 K+ pi-   PHSP; # comment"),
            vec!["0.5", "K+", "pi-", "PHSP", ";"]
        );
        assert_eq!(line_tokens("VSS ;;"), vec!["VSS", ";", ";"]);
        assert!(line_tokens("   # only a comment").is_empty());
    }

    #[test]
    fn decay_blocks_aliases_and_conjugates_are_read() {
        let file = parse_dec_source(BD_KSTGAMMA).expect("decay file should parse");

        assert_eq!(
            file.mother_names(),
            ["B0sig", "anti-B0sig", "MyK*0", "Myanti-K*0"]
        );
        assert_eq!(file.alias_table().resolve("MyK*0"), "K*0");
        assert_eq!(file.charge_conj().partner("MyK*0"), Some("Myanti-K*0"));

        let b0 = &file.mother_record().modes("B0sig")[0];
        assert_eq!(b0.daughters, vec!["MyK*0".to_string(), "gamma".to_string()]);
        assert_eq!(b0.model, "HELAMP");
        assert_eq!(b0.model_params.len(), 4);

        let anti_b0 = &file.mother_record().modes("anti-B0sig")[0];
        assert_eq!(
            anti_b0.daughters,
            vec!["Myanti-K*0".to_string(), "gamma".to_string()]
        );
        let anti_kst = &file.mother_record().modes("Myanti-K*0")[0];
        assert_eq!(anti_kst.daughters, vec!["K-".to_string(), "pi+".to_string()]);
    }

    #[test]
    fn multi_line_modes_photos_flag_and_unknown_models() {
        let source = "\
Define alpha 0.3
Decay B+sig
0.6 J/psi
    K+ PHOTOS SVS;
0.4 K+ mu+ mu- MYMODEL 1.0 alpha;
Enddecay
";
        let file = parse_dec_source(source).expect("decay file should parse");
        let modes = file.mother_record().modes("B+sig");

        assert_eq!(modes.len(), 2);
        assert_eq!(modes[0].daughters, vec!["J/psi".to_string(), "K+".to_string()]);
        assert_eq!(modes[0].model, "SVS");
        assert_eq!(
            modes[1].daughters,
            vec!["K+".to_string(), "mu+".to_string(), "mu-".to_string()]
        );
        assert_eq!(modes[1].model, "MYMODEL");
        assert!((modes[1].branching_fraction - 0.4).abs() < 1e-12);
    }

    #[test]
    fn model_aliases_close_daughter_lists() {
        let source = "\
ModelAlias MyHelamp HELAMP 1.0 0.0;
Decay B0sig
1.0 J/psi K_S0 MyHelamp;
Enddecay
";
        let file = parse_dec_source(source).expect("decay file should parse");
        let mode = &file.mother_record().modes("B0sig")[0];

        assert_eq!(mode.daughters, vec!["J/psi".to_string(), "K_S0".to_string()]);
        assert_eq!(mode.model, "MyHelamp");
    }

    #[test]
    fn copy_decay_duplicates_modes_and_duplicates_keep_first() {
        let source = "\
Decay MyD0
1.0 K- pi+ PHSP;
Enddecay
CopyDecay MyOtherD0 MyD0
Decay MyD0
1.0 K- K+ PHSP;
Enddecay
";
        let file = parse_dec_source(source).expect("decay file should parse");

        assert_eq!(file.mother_names(), ["MyD0", "MyOtherD0"]);
        assert_eq!(
            file.mother_record().modes("MyOtherD0")[0].daughters,
            vec!["K-".to_string(), "pi+".to_string()]
        );
    }

    #[test]
    fn expanded_descriptors_follow_modes_with_raw_names() {
        let file = parse_dec_source(BD_KSTGAMMA).expect("decay file should parse");

        assert_eq!(
            file.expanded_descriptors("B0sig", "sig"),
            DescriptorExpansion::Single("B0sig -> (MyK*0 -> K+ pi-) gamma".to_string())
        );
        assert_eq!(file.expanded_descriptors("pi+", "sig"), DescriptorExpansion::Absent);
    }

    #[test]
    fn expansion_recognises_names_with_the_given_marker() {
        let source = "\
Decay B_SIGNAL
1.0 B PHSP;
Enddecay
Decay B
1.0 K+ pi- PHSP;
Enddecay
";
        let file = parse_dec_source(source).expect("decay file should parse");

        // With `_SIGNAL` as marker the daughter `B` is the root itself.
        assert_eq!(
            file.expanded_descriptors("B_SIGNAL", "_SIGNAL"),
            DescriptorExpansion::Single("B_SIGNAL -> B".to_string())
        );
        assert_eq!(
            file.expanded_descriptors("B_SIGNAL", "sig"),
            DescriptorExpansion::Single("B_SIGNAL -> (B -> K+ pi-)".to_string())
        );
    }

    #[test]
    fn structural_errors_are_input_validation_errors() {
        let cases = [
            ("Decay B0sig\n1.0 K+ pi- PHSP;\n", "INPUT.DEC_UNTERMINATED_DECAY"),
            ("Decay B0sig\n1.0 K+ pi- PHSP\nEnddecay\n", "INPUT.DEC_UNTERMINATED_MODE"),
            ("Decay B0sig\nK+ pi- PHSP;\nEnddecay\n", "INPUT.DEC_BRANCHING_FRACTION"),
            ("CDecay anti-B0sig\n", "INPUT.DEC_CDECAY_PARTNER"),
            ("CopyDecay A B\n", "INPUT.DEC_COPYDECAY_SOURCE"),
            ("Alias B0sig\n", "INPUT.DEC_DIRECTIVE_ARGUMENTS"),
        ];

        for (source, placeholder) in cases {
            let error = parse_dec_source(source).expect_err("source should be rejected");
            assert_eq!(error.category(), DkErrorCategory::InputValidationError);
            assert_eq!(error.placeholder(), placeholder, "source: {source:?}");
        }
    }

    #[test]
    fn charge_flipping_handles_signs_inside_names() {
        assert_eq!(flip_charge("B+").as_deref(), Some("B-"));
        assert_eq!(flip_charge("D*-").as_deref(), Some("D*+"));
        assert_eq!(flip_charge("B-sig").as_deref(), Some("B+sig"));
        assert_eq!(flip_charge("anti-B0").as_deref(), Some("B0"));
        assert_eq!(flip_charge("Myanti-D0").as_deref(), Some("MyD0"));
        assert_eq!(flip_charge("gamma"), None);

        let table = ChargeConjTable::default();
        assert_eq!(conjugate_mother("B0sig", &table), "anti-B0sig");
        assert_eq!(conjugate_mother("anti-B0sig", &table), "B0sig");
    }

    #[test]
    fn cdecay_mothers_record_their_source() {
        let file = parse_dec_source(BD_KSTGAMMA).expect("decay file should parse");

        assert_eq!(
            file.mother_record().conjugate_source("anti-B0sig"),
            Some("B0sig")
        );
        assert_eq!(
            file.mother_record().conjugate_source("Myanti-K*0"),
            Some("MyK*0")
        );
    }

    #[test]
    fn cdecay_of_charged_signal_uses_sign_swap() {
        let source = "\
Decay B+sig
1.0 K+ pi0 PHSP;
Enddecay
CDecay B-sig
";
        let file = parse_dec_source(source).expect("decay file should parse");

        assert_eq!(
            file.mother_record().modes("B-sig")[0].daughters,
            vec!["K-".to_string(), "pi0".to_string()]
        );
    }
}
