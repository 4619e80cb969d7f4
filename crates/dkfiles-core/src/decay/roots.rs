use crate::domain::{DecayConventions, MotherRecord};
use std::collections::BTreeSet;

/// Outcome of root detection for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootOutcome {
    NoRoot,
    Single(String),
    Multiple(Vec<String>),
}

/// Mothers that carry the signal marker and never appear as a daughter,
/// in file order. Raw names are compared; no alias resolution happens here.
pub fn detect_roots(record: &MotherRecord, conventions: &DecayConventions) -> Vec<String> {
    let non_roots: BTreeSet<&str> = record
        .iter()
        .flat_map(|(_, modes)| modes.iter())
        .flat_map(|mode| mode.daughters.iter().map(String::as_str))
        .collect();

    record
        .mother_names()
        .iter()
        .filter(|mother| !non_roots.contains(mother.as_str()))
        .filter(|mother| conventions.carries_marker(mother))
        .cloned()
        .collect()
}

/// Removes every root that a `CDecay` derived from another root.
pub fn fold_conjugate_roots(record: &MotherRecord, roots: Vec<String>) -> Vec<String> {
    let detected: BTreeSet<String> = roots.iter().cloned().collect();
    roots
        .into_iter()
        .filter(|root| {
            record
                .conjugate_source(root)
                .is_none_or(|source| !detected.contains(source))
        })
        .collect()
}

/// Detected roots, folded when the conventions ask for it.
pub fn select_roots(record: &MotherRecord, conventions: &DecayConventions) -> Vec<String> {
    let roots = detect_roots(record, conventions);
    if conventions.fold_conjugate_roots {
        fold_conjugate_roots(record, roots)
    } else {
        roots
    }
}

pub fn classify_roots(mut roots: Vec<String>) -> RootOutcome {
    match roots.len() {
        0 => RootOutcome::NoRoot,
        1 => RootOutcome::Single(roots.remove(0)),
        _ => RootOutcome::Multiple(roots),
    }
}

#[cfg(test)]
mod tests {
    use super::{RootOutcome, classify_roots, detect_roots, fold_conjugate_roots, select_roots};
    use crate::domain::{DecayConventions, DecayMode, MotherRecord};

    #[test]
    fn marked_mother_that_is_never_a_daughter_is_the_root() {
        let record = MotherRecord::from_daughter_lists([
            ("Asig", vec![vec!["B", "C"]]),
            ("B", vec![vec!["D", "E"]]),
        ]);

        let roots = detect_roots(&record, &DecayConventions::default());
        assert_eq!(roots, vec!["Asig".to_string()]);
        assert_eq!(classify_roots(roots), RootOutcome::Single("Asig".to_string()));
    }

    #[test]
    fn unmarked_independent_mothers_are_not_roots() {
        let record = MotherRecord::from_daughter_lists([
            ("B0sig", vec![vec!["MyD0", "pi0"]]),
            ("MyD0", vec![vec!["K-", "pi+"]]),
            ("MyK*0", vec![vec!["K+", "pi-"]]),
        ]);

        assert_eq!(
            detect_roots(&record, &DecayConventions::default()),
            vec!["B0sig".to_string()]
        );
    }

    #[test]
    fn marked_mother_used_as_daughter_is_not_a_root() {
        let record = MotherRecord::from_daughter_lists([
            ("Xsig", vec![vec!["Ysig"]]),
            ("Ysig", vec![vec!["Xsig"]]),
        ]);

        let roots = detect_roots(&record, &DecayConventions::default());
        assert!(roots.is_empty());
        assert_eq!(classify_roots(roots), RootOutcome::NoRoot);
    }

    #[test]
    fn detection_uses_raw_spelling() {
        // `B0` is a daughter, `B0sig` is not.
        let record = MotherRecord::from_daughter_lists([
            ("B0sig", vec![vec!["K+", "pi-"]]),
            ("Upsilon(4S)sig", vec![vec!["B0", "anti-B0"]]),
        ]);

        let roots = detect_roots(&record, &DecayConventions::default());
        assert_eq!(
            classify_roots(roots),
            RootOutcome::Multiple(vec!["B0sig".to_string(), "Upsilon(4S)sig".to_string()])
        );
    }

    fn conjugated_signal() -> MotherRecord {
        let mut record = MotherRecord::from_daughter_lists([("B0sig", vec![vec!["K+", "pi-"]])]);
        record.insert_conjugate(
            "anti-B0sig",
            "B0sig",
            vec![DecayMode::from_daughters(["K-", "pi+"])],
        );
        record
    }

    #[test]
    fn charge_conjugate_of_a_root_is_a_root_too() {
        let record = conjugated_signal();

        let roots = detect_roots(&record, &DecayConventions::default());
        assert_eq!(roots, vec!["B0sig".to_string(), "anti-B0sig".to_string()]);
        assert_eq!(
            classify_roots(select_roots(&record, &DecayConventions::default())),
            RootOutcome::Multiple(roots)
        );
    }

    #[test]
    fn folding_keeps_only_the_declared_root() {
        let record = conjugated_signal();
        let conventions = DecayConventions {
            fold_conjugate_roots: true,
            ..DecayConventions::default()
        };

        assert_eq!(
            classify_roots(select_roots(&record, &conventions)),
            RootOutcome::Single("B0sig".to_string())
        );
    }

    #[test]
    fn conjugate_of_a_non_root_survives_folding() {
        let mut record = MotherRecord::from_daughter_lists([
            ("Xsig", vec![vec!["B0sig"]]),
            ("B0sig", vec![vec!["K+", "pi-"]]),
        ]);
        record.insert_conjugate(
            "anti-B0sig",
            "B0sig",
            vec![DecayMode::from_daughters(["K-", "pi+"])],
        );

        let roots = detect_roots(&record, &DecayConventions::default());
        assert_eq!(roots, vec!["Xsig".to_string(), "anti-B0sig".to_string()]);
        assert_eq!(fold_conjugate_roots(&record, roots.clone()), roots);
    }
}
