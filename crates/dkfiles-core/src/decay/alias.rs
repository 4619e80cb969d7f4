use crate::domain::{AliasTable, DEFAULT_SIGNAL_MARKER, strip_suffix_ignore_ascii_case};

/// Resolves aliases and drops the signal marker from particle names.
#[derive(Debug, Clone, Copy)]
pub struct AliasNormalizer<'a> {
    aliases: &'a AliasTable,
    marker: &'a str,
}

impl<'a> AliasNormalizer<'a> {
    pub fn new(aliases: &'a AliasTable, marker: &'a str) -> Self {
        Self { aliases, marker }
    }

    pub fn normalize(&self, name: &str) -> String {
        let resolved = self.aliases.resolve(name);
        strip_suffix_ignore_ascii_case(resolved, self.marker)
            .unwrap_or(resolved)
            .to_string()
    }
}

pub fn normalize(name: &str, aliases: &AliasTable) -> String {
    AliasNormalizer::new(aliases, DEFAULT_SIGNAL_MARKER).normalize(name)
}
