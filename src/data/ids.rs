//! Identifier normalisation rules
//!
//! Sample and gene identifiers arrive in cohort-specific formats: GTEx
//! barcodes with `.` instead of `-`, ROSMAP ids prefixed with `X` by R's
//! `make.names`, Ensembl gene ids carrying a `.N` version. An
//! [`IdNormalizer`] is a small, ordered rule set that maps a raw identifier
//! to the canonical key used for joining.

use regex::Regex;

/// Default pattern removed from gene identifiers (Ensembl version suffix).
pub const GENE_VERSION_PATTERN: &str = r"\..*";

/// Ordered identifier rewrite rules
///
/// Rules are applied in this order: literal replacement, prefix stripping,
/// regex extraction (capture group 1 when the pattern matches), regex
/// removal. An empty normalizer is the identity.
#[derive(Debug, Clone, Default)]
pub struct IdNormalizer {
    replace: Option<(String, String)>,
    strip_prefix: Option<String>,
    extract: Option<Regex>,
    remove: Option<Regex>,
}

impl IdNormalizer {
    /// Identity rule
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every occurrence of `from` with `to`
    pub fn replace(mut self, from: &str, to: &str) -> Self {
        self.replace = Some((from.to_string(), to.to_string()));
        self
    }

    /// Strip a fixed leading prefix when present
    pub fn strip_prefix(mut self, prefix: &str) -> Self {
        self.strip_prefix = Some(prefix.to_string());
        self
    }

    /// Keep only capture group 1 of `pattern` (or the whole match if the
    /// pattern has no group). Identifiers that do not match are unchanged.
    pub fn extract(mut self, pattern: &str) -> crate::error::Result<Self> {
        self.extract = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Delete every match of `pattern`
    pub fn remove(mut self, pattern: &str) -> crate::error::Result<Self> {
        self.remove = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Gene rule that strips an Ensembl-style version suffix
    pub fn gene_version() -> Self {
        // The default pattern is a compile-time constant known to be valid.
        Self {
            remove: Regex::new(GENE_VERSION_PATTERN).ok(),
            ..Self::default()
        }
    }

    /// True when no rule is configured
    pub fn is_identity(&self) -> bool {
        self.replace.is_none()
            && self.strip_prefix.is_none()
            && self.extract.is_none()
            && self.remove.is_none()
    }

    /// Apply the rules to one identifier
    pub fn normalize(&self, id: &str) -> String {
        let mut out = match &self.replace {
            Some((from, to)) if !from.is_empty() => id.replace(from.as_str(), to),
            _ => id.to_string(),
        };

        if let Some(prefix) = &self.strip_prefix {
            if let Some(rest) = out.strip_prefix(prefix.as_str()) {
                out = rest.to_string();
            }
        }

        if let Some(re) = &self.extract {
            if let Some(caps) = re.captures(&out) {
                let kept = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().to_string());
                if let Some(kept) = kept {
                    out = kept;
                }
            }
        }

        if let Some(re) = &self.remove {
            out = re.replace_all(&out, "").into_owned();
        }

        out
    }

    /// Apply the rules to a list of identifiers
    pub fn normalize_all(&self, ids: &[String]) -> Vec<String> {
        ids.iter().map(|id| self.normalize(id)).collect()
    }
}
