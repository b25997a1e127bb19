//! Row gene sets and the negative-control label shuffle

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Mitochondrially-encoded protein-coding and rRNA genes (Ensembl, unversioned)
pub const MITO_GENES: [&str; 13] = [
    "ENSG00000198888",
    "ENSG00000198763",
    "ENSG00000198840",
    "ENSG00000198886",
    "ENSG00000212907",
    "ENSG00000198786",
    "ENSG00000198695",
    "ENSG00000198899",
    "ENSG00000228253",
    "ENSG00000198804",
    "ENSG00000198712",
    "ENSG00000198938",
    "ENSG00000198727",
];

/// Genes placed on the rows of a correlation matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowPanel {
    /// A fixed gene list, intersected with the matrix columns
    Reference(Vec<String>),
    /// Every column of the matrix
    AllGenes,
}

impl RowPanel {
    /// The 13-gene mitochondrial panel
    pub fn mitochondrial() -> Self {
        RowPanel::Reference(MITO_GENES.iter().map(|g| g.to_string()).collect())
    }
}

impl Default for RowPanel {
    fn default() -> Self {
        Self::mitochondrial()
    }
}

/// Column-label permutation applied before correlating
///
/// Only for negative-control runs; production output uses `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMode {
    #[default]
    Off,
    /// Reproducible permutation
    Seeded(u64),
    /// Permutation from the thread-local generator
    Random,
}

impl ShuffleMode {
    /// Permute labels in place; returns whether anything was done
    pub fn apply(&self, labels: &mut [String]) -> bool {
        match *self {
            ShuffleMode::Off => false,
            ShuffleMode::Seeded(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                labels.shuffle(&mut rng);
                true
            }
            ShuffleMode::Random => {
                let mut rng = rand::rng();
                labels.shuffle(&mut rng);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        (0..50).map(|i| format!("g{}", i)).collect()
    }

    #[test]
    fn test_default_panel_is_mitochondrial() {
        match RowPanel::default() {
            RowPanel::Reference(genes) => {
                assert_eq!(genes.len(), 13);
                assert!(genes.iter().all(|g| g.starts_with("ENSG") && !g.contains('.')));
            }
            RowPanel::AllGenes => panic!("expected reference panel"),
        }
    }

    #[test]
    fn test_shuffle_off_by_default() {
        let mut l = labels();
        assert!(!ShuffleMode::default().apply(&mut l));
        assert_eq!(l, labels());
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible_permutation() {
        let mut a = labels();
        let mut b = labels();
        ShuffleMode::Seeded(7).apply(&mut a);
        ShuffleMode::Seeded(7).apply(&mut b);
        assert_eq!(a, b);
        assert_ne!(a, labels());

        let mut sorted = a.clone();
        sorted.sort();
        let mut expected = labels();
        expected.sort();
        assert_eq!(sorted, expected);
    }
}
