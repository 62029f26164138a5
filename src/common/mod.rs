//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Chromosome names accepted in canonical variant keys.  The upstream
/// coordinate resolver only answers for 1..22, X, and Y.
pub const CHROMS: &[&str] = &[
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y",
];

/// The version of the `variant-annotator` package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chroms_cover_autosomes_and_allosomes() {
        assert_eq!(24, CHROMS.len());
        assert!(CHROMS.contains(&"1"));
        assert!(CHROMS.contains(&"22"));
        assert!(CHROMS.contains(&"X"));
        assert!(CHROMS.contains(&"Y"));
        assert!(!CHROMS.contains(&"M"));
    }

    #[test]
    fn version_matches_crate_metadata() {
        assert_eq!(env!("CARGO_PKG_VERSION"), VERSION);
    }
}
