//! Screening engine for cannabinoid analogues: SMILES parsing, physicochemical
//! descriptors, drug-likeness scoring, heuristic ADMET labels and derivative
//! proposals.
//!
//! The ADMET labels produced here come from threshold heuristics. They are not
//! validated pharmacological predictions.

use std::fmt::{Display, Formatter, Result as FmtResult};

use tracing::level_filters::LevelFilter;

mod element;
pub use element::*;

mod molecule;
pub use molecule::*;

mod rings;
pub use rings::*;

mod parse;
pub use parse::*;

mod canon;
pub use canon::*;

mod descriptors;
pub use descriptors::*;

mod druglikeness;
pub use druglikeness::*;

mod admet;
pub use admet::*;

mod visualize;
pub use visualize::*;

mod derivatives;
pub use derivatives::*;

mod config;
pub use config::*;

mod batch;
pub use batch::*;

pub mod export;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl Bond {
    /// Contribution of this bond to an atom's valence. Aromatic bonds count
    /// as one; the extra pi electron is accounted for per atom.
    pub fn valence_contribution(&self) -> u8 {
        match self {
            Bond::Single | Bond::Aromatic => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
            Bond::Quadruple => 4,
        }
    }

    pub fn smiles_symbol(&self) -> &'static str {
        match self {
            Bond::Single => "-",
            Bond::Double => "=",
            Bond::Triple => "#",
            Bond::Quadruple => "$",
            Bond::Aromatic => ":",
        }
    }
}

/// A SMILES string identifying one structure. Never modified once created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructureNotation(String);

impl StructureNotation {
    pub fn new(smiles: impl Into<String>) -> Self {
        StructureNotation(smiles.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StructureNotation {
    fn from(s: &str) -> Self {
        StructureNotation::new(s)
    }
}

impl From<String> for StructureNotation {
    fn from(s: String) -> Self {
        StructureNotation(s)
    }
}

impl AsRef<str> for StructureNotation {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for StructureNotation {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Install a formatting subscriber at the given level (`"trace"`, `"debug"`,
/// `"info"`, ...). Unknown levels fall back to `info`; calling this more than
/// once keeps the first subscriber.
pub fn init_logging(level: &str) {
    let level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
