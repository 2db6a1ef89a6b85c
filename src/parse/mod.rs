mod bracket;
pub use bracket::{parse_bracket_atom, BracketAtom};

mod smiles;
pub use smiles::*;
