use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use lazy_static::lazy_static;

/// The elements the parser and descriptor tables know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    H,
    B,
    C,
    N,
    O,
    F,
    Na,
    Mg,
    Si,
    P,
    S,
    Cl,
    K,
    Ca,
    As,
    Se,
    Br,
    I,
}

use Element::*;

const ALL_ELEMENTS: [Element; 18] = [
    H, B, C, N, O, F, Na, Mg, Si, P, S, Cl, K, Ca, As, Se, Br, I,
];

lazy_static! {
    static ref SYMBOLS: HashMap<&'static str, Element> =
        ALL_ELEMENTS.iter().map(|e| (e.symbol(), *e)).collect();
}

impl Element {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        SYMBOLS.get(symbol).copied()
    }

    /// Lowercase aromatic symbols as they appear in SMILES (`c`, `n`, `se`, ...).
    pub fn from_aromatic_symbol(symbol: &str) -> Option<Self> {
        let element = match symbol {
            "b" => B,
            "c" => C,
            "n" => N,
            "o" => O,
            "p" => P,
            "s" => S,
            "as" => As,
            "se" => Se,
            _ => return None,
        };
        Some(element)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            H => "H",
            B => "B",
            C => "C",
            N => "N",
            O => "O",
            F => "F",
            Na => "Na",
            Mg => "Mg",
            Si => "Si",
            P => "P",
            S => "S",
            Cl => "Cl",
            K => "K",
            Ca => "Ca",
            As => "As",
            Se => "Se",
            Br => "Br",
            I => "I",
        }
    }

    pub fn atomic_number(&self) -> u8 {
        match self {
            H => 1,
            B => 5,
            C => 6,
            N => 7,
            O => 8,
            F => 9,
            Na => 11,
            Mg => 12,
            Si => 14,
            P => 15,
            S => 16,
            Cl => 17,
            K => 19,
            Ca => 20,
            As => 33,
            Se => 34,
            Br => 35,
            I => 53,
        }
    }

    /// Standard atomic weight (isotope-averaged), in daltons.
    pub fn average_mass(&self) -> f64 {
        match self {
            H => 1.008,
            B => 10.812,
            C => 12.011,
            N => 14.007,
            O => 15.999,
            F => 18.998,
            Na => 22.990,
            Mg => 24.305,
            Si => 28.086,
            P => 30.974,
            S => 32.065,
            Cl => 35.453,
            K => 39.098,
            Ca => 40.078,
            As => 74.922,
            Se => 78.971,
            Br => 79.904,
            I => 126.904,
        }
    }

    /// Elements that may be written without brackets.
    pub fn is_organic_subset(&self) -> bool {
        matches!(self, B | C | N | O | P | S | F | Cl | Br | I)
    }

    pub fn can_be_aromatic(&self) -> bool {
        matches!(self, B | C | N | O | P | S | As | Se)
    }

    pub fn is_halogen(&self) -> bool {
        matches!(self, F | Cl | Br | I)
    }

    pub fn is_carbon(&self) -> bool {
        *self == C
    }

    pub fn is_hydrogen(&self) -> bool {
        *self == H
    }

    fn neutral_valences(&self) -> &'static [u16] {
        match self {
            H | F | Na | K => &[1],
            Mg | Ca | O => &[2],
            B => &[3],
            C | Si => &[4],
            N | P | As => &[3, 5],
            S | Se => &[2, 4, 6],
            Cl | Br | I => &[1, 3, 5, 7],
        }
    }

    /// Valences this element may take with the given formal charge, lowest first.
    ///
    /// Electron-rich atoms gain a bond per positive charge (N+ is tetravalent,
    /// O- is monovalent); carbon and the electropositive elements lose one
    /// per unit of charge either way; boron goes the other direction.
    pub fn allowed_valences(&self, charge: i8) -> Vec<u16> {
        let q = charge as i16;
        let mut valences: Vec<u16> = self
            .neutral_valences()
            .iter()
            .map(|&v| {
                let v = v as i16;
                match self {
                    H | Na | K | Mg | Ca | C | Si => v - q.abs(),
                    B => v - q,
                    _ => v + q,
                }
            })
            .filter(|&v| v >= 0)
            .map(|v| v as u16)
            .collect();
        valences.sort_unstable();
        valences.dedup();
        valences
    }

    /// The default valence used to fill in implicit hydrogens for an
    /// organic-subset atom, given the sum of its bond orders.
    pub fn implicit_valence(&self, bond_order_sum: u16) -> Option<u16> {
        self.neutral_valences()
            .iter()
            .copied()
            .find(|&v| v >= bond_order_sum)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.symbol())
    }
}
