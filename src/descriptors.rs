//! Physicochemical descriptors computed from the molecular graph.
//!
//! logP and molar refractivity use a reduced Wildman–Crippen atom typing
//! (about twenty heavy-atom classes plus four hydrogen classes). TPSA follows
//! Ertl's fragment contributions over N and O.

use std::fmt::{Display, Formatter, Result as FmtResult};

use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::trace;

use crate::{Bond, Element, MolecularGraph};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("molecular graph is inconsistent: {0}")]
    Inconsistent(String),
    #[error("descriptor {0} is not finite ({1})")]
    NonFinite(Descriptor, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Descriptor {
    MolecularWeight,
    LogP,
    HBondDonors,
    HBondAcceptors,
    Tpsa,
    RotatableBonds,
    AromaticRings,
    FormalCharge,
    MolarRefractivity,
    HeavyAtoms,
    RingCount,
    FractionCsp3,
    NhOhCount,
    NoCount,
}

impl Descriptor {
    pub const ALL: [Descriptor; 14] = [
        Descriptor::MolecularWeight,
        Descriptor::LogP,
        Descriptor::HBondDonors,
        Descriptor::HBondAcceptors,
        Descriptor::Tpsa,
        Descriptor::RotatableBonds,
        Descriptor::AromaticRings,
        Descriptor::FormalCharge,
        Descriptor::MolarRefractivity,
        Descriptor::HeavyAtoms,
        Descriptor::RingCount,
        Descriptor::FractionCsp3,
        Descriptor::NhOhCount,
        Descriptor::NoCount,
    ];

    /// Column name used in tables and rule definitions.
    pub fn name(&self) -> &'static str {
        match self {
            Descriptor::MolecularWeight => "molecular_weight",
            Descriptor::LogP => "logp",
            Descriptor::HBondDonors => "h_bond_donors",
            Descriptor::HBondAcceptors => "h_bond_acceptors",
            Descriptor::Tpsa => "tpsa",
            Descriptor::RotatableBonds => "rotatable_bonds",
            Descriptor::AromaticRings => "aromatic_rings",
            Descriptor::FormalCharge => "formal_charge",
            Descriptor::MolarRefractivity => "molar_refractivity",
            Descriptor::HeavyAtoms => "heavy_atoms",
            Descriptor::RingCount => "ring_count",
            Descriptor::FractionCsp3 => "fraction_csp3",
            Descriptor::NhOhCount => "nhoh_count",
            Descriptor::NoCount => "no_count",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.name() == name)
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

/// The fixed descriptor set for one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSet {
    pub molecular_weight: f64,
    pub logp: f64,
    pub h_bond_donors: usize,
    pub h_bond_acceptors: usize,
    pub tpsa: f64,
    pub rotatable_bonds: usize,
    pub aromatic_rings: usize,
    pub formal_charge: i32,
    pub molar_refractivity: f64,
    pub heavy_atoms: usize,
    pub ring_count: usize,
    pub fraction_csp3: f64,
    pub nhoh_count: usize,
    pub no_count: usize,
    /// Hill-order formula. Informational only.
    pub formula: String,
}

impl DescriptorSet {
    pub fn get(&self, descriptor: Descriptor) -> f64 {
        match descriptor {
            Descriptor::MolecularWeight => self.molecular_weight,
            Descriptor::LogP => self.logp,
            Descriptor::HBondDonors => self.h_bond_donors as f64,
            Descriptor::HBondAcceptors => self.h_bond_acceptors as f64,
            Descriptor::Tpsa => self.tpsa,
            Descriptor::RotatableBonds => self.rotatable_bonds as f64,
            Descriptor::AromaticRings => self.aromatic_rings as f64,
            Descriptor::FormalCharge => self.formal_charge as f64,
            Descriptor::MolarRefractivity => self.molar_refractivity,
            Descriptor::HeavyAtoms => self.heavy_atoms as f64,
            Descriptor::RingCount => self.ring_count as f64,
            Descriptor::FractionCsp3 => self.fraction_csp3,
            Descriptor::NhOhCount => self.nhoh_count as f64,
            Descriptor::NoCount => self.no_count as f64,
        }
    }

    /// Every numeric descriptor in table order.
    pub fn iter(&self) -> impl Iterator<Item = (Descriptor, f64)> + '_ {
        Descriptor::ALL.iter().map(move |&d| (d, self.get(d)))
    }
}

pub fn compute_descriptors(mol: &MolecularGraph) -> Result<DescriptorSet, DescriptorError> {
    if mol.atom_count() == 0 {
        return Err(DescriptorError::Inconsistent("graph has no atoms".to_string()));
    }
    for (node, atom) in mol.atoms() {
        let valence = mol.bond_order_sum(node) + atom.hydrogens as u16;
        if atom.element.allowed_valences(atom.charge).is_empty() && valence > 0 {
            return Err(DescriptorError::Inconsistent(format!(
                "{} at atom {} has no allowed valence",
                atom.element,
                node.index()
            )));
        }
    }

    let (logp, molar_refractivity) = crippen(mol);
    let set = DescriptorSet {
        molecular_weight: molecular_weight(mol),
        logp,
        h_bond_donors: h_bond_donors(mol),
        h_bond_acceptors: h_bond_acceptors(mol),
        tpsa: tpsa(mol),
        rotatable_bonds: rotatable_bonds(mol),
        aromatic_rings: aromatic_rings(mol),
        formal_charge: mol.net_charge(),
        molar_refractivity,
        heavy_atoms: mol.heavy_atom_count(),
        ring_count: mol.rings().ring_count(),
        fraction_csp3: fraction_csp3(mol),
        nhoh_count: nhoh_count(mol),
        no_count: no_count(mol),
        formula: mol.formula(),
    };

    for (descriptor, value) in set.iter() {
        if !value.is_finite() {
            return Err(DescriptorError::NonFinite(descriptor, value));
        }
    }
    trace!("descriptors for {}: {:?}", set.formula, set);
    Ok(set)
}

/// Average molecular weight including implicit and explicit hydrogens.
pub fn molecular_weight(mol: &MolecularGraph) -> f64 {
    mol.atoms()
        .map(|(_, atom)| atom.mass() + atom.hydrogens as f64 * Element::H.average_mass())
        .sum()
}

fn is_hetero(element: Element) -> bool {
    !matches!(element, Element::C | Element::H)
}

fn has_bond(mol: &MolecularGraph, node: NodeIndex, bond: Bond) -> bool {
    mol.bonds_of(node).any(|(_, b, _)| b == bond)
}

/// Does `node` carry a double bond to O, N, P or S?
fn double_bonded_to_hetero(mol: &MolecularGraph, node: NodeIndex) -> bool {
    mol.bonds_of(node).any(|(other, bond, _)| {
        bond == Bond::Double
            && matches!(mol.atom(other).element, Element::O | Element::N | Element::P | Element::S)
    })
}

/// Total valence: bond orders plus implicit hydrogens.
fn valence(mol: &MolecularGraph, node: NodeIndex) -> u16 {
    mol.bond_order_sum(node) + mol.atom(node).hydrogens as u16
}

/// N or O with at least one hydrogen.
pub fn h_bond_donors(mol: &MolecularGraph) -> usize {
    mol.atoms()
        .filter(|(node, atom)| {
            matches!(atom.element, Element::N | Element::O) && mol.hydrogen_count(*node) > 0
        })
        .count()
}

/// Acceptors: hydroxyl and ether oxygen or sulfur (but not an acid OH),
/// anionic O/S, trivalent non-amide nitrogen, pyridine-type aromatic
/// nitrogen, aromatic o/s and fluorine.
pub fn h_bond_acceptors(mol: &MolecularGraph) -> usize {
    mol.atoms()
        .filter(|(node, atom)| {
            let node = *node;
            let h = mol.hydrogen_count(node);
            match atom.element {
                Element::O | Element::S if atom.aromatic => atom.charge == 0,
                Element::O | Element::S => {
                    if atom.charge < 0 {
                        return true;
                    }
                    if valence(mol, node) != 2 || atom.charge != 0 {
                        return false;
                    }
                    if h == 1 {
                        return !mol
                            .bonds_of(node)
                            .any(|(other, _, _)| double_bonded_to_hetero(mol, other));
                    }
                    h == 0
                }
                Element::N if atom.aromatic => h == 0 && atom.charge == 0,
                Element::N => {
                    atom.charge == 0
                        && valence(mol, node) == 3
                        && !mol.bonds_of(node).any(|(other, bond, edge)| {
                            bond == Bond::Single
                                && mol.bonds_of(other).any(|(partner, b, e)| {
                                    e != edge
                                        && b == Bond::Double
                                        && !mol.rings().is_bond_in_ring(e)
                                        && matches!(
                                            mol.atom(partner).element,
                                            Element::O | Element::N | Element::P | Element::S
                                        )
                                })
                        })
                }
                Element::F => true,
                _ => false,
            }
        })
        .count()
}

/// Ertl topological polar surface area in square angstroms.
pub fn tpsa(mol: &MolecularGraph) -> f64 {
    mol.atoms()
        .map(|(node, _)| tpsa_contribution(mol, node))
        .sum()
}

fn tpsa_contribution(mol: &MolecularGraph, node: NodeIndex) -> f64 {
    let atom = mol.atom(node);
    let h = mol.hydrogen_count(node);
    let degree = mol.heavy_degree(node);
    let double = has_bond(mol, node, Bond::Double);
    let triple = has_bond(mol, node, Bond::Triple);
    let in_three_ring = mol.rings().in_three_ring(node);

    match atom.element {
        Element::N if atom.aromatic => {
            let substituted = mol.bonds_of(node).any(|(_, b, _)| b != Bond::Aromatic);
            match (atom.charge > 0, degree, h) {
                (false, 2, 0) => 12.89,
                (false, 2, 1) => 15.79,
                (false, 3, 0) if substituted => 4.93,
                (false, 3, 0) => 4.41,
                (true, 2, 1) => 14.14,
                (true, 3, 0) => 3.88,
                (true, _, _) => 4.10,
                _ => 4.41,
            }
        }
        Element::N if atom.charge > 0 => match (degree, h, double, triple) {
            (4, 0, _, _) => 0.0,
            (3, 0, true, _) => 3.01,
            (2, 0, _, true) => 4.36,
            (3, 1, _, _) => 4.44,
            (2, 1, true, _) => 13.97,
            (2, 2, _, _) => 16.61,
            (1, 2, true, _) => 25.59,
            (1, 3, _, _) => 27.64,
            _ => 0.0,
        },
        Element::N => match (degree, h, double, triple) {
            (1, 0, _, true) => 23.79,
            (1, 1, true, _) => 23.85,
            (1, 2, _, _) => 26.02,
            (2, 0, true, _) => 12.36,
            (2, 0, _, true) => 13.60,
            (2, 1, _, _) if in_three_ring => 21.94,
            (2, 1, _, _) => 12.03,
            (3, 0, _, _) if in_three_ring => 3.01,
            (3, 0, true, _) => 11.68,
            _ => 3.24,
        },
        Element::O if atom.aromatic => 13.14,
        Element::O if atom.charge < 0 => 23.06,
        Element::O => match (degree, h, double) {
            (1, 0, true) => 17.07,
            (1, 1, _) => 20.23,
            (2, 0, _) if in_three_ring => 12.53,
            (2, 0, _) => 9.23,
            _ if h > 0 => 20.23,
            _ => 9.23,
        },
        _ => 0.0,
    }
}

/// Rotatable bonds: acyclic single bonds between atoms that each have at
/// least two heavy neighbours. Bonds at triple-bonded atoms and secondary
/// amide C–N bonds are not counted.
pub fn rotatable_bonds(mol: &MolecularGraph) -> usize {
    let graph = mol.graph();
    graph
        .edge_indices()
        .filter(|&edge| {
            if graph[edge] != Bond::Single || mol.rings().is_bond_in_ring(edge) {
                return false;
            }
            let Some((a, b)) = graph.edge_endpoints(edge) else {
                return false;
            };
            if !mol.atom(a).is_heavy() || !mol.atom(b).is_heavy() {
                return false;
            }
            if mol.heavy_degree(a) < 2 || mol.heavy_degree(b) < 2 {
                return false;
            }
            if has_bond(mol, a, Bond::Triple) || has_bond(mol, b, Bond::Triple) {
                return false;
            }
            !is_secondary_amide(mol, a, b) && !is_secondary_amide(mol, b, a)
        })
        .count()
}

fn is_secondary_amide(mol: &MolecularGraph, carbon: NodeIndex, nitrogen: NodeIndex) -> bool {
    mol.atom(carbon).element == Element::C
        && mol.atom(nitrogen).element == Element::N
        && !mol.atom(nitrogen).aromatic
        && mol.hydrogen_count(nitrogen) == 1
        && mol.bonds_of(carbon).any(|(other, bond, _)| {
            bond == Bond::Double && matches!(mol.atom(other).element, Element::O | Element::S)
        })
}

/// Rings of the smallest set whose atoms are all aromatic.
pub fn aromatic_rings(mol: &MolecularGraph) -> usize {
    mol.rings()
        .rings()
        .iter()
        .filter(|ring| ring.iter().all(|&n| mol.atom(n).aromatic))
        .count()
}

/// Share of carbons with only single bonds. Zero without carbon.
pub fn fraction_csp3(mol: &MolecularGraph) -> f64 {
    let carbons: Vec<NodeIndex> = mol
        .atoms()
        .filter(|(_, a)| a.element == Element::C)
        .map(|(n, _)| n)
        .collect();
    if carbons.is_empty() {
        return 0.0;
    }
    let sp3 = carbons
        .iter()
        .filter(|&&n| !mol.atom(n).aromatic && mol.bonds_of(n).all(|(_, b, _)| b == Bond::Single))
        .count();
    sp3 as f64 / carbons.len() as f64
}

/// Hydrogens on nitrogen and oxygen.
pub fn nhoh_count(mol: &MolecularGraph) -> usize {
    mol.atoms()
        .filter(|(_, a)| matches!(a.element, Element::N | Element::O))
        .map(|(n, _)| mol.hydrogen_count(n) as usize)
        .sum()
}

pub fn no_count(mol: &MolecularGraph) -> usize {
    mol.atoms()
        .filter(|(_, a)| matches!(a.element, Element::N | Element::O))
        .count()
}

/// Wildman–Crippen logP and molar refractivity, summed over heavy atoms
/// and their hydrogens.
pub fn crippen(mol: &MolecularGraph) -> (f64, f64) {
    let mut logp = 0.0;
    let mut mr = 0.0;
    for (node, atom) in mol.atoms() {
        if atom.element.is_hydrogen() {
            // Counted through the atom it is bonded to.
            if mol.bonds_of(node).next().is_none() {
                logp += 0.1230;
                mr += 1.057;
            }
            continue;
        }
        let (atom_logp, atom_mr) = crippen_heavy_atom(mol, node);
        let (h_logp, h_mr) = crippen_hydrogen(mol, node);
        let h = mol.hydrogen_count(node) as f64;
        logp += atom_logp + h * h_logp;
        mr += atom_mr + h * h_mr;
    }
    (logp, mr)
}

fn crippen_heavy_atom(mol: &MolecularGraph, node: NodeIndex) -> (f64, f64) {
    let atom = mol.atom(node);
    match atom.element {
        Element::C => {
            if atom.aromatic {
                let aromatic_bonds = mol.bonds_of(node).filter(|(_, b, _)| *b == Bond::Aromatic).count();
                let substituent = mol
                    .bonds_of(node)
                    .find(|(other, b, _)| *b != Bond::Aromatic && mol.atom(*other).is_heavy())
                    .map(|(other, _, _)| mol.atom(other));
                return match substituent {
                    None if aromatic_bonds >= 3 => (0.2955, 4.346),
                    None => (0.1581, 3.350),
                    Some(sub) if sub.aromatic => (0.2713, 3.904),
                    Some(sub) => match sub.element {
                        Element::N => (0.4619, 2.021),
                        Element::O => (0.5437, 3.025),
                        Element::S => (0.1893, 3.509),
                        _ => (0.1360, 3.509),
                    },
                };
            }
            if has_bond(mol, node, Bond::Triple) {
                return (0.0017, 3.888);
            }
            if double_bonded_to_hetero(mol, node) {
                return (-0.2783, 5.007);
            }
            if has_bond(mol, node, Bond::Double) {
                return (0.1551, 3.513);
            }
            let hetero = mol.bonds_of(node).any(|(other, _, _)| is_hetero(mol.atom(other).element));
            match (hetero, mol.heavy_degree(node) <= 2) {
                (false, true) => (0.1441, 2.503),
                (false, false) => (0.0, 2.433),
                (true, true) => (-0.2035, 2.753),
                (true, false) => (-0.2051, 2.731),
            }
        }
        Element::N => {
            if atom.aromatic {
                (-0.3239, 2.202)
            } else if atom.charge > 0 {
                (-1.0190, 2.262)
            } else if has_bond(mol, node, Bond::Double) || has_bond(mol, node, Bond::Triple) {
                (-0.5262, 2.188)
            } else {
                match mol.hydrogen_count(node) {
                    2.. => (-1.0190, 2.262),
                    1 => (-0.7096, 2.173),
                    _ => (-0.3187, 2.827),
                }
            }
        }
        Element::O => {
            if atom.aromatic {
                (0.1552, 1.080)
            } else if atom.charge < 0 {
                (-1.189, 1.476)
            } else if has_bond(mol, node, Bond::Double) {
                let on_aromatic = mol.bonds_of(node).any(|(other, _, _)| mol.atom(other).aromatic);
                if on_aromatic {
                    (0.1129, 0.2215)
                } else {
                    (-0.1526, 0.0)
                }
            } else if mol.hydrogen_count(node) > 0 {
                (-0.2893, 0.8238)
            } else if mol.bonds_of(node).any(|(other, _, _)| mol.atom(other).aromatic) {
                (-0.4195, 1.182)
            } else {
                (-0.0684, 1.085)
            }
        }
        Element::S => {
            if atom.aromatic {
                (0.6237, 6.691)
            } else if has_bond(mol, node, Bond::Double) {
                (-0.0024, 7.365)
            } else {
                (0.6482, 7.591)
            }
        }
        Element::P => (0.8612, 6.920),
        Element::F => (0.4202, 1.108),
        Element::Cl => (0.6895, 5.853),
        Element::Br => (0.8456, 8.927),
        Element::I => (0.8857, 14.02),
        Element::Na | Element::K | Element::Mg | Element::Ca => (-0.3808, 5.754),
        _ => (0.0, 0.0),
    }
}

/// Contribution of one hydrogen attached to `node`.
fn crippen_hydrogen(mol: &MolecularGraph, node: NodeIndex) -> (f64, f64) {
    match mol.atom(node).element {
        Element::O => {
            let acid = mol
                .bonds_of(node)
                .any(|(other, _, _)| double_bonded_to_hetero(mol, other));
            if acid {
                (0.2980, 0.8)
            } else {
                (-0.2677, 1.395)
            }
        }
        Element::N => (0.2142, 0.9627),
        _ => (0.1230, 1.057),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    const THCO: &str = "CCCCCC1=CC(=C2[C@@H]3CC(=CC[C@H]3C(OC2=C1)(C)C)C)OC(C)=O";

    fn descriptors(smiles: &str) -> DescriptorSet {
        compute_descriptors(&parse_smiles(smiles).unwrap()).unwrap()
    }

    #[test]
    fn test_ethanol() {
        let d = descriptors("CCO");
        assert!((d.molecular_weight - 46.069).abs() < 0.01);
        assert!((d.logp - -0.0014).abs() < 0.01);
        assert!((d.molar_refractivity - 12.76).abs() < 0.05);
        assert!((d.tpsa - 20.23).abs() < 0.01);
        assert_eq!(d.h_bond_donors, 1);
        assert_eq!(d.h_bond_acceptors, 1);
        assert_eq!(d.rotatable_bonds, 0);
        assert_eq!(d.heavy_atoms, 3);
        assert_eq!(d.nhoh_count, 1);
        assert_eq!(d.no_count, 1);
        assert_eq!(d.fraction_csp3, 1.0);
    }

    #[test]
    fn test_benzene_logp() {
        let d = descriptors("c1ccccc1");
        assert!((d.logp - 1.6866).abs() < 0.01);
        assert_eq!(d.aromatic_rings, 1);
        assert_eq!(d.ring_count, 1);
        assert_eq!(d.fraction_csp3, 0.0);
    }

    #[test]
    fn test_aspirin() {
        let d = descriptors("CC(=O)Oc1ccccc1C(=O)O");
        assert!((d.molecular_weight - 180.159).abs() < 0.01);
        assert!((d.tpsa - 63.6).abs() < 0.1);
        assert_eq!(d.h_bond_donors, 1);
        assert_eq!(d.h_bond_acceptors, 3);
        assert_eq!(d.rotatable_bonds, 3);
        assert_eq!(d.formula, "C9H8O4");
    }

    #[test]
    fn test_thco() {
        let d = descriptors(THCO);
        assert!((d.molecular_weight - 356.506).abs() < 0.01);
        assert!((d.tpsa - 35.53).abs() < 0.01);
        assert_eq!(d.h_bond_donors, 0);
        assert_eq!(d.h_bond_acceptors, 3);
        assert_eq!(d.rotatable_bonds, 6);
        assert_eq!(d.aromatic_rings, 1);
        assert_eq!(d.ring_count, 3);
        assert_eq!(d.formal_charge, 0);
        assert!(d.logp > 5.0 && d.logp < 7.0, "logp {}", d.logp);
    }

    #[test]
    fn test_amide_and_amines() {
        // N-methylacetamide: the amide C-N bond does not rotate.
        let d = descriptors("CC(=O)NC");
        assert_eq!(d.rotatable_bonds, 0);
        assert_eq!(d.h_bond_acceptors, 1);
        assert_eq!(d.h_bond_donors, 1);

        let d = descriptors("CCN(CC)CC");
        assert_eq!(d.h_bond_acceptors, 1);
        assert_eq!(d.h_bond_donors, 0);
        assert!((d.tpsa - 3.24).abs() < 0.01);
    }

    #[test]
    fn test_charged_species() {
        let d = descriptors("CC(=O)[O-].[Na+]");
        assert_eq!(d.formal_charge, 0);
        assert!((d.tpsa - 40.13).abs() < 0.01);

        let d = descriptors("C[NH3+]");
        assert_eq!(d.formal_charge, 1);
        assert!((d.tpsa - 27.64).abs() < 0.01);
    }

    #[test]
    fn test_isotope_mass() {
        let d = descriptors("[2H]C([2H])([2H])[2H]");
        assert!((d.molecular_weight - (12.011 + 8.0)).abs() < 1e-9);
    }

    #[test]
    fn test_descriptor_names_round_trip() {
        for d in Descriptor::ALL {
            assert_eq!(Descriptor::from_name(d.name()), Some(d));
        }
        assert_eq!(Descriptor::from_name("nonsense"), None);
    }
}
