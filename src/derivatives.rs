//! Proposes structural analogues of a parent structure: side chains grown or
//! trimmed, and terminal methyl groups hydroxylated.

use std::collections::HashSet;
use std::str::FromStr;

use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{parse_smiles, Atom, Bond, Element, MolecularGraph, MoleculeGraph, ParseError, StructureNotation};

/// The chain length edits to try: every non-zero value in `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainDelta {
    pub min: i32,
    pub max: i32,
    /// Shortest terminal chain, methyl end included, that counts as a side
    /// chain.
    pub min_chain_length: usize,
}

impl Default for ChainDelta {
    fn default() -> Self {
        Self::new(-3, 3)
    }
}

impl ChainDelta {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            min,
            max,
            min_chain_length: 3,
        }
    }

    pub fn with_min_chain_length(mut self, min_chain_length: usize) -> Self {
        self.min_chain_length = min_chain_length;
        self
    }

    pub fn deltas(&self) -> impl Iterator<Item = i32> {
        (self.min..=self.max).filter(|d| *d != 0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid chain delta {0:?}, expected MIN..MAX")]
pub struct ChainDeltaError(String);

impl FromStr for ChainDelta {
    type Err = ChainDeltaError;

    /// Accepts `MIN..MAX` and `MIN..=MAX`, both inclusive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ChainDeltaError(s.to_string());
        let (min, max) = s.trim().split_once("..").ok_or_else(err)?;
        let max = max.strip_prefix('=').unwrap_or(max);
        let min: i32 = min.trim().parse().map_err(|_| err())?;
        let max: i32 = max.trim().parse().map_err(|_| err())?;
        if min > max {
            return Err(err());
        }
        Ok(Self::new(min, max))
    }
}

/// A candidate the generator could not turn into a valid structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidDerivative {
    #[error("{edit}: {source}")]
    Rebuild {
        edit: String,
        #[source]
        source: ParseError,
    },
    #[error("{smiles} does not parse back: {source}")]
    Reparse {
        smiles: StructureNotation,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeSpec {
    ChainLength(ChainDelta),
    Hydroxylation,
    /// Chain edits, hydroxylations, and each chain edit then hydroxylated.
    Composite(ChainDelta),
}

impl DerivativeSpec {
    /// Canonical SMILES of every valid candidate, first seen first, without
    /// duplicates and without the parent.
    pub fn generate(&self, parent: &MolecularGraph) -> Vec<StructureNotation> {
        let mut seen = HashSet::new();
        seen.insert(parent.to_smiles());

        let folded = match fold_explicit_hydrogens(parent) {
            Ok(folded) => folded,
            Err(e) => {
                debug!("cannot fold hydrogens of {}: {}", parent.to_smiles(), e);
                return Vec::new();
            }
        };
        seen.insert(folded.to_smiles());

        let mut out = Vec::new();
        for candidate in self.candidates(&folded) {
            match candidate.and_then(|mol| verify(&mol)) {
                Ok(smiles) => {
                    if seen.insert(smiles.clone()) {
                        trace!("derivative {}", smiles);
                        out.push(smiles);
                    }
                }
                Err(e) => debug!("dropping derivative: {}", e),
            }
        }
        debug!("{} derivatives of {}", out.len(), parent.to_smiles());
        out
    }

    fn candidates(&self, parent: &MolecularGraph) -> Vec<Result<MolecularGraph, InvalidDerivative>> {
        match self {
            DerivativeSpec::ChainLength(delta) => chain_edits(parent, delta),
            DerivativeSpec::Hydroxylation => hydroxylations(parent),
            DerivativeSpec::Composite(delta) => {
                let chains = chain_edits(parent, delta);
                let mut all = Vec::new();
                for edited in chains.iter().flatten() {
                    all.push(Ok(edited.clone()));
                }
                all.extend(hydroxylations(parent));
                for edited in chains.iter().flatten() {
                    all.extend(hydroxylations(edited));
                }
                all.extend(chains.into_iter().filter(|c| c.is_err()));
                all
            }
        }
    }
}

/// Composite derivatives of a SMILES string.
pub fn propose_derivatives(
    parent: &StructureNotation,
    delta: &ChainDelta,
) -> Result<Vec<StructureNotation>, ParseError> {
    let mol = MolecularGraph::parse(parent)?;
    Ok(DerivativeSpec::Composite(*delta).generate(&mol))
}

/// Every parent with its derivatives. Parents that do not parse are logged
/// and left out.
pub fn propose_family(
    parents: &[StructureNotation],
    delta: &ChainDelta,
) -> Vec<(StructureNotation, Vec<StructureNotation>)> {
    parents
        .iter()
        .filter_map(|parent| match propose_derivatives(parent, delta) {
            Ok(children) => Some((parent.clone(), children)),
            Err(e) => {
                warn!("no derivatives for {}: {}", parent, e);
                None
            }
        })
        .collect()
}

/// Derivatives across a family, first seen first.
pub fn distinct_derivatives(family: &[(StructureNotation, Vec<StructureNotation>)]) -> Vec<StructureNotation> {
    let mut seen = HashSet::new();
    family
        .iter()
        .flat_map(|(_, children)| children)
        .filter(|child| seen.insert(*child))
        .cloned()
        .collect()
}

fn verify(mol: &MolecularGraph) -> Result<StructureNotation, InvalidDerivative> {
    let smiles = mol.to_smiles();
    match parse_smiles(smiles.as_str()) {
        Ok(reparsed) => Ok(reparsed.to_smiles()),
        Err(source) => Err(InvalidDerivative::Reparse { smiles, source }),
    }
}

/// Plain `[H]` nodes on a heavy atom become part of its hydrogen count, so
/// edits never leave a hydrogen behind. Labelled or charged hydrogens stay.
fn fold_explicit_hydrogens(mol: &MolecularGraph) -> Result<MolecularGraph, InvalidDerivative> {
    let mut graph = mol.graph().clone();
    let mut doomed = Vec::new();
    for (node, atom) in mol.atoms() {
        if !atom.element.is_hydrogen() || atom.isotope.is_some() || atom.charge != 0 || atom.hydrogens != 0 {
            continue;
        }
        let mut bonds = mol.bonds_of(node);
        let (anchor, bond) = match (bonds.next(), bonds.next()) {
            (Some((anchor, bond, _)), None) => (anchor, bond),
            _ => continue,
        };
        if bond != Bond::Single || !mol.atom(anchor).is_heavy() {
            continue;
        }
        if graph[anchor].bracketed {
            graph[anchor].hydrogens = graph[anchor].hydrogens.saturating_add(1);
        }
        doomed.push(node);
    }
    if doomed.is_empty() {
        return Ok(mol.clone());
    }
    trace!("folding {} explicit hydrogens", doomed.len());
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    for node in doomed {
        graph.remove_node(node);
    }
    rebuild(graph, "explicit hydrogen folding".to_string())
}

fn rebuild(graph: MoleculeGraph, edit: String) -> Result<MolecularGraph, InvalidDerivative> {
    MolecularGraph::from_graph(graph).map_err(|source| InvalidDerivative::Rebuild { edit, source })
}

/// Neutral, unlabelled, acyclic carbon with no hydrogen written as its own
/// node.
fn is_chain_carbon(mol: &MolecularGraph, node: NodeIndex) -> bool {
    let atom = mol.atom(node);
    atom.element == Element::C
        && !atom.aromatic
        && atom.charge == 0
        && atom.isotope.is_none()
        && mol.hydrogen_count(node) == atom.hydrogens as u16
        && !mol.rings().is_atom_in_ring(node)
}

fn is_methyl(mol: &MolecularGraph, node: NodeIndex) -> bool {
    is_chain_carbon(mol, node) && mol.heavy_degree(node) == 1 && mol.hydrogen_count(node) == 3
}

fn heavy_neighbours(mol: &MolecularGraph, node: NodeIndex) -> Vec<(NodeIndex, Bond)> {
    mol.bonds_of(node)
        .filter(|(other, _, _)| mol.atom(*other).is_heavy())
        .map(|(other, bond, _)| (other, bond))
        .collect()
}

/// A terminal chain starting at a methyl end: the methyl, then each CH2
/// towards the anchor. `None` when the walk does not end on an anchor, or
/// the whole molecule is one chain.
fn trace_chain(mol: &MolecularGraph, end: NodeIndex) -> Option<Vec<NodeIndex>> {
    let mut chain = vec![end];
    let mut prev = None;
    let mut current = end;
    loop {
        let forward: Vec<(NodeIndex, Bond)> = heavy_neighbours(mol, current)
            .into_iter()
            .filter(|(n, _)| Some(*n) != prev)
            .collect();
        let [(next, bond)] = forward.as_slice() else {
            return None;
        };
        if *bond != Bond::Single {
            return None;
        }
        let next = *next;
        if is_chain_carbon(mol, next) && mol.heavy_degree(next) == 2 && mol.hydrogen_count(next) == 2 {
            chain.push(next);
            prev = Some(current);
            current = next;
            continue;
        }
        if is_methyl(mol, next) {
            return None;
        }
        return Some(chain);
    }
}

fn side_chains(mol: &MolecularGraph, min_length: usize) -> Vec<Vec<NodeIndex>> {
    mol.graph()
        .node_indices()
        .filter(|&n| is_methyl(mol, n))
        .filter_map(|n| trace_chain(mol, n))
        .filter(|chain| chain.len() >= min_length.max(1))
        .collect()
}

/// Drop the written hydrogen count so it is recomputed on rebuild.
fn release(graph: &mut MoleculeGraph, node: NodeIndex) {
    graph[node].bracketed = false;
    graph[node].hydrogens = 0;
}

fn chain_edits(mol: &MolecularGraph, delta: &ChainDelta) -> Vec<Result<MolecularGraph, InvalidDerivative>> {
    let mut out = Vec::new();
    for chain in side_chains(mol, delta.min_chain_length) {
        for d in delta.deltas() {
            let edit = format!("chain at atom {} by {:+}", chain[0].index(), d);
            let graph = if d > 0 {
                extend_chain(mol, &chain, d as usize)
            } else {
                match shorten_chain(mol, &chain, d.unsigned_abs() as usize) {
                    Some(graph) => graph,
                    None => continue,
                }
            };
            out.push(rebuild(graph, edit));
        }
    }
    out
}

fn extend_chain(mol: &MolecularGraph, chain: &[NodeIndex], by: usize) -> MoleculeGraph {
    let mut graph = mol.graph().clone();
    let mut tail = chain[0];
    release(&mut graph, tail);
    for _ in 0..by {
        let carbon = graph.add_node(Atom::organic(Element::C, false));
        graph.add_edge(tail, carbon, Bond::Single);
        tail = carbon;
    }
    graph
}

/// At least one chain carbon stays.
fn shorten_chain(mol: &MolecularGraph, chain: &[NodeIndex], by: usize) -> Option<MoleculeGraph> {
    if by >= chain.len() {
        return None;
    }
    let mut graph = mol.graph().clone();
    release(&mut graph, chain[by]);
    let mut doomed = chain[..by].to_vec();
    // Removing highest indices first keeps the remaining ones valid.
    doomed.sort_unstable_by(|a, b| b.cmp(a));
    for node in doomed {
        graph.remove_node(node);
    }
    Some(graph)
}

/// Methyl groups on carbon. A methyl on a heteroatom is already substituted.
fn hydroxylation_sites(mol: &MolecularGraph) -> Vec<NodeIndex> {
    mol.graph()
        .node_indices()
        .filter(|&n| is_methyl(mol, n))
        .filter(|&n| {
            heavy_neighbours(mol, n)
                .iter()
                .all(|(other, _)| mol.atom(*other).element == Element::C)
        })
        .collect()
}

fn hydroxylations(mol: &MolecularGraph) -> Vec<Result<MolecularGraph, InvalidDerivative>> {
    hydroxylation_sites(mol)
        .into_iter()
        .map(|site| {
            let mut graph = mol.graph().clone();
            release(&mut graph, site);
            let oxygen = graph.add_node(Atom::organic(Element::O, false));
            graph.add_edge(site, oxygen, Bond::Single);
            rebuild(graph, format!("hydroxylation at atom {}", site.index()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecular_weight;

    const PENTYLBENZENE: &str = "CCCCCc1ccccc1";

    fn canon(smiles: &str) -> StructureNotation {
        parse_smiles(smiles).unwrap().to_smiles()
    }

    fn generate(spec: DerivativeSpec, smiles: &str) -> Vec<StructureNotation> {
        spec.generate(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn test_chain_delta_parsing() {
        assert_eq!("-3..3".parse::<ChainDelta>().unwrap(), ChainDelta::new(-3, 3));
        assert_eq!("1..=2".parse::<ChainDelta>().unwrap(), ChainDelta::new(1, 2));
        assert!("3..1".parse::<ChainDelta>().is_err());
        assert!("three".parse::<ChainDelta>().is_err());
        assert_eq!(ChainDelta::new(-1, 2).deltas().collect::<Vec<_>>(), vec![-1, 1, 2]);
    }

    #[test]
    fn test_extend_pentyl_by_one() {
        let parent = parse_smiles(PENTYLBENZENE).unwrap();
        let out = DerivativeSpec::ChainLength(ChainDelta::new(1, 1)).generate(&parent);
        assert_eq!(out, vec![canon("CCCCCCc1ccccc1")]);

        let child = MolecularGraph::parse(&out[0]).unwrap();
        let gained = molecular_weight(&child) - molecular_weight(&parent);
        assert!((gained - 14.027).abs() < 1e-3, "gained {}", gained);
    }

    #[test]
    fn test_shortening_keeps_one_carbon() {
        let out = generate(DerivativeSpec::ChainLength(ChainDelta::new(-4, 3)), PENTYLBENZENE);
        assert_eq!(out.len(), 7);
        assert_eq!(out[0], canon("Cc1ccccc1"));
        assert!(out.contains(&canon("CCCCCCCCc1ccccc1")));
        assert!(generate(DerivativeSpec::ChainLength(ChainDelta::new(-5, -5)), PENTYLBENZENE).is_empty());
    }

    #[test]
    fn test_short_chains_ignored() {
        let spec = DerivativeSpec::ChainLength(ChainDelta::new(1, 1));
        assert!(generate(spec, "CCc1ccccc1").is_empty());
        let relaxed = DerivativeSpec::ChainLength(ChainDelta::new(1, 1).with_min_chain_length(2));
        assert_eq!(generate(relaxed, "CCc1ccccc1"), vec![canon("CCCc1ccccc1")]);
        // A bare alkane has no anchor.
        assert!(generate(spec, "CCCCCC").is_empty());
    }

    #[test]
    fn test_hydroxylation() {
        assert_eq!(
            generate(DerivativeSpec::Hydroxylation, PENTYLBENZENE),
            vec![canon("OCCCCCc1ccccc1")]
        );
        // Equivalent methyls give one candidate.
        assert_eq!(generate(DerivativeSpec::Hydroxylation, "CC(C)C"), vec![canon("OCC(C)C")]);
        assert!(generate(DerivativeSpec::Hydroxylation, "COc1ccccc1").is_empty());
    }

    #[test]
    fn test_explicit_hydrogens_folded() {
        let out = generate(
            DerivativeSpec::ChainLength(ChainDelta::new(-1, 1)),
            "[H]C([H])([H])C([H])([H])CCCc1ccccc1",
        );
        assert_eq!(out, vec![canon("CCCCc1ccccc1"), canon("CCCCCCc1ccccc1")]);
        assert!(out.iter().all(|s| !s.as_str().contains('.')));

        assert_eq!(
            generate(DerivativeSpec::Hydroxylation, "[H]C([H])([H])CCCCc1ccccc1"),
            vec![canon("OCCCCCc1ccccc1")]
        );
        // The folded spelling of the parent is not a derivative.
        assert!(!generate(DerivativeSpec::Composite(ChainDelta::new(-1, 1)), "[H]C([H])([H])CCCCc1ccccc1")
            .contains(&canon(PENTYLBENZENE)));
    }

    #[test]
    fn test_labelled_hydrogen_blocks_edits() {
        assert!(generate(DerivativeSpec::Hydroxylation, "[2H]CCCCCc1ccccc1").is_empty());
    }

    #[test]
    fn test_composite() {
        let out = generate(DerivativeSpec::Composite(ChainDelta::new(-1, 1)), PENTYLBENZENE);
        assert_eq!(
            out,
            vec![
                canon("CCCCc1ccccc1"),
                canon("CCCCCCc1ccccc1"),
                canon("OCCCCCc1ccccc1"),
                canon("OCCCCc1ccccc1"),
                canon("OCCCCCCc1ccccc1"),
            ]
        );
        assert!(!out.contains(&canon(PENTYLBENZENE)));
        for smiles in &out {
            assert_eq!(&canon(smiles.as_str()), smiles);
        }
    }

    #[test]
    fn test_thco_candidates_reparse() {
        let thco = StructureNotation::from("CCCCCC1=CC(=C2[C@@H]3CC(=CC[C@H]3C(OC2=C1)(C)C)C)OC(C)=O");
        let out = propose_derivatives(&thco, &ChainDelta::default()).unwrap();
        assert!(!out.is_empty());
        let unique: HashSet<_> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
        for smiles in &out {
            assert!(parse_smiles(smiles.as_str()).is_ok(), "{} does not parse", smiles);
        }
        assert!(propose_derivatives(&StructureNotation::from("C1CC"), &ChainDelta::default()).is_err());
    }

    /// Every candidate differs from its parent by whole CH2 units, plus one
    /// oxygen when hydroxylated, and stays in one piece.
    fn assert_mass_steps(parent: &str, out: &[StructureNotation]) {
        let parent_mass = molecular_weight(&parse_smiles(parent).unwrap());
        for smiles in out {
            assert!(!smiles.as_str().contains('.'), "{} is fragmented", smiles);
            let delta = molecular_weight(&MolecularGraph::parse(smiles).unwrap()) - parent_mass;
            let explained = (-3..=3).any(|k: i32| {
                [0.0, 15.999]
                    .iter()
                    .any(|oxygen| (delta - (k as f64 * 14.027 + oxygen)).abs() < 1e-3)
            });
            assert!(explained, "{} differs from {} by {}", smiles, parent, delta);
        }
    }

    #[test]
    fn test_thco_candidates_mass_steps() {
        let thco = "CCCCCC1=CC(=C2[C@@H]3CC(=CC[C@H]3C(OC2=C1)(C)C)C)OC(C)=O";
        let out = propose_derivatives(&thco.into(), &ChainDelta::default()).unwrap();
        assert!(!out.is_empty());
        assert_mass_steps(thco, &out);

        let explicit = "[H]C([H])([H])C([H])([H])CCCc1ccccc1";
        let out = propose_derivatives(&explicit.into(), &ChainDelta::default()).unwrap();
        assert_eq!(out.len(), 6 + 1 + 6);
        assert_mass_steps(explicit, &out);
    }

    #[test]
    fn test_family_of_parents() {
        let parents: Vec<StructureNotation> = ["CCCCCc1ccccc1", "C1CC", "CCCCCCc1ccccc1"]
            .iter()
            .map(|s| StructureNotation::from(*s))
            .collect();
        let family = propose_family(&parents, &ChainDelta::new(-1, 1));
        assert_eq!(family.len(), 2);
        assert_eq!(family[0].0, parents[0]);
        assert_eq!(family[1].0, parents[2]);

        let distinct = distinct_derivatives(&family);
        // Both parents yield OCCCCCc1ccccc1 and OCCCCCCc1ccccc1.
        assert_eq!(family.iter().map(|(_, c)| c.len()).sum::<usize>(), 10);
        assert_eq!(distinct.len(), 8);
        let unique: HashSet<_> = distinct.iter().collect();
        assert_eq!(unique.len(), distinct.len());
        assert_eq!(&distinct[..5], family[0].1.as_slice());
    }
}
