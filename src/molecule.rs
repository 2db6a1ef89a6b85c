use std::collections::BTreeMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::trace;

use crate::{canonical_smiles, parse_smiles, Bond, Element, ParseError, RingInfo, StructureNotation};

pub type MoleculeGraph = UnGraph<Atom, Bond>;

/// One atom of a molecular graph.
///
/// `hydrogens` counts the implicit (or bracket-written) hydrogens only;
/// hydrogens present as their own nodes are reached through the bonds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    pub isotope: Option<u16>,
    pub hydrogens: u8,
    pub bracketed: bool,
}

impl Atom {
    /// An organic-subset atom. Its hydrogen count is filled in when the
    /// graph is validated.
    pub fn organic(element: Element, aromatic: bool) -> Self {
        Self {
            element,
            aromatic,
            charge: 0,
            isotope: None,
            hydrogens: 0,
            bracketed: false,
        }
    }

    pub fn bracket(
        element: Element,
        aromatic: bool,
        isotope: Option<u16>,
        hydrogens: u8,
        charge: i8,
    ) -> Self {
        Self {
            element,
            aromatic,
            charge,
            isotope,
            hydrogens,
            bracketed: true,
        }
    }

    /// Mass of the atom itself, without attached hydrogens. An explicit
    /// isotope uses its mass number.
    pub fn mass(&self) -> f64 {
        match self.isotope {
            Some(mass_number) => mass_number as f64,
            None => self.element.average_mass(),
        }
    }

    pub fn is_heavy(&self) -> bool {
        !self.element.is_hydrogen()
    }

    /// Whether the pi system takes one unit of this atom's valence.
    fn uses_pi_valence(&self) -> bool {
        self.aromatic && self.charge >= 0 && matches!(self.element, Element::C | Element::B)
    }
}

/// A validated molecule: hydrogens resolved, valences checked and rings
/// perceived. Values are never mutated; edits build a new graph and go back
/// through [`MolecularGraph::from_graph`].
#[derive(Debug, Clone)]
pub struct MolecularGraph {
    graph: MoleculeGraph,
    rings: RingInfo,
}

impl MolecularGraph {
    pub fn parse(notation: &StructureNotation) -> Result<Self, ParseError> {
        parse_smiles(notation.as_str())
    }

    /// Validate a raw graph. Non-bracket atoms get their implicit hydrogen
    /// count recomputed from their bonds.
    pub fn from_graph(mut graph: MoleculeGraph) -> Result<Self, ParseError> {
        let rings = RingInfo::perceive(&graph);

        for edge in graph.edge_references() {
            if *edge.weight() == Bond::Aromatic
                && !(graph[edge.source()].aromatic && graph[edge.target()].aromatic)
            {
                return Err(ParseError::InvalidAromaticBond(
                    edge.source().index(),
                    edge.target().index(),
                ));
            }
        }

        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for node in nodes {
            let atom = &graph[node];
            if atom.aromatic && !rings.is_atom_in_ring(node) {
                return Err(ParseError::AromaticOutsideRing {
                    element: atom.element,
                    index: node.index(),
                });
            }

            let sum = bond_order_sum(&graph, node);
            if !atom.bracketed {
                let hydrogens = implicit_hydrogens(atom, sum).ok_or_else(|| ParseError::Valence {
                    element: atom.element,
                    index: node.index(),
                    charge: atom.charge,
                    valence: sum,
                    allowed: atom.element.allowed_valences(atom.charge),
                })?;
                graph[node].hydrogens = hydrogens;
            }

            let atom = &graph[node];
            let valence = sum + atom.hydrogens as u16 + atom.uses_pi_valence() as u16;
            let allowed = atom.element.allowed_valences(atom.charge);
            match allowed.last() {
                Some(&max) if valence <= max => {}
                _ => {
                    return Err(ParseError::Valence {
                        element: atom.element,
                        index: node.index(),
                        charge: atom.charge,
                        valence,
                        allowed,
                    })
                }
            }
        }

        perceive_aromaticity(&mut graph, &rings);

        trace!(
            "validated graph with {} atoms, {} bonds, {} rings",
            graph.node_count(),
            graph.edge_count(),
            rings.ring_count()
        );
        Ok(Self { graph, rings })
    }

    pub fn graph(&self) -> &MoleculeGraph {
        &self.graph
    }

    /// Give back the raw graph, for building an edited copy.
    pub fn into_graph(self) -> MoleculeGraph {
        self.graph
    }

    pub fn rings(&self) -> &RingInfo {
        &self.rings
    }

    pub fn atom(&self, node: NodeIndex) -> &Atom {
        &self.graph[node]
    }

    pub fn atoms(&self) -> impl Iterator<Item = (NodeIndex, &Atom)> + '_ {
        self.graph.node_indices().map(move |n| (n, &self.graph[n]))
    }

    /// Neighbours of `node` with the connecting bond.
    pub fn bonds_of(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, Bond, EdgeIndex)> + '_ {
        self.graph.edges(node).map(move |edge| {
            let other = if edge.source() == node { edge.target() } else { edge.source() };
            (other, *edge.weight(), edge.id())
        })
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.graph.node_weights().filter(|a| a.is_heavy()).count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn bond_order_sum(&self, node: NodeIndex) -> u16 {
        bond_order_sum(&self.graph, node)
    }

    /// Number of non-hydrogen neighbours.
    pub fn heavy_degree(&self, node: NodeIndex) -> usize {
        self.graph
            .neighbors(node)
            .filter(|&n| self.graph[n].is_heavy())
            .count()
    }

    /// Implicit hydrogens plus hydrogens bonded as explicit nodes.
    pub fn hydrogen_count(&self, node: NodeIndex) -> u16 {
        let explicit = self
            .graph
            .neighbors(node)
            .filter(|&n| self.graph[n].element.is_hydrogen())
            .count() as u16;
        self.graph[node].hydrogens as u16 + explicit
    }

    /// Every hydrogen in the molecule, implicit or explicit.
    pub fn total_hydrogens(&self) -> usize {
        self.graph
            .node_weights()
            .map(|a| a.hydrogens as usize + a.element.is_hydrogen() as usize)
            .sum()
    }

    pub fn net_charge(&self) -> i32 {
        self.graph.node_weights().map(|a| a.charge as i32).sum()
    }

    /// Molecular formula in Hill order: carbon, hydrogen, then the rest
    /// alphabetically; without carbon everything is alphabetical.
    pub fn formula(&self) -> String {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for atom in self.graph.node_weights() {
            *counts.entry(atom.element.symbol()).or_default() += 1;
            if atom.hydrogens > 0 {
                *counts.entry("H").or_default() += atom.hydrogens as usize;
            }
        }

        let mut formula = String::new();
        let mut push = |symbol: &str, count: usize| {
            formula.push_str(symbol);
            if count > 1 {
                formula.push_str(&count.to_string());
            }
        };
        if let Some(carbon) = counts.remove("C") {
            push("C", carbon);
            if let Some(hydrogen) = counts.remove("H") {
                push("H", hydrogen);
            }
        }
        for (symbol, count) in counts {
            push(symbol, count);
        }
        formula
    }

    pub fn to_smiles(&self) -> StructureNotation {
        canonical_smiles(self)
    }
}

fn bond_order_sum(graph: &MoleculeGraph, node: NodeIndex) -> u16 {
    graph
        .edges(node)
        .map(|e| e.weight().valence_contribution() as u16)
        .sum()
}

/// Mark Kekulé-written five and six membered rings with six pi electrons as
/// aromatic. Fused rings are resolved by repeating until nothing changes.
fn perceive_aromaticity(graph: &mut MoleculeGraph, rings: &RingInfo) {
    let ring_edges: Vec<Option<Vec<EdgeIndex>>> = rings
        .rings()
        .iter()
        .map(|ring| {
            (0..ring.len())
                .map(|k| graph.find_edge(ring[k], ring[(k + 1) % ring.len()]))
                .collect()
        })
        .collect();

    let mut aromatic_ring = vec![false; rings.ring_count()];
    let mut pi_edge: Vec<bool> = graph
        .edge_indices()
        .map(|e| graph[e] == Bond::Aromatic)
        .collect();
    for (k, ring) in rings.rings().iter().enumerate() {
        if ring.iter().all(|&n| graph[n].aromatic) {
            aromatic_ring[k] = true;
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for (k, ring) in rings.rings().iter().enumerate() {
            let Some(edges) = &ring_edges[k] else { continue };
            if aromatic_ring[k] || !is_huckel_ring(graph, ring, edges, &pi_edge) {
                continue;
            }
            aromatic_ring[k] = true;
            for &edge in edges {
                pi_edge[edge.index()] = true;
            }
            changed = true;
        }
    }

    let mut touched = Vec::new();
    for (k, ring) in rings.rings().iter().enumerate() {
        let Some(edges) = &ring_edges[k] else { continue };
        if !aromatic_ring[k] || ring.iter().all(|&n| graph[n].aromatic) {
            continue;
        }
        for &node in ring {
            if !graph[node].aromatic {
                graph[node].aromatic = true;
                touched.push(node);
            }
        }
        for &edge in edges {
            graph[edge] = Bond::Aromatic;
        }
    }

    // Keep the hydrogens found from the Kekulé form. Where the aromatic
    // rule would infer a different count, pin it as a bracket atom.
    for node in touched {
        if graph[node].bracketed {
            continue;
        }
        let sum = bond_order_sum(graph, node);
        if implicit_hydrogens(&graph[node], sum) != Some(graph[node].hydrogens) {
            graph[node].bracketed = true;
        }
    }
}

fn is_huckel_ring(graph: &MoleculeGraph, ring: &[NodeIndex], edges: &[EdgeIndex], pi_edge: &[bool]) -> bool {
    if ring.len() != 5 && ring.len() != 6 {
        return false;
    }
    let mut electrons = 0;
    for &node in ring {
        let atom = &graph[node];
        if !atom.element.can_be_aromatic() {
            return false;
        }
        let mut multiple = graph
            .edges(node)
            .filter(|e| !matches!(e.weight(), Bond::Single | Bond::Aromatic));
        match (multiple.next(), multiple.next()) {
            (None, _) if atom.aromatic => {
                electrons += if lone_pair_donor(graph, node) { 2 } else { 1 };
            }
            (None, _) => {
                let donor = (matches!(atom.element, Element::N | Element::O | Element::S | Element::Se | Element::P)
                    && atom.charge == 0)
                    || (atom.element == Element::C && atom.charge == -1);
                if !donor {
                    return false;
                }
                electrons += 2;
            }
            (Some(edge), None) if *edge.weight() == Bond::Double => {
                if !(edges.contains(&edge.id()) || pi_edge[edge.id().index()]) {
                    return false;
                }
                electrons += 1;
            }
            _ => return false,
        }
    }
    electrons == 6
}

/// An aromatic-flagged atom that gives two electrons to the ring: pyrrole
/// type nitrogen, furan oxygen, thiophene sulfur.
fn lone_pair_donor(graph: &MoleculeGraph, node: NodeIndex) -> bool {
    let atom = &graph[node];
    match atom.element {
        Element::O | Element::S | Element::Se => true,
        Element::N | Element::P => {
            atom.charge == 0 && (atom.hydrogens > 0 || graph.neighbors(node).count() == 3)
        }
        _ => false,
    }
}

/// Organic-subset hydrogen rule. Aromatic atoms reserve one unit of their
/// lowest valence for the pi system when it still fits.
pub(crate) fn implicit_hydrogens(atom: &Atom, sum: u16) -> Option<u8> {
    let valence = if atom.aromatic {
        let lowest = atom.element.implicit_valence(0)?;
        if sum + 1 <= lowest {
            return u8::try_from(lowest - sum - 1).ok();
        } else if sum <= lowest {
            return Some(0);
        }
        atom.element.implicit_valence(sum)?
    } else {
        atom.element.implicit_valence(sum)?
    };
    u8::try_from(valence - sum).ok()
}
