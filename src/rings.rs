use std::collections::VecDeque;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::trace;

use crate::MoleculeGraph;

/// Ring perception results for one graph: a smallest set of smallest rings
/// plus per-atom and per-bond ring membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingInfo {
    rings: Vec<Vec<NodeIndex>>,
    atom_in_ring: Vec<bool>,
    bond_in_ring: Vec<bool>,
}

impl RingInfo {
    pub fn perceive<N, E>(graph: &petgraph::graph::UnGraph<N, E>) -> Self {
        let node_count = graph.node_count();
        let edge_count = graph.edge_count();
        let cyclomatic =
            (edge_count + petgraph::algo::connected_components(graph)).saturating_sub(node_count);
        let mut info = RingInfo {
            rings: Vec::new(),
            atom_in_ring: vec![false; node_count],
            bond_in_ring: vec![false; edge_count],
        };
        if cyclomatic == 0 || node_count == 0 {
            return info;
        }

        let mut candidates = horton_candidates(graph);
        candidates.sort_by(|a, b| a.nodes.len().cmp(&b.nodes.len()).then_with(|| a.edges.cmp(&b.edges)));
        candidates.dedup_by(|a, b| a.edges == b.edges);

        let mut basis: Vec<(usize, Vec<u64>)> = Vec::new();
        for candidate in candidates {
            if basis.len() == cyclomatic {
                break;
            }
            let mut reduced = candidate.edges.clone();
            for (pivot, vector) in &basis {
                if bit(&reduced, *pivot) {
                    xor_into(&mut reduced, vector);
                }
            }
            if let Some(pivot) = lowest_bit(&reduced) {
                // Keep the basis reduced so later candidates can be tested in one pass.
                for (other_pivot, vector) in basis.iter_mut() {
                    if bit(vector, pivot) && *other_pivot != pivot {
                        xor_into(vector, &reduced);
                    }
                }
                basis.push((pivot, reduced));
                for &node in &candidate.nodes {
                    info.atom_in_ring[node.index()] = true;
                }
                for (i, word) in candidate.edges.iter().enumerate() {
                    for b in 0..64 {
                        if word & (1u64 << b) != 0 {
                            info.bond_in_ring[i * 64 + b] = true;
                        }
                    }
                }
                info.rings.push(candidate.nodes);
            }
        }
        trace!("perceived {} ring(s), cyclomatic number {}", info.rings.len(), cyclomatic);
        info
    }

    /// The rings, smallest first; each ring lists its atoms in cyclic order.
    pub fn rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    pub fn is_atom_in_ring(&self, node: NodeIndex) -> bool {
        self.atom_in_ring.get(node.index()).copied().unwrap_or(false)
    }

    pub fn is_bond_in_ring(&self, edge: EdgeIndex) -> bool {
        self.bond_in_ring.get(edge.index()).copied().unwrap_or(false)
    }

    /// Is the atom a member of a three-membered ring?
    pub fn in_three_ring(&self, node: NodeIndex) -> bool {
        self.rings.iter().any(|ring| ring.len() == 3 && ring.contains(&node))
    }
}

struct Cycle {
    nodes: Vec<NodeIndex>,
    edges: Vec<u64>,
}

/// Atoms left after repeatedly stripping atoms with at most one neighbour.
/// Every ring lies inside this core.
fn cyclic_core<N, E>(graph: &petgraph::graph::UnGraph<N, E>) -> Vec<bool> {
    let mut degree: Vec<usize> = graph.node_indices().map(|n| graph.neighbors(n).count()).collect();
    let mut core = vec![true; graph.node_count()];
    let mut stack: Vec<NodeIndex> = graph.node_indices().filter(|n| degree[n.index()] <= 1).collect();
    while let Some(node) = stack.pop() {
        if !core[node.index()] {
            continue;
        }
        core[node.index()] = false;
        for next in graph.neighbors(node) {
            if core[next.index()] {
                degree[next.index()] -= 1;
                if degree[next.index()] == 1 {
                    stack.push(next);
                }
            }
        }
    }
    core
}

/// Horton's candidate set: for every root and every edge (x, y), the cycle
/// formed by the shortest paths root→x, root→y and the edge itself, kept only
/// when the two paths share nothing but the root. Roots and paths stay inside
/// the cyclic core, and each root costs one BFS plus one path walk per
/// closing edge.
fn horton_candidates<N, E>(graph: &petgraph::graph::UnGraph<N, E>) -> Vec<Cycle> {
    let words = graph.edge_count() / 64 + 1;
    let core = cyclic_core(graph);
    let mut on_path = vec![false; graph.node_count()];
    let mut cycles = Vec::new();

    for root in graph.node_indices().filter(|n| core[n.index()]) {
        let mut parent: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; graph.node_count()];
        let mut seen = vec![false; graph.node_count()];
        let mut queue = VecDeque::new();
        seen[root.index()] = true;
        queue.push_back(root);
        while let Some(current) = queue.pop_front() {
            let mut edges: Vec<_> = graph.edges(current).collect();
            edges.sort_by_key(|e| (e.target().index(), e.source().index()));
            for edge in edges {
                let next = if edge.source() == current { edge.target() } else { edge.source() };
                if core[next.index()] && !seen[next.index()] {
                    seen[next.index()] = true;
                    parent[next.index()] = Some((current, edge.id()));
                    queue.push_back(next);
                }
            }
        }

        let path_to = |mut node: NodeIndex| {
            let mut nodes = vec![node];
            let mut edges = Vec::new();
            while let Some((p, e)) = parent[node.index()] {
                nodes.push(p);
                edges.push(e);
                node = p;
            }
            nodes.reverse();
            (nodes, edges)
        };

        for edge in graph.edge_references() {
            let (x, y) = (edge.source(), edge.target());
            if !seen[x.index()] || !seen[y.index()] {
                continue;
            }
            // Tree edges never close a cycle.
            if parent[x.index()].map(|(_, e)| e) == Some(edge.id())
                || parent[y.index()].map(|(_, e)| e) == Some(edge.id())
            {
                continue;
            }
            let (px, ex) = path_to(x);
            let (py, ey) = path_to(y);
            for n in &px[1..] {
                on_path[n.index()] = true;
            }
            let shared = py[1..].iter().any(|n| on_path[n.index()]);
            for n in &px[1..] {
                on_path[n.index()] = false;
            }
            if shared {
                continue;
            }
            let mut nodes = px;
            nodes.extend(py.into_iter().skip(1).rev());
            let mut bits = vec![0u64; words];
            for e in ex.iter().chain(ey.iter()).chain(std::iter::once(&edge.id())) {
                bits[e.index() / 64] |= 1u64 << (e.index() % 64);
            }
            cycles.push(Cycle { nodes, edges: bits });
        }
    }
    cycles
}

fn bit(bits: &[u64], index: usize) -> bool {
    bits[index / 64] & (1u64 << (index % 64)) != 0
}

fn xor_into(target: &mut [u64], source: &[u64]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t ^= *s;
    }
}

fn lowest_bit(bits: &[u64]) -> Option<usize> {
    bits.iter()
        .enumerate()
        .find(|(_, w)| **w != 0)
        .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
}

/// Convenience for callers holding a bare molecule graph.
pub fn perceive_rings(graph: &MoleculeGraph) -> RingInfo {
    RingInfo::perceive(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::graph::UnGraph;

    fn ring_graph(n: usize) -> UnGraph<(), ()> {
        let mut graph = UnGraph::new_undirected();
        let nodes: Vec<_> = (0..n).map(|_| graph.add_node(())).collect();
        for i in 0..n {
            graph.add_edge(nodes[i], nodes[(i + 1) % n], ());
        }
        graph
    }

    #[test]
    fn test_single_ring() {
        let graph = ring_graph(6);
        let info = RingInfo::perceive(&graph);
        assert_eq!(info.ring_count(), 1);
        assert_eq!(info.rings()[0].len(), 6);
        assert!(graph.node_indices().all(|n| info.is_atom_in_ring(n)));
    }

    #[test]
    fn test_fused_rings() {
        // Naphthalene skeleton: two six-rings sharing an edge.
        let mut graph = ring_graph(6);
        let a = NodeIndex::new(0);
        let b = NodeIndex::new(1);
        let extra: Vec<_> = (0..4).map(|_| graph.add_node(())).collect();
        graph.add_edge(a, extra[0], ());
        graph.add_edge(extra[0], extra[1], ());
        graph.add_edge(extra[1], extra[2], ());
        graph.add_edge(extra[2], extra[3], ());
        graph.add_edge(extra[3], b, ());
        let info = RingInfo::perceive(&graph);
        assert_eq!(info.ring_count(), 2);
        assert!(info.rings().iter().all(|r| r.len() == 6));
    }

    #[test]
    fn test_chain_has_no_rings() {
        let mut graph: UnGraph<(), ()> = UnGraph::new_undirected();
        let a = graph.add_node(());
        let b = graph.add_node(());
        let c = graph.add_node(());
        let ab = graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());
        let info = RingInfo::perceive(&graph);
        assert_eq!(info.ring_count(), 0);
        assert!(!info.is_bond_in_ring(ab));
        assert!(!info.is_atom_in_ring(b));
    }

    #[test]
    fn test_large_ring() {
        let graph = ring_graph(2000);
        let info = RingInfo::perceive(&graph);
        assert_eq!(info.ring_count(), 1);
        assert_eq!(info.rings()[0].len(), 2000);
    }

    #[test]
    fn test_long_tails_outside_core() {
        // Benzene ring carrying a 500-atom chain and a branch off the chain.
        let mut graph = ring_graph(6);
        let mut prev = NodeIndex::new(0);
        let mut chain = Vec::new();
        for _ in 0..500 {
            let next = graph.add_node(());
            graph.add_edge(prev, next, ());
            chain.push(next);
            prev = next;
        }
        let branch = graph.add_node(());
        graph.add_edge(chain[250], branch, ());

        let core = cyclic_core(&graph);
        assert_eq!(core.iter().filter(|c| **c).count(), 6);
        let info = RingInfo::perceive(&graph);
        assert_eq!(info.ring_count(), 1);
        assert!(chain.iter().all(|n| !info.is_atom_in_ring(*n)));
        assert!(!info.is_atom_in_ring(branch));
    }

    #[test]
    fn test_ring_with_tail() {
        // Cyclopropane with a methyl group: only the ring bonds are ring bonds.
        let mut graph = ring_graph(3);
        let tail = graph.add_node(());
        let tail_edge = graph.add_edge(NodeIndex::new(0), tail, ());
        let info = RingInfo::perceive(&graph);
        assert_eq!(info.ring_count(), 1);
        assert!(info.in_three_ring(NodeIndex::new(1)));
        assert!(!info.is_bond_in_ring(tail_edge));
        assert!(!info.is_atom_in_ring(tail));
    }
}
