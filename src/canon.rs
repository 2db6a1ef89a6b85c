use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::trace;

use crate::{Bond, MolecularGraph, StructureNotation};

/// Canonical atom ranks (index by `NodeIndex::index()`), all distinct.
///
/// Atoms start from a graph invariant, then are repeatedly re-ranked by
/// their neighbours' ranks, Morgan style. Remaining ties are broken by
/// promoting one atom of the lowest tied class and refining again.
///
/// A refinement pass can split as little as one class, so long unbranched
/// chains and large macrocycles take a number of passes proportional to
/// their length and total time quadratic in the atom count. Intended inputs
/// are drug sized, a few hundred atoms.
pub fn morgan_algorithm(mol: &MolecularGraph) -> Vec<usize> {
    let graph = mol.graph();
    let invariants: Vec<_> = graph
        .node_indices()
        .map(|n| {
            let atom = mol.atom(n);
            (
                mol.heavy_degree(n),
                atom.element.atomic_number(),
                atom.isotope.unwrap_or(0),
                atom.charge,
                mol.hydrogen_count(n),
                atom.aromatic,
                mol.rings().is_atom_in_ring(n),
            )
        })
        .collect();
    let mut ranks = dense_ranks(&invariants);
    ranks = refine(mol, ranks);

    let n = ranks.len();
    while count_distinct(&ranks) < n {
        let Some(tied) = lowest_tied_rank(&ranks) else { break };
        let chosen = (0..n).find(|&i| ranks[i] == tied).unwrap_or(0);
        let mut split: Vec<usize> = ranks.iter().map(|r| r * 2 + 1).collect();
        split[chosen] -= 1;
        ranks = refine(mol, dense_ranks(&split));
    }
    ranks
}

fn bond_code(bond: Bond) -> u8 {
    match bond {
        Bond::Single => 1,
        Bond::Double => 2,
        Bond::Triple => 3,
        Bond::Quadruple => 4,
        Bond::Aromatic => 5,
    }
}

fn refine(mol: &MolecularGraph, mut ranks: Vec<usize>) -> Vec<usize> {
    let mut distinct = count_distinct(&ranks);
    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = mol
            .graph()
            .node_indices()
            .map(|n| {
                let mut neighbours: Vec<(usize, u8)> = mol
                    .bonds_of(n)
                    .map(|(other, bond, _)| (ranks[other.index()], bond_code(bond)))
                    .collect();
                neighbours.sort_unstable();
                (ranks[n.index()], neighbours)
            })
            .collect();
        let next = dense_ranks(&keys);
        let next_distinct = count_distinct(&next);
        if next_distinct <= distinct {
            return ranks;
        }
        ranks = next;
        distinct = next_distinct;
    }
}

fn dense_ranks<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut sorted: Vec<&T> = keys.iter().collect();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|k| sorted.binary_search(&k).unwrap_or(0))
        .collect()
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn lowest_tied_rank(ranks: &[usize]) -> Option<usize> {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
}

/// Canonical SMILES: the same string for every input that describes the
/// same graph.
pub fn canonical_smiles(mol: &MolecularGraph) -> StructureNotation {
    let ranks = morgan_algorithm(mol);
    let mut writer = SmilesWriter::new(mol, &ranks);

    let mut starts: Vec<NodeIndex> = Vec::new();
    let mut by_rank: Vec<NodeIndex> = mol.graph().node_indices().collect();
    by_rank.sort_by_key(|n| ranks[n.index()]);
    for node in by_rank {
        if !writer.visited[node.index()] {
            starts.push(node);
            writer.build_tree(node);
        }
    }

    let fragments: Vec<String> = starts
        .into_iter()
        .map(|start| {
            let mut out = String::new();
            writer.write(start, None, &mut out);
            out
        })
        .collect();
    let smiles = fragments.join(".");
    trace!("canonical form {}", smiles);
    StructureNotation::new(smiles)
}

struct SmilesWriter<'a> {
    mol: &'a MolecularGraph,
    ranks: &'a [usize],
    visited: Vec<bool>,
    edge_used: Vec<bool>,
    children: Vec<Vec<(NodeIndex, Bond)>>,
    openings: Vec<Vec<(EdgeIndex, NodeIndex, Bond)>>,
    closings: Vec<Vec<EdgeIndex>>,
    digits: Vec<(EdgeIndex, usize)>,
}

impl<'a> SmilesWriter<'a> {
    fn new(mol: &'a MolecularGraph, ranks: &'a [usize]) -> Self {
        let n = mol.atom_count();
        Self {
            mol,
            ranks,
            visited: vec![false; n],
            edge_used: vec![false; mol.bond_count()],
            children: vec![Vec::new(); n],
            openings: vec![Vec::new(); n],
            closings: vec![Vec::new(); n],
            digits: Vec::new(),
        }
    }

    /// First pass: the depth-first spanning tree, with every other bond
    /// recorded as a ring closure opened at the earlier atom.
    fn build_tree(&mut self, atom: NodeIndex) {
        self.visited[atom.index()] = true;
        let mut neighbours: Vec<(NodeIndex, Bond, EdgeIndex)> = self.mol.bonds_of(atom).collect();
        neighbours.sort_by_key(|(n, _, _)| self.ranks[n.index()]);
        for (next, bond, edge) in neighbours {
            if self.edge_used[edge.index()] {
                continue;
            }
            self.edge_used[edge.index()] = true;
            if self.visited[next.index()] {
                self.openings[next.index()].push((edge, atom, bond));
                self.closings[atom.index()].push(edge);
            } else {
                self.children[atom.index()].push((next, bond));
                self.build_tree(next);
            }
        }
    }

    fn write(&mut self, atom: NodeIndex, from: Option<(NodeIndex, Bond)>, out: &mut String) {
        if let Some((prev, bond)) = from {
            out.push_str(self.bond_text(prev, atom, bond));
        }
        out.push_str(&self.atom_text(atom));

        let mut freed = Vec::new();
        for edge in self.closings[atom.index()].clone() {
            if let Some(pos) = self.digits.iter().position(|(e, _)| *e == edge) {
                let (_, digit) = self.digits.remove(pos);
                out.push_str(&digit_text(digit));
                freed.push(digit);
            }
        }
        for (edge, partner, bond) in self.openings[atom.index()].clone() {
            let digit = (1..)
                .find(|d| !self.digits.iter().any(|(_, used)| used == d) && !freed.contains(d))
                .unwrap_or(1);
            out.push_str(self.bond_text(atom, partner, bond));
            out.push_str(&digit_text(digit));
            self.digits.push((edge, digit));
        }

        let children = self.children[atom.index()].clone();
        let last = children.len().saturating_sub(1);
        for (k, (child, bond)) in children.into_iter().enumerate() {
            if k < last {
                out.push('(');
                self.write(child, Some((atom, bond)), out);
                out.push(')');
            } else {
                self.write(child, Some((atom, bond)), out);
            }
        }
    }

    fn bond_text(&self, a: NodeIndex, b: NodeIndex, bond: Bond) -> &'static str {
        let both_aromatic = self.mol.atom(a).aromatic && self.mol.atom(b).aromatic;
        match bond {
            Bond::Single if both_aromatic => "-",
            Bond::Single | Bond::Aromatic => "",
            other => other.smiles_symbol(),
        }
    }

    fn atom_text(&self, node: NodeIndex) -> String {
        let atom = self.mol.atom(node);
        let symbol = if atom.aromatic {
            atom.element.symbol().to_lowercase()
        } else {
            atom.element.symbol().to_string()
        };
        let mut bare = atom.clone();
        bare.bracketed = false;
        bare.hydrogens = 0;
        let inferred = crate::molecule::implicit_hydrogens(&bare, self.mol.bond_order_sum(node));
        let organic = atom.element.is_organic_subset()
            && (!atom.aromatic || crate::Element::from_aromatic_symbol(&symbol).is_some());
        if organic
            && atom.charge == 0
            && atom.isotope.is_none()
            && inferred == Some(atom.hydrogens)
        {
            return symbol;
        }

        let mut text = String::from("[");
        if let Some(isotope) = atom.isotope {
            text.push_str(&isotope.to_string());
        }
        text.push_str(&symbol);
        match atom.hydrogens {
            0 => {}
            1 => text.push('H'),
            h => text.push_str(&format!("H{}", h)),
        }
        match atom.charge {
            0 => {}
            1 => text.push('+'),
            -1 => text.push('-'),
            q if q > 0 => text.push_str(&format!("+{}", q)),
            q => text.push_str(&format!("-{}", -(q as i16))),
        }
        text.push(']');
        text
    }
}

fn digit_text(digit: usize) -> String {
    if digit < 10 {
        digit.to_string()
    } else {
        format!("%{}", digit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    fn canon(smiles: &str) -> String {
        parse_smiles(smiles).unwrap().to_smiles().to_string()
    }

    #[test]
    fn test_ranks_are_distinct() {
        let mol = parse_smiles("c1ccccc1C").unwrap();
        let mut ranks = morgan_algorithm(&mol);
        ranks.sort_unstable();
        assert_eq!(ranks, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_long_chain_and_macrocycle() {
        let chain = "C".repeat(300);
        assert_eq!(canon(&chain), chain);

        let ring = format!("C1{}C1", "C".repeat(198));
        let once = canon(&ring);
        assert_eq!(canon(&once), once);
        assert_eq!(parse_smiles(&once).unwrap().formula(), "C200H400");
    }

    #[test]
    fn test_canonize_substituted_benzene() {
        let a = canon("c1c(O)cccc1");
        let b = canon("c1ccccc1O");
        let c = canon("Oc1ccccc1");
        let d = canon("C1=CC=CC(O)=C1");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);
    }

    #[test]
    fn test_canonize_disubstituted() {
        let a = canon("c1c(C)cc(O)cc1");
        let b = canon("c1cc(O)cc(C)c1");
        let c = canon("Cc1cccc(O)c1");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_ne!(a, canon("Cc1ccc(O)cc1"));
    }

    #[test]
    fn test_canonical_round_trip() {
        for smiles in [
            "CCO",
            "CC(C)(C)O",
            "c1ccc2ccccc2c1",
            "C1CC2CCC1C2",
            "c1cc[nH]c1",
            "CC(=O)[O-].[Na+]",
            "[13CH3]C#N",
            "c1ccccc1-c1ccccc1",
            "CCCCCC1=CC(=C2[C@@H]3CC(=CC[C@H]3C(OC2=C1)(C)C)C)OC(C)=O",
        ] {
            let first = canon(smiles);
            let second = canon(&first);
            assert_eq!(first, second, "{} is not stable", smiles);
        }
    }

    #[test]
    fn test_distinguishes_isomers() {
        assert_ne!(canon("CCO"), canon("COC"));
        assert_ne!(canon("CCCC"), canon("CC(C)C"));
        assert_eq!(canon("OCC"), canon("CCO"));
    }

    #[test]
    fn test_bracket_output() {
        assert_eq!(canon("[NH4+]"), "[NH4+]");
        assert_eq!(canon("C[N+](C)(C)C"), "C[N+](C)(C)C");
        assert_eq!(canon("c1cc[nH]c1"), canon("[nH]1cccc1"));
        assert!(canon("c1cc[nH]c1").contains("[nH]"));
    }

    #[test]
    fn test_fragments_sorted() {
        assert_eq!(canon("[Na+].[Cl-]"), canon("[Cl-].[Na+]"));
        assert!(canon("[Na+].[Cl-]").contains('.'));
    }
}
