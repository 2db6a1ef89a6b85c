use std::collections::BTreeMap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;
use tracing::debug;

use super::bracket::parse_bracket_atom;
use crate::{Atom, Bond, Element, MolecularGraph, MoleculeGraph, RingInfo};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty structure notation")]
    Empty,
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedCharacter(char, usize),
    #[error("unknown element symbol '{0}' at position {1}")]
    UnknownElement(String, usize),
    #[error("malformed bracket atom '[{content}]' at position {position}: {reason}")]
    MalformedBracket {
        content: String,
        position: usize,
        reason: String,
    },
    #[error("unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("{0} branch(es) opened with '(' are never closed")]
    UnclosedBranch(usize),
    #[error("bond '{0}' at position {1} without a preceding atom")]
    BondNoCurrentAtom(char, usize),
    #[error("bond symbol at position {0} is not followed by an atom")]
    DanglingBond(usize),
    #[error("ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u16, usize),
    #[error("ring closure {0} opened at position {1} is never closed")]
    UnclosedRing(u16, usize),
    #[error("ring closure {0} at position {1} bonds an atom to itself")]
    RingBondToSelf(u16, usize),
    #[error("ring closure {0} at position {1} has conflicting bond symbols")]
    ConflictingRingBond(u16, usize),
    #[error("atoms {0} and {1} are bonded twice")]
    DuplicateBond(usize, usize),
    #[error("aromatic atom {element} (atom {index}) is not in a ring")]
    AromaticOutsideRing { element: Element, index: usize },
    #[error("aromatic bond between atoms {0} and {1} has a non-aromatic end")]
    InvalidAromaticBond(usize, usize),
    #[error("{element} (atom {index}, charge {charge}) has valence {valence}, allowed {allowed:?}")]
    Valence {
        element: Element,
        index: usize,
        charge: i8,
        valence: u16,
        allowed: Vec<u16>,
    },
}

/// Parse a SMILES string into a validated molecular graph.
pub fn parse_smiles(smiles: &str) -> Result<MolecularGraph, ParseError> {
    let graph = parse_smiles_helper(smiles.trim())?;
    MolecularGraph::from_graph(graph)
}

struct PendingBond {
    bond: Bond,
    position: usize,
}

struct RingOpening {
    atom: NodeIndex,
    bond: Option<Bond>,
    position: usize,
}

struct Builder {
    graph: MoleculeGraph,
    current_atom: Option<NodeIndex>,
    pending: Option<PendingBond>,
    branch_stack: Vec<NodeIndex>,
    ring_map: BTreeMap<u16, RingOpening>,
    // Bonds written without a symbol between two aromatic atoms.
    implicit_aromatic: Vec<EdgeIndex>,
}

impl Builder {
    fn new() -> Self {
        Self {
            graph: MoleculeGraph::new_undirected(),
            current_atom: None,
            pending: None,
            branch_stack: Vec::new(),
            ring_map: BTreeMap::new(),
            implicit_aromatic: Vec::new(),
        }
    }

    fn connect(&mut self, a: NodeIndex, b: NodeIndex, bond: Option<Bond>) -> Result<(), ParseError> {
        if self.graph.find_edge(a, b).is_some() {
            return Err(ParseError::DuplicateBond(a.index(), b.index()));
        }
        let both_aromatic = self.graph[a].aromatic && self.graph[b].aromatic;
        let bond_to_use = match bond {
            Some(bond) => bond,
            None if both_aromatic => Bond::Aromatic,
            None => Bond::Single,
        };
        let edge = self.graph.add_edge(a, b, bond_to_use);
        if bond.is_none() && both_aromatic {
            self.implicit_aromatic.push(edge);
        }
        Ok(())
    }

    fn add_atom(&mut self, atom: Atom) -> Result<(), ParseError> {
        let new_atom = self.graph.add_node(atom);
        if let Some(prev_atom) = self.current_atom {
            let bond = self.pending.take().map(|p| p.bond);
            self.connect(prev_atom, new_atom, bond)?;
        }
        self.current_atom = Some(new_atom);
        Ok(())
    }

    fn ring_bond(&mut self, number: u16, position: usize) -> Result<(), ParseError> {
        let current = self
            .current_atom
            .ok_or(ParseError::RingClosureNoCurrentAtom(number, position))?;
        let bond = self.pending.take().map(|p| p.bond);
        match self.ring_map.remove(&number) {
            Some(opening) => {
                if opening.atom == current {
                    return Err(ParseError::RingBondToSelf(number, position));
                }
                let bond = match (opening.bond, bond) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(ParseError::ConflictingRingBond(number, position))
                    }
                    (a, b) => a.or(b),
                };
                self.connect(opening.atom, current, bond)
            }
            None => {
                self.ring_map.insert(
                    number,
                    RingOpening {
                        atom: current,
                        bond,
                        position,
                    },
                );
                Ok(())
            }
        }
    }

    fn finish(mut self) -> Result<MoleculeGraph, ParseError> {
        if let Some(pending) = self.pending {
            return Err(ParseError::DanglingBond(pending.position));
        }
        if let Some((number, opening)) = self.ring_map.iter().next() {
            return Err(ParseError::UnclosedRing(*number, opening.position));
        }
        if !self.branch_stack.is_empty() {
            return Err(ParseError::UnclosedBranch(self.branch_stack.len()));
        }
        if self.graph.node_count() == 0 {
            return Err(ParseError::Empty);
        }
        // An unwritten bond joining two aromatic rings is a single bond.
        let rings = RingInfo::perceive(&self.graph);
        for edge in self.implicit_aromatic {
            if !rings.is_bond_in_ring(edge) {
                self.graph[edge] = Bond::Single;
            }
        }
        Ok(self.graph)
    }
}

fn bond_for_symbol(c: char) -> Option<Bond> {
    match c {
        '-' | '/' | '\\' => Some(Bond::Single),
        '=' => Some(Bond::Double),
        '#' => Some(Bond::Triple),
        '$' => Some(Bond::Quadruple),
        ':' => Some(Bond::Aromatic),
        _ => None,
    }
}

/// Organic-subset symbol starting at `i`, with its length in characters.
fn organic_atom(chars: &[char], i: usize) -> Option<(Atom, usize)> {
    let c = chars[i];
    let next = chars.get(i + 1).copied();
    let (element, aromatic, length) = match (c, next) {
        ('C', Some('l')) => (Element::Cl, false, 2),
        ('B', Some('r')) => (Element::Br, false, 2),
        ('B', _) => (Element::B, false, 1),
        ('C', _) => (Element::C, false, 1),
        ('N', _) => (Element::N, false, 1),
        ('O', _) => (Element::O, false, 1),
        ('P', _) => (Element::P, false, 1),
        ('S', _) => (Element::S, false, 1),
        ('F', _) => (Element::F, false, 1),
        ('I', _) => (Element::I, false, 1),
        ('b', _) => (Element::B, true, 1),
        ('c', _) => (Element::C, true, 1),
        ('n', _) => (Element::N, true, 1),
        ('o', _) => (Element::O, true, 1),
        ('p', _) => (Element::P, true, 1),
        ('s', _) => (Element::S, true, 1),
        _ => return None,
    };
    Some((Atom::organic(element, aromatic), length))
}

fn parse_smiles_helper(smiles: &str) -> Result<MoleculeGraph, ParseError> {
    let chars: Vec<char> = smiles.chars().collect();
    let mut builder = Builder::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                if builder.pending.is_some() {
                    return Err(ParseError::UnexpectedCharacter(c, i));
                }
                let atom = builder
                    .current_atom
                    .ok_or(ParseError::BranchNoCurrentAtom(i))?;
                builder.branch_stack.push(atom);
                i += 1;
            }
            ')' => {
                if let Some(pending) = builder.pending {
                    return Err(ParseError::DanglingBond(pending.position));
                }
                builder.current_atom =
                    Some(builder.branch_stack.pop().ok_or(ParseError::BranchEndNoStart(i))?);
                i += 1;
            }
            '-' | '=' | '#' | '$' | ':' | '/' | '\\' => {
                if builder.current_atom.is_none() {
                    return Err(ParseError::BondNoCurrentAtom(c, i));
                }
                if builder.pending.is_some() {
                    return Err(ParseError::UnexpectedCharacter(c, i));
                }
                builder.pending = bond_for_symbol(c).map(|bond| PendingBond { bond, position: i });
                i += 1;
            }
            '.' => {
                if let Some(pending) = builder.pending {
                    return Err(ParseError::DanglingBond(pending.position));
                }
                builder.current_atom = None;
                i += 1;
            }
            '%' => {
                let digits: String = chars.iter().skip(i + 1).take(2).collect();
                if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
                    return Err(ParseError::UnexpectedCharacter(c, i));
                }
                let number = digits
                    .parse::<u16>()
                    .map_err(|_| ParseError::UnexpectedCharacter(c, i))?;
                builder.ring_bond(number, i)?;
                i += 3;
            }
            '0'..='9' => {
                let number = c.to_digit(10).unwrap_or(0) as u16;
                builder.ring_bond(number, i)?;
                i += 1;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|offset| i + offset)
                    .ok_or(ParseError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let atom = bracket_to_atom(&content, i)?;
                builder.add_atom(atom)?;
                i = end + 1;
            }
            _ => match organic_atom(&chars, i) {
                Some((atom, length)) => {
                    builder.add_atom(atom)?;
                    i += length;
                }
                None if c.is_ascii_alphabetic() => {
                    return Err(ParseError::UnknownElement(c.to_string(), i));
                }
                None => return Err(ParseError::UnexpectedCharacter(c, i)),
            },
        }
    }

    let graph = builder.finish()?;
    debug!(
        "parsed {} into {} atoms and {} bonds",
        smiles,
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

fn bracket_to_atom(content: &str, position: usize) -> Result<Atom, ParseError> {
    let parsed = parse_bracket_atom(content).map_err(|reason| ParseError::MalformedBracket {
        content: content.to_string(),
        position,
        reason,
    })?;
    let element = if parsed.aromatic {
        Element::from_aromatic_symbol(parsed.symbol)
    } else {
        Element::from_symbol(parsed.symbol)
    }
    .ok_or_else(|| ParseError::UnknownElement(parsed.symbol.to_string(), position + 1))?;
    Ok(Atom::bracket(
        element,
        parsed.aromatic,
        parsed.isotope,
        parsed.hydrogens,
        parsed.charge,
    ))
}
