use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use petgraph::visit::EdgeRef;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{Atom, Bond, Element, MolecularGraph};

/// Where and how structure depictions are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepictionOptions {
    pub directory: PathBuf,
    /// Also render each DOT file to PNG with Graphviz.
    pub png: bool,
    /// Deadline for one PNG render.
    pub timeout: Duration,
    /// The Graphviz layout program to run.
    pub renderer: String,
}

impl DepictionOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            png: false,
            timeout: Duration::from_secs(10),
            renderer: "dot".to_string(),
        }
    }

    pub fn with_png(mut self, png: bool) -> Self {
        self.png = png;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_renderer(mut self, renderer: impl Into<String>) -> Self {
        self.renderer = renderer.into();
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("could not write {path}: {reason}")]
    Write { path: PathBuf, reason: String },
    #[error("could not run {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Files written for one structure. The DOT file always exists; a failed PNG
/// render is reported next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Depiction {
    pub dot_path: PathBuf,
    /// `None` when PNG output is off.
    pub png: Option<Result<PathBuf, RenderError>>,
}

impl Depiction {
    pub fn png_path(&self) -> Option<&Path> {
        match &self.png {
            Some(Ok(path)) => Some(path),
            _ => None,
        }
    }

    pub fn png_error(&self) -> Option<&RenderError> {
        match &self.png {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// The PNG when there is one, otherwise the DOT file.
    pub fn best_path(&self) -> &Path {
        self.png_path().unwrap_or(self.dot_path.as_path())
    }
}

/// A filesystem-safe stem for a SMILES string. Path separators and shell
/// metacharacters are replaced and the result is kept short.
pub fn safe_file_stem(smiles: &str) -> String {
    let mut stem = String::with_capacity(smiles.len());
    for c in smiles.chars() {
        match c {
            '/' | '\\' | ':' | '<' | '>' | '|' | '"' => stem.push('-'),
            '#' => stem.push_str("hash"),
            '*' => stem.push_str("star"),
            '?' => stem.push_str("question"),
            c if c.is_whitespace() || c.is_control() => stem.push('_'),
            c => stem.push(c),
        }
    }
    if stem.is_empty() {
        stem.push_str("structure");
    }
    stem.chars().take(100).collect()
}

/// `{index:04}_{safe-name}`, unique per batch position.
pub fn depiction_stem(index: usize, smiles: &str) -> String {
    format!("{:04}_{}", index, safe_file_stem(smiles))
}

/// Write `{stem}.dot` into the configured directory and, when PNG output is
/// on, render `{stem}.png` from it. Only a failed DOT write is an error.
pub fn render_depiction(
    mol: &MolecularGraph,
    stem: &str,
    options: &DepictionOptions,
) -> Result<Depiction, RenderError> {
    let dot_path = options.directory.join(format!("{}.dot", stem));
    fs::write(&dot_path, generate_dot(mol)).map_err(|e| RenderError::Write {
        path: dot_path.clone(),
        reason: e.to_string(),
    })?;
    debug!("wrote {}", dot_path.display());

    let png = options.png.then(|| {
        let png_path = options.directory.join(format!("{}.png", stem));
        match render_png(&dot_path, &png_path, options) {
            Ok(()) => {
                debug!("rendered {}", png_path.display());
                Ok(png_path)
            }
            Err(e) => {
                warn!("{} kept without PNG: {}", dot_path.display(), e);
                Err(e)
            }
        }
    });

    Ok(Depiction { dot_path, png })
}

/// Run the renderer as a child process, killing it if it outlives the
/// deadline.
fn render_png(dot_path: &Path, png_path: &Path, options: &DepictionOptions) -> Result<(), RenderError> {
    let program = options.renderer.clone();
    let mut child = Command::new(&program)
        .arg("-Tpng")
        .arg(dot_path)
        .arg("-o")
        .arg(png_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| RenderError::Spawn {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    let deadline = Instant::now() + options.timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                return Err(RenderError::Failed {
                    program,
                    status: status.to_string(),
                })
            }
            Ok(None) if Instant::now() >= deadline => {
                warn!("{} timed out on {}", program, dot_path.display());
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::Timeout {
                    program,
                    timeout: options.timeout,
                });
            }
            Ok(None) => thread::sleep(Duration::from_millis(20)),
            Err(e) => {
                let _ = child.kill();
                return Err(RenderError::Spawn {
                    program,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Graphviz description of the molecule: one filled circle per atom and one
/// edge per bond order, aromatic bonds dashed.
pub fn generate_dot(mol: &MolecularGraph) -> String {
    let mut dot = String::new();
    // Writing into a String cannot fail.
    let _ = write_dot(mol, &mut dot);
    dot
}

fn write_dot(mol: &MolecularGraph, out: &mut String) -> std::fmt::Result {
    writeln!(out, "graph Molecule {{")?;
    writeln!(out, "    layout=neato;")?;
    writeln!(out, "    multiedge=true;")?;

    for (node, atom) in mol.atoms() {
        writeln!(
            out,
            "    {} [label=\"{}\", fontcolor={}, shape=circle, style=filled, fillcolor={}];",
            node.index(),
            atom_label(atom),
            font_color(atom.element),
            element_color(atom.element),
        )?;
    }

    for edge in mol.graph().edge_references() {
        let (style, extra) = bond_style(*edge.weight());
        let count = match edge.weight() {
            Bond::Double => 2,
            Bond::Triple => 3,
            Bond::Quadruple => 4,
            _ => 1,
        };
        for _ in 0..count {
            writeln!(
                out,
                "    {} -- {} [style={}, penwidth=2{}];",
                edge.source().index(),
                edge.target().index(),
                style,
                extra
            )?;
        }
    }

    writeln!(out, "}}")
}

fn atom_label(atom: &Atom) -> String {
    let mut label = String::new();
    if let Some(isotope) = atom.isotope {
        label.push_str(&isotope.to_string());
    }
    label.push_str(atom.element.symbol());
    match atom.charge {
        0 => {}
        1 => label.push('+'),
        -1 => label.push('-'),
        q if q > 0 => label.push_str(&format!("{}+", q)),
        q => label.push_str(&format!("{}-", -(q as i16))),
    }
    label
}

fn element_color(element: Element) -> &'static str {
    use Element::*;
    match element {
        C => "black",
        H => "gray",
        O => "red",
        N => "blue",
        S => "yellow",
        P => "orange",
        F => "pink",
        Cl => "darkgreen",
        Br => "brown",
        I => "purple",
        _ => "teal",
    }
}

fn font_color(element: Element) -> &'static str {
    match element {
        Element::S | Element::H | Element::F => "black",
        _ => "white",
    }
}

fn bond_style(bond: Bond) -> (&'static str, &'static str) {
    match bond {
        Bond::Aromatic => ("dashed", ", color=purple"),
        _ => ("solid", ""),
    }
}
