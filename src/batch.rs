use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    compute_descriptors, compute_qed_with, depiction_stem, evaluate_lipinski_with, render_depiction,
    AdmetLabelSet, Depiction, DescriptorError, DescriptorSet, LipinskiVerdict, MolecularGraph,
    ParseError, QedScore, RenderError, ScreeningConfig, StructureNotation,
};

/// Why one structure could not be evaluated. Stays local to its entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScreeningError {
    #[error("invalid structure: {0}")]
    Parse(#[from] ParseError),
    #[error("descriptor calculation failed: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// Failures that stop a whole batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot create image directory {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("image directory {path} is not writable")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything computed for one structure.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub notation: StructureNotation,
    pub canonical: StructureNotation,
    pub descriptors: DescriptorSet,
    pub lipinski: LipinskiVerdict,
    pub qed: QedScore,
    /// Threshold heuristics, not predictions.
    pub admet: AdmetLabelSet,
    /// `None` when depiction is off. `Err` only when no DOT file was written.
    pub depiction: Option<Result<Depiction, RenderError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Position in the input.
    pub index: usize,
    pub notation: StructureNotation,
    pub outcome: Result<AnalysisResult, ScreeningError>,
}

impl BatchEntry {
    pub fn result(&self) -> Option<&AnalysisResult> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ScreeningError> {
        self.outcome.as_ref().err()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub lipinski_passing: usize,
    pub depiction_failures: usize,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };
        for result in entries.iter().filter_map(BatchEntry::result) {
            summary.evaluated += 1;
            if result.lipinski.passes {
                summary.lipinski_passing += 1;
            }
            let failed = match &result.depiction {
                Some(Ok(depiction)) => depiction.png_error().is_some(),
                Some(Err(_)) => true,
                None => false,
            };
            if failed {
                summary.depiction_failures += 1;
            }
        }
        summary.failed = summary.total - summary.evaluated;
        summary
    }
}

impl Display for BatchSummary {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{} structures: {} evaluated, {} failed, {} pass Lipinski, {} depiction failures",
            self.total, self.evaluated, self.failed, self.lipinski_passing, self.depiction_failures
        )
    }
}

/// Evaluate one structure. With depiction configured, the picture is written
/// as entry 0 into an existing directory; a missing directory shows up as a
/// render error on the result.
pub fn analyse_smiles(
    notation: &StructureNotation,
    config: &ScreeningConfig,
) -> Result<AnalysisResult, ScreeningError> {
    analyse_at(0, notation, config)
}

fn analyse_at(
    index: usize,
    notation: &StructureNotation,
    config: &ScreeningConfig,
) -> Result<AnalysisResult, ScreeningError> {
    let mol = MolecularGraph::parse(notation)?;
    let descriptors = compute_descriptors(&mol).map_err(|e| {
        error!("descriptors failed for parsed structure {}: {}", notation, e);
        e
    })?;

    let lipinski = evaluate_lipinski_with(&descriptors, &config.lipinski);
    let qed = compute_qed_with(&descriptors, &config.qed);
    let admet = config.admet.label(&descriptors);

    let depiction = config.depiction.as_ref().map(|options| {
        let stem = depiction_stem(index, notation.as_str());
        render_depiction(&mol, &stem, options).map_err(|e| {
            warn!("depiction of entry {} failed: {}", index, e);
            e
        })
    });

    debug!("entry {}: {} qed {:.3}", index, notation, qed.value());
    Ok(AnalysisResult {
        notation: notation.clone(),
        canonical: mol.to_smiles(),
        descriptors,
        lipinski,
        qed,
        admet,
        depiction,
    })
}

/// Evaluate every structure in parallel. Entries come back in input order,
/// one per input, with per-item failures recorded in place.
pub fn analyse_many(
    notations: &[StructureNotation],
    config: &ScreeningConfig,
) -> Result<Vec<BatchEntry>, BatchError> {
    if let Some(options) = &config.depiction {
        prepare_directory(&options.directory)?;
    }
    info!("screening {} structures", notations.len());

    let entries: Vec<BatchEntry> = notations
        .par_iter()
        .enumerate()
        .map(|(index, notation)| {
            let outcome = analyse_at(index, notation, config);
            if let Err(e) = &outcome {
                warn!("entry {} ({}) skipped: {}", index, notation, e);
            }
            BatchEntry {
                index,
                notation: notation.clone(),
                outcome,
            }
        })
        .collect();

    info!("{}", BatchSummary::from_entries(&entries));
    Ok(entries)
}

fn prepare_directory(path: &Path) -> Result<(), BatchError> {
    fs::create_dir_all(path).map_err(|source| BatchError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    let probe = path.join(".screen-write-check");
    fs::write(&probe, b"").map_err(|source| BatchError::NotWritable {
        path: path.to_path_buf(),
        source,
    })?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdmetLabel, DepictionOptions, Descriptor, LipinskiRules};

    const THCO: &str = "CCCCCC1=CC(=C2[C@@H]3CC(=CC[C@H]3C(OC2=C1)(C)C)C)OC(C)=O";

    fn notations(list: &[&str]) -> Vec<StructureNotation> {
        list.iter().map(|s| StructureNotation::from(*s)).collect()
    }

    #[test]
    fn test_analyse_thco() {
        let result = analyse_smiles(&THCO.into(), &ScreeningConfig::default()).unwrap();
        assert!(result.lipinski.passes);
        assert_eq!(result.lipinski.violation_count(), 1);
        assert!(result.lipinski.violates(Descriptor::LogP));
        assert!((0.0..=1.0).contains(&result.qed.value()));
        assert_eq!(result.admet.get("toxicity_risk"), Some(AdmetLabel::High));
        assert_eq!(result.descriptors.formula, "C23H32O3");
        assert!(result.depiction.is_none());
    }

    #[test]
    fn test_partial_failure() {
        let config = ScreeningConfig::default();
        let input = notations(&["CCO", "C1CC", "c1ccccc1", "CC(=O)Oc1ccccc1C(=O)O"]);
        let entries = analyse_many(&input, &config).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(matches!(entries[1].error(), Some(ScreeningError::Parse(_))));
        for (k, entry) in entries.iter().enumerate() {
            assert_eq!(entry.index, k);
            assert_eq!(entry.notation, input[k]);
            if k != 1 {
                assert_eq!(entry.outcome, analyse_smiles(&input[k], &config));
            }
        }

        let summary = BatchSummary::from_entries(&entries);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.evaluated, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.lipinski_passing, 3);
        assert_eq!(summary.depiction_failures, 0);
    }

    #[test]
    fn test_config_thresholds_apply() {
        let strict = ScreeningConfig::default()
            .with_lipinski(
                LipinskiRules::default()
                    .with_threshold(Descriptor::MolecularWeight, 100.0)
                    .with_max_violations(0),
            );
        let result = analyse_smiles(&"CC(=O)Oc1ccccc1C(=O)O".into(), &strict).unwrap();
        assert!(!result.lipinski.passes);
    }

    #[test]
    fn test_empty_batch() {
        assert!(analyse_many(&[], &ScreeningConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_batch_depictions() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("nested").join("images");
        let config = ScreeningConfig::default().with_depiction(DepictionOptions::new(&images));
        let entries = analyse_many(&notations(&["CCO", "bad(", "CC#N"]), &config).unwrap();

        let first = entries[0].result().unwrap();
        let depiction = first.depiction.clone().unwrap().unwrap();
        assert_eq!(depiction.dot_path, images.join("0000_CCO.dot"));
        assert!(depiction.dot_path.exists());
        assert!(entries[1].result().is_none());
        assert!(images.join("0002_CChashN.dot").exists());
        assert!(!images.join(".screen-write-check").exists());
    }

    #[test]
    fn test_depiction_failure_keeps_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScreeningConfig::default().with_depiction(
            DepictionOptions::new(dir.path())
                .with_png(true)
                .with_renderer("no-such-graphviz-binary"),
        );
        let entries = analyse_many(&notations(&["CCO"]), &config).unwrap();
        let result = entries[0].result().unwrap();
        let depiction = result.depiction.clone().unwrap().unwrap();
        assert!(matches!(depiction.png_error(), Some(RenderError::Spawn { .. })));
        assert_eq!(depiction.dot_path, dir.path().join("0000_CCO.dot"));
        assert!(depiction.dot_path.exists());
        let plain = analyse_smiles(&"CCO".into(), &ScreeningConfig::default()).unwrap();
        assert_eq!(result.descriptors, plain.descriptors);
        assert_eq!(BatchSummary::from_entries(&entries).depiction_failures, 1);
    }

    #[test]
    fn test_unusable_image_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, "not a directory").unwrap();
        let config = ScreeningConfig::default().with_depiction(DepictionOptions::new(&file));
        assert!(matches!(
            analyse_many(&notations(&["CCO"]), &config),
            Err(BatchError::CreateDirectory { .. })
        ));
    }
}
