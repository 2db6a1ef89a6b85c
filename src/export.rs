//! CSV input and output for screening runs.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::{info, warn};

use crate::{BatchEntry, Descriptor, ScreeningConfig, StructureNotation};

/// Read SMILES from the `smiles` column (any case), or from the first column
/// when there is none. Blank values are skipped.
pub fn read_notations_csv(path: impl AsRef<Path>) -> Result<Vec<StructureNotation>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let notations = read_notations(file).with_context(|| format!("cannot read {}", path.display()))?;
    info!("read {} structures from {}", notations.len(), path.display());
    Ok(notations)
}

pub fn read_notations<R: Read>(reader: R) -> Result<Vec<StructureNotation>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let column = rdr
        .headers()
        .context("missing header row")?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("smiles"))
        .unwrap_or(0);

    let mut notations = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record: StringRecord = result.with_context(|| format!("malformed row {}", row + 1))?;
        match record.get(column).map(str::trim) {
            Some(smiles) if !smiles.is_empty() => notations.push(StructureNotation::from(smiles)),
            _ => warn!("skipping row {} with no SMILES: {:?}", row + 1, record),
        }
    }
    Ok(notations)
}

/// Column names in output order. Lipinski and ADMET columns follow the
/// configured rules and categories.
pub fn result_headers(config: &ScreeningConfig) -> Vec<String> {
    let mut headers: Vec<String> = ["index", "smiles", "canonical_smiles", "status", "formula"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    headers.extend(Descriptor::ALL.iter().map(|d| d.name().to_string()));
    headers.extend(
        config
            .lipinski
            .rules
            .iter()
            .map(|r| format!("lipinski_{}_violated", r.descriptor.name())),
    );
    headers.push("lipinski_pass".to_string());
    headers.push("lipinski_violations".to_string());
    headers.push("qed".to_string());
    headers.extend(config.admet.category_names().map(|c| format!("admet_{}", c)));
    headers.push("depiction".to_string());
    headers
}

fn format_value(descriptor: Descriptor, value: f64) -> String {
    use Descriptor::*;
    match descriptor {
        MolecularWeight | LogP | Tpsa | MolarRefractivity | FractionCsp3 => format!("{:.4}", value),
        _ => format!("{}", value.round() as i64),
    }
}

fn entry_record(entry: &BatchEntry, config: &ScreeningConfig, width: usize) -> Vec<String> {
    let mut record = vec![entry.index.to_string(), entry.notation.to_string()];
    let result = match &entry.outcome {
        Ok(result) => result,
        Err(e) => {
            record.push(String::new());
            record.push(format!("error: {}", e));
            record.resize(width, String::new());
            return record;
        }
    };

    record.push(result.canonical.to_string());
    record.push("ok".to_string());
    record.push(result.descriptors.formula.clone());
    record.extend(result.descriptors.iter().map(|(d, v)| format_value(d, v)));
    record.extend(
        config
            .lipinski
            .rules
            .iter()
            .map(|r| result.lipinski.violates(r.descriptor).to_string()),
    );
    record.push(result.lipinski.passes.to_string());
    record.push(result.lipinski.violation_count().to_string());
    record.push(format!("{:.4}", result.qed.value()));
    record.extend(
        config
            .admet
            .category_names()
            .map(|c| result.admet.get(c).map(|l| l.to_string()).unwrap_or_default()),
    );
    record.push(match &result.depiction {
        None => String::new(),
        Some(Ok(d)) => match d.png_error() {
            Some(e) => format!("{} (png error: {})", d.dot_path.display(), e),
            None => d.best_path().display().to_string(),
        },
        Some(Err(e)) => format!("error: {}", e),
    });
    record
}

pub fn write_results<W: Write>(writer: W, entries: &[BatchEntry], config: &ScreeningConfig) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    let headers = result_headers(config);
    wtr.write_record(&headers)?;
    for entry in entries {
        wtr.write_record(entry_record(entry, config, headers.len()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per entry, failures included.
pub fn write_results_csv(
    path: impl AsRef<Path>,
    entries: &[BatchEntry],
    config: &ScreeningConfig,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    write_results(file, entries, config).with_context(|| format!("cannot write {}", path.display()))?;
    info!("results written to {}", path.display());
    Ok(())
}

/// `parent,derivative` pairs.
pub fn write_derivatives_csv(
    path: impl AsRef<Path>,
    derivatives: &[(StructureNotation, Vec<StructureNotation>)],
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut wtr = Writer::from_writer(file);
    wtr.write_record(["parent", "derivative"])?;
    for (parent, children) in derivatives {
        for child in children {
            wtr.write_record([parent.as_str(), child.as_str()])?;
        }
    }
    wtr.flush()?;
    info!("derivatives written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyse_many;
    use std::fs;

    #[test]
    fn test_read_smiles_column() {
        let data = "name,SMILES\nethanol,CCO\nblank,  \nbenzene, c1ccccc1 \n";
        let notations = read_notations(data.as_bytes()).unwrap();
        assert_eq!(notations, vec![StructureNotation::from("CCO"), StructureNotation::from("c1ccccc1")]);
    }

    #[test]
    fn test_read_first_column_fallback() {
        let data = "structure,note\nCCO,a\nCC#N\n";
        let notations = read_notations(data.as_bytes()).unwrap();
        assert_eq!(notations, vec![StructureNotation::from("CCO"), StructureNotation::from("CC#N")]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_notations_csv(dir.path().join("absent.csv")).unwrap_err();
        assert!(err.to_string().contains("cannot open"));
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let config = ScreeningConfig::default();
        let input: Vec<StructureNotation> = ["CCO", "C1CC"].iter().map(|s| (*s).into()).collect();
        let entries = analyse_many(&input, &config).unwrap();
        write_results_csv(&path, &entries, &config).unwrap();

        let mut rdr = ReaderBuilder::new().from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), result_headers(&config).len());
        assert_eq!(&headers[1], "smiles");
        assert!(headers.iter().any(|h| h == "admet_cns_penetration"));
        assert!(headers.iter().any(|h| h == "lipinski_logp_violated"));

        let rows: Vec<StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][column("status")], "ok");
        assert_eq!(&rows[0][column("formula")], "C2H6O");
        assert_eq!(&rows[0][column("h_bond_donors")], "1");
        assert_eq!(&rows[0][column("molecular_weight")], "46.0690");
        assert_eq!(&rows[0][column("lipinski_pass")], "true");
        assert!(rows[1][column("status")].starts_with("error:"));
        assert_eq!(&rows[1][column("qed")], "");
    }

    #[test]
    fn test_write_derivatives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derivatives.csv");
        let rows = vec![(
            StructureNotation::from("CCCCCc1ccccc1"),
            vec![StructureNotation::from("CCCCCCc1ccccc1"), StructureNotation::from("CCCCc1ccccc1")],
        )];
        write_derivatives_csv(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "parent,derivative\nCCCCCc1ccccc1,CCCCCCc1ccccc1\nCCCCCc1ccccc1,CCCCc1ccccc1\n"
        );
    }
}
