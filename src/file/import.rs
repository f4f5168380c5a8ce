use serde_yaml::Mapping;
use std::path::Path;

use super::{FileError, Value};

const RXNORM_SYSTEM: &str = "http://www.nlm.nih.gov/research/umls/rxnorm";

/// Read a code table with `Code` and `Vocab` columns into a mapping entry:
/// every RxNorm row becomes a `MedicationRequest` coding.
pub fn read_codes(path: &Path) -> Result<Value, FileError> {
    let csv_err = |source: csv::Error| FileError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let column = |column: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| FileError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
    };
    let code_idx = column("Code")?;
    let vocab_idx = column("Vocab")?;

    let mut codings = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.get(vocab_idx) != Some("RxNorm") {
            continue;
        }
        let mut coding = Mapping::new();
        coding.insert("system".into(), RXNORM_SYSTEM.into());
        coding.insert("code".into(), record.get(code_idx).unwrap_or_default().into());
        codings.push(Value::Mapping(coding));
    }
    tracing::info!(path = %path.display(), codes = codings.len(), "imported codes");

    let mut entry = Mapping::new();
    if !codings.is_empty() {
        entry.insert("MedicationRequest".into(), Value::Sequence(codings));
    }
    Ok(Value::Mapping(entry))
}
