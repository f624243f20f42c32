// TSV ingress/egress — the file boundary of a run.
//
// Input is a tab-separated file with a header row; the toxic texts sit in
// a named column (the shared-task dataset calls it "tat_toxic"). Output
// carries the original and rewritten text side by side, one row per
// input, in input order.

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};

/// Column the toxic input texts are read from unless overridden.
pub const DEFAULT_TOXIC_COLUMN: &str = "tat_toxic";
/// Column the rewritten texts are written to.
pub const DETOX_COLUMN: &str = "tat_detox1";

/// Read one named column out of a TSV file, in row order.
pub fn read_column(path: &Path, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .clone();

    let Some(column_idx) = headers.iter().position(|h| h == column) else {
        bail!(
            "Column '{}' not found in {}. Available columns: {}",
            column,
            path.display(),
            headers.iter().collect::<Vec<_>>().join(", ")
        );
    };

    let mut texts = Vec::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("Failed to read a row of {}", path.display()))?;
        let field = record.get(column_idx).unwrap_or_default();
        texts.push(field.to_string());
    }
    Ok(texts)
}

/// Write the result file: ID, original toxic text, rewritten text.
pub fn write_results(
    path: &Path,
    toxic_column: &str,
    inputs: &[String],
    results: &[String],
) -> Result<()> {
    ensure!(
        inputs.len() == results.len(),
        "Got {} inputs but {} results",
        inputs.len(),
        results.len()
    );

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer
        .write_record(["ID", toxic_column, DETOX_COLUMN])
        .context("Failed to write header row")?;
    for (idx, (input, result)) in inputs.iter().zip(results).enumerate() {
        writer
            .write_record([&idx.to_string(), input, result])
            .with_context(|| format!("Failed to write row {idx}"))?;
    }
    writer.flush().context("Failed to flush output file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mollify-tsv-{name}"))
    }

    #[test]
    fn read_column_extracts_named_column_in_order() {
        let path = temp_path("read.tsv");
        std::fs::write(&path, "ID\ttat_toxic\n0\tfirst text\n1\tsecond text\n").unwrap();

        let texts = read_column(&path, DEFAULT_TOXIC_COLUMN).unwrap();
        assert_eq!(texts, vec!["first text", "second text"]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_column_error_lists_available_columns() {
        let path = temp_path("missing.tsv");
        std::fs::write(&path, "ID\tcomment\n0\thello\n").unwrap();

        let err = read_column(&path, DEFAULT_TOXIC_COLUMN)
            .unwrap_err()
            .to_string();
        assert!(err.contains("'tat_toxic'"), "error should name the column: {err}");
        assert!(err.contains("comment"), "error should list alternatives: {err}");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_then_read_round_trips_cyrillic() {
        let path = temp_path("roundtrip.tsv");
        let inputs = vec!["Ты дурак!".to_string(), "plain".to_string()];
        let results = vec!["Ты неправ!".to_string(), "plain".to_string()];

        write_results(&path, DEFAULT_TOXIC_COLUMN, &inputs, &results).unwrap();

        assert_eq!(read_column(&path, DEFAULT_TOXIC_COLUMN).unwrap(), inputs);
        assert_eq!(read_column(&path, DETOX_COLUMN).unwrap(), results);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn write_rejects_length_mismatch() {
        let path = temp_path("mismatch.tsv");
        let err = write_results(
            &path,
            DEFAULT_TOXIC_COLUMN,
            &["a".to_string()],
            &[],
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 inputs but 0 results"));
    }
}
