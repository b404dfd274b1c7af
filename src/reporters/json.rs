use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::AuditError;
use crate::types::AuditReport;

/// Outputs the report as JSON. Writes to a file if given, otherwise stdout.
pub fn report_json(report: &AuditReport, output_file: Option<&Path>) -> Result<(), AuditError> {
    match output_file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| AuditError::Report(format!("Failed to open {} for writing: {e}", path.display())))?;
            write_json(report, BufWriter::new(file))?;
            eprintln!("✓ JSON report written to {}", path.display());
        }
        None => write_json(report, BufWriter::new(std::io::stdout().lock()))?,
    }
    Ok(())
}

fn write_json<W: Write>(report: &AuditReport, mut writer: W) -> Result<(), AuditError> {
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(|e| AuditError::Report(format!("JSON serialization failed: {e}")))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
