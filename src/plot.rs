//! Optional plotting step run after the fragment table is written.

use std::path::Path;
use std::process::Command;

const RSCRIPT: &str = "Rscript";

/// Run `Rscript <script> <table> <base_name>`.
///
/// Any failure is logged and swallowed; the table on disk is already
/// complete at this point.
pub fn render(script: &Path, table: &Path, base_name: &str) {
    let status = Command::new(RSCRIPT)
        .arg(script)
        .arg(table)
        .arg(base_name)
        .status();
    match status {
        Ok(status) if status.success() => {
            tracing::info!(script = %script.display(), "plot rendered");
        }
        Ok(status) => {
            tracing::warn!(script = %script.display(), %status, "plot script failed");
        }
        Err(e) => {
            tracing::warn!(script = %script.display(), error = %e, "could not run {RSCRIPT}");
        }
    }
}
