//! Cumulative stats CSV output. Overwrite mode writes header + rows to a temp file and promotes
//! it; append mode adds rows to the existing file and writes a header only if the file is new.

use crate::util::{create_with_backoff, replace_file_atomic_backoff, tmp_path_for};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

fn write_rows<W: Write, T: Serialize>(out: W, columns: &[&str], rows: &[T], header: bool) -> Result<W> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    if header {
        w.write_record(columns)?;
    }
    for row in rows {
        w.serialize(row)?;
    }
    w.flush()?;
    w.into_inner().map_err(|e| anyhow::anyhow!("flush csv: {}", e.error()))
}

/// Write `rows` to `path` with the fixed `columns` header.
/// `append_only == false`: replace the file. `true`: append rows, no header unless the file
/// is missing or empty. Returns rows written.
pub fn write_stats<T: Serialize>(
    rows: &[T],
    columns: &[&str],
    path: &Path,
    append_only: bool,
    write_buf: usize,
) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }

    if append_only {
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open for append {}", path.display()))?;
        let mut out = write_rows(BufWriter::with_capacity(write_buf, f), columns, rows, is_new)?;
        out.flush()?;
        tracing::info!(
            "Appended {} rows to {}{}",
            rows.len(),
            path.display(),
            if is_new { " (new file, header written)" } else { "" }
        );
    } else {
        let tmp = tmp_path_for(path);
        let f = create_with_backoff(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut out = write_rows(BufWriter::with_capacity(write_buf, f), columns, rows, true)?;
        out.flush()?;
        drop(out);
        replace_file_atomic_backoff(&tmp, path)?;
        tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    }
    Ok(rows.len() as u64)
}
