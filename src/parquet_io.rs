//! Parquet reading with column projection, and a reduced-output writer that writes to a temp
//! file and atomically promotes it on finish.

use crate::error::ReduceError;
use crate::util::{create_with_backoff, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff, tmp_path_for};
use anyhow::{Context, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Open `path` reading only `columns` in batches of `batch_size` rows.
/// Every requested column must exist; a missing one is a malformed partition.
pub fn open_projected(path: &Path, columns: &[&str], batch_size: usize) -> Result<ParquetRecordBatchReader> {
    let f = open_with_backoff(path).with_context(|| format!("open {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(f)
        .with_context(|| format!("read parquet metadata {}", path.display()))?;

    let schema = builder.schema().clone();
    let mut indices = Vec::with_capacity(columns.len());
    for name in columns {
        let idx = schema.index_of(name).map_err(|_| ReduceError::MissingColumn {
            column: name.to_string(),
            path: path.to_path_buf(),
        })?;
        indices.push(idx);
    }
    let mask = ProjectionMask::roots(builder.parquet_schema(), indices);

    builder
        .with_projection(mask)
        .with_batch_size(batch_size)
        .build()
        .with_context(|| format!("build reader {}", path.display()))
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build()
}

/// Streaming parquet writer over a temp sibling of the final path.
pub struct ReducedWriter {
    tmp: PathBuf,
    dest: PathBuf,
    w: ArrowWriter<File>,
    rows: u64,
}

impl ReducedWriter {
    pub fn create(dest: &Path, schema: SchemaRef) -> Result<Self> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path_for(dest);
        let f = create_with_backoff(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let w = ArrowWriter::try_new(f, schema, Some(writer_properties()))
            .with_context(|| format!("open parquet writer {}", tmp.display()))?;
        Ok(Self { tmp, dest: dest.to_path_buf(), w, rows: 0 })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.w.write(batch).with_context(|| format!("write {}", self.tmp.display()))?;
        self.rows += batch.num_rows() as u64;
        Ok(())
    }

    /// Drop the partial output without touching the destination.
    pub fn abort(self) -> Result<()> {
        let Self { tmp, w, .. } = self;
        drop(w);
        remove_with_backoff(&tmp)
    }

    /// Close the file and promote it over the destination. Returns rows written.
    pub fn finish(self) -> Result<u64> {
        let Self { tmp, dest, w, rows } = self;
        if let Err(e) = w.close() {
            remove_with_backoff(&tmp)?;
            return Err(e).with_context(|| format!("close {}", tmp.display()));
        }
        replace_file_atomic_backoff(&tmp, &dest)?;
        Ok(rows)
    }
}
