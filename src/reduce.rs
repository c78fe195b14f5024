//! Record reduction: per-stream projections that turn raw events into privacy-reduced public
//! records. Each reducer works on one record batch at a time; `reduce_partition` streams a
//! whole partition file through it without holding more than one batch in memory.

use crate::anonymize::Anonymizer;
use crate::columns::{
    char_lengths, string_column, AMOUNT, AUTHOR_CHANNEL_ID, BODY, BODY_LENGTH, CHANNEL_ID, CURRENCY, ID,
    IS_MEMBER, MEMBERSHIP, RETRACTED, SIGNIFICANCE, TIMESTAMP, VIDEO_ID,
};
use crate::error::ReduceError;
use crate::membership::classify_status;
use crate::parquet_io::{open_projected, ReducedWriter};
use crate::partitions::{Partition, StreamKind};
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use std::path::Path;
use std::sync::Arc;

/// Input columns per stream, in output order before derived columns are appended.
pub fn input_columns(kind: StreamKind) -> &'static [&'static str] {
    match kind {
        StreamKind::Chat => &[TIMESTAMP, BODY, MEMBERSHIP, AUTHOR_CHANNEL_ID, VIDEO_ID, CHANNEL_ID],
        StreamKind::Superchat => {
            &[TIMESTAMP, AMOUNT, CURRENCY, SIGNIFICANCE, BODY, AUTHOR_CHANNEL_ID, VIDEO_ID, CHANNEL_ID]
        }
        StreamKind::Ban => &[TIMESTAMP, AUTHOR_CHANNEL_ID, VIDEO_ID, CHANNEL_ID],
        StreamKind::Deletion => &[TIMESTAMP, ID, RETRACTED, VIDEO_ID, CHANNEL_ID],
    }
}

/// Output under construction: columns in order, plus their fields.
struct Projection {
    fields: Vec<FieldRef>,
    columns: Vec<ArrayRef>,
}

impl Projection {
    fn new() -> Self {
        Self { fields: Vec::new(), columns: Vec::new() }
    }

    fn push(&mut self, field: FieldRef, col: ArrayRef) {
        self.fields.push(field);
        self.columns.push(col);
    }

    fn passthrough(&mut self, batch: &RecordBatch, name: &str) -> Result<(), ReduceError> {
        let idx = batch.schema().index_of(name).map_err(|_| ReduceError::MissingColumn {
            column: name.to_string(),
            path: Default::default(),
        })?;
        self.push(batch.schema().fields()[idx].clone(), batch.column(idx).clone());
        Ok(())
    }

    fn finish(self) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(self.fields));
        Ok(RecordBatch::try_new(schema, self.columns)?)
    }
}

fn anonymized_authors(batch: &RecordBatch, anon: &Anonymizer) -> Result<ArrayRef, ReduceError> {
    let authors = string_column(batch, AUTHOR_CHANNEL_ID)?;
    let hashed: StringArray = authors.iter().map(|a| a.map(|a| anon.anonymize(a))).collect();
    Ok(Arc::new(hashed))
}

fn author_field() -> FieldRef {
    Arc::new(Field::new(AUTHOR_CHANNEL_ID, DataType::Utf8, true))
}

/// Raw columns in `kind`'s input order, replacing `authorChannelId` by its hash
/// and skipping the free-text/raw columns the caller derives from.
fn project_common(
    batch: &RecordBatch,
    kind: StreamKind,
    anon: &Anonymizer,
    skip: &[&str],
) -> Result<Projection, ReduceError> {
    let mut out = Projection::new();
    for &name in input_columns(kind) {
        if skip.contains(&name) {
            continue;
        }
        if name == AUTHOR_CHANNEL_ID {
            out.push(author_field(), anonymized_authors(batch, anon)?);
        } else {
            out.passthrough(batch, name)?;
        }
    }
    Ok(out)
}

/// `body` → `bodyLength` (chars; a missing body counts as 0), `membership` → `isMember`.
pub fn reduce_chat_batch(batch: &RecordBatch, anon: &Anonymizer) -> Result<RecordBatch> {
    let mut out = project_common(batch, StreamKind::Chat, anon, &[BODY, MEMBERSHIP])?;

    let membership = string_column(batch, MEMBERSHIP)?;
    let is_member: BooleanArray = membership.iter().map(classify_status).collect();
    out.push(Arc::new(Field::new(IS_MEMBER, DataType::Boolean, true)), Arc::new(is_member));

    let body = string_column(batch, BODY)?;
    let lengths: Int32Array =
        char_lengths(&body).into_iter().map(|l| Some(l.unwrap_or(0) as i32)).collect();
    out.push(Arc::new(Field::new(BODY_LENGTH, DataType::Int32, false)), Arc::new(lengths));

    out.finish()
}

/// `body` → `bodyLength`; amount, currency and significance pass through untouched.
pub fn reduce_superchat_batch(batch: &RecordBatch, anon: &Anonymizer) -> Result<RecordBatch> {
    let mut out = project_common(batch, StreamKind::Superchat, anon, &[BODY])?;

    let body = string_column(batch, BODY)?;
    let lengths: Int64Array =
        char_lengths(&body).into_iter().map(|l| Some(l.unwrap_or(0) as i64)).collect();
    out.push(Arc::new(Field::new(BODY_LENGTH, DataType::Int64, false)), Arc::new(lengths));

    out.finish()
}

pub fn reduce_ban_batch(batch: &RecordBatch, anon: &Anonymizer) -> Result<RecordBatch> {
    project_common(batch, StreamKind::Ban, anon, &[])?.finish()
}

/// Deletions are not author-attributed: the projection is the whole reduction.
pub fn reduce_deletion_batch(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut out = Projection::new();
    for &name in input_columns(StreamKind::Deletion) {
        out.passthrough(batch, name)?;
    }
    out.finish()
}

pub fn reduce_batch(kind: StreamKind, batch: &RecordBatch, anon: &Anonymizer) -> Result<RecordBatch> {
    match kind {
        StreamKind::Chat => reduce_chat_batch(batch, anon),
        StreamKind::Superchat => reduce_superchat_batch(batch, anon),
        StreamKind::Ban => reduce_ban_batch(batch, anon),
        StreamKind::Deletion => reduce_deletion_batch(batch),
    }
}

/// Stream one partition through its reducer into `out_dir/<same file name>`.
/// Overwrites any previous output, so reruns are idempotent. Returns rows written.
pub fn reduce_partition(part: &Partition, out_dir: &Path, anon: &Anonymizer, batch_size: usize) -> Result<u64> {
    let reader = open_projected(&part.path, input_columns(part.kind), batch_size)?;

    // Derive the output schema from an empty batch so that empty partitions still
    // produce a well-formed file.
    let empty = RecordBatch::new_empty(reader.schema());
    let schema = reduce_batch(part.kind, &empty, anon)?.schema();

    let target = part.target_in(out_dir);
    let mut w = ReducedWriter::create(&target, schema)?;
    let streamed = reader.into_iter().try_for_each(|batch| -> Result<()> {
        let batch = batch.with_context(|| format!("decode {}", part.path.display()))?;
        w.write(&reduce_batch(part.kind, &batch, anon)?)
    });
    if let Err(e) = streamed {
        if let Err(cleanup) = w.abort() {
            tracing::warn!("Could not remove partial output for {}: {:#}", part.label(), cleanup);
        }
        return Err(e);
    }
    let rows = w.finish()?;
    tracing::info!("Reduced {} → {} ({} rows)", part.label(), target.display(), rows);
    Ok(rows)
}
