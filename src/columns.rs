//! Column accessors over arrow record batches. Input files come from pandas and other writers,
//! so the same logical column may arrive as `Utf8`, `LargeUtf8` or a dictionary (categorical);
//! everything is cast to one canonical type before use.

use crate::error::ReduceError;
use crate::period::YearMonth;
use arrow::array::{ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit};
use arrow::record_batch::RecordBatch;

pub const TIMESTAMP: &str = "timestamp";
pub const CHANNEL_ID: &str = "channelId";
pub const VIDEO_ID: &str = "videoId";
pub const AUTHOR_CHANNEL_ID: &str = "authorChannelId";
pub const BODY: &str = "body";
pub const MEMBERSHIP: &str = "membership";
pub const AMOUNT: &str = "amount";
pub const CURRENCY: &str = "currency";
pub const COLOR: &str = "color";
pub const SIGNIFICANCE: &str = "significance";
pub const ID: &str = "id";
pub const RETRACTED: &str = "retracted";

pub const IS_MEMBER: &str = "isMember";
pub const BODY_LENGTH: &str = "bodyLength";

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, ReduceError> {
    batch.column_by_name(name).ok_or_else(|| ReduceError::MissingColumn {
        column: name.to_string(),
        path: Default::default(),
    })
}

fn cast_to(col: &ArrayRef, name: &str, to: &DataType) -> Result<ArrayRef, ReduceError> {
    cast(col, to).map_err(|_| ReduceError::UnsupportedColumnType {
        column: name.to_string(),
        data_type: col.data_type().to_string(),
    })
}

pub fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray, ReduceError> {
    let col = column(batch, name)?;
    if let Some(s) = col.as_string_opt::<i32>() {
        return Ok(s.clone());
    }
    Ok(cast_to(col, name, &DataType::Utf8)?.as_string::<i32>().clone())
}

pub fn int_column(batch: &RecordBatch, name: &str) -> Result<Int64Array, ReduceError> {
    let col = column(batch, name)?;
    Ok(cast_to(col, name, &DataType::Int64)?.as_primitive::<Int64Type>().clone())
}

pub fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array, ReduceError> {
    let col = column(batch, name)?;
    Ok(cast_to(col, name, &DataType::Float64)?.as_primitive::<Float64Type>().clone())
}

/// Calendar month of every row's `timestamp` (UTC). Nulls stay null.
pub fn period_column(batch: &RecordBatch) -> Result<Vec<Option<YearMonth>>, ReduceError> {
    let col = column(batch, TIMESTAMP)?;
    let scale: i128 = match col.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => 1_000_000_000,
        DataType::Timestamp(TimeUnit::Millisecond, _) => 1_000_000,
        DataType::Timestamp(TimeUnit::Microsecond, _) => 1_000,
        DataType::Timestamp(TimeUnit::Nanosecond, _) => 1,
        other => {
            return Err(ReduceError::UnsupportedColumnType {
                column: TIMESTAMP.to_string(),
                data_type: other.to_string(),
            })
        }
    };
    // Raw epoch values; casting to Int64 does not apply the column's timezone.
    let raw = cast_to(col, TIMESTAMP, &DataType::Int64)?;
    raw.as_primitive::<Int64Type>()
        .iter()
        .map(|v| v.map(|n| YearMonth::from_unix_nanos(i128::from(n) * scale)).transpose())
        .collect()
}

/// Character (not byte) length of each string; null stays null.
pub fn char_lengths(col: &StringArray) -> Vec<Option<usize>> {
    col.iter().map(|s| s.map(|s| s.chars().count())).collect()
}
