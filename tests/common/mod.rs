#![allow(dead_code)]

use arrow::array::{
    ArrayRef, DictionaryArray, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
    TimestampNanosecondArray,
};
use arrow::compute::concat_batches;
use arrow::datatypes::Int32Type;
use arrow::record_batch::RecordBatch;
use chatreduce::{Anonymizer, Pipeline, Salt};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SALT: &str = "test-salt";

// Noon UTC on a few days of early 2023 (epoch seconds).
pub const JAN_15: i64 = 1673784000;
pub const JAN_20: i64 = 1674216000;
pub const JAN_31_LATE: i64 = 1675207800; // 2023-01-31T23:30:00Z
pub const FEB_10: i64 = 1676030400;
pub const FEB_28: i64 = 1677585600;
pub const MAR_05: i64 = 1678017600;

pub fn anonymizer() -> Anonymizer {
    Anonymizer::new(Salt::new(SALT).unwrap())
}

pub fn pipeline(base: &Path) -> Pipeline {
    Pipeline::new(Salt::new(SALT).unwrap()).base_dir(base).progress(false)
}

pub struct ChatRow {
    pub ts: i64,
    pub channel: &'static str,
    pub author: Option<&'static str>,
    pub membership: Option<&'static str>,
    pub body: Option<&'static str>,
}

pub fn chat(ts: i64, channel: &'static str, author: &'static str, membership: &'static str, body: Option<&'static str>) -> ChatRow {
    ChatRow { ts, channel, author: Some(author), membership: Some(membership), body }
}

/// Chat capture with a millisecond UTC timestamp, a categorical `membership` column and an
/// extra `authorName` column that the reducers must not carry over.
pub fn chat_batch(rows: &[ChatRow]) -> RecordBatch {
    let ts = TimestampMillisecondArray::from(rows.iter().map(|r| r.ts * 1000).collect::<Vec<_>>()).with_timezone("UTC");
    let membership: DictionaryArray<Int32Type> = rows.iter().map(|r| r.membership).collect();
    RecordBatch::try_from_iter(vec![
        ("timestamp", Arc::new(ts) as ArrayRef),
        ("authorName", Arc::new(StringArray::from_iter(rows.iter().map(|r| r.author.map(|a| format!("name of {a}"))))) as ArrayRef),
        ("body", Arc::new(StringArray::from(rows.iter().map(|r| r.body).collect::<Vec<_>>())) as ArrayRef),
        ("membership", Arc::new(membership) as ArrayRef),
        ("authorChannelId", Arc::new(StringArray::from(rows.iter().map(|r| r.author).collect::<Vec<_>>())) as ArrayRef),
        ("videoId", Arc::new(StringArray::from(rows.iter().map(|_| Some("v1")).collect::<Vec<_>>())) as ArrayRef),
        ("channelId", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.channel)).collect::<Vec<_>>())) as ArrayRef),
    ])
    .unwrap()
}

pub struct SuperchatRow {
    pub ts: i64,
    pub channel: &'static str,
    pub author: &'static str,
    pub amount: Option<f64>,
    pub currency: &'static str,
    pub color: &'static str,
    pub body: Option<&'static str>,
}

pub fn superchat_batch(rows: &[SuperchatRow]) -> RecordBatch {
    let ts = TimestampMillisecondArray::from(rows.iter().map(|r| r.ts * 1000).collect::<Vec<_>>()).with_timezone("UTC");
    RecordBatch::try_from_iter(vec![
        ("timestamp", Arc::new(ts) as ArrayRef),
        ("amount", Arc::new(Float64Array::from(rows.iter().map(|r| r.amount).collect::<Vec<_>>())) as ArrayRef),
        ("currency", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.currency)).collect::<Vec<_>>())) as ArrayRef),
        ("color", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.color)).collect::<Vec<_>>())) as ArrayRef),
        ("significance", Arc::new(Int64Array::from(rows.iter().map(|_| 2).collect::<Vec<_>>())) as ArrayRef),
        ("body", Arc::new(StringArray::from(rows.iter().map(|r| r.body).collect::<Vec<_>>())) as ArrayRef),
        ("authorChannelId", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.author)).collect::<Vec<_>>())) as ArrayRef),
        ("videoId", Arc::new(StringArray::from(rows.iter().map(|_| Some("v1")).collect::<Vec<_>>())) as ArrayRef),
        ("channelId", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.channel)).collect::<Vec<_>>())) as ArrayRef),
    ])
    .unwrap()
}

/// Ban events with a nanosecond timestamp and no timezone.
pub fn ban_batch(rows: &[(i64, &str, &str)]) -> RecordBatch {
    let ts = TimestampNanosecondArray::from(rows.iter().map(|r| r.0 * 1_000_000_000).collect::<Vec<_>>());
    RecordBatch::try_from_iter(vec![
        ("timestamp", Arc::new(ts) as ArrayRef),
        ("authorChannelId", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.2)).collect::<Vec<_>>())) as ArrayRef),
        ("videoId", Arc::new(StringArray::from(rows.iter().map(|_| Some("v1")).collect::<Vec<_>>())) as ArrayRef),
        ("channelId", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.1)).collect::<Vec<_>>())) as ArrayRef),
    ])
    .unwrap()
}

/// Deletion events: (ts, channel, id, retracted).
pub fn deletion_batch(rows: &[(i64, &str, &str, i64)]) -> RecordBatch {
    let ts = TimestampNanosecondArray::from(rows.iter().map(|r| r.0 * 1_000_000_000).collect::<Vec<_>>());
    RecordBatch::try_from_iter(vec![
        ("timestamp", Arc::new(ts) as ArrayRef),
        ("id", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.2)).collect::<Vec<_>>())) as ArrayRef),
        ("retracted", Arc::new(Int64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>())) as ArrayRef),
        ("videoId", Arc::new(StringArray::from(rows.iter().map(|_| Some("v1")).collect::<Vec<_>>())) as ArrayRef),
        ("channelId", Arc::new(StringArray::from(rows.iter().map(|r| Some(r.1)).collect::<Vec<_>>())) as ArrayRef),
    ])
    .unwrap()
}

pub fn write_parquet(path: &Path, batch: &RecordBatch) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut w = ArrowWriter::try_new(f, batch.schema(), None).unwrap();
    w.write(batch).unwrap();
    w.close().unwrap();
}

/// Read a whole parquet file back as one batch.
pub fn read_parquet(path: &Path) -> RecordBatch {
    let f = File::open(path).unwrap();
    let builder = ParquetRecordBatchReaderBuilder::try_new(f).unwrap();
    let schema = builder.schema().clone();
    let batches: Vec<RecordBatch> = builder.build().unwrap().map(|b| b.unwrap()).collect();
    concat_batches(&schema, &batches).unwrap()
}

/// Read a CSV file as (header, rows) of raw strings.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut r = csv::ReaderBuilder::new().has_headers(false).from_path(path).unwrap();
    let mut records = r.records().map(|rec| rec.unwrap().iter().map(str::to_string).collect::<Vec<_>>());
    let header = records.next().unwrap_or_default();
    (header, records.collect())
}

pub fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

pub fn chats_jan() -> Vec<ChatRow> {
    vec![
        chat(JAN_15, "C1", "A", "non-member", Some("hello")),
        chat(JAN_15, "C1", "B", "non-member", Some("こんにちは")),
        chat(JAN_20, "C1", "M", "tier1", None),
        chat(JAN_20, "C2", "X", "unknown", Some("hey")),
        chat(JAN_31_LATE, "C2", "Y", "non-member", Some("yo")),
    ]
}

pub fn chats_feb() -> Vec<ChatRow> {
    vec![
        chat(FEB_10, "C1", "A", "Member (6 months)", Some("a")),
        chat(FEB_28, "C1", "A", "Member (6 months)", Some("bb")),
        chat(FEB_28, "C3", "Q", "non-member", Some("ccc")),
    ]
}

pub fn superchats_jan() -> Vec<SuperchatRow> {
    vec![
        SuperchatRow { ts: JAN_15, channel: "C1", author: "A", amount: Some(500.0), currency: "JPY", color: "green", body: Some("hi") },
        SuperchatRow { ts: JAN_15, channel: "C1", author: "B", amount: Some(5.0), currency: "USD", color: "blue", body: Some("hello") },
        SuperchatRow { ts: JAN_20, channel: "C1", author: "A", amount: Some(1000.0), currency: "JPY", color: "blue", body: None },
    ]
}

/// Build a small **valid** raw dataset under `<base>/raw`:
/// - `chats_2023-01`: C1 has 3 chats (A, B non-members; M on "tier1"), C2 has 2 chats (X unknown, Y non-member).
/// - `chats_2023-02`: C1 has 2 member chats by A, C3 has 1 non-member chat.
/// - `superchats_2023-01`: C1 has 500 JPY (green), 5 USD (blue), 1000 JPY (blue, no body).
/// - `ban_events`: C1 in Jan bans A twice and B once; C9 (no chats at all) bans Z.
/// - `deletion_events`: C1 in Jan has d1, d2 active and d3 retracted.
pub fn make_dataset() -> PathBuf {
    let base = tempfile::tempdir().unwrap().into_path();
    let raw = base.join("raw");

    write_parquet(&raw.join("chats_2023-01.parquet"), &chat_batch(&chats_jan()));
    write_parquet(&raw.join("chats_2023-02.parquet"), &chat_batch(&chats_feb()));
    write_parquet(&raw.join("superchats_2023-01.parquet"), &superchat_batch(&superchats_jan()));
    write_parquet(
        &raw.join("ban_events.parquet"),
        &ban_batch(&[(JAN_15, "C1", "A"), (JAN_20, "C1", "A"), (JAN_20, "C1", "B"), (JAN_20, "C9", "Z")]),
    );
    write_parquet(
        &raw.join("deletion_events.parquet"),
        &deletion_batch(&[(JAN_15, "C1", "d1", 0), (JAN_20, "C1", "d2", 0), (JAN_20, "C1", "d3", 1)]),
    );
    base
}

/// Add a March chat partition to an existing dataset.
pub fn add_march_chats(base: &Path) {
    write_parquet(
        &base.join("raw").join("chats_2023-03.parquet"),
        &chat_batch(&[chat(MAR_05, "C1", "A", "non-member", Some("march"))]),
    );
}

/// A partition with the right name but contents that are not parquet.
pub fn add_corrupt_partition(base: &Path, name: &str) {
    let p = base.join("raw").join(name);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, b"definitely not parquet").unwrap();
}

/// A chat partition that opens fine but fails while decoding: the `body` page holds bytes
/// that are not UTF-8. Written plain and uncompressed so the marker can be patched in place.
pub fn add_undecodable_chats(base: &Path, name: &str) {
    const MARKER: &[u8] = b"ZQZQZQZQZQZQZQZQ";
    let p = base.join("raw").join(name);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    let batch = chat_batch(&[chat(JAN_15, "C1", "A", "non-member", Some("ZQZQZQZQZQZQZQZQ"))]);
    let props = WriterProperties::builder()
        .set_dictionary_enabled(false)
        .set_statistics_enabled(EnabledStatistics::None)
        .build();
    let mut w = ArrowWriter::try_new(File::create(&p).unwrap(), batch.schema(), Some(props)).unwrap();
    w.write(&batch).unwrap();
    w.close().unwrap();

    let mut bytes = fs::read(&p).unwrap();
    let at = bytes.windows(MARKER.len()).position(|w| w == MARKER).unwrap();
    bytes[at..at + MARKER.len()].fill(0xFF);
    fs::write(&p, bytes).unwrap();
}
