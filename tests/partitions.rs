#[path = "common/mod.rs"]
mod common;

use chatreduce::{discover_partitions, ReduceError, StreamKind, YearMonth};
use common::*;

/// Discovery lists `<stem>_<YYYY-MM>.parquet` sorted by period and filters by the glob matcher.
#[test]
fn discovery_filters_and_sorts() {
    let base = make_dataset();
    add_march_chats(&base);
    std::fs::write(base.join("raw").join("chats_notes.txt"), "x").unwrap();
    let raw = base.join("raw");

    let all = discover_partitions(&raw, StreamKind::Chat, "*").unwrap();
    let periods: Vec<_> = all.iter().map(|p| p.period.unwrap()).collect();
    assert_eq!(periods, [YearMonth::new(2023, 1), YearMonth::new(2023, 2), YearMonth::new(2023, 3)]);

    let some = discover_partitions(&raw, StreamKind::Chat, "2023-0[23]").unwrap();
    assert_eq!(some.len(), 2);

    // superchats_ files are not picked up as chats_
    let sc = discover_partitions(&raw, StreamKind::Superchat, "*").unwrap();
    assert_eq!(sc.len(), 1);
    assert_eq!(sc[0].file_name(), "superchats_2023-01.parquet");

    // moderation files ignore the matcher
    let bans = discover_partitions(&raw, StreamKind::Ban, "1999-*").unwrap();
    assert_eq!(bans.len(), 1);
    assert!(bans[0].period.is_none());
}

/// Missing directories and zero matches are empty results; a malformed glob is an error.
#[test]
fn discovery_edge_cases() {
    let base = make_dataset();
    assert!(discover_partitions(&base.join("nope"), StreamKind::Chat, "*").unwrap().is_empty());
    assert!(discover_partitions(&base.join("raw"), StreamKind::Chat, "2024-*").unwrap().is_empty());
    assert!(matches!(
        discover_partitions(&base.join("raw"), StreamKind::Chat, "[2023"),
        Err(ReduceError::InvalidMatcher { .. })
    ));
}

/// A corrupt partition aborts both the reduction and the stats stages, and no stats file
/// is written for the failed run.
#[test]
fn corrupt_partition_aborts_the_run() {
    let base = make_dataset();
    add_corrupt_partition(&base, "chats_2023-04.parquet");
    let p = pipeline(&base);
    p.normalize().unwrap();

    let err = p.reduce_chats().unwrap_err();
    assert!(format!("{err:#}").contains("chats_2023-04.parquet"), "{err:#}");

    assert!(p.generate_chat_stats().is_err());
    assert!(!base.join("raw").join("chat_stats.csv").exists());
}

/// A partition missing a required column is malformed, not silently zero.
#[test]
fn missing_column_is_reported() {
    let base = make_dataset();
    write_parquet(
        &base.join("raw").join("chats_2023-05.parquet"),
        &ban_batch(&[(JAN_15, "C1", "A")]), // no membership/body columns
    );
    let p = pipeline(&base).matcher("2023-05");
    p.normalize().unwrap();
    let err = p.chat_stats().unwrap_err();
    assert!(format!("{err:#}").contains("membership"), "{err:#}");
}

/// A file named like a partition but with an impossible month fails discovery instead of
/// being skipped.
#[test]
fn invalid_partition_month_is_an_error() {
    let base = make_dataset();
    add_corrupt_partition(&base, "chats_2023-13.parquet");
    let err = discover_partitions(&base.join("raw"), StreamKind::Chat, "*").unwrap_err();
    assert!(matches!(&err, ReduceError::InvalidPartition { path, .. } if path.ends_with("chats_2023-13.parquet")), "{err}");

    let p = pipeline(&base);
    assert!(p.normalize().is_err());
}
