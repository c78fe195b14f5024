mod config;
mod error;
mod period;
mod util;

mod anonymize;
mod membership;
mod currency;

mod columns;
mod parquet_io;
mod partitions;

mod reduce;
mod aggregate;
mod merge;
mod writer;

mod concurrency;
mod mem;
mod progress;
mod pipeline;

pub use crate::config::ReduceOptions;
pub use crate::error::ReduceError;
pub use crate::period::YearMonth;
pub use crate::pipeline::{Pipeline, ReducedCount, RunSummary, CHAT_STATS_FILE, SUPERCHAT_STATS_FILE};

// Anonymization and membership classification.
pub use crate::anonymize::{Anonymizer, Salt, SALT_ENV};
pub use crate::membership::{classify_membership, classify_status};

// Currency collaborator: implement `CurrencyNormalizer` to plug in other rate sources.
pub use crate::currency::{CurrencyNormalizer, Passthrough, RateTable};

// Partition discovery and the per-stream engines, usable without the full pipeline.
pub use crate::partitions::{discover_partitions, Partition, StreamKind};
pub use crate::reduce::{reduce_batch, reduce_partition};
pub use crate::aggregate::{
    aggregate_partition, BanAggregator, ChatAggregator, ChatBase, ChatPeriodStats, DeletionAggregator, MemberStats,
    ModeCounter, PartitionAggregator, PeriodKey, SuperchatAggregator, SuperchatPeriodStats,
};
pub use crate::merge::{
    join_chat_stats, left_join, merge_chat_stats, superchat_rows, ChatStatsRow, JoinedChatRow, SuperchatStatsRow,
    CHAT_STATS_COLUMNS, SUPERCHAT_STATS_COLUMNS,
};
pub use crate::writer::write_stats;

pub use crate::util::init_tracing_once;
