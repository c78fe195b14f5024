//! Per-partition aggregation: explicit `key → accumulator` grouping for each stream.
//! Implement `PartitionAggregator` for an accumulator and drive it with `aggregate_partition`;
//! one file is folded batch by batch and only the small per-channel summary is kept.

use crate::columns::{
    char_lengths, float_column, int_column, period_column, string_column, AMOUNT, AUTHOR_CHANNEL_ID, BODY,
    CHANNEL_ID, COLOR, CURRENCY, ID, MEMBERSHIP, RETRACTED, TIMESTAMP,
};
use crate::currency::CurrencyNormalizer;
use crate::membership::is_member;
use crate::parquet_io::open_projected;
use crate::partitions::Partition;
use crate::period::YearMonth;
use ahash::{AHashMap, AHashSet};
use anyhow::{anyhow, Context, Result};
use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Grouping key shared by every statistic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub channel_id: String,
    pub period: YearMonth,
}

impl PeriodKey {
    pub fn new(channel_id: impl Into<String>, period: YearMonth) -> Self {
        Self { channel_id: channel_id.into(), period }
    }
}

pub trait PartitionAggregator: Send {
    type Output: Send;
    /// Columns to project when reading the partition.
    fn columns(&self) -> &'static [&'static str];
    fn ingest(&mut self, batch: &RecordBatch) -> Result<()>;
    /// `period` is the partition's period for partitioned streams, None otherwise.
    fn finish(self, period: Option<YearMonth>) -> Result<Self::Output>;
}

/// Fold one partition file through `agg`. Unreadable or malformed files are errors.
pub fn aggregate_partition<A: PartitionAggregator>(part: &Partition, mut agg: A, batch_size: usize) -> Result<A::Output> {
    let reader = open_projected(&part.path, agg.columns(), batch_size)?;
    let mut rows = 0u64;
    for batch in reader {
        let batch = batch.with_context(|| format!("decode {}", part.path.display()))?;
        rows += batch.num_rows() as u64;
        agg.ingest(&batch).with_context(|| format!("aggregate {}", part.path.display()))?;
    }
    tracing::debug!("Aggregated {} ({} rows)", part.label(), rows);
    agg.finish(part.period)
}

fn require_period(period: Option<YearMonth>, what: &str) -> Result<YearMonth> {
    period.ok_or_else(|| anyhow!("{what} aggregation needs a partition period"))
}

// ----------------- mode -----------------

/// Frequency counter whose mode breaks ties by first-encountered value.
#[derive(Debug, Default)]
pub struct ModeCounter {
    // value -> (count, first-seen rank)
    counts: AHashMap<String, (u64, usize)>,
}

impl ModeCounter {
    pub fn observe(&mut self, value: &str) {
        let rank = self.counts.len();
        self.counts.entry(value.to_string()).or_insert((0, rank)).0 += 1;
    }

    /// Most frequent value; on equal counts the one seen first. None when nothing was observed.
    pub fn mode(&self) -> Option<&str> {
        self.counts
            .iter()
            .max_by(|(_, (ca, ra)), (_, (cb, rb))| ca.cmp(cb).then(rb.cmp(ra)))
            .map(|(v, _)| v.as_str())
    }
}

// ----------------- chat -----------------

/// Per-channel counts over the whole partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatBase {
    pub chats: u64,
    pub unique_chatters: u64,
}

/// Per-channel counts over the member-only subset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberStats {
    pub member_chats: u64,
    pub unique_members: u64,
}

/// One chat partition row: base stats left-joined with member stats
/// (None when the channel had no member chats that period).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPeriodStats {
    pub key: PeriodKey,
    pub base: ChatBase,
    pub members: Option<MemberStats>,
}

#[derive(Default)]
struct CountDistinct {
    count: u64,
    distinct: AHashSet<String>,
}

impl CountDistinct {
    fn add(&mut self, author: Option<&str>) {
        self.count += 1;
        if let Some(a) = author {
            if !self.distinct.contains(a) {
                self.distinct.insert(a.to_string());
            }
        }
    }
}

#[derive(Default)]
pub struct ChatAggregator {
    all: AHashMap<String, CountDistinct>,
    members: AHashMap<String, CountDistinct>,
}

impl PartitionAggregator for ChatAggregator {
    type Output = Vec<ChatPeriodStats>;

    fn columns(&self) -> &'static [&'static str] {
        &[AUTHOR_CHANNEL_ID, CHANNEL_ID, MEMBERSHIP]
    }

    fn ingest(&mut self, batch: &RecordBatch) -> Result<()> {
        let channels = string_column(batch, CHANNEL_ID)?;
        let authors = string_column(batch, AUTHOR_CHANNEL_ID)?;
        let membership = string_column(batch, MEMBERSHIP)?;
        for i in 0..batch.num_rows() {
            let Some(ch) = channels.is_valid(i).then(|| channels.value(i)) else { continue };
            let author = authors.is_valid(i).then(|| authors.value(i));
            self.all.entry(ch.to_string()).or_default().add(author);
            if is_member(membership.is_valid(i).then(|| membership.value(i))) {
                self.members.entry(ch.to_string()).or_default().add(author);
            }
        }
        Ok(())
    }

    fn finish(self, period: Option<YearMonth>) -> Result<Self::Output> {
        let period = require_period(period, "chat")?;
        let base: Vec<(String, ChatBase)> = sorted_entries(self.all)
            .into_iter()
            .map(|(ch, acc)| (ch, ChatBase { chats: acc.count, unique_chatters: acc.distinct.len() as u64 }))
            .collect();
        let members: BTreeMap<String, MemberStats> = self
            .members
            .into_iter()
            .map(|(ch, acc)| (ch, MemberStats { member_chats: acc.count, unique_members: acc.distinct.len() as u64 }))
            .collect();

        Ok(crate::merge::left_join(base, &members)
            .into_iter()
            .map(|(ch, base, members)| ChatPeriodStats { key: PeriodKey::new(ch, period), base, members })
            .collect())
    }
}

fn sorted_entries<V>(m: AHashMap<String, V>) -> Vec<(String, V)> {
    let mut v: Vec<_> = m.into_iter().collect();
    v.sort_by(|a, b| a.0.cmp(&b.0));
    v
}

// ----------------- superchat -----------------

#[derive(Clone, Debug, PartialEq)]
pub struct SuperchatPeriodStats {
    pub key: PeriodKey,
    pub super_chats: u64,
    pub unique_super_chatters: u64,
    pub total_amount: f64,
    /// None when no amount in the group was present.
    pub average_amount: Option<f64>,
    pub total_message_length: u64,
    pub average_message_length: Option<f64>,
    pub most_frequent_currency: Option<String>,
    pub most_frequent_color: Option<String>,
}

#[derive(Default)]
struct SuperchatAcc {
    authors: CountDistinct,
    amount_sum: f64,
    amount_n: u64,
    length_sum: u64,
    length_n: u64,
    currency: ModeCounter,
    color: ModeCounter,
}

pub struct SuperchatAggregator {
    normalizer: Arc<dyn CurrencyNormalizer>,
    groups: AHashMap<String, SuperchatAcc>,
}

impl SuperchatAggregator {
    pub fn new(normalizer: Arc<dyn CurrencyNormalizer>) -> Self {
        Self { normalizer, groups: AHashMap::new() }
    }
}

fn mean(sum: f64, n: u64) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

impl PartitionAggregator for SuperchatAggregator {
    type Output = Vec<SuperchatPeriodStats>;

    fn columns(&self) -> &'static [&'static str] {
        &[AMOUNT, CURRENCY, AUTHOR_CHANNEL_ID, CHANNEL_ID, COLOR, BODY]
    }

    fn ingest(&mut self, batch: &RecordBatch) -> Result<()> {
        let channels = string_column(batch, CHANNEL_ID)?;
        let authors = string_column(batch, AUTHOR_CHANNEL_ID)?;
        let amounts = float_column(batch, AMOUNT)?;
        let currencies = string_column(batch, CURRENCY)?;
        let colors = string_column(batch, COLOR)?;
        let lengths = char_lengths(&string_column(batch, BODY)?);

        for i in 0..batch.num_rows() {
            let Some(ch) = channels.is_valid(i).then(|| channels.value(i)) else { continue };
            let currency = currencies.is_valid(i).then(|| currencies.value(i));
            let acc = self.groups.entry(ch.to_string()).or_default();

            acc.authors.add(authors.is_valid(i).then(|| authors.value(i)));
            if amounts.is_valid(i) {
                // Conversion happens per record, before any summing.
                acc.amount_sum += self.normalizer.to_reference(amounts.value(i), currency.unwrap_or(""))?;
                acc.amount_n += 1;
            }
            if let Some(len) = lengths[i] {
                acc.length_sum += len as u64;
                acc.length_n += 1;
            }
            if let Some(c) = currency {
                acc.currency.observe(c);
            }
            if colors.is_valid(i) {
                acc.color.observe(colors.value(i));
            }
        }
        Ok(())
    }

    fn finish(self, period: Option<YearMonth>) -> Result<Self::Output> {
        let period = require_period(period, "superchat")?;
        Ok(sorted_entries(self.groups)
            .into_iter()
            .map(|(ch, acc)| SuperchatPeriodStats {
                key: PeriodKey::new(ch, period),
                super_chats: acc.authors.count,
                unique_super_chatters: acc.authors.distinct.len() as u64,
                total_amount: acc.amount_sum,
                average_amount: mean(acc.amount_sum, acc.amount_n),
                total_message_length: acc.length_sum,
                average_message_length: mean(acc.length_sum as f64, acc.length_n),
                most_frequent_currency: acc.currency.mode().map(str::to_string),
                most_frequent_color: acc.color.mode().map(str::to_string),
            })
            .collect())
    }
}

// ----------------- moderation -----------------

/// `bannedChatters`: distinct banned authors per (channel, month of the ban).
#[derive(Default)]
pub struct BanAggregator {
    groups: AHashMap<PeriodKey, AHashSet<String>>,
}

impl PartitionAggregator for BanAggregator {
    type Output = BTreeMap<PeriodKey, u64>;

    fn columns(&self) -> &'static [&'static str] {
        &[TIMESTAMP, AUTHOR_CHANNEL_ID, CHANNEL_ID]
    }

    fn ingest(&mut self, batch: &RecordBatch) -> Result<()> {
        let periods = period_column(batch)?;
        let channels = string_column(batch, CHANNEL_ID)?;
        let authors = string_column(batch, AUTHOR_CHANNEL_ID)?;
        for (i, period) in periods.into_iter().enumerate() {
            let (Some(period), true) = (period, channels.is_valid(i)) else { continue };
            let set = self.groups.entry(PeriodKey::new(channels.value(i), period)).or_default();
            if authors.is_valid(i) {
                set.insert(authors.value(i).to_string());
            }
        }
        Ok(())
    }

    fn finish(self, _period: Option<YearMonth>) -> Result<Self::Output> {
        Ok(self.groups.into_iter().map(|(k, set)| (k, set.len() as u64)).collect())
    }
}

/// `deletedChats`: distinct deletion ids per (channel, month), active deletions only.
#[derive(Default)]
pub struct DeletionAggregator {
    groups: AHashMap<PeriodKey, AHashSet<String>>,
}

impl PartitionAggregator for DeletionAggregator {
    type Output = BTreeMap<PeriodKey, u64>;

    fn columns(&self) -> &'static [&'static str] {
        &[TIMESTAMP, ID, RETRACTED, CHANNEL_ID]
    }

    fn ingest(&mut self, batch: &RecordBatch) -> Result<()> {
        let periods = period_column(batch)?;
        let channels = string_column(batch, CHANNEL_ID)?;
        let ids = string_column(batch, ID)?;
        let retracted = int_column(batch, RETRACTED)?;
        for (i, period) in periods.into_iter().enumerate() {
            // retracted == 0 only; a null flag is not an active deletion
            if !retracted.is_valid(i) || retracted.value(i) != 0 {
                continue;
            }
            let (Some(period), true) = (period, channels.is_valid(i)) else { continue };
            let set = self.groups.entry(PeriodKey::new(channels.value(i), period)).or_default();
            if ids.is_valid(i) {
                set.insert(ids.value(i).to_string());
            }
        }
        Ok(())
    }

    fn finish(self, _period: Option<YearMonth>) -> Result<Self::Output> {
        Ok(self.groups.into_iter().map(|(k, set)| (k, set.len() as u64)).collect())
    }
}
