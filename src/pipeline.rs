use crate::aggregate::{
    aggregate_partition, BanAggregator, ChatAggregator, DeletionAggregator, PeriodKey, SuperchatAggregator,
};
use crate::anonymize::{Anonymizer, Salt};
use crate::concurrency::map_partitions_limited;
use crate::config::ReduceOptions;
use crate::currency::{CurrencyNormalizer, Passthrough, RateTable};
use crate::mem::wait_for_memory;
use crate::merge::{merge_chat_stats, superchat_rows, ChatStatsRow, SuperchatStatsRow, CHAT_STATS_COLUMNS, SUPERCHAT_STATS_COLUMNS};
use crate::partitions::{discover_partitions, total_size, Partition, StreamKind};
use crate::progress::StageProgress;
use crate::reduce::reduce_partition;
use crate::util::{copy_with_backoff, init_tracing_once};
use crate::writer::write_stats;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CHAT_STATS_FILE: &str = "chat_stats.csv";
pub const SUPERCHAT_STATS_FILE: &str = "superchat_stats.csv";

#[derive(Clone)]
pub struct Pipeline {
    pub(crate) opts: ReduceOptions,
    anon: Arc<Anonymizer>,
    normalizer: Option<Arc<dyn CurrencyNormalizer>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReducedCount {
    pub partitions: usize,
    pub rows: u64,
}

/// What a full run did; the CLI can dump it as JSON.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub matcher: String,
    pub append_only: bool,
    pub normalized_files: usize,
    pub reduced: BTreeMap<&'static str, ReducedCount>,
    pub superchat_stats_rows: u64,
    pub chat_stats_rows: u64,
}

impl Pipeline {
    /// The salt is validated by construction; nothing runs without one.
    pub fn new(salt: Salt) -> Self {
        Self { opts: ReduceOptions::default(), anon: Arc::new(Anonymizer::new(salt)), normalizer: None }
    }

    /// Reads `ANONYMIZATION_SALT`; fails fast when it is missing or empty.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Salt::from_env()?))
    }

    // -------- Builder methods --------
    pub fn options(mut self, opts: ReduceOptions) -> Self { self.opts = opts; self }
    pub fn base_dir(mut self, base: impl AsRef<Path>) -> Self { self.opts = self.opts.with_base_dir(base); self }
    pub fn matcher(mut self, m: impl Into<String>) -> Self { self.opts = self.opts.with_matcher(m); self }
    pub fn append_only(mut self, yes: bool) -> Self { self.opts = self.opts.with_append_only(yes); self }
    pub fn normalize_inputs(mut self, yes: bool) -> Self { self.opts = self.opts.with_normalize(yes); self }
    pub fn file_concurrency(mut self, n: usize) -> Self { self.opts = self.opts.with_file_concurrency(n); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn batch_size(mut self, rows: usize) -> Self { self.opts = self.opts.with_batch_size(rows); self }
    pub fn currency_normalizer(mut self, n: Arc<dyn CurrencyNormalizer>) -> Self { self.normalizer = Some(n); self }

    pub fn opts(&self) -> &ReduceOptions {
        &self.opts
    }

    pub fn chat_stats_path(&self) -> PathBuf {
        self.opts.raw_dir.join(CHAT_STATS_FILE)
    }

    pub fn superchat_stats_path(&self) -> PathBuf {
        self.opts.raw_dir.join(SUPERCHAT_STATS_FILE)
    }

    fn resolve_normalizer(&self) -> Result<Arc<dyn CurrencyNormalizer>> {
        if let Some(n) = &self.normalizer {
            return Ok(n.clone());
        }
        match &self.opts.rates_file {
            Some(path) => Ok(Arc::new(RateTable::from_json_file(path)?)),
            None => {
                tracing::warn!("No currency rate table configured; superchat amounts are summed as-is.");
                Ok(Arc::new(Passthrough))
            }
        }
    }

    fn discover(&self, dir: &Path, kind: StreamKind) -> Result<Vec<Partition>> {
        let parts = discover_partitions(dir, kind, &self.opts.matcher)?;
        if parts.is_empty() {
            tracing::warn!("No {} partitions in {} match `{}`", kind.stem(), dir.display(), self.opts.matcher);
        } else {
            tracing::info!("Planned {} {} partitions", parts.len(), kind.stem());
        }
        Ok(parts)
    }

    // -------- Stages --------

    /// Copy raw partitions into the private `complete_dir`. Returns files copied.
    pub fn normalize(&self) -> Result<usize> {
        tracing::info!("[normalize]");
        let mut copied = 0;
        for kind in [StreamKind::Ban, StreamKind::Deletion, StreamKind::Superchat, StreamKind::Chat] {
            for part in self.discover(&self.opts.raw_dir, kind)? {
                copy_with_backoff(&part.path, &part.target_in(&self.opts.complete_dir))?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Reduce every matching partition of `kind` from `complete_dir` into `public_dir`.
    pub fn reduce_stream(&self, kind: StreamKind) -> Result<ReducedCount> {
        tracing::info!("[reduce {}]", kind.stem());
        let parts = self.discover(&self.opts.complete_dir, kind)?;
        let pb = StageProgress::bytes(self.opts.progress, total_size(&parts), &format!("Reduce {}", kind.stem()));

        let rows = map_partitions_limited(&parts, self.opts.file_concurrency, |part| {
            wait_for_memory(self.opts.low_memory_threshold, &part.label());
            let size = fs::metadata(&part.path).map(|m| m.len()).unwrap_or(0);
            let n = reduce_partition(part, &self.opts.public_dir, &self.anon, self.opts.batch_size)
                .with_context(|| format!("reducing {}", part.path.display()))?;
            pb.inc(size);
            Ok(n)
        })?;

        pb.finish(&format!("Reduce {}: done", kind.stem()));
        Ok(ReducedCount { partitions: parts.len(), rows: rows.into_iter().sum() })
    }

    pub fn reduce_bans(&self) -> Result<ReducedCount> { self.reduce_stream(StreamKind::Ban) }
    pub fn reduce_deletions(&self) -> Result<ReducedCount> { self.reduce_stream(StreamKind::Deletion) }
    pub fn reduce_superchats(&self) -> Result<ReducedCount> { self.reduce_stream(StreamKind::Superchat) }
    pub fn reduce_chats(&self) -> Result<ReducedCount> { self.reduce_stream(StreamKind::Chat) }

    /// Aggregate a moderation stream (one unpartitioned file) into per-(channel, period) counts.
    /// A missing file contributes nothing.
    fn moderation_counts<A, F>(&self, kind: StreamKind, make: F) -> Result<BTreeMap<PeriodKey, u64>>
    where
        A: crate::aggregate::PartitionAggregator<Output = BTreeMap<PeriodKey, u64>>,
        F: Fn() -> A,
    {
        let mut total = BTreeMap::new();
        for part in self.discover(&self.opts.complete_dir, kind)? {
            let counts = aggregate_partition(&part, make(), self.opts.batch_size)
                .with_context(|| format!("aggregating {}", part.path.display()))?;
            total.extend(counts);
        }
        Ok(total)
    }

    /// Chat stats for the matching periods, joined with ban and deletion counts and zero-filled.
    pub fn chat_stats(&self) -> Result<Vec<ChatStatsRow>> {
        let parts = self.discover(&self.opts.complete_dir, StreamKind::Chat)?;
        let pb = StageProgress::count(self.opts.progress, parts.len() as u64, "Chat stats");

        let mut per_partition = map_partitions_limited(&parts, self.opts.file_concurrency, |part| {
            wait_for_memory(self.opts.low_memory_threshold, &part.label());
            let stats = aggregate_partition(part, ChatAggregator::default(), self.opts.batch_size)
                .with_context(|| format!("aggregating {}", part.path.display()))?;
            tracing::info!("Period {}: {} channels", part.label(), stats.len());
            pb.inc(1);
            Ok((part.period, stats))
        })?;
        pb.finish("Chat stats: partitions done");

        per_partition.sort_by_key(|(period, _)| *period);
        let chat: Vec<_> = per_partition.into_iter().flat_map(|(_, s)| s).collect();
        if chat.is_empty() {
            return Ok(Vec::new());
        }

        let bans = self.moderation_counts(StreamKind::Ban, BanAggregator::default)?;
        let deletions = self.moderation_counts(StreamKind::Deletion, DeletionAggregator::default)?;
        Ok(merge_chat_stats(chat, &bans, &deletions))
    }

    pub fn superchat_stats(&self) -> Result<Vec<SuperchatStatsRow>> {
        let normalizer = self.resolve_normalizer()?;
        let parts = self.discover(&self.opts.complete_dir, StreamKind::Superchat)?;
        let pb = StageProgress::count(self.opts.progress, parts.len() as u64, "Superchat stats");

        let mut per_partition = map_partitions_limited(&parts, self.opts.file_concurrency, |part| {
            wait_for_memory(self.opts.low_memory_threshold, &part.label());
            let stats = aggregate_partition(part, SuperchatAggregator::new(normalizer.clone()), self.opts.batch_size)
                .with_context(|| format!("aggregating {}", part.path.display()))?;
            tracing::info!("Period {}: {} channels", part.label(), stats.len());
            pb.inc(1);
            Ok((part.period, stats))
        })?;
        pb.finish("Superchat stats: partitions done");

        per_partition.sort_by_key(|(period, _)| *period);
        Ok(superchat_rows(per_partition.into_iter().flat_map(|(_, s)| s).collect()))
    }

    fn publish(&self, written: &Path) -> Result<()> {
        let file_name = written.file_name().context("stats path has no file name")?;
        copy_with_backoff(written, &self.opts.elements_dir.join(file_name))
    }

    pub fn generate_chat_stats(&self) -> Result<u64> {
        tracing::info!("[generate_chat_stats]");
        let rows = self.chat_stats()?;
        let path = self.chat_stats_path();
        let n = write_stats(&rows, &CHAT_STATS_COLUMNS, &path, self.opts.append_only, self.opts.write_buffer_bytes)?;
        self.publish(&path)?;
        Ok(n)
    }

    pub fn generate_superchat_stats(&self) -> Result<u64> {
        tracing::info!("[generate_superchat_stats]");
        let rows = self.superchat_stats()?;
        let path = self.superchat_stats_path();
        let n = write_stats(&rows, &SUPERCHAT_STATS_COLUMNS, &path, self.opts.append_only, self.opts.write_buffer_bytes)?;
        self.publish(&path)?;
        Ok(n)
    }

    /// Full batch: normalize, reduce all four streams, then both stats tables.
    pub fn run(&self) -> Result<RunSummary> {
        init_tracing_once();
        if let Some(n) = self.opts.parallelism.filter(|&n| n > 0) {
            rayon::ThreadPoolBuilder::new().num_threads(n).build_global().ok();
        }

        tracing::info!("raw: {}", self.opts.raw_dir.display());
        tracing::info!("complete: {}", self.opts.complete_dir.display());
        tracing::info!("public: {}", self.opts.public_dir.display());
        tracing::info!("elements: {}", self.opts.elements_dir.display());
        tracing::info!("matcher: {}  appendOnly: {}", self.opts.matcher, self.opts.append_only);

        let mut summary = RunSummary {
            matcher: self.opts.matcher.clone(),
            append_only: self.opts.append_only,
            ..Default::default()
        };

        if self.opts.normalize {
            summary.normalized_files = self.normalize()?;
        }

        for kind in [StreamKind::Ban, StreamKind::Deletion, StreamKind::Superchat, StreamKind::Chat] {
            summary.reduced.insert(kind.stem(), self.reduce_stream(kind)?);
        }

        summary.superchat_stats_rows = self.generate_superchat_stats()?;
        summary.chat_stats_rows = self.generate_chat_stats()?;
        Ok(summary)
    }
}
