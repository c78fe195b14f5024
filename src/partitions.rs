//! Partition discovery: `<stem>_<YYYY-MM>.parquet` files per stream, filtered by a glob over
//! the period string. Discovery is the only place that looks at directory listings; everything
//! downstream receives an already-resolved, period-sorted list.

use crate::error::ReduceError;
use crate::period::YearMonth;
use glob::Pattern;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Event stream kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Chat,      // chats_YYYY-MM.parquet
    Superchat, // superchats_YYYY-MM.parquet
    Ban,       // ban_events.parquet
    Deletion,  // deletion_events.parquet
}

impl StreamKind {
    pub fn stem(self) -> &'static str {
        match self {
            StreamKind::Chat => "chats",
            StreamKind::Superchat => "superchats",
            StreamKind::Ban => "ban_events",
            StreamKind::Deletion => "deletion_events",
        }
    }

    pub fn is_partitioned(self) -> bool {
        matches!(self, StreamKind::Chat | StreamKind::Superchat)
    }
}

#[derive(Clone, Debug)]
pub struct Partition {
    pub kind: StreamKind,
    /// None for the unpartitioned moderation files.
    pub period: Option<YearMonth>,
    pub path: PathBuf,
}

impl Partition {
    pub fn file_name(&self) -> String {
        match self.period {
            Some(p) => format!("{}_{}.parquet", self.kind.stem(), p),
            None => format!("{}.parquet", self.kind.stem()),
        }
    }

    /// Same file name, relocated under `dir`.
    pub fn target_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    pub fn label(&self) -> String {
        match self.period {
            Some(p) => format!("{} {}", self.kind.stem(), p),
            None => self.kind.stem().to_string(),
        }
    }
}

pub fn compile_matcher(matcher: &str) -> Result<Pattern, ReduceError> {
    Pattern::new(matcher).map_err(|e| ReduceError::InvalidMatcher {
        matcher: matcher.to_string(),
        reason: e.to_string(),
    })
}

/// List partitions of `kind` under `dir`, sorted by period. A missing directory or zero
/// matches yields an empty list. The matcher only applies to partitioned kinds.
pub fn discover_partitions(dir: &Path, kind: StreamKind, matcher: &str) -> Result<Vec<Partition>, ReduceError> {
    let pattern = compile_matcher(matcher)?;
    if !dir.exists() {
        return Ok(Vec::new());
    }

    if !kind.is_partitioned() {
        let path = dir.join(format!("{}.parquet", kind.stem()));
        return Ok(if path.is_file() { vec![Partition { kind, period: None, path }] } else { Vec::new() });
    }

    let re = Regex::new(&format!(r"^{}_(\d{{4}}-\d{{2}})\.parquet$", regex::escape(kind.stem())))
        .map_err(|e| ReduceError::InvalidMatcher { matcher: matcher.to_string(), reason: e.to_string() })?;

    let mut out = Vec::new();
    for ent in WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().flatten() {
        let Some(name) = ent.file_name().to_str() else { continue };
        let Some(caps) = re.captures(name) else { continue };
        let period_str = &caps[1];
        if !pattern.matches(period_str) {
            continue;
        }
        let period = period_str
            .parse::<YearMonth>()
            .map_err(|reason| ReduceError::InvalidPartition { path: ent.path().to_path_buf(), reason })?;
        out.push(Partition { kind, period: Some(period), path: ent.path().to_path_buf() });
    }
    out.sort_by_key(|p| p.period);
    Ok(out)
}

pub fn total_size(parts: &[Partition]) -> u64 {
    parts.iter().map(|p| fs::metadata(&p.path).map(|m| m.len()).unwrap_or(0)).sum()
}
