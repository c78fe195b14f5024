//! Stage progress bars: partitions processed out of total, optionally byte-weighted.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const COUNT_TEMPLATE: &str = "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
     elapsed: {elapsed_precise}  eta: {eta_precise}";
const BYTES_TEMPLATE: &str = "{spinner:.green} {msg} {bytes:>10}/{total_bytes:<10} [{bar:.cyan/blue}] {percent:>3}%  \
     {bytes_per_sec}  elapsed: {elapsed_precise}  eta: {eta_precise}";

fn styled(total: u64, template: &str, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(template) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        pb.set_message(label.to_string());
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Optional bar wrapper so stages don't branch on `progress` everywhere.
pub struct StageProgress(Option<ProgressBar>);

impl StageProgress {
    pub fn count(enabled: bool, total: u64, label: &str) -> Self {
        Self(enabled.then(|| styled(total, COUNT_TEMPLATE, label)))
    }
    pub fn bytes(enabled: bool, total_bytes: u64, label: &str) -> Self {
        Self(enabled.then(|| styled(total_bytes, BYTES_TEMPLATE, label)))
    }
    #[inline]
    pub fn inc(&self, delta: u64) {
        if let Some(pb) = &self.0 {
            pb.inc(delta);
        }
    }
    pub fn finish(&self, msg: &str) {
        if let Some(pb) = &self.0 {
            pb.finish_with_message(msg.to_string());
        }
    }
}
