use std::path::{Path, PathBuf};

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ReduceOptions {
    pub raw_dir: PathBuf,          // ingestion output (read-only inputs, stats CSVs land here)
    pub complete_dir: PathBuf,     // private normalized copies
    pub public_dir: PathBuf,       // reduced public datasets
    pub elements_dir: PathBuf,     // published stats CSVs
    pub matcher: String,           // glob over the period string, e.g. "2023-*"
    pub append_only: bool,         // append stats rows instead of overwriting
    pub normalize: bool,           // copy raw partitions into complete_dir first
    pub rates_file: Option<PathBuf>, // JSON currency rates; None = amounts used as-is
    pub parallelism: Option<usize>,  // Some(N) to set rayon threads, None to use default
    pub file_concurrency: usize,     // partitions processed concurrently
    pub progress: bool,
    pub low_memory_threshold: f64,   // available/total fraction below which loading waits

    // IO tuning
    pub batch_size: usize,           // parquet rows per record batch
    pub write_buffer_bytes: usize,   // BufWriter capacity for CSV output
}

impl Default for ReduceOptions {
    fn default() -> Self {
        let base = PathBuf::from("./data");
        Self {
            raw_dir: base.join("raw"),
            complete_dir: base.join("complete"),
            public_dir: base.join("public"),
            elements_dir: base.join("elements"),
            matcher: "*".to_string(),
            append_only: false,
            normalize: true,
            rates_file: None,
            parallelism: None,
            file_concurrency: 1, // partitions can be several GB each
            progress: true,
            low_memory_threshold: 0.10,

            batch_size: 64 * 1024,
            write_buffer_bytes: 256 * 1024,
        }
    }
}

impl ReduceOptions {
    /// Lay out all four directories under one root (`raw/`, `complete/`, `public/`, `elements/`).
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        self.raw_dir = base.join("raw");
        self.complete_dir = base.join("complete");
        self.public_dir = base.join("public");
        self.elements_dir = base.join("elements");
        self
    }
    pub fn with_raw_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.raw_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_complete_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.complete_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_public_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.public_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_elements_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.elements_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_matcher(mut self, matcher: impl Into<String>) -> Self {
        let m = matcher.into();
        self.matcher = if m.trim().is_empty() { "*".to_string() } else { m.trim().to_string() };
        self
    }
    pub fn with_append_only(mut self, yes: bool) -> Self {
        self.append_only = yes;
        self
    }
    pub fn with_normalize(mut self, yes: bool) -> Self {
        self.normalize = yes;
        self
    }
    pub fn with_rates_file(mut self, path: impl AsRef<Path>) -> Self {
        self.rates_file = Some(path.as_ref().to_path_buf());
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads);
        self
    }
    pub fn with_file_concurrency(mut self, n: usize) -> Self {
        self.file_concurrency = n.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_low_memory_threshold(mut self, frac: f64) -> Self {
        self.low_memory_threshold = frac.clamp(0.0, 1.0);
        self
    }
    pub fn with_batch_size(mut self, rows: usize) -> Self {
        self.batch_size = rows.max(1024);
        self
    }
    pub fn with_write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer_bytes = bytes.max(8 * 1024);
        self
    }
}
