//! Currency normalization collaborator: converts superchat amounts to one reference currency
//! before aggregation.

use crate::error::ReduceError;
use ahash::AHashMap;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const DEFAULT_REFERENCE: &str = "JPY";

pub trait CurrencyNormalizer: Send + Sync {
    fn to_reference(&self, amount: f64, currency: &str) -> Result<f64, ReduceError>;
}

/// Identity conversion, used when no rate table is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl CurrencyNormalizer for Passthrough {
    fn to_reference(&self, amount: f64, _currency: &str) -> Result<f64, ReduceError> {
        Ok(amount)
    }
}

/// Fixed rates: one unit of `currency` is worth `rate` units of the reference currency.
#[derive(Clone, Debug)]
pub struct RateTable {
    reference: String,
    rates: AHashMap<String, f64>,
}

impl RateTable {
    pub fn new<I, S>(reference: impl Into<String>, rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let reference = reference.into();
        let mut rates: AHashMap<String, f64> = rates.into_iter().map(|(k, v)| (k.into(), v)).collect();
        rates.insert(reference.clone(), 1.0);
        Self { reference, rates }
    }

    /// Load `{"USD": 150.1, "EUR": 160.4, ...}` with JPY as the reference currency.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open rate table {}", path.display()))?;
        let rates: HashMap<String, f64> = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse rate table {}", path.display()))?;
        tracing::info!("Loaded {} currency rates from {}", rates.len(), path.display());
        Ok(Self::new(DEFAULT_REFERENCE, rates))
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl CurrencyNormalizer for RateTable {
    fn to_reference(&self, amount: f64, currency: &str) -> Result<f64, ReduceError> {
        self.rates
            .get(currency)
            .map(|rate| amount * rate)
            .ok_or_else(|| ReduceError::UnknownCurrency(currency.to_string()))
    }
}
