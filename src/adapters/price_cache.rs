//! In-memory TTL cache in front of any [`DataPort`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::error::QuantboardError;
use crate::domain::ohlcv::{Interval, PriceSeries};
use crate::ports::data_port::DataPort;

type CacheKey = (String, NaiveDate, NaiveDate, Interval);

#[derive(Debug, Clone)]
struct CacheEntry {
    series: PriceSeries,
    stored_at: Instant,
}

/// Caches successful fetches keyed by `(ticker, start, end, interval)`.
///
/// A zero TTL disables caching. Errors are never cached. Symbol listings
/// pass straight through.
pub struct PriceCache<P: DataPort> {
    inner: P,
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl<P: DataPort> PriceCache<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Drops every entry for `ticker`.
    pub fn invalidate(&self, ticker: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|(t, ..), _| t != ticker);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .values()
                    .filter(|e| e.stored_at.elapsed() < self.ttl)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &CacheKey) -> Option<PriceSeries> {
        let entries = self.entries.read().ok()?;
        entries
            .get(key)
            .filter(|e| e.stored_at.elapsed() < self.ttl)
            .map(|e| e.series.clone())
    }
}

impl<P: DataPort> DataPort for PriceCache<P> {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceSeries, QuantboardError> {
        if self.ttl.is_zero() {
            return self.inner.fetch_prices(ticker, start, end, interval);
        }

        let key = (ticker.to_string(), start, end, interval);
        if let Some(series) = self.lookup(&key) {
            debug!(ticker, %interval, "price cache hit");
            return Ok(series);
        }

        let series = self.inner.fetch_prices(ticker, start, end, interval)?;
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, e| e.stored_at.elapsed() < self.ttl);
            entries.insert(
                key,
                CacheEntry {
                    series: series.clone(),
                    stored_at: Instant::now(),
                },
            );
        }
        Ok(series)
    }

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, QuantboardError> {
        self.inner.list_symbols(interval)
    }
}
