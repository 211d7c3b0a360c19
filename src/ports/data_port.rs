//! Price data access port trait.

use chrono::NaiveDate;

use crate::domain::error::QuantboardError;
use crate::domain::ohlcv::{Interval, PriceSeries};

pub trait DataPort {
    /// Bars for `ticker` whose timestamps fall in `[start, end]`.
    ///
    /// Returns `NoData` when the range holds no bars. Implementations pass
    /// rows through in source order; ordering is checked by [`PriceSeries`].
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceSeries, QuantboardError>;

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, QuantboardError>;
}

impl<T: DataPort + ?Sized> DataPort for &T {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<PriceSeries, QuantboardError> {
        (**self).fetch_prices(ticker, start, end, interval)
    }

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, QuantboardError> {
        (**self).list_symbols(interval)
    }
}
