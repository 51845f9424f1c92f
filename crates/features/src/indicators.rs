//! Price indicators over an ordered series.
//!
//! Windows are counted in series positions, not calendar days: a 5-period
//! average spans the five most recent records regardless of date gaps.

use daybook_core::config::IndicatorConfig;
use daybook_core::{parse_opt, round_to, DerivedField};
use daybook_ingestion::OrderedSeries;
use tracing::debug;

/// Percentage change relative to the implied prior close (`close - change`).
///
/// Undefined when the implied prior close is zero.
#[inline]
pub fn change_pct(close: f64, change: f64) -> Option<f64> {
    let prev_close = close - change;
    if prev_close == 0.0 {
        None
    } else {
        Some(change / prev_close * 100.0)
    }
}

/// Simple moving average over positions `[i + 1 - period, i]`.
///
/// Defined only when the window fits in the series and every value in it
/// is present.
pub fn moving_average(values: &[Option<f64>], i: usize, period: usize) -> Option<f64> {
    if period == 0 || i >= values.len() || i + 1 < period {
        return None;
    }
    let window = &values[i + 1 - period..=i];
    let sum = window.iter().try_fold(0.0, |acc, v| v.map(|x| acc + x))?;
    Some(sum / period as f64)
}

/// Computes change percent and moving averages of the close.
#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    /// Ascending, deduplicated periods.
    periods: Vec<u32>,
    decimals: u32,
}

impl IndicatorCalculator {
    /// Create a calculator from configuration.
    pub fn new(config: &IndicatorConfig, decimals: u32) -> Self {
        let mut periods = config.ma_periods.clone();
        periods.sort_unstable();
        periods.dedup();
        Self { periods, decimals }
    }

    /// Moving average periods, ascending.
    pub fn periods(&self) -> &[u32] {
        &self.periods
    }

    /// Attach indicator fields to every record of the series in place.
    ///
    /// Missing or unparseable inputs leave the affected field absent.
    /// Previously computed indicator values are replaced.
    pub fn apply(&self, series: &mut OrderedSeries) {
        let closes: Vec<Option<f64>> = series.iter().map(|r| parse_opt(r.close())).collect();
        let mut attached = 0usize;

        for (i, record) in series.records_mut().iter_mut().enumerate() {
            let derived = &mut record.derived;
            derived.change_pct = None;
            for period in &self.periods {
                derived.moving_averages.remove(period);
            }

            if record.price.close.is_none() {
                continue;
            }

            let change = parse_opt(record.price.change.as_deref());
            if let Some(pct) = closes[i].zip(change).and_then(|(c, ch)| change_pct(c, ch)) {
                derived.set(DerivedField::ChangePct, round_to(pct, self.decimals));
                attached += 1;
            }

            for &period in &self.periods {
                if let Some(ma) = moving_average(&closes, i, period as usize) {
                    derived.set(DerivedField::MovingAverage(period), round_to(ma, self.decimals));
                    attached += 1;
                }
            }
        }

        debug!(records = series.len(), attached, "indicators computed");
    }
}

impl Default for IndicatorCalculator {
    fn default() -> Self {
        Self::new(&IndicatorConfig::default(), 2)
    }
}
