//! Volume analytics over an ordered series.

use daybook_core::config::VolumeConfig;
use daybook_core::{parse_opt, round_to, DerivedField};
use daybook_ingestion::OrderedSeries;
use tracing::debug;

/// Day-over-day change of traded shares, in percent.
#[inline]
pub fn volume_change_pct(prev: f64, current: f64) -> Option<f64> {
    if prev == 0.0 {
        None
    } else {
        Some((current - prev) / prev * 100.0)
    }
}

/// Ratio of the volume at `i` to the mean over positions `[i + 1 - window, i]`.
///
/// Requires every volume in the window and a non-zero mean.
pub fn volume_ratio(volumes: &[Option<f64>], i: usize, window: usize) -> Option<f64> {
    if window == 0 || i >= volumes.len() || i + 1 < window {
        return None;
    }
    let sum = volumes[i + 1 - window..=i]
        .iter()
        .try_fold(0.0, |acc, v| v.map(|x| acc + x))?;
    let mean = sum / window as f64;
    if mean == 0.0 {
        return None;
    }
    volumes[i].map(|current| current / mean)
}

/// Computes volume change, volume ratio and scaled volume.
///
/// The scaled figure is traded shares in units of `scale_divisor` (10^8 by
/// default). It stands in for turnover, which would need the outstanding
/// share count.
#[derive(Debug, Clone)]
pub struct VolumeAnalytics {
    ratio_window: usize,
    scale_divisor: f64,
    decimals: u32,
}

impl VolumeAnalytics {
    /// Create a calculator from configuration.
    pub fn new(config: &VolumeConfig, decimals: u32) -> Self {
        Self {
            ratio_window: config.ratio_window,
            scale_divisor: config.scale_divisor,
            decimals,
        }
    }

    /// Attach volume fields to every record of the series in place.
    pub fn apply(&self, series: &mut OrderedSeries) {
        let volumes: Vec<Option<f64>> = series.iter().map(|r| parse_opt(r.shares())).collect();
        let mut attached = 0usize;

        for (i, record) in series.records_mut().iter_mut().enumerate() {
            let derived = &mut record.derived;
            derived.volume_change_pct = None;
            derived.volume_ratio = None;
            derived.volume_hundred_million = None;

            let Some(current) = volumes[i] else {
                continue;
            };

            if i > 0 {
                if let Some(pct) = volumes[i - 1].and_then(|prev| volume_change_pct(prev, current)) {
                    derived.set(DerivedField::VolumeChangePct, round_to(pct, self.decimals));
                    attached += 1;
                }
            }

            if let Some(ratio) = volume_ratio(&volumes, i, self.ratio_window) {
                derived.set(DerivedField::VolumeRatio, round_to(ratio, self.decimals));
                attached += 1;
            }

            derived.set(
                DerivedField::VolumeHundredMillion,
                round_to(current / self.scale_divisor, self.decimals),
            );
            attached += 1;
        }

        debug!(records = series.len(), attached, "volume analytics computed");
    }
}

impl Default for VolumeAnalytics {
    fn default() -> Self {
        Self::new(&VolumeConfig::default(), 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use daybook_core::{MergedRecord, SourceKind};

    fn series(volumes: &[Option<&str>]) -> OrderedSeries {
        let records = volumes
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Duration::days(i as i64);
                let mut rec = MergedRecord::new("2330", date);
                if let Some(v) = v {
                    rec.write("shares", v.to_string(), SourceKind::Price);
                }
                rec
            })
            .collect();
        OrderedSeries::from_sorted(records).unwrap()
    }

    #[test]
    fn test_ratio_over_five_positions() {
        let mut s = series(&[
            Some("10,000,000"),
            Some("20,000,000"),
            Some("30,000,000"),
            Some("40,000,000"),
            Some("50,000,000"),
        ]);
        VolumeAnalytics::default().apply(&mut s);

        for rec in &s.records()[..4] {
            assert!(rec.derived.volume_ratio.is_none());
        }
        // 50 / mean(10, 20, 30, 40, 50) = 50 / 30
        assert_relative_eq!(s.records()[4].derived.volume_ratio.unwrap(), 1.67);
    }

    #[test]
    fn test_ratio_requires_full_window() {
        let mut s = series(&[Some("10"), None, Some("30"), Some("40"), Some("50"), Some("60")]);
        VolumeAnalytics::default().apply(&mut s);
        assert!(s.records()[4].derived.volume_ratio.is_none());
        // Window 1..=5 still contains the gap.
        assert!(s.records()[5].derived.volume_ratio.is_none());
    }

    #[test]
    fn test_ratio_zero_mean() {
        let volumes = [Some(0.0); 5];
        assert!(volume_ratio(&volumes, 4, 5).is_none());
    }

    #[test]
    fn test_volume_change() {
        let mut s = series(&[Some("1,000"), Some("1,500"), Some("abc"), Some("900"), Some("0"), Some("10")]);
        VolumeAnalytics::default().apply(&mut s);
        let r = s.records();
        assert!(r[0].derived.volume_change_pct.is_none());
        assert_relative_eq!(r[1].derived.volume_change_pct.unwrap(), 50.0);
        assert!(r[2].derived.volume_change_pct.is_none());
        // Previous volume unparseable.
        assert!(r[3].derived.volume_change_pct.is_none());
        assert_relative_eq!(r[4].derived.volume_change_pct.unwrap(), -100.0);
        // Previous volume zero.
        assert!(r[5].derived.volume_change_pct.is_none());
    }

    #[test]
    fn test_scaled_volume() {
        let mut s = series(&[Some("123,456,789"), Some("x"), None]);
        VolumeAnalytics::default().apply(&mut s);
        assert_relative_eq!(s.records()[0].derived.volume_hundred_million.unwrap(), 1.23);
        assert!(s.records()[1].derived.volume_hundred_million.is_none());
        assert!(s.records()[2].derived.volume_hundred_million.is_none());
    }

    #[test]
    fn test_custom_window() {
        let config = VolumeConfig {
            enabled: true,
            ratio_window: 2,
            scale_divisor: 1e3,
        };
        let mut s = series(&[Some("100"), Some("300")]);
        VolumeAnalytics::new(&config, 3).apply(&mut s);
        assert_relative_eq!(s.records()[1].derived.volume_ratio.unwrap(), 1.5);
        assert_relative_eq!(s.records()[1].derived.volume_hundred_million.unwrap(), 0.3);
    }

    #[test]
    fn test_failures_are_independent() {
        // Ratio undefined (short history) but change and scaled volume still attach.
        let mut s = series(&[Some("100"), Some("200")]);
        VolumeAnalytics::default().apply(&mut s);
        let d = &s.records()[1].derived;
        assert!(d.volume_ratio.is_none());
        assert_relative_eq!(d.volume_change_pct.unwrap(), 100.0);
        assert!(d.volume_hundred_million.is_some());
    }
}
