//! Yield-token analytics
//!
//! Zero-coupon discounting applied to the quoted yields of a yield token:
//! price, time decay, upside/downside against the quoted range, net
//! recovery yield and points. Every function is pure and degrades to
//! `None` rather than failing; all time math is relative to one
//! `last_updated` shared by the whole batch.

use chrono::{DateTime, Utc};

use crate::domain::AssetRecord;
use crate::extract::format::{format_percentage, format_yt_price};
use crate::extract::normalizer::parse_maturity_text;

pub const DAYS_PER_YEAR: f64 = 365.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// One day as a fraction of a year
pub const ONE_DAY_YEARS: f64 = 1.0 / DAYS_PER_YEAR;
/// Points are quoted per $1 deposited
pub const DEPOSIT_UNIT_USD: f64 = 1.0;

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Fractional days from `last_updated` to `maturity`, floored at zero
pub fn days_to_maturity(maturity: DateTime<Utc>, last_updated: DateTime<Utc>) -> f64 {
    let secs = (maturity - last_updated).num_milliseconds() as f64 / 1000.0;
    (secs / SECONDS_PER_DAY).max(0.0)
}

/// String form; `None` when either timestamp does not parse
pub fn days_to_maturity_str(maturity: &str, last_updated: &str) -> Option<f64> {
    let maturity = parse_maturity_text(maturity)?;
    let last_updated = parse_maturity_text(last_updated)?;
    Some(days_to_maturity(maturity, last_updated))
}

/// Years to maturity on a 365-day year; negative once matured
pub fn years_to_maturity(maturity: DateTime<Utc>, last_updated: DateTime<Utc>) -> f64 {
    let secs = (maturity - last_updated).num_milliseconds() as f64 / 1000.0;
    secs / (SECONDS_PER_DAY * DAYS_PER_YEAR)
}

/// YT price for `years` remaining at an annual rate in percent:
/// `1 - (1 + r)^(-T)`, zero once `T <= 0`.
pub fn yt_price(years: f64, annual_rate_pct: f64) -> Option<f64> {
    if !years.is_finite() || !annual_rate_pct.is_finite() {
        return None;
    }
    if years <= 0.0 {
        return Some(0.0);
    }
    let base = 1.0 + annual_rate_pct / 100.0;
    if base <= 0.0 {
        return None;
    }
    finite(1.0 - base.powf(-years))
}

/// YT price at `maturity` as seen from `last_updated`
pub fn yt_price_at(maturity: DateTime<Utc>, annual_rate_pct: f64, last_updated: DateTime<Utc>) -> Option<f64> {
    yt_price(years_to_maturity(maturity, last_updated), annual_rate_pct)
}

/// `(a - b) / b * 100`, only for a positive base
fn pct_change(from: Option<f64>, to: Option<f64>) -> Option<f64> {
    match (from, to) {
        (Some(base), Some(value)) if base > 0.0 => finite((value - base) / base * 100.0),
        _ => None,
    }
}

/// Price-derived metrics for one instrument
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct YtMetrics {
    pub yt_price_current: Option<f64>,
    pub yt_price_lower: Option<f64>,
    pub yt_price_upper: Option<f64>,
    pub upside_potential: Option<f64>,
    pub downside_risk: Option<f64>,
    /// Change from today's price to the price with one day left, implied rate
    pub end_day_current_yield: Option<f64>,
    /// Same at the lower quoted rate: the worst-case end-day outcome
    pub end_day_lower_yield: Option<f64>,
    pub daily_decay_rate: Option<f64>,
}

impl YtMetrics {
    /// Matured: every metric is exactly zero
    pub fn zero() -> Self {
        Self {
            yt_price_current: Some(0.0),
            yt_price_lower: Some(0.0),
            yt_price_upper: Some(0.0),
            upside_potential: Some(0.0),
            downside_risk: Some(0.0),
            end_day_current_yield: Some(0.0),
            end_day_lower_yield: Some(0.0),
            daily_decay_rate: Some(0.0),
        }
    }

    /// Last day before maturity: the remaining value decays fully
    pub fn last_day() -> Self {
        Self {
            daily_decay_rate: Some(100.0),
            ..Self::zero()
        }
    }
}

/// Price, range and decay metrics.
///
/// Rates are annual percentages. Missing inputs leave the dependent
/// outputs `None`.
pub fn yt_metrics(
    maturity: DateTime<Utc>,
    implied_yield: Option<f64>,
    range_lower: Option<f64>,
    range_upper: Option<f64>,
    last_updated: DateTime<Utc>,
) -> YtMetrics {
    let years = years_to_maturity(maturity, last_updated);
    if !years.is_finite() {
        return YtMetrics::default();
    }
    if years <= 0.0 {
        return YtMetrics::zero();
    }
    if years <= ONE_DAY_YEARS {
        return YtMetrics::last_day();
    }

    let price = |rate: Option<f64>, t: f64| rate.and_then(|r| yt_price(t, r));

    let current = price(implied_yield, years);
    let lower = price(range_lower, years);
    let upper = price(range_upper, years);

    let upside = match (current, upper) {
        (Some(c), Some(u)) if c > 0.0 => finite((u - c) / c * 100.0),
        _ => None,
    };
    let downside = match (current, lower) {
        (Some(c), Some(l)) if c > 0.0 => finite((c - l) / c * 100.0),
        _ => None,
    };

    let tomorrow = price(implied_yield, years - ONE_DAY_YEARS);
    let decay = match (current, tomorrow) {
        (Some(today), Some(next)) if today > 0.0 => finite((today - next) / today * 100.0),
        _ => None,
    };

    YtMetrics {
        yt_price_current: current,
        yt_price_lower: lower,
        yt_price_upper: upper,
        upside_potential: upside,
        downside_risk: downside,
        end_day_current_yield: pct_change(current, price(implied_yield, ONE_DAY_YEARS)),
        end_day_lower_yield: pct_change(current, price(range_lower, ONE_DAY_YEARS)),
        daily_decay_rate: decay,
    }
}

/// Net yield recovered by holding to maturity, in percent.
///
/// `gross = leverage × ((1 + apy)^(1/365) − 1) × 365 × days/365 × 100`,
/// net of the platform's take rate.
pub fn expected_recovery_yield(leverage: f64, apy_pct: f64, days: f64, fee_rate: f64) -> Option<f64> {
    if days < 0.0 || !(0.0..1.0).contains(&fee_rate) {
        return None;
    }
    let base = 1.0 + apy_pct / 100.0;
    if base <= 0.0 {
        return None;
    }
    let daily = base.powf(1.0 / DAYS_PER_YEAR) - 1.0;
    let gross = leverage * daily * DAYS_PER_YEAR * (days / DAYS_PER_YEAR) * 100.0;
    finite(gross * (1.0 - fee_rate))
}

/// Points over the instrument's life for a $1 deposit
pub fn total_expected_points(leverage: f64, asset_boost: f64) -> Option<f64> {
    finite((leverage * asset_boost * DEPOSIT_UNIT_USD).round())
}

/// Daily points; `None` once no days remain
pub fn expected_points_per_day(total_points: f64, days: f64) -> Option<f64> {
    if days <= 0.0 {
        return None;
    }
    finite((total_points / days).round())
}

/// Fill every derived field of `record` and apply display rounding.
pub fn apply_analytics(mut record: AssetRecord, last_updated: DateTime<Utc>, fee_rate: f64) -> AssetRecord {
    let days = record.maturity.map(|m| days_to_maturity(m, last_updated));
    record.maturity_days = days.and_then(finite);

    if let Some(maturity) = record.maturity {
        let m = yt_metrics(
            maturity,
            record.implied_yield,
            record.range_lower,
            record.range_upper,
            last_updated,
        );
        record.yt_price_current = m.yt_price_current;
        record.yt_price_lower = m.yt_price_lower;
        record.yt_price_upper = m.yt_price_upper;
        record.upside_potential = m.upside_potential;
        record.downside_risk = m.downside_risk;
        record.end_day_current_yield = m.end_day_current_yield;
        record.end_day_lower_yield = m.end_day_lower_yield;
        record.daily_decay_rate = m.daily_decay_rate;
    }

    // Matured or inside the last day: nothing left to earn
    let expiring = record
        .maturity
        .is_some_and(|m| years_to_maturity(m, last_updated) <= ONE_DAY_YEARS);
    if expiring {
        record.expected_recovery_yield = Some(0.0);
        record.total_expected_points = Some(0.0);
        record.expected_points_per_day = Some(0.0);
        return round_for_display(record);
    }

    record.expected_recovery_yield = match (record.leverage, record.apy, record.maturity_days) {
        (Some(lev), Some(apy), Some(days)) => expected_recovery_yield(lev, apy, days, fee_rate),
        _ => None,
    };

    record.total_expected_points = match (record.leverage, record.asset_boost) {
        (Some(lev), Some(boost)) => total_expected_points(lev, boost),
        _ => None,
    };
    record.expected_points_per_day = match (record.total_expected_points, record.maturity_days) {
        (Some(total), Some(days)) => expected_points_per_day(total, days),
        _ => None,
    };

    round_for_display(record)
}

fn round_for_display(mut r: AssetRecord) -> AssetRecord {
    r.yt_price_current = format_yt_price(r.yt_price_current);
    r.yt_price_lower = format_yt_price(r.yt_price_lower);
    r.yt_price_upper = format_yt_price(r.yt_price_upper);

    r.upside_potential = format_percentage(r.upside_potential);
    r.downside_risk = format_percentage(r.downside_risk);
    r.end_day_current_yield = format_percentage(r.end_day_current_yield);
    r.end_day_lower_yield = format_percentage(r.end_day_lower_yield);
    r.daily_decay_rate = format_percentage(r.daily_decay_rate);
    r.expected_recovery_yield = format_percentage(r.expected_recovery_yield);
    r.maturity_days = format_percentage(r.maturity_days);
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Source;
    use chrono::{Duration, TimeZone};

    fn lu() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 5, 0, 0, 0).unwrap()
    }

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_days_to_maturity() {
        let m = lu() + Duration::days(23) + Duration::hours(10);
        assert!(approx(days_to_maturity(m, lu()), 23.4167, 1e-4));
        assert_eq!(days_to_maturity(lu() + Duration::days(23), lu()), 23.0);
        assert_eq!(days_to_maturity(lu() - Duration::days(1), lu()), 0.0);
        assert_eq!(days_to_maturity(lu(), lu()), 0.0);
    }

    #[test]
    fn test_days_to_maturity_str() {
        assert_eq!(
            days_to_maturity_str("2025-11-28T00:00:00Z", "2025-11-05T00:00:00Z"),
            Some(23.0)
        );
        assert_eq!(days_to_maturity_str("not a date", "2025-11-05T00:00:00Z"), None);
        assert_eq!(days_to_maturity_str("2025-11-28", "garbage"), None);
    }

    #[test]
    fn test_yt_price_formula() {
        // 1 - 1.1^-1
        assert!(approx(yt_price(1.0, 10.0).unwrap(), 1.0 - 1.0 / 1.1, 1e-12));
        assert_eq!(yt_price(0.0, 10.0), Some(0.0));
        assert_eq!(yt_price(-0.5, 10.0), Some(0.0));
        assert_eq!(yt_price(1.0, -150.0), None);
        assert_eq!(yt_price(f64::NAN, 10.0), None);
    }

    #[test]
    fn test_yt_price_monotonic() {
        let mut prev = 0.0;
        for step in 1..=50 {
            let p = yt_price(step as f64 / 50.0, 20.0).unwrap();
            assert!(p > prev);
            prev = p;
        }
        let mut prev = 0.0;
        for rate in [1.0, 5.0, 10.0, 50.0, 100.0, 500.0] {
            let p = yt_price(0.25, rate).unwrap();
            assert!(p > prev);
            prev = p;
        }
    }

    #[test]
    fn test_matured_is_all_zero() {
        for offset in [0, 1, 100] {
            let m = yt_metrics(lu() - Duration::days(offset), Some(62.0), Some(10.0), Some(90.0), lu());
            assert_eq!(m, YtMetrics::zero());
        }
        // Zero even without any quoted rate
        assert_eq!(yt_metrics(lu(), None, None, None, lu()), YtMetrics::zero());
    }

    #[test]
    fn test_last_day_short_circuit() {
        let m = yt_metrics(lu() + Duration::hours(12), Some(62.0), Some(10.0), Some(90.0), lu());
        assert_eq!(m.daily_decay_rate, Some(100.0));
        assert_eq!(m.end_day_lower_yield, Some(0.0));
        assert_eq!(m.yt_price_current, Some(0.0));
        assert_eq!(m.upside_potential, Some(0.0));
    }

    #[test]
    fn test_metrics_scenario() {
        let maturity = Utc.with_ymd_and_hms(2025, 11, 28, 0, 0, 0).unwrap();
        let m = yt_metrics(maturity, Some(62.115), Some(10.0), Some(90.0), lu());
        let t = 23.0 / 365.0;

        let current = 1.0 - 1.62115f64.powf(-t);
        let lower = 1.0 - 1.1f64.powf(-t);
        let upper = 1.0 - 1.9f64.powf(-t);
        assert!(approx(m.yt_price_current.unwrap(), current, 1e-12));
        assert!(approx(m.yt_price_lower.unwrap(), lower, 1e-12));
        assert!(approx(m.yt_price_upper.unwrap(), upper, 1e-12));
        assert!(approx(m.upside_potential.unwrap(), (upper - current) / current * 100.0, 1e-9));
        assert!(approx(m.downside_risk.unwrap(), (current - lower) / current * 100.0, 1e-9));

        let tomorrow = 1.0 - 1.62115f64.powf(-(t - 1.0 / 365.0));
        assert!(approx(m.daily_decay_rate.unwrap(), (current - tomorrow) / current * 100.0, 1e-9));
        // Roughly 1/23 of the value goes each day
        assert!(m.daily_decay_rate.unwrap() > 4.0 && m.daily_decay_rate.unwrap() < 5.0);

        // Lower rate on the last day is the worst case
        assert!(m.end_day_lower_yield.unwrap() < m.end_day_current_yield.unwrap());
        assert!(m.end_day_lower_yield.unwrap() > -100.0);
    }

    #[test]
    fn test_missing_rates_stay_none() {
        let maturity = lu() + Duration::days(30);
        let m = yt_metrics(maturity, Some(20.0), None, None, lu());
        assert!(m.yt_price_current.is_some());
        assert!(m.daily_decay_rate.is_some());
        assert_eq!(m.yt_price_lower, None);
        assert_eq!(m.upside_potential, None);
        assert_eq!(m.downside_risk, None);
        assert_eq!(m.end_day_lower_yield, None);

        let m = yt_metrics(maturity, None, Some(10.0), Some(90.0), lu());
        assert_eq!(m.yt_price_current, None);
        assert!(m.yt_price_lower.is_some());
        assert_eq!(m.upside_potential, None);
    }

    #[test]
    fn test_recovery_yield() {
        let gross = 133.0 * (1.0786f64.powf(1.0 / 365.0) - 1.0) * 365.0 * (23.0 / 365.0) * 100.0;
        let net = expected_recovery_yield(133.0, 7.86, 23.0, 0.05).unwrap();
        assert!(approx(net, gross * 0.95, 1e-9));
        assert_eq!(expected_recovery_yield(133.0, 7.86, 0.0, 0.05), Some(0.0));
        assert_eq!(expected_recovery_yield(133.0, 7.86, 23.0, 1.5), None);
    }

    #[test]
    fn test_points() {
        assert_eq!(total_expected_points(133.0, 2.0), Some(266.0));
        assert_eq!(expected_points_per_day(266.0, 23.0), Some(12.0));
        assert_eq!(expected_points_per_day(266.0, 0.0), None);
    }

    #[test]
    fn test_apply_analytics_end_to_end() {
        let mut record = AssetRecord::new("xSOL-2511", "xSOL", Source::Ratex);
        record.maturity = Some(Utc.with_ymd_and_hms(2025, 11, 28, 0, 0, 0).unwrap());
        record.implied_yield = Some(62.115);
        record.range_lower = Some(10.0);
        record.range_upper = Some(90.0);
        record.leverage = Some(133.0);
        record.apy = Some(7.86);
        record.asset_boost = Some(2.0);

        let out = apply_analytics(record, lu(), Source::Ratex.fee_rate());
        assert_eq!(out.maturity_days, Some(23.0));
        assert_eq!(out.total_expected_points, Some(266.0));
        assert_eq!(out.expected_points_per_day, Some(12.0));

        let t = 23.0 / 365.0;
        let current = 1.0 - 1.62115f64.powf(-t);
        assert_eq!(out.yt_price_current, format_yt_price(Some(current)));
        assert!(out.yt_price_lower.is_some());
        assert!(out.yt_price_upper.is_some());
        assert!(out.expected_recovery_yield.unwrap() > 0.0);
    }

    #[test]
    fn test_apply_analytics_matured() {
        let mut record = AssetRecord::new("xSOL-2510", "xSOL", Source::Ratex);
        record.maturity = Some(lu() - Duration::days(3));
        record.leverage = Some(50.0);
        record.apy = Some(7.0);
        record.asset_boost = Some(1.0);

        let out = apply_analytics(record, lu(), 0.05);
        assert_eq!(out.maturity_days, Some(0.0));
        assert_eq!(out.yt_price_current, Some(0.0));
        assert_eq!(out.daily_decay_rate, Some(0.0));
        assert_eq!(out.expected_recovery_yield, Some(0.0));
        assert_eq!(out.total_expected_points, Some(0.0));
        assert_eq!(out.expected_points_per_day, Some(0.0));
    }

    #[test]
    fn test_apply_analytics_last_day() {
        let mut record = AssetRecord::new("xSOL-2511", "xSOL", Source::Ratex);
        record.maturity = Some(lu() + Duration::hours(12));
        record.implied_yield = Some(62.0);
        record.range_lower = Some(10.0);
        record.range_upper = Some(90.0);
        record.leverage = Some(50.0);
        record.apy = Some(7.0);
        record.asset_boost = Some(1.0);

        let out = apply_analytics(record, lu(), 0.05);
        assert_eq!(out.maturity_days, Some(0.5));
        assert_eq!(out.daily_decay_rate, Some(100.0));
        assert_eq!(out.yt_price_current, Some(0.0));
        assert_eq!(out.upside_potential, Some(0.0));
        assert_eq!(out.expected_recovery_yield, Some(0.0));
        assert_eq!(out.total_expected_points, Some(0.0));
        assert_eq!(out.expected_points_per_day, Some(0.0));
    }

    #[test]
    fn test_apply_analytics_without_maturity() {
        let mut record = AssetRecord::new("xSOL-2511", "xSOL", Source::Ratex);
        record.leverage = Some(133.0);
        record.apy = Some(7.86);
        let out = apply_analytics(record, lu(), 0.05);
        assert_eq!(out.maturity_days, None);
        assert_eq!(out.yt_price_current, None);
        assert_eq!(out.expected_recovery_yield, None);
    }
}
