//! Derived metrics: yield-token pricing and protocol-level figures

pub mod protocol;
pub mod yield_metrics;

pub use protocol::{MetricsSource, ProtocolDerived, ProtocolInputs, XsolMetrics};
pub use yield_metrics::{
    apply_analytics, days_to_maturity, days_to_maturity_str, expected_points_per_day,
    expected_recovery_yield, total_expected_points, years_to_maturity, yt_metrics, yt_price,
    yt_price_at, YtMetrics,
};
