pub mod pipeline;
pub mod xsol_metrics;

pub use pipeline::PipelineService;
pub use xsol_metrics::XsolMetricsService;
