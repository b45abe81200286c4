mod generate;
mod health;
mod metrics;

pub use generate::{REQUEST_ID_HEADER, generate_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
