pub mod config;
pub mod errors;
pub mod lambda_error;
pub mod metrics;
pub mod retry;
pub mod telemetry;
pub mod tracing;

pub use config::*;
pub use errors::*;
pub use lambda_error::*;
pub use metrics::*;
pub use retry::*;
pub use telemetry::*;
pub use self::tracing::*;
