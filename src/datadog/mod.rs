pub mod client;
pub mod models;
pub mod retry;

pub use client::{AuthStyle, DatadogClient, RawResponse};
pub use retry::RetryPolicy;
