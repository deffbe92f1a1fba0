pub mod call_gate;
pub mod rate_limiter;

pub use call_gate::{CallGate, ExternalCall};
pub use rate_limiter::{RateLimitSettings, RateLimiter, RateLimiterStats};
