//! Cross-cutting request processing: rate limiting, request validation,
//! client identification and response security headers.

pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use ip::ClientIp;
pub use rate_limit::EndpointRateLimiter;
