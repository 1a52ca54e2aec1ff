// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for Prometheus metric keys
pub const HTTP_REQUESTS: &str = "http.requests";
pub const RATE_LIMIT_ADMITTED: &str = "rate_limit.admitted";
pub const RATE_LIMIT_REJECTED: &str = "rate_limit.rejected";
pub const RATE_LIMIT_CLIENTS: &str = "rate_limit.clients";
pub const ACTIVATION_ISSUED: &str = "activation.issued";
pub const ACTIVATION_VERIFIED: &str = "activation.verified";
pub const AUTH_FAILED: &str = "auth.failed";
pub const UPDATE_ACCEPTED: &str = "update.accepted";
pub const UPDATE_CONFLICT: &str = "update.conflict";
pub const MAIL_DELIVERED: &str = "mail.delivered";
pub const MAIL_FAILED: &str = "mail.failed";
