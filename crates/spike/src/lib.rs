// spike: live-stream access control
//
// Wires together crypto, cookies, the access context, the internal adapter,
// the signup rate limiter and the route handlers.

pub mod context;
pub mod cookies;
pub mod crypto;
pub mod internal_adapter;
pub mod middleware;
pub mod routes;
pub mod utils;

pub use context::AccessContext;
pub use internal_adapter::{AdapterError, ConcreteInternalAdapter, InternalAdapter};
pub use middleware::rate_limiter::{RateLimitDecision, RateLimiter};
pub use routes::session::{SessionState, resolve_session};
