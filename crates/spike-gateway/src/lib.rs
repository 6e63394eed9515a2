//! # spike-gateway
//!
//! Client for the hosted payment gateway.
//!
//! ## Calls
//! - POST /auth/token: client-credential login, cached until shortly before expiry
//! - POST /invoice: create a hosted invoice and get its payment link
//! - GET /payment/{id}: authoritative payment status
//!
//! The policy layer only sees the [`PaymentGateway`] trait; tests swap in a
//! fake implementation.

pub mod client;
pub mod config;
pub mod error;
pub mod token_cache;
pub mod types;

pub use client::{HttpPaymentGateway, PaymentGateway};
pub use config::GatewayOptions;
pub use error::GatewayError;
pub use token_cache::TokenCache;
pub use types::*;
