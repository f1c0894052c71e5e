//! Staticize
//!
//! Route-aware HTTP response caching for axum. Responses are stored in an
//! in-memory or Redis backend and replayed for matching requests until their
//! route's TTL runs out.

use shadow_rs::shadow;
shadow!(build);

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routing;
pub mod server;
mod staticize;

pub use staticize::Staticize;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
