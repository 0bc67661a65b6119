//! Outgoing HTTP for recipe pages.
//!
//! All page fetches go through an [`HttpClient`] so the parse flow can be
//! exercised against canned pages in tests.

mod client;
mod rate_limiter;

pub use client::{FetchClient, FetchClientBuilder, HttpClient, MockClient, MockResponse};
pub use rate_limiter::RateLimiter;
