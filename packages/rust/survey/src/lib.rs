//! Survey platform client and concurrent source fetching.
//!
//! This crate provides:
//! - [`SurveyClient`]: typed access to submission and form definition endpoints
//! - [`fetch_all`] / [`fetch_forms`]: parallel fan-out over many form ids with
//!   a per-source deadline and independent failure isolation

pub mod client;
pub mod fetch;

pub use client::SurveyClient;
pub use fetch::{FetchResult, fetch_all, fetch_forms};
