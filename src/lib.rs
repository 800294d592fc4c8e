#![doc = include_str!("../README.md")]

pub mod cli;
pub mod error;
pub mod log;
pub mod runtime;
pub mod selectors;
pub mod tools;

pub use error::{FetchError, Result};
pub use tools::extract::{select, summarize, PageSummary};
pub use tools::fetch::{
    capabilities, fetch, fetch_blocking, FetchOutcome, FetchRequest, FetchResponse, Orchestrator,
    Tier, TierConfig,
};
