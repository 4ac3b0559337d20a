//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - A transport that falls back from an HTTP client to `curl`, proxies disabled
//! - A single-file cache of the last result
//! - IP geolocation raced across two providers
//! - Current weather with sequential provider failover
//! - The run pipeline tying them together
//!
//! It is used by `nowcast-cli`, but can also be reused by other binaries.

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod net;
pub mod provider;

pub use app::{App, Request};
pub use cache::CacheStore;
pub use config::{Config, Endpoints};
pub use error::{
    CacheError, FetchFailure, LocationError, NetworkError, RunError, Stage, WeatherError,
};
pub use location::{LocationResolver, LocationSource};
pub use model::{CacheRecord, ResolvedLocation, Summary, WeatherReport};
pub use net::{CommandFetcher, FetchRequest, Fetcher, HttpFetcher, Transport};
pub use provider::{ProviderId, WeatherResolver};
