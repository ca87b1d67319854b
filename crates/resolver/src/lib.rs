//! Identifier to stream URL resolution: cache first, headless browser on
//! a miss, result persisted under the current cache epoch.

pub mod assemble;
pub mod error;
pub mod resolver;

pub use {
    assemble::{ResolutionResult, assemble},
    error::ResolveError,
    resolver::{CachePolicy, ResolveOutcome, Source, StreamResolver},
};
