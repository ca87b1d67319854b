//! HTTP surface for stream resolution.
//!
//! `POST /` (or `/api/stream`) with `{"id": "..."}` answers
//! `{"source": <manifest>, "subtitle": [...]}`.

pub mod error;
pub mod handlers;
pub mod server;

pub use server::{AppState, build_app, start_gateway};
