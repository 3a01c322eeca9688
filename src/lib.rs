//! Link-to-file download service.
//!
//! Chat messages and button presses arrive over HTTP from a messaging bridge.
//! Links are parked behind short-lived tokens, the chosen variant is queued,
//! and a fixed pool of workers runs `yt-dlp` and sends the result back.

pub mod app;
pub mod common;
pub mod config;
pub mod docs;
pub mod infrastructure;
pub mod modules;
pub mod routes;
pub mod state;
pub mod workers;
