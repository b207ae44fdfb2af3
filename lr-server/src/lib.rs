//! LapReplay Server Library
//!
//! Exposes server components for integration testing.

pub mod api;
pub mod replay;
pub mod state;
pub mod ticker;
