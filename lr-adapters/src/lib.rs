//! Telemetry providers for LapReplay

pub mod demo;
pub mod session_file;

pub use demo::DemoProvider;
pub use session_file::{SessionCache, SessionFile, SessionFileProvider, SessionFormat};
