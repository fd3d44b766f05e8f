//! ekfsim Runner Library
//!
//! Exposes the session, link, launcher and run loop for integration testing.

pub mod cli;
pub mod launch;
pub mod link;
pub mod runner;
pub mod session;
