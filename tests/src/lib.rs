//! # Mediator Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs       # Shared messages, handlers and behaviors
//! │   └── integration/      # End-to-end dispatcher scenarios
//! │       ├── commands.rs
//! │       ├── pipeline.rs
//! │       ├── notifications.rs
//! │       ├── streams.rs
//! │       ├── scenarios.rs
//! │       └── telemetry.rs
//! └── benches/
//!     └── dispatch_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mediator-tests
//!
//! # By area
//! cargo test -p mediator-tests integration::pipeline::
//!
//! # Benchmarks
//! cargo bench -p mediator-tests
//! ```

#![allow(dead_code)]
