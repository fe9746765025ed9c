//! # dbus-controller Test Suite
//!
//! Cross-crate scenarios run against the in-memory bus connection.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (filter matching, dispatch)
//! └── src/
//!     └── integration/  # Pool + signal hub + explorer + runtime flows
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p dc-tests
//!
//! # One area
//! cargo test -p dc-tests integration::signal_flows
//!
//! # Benchmarks
//! cargo bench -p dc-tests
//! ```

pub mod integration;
