// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Inlet integration tests.
//!
//! A tempdir-backed database harness with tenant/connection seeding,
//! signed provider payload fixtures, and a scriptable mock channel
//! adapter.

pub mod fixtures;
pub mod harness;
pub mod mock_channel;

pub use harness::{ConnectionSeed, TestDb};
pub use mock_channel::MockAdapter;
