// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations, one module per entity.

pub mod connections;
pub mod conversations;
pub mod jobs;
pub mod leads;
pub mod messages;
