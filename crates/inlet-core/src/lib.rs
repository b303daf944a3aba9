// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Inlet message ingestion service.
//!
//! This crate provides the error type, the canonical channel-agnostic
//! message types, and the [`ChannelAdapter`] trait that each messaging
//! provider crate implements. Everything downstream of the provider wire
//! formats speaks in these types.

pub mod channel;
pub mod error;
pub mod signature;
pub mod text;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use channel::{ChannelAdapter, NormalizedBatch, WebhookHeaders};
pub use error::InletError;
pub use types::{
    ChannelContext, ChannelKind, ConversationStatus, DeliveryState, DeliveryStatus,
    InboundMessage, JobType, MessageKind, SenderKind, SenderProfile,
};
