//! Transport-agnostic RPC subsystem.
//!
//! Compact word-aligned messages addressed to named resources.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      RPC Stack                             │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ Transport │──▶│  Codec   │──▶│  Engine (postman)     │  │
//! │  │ (trait)   │   │ (framing)│   │  → Resource handlers  │  │
//! │  └───────────┘   └──────────┘   └───────────────────────┘  │
//! │       ▲                                    │               │
//! │       └──────────── SerialLink ◀───────────┘               │
//! │                                                            │
//! │  Pack (value codec) · Auth (HMAC envelope) · Client        │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod engine;
pub mod pack;
pub mod transport;
pub mod value;
