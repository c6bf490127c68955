//! # Shared Bus - Event Bus for Inter-Subsystem Communication
//!
//! All inter-subsystem communication flows over named subjects on this bus;
//! direct calls between subsystems' writers are forbidden.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Subsystem A  │                    │ Subsystem B  │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  │              │  subscribe() / durable group
//!                  └──────────────┘
//! ```
//!
//! ## Delivery Model
//!
//! - **Ephemeral subscriptions** ride a broadcast channel; slow consumers
//!   lag and drop, and must re-subscribe.
//! - **Durable groups** are named consumer groups backed by bounded queues
//!   with explicit ack. Exactly one member handles each message, one at a
//!   time per group; publish returns only after durable acceptance.
//! - **DLQ**: payloads a handler cannot decode are acked and forwarded to
//!   `dlq.<component>` with the original subject and the decode error.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod durable;
pub mod events;
pub mod message;
pub mod publisher;
pub mod subjects;
pub mod subscriber;

// Re-export main types
pub use durable::{Ack, BusHandler, DurableConfig, DurableSubscription, HandlerError};
pub use events::{BreakerTripEvent, ConfigChangedEvent, FillEvent, HaltCommand, OrderCommand};
pub use message::{BusMessage, DlqEnvelope};
pub use publisher::{BusError, EventPublisher, InMemoryEventBus};
pub use subjects::subject_matches;
pub use subscriber::Subscription;

/// Maximum events buffered per ephemeral subscriber before lag-drop.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Queue depth of each durable consumer group.
pub const DEFAULT_DURABLE_QUEUE_DEPTH: usize = 512;

/// Redeliveries before a nacked message is routed to the DLQ.
pub const DEFAULT_MAX_REDELIVERIES: u32 = 3;
