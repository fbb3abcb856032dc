//! Autofocus: linear focus order for a tree of independently mounted elements.
//!
//! Elements ("participants") mount into a [`Container`] at an order position,
//! either from an explicit hint or automatically after the previous
//! registration. The container then moves focus forward and backward through
//! that order, skipping participants that have no focus handler, and hands off
//! to caller-supplied boundary callbacks when the order is exhausted.
//!
//! # Quick Start
//!
//! - [`Container`] - the ordering and traversal engine
//! - [`Participant`] - an owned id for one mounted element
//! - [`FocusSource`] - how a participant's focus action is derived
//!
//! # Ordering
//!
//! An explicit hint `h` places a participant at key `h * 1024`
//! ([`order::HINT_SCALE`]). Participants mounted without a hint take the next
//! key after the most recently issued one, so unhinted elements mounted after
//! a hinted one sort directly behind it.

#![warn(missing_docs)]

/// Configuration.
pub mod config;
/// The focus-order engine.
mod container;
/// Traversal directions and legacy direction tokens.
pub mod direction;
/// Error types.
pub mod error;
/// Participant ids.
mod id;
/// Balanced ordered index over order keys.
pub mod index;
/// Order keys and their allocation.
pub mod order;
/// Participant handles.
mod participant;
/// Participant bookkeeping.
pub mod registry;
/// Focus handlers and focus sources.
pub mod source;

pub use config::FocusConfig;
pub use container::{Boundary, Container, ContainerBuilder, Continuation, OrderEntry, WeakContainer};
pub use direction::{Direction, DirectionArg};
pub use error::{Error, Result};
pub use id::ParticipantId;
pub use order::OrderKey;
pub use participant::Participant;
pub use source::{FocusHandler, FocusSource, Focusable, Target};
