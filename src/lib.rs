//! Analytics event pipeline for feature flag SDKs.
//!
//! # Overview
//!
//! Application threads report flag evaluations, user identifications and custom events to an
//! [`EventProcessor`](events::processor::EventProcessor). A background worker turns them into a
//! compact payload and periodically delivers it to the events endpoint:
//!
//! - users are stripped of private attributes by a [`UserFilter`];
//! - each user is reported once per flush window through an index event;
//! - flag evaluations are folded into per-flag counters, so untracked evaluations cost a counter
//!   increment rather than an event;
//! - flags in their debug window additionally produce verbose debug events, with expiry decided
//!   against the server clock.
//!
//! Use [`EventsConfig`] to configure and start a processor:
//!
//! ```no_run
//! # use flag_events::{events::{CustomEvent, IdentifyEvent}, EventsConfig, User};
//! let processor = EventsConfig::from_sdk_key("sdk-key").start_processor().unwrap();
//!
//! let user = User::new("user-key");
//! processor.submit(IdentifyEvent::new(user.clone()).into());
//! processor.submit(CustomEvent::new("checkout", user).into());
//!
//! processor.stop();
//! ```
//!
//! [`FeatureFlagsState`] is a companion snapshot of all flag values for a user, used to bootstrap
//! front-end clients.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. They are only returned while setting up the
//! pipeline. Once running, delivery failures are retried or dropped and logged, and never reach
//! the code submitting events.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages, with
//! the `flag_events` target. Consider integrating a `log`-compatible logger implementation for
//! better visibility into event delivery.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

pub mod events;

mod config;
mod error;
mod flags_state;
mod reason;
mod user;
mod user_filter;

pub use config::EventsConfig;
pub use error::{Error, Result};
pub use flags_state::{FeatureFlagsState, FlagInfo};
pub use reason::{EvaluationErrorKind, EvaluationReason};
pub use user::{AttributeValue, User};
pub use user_filter::{FilteredUser, UserFilter};
