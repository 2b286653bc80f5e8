//! Analytics event pipeline.
//!
//! Events flow in one direction:
//!
//! ```text
//! producers ──submit──▶ EventProcessor inbox ──▶ worker thread
//!                                                  │
//!                                                  ├─ UserFilter      (privacy)
//!                                                  ├─ UserKeys        (index events)
//!                                                  ├─ EventSummarizer (per-flag counters)
//!                                                  └─ debug_window    (verbose debug events)
//!                                                  │
//!                                        Outbox ──flush──▶ FlushPayload ──▶ EventSender ──▶ HTTP
//! ```
//!
//! [`processor::DefaultEventProcessor`] wires everything together. The building blocks are public
//! so that SDKs that already own a background thread can drive an [`outbox::Outbox`] and an
//! [`delivery::EventSender`] themselves.

pub mod debug_window;
pub mod delivery;
pub mod event;
pub mod outbox;
pub mod output;
pub mod processor;
pub mod summarizer;
pub mod user_keys;

pub use event::{CustomEvent, Event, FeatureRequestEvent, IdentifyEvent};
pub use output::{EventUser, FlushPayload, OutputEvent};

/// Current local time in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
