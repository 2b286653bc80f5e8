use std::time::Duration;

use crate::{
    events::{
        outbox::OutboxConfig,
        processor::{DefaultEventProcessor, EventProcessor, NullEventProcessor},
    },
    Result, UserFilter,
};

/// Configuration for the event pipeline.
///
/// # Examples
/// ```no_run
/// # use std::time::Duration;
/// # use flag_events::EventsConfig;
/// let processor = EventsConfig::from_sdk_key("sdk-key")
///     .flush_interval(Duration::from_secs(5))
///     .private_attribute_names(["email"])
///     .start_processor()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub(crate) sdk_key: String,
    pub(crate) events_uri: String,
    pub(crate) capacity: usize,
    pub(crate) flush_interval: Duration,
    pub(crate) user_keys_capacity: usize,
    pub(crate) inline_users_in_events: bool,
    pub(crate) all_attributes_private: bool,
    pub(crate) private_attribute_names: Vec<String>,
    pub(crate) send_events: bool,
    pub(crate) request_timeout: Duration,
    pub(crate) stop_timeout: Duration,
}

impl EventsConfig {
    /// Create a default configuration using the specified SDK key.
    ///
    /// ```
    /// # use flag_events::EventsConfig;
    /// EventsConfig::from_sdk_key("sdk-key");
    /// ```
    pub fn from_sdk_key(sdk_key: impl Into<String>) -> Self {
        EventsConfig {
            sdk_key: sdk_key.into(),
            events_uri: EventsConfig::DEFAULT_EVENTS_URI.to_owned(),
            capacity: EventsConfig::DEFAULT_CAPACITY,
            flush_interval: EventsConfig::DEFAULT_FLUSH_INTERVAL,
            user_keys_capacity: EventsConfig::DEFAULT_USER_KEYS_CAPACITY,
            inline_users_in_events: false,
            all_attributes_private: false,
            private_attribute_names: Vec::new(),
            send_events: true,
            request_timeout: EventsConfig::DEFAULT_REQUEST_TIMEOUT,
            stop_timeout: EventsConfig::DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Default base URI of the events endpoint.
    pub const DEFAULT_EVENTS_URI: &'static str = "https://events.launchdarkly.com";

    /// Override base URI of the events endpoint. Payloads are posted to `<events_uri>/bulk`.
    pub fn events_uri(mut self, events_uri: impl Into<String>) -> Self {
        self.events_uri = events_uri.into();
        self
    }

    /// Default [`capacity`](Self::capacity).
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Maximum number of events held in memory between flushes. Events over capacity are dropped.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Default [`flush_interval`](Self::flush_interval).
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

    /// How often buffered events are delivered.
    pub fn flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Default [`user_keys_capacity`](Self::user_keys_capacity).
    pub const DEFAULT_USER_KEYS_CAPACITY: usize = 1000;

    /// Number of user keys remembered per flush window to avoid sending duplicate index events.
    pub fn user_keys_capacity(mut self, user_keys_capacity: usize) -> Self {
        self.user_keys_capacity = user_keys_capacity;
        self
    }

    /// Send full user details in feature and custom events instead of user keys.
    pub fn inline_users_in_events(mut self, inline_users_in_events: bool) -> Self {
        self.inline_users_in_events = inline_users_in_events;
        self
    }

    /// Treat every user attribute except the key as private.
    pub fn all_attributes_private(mut self, all_attributes_private: bool) -> Self {
        self.all_attributes_private = all_attributes_private;
        self
    }

    /// Attribute names that are private for every user.
    pub fn private_attribute_names(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.private_attribute_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Turn event delivery on or off. When off, [`start_processor`](Self::start_processor)
    /// returns a processor that discards all events.
    pub fn send_events(mut self, send_events: bool) -> Self {
        self.send_events = send_events;
        self
    }

    /// Default [`request_timeout`](Self::request_timeout).
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Timeout of a single delivery request.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Default [`stop_timeout`](Self::stop_timeout).
    pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

    /// How long [`EventProcessor::stop`] waits for the final flush.
    pub fn stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Start an event processor using this configuration.
    ///
    /// ```
    /// # use flag_events::EventsConfig;
    /// let processor = EventsConfig::from_sdk_key("sdk-key")
    ///     .send_events(false)
    ///     .start_processor()
    ///     .unwrap();
    /// assert_eq!(processor.dropped_event_count(), 0);
    /// ```
    ///
    /// # Errors
    ///
    /// See [`DefaultEventProcessor::start`].
    pub fn start_processor(&self) -> Result<Box<dyn EventProcessor>> {
        if !self.send_events {
            return Ok(Box::new(NullEventProcessor));
        }
        Ok(Box::new(DefaultEventProcessor::start(self)?))
    }

    pub(crate) fn outbox_config(&self) -> OutboxConfig {
        OutboxConfig {
            capacity: self.capacity,
            user_keys_capacity: self.user_keys_capacity,
            inline_users_in_events: self.inline_users_in_events,
            user_filter: UserFilter::new(
                self.all_attributes_private,
                self.private_attribute_names.iter().cloned(),
            ),
        }
    }
}
