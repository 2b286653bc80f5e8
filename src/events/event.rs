use derive_more::From;

use crate::{EvaluationReason, FlagInfo, User};

/// An occurrence reported by the application or by the flag evaluation engine.
///
/// Events do not carry a timestamp: the processor stamps them when they are submitted.
#[derive(Debug, Clone, PartialEq, From)]
pub enum Event {
    /// The application identified a user.
    Identify(IdentifyEvent),
    /// A flag was evaluated for a user.
    FeatureRequest(FeatureRequestEvent),
    /// The application tracked a custom event.
    Custom(CustomEvent),
}

/// Reports a user.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifyEvent {
    #[allow(missing_docs)]
    pub user: User,
}

impl IdentifyEvent {
    #[allow(missing_docs)]
    pub fn new(user: User) -> IdentifyEvent {
        IdentifyEvent { user }
    }
}

/// A single flag evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequestEvent {
    /// Flag key.
    pub key: String,
    /// Flag version. `None` if the flag was not found.
    pub version: Option<u64>,
    /// Index of the variation served. `None` if the default value was served.
    pub variation: Option<usize>,
    /// Value served to the user.
    pub value: serde_json::Value,
    /// Default value supplied by the application.
    pub default: Option<serde_json::Value>,
    /// User the flag was evaluated for.
    pub user: User,
    /// Whether a full feature event should be sent for this evaluation.
    pub track_events: bool,
    /// Verbose debug events are sent until this time (epoch milliseconds).
    pub debug_events_until_date: Option<i64>,
    /// Why the flag evaluated to `value`, if requested.
    pub reason: Option<EvaluationReason>,
    /// Set when this flag was evaluated as a prerequisite of another flag.
    pub prereq_of: Option<String>,
}

impl FeatureRequestEvent {
    /// Create an evaluation event for a known flag.
    pub fn new(
        flag: &FlagInfo,
        user: User,
        variation: Option<usize>,
        value: serde_json::Value,
        default: Option<serde_json::Value>,
        reason: Option<EvaluationReason>,
    ) -> FeatureRequestEvent {
        FeatureRequestEvent {
            key: flag.key.clone(),
            version: Some(flag.version),
            variation,
            value,
            default,
            user,
            track_events: flag.track_events,
            debug_events_until_date: flag.debug_events_until_date,
            reason,
            prereq_of: None,
        }
    }

    /// Create an evaluation event for a flag that does not exist. Such evaluations are counted in
    /// summaries as `unknown`.
    pub fn unknown_flag(
        key: impl Into<String>,
        user: User,
        default: serde_json::Value,
        reason: Option<EvaluationReason>,
    ) -> FeatureRequestEvent {
        FeatureRequestEvent {
            key: key.into(),
            version: None,
            variation: None,
            value: default.clone(),
            default: Some(default),
            user,
            track_events: false,
            debug_events_until_date: None,
            reason,
            prereq_of: None,
        }
    }

    /// Mark this evaluation as a prerequisite of `flag_key`.
    pub fn with_prereq_of(mut self, flag_key: impl Into<String>) -> FeatureRequestEvent {
        self.prereq_of = Some(flag_key.into());
        self
    }
}

/// An application-defined event.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    /// Event key.
    pub key: String,
    #[allow(missing_docs)]
    pub user: User,
    /// Optional data attached to the event.
    pub data: Option<serde_json::Value>,
}

impl CustomEvent {
    #[allow(missing_docs)]
    pub fn new(key: impl Into<String>, user: User) -> CustomEvent {
        CustomEvent {
            key: key.into(),
            user,
            data: None,
        }
    }

    /// Attach data to the event.
    pub fn with_data(mut self, data: serde_json::Value) -> CustomEvent {
        self.data = Some(data);
        self
    }
}
