//! Snapshot of all flag values for one user, used to bootstrap front-end clients.
use std::collections::BTreeMap;

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::{events::now_millis, EvaluationReason};

/// Flag metadata the event pipeline needs from the evaluation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagInfo {
    /// Flag key.
    pub key: String,
    /// Flag version.
    pub version: u64,
    /// Send a full feature event for every evaluation of this flag.
    pub track_events: bool,
    /// Send debug events for this flag until this time (epoch milliseconds).
    pub debug_events_until_date: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct FlagMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    variation: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<EvaluationReason>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    track_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_events_until_date: Option<i64>,
}

/// Values of all flags for a specific user at the time the state was recorded.
///
/// Serializing it produces the structure expected by JavaScript clients for bootstrapping: an
/// object of flag key to value, plus `$flagsState` with per-flag metadata and `$valid`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFlagsState {
    values: BTreeMap<String, serde_json::Value>,
    metadata: BTreeMap<String, FlagMetadata>,
    valid: bool,
}

impl FeatureFlagsState {
    /// Create an empty state. `valid` is `false` if the state could not be computed (e.g., the
    /// client was offline or no user was provided).
    pub fn new(valid: bool) -> FeatureFlagsState {
        FeatureFlagsState {
            values: BTreeMap::new(),
            metadata: BTreeMap::new(),
            valid,
        }
    }

    /// Record the result of evaluating `flag`.
    ///
    /// If `details_only_if_tracked` is set, version and reason are omitted for flags that are
    /// neither tracked nor in their debug window.
    pub fn add_flag(
        &mut self,
        flag: &FlagInfo,
        value: serde_json::Value,
        variation: Option<usize>,
        reason: Option<EvaluationReason>,
        details_only_if_tracked: bool,
    ) {
        self.add_flag_at(
            flag,
            value,
            variation,
            reason,
            details_only_if_tracked,
            now_millis(),
        );
    }

    pub(crate) fn add_flag_at(
        &mut self,
        flag: &FlagInfo,
        value: serde_json::Value,
        variation: Option<usize>,
        reason: Option<EvaluationReason>,
        details_only_if_tracked: bool,
        now: i64,
    ) {
        let with_details = !details_only_if_tracked
            || flag.track_events
            || flag
                .debug_events_until_date
                .is_some_and(|until| until > now);

        self.values.insert(flag.key.clone(), value);
        self.metadata.insert(
            flag.key.clone(),
            FlagMetadata {
                variation,
                version: with_details.then_some(flag.version),
                reason: reason.filter(|_| with_details),
                track_events: flag.track_events,
                debug_events_until_date: flag.debug_events_until_date,
            },
        );
    }

    /// Returns `true` if this is a valid snapshot of flag values.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Value of a single flag, or `None` if there is no such flag.
    pub fn flag_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Flag key to flag value, without metadata.
    ///
    /// Use serialization of the whole state instead when bootstrapping a JavaScript client.
    pub fn values_map(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.values
    }
}

impl Serialize for FeatureFlagsState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 2))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("$flagsState", &self.metadata)?;
        map.serialize_entry("$valid", &self.valid)?;
        map.end()
    }
}
