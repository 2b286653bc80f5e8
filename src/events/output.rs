//! Events in the shape they are sent to the events endpoint.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    events::{CustomEvent, FeatureRequestEvent},
    EvaluationReason, FilteredUser, Result,
};

/// An event in the outbound payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutputEvent {
    /// Full user record, sent in place of the identify call.
    Identify(IdentifyOutput),
    /// First sighting of a user in the current flush window.
    Index(IndexOutput),
    /// A tracked flag evaluation.
    Feature(FeatureOutput),
    /// A flag evaluation reported because the flag is in its debug window.
    Debug(FeatureOutput),
    /// An application-defined event.
    Custom(CustomOutput),
    /// Per-flag counters for the flush window.
    Summary(SummaryOutput),
}

/// How the user is attached to an output event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventUser {
    /// The whole (filtered) user is embedded.
    #[serde(rename = "user")]
    Inline(FilteredUser),
    /// Only the key is sent; the user record is delivered by an index event.
    #[serde(rename = "userKey")]
    Key(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct IdentifyOutput {
    pub creation_date: i64,
    pub key: String,
    pub user: FilteredUser,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct IndexOutput {
    pub creation_date: i64,
    pub user: FilteredUser,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FeatureOutput {
    pub creation_date: i64,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<EvaluationReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prereq_of: Option<String>,
    #[serde(flatten)]
    pub user: EventUser,
}

impl FeatureOutput {
    pub(crate) fn new(
        event: &FeatureRequestEvent,
        creation_date: i64,
        user: EventUser,
    ) -> FeatureOutput {
        FeatureOutput {
            creation_date,
            key: event.key.clone(),
            version: event.version,
            variation: event.variation,
            value: event.value.clone(),
            default: event.default.clone(),
            reason: event.reason.clone(),
            prereq_of: event.prereq_of.clone(),
            user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct CustomOutput {
    pub creation_date: i64,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(flatten)]
    pub user: EventUser,
}

impl CustomOutput {
    pub(crate) fn new(event: CustomEvent, creation_date: i64, user: EventUser) -> CustomOutput {
        CustomOutput {
            creation_date,
            key: event.key,
            data: event.data,
            user,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SummaryOutput {
    pub start_date: i64,
    pub end_date: i64,
    pub features: BTreeMap<String, FlagSummary>,
}

/// Counters of a single flag within a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagSummary {
    /// Default value of the last evaluation seen for this flag.
    pub default: serde_json::Value,
    /// One counter per distinct (version, variation, value).
    pub counters: Vec<FlagCounter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(missing_docs)]
pub struct FlagCounter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variation: Option<usize>,
    pub value: serde_json::Value,
    pub count: u64,
    /// Set when the flag was not found during evaluation.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unknown: bool,
}

/// Events collected during one flush window, ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushPayload {
    events: Vec<OutputEvent>,
}

impl FlushPayload {
    pub(crate) fn new(events: Vec<OutputEvent>) -> FlushPayload {
        FlushPayload { events }
    }

    /// Events in the order they will be sent.
    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialize the payload as a JSON array.
    ///
    /// An event that fails to serialize is logged and left out; the rest of the payload is still
    /// serialized.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let events = self
            .events
            .iter()
            .filter_map(|event| match serde_json::to_value(event) {
                Ok(value) => Some(value),
                Err(err) => {
                    log::warn!(target: "flag_events", "dropping event that failed to serialize: {err:?}");
                    None
                }
            })
            .collect::<Vec<_>>();

        Ok(serde_json::to_vec(&events)?)
    }
}
