//! Per-window event processing.
//!
//! [`Outbox`] owns all state that lives for one flush window: buffered output events, summary
//! counters, and the set of users already reported. It is not thread-safe and is meant to be
//! owned by a single worker.
use crate::{
    events::{
        debug_window,
        output::{CustomOutput, FeatureOutput, IdentifyOutput, IndexOutput},
        summarizer::EventSummarizer,
        user_keys::UserKeys,
        Event, EventUser, FlushPayload, IdentifyEvent, OutputEvent,
    },
    User, UserFilter,
};

/// Settings that shape the output of an [`Outbox`].
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Maximum number of output events buffered in one window.
    pub capacity: usize,
    /// Maximum number of user keys remembered for deduplication.
    pub user_keys_capacity: usize,
    /// Send full users in feature and custom events instead of user keys.
    pub inline_users_in_events: bool,
    /// Filter applied to every user before it is buffered.
    pub user_filter: UserFilter,
}

/// Accumulates output events for the current flush window.
pub struct Outbox {
    capacity: usize,
    inline_users: bool,
    user_filter: UserFilter,
    events: Vec<OutputEvent>,
    summarizer: EventSummarizer,
    user_keys: UserKeys,
    capacity_exceeded: bool,
}

impl Outbox {
    #[allow(missing_docs)]
    pub fn new(config: OutboxConfig) -> Outbox {
        Outbox {
            capacity: config.capacity,
            inline_users: config.inline_users_in_events,
            user_filter: config.user_filter,
            events: Vec::new(),
            summarizer: EventSummarizer::new(),
            user_keys: UserKeys::new(config.user_keys_capacity),
            capacity_exceeded: false,
        }
    }

    /// Process a single event.
    ///
    /// `creation_date` is the time the event was accepted and `effective_now` the time against
    /// which debug windows are checked (see [`debug_window::effective_now`]).
    ///
    /// Returns the number of output events dropped because the outbox is full.
    pub fn add_event(&mut self, event: Event, creation_date: i64, effective_now: i64) -> usize {
        let mut outputs = Vec::with_capacity(3);

        match event {
            Event::Identify(IdentifyEvent { user }) => {
                // The identify event itself carries the user record.
                self.user_keys.notice(&user.key_string());
                outputs.push(OutputEvent::Identify(IdentifyOutput {
                    creation_date,
                    key: user.key_string(),
                    user: self.user_filter.filter(&user),
                }));
            }
            Event::FeatureRequest(event) => {
                self.summarizer.summarize_event(&event, creation_date);

                let tracked = event.track_events;
                let debugging =
                    debug_window::is_debugging(event.debug_events_until_date, effective_now);

                if !(tracked && self.inline_users) {
                    outputs.extend(self.index_event(&event.user, creation_date));
                }
                if tracked {
                    let user = self.event_user(&event.user);
                    outputs.push(OutputEvent::Feature(FeatureOutput::new(
                        &event,
                        creation_date,
                        user,
                    )));
                }
                if debugging {
                    let user = EventUser::Inline(self.user_filter.filter(&event.user));
                    outputs.push(OutputEvent::Debug(FeatureOutput::new(
                        &event,
                        creation_date,
                        user,
                    )));
                }
            }
            Event::Custom(event) => {
                if !self.inline_users {
                    outputs.extend(self.index_event(&event.user, creation_date));
                }
                let user = self.event_user(&event.user);
                outputs.push(OutputEvent::Custom(CustomOutput::new(
                    event,
                    creation_date,
                    user,
                )));
            }
        }

        outputs
            .into_iter()
            .map(|output| self.push(output))
            .filter(|pushed| !pushed)
            .count()
    }

    /// Returns `true` if flushing now would produce a payload.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.summarizer.is_empty()
    }

    /// End the current window.
    ///
    /// Returns buffered events followed by the summary, or `None` if nothing happened in this
    /// window. Summary counters and known user keys are reset either way.
    pub fn take_payload(&mut self) -> Option<FlushPayload> {
        let mut events = std::mem::take(&mut self.events);
        if let Some(summary) = self.summarizer.take() {
            events.push(OutputEvent::Summary(summary));
        }
        self.user_keys.clear();
        self.capacity_exceeded = false;

        if events.is_empty() {
            None
        } else {
            Some(FlushPayload::new(events))
        }
    }

    fn push(&mut self, event: OutputEvent) -> bool {
        if self.events.len() >= self.capacity {
            if !self.capacity_exceeded {
                self.capacity_exceeded = true;
                log::warn!(target: "flag_events", capacity = self.capacity; "exceeded event queue capacity, increase capacity to avoid dropping events");
            }
            return false;
        }
        self.events.push(event);
        true
    }

    fn index_event(&mut self, user: &User, creation_date: i64) -> Option<OutputEvent> {
        if self.user_keys.notice(&user.key_string()) {
            return None;
        }
        Some(OutputEvent::Index(IndexOutput {
            creation_date,
            user: self.user_filter.filter(user),
        }))
    }

    fn event_user(&self, user: &User) -> EventUser {
        if self.inline_users {
            EventUser::Inline(self.user_filter.filter(user))
        } else {
            EventUser::Key(user.key_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::events::{CustomEvent, FeatureRequestEvent};

    const NOW: i64 = 1_000_000;

    fn outbox(inline_users_in_events: bool, all_attributes_private: bool) -> Outbox {
        Outbox::new(OutboxConfig {
            capacity: 100,
            user_keys_capacity: 100,
            inline_users_in_events,
            user_filter: UserFilter::new(all_attributes_private, []),
        })
    }

    fn user() -> User {
        User {
            name: Some("Red".into()),
            ..User::new("userkey")
        }
    }

    fn feature(track_events: bool, debug_events_until_date: Option<i64>) -> FeatureRequestEvent {
        FeatureRequestEvent {
            key: "flagkey".to_owned(),
            version: Some(11),
            variation: Some(1),
            value: json!("value"),
            default: None,
            user: user(),
            track_events,
            debug_events_until_date,
            reason: None,
            prereq_of: None,
        }
    }

    fn output(outbox: &mut Outbox) -> Vec<Value> {
        let payload = outbox.take_payload().expect("payload should not be empty");
        payload
            .events()
            .iter()
            .map(|event| serde_json::to_value(event).unwrap())
            .collect()
    }

    fn index(creation_date: i64, user: Value) -> Value {
        json!({"kind": "index", "creationDate": creation_date, "user": user})
    }

    fn feature_output(kind: &str, creation_date: i64, user: (&str, Value)) -> Value {
        let mut out = json!({
            "kind": kind,
            "creationDate": creation_date,
            "key": "flagkey",
            "version": 11,
            "variation": 1,
            "value": "value",
        });
        out[user.0] = user.1;
        out
    }

    fn kinds(events: &[Value]) -> Vec<&str> {
        events
            .iter()
            .map(|event| event["kind"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn identify_event_is_sent_with_user() {
        let mut outbox = outbox(false, false);

        outbox.add_event(IdentifyEvent::new(user()).into(), 100, NOW);

        assert_eq!(
            output(&mut outbox),
            vec![json!({
                "kind": "identify",
                "creationDate": 100,
                "key": "userkey",
                "user": {"key": "userkey", "name": "Red"},
            })]
        );
    }

    #[test]
    fn identify_event_filters_user() {
        let mut outbox = outbox(false, true);

        outbox.add_event(IdentifyEvent::new(user()).into(), 100, NOW);

        assert_eq!(
            output(&mut outbox)[0]["user"],
            json!({"key": "userkey", "privateAttrs": ["name"]})
        );
    }

    #[test]
    fn identify_event_suppresses_index_event() {
        let mut outbox = outbox(false, false);

        outbox.add_event(IdentifyEvent::new(user()).into(), 100, NOW);
        outbox.add_event(feature(true, None).into(), 101, NOW);

        assert_eq!(
            kinds(&output(&mut outbox)),
            vec!["identify", "feature", "summary"]
        );
    }

    #[test]
    fn tracked_feature_event_gets_index_event() {
        let mut outbox = outbox(false, false);

        outbox.add_event(feature(true, None).into(), 100, NOW);

        let events = output(&mut outbox);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], index(100, json!({"key": "userkey", "name": "Red"})));
        assert_eq!(
            events[1],
            feature_output("feature", 100, ("userKey", json!("userkey")))
        );
        assert_eq!(events[2]["kind"], "summary");
    }

    #[test]
    fn index_event_filters_user() {
        let mut outbox = outbox(false, true);

        outbox.add_event(feature(true, None).into(), 100, NOW);

        assert_eq!(
            output(&mut outbox)[0],
            index(100, json!({"key": "userkey", "privateAttrs": ["name"]}))
        );
    }

    #[test]
    fn inline_user_in_tracked_feature_event() {
        let mut outbox = outbox(true, false);

        outbox.add_event(feature(true, None).into(), 100, NOW);

        let events = output(&mut outbox);
        assert_eq!(kinds(&events), vec!["feature", "summary"]);
        assert_eq!(
            events[0],
            feature_output(
                "feature",
                100,
                ("user", json!({"key": "userkey", "name": "Red"}))
            )
        );
    }

    #[test]
    fn inline_user_is_filtered() {
        let mut outbox = outbox(true, true);

        outbox.add_event(feature(true, None).into(), 100, NOW);

        assert_eq!(
            output(&mut outbox)[0]["user"],
            json!({"key": "userkey", "privateAttrs": ["name"]})
        );
    }

    #[test]
    fn untracked_event_with_inline_users_still_gets_index_event() {
        let mut outbox = outbox(true, false);

        outbox.add_event(feature(false, None).into(), 100, NOW);

        let events = output(&mut outbox);
        assert_eq!(kinds(&events), vec!["index", "summary"]);
        assert_eq!(events[0], index(100, json!({"key": "userkey", "name": "Red"})));
    }

    #[test]
    fn debug_event_while_debug_window_is_open() {
        let mut outbox = outbox(false, false);

        outbox.add_event(feature(false, Some(NOW + 1)).into(), 100, NOW);

        let events = output(&mut outbox);
        assert_eq!(kinds(&events), vec!["index", "debug", "summary"]);
        assert_eq!(
            events[1],
            feature_output(
                "debug",
                100,
                ("user", json!({"key": "userkey", "name": "Red"}))
            )
        );
    }

    #[test]
    fn tracked_and_debugged_event_produces_both() {
        let mut outbox = outbox(false, false);

        outbox.add_event(feature(true, Some(NOW + 1)).into(), 100, NOW);

        let events = output(&mut outbox);
        assert_eq!(kinds(&events), vec!["index", "feature", "debug", "summary"]);
        assert_eq!(events[1]["userKey"], "userkey");
        assert_eq!(events[2]["user"]["key"], "userkey");
    }

    #[test]
    fn no_debug_event_after_debug_window() {
        let mut outbox = outbox(false, false);

        outbox.add_event(feature(false, Some(NOW)).into(), 100, NOW);

        assert_eq!(kinds(&output(&mut outbox)), vec!["index", "summary"]);
    }

    #[test]
    fn one_index_event_per_user() {
        let mut outbox = outbox(false, false);
        let second = FeatureRequestEvent {
            key: "flagkey2".to_owned(),
            version: Some(22),
            ..feature(true, None)
        };

        outbox.add_event(feature(true, None).into(), 100, NOW);
        outbox.add_event(second.into(), 101, NOW);

        assert_eq!(
            kinds(&output(&mut outbox)),
            vec!["index", "feature", "feature", "summary"]
        );
    }

    #[test]
    fn summarizes_untracked_events() {
        let mut outbox = outbox(false, false);
        let first = FeatureRequestEvent {
            key: "flagkey1".to_owned(),
            version: Some(11),
            variation: Some(1),
            value: json!("value1"),
            default: Some(json!("default1")),
            ..feature(false, None)
        };
        let second = FeatureRequestEvent {
            key: "flagkey2".to_owned(),
            version: Some(22),
            variation: Some(2),
            value: json!("value2"),
            default: Some(json!("default2")),
            ..feature(false, None)
        };

        outbox.add_event(first.into(), 100, NOW);
        outbox.add_event(second.into(), 200, NOW);

        let events = output(&mut outbox);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], index(100, json!({"key": "userkey", "name": "Red"})));
        assert_eq!(
            events[1],
            json!({
                "kind": "summary",
                "startDate": 100,
                "endDate": 200,
                "features": {
                    "flagkey1": {
                        "default": "default1",
                        "counters": [{"version": 11, "variation": 1, "value": "value1", "count": 1}],
                    },
                    "flagkey2": {
                        "default": "default2",
                        "counters": [{"version": 22, "variation": 2, "value": "value2", "count": 1}],
                    },
                },
            })
        );
    }

    #[test]
    fn custom_event_with_user_key() {
        let mut outbox = outbox(false, false);
        let event = CustomEvent::new("eventkey", user()).with_data(json!({"thing": "stuff"}));

        outbox.add_event(event.into(), 100, NOW);

        assert_eq!(
            output(&mut outbox),
            vec![
                index(100, json!({"key": "userkey", "name": "Red"})),
                json!({
                    "kind": "custom",
                    "creationDate": 100,
                    "key": "eventkey",
                    "data": {"thing": "stuff"},
                    "userKey": "userkey",
                }),
            ]
        );
    }

    #[test]
    fn custom_event_with_inline_filtered_user() {
        let mut outbox = outbox(true, true);

        outbox.add_event(CustomEvent::new("eventkey", user()).into(), 100, NOW);

        assert_eq!(
            output(&mut outbox),
            vec![json!({
                "kind": "custom",
                "creationDate": 100,
                "key": "eventkey",
                "user": {"key": "userkey", "privateAttrs": ["name"]},
            })]
        );
    }

    #[test]
    fn stringifies_user_attributes_in_every_event_kind() {
        let numeric_user = User {
            secondary: Some(2.0.into()),
            name: Some(9.0.into()),
            anonymous: Some(false),
            custom: [("age".to_owned(), json!(99))].into_iter().collect(),
            ..User::new(1.0)
        };
        let expected = json!({
            "key": "1",
            "secondary": "2",
            "name": "9",
            "anonymous": false,
            "custom": {"age": 99},
        });

        let mut keyed = outbox(false, false);
        keyed.add_event(
            FeatureRequestEvent {
                user: numeric_user.clone(),
                ..feature(true, None)
            }
            .into(),
            100,
            NOW,
        );
        assert_eq!(output(&mut keyed)[0]["user"], expected);

        let mut inline = outbox(true, false);
        inline.add_event(
            FeatureRequestEvent {
                user: numeric_user.clone(),
                ..feature(true, None)
            }
            .into(),
            100,
            NOW,
        );
        inline.add_event(CustomEvent::new("eventkey", numeric_user.clone()).into(), 101, NOW);
        inline.add_event(IdentifyEvent::new(numeric_user).into(), 102, NOW);
        let events = output(&mut inline);
        assert_eq!(kinds(&events), vec!["feature", "custom", "identify", "summary"]);
        assert_eq!(events[0]["user"], expected);
        assert_eq!(events[1]["user"], expected);
        assert_eq!(events[2]["user"], expected);
        assert_eq!(events[2]["key"], "1");
    }

    #[test]
    fn empty_window_has_no_payload() {
        let mut outbox = outbox(false, false);

        assert!(outbox.is_empty());
        assert!(outbox.take_payload().is_none());
    }

    #[test]
    fn flush_resets_user_keys_and_summary() {
        let mut outbox = outbox(false, false);
        outbox.add_event(feature(false, None).into(), 100, NOW);
        output(&mut outbox);

        outbox.add_event(feature(false, None).into(), 200, NOW);

        let events = output(&mut outbox);
        assert_eq!(kinds(&events), vec!["index", "summary"]);
        assert_eq!(events[1]["startDate"], 200);
        assert_eq!(events[1]["features"]["flagkey"]["counters"][0]["count"], 1);
    }

    #[test]
    fn drops_events_beyond_capacity_but_keeps_counting() {
        let mut outbox = Outbox::new(OutboxConfig {
            capacity: 2,
            user_keys_capacity: 100,
            inline_users_in_events: false,
            user_filter: UserFilter::default(),
        });

        assert_eq!(outbox.add_event(feature(true, None).into(), 100, NOW), 0);
        assert_eq!(outbox.add_event(feature(true, None).into(), 101, NOW), 1);

        let events = output(&mut outbox);
        assert_eq!(kinds(&events), vec!["index", "feature", "summary"]);
        assert_eq!(events[2]["features"]["flagkey"]["counters"][0]["count"], 2);
    }
}
