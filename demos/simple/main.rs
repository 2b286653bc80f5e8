use serde_json::json;

use flag_events::{
    events::{CustomEvent, FeatureRequestEvent, IdentifyEvent},
    EventsConfig, FlagInfo, User,
};

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("flag_events=debug"))
        .init();

    let sdk_key = std::env::var("SDK_KEY").unwrap();
    let mut config = EventsConfig::from_sdk_key(sdk_key).private_attribute_names(["email"]);
    if let Ok(events_uri) = std::env::var("EVENTS_URI") {
        config = config.events_uri(events_uri);
    }

    // Start the background worker delivering events.
    let processor = config.start_processor().unwrap();

    let mut user = User::new("test-user");
    user.email = Some("test@example.com".into());
    processor.submit(IdentifyEvent::new(user.clone()).into());

    // Report an evaluation, as the evaluation engine would.
    let flag = FlagInfo {
        key: "a-boolean-flag".to_owned(),
        version: 1,
        track_events: true,
        debug_events_until_date: None,
    };
    processor.submit(
        FeatureRequestEvent::new(&flag, user.clone(), Some(0), json!(true), Some(json!(false)), None)
            .into(),
    );

    processor.submit(
        CustomEvent::new("checkout", user)
            .with_data(json!({"total": 42}))
            .into(),
    );

    // Deliver everything before exiting.
    processor.stop();
    println!("Dropped events: {}", processor.dropped_event_count());
}
