//! Delivery of flush payloads to the events endpoint.
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE, DATE, USER_AGENT},
    Url,
};

use crate::{events::FlushPayload, Error, EventsConfig, Result};

/// Version of the payload format understood by the events endpoint.
pub const EVENT_SCHEMA_VERSION: &str = "3";

const EVENT_SCHEMA_HEADER: &str = "X-LaunchDarkly-Event-Schema";

const BULK_ENDPOINT: &str = "/bulk";

const USER_AGENT_VALUE: &str = concat!("RustClient/", env!("CARGO_PKG_VERSION"));

/// Status and headers of an events endpoint response that matter for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw value of the `Date` header, if any.
    pub date: Option<String>,
}

/// Performs a single POST of a serialized payload.
///
/// Returns an error for transport-level failures (connection refused, timeout, etc.); any
/// received response, successful or not, is `Ok`.
pub trait EventTransport: Send {
    /// Send `body` to the events endpoint.
    fn post(&self, body: &[u8]) -> Result<TransportResponse>;
}

/// [`EventTransport`] over HTTP.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    url: Url,
    sdk_key: String,
}

impl HttpTransport {
    /// Create a transport posting to `<events_uri>/bulk`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEventsUri`] if the configured URI cannot be parsed.
    /// - [`Error::Network`] if the HTTP client cannot be initialized.
    pub fn new(config: &EventsConfig) -> Result<HttpTransport> {
        let url = Url::parse(&format!(
            "{}{}",
            config.events_uri.trim_end_matches('/'),
            BULK_ENDPOINT
        ))
        .map_err(Error::InvalidEventsUri)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(HttpTransport {
            client,
            url,
            sdk_key: config.sdk_key.clone(),
        })
    }
}

impl EventTransport for HttpTransport {
    fn post(&self, body: &[u8]) -> Result<TransportResponse> {
        let response = self
            .client
            .post(self.url.clone())
            .header(AUTHORIZATION, self.sdk_key.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(EVENT_SCHEMA_HEADER, EVENT_SCHEMA_VERSION)
            .body(body.to_vec())
            .send()?;

        let date = response
            .headers()
            .get(DATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(TransportResponse {
            status: response.status().as_u16(),
            date,
        })
    }
}

/// Result of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The payload was accepted. `server_time` is the server clock (epoch milliseconds) read from
    /// the response, if it was sent.
    Success {
        #[allow(missing_docs)]
        server_time: Option<i64>,
    },
    /// Network failure, rate limiting or server error. Worth one retry.
    Transient(String),
    /// The SDK key was rejected. Nothing will ever be accepted again.
    Fatal(String),
    /// The payload was rejected. Retrying the same payload is pointless, but later payloads may
    /// succeed.
    ClientRejected(String),
}

/// Map an endpoint response to a [`DeliveryOutcome`].
pub fn classify(response: &TransportResponse) -> DeliveryOutcome {
    match response.status {
        200..=299 => DeliveryOutcome::Success {
            server_time: response.date.as_deref().and_then(parse_http_date),
        },
        status @ (401 | 403) => DeliveryOutcome::Fatal(format!(
            "received {status} response, the SDK key is likely invalid"
        )),
        status @ (408 | 429 | 500..=599) => {
            DeliveryOutcome::Transient(format!("received {status} response"))
        }
        status => DeliveryOutcome::ClientRejected(format!("received {status} response")),
    }
}

fn parse_http_date(date: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(date)
        .map(|date| date.timestamp_millis())
        .map_err(|err| {
            log::debug!(target: "flag_events", "ignoring unparseable Date header {date:?}: {err}");
        })
        .ok()
}

/// Serializes payloads and sends them, retrying once on transient failures.
pub struct EventSender {
    transport: Box<dyn EventTransport>,
}

impl EventSender {
    #[allow(missing_docs)]
    pub fn new(transport: Box<dyn EventTransport>) -> EventSender {
        EventSender { transport }
    }

    /// Deliver `payload`.
    ///
    /// A [`DeliveryOutcome::Transient`] failure is retried once, immediately, with the same body.
    /// The outcome of the last attempt is returned.
    pub fn send_payload(&self, payload: &FlushPayload) -> DeliveryOutcome {
        let body = match payload.to_json_bytes() {
            Ok(body) => body,
            Err(err) => {
                return DeliveryOutcome::ClientRejected(format!("cannot serialize events: {err}"))
            }
        };

        log::debug!(target: "flag_events", events = payload.len(); "sending events");
        match self.post(&body) {
            DeliveryOutcome::Transient(reason) => {
                log::warn!(target: "flag_events", "error sending events, will retry once: {reason}");
                self.post(&body)
            }
            outcome => outcome,
        }
    }

    fn post(&self, body: &[u8]) -> DeliveryOutcome {
        match self.transport.post(body) {
            Ok(response) => classify(&response),
            Err(err) => DeliveryOutcome::Transient(err.to_string()),
        }
    }
}
