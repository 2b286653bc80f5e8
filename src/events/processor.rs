//! Producer-facing entry point of the event pipeline.
use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError},
        Arc, Mutex,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crate::{
    events::{
        debug_window::{self, ServerClock},
        delivery::{DeliveryOutcome, EventSender, EventTransport, HttpTransport},
        now_millis,
        outbox::Outbox,
        Event,
    },
    EventsConfig, Result,
};

/// Accepts events from application threads.
///
/// None of the methods report errors: event delivery problems are logged and never propagate to
/// the code that submits events.
pub trait EventProcessor: Send + Sync {
    /// Queue an event for processing. Never blocks.
    ///
    /// The event is dropped if the queue is full or the processor is stopped or disabled.
    fn submit(&self, event: Event);

    /// Ask for the buffered events to be delivered now instead of at the next scheduled flush.
    /// Does not wait for the delivery.
    fn flush(&self);

    /// Deliver everything submitted so far and shut the worker down.
    ///
    /// Blocks until the worker exits or the stop timeout elapses. Calling it more than once has
    /// no further effect.
    fn stop(&self);

    /// Block until every message submitted before this call has been handled, including any
    /// requested flush and its delivery.
    fn wait_until_inactive(&self);

    /// Number of events dropped because a queue was full.
    fn dropped_event_count(&self) -> u64;
}

/// An [`EventProcessor`] that discards everything. Used when sending events is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventProcessor;

impl EventProcessor for NullEventProcessor {
    fn submit(&self, _event: Event) {}
    fn flush(&self) {}
    fn stop(&self) {}
    fn wait_until_inactive(&self) {}
    fn dropped_event_count(&self) -> u64 {
        0
    }
}

enum Message {
    Event { event: Event, creation_date: i64 },
    Flush,
    /// Reply once every previous message is handled.
    Sync(SyncSender<()>),
    /// Flush, reply, and exit.
    Stop(SyncSender<()>),
}

/// State shared between producers and the worker thread.
#[derive(Default)]
struct Shared {
    /// Set once the events endpoint rejected the SDK key.
    disabled: AtomicBool,
    /// Set once `stop()` was called or the worker exited.
    stopped: AtomicBool,
    dropped: AtomicU64,
    /// Set while the inbox is known to be full, so the warning is logged once.
    inbox_full: AtomicBool,
}

impl Shared {
    fn is_active(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed) && !self.stopped.load(Ordering::Relaxed)
    }
}

/// Event processor backed by a single background worker thread.
///
/// The worker owns all pipeline state and performs all network I/O. Producers only touch a
/// bounded channel and a handful of atomics.
pub struct DefaultEventProcessor {
    inbox: SyncSender<Message>,
    shared: Arc<Shared>,
    stop_timeout: Duration,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl DefaultEventProcessor {
    /// Start a processor delivering events over HTTP to the configured events endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the events URI is invalid, the HTTP client cannot be created, or the
    /// worker thread cannot be spawned.
    pub fn start(config: &EventsConfig) -> Result<DefaultEventProcessor> {
        let transport = HttpTransport::new(config)?;
        DefaultEventProcessor::start_with_transport(config, Box::new(transport))
    }

    /// Start a processor delivering events through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start_with_transport(
        config: &EventsConfig,
        transport: Box<dyn EventTransport>,
    ) -> Result<DefaultEventProcessor> {
        let (inbox, receiver) = std::sync::mpsc::sync_channel(config.capacity.max(1));
        let shared = Arc::new(Shared::default());

        let worker = Worker {
            outbox: Outbox::new(config.outbox_config()),
            sender: EventSender::new(transport),
            shared: Arc::clone(&shared),
            flush_interval: config.flush_interval,
            server_clock: None,
        };

        let join_handle = {
            // Cloning Arc for move into thread
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("flag-events".to_owned())
                .spawn(move || {
                    log::debug!(target: "flag_events", "event worker started");
                    let result =
                        std::panic::catch_unwind(AssertUnwindSafe(move || worker.run(receiver)));
                    if result.is_err() {
                        log::error!(target: "flag_events", "event worker panicked, events will no longer be sent");
                    }
                    shared.stopped.store(true, Ordering::Relaxed);
                    log::debug!(target: "flag_events", "event worker stopped");
                })?
        };

        Ok(DefaultEventProcessor {
            inbox,
            shared,
            stop_timeout: config.stop_timeout,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    /// Send a control message, waiting for room in the inbox until `deadline`.
    ///
    /// Returns `TrySendError::Full` if the inbox is still full at `deadline`, and
    /// `TrySendError::Disconnected` if the worker has exited.
    fn send_before(
        &self,
        mut message: Message,
        deadline: Instant,
    ) -> std::result::Result<(), TrySendError<Message>> {
        loop {
            match self.inbox.try_send(message) {
                Err(TrySendError::Full(returned)) if Instant::now() < deadline => {
                    message = returned;
                    std::thread::sleep(Duration::from_millis(5));
                }
                result => return result,
            }
        }
    }
}

impl EventProcessor for DefaultEventProcessor {
    fn submit(&self, event: Event) {
        if !self.shared.is_active() {
            return;
        }

        let message = Message::Event {
            event,
            creation_date: now_millis(),
        };
        match self.inbox.try_send(message) {
            Ok(()) => {
                if self.shared.inbox_full.load(Ordering::Relaxed) {
                    self.shared.inbox_full.store(false, Ordering::Relaxed);
                }
            }
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                if !self.shared.inbox_full.swap(true, Ordering::Relaxed) {
                    log::warn!(target: "flag_events", "event queue is full, dropping events until it drains");
                }
            }
            // The worker has exited.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn flush(&self) {
        if !self.shared.is_active() {
            return;
        }
        // A full inbox means the worker is busy and will flush on its own schedule.
        let _ = self.inbox.try_send(Message::Flush);
    }

    fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!(target: "flag_events", "stopping event processor");

        let deadline = Instant::now() + self.stop_timeout;
        let (reply_sender, reply_receiver) = std::sync::mpsc::sync_channel(1);
        match self.send_before(Message::Stop(reply_sender), deadline) {
            Ok(()) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                if let Err(RecvTimeoutError::Timeout) = reply_receiver.recv_timeout(timeout) {
                    log::warn!(target: "flag_events", "timed out waiting for the event worker to stop");
                    return;
                }
            }
            Err(TrySendError::Full(_)) => {
                // The inbox is still open, so the worker would never exit and a join would block.
                log::warn!(target: "flag_events", "timed out sending stop command to the event worker");
                return;
            }
            // The worker has exited.
            Err(TrySendError::Disconnected(_)) => {}
        }

        let join_handle = match self.join_handle.lock() {
            Ok(mut join_handle) => join_handle.take(),
            Err(_) => None,
        };
        if let Some(join_handle) = join_handle {
            // Panics are caught inside the worker, so join errors are not expected.
            let _ = join_handle.join();
        }
    }

    fn wait_until_inactive(&self) {
        let (reply_sender, reply_receiver) = std::sync::mpsc::sync_channel(1);
        if self.inbox.send(Message::Sync(reply_sender)).is_ok() {
            // Error means the worker exited, which is inactive enough.
            let _ = reply_receiver.recv();
        }
    }

    fn dropped_event_count(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

struct Worker {
    outbox: Outbox,
    sender: EventSender,
    shared: Arc<Shared>,
    flush_interval: Duration,
    /// Server clock reported by the last successful delivery.
    server_clock: Option<ServerClock>,
}

impl Worker {
    fn run(mut self, inbox: Receiver<Message>) {
        let mut next_flush = Instant::now() + self.flush_interval;
        loop {
            let now = Instant::now();
            if now >= next_flush {
                self.flush();
                next_flush = now + self.flush_interval;
            }

            match inbox.recv_timeout(next_flush.saturating_duration_since(now)) {
                Ok(Message::Event {
                    event,
                    creation_date,
                }) => self.process(event, creation_date),
                Ok(Message::Flush) => self.flush(),
                Ok(Message::Sync(reply)) => {
                    let _ = reply.send(());
                }
                Ok(Message::Stop(reply)) => {
                    self.flush();
                    let _ = reply.send(());
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    // Flush deadline reached. Loop to flush.
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!(target: "flag_events", "event processor dropped, sending remaining events");
                    self.flush();
                    return;
                }
            }
        }
    }

    fn process(&mut self, event: Event, creation_date: i64) {
        if self.shared.disabled.load(Ordering::Relaxed) {
            return;
        }

        let effective_now = debug_window::effective_now(self.server_clock, now_millis());
        let dropped = self.outbox.add_event(event, creation_date, effective_now);
        if dropped > 0 {
            self.shared
                .dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    fn flush(&mut self) {
        // Summary counters and user keys are reset even if the payload is not delivered.
        let Some(payload) = self.outbox.take_payload() else {
            return;
        };
        if self.shared.disabled.load(Ordering::Relaxed) {
            return;
        }

        match self.sender.send_payload(&payload) {
            DeliveryOutcome::Success { server_time } => {
                log::debug!(target: "flag_events", events = payload.len(); "delivered events");
                if let Some(server_time) = server_time {
                    self.server_clock = Some(ServerClock {
                        server_time,
                        observed_at: now_millis(),
                    });
                }
            }
            DeliveryOutcome::Fatal(reason) => {
                log::warn!(target: "flag_events", "disabling event delivery: {reason}");
                self.shared.disabled.store(true, Ordering::Relaxed);
            }
            DeliveryOutcome::Transient(reason) => {
                log::warn!(target: "flag_events", events = payload.len(); "dropping events after failed retry: {reason}");
            }
            DeliveryOutcome::ClientRejected(reason) => {
                log::warn!(target: "flag_events", events = payload.len(); "events were rejected: {reason}");
            }
        }
    }
}
