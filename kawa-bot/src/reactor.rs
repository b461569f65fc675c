//! Reactor loop: the single consumer of canonical events.
//!
//! Producers (capture threads, injected events) push into one bounded
//! queue. The reactor drains it on one thread and, for every game event,
//! runs the decision first, mirrors the event second, and only then emits
//! outputs. An empty-queue timeout drives housekeeping: a one-shot retry of
//! the last executed action when no game activity followed it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use kawa_core::{Event, EventBody};

use crate::config::ReactorSettings;
use crate::controller::Controller;
use crate::engine::{Clock, SystemClock};
use crate::notify::{self, NotificationFlags};
use crate::recommend::{build_payload, RecommendationPayload};
use crate::response::Response;
use crate::tracker::{StateTracker, TrackerSnapshot};

const SHUTDOWN_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Queue item.
#[derive(Debug, Clone)]
pub enum Message {
    Event(Event),
    Shutdown,
}

/// Cloneable producer handle. Never blocks on a full queue.
#[derive(Debug, Clone)]
pub struct Producer {
    tx: Sender<Message>,
}

impl Producer {
    /// Enqueues one event; drops it with a warning when the queue is full.
    pub fn send_event(&self, event: Event) -> bool {
        match self.tx.try_send(Message::Event(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(Message::Event(event))) => {
                log::warn!("event queue full, dropping {}", event.kind());
                false
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("reactor gone, event discarded");
                false
            }
        }
    }

    pub fn send_all(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.send_event(event);
        }
    }

    pub fn shutdown(&self) -> bool {
        match self.tx.send_timeout(Message::Shutdown, SHUTDOWN_SEND_TIMEOUT) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(_)) => {
                log::error!("could not enqueue shutdown: queue stayed full");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }
}

pub fn channel(capacity: usize) -> (Producer, Receiver<Message>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (Producer { tx }, rx)
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Decides on events. Implemented by [`Controller`].
pub trait Decider {
    fn react(&mut self, event: &Event) -> Response;
    fn take_flags(&mut self) -> NotificationFlags;
}

/// Mirrors events after the decision. Implemented by [`StateTracker`].
pub trait Mirror {
    fn update(&mut self, event: &Event) -> Response;
    fn recommend(&self, response: &Response) -> Option<RecommendationPayload>;
    fn snapshot(&self) -> TrackerSnapshot;
}

/// Delivery and move-execution side.
pub trait Sink {
    fn recommendation(&mut self, payload: &RecommendationPayload);
    fn notifications(&mut self, codes: &[String]);

    /// Hands an action to the executor. Returns the estimated time it takes
    /// to play out, which arms the one-shot retry.
    fn execute(&mut self, _action: &Response, _snapshot: &TrackerSnapshot) -> Option<Duration> {
        None
    }
}

impl Decider for Controller {
    fn react(&mut self, event: &Event) -> Response {
        Controller::react(self, event)
    }

    fn take_flags(&mut self) -> NotificationFlags {
        Controller::take_flags(self)
    }
}

impl Mirror for StateTracker {
    fn update(&mut self, event: &Event) -> Response {
        StateTracker::update(self, event)
    }

    fn recommend(&self, response: &Response) -> Option<RecommendationPayload> {
        build_payload(response, self)
    }

    fn snapshot(&self) -> TrackerSnapshot {
        StateTracker::snapshot(self)
    }
}

// ---------------------------------------------------------------------------
// Reactor
// ---------------------------------------------------------------------------

struct PendingRetry {
    due: Instant,
    action: Response,
    snapshot: TrackerSnapshot,
}

pub struct Reactor<D, M, S> {
    rx: Receiver<Message>,
    decider: D,
    mirror: M,
    sink: S,
    poll_timeout: Duration,
    retry_grace: Duration,
    clock: Arc<dyn Clock>,
    pending_retry: Option<PendingRetry>,
    processed: u64,
}

impl<D: Decider, M: Mirror, S: Sink> Reactor<D, M, S> {
    pub fn new(
        rx: Receiver<Message>,
        decider: D,
        mirror: M,
        sink: S,
        settings: &ReactorSettings,
    ) -> Self {
        Self {
            rx,
            decider,
            mirror,
            sink,
            poll_timeout: settings.poll_timeout(),
            retry_grace: settings.retry_grace(),
            clock: Arc::new(SystemClock),
            pending_retry: None,
            processed: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Drains the queue until a shutdown message arrives or every producer
    /// is gone.
    pub fn run(&mut self) {
        log::info!("reactor started");
        loop {
            match self.rx.recv_timeout(self.poll_timeout) {
                Ok(Message::Event(event)) => self.handle(&event),
                Ok(Message::Shutdown) => {
                    log::info!("shutdown received after {} events", self.processed);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("all producers gone, reactor stopping");
                    break;
                }
            }
        }
        self.pending_retry = None;
    }

    /// Processes one event: decide, mirror, emit.
    pub fn handle(&mut self, event: &Event) {
        self.processed += 1;
        log::trace!("event: {event:?}");
        if matches!(event.body, EventBody::SystemEvent { .. }) {
            let codes = notify::collect(event, NotificationFlags::default(), &Response::none());
            self.sink.notifications(&codes);
            return;
        }
        self.pending_retry = None;

        let response = self.decider.react(event);
        let flags = self.decider.take_flags();
        let tracked = self.mirror.update(event);

        let mut codes = notify::collect(event, flags, &response);
        codes.extend(tracked.error);
        if !codes.is_empty() {
            self.sink.notifications(&codes);
        }

        if event.is_sync() {
            return;
        }
        if let Some(payload) = self.mirror.recommend(&response) {
            self.sink.recommendation(&payload);
        }
        if response.is_none() {
            return;
        }
        let snapshot = self.mirror.snapshot();
        if let Some(estimate) = self.sink.execute(&response, &snapshot) {
            self.pending_retry = Some(PendingRetry {
                due: self.clock.now() + estimate + self.retry_grace,
                action: response,
                snapshot,
            });
        }
    }

    /// Housekeeping on an idle queue.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        if self.pending_retry.as_ref().is_some_and(|p| now >= p.due) {
            if let Some(retry) = self.pending_retry.take() {
                log::info!("no game activity after {}, retrying once", retry.action.action.kind());
                self.sink.execute(&retry.action, &retry.snapshot);
            }
        }
    }

    pub fn has_pending_retry(&self) -> bool {
        self.pending_retry.is_some()
    }

    pub fn decider(&self) -> &D {
        &self.decider
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (D, M, S) {
        (self.decider, self.mirror, self.sink)
    }
}
