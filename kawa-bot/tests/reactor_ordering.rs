//! Integration tests for the reactor loop (public API).
//!
//! Test doubles share one call log so the relative order of decision,
//! mirroring and emission can be checked per event.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kawa_bot::config::ReactorSettings;
use kawa_bot::engine::Clock;
use kawa_bot::notify::NotificationFlags;
use kawa_bot::reactor::{channel, Decider, Mirror, Reactor, Sink};
use kawa_bot::recommend::RecommendationPayload;
use kawa_bot::response::Response;
use kawa_bot::tracker::TrackerSnapshot;
use kawa_core::{Event, EventBody, Tile};

type Log = Rc<RefCell<Vec<String>>>;

struct RecordingDecider {
    log: Log,
    answer: Response,
}

impl Decider for RecordingDecider {
    fn react(&mut self, event: &Event) -> Response {
        self.log.borrow_mut().push(format!("react:{}", event.kind()));
        self.answer.clone()
    }

    fn take_flags(&mut self) -> NotificationFlags {
        NotificationFlags::default()
    }
}

struct RecordingMirror {
    log: Log,
}

impl Mirror for RecordingMirror {
    fn update(&mut self, event: &Event) -> Response {
        self.log.borrow_mut().push(format!("update:{}", event.kind()));
        Response::none()
    }

    fn recommend(&self, _response: &Response) -> Option<RecommendationPayload> {
        self.log.borrow_mut().push("recommend".to_owned());
        None
    }

    fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot::default()
    }
}

struct RecordingSink {
    log: Log,
    estimate: Option<Duration>,
}

impl Sink for RecordingSink {
    fn recommendation(&mut self, _payload: &RecommendationPayload) {
        self.log.borrow_mut().push("recommendation".to_owned());
    }

    fn notifications(&mut self, codes: &[String]) {
        self.log.borrow_mut().push(format!("notify:{}", codes.join(",")));
    }

    fn execute(&mut self, action: &Response, _snapshot: &TrackerSnapshot) -> Option<Duration> {
        self.log.borrow_mut().push(format!("execute:{}", action.action.kind()));
        self.estimate
    }
}

struct FakeClock(Mutex<Instant>);

impl FakeClock {
    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.0.lock().unwrap()
    }
}

fn settings() -> ReactorSettings {
    ReactorSettings {
        queue_capacity: 16,
        poll_timeout_ms: 5,
        retry_grace_ms: 3000,
    }
}

fn dahai() -> Response {
    Response::action(EventBody::Dahai {
        actor: 0,
        pai: "1m".parse::<Tile>().unwrap(),
        tsumogiri: true,
    })
}

fn reactor(
    answer: Response,
    estimate: Option<Duration>,
) -> (Log, Reactor<RecordingDecider, RecordingMirror, RecordingSink>, kawa_bot::Producer) {
    let log: Log = Rc::default();
    let s = settings();
    let (producer, rx) = channel(s.queue_capacity);
    let reactor = Reactor::new(
        rx,
        RecordingDecider { log: log.clone(), answer },
        RecordingMirror { log: log.clone() },
        RecordingSink { log: log.clone(), estimate },
        &s,
    );
    (log, reactor, producer)
}

fn tsumo() -> Event {
    Event::new(EventBody::Tsumo {
        actor: 0,
        pai: "1m".parse().unwrap(),
    })
}

#[test]
fn decision_precedes_mirroring_for_every_event() {
    let (log, mut reactor, producer) = reactor(Response::none(), None);
    producer.send_event(Event::new(EventBody::StartGame { id: 0 }));
    producer.send_event(tsumo());
    producer.send_event(Event::new(EventBody::EndKyoku));
    producer.shutdown();
    reactor.run();

    let log = log.borrow();
    for kind in ["start_game", "tsumo", "end_kyoku"] {
        let react = log.iter().position(|l| *l == format!("react:{kind}")).unwrap();
        let update = log.iter().position(|l| *l == format!("update:{kind}")).unwrap();
        assert!(react < update, "{kind}: {log:?}");
    }
    // outputs of an event come after both
    let update = log.iter().position(|l| l == "update:start_game").unwrap();
    let notify = log.iter().position(|l| l == "notify:game_connected").unwrap();
    assert!(update < notify);
}

#[test]
fn synthetic_events_update_state_without_emitting() {
    let (log, mut reactor, _producer) = reactor(dahai(), Some(Duration::ZERO));
    reactor.handle(&tsumo().synthetic());
    let log = log.borrow();
    assert_eq!(*log, ["react:tsumo", "update:tsumo"]);
}

#[test]
fn shutdown_is_obeyed_before_later_events() {
    let (log, mut reactor, producer) = reactor(Response::none(), None);
    producer.send_event(tsumo());
    producer.shutdown();
    producer.send_event(Event::new(EventBody::EndGame));
    reactor.run();

    let log = log.borrow();
    assert!(log.iter().any(|l| l == "react:tsumo"));
    assert!(!log.iter().any(|l| l.ends_with("end_game")), "{log:?}");
}

#[test]
fn system_events_only_notify() {
    let (log, mut reactor, _producer) = reactor(Response::none(), None);
    reactor.handle(&Event::system("game_syncing"));
    assert_eq!(*log.borrow(), ["notify:game_syncing"]);
}

#[test]
fn idle_queue_retries_an_executed_action_once() {
    let clock = Arc::new(FakeClock(Mutex::new(Instant::now())));
    let (log, reactor, _producer) = reactor(dahai(), Some(Duration::from_secs(1)));
    let mut reactor = reactor.with_clock(clock.clone());

    reactor.handle(&tsumo());
    assert!(reactor.has_pending_retry());

    clock.advance(Duration::from_secs(2));
    reactor.tick();
    assert_eq!(log.borrow().iter().filter(|l| *l == "execute:dahai").count(), 1);

    clock.advance(Duration::from_secs(2));
    reactor.tick();
    assert_eq!(log.borrow().iter().filter(|l| *l == "execute:dahai").count(), 2);
    assert!(!reactor.has_pending_retry());

    clock.advance(Duration::from_secs(60));
    reactor.tick();
    assert_eq!(log.borrow().iter().filter(|l| *l == "execute:dahai").count(), 2);
}

#[test]
fn game_activity_cancels_the_retry() {
    let clock = Arc::new(FakeClock(Mutex::new(Instant::now())));
    let (log, reactor, _producer) = reactor(dahai(), Some(Duration::ZERO));
    let mut reactor = reactor.with_clock(clock.clone());

    reactor.handle(&tsumo());
    reactor.handle(&Event::new(EventBody::EndKyoku).synthetic());
    assert!(!reactor.has_pending_retry());
    clock.advance(Duration::from_secs(10));
    reactor.tick();
    assert_eq!(log.borrow().iter().filter(|l| *l == "execute:dahai").count(), 1);
}
