//! End-to-end lifecycle tests: a real `Supervisor` driving a `LocalTransport`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    ApiDefinition, Codec, Config, ConnectionConfig, DecodeError, Event, EventKind, Frame,
    LocalTransport, PublishSpec, Published, Routine, RuntimeError, Subscribe, SubscriptionSpec,
    Supervisor, Task, TextCodec, Transport, create_ws_api_task,
};

#[derive(Debug, Deserialize, PartialEq)]
struct Point {
    x: i32,
}

struct Harness {
    broker: LocalTransport,
    sup: Arc<Supervisor>,
    events: broadcast::Receiver<Event>,
    run: JoinHandle<Result<(), RuntimeError>>,
}

impl Harness {
    async fn start(api: ApiDefinition, cfg: Config) -> Self {
        let broker = LocalTransport::default();
        let sup = Supervisor::builder(ConnectionConfig::new("ws://test/ws"), api)
            .with_config(cfg)
            .build(broker.factory())
            .unwrap();
        let events = sup.bus().subscribe();
        let run = tokio::spawn({
            let sup = sup.clone();
            async move { sup.run().await }
        });
        wait_until(|| broker.is_active() && broker.has_connect_handler()).await;
        Self {
            broker,
            sup,
            events,
            run,
        }
    }

    /// Accepts the connection and waits until the epoch's workers are alive.
    async fn connect(&mut self, workers: usize) -> Vec<String> {
        assert!(self.broker.connect_now());
        self.wait_alive(workers).await
    }

    async fn wait_alive(&self, n: usize) -> Vec<String> {
        for _ in 0..2000 {
            let alive = self.sup.alive_workers().await;
            if alive.len() == n {
                return alive;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!(
            "expected {n} alive workers, have {:?}",
            self.sup.alive_workers().await
        );
    }

    async fn next_of(&mut self, kind: EventKind) -> Event {
        loop {
            let ev = self.events.recv().await.unwrap();
            if ev.kind == kind {
                return ev;
            }
        }
    }

    async fn stop(self) -> Result<(), RuntimeError> {
        self.sup.shutdown();
        self.run.await.unwrap()
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn api() -> ApiDefinition {
    ApiDefinition::new()
        .subscribe(SubscriptionSpec::json::<Point>("/topic/a", Routine::new("a")))
        .subscribe(SubscriptionSpec::new("/topic/t", Routine::new("t"), TextCodec))
        .publish(PublishSpec::new("/app/b", Routine::new("b")))
}

const EPOCH_WORKERS: [&str; 4] = [
    "disconnect-bridge",
    "publish:/app/b",
    "subscription:/topic/a",
    "subscription:/topic/t",
];

#[tokio::test]
async fn test_connected_starts_one_worker_per_entry_plus_bridge() {
    let mut h = Harness::start(api(), Config::default()).await;

    let alive = h.connect(4).await;
    assert_eq!(alive, EPOCH_WORKERS);
    assert!(h.broker.has_disconnect_handler());
    assert_eq!(h.broker.subscriber_count("/topic/a"), 1);
    assert_eq!(h.broker.subscriber_count("/topic/t"), 1);

    let started = h.next_of(EventKind::EpochStarted).await;
    assert_eq!(started.epoch, Some(1));

    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_disconnected_leaves_no_worker_alive() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    h.broker.drop_connection(crate::CloseFrame::new(1006, "abnormal"));
    h.wait_alive(0).await;

    let ended = h.next_of(EventKind::EpochEnded).await;
    assert_eq!(ended.epoch, Some(1));
    assert_eq!(h.broker.subscriber_count("/topic/a"), 0);
    assert_eq!(h.broker.subscriber_count("/topic/t"), 0);
    assert_eq!(h.broker.unsubscribe_calls(), 2);
    assert!(!h.broker.has_disconnect_handler());
    // The connect bridge outlives the epoch.
    assert!(h.broker.has_connect_handler());

    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_messages_decode_in_delivery_order() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    for x in 1..=3 {
        h.broker
            .deliver("/topic/a", Frame::message(format!(r#"{{"x":{x}}}"#)));
    }
    let routine = Routine::new("a");
    let mut bodies = Vec::new();
    while bodies.len() < 3 {
        let ev = h.next_of(EventKind::SubscriptionSuccess).await;
        if routine.is_success(&ev) {
            bodies.push(ev.message::<Point>().unwrap().body.x);
        }
    }
    assert_eq!(bodies, vec![1, 2, 3]);

    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_publish_triggers_reach_transport_in_order() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    let b = Routine::new("b");
    for k in 0..5 {
        h.sup.emit(b.publish(&json!({ "k": k })).unwrap());
    }
    wait_until(|| h.broker.published().len() == 5).await;

    let bodies: Vec<String> = h.broker.published().into_iter().map(|p| p.body).collect();
    let expected: Vec<String> = (0..5).map(|k| format!(r#"{{"k":{k}}}"#)).collect();
    assert_eq!(bodies, expected);

    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_scenario_roundtrip_then_disconnect_is_quiet() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    h.broker.deliver("/topic/a", Frame::message(r#"{"x":1}"#));
    let ok = h.next_of(EventKind::SubscriptionSuccess).await;
    assert_eq!(ok.route.as_deref(), Some("a"));
    assert_eq!(ok.message::<Point>().unwrap().body, Point { x: 1 });

    h.sup.emit(Routine::new("b").publish(&json!({"y": 2})).unwrap());
    wait_until(|| !h.broker.published().is_empty()).await;
    assert_eq!(
        h.broker.published(),
        vec![Published {
            channel: "/app/b".into(),
            body: r#"{"y":2}"#.into()
        }]
    );

    h.broker.drop_connection(crate::CloseFrame::new(1006, "abnormal"));
    h.wait_alive(0).await;
    h.next_of(EventKind::EpochEnded).await;

    // Neither path produces anything once the epoch is gone.
    assert_eq!(h.broker.deliver("/topic/a", Frame::message(r#"{"x":2}"#)), 0);
    h.sup.emit(Routine::new("b").publish(&json!({"y": 3})).unwrap());
    settle().await;

    assert_eq!(h.broker.published().len(), 1);
    while let Ok(ev) = h.events.try_recv() {
        assert!(
            !matches!(
                ev.kind,
                EventKind::SubscriptionSuccess | EventKind::PublishFailed
            ),
            "unexpected {ev:?}"
        );
    }

    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_twice_is_same_as_once() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    h.sup.shutdown();
    h.sup.shutdown();
    let sup = h.sup.clone();
    let broker = h.broker.clone();
    h.run.await.unwrap().unwrap();
    sup.shutdown();

    assert_eq!(broker.unsubscribe_calls(), 2);
    assert!(!broker.is_active());
    assert!(!broker.has_connect_handler());
    assert!(!broker.has_disconnect_handler());

    let mut requested = 0;
    let mut complete = 0;
    while let Ok(ev) = h.events.try_recv() {
        match ev.kind {
            EventKind::ShutdownRequested => requested += 1,
            EventKind::ShutdownComplete => complete += 1,
            _ => {}
        }
    }
    assert_eq!((requested, complete), (1, 1));

    for _ in 0..100 {
        if sup.alive_workers().await.is_empty() {
            return;
        }
        settle().await;
    }
    panic!("workers still alive: {:?}", sup.alive_workers().await);
}

#[tokio::test]
async fn test_decode_fault_is_isolated_to_its_worker() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    h.broker.deliver("/topic/a", Frame::message("{not json"));
    let failed = h.next_of(EventKind::WorkerFailed).await;
    assert_eq!(failed.worker.as_deref(), Some("subscription:/topic/a"));
    assert!(failed.reason.as_deref().unwrap_or_default().starts_with("decode failed on /topic/a"));

    let alive = h.wait_alive(3).await;
    assert!(!alive.contains(&"subscription:/topic/a".to_string()));
    assert_eq!(h.broker.subscriber_count("/topic/a"), 0);

    h.broker.deliver("/topic/t", Frame::message("still fine"));
    let ok = h.next_of(EventKind::SubscriptionSuccess).await;
    assert_eq!(ok.message::<String>().unwrap().body, "still fine");

    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_empty_api_runs_only_the_disconnect_bridge() {
    let mut h = Harness::start(ApiDefinition::new(), Config::default()).await;
    let alive = h.connect(1).await;
    assert_eq!(alive, vec!["disconnect-bridge"]);
    h.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_run_is_rejected() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    assert!(matches!(h.sup.run().await, Err(RuntimeError::AlreadyRunning)));
    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_starts_a_new_epoch() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    h.broker.drop_connection(crate::CloseFrame::new(1006, "abnormal"));
    h.wait_alive(0).await;

    // The transport reconnects on its own after the fixed delay.
    let started = loop {
        let ev = h.next_of(EventKind::EpochStarted).await;
        if ev.epoch == Some(2) {
            break ev;
        }
    };
    assert_eq!(started.epoch, Some(2));
    assert_eq!(h.wait_alive(4).await, EPOCH_WORKERS);
    assert_eq!(h.broker.subscribe_calls(), 4);

    let ok = {
        h.broker.deliver("/topic/a", Frame::message(r#"{"x":9}"#));
        h.next_of(EventKind::SubscriptionSuccess).await
    };
    assert_eq!(ok.message::<Point>().unwrap().body, Point { x: 9 });

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_before_epoch_start_does_not_wedge_later_epochs() {
    let mut h = Harness::start(api(), Config::default()).await;

    // The connection flaps before the connect bridge gets to run.
    assert!(h.broker.connect_now());
    assert!(h.broker.drop_connection(crate::CloseFrame::new(1006, "flap")));

    let disc = h.next_of(EventKind::Disconnected).await;
    assert_eq!(disc.epoch, Some(1));
    let ended = h.next_of(EventKind::EpochEnded).await;
    assert_eq!(ended.epoch, Some(1));
    h.wait_alive(0).await;
    assert_eq!(h.broker.subscribe_calls(), 0);
    assert!(!h.broker.has_disconnect_handler());

    // Reconnect after the fixed delay brings up a complete epoch.
    let started = h.next_of(EventKind::EpochStarted).await;
    assert_eq!(started.epoch, Some(2));
    assert_eq!(h.wait_alive(4).await, EPOCH_WORKERS);
    assert_eq!(h.broker.subscriber_count("/topic/a"), 1);

    assert_eq!(h.broker.deliver("/topic/a", Frame::message(r#"{"x":5}"#)), 1);
    let ok = h.next_of(EventKind::SubscriptionSuccess).await;
    assert_eq!(ok.message::<Point>().unwrap().body, Point { x: 5 });

    h.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connected_during_live_epoch_waits_for_it_to_end() {
    let mut h = Harness::start(api(), Config::default()).await;
    h.connect(4).await;

    // Close and reconnect back to back: the second Connected fires while
    // epoch 1's workers are still running.
    assert!(h.broker.drop_connection(crate::CloseFrame::new(1006, "flap")));
    assert!(h.broker.connect_now());

    let ended = h.next_of(EventKind::EpochEnded).await;
    assert_eq!(ended.epoch, Some(1));
    let started = h.next_of(EventKind::EpochStarted).await;
    assert_eq!(started.epoch, Some(2));

    assert_eq!(h.wait_alive(4).await, EPOCH_WORKERS);
    assert_eq!(h.broker.subscriber_count("/topic/a"), 1);
    assert_eq!(h.broker.subscriber_count("/topic/t"), 1);
    assert_eq!(h.broker.subscribe_calls(), 4);
    assert_eq!(h.broker.unsubscribe_calls(), 2);

    h.broker.deliver("/topic/t", Frame::message("once"));
    let ok = h.next_of(EventKind::SubscriptionSuccess).await;
    assert_eq!(ok.message::<String>().unwrap().body, "once");

    h.stop().await.unwrap();
}

/// Records event kinds, slowly.
struct Recorder(Arc<Mutex<Vec<EventKind>>>);

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        tokio::task::yield_now().await;
        self.0.lock().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn test_subscribers_drained_before_run_returns() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(Recorder(seen.clone()))];
    let broker = LocalTransport::default();
    let sup = Supervisor::builder(ConnectionConfig::new("ws://test/ws"), api())
        .with_subscribers(subs)
        .build(broker.factory())
        .unwrap();
    let run = tokio::spawn({
        let sup = sup.clone();
        async move { sup.run().await }
    });

    wait_until(|| broker.connect_now()).await;
    wait_until(|| broker.subscriber_count("/topic/a") == 1).await;

    sup.shutdown();
    run.await.unwrap().unwrap();

    let seen = seen.lock();
    assert!(seen.contains(&EventKind::EpochEnded));
    assert_eq!(seen.last(), Some(&EventKind::ShutdownComplete));
}

/// Blocks the thread while decoding, ignoring cancellation.
struct Blocking(Arc<AtomicBool>);

#[async_trait]
impl Codec for Blocking {
    type Output = String;

    async fn decode(&self, body: &str) -> Result<String, DecodeError> {
        self.0.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(500));
        Ok(body.to_string())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_grace_exceeded_reports_stuck_workers() {
    let decoding = Arc::new(AtomicBool::new(false));
    let api = ApiDefinition::new().subscribe(SubscriptionSpec::new(
        "/topic/slow",
        Routine::new("slow"),
        Blocking(decoding.clone()),
    ));
    let cfg = Config {
        grace: Duration::from_millis(20),
        ..Config::default()
    };
    let mut h = Harness::start(api, cfg).await;
    h.connect(2).await;

    h.broker.deliver("/topic/slow", Frame::message("zzz"));
    wait_until(|| decoding.load(Ordering::SeqCst)).await;

    match h.stop().await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(20));
            assert!(stuck.contains(&"subscription:/topic/slow".to_string()));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_topic_rejected_at_build() {
    let api = ApiDefinition::new()
        .subscribe(SubscriptionSpec::new("/topic/a", Routine::new("x"), TextCodec))
        .subscribe(SubscriptionSpec::new("/topic/a", Routine::new("y"), TextCodec));
    let res = Supervisor::builder(ConnectionConfig::new("ws://test/ws"), api)
        .build(LocalTransport::default().factory());
    assert!(matches!(res, Err(RuntimeError::DuplicateRoute { .. })));
}

#[tokio::test]
async fn test_routine_shared_by_two_channels_rejected_at_build() {
    let api = ApiDefinition::new()
        .publish(PublishSpec::new("/app/x", Routine::new("send")))
        .publish(PublishSpec::new("/app/y", Routine::new("send")));
    match Supervisor::builder(ConnectionConfig::new("ws://test/ws"), api)
        .build(LocalTransport::default().factory())
    {
        Err(RuntimeError::DuplicateRoute { route }) => assert_eq!(route, "send"),
        Err(other) => panic!("unexpected: {other:?}"),
        Ok(_) => panic!("duplicate routine accepted"),
    }
}

#[tokio::test]
async fn test_transport_built_with_fixed_reconnect_and_heartbeat() {
    let broker = LocalTransport::default();
    let _sup = Supervisor::builder(ConnectionConfig::new("ws://test/ws").verbose(), api())
        .build(broker.factory())
        .unwrap();

    let cfg = broker.config();
    assert_eq!(cfg.endpoint, "ws://test/ws");
    assert!(cfg.verbose);
    assert_eq!(cfg.reconnect.delay(), Some(crate::RECONNECT_DELAY));
    assert_eq!(cfg.reconnect, crate::ReconnectPolicy::Fixed(Duration::from_secs(5)));
    assert_eq!(cfg.heartbeat_header(), "4000,4000");
    assert!(!broker.is_active());
}

#[tokio::test]
async fn test_ws_api_task_stops_when_its_token_is_cancelled() {
    let broker = LocalTransport::default();
    let task = create_ws_api_task(
        ConnectionConfig::new("ws://test/ws"),
        api(),
        broker.factory(),
    )
    .unwrap();
    assert_eq!(task.name(), "ws-api:ws://test/ws");

    let ctx = CancellationToken::new();
    let run = tokio::spawn({
        let task = task.clone();
        let ctx = ctx.clone();
        async move { task.run(ctx).await }
    });

    wait_until(|| broker.connect_now()).await;
    wait_until(|| broker.subscriber_count("/topic/a") == 1).await;

    ctx.cancel();
    run.await.unwrap().unwrap();
    assert!(!broker.is_active());
    assert_eq!(broker.subscriber_count("/topic/a"), 0);
}

#[tokio::test]
async fn test_activation_failure_is_returned() {
    struct Refusing;

    impl Transport for Refusing {
        fn on_connect(&self, _h: crate::Handler<Frame>) -> crate::Registration {
            crate::Registration::noop()
        }
        fn on_disconnect(&self, _h: crate::Handler<crate::CloseFrame>) -> crate::Registration {
            crate::Registration::noop()
        }
        fn subscribe(
            &self,
            _topic: &str,
            _h: crate::Handler<Frame>,
        ) -> Result<crate::Registration, crate::TransportError> {
            Err(crate::TransportError::NotConnected)
        }
        fn publish(&self, _channel: &str, _body: String) -> Result<(), crate::TransportError> {
            Err(crate::TransportError::NotConnected)
        }
        fn activate(&self) -> Result<(), crate::TransportError> {
            Err(crate::TransportError::Rejected("endpoint unreachable".into()))
        }
        fn deactivate(&self) {}
        fn is_connected(&self) -> bool {
            false
        }
    }

    let factory = |_cfg: &crate::TransportConfig| -> Result<Arc<dyn Transport>, crate::TransportError> {
        Ok(Arc::new(Refusing))
    };
    let sup = Supervisor::builder(ConnectionConfig::new("ws://test/ws"), api())
        .build(factory)
        .unwrap();

    match sup.run().await {
        Err(RuntimeError::Transport(crate::TransportError::Rejected(msg))) => {
            assert_eq!(msg, "endpoint unreachable")
        }
        other => panic!("unexpected: {other:?}"),
    }
}
