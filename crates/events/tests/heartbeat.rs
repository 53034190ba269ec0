//! Timing tests for the scoped heartbeat, mostly run on paused tokio time.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use modelgen_core::progress_events::{EVENT_CONTINUE, STATUS_PROCESSING};
use modelgen_events::{with_heartbeat, Heartbeat, ProgressEvent, ProgressSink};
use uuid::Uuid;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl ProgressSink for Recorder {
    fn publish(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn template() -> ProgressEvent {
    ProgressEvent::new(EVENT_CONTINUE, 1, Uuid::new_v4())
        .with_status(STATUS_PROCESSING, "Still working")
}

const PERIOD: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Test: ticks fire once per period while the wrapped call runs
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn ticks_during_wrapped_call() {
    let recorder = Arc::new(Recorder::default());

    let out = with_heartbeat(recorder.clone(), template(), PERIOD, async {
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        "done"
    })
    .await;

    assert_eq!(out, "done");
    assert_eq!(recorder.count(), 2);
    let events = recorder.events.lock().unwrap();
    assert!(events.iter().all(|e| e.status == STATUS_PROCESSING && e.progress.is_none()));
}

// ---------------------------------------------------------------------------
// Test: a call shorter than one period emits nothing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn short_call_emits_no_tick() {
    let recorder = Arc::new(Recorder::default());

    with_heartbeat(recorder.clone(), template(), PERIOD, async {
        tokio::time::sleep(Duration::from_millis(500)).await;
    })
    .await;

    assert_eq!(recorder.count(), 0);
}

// ---------------------------------------------------------------------------
// Test: no tick is observed after the wrapped call returns
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn no_tick_after_success() {
    let recorder = Arc::new(Recorder::default());

    with_heartbeat(recorder.clone(), template(), PERIOD, async {
        tokio::time::sleep(Duration::from_millis(4_100)).await;
    })
    .await;
    let after_stop = recorder.count();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.count(), after_stop);
}

// ---------------------------------------------------------------------------
// Test: an error result also stops the heartbeat
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn no_tick_after_error() {
    let recorder = Arc::new(Recorder::default());

    let result: Result<(), &str> = with_heartbeat(recorder.clone(), template(), PERIOD, async {
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        Err("provider failed")
    })
    .await;
    assert!(result.is_err());
    let after_stop = recorder.count();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.count(), after_stop);
}

// ---------------------------------------------------------------------------
// Test: a panic inside the wrapped call drops the guard and stops ticking
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn no_tick_after_panic() {
    let recorder = Arc::new(Recorder::default());

    let caught = AssertUnwindSafe(with_heartbeat(
        recorder.clone(),
        template(),
        PERIOD,
        async {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            panic!("provider exploded");
        },
    ))
    .catch_unwind()
    .await;
    assert!(caught.is_err());
    let after_panic = recorder.count();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.count(), after_panic);
}

// ---------------------------------------------------------------------------
// Test: dropping an un-stopped guard cancels it
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn dropping_guard_cancels() {
    let recorder = Arc::new(Recorder::default());

    let heartbeat = Heartbeat::start(recorder.clone(), template(), PERIOD);
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    drop(heartbeat);
    let after_drop = recorder.count();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(recorder.count(), after_drop);
    assert_eq!(after_drop, 1);
}

// ---------------------------------------------------------------------------
// Test: a panicking call waits for an in-flight tick before unwinding
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SlowSink {
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ProgressSink for SlowSink {
    fn publish(&self, _event: ProgressEvent) {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panic_path_waits_for_in_flight_tick() {
    let sink = Arc::new(SlowSink::default());

    let caught = AssertUnwindSafe(with_heartbeat(
        sink.clone(),
        template(),
        Duration::from_millis(20),
        async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            panic!("provider exploded");
        },
    ))
    .catch_unwind()
    .await;
    assert!(caught.is_err());

    let started = sink.started.load(Ordering::SeqCst);
    assert!(started >= 1, "expected a tick in flight");
    assert_eq!(sink.finished.load(Ordering::SeqCst), started);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(sink.started.load(Ordering::SeqCst), started);
}
