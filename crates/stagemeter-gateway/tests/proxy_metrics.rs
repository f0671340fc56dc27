//! Instrumented proxy behavior against a hand-written stage.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stagemeter_core::stage::{serve_one, Outcome, ServingStage, StageName};
use stagemeter_gateway::{wrap_stage, MetricsRegistry, StageExt};

#[derive(Debug, Clone, PartialEq)]
enum StageError {
    Type(String),
    Setup(String),
}

struct Doubler {
    pub threshold: i64,
    hits: Arc<AtomicUsize>,
    setup_calls: Vec<String>,
}

impl Doubler {
    fn new() -> Self {
        Self {
            threshold: 1,
            hits: Arc::new(AtomicUsize::new(0)),
            setup_calls: Vec::new(),
        }
    }

    fn describe(&self) -> String {
        format!("doubler(threshold={})", self.threshold)
    }
}

impl ServingStage for Doubler {
    type Request = Option<i64>;
    type Input = Option<i64>;
    type Output = i64;
    type Response = String;
    type Error = StageError;

    fn setup(&mut self, device: &str) -> Result<(), StageError> {
        self.setup_calls.push(device.to_string());
        if device == "tpu" {
            return Err(StageError::Setup(format!("no such device: {device}")));
        }
        Ok(())
    }

    fn decode_request(&self, request: Option<i64>) -> Result<Option<i64>, StageError> {
        Ok(request)
    }

    fn predict(&self, x: Option<i64>) -> Result<i64, StageError> {
        self.hits.fetch_add(1, Ordering::Relaxed);
        match x {
            Some(x) => Ok(x * 2),
            None => Err(StageError::Type(
                "unsupported operand type(s) for *: 'NoneType' and 'int'".into(),
            )),
        }
    }

    fn encode_response(&self, output: i64) -> Result<String, StageError> {
        Ok(output.to_string())
    }
}

fn metrics() -> Arc<MetricsRegistry> {
    Arc::new(MetricsRegistry::new().unwrap())
}

#[test]
fn predict_successes_and_failure_are_counted() {
    let m = metrics();
    let proxy = wrap_stage(Doubler::new(), Arc::clone(&m));

    for _ in 0..3 {
        assert_eq!(proxy.predict(Some(5)).unwrap(), 10);
    }
    let err = proxy.predict(None).unwrap_err();
    let bare = Doubler::new().predict(None).unwrap_err();
    assert_eq!(err, bare);

    assert_eq!(m.request_count(Outcome::Success, "predict"), 3);
    assert_eq!(m.request_count(Outcome::Failure, "predict"), 1);
    assert_eq!(m.observation_count("predict"), 4);
    assert_eq!(m.observation_count("decode_request"), 0);
}

#[test]
fn n_calls_produce_n_observations() {
    let m = metrics();
    let proxy = Doubler::new().instrumented(Arc::clone(&m));

    let inputs = [Some(1), None, Some(2), None, None, Some(3), Some(4)];
    let k = inputs.iter().filter(|x| x.is_some()).count() as u64;
    for x in inputs {
        let _ = proxy.predict(x);
    }

    let n = inputs.len() as u64;
    assert_eq!(m.request_count(Outcome::Success, "predict"), k);
    assert_eq!(m.request_count(Outcome::Failure, "predict"), n - k);
    assert_eq!(m.observation_count("predict"), n);
    // Every sample lands in +Inf; the finite buckets can only hold fewer.
    assert!(m.bucket_counts("predict").iter().all(|&c| c <= n));
}

#[test]
fn full_request_records_each_stage() {
    let m = metrics();
    let proxy = wrap_stage(Doubler::new(), Arc::clone(&m));

    assert_eq!(serve_one(&proxy, Some(21)).unwrap(), "42");
    assert!(serve_one(&proxy, None).is_err());

    // The failed request stops at predict, so encode never runs for it.
    assert_eq!(m.request_count(Outcome::Success, "decode_request"), 2);
    assert_eq!(m.request_count(Outcome::Success, "predict"), 1);
    assert_eq!(m.request_count(Outcome::Success, "encode_response"), 1);
    assert_eq!(m.request_count(Outcome::Failure, "predict"), 1);
    assert_eq!(m.observation_count("decode_request"), 2);
    assert_eq!(m.observation_count("predict"), 2);
    assert_eq!(m.observation_count("encode_response"), 1);
}

#[test]
fn setup_passes_through_unrecorded() {
    let m = metrics();
    let mut proxy = wrap_stage(Doubler::new(), Arc::clone(&m));

    assert_eq!(proxy.setup("cpu"), Ok(()));
    assert_eq!(
        proxy.setup("tpu"),
        Err(StageError::Setup("no such device: tpu".into()))
    );
    assert_eq!(proxy.setup_calls, vec!["cpu".to_string(), "tpu".to_string()]);
    assert!(!m.render().contains("setup"));
}

#[test]
fn other_members_are_live_views_of_the_stage() {
    let m = metrics();
    let stage = Doubler::new();
    let hits = Arc::clone(&stage.hits);
    let mut proxy = wrap_stage(stage, m);

    assert_eq!(proxy.threshold, 1);
    assert_eq!(proxy.describe(), "doubler(threshold=1)");
    assert!(std::ptr::eq(&proxy.threshold, &proxy.inner().threshold));

    proxy.inner_mut().threshold = 7;
    assert_eq!(proxy.threshold, 7);
    assert_eq!(proxy.describe(), "doubler(threshold=7)");

    proxy.threshold = 9;
    assert_eq!(proxy.inner().threshold, 9);

    hits.store(41, Ordering::Relaxed);
    proxy.predict(Some(1)).unwrap();
    assert_eq!(proxy.hits.load(Ordering::Relaxed), 42);

    assert_eq!(proxy.into_inner().threshold, 9);
}

#[test]
fn recorders_are_named_after_their_stage() {
    let m = metrics();
    let proxy = wrap_stage(Doubler::new(), Arc::clone(&m));
    assert!(Arc::ptr_eq(proxy.metrics(), &m));
    for st in StageName::ALL {
        assert_eq!(proxy.recorder(st).name(), st.as_str());
    }
}

#[test]
fn concurrent_calls_lose_no_updates() {
    let m = metrics();
    let proxy = Arc::new(wrap_stage(Doubler::new(), Arc::clone(&m)));

    let workers: Vec<_> = (0..8)
        .map(|w| {
            let proxy = Arc::clone(&proxy);
            std::thread::spawn(move || {
                for i in 0..250 {
                    let x = if (w + i) % 5 == 0 { None } else { Some(i) };
                    let _ = proxy.predict(x);
                }
            })
        })
        .collect();
    for h in workers {
        h.join().unwrap();
    }

    let ok = m.request_count(Outcome::Success, "predict");
    let failed = m.request_count(Outcome::Failure, "predict");
    assert_eq!(ok + failed, 2000);
    assert_eq!(failed, 400);
    assert_eq!(m.observation_count("predict"), 2000);
}
