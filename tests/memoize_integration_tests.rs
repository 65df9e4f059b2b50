//! Integration Tests for the Memoizing Client
//!
//! Drives the public API end to end against the in-process backend.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::Duration;

use memo_cache::{
    CacheError, CallArgs, CallError, Config, ConnectionManager, ConnectionState, MemoizeOptions,
    Memoizer, MemoryBackend, StoreClient, Ttl,
};

// == Helper Functions ==

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "memo_cache=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

fn connect(config: Config) -> (StoreClient, MemoryBackend) {
    init_tracing();
    let backend = MemoryBackend::new();
    let manager = ConnectionManager::new(config, backend.clone()).unwrap();
    (StoreClient::new(Arc::new(manager)), backend)
}

#[derive(Debug)]
struct LookupError(String);

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lookup failed: {}", self.0)
    }
}

// == Cache-Aside Tests ==

#[test]
fn test_repeated_call_computes_once() {
    let (client, _) = connect(Config::default());
    let memo = Memoizer::new(&client, MemoizeOptions::new().namespace("orders"));
    let calls = AtomicU32::new(0);

    let load = |id: u64| {
        memo.call("load_order", &CallArgs::new().arg(id), || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, LookupError>(vec![format!("order-{}", id)])
        })
    };

    assert_eq!(load(7).unwrap(), vec!["order-7".to_string()]);
    assert_eq!(load(7).unwrap(), vec!["order-7".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_json_results_are_stored_as_text() {
    let (client, _) = connect(Config::default());
    let memo = Memoizer::new(&client, MemoizeOptions::new().namespace("json").use_json(true));
    let args = CallArgs::new().kwarg("user", "ada");

    memo.call_infallible("profile", &args, || ("ada".to_string(), 36u8))
        .unwrap();

    let key = memo.key_for("profile", &args).unwrap();
    let raw: Option<serde_json::Value> = client
        .with_codec(memo_cache::Codec::Json)
        .get(key.as_str())
        .unwrap();
    assert_eq!(raw, Some(serde_json::json!(["ada", 36])));
}

#[test]
fn test_computation_errors_reach_the_caller() {
    let (client, backend) = connect(Config::default());
    let memo = Memoizer::new(&client, MemoizeOptions::new().namespace("orders"));

    let result: Result<u32, CallError<LookupError>> = memo.call("load_order", &CallArgs::new().arg(1), || {
        Err(LookupError("not found".to_string()))
    });

    match result {
        Err(CallError::Computation(err)) => assert_eq!(err.to_string(), "lookup failed: not found"),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(backend.is_empty(), "failed computations are not cached");
}

// == Degradation Tests ==

#[test]
fn test_store_outage_degrades_to_direct_computation() {
    let (client, backend) = connect(Config::default());
    let memo = Memoizer::new(&client, MemoizeOptions::new().namespace("orders"));
    let calls = AtomicU32::new(0);
    let args = CallArgs::new().arg(1);
    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        10u32
    };

    backend.set_available(false);
    for _ in 0..3 {
        assert_eq!(memo.call_infallible("total", &args, compute).unwrap(), 10);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(client.manager().state(), ConnectionState::Disconnected);

    // Recovered store is picked up by the next health check on a new connection
    backend.set_available(true);
    memo.call_infallible("total", &args, compute).unwrap();
    memo.call_infallible("total", &args, compute).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(client.manager().state(), ConnectionState::Connected);
    // initial connect, three failed replacements, one that succeeded
    assert_eq!(backend.connect_attempts(), 5);
}

#[test]
fn test_never_connected_client_still_computes() {
    init_tracing();
    let backend = MemoryBackend::new();
    backend.set_available(false);
    let manager = ConnectionManager::new(Config::default(), backend.clone()).unwrap();
    let client = StoreClient::new(Arc::new(manager));
    let memo = Memoizer::new(&client, MemoizeOptions::new());

    assert_eq!(client.manager().state(), ConnectionState::Failed);
    assert_eq!(memo.call_infallible("f", &CallArgs::new(), || 3u8).unwrap(), 3);
    assert_eq!(memo.stats().bypasses, 1);

    backend.set_available(true);
    assert!(client.manager().reconnect(None));
    memo.call_infallible("f", &CallArgs::new(), || 3u8).unwrap();
    assert_eq!(memo.stats().misses, 1);
}

// == Invalidation Tests ==

#[test]
fn test_namespace_invalidation_is_scoped() {
    let (client, _) = connect(Config::default());
    let orders = Memoizer::new(&client, MemoizeOptions::new().namespace("orders"));
    let users = Memoizer::new(&client, MemoizeOptions::new().namespace("users"));
    let args = CallArgs::new().arg(1);

    orders.call_infallible("get", &args, || 1u32).unwrap();
    orders.call_infallible("list", &args, || 2u32).unwrap();
    users.call_infallible("get", &args, || 3u32).unwrap();

    assert_eq!(client.delete_namespace("orders").unwrap(), 2);

    let order_key = orders.key_for("get", &args).unwrap();
    let user_key = users.key_for("get", &args).unwrap();
    assert_eq!(client.get::<u32>(order_key.as_str()).unwrap(), None);
    assert_eq!(client.get::<u32>(user_key.as_str()).unwrap(), Some(3));
}

#[test]
fn test_invalidate_all_flushes_memoizer_namespace() {
    let (client, _) = connect(Config::default());
    let memo = Memoizer::new(&client, MemoizeOptions::new().namespace("reports"));

    for day in 1..=3u32 {
        memo.call_infallible("daily", &CallArgs::new().arg(day), || day * 100)
            .unwrap();
    }

    assert_eq!(client.keys("reports:*").len(), 3);
    assert_eq!(memo.invalidate_all().unwrap(), 3);
    assert!(client.keys("reports:*").is_empty());
}

#[test]
fn test_delete_all_is_surfaced_when_store_down() {
    let (client, backend) = connect(Config::default());
    backend.set_available(false);

    assert!(matches!(client.delete_all(), Err(CacheError::Store(_))));
}

// == TTL Tests ==

#[test]
fn test_ttl_sentinels() {
    let (client, _) = connect(Config::default());
    client.set_persistent("pinned", &1u8).unwrap();
    client.set("short", &1u8, Some(Duration::from_millis(50))).unwrap();

    assert_eq!(client.ttl("never-set"), Ttl::Missing);
    assert_eq!(client.ttl("pinned"), Ttl::Persistent);
    assert_ne!(client.ttl("never-set"), client.ttl("pinned"));

    thread::sleep(Duration::from_millis(80));
    assert!(client.is_expired("short"));
    assert!(!client.is_expired("pinned"));
}

#[test]
fn test_memoized_results_expire() {
    let (client, _) = connect(Config::default());
    let memo = Memoizer::new(
        &client,
        MemoizeOptions::new()
            .namespace("short")
            .ttl(Duration::from_millis(50)),
    );
    let calls = AtomicU32::new(0);
    let compute = || calls.fetch_add(1, Ordering::SeqCst);

    memo.call_infallible("tick", &CallArgs::new(), compute).unwrap();
    thread::sleep(Duration::from_millis(80));
    memo.call_infallible("tick", &CallArgs::new(), compute).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// == Reconnect Tests ==

#[test]
fn test_reconnect_follows_backoff_schedule() {
    init_tracing();
    let backend = MemoryBackend::new();
    backend.set_available(false);
    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&sleeps);
    let config = Config {
        conn_retries: 4,
        max_sleep_secs: 30,
        ..Config::default()
    };
    let manager = ConnectionManager::new(config, backend.clone())
        .unwrap()
        .with_sleeper(move |delay| recorded.lock().unwrap().push(delay.as_secs()));

    assert!(!manager.reconnect(None));
    assert_eq!(*sleeps.lock().unwrap(), vec![1, 3, 9, 27]);
}

#[test]
fn test_safe_reconnect_returns_once_store_recovers() {
    init_tracing();
    let backend = MemoryBackend::new();
    backend.set_available(false);
    let waits = Arc::new(AtomicU32::new(0));

    let store = backend.clone();
    let counter = Arc::clone(&waits);
    let manager = ConnectionManager::new(Config::default(), backend.clone())
        .unwrap()
        .with_sleeper(move |_| {
            // The store comes back after a few failed attempts
            if counter.fetch_add(1, Ordering::SeqCst) == 4 {
                store.set_available(true);
            }
        });

    manager.safe_reconnect();

    assert!(manager.is_connected());
    assert_eq!(waits.load(Ordering::SeqCst), 5);
}

// == Concurrency Tests ==

#[test]
fn test_shared_memoizer_across_threads() {
    let (client, _) = connect(Config::default());
    let memo = Arc::new(Memoizer::new(&client, MemoizeOptions::new().namespace("threads")));

    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let memo = Arc::clone(&memo);
            thread::spawn(move || {
                memo.call_infallible("mod", &CallArgs::new().arg(i % 2), move || i % 2)
                    .unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), i as u32 % 2);
    }
    assert_eq!(client.keys("threads:*").len(), 2);
    assert_eq!(memo.stats().calls(), 8);
}
