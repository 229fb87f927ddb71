use player_harness::framework::mock::MockBackend;
use player_harness::framework::{DispatchError, Pool, PoolConfig, Scenario, ScenarioContext};
use player_harness::metrics::MetricsRecorder;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct TestPool {
    pool: Pool,
    backend: MockBackend,
    metrics: Arc<MetricsRecorder>,
    shutdown: CancellationToken,
}

impl TestPool {
    fn start(target: usize, backend: MockBackend) -> Self {
        Self::with_interval(target, Duration::from_millis(1), backend)
    }

    fn with_interval(target: usize, creation_interval: Duration, backend: MockBackend) -> Self {
        let metrics = Arc::new(MetricsRecorder::new());
        let ctx = ScenarioContext::new(Arc::new(backend.clone()), metrics.clone());
        let pool = Pool::new(
            PoolConfig {
                target_players: target,
                creation_interval,
                monitor_interval: Duration::from_millis(20),
            },
            ctx,
        );
        let shutdown = CancellationToken::new();
        pool.start(shutdown.clone());
        Self {
            pool,
            backend,
            metrics,
            shutdown,
        }
    }
}

impl Drop for TestPool {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}

/// The creation loop fills the pool up to target and no further.
#[tokio::test]
async fn test_population_converges_to_target() {
    let t = TestPool::start(10, MockBackend::new());

    assert!(wait_until(Duration::from_secs(2), || t.pool.player_count() == 10).await);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 10).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(t.pool.player_count(), 10);
    assert_eq!(t.metrics.counter("players_total", &[]), 10);
    assert_eq!(t.metrics.counter("player_login_total", &[("status", "success")]), 10);
    assert_eq!(t.pool.registry().len(), 10);
}

/// One player per creation tick: ten ticks of 10ms reach a target of ten.
#[tokio::test(start_paused = true)]
async fn test_creation_is_paced_by_interval() {
    let t = TestPool::with_interval(10, Duration::from_millis(10), MockBackend::new());

    let mut last = 0;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let live = t.pool.player_count();
        assert!(live >= last, "population shrank from {last} to {live}");
        assert!(live <= 10);
        last = live;
    }

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(t.pool.player_count(), 10);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(t.pool.player_count(), 10);
    assert_eq!(t.metrics.counter("players_total", &[]), 10);
}

/// Fifteen fail-fast dispatches against ten idle players: ten land, five starve.
#[tokio::test]
async fn test_concurrent_dispatch_starves_excess() {
    let backend = MockBackend::new().with_latency("matchmaking", Duration::from_secs(5));
    let t = TestPool::start(10, backend);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 10).await);

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();
    for _ in 0..15 {
        let pool = t.pool.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            pool.execute(Scenario::Matchmaking, None, &cancel).await
        }));
    }

    let mut ok = 0;
    let mut starved = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => ok += 1,
            Err(DispatchError::NoPlayerAvailable) => starved += 1,
            Err(e) => panic!("unexpected dispatch error: {e}"),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(starved, 5);

    assert!(wait_until(Duration::from_secs(1), || t.backend.calls("matchmaking") == 10).await);
}

/// A dispatch with a deadline waits for a busy player to come back.
#[tokio::test]
async fn test_deadline_dispatch_waits_for_player() {
    let backend = MockBackend::new().with_latency("matchmaking", Duration::from_millis(100));
    let t = TestPool::start(1, backend);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 1).await);

    let cancel = CancellationToken::new();
    t.pool
        .execute(Scenario::Matchmaking, None, &cancel)
        .await
        .unwrap();

    // The only player is busy: fail-fast starves, a 1s deadline does not.
    assert_eq!(
        t.pool.execute(Scenario::Matchmaking, None, &cancel).await,
        Err(DispatchError::NoPlayerAvailable)
    );
    let started = Instant::now();
    t.pool
        .execute(Scenario::Matchmaking, Some(Duration::from_secs(1)), &cancel)
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(50));

    let wait = t.metrics.histogram("pool_execute_wait_duration_seconds", &[]);
    assert_eq!(wait.count, 2);
}

/// A short deadline expires while every player is busy.
#[tokio::test]
async fn test_deadline_expires_when_pool_busy() {
    let backend = MockBackend::new().with_latency("matchmaking", Duration::from_secs(5));
    let t = TestPool::start(1, backend);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 1).await);

    let cancel = CancellationToken::new();
    t.pool
        .execute(Scenario::Matchmaking, None, &cancel)
        .await
        .unwrap();

    let result = t
        .pool
        .execute(Scenario::Matchmaking, Some(Duration::from_millis(30)), &cancel)
        .await;
    assert_eq!(result, Err(DispatchError::DeadlineExceeded));
}

/// Cancelling the root token ends every lifeline, busy or idle.
#[tokio::test]
async fn test_shutdown_terminates_all_players() {
    let backend = MockBackend::new().with_latency("matchmaking", Duration::from_secs(30));
    let t = TestPool::start(20, backend);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 20).await);

    let cancel = CancellationToken::new();
    for _ in 0..5 {
        t.pool
            .execute(Scenario::Matchmaking, None, &cancel)
            .await
            .unwrap();
    }

    t.shutdown.cancel();
    assert!(wait_until(Duration::from_secs(1), || t.pool.player_count() == 0).await);
    assert!(t.pool.registry().is_empty());
    assert_eq!(
        t.pool.execute(Scenario::Matchmaking, Some(Duration::from_millis(20)), &cancel).await,
        Err(DispatchError::DeadlineExceeded)
    );

    assert_eq!(
        t.metrics
            .counter("scenario_completed_total", &[("scenario", "matchmaking"), ("status", "cancelled")]),
        5
    );
    assert!(
        t.metrics
            .counter("context_cancellations_total", &[("source", "player_scenario_wait")])
            >= 15
    );
}

/// A logged-out player is removed and replaced by a fresh one.
#[tokio::test]
async fn test_logout_is_replaced() {
    let t = TestPool::start(3, MockBackend::new());
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 3).await);
    assert_eq!(t.pool.registry().ids(), vec![1, 2, 3]);

    let cancel = CancellationToken::new();
    t.pool.execute(Scenario::Logout, None, &cancel).await.unwrap();

    assert!(wait_until(Duration::from_secs(2), || t.pool.registry().ids().contains(&4)).await);
    assert!(wait_until(Duration::from_secs(2), || t.pool.player_count() == 3).await);
    assert_eq!(t.pool.registry().len(), 3);
}

/// A player logged out while idle is never handed a scenario.
#[tokio::test]
async fn test_logged_out_player_gets_no_dispatch() {
    let t = TestPool::start(1, MockBackend::new());
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 1).await);

    assert!(t.pool.logout(1));
    let cancel = CancellationToken::new();
    assert_eq!(
        t.pool.execute(Scenario::Matchmaking, None, &cancel).await,
        Err(DispatchError::NoPlayerAvailable)
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(t.backend.calls("matchmaking"), 0);
    assert_eq!(t.backend.calls_for(1), vec!["login"]);
}

/// The replacement for a logged-out idle player takes its queue slot.
#[tokio::test]
async fn test_replacement_takes_idle_slot() {
    let backend = MockBackend::new().with_latency("matchmaking", Duration::from_secs(5));
    let t = TestPool::start(2, backend);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 2).await);

    assert!(t.pool.logout(1));
    assert!(wait_until(Duration::from_secs(2), || t.pool.registry().ids() == vec![2, 3]).await);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 2).await);

    let cancel = CancellationToken::new();
    for _ in 0..2 {
        assert_eq!(t.pool.execute(Scenario::Matchmaking, None, &cancel).await, Ok(()));
    }
    assert!(wait_until(Duration::from_secs(1), || t.backend.calls("matchmaking") == 2).await);
    assert_eq!(t.backend.calls_for(3), vec!["login", "matchmaking"]);
}

/// Logout through the pool handle terminates exactly that player.
#[tokio::test]
async fn test_logout_by_id() {
    let t = TestPool::start(2, MockBackend::new());
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 2).await);

    assert!(t.pool.logout(1));
    assert!(wait_until(Duration::from_secs(1), || t.pool.registry().get(1).is_none()).await);
    assert!(t.pool.registry().get(2).is_some());
    assert!(!t.pool.logout(1));
}

/// Players whose login fails never go idle and are replaced.
#[tokio::test]
async fn test_login_failures_are_replaced() {
    let t = TestPool::start(2, MockBackend::new().fail_login());

    assert!(
        wait_until(Duration::from_secs(2), || {
            t.metrics.counter("player_login_total", &[("status", "failure")]) >= 5
        })
        .await
    );
    assert_eq!(t.pool.idle_count(), 0);
    assert!(t.pool.player_count() <= 2);
}

/// A player never runs two scenarios at once.
#[tokio::test]
async fn test_no_double_dispatch() {
    let backend = MockBackend::new()
        .with_latency("matchmaking", Duration::from_millis(5))
        .with_latency("fetch_store", Duration::from_millis(3));
    let t = TestPool::start(5, backend);
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 5).await);

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();
    for i in 0..200 {
        let pool = t.pool.clone();
        let cancel = cancel.clone();
        let scenario = if i % 2 == 0 {
            Scenario::Matchmaking
        } else {
            Scenario::fetch_store()
        };
        tasks.push(tokio::spawn(async move {
            let _ = pool
                .execute(scenario, Some(Duration::from_millis(20)), &cancel)
                .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(t.backend.calls("matchmaking") > 0);
    assert_eq!(t.backend.max_in_flight_per_player(), 1);
}

/// Follow-ups run on the same player before it accepts new work.
#[tokio::test]
async fn test_follow_up_runs_before_next_assignment() {
    let t = TestPool::start(1, MockBackend::new());
    assert!(wait_until(Duration::from_secs(2), || t.pool.idle_count() == 1).await);

    let cancel = CancellationToken::new();
    t.pool
        .execute(Scenario::FetchStore { purchase_chance: 1.0 }, None, &cancel)
        .await
        .unwrap();
    t.pool
        .execute(Scenario::Matchmaking, Some(Duration::from_secs(1)), &cancel)
        .await
        .unwrap();

    assert!(wait_until(Duration::from_secs(1), || t.backend.calls_for(1).len() == 4).await);
    assert_eq!(
        t.backend.calls_for(1),
        vec!["login", "fetch_store", "store_purchase", "matchmaking"]
    );
}
