//! End-to-end tests of the engine: ordering, failure handling, phases,
//! recovery and the events each of them publishes.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use startup_orchestrator::{
    EventFilter, EventTopic, FnStartable, Health, Lifecycle, OrchestratorConfig, OverallHealth,
    ServiceError, ServiceEvent, Startable, StartupApi, StartupError, StartupOverallStatus,
    ServiceEngine, StartupPhase,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;

/// Appends its name to a shared log on start and stop.
struct Recorder {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail_with: Option<String>,
}

impl Recorder {
    fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
            fail_with: None,
        })
    }

    fn failing(name: &str, log: &Arc<Mutex<Vec<String>>>, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
            fail_with: Some(message.to_string()),
        })
    }
}

#[async_trait]
impl Startable for Recorder {
    async fn start(&self) -> Result<(), ServiceError> {
        self.log.lock().push(format!("start:{}", self.name));
        match &self.fail_with {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.log.lock().push(format!("stop:{}", self.name));
        Ok(())
    }
}

fn engine() -> ServiceEngine {
    ServiceEngine::new(OrchestratorConfig::fast())
}

fn deps(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn initialized_names(events: &[ServiceEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServiceEvent::ServiceInitialized { service_name, .. } => Some(service_name.clone()),
            _ => None,
        })
        .collect()
}

/// Register the three-service example used throughout.
fn register_core(engine: &ServiceEngine, log: &Arc<Mutex<Vec<String>>>) {
    engine.register_service(
        "Backend",
        deps(&["EventManager", "ServiceRegistry"]),
        Some(Recorder::new("Backend", log)),
    );
    engine.register_service(
        "ServiceRegistry",
        deps(&["EventManager"]),
        Some(Recorder::new("ServiceRegistry", log)),
    );
    engine.register_service("EventManager", vec![], Some(Recorder::new("EventManager", log)));
}

// =============================================================================
// ORDERING
// =============================================================================

#[tokio::test]
async fn test_services_start_in_dependency_order() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));

    engine.initialize_all().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec!["start:EventManager", "start:ServiceRegistry", "start:Backend"]
    );
    assert_eq!(
        initialized_names(&sub.drain()),
        vec!["EventManager", "ServiceRegistry", "Backend"]
    );
    for status in engine.get_service_status() {
        assert_eq!(status.lifecycle, Lifecycle::Running);
        assert_eq!(status.health, Health::Healthy);
    }
    assert_eq!(engine.overall_health(), OverallHealth::Healthy);
}

#[tokio::test]
async fn test_all_initialized_event_follows_last_service() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    let mut sub = engine.subscribe(EventFilter::topics(vec![
        EventTopic::Lifecycle,
        EventTopic::Startup,
    ]));

    engine.initialize_all().await.unwrap();

    let events = sub.drain();
    match events.last() {
        Some(ServiceEvent::AllServicesInitialized {
            total_services,
            running_services,
            ..
        }) => {
            assert_eq!(*total_services, 3);
            assert_eq!(*running_services, 3);
        }
        other => panic!("expected services.all_initialized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cycle_aborts_before_any_service_starts() {
    let engine = engine();
    engine.register_service("A", deps(&["B"]), None);
    engine.register_service("B", deps(&["A"]), None);
    let mut sub = engine.subscribe(EventFilter::all());

    let err = engine.initialize_all().await.unwrap_err();

    assert!(matches!(err, StartupError::Cycle { .. }));
    assert!(engine.get_service_status().is_empty());
    assert!(sub.drain().is_empty());
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn test_failure_stops_sequence_and_leaves_dependents_pending() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_service("X", deps(&["Y"]), Some(Recorder::new("X", &log)));
    engine.register_service("Y", vec![], Some(Recorder::failing("Y", &log, "config missing")));
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));

    let err = engine.initialize_all().await.unwrap_err();

    assert_eq!(
        err,
        StartupError::StartRoutine {
            service: "Y".to_string(),
            message: "config missing".to_string(),
        }
    );
    assert_eq!(*log.lock(), vec!["start:Y"]);

    let y = engine.get_status_by_name("Y").unwrap();
    assert_eq!(y.lifecycle, Lifecycle::Failed);
    assert_eq!(y.health, Health::Critical);
    assert_eq!(y.last_error.as_deref(), Some("config missing"));

    let x = engine.get_status_by_name("X").unwrap();
    assert_eq!(x.lifecycle, Lifecycle::Pending);

    let events = sub.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServiceEvent::ServiceInitializationFailed {
            service_name,
            error,
            ..
        } => {
            assert_eq!(service_name, "Y");
            assert_eq!(error, "config missing");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_external_dependency_times_out() {
    let engine = engine();
    engine.register_service("Api", deps(&["Database"]), None);

    let started = Instant::now();
    let err = engine.initialize_all().await.unwrap_err();

    assert!(started.elapsed() >= engine.config().dependency_timeout);
    assert!(matches!(
        err,
        StartupError::DependencyTimeout { ref service, ref unready }
            if service == "Api" && unready == &vec!["Database".to_string()]
    ));
    assert_eq!(
        engine.get_status_by_name("Api").unwrap().last_error.as_deref(),
        Some("dependencies not ready within timeout: Database")
    );
}

#[tokio::test]
async fn test_external_dependency_satisfied_by_host() {
    let engine = engine();
    engine.register_service("Api", deps(&["Database"]), None);

    let registry = engine.registry();
    let host = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        registry
            .update("Database", Lifecycle::Running, Health::Healthy, None)
            .await;
    });

    engine.initialize_all().await.unwrap();
    host.await.unwrap();

    assert_eq!(
        engine.get_status_by_name("Api").unwrap().lifecycle,
        Lifecycle::Running
    );
}

#[tokio::test]
async fn test_report_is_partial_with_one_failure_in_five() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["A", "B", "C", "D"] {
        engine.register_service(name, vec![], None);
    }
    engine.register_service("E", vec![], Some(Recorder::failing("E", &log, "boom")));

    assert!(engine.initialize_all().await.is_err());

    let report = engine.report();
    assert_eq!(report.total_services, 5);
    assert_eq!(report.running_services, 4);
    assert_eq!(report.failed_services, 1);
    assert_eq!(report.overall_status, StartupOverallStatus::Partial);
    assert!(report.is_operational());
}

// =============================================================================
// HEALTH
// =============================================================================

#[tokio::test]
async fn test_overall_health_thresholds() {
    let engine = engine();
    let registry = engine.registry();
    assert_eq!(engine.overall_health(), OverallHealth::Unhealthy);

    for name in ["A", "B", "C"] {
        registry
            .update(name, Lifecycle::Running, Health::Healthy, None)
            .await;
    }
    assert_eq!(engine.overall_health(), OverallHealth::Healthy);

    registry.record_failure("C", "down").await;
    assert_eq!(engine.overall_health(), OverallHealth::Degraded);

    registry
        .update("B", Lifecycle::Running, Health::Warning, None)
        .await;
    assert_eq!(engine.overall_health(), OverallHealth::Unhealthy);
    assert!(!engine.is_healthy("B"));
    assert!(!engine.is_healthy("Unregistered"));
}

// =============================================================================
// RECOVERY
// =============================================================================

#[tokio::test]
async fn test_restart_publishes_one_event_and_leaves_others_alone() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    engine.initialize_all().await.unwrap();

    let before_em = engine.get_status_by_name("EventManager").unwrap();
    let before_sr = engine.get_status_by_name("ServiceRegistry").unwrap();
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));

    engine.restart("ServiceRegistry").await.unwrap();

    let events = sub.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ServiceEvent::ServiceRestarted { service_name, .. } if service_name == "ServiceRegistry"
    ));

    // Backend depends on ServiceRegistry but is not restarted
    assert_eq!(log.lock().iter().filter(|l| *l == "start:Backend").count(), 1);
    assert_eq!(engine.get_status_by_name("EventManager").unwrap(), before_em);

    let after_sr = engine.get_status_by_name("ServiceRegistry").unwrap();
    assert_eq!(after_sr.lifecycle, Lifecycle::Running);
    assert!(after_sr.last_updated >= before_sr.last_updated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_during_initialize_all_keeps_registry_consistent() {
    let engine = Arc::new(engine());
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);

    let restarter = Arc::clone(&engine);
    let restart = tokio::spawn(async move { restarter.restart("EventManager").await });
    engine.initialize_all().await.unwrap();
    restart.await.unwrap().unwrap();

    for status in engine.get_service_status() {
        assert_eq!(status.lifecycle, Lifecycle::Running, "{}", status.service_name);
    }
    let em_starts = log.lock().iter().filter(|l| *l == "start:EventManager").count();
    assert!((1..=2).contains(&em_starts));
    assert_eq!(log.lock().iter().filter(|l| *l == "start:Backend").count(), 1);
}

#[tokio::test]
async fn test_restart_failure_publishes_failure_event() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_service("Api", vec![], Some(Recorder::failing("Api", &log, "bind failed")));
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));

    let err = engine.restart("Api").await.unwrap_err();

    assert!(matches!(err, StartupError::StartRoutine { .. }));
    let events = sub.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "service.initialization_failed");
    assert_eq!(
        engine.get_status_by_name("Api").unwrap().last_error.as_deref(),
        Some("bind failed")
    );
}

#[tokio::test]
async fn test_restart_unknown_service_fails() {
    let engine = engine();
    assert_eq!(
        engine.restart("Ghost").await,
        Err(StartupError::UnknownService("Ghost".to_string()))
    );
}

#[tokio::test]
async fn test_restart_request_over_bus() {
    let engine = engine();
    engine.register_service("Cache", vec![], None);
    engine.registry().record_failure("Cache", "evicted").await;
    assert!(engine.start_restart_listener());

    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));
    engine.request_restart("Cache").await;

    let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("restart did not complete")
        .unwrap();
    assert!(matches!(
        event,
        ServiceEvent::ServiceRestarted { ref service_name, .. } if service_name == "Cache"
    ));
    assert!(engine.is_healthy("Cache"));

    engine.stop_restart_listener().await;
}

#[tokio::test]
async fn test_shutdown_stops_in_reverse_order() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    engine.initialize_all().await.unwrap();
    log.lock().clear();
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]));

    engine.shutdown_all().await;

    assert_eq!(
        *log.lock(),
        vec!["stop:Backend", "stop:ServiceRegistry", "stop:EventManager"]
    );
    let stopped: Vec<String> = sub
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            ServiceEvent::ServiceStopped { service_name, .. } => Some(service_name),
            _ => None,
        })
        .collect();
    assert_eq!(stopped, vec!["Backend", "ServiceRegistry", "EventManager"]);
    assert!(engine.get_service_status().is_empty());
}

#[tokio::test]
async fn test_restart_all_runs_full_sequence_again() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    engine.initialize_all().await.unwrap();
    log.lock().clear();

    engine.restart_all().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "stop:Backend",
            "stop:ServiceRegistry",
            "stop:EventManager",
            "start:EventManager",
            "start:ServiceRegistry",
            "start:Backend",
        ]
    );
    assert_eq!(engine.overall_health(), OverallHealth::Healthy);
}

// =============================================================================
// PHASES
// =============================================================================

#[tokio::test]
async fn test_phased_startup_events_and_leftovers() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    engine.register_service("Monitor", deps(&["ServiceRegistry"]), None);
    engine.set_phases(vec![
        StartupPhase::new("Core Initialization", ["EventManager", "ServiceRegistry"]),
        StartupPhase::new("Backend Services", ["Backend"]),
        StartupPhase::new("System Ready", Vec::<String>::new()),
    ]);
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Startup]));

    engine.initialize_phased().await.unwrap();

    let names: Vec<&str> = sub.drain().iter().map(ServiceEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "startup.phase_started",
            "startup.phase_completed",
            "startup.phase_started",
            "startup.phase_completed",
            "startup.phase_started",
            "startup.phase_completed",
            "startup.sequence_complete",
            "services.all_initialized",
        ]
    );
    assert!(engine.is_healthy("Monitor"));

    let progress = engine.current_phase().unwrap();
    assert_eq!((progress.phase, progress.total), (3, 3));
    assert_eq!(progress.name, "System Ready");
}

#[tokio::test]
async fn test_parallel_phase_members_run_concurrently() {
    let engine = engine();
    let barrier = Arc::new(Barrier::new(2));
    for name in ["Configurator", "Rf4s"] {
        let barrier = Arc::clone(&barrier);
        engine.register_service(
            name,
            vec![],
            Some(FnStartable::shared(move || {
                let barrier = Arc::clone(&barrier);
                async move {
                    // Deadlocks unless both members are running at once
                    barrier.wait().await;
                    Ok(())
                }
            })),
        );
    }
    engine.set_phases(vec![
        StartupPhase::new("Integration Services", ["Configurator", "Rf4s"]).parallel()
    ]);

    tokio::time::timeout(Duration::from_secs(2), engine.initialize_phased())
        .await
        .expect("parallel phase members did not overlap")
        .unwrap();

    assert!(engine.is_healthy("Configurator"));
    assert!(engine.is_healthy("Rf4s"));
}

#[tokio::test]
async fn test_failed_phase_stops_later_phases() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_service("A", vec![], Some(Recorder::failing("A", &log, "no license")));
    engine.register_service("B", vec![], Some(Recorder::new("B", &log)));
    engine.set_phases(vec![
        StartupPhase::new("First", ["A"]),
        StartupPhase::new("Second", ["B"]),
    ]);
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Startup]));

    assert!(engine.initialize_phased().await.is_err());

    let events = sub.drain();
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[1],
        ServiceEvent::PhaseFailed { phase_name, .. } if phase_name == "First"
    ));
    assert_eq!(*log.lock(), vec!["start:A"]);
    assert_eq!(
        engine.get_status_by_name("B").unwrap().lifecycle,
        Lifecycle::Pending
    );
}

#[tokio::test]
async fn test_phase_waits_for_member_restarting_elsewhere() {
    let engine = Arc::new(engine());
    engine.register_service(
        "A",
        vec![],
        Some(FnStartable::shared(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })),
    );
    engine.set_phases(vec![StartupPhase::new("Core", ["A"])]);

    let restarter = Arc::clone(&engine);
    let restart = tokio::spawn(async move { restarter.restart("A").await });
    while engine.get_status_by_name("A").map(|s| s.lifecycle) != Some(Lifecycle::Initializing) {
        tokio::task::yield_now().await;
    }

    engine.initialize_phased().await.unwrap();

    assert_eq!(engine.get_status_by_name("A").unwrap().lifecycle, Lifecycle::Running);
    restart.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_phase_incomplete_when_restarting_member_fails() {
    let engine = Arc::new(engine());
    let log = Arc::new(Mutex::new(Vec::new()));
    engine.register_service("A", vec![], Some(Recorder::failing("A", &log, "disk full")));
    engine.set_phases(vec![StartupPhase::new("Core", ["A"])]);
    let mut sub = engine.subscribe(EventFilter::topics(vec![EventTopic::Startup]));

    let restarter = Arc::clone(&engine);
    let restart = tokio::spawn(async move { restarter.restart("A").await });
    while engine.get_status_by_name("A").map(|s| s.lifecycle) != Some(Lifecycle::Initializing) {
        tokio::task::yield_now().await;
    }

    let err = engine.initialize_phased().await.unwrap_err();

    assert!(matches!(
        err,
        StartupError::PhaseIncomplete { ref phase, ref unready } if phase == "Core" && unready == &deps(&["A"])
    ));
    assert!(restart.await.unwrap().is_err());
    assert!(matches!(
        sub.drain().last(),
        Some(ServiceEvent::PhaseFailed { phase_name, .. }) if phase_name == "Core"
    ));
}

#[tokio::test]
async fn test_phase_depending_on_unphased_service_is_rejected() {
    let engine = engine();
    engine.register_service("A", vec![], None);
    engine.register_service("B", deps(&["A"]), None);
    engine.set_phases(vec![StartupPhase::new("Core", ["B"])]);

    let started = Instant::now();
    let err = engine.initialize_phased().await.unwrap_err();

    assert!(matches!(err, StartupError::InvalidPhasePlan(_)));
    assert!(started.elapsed() < engine.config().dependency_timeout);
    assert!(engine.get_service_status().is_empty());
}

#[tokio::test]
async fn test_phase_depending_on_later_phase_is_rejected() {
    let engine = engine();
    engine.register_service("A", vec![], None);
    engine.register_service("B", deps(&["A"]), None);
    engine.set_phases(vec![
        StartupPhase::new("First", ["B"]),
        StartupPhase::new("Second", ["A"]),
    ]);

    let err = engine.initialize_phased().await.unwrap_err();

    assert!(matches!(err, StartupError::InvalidPhasePlan(_)));
    assert!(engine.get_service_status().is_empty());
}

#[tokio::test]
async fn test_flat_startup_clears_phase_progress() {
    let engine = engine();
    let log = Arc::new(Mutex::new(Vec::new()));
    register_core(&engine, &log);
    engine.set_phases(vec![
        StartupPhase::new("Core Initialization", ["EventManager", "ServiceRegistry"]),
        StartupPhase::new("Backend Services", ["Backend"]),
    ]);

    engine.initialize_phased().await.unwrap();
    assert!(engine.current_phase().is_some());

    engine.initialize_all().await.unwrap();
    assert!(engine.current_phase().is_none());
    assert!(engine.report().current_phase.is_none());
}

#[tokio::test]
async fn test_phase_with_unregistered_member_is_rejected() {
    let engine = engine();
    engine.register_service("A", vec![], None);
    engine.set_phases(vec![StartupPhase::new("Core", ["A", "Missing"])]);

    let err = engine.initialize_phased().await.unwrap_err();

    assert!(matches!(err, StartupError::InvalidPhasePlan(_)));
    assert!(engine.get_service_status().is_empty());
}

// =============================================================================
// EVENT STREAM
// =============================================================================

#[tokio::test]
async fn test_event_stream_filters_by_service() {
    let engine = engine();
    engine.register_service("A", vec![], None);
    engine.register_service("B", vec![], None);
    let mut stream = engine.event_stream(EventFilter::for_services(["B"]));

    engine.initialize_all().await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.service_name(), Some("B"));
}
