use async_trait::async_trait;
use portal_dispatch::{
    AuthDecision, CallOutcome, ConfigError, Dashboard, DataPortal, DataPortalRequest,
    DataPortalTarget, ExecutionFault, InterceptArgs, InterceptError, Interceptor,
    OperationContext, PortalConfig, PortalFault, RequireRole, TargetRegistry, TargetResult,
};
use portal_model::{
    ContextMap, EntityRef, EntitySchema, FieldDef, PropertyInfo, TrackStatus, TypeRegistry, Value,
};
use portal_types::{Operation, Principal};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ID: PropertyInfo<i64> = PropertyInfo::new("id");
const NAME: PropertyInfo<String> = PropertyInfo::new("name");

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Set `RUST_LOG=portal_dispatch=debug` to see the portal's logs.
fn init_tracing() {
    let _ = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .compact()
        .try_init();
}

fn registry() -> Arc<TypeRegistry> {
    let mut reg = TypeRegistry::new();
    reg.register(EntitySchema::new(
        "Customer",
        vec![FieldDef::integer("id"), FieldDef::text("name")],
    ))
    .unwrap();
    Arc::new(reg)
}

struct CustomerTarget {
    registry: Arc<TypeRegistry>,
    log: Log,
}

impl CustomerTarget {
    fn record(&self, what: &str) {
        self.log.lock().unwrap().push(what.to_string());
    }

    fn new_customer(&self) -> TargetResult<EntityRef> {
        self.registry
            .create("Customer")
            .map_err(|e| ExecutionFault::target(e.to_string()))
    }
}

#[async_trait]
impl DataPortalTarget for CustomerTarget {
    async fn create(&self, _: &Value, _: &mut OperationContext<'_>) -> TargetResult<Value> {
        self.record("create");
        Ok(self.new_customer()?.into())
    }

    async fn fetch(&self, criteria: &Value, ctx: &mut OperationContext<'_>) -> TargetResult<Value> {
        self.record("fetch");
        let Value::Int(id) = criteria else {
            return Err(ExecutionFault::target("criteria must be an id"));
        };
        if *id <= 0 {
            return Err(ExecutionFault::target("no such customer"));
        }
        let customer = self.new_customer()?;
        customer.load(&ID, *id).unwrap();
        customer.load(&NAME, format!("customer {id}")).unwrap();

        ctx.global_context.insert("fetched", *id);
        ctx.global_context.remove("stale");
        if let Some(locale) = ctx.client_context.get("locale") {
            ctx.global_context.insert("seen_locale", locale.clone());
        }
        Ok(customer.into())
    }

    async fn insert(&self, _: &EntityRef, _: &mut OperationContext<'_>) -> TargetResult<()> {
        self.record("insert");
        Ok(())
    }

    async fn update(&self, _: &EntityRef, _: &mut OperationContext<'_>) -> TargetResult<()> {
        self.record("update");
        Ok(())
    }

    async fn delete_self(&self, _: &EntityRef, _: &mut OperationContext<'_>) -> TargetResult<()> {
        self.record("delete_self");
        Ok(())
    }
}

struct PanickingTarget;

#[async_trait]
impl DataPortalTarget for PanickingTarget {
    async fn fetch(&self, _: &Value, _: &mut OperationContext<'_>) -> TargetResult<Value> {
        panic!("storage exploded");
    }
}

struct Recorder {
    name: &'static str,
    log: Log,
    fail_initialize: bool,
    fail_complete: bool,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            fail_initialize: false,
            fail_complete: false,
        }
    }
}

impl Interceptor for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&self, _: &InterceptArgs<'_>) -> Result<(), InterceptError> {
        self.log.lock().unwrap().push(format!("{}:init", self.name));
        if self.fail_initialize {
            return Err(InterceptError::new("refused"));
        }
        Ok(())
    }

    fn complete(&self, _: &InterceptArgs<'_>, outcome: CallOutcome<'_>) -> Result<(), InterceptError> {
        let status = if outcome.is_success() { "ok" } else { "err" };
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:complete:{}", self.name, status));
        if self.fail_complete {
            return Err(InterceptError::new("audit failed"));
        }
        Ok(())
    }
}

fn targets(log: &Log) -> TargetRegistry {
    let mut targets = TargetRegistry::new();
    targets.register(
        "Customer",
        CustomerTarget {
            registry: registry(),
            log: Arc::clone(log),
        },
    );
    targets.register("Exploding", PanickingTarget);
    targets
}

fn portal(log: &Log) -> DataPortal {
    DataPortal::builder().local(targets(log)).build().unwrap()
}

async fn fetched_customer(portal: &DataPortal) -> EntityRef {
    let value = portal.fetch("Customer", 1i64).await.unwrap();
    value.as_entity().cloned().unwrap()
}

// ── Builder ──────────────────────────────────────────────────────

#[test]
fn builder_requires_an_executor() {
    let err = DataPortal::builder().build().err().unwrap();
    assert!(matches!(err, ConfigError::MissingExecutor));
}

// ── Lifecycle operations ─────────────────────────────────────────

#[tokio::test]
async fn create_returns_new_entity() {
    let log = Log::default();
    let value = portal(&log).create("Customer", Value::Null).await.unwrap();
    let customer = value.as_entity().unwrap();
    assert!(customer.is_new());
    assert!(customer.is_dirty());
    assert_eq!(entries(&log), vec!["create"]);
}

#[tokio::test]
async fn fetch_returns_clean_old_entity() {
    let log = Log::default();
    let value = portal(&log).fetch("Customer", 5i64).await.unwrap();
    let customer = value.as_entity().unwrap();
    assert!(!customer.is_new());
    assert!(!customer.is_dirty());
    assert_eq!(customer.get(&NAME).unwrap(), "customer 5");
}

#[tokio::test]
async fn update_of_new_entity_inserts() {
    let log = Log::default();
    let portal = portal(&log);
    let customer = registry().create("Customer").unwrap();
    customer.set(&NAME, "Ann".to_string()).unwrap();

    let saved = portal.update(&customer).await.unwrap();
    assert_eq!(entries(&log), vec!["insert"]);
    let saved = saved.as_entity().unwrap();
    assert!(saved.ptr_eq(&customer), "local saves return the same instance");
    assert!(!saved.is_new());
    assert!(!saved.is_dirty());
}

#[tokio::test]
async fn update_of_old_entity_updates() {
    let log = Log::default();
    let portal = portal(&log);
    let customer = portal.fetch("Customer", 3i64).await.unwrap();
    let customer = customer.as_entity().unwrap();
    customer.set(&NAME, "Renamed".to_string()).unwrap();

    portal.update(customer).await.unwrap();
    assert_eq!(entries(&log), vec!["fetch", "update"]);
    assert!(!customer.is_dirty());
}

#[tokio::test]
async fn update_of_deleted_entity_deletes_and_marks_new() {
    let log = Log::default();
    let portal = portal(&log);
    let customer = portal.fetch("Customer", 3i64).await.unwrap();
    let customer = customer.as_entity().unwrap();
    customer.mark_deleted();

    portal.update(customer).await.unwrap();
    assert_eq!(entries(&log), vec!["fetch", "delete_self"]);
    assert!(customer.is_new());
    assert!(!customer.is_deleted());
}

#[tokio::test]
async fn explicit_insert_runs_as_requested() {
    let log = Log::default();
    let portal = portal(&log);
    let customer = fetched_customer(&portal).await;
    let request = DataPortalRequest::new("Customer", Operation::Insert, customer);
    portal.execute(request).await.unwrap();
    assert_eq!(entries(&log), vec!["fetch", "insert"]);
}

#[tokio::test]
async fn unimplemented_operation_fails_with_context() {
    let log = Log::default();
    let err = portal(&log).delete("Customer", 1i64).await.unwrap_err();
    assert_eq!(err.object_type, "Customer");
    assert_eq!(err.operation, Operation::Delete);
    assert!(matches!(err.cause, PortalFault::Execution(ExecutionFault::NotImplemented)));
}

#[tokio::test]
async fn unknown_target_is_an_execution_fault() {
    let log = Log::default();
    let err = portal(&log).fetch("Invoice", 1i64).await.unwrap_err();
    assert!(matches!(
        err.cause,
        PortalFault::Execution(ExecutionFault::UnknownTarget(ref t)) if t == "Invoice"
    ));
}

#[tokio::test]
async fn save_without_entity_payload_is_rejected() {
    let log = Log::default();
    let request = DataPortalRequest::new("Customer", Operation::Update, 5i64);
    let err = portal(&log).execute(request).await.unwrap_err();
    assert!(matches!(
        err.cause,
        PortalFault::Execution(ExecutionFault::InvalidPayload("integer"))
    ));
    assert!(entries(&log).is_empty());
}

// ── Interception ─────────────────────────────────────────────────

#[tokio::test]
async fn hooks_wrap_a_failing_execution_in_order() {
    let log = Log::default();
    let portal = DataPortal::builder()
        .local(targets(&log))
        .interceptor(Recorder::new("a", &log))
        .interceptor(Recorder::new("b", &log))
        .build()
        .unwrap();

    let err = portal.fetch("Customer", 0i64).await.unwrap_err();
    assert_eq!(
        entries(&log),
        vec!["a:init", "b:init", "fetch", "a:complete:err", "b:complete:err"]
    );
    assert!(matches!(
        err.cause,
        PortalFault::Execution(ExecutionFault::Target(ref m)) if m == "no such customer"
    ));
}

#[tokio::test]
async fn failing_initialize_skips_execution_but_not_completion() {
    let log = Log::default();
    let portal = DataPortal::builder()
        .local(targets(&log))
        .interceptor(Recorder {
            fail_initialize: true,
            ..Recorder::new("a", &log)
        })
        .interceptor(Recorder::new("b", &log))
        .build()
        .unwrap();

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert_eq!(
        entries(&log),
        vec!["a:init", "a:complete:err", "b:complete:err"]
    );
    assert!(matches!(
        err.cause,
        PortalFault::Interception { ref interceptor, ref message } if interceptor == "a" && message == "refused"
    ));
}

#[tokio::test]
async fn failing_complete_runs_remaining_hooks_then_fails_the_call() {
    init_tracing();
    let log = Log::default();
    let portal = DataPortal::builder()
        .local(targets(&log))
        .interceptor(Recorder {
            fail_complete: true,
            ..Recorder::new("a", &log)
        })
        .interceptor(Recorder::new("b", &log))
        .build()
        .unwrap();

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert_eq!(
        entries(&log),
        vec!["a:init", "b:init", "fetch", "a:complete:ok", "b:complete:ok"]
    );
    assert!(matches!(err.cause, PortalFault::Interception { .. }));
}

#[tokio::test]
async fn shared_interceptor_serves_several_portals() {
    let log = Log::default();
    let shared: Arc<dyn Interceptor> = Arc::new(Recorder::new("audit", &log));
    let first = DataPortal::builder()
        .local(targets(&log))
        .shared_interceptor(Arc::clone(&shared))
        .build()
        .unwrap();
    let second = DataPortal::builder()
        .local(targets(&log))
        .shared_interceptor(shared)
        .build()
        .unwrap();

    first.fetch("Customer", 1i64).await.unwrap();
    second.fetch("Customer", 0i64).await.unwrap_err();
    assert_eq!(
        entries(&log),
        vec![
            "audit:init",
            "fetch",
            "audit:complete:ok",
            "audit:init",
            "fetch",
            "audit:complete:err",
        ]
    );
}

// ── Authorization ────────────────────────────────────────────────

#[tokio::test]
async fn denial_short_circuits_everything() {
    let log = Log::default();
    let dashboard = Dashboard::new(10);
    let portal = DataPortal::builder()
        .local(targets(&log))
        .rule(RequireRole::new("admin").for_operations(&[Operation::Fetch]))
        .interceptor(Recorder::new("a", &log))
        .dashboard(Arc::new(dashboard.clone()))
        .build()
        .unwrap();

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert!(err.is_authorization());
    assert!(entries(&log).is_empty(), "no hook and no target ran");

    dashboard.drain();
    let stats = dashboard.stats();
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.failed_calls, 1);
}

#[tokio::test]
async fn first_denial_wins() {
    let log = Log::default();
    let consulted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&consulted);
    let portal = DataPortal::builder()
        .local(targets(&log))
        .rule(|_: &str, _: Operation, _: &Principal| AuthDecision::Denied("closed".into()))
        .rule(move |_: &str, _: Operation, _: &Principal| {
            counter.fetch_add(1, Ordering::SeqCst);
            AuthDecision::Allowed
        })
        .build()
        .unwrap();

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert!(matches!(err.cause, PortalFault::Authorization { ref reason } if reason == "closed"));
    assert_eq!(consulted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn role_rule_admits_members() {
    let log = Log::default();
    let portal = DataPortal::builder()
        .local(targets(&log))
        .rule(RequireRole::new("admin"))
        .build()
        .unwrap();
    let request = DataPortalRequest::new("Customer", Operation::Fetch, 1i64)
        .with_principal(Principal::authenticated("ann", vec!["admin".into()]));
    assert!(portal.execute(request).await.is_ok());
}

// ── Context ──────────────────────────────────────────────────────

#[tokio::test]
async fn global_context_changes_are_merged_back() {
    let log = Log::default();
    let mut global = ContextMap::new();
    global.insert("tenant", "acme");
    global.insert("stale", true);
    let mut client = ContextMap::new();
    client.insert("locale", "nb-NO");

    let request = DataPortalRequest::new("Customer", Operation::Fetch, 2i64)
        .with_global_context(global)
        .with_client_context(client);
    let result = portal(&log).execute(request).await.unwrap();

    let ctx = &result.global_context;
    assert_eq!(ctx.get("tenant"), Some(&Value::from("acme")));
    assert_eq!(ctx.get("fetched"), Some(&Value::Int(2)));
    assert_eq!(ctx.get("seen_locale"), Some(&Value::from("nb-NO")));
    assert!(!ctx.contains_key("stale"));
    assert!(!ctx.contains_key("locale"), "client context is never returned");
}

// ── Execution modes ──────────────────────────────────────────────

#[tokio::test]
async fn worker_execution_matches_inline_execution() {
    let log = Log::default();
    let worker = DataPortal::builder()
        .local(targets(&log))
        .config(PortalConfig {
            run_local_on_worker: true,
            ..PortalConfig::default()
        })
        .build()
        .unwrap();

    let value = worker.fetch("Customer", 9i64).await.unwrap();
    assert_eq!(value.as_entity().unwrap().get(&NAME).unwrap(), "customer 9");
}

#[tokio::test]
async fn panicking_target_on_worker_is_an_execution_fault() {
    let log = Log::default();
    let worker = DataPortal::builder()
        .local(targets(&log))
        .config(PortalConfig {
            run_local_on_worker: true,
            ..PortalConfig::default()
        })
        .build()
        .unwrap();

    let err = worker.fetch("Exploding", 1i64).await.unwrap_err();
    assert!(matches!(err.cause, PortalFault::Execution(ExecutionFault::Panicked(_))));
}

#[tokio::test]
async fn panicking_target_inline_is_an_execution_fault() {
    init_tracing();
    let log = Log::default();
    let dashboard = Dashboard::new(10);
    let portal = DataPortal::builder()
        .local(targets(&log))
        .interceptor(Recorder::new("a", &log))
        .dashboard(Arc::new(dashboard.clone()))
        .build()
        .unwrap();

    let err = portal.fetch("Exploding", 1i64).await.unwrap_err();
    assert!(matches!(
        err.cause,
        PortalFault::Execution(ExecutionFault::Panicked(ref m)) if m == "storage exploded"
    ));
    assert_eq!(err.object_type, "Exploding");
    assert_eq!(entries(&log), vec!["a:init", "a:complete:err"]);

    dashboard.drain();
    assert_eq!(dashboard.stats().failed_calls, 1);
}

#[test]
fn blocking_execution_outside_a_runtime() {
    let log = Log::default();
    let request = DataPortalRequest::new("Customer", Operation::Fetch, 4i64);
    let result = portal(&log).execute_blocking(request).unwrap();
    assert_eq!(result.entity().unwrap().get(&ID).unwrap(), 4);
}

#[test]
#[should_panic]
fn begin_execute_needs_a_runtime() {
    let log = Log::default();
    let request = DataPortalRequest::new("Customer", Operation::Fetch, 1i64);
    let _ = portal(&log).begin_execute(request);
}

#[tokio::test]
async fn begin_execute_can_be_awaited() {
    let log = Log::default();
    let pending = portal(&log).begin_execute(DataPortalRequest::new(
        "Customer",
        Operation::Fetch,
        6i64,
    ));
    let result = pending.wait().await.unwrap();
    assert_eq!(result.entity().unwrap().get(&ID).unwrap(), 6);
}

#[tokio::test]
async fn detached_failure_reaches_unhandled_observers() {
    init_tracing();
    let log = Log::default();
    let portal = portal(&log);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let id = portal.unhandled_errors().subscribe(move |err| {
        let _ = tx.send(err.to_string());
    });

    drop(portal.begin_execute(DataPortalRequest::new("Customer", Operation::Fetch, -1i64)));

    let message = rx.recv().await.unwrap();
    assert!(message.contains("no such customer"));
    assert!(portal.unhandled_errors().unsubscribe(id));
}

#[tokio::test]
async fn detached_success_is_not_reported() {
    let log = Log::default();
    let portal = portal(&log);
    let reported = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reported);
    portal.unhandled_errors().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    drop(portal.begin_execute(DataPortalRequest::new("Customer", Operation::Fetch, 1i64)));
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(entries(&log), vec!["fetch"]);
    assert_eq!(reported.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_are_independent() {
    let log = Log::default();
    let portal = portal(&log);

    let calls = (1..=50i64).map(|id| {
        let portal = portal.clone();
        async move {
            let mut global = ContextMap::new();
            global.insert("caller", id);
            let request = DataPortalRequest::new("Customer", Operation::Fetch, id)
                .with_global_context(global);
            portal.execute(request).await
        }
    });
    let results = futures::future::join_all(calls).await;

    for (id, result) in (1..=50i64).zip(results) {
        let result = result.unwrap();
        assert_eq!(result.entity().unwrap().get(&ID).unwrap(), id);
        assert_eq!(result.global_context.get("caller"), Some(&Value::Int(id)));
        assert_eq!(result.global_context.get("fetched"), Some(&Value::Int(id)));
    }
    assert_eq!(entries(&log).len(), 50);
}
