use async_trait::async_trait;
use portal_codec::{read_frame, CodecErrorKind, GraphCodec};
use portal_dispatch::wire::{WireOutcome, WireResponse};
use portal_dispatch::{
    AuthDecision, CallOutcome, ChannelError, Dashboard, DataPortal, DataPortalRequest,
    DataPortalTarget, ExecutionFault, InterceptArgs, InterceptError, Interceptor,
    LoopbackChannel, OperationContext, PortalConfig, PortalFault, PortalHost, RemoteChannel,
    TargetRegistry, TargetResult,
};
use portal_model::{
    ContextMap, EntityRef, EntitySchema, FieldDef, OpaqueValue, PropertyInfo, TrackStatus,
    TypeRegistry, Value,
};
use portal_types::{Operation, Principal};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ID: PropertyInfo<i64> = PropertyInfo::new("id");
const NAME: PropertyInfo<String> = PropertyInfo::new("name");
const ADDRESS: PropertyInfo<Option<EntityRef>> = PropertyInfo::new("address");
const BILLING: PropertyInfo<Option<EntityRef>> = PropertyInfo::new("billing");
const CITY: PropertyInfo<String> = PropertyInfo::new("city");

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
        vec![
            FieldDef::integer("id"),
            FieldDef::text("name"),
            FieldDef::child("address"),
            FieldDef::child("billing"),
        ],
    ))
    .unwrap();
    reg.register(EntitySchema::new("Address", vec![FieldDef::text("city")]))
        .unwrap();
    Arc::new(reg)
}

struct CustomerTarget {
    registry: Arc<TypeRegistry>,
    log: Log,
}

#[async_trait]
impl DataPortalTarget for CustomerTarget {
    async fn fetch(&self, criteria: &Value, ctx: &mut OperationContext<'_>) -> TargetResult<Value> {
        let id = match criteria {
            Value::Int(id) if *id > 0 => *id,
            _ => return Err(ExecutionFault::target("no such customer")),
        };
        let customer = self
            .registry
            .create("Customer")
            .map_err(|e| ExecutionFault::target(e.to_string()))?;
        customer.load(&ID, id).unwrap();
        customer.load(&NAME, format!("customer {id}")).unwrap();
        ctx.global_context.insert("fetched", id);
        ctx.global_context.remove("stale");
        Ok(customer.into())
    }

    async fn update(&self, entity: &EntityRef, ctx: &mut OperationContext<'_>) -> TargetResult<()> {
        let address = entity.get(&ADDRESS).unwrap();
        let billing = entity.get(&BILLING).unwrap();
        let shared = matches!((&address, &billing), (Some(a), Some(b)) if a.ptr_eq(b));
        let current = matches!(
            ctx.global_context.get("current"),
            Some(Value::Entity(e)) if e.ptr_eq(entity)
        );
        self.log
            .lock()
            .unwrap()
            .push(format!("update shared={shared} current={current}"));
        ctx.global_context.remove("current");
        Ok(())
    }
}

struct Recorder {
    log: Log,
}

impl Interceptor for Recorder {
    fn initialize(&self, _: &InterceptArgs<'_>) -> Result<(), InterceptError> {
        self.log.lock().unwrap().push("init".into());
        Ok(())
    }

    fn complete(&self, _: &InterceptArgs<'_>, outcome: CallOutcome<'_>) -> Result<(), InterceptError> {
        let status = if outcome.is_success() { "ok" } else { "err" };
        self.log.lock().unwrap().push(format!("complete:{status}"));
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
    targets
}

fn codec() -> GraphCodec {
    GraphCodec::new(registry())
}

fn host(log: &Log) -> Arc<PortalHost> {
    let server = DataPortal::builder()
        .local(targets(log))
        .rule(|_: &str, op: Operation, _: &Principal| {
            if op == Operation::Delete {
                AuthDecision::Denied("deletes are disabled".into())
            } else {
                AuthDecision::Allowed
            }
        })
        .build()
        .unwrap();
    Arc::new(PortalHost::new(server, codec()))
}

fn remote(log: &Log) -> DataPortal {
    let channel = LoopbackChannel::new(host(log));
    DataPortal::builder()
        .remote(Arc::new(channel), codec())
        .build()
        .unwrap()
}

fn remote_over(channel: impl RemoteChannel + 'static, config: PortalConfig, log: &Log) -> DataPortal {
    DataPortal::builder()
        .remote(Arc::new(channel), codec())
        .interceptor(Recorder {
            log: Arc::clone(log),
        })
        .config(config)
        .build()
        .unwrap()
}

// ── Test channels ────────────────────────────────────────────────

struct HangingChannel;

#[async_trait]
impl RemoteChannel for HangingChannel {
    async fn send(&self, _: Vec<u8>) -> Result<Vec<u8>, ChannelError> {
        std::future::pending().await
    }
}

struct FailingChannel(ChannelError);

#[async_trait]
impl RemoteChannel for FailingChannel {
    async fn send(&self, _: Vec<u8>) -> Result<Vec<u8>, ChannelError> {
        Err(self.0.clone())
    }
}

#[derive(Default)]
struct CountingChannel {
    sent: AtomicUsize,
    reply: Vec<u8>,
}

#[async_trait]
impl RemoteChannel for CountingChannel {
    async fn send(&self, _: Vec<u8>) -> Result<Vec<u8>, ChannelError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn execution_cause(cause: &PortalFault) -> &ExecutionFault {
    match cause {
        PortalFault::Execution(fault) => fault,
        other => panic!("expected an execution fault, got {other:?}"),
    }
}

// ── Equivalence ──────────────────────────────────────────────────

#[tokio::test]
async fn remote_fetch_matches_local_fetch() {
    let log = Log::default();
    let local = DataPortal::builder().local(targets(&log)).build().unwrap();
    let remote = remote(&log);

    let request = || {
        let mut global = ContextMap::new();
        global.insert("tenant", "acme");
        global.insert("stale", 1i64);
        DataPortalRequest::new("Customer", Operation::Fetch, 7i64).with_global_context(global)
    };
    let l = local.execute(request()).await.unwrap();
    let r = remote.execute(request()).await.unwrap();

    let (le, re) = (l.entity().unwrap(), r.entity().unwrap());
    assert_eq!(le.get(&NAME).unwrap(), re.get(&NAME).unwrap());
    assert_eq!(le.state(), re.state());
    assert_eq!(le.is_dirty(), re.is_dirty());

    let keys = |ctx: &ContextMap| ctx.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>();
    assert_eq!(keys(&l.global_context), keys(&r.global_context));
    assert_eq!(r.global_context.get("fetched"), Some(&Value::Int(7)));
}

#[tokio::test]
async fn remote_target_fault_matches_local_fault() {
    let log = Log::default();
    let local = DataPortal::builder().local(targets(&log)).build().unwrap();
    let remote = remote(&log);

    let l = local.fetch("Customer", 0i64).await.unwrap_err();
    let r = remote.fetch("Customer", 0i64).await.unwrap_err();
    assert_eq!(l.to_string(), r.to_string());
    assert!(matches!(
        execution_cause(&r.cause),
        ExecutionFault::Target(m) if m == "no such customer"
    ));
}

#[tokio::test]
async fn unimplemented_remote_operation_is_not_implemented() {
    let log = Log::default();
    let err = remote(&log)
        .create("Customer", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(execution_cause(&err.cause), ExecutionFault::NotImplemented));
}

// ── Graph identity across the boundary ───────────────────────────

#[tokio::test]
async fn remote_update_preserves_sharing_and_flags() {
    let log = Log::default();
    let reg = registry();
    let customer = reg.create("Customer").unwrap();
    customer.mark_old();
    let address = reg.create("Address").unwrap();
    address.mark_old();
    address.load(&CITY, "Oslo".to_string()).unwrap();
    customer.set(&NAME, "Ann".to_string()).unwrap();
    customer.set(&ADDRESS, Some(address.clone())).unwrap();
    customer.set(&BILLING, Some(address)).unwrap();

    let mut global = ContextMap::new();
    global.insert("current", customer.clone());
    let request = DataPortalRequest::update(&customer).with_global_context(global);
    let result = remote(&log).execute(request).await.unwrap();

    assert_eq!(entries(&log), vec!["update shared=true current=true"]);

    let saved = result.entity().unwrap();
    assert!(!saved.ptr_eq(&customer), "remote saves return a new instance");
    assert!(!saved.is_dirty());
    assert_eq!(saved.get(&NAME).unwrap(), "Ann");
    let primary = saved.get(&ADDRESS).unwrap().unwrap();
    let billing = saved.get(&BILLING).unwrap().unwrap();
    assert!(primary.ptr_eq(&billing));
    assert_eq!(primary.get(&CITY).unwrap(), "Oslo");
    assert!(!result.global_context.contains_key("current"));

    assert!(customer.is_dirty(), "the caller's original is untouched");
}

// ── Transport faults ─────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn timeout_runs_after_hooks_once() {
    init_tracing();
    let log = Log::default();
    let dashboard = Dashboard::new(10);
    let portal = DataPortal::builder()
        .remote(Arc::new(HangingChannel), codec())
        .interceptor(Recorder {
            log: Arc::clone(&log),
        })
        .dashboard(Arc::new(dashboard.clone()))
        .config(PortalConfig {
            timeout_ms: 50,
            ..PortalConfig::default()
        })
        .build()
        .unwrap();

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err.cause, PortalFault::Timeout(d) if d == Duration::from_millis(50)));
    assert_eq!(entries(&log), vec!["init", "complete:err"]);

    dashboard.drain();
    assert_eq!(dashboard.stats().failed_calls, 1);
}

#[tokio::test]
async fn channel_reported_timeout_is_a_timeout() {
    let log = Log::default();
    let portal = remote_over(FailingChannel(ChannelError::Timeout), PortalConfig::default(), &log);
    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn connectivity_failure_is_distinct() {
    init_tracing();
    let log = Log::default();
    let channel = FailingChannel(ChannelError::Connectivity("connection refused".into()));
    let portal = remote_over(channel, PortalConfig::default(), &log);

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    assert!(matches!(err.cause, PortalFault::Connectivity(ref m) if m == "connection refused"));
    assert_eq!(entries(&log), vec!["init", "complete:err"]);
}

// ── Codec faults ─────────────────────────────────────────────────

#[tokio::test]
async fn unencodable_payload_fails_before_sending() {
    let channel = Arc::new(CountingChannel::default());
    let portal = DataPortal::builder()
        .remote(channel.clone(), codec())
        .build()
        .unwrap();

    let payload = Value::Opaque(OpaqueValue::new("money", 5i64));
    let err = portal.fetch("Customer", payload).await.unwrap_err();
    match execution_cause(&err.cause) {
        ExecutionFault::Codec(e) => assert_eq!(e.kind(), CodecErrorKind::Serialization),
        other => panic!("expected a codec fault, got {other:?}"),
    }
    assert_eq!(channel.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn corrupt_reply_is_a_codec_fault() {
    init_tracing();
    let log = Log::default();
    let channel = CountingChannel {
        sent: AtomicUsize::new(0),
        reply: b"garbage".to_vec(),
    };
    let portal = remote_over(channel, PortalConfig::default(), &log);

    let err = portal.fetch("Customer", 1i64).await.unwrap_err();
    match execution_cause(&err.cause) {
        ExecutionFault::Codec(e) => assert_eq!(e.kind(), CodecErrorKind::CorruptStream),
        other => panic!("expected a codec fault, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_request_is_refused() {
    let log = Log::default();
    let channel = CountingChannel::default();
    let config = PortalConfig {
        max_frame_bytes: 64,
        ..PortalConfig::default()
    };
    let portal = remote_over(channel, config, &log);

    let err = portal
        .fetch("Customer", "x".repeat(256).as_str())
        .await
        .unwrap_err();
    match execution_cause(&err.cause) {
        ExecutionFault::Codec(e) => assert_eq!(e.kind(), CodecErrorKind::CorruptStream),
        other => panic!("expected a codec fault, got {other:?}"),
    }
}

// ── Host ─────────────────────────────────────────────────────────

#[tokio::test]
async fn host_side_denial_surfaces_as_remote_fault() {
    let log = Log::default();
    let err = remote(&log).delete("Customer", 1i64).await.unwrap_err();
    match execution_cause(&err.cause) {
        ExecutionFault::Remote { kind, message } => {
            assert_eq!(kind, "authorization");
            assert!(message.contains("deletes are disabled"));
        }
        other => panic!("expected a remote fault, got {other:?}"),
    }
}

#[tokio::test]
async fn host_answers_corrupt_frames_with_a_fault() {
    init_tracing();
    let log = Log::default();
    let reply = host(&log).handle(b"\x00\x00\x00\x02{{").await.unwrap();
    let response: WireResponse = read_frame(&reply, portal_codec::MAX_FRAME_SIZE).unwrap();
    match response.outcome {
        WireOutcome::Fault(fault) => assert_eq!(fault.kind, "codec"),
        WireOutcome::Success(_) => panic!("corrupt request must not succeed"),
    }
}
