//! Executors: where a call actually runs.

use crate::error::{ExecutionFault, PortalFault};
use crate::request::{DataPortalRequest, DataPortalResult, OperationContext};
use crate::target::{DataPortalTarget, TargetRegistry};
use async_trait::async_trait;
use futures::FutureExt;
use portal_model::{EntityRef, TrackStatus, Value};
use portal_types::{CallId, Operation};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs one authorized, intercepted call and returns its result.
///
/// The returned global context is the executor's copy; merging it into the
/// caller's is the dispatcher's job.
#[async_trait]
pub trait PortalExecutor: Send + Sync {
    async fn execute(
        &self,
        call_id: CallId,
        request: &DataPortalRequest,
    ) -> Result<DataPortalResult, PortalFault>;
}

/// Runs calls in-process against registered targets. Nothing is serialized.
#[derive(Clone)]
pub struct LocalExecutor {
    targets: Arc<TargetRegistry>,
    on_worker: bool,
}

impl LocalExecutor {
    pub fn new(targets: TargetRegistry) -> Self {
        Self {
            targets: Arc::new(targets),
            on_worker: false,
        }
    }

    /// Runs each call on a spawned task rather than the caller's.
    pub fn on_worker(mut self, on_worker: bool) -> Self {
        self.on_worker = on_worker;
        self
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }
}

#[async_trait]
impl PortalExecutor for LocalExecutor {
    async fn execute(
        &self,
        call_id: CallId,
        request: &DataPortalRequest,
    ) -> Result<DataPortalResult, PortalFault> {
        if !self.on_worker {
            return AssertUnwindSafe(run_local(&self.targets, call_id, request))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    warn!("Call {} panicked in {}: {}", call_id, request.object_type, message);
                    Err(ExecutionFault::Panicked(message).into())
                });
        }

        let targets = Arc::clone(&self.targets);
        let request = request.clone();
        let joined =
            tokio::spawn(async move { run_local(&targets, call_id, &request).await }).await;
        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ExecutionFault::Panicked(e.to_string()).into()),
            Err(e) => Err(ExecutionFault::Runtime(e.to_string()).into()),
        }
    }
}

async fn run_local(
    targets: &TargetRegistry,
    call_id: CallId,
    request: &DataPortalRequest,
) -> Result<DataPortalResult, PortalFault> {
    let target = targets
        .get(&request.object_type)
        .ok_or_else(|| ExecutionFault::UnknownTarget(request.object_type.clone()))?;

    let mut global_context = request.global_context.clone();
    let mut ctx = OperationContext {
        call_id,
        object_type: &request.object_type,
        operation: request.operation,
        principal: &request.principal,
        client_context: &request.client_context,
        global_context: &mut global_context,
    };

    let value = match request.operation {
        Operation::Create => {
            let value = target.create(&request.payload, &mut ctx).await?;
            for_each_entity(&value, EntityRef::mark_new);
            value
        }
        Operation::Fetch => {
            let value = target.fetch(&request.payload, &mut ctx).await?;
            for_each_entity(&value, EntityRef::mark_old);
            value
        }
        Operation::Delete => {
            target.delete(&request.payload, &mut ctx).await?;
            Value::Null
        }
        Operation::Insert | Operation::Update | Operation::DeleteSelf => {
            let entity = request
                .payload
                .as_entity()
                .ok_or(ExecutionFault::InvalidPayload(request.payload.kind_name()))?;
            save(target.as_ref(), request.operation, entity, &mut ctx).await?;
            Value::Entity(entity.clone())
        }
    };

    Ok(DataPortalResult {
        value,
        global_context,
    })
}

/// Routes an entity save and applies the lifecycle marker afterwards.
///
/// `Update` is routed by the entity's state: deleted entities are deleted,
/// new ones inserted. `Insert` and `DeleteSelf` run as requested.
async fn save(
    target: &dyn DataPortalTarget,
    requested: Operation,
    entity: &EntityRef,
    ctx: &mut OperationContext<'_>,
) -> Result<(), ExecutionFault> {
    let operation = match requested {
        Operation::Update if entity.is_deleted() => Operation::DeleteSelf,
        Operation::Update if entity.is_new() => Operation::Insert,
        other => other,
    };
    if operation != requested {
        debug!("Routing {} of {} to {}", requested, ctx.object_type, operation);
    }

    match operation {
        Operation::Insert => target.insert(entity, ctx).await?,
        Operation::DeleteSelf => target.delete_self(entity, ctx).await?,
        _ => target.update(entity, ctx).await?,
    }

    match operation {
        Operation::DeleteSelf => entity.mark_new(),
        _ if entity.is_deleted() => entity.mark_new(),
        _ => entity.mark_old(),
    }
    Ok(())
}

/// Applies `mark` to an entity result, or to every item of a list result.
fn for_each_entity(value: &Value, mark: fn(&EntityRef)) {
    match value {
        Value::Entity(entity) => mark(entity),
        Value::List(list) => list.items().iter().for_each(mark),
        _ => {}
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "target panicked".to_string()
    }
}
