//! The dispatcher: authorization, interception, execution and monitoring
//! around every call.

use crate::auth::{AuthDecision, AuthorizationRule};
use crate::config::PortalConfig;
use crate::dashboard::{CallEvent, DashboardSink, NullDashboard};
use crate::error::{ConfigError, DataPortalError, ExecutionFault, PortalFault, PortalResult};
use crate::executor::{LocalExecutor, PortalExecutor};
use crate::intercept::{CallOutcome, InterceptArgs, Interceptor};
use crate::remote::{RemoteChannel, RemoteProxy};
use crate::request::{DataPortalRequest, DataPortalResult};
use crate::target::TargetRegistry;
use portal_codec::GraphCodec;
use portal_model::{EntityRef, ObserverList, Value};
use portal_types::{CallId, Operation};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Observers of detached calls that failed with nobody waiting.
pub type UnhandledErrorObservers = ObserverList<DataPortalError>;

struct PortalInner {
    executor: Arc<dyn PortalExecutor>,
    rules: Vec<Arc<dyn AuthorizationRule>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    dashboard: Arc<dyn DashboardSink>,
    unhandled: UnhandledErrorObservers,
    config: PortalConfig,
}

/// Entry point for create/fetch/update/delete calls.
///
/// Cheap to clone and safe to share: everything registered through the
/// builder is frozen, and each call carries its own contexts.
#[derive(Clone)]
pub struct DataPortal {
    inner: Arc<PortalInner>,
}

impl DataPortal {
    pub fn builder() -> DataPortalBuilder {
        DataPortalBuilder::default()
    }

    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    pub fn unhandled_errors(&self) -> &UnhandledErrorObservers {
        &self.inner.unhandled
    }

    /// Runs one call.
    ///
    /// On success the result's global context is the request's context with
    /// the executor's changes merged in. On failure nothing is merged.
    pub async fn execute(&self, request: DataPortalRequest) -> PortalResult<DataPortalResult> {
        let call_id = CallId::new();
        let inner = &self.inner;
        info!(
            "Portal call {} started: {} {}",
            call_id, request.operation, request.object_type
        );
        inner
            .dashboard
            .initialize_call(&CallEvent::new(call_id, &request.object_type, request.operation));

        let outcome = self.dispatch(call_id, &request).await;

        let mut event = CallEvent::new(call_id, &request.object_type, request.operation);
        if let Err(fault) = &outcome {
            event = event.with_fault(fault.to_string());
        }
        inner.dashboard.complete_call(&event);

        match outcome {
            Ok(mut result) => {
                let mut merged = request.global_context.clone();
                merged.merge_returned(&request.global_context, result.global_context);
                result.global_context = merged;
                info!("Portal call {} completed", call_id);
                Ok(result)
            }
            Err(cause) => {
                warn!("Portal call {} failed ({}): {}", call_id, cause.kind(), cause);
                Err(DataPortalError::new(
                    request.object_type,
                    request.operation,
                    cause,
                ))
            }
        }
    }

    async fn dispatch(
        &self,
        call_id: CallId,
        request: &DataPortalRequest,
    ) -> Result<DataPortalResult, PortalFault> {
        self.authorize(request)?;

        let args = InterceptArgs {
            call_id,
            object_type: &request.object_type,
            operation: request.operation,
            principal: &request.principal,
        };
        let result = match self.run_initialize(&args) {
            Ok(()) => self.inner.executor.execute(call_id, request).await,
            Err(fault) => Err(fault),
        };
        let completed = self.run_complete(&args, &result);

        match (result, completed) {
            (Err(fault), _) => Err(fault),
            (Ok(_), Err(fault)) => Err(fault),
            (Ok(result), Ok(())) => Ok(result),
        }
    }

    fn authorize(&self, request: &DataPortalRequest) -> Result<(), PortalFault> {
        for rule in &self.inner.rules {
            if let AuthDecision::Denied(reason) =
                rule.check(&request.object_type, request.operation, &request.principal)
            {
                debug!(
                    "Denied {} {} for '{}': {}",
                    request.operation, request.object_type, request.principal.name, reason
                );
                return Err(PortalFault::Authorization { reason });
            }
        }
        Ok(())
    }

    fn run_initialize(&self, args: &InterceptArgs<'_>) -> Result<(), PortalFault> {
        for interceptor in &self.inner.interceptors {
            interceptor
                .initialize(args)
                .map_err(|e| interception_fault(interceptor.as_ref(), e.0))?;
        }
        Ok(())
    }

    /// Runs every `complete` hook and reports the first failure.
    fn run_complete(
        &self,
        args: &InterceptArgs<'_>,
        result: &Result<DataPortalResult, PortalFault>,
    ) -> Result<(), PortalFault> {
        let outcome = match result {
            Ok(result) => CallOutcome::Succeeded(&result.value),
            Err(fault) => CallOutcome::Failed(fault),
        };
        let mut first_error = None;
        for interceptor in &self.inner.interceptors {
            if let Err(e) = interceptor.complete(args, outcome) {
                let fault = interception_fault(interceptor.as_ref(), e.0);
                warn!("Call {}: {}", args.call_id, fault);
                first_error.get_or_insert(fault);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Runs a call on a fresh current-thread runtime, blocking the caller.
    /// Must not be called from inside an async context.
    pub fn execute_blocking(&self, request: DataPortalRequest) -> PortalResult<DataPortalResult> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                DataPortalError::new(
                    request.object_type.clone(),
                    request.operation,
                    ExecutionFault::Runtime(e.to_string()).into(),
                )
            })?;
        runtime.block_on(self.execute(request))
    }

    /// Starts a call on a spawned task.
    ///
    /// Dropping the returned handle detaches the call; if it then fails, the
    /// error goes to [`DataPortal::unhandled_errors`].
    ///
    /// Must be called from inside a Tokio runtime; outside one, use
    /// [`DataPortal::execute_blocking`].
    pub fn begin_execute(&self, request: DataPortalRequest) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        let object_type = request.object_type.clone();
        let operation = request.operation;
        let portal = self.clone();
        tokio::spawn(async move {
            let result = portal.execute(request).await;
            if let Err(Err(error)) = tx.send(result) {
                let notified = portal.inner.unhandled.notify(&error);
                debug!("Unhandled portal error reported to {} observers", notified);
            }
        });
        PendingCall {
            object_type,
            operation,
            receiver: rx,
        }
    }

    // ── Convenience calls ────────────────────────────────────────

    pub async fn create(&self, object_type: &str, criteria: impl Into<Value>) -> PortalResult<Value> {
        let request = DataPortalRequest::new(object_type, Operation::Create, criteria);
        Ok(self.execute(request).await?.value)
    }

    pub async fn fetch(&self, object_type: &str, criteria: impl Into<Value>) -> PortalResult<Value> {
        let request = DataPortalRequest::new(object_type, Operation::Fetch, criteria);
        Ok(self.execute(request).await?.value)
    }

    /// Saves `entity`: insert, update or delete depending on its state.
    pub async fn update(&self, entity: &EntityRef) -> PortalResult<Value> {
        Ok(self.execute(DataPortalRequest::update(entity)).await?.value)
    }

    pub async fn delete(&self, object_type: &str, criteria: impl Into<Value>) -> PortalResult<()> {
        let request = DataPortalRequest::new(object_type, Operation::Delete, criteria);
        self.execute(request).await.map(|_| ())
    }
}

fn interception_fault(interceptor: &dyn Interceptor, message: String) -> PortalFault {
    PortalFault::Interception {
        interceptor: interceptor.name().to_string(),
        message,
    }
}

/// Handle to a call started with [`DataPortal::begin_execute`].
pub struct PendingCall {
    object_type: String,
    operation: Operation,
    receiver: oneshot::Receiver<PortalResult<DataPortalResult>>,
}

impl PendingCall {
    pub async fn wait(self) -> PortalResult<DataPortalResult> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(DataPortalError::new(
                self.object_type,
                self.operation,
                ExecutionFault::Panicked("call task ended without a result".to_string()).into(),
            )),
        }
    }
}

enum ExecutorChoice {
    Local(TargetRegistry),
    Remote(Arc<dyn RemoteChannel>, GraphCodec),
    Custom(Arc<dyn PortalExecutor>),
}

/// Assembles a [`DataPortal`]. Registrations keep their order.
#[derive(Default)]
pub struct DataPortalBuilder {
    executor: Option<ExecutorChoice>,
    rules: Vec<Arc<dyn AuthorizationRule>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    dashboard: Option<Arc<dyn DashboardSink>>,
    config: PortalConfig,
}

impl DataPortalBuilder {
    /// Executes in-process against `targets`.
    pub fn local(mut self, targets: TargetRegistry) -> Self {
        self.executor = Some(ExecutorChoice::Local(targets));
        self
    }

    /// Forwards calls over `channel`, encoding with `codec`.
    pub fn remote(mut self, channel: Arc<dyn RemoteChannel>, codec: GraphCodec) -> Self {
        self.executor = Some(ExecutorChoice::Remote(channel, codec));
        self
    }

    pub fn executor(mut self, executor: Arc<dyn PortalExecutor>) -> Self {
        self.executor = Some(ExecutorChoice::Custom(executor));
        self
    }

    pub fn rule(mut self, rule: impl AuthorizationRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn shared_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn dashboard(mut self, dashboard: Arc<dyn DashboardSink>) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn config(mut self, config: PortalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<DataPortal, ConfigError> {
        let config = self.config;
        let executor: Arc<dyn PortalExecutor> = match self.executor {
            None => return Err(ConfigError::MissingExecutor),
            Some(ExecutorChoice::Local(targets)) => {
                Arc::new(LocalExecutor::new(targets).on_worker(config.run_local_on_worker))
            }
            Some(ExecutorChoice::Remote(channel, codec)) => {
                Arc::new(RemoteProxy::with_config(channel, codec, &config))
            }
            Some(ExecutorChoice::Custom(executor)) => executor,
        };
        debug!(
            "Built data portal: {} rules, {} interceptors",
            self.rules.len(),
            self.interceptors.len()
        );
        Ok(DataPortal {
            inner: Arc::new(PortalInner {
                executor,
                rules: self.rules,
                interceptors: self.interceptors,
                dashboard: self.dashboard.unwrap_or_else(|| Arc::new(NullDashboard)),
                unhandled: UnhandledErrorObservers::new(),
                config,
            }),
        })
    }
}
