//! Operation dispatcher for the data portal.
//!
//! A caller asks for an operation (create, fetch, insert, update,
//! delete-self, delete) on an entity type; the portal runs it in-process or
//! forwards it to a remote host, and the caller cannot tell the difference
//! apart from latency and transport failures.
//!
//! # Call sequence
//!
//! 1. **Authorize**: every [`AuthorizationRule`]; the first denial ends the
//!    call before any hook runs or anything is encoded
//! 2. **Initialize**: every [`Interceptor::initialize`], registration order
//! 3. **Execute**: [`LocalExecutor`] calls the registered
//!    [`DataPortalTarget`]; [`RemoteProxy`] encodes the payload and contexts
//!    with the graph codec, sends them over a [`RemoteChannel`] and decodes
//!    the reply
//! 4. **Complete**: every [`Interceptor::complete`], also on failure
//! 5. **Return**: a [`DataPortalResult`] with the merged global context, or
//!    one [`DataPortalError`] naming the type, operation and cause
//!
//! The [`DashboardSink`] sees the start and end of every call.
//!
//! # Example
//!
//! ```
//! use portal_dispatch::{DataPortal, DataPortalTarget, OperationContext, TargetRegistry, TargetResult};
//! use portal_model::Value;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl DataPortalTarget for Echo {
//!     async fn fetch(&self, criteria: &Value, _: &mut OperationContext<'_>) -> TargetResult<Value> {
//!         Ok(criteria.clone())
//!     }
//! }
//!
//! let mut targets = TargetRegistry::new();
//! targets.register("Echo", Echo);
//! let portal = DataPortal::builder().local(targets).build().unwrap();
//!
//! let request = portal_dispatch::DataPortalRequest::new("Echo", portal_types::Operation::Fetch, 7i64);
//! let result = portal.execute_blocking(request).unwrap();
//! assert_eq!(result.value, Value::Int(7));
//! ```

mod auth;
mod config;
mod dashboard;
mod error;
mod executor;
mod host;
mod intercept;
mod portal;
mod remote;
mod request;
mod target;
pub mod wire;

pub use auth::{AllowAll, AuthDecision, AuthorizationRule, RequireRole};
pub use config::PortalConfig;
pub use dashboard::{
    CallEvent, Dashboard, DashboardSink, DashboardStats, MAX_PENDING_EVENTS, NullDashboard,
};
pub use error::{
    ChannelError, ConfigError, DataPortalError, ExecutionFault, PortalFault, PortalResult,
    TargetResult,
};
pub use executor::{LocalExecutor, PortalExecutor};
pub use host::{LoopbackChannel, PortalHost};
pub use intercept::{CallOutcome, InterceptArgs, InterceptError, Interceptor};
pub use portal::{DataPortal, DataPortalBuilder, PendingCall, UnhandledErrorObservers};
pub use remote::{RemoteChannel, RemoteProxy};
pub use request::{DataPortalRequest, DataPortalResult, OperationContext};
pub use target::{DataPortalTarget, TargetRegistry};
