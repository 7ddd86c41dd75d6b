//! Authorization rules consulted before every call.

use portal_types::{Operation, Principal};

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Denied(String),
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allowed)
    }
}

/// Decides whether `principal` may run `operation` on `object_type`.
///
/// Rules run before any interceptor; the first denial ends the call.
pub trait AuthorizationRule: Send + Sync {
    fn check(&self, object_type: &str, operation: Operation, principal: &Principal) -> AuthDecision;
}

impl<F> AuthorizationRule for F
where
    F: Fn(&str, Operation, &Principal) -> AuthDecision + Send + Sync,
{
    fn check(&self, object_type: &str, operation: Operation, principal: &Principal) -> AuthDecision {
        self(object_type, operation, principal)
    }
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationRule for AllowAll {
    fn check(&self, _: &str, _: Operation, _: &Principal) -> AuthDecision {
        AuthDecision::Allowed
    }
}

/// Requires a role for a set of operations (all operations when empty).
#[derive(Debug, Clone)]
pub struct RequireRole {
    role: String,
    operations: Vec<Operation>,
}

impl RequireRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            operations: Vec::new(),
        }
    }

    pub fn for_operations(mut self, operations: &[Operation]) -> Self {
        self.operations = operations.to_vec();
        self
    }
}

impl AuthorizationRule for RequireRole {
    fn check(&self, object_type: &str, operation: Operation, principal: &Principal) -> AuthDecision {
        let applies = self.operations.is_empty() || self.operations.contains(&operation);
        if !applies || principal.is_in_role(&self.role) {
            return AuthDecision::Allowed;
        }
        AuthDecision::Denied(format!(
            "{} on {} requires role '{}'",
            operation, object_type, self.role
        ))
    }
}
