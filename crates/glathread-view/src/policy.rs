//! Approver role policy.
//!
//! All role gating in the workspace funnels through one policy value so
//! "who sees the approval prompt" cannot drift between call sites. This is
//! a presentation-layer gate only: the backend independently rejects
//! unauthorized approval actions.

use glathread_shared::constants::DEFAULT_APPROVER_ROLES;
use glathread_shared::types::Role;

/// The set of roles allowed to act on a pending approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproverPolicy {
    roles: Vec<Role>,
}

impl ApproverPolicy {
    /// Build a policy from an explicit role set. Duplicates are harmless.
    pub fn new(roles: impl Into<Vec<Role>>) -> Self {
        Self { roles: roles.into() }
    }

    /// Whether the given role may approve or reject a pending request.
    pub fn is_approver(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl Default for ApproverPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVER_ROLES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set() {
        let policy = ApproverPolicy::default();
        for role in [Role::Hod, Role::Cfo, Role::Registrar, Role::Administrator] {
            assert!(policy.is_approver(role));
        }
        for role in [Role::Supervisor, Role::GateTeam, Role::Unknown] {
            assert!(!policy.is_approver(role));
        }
    }

    #[test]
    fn test_custom_set() {
        let policy = ApproverPolicy::new(vec![Role::Supervisor]);
        assert!(policy.is_approver(Role::Supervisor));
        assert!(!policy.is_approver(Role::Cfo));
    }
}
