//! The pure authorization decision.
//!
//! [`decide`] maps `(requirement, session, role)` to a [`Decision`] with no IO,
//! no clock and no memory of earlier calls. [`explain`] returns the same
//! decision together with the rule that produced it, for logs and audits.

use serde::{Deserialize, Serialize};

use crate::{AuthorizationRequirement, Role, RoleState, Session};

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", content = "target", rename_all = "snake_case")]
pub enum Decision {
    /// Not enough information yet. Render nothing and do not navigate.
    Pending,
    Allow,
    /// Leave the page, replacing it in history with `target`.
    DenyRedirect(String),
}

impl Decision {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::DenyRedirect(target) => Some(target),
            _ => None,
        }
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The session has not been restored yet.
    SessionUnknown,
    PublicRoute,
    /// The route needs a session and the visitor is anonymous.
    NoSession,
    SessionPresent,
    /// Admin route; the role lookup has not answered yet.
    RoleUnresolved,
    AdminRole,
    /// Admin route; the visitor's role is not admin (or could not be resolved).
    NotAdmin,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionUnknown => "session_unknown",
            Self::PublicRoute => "public_route",
            Self::NoSession => "no_session",
            Self::SessionPresent => "session_present",
            Self::RoleUnresolved => "role_unresolved",
            Self::AdminRole => "admin_role",
            Self::NotAdmin => "not_admin",
        }
    }
}

impl core::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decision together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub requirement: AuthorizationRequirement,
    pub session: &'static str,
    pub role: Option<Role>,
    pub decision: Decision,
    pub reason: DecisionReason,
}

/// Where the gate sends visitors it turns away, and where signed-in visitors land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Target for visitors without a session.
    pub login_path: String,
    /// Default authenticated area (target for non-admins on admin routes).
    pub user_area: String,
    /// Landing page for admins.
    pub admin_area: String,
}

impl GatePolicy {
    /// Landing page after sign-in for a visitor with `role`.
    pub fn landing_for(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_area,
            Role::Standard => &self.user_area,
        }
    }
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            user_area: "/dashboard".to_string(),
            admin_area: "/admin".to_string(),
        }
    }
}

/// Decide whether a visitor may see a route.
pub fn decide(
    policy: &GatePolicy,
    requirement: AuthorizationRequirement,
    session: &Session,
    role: RoleState,
) -> Decision {
    explain(policy, requirement, session, role).decision
}

/// Decide, and say why. Rules are checked in order; the first match wins.
pub fn explain(
    policy: &GatePolicy,
    requirement: AuthorizationRequirement,
    session: &Session,
    role: RoleState,
) -> Explanation {
    use AuthorizationRequirement::*;

    let (decision, reason) = match (session, requirement) {
        (Session::Unknown, _) => (Decision::Pending, DecisionReason::SessionUnknown),
        (_, Public) => (Decision::Allow, DecisionReason::PublicRoute),
        (Session::Anonymous, _) => (
            Decision::DenyRedirect(policy.login_path.clone()),
            DecisionReason::NoSession,
        ),
        (Session::Authenticated(_), RequiresSession) => {
            (Decision::Allow, DecisionReason::SessionPresent)
        }
        (Session::Authenticated(_), RequiresAdmin) => match role {
            RoleState::Unresolved => (Decision::Pending, DecisionReason::RoleUnresolved),
            RoleState::Resolved(Role::Admin) => (Decision::Allow, DecisionReason::AdminRole),
            RoleState::Resolved(Role::Standard) => (
                Decision::DenyRedirect(policy.user_area.clone()),
                DecisionReason::NotAdmin,
            ),
        },
    };

    Explanation {
        requirement,
        session: session.label(),
        role: role.role(),
        decision,
        reason,
    }
}
