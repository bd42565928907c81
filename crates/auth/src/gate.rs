//! Per-route authorization state machine.
//!
//! A [`RouteGate`] lives as long as one route visit. It is fed every session
//! the store publishes and every role lookup result, and re-derives its
//! decision from the latest pair each time:
//!
//! ```text
//! Init ──observe_session──▶ Pending ──▶ Resolved(Allow | DenyRedirect)
//!                              ▲                    │
//!                              └── session change ──┘
//! ```
//!
//! Role lookups are asynchronous, so their results can arrive after the
//! identity that asked for them has signed out or been replaced. Each lookup
//! carries a [`LookupTicket`] stamped with the gate's identity generation;
//! results for an older generation are dropped.

use tracing::{debug, warn};

use patentdesk_core::UserId;

use crate::decision::explain;
use crate::{
    AuthorizationRequirement, Decision, GatePolicy, Identity, Role, RoleResolutionError,
    RoleState, Session,
};

/// Lifecycle of a gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Mounted, no session observed yet.
    Init,
    Pending,
    Resolved(Decision),
}

/// Stamp tying a role lookup to the identity generation that requested it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LookupTicket {
    generation: u64,
    user_id: UserId,
}

impl LookupTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// A role lookup the gate needs someone to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleLookup {
    pub ticket: LookupTicket,
    pub identity: Identity,
}

/// Result of feeding the gate one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStep {
    pub decision: Decision,
    /// Whether the decision differs from the previous one.
    pub changed: bool,
    /// A lookup to run, when the route needs a role nobody has asked for yet.
    pub lookup: Option<RoleLookup>,
}

#[derive(Debug, Clone)]
pub struct RouteGate {
    requirement: AuthorizationRequirement,
    policy: GatePolicy,
    session: Session,
    role: RoleState,
    generation: u64,
    in_flight: Option<LookupTicket>,
    state: GateState,
}

impl RouteGate {
    pub fn new(requirement: AuthorizationRequirement, policy: GatePolicy) -> Self {
        Self {
            requirement,
            policy,
            session: Session::Unknown,
            role: RoleState::Unresolved,
            generation: 0,
            in_flight: None,
            state: GateState::Init,
        }
    }

    pub fn requirement(&self) -> AuthorizationRequirement {
        self.requirement
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn role(&self) -> RoleState {
        self.role
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Current decision. A gate that has seen nothing yet is pending.
    pub fn decision(&self) -> Decision {
        match &self.state {
            GateState::Init | GateState::Pending => Decision::Pending,
            GateState::Resolved(decision) => decision.clone(),
        }
    }

    /// The lookup currently awaited, if any.
    pub fn in_flight(&self) -> Option<LookupTicket> {
        self.in_flight
    }

    /// Feed the latest session.
    ///
    /// A different identity (including none) starts a new generation: the
    /// known role is forgotten and outstanding lookups become stale. A token
    /// refresh for the same identity keeps the role.
    pub fn observe_session(&mut self, session: Session) -> GateStep {
        let previous = self.session.identity().map(|i| i.id);
        let next = session.identity().map(|i| i.id);
        if previous != next {
            self.generation += 1;
            self.role = RoleState::Unresolved;
            self.in_flight = None;
        }
        self.session = session;

        let lookup = self.lookup_if_needed();
        let (decision, changed) = self.reevaluate();
        GateStep {
            decision,
            changed,
            lookup,
        }
    }

    /// Feed the result of a lookup issued by this gate.
    ///
    /// Returns `None` when the ticket belongs to a superseded identity; the
    /// result is discarded and nothing changes. A resolution error counts as
    /// `Standard`.
    pub fn observe_role(
        &mut self,
        ticket: LookupTicket,
        outcome: Result<Role, RoleResolutionError>,
    ) -> Option<GateStep> {
        let current = self.session.identity().map(|i| i.id);
        if ticket.generation != self.generation || current != Some(ticket.user_id) {
            debug!(
                user_id = %ticket.user_id,
                ticket_generation = ticket.generation,
                generation = self.generation,
                "discarding stale role lookup"
            );
            return None;
        }

        self.in_flight = None;
        let role = match outcome {
            Ok(role) => role,
            Err(error) => {
                warn!(%error, user_id = %ticket.user_id, "role lookup failed; treating as standard");
                Role::Standard
            }
        };
        self.role = RoleState::Resolved(role);

        let (decision, changed) = self.reevaluate();
        Some(GateStep {
            decision,
            changed,
            lookup: None,
        })
    }

    fn lookup_if_needed(&mut self) -> Option<RoleLookup> {
        if !self.requirement.needs_role()
            || self.role != RoleState::Unresolved
            || self.in_flight.is_some()
        {
            return None;
        }
        let identity = self.session.identity()?.clone();
        let ticket = LookupTicket {
            generation: self.generation,
            user_id: identity.id,
        };
        self.in_flight = Some(ticket);
        Some(RoleLookup { ticket, identity })
    }

    fn reevaluate(&mut self) -> (Decision, bool) {
        let explanation = explain(&self.policy, self.requirement, &self.session, self.role);
        let next = match &explanation.decision {
            Decision::Pending => GateState::Pending,
            decided => GateState::Resolved(decided.clone()),
        };
        let changed = next != self.state;
        if changed {
            debug!(
                requirement = %self.requirement,
                session = explanation.session,
                reason = %explanation.reason,
                decision = ?explanation.decision,
                "gate decision"
            );
        }
        self.state = next;
        (explanation.decision, changed)
    }
}
