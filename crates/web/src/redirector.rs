//! Executes gate decisions against the router.

use patentdesk_auth::Decision;

use crate::router::{NavigateOptions, Router};

/// What the redirector did with a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Pending: show nothing, neither the page nor a fallback.
    Nothing,
    Page,
    /// Left for `target`, replacing the current history entry.
    Redirected(String),
}

#[derive(Debug, Clone)]
pub struct Redirector<R> {
    router: R,
}

impl<R: Router> Redirector<R> {
    pub fn new(router: R) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn apply(&self, decision: &Decision) -> Rendered {
        match decision {
            Decision::Pending => Rendered::Nothing,
            Decision::Allow => Rendered::Page,
            Decision::DenyRedirect(target) => {
                tracing::debug!(from = %self.router.current_path(), to = %target, "redirecting");
                self.router.navigate(target, NavigateOptions::replace());
                Rendered::Redirected(target.clone())
            }
        }
    }
}
