//! Application shell: drives one route gate per visit from the session store.
//!
//! The shell subscribes to the [`SessionStore`] once. Every published session
//! is fed to the gate of the page currently mounted, and the gate's decision
//! is executed at once through the [`Redirector`]. Work that needs to await
//! (role lookups, following a redirect, the post-sign-in landing) is queued
//! and run by [`App::settle`], which never holds a lock across an await.
//!
//! Each mount bumps an epoch. Queued work carries the epoch it was queued in
//! and is dropped if the page it belonged to is gone by the time it runs.
//! A landing is further keyed by the identity that asked for it, and is
//! dropped if another identity has signed in meanwhile.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use patentdesk_auth::{
    AuthProvider, DataProvider, Decision, GatePolicy, Identity, Role, RoleLookup, RoleResolver,
    RouteGate, Session, SessionStore,
};
use patentdesk_core::UserId;
use patentdesk_events::Subscription;

use crate::redirector::{Redirector, Rendered};
use crate::registry::{Page, PageRegistry, RouteMatch};
use crate::router::{NavigateOptions, Router};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("gave up after {hops} redirects, last at '{path}'")]
    RedirectLoop { path: String, hops: usize },
}

/// A page the visitor is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub page: Page,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

/// What is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    /// Nothing: the gate is pending or the visitor is being sent elsewhere.
    #[default]
    Blank,
    Page(PageView),
}

impl View {
    pub fn page(&self) -> Option<Page> {
        match self {
            Self::Blank => None,
            Self::Page(view) => Some(view.page),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => f.write_str("blank"),
            Self::Page(view) => write!(f, "{} at {}", view.page, view.path),
        }
    }
}

/// Shell settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOptions {
    pub policy: GatePolicy,
    /// Redirects (and landings) followed per settle before giving up.
    pub max_redirects: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            policy: GatePolicy::default(),
            max_redirects: 8,
        }
    }
}

impl From<&crate::AppConfig> for AppOptions {
    fn from(config: &crate::AppConfig) -> Self {
        Self {
            policy: config.policy.clone(),
            max_redirects: config.max_redirects,
        }
    }
}

#[derive(Debug)]
enum Work {
    Role { epoch: u64, lookup: RoleLookup },
    Follow(String),
    Landing { epoch: u64, identity: Identity },
}

struct Mounted {
    path: String,
    route: RouteMatch,
    gate: RouteGate,
    view: View,
    /// Identity a landing has been queued for.
    landing_for: Option<UserId>,
}

#[derive(Default)]
struct Active {
    mount: Option<Mounted>,
    epoch: u64,
    queue: VecDeque<Work>,
}

/// State shared with the store listener.
struct Shell<R> {
    policy: GatePolicy,
    registry: PageRegistry,
    redirector: Redirector<R>,
    active: Mutex<Active>,
}

impl<R: Router> Shell<R> {
    fn lock(&self) -> MutexGuard<'_, Active> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace whatever is mounted with a fresh gate for `path`.
    fn mount(&self, path: &str, session: Session) {
        let route = self.registry.resolve(path);
        debug!(path, page = %route.page, requirement = %route.requirement, "mounting");
        let gate = RouteGate::new(route.requirement, self.policy.clone());

        let mut active = self.lock();
        active.epoch += 1;
        active.queue.clear();
        active.mount = Some(Mounted {
            path: path.to_string(),
            route,
            gate,
            view: View::Blank,
            landing_for: None,
        });
        self.observe(&mut active, session);
    }

    fn on_session(&self, session: &Session) {
        let mut active = self.lock();
        self.observe(&mut active, session.clone());
    }

    fn observe(&self, active: &mut Active, session: Session) {
        let epoch = active.epoch;
        let Some(mounted) = active.mount.as_mut() else {
            return;
        };

        let step = mounted.gate.observe_session(session);
        if let Some(lookup) = step.lookup {
            active.queue.push_back(Work::Role { epoch, lookup });
        }
        self.render(active, &step.decision);
    }

    /// Execute the gate's decision for the mounted page.
    fn render(&self, active: &mut Active, decision: &Decision) {
        let epoch = active.epoch;
        let Some(mounted) = active.mount.as_mut() else {
            return;
        };

        match self.redirector.apply(decision) {
            Rendered::Nothing => mounted.view = View::Blank,
            Rendered::Page => {
                mounted.view = View::Page(PageView {
                    page: mounted.route.page,
                    path: mounted.path.clone(),
                    params: mounted.route.params.clone(),
                });
                if mounted.route.redirect_when_authenticated {
                    if let Some(identity) = mounted.gate.session().identity() {
                        if mounted.landing_for != Some(identity.id) {
                            mounted.landing_for = Some(identity.id);
                            let identity = identity.clone();
                            active.queue.push_back(Work::Landing { epoch, identity });
                        }
                    }
                }
            }
            Rendered::Redirected(target) => {
                // The page is gone; pushes before the target mounts have nowhere to go.
                active.mount = None;
                active.epoch += 1;
                active.queue.clear();
                active.queue.push_back(Work::Follow(target));
            }
        }
    }
}

/// The application: a session store, a role resolver and a route table
/// driving the router.
pub struct App<A: AuthProvider, D, R> {
    store: Arc<SessionStore<A>>,
    resolver: RoleResolver<D>,
    shell: Arc<Shell<R>>,
    max_redirects: usize,
    subscription: Mutex<Option<Subscription<Session>>>,
}

impl<A, D, R> App<A, D, R>
where
    A: AuthProvider + 'static,
    D: DataProvider,
    R: Router + 'static,
{
    pub fn new(
        store: Arc<SessionStore<A>>,
        resolver: RoleResolver<D>,
        registry: PageRegistry,
        router: R,
        options: AppOptions,
    ) -> Self {
        Self {
            store,
            resolver,
            shell: Arc::new(Shell {
                policy: options.policy,
                registry,
                redirector: Redirector::new(router),
                active: Mutex::new(Active::default()),
            }),
            max_redirects: options.max_redirects,
            subscription: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore<A>> {
        &self.store
    }

    pub fn resolver(&self) -> &RoleResolver<D> {
        &self.resolver
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.shell.registry
    }

    pub fn router(&self) -> &R {
        self.shell.redirector.router()
    }

    pub fn current_path(&self) -> String {
        self.router().current_path()
    }

    /// Subscribe to the store, mount the router's current path, restore the
    /// session and settle.
    pub async fn start(&self) -> Result<View, AppError> {
        self.attach();
        self.shell.mount(&self.current_path(), self.store.current());
        self.store.initialize().await;
        self.settle().await
    }

    /// Navigate to `path` (pushing a history entry) and settle.
    pub async fn visit(&self, path: &str) -> Result<View, AppError> {
        self.router().navigate(path, NavigateOptions::push());
        self.shell.mount(path, self.store.current());
        self.settle().await
    }

    /// Run queued work until the queue is empty.
    ///
    /// Session changes pushed while nothing is settling queue their follow-up
    /// work here; call this again after them.
    pub async fn settle(&self) -> Result<View, AppError> {
        let mut hops = 0;

        while let Some(work) = self.next_work() {
            match work {
                Work::Role { epoch, lookup } => {
                    let outcome = self.resolver.resolve_role(&lookup.identity).await;

                    let mut active = self.shell.lock();
                    if active.epoch != epoch {
                        debug!(user_id = %lookup.identity.id, "page left before role lookup answered");
                        continue;
                    }
                    let Some(mounted) = active.mount.as_mut() else {
                        continue;
                    };
                    if let Some(step) = mounted.gate.observe_role(lookup.ticket, outcome) {
                        if step.changed {
                            self.shell.render(&mut active, &step.decision);
                        }
                    }
                }
                Work::Follow(target) => {
                    hops += 1;
                    self.check_hops(&target, hops)?;
                    self.shell.mount(&target, self.store.current());
                }
                Work::Landing { epoch, identity } => {
                    let role = match self.resolver.resolve_role(&identity).await {
                        Ok(role) => role,
                        Err(error) => {
                            warn!(%error, "role lookup for landing failed; treating as standard");
                            Role::Standard
                        }
                    };
                    {
                        let active = self.shell.lock();
                        let current = active
                            .mount
                            .as_ref()
                            .and_then(|m| m.gate.session().identity().map(|i| i.id));
                        if active.epoch != epoch || current != Some(identity.id) {
                            debug!(user_id = %identity.id, "discarding landing for superseded session");
                            continue;
                        }
                    }

                    hops += 1;
                    let target = self.shell.policy.landing_for(role).to_string();
                    self.check_hops(&target, hops)?;
                    info!(user_id = %identity.id, %role, to = %target, "signed-in landing");
                    self.router().navigate(&target, NavigateOptions::push());
                    self.shell.mount(&target, self.store.current());
                }
            }
        }

        Ok(self.outcome())
    }

    /// What is currently shown.
    pub fn outcome(&self) -> View {
        self.shell
            .lock()
            .mount
            .as_ref()
            .map(|m| m.view.clone())
            .unwrap_or_default()
    }

    /// Decision of the mounted gate (pending when nothing is mounted).
    pub fn current_decision(&self) -> Decision {
        self.shell
            .lock()
            .mount
            .as_ref()
            .map(|m| m.gate.decision())
            .unwrap_or(Decision::Pending)
    }

    /// Stop listening to the store. Idempotent; the store itself is left running.
    pub fn shutdown(&self) {
        let subscription = self.subscription_slot().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            debug!("app detached from session store");
        }
    }

    fn attach(&self) {
        let mut slot = self.subscription_slot();
        if slot.is_some() {
            return;
        }
        let shell = Arc::clone(&self.shell);
        *slot = Some(self.store.subscribe(move |session| shell.on_session(session)));
    }

    fn next_work(&self) -> Option<Work> {
        self.shell.lock().queue.pop_front()
    }

    fn check_hops(&self, target: &str, hops: usize) -> Result<(), AppError> {
        if hops <= self.max_redirects {
            return Ok(());
        }
        let mut active = self.shell.lock();
        active.queue.clear();
        active.mount = None;
        warn!(path = target, hops, "redirect loop");
        Err(AppError::RedirectLoop {
            path: target.to_string(),
            hops,
        })
    }

    fn subscription_slot(&self) -> MutexGuard<'_, Option<Subscription<Session>>> {
        match self.subscription.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<A: AuthProvider, D, R> Drop for App<A, D, R> {
    fn drop(&mut self) {
        let subscription = match self.subscription.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}
