use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use patentdesk_auth::{
    AuthorizationRequirement, DataProvider, DataProviderError, Decision, GatePolicy, Identity,
    InMemoryAuthProvider, InMemoryProfiles, RoleResolver, Row, SessionStore,
};
use patentdesk_core::UserId;
use patentdesk_web::{App, AppError, AppOptions, MemoryRouter, Page, PageRegistry, View};

type Harness<D> = App<InMemoryAuthProvider, D, Arc<MemoryRouter>>;

fn user(name: &str) -> Identity {
    Identity::new(UserId::new(), format!("{name}@example.com"))
}

fn build<D: DataProvider>(provider: InMemoryAuthProvider, data: D, start: &str) -> Harness<D> {
    let policy = GatePolicy::default();
    App::new(
        Arc::new(SessionStore::new(Arc::new(provider))),
        RoleResolver::new(data),
        PageRegistry::standard(&policy).unwrap(),
        Arc::new(MemoryRouter::new(start)),
        AppOptions::default(),
    )
}

#[tokio::test]
async fn anonymous_visitor_is_sent_from_admin_to_login() {
    let app = build(InMemoryAuthProvider::new(), Arc::new(InMemoryProfiles::new()), "/");
    app.start().await.unwrap();

    let view = app.visit("/admin").await.unwrap();
    assert_eq!(view.page(), Some(Page::Login));
    assert_eq!(app.current_path(), "/login");
}

#[tokio::test]
async fn denied_page_is_not_reachable_with_back() {
    let app = build(InMemoryAuthProvider::new(), Arc::new(InMemoryProfiles::new()), "/");
    app.start().await.unwrap();
    app.visit("/dashboard/patents").await.unwrap();

    assert_eq!(app.router().entries(), vec!["/", "/login"]);
    assert_eq!(app.router().back().as_deref(), Some("/"));
}

#[tokio::test]
async fn signed_in_user_sees_session_pages_without_role_lookup() {
    let profiles = Arc::new(InMemoryProfiles::new());
    let app = build(
        InMemoryAuthProvider::with_session(user("user42")),
        Arc::clone(&profiles),
        "/dashboard/search",
    );

    let view = app.start().await.unwrap();
    assert_eq!(view.page(), Some(Page::PatentSearch));
    assert_eq!(app.current_decision(), Decision::Allow);
    assert_eq!(profiles.lookup_count(), 0);
}

#[tokio::test]
async fn admin_loses_access_on_sign_out() {
    let user7 = user("user7");
    let profiles = Arc::new(InMemoryProfiles::new());
    profiles.set_role(user7.id, "admin");
    let app = build(InMemoryAuthProvider::with_session(user7), profiles, "/admin/edit-patents/12");

    let View::Page(page) = app.start().await.unwrap() else {
        panic!("admin should see the edit page");
    };
    assert_eq!(page.page, Page::PatentEdit);
    assert_eq!(page.params.get("id").map(String::as_str), Some("12"));

    app.store().provider().sign_out();
    assert_eq!(app.current_path(), "/login");
    assert_eq!(app.settle().await.unwrap().page(), Some(Page::Login));
}

#[tokio::test]
async fn role_lookup_failure_sends_user_to_user_area() {
    let profiles = Arc::new(InMemoryProfiles::new());
    profiles.fail_with(DataProviderError::Transport("connection reset".into()));
    let app = build(InMemoryAuthProvider::with_session(user("user9")), profiles, "/admin");

    let view = app.start().await.unwrap();
    assert_eq!(view.page(), Some(Page::UserDashboard));
    assert_eq!(app.current_path(), "/dashboard");
}

#[tokio::test]
async fn standard_user_on_admin_route_goes_to_dashboard() {
    let app = build(
        InMemoryAuthProvider::with_session(user("plain")),
        Arc::new(InMemoryProfiles::new()),
        "/admin/patents",
    );
    assert_eq!(app.start().await.unwrap().page(), Some(Page::UserDashboard));
}

#[tokio::test]
async fn signing_in_on_login_lands_by_role() {
    let admin = user("boss");
    let profiles = Arc::new(InMemoryProfiles::new());
    profiles.set_role(admin.id, "admin");
    let app = build(InMemoryAuthProvider::new(), profiles, "/login");

    assert_eq!(app.start().await.unwrap().page(), Some(Page::Login));

    app.store().provider().sign_in(admin);
    let view = app.settle().await.unwrap();

    assert_eq!(view.page(), Some(Page::AdminDashboard));
    assert_eq!(app.router().entries(), vec!["/login", "/admin"]);
}

#[tokio::test]
async fn returning_standard_user_on_login_lands_on_dashboard() {
    let app = build(
        InMemoryAuthProvider::with_session(user("regular")),
        Arc::new(InMemoryProfiles::new()),
        "/login",
    );
    assert_eq!(app.start().await.unwrap().page(), Some(Page::UserDashboard));
    assert_eq!(app.current_path(), "/dashboard");
}

#[tokio::test]
async fn unknown_paths_render_not_found_for_anyone() {
    let app = build(InMemoryAuthProvider::new(), Arc::new(InMemoryProfiles::new()), "/");
    app.start().await.unwrap();

    assert_eq!(app.visit("/no/such/page").await.unwrap().page(), Some(Page::NotFound));
}

#[tokio::test]
async fn self_redirect_is_reported_as_loop() {
    let policy = GatePolicy {
        login_path: "/private".into(),
        ..GatePolicy::default()
    };
    let registry = PageRegistry::builder()
        .route("/", Page::Landing, AuthorizationRequirement::Public)
        .route("/private", Page::UserDashboard, AuthorizationRequirement::RequiresSession)
        .build()
        .unwrap();
    let app = App::new(
        Arc::new(SessionStore::new(Arc::new(InMemoryAuthProvider::new()))),
        RoleResolver::new(Arc::new(InMemoryProfiles::new())),
        registry,
        Arc::new(MemoryRouter::new("/")),
        AppOptions {
            policy,
            max_redirects: 3,
        },
    );
    app.start().await.unwrap();

    let err = app.visit("/private").await.unwrap_err();
    assert_eq!(
        err,
        AppError::RedirectLoop {
            path: "/private".into(),
            hops: 4,
        }
    );
    assert_eq!(app.outcome(), View::Blank);
}

/// Profiles whose first lookup waits until the test releases it.
struct GatedProfiles {
    inner: InMemoryProfiles,
    started: Mutex<Option<oneshot::Sender<()>>>,
    release: Mutex<Option<oneshot::Receiver<()>>>,
}

impl DataProvider for GatedProfiles {
    async fn fetch_one(&self, collection: &str, key: &str) -> Result<Option<Row>, DataProviderError> {
        let started = self.started.lock().unwrap().take();
        if let Some(started) = started {
            let _ = started.send(());
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                let _ = release.await;
            }
        }
        self.inner.fetch_one(collection, key).await
    }
}

fn gated(
    inner: InMemoryProfiles,
) -> (Arc<GatedProfiles>, oneshot::Receiver<()>, oneshot::Sender<()>) {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    let profiles = Arc::new(GatedProfiles {
        inner,
        started: Mutex::new(Some(started_tx)),
        release: Mutex::new(Some(release_rx)),
    });
    (profiles, started_rx, release_tx)
}

#[tokio::test]
async fn late_admin_answer_for_previous_user_is_ignored() {
    let a = user("a");
    let b = user("b");

    let inner = InMemoryProfiles::new();
    inner.set_role(a.id, "admin");
    let (profiles, started_rx, release_tx) = gated(inner);

    let app = build(InMemoryAuthProvider::with_session(a), Arc::clone(&profiles), "/admin");

    let switch_user = async {
        started_rx.await.unwrap();
        // A's lookup is in flight; B replaces A before it answers.
        app.store().provider().sign_in(b.clone());
        release_tx.send(()).unwrap();
    };
    let (view, ()) = tokio::join!(app.start(), switch_user);

    assert_eq!(view.unwrap().page(), Some(Page::UserDashboard));
    assert_eq!(app.current_path(), "/dashboard");
    assert_eq!(profiles.inner.lookup_count(), 2);
}

#[tokio::test]
async fn landing_follows_the_latest_sign_in_on_login() {
    let standard = user("standard");
    let admin = user("admin");

    let inner = InMemoryProfiles::new();
    inner.set_role(admin.id, "admin");
    let (profiles, started_rx, release_tx) = gated(inner);

    let app = build(InMemoryAuthProvider::new(), Arc::clone(&profiles), "/login");
    assert_eq!(app.start().await.unwrap().page(), Some(Page::Login));

    app.store().provider().sign_in(standard);
    let switch_user = async {
        started_rx.await.unwrap();
        // The standard user's landing lookup is in flight when the admin signs in.
        app.store().provider().sign_in(admin.clone());
        release_tx.send(()).unwrap();
    };
    let (view, ()) = tokio::join!(app.settle(), switch_user);

    assert_eq!(view.unwrap().page(), Some(Page::AdminDashboard));
    assert_eq!(app.router().entries(), vec!["/login", "/admin"]);
}
