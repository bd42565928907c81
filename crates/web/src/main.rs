//! `patentdesk`: check the route guards of a deployment.
//!
//! Restores the session persisted in `PATENTDESK_ACCESS_TOKEN` (if any), then
//! visits every path given on the command line and prints where the visitor
//! ends up.
//!
//! ```text
//! patentdesk /admin /dashboard/patents/42 /login
//! ```

use std::sync::Arc;

use anyhow::Context;

use patentdesk_auth::{RoleResolver, SessionStore};
use patentdesk_web::{
    App, AppConfig, AppOptions, BackendClient, MemoryRouter, PageRegistry, RestAuthProvider,
    RestDataProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    patentdesk_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let client = BackendClient::new(&config.backend).context("could not build backend client")?;

    let store = Arc::new(SessionStore::new(Arc::new(RestAuthProvider::new(client.clone()))));
    let resolver = RoleResolver::with_collection(
        RestDataProvider::new(client),
        config.backend.profile_collection.clone(),
    );
    let registry = PageRegistry::standard(&config.policy).context("invalid route table")?;
    let router = Arc::new(MemoryRouter::new("/"));

    let app = App::new(
        Arc::clone(&store),
        resolver,
        registry,
        router,
        AppOptions::from(&config),
    );

    let view = app.start().await?;
    tracing::info!(session = store.current().label(), "started");
    println!("/ -> {} ({view})", app.current_path());

    for path in std::env::args().skip(1) {
        match app.visit(&path).await {
            Ok(view) => println!("{path} -> {} ({view})", app.current_path()),
            Err(error) => println!("{path} -> error: {error}"),
        }
    }

    app.shutdown();
    store.teardown();
    Ok(())
}
