//! `patentdesk-web`
//!
//! **Responsibility:** wire the authorization gate to navigation.
//!
//! This crate provides:
//! - The page registry (path → page + requirement)
//! - The router seam and an in-memory history
//! - The redirector that executes gate decisions
//! - The application shell that drives gates from session pushes
//! - REST adapters for the hosted auth/data backend

pub mod app;
pub mod backend;
pub mod config;
pub mod redirector;
pub mod registry;
pub mod router;

pub use app::{App, AppError, AppOptions, PageView, View};
pub use backend::{BackendClient, BackendError, RestAuthProvider, RestDataProvider};
pub use config::{AppConfig, BackendConfig, ConfigError};
pub use redirector::{Redirector, Rendered};
pub use registry::{Page, PageRegistry, RouteMatch, RouteTableBuilder, RouteTableError};
pub use router::{MemoryRouter, NavigateOptions, Router};
