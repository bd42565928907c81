//! Static page registry: path pattern → (page, authorization requirement).
//!
//! The table is assembled once with [`RouteTableBuilder`] and is immutable
//! afterwards. Patterns are absolute paths whose segments are either literals
//! or `:name` parameters. When several patterns match, the one with the most
//! literal segments wins; ties go to the earlier declaration. Paths nothing
//! matches resolve to the public fallback page.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use patentdesk_auth::{AuthorizationRequirement, GatePolicy};

/// Pages of the application.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Landing,
    Login,
    UserDashboard,
    AdminDashboard,
    PatentList,
    PatentDetail,
    PatentAdd,
    PatentEdit,
    PatentSearch,
    PromptEngineer,
    NotFound,
}

impl Page {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Login => "login",
            Self::UserDashboard => "user_dashboard",
            Self::AdminDashboard => "admin_dashboard",
            Self::PatentList => "patent_list",
            Self::PatentDetail => "patent_detail",
            Self::PatentAdd => "patent_add",
            Self::PatentEdit => "patent_edit",
            Self::PatentSearch => "patent_search",
            Self::PromptEngineer => "prompt_engineer",
            Self::NotFound => "not_found",
        }
    }
}

impl core::fmt::Display for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route pattern '{0}' is declared twice")]
    Duplicate(String),

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct RouteEntry {
    pattern: String,
    segments: Vec<Segment>,
    page: Page,
    requirement: AuthorizationRequirement,
    redirect_when_authenticated: bool,
}

impl RouteEntry {
    fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    fn capture(&self, path: &[&str]) -> Option<BTreeMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(expected) if expected == actual => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(params)
    }
}

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The pattern that matched (`None` for the fallback page).
    pub pattern: Option<String>,
    pub page: Page,
    pub requirement: AuthorizationRequirement,
    pub params: BTreeMap<String, String>,
    /// Signed-in visitors are sent on to their landing page (the login page).
    pub redirect_when_authenticated: bool,
}

/// Builder for a [`PageRegistry`]. Errors are collected and reported by `build`.
#[derive(Debug)]
pub struct RouteTableBuilder {
    entries: Vec<RouteEntry>,
    fallback: Page,
    error: Option<RouteTableError>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            fallback: Page::NotFound,
            error: None,
        }
    }

    pub fn route(
        self,
        pattern: impl Into<String>,
        page: Page,
        requirement: AuthorizationRequirement,
    ) -> Self {
        self.push(pattern.into(), page, requirement, false)
    }

    /// Public route whose page forwards signed-in visitors to their landing page.
    pub fn guest_route(self, pattern: impl Into<String>, page: Page) -> Self {
        self.push(pattern.into(), page, AuthorizationRequirement::Public, true)
    }

    /// Page shown (publicly) for paths no pattern matches.
    pub fn fallback(mut self, page: Page) -> Self {
        self.fallback = page;
        self
    }

    pub fn build(self) -> Result<PageRegistry, RouteTableError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(PageRegistry {
            entries: self.entries,
            fallback: self.fallback,
        })
    }

    fn push(
        mut self,
        pattern: String,
        page: Page,
        requirement: AuthorizationRequirement,
        redirect_when_authenticated: bool,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        match parse_pattern(&pattern) {
            Err(reason) => {
                self.error = Some(RouteTableError::InvalidPattern { pattern, reason });
            }
            Ok(segments) => {
                if self.entries.iter().any(|e| same_shape(&e.segments, &segments)) {
                    self.error = Some(RouteTableError::Duplicate(pattern));
                } else {
                    self.entries.push(RouteEntry {
                        pattern,
                        segments,
                        page,
                        requirement,
                        redirect_when_authenticated,
                    });
                }
            }
        }
        self
    }
}

impl Default for RouteTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen route table.
#[derive(Debug, Clone)]
pub struct PageRegistry {
    entries: Vec<RouteEntry>,
    fallback: Page,
}

impl PageRegistry {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// The application's route table, rooted at the areas named by `policy`.
    pub fn standard(policy: &GatePolicy) -> Result<Self, RouteTableError> {
        use AuthorizationRequirement::{Public, RequiresAdmin, RequiresSession};

        let user = |suffix: &str| join(&policy.user_area, suffix);
        let admin = |suffix: &str| join(&policy.admin_area, suffix);

        Self::builder()
            .route("/", Page::Landing, Public)
            .guest_route(policy.login_path.clone(), Page::Login)
            // user area
            .route(user(""), Page::UserDashboard, RequiresSession)
            .route(user("/patents"), Page::PatentList, RequiresSession)
            .route(user("/patents/:id"), Page::PatentDetail, RequiresSession)
            .route(user("/add-patent"), Page::PatentAdd, RequiresSession)
            .route(user("/search"), Page::PatentSearch, RequiresSession)
            .route(user("/prompt-engineer"), Page::PromptEngineer, RequiresSession)
            .route(user("/prompt-engineer/:id"), Page::PromptEngineer, RequiresSession)
            // admin area
            .route(admin(""), Page::AdminDashboard, RequiresAdmin)
            .route(admin("/patents"), Page::PatentList, RequiresAdmin)
            .route(admin("/patents/:id"), Page::PatentDetail, RequiresAdmin)
            .route(admin("/add-patent"), Page::PatentAdd, RequiresAdmin)
            .route(admin("/edit-patents"), Page::PatentList, RequiresAdmin)
            .route(admin("/edit-patents/:id"), Page::PatentEdit, RequiresAdmin)
            .route(admin("/search"), Page::PatentSearch, RequiresAdmin)
            .route(admin("/prompt-engineer"), Page::PromptEngineer, RequiresAdmin)
            .route(admin("/prompt-engineer/:id"), Page::PromptEngineer, RequiresAdmin)
            .fallback(Page::NotFound)
            .build()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `path` (query string and fragment ignored).
    pub fn resolve(&self, path: &str) -> RouteMatch {
        let segments = path_segments(path);

        let best = self
            .entries
            .iter()
            .filter_map(|entry| entry.capture(&segments).map(|params| (entry, params)))
            .fold(None::<(&RouteEntry, BTreeMap<String, String>)>, |best, (entry, params)| {
                match best {
                    Some((current, _)) if current.literal_count() >= entry.literal_count() => best,
                    _ => Some((entry, params)),
                }
            });

        match best {
            Some((entry, params)) => RouteMatch {
                pattern: Some(entry.pattern.clone()),
                page: entry.page,
                requirement: entry.requirement,
                params,
                redirect_when_authenticated: entry.redirect_when_authenticated,
            },
            None => RouteMatch {
                pattern: None,
                page: self.fallback,
                requirement: AuthorizationRequirement::Public,
                params: BTreeMap::new(),
                redirect_when_authenticated: false,
            },
        }
    }
}

fn join(prefix: &str, suffix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, true) => "/".to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}{suffix}"),
    }
}

/// Patterns that differ only in parameter names match the same paths.
fn same_shape(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            (Segment::Param(_), Segment::Param(_)) => true,
            _ => false,
        })
}

fn path_segments(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, &'static str> {
    if !pattern.starts_with('/') {
        return Err("must start with '/'");
    }
    if pattern.contains(['?', '#']) {
        return Err("must not contain a query or fragment");
    }
    let body = pattern.trim_start_matches('/');
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let body = body.strip_suffix('/').unwrap_or(body);

    body.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            _ if segment.is_empty() => Err("empty segment"),
            Some("") => Err("parameter without a name"),
            Some(name) => Ok(Segment::Param(name.to_string())),
            None => Ok(Segment::Literal(segment.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> PageRegistry {
        PageRegistry::standard(&GatePolicy::default()).unwrap()
    }

    #[test]
    fn standard_table_requirements() {
        let registry = standard();
        assert_eq!(registry.len(), 18);

        let cases = [
            ("/", Page::Landing, AuthorizationRequirement::Public),
            ("/login", Page::Login, AuthorizationRequirement::Public),
            ("/dashboard", Page::UserDashboard, AuthorizationRequirement::RequiresSession),
            ("/dashboard/search", Page::PatentSearch, AuthorizationRequirement::RequiresSession),
            ("/admin", Page::AdminDashboard, AuthorizationRequirement::RequiresAdmin),
            ("/admin/edit-patents", Page::PatentList, AuthorizationRequirement::RequiresAdmin),
            ("/admin/edit-patents/9", Page::PatentEdit, AuthorizationRequirement::RequiresAdmin),
        ];
        for (path, page, requirement) in cases {
            let m = registry.resolve(path);
            assert_eq!((m.page, m.requirement), (page, requirement), "{path}");
        }
    }

    #[test]
    fn captures_params_and_ignores_query() {
        let m = standard().resolve("/dashboard/patents/42?tab=claims#top");
        assert_eq!(m.page, Page::PatentDetail);
        assert_eq!(m.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(m.pattern.as_deref(), Some("/dashboard/patents/:id"));
    }

    #[test]
    fn trailing_slash_matches_same_route() {
        assert_eq!(standard().resolve("/admin/").page, Page::AdminDashboard);
    }

    #[test]
    fn unmatched_paths_fall_back_publicly() {
        let m = standard().resolve("/admin/patents/1/extra");
        assert_eq!(m.page, Page::NotFound);
        assert_eq!(m.requirement, AuthorizationRequirement::Public);
        assert!(m.pattern.is_none());
    }

    #[test]
    fn only_login_forwards_signed_in_visitors() {
        let registry = standard();
        assert!(registry.resolve("/login").redirect_when_authenticated);
        assert!(!registry.resolve("/").redirect_when_authenticated);
    }

    #[test]
    fn literal_segments_beat_parameters() {
        let registry = PageRegistry::builder()
            .route("/p/:id", Page::PatentDetail, AuthorizationRequirement::RequiresSession)
            .route("/p/new", Page::PatentAdd, AuthorizationRequirement::RequiresAdmin)
            .build()
            .unwrap();

        assert_eq!(registry.resolve("/p/new").page, Page::PatentAdd);
        assert_eq!(registry.resolve("/p/7").page, Page::PatentDetail);
    }

    #[test]
    fn duplicate_and_invalid_patterns_are_rejected() {
        let dup = PageRegistry::builder()
            .route("/a/:x", Page::Landing, AuthorizationRequirement::Public)
            .route("/a/:y", Page::Login, AuthorizationRequirement::Public)
            .build();
        assert_eq!(dup.unwrap_err(), RouteTableError::Duplicate("/a/:y".into()));

        for bad in ["relative", "/a//b", "/a/:", "/a?b=1"] {
            let err = PageRegistry::builder()
                .route(bad, Page::Landing, AuthorizationRequirement::Public)
                .build()
                .unwrap_err();
            assert!(matches!(err, RouteTableError::InvalidPattern { .. }), "{bad}");
        }
    }

    #[test]
    fn areas_follow_policy() {
        let policy = GatePolicy {
            login_path: "/sign-in".into(),
            user_area: "/app".into(),
            admin_area: "/ops".into(),
        };
        let registry = PageRegistry::standard(&policy).unwrap();
        assert_eq!(registry.resolve("/app/patents").page, Page::PatentList);
        assert_eq!(registry.resolve("/ops/search").requirement, AuthorizationRequirement::RequiresAdmin);
        assert_eq!(registry.resolve("/sign-in").page, Page::Login);
        assert_eq!(registry.resolve("/login").page, Page::NotFound);
    }
}
