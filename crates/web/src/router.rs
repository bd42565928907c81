//! Router seam and an in-memory history implementation.

use std::sync::{Arc, Mutex, MutexGuard};

/// How a navigation treats the current history entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct NavigateOptions {
    /// Overwrite the current entry instead of pushing a new one.
    pub replace: bool,
}

impl NavigateOptions {
    pub fn push() -> Self {
        Self { replace: false }
    }

    pub fn replace() -> Self {
        Self { replace: true }
    }
}

/// The in-app router the shell navigates through.
pub trait Router: Send + Sync {
    fn navigate(&self, path: &str, options: NavigateOptions);

    fn current_path(&self) -> String;
}

impl<R> Router for Arc<R>
where
    R: Router + ?Sized,
{
    fn navigate(&self, path: &str, options: NavigateOptions) {
        (**self).navigate(path, options)
    }

    fn current_path(&self) -> String {
        (**self).current_path()
    }
}

#[derive(Debug)]
struct History {
    entries: Vec<String>,
    index: usize,
}

/// Browser-like history kept in memory.
///
/// Pushing drops any forward entries; replacing overwrites the current one, so
/// a replaced page is unreachable through `back()`.
#[derive(Debug)]
pub struct MemoryRouter {
    history: Mutex<History>,
}

impl MemoryRouter {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![initial.into()],
                index: 0,
            }),
        }
    }

    /// Step back one entry. Returns the new current path, or `None` at the start.
    pub fn back(&self) -> Option<String> {
        let mut history = self.lock();
        if history.index == 0 {
            return None;
        }
        history.index -= 1;
        Some(history.entries[history.index].clone())
    }

    pub fn forward(&self) -> Option<String> {
        let mut history = self.lock();
        if history.index + 1 >= history.entries.len() {
            return None;
        }
        history.index += 1;
        Some(history.entries[history.index].clone())
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().entries.clone()
    }

    fn lock(&self) -> MutexGuard<'_, History> {
        match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MemoryRouter {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Router for MemoryRouter {
    fn navigate(&self, path: &str, options: NavigateOptions) {
        let mut history = self.lock();
        if options.replace {
            let index = history.index;
            history.entries[index] = path.to_string();
        } else {
            let keep = history.index + 1;
            history.entries.truncate(keep);
            history.entries.push(path.to_string());
            history.index = keep;
        }
        tracing::trace!(path, replace = options.replace, "navigate");
    }

    fn current_path(&self) -> String {
        let history = self.lock();
        history.entries[history.index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_back() {
        let router = MemoryRouter::new("/");
        router.navigate("/dashboard", NavigateOptions::push());
        assert_eq!(router.current_path(), "/dashboard");
        assert_eq!(router.back().as_deref(), Some("/"));
        assert_eq!(router.back(), None);
        assert_eq!(router.forward().as_deref(), Some("/dashboard"));
    }

    #[test]
    fn replaced_entry_is_not_reachable_by_back() {
        let router = MemoryRouter::new("/");
        router.navigate("/admin", NavigateOptions::push());
        router.navigate("/login", NavigateOptions::replace());

        assert_eq!(router.entries(), vec!["/", "/login"]);
        assert_eq!(router.back().as_deref(), Some("/"));
    }

    #[test]
    fn push_discards_forward_entries() {
        let router = MemoryRouter::new("/");
        router.navigate("/a", NavigateOptions::push());
        router.navigate("/b", NavigateOptions::push());
        router.back();
        router.navigate("/c", NavigateOptions::push());
        assert_eq!(router.entries(), vec!["/", "/a", "/c"]);
        assert_eq!(router.forward(), None);
    }
}
