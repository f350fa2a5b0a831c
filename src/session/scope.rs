//! Task-scoped access to the session store.
//!
//! The application root wraps its work in [`provide`]; anything running
//! inside reaches the store through [`use_session`]. Calling `use_session`
//! outside a provided scope is a wiring bug, so it panics instead of
//! inventing a default store.

#[cfg(test)]
#[path = "scope_test.rs"]
mod scope_test;

use std::future::Future;

use super::store::SessionStore;

tokio::task_local! {
    static SESSION: SessionStore;
}

/// Run `fut` with `store` as the session visible to [`use_session`].
pub async fn provide<F>(store: SessionStore, fut: F) -> F::Output
where
    F: Future,
{
    SESSION.scope(store, fut).await
}

/// The store installed by the enclosing [`provide`], if any.
#[must_use]
pub fn try_use_session() -> Option<SessionStore> {
    SESSION.try_with(SessionStore::clone).ok()
}

/// The store installed by the enclosing [`provide`].
///
/// # Panics
///
/// Panics when called outside a [`provide`] scope.
#[must_use]
pub fn use_session() -> SessionStore {
    match try_use_session() {
        Some(store) => store,
        None => panic!("use_session must be called within session::scope::provide"),
    }
}
