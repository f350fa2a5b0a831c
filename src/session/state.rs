//! Session phases for the current client user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and identity-aware views read this to decide between waiting,
//! rendering, and redirecting to the login surface.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use crate::net::types::User;

/// Route unauthenticated consumers are sent to.
pub const LOGIN_ROUTE: &str = "/login";

/// Process-wide authentication state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Startup rehydration has not resolved yet.
    #[default]
    Uninitialized,
    Authenticated(User),
    Unauthenticated,
}

/// What an identity-dependent view should do with the current state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate<'a> {
    /// Render nothing (or a loading indicator) until rehydration resolves.
    Loading,
    Render(&'a User),
    Redirect(&'static str),
}

impl SessionState {
    /// True once rehydration has resolved either way.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Short phase name for logs and status output.
    #[must_use]
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Authenticated(_) => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    #[must_use]
    pub fn gate(&self) -> Gate<'_> {
        match self {
            Self::Uninitialized => Gate::Loading,
            Self::Authenticated(user) => Gate::Render(user),
            Self::Unauthenticated => Gate::Redirect(LOGIN_ROUTE),
        }
    }
}

/// Whether a guarded view should redirect to [`LOGIN_ROUTE`]: only once
/// rehydration has resolved and no user is present.
#[must_use]
pub fn should_redirect_unauth(state: &SessionState) -> bool {
    matches!(state, SessionState::Unauthenticated)
}
