//! Session lifecycle for the current client user.
//!
//! DESIGN
//! ======
//! `state` is the read-mostly value consumers gate on, `store` owns the
//! transitions between its phases, and `scope` is the one sanctioned way for
//! application code to reach the store.

pub mod scope;
pub mod state;
pub mod store;

pub use scope::{provide, use_session};
pub use state::{Gate, LOGIN_ROUTE, SessionState, should_redirect_unauth};
pub use store::{LoginError, SessionStore};
