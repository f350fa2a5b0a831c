//! Networking for the REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` is the authorization pipeline every call goes through, `auth` holds
//! the token/profile endpoints the session store needs, and `types` defines
//! their wire schema.

pub mod api;
pub mod auth;
pub mod types;
