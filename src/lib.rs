//! # snapgram
//!
//! Client-side session subsystem for the Snapgram social app.
//!
//! This crate owns the lifecycle of the access/refresh token pair on the
//! client: persisting it, rehydrating identity from it on startup, attaching
//! it to every outgoing API request, and dropping it when the server stops
//! accepting it. Feed, profile, chat and search clients build on the
//! [`net::api::ApiClient`] and read identity from [`session::store::SessionStore`].

pub mod config;
pub mod net;
pub mod session;
pub mod storage;
