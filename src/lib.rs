//! Car dealership inventory frontend.
//!
//! Lists, filters, creates, edits and deletes cars held by an external REST
//! backend. Filtering runs locally over the fetched collection; everything
//! else goes through the backend, with bearer-token sessions for mutations.

use axum::extract::FromRef;
use std::sync::Arc;

pub mod auth;
pub mod cars_api;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod routes;
pub mod session;
pub mod store;
pub mod token_store;

use crate::{cars_api::ApiClient, config::Settings, session::Session, store::CarStore};

// Shared state handed to every handler
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<CarStore<ApiClient>>,
    pub session: Arc<Session>,
}
