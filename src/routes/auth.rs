// Login and logout handlers

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::{error::AppResult, models::Credentials, session::Session};

use super::views::{render, LoginTemplate};

pub async fn login_page(State(session): State<Arc<Session>>) -> AppResult<Html<String>> {
    let username = session.current_user().map(|u| u.username).unwrap_or_default();
    render(&LoginTemplate { username, error: String::new() })
}

// Handler for POST /login
pub async fn handle_login(
    State(session): State<Arc<Session>>,
    Form(credentials): Form<Credentials>,
) -> AppResult<Response> {
    tracing::info!("Login attempt for {}", credentials.username);

    match session.login(&credentials).await {
        Ok(user) => {
            tracing::info!("User {} signed in", user.username);
            Ok(Redirect::to("/cars").into_response())
        }
        Err(e) => {
            let page = render(&LoginTemplate { username: String::new(), error: e.to_string() })?;
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
    }
}

pub async fn handle_logout(State(session): State<Arc<Session>>) -> Redirect {
    session.logout();
    Redirect::to("/login")
}
