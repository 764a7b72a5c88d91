// Route definitions

use axum::{
    response::Redirect,
    routing::{get, post},
    Router,
};

use crate::AppState;

mod auth;
mod cars;
mod views;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/cars", get(cars::snapshot_json))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(|| async { Redirect::to("/cars") }))
        .route("/cars", get(cars::list_cars).post(cars::create_car))
        .route("/cars/view", get(cars::view_cars))
        .route("/cars/filters", post(cars::update_filters))
        .route("/cars/filters/clear", post(cars::clear_filters))
        .route("/cars/:id", get(cars::car_detail).post(cars::replace_car))
        .route("/cars/:id/field", post(cars::update_field))
        .route("/cars/:id/delete", post(cars::delete_car))
        .route("/login", get(auth::login_page).post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .nest("/api", api_router)
        .with_state(app_state)
}
