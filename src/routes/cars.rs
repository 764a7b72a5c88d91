// Handlers for the car inventory pages

use axum::{
    extract::{Form, Multipart, Path, Query, State},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use std::str::FromStr;

use crate::{
    config::{clamp_page_size, Settings},
    error::{ApiError, AppError, AppResult},
    filter::{FilterUpdate, PriceFilter, PriceOperator},
    models::{CarDraft, Condition, FieldUpdate, ImageUpload},
    session::Session,
    store::StoreSnapshot,
    AppState,
};

use super::views::{render, CarDetailTemplate, CarsTemplate};

// --- Request Structs ---

#[derive(Deserialize, Debug, Default)]
pub struct ListQuery {
    page: Option<u32>,
    page_size: Option<u32>,
    search: Option<String>,
}

// Absent fields leave the filter untouched, blank ones clear it
#[derive(Deserialize, Debug, Default)]
pub struct FilterForm {
    search_term: Option<String>,
    price_operator: Option<String>,
    price_value: Option<String>,
    condition: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct FieldForm {
    field: String,
    #[serde(default)]
    value: String,
}

fn parse_operator(raw: &str) -> Result<PriceOperator, AppError> {
    match raw {
        "greater" => Ok(PriceOperator::Greater),
        "less" => Ok(PriceOperator::Less),
        other => Err(AppError::BadRequest(format!("Unknown price operator: {}", other))),
    }
}

fn parse_price(raw: &str) -> Result<f64, AppError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid price: {}", raw)))
}

impl FilterForm {
    fn into_update(self) -> Result<FilterUpdate, AppError> {
        let operator = self.price_operator.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let value = self.price_value.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let price = match (operator, value) {
            _ if self.price_operator.is_none() && self.price_value.is_none() => None,
            (Some(operator), Some(raw)) => Some(Some(PriceFilter {
                operator: parse_operator(operator)?,
                value: parse_price(raw)?,
            })),
            _ => Some(None),
        };

        let condition = match self.condition {
            None => None,
            Some(raw) if raw.trim().is_empty() => Some(None),
            Some(raw) => Some(Some(Condition::from_str(raw.trim())?)),
        };

        Ok(FilterUpdate { search_term: self.search_term, price, condition })
    }
}

fn username(session: &Session) -> Option<String> {
    session.current_user().map(|u| u.username)
}

fn list_page(app_state: &AppState) -> AppResult<Html<String>> {
    let template = CarsTemplate::new(
        &app_state.store.snapshot(),
        username(&app_state.session),
        app_state.settings.page_size,
    );
    render(&template)
}

// Where a failed mutation lands: the login page once the session is gone,
// otherwise back to the page whose error banner now carries the message.
fn redirect_after_failure(error: &ApiError, fallback: &str) -> Response {
    match error {
        ApiError::SessionExpired | ApiError::Unauthorized => Redirect::to("/login").into_response(),
        _ => Redirect::to(fallback).into_response(),
    }
}

// Re-renders the detail page for a locally held car with an error message
fn detail_with_error(app_state: &AppState, id: u64, error: &ApiError) -> AppResult<Response> {
    if matches!(error, ApiError::SessionExpired | ApiError::Unauthorized) {
        return Ok(Redirect::to("/login").into_response());
    }
    let snapshot = app_state.store.snapshot();
    match snapshot.cars.iter().find(|c| c.id == id) {
        Some(car) => {
            let template = CarDetailTemplate::new(car, username(&app_state.session), Some(error.to_string()));
            Ok(render(&template)?.into_response())
        }
        None => Ok(Redirect::to("/cars/view").into_response()),
    }
}

async fn read_car_form(mut multipart: Multipart) -> AppResult<(CarDraft, Option<ImageUpload>)> {
    let mut draft = CarDraft::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read image: {}", e)))?;
            // Browsers send an empty part when no file was chosen
            if !file_name.is_empty() && !bytes.is_empty() {
                image = Some(ImageUpload { file_name, content_type, bytes: bytes.to_vec() });
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
        draft.set_from_form(&name, &text)?;
    }

    Ok((draft, image))
}

// --- Handlers ---

pub async fn list_cars(
    State(app_state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Html<String>> {
    let settings: &Settings = &app_state.settings;
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    // Failures land in the store's error and show on the page
    let outcome = match search {
        Some(term) => {
            tracing::info!("[HANDLER] /cars - searching for '{}'", term);
            app_state.store.search_collection(term).await
        }
        None => {
            let page = query.page.unwrap_or(1).max(1);
            let page_size = clamp_page_size(query.page_size.unwrap_or(settings.page_size));
            tracing::info!("[HANDLER] /cars - page {} (size {})", page, page_size);
            app_state.store.fetch_collection(page, page_size).await
        }
    };
    if let Err(e) = outcome {
        tracing::debug!(error = %e, "Rendering car list with load error");
    }

    list_page(&app_state)
}

pub async fn view_cars(State(app_state): State<AppState>) -> AppResult<Html<String>> {
    list_page(&app_state)
}

pub async fn update_filters(
    State(app_state): State<AppState>,
    Form(form): Form<FilterForm>,
) -> AppResult<Redirect> {
    let update = form.into_update()?;
    app_state.store.update_filters(update);
    Ok(Redirect::to("/cars/view"))
}

pub async fn clear_filters(State(app_state): State<AppState>) -> Redirect {
    app_state.store.clear_filters();
    Redirect::to("/cars/view")
}

pub async fn car_detail(State(app_state): State<AppState>, Path(id): Path<u64>) -> AppResult<Html<String>> {
    let car = app_state.store.fetch_car(id).await?;
    render(&CarDetailTemplate::new(&car, username(&app_state.session), None))
}

pub async fn create_car(State(app_state): State<AppState>, multipart: Multipart) -> AppResult<Response> {
    let (draft, image) = read_car_form(multipart).await?;
    tracing::info!("[HANDLER] POST /cars - submitting {:?} {:?}", draft.make, draft.model);

    match app_state.store.add_car(draft, image).await {
        Ok(car) => Ok(Redirect::to(&format!("/cars/{}", car.id)).into_response()),
        Err(e) => Ok(redirect_after_failure(&e, "/cars/view")),
    }
}

pub async fn replace_car(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> AppResult<Response> {
    let (draft, image) = read_car_form(multipart).await?;

    match app_state.store.replace_car(id, draft, image).await {
        Ok(()) => Ok(Redirect::to(&format!("/cars/{}", id)).into_response()),
        Err(e) => detail_with_error(&app_state, id, &e),
    }
}

pub async fn update_field(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
    Form(form): Form<FieldForm>,
) -> AppResult<Response> {
    let update = FieldUpdate::parse(&form.field, &form.value)?;

    match app_state.store.update_field(id, update).await {
        Ok(()) => Ok(Redirect::to(&format!("/cars/{}", id)).into_response()),
        Err(e) => detail_with_error(&app_state, id, &e),
    }
}

pub async fn delete_car(State(app_state): State<AppState>, Path(id): Path<u64>) -> Response {
    match app_state.store.remove_car(id).await {
        Ok(()) => Redirect::to("/cars/view").into_response(),
        Err(e) => redirect_after_failure(&e, "/cars/view"),
    }
}

// JSON view of the store, for scripts and debugging
pub async fn snapshot_json(State(app_state): State<AppState>) -> Json<StoreSnapshot> {
    Json(app_state.store.snapshot())
}
