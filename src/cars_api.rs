// Functions to interact with the car inventory REST backend

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{sync::Arc, time::Duration};

use crate::{
    config::{clamp_page_size, Settings},
    error::ApiError,
    models::{Car, CarDraft, CarPage, FieldUpdate, ImageUpload},
    session::Session,
};

/// Everything the store needs from the network.
#[async_trait]
pub trait CarBackend: Send + Sync {
    async fn list_cars(&self, page: u32, page_size: u32) -> Result<CarPage, ApiError>;
    async fn search_cars(&self, term: &str) -> Result<CarPage, ApiError>;
    async fn get_car(&self, id: u64) -> Result<Car, ApiError>;
    async fn create_car(&self, draft: &CarDraft, image: Option<&ImageUpload>) -> Result<Car, ApiError>;
    /// Full update; the backend may answer with the updated car or an empty body.
    async fn replace_car(&self, id: u64, draft: &CarDraft, image: Option<&ImageUpload>) -> Result<Option<Car>, ApiError>;
    async fn update_car_field(&self, id: u64, update: &FieldUpdate) -> Result<Car, ApiError>;
    async fn delete_car(&self, id: u64) -> Result<Value, ApiError>;
}

// Shared reqwest client for the backend and the auth endpoints
pub fn build_http_client(settings: &Settings) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("veloce_inventory/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("Failed to build reqwest client")
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

// Reads the body, turning non-2xx responses into ApiError
async fn read_body(response: Response, label: Option<&str>) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    let body = response.bytes().await?.to_vec();
    if !status.is_success() {
        tracing::debug!(status = %status, body = %String::from_utf8_lossy(&body), "Backend returned an error");
        return Err(ApiError::from_response(status.as_u16(), &body, label));
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = read_body(response, None).await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn send(request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
    read_body(request.send().await?, None).await
}

async fn send_multipart(request: RequestBuilder, form: Result<Form, ApiError>, label: &'static str) -> Result<Vec<u8>, ApiError> {
    let response = request.multipart(form?).send().await?;
    read_body(response, Some(label)).await
}

fn multipart_form(draft: &CarDraft, image: Option<&ImageUpload>) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for (key, value) in draft.form_fields() {
        form = form.text(key, value);
    }
    if let Some(image) = image {
        let mut part = Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|_| ApiError::InvalidField(format!("invalid image content type '{}'", content_type)))?;
        }
        form = form.part("image", part);
    }
    Ok(form)
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, session: Arc<Session>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    // Reads are public; a token is attached when we have one
    async fn get_public<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let token = self.session.access_token();
        let request = authorize(self.client.get(self.url(path)).query(query), token.as_deref());
        read_json(request.send().await?).await
    }
}

#[async_trait]
impl CarBackend for ApiClient {
    async fn list_cars(&self, page: u32, page_size: u32) -> Result<CarPage, ApiError> {
        let page = page.max(1);
        let page_size = clamp_page_size(page_size);
        tracing::debug!(page, page_size, "GET cars");
        self.get_public("cars", &[("page", page.to_string()), ("page_size", page_size.to_string())])
            .await
    }

    async fn search_cars(&self, term: &str) -> Result<CarPage, ApiError> {
        tracing::debug!(term, "GET cars?search");
        self.get_public("cars", &[("search", term.to_string())]).await
    }

    async fn get_car(&self, id: u64) -> Result<Car, ApiError> {
        self.get_public(&format!("cars/{}", id), &[]).await
    }

    async fn create_car(&self, draft: &CarDraft, image: Option<&ImageUpload>) -> Result<Car, ApiError> {
        let url = self.url("cars/");
        // Form bodies are consumed on send, so each attempt builds its own
        let body = self
            .session
            .protected(|token| {
                let request = authorize(self.client.post(&url), token.as_deref());
                send_multipart(request, multipart_form(draft, image), "Submission error")
            })
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn replace_car(&self, id: u64, draft: &CarDraft, image: Option<&ImageUpload>) -> Result<Option<Car>, ApiError> {
        let url = self.url(&format!("cars/{}/", id));
        let body = self
            .session
            .protected(|token| {
                let request = authorize(self.client.put(&url), token.as_deref());
                send_multipart(request, multipart_form(draft, image), "Update error")
            })
            .await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn update_car_field(&self, id: u64, update: &FieldUpdate) -> Result<Car, ApiError> {
        let url = self.url(&format!("cars/{}", id));
        let payload = update.to_json();
        tracing::debug!(id, field = update.name(), "PUT single car field");
        let body = self
            .session
            .protected(|token| send(authorize(self.client.put(&url), token.as_deref()).json(&payload)))
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn delete_car(&self, id: u64) -> Result<Value, ApiError> {
        let url = self.url(&format!("cars/{}", id));
        let body = self
            .session
            .protected(|token| send(authorize(self.client.delete(&url), token.as_deref())))
            .await?;
        if body.is_empty() {
            // 204 No Content
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}
