//! Process-wide car collection store.
//!
//! Holds the full collection from the last fetch/search, the filter spec and
//! the filtered view derived from both. Every mutation of either input goes
//! through [`StoreState::derive`], so the view never lags behind.
//!
//! Collection loads are numbered. A response older than the last one applied
//! is dropped, so a slow early fetch cannot overwrite a newer result.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::{
    cars_api::CarBackend,
    error::ApiError,
    filter::{self, FilterSpec, FilterUpdate},
    models::{Car, CarDraft, CarPage, FieldUpdate, ImageUpload},
};

/// Consistent copy of the store for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub cars: Vec<Car>,
    pub filtered: Vec<Car>,
    pub filtered_count: usize,
    pub filters: FilterSpec,
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    cars: Vec<Car>,
    filtered: Vec<Car>,
    filters: FilterSpec,
    total_count: u64,
    current_page: u32,
    page_size: u32,
    in_flight: usize,
    error: Option<String>,
    issued_seq: u64,
    applied_seq: u64,
}

impl StoreState {
    fn derive(&mut self) {
        self.filtered = filter::apply(&self.cars, &self.filters);
    }

    fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn fail(&mut self, error: &ApiError, fallback: &str) {
        let message = error.to_string();
        self.error = Some(if message.trim().is_empty() { fallback.to_string() } else { message });
    }

    // Replaces the record with the same id, or appends it. Returns true on append.
    fn upsert(&mut self, car: Car) -> bool {
        match self.cars.iter_mut().find(|c| c.id == car.id) {
            Some(existing) => {
                *existing = car;
                false
            }
            None => {
                self.cars.push(car);
                true
            }
        }
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            cars: self.cars.clone(),
            filtered: self.filtered.clone(),
            filtered_count: self.filtered.len(),
            filters: self.filters.clone(),
            total_count: self.total_count,
            current_page: self.current_page,
            page_size: self.page_size,
            loading: self.in_flight > 0,
            error: self.error.clone(),
        }
    }
}

pub struct CarStore<B> {
    backend: Arc<B>,
    state: Mutex<StoreState>,
}

impl<B: CarBackend> CarStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: Mutex::new(StoreState::default()),
        }
    }

    // Never held across an await
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.in_flight += 1;
        state.error = None;
    }

    fn begin_load(&self) -> u64 {
        let mut state = self.lock();
        state.in_flight += 1;
        state.error = None;
        state.issued_seq += 1;
        state.issued_seq
    }

    fn finish_load(
        &self,
        seq: u64,
        requested_page: u32,
        page_size: Option<u32>,
        result: Result<CarPage, ApiError>,
        fallback: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.finish();

        if seq < state.applied_seq {
            debug!(seq, applied = state.applied_seq, "Discarding stale collection response");
            return result.map(|_| ());
        }
        state.applied_seq = seq;

        match result {
            Ok(page) => {
                info!(seq, results = page.results.len(), count = page.count, "Car collection replaced");
                state.cars = page.results;
                state.total_count = page.count;
                state.current_page = page.current.unwrap_or(requested_page);
                if let Some(size) = page_size {
                    state.page_size = size;
                }
                state.error = None;
                state.derive();
                Ok(())
            }
            Err(e) => {
                warn!(seq, error = %e, "Car collection request failed");
                state.fail(&e, fallback);
                Err(e)
            }
        }
    }

    pub async fn fetch_collection(&self, page: u32, page_size: u32) -> Result<(), ApiError> {
        let seq = self.begin_load();
        debug!(seq, page, page_size, "Fetching car collection");
        let result = self.backend.list_cars(page, page_size).await;
        self.finish_load(seq, page, Some(page_size), result, "Failed to fetch cars")
    }

    pub async fn search_collection(&self, term: &str) -> Result<(), ApiError> {
        let seq = self.begin_load();
        debug!(seq, term, "Searching car collection");
        let result = self.backend.search_cars(term).await;
        self.finish_load(seq, 1, None, result, "Failed to search cars")
    }

    /// Merges a partial filter change and re-derives the view. Never touches the network.
    pub fn update_filters(&self, update: FilterUpdate) {
        let mut state = self.lock();
        state.filters.merge(update);
        state.derive();
        debug!(filters = ?state.filters, shown = state.filtered.len(), "Filters updated");
    }

    pub fn clear_filters(&self) {
        let mut state = self.lock();
        state.filters = FilterSpec::default();
        state.derive();
        debug!("Filters cleared");
    }

    pub async fn fetch_car(&self, id: u64) -> Result<Car, ApiError> {
        self.begin();
        let result = self.backend.get_car(id).await;

        let mut state = self.lock();
        state.finish();
        match result {
            Ok(car) => {
                state.upsert(car.clone());
                state.derive();
                Ok(car)
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to fetch car");
                state.fail(&e, "Failed to fetch car");
                Err(e)
            }
        }
    }

    pub async fn add_car(&self, draft: CarDraft, image: Option<ImageUpload>) -> Result<Car, ApiError> {
        self.begin();
        let result = self.backend.create_car(&draft, image.as_ref()).await;

        let mut state = self.lock();
        state.finish();
        match result {
            Ok(car) => {
                info!(id = car.id, "Car created");
                if state.upsert(car.clone()) {
                    state.total_count += 1;
                }
                state.derive();
                Ok(car)
            }
            Err(e) => {
                warn!(error = %e, "Failed to create car");
                state.fail(&e, "Failed to submit car");
                Err(e)
            }
        }
    }

    pub async fn replace_car(&self, id: u64, draft: CarDraft, image: Option<ImageUpload>) -> Result<(), ApiError> {
        self.begin();
        let result = self.backend.replace_car(id, &draft, image.as_ref()).await;

        {
            let mut state = self.lock();
            state.finish();
            match result {
                Ok(Some(car)) => {
                    state.upsert(car);
                    state.derive();
                    return Ok(());
                }
                Ok(None) => {
                    if let Some(car) = state.cars.iter_mut().find(|c| c.id == id) {
                        draft.apply_to(car);
                        state.derive();
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!(id, error = %e, "Failed to update car");
                    state.fail(&e, "Failed to update car");
                    return Err(e);
                }
            }
        }

        // Updated remotely but not held locally
        self.fetch_car(id).await.map(|_| ())
    }

    /// Sends a single-field change and applies it to the local record.
    ///
    /// When the record is not in the current collection the backend change
    /// still stands, so the record is fetched and inserted instead of being
    /// silently skipped.
    pub async fn update_field(&self, id: u64, update: FieldUpdate) -> Result<(), ApiError> {
        self.begin();
        let result = self.backend.update_car_field(id, &update).await;

        {
            let mut state = self.lock();
            state.finish();
            if let Err(e) = result {
                warn!(id, field = update.name(), error = %e, "Failed to update car field");
                state.fail(&e, "Failed to update car");
                return Err(e);
            }

            if let Some(car) = state.cars.iter_mut().find(|c| c.id == id) {
                update.apply(car);
                state.derive();
                debug!(id, field = update.name(), "Car field updated");
                return Ok(());
            }
        }

        warn!(id, "Updated car missing from local collection, fetching it");
        self.fetch_car(id).await.map(|_| ())
    }

    pub async fn remove_car(&self, id: u64) -> Result<(), ApiError> {
        self.begin();
        let result = self.backend.delete_car(id).await;

        let mut state = self.lock();
        state.finish();
        match result {
            Ok(_) => {
                let before = state.cars.len();
                state.cars.retain(|c| c.id != id);
                if state.cars.len() < before {
                    state.total_count = state.total_count.saturating_sub(1);
                }
                state.derive();
                info!(id, "Car deleted");
                Ok(())
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to delete car");
                state.fail(&e, "Failed to delete car");
                Err(e)
            }
        }
    }
}
