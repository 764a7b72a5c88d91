//! End-to-end behaviour of the car store against an in-memory backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};
use tokio::sync::Notify;
use veloce_inventory::{
    cars_api::CarBackend,
    error::ApiError,
    filter::{FilterUpdate, PriceFilter, PriceOperator},
    models::{Car, CarDraft, CarPage, Condition, FieldUpdate, ImageUpload},
    store::CarStore,
};

// =============================================================================
// Fake backend
// =============================================================================

#[derive(Default)]
struct FakeBackend {
    pages: Mutex<HashMap<u32, Result<CarPage, ApiError>>>,
    search: Mutex<Option<CarPage>>,
    gates: Mutex<HashMap<u32, Arc<Notify>>>,
    // Records the backend knows about, for get/update/delete
    records: Mutex<HashMap<u64, Car>>,
    field_error: Mutex<Option<ApiError>>,
    next_id: AtomicU64,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.next_id.store(100, Ordering::SeqCst);
        Arc::new(backend)
    }

    fn set_page(&self, page: u32, cars: Vec<Car>) {
        for car in &cars {
            self.records.lock().unwrap().insert(car.id, car.clone());
        }
        let count = cars.len() as u64;
        self.pages.lock().unwrap().insert(
            page,
            Ok(CarPage { results: cars, count, current: Some(page) }),
        );
    }

    fn fail_page(&self, page: u32, error: ApiError) {
        self.pages.lock().unwrap().insert(page, Err(error));
    }

    // The next list request for `page` waits until the returned Notify fires
    fn gate(&self, page: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(page, gate.clone());
        gate
    }
}

#[async_trait]
impl CarBackend for FakeBackend {
    async fn list_cars(&self, page: u32, _page_size: u32) -> Result<CarPage, ApiError> {
        let gate = self.gates.lock().unwrap().get(&page).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_else(|| Ok(CarPage::default()))
    }

    async fn search_cars(&self, _term: &str) -> Result<CarPage, ApiError> {
        Ok(self.search.lock().unwrap().clone().unwrap_or_default())
    }

    async fn get_car(&self, id: u64) -> Result<Car, ApiError> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ApiError::Validation { status: 404, detail: "Not found.".into() })
    }

    async fn create_car(&self, draft: &CarDraft, _image: Option<&ImageUpload>) -> Result<Car, ApiError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut created = car(id, json!({}));
        draft.apply_to(&mut created);
        self.records.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn replace_car(&self, id: u64, draft: &CarDraft, _image: Option<&ImageUpload>) -> Result<Option<Car>, ApiError> {
        let mut records = self.records.lock().unwrap();
        if let Some(existing) = records.get_mut(&id) {
            draft.apply_to(existing);
        }
        // Mirrors the backend answering with an empty body
        Ok(None)
    }

    async fn update_car_field(&self, id: u64, update: &FieldUpdate) -> Result<Car, ApiError> {
        if let Some(error) = self.field_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or(ApiError::Validation { status: 404, detail: "Not found.".into() })?;
        update.apply(record);
        Ok(record.clone())
    }

    async fn delete_car(&self, id: u64) -> Result<Value, ApiError> {
        self.records.lock().unwrap().remove(&id);
        Ok(json!({ "message": "Car deleted" }))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn car(id: u64, fields: Value) -> Car {
    let mut value = fields;
    value["id"] = json!(id);
    serde_json::from_value(value).unwrap()
}

fn priced(id: u64, price: f64, condition: &str) -> Car {
    car(id, json!({ "make": "Lancia", "model": "Fulvia", "year": 1970, "price": price, "condition": condition }))
}

fn ids(cars: &[Car]) -> Vec<u64> {
    cars.iter().map(|c| c.id).collect()
}

fn setup() -> (Arc<FakeBackend>, CarStore<FakeBackend>) {
    let backend = FakeBackend::new();
    let store = CarStore::new(backend.clone());
    (backend, store)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn condition_filter_then_clear_restores_full_list() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "new"), priced(2, 15000.0, "used"), priced(3, 25000.0, "classic")]);

    store.fetch_collection(1, 20).await.unwrap();
    store.update_filters(FilterUpdate { condition: Some(Some(Condition::New)), ..Default::default() });

    let filtered = store.snapshot();
    assert_eq!(ids(&filtered.filtered), vec![1]);
    assert_eq!(filtered.filtered_count, 1);
    assert_eq!(filtered.cars.len(), 3);

    store.clear_filters();
    let cleared = store.snapshot();
    assert_eq!(ids(&cleared.filtered), vec![1, 2, 3]);
    assert!(!cleared.filters.is_active());
}

#[tokio::test]
async fn network_failure_sets_error_and_keeps_collection() {
    let (backend, store) = setup();
    backend.fail_page(1, ApiError::Network("connection refused".into()));

    let result = store.fetch_collection(1, 20).await;

    assert!(result.is_err());
    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.cars.is_empty());
    assert_eq!(snapshot.error.as_deref(), Some("Network error: connection refused"));
}

#[tokio::test]
async fn failed_refetch_leaves_previous_collection() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "new")]);
    store.fetch_collection(1, 20).await.unwrap();

    backend.fail_page(2, ApiError::Status { status: 503 });
    assert!(store.fetch_collection(2, 20).await.is_err());

    let snapshot = store.snapshot();
    assert_eq!(ids(&snapshot.cars), vec![1]);
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.error.as_deref(), Some("Request failed with status 503"));

    // A later success clears the banner
    store.fetch_collection(1, 20).await.unwrap();
    assert_eq!(store.snapshot().error, None);
}

#[tokio::test]
async fn field_update_changes_only_the_target_record() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(3, 4000.0, "used"), priced(7, 9000.0, "used"), priced(9, 7000.0, "new")]);
    store.fetch_collection(1, 20).await.unwrap();
    let before = store.snapshot().cars;

    store.update_field(7, FieldUpdate::Price(Some(12000.0))).await.unwrap();

    let after = store.snapshot().cars;
    assert_eq!(after[1].price, Some(12000.0));
    assert_eq!(after[0], before[0]);
    assert_eq!(after[2], before[2]);
}

#[tokio::test]
async fn field_update_rederives_active_filter() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "used"), priced(2, 15000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();
    store.update_filters(FilterUpdate {
        price: Some(Some(PriceFilter { operator: PriceOperator::Greater, value: 10000.0 })),
        ..Default::default()
    });
    assert_eq!(ids(&store.snapshot().filtered), vec![2]);

    store.update_field(1, FieldUpdate::Price(Some(11000.0))).await.unwrap();

    assert_eq!(ids(&store.snapshot().filtered), vec![1, 2]);
}

#[tokio::test]
async fn field_update_for_unknown_local_record_fetches_it() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();
    // Known to the backend but not on the loaded page
    backend.records.lock().unwrap().insert(42, priced(42, 30000.0, "classic"));

    store.update_field(42, FieldUpdate::Price(Some(31000.0))).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(ids(&snapshot.cars), vec![1, 42]);
    assert_eq!(snapshot.cars[1].price, Some(31000.0));
    assert_eq!(snapshot.error, None);
}

#[tokio::test]
async fn field_update_failure_sets_error_and_leaves_record() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(7, 9000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();
    *backend.field_error.lock().unwrap() = Some(ApiError::SessionExpired);

    let result = store.update_field(7, FieldUpdate::Price(Some(1.0))).await;

    assert!(matches!(result, Err(ApiError::SessionExpired)));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.cars[0].price, Some(9000.0));
    assert_eq!(snapshot.error.as_deref(), Some("Session expired. Please log in again."));
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn stale_fetch_response_is_discarded() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "new")]);
    backend.set_page(2, vec![priced(2, 6000.0, "used")]);
    let gate = backend.gate(1);

    let slow = store.fetch_collection(1, 20);
    let fast = async {
        store.fetch_collection(2, 20).await.unwrap();
        gate.notify_one();
    };
    let (slow_result, ()) = tokio::join!(slow, fast);

    assert!(slow_result.is_ok());
    let snapshot = store.snapshot();
    assert_eq!(ids(&snapshot.cars), vec![2]);
    assert_eq!(snapshot.current_page, 2);
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn loading_is_set_while_request_is_pending() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "new")]);
    let gate = backend.gate(1);

    let fetch = store.fetch_collection(1, 20);
    let observe = async {
        let loading = store.snapshot().loading;
        gate.notify_one();
        loading
    };
    let (result, loading_while_pending) = tokio::join!(fetch, observe);

    result.unwrap();
    assert!(loading_while_pending);
    assert!(!store.snapshot().loading);
}

#[tokio::test]
async fn new_collection_is_filtered_with_existing_spec() {
    let (backend, store) = setup();
    store.update_filters(FilterUpdate { search_term: Some("giulia".into()), ..Default::default() });
    backend.set_page(
        1,
        vec![
            car(1, json!({ "make": "Alfa Romeo", "model": "Giulia" })),
            car(2, json!({ "make": "Alfa Romeo", "model": "Spider" })),
        ],
    );

    store.fetch_collection(1, 20).await.unwrap();

    assert_eq!(ids(&store.snapshot().filtered), vec![1]);
}

#[tokio::test]
async fn search_replaces_collection() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "new"), priced(2, 6000.0, "new")]);
    store.fetch_collection(1, 20).await.unwrap();
    *backend.search.lock().unwrap() = Some(CarPage {
        results: vec![priced(2, 6000.0, "new")],
        count: 1,
        current: None,
    });

    store.search_collection("fulvia").await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(ids(&snapshot.cars), vec![2]);
    assert_eq!(snapshot.total_count, 1);
    assert_eq!(snapshot.current_page, 1);
}

#[tokio::test]
async fn created_car_is_appended_and_visible_under_filter() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();
    store.update_filters(FilterUpdate { condition: Some(Some(Condition::Classic)), ..Default::default() });

    let draft = CarDraft {
        make: Some("Alfa Romeo".into()),
        model: Some("Giulia 1600".into()),
        condition: Some(Condition::Classic),
        ..Default::default()
    };
    let created = store.add_car(draft, None).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(created.id, 100);
    assert_eq!(ids(&snapshot.cars), vec![1, 100]);
    assert_eq!(ids(&snapshot.filtered), vec![100]);
    assert_eq!(snapshot.total_count, 2);
}

#[tokio::test]
async fn removed_car_leaves_collection_and_view() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "used"), priced(2, 6000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();

    store.remove_car(1).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(ids(&snapshot.cars), vec![2]);
    assert_eq!(ids(&snapshot.filtered), vec![2]);
    assert_eq!(snapshot.total_count, 1);
}

#[tokio::test]
async fn full_update_with_empty_response_applies_draft() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(5, 5000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();

    let draft = CarDraft { price: Some(5500.0), features: Some("New tyres".into()), ..Default::default() };
    store.replace_car(5, draft, None).await.unwrap();

    let record = &store.snapshot().cars[0];
    assert_eq!(record.price, Some(5500.0));
    assert_eq!(record.features.as_deref(), Some("New tyres"));
    assert_eq!(record.make.as_deref(), Some("Lancia"));
}

#[tokio::test]
async fn fetched_car_is_merged_into_collection() {
    let (backend, store) = setup();
    backend.set_page(1, vec![priced(1, 5000.0, "used")]);
    store.fetch_collection(1, 20).await.unwrap();
    backend.records.lock().unwrap().insert(1, priced(1, 4500.0, "used"));

    let fetched = store.fetch_car(1).await.unwrap();

    assert_eq!(fetched.price, Some(4500.0));
    let snapshot = store.snapshot();
    assert_eq!(snapshot.cars.len(), 1);
    assert_eq!(snapshot.cars[0].price, Some(4500.0));

    assert!(store.fetch_car(404).await.is_err());
    assert_eq!(store.snapshot().error.as_deref(), Some("Not found."));
}
