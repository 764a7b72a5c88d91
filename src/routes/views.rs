// Askama templates and the view models they render

use askama::Template;
use axum::response::Html;

use crate::{
    error::{AppError, AppResult},
    filter::PriceOperator,
    models::{Car, Condition},
    store::StoreSnapshot,
};

pub fn render<T: Template>(template: &T) -> AppResult<Html<String>> {
    template.render().map(Html).map_err(|e| {
        tracing::error!("Failed to render template: {}", e);
        AppError::InternalServerError(anyhow::Error::new(e))
    })
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

pub fn format_price(price: Option<f64>) -> String {
    or_dash(price.map(|p| format!("${:.2}", p)))
}

// One line of the car table
pub struct CarRow {
    pub id: u64,
    pub title: String,
    pub price: String,
    pub mileage: String,
    pub condition: String,
    pub vin: String,
}

impl From<&Car> for CarRow {
    fn from(car: &Car) -> Self {
        CarRow {
            id: car.id,
            title: car.title(),
            price: format_price(car.price),
            mileage: or_dash(car.mileage.map(|m| format!("{} km", m))),
            condition: or_dash(car.condition.map(|c| c.to_string())),
            vin: or_dash(car.vin.clone()),
        }
    }
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

fn condition_options(selected: Option<Condition>) -> Vec<SelectOption> {
    let mut options = vec![SelectOption { value: String::new(), label: "Any".into(), selected: selected.is_none() }];
    options.extend(Condition::ALL.iter().map(|c| SelectOption {
        value: c.to_string(),
        label: c.to_string(),
        selected: selected == Some(*c),
    }));
    options
}

#[derive(Template)]
#[template(path = "cars.html")]
pub struct CarsTemplate {
    pub username: String,
    pub rows: Vec<CarRow>,
    pub shown: usize,
    pub loaded: usize,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub prev_page: u32,
    pub next_page: u32,
    pub has_prev: bool,
    pub has_next: bool,
    pub loading: bool,
    pub error: String,
    pub search_term: String,
    pub price_greater: bool,
    pub price_less: bool,
    pub price_value: String,
    pub conditions: Vec<SelectOption>,
}

impl CarsTemplate {
    pub fn new(snapshot: &StoreSnapshot, username: Option<String>, default_page_size: u32) -> Self {
        let page = snapshot.current_page.max(1);
        let page_size = if snapshot.page_size == 0 { default_page_size } else { snapshot.page_size };
        let seen = u64::from(page) * u64::from(page_size);
        let price = snapshot.filters.price;

        CarsTemplate {
            username: username.unwrap_or_default(),
            rows: snapshot.filtered.iter().map(CarRow::from).collect(),
            shown: snapshot.filtered_count,
            loaded: snapshot.cars.len(),
            total_count: snapshot.total_count,
            page,
            page_size,
            prev_page: page.saturating_sub(1).max(1),
            next_page: page + 1,
            has_prev: page > 1,
            has_next: seen < snapshot.total_count,
            loading: snapshot.loading,
            error: snapshot.error.clone().unwrap_or_default(),
            search_term: snapshot.filters.search_term.clone(),
            price_greater: price.is_some_and(|p| p.operator == PriceOperator::Greater),
            price_less: price.is_some_and(|p| p.operator == PriceOperator::Less),
            price_value: price.map(|p| p.value.to_string()).unwrap_or_default(),
            conditions: condition_options(snapshot.filters.condition),
        }
    }
}

// Editable fields on the detail page, in display order
pub struct FieldRow {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
}

#[derive(Template)]
#[template(path = "car_detail.html")]
pub struct CarDetailTemplate {
    pub username: String,
    pub id: u64,
    pub title: String,
    pub image: String,
    pub fields: Vec<FieldRow>,
    pub created_at: String,
    pub updated_at: String,
    pub error: String,
}

impl CarDetailTemplate {
    pub fn new(car: &Car, username: Option<String>, error: Option<String>) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let number = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();

        let fields = vec![
            FieldRow { name: "make", label: "Make", value: text(&car.make) },
            FieldRow { name: "model", label: "Model", value: text(&car.model) },
            FieldRow { name: "year", label: "Year", value: number(car.year) },
            FieldRow { name: "vin", label: "VIN", value: text(&car.vin) },
            FieldRow { name: "mileage", label: "Mileage", value: number(car.mileage) },
            FieldRow { name: "price", label: "Price", value: car.price.map(|p| p.to_string()).unwrap_or_default() },
            FieldRow { name: "features", label: "Features", value: text(&car.features) },
            FieldRow {
                name: "condition",
                label: "Condition",
                value: car.condition.map(|c| c.to_string()).unwrap_or_default(),
            },
        ];

        CarDetailTemplate {
            username: username.unwrap_or_default(),
            id: car.id,
            title: car.title(),
            image: text(&car.image),
            fields,
            created_at: or_dash(car.created_at.clone()),
            updated_at: or_dash(car.updated_at.clone()),
            error: error.unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub username: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_render_missing_values_as_dash() {
        let car: Car = serde_json::from_value(json!({ "id": 3, "make": "Fiat" })).unwrap();
        let row = CarRow::from(&car);
        assert_eq!(row.title, "Fiat");
        assert_eq!(row.price, "-");
        assert_eq!(row.condition, "-");
    }

    #[test]
    fn paging_links_follow_total_count() {
        let snapshot = StoreSnapshot { total_count: 45, current_page: 2, page_size: 20, ..Default::default() };
        let template = CarsTemplate::new(&snapshot, None, 20);
        assert!(template.has_prev);
        assert!(template.has_next);
        assert_eq!(template.next_page, 3);

        let last = StoreSnapshot { total_count: 45, current_page: 3, page_size: 20, ..Default::default() };
        assert!(!CarsTemplate::new(&last, None, 20).has_next);
    }

    #[test]
    fn login_page_renders() {
        let html = LoginTemplate { username: String::new(), error: "Login failed".into() }.render().unwrap();
        assert!(html.contains("Login failed"));
    }
}
