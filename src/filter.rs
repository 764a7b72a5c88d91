//! In-memory filtering of a fetched car list.
//!
//! A [`FilterSpec`] combines up to three criteria (free-text search, price
//! comparison, condition). [`apply`] keeps the cars that satisfy every active
//! criterion, in their original order. An inactive spec is the identity.

use serde::{Deserialize, Serialize};

use crate::models::{Car, Condition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceOperator {
    Greater,
    Less,
}

/// Strict price comparison against a threshold; equality never matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFilter {
    pub operator: PriceOperator,
    pub value: f64,
}

/// The user's current filter intent. Empty search term and `None` mean inactive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub search_term: String,
    pub price: Option<PriceFilter>,
    pub condition: Option<Condition>,
}

/// Partial filter change. Omitted fields keep their previous value;
/// `Some(None)` explicitly switches a price/condition filter off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterUpdate {
    pub search_term: Option<String>,
    pub price: Option<Option<PriceFilter>>,
    pub condition: Option<Option<Condition>>,
}

impl FilterSpec {
    pub fn is_active(&self) -> bool {
        !self.search_term.is_empty() || self.price.is_some() || self.condition.is_some()
    }

    pub fn merge(&mut self, update: FilterUpdate) {
        if let Some(term) = update.search_term {
            self.search_term = term;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(condition) = update.condition {
            self.condition = condition;
        }
    }

    pub fn matches(&self, car: &Car) -> bool {
        let search = SearchTerm::new(&self.search_term);
        let criteria: [Option<&dyn Criterion>; 3] = [
            search.as_ref().map(|c| c as &dyn Criterion),
            self.price.as_ref().map(|c| c as &dyn Criterion),
            self.condition.as_ref().map(|c| c as &dyn Criterion),
        ];
        criteria.into_iter().flatten().all(|c| c.matches(car))
    }
}

/// A single filter criterion evaluated against one car.
pub trait Criterion {
    fn matches(&self, car: &Car) -> bool;
}

/// Case-insensitive substring search over make, model and year.
pub struct SearchTerm {
    needle: String,
}

impl SearchTerm {
    /// `None` when the term is empty (inactive).
    pub fn new(term: &str) -> Option<Self> {
        if term.is_empty() {
            None
        } else {
            Some(SearchTerm { needle: term.to_lowercase() })
        }
    }
}

impl Criterion for SearchTerm {
    fn matches(&self, car: &Car) -> bool {
        let contains = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(&self.needle));

        contains(car.make.as_deref())
            || contains(car.model.as_deref())
            || car.year.is_some_and(|y| y.to_string().contains(&self.needle))
    }
}

impl Criterion for PriceFilter {
    fn matches(&self, car: &Car) -> bool {
        match (car.price, self.operator) {
            (Some(price), PriceOperator::Greater) => price > self.value,
            (Some(price), PriceOperator::Less) => price < self.value,
            (None, _) => false,
        }
    }
}

// A car with no recorded condition passes an active condition filter.
impl Criterion for Condition {
    fn matches(&self, car: &Car) -> bool {
        car.condition.is_none_or(|c| c == *self)
    }
}

/// Returns the cars matching every active criterion of `spec`, preserving order.
pub fn apply(cars: &[Car], spec: &FilterSpec) -> Vec<Car> {
    if !spec.is_active() {
        return cars.to_vec();
    }
    cars.iter().filter(|car| spec.matches(car)).cloned().collect()
}
