// Data structures shared by the REST client, the store and the web layer

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::{fmt, str::FromStr};

use crate::error::ApiError;

// Vehicle condition as stored by the backend ("new" / "used" / "classic").
// Parsing is case-insensitive so "New" from a form and "new" from the API agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
    Classic,
}

impl Condition {
    pub const ALL: [Condition; 3] = [Condition::New, Condition::Used, Condition::Classic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
            Condition::Classic => "classic",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(Condition::New),
            "used" => Ok(Condition::Used),
            "classic" => Ok(Condition::Classic),
            other => Err(ApiError::InvalidField(format!("unknown condition '{}'", other))),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// The backend stores price as a 12-digit decimal and serializes it as a string
// ("12000.00"); older endpoints send a plain number. Accept both.
fn deserialize_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDecimal {
        Number(f64),
        Text(String),
    }

    match Option::<RawDecimal>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDecimal::Number(n)) => Ok(Some(n)),
        Some(RawDecimal::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawDecimal::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid decimal '{}': {}", s, e))),
    }
}

// One vehicle listing. Everything except the identifier may be null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: u64,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub mileage: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub price: Option<f64>,
    #[serde(default)]
    pub features: Option<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub owner: Option<u64>,
    // Opaque ISO timestamps, never parsed here
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Car {
    pub fn title(&self) -> String {
        let parts: Vec<String> = [
            self.year.map(|y| y.to_string()),
            self.make.clone(),
            self.model.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            format!("Car #{}", self.id)
        } else {
            parts.join(" ")
        }
    }
}

// A car as submitted by a user: no identifier, no timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarDraft {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u32>,
    pub vin: Option<String>,
    pub mileage: Option<u32>,
    pub price: Option<f64>,
    pub features: Option<String>,
    pub condition: Option<Condition>,
}

impl CarDraft {
    // Text form fields for a multipart payload, skipping nulls
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(v) = value {
                fields.push((key, v));
            }
        };
        push("make", self.make.clone());
        push("model", self.model.clone());
        push("year", self.year.map(|v| v.to_string()));
        push("vin", self.vin.clone());
        push("mileage", self.mileage.map(|v| v.to_string()));
        push("price", self.price.map(|v| v.to_string()));
        push("features", self.features.clone());
        push("condition", self.condition.map(|c| c.to_string()));
        fields
    }

    // Sets one draft field from raw form text. Blank text leaves the field null.
    pub fn set_from_form(&mut self, field: &str, raw: &str) -> Result<(), ApiError> {
        match FieldUpdate::parse(field, raw)? {
            FieldUpdate::Make(v) => self.make = v,
            FieldUpdate::Model(v) => self.model = v,
            FieldUpdate::Year(v) => self.year = v,
            FieldUpdate::Vin(v) => self.vin = v,
            FieldUpdate::Mileage(v) => self.mileage = v,
            FieldUpdate::Price(v) => self.price = v,
            FieldUpdate::Features(v) => self.features = v,
            FieldUpdate::Condition(v) => self.condition = v,
            FieldUpdate::Owner(_) => {
                return Err(ApiError::InvalidField("owner cannot be set from a car form".into()));
            }
        }
        Ok(())
    }

    // Copies the non-null draft fields onto an existing record
    pub fn apply_to(&self, car: &mut Car) {
        if let Some(v) = &self.make {
            car.make = Some(v.clone());
        }
        if let Some(v) = &self.model {
            car.model = Some(v.clone());
        }
        if let Some(v) = self.year {
            car.year = Some(v);
        }
        if let Some(v) = &self.vin {
            car.vin = Some(v.clone());
        }
        if let Some(v) = self.mileage {
            car.mileage = Some(v);
        }
        if let Some(v) = self.price {
            car.price = Some(v);
        }
        if let Some(v) = &self.features {
            car.features = Some(v.clone());
        }
        if let Some(v) = self.condition {
            car.condition = Some(v);
        }
    }
}

// Image file attached to a create/update form
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

// One page of the list/search endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarPage {
    #[serde(default)]
    pub results: Vec<Car>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub current: Option<u32>,
}

/// A single-field change to one car, sent as `{ field: value }`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Make(Option<String>),
    Model(Option<String>),
    Year(Option<u32>),
    Vin(Option<String>),
    Mileage(Option<u32>),
    Price(Option<f64>),
    Features(Option<String>),
    Condition(Option<Condition>),
    Owner(Option<u64>),
}

fn parse_number<T: FromStr>(field: &str, raw: &str) -> Result<Option<T>, ApiError> {
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ApiError::InvalidField(format!("'{}' is not a valid value for {}", raw, field)))
}

impl FieldUpdate {
    /// Builds an update from a field name and the raw text a user typed.
    /// Blank text means "set to null".
    pub fn parse(field: &str, raw: &str) -> Result<Self, ApiError> {
        let raw = raw.trim();
        let text = if raw.is_empty() { None } else { Some(raw.to_string()) };

        let update = match field {
            "make" => FieldUpdate::Make(text),
            "model" => FieldUpdate::Model(text),
            "vin" => FieldUpdate::Vin(text),
            "features" => FieldUpdate::Features(text),
            "year" if raw.is_empty() => FieldUpdate::Year(None),
            "year" => FieldUpdate::Year(parse_number(field, raw)?),
            "mileage" if raw.is_empty() => FieldUpdate::Mileage(None),
            "mileage" => FieldUpdate::Mileage(parse_number(field, raw)?),
            "price" if raw.is_empty() => FieldUpdate::Price(None),
            "price" => {
                let price: Option<f64> = parse_number(field, raw)?;
                if price.is_some_and(|p| !p.is_finite() || p < 0.0) {
                    return Err(ApiError::InvalidField(format!("'{}' is not a valid price", raw)));
                }
                FieldUpdate::Price(price)
            }
            "condition" if raw.is_empty() => FieldUpdate::Condition(None),
            "condition" => FieldUpdate::Condition(Some(raw.parse()?)),
            "owner" if raw.is_empty() => FieldUpdate::Owner(None),
            "owner" => FieldUpdate::Owner(parse_number(field, raw)?),
            other => return Err(ApiError::InvalidField(format!("unknown car field '{}'", other))),
        };
        Ok(update)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldUpdate::Make(_) => "make",
            FieldUpdate::Model(_) => "model",
            FieldUpdate::Year(_) => "year",
            FieldUpdate::Vin(_) => "vin",
            FieldUpdate::Mileage(_) => "mileage",
            FieldUpdate::Price(_) => "price",
            FieldUpdate::Features(_) => "features",
            FieldUpdate::Condition(_) => "condition",
            FieldUpdate::Owner(_) => "owner",
        }
    }

    pub fn to_json(&self) -> Value {
        let value = match self {
            FieldUpdate::Make(v) | FieldUpdate::Model(v) | FieldUpdate::Vin(v) | FieldUpdate::Features(v) => json!(v),
            FieldUpdate::Year(v) | FieldUpdate::Mileage(v) => json!(v),
            FieldUpdate::Price(v) => json!(v),
            FieldUpdate::Condition(v) => json!(v),
            FieldUpdate::Owner(v) => json!(v),
        };
        let mut body = serde_json::Map::new();
        body.insert(self.name().to_string(), value);
        Value::Object(body)
    }

    pub fn apply(&self, car: &mut Car) {
        match self {
            FieldUpdate::Make(v) => car.make = v.clone(),
            FieldUpdate::Model(v) => car.model = v.clone(),
            FieldUpdate::Year(v) => car.year = *v,
            FieldUpdate::Vin(v) => car.vin = v.clone(),
            FieldUpdate::Mileage(v) => car.mileage = *v,
            FieldUpdate::Price(v) => car.price = *v,
            FieldUpdate::Features(v) => car.features = v.clone(),
            FieldUpdate::Condition(v) => car.condition = *v,
            FieldUpdate::Owner(v) => car.owner = *v,
        }
    }
}

// --- Authentication payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}
