use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::Prediction;

/// Property features submitted for a prediction. Validated at the boundary;
/// the service layer never sees out-of-range values.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqm: f64,
    pub age_years: i32,
    pub location_index: i32,
}

impl PredictRequest {
    /// First violated constraint wins.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=7).contains(&self.bedrooms) {
            return Err("bedrooms must be between 1 and 7".into());
        }
        if !(1..=5).contains(&self.bathrooms) {
            return Err("bathrooms must be between 1 and 5".into());
        }
        if !(self.area_sqm > 0.0 && self.area_sqm <= 1000.0) {
            return Err("area_sqm must be greater than 0 and at most 1000".into());
        }
        if !(0..=120).contains(&self.age_years) {
            return Err("age_years must be between 0 and 120".into());
        }
        if !(0..=10).contains(&self.location_index) {
            return Err("location_index must be between 0 and 10".into());
        }
        Ok(())
    }

    pub fn to_features(&self) -> serde_json::Value {
        serde_json::json!({
            "bedrooms": self.bedrooms,
            "bathrooms": self.bathrooms,
            "area_sqm": self.area_sqm,
            "age_years": self.age_years,
            "location_index": self.location_index,
        })
    }
}

/// Response for a freshly created prediction. Field casing is part of the
/// wire contract and intentionally mixes snake and camel case.
#[derive(Debug, Serialize)]
pub struct PredictionCreated {
    pub id: Uuid,
    pub features: serde_json::Value,
    pub predicted_price: f64,
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanations: Option<serde_json::Value>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

impl From<Prediction> for PredictionCreated {
    fn from(p: Prediction) -> Self {
        Self {
            id: p.id,
            features: p.features,
            predicted_price: p.predicted_price,
            model_version: p.model_version,
            explanations: p.explanations,
            created_at: p.created_at,
            updated_at: p.updated_at,
            version: p.version,
        }
    }
}

/// Zero-based page window shared by the list endpoints.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
}

fn default_size() -> i64 {
    20
}
