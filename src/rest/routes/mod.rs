pub mod health;
pub mod location;
pub mod tasks;

use axum::{http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::geo::{Coordinate, CoordinateError};
use crate::tasks::StoreError;

/// Request body for anything carrying a position.
#[derive(Debug, Deserialize)]
pub struct CoordinateBody {
    pub latitude: f64,
    pub longitude: f64,
}

impl CoordinateBody {
    /// Validate into a `Coordinate`; callers turn the error into a 400.
    pub fn validate(&self) -> Result<Coordinate, CoordinateError> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Map store errors onto REST status codes.
pub(crate) fn store_error(e: StoreError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::AmbiguousId(_) => StatusCode::CONFLICT,
        StoreError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

pub(crate) fn bad_request(msg: impl ToString) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": msg.to_string() })),
    )
}
