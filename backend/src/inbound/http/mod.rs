//! HTTP inbound adapter exposing the trip endpoints and health probes.

pub mod error;
pub mod health;
pub mod state;
pub mod trips;

pub use error::ApiResult;

use actix_web::web;

use crate::domain::DomainError;

/// JSON extractor configuration mapping body errors onto the domain error
/// shape so every 4xx carries `{code, message}`.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        DomainError::invalid_request("request body is not valid")
            .with_details(serde_json::json!({ "reason": message }))
            .into()
    })
}
