use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::auth_stores::SecurityStore;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    version: String,
    store: String,
}

pub async fn health_check(store: web::Data<SecurityStore>) -> impl Responder {
    // Public endpoint, nothing sensitive beyond which backend is live
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.backend_name().to_string(),
    })
}
