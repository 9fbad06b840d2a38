use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::{ok, ready, Ready};
use log::warn;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::config::settings::ServiceGateConfig;
use crate::error::AppError;
use crate::security::service_credentials::verify_service_credentials;

pub const SERVICE_KEY_HEADER: &str = "x-api-key";

#[derive(Deserialize)]
struct ServiceKeyPayload {
    key: String,
    code: String,
}

/// Gates service-to-service endpoints. Callers present the shared key and
/// code as a JSON payload in the `x-api-key` header.
#[derive(Clone)]
pub struct ServiceKeyAuthentication {
    gate: ServiceGateConfig,
}

impl ServiceKeyAuthentication {
    pub fn new(gate: ServiceGateConfig) -> Self {
        Self { gate }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ServiceKeyAuthentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ServiceKeyAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ServiceKeyAuthenticationMiddleware {
            service: Arc::new(service),
            gate: self.gate.clone(),
        })
    }
}

pub struct ServiceKeyAuthenticationMiddleware<S> {
    service: Arc<S>,
    gate: ServiceGateConfig,
}

impl<S, B> Service<ServiceRequest> for ServiceKeyAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if req.method() == actix_web::http::Method::OPTIONS {
            return Box::pin(self.service.call(req));
        }

        if let Err(e) = check_service_key(&req, &self.gate) {
            warn!("Service key rejected on {}: {}", req.path(), e);
            return Box::pin(ready(Err(e.into())));
        }
        Box::pin(self.service.call(req))
    }
}

fn check_service_key(req: &ServiceRequest, gate: &ServiceGateConfig) -> Result<(), AppError> {
    let header = req
        .headers()
        .get(SERVICE_KEY_HEADER)
        .ok_or_else(|| AppError::Auth(format!("Missing {} header", SERVICE_KEY_HEADER)))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Auth(format!("Invalid {} header", SERVICE_KEY_HEADER)))?;
    let payload: ServiceKeyPayload = serde_json::from_str(value)
        .map_err(|_| AppError::Auth(format!("Malformed {} payload", SERVICE_KEY_HEADER)))?;

    if !verify_service_credentials(&payload.key, &payload.code, gate) {
        return Err(AppError::Auth("Invalid service credentials".to_string()));
    }
    Ok(())
}
