use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::HeaderMap, StatusCode},
    Error, HttpResponse,
};
use error_types::{responses, HttpErrorResponse};
use futures::future::{ready, Ready};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Header carrying the shared secret on the mobile surface
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateRejection {
    /// No shared secret configured on the server
    #[error("api key gate is not configured")]
    NotConfigured,

    /// Missing or wrong credential
    #[error("missing or invalid api key")]
    InvalidCredential,
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            GateRejection::InvalidCredential => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn body(&self) -> HttpErrorResponse {
        match self {
            GateRejection::NotConfigured => responses::not_configured("Mobile API"),
            GateRejection::InvalidCredential => responses::unauthorized(),
        }
    }
}

/// Shared-secret check for API clients
#[derive(Clone)]
pub struct ApiKeyGate {
    expected: Option<String>,
}

impl std::fmt::Debug for ApiKeyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGate")
            .field("configured", &self.expected.is_some())
            .finish()
    }
}

impl ApiKeyGate {
    /// A blank secret counts as not configured.
    pub fn new(expected: Option<String>) -> Self {
        let expected = expected
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        Self { expected }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), GateRejection> {
        let expected = self
            .expected
            .as_deref()
            .ok_or(GateRejection::NotConfigured)?;

        let provided = headers
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .ok_or(GateRejection::InvalidCredential)?;

        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            Err(GateRejection::InvalidCredential)
        }
    }
}

/// Rejects requests that fail [`ApiKeyGate::authorize`].
pub struct ApiKeyMiddleware {
    gate: Arc<ApiKeyGate>,
}

impl ApiKeyMiddleware {
    pub fn new(gate: Arc<ApiKeyGate>) -> Self {
        Self { gate }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService {
            service: Rc::new(service),
            gate: self.gate.clone(),
        }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: Rc<S>,
    gate: Arc<ApiKeyGate>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let verdict = self.gate.authorize(req.headers());

        Box::pin(async move {
            if let Err(rejection) = verdict {
                tracing::warn!(path = %req.path(), reason = %rejection, "API key rejected");
                let response = HttpResponse::build(rejection.status()).json(rejection.body());
                return Ok(req.into_response(response).map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
