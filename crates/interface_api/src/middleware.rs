//! API middleware

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use chrono::Utc;
use tracing::info;

/// Header naming the operator behind a request
pub const OPERATOR_HEADER: &str = "x-operator";

const MAX_OPERATOR_LEN: usize = 64;

/// Operator recorded as `created_by` on the entries a request writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operator(pub Option<String>);

impl Operator {
    fn from_request(request: &Request<Body>) -> Self {
        let name = request
            .headers()
            .get(OPERATOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty() && name.len() <= MAX_OPERATOR_LEN)
            .map(str::to_string);
        Operator(name)
    }

    pub fn name(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Audit logging middleware
///
/// Extracts the operator for the handlers and logs every request with its
/// outcome and latency.
pub async fn audit_middleware(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let operator = Operator::from_request(&request);
    let operator_name = operator.0.clone().unwrap_or_else(|| "anonymous".to_string());
    request.extensions_mut().insert(operator);

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        operator = %operator_name,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
