use actix_web::{
    Error,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
};
use tracing::debug;

pub const TRACE_ID_HEADER: &str = "X-Trace-ID";

/**
 * Returns the trace id of the request headers, or a new UUID when the header is missing or not valid text.
 */
pub fn trace_id_from_headers(headers: &HeaderMap) -> String {
    headers.get(TRACE_ID_HEADER).and_then(|value| value.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/**
 * Middleware for timing requests.
 *
 * Makes sure every request carries a trace id, so that handlers log the same id that is echoed in the response.
 */
pub async fn timing_middleware(mut request: ServiceRequest, next: Next<impl MessageBody>) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start_time = std::time::Instant::now();
    let trace_id = trace_id_from_headers(request.headers());
    let header_value = HeaderValue::from_str(&trace_id).ok();
    if let Some(value) = &header_value {
        request.headers_mut().insert(HeaderName::from_static("x-trace-id"), value.clone());
    }
    let path = &request.path().to_owned();
    let method = &request.method().to_owned();
    let mut response = next.call(request).await;
    let response_code = match &mut response {
        Ok(service_response) => {
            if let Some(value) = header_value {
                service_response.headers_mut().insert(HeaderName::from_static("x-trace-id"), value);
            }
            service_response.status().as_u16()
        }
        Err(_) => 500,
    };
    let duration = start_time.elapsed();
    debug!(target: "performance", "Request {} for {} {} with status {} processed in {:?}ms", trace_id, method, path, response_code, duration.as_millis());
    response
}
