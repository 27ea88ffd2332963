use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use crate::api::AppState;

/// HTTP header carrying the index generation a response was computed against
pub const GENERATION_HEADER: &str = "x-index-generation";

/// Stamps every response with an index generation
///
/// Handlers that query the index set the header to the generation they
/// actually used, which stays correct if a publish lands mid-request. Any
/// other response gets the generation current when it leaves the router.
/// Clients pass the value back as `?generation=` to pin follow-up queries.
pub async fn generation_header_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if response.headers().contains_key(GENERATION_HEADER) {
        return response;
    }

    let generation = state.registry.current().id();
    if let Ok(header_value) = HeaderValue::from_str(&generation.to_string()) {
        response
            .headers_mut()
            .insert(GENERATION_HEADER, header_value);
    }

    response
}
