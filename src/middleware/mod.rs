pub mod generation;
pub mod request_id;

pub use generation::{generation_header_middleware, GENERATION_HEADER};
pub use request_id::{make_span_with_request_id, request_id_middleware, RequestId};
