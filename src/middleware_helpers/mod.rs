pub mod error_capture;
pub mod request_id;

pub use error_capture::error_capture_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
