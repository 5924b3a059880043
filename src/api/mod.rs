//! API layer
//!
//! JSON-lines request/response envelopes over the [`Kernel`](crate::kernel::Kernel).
//!
//! # Design Principles
//!
//! - One JSON object per request, tagged by `op`
//! - Subsystem error codes passed through unchanged
//! - Success data is the kernel result serialized as-is

mod errors;
mod handler;
mod request;
mod response;

pub use errors::{ApiError, ApiErrorCode, ApiResult};
pub use handler::ApiHandler;
pub use request::{Request, DEFAULT_ARTIFACT_TIMEOUT_SECONDS};
pub use response::{ErrorResponse, Response, SuccessResponse};
