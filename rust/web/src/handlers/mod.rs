pub mod game;
pub mod health;

pub use game::{
    get_state, reset, retry_engine, submit_move, CellView, GameStateResponse, MoveBody,
};
pub use health::health;

use crate::errors::ErrorResponse;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reject::{MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType};
use warp::reply::Response;
use warp::Rejection;

/// Turns warp rejections into the shared JSON error body.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not_found", "no such route".to_string())
    } else if let Some(cause) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "invalid_request", cause.to_string())
    } else if err.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid_request",
            "expected a JSON body".to_string(),
        )
    } else if err.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "invalid_request",
            "request body too large".to_string(),
        )
    } else if err.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "method not allowed".to_string(),
        )
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "unhandled request".to_string(),
        )
    };

    Ok(ErrorResponse::new(code, message).into_response(status))
}
