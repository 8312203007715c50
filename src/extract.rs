use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` with rejections turned into `AppError::BadRequest`, so a missing or
/// malformed field answers 400 in the usual envelope instead of axum's 422.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
