/// Body and query extractors whose rejections render as `AppError`
use crate::error::AppError;
use axum::extract::{FromRequest, FromRequestParts};

/// `axum::Json` with the API's JSON error body on malformed input
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with the API's JSON error body on malformed input
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);
