//! HTTP handlers, one module per resource.
//!
//! Handlers return [`crate::error::Result`]; the error type renders itself,
//! so none of them maps failures by hand. Bodies, query strings and path
//! parameters go through the wrappers below, whose rejections turn into the
//! same `400 {"error": ...}` shape as any other validation failure.

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::Error;

pub mod auth;
pub mod health;
pub mod products;
pub mod sales;
pub mod stats;
pub mod users;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct Query<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Path<T>(pub T);
