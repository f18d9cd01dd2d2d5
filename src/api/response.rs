use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::descriptor::ResourceDescriptor;
use crate::document::{builder_for, HypermediaDocument, HypermediaFormat};
use crate::error::HypermediaError;
use crate::links::LinkRegistry;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// A rendered document or the build error that prevented it
#[derive(Debug)]
pub enum HypermediaResponse {
    Document(HypermediaDocument),
    BuildFailed(HypermediaError),
}

impl From<crate::error::Result<HypermediaDocument>> for HypermediaResponse {
    fn from(result: crate::error::Result<HypermediaDocument>) -> Self {
        match result {
            Ok(doc) => HypermediaResponse::Document(doc),
            Err(e) => HypermediaResponse::BuildFailed(e),
        }
    }
}

impl IntoResponse for HypermediaResponse {
    fn into_response(self) -> Response {
        match self {
            HypermediaResponse::Document(doc) => {
                let content_type = HeaderValue::from_static(doc.content_type());
                (
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, content_type)],
                    Json(doc.into_body()),
                )
                    .into_response()
            }
            HypermediaResponse::BuildFailed(e) => {
                tracing::error!(error = %e, "Failed to build hypermedia document");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: e.to_string(),
                        status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Pick the format from the request's `Accept` header
pub fn negotiate_from_headers(headers: &HeaderMap) -> HypermediaFormat {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    HypermediaFormat::negotiate(accept)
}

/// Negotiate, build and wrap in one step
pub fn render(
    registry: Arc<LinkRegistry>,
    headers: &HeaderMap,
    descriptor: &ResourceDescriptor,
) -> HypermediaResponse {
    let format = negotiate_from_headers(headers);
    builder_for(format, registry).build(descriptor).into()
}
