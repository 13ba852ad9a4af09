//! Batch submission route

use crate::api::AppState;
use crate::handler::{BatchRequest, BatchResponse};
use crate::types::BatchReport;
use axum::{
    body::Body,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

/// Submit a batch of URLs
///
/// The body is one absolute URL per line. Every distinct URL is fetched concurrently;
/// the response lists one body size per URL (-1 for a failed fetch), in no particular
/// order.
#[utoipa::path(
    post,
    path = "/",
    tag = "batch",
    request_body(
        content = String,
        content_type = "text/plain",
        description = "Newline-delimited absolute URLs"
    ),
    responses(
        (status = 200, description = "Every URL was fetched; one size per line", body = String, content_type = "text/plain"),
        (status = 207, description = "Some URLs failed; one size per line, -1 for failures", body = String, content_type = "text/plain"),
        (status = 400, description = "A line is not an absolute URL, or the body has no URLs"),
        (status = 405, description = "Method other than POST"),
        (status = 408, description = "Every URL failed"),
        (status = 429, description = "Too many batches in flight")
    )
)]
pub async fn submit_batch(State(state): State<AppState>, method: Method, body: Body) -> Response {
    // Dropping this future (client gone, server shutting down) cancels the batch
    let scope = state.shutdown.child_token();
    let _cancel_on_drop = scope.clone().drop_guard();

    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    let request = BatchRequest {
        method,
        body: reader,
        cancel: scope,
    };

    match state.handler.handle(request).await {
        Ok(report) => report_response(&report),
        Err(e) => e.into_response(),
    }
}

fn report_response(report: &BatchReport) -> Response {
    let response = BatchResponse::from_report(report);
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        response.body,
    )
        .into_response()
}
