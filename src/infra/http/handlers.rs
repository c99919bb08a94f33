use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, Query, State, multipart::MultipartRejection, rejection::QueryRejection,
    },
    http::{HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use signoff_api_types::{PublishedPdf, PublishedReport};

use crate::{
    application::{convert::ProviderKind, error::AppError, publish::PublishedArtifacts},
    domain::report::InspectionReport,
};

use super::{
    error::ApiError,
    form::{FormError, read_fields, report_from_fields},
    state::HttpState,
};

const INDEX_PAGE: &str = include_str!("../../../templates/index.html");
const ROBOTS_HEADER: &str = "x-robots-tag";

/// Manual submission form. Kept out of search indexes outside production.
pub async fn index(State(state): State<HttpState>) -> Response {
    let mut response = Html(INDEX_PAGE).into_response();
    if !state.production {
        response.headers_mut().insert(
            HeaderName::from_static(ROBOTS_HEADER),
            HeaderValue::from_static("none"),
        );
    }
    response
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn publish_json(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Json<PublishedReport>, ApiError> {
    let document: InspectionReport =
        serde_json::from_slice(&body).map_err(|err| ApiError::invalid_json(err.to_string()))?;
    publish(&state, document).await
}

pub async fn publish_form(
    State(state): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PublishedReport>, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        ApiError::invalid_input("Expected a multipart form body", rejection.body_text())
    })?;
    let fields = read_fields(multipart).await.map_err(form_error)?;
    let document = report_from_fields(&fields).map_err(form_error)?;
    publish(&state, document).await
}

fn form_error(err: FormError) -> ApiError {
    AppError::validation(err.to_string()).into()
}

async fn publish(
    state: &HttpState,
    document: InspectionReport,
) -> Result<Json<PublishedReport>, ApiError> {
    let PublishedArtifacts { html, json } = state.pipeline.publish(document).await?;
    Ok(Json(PublishedReport {
        html: html.url.to_string(),
        json: json.url.to_string(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PdfQuery {
    url: Option<String>,
    provider: Option<String>,
}

pub async fn convert_pdf(
    State(state): State<HttpState>,
    query: Result<Query<PdfQuery>, QueryRejection>,
) -> Result<Json<PublishedPdf>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::invalid_input("Query string could not be parsed", rejection.body_text())
    })?;
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            ApiError::invalid_input("Missing artifact URL", "pass the HTML artifact as `url`")
        })?;
    let provider = query
        .provider
        .filter(|provider| !provider.trim().is_empty())
        .unwrap_or_else(|| ProviderKind::default().to_string());

    let published = state
        .converter
        .convert(&url, &provider)
        .await
        .map_err(AppError::from)?;

    Ok(Json(PublishedPdf {
        pdf: published.url.to_string(),
    }))
}
