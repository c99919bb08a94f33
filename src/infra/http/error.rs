use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::{
    convert::ConversionError,
    error::{AppError, ErrorReport},
    prepare::PrepareError,
    publish::PublishError,
};

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_JSON: &str = "invalid_json";
    pub const FOREIGN_ARTIFACT: &str = "foreign_artifact";
    pub const UNKNOWN_PROVIDER: &str = "unknown_provider";
    pub const RENDER: &str = "render_error";
    pub const PUBLISH_FAILED: &str = "publish_failed";
    pub const PUBLISH_PARTIAL: &str = "publish_partial";
    pub const RANDOM_SOURCE: &str = "random_source";
    pub const PROVIDER_UNAVAILABLE: &str = "provider_unavailable";
    pub const CONVERSION: &str = "conversion_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn invalid_json(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_JSON,
            "Request body is not a valid inspection report",
            Some(hint.into()),
        )
    }

    pub fn invalid_input(message: &'static str, hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            message,
            Some(hint.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, report: ErrorReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        let (status, code, message) = classify(&error);
        // Client errors carry the cause back to the caller; server errors only log it.
        let hint = error.is_client_error().then(|| error.to_string());
        let report = ErrorReport::from_error("infra::http::api_error", status, &error);
        ApiError::new(status, code, message, hint).with_report(report)
    }
}

fn classify(error: &AppError) -> (StatusCode, &'static str, &'static str) {
    match error {
        AppError::Validation(_) | AppError::Prepare(PrepareError::InvalidInput(_)) => (
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Report could not be accepted",
        ),
        AppError::Prepare(PrepareError::RandomSource(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::RANDOM_SOURCE,
            "Artifact name could not be generated",
        ),
        AppError::Render(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::RENDER,
            "Report could not be rendered",
        ),
        AppError::Publish(PublishError::Partial { .. }) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::PUBLISH_PARTIAL,
            "Report was only partially published",
        ),
        AppError::Publish(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::PUBLISH_FAILED,
            "Report could not be published",
        ),
        AppError::Conversion(ConversionError::UnknownProvider(_)) => (
            StatusCode::BAD_REQUEST,
            codes::UNKNOWN_PROVIDER,
            "Unknown PDF provider",
        ),
        AppError::Conversion(ConversionError::InvalidUrl { .. }) => (
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Artifact URL could not be parsed",
        ),
        AppError::Conversion(ConversionError::ForeignArtifact { .. }) => (
            StatusCode::BAD_REQUEST,
            codes::FOREIGN_ARTIFACT,
            "URL is not a published HTML artifact",
        ),
        AppError::Conversion(ConversionError::ProviderUnavailable(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            codes::PROVIDER_UNAVAILABLE,
            "PDF provider is not configured",
        ),
        AppError::Conversion(ConversionError::Provider { .. }) => (
            StatusCode::BAD_GATEWAY,
            codes::CONVERSION,
            "PDF conversion failed",
        ),
        AppError::Conversion(ConversionError::Publish(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::CONVERSION,
            "PDF could not be published",
        ),
        AppError::Infra(_) | AppError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api_error",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{convert::ProviderKind, store::StoreError};
    use crate::domain::naming::{ArtifactKind, NamingError};

    #[test]
    fn partial_publish_has_its_own_code() {
        let error = AppError::from(PublishError::Partial {
            published: ArtifactKind::Html,
            url: "https://reports.example.com/2018-06-14/a.html".into(),
            failed: ArtifactKind::Json,
            source: StoreError::rejected("bucket unavailable"),
        });
        let api = ApiError::from(error);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.code(), codes::PUBLISH_PARTIAL);
    }

    #[test]
    fn server_errors_do_not_leak_causes() {
        let error = AppError::from(PrepareError::from(NamingError::RandomSource(
            "device unavailable".into(),
        )));
        let api = ApiError::from(error);
        assert_eq!(api.code(), codes::RANDOM_SOURCE);
        assert!(api.hint.is_none());
        let report = api.report.as_ref().expect("report");
        assert!(report.messages.iter().any(|m| m.contains("device unavailable")));
    }

    #[test]
    fn foreign_artifacts_are_bad_requests_with_hint() {
        let error = AppError::from(ConversionError::ForeignArtifact {
            url: "https://elsewhere.example.com/a.html".into(),
            reason: "host does not match the artifact store",
        });
        let api = ApiError::from(error);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.code(), codes::FOREIGN_ARTIFACT);
        assert!(
            api.hint
                .as_deref()
                .is_some_and(|hint| hint.contains("elsewhere.example.com"))
        );
    }

    #[test]
    fn missing_provider_is_service_unavailable() {
        let api = ApiError::from(AppError::from(ConversionError::ProviderUnavailable(
            ProviderKind::DocRaptor,
        )));
        assert_eq!(api.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
