use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sentry::integrations::anyhow::capture_anyhow;
use serde::{Deserialize, Serialize};

/// A failed request, rendered as an [`ApiErrorResponse`].
///
/// Server errors are logged and reported to Sentry.
#[derive(Debug)]
pub struct ResponseError {
    status: StatusCode,
    err: anyhow::Error,
}

impl ResponseError {
    pub fn not_found(what: &'static str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            err: anyhow::anyhow!("{what} not found"),
        }
    }
}

impl From<anyhow::Error> for ResponseError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = ?self.err, "Request failed");
            capture_anyhow(&self.err);
        }
        (self.status, Json(ApiErrorResponse::from(&self.err))).into_response()
    }
}

/// The JSON body of an error response.
///
/// `detail` is the outermost error message, `causes` are the messages of the errors that led to
/// it, if there are any.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    causes: Vec<String>,
}

impl From<&anyhow::Error> for ApiErrorResponse {
    fn from(err: &anyhow::Error) -> Self {
        let mut chain = err.chain().map(ToString::to_string);
        ApiErrorResponse {
            detail: chain.next(),
            causes: chain.collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn test_error_chain() {
        let err = Err::<(), _>(std::io::Error::other("disk full"))
            .context("failed to write entry")
            .unwrap_err();

        insta::assert_debug_snapshot!(ApiErrorResponse::from(&err), @r###"
        ApiErrorResponse {
            detail: Some(
                "failed to write entry",
            ),
            causes: [
                "disk full",
            ],
        }
        "###);
    }

    #[test]
    fn test_without_causes() {
        let err = anyhow::anyhow!("entry not found");
        let body = serde_json::to_string(&ApiErrorResponse::from(&err)).unwrap();
        assert_eq!(body, r#"{"detail":"entry not found"}"#);
    }

    #[test]
    fn test_status() {
        let response = ResponseError::not_found("entry").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ResponseError::from(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
