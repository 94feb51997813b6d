use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use stockella_infra::LedgerError;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str, raw: &str) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_id",
        format!("invalid {what} id '{raw}'"),
    )
}

/// Malformed or mistyped JSON body, in the usual error envelope.
pub fn json_rejection(rejection: JsonRejection) -> Response {
    json_error(rejection.status(), "invalid_body", rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())
}

pub fn ledger_error_to_response(err: LedgerError) -> Response {
    let message = err.to_string();
    match err {
        LedgerError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        LedgerError::InvalidKind(_) => json_error(StatusCode::BAD_REQUEST, "invalid_kind", message),
        LedgerError::InvalidQuantity(_) => json_error(StatusCode::BAD_REQUEST, "invalid_quantity", message),
        LedgerError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        LedgerError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        LedgerError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        LedgerError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", message),
        LedgerError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", message)
        }
        LedgerError::Persistence(e) => {
            tracing::error!(error = %e, "persistence failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "persistence_failure",
                "the operation could not be persisted",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use stockella_infra::StoreError;

    use super::*;

    #[test]
    fn ledger_errors_map_to_status_codes() {
        let cases = [
            (LedgerError::NotFound, StatusCode::NOT_FOUND),
            (LedgerError::InvalidKind("Sideways".into()), StatusCode::BAD_REQUEST),
            (LedgerError::InvalidQuantity(0), StatusCode::BAD_REQUEST),
            (LedgerError::Validation("name".into()), StatusCode::BAD_REQUEST),
            (
                LedgerError::InsufficientStock {
                    available: 1,
                    requested: 2,
                },
                StatusCode::CONFLICT,
            ),
            (LedgerError::Conflict("code".into()), StatusCode::CONFLICT),
            (LedgerError::Forbidden("audit.read".into()), StatusCode::FORBIDDEN),
            (LedgerError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                LedgerError::Persistence(StoreError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ledger_error_to_response(err).status(), status);
        }
    }
}
