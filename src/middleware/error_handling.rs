use crate::error::AppError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use error_types::ErrorResponse;

/// Map an AppError to its wire representation: the taxonomy status code and
/// a JSON body of the shape `{"error": "..."}`.
pub fn into_response(err: &AppError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }

    HttpResponse::build(status).json(ErrorResponse::from(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_taxonomy_status() {
        let resp = into_response(&AppError::NotFound);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = into_response(&AppError::BadRequest("missing field".into()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = into_response(&AppError::Database("down".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
