use crate::error::AppError;
use crate::middleware::guards::User;
use crate::services::profile_service::ProfileService;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

/// GET /chat/users/search?query=
///
/// Find principals to start a conversation with, by username or phone
/// number.
#[get("/users/search")]
pub async fn search_users(
    state: web::Data<AppState>,
    user: User,
    query: web::Query<SearchParams>,
) -> Result<HttpResponse, AppError> {
    let term = query.query.trim();
    if term.chars().count() < 2 {
        return Err(AppError::BadRequest(
            "search query must be at least 2 characters".into(),
        ));
    }

    let profiles = ProfileService::search(&state.db, term, user.id).await?;
    Ok(HttpResponse::Ok().json(profiles))
}
