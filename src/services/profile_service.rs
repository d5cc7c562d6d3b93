use crate::error::AppError;
use crate::models::profile::Profile;
use deadpool_postgres::Pool;
use uuid::Uuid;

pub struct ProfileService;

impl ProfileService {
    pub async fn get(db: &Pool, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, username, first_name, last_name, avatar_url, phone_number
                FROM users
                WHERE id = $1
                "#,
                &[&user_id],
            )
            .await?;
        Ok(row.map(|r| Profile::from_row(&r)))
    }

    /// Username/phone lookup for starting new conversations. Excludes the
    /// caller from results.
    pub async fn search(db: &Pool, query: &str, exclude: Uuid) -> Result<Vec<Profile>, AppError> {
        let pattern = format!("%{}%", query);
        let client = db.get().await?;
        let rows = client
            .query(
                r#"
                SELECT id, username, first_name, last_name, avatar_url, phone_number
                FROM users
                WHERE (username ILIKE $1 OR phone_number LIKE $1) AND id <> $2
                ORDER BY username ASC
                LIMIT 20
                "#,
                &[&pattern, &exclude],
            )
            .await?;
        Ok(rows.iter().map(Profile::from_row).collect())
    }
}
