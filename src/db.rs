use db_pool::{create_pool, DbConfig, Pool};

/// Embedded migrations, applied in order at startup. Each entry runs once,
/// tracked in schema_migrations.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_conversations",
        include_str!("../migrations/0001_conversations.sql"),
    ),
    (
        "0002_messages",
        include_str!("../migrations/0002_messages.sql"),
    ),
];

pub async fn init_pool(database_url: &str) -> Result<Pool, crate::error::AppError> {
    let mut cfg = DbConfig::from_env("chat-service").unwrap_or_default();
    if cfg.database_url.is_empty() {
        cfg.database_url = database_url.to_string();
    }
    cfg.log_config();

    let pool = create_pool(&cfg)
        .map_err(|e| crate::error::AppError::StartServer(format!("db pool: {e}")))?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(db: &Pool) -> Result<(), crate::error::AppError> {
    let mut client = db.get().await?;

    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await?;

    for &(name, sql) in MIGRATIONS {
        let applied = client
            .query_opt("SELECT 1 FROM schema_migrations WHERE name = $1", &[&name])
            .await?;
        if applied.is_some() {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(sql).await?;
        tx.execute(
            "INSERT INTO schema_migrations (name) VALUES ($1)",
            &[&name],
        )
        .await?;
        tx.commit().await?;

        tracing::info!(migration = name, "applied migration");
    }

    Ok(())
}
