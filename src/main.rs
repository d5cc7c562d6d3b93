use actix_web::{web, App, HttpServer};
use chat_service::{
    config, db, error, logging,
    redis_client::RedisClient,
    routes,
    services::{encryption::EncryptionService, media_store::MediaStore},
    state::AppState,
    websocket::{fanout, ConnectionRegistry},
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url).await?;
    db_pool::spawn_pool_metrics(db.clone(), "chat-service".to_string());

    let redis = RedisClient::connect(&cfg.redis_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("redis: {e}")))?;

    actix_middleware::jwt::initialize_validation(&cfg.jwt_public_key_pem)
        .map_err(|e| error::AppError::StartServer(format!("JWT public key: {e}")))?;

    let registry = ConnectionRegistry::new();
    let encryption = Arc::new(EncryptionService::new(cfg.encryption_master_key));
    let media = Arc::new(MediaStore::new(&cfg.s3).await);

    let state = AppState {
        db: db.clone(),
        registry: registry.clone(),
        redis: redis.clone(),
        config: cfg.clone(),
        encryption,
        media,
    };

    // Cross-instance fanout: every instance publishes sends to Redis and
    // relays what it hears into its local connection registry.
    let fanout_redis = redis.clone();
    let fanout_registry = registry.clone();
    tokio::spawn(async move {
        fanout::start_fanout_listener(fanout_redis, fanout_registry).await;
    });

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    let app_state = state.clone();
    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(actix_middleware::RequestId::new())
            .wrap(actix_middleware::Logging)
            .app_data(web::Data::new(app_state.clone()))
            // The push channel authenticates at the handshake itself.
            .service(routes::wsroute::ws_handler)
            .service(
                web::scope("/chat")
                    .wrap(actix_middleware::JwtAuthMiddleware)
                    .service(routes::conversations::create_conversation)
                    .service(routes::conversations::get_conversations)
                    .service(routes::conversations::get_messages)
                    .service(routes::conversations::mark_read)
                    .service(routes::messages::send_message)
                    .service(routes::users::search_users),
            )
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run server: {e}")))
}
