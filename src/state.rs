use crate::{
    config::Config,
    redis_client::RedisClient,
    services::{encryption::EncryptionService, media_store::MediaStore},
    websocket::ConnectionRegistry,
};
use deadpool_postgres::Pool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool,
    pub registry: ConnectionRegistry,
    pub redis: RedisClient,
    pub config: Arc<Config>,
    pub encryption: Arc<EncryptionService>,
    pub media: Arc<MediaStore>,
}
