//! Pool gauges exported for Prometheus scraping.

use deadpool_postgres::Pool;
use once_cell::sync::Lazy;
use prometheus::{register_int_gauge_vec, IntGaugeVec};
use std::time::Duration;
use tracing::warn;

static POOL_SIZE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "db_pool_size",
        "Current number of connections in the pool",
        &["service"]
    )
    .expect("db_pool_size registration")
});

static POOL_AVAILABLE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "db_pool_available",
        "Connections currently idle in the pool",
        &["service"]
    )
    .expect("db_pool_available registration")
});

static POOL_WAITING: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "db_pool_waiting",
        "Tasks waiting for a pooled connection",
        &["service"]
    )
    .expect("db_pool_waiting registration")
});

fn update_pool_metrics(pool: &Pool, service: &str) {
    let status = pool.status();
    POOL_SIZE.with_label_values(&[service]).set(status.size as i64);
    POOL_AVAILABLE
        .with_label_values(&[service])
        .set(status.available as i64);
    POOL_WAITING
        .with_label_values(&[service])
        .set(status.waiting as i64);
}

/// Spawn a background task that refreshes pool gauges every 15 seconds.
pub fn spawn_pool_metrics(pool: Pool, service: String) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(15));
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                warn!(service = %service, "pool closed, stopping metrics task");
                break;
            }
            update_pool_metrics(&pool, &service);
        }
    });
}
