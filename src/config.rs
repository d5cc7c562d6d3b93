use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    /// Base URL handed to clients for stored objects. Defaults to the
    /// virtual-hosted S3 URL when unset (e.g. a CDN in front of the bucket).
    pub public_base_url: Option<String>,
}

impl S3Config {
    pub fn object_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    pub encryption_master_key: [u8; 32],
    pub jwt_public_key_pem: String,
    pub s3: S3Config,
    /// Attachments larger than this are rejected before encryption/storage.
    pub max_attachment_bytes: usize,
}

pub(crate) fn parse_master_key(encoded: &str) -> Result<[u8; 32], crate::error::AppError> {
    let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
        crate::error::AppError::Config(format!("ENCRYPTION_MASTER_KEY decode: {e}"))
    })?;

    if bytes.len() != 32 {
        return Err(crate::error::AppError::Config(
            "ENCRYPTION_MASTER_KEY must be 32 bytes".into(),
        ));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let master_key_env = env::var("ENCRYPTION_MASTER_KEY").map_err(|_| {
            crate::error::AppError::Config("ENCRYPTION_MASTER_KEY missing".into())
        })?;
        let encryption_master_key = parse_master_key(&master_key_env)?;

        // Issued by the identity service; this service only validates.
        let jwt_public_key_pem = env::var("JWT_PUBLIC_KEY_PEM")
            .map_err(|_| crate::error::AppError::Config("JWT_PUBLIC_KEY_PEM missing".into()))?;

        let s3 = S3Config {
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "trellis-chat-media".to_string()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: env::var("S3_ENDPOINT").ok(),
            public_base_url: env::var("S3_PUBLIC_BASE_URL").ok(),
        };

        let max_attachment_bytes = env::var("MAX_ATTACHMENT_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100 * 1024 * 1024);

        Ok(Self {
            database_url,
            redis_url,
            port,
            encryption_master_key,
            jwt_public_key_pem,
            s3,
            max_attachment_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_key_round_trips_through_base64() {
        let encoded = STANDARD.encode([7u8; 32]);
        assert_eq!(parse_master_key(&encoded).unwrap(), [7u8; 32]);
    }

    #[test]
    fn master_key_rejects_wrong_length() {
        let encoded = STANDARD.encode([7u8; 16]);
        assert!(parse_master_key(&encoded).is_err());
    }

    #[test]
    fn master_key_rejects_invalid_base64() {
        assert!(parse_master_key("not base64!!!").is_err());
    }

    #[test]
    fn object_url_prefers_public_base() {
        let s3 = S3Config {
            bucket: "media".into(),
            region: "us-east-1".into(),
            endpoint: None,
            public_base_url: Some("https://cdn.example.com/".into()),
        };
        assert_eq!(
            s3.object_url("chat-media/a.png"),
            "https://cdn.example.com/chat-media/a.png"
        );
    }

    #[test]
    fn object_url_falls_back_to_s3_hosting() {
        let s3 = S3Config {
            bucket: "media".into(),
            region: "eu-west-1".into(),
            endpoint: None,
            public_base_url: None,
        };
        assert_eq!(
            s3.object_url("k"),
            "https://media.s3.eu-west-1.amazonaws.com/k"
        );
    }
}
