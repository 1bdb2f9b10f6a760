use anyhow::{bail, Result};
use std::env;

#[derive(Debug, Clone)]
pub enum StorageBackend {
    S3,
    Local,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub session_jwt_secret: String,
    pub webhook_signing_secret: String,
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_public_url: String,
    pub download_url_ttl_secs: u64,
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!("Missing required environment variable {}", name),
    }
}

impl Config {
    /// Reads configuration from the environment. Absence of a required
    /// variable is a startup error, not a runtime one.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .as_str()
        {
            "s3" => StorageBackend::S3,
            "local" => StorageBackend::Local,
            other => bail!("Unsupported storage backend: {}", other),
        };

        let (s3_bucket, local_storage_path) = match storage_backend {
            StorageBackend::S3 => (Some(required("S3_BUCKET")?), None),
            StorageBackend::Local => (None, Some(required("LOCAL_STORAGE_PATH")?)),
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            session_jwt_secret: required("SESSION_JWT_SECRET")?,
            webhook_signing_secret: required("CLERK_WEBHOOK_SECRET")?,
            storage_backend,
            s3_bucket,
            local_storage_path,
            local_storage_public_url: env::var("LOCAL_STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000/objects".to_string()),
            download_url_ttl_secs: env::var("DOWNLOAD_URL_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn set_base_env() {
        env::set_var("DATABASE_URL", "postgresql://localhost/collabdrive_test");
        env::set_var("SESSION_JWT_SECRET", "test-session-secret");
        env::set_var("CLERK_WEBHOOK_SECRET", "whsec_dGVzdA==");
        env::set_var("STORAGE_BACKEND", "local");
        env::set_var("LOCAL_STORAGE_PATH", "/tmp/collabdrive");
        env::remove_var("PORT");
        env::remove_var("DOWNLOAD_URL_TTL_SECS");
    }

    #[test]
    #[serial]
    fn loads_with_defaults() {
        set_base_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.download_url_ttl_secs, 3600);
        assert!(matches!(config.storage_backend, StorageBackend::Local));
    }

    #[test]
    #[serial]
    fn missing_database_url_is_an_error() {
        set_base_env();
        env::remove_var("DATABASE_URL");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
        env::set_var("DATABASE_URL", "postgresql://localhost/collabdrive_test");
    }

    #[test]
    #[serial]
    fn s3_backend_requires_bucket() {
        set_base_env();
        env::set_var("STORAGE_BACKEND", "s3");
        env::remove_var("S3_BUCKET");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    #[serial]
    fn rejects_unknown_backend() {
        set_base_env();
        env::set_var("STORAGE_BACKEND", "ftp");
        assert!(Config::from_env().is_err());
    }
}
