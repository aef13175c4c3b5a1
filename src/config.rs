use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use serde::Serialize;
use time::{macros::format_description, UtcOffset};

use crate::analysis::gemini;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    /// `None` when no API key is configured; photo analysis is then disabled.
    pub analysis: Option<AnalysisConfig>,
    pub storage: Option<StorageConfig>,
    /// Offset used to resolve "today" when a client does not send a date.
    pub utc_offset: UtcOffset,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
        };

        let store_backend = match var("STORE_BACKEND").as_deref() {
            None | Some("local") => StoreBackend::Local,
            Some("remote") => StoreBackend::Remote,
            Some(other) => anyhow::bail!("STORE_BACKEND must be local or remote, got {other:?}"),
        };
        let database_url = match store_backend {
            StoreBackend::Remote => Some(required("DATABASE_URL")?),
            StoreBackend::Local => var("DATABASE_URL"),
        };

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "nutrilens".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "nutrilens-users".into()),
        };

        let analysis = match var("GEMINI_API_KEY").or_else(|| var("API_KEY")) {
            Some(api_key) => Some(AnalysisConfig {
                api_key,
                model: var("GEMINI_MODEL").unwrap_or_else(|| gemini::DEFAULT_MODEL.into()),
                base_url: var("GEMINI_BASE_URL")
                    .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.into()),
                timeout: Duration::from_secs(
                    var("ANALYSIS_TIMEOUT_SECS")
                        .unwrap_or_else(|| "60".into())
                        .parse()
                        .context("ANALYSIS_TIMEOUT_SECS")?,
                ),
            }),
            None => None,
        };

        let minio = [
            "MINIO_ENDPOINT",
            "MINIO_BUCKET",
            "MINIO_ACCESS_KEY",
            "MINIO_SECRET_KEY",
        ]
        .map(|k| var(k));
        let storage = match minio {
            [Some(endpoint), Some(bucket), Some(access_key), Some(secret_key)] => {
                Some(StorageConfig {
                    endpoint,
                    bucket,
                    access_key,
                    secret_key,
                    region: var("MINIO_REGION").unwrap_or_else(|| "us-east-1".into()),
                })
            }
            [None, None, None, None] => None,
            _ => anyhow::bail!("MINIO_* variables must be set together or not at all"),
        };

        let utc_offset = match var("APP_UTC_OFFSET") {
            Some(raw) => parse_offset(&raw)?,
            None => UtcOffset::UTC,
        };

        Ok(Self {
            store_backend,
            data_dir: var("DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            database_url,
            jwt,
            analysis,
            storage,
            utc_offset,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("APP_PORT")
                .unwrap_or_else(|| "8080".into())
                .parse()
                .context("APP_PORT")?,
        })
    }
}

fn parse_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("APP_UTC_OFFSET must look like +02:00, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn minimal_config_uses_local_defaults() {
        let cfg = config(&[("JWT_SECRET", "s")]).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Local);
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert!(cfg.analysis.is_none());
        assert!(cfg.storage.is_none());
        assert_eq!(cfg.utc_offset, UtcOffset::UTC);
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn jwt_secret_is_required() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn remote_backend_needs_database_url() {
        assert!(config(&[("JWT_SECRET", "s"), ("STORE_BACKEND", "remote")]).is_err());
        let cfg = config(&[
            ("JWT_SECRET", "s"),
            ("STORE_BACKEND", "remote"),
            ("DATABASE_URL", "postgres://localhost/nutrilens"),
        ])
        .unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Remote);
        assert!(config(&[("JWT_SECRET", "s"), ("STORE_BACKEND", "cloud")]).is_err());
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let cfg = config(&[("JWT_SECRET", "s"), ("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(cfg.analysis.is_none());

        let cfg = config(&[("JWT_SECRET", "s"), ("API_KEY", "abc")]).unwrap();
        let analysis = cfg.analysis.unwrap();
        assert_eq!(analysis.api_key, "abc");
        assert_eq!(analysis.model, gemini::DEFAULT_MODEL);
        assert_eq!(analysis.timeout, Duration::from_secs(60));
    }

    #[test]
    fn partial_minio_config_is_rejected() {
        let err = config(&[("JWT_SECRET", "s"), ("MINIO_ENDPOINT", "http://minio:9000")])
            .unwrap_err();
        assert!(err.to_string().contains("MINIO_"));
    }

    #[test]
    fn utc_offset_parses() {
        let cfg = config(&[("JWT_SECRET", "s"), ("APP_UTC_OFFSET", "+05:30")]).unwrap();
        assert_eq!(cfg.utc_offset, UtcOffset::from_hms(5, 30, 0).unwrap());
        let cfg = config(&[("JWT_SECRET", "s"), ("APP_UTC_OFFSET", "-03:00")]).unwrap();
        assert_eq!(cfg.utc_offset, UtcOffset::from_hms(-3, 0, 0).unwrap());
        assert!(config(&[("JWT_SECRET", "s"), ("APP_UTC_OFFSET", "later")]).is_err());
    }
}
