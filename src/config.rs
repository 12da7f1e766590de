use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MlConfig {
    /// Base URL of the ML prediction service, e.g. http://ml:8000
    pub base_url: String,
    /// Request deadline; unset means the transport default applies.
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub ml: MlConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "houseiq".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "houseiq-users".into()),
            ttl_seconds: std::env::var("JWT_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 60 * 24),
        };
        let ml = MlConfig {
            base_url: std::env::var("ML_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
            timeout_seconds: std::env::var("ML_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok()),
        };
        Ok(Self {
            database_url,
            jwt,
            ml,
        })
    }
}
