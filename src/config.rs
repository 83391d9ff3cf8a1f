use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,
    pub jwt_expires_in: String,

    // Admin seed
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub admin_name: String,

    // Content settings
    pub default_articles_per_page: usize,
    pub max_articles_per_page: usize,
    pub search_max_results: usize,
    pub top_keywords_limit: usize,
    pub max_comment_length: usize,
    pub max_keywords_per_article: usize,

    // Rate limiting
    pub rate_limit_requests: u32,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Default for Config {
    /// 开发/测试用的自包含配置（内存数据库）
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 5000,
            environment: "development".to_string(),
            log_level: "em_blog=debug,tower_http=debug".to_string(),
            log_format: "pretty".to_string(),

            database_url: "mem://".to_string(),
            database_namespace: "em".to_string(),
            database_name: "blog".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),

            jwt_secret: "development-secret-change-me".to_string(),
            jwt_expires_in: "7d".to_string(),

            admin_email: None,
            admin_password: None,
            admin_name: "System Admin".to_string(),

            default_articles_per_page: 10,
            max_articles_per_page: 50,
            search_max_results: 20,
            top_keywords_limit: 30,
            max_comment_length: 2000,
            max_keywords_per_article: 5,

            rate_limit_requests: 30,

            cors_allowed_origins: "http://localhost:5173".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let environment = env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == "development" => defaults.jwt_secret,
            _ => anyhow::bail!("JWT_SECRET must be set outside development"),
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| defaults.server_port.to_string())
                .parse()?,
            environment,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),

            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or(defaults.database_namespace),
            database_name: env::var("DATABASE_NAME").unwrap_or(defaults.database_name),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or(defaults.database_username),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or(defaults.database_password),

            jwt_secret,
            jwt_expires_in: env::var("JWT_EXPIRES_IN").unwrap_or(defaults.jwt_expires_in),

            admin_email: env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
            admin_name: env::var("ADMIN_NAME").unwrap_or(defaults.admin_name),

            default_articles_per_page: env::var("DEFAULT_ARTICLES_PER_PAGE")
                .unwrap_or_else(|_| defaults.default_articles_per_page.to_string())
                .parse()?,
            max_articles_per_page: env::var("MAX_ARTICLES_PER_PAGE")
                .unwrap_or_else(|_| defaults.max_articles_per_page.to_string())
                .parse()?,
            search_max_results: env::var("SEARCH_MAX_RESULTS")
                .unwrap_or_else(|_| defaults.search_max_results.to_string())
                .parse()?,
            top_keywords_limit: env::var("TOP_KEYWORDS_LIMIT")
                .unwrap_or_else(|_| defaults.top_keywords_limit.to_string())
                .parse()?,
            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| defaults.max_comment_length.to_string())
                .parse()?,
            max_keywords_per_article: env::var("MAX_KEYWORDS_PER_ARTICLE")
                .unwrap_or_else(|_| defaults.max_keywords_per_article.to_string())
                .parse()?,

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| defaults.rate_limit_requests.to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 令牌有效期（秒），支持 `30s` / `15m` / `12h` / `7d` 以及纯数字秒
    pub fn jwt_expiry_seconds(&self) -> anyhow::Result<i64> {
        parse_duration_secs(&self.jwt_expires_in)
    }

    /// 远程数据库需要 root 登录，内存引擎不需要
    pub fn database_requires_signin(&self) -> bool {
        !self.database_url.starts_with("mem://")
    }
}

fn parse_duration_secs(raw: &str) -> anyhow::Result<i64> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], c),
        _ => (raw, 's'),
    };

    let value: i64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration: {}", raw))?;

    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        other => anyhow::bail!("unsupported duration unit '{}' in {}", other, raw),
    };

    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_secs() {
        assert_eq!(parse_duration_secs("7d").unwrap(), 7 * 24 * 3600);
        assert_eq!(parse_duration_secs("12h").unwrap(), 12 * 3600);
        assert_eq!(parse_duration_secs("15m").unwrap(), 900);
        assert_eq!(parse_duration_secs("45").unwrap(), 45);
        assert!(parse_duration_secs("7w").is_err());
        assert!(parse_duration_secs("abc").is_err());
    }

    #[test]
    fn test_default_uses_memory_database() {
        let config = Config::default();
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
        assert!(!config.database_requires_signin());
        assert_eq!(config.jwt_expiry_seconds().unwrap(), 7 * 24 * 3600);
    }
}
