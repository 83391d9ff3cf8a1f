use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::User,
    services::Database,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    jwt_secret: String,
    expires_in_secs: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub iat: i64,    // 签发时间
    pub exp: i64,    // 过期时间
}

impl AuthService {
    pub async fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            jwt_secret: config.jwt_secret.clone(),
            expires_in_secs: config.jwt_expiry_seconds()?,
        })
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    /// 哈希格式损坏时视为不匹配
    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }

    pub fn generate_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.expires_in_secs,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        debug!("JWT token verified for user: {}", token_data.claims.sub);
        Ok(token_data.claims)
    }

    /// 令牌 → 用户；无法解析的用户返回 401，被封禁的用户返回 403
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.verify_jwt(token)?;

        let user: Option<User> = self
            .db
            .query_one(
                "SELECT *, meta::id(id) AS id FROM type::thing('user', $id)",
                json!({ "id": claims.sub }),
            )
            .await?;

        let user = user.ok_or_else(|| AppError::unauthorized("Not authorized, user not found"))?;

        if user.is_blocked {
            warn!("Blocked user {} attempted an authenticated request", user.id);
            return Err(AppError::forbidden("Your account has been blocked"));
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> AuthService {
        let config = Config::default();
        let db = Arc::new(Database::new(&config).await.unwrap());
        AuthService::new(db, &config).await.unwrap()
    }

    #[tokio::test]
    async fn test_password_round_trip() {
        let auth = service().await;
        let hash = auth.hash_password("secret1").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(auth.verify_password("secret1", &hash));
        assert!(!auth.verify_password("secret2", &hash));
        assert!(!auth.verify_password("secret1", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_token_carries_subject() {
        let auth = service().await;
        let token = auth.generate_token("user-1").unwrap();
        let claims = auth.verify_jwt(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert!(claims.exp > claims.iat);
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let auth = service().await;
        let token = auth.generate_token("user-1").unwrap();
        let tampered = format!("{}x", token);

        assert!(matches!(auth.verify_jwt(&tampered), Err(AppError::Jwt(_))));
        assert!(auth.verify_jwt("garbage").is_err());
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthenticated() {
        let auth = service().await;
        let token = auth.generate_token("missing").unwrap();

        assert!(matches!(
            auth.authenticate(&token).await,
            Err(AppError::Authentication(_))
        ));
    }
}
