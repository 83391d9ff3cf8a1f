use crate::{
    config::Config,
    error::{AppError, Result},
    models::user::*,
    services::{AuthService, Database},
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

pub(crate) const USER_SELECT: &str = "SELECT *, meta::id(id) AS id FROM";

/// 用户服务，处理注册、登录与个人资料
#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
    auth: AuthService,
}

impl UserService {
    pub async fn new(db: Arc<Database>, auth: AuthService) -> Result<Self> {
        Ok(Self { db, auth })
    }

    pub async fn register(&self, mut request: RegisterRequest) -> Result<AuthResponse> {
        request.email = normalize_email(&request.email);
        request
            .validate()
            .map_err(|e| AppError::ValidatorError(e))?;

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("Name is required"));
        }

        let user = self
            .create_user(&name, &request.email, &request.password, UserRole::User)
            .await?;
        info!("Registered user {} ({})", user.id, user.email);

        self.issue(user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let user = self
            .check_credentials(&request.email, &request.password)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid email or password"))?;

        if user.is_blocked {
            warn!("Blocked user {} attempted to log in", user.id);
            return Err(AppError::forbidden("Your account has been blocked"));
        }

        debug!("User {} logged in", user.id);
        self.issue(user)
    }

    /// 管理员登录：任何失败都返回同一条提示
    pub async fn admin_login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let user = self
            .check_credentials(&request.email, &request.password)
            .await?
            .filter(|u| u.is_admin() && !u.is_blocked)
            .ok_or_else(|| AppError::unauthorized("Invalid admin credentials"))?;

        info!("Admin {} logged in", user.id);
        self.issue(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.db
            .query_one(
                &format!("{} type::thing('user', $id)", USER_SELECT),
                json!({ "id": id }),
            )
            .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.db
            .query_one(
                &format!("{} user WHERE email = $email LIMIT 1", USER_SELECT),
                json!({ "email": normalize_email(email) }),
            )
            .await
    }

    pub async fn get_profile(&self, id: &str) -> Result<UserResponse> {
        let user = self
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        Ok(user.to_response())
    }

    /// 只更新请求中出现的字段
    pub async fn update_profile(&self, user_id: &str, request: UpdateProfileRequest) -> Result<UserResponse> {
        request
            .validate()
            .map_err(|e| AppError::ValidatorError(e))?;

        let mut sets = Vec::new();
        let mut params = Map::new();
        params.insert("id".to_string(), json!(user_id));

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::validation("Name is required"));
            }
            sets.push("name = $name");
            params.insert("name".to_string(), json!(name));
        }

        if let Some(bio) = request.bio {
            sets.push("bio = $bio");
            params.insert("bio".to_string(), json!(bio.trim()));
        }

        if let Some(links) = request.links {
            for link in &links {
                link.validate()
                    .map_err(|e| AppError::ValidatorError(e))?;
            }
            sets.push("links = $links");
            params.insert("links".to_string(), json!(links));
        }

        if let Some(picture) = request.profile_picture {
            sets.push("profile_picture = $profile_picture");
            params.insert("profile_picture".to_string(), json!(picture));
        }

        if !sets.is_empty() {
            let sql = format!(
                "UPDATE type::thing('user', $id) SET {}, updated_at = time::now() WHERE email != NONE RETURN NONE",
                sets.join(", ")
            );
            self.db.query_with_params(&sql, Value::Object(params)).await?;
            info!("Updated profile of user {}", user_id);
        }

        self.get_profile(user_id).await
    }

    /// 启动时创建配置中的管理员账号（已存在则跳过）
    pub async fn seed_admin(&self, config: &Config) -> Result<()> {
        let (email, password) = match (&config.admin_email, &config.admin_password) {
            (Some(email), Some(password)) => (email, password),
            _ => {
                debug!("No admin credentials configured, skipping admin seed");
                return Ok(());
            }
        };

        if self.get_user_by_email(email).await?.is_some() {
            debug!("Admin account {} already exists", email);
            return Ok(());
        }

        let admin = self
            .create_user(&config.admin_name, email, password, UserRole::Admin)
            .await?;
        info!("Seeded admin account {}", admin.email);
        Ok(())
    }

    /// 批量读取作者摘要；不存在的 id 不出现在结果中
    pub async fn authors_by_ids(&self, ids: &[String]) -> Result<HashMap<String, AuthorSummary>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut unique: Vec<&String> = ids.iter().collect();
        unique.sort();
        unique.dedup();

        let authors: Vec<AuthorSummary> = self
            .db
            .query_all(
                "SELECT meta::id(id) AS id, name, profile_picture FROM user WHERE meta::id(id) INSIDE $ids",
                json!({ "ids": unique }),
            )
            .await?;

        Ok(authors.into_iter().map(|a| (a.id.clone(), a)).collect())
    }

    pub async fn author_summary(&self, id: &str) -> Result<AuthorSummary> {
        let mut authors = self.authors_by_ids(&[id.to_string()]).await?;
        Ok(authors.remove(id).unwrap_or_else(|| AuthorSummary {
            id: id.to_string(),
            ..Default::default()
        }))
    }

    async fn create_user(&self, name: &str, email: &str, password: &str, role: UserRole) -> Result<User> {
        let email = normalize_email(email);

        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User already exists"));
        }

        let id = Uuid::new_v4().to_string();
        let password_hash = self.auth.hash_password(password)?;

        let created = self
            .db
            .query_with_params(
                r#"
                CREATE type::thing('user', $id) SET
                    name = $name,
                    email = $email,
                    password_hash = $password_hash,
                    bio = '',
                    profile_picture = '',
                    role = $role,
                    is_blocked = false,
                    links = [],
                    created_at = time::now(),
                    updated_at = time::now()
                RETURN NONE
                "#,
                json!({
                    "id": id,
                    "name": name,
                    "email": email,
                    "password_hash": password_hash,
                    "role": role.as_str(),
                }),
            )
            .await;

        match created {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => {
                warn!("Concurrent registration for {} rejected by unique index", email);
                return Err(AppError::conflict("User already exists"));
            }
            Err(e) => return Err(e),
        }

        self.get_user_by_id(&id)
            .await?
            .ok_or_else(|| AppError::internal("Failed to load created user"))
    }

    async fn check_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = match self.get_user_by_email(email).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        if self.auth.verify_password(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    fn issue(&self, user: User) -> Result<AuthResponse> {
        let token = self.auth.generate_token(&user.id)?;
        Ok(AuthResponse {
            token,
            user: user.to_response(),
        })
    }
}
