use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;

/// 最多保存的个人链接数
pub const MAX_PROFILE_LINKS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: String,
    pub role: UserRole,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub links: Vec<UserLink>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct UserLink {
    #[validate(length(min = 1, max = 50))]
    pub label: String,
    #[validate(url)]
    pub url: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
            profile_picture: self.profile_picture.clone(),
            role: self.role,
            is_blocked: self.is_blocked,
            links: self.links.clone(),
            created_at: self.created_at,
        }
    }
}

/// 对外暴露的用户信息，不含任何凭据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub profile_picture: String,
    pub role: UserRole,
    pub is_blocked: bool,
    pub links: Vec<UserLink>,
    pub created_at: DateTime<Utc>,
}

/// 文章、评论中内嵌的作者信息
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthorSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename(serialize = "profilePicture"))]
    pub profile_picture: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(max = 10))]
    pub links: Option<Vec<UserLink>>,
    #[validate(length(max = 500))]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// 统一的邮箱格式：去空白并小写
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
