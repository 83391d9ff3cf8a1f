use crate::{
    error::{AppError, Result},
    models::{
        admin::{count_per_day, AdminStats},
        article::Article,
        user::{User, UserResponse},
    },
    services::{user::USER_SELECT, ArticleService, Database, UserService},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// 统计中最近用户、最近文章的条数
const RECENT_LIMIT: usize = 5;

/// 管理后台服务：统计、用户封禁与级联删除
#[derive(Clone)]
pub struct AdminService {
    db: Arc<Database>,
    users: UserService,
    articles: ArticleService,
}

impl AdminService {
    pub async fn new(db: Arc<Database>, users: UserService, articles: ArticleService) -> Result<Self> {
        Ok(Self { db, users, articles })
    }

    pub async fn get_stats(&self) -> Result<AdminStats> {
        let no_params = || json!({});

        let total_users = self
            .db
            .count("SELECT count() AS total FROM user WHERE role = 'user' GROUP ALL", no_params())
            .await?;
        let total_articles = self
            .db
            .count("SELECT count() AS total FROM article WHERE status = 'published' GROUP ALL", no_params())
            .await?;
        let total_comments = self
            .db
            .count("SELECT count() AS total FROM comment GROUP ALL", no_params())
            .await?;

        let recent_users: Vec<User> = self
            .db
            .query_all(
                &format!("{} user WHERE role = 'user' ORDER BY created_at DESC LIMIT $limit", USER_SELECT),
                json!({ "limit": RECENT_LIMIT }),
            )
            .await?;

        let recent_articles: Vec<Article> = self
            .db
            .query_all(
                "SELECT *, meta::id(id) AS id FROM article ORDER BY created_at DESC LIMIT $limit",
                json!({ "limit": RECENT_LIMIT }),
            )
            .await?;

        let published_this_week: Vec<DateTime<Utc>> = self
            .db
            .query_all(
                "SELECT VALUE created_at FROM article WHERE status = 'published' AND created_at >= time::now() - 7d",
                no_params(),
            )
            .await?;

        Ok(AdminStats {
            total_users,
            total_articles,
            total_comments,
            recent_users: recent_users.iter().map(User::to_response).collect(),
            recent_articles: self.articles.to_responses(recent_articles).await?,
            articles_per_day: count_per_day(&published_this_week),
        })
    }

    /// 普通用户列表，最新注册在前
    pub async fn get_users(&self) -> Result<Vec<UserResponse>> {
        let users: Vec<User> = self
            .db
            .query_all(
                &format!("{} user WHERE role = 'user' ORDER BY created_at DESC", USER_SELECT),
                json!({}),
            )
            .await?;

        Ok(users.iter().map(User::to_response).collect())
    }

    /// 切换封禁状态，返回更新后的用户
    pub async fn toggle_block(&self, admin: &User, user_id: &str) -> Result<UserResponse> {
        if admin.id == user_id {
            return Err(AppError::bad_request("You cannot block yourself"));
        }

        if self.users.get_user_by_id(user_id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }

        self.db
            .query_with_params(
                "UPDATE type::thing('user', $id) SET is_blocked = IF is_blocked = true THEN false ELSE true END, updated_at = time::now() WHERE email != NONE RETURN NONE",
                json!({ "id": user_id }),
            )
            .await?;

        let user = self.users.get_profile(user_id).await?;
        info!("Admin {} set blocked={} on user {}", admin.id, user.is_blocked, user.id);
        Ok(user)
    }

    /// 删除用户及其文章（连同评论、书签）、评论（连同回复）、书签与点赞
    pub async fn delete_user(&self, admin: &User, user_id: &str) -> Result<()> {
        if admin.id == user_id {
            return Err(AppError::bad_request("You cannot delete yourself"));
        }

        if self.users.get_user_by_id(user_id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }

        let sql = r#"
            BEGIN TRANSACTION;
            LET $articles = (SELECT VALUE meta::id(id) FROM article WHERE author_id = $id);
            LET $comments = (SELECT VALUE meta::id(id) FROM comment WHERE author_id = $id);
            DELETE comment WHERE article_id INSIDE $articles OR author_id = $id OR parent_id INSIDE $comments;
            DELETE bookmark WHERE article_id INSIDE $articles OR user_id = $id;
            DELETE article WHERE author_id = $id;
            UPDATE article SET likes = array::complement(likes, [$id]) WHERE $id INSIDE likes RETURN NONE;
            DELETE type::thing('user', $id);
            COMMIT TRANSACTION;
        "#;

        self.db.query_with_params(sql, json!({ "id": user_id })).await?;
        warn!("Admin {} deleted user {} and their content", admin.id, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::article::{ArticleStatus, CreateArticleRequest};
    use crate::models::user::{RegisterRequest, UserRole};
    use crate::services::AuthService;

    struct Fixture {
        admin: AdminService,
        users: UserService,
        articles: ArticleService,
    }

    async fn fixture() -> Fixture {
        let config = Config::default();
        let db = Arc::new(Database::new(&config).await.unwrap());
        db.migrate().await.unwrap();
        let auth = AuthService::new(db.clone(), &config).await.unwrap();
        let users = UserService::new(db.clone(), auth).await.unwrap();
        let articles = ArticleService::new(db.clone(), users.clone(), &config).await.unwrap();
        let admin = AdminService::new(db, users.clone(), articles.clone()).await.unwrap();
        Fixture { admin, users, articles }
    }

    async fn register(users: &UserService, name: &str) -> User {
        let response = users
            .register(RegisterRequest {
                name: name.to_string(),
                email: format!("{}@x.com", name.to_lowercase()),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        users.get_user_by_id(&response.user.id).await.unwrap().unwrap()
    }

    fn published(title: &str) -> CreateArticleRequest {
        CreateArticleRequest {
            title: title.to_string(),
            content: "<p>body</p>".to_string(),
            excerpt: None,
            cover_image: None,
            keywords: None,
            status: Some(ArticleStatus::Published),
        }
    }

    #[tokio::test]
    async fn test_stats_count_published_and_plain_users() {
        let f = fixture().await;
        let ada = register(&f.users, "Ada").await;

        f.articles.create_article(&ada, published("One")).await.unwrap();
        let mut draft = published("Two");
        draft.status = Some(ArticleStatus::Draft);
        f.articles.create_article(&ada, draft).await.unwrap();

        let stats = f.admin.get_stats().await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_articles, 1);
        assert_eq!(stats.total_comments, 0);
        assert_eq!(stats.recent_articles.len(), 2);
        assert_eq!(stats.articles_per_day.len(), 1);
        assert_eq!(stats.articles_per_day[0].count, 1);
    }

    #[tokio::test]
    async fn test_block_toggle_and_self_protection() {
        let f = fixture().await;
        let mut root = register(&f.users, "Root").await;
        root.role = UserRole::Admin;
        let ada = register(&f.users, "Ada").await;

        assert!(f.admin.toggle_block(&root, &ada.id).await.unwrap().is_blocked);
        assert!(!f.admin.toggle_block(&root, &ada.id).await.unwrap().is_blocked);
        assert!(matches!(
            f.admin.toggle_block(&root, &root.id).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let f = fixture().await;
        let mut root = register(&f.users, "Root").await;
        root.role = UserRole::Admin;
        let ada = register(&f.users, "Ada").await;
        let bob = register(&f.users, "Bob").await;

        let adas = f.articles.create_article(&ada, published("Ada's")).await.unwrap();
        let bobs = f.articles.create_article(&bob, published("Bob's")).await.unwrap();
        f.articles.toggle_like(&bobs.id, &ada).await.unwrap();

        f.admin.delete_user(&root, &ada.id).await.unwrap();

        assert!(f.users.get_user_by_id(&ada.id).await.unwrap().is_none());
        assert!(f.articles.get_article_by_id(&adas.id).await.unwrap().is_none());
        let remaining = f.articles.get_article_by_id(&bobs.id).await.unwrap().unwrap();
        assert!(remaining.likes.is_empty());
    }
}
