use crate::{
    config::Config,
    error::Result,
    services::{
        AdminService, ArticleService, AuthService, BookmarkService, CommentService, Database,
        KeywordService, UserService,
    },
    utils::middleware::{new_rate_limiter, KeyedRateLimiter},
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: AuthService,

    /// 用户服务
    pub user_service: UserService,

    /// 文章服务
    pub article_service: ArticleService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 书签服务
    pub bookmark_service: BookmarkService,

    /// 关键词统计服务
    pub keyword_service: KeywordService,

    /// 管理后台服务
    pub admin_service: AdminService,

    /// 登录、注册接口的按 IP 限流器
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    /// 在已连接的数据库上组装全部服务
    pub async fn new(config: Config, db: Arc<Database>) -> Result<Self> {
        let auth_service = AuthService::new(db.clone(), &config).await?;
        let user_service = UserService::new(db.clone(), auth_service.clone()).await?;
        let article_service = ArticleService::new(db.clone(), user_service.clone(), &config).await?;
        let comment_service = CommentService::new(
            db.clone(),
            user_service.clone(),
            article_service.clone(),
            &config,
        )
        .await?;
        let bookmark_service = BookmarkService::new(db.clone(), article_service.clone()).await?;
        let keyword_service = KeywordService::new(db.clone(), config.top_keywords_limit).await?;
        let admin_service =
            AdminService::new(db.clone(), user_service.clone(), article_service.clone()).await?;
        let rate_limiter = Arc::new(new_rate_limiter(config.rate_limit_requests));

        Ok(Self {
            config,
            db,
            auth_service,
            user_service,
            article_service,
            comment_service,
            bookmark_service,
            keyword_service,
            admin_service,
            rate_limiter,
        })
    }
}
