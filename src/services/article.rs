use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        article::*,
        keyword::{aggregate_keywords, KeywordCount},
        user::{AuthorSummary, User},
    },
    services::{database::PaginatedResult, Database, UserService},
    utils::{slug::is_valid_slug, text::ContentProcessor},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

const ARTICLE_SELECT: &str = "SELECT *, meta::id(id) AS id FROM";

/// slug 冲突时最多重试的次数
const SLUG_ATTEMPTS: usize = 3;

/// 列表页码上限，超出按上限处理
const MAX_PAGE: usize = 100_000;

#[derive(Clone)]
pub struct ArticleService {
    db: Arc<Database>,
    users: UserService,
    processor: ContentProcessor,
    config: Config,
}

impl ArticleService {
    pub async fn new(db: Arc<Database>, users: UserService, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            users,
            processor: ContentProcessor::new(),
            config: config.clone(),
        })
    }

    /// 创建新文章
    pub async fn create_article(&self, author: &User, request: CreateArticleRequest) -> Result<ArticleResponse> {
        debug!("Creating article for user: {}", author.id);

        request.validate()
            .map_err(|e| AppError::ValidatorError(e))?;

        let title = validate_title(&request.title)?;
        validate_content(&request.content)?;

        let mut article = Article::new(title, self.processor.sanitize(&request.content), author.id.clone());
        article.set_excerpt(request.excerpt);
        article.cover_image = request.cover_image.unwrap_or_default();
        article.keywords = normalize_keywords(
            request.keywords.unwrap_or_default(),
            self.config.max_keywords_per_article,
        )?;
        article.status = request.status.unwrap_or_default();

        for attempt in 1..=SLUG_ATTEMPTS {
            article.refresh_derived(&self.processor, true, true);

            match self.insert(&article).await {
                Ok(()) => {
                    info!("Created article: {} by user: {}", article.id, author.id);
                    return self.get_response(&article.id).await;
                }
                Err(e) if e.is_unique_violation() && attempt < SLUG_ATTEMPTS => {
                    warn!("Slug {} already taken, regenerating", article.slug);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::internal("Failed to allocate a unique slug"))
    }

    /// 更新文章（作者本人或管理员）
    pub async fn update_article(&self, article_id: &str, user: &User, request: UpdateArticleRequest) -> Result<ArticleResponse> {
        debug!("Updating article: {} by user: {}", article_id, user.id);

        request.validate()
            .map_err(|e| AppError::ValidatorError(e))?;

        let mut article = self.get_managed(article_id, user).await?;

        let mut title_changed = false;
        if let Some(title) = request.title {
            let title = validate_title(&title)?;
            title_changed = title != article.title;
            article.title = title;
        }

        let mut content_changed = false;
        if let Some(content) = request.content {
            validate_content(&content)?;
            let content = self.processor.sanitize(&content);
            content_changed = content != article.content;
            article.content = content;
        }

        if request.excerpt.is_some() {
            article.set_excerpt(request.excerpt);
        }

        if let Some(cover_image) = request.cover_image {
            article.cover_image = cover_image;
        }

        if let Some(keywords) = request.keywords {
            article.keywords = normalize_keywords(keywords, self.config.max_keywords_per_article)?;
        }

        if let Some(status) = request.status {
            article.status = status;
        }

        article.refresh_derived(&self.processor, title_changed, content_changed);

        let sql = r#"
            UPDATE type::thing('article', $id) SET
                title = $title,
                slug = $slug,
                content = $content,
                excerpt = $excerpt,
                custom_excerpt = $custom_excerpt,
                cover_image = $cover_image,
                keywords = $keywords,
                status = $status,
                reading_time = $reading_time,
                updated_at = time::now()
            WHERE slug != NONE
            RETURN NONE
        "#;

        let params = json!({
            "id": article.id,
            "title": article.title,
            "slug": article.slug,
            "content": article.content,
            "excerpt": article.excerpt,
            "custom_excerpt": article.custom_excerpt,
            "cover_image": article.cover_image,
            "keywords": article.keywords,
            "status": article.status.as_str(),
            "reading_time": article.reading_time,
        });

        match self.db.query_with_params(sql, params).await {
            Ok(_) => {}
            Err(e) if e.is_unique_violation() => {
                return Err(AppError::conflict("Slug already in use, please retry"));
            }
            Err(e) => return Err(e),
        }

        info!("Updated article: {}", article.id);
        self.get_response(&article.id).await
    }

    /// 删除文章（作者本人或管理员）
    pub async fn delete_article(&self, article_id: &str, user: &User) -> Result<()> {
        let article = self.get_managed(article_id, user).await?;
        self.delete_cascade(&article.id).await?;
        info!("Deleted article: {} by user: {}", article.id, user.id);
        Ok(())
    }

    /// 删除文章及其全部评论与书签
    pub async fn delete_cascade(&self, article_id: &str) -> Result<()> {
        let sql = r#"
            BEGIN TRANSACTION;
            DELETE comment WHERE article_id = $id;
            DELETE bookmark WHERE article_id = $id;
            DELETE type::thing('article', $id);
            COMMIT TRANSACTION;
        "#;

        self.db.query_with_params(sql, json!({ "id": article_id })).await?;
        Ok(())
    }

    pub async fn get_article_by_id(&self, article_id: &str) -> Result<Option<Article>> {
        self.db
            .query_one(
                &format!("{} type::thing('article', $id)", ARTICLE_SELECT),
                json!({ "id": article_id }),
            )
            .await
    }

    pub async fn get_article_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        self.db
            .query_one(
                &format!("{} article WHERE slug = $slug LIMIT 1", ARTICLE_SELECT),
                json!({ "slug": slug }),
            )
            .await
    }

    /// 按 slug 读取文章；草稿仅对作者与管理员可见
    pub async fn get_article_view(&self, slug: &str, viewer: Option<&User>) -> Result<(ArticleResponse, bool)> {
        if !is_valid_slug(slug) {
            return Err(AppError::not_found("Article"));
        }

        let article = self
            .get_article_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        if !article.is_published() {
            let allowed = viewer
                .map(|v| article.can_be_managed_by(&v.id, v.is_admin()))
                .unwrap_or(false);
            if !allowed {
                return Err(AppError::not_found("Article"));
            }
        }

        let is_liked = viewer.map(|v| article.is_liked_by(&v.id)).unwrap_or(false);
        let response = self.to_response(article).await?;
        Ok((response, is_liked))
    }

    /// 编辑器读取：作者本人或管理员
    pub async fn get_article_for_edit(&self, article_id: &str, user: &User) -> Result<ArticleResponse> {
        let article = self.get_managed(article_id, user).await?;
        self.to_response(article).await
    }

    /// 已发布文章分页列表，可按关键词过滤
    pub async fn get_articles(&self, query: ArticleQuery) -> Result<PaginatedResult<ArticleResponse>> {
        debug!("Getting articles list with query: {:?}", query);

        let page = query.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let limit = query
            .limit
            .unwrap_or(self.config.default_articles_per_page)
            .clamp(1, self.config.max_articles_per_page);
        let offset = (page - 1) * limit;

        let mut conditions = vec!["status = 'published'"];
        let mut params = json!({
            "limit": limit,
            "offset": offset,
        });

        if let Some(keyword) = normalized_term(query.keyword.as_deref()) {
            conditions.push("$keyword INSIDE keywords");
            params["keyword"] = json!(keyword);
        }

        let where_clause = conditions.join(" AND ");

        let total = self
            .db
            .count(
                &format!("SELECT count() AS total FROM article WHERE {} GROUP ALL", where_clause),
                params.clone(),
            )
            .await?;

        let articles: Vec<Article> = self
            .db
            .query_all(
                &format!(
                    "{} article WHERE {} ORDER BY created_at DESC LIMIT $limit START $offset",
                    ARTICLE_SELECT, where_clause
                ),
                params,
            )
            .await?;

        let data = self.to_responses(articles).await?;
        Ok(PaginatedResult::new(data, total, page, limit))
    }

    /// 标题、正文或关键词包含查询串（不区分大小写），按时间倒序
    pub async fn search_articles(&self, q: Option<&str>) -> Result<Vec<ArticleResponse>> {
        let q = match normalized_term(q) {
            Some(q) => q,
            None => return Ok(Vec::new()),
        };
        debug!("Searching articles for: {}", q);

        let sql = format!(
            r#"{} article
            WHERE status = 'published'
                AND (string::lowercase(title) CONTAINS $q
                    OR string::lowercase(content) CONTAINS $q
                    OR array::join(keywords, ' ') CONTAINS $q)
            ORDER BY created_at DESC
            LIMIT $limit"#,
            ARTICLE_SELECT
        );

        let articles: Vec<Article> = self
            .db
            .query_all(&sql, json!({ "q": q, "limit": self.config.search_max_results }))
            .await?;

        self.to_responses(articles).await
    }

    /// 当前用户的草稿，最近修改的在前
    pub async fn get_my_drafts(&self, user: &User) -> Result<Vec<ArticleResponse>> {
        let articles: Vec<Article> = self
            .db
            .query_all(
                &format!(
                    "{} article WHERE author_id = $author AND status = 'draft' ORDER BY updated_at DESC",
                    ARTICLE_SELECT
                ),
                json!({ "author": user.id }),
            )
            .await?;

        self.to_responses(articles).await
    }

    pub async fn get_my_articles(&self, user: &User) -> Result<Vec<ArticleResponse>> {
        let articles: Vec<Article> = self
            .db
            .query_all(
                &format!("{} article WHERE author_id = $author ORDER BY created_at DESC", ARTICLE_SELECT),
                json!({ "author": user.id }),
            )
            .await?;

        self.to_responses(articles).await
    }

    /// 作者主页：已发布文章（可按关键词过滤）与该作者的关键词统计
    pub async fn get_user_articles(
        &self,
        author_id: &str,
        keyword: Option<&str>,
    ) -> Result<(Vec<ArticleResponse>, Vec<KeywordCount>)> {
        let mut conditions = vec!["author_id = $author", "status = 'published'"];
        let mut params = json!({ "author": author_id });

        if let Some(keyword) = normalized_term(keyword) {
            conditions.push("$keyword INSIDE keywords");
            params["keyword"] = json!(keyword);
        }

        let articles: Vec<Article> = self
            .db
            .query_all(
                &format!(
                    "{} article WHERE {} ORDER BY created_at DESC",
                    ARTICLE_SELECT,
                    conditions.join(" AND ")
                ),
                params,
            )
            .await?;

        let keyword_lists: Vec<Vec<String>> = self
            .db
            .query_all(
                "SELECT VALUE keywords FROM article WHERE author_id = $author AND status = 'published'",
                json!({ "author": author_id }),
            )
            .await?;

        let stats = aggregate_keywords(keyword_lists, None);
        let articles = self.to_responses(articles).await?;
        Ok((articles, stats))
    }

    /// 切换点赞；单条条件 UPDATE 保证 likes 中不出现重复
    pub async fn toggle_like(&self, article_id: &str, user: &User) -> Result<LikeResponse> {
        if self.get_article_by_id(article_id).await?.is_none() {
            return Err(AppError::not_found("Article"));
        }

        let sql = r#"
            UPDATE type::thing('article', $id) SET likes = IF $user INSIDE likes
                THEN array::complement(likes, [$user])
                ELSE array::union(likes, [$user])
            END WHERE slug != NONE RETURN NONE;
            SELECT VALUE likes FROM type::thing('article', $id);
        "#;

        let mut response = self
            .db
            .query_with_params(sql, json!({ "id": article_id, "user": user.id }))
            .await?;
        let likes: Vec<Vec<String>> = response.take(1)?;
        let likes = likes.into_iter().next().unwrap_or_default();

        let is_liked = likes.iter().any(|id| id == &user.id);
        debug!("User {} toggled like on {} -> {}", user.id, article_id, is_liked);

        Ok(LikeResponse {
            likes: likes.len(),
            is_liked,
        })
    }

    /// 管理后台：全部文章，最新在前
    pub async fn get_all_articles(&self) -> Result<Vec<ArticleResponse>> {
        let articles: Vec<Article> = self
            .db
            .query_all(
                &format!("{} article ORDER BY created_at DESC", ARTICLE_SELECT),
                json!({}),
            )
            .await?;

        self.to_responses(articles).await
    }

    /// 按 id 批量读取并保持输入顺序；不存在的 id 被跳过
    pub async fn get_responses_by_ids(&self, ids: &[String]) -> Result<Vec<ArticleResponse>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let articles: Vec<Article> = self
            .db
            .query_all(
                &format!("{} article WHERE meta::id(id) INSIDE $ids", ARTICLE_SELECT),
                json!({ "ids": ids }),
            )
            .await?;

        let mut responses = self.to_responses(articles).await?;
        responses.sort_by_key(|a| ids.iter().position(|id| id == &a.id));
        Ok(responses)
    }

    pub async fn to_responses(&self, articles: Vec<Article>) -> Result<Vec<ArticleResponse>> {
        let author_ids: Vec<String> = articles.iter().map(|a| a.author_id.clone()).collect();
        let authors = self.users.authors_by_ids(&author_ids).await?;

        Ok(articles
            .into_iter()
            .map(|article| {
                let author = authors.get(&article.author_id).cloned().unwrap_or_else(|| AuthorSummary {
                    id: article.author_id.clone(),
                    ..Default::default()
                });
                ArticleResponse::new(article, author)
            })
            .collect())
    }

    async fn to_response(&self, article: Article) -> Result<ArticleResponse> {
        let author = self.users.author_summary(&article.author_id).await?;
        Ok(ArticleResponse::new(article, author))
    }

    async fn get_response(&self, article_id: &str) -> Result<ArticleResponse> {
        let article = self
            .get_article_by_id(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;
        self.to_response(article).await
    }

    async fn get_managed(&self, article_id: &str, user: &User) -> Result<Article> {
        let article = self
            .get_article_by_id(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        if !article.can_be_managed_by(&user.id, user.is_admin()) {
            return Err(AppError::forbidden("Not authorized to modify this article"));
        }

        Ok(article)
    }

    async fn insert(&self, article: &Article) -> Result<()> {
        let sql = r#"
            CREATE type::thing('article', $id) SET
                title = $title,
                slug = $slug,
                content = $content,
                excerpt = $excerpt,
                custom_excerpt = $custom_excerpt,
                cover_image = $cover_image,
                author_id = $author_id,
                keywords = $keywords,
                status = $status,
                likes = [],
                reading_time = $reading_time,
                created_at = time::now(),
                updated_at = time::now()
            RETURN NONE
        "#;

        let params = json!({
            "id": article.id,
            "title": article.title,
            "slug": article.slug,
            "content": article.content,
            "excerpt": article.excerpt,
            "custom_excerpt": article.custom_excerpt,
            "cover_image": article.cover_image,
            "author_id": article.author_id,
            "keywords": article.keywords,
            "status": article.status.as_str(),
            "reading_time": article.reading_time,
        });

        self.db.query_with_params(sql, params).await?;
        Ok(())
    }
}

/// 去空白并小写，空串视为未提供
fn normalized_term(term: Option<&str>) -> Option<String> {
    term.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{RegisterRequest, UserRole};
    use crate::services::AuthService;

    struct Fixture {
        articles: ArticleService,
        users: UserService,
    }

    async fn fixture() -> Fixture {
        let config = Config::default();
        let db = Arc::new(Database::new(&config).await.unwrap());
        db.migrate().await.unwrap();
        let auth = AuthService::new(db.clone(), &config).await.unwrap();
        let users = UserService::new(db.clone(), auth).await.unwrap();
        let articles = ArticleService::new(db, users.clone(), &config).await.unwrap();
        Fixture { articles, users }
    }

    async fn author(users: &UserService, name: &str) -> User {
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

    fn request(title: &str, content: &str, status: ArticleStatus) -> CreateArticleRequest {
        CreateArticleRequest {
            title: title.to_string(),
            content: content.to_string(),
            excerpt: None,
            cover_image: None,
            keywords: Some(vec!["Rust".to_string(), "web".to_string()]),
            status: Some(status),
        }
    }

    #[tokio::test]
    async fn test_create_and_read_by_slug() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;

        let created = f
            .articles
            .create_article(&ada, request("Hello World", "<p>hi there</p>", ArticleStatus::Published))
            .await
            .unwrap();
        assert!(created.slug.starts_with("hello-world-"));
        assert_eq!(created.keywords, vec!["rust", "web"]);
        assert_eq!(created.author.name, "Ada");

        let (view, is_liked) = f.articles.get_article_view(&created.slug, None).await.unwrap();
        assert_eq!(view.id, created.id);
        assert!(!is_liked);
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_others() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;
        let bob = author(&f.users, "Bob").await;

        let draft = f
            .articles
            .create_article(&ada, request("Secret", "<p>wip</p>", ArticleStatus::Draft))
            .await
            .unwrap();

        assert!(f.articles.get_article_view(&draft.slug, Some(&ada)).await.is_ok());
        assert!(matches!(
            f.articles.get_article_view(&draft.slug, Some(&bob)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.articles.get_article_view(&draft.slug, None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_requires_owner_or_admin() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;
        let mut bob = author(&f.users, "Bob").await;

        let article = f
            .articles
            .create_article(&ada, request("Mine", "<p>body</p>", ArticleStatus::Published))
            .await
            .unwrap();

        let edit = || UpdateArticleRequest {
            title: Some("Renamed".to_string()),
            content: None,
            excerpt: None,
            cover_image: None,
            keywords: None,
            status: None,
        };

        assert!(matches!(
            f.articles.update_article(&article.id, &bob, edit()).await,
            Err(AppError::Authorization(_))
        ));

        bob.role = UserRole::Admin;
        let updated = f.articles.update_article(&article.id, &bob, edit()).await.unwrap();
        assert!(updated.slug.starts_with("renamed-"));
        assert_eq!(updated.author.id, ada.id);
    }

    #[tokio::test]
    async fn test_like_toggle_is_an_involution() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;
        let bob = author(&f.users, "Bob").await;

        let article = f
            .articles
            .create_article(&ada, request("Likeable", "<p>body</p>", ArticleStatus::Published))
            .await
            .unwrap();

        let first = f.articles.toggle_like(&article.id, &bob).await.unwrap();
        assert_eq!(first.likes, 1);
        assert!(first.is_liked);

        let second = f.articles.toggle_like(&article.id, &bob).await.unwrap();
        assert_eq!(second.likes, 0);
        assert!(!second.is_liked);

        assert!(matches!(
            f.articles.toggle_like("missing", &bob).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_and_keyword_filter() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;

        for i in 0..3 {
            f.articles
                .create_article(&ada, request(&format!("Post {}", i), "<p>body</p>", ArticleStatus::Published))
                .await
                .unwrap();
        }
        let mut other = request("Other", "<p>body</p>", ArticleStatus::Published);
        other.keywords = Some(vec!["databases".to_string()]);
        f.articles.create_article(&ada, other).await.unwrap();
        f.articles
            .create_article(&ada, request("Hidden", "<p>body</p>", ArticleStatus::Draft))
            .await
            .unwrap();

        let page = f
            .articles
            .get_articles(ArticleQuery { page: Some(2), limit: Some(3), keyword: None })
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);

        let filtered = f
            .articles
            .get_articles(ArticleQuery { page: None, limit: None, keyword: Some("RUST".to_string()) })
            .await
            .unwrap();
        assert_eq!(filtered.total, 3);
    }

    #[tokio::test]
    async fn test_huge_page_is_clamped() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;
        f.articles
            .create_article(&ada, request("Only", "<p>body</p>", ArticleStatus::Published))
            .await
            .unwrap();

        let page = f
            .articles
            .get_articles(ArticleQuery { page: Some(usize::MAX), limit: Some(10), keyword: None })
            .await
            .unwrap();
        assert_eq!(page.page, MAX_PAGE);
        assert_eq!(page.total, 1);
        assert!(page.data.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_slug_is_not_found() {
        let f = fixture().await;
        for slug in ["Hello World", "bad--slug", "-leading", ""] {
            assert!(matches!(
                f.articles.get_article_view(slug, None).await,
                Err(AppError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;

        f.articles
            .create_article(&ada, request("Animals", "<p>The quick brown fox</p>", ArticleStatus::Published))
            .await
            .unwrap();

        assert_eq!(f.articles.search_articles(Some("FOX")).await.unwrap().len(), 1);
        assert_eq!(f.articles.search_articles(Some("fox")).await.unwrap().len(), 1);
        assert!(f.articles.search_articles(Some("wolf")).await.unwrap().is_empty());
        assert!(f.articles.search_articles(Some("   ")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_articles_with_keyword_stats() {
        let f = fixture().await;
        let ada = author(&f.users, "Ada").await;

        f.articles
            .create_article(&ada, request("One", "<p>body</p>", ArticleStatus::Published))
            .await
            .unwrap();
        let mut second = request("Two", "<p>body</p>", ArticleStatus::Published);
        second.keywords = Some(vec!["rust".to_string()]);
        f.articles.create_article(&ada, second).await.unwrap();

        let (articles, stats) = f.articles.get_user_articles(&ada.id, Some("web")).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(stats[0], KeywordCount { keyword: "rust".to_string(), count: 2 });
        assert_eq!(stats[1], KeywordCount { keyword: "web".to_string(), count: 1 });
    }
}
