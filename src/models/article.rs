use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use validator::Validate;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::AuthorSummary,
    utils::{slug, text::ContentProcessor},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    /// 摘要由作者显式提供时为 true，否则随内容重新生成
    #[serde(default)]
    pub custom_excerpt: bool,
    #[serde(default)]
    pub cover_image: String,
    pub author_id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: ArticleStatus,
    #[serde(default)]
    pub likes: Vec<String>,
    pub reading_time: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
}

impl Default for ArticleStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: String,

    pub content: String,

    #[validate(length(max = 500))]
    pub excerpt: Option<String>,

    #[validate(length(max = 500))]
    pub cover_image: Option<String>,

    pub keywords: Option<Vec<String>>,
    pub status: Option<ArticleStatus>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    pub content: Option<String>,

    #[validate(length(max = 500))]
    pub excerpt: Option<String>,

    #[validate(length(max = 500))]
    pub cover_image: Option<String>,

    pub keywords: Option<Vec<String>>,
    pub status: Option<ArticleStatus>,
}

/// 对外返回的文章，作者信息内嵌，点赞以计数加用户列表表示
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: String,
    pub author: AuthorSummary,
    pub keywords: Vec<String>,
    pub status: ArticleStatus,
    pub likes: usize,
    pub liked_by: Vec<String>,
    pub reading_time: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArticleResponse {
    pub fn new(article: Article, author: AuthorSummary) -> Self {
        Self {
            id: article.id,
            title: article.title,
            slug: article.slug,
            content: article.content,
            excerpt: article.excerpt,
            cover_image: article.cover_image,
            author,
            keywords: article.keywords,
            status: article.status,
            likes: article.likes.len(),
            liked_by: article.likes,
            reading_time: article.reading_time,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ArticleQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleResponse>,
    pub total_pages: usize,
    pub current_page: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub likes: usize,
    pub is_liked: bool,
}

impl Article {
    /// 新文章；派生字段由 `refresh_derived` 填充
    pub fn new(title: String, content: String, author_id: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            slug: String::new(),
            content,
            excerpt: String::new(),
            custom_excerpt: false,
            cover_image: String::new(),
            author_id,
            keywords: Vec::new(),
            status: ArticleStatus::Draft,
            likes: Vec::new(),
            reading_time: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// 设置摘要；空字符串表示交回自动生成
    pub fn set_excerpt(&mut self, excerpt: Option<String>) {
        match excerpt.map(|e| e.trim().to_string()) {
            Some(e) if !e.is_empty() => {
                self.excerpt = e;
                self.custom_excerpt = true;
            }
            _ => {
                self.excerpt.clear();
                self.custom_excerpt = false;
            }
        }
    }

    /// 根据标题与内容重新计算 slug、阅读时间与摘要
    pub fn refresh_derived(&mut self, processor: &ContentProcessor, title_changed: bool, content_changed: bool) {
        if title_changed || self.slug.is_empty() {
            self.slug = slug::generate_unique_slug(&self.title);
        }

        if content_changed {
            self.reading_time = processor.estimate_reading_time(&self.content);
        }

        if !self.custom_excerpt && (content_changed || self.excerpt.is_empty()) {
            self.excerpt = processor.generate_excerpt(&self.content);
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }

    /// 作者本人或管理员可以修改、删除
    pub fn can_be_managed_by(&self, user_id: &str, is_admin: bool) -> bool {
        is_admin || self.author_id == user_id
    }
}

/// 标题去空白后必须非空
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    Ok(title.to_string())
}

pub fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::validation("Content is required"));
    }
    Ok(())
}

/// 关键词：去空白、小写、保序去重，丢弃空项，最多 `max` 个
pub fn normalize_keywords(raw: Vec<String>, max: usize) -> Result<Vec<String>> {
    let mut keywords: Vec<String> = Vec::new();

    for keyword in raw {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() || keywords.contains(&keyword) {
            continue;
        }
        if keyword.chars().count() > 50 {
            return Err(AppError::validation("Keywords must be at most 50 characters"));
        }
        keywords.push(keyword);
    }

    if keywords.len() > max {
        return Err(AppError::Validation(format!(
            "At most {} keywords are allowed",
            max
        )));
    }

    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_with(title: &str, content: &str) -> Article {
        let mut article = Article::new(title.to_string(), content.to_string(), "author".to_string());
        article.refresh_derived(&ContentProcessor::new(), true, true);
        article
    }

    #[test]
    fn test_new_article_derivations() {
        let words = vec!["word"; 250].join(" ");
        let article = article_with("Hello World", &format!("<p>{}</p>", words));

        assert!(article.slug.starts_with("hello-world-"));
        assert_eq!(article.reading_time, 2);
        assert_eq!(article.excerpt.chars().count(), 163);
        assert!(article.excerpt.ends_with("..."));
        assert!(!article.custom_excerpt);
    }

    #[test]
    fn test_derivations_are_idempotent() {
        let processor = ContentProcessor::new();
        let mut article = article_with("Rust", "<p>one two three</p>");
        let (slug, reading_time, excerpt) =
            (article.slug.clone(), article.reading_time, article.excerpt.clone());

        article.refresh_derived(&processor, false, false);
        assert_eq!(article.slug, slug);
        assert_eq!(article.reading_time, reading_time);
        assert_eq!(article.excerpt, excerpt);

        article.refresh_derived(&processor, false, true);
        assert_eq!(article.slug, slug);
        assert_eq!(article.reading_time, reading_time);
        assert_eq!(article.excerpt, excerpt);
    }

    #[test]
    fn test_title_change_regenerates_slug() {
        let processor = ContentProcessor::new();
        let mut article = article_with("First Title", "<p>body</p>");
        let old_slug = article.slug.clone();

        article.title = "Second Title".to_string();
        article.refresh_derived(&processor, true, false);

        assert_ne!(article.slug, old_slug);
        assert!(article.slug.starts_with("second-title-"));
    }

    #[test]
    fn test_custom_excerpt_survives_content_change() {
        let processor = ContentProcessor::new();
        let mut article = article_with("Title", "<p>original body</p>");

        article.set_excerpt(Some("Hand written".to_string()));
        article.content = "<p>new body</p>".to_string();
        article.refresh_derived(&processor, false, true);
        assert_eq!(article.excerpt, "Hand written");

        article.set_excerpt(Some("".to_string()));
        article.refresh_derived(&processor, false, false);
        assert_eq!(article.excerpt, "new body");
    }

    #[test]
    fn test_normalize_keywords() {
        let keywords = normalize_keywords(
            vec![" Rust ".into(), "web".into(), "RUST".into(), "".into(), "Axum".into()],
            5,
        )
        .unwrap();
        assert_eq!(keywords, vec!["rust", "web", "axum"]);

        let too_many = (0..6).map(|i| format!("k{}", i)).collect();
        assert!(normalize_keywords(too_many, 5).is_err());
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Hello ").unwrap(), "Hello");
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn test_management_rights() {
        let article = article_with("Mine", "<p>x</p>");
        assert!(article.can_be_managed_by("author", false));
        assert!(!article.can_be_managed_by("someone-else", false));
        assert!(article.can_be_managed_by("someone-else", true));
    }
}
