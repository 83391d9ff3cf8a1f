use crate::{
    config::Config,
    error::{AppError, Result},
    models::{comment::*, user::{AuthorSummary, User}},
    services::{ArticleService, Database, UserService},
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

const COMMENT_SELECT: &str = "SELECT *, meta::id(id) AS id FROM";

#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
    users: UserService,
    articles: ArticleService,
    max_length: usize,
}

impl CommentService {
    pub async fn new(
        db: Arc<Database>,
        users: UserService,
        articles: ArticleService,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            db,
            users,
            articles,
            max_length: config.max_comment_length,
        })
    }

    pub async fn create_comment(&self, user: &User, request: CreateCommentRequest) -> Result<CommentResponse> {
        debug!("Creating comment for article: {}", request.article_id);

        request
            .validate()
            .map_err(|e| AppError::ValidatorError(e))?;

        let content = self.check_content(&request.content)?;

        let article = self
            .articles
            .get_article_by_id(&request.article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        if !article.is_published() && !article.can_be_managed_by(&user.id, user.is_admin()) {
            return Err(AppError::forbidden("Cannot comment on unpublished articles"));
        }

        // 只允许回复顶层评论
        let parent_id = match request.parent_comment_id.filter(|p| !p.is_empty()) {
            Some(parent_id) => {
                let parent = self
                    .get_comment(&parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Parent comment"))?;

                if parent.article_id != article.id {
                    return Err(AppError::bad_request("Parent comment belongs to another article"));
                }
                if !parent.is_top_level() {
                    return Err(AppError::bad_request("Replies can only be made to top-level comments"));
                }
                Some(parent.id)
            }
            None => None,
        };

        let id = Uuid::new_v4().to_string();
        self.db
            .query_with_params(
                r#"
                CREATE type::thing('comment', $id) SET
                    article_id = $article_id,
                    author_id = $author_id,
                    parent_id = $parent_id,
                    content = $content,
                    created_at = time::now(),
                    updated_at = time::now()
                RETURN NONE
                "#,
                json!({
                    "id": id,
                    "article_id": article.id,
                    "author_id": user.id,
                    "parent_id": parent_id,
                    "content": content,
                }),
            )
            .await?;

        info!("Created comment {} on article {}", id, article.id);
        self.get_response(&id).await
    }

    pub async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>> {
        self.db
            .query_one(
                &format!("{} type::thing('comment', $id)", COMMENT_SELECT),
                json!({ "id": comment_id }),
            )
            .await
    }

    /// 两级评论树：先取顶层评论，再一次取出它们的全部回复
    pub async fn get_article_comments(&self, article_id: &str) -> Result<Vec<CommentThread>> {
        debug!("Getting comments for article: {}", article_id);

        let top_level: Vec<Comment> = self
            .db
            .query_all(
                &format!(
                    "{} comment WHERE article_id = $article_id AND (parent_id = NONE OR parent_id = NULL) ORDER BY created_at DESC",
                    COMMENT_SELECT
                ),
                json!({ "article_id": article_id }),
            )
            .await?;

        if top_level.is_empty() {
            return Ok(Vec::new());
        }

        let parent_ids: Vec<&str> = top_level.iter().map(|c| c.id.as_str()).collect();
        let replies: Vec<Comment> = self
            .db
            .query_all(
                &format!(
                    "{} comment WHERE article_id = $article_id AND parent_id INSIDE $parent_ids ORDER BY created_at ASC",
                    COMMENT_SELECT
                ),
                json!({ "article_id": article_id, "parent_ids": parent_ids }),
            )
            .await?;

        let top_level = self.to_responses(top_level).await?;
        let replies = self.to_responses(replies).await?;
        Ok(assemble_thread(top_level, replies))
    }

    /// 修改评论内容（作者本人或管理员）
    pub async fn update_comment(&self, comment_id: &str, user: &User, request: UpdateCommentRequest) -> Result<CommentResponse> {
        let content = self.check_content(&request.content)?;
        let comment = self.get_managed(comment_id, user).await?;

        self.db
            .query_with_params(
                "UPDATE type::thing('comment', $id) SET content = $content, updated_at = time::now() WHERE article_id != NONE RETURN NONE",
                json!({ "id": comment.id, "content": content }),
            )
            .await?;

        info!("Updated comment {}", comment.id);
        self.get_response(&comment.id).await
    }

    /// 删除评论（作者本人或管理员），连同其回复
    pub async fn delete_comment(&self, comment_id: &str, user: &User) -> Result<()> {
        let comment = self.get_managed(comment_id, user).await?;
        self.delete_cascade(&comment.id).await?;
        info!("Deleted comment {} by user {}", comment.id, user.id);
        Ok(())
    }

    pub async fn delete_cascade(&self, comment_id: &str) -> Result<()> {
        let sql = r#"
            BEGIN TRANSACTION;
            DELETE comment WHERE parent_id = $id;
            DELETE type::thing('comment', $id);
            COMMIT TRANSACTION;
        "#;

        self.db.query_with_params(sql, json!({ "id": comment_id })).await?;
        Ok(())
    }

    /// 管理后台：全部评论及所属文章摘要，最新在前
    pub async fn get_all_comments(&self) -> Result<Vec<AdminCommentResponse>> {
        let comments: Vec<Comment> = self
            .db
            .query_all(
                &format!("{} comment ORDER BY created_at DESC", COMMENT_SELECT),
                json!({}),
            )
            .await?;

        let mut article_ids: Vec<&str> = comments.iter().map(|c| c.article_id.as_str()).collect();
        article_ids.sort();
        article_ids.dedup();

        let refs: Vec<ArticleRef> = if article_ids.is_empty() {
            Vec::new()
        } else {
            self.db
                .query_all(
                    "SELECT meta::id(id) AS id, title, slug FROM article WHERE meta::id(id) INSIDE $ids",
                    json!({ "ids": article_ids }),
                )
                .await?
        };
        let refs: HashMap<String, ArticleRef> = refs.into_iter().map(|r| (r.id.clone(), r)).collect();

        let responses = self.to_responses(comments).await?;
        Ok(responses
            .into_iter()
            .map(|comment| {
                let article = refs.get(&comment.article_id).cloned();
                AdminCommentResponse { comment, article }
            })
            .collect())
    }

    async fn to_responses(&self, comments: Vec<Comment>) -> Result<Vec<CommentResponse>> {
        let author_ids: Vec<String> = comments.iter().map(|c| c.author_id.clone()).collect();
        let authors = self.users.authors_by_ids(&author_ids).await?;

        Ok(comments
            .into_iter()
            .map(|comment| {
                let author = authors.get(&comment.author_id).cloned().unwrap_or_else(|| AuthorSummary {
                    id: comment.author_id.clone(),
                    ..Default::default()
                });
                CommentResponse::new(comment, author)
            })
            .collect())
    }

    async fn get_response(&self, comment_id: &str) -> Result<CommentResponse> {
        let comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;
        let author = self.users.author_summary(&comment.author_id).await?;
        Ok(CommentResponse::new(comment, author))
    }

    async fn get_managed(&self, comment_id: &str, user: &User) -> Result<Comment> {
        let comment = self
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if !comment.can_be_managed_by(&user.id, user.is_admin()) {
            return Err(AppError::forbidden("Not authorized to modify this comment"));
        }

        Ok(comment)
    }

    fn check_content(&self, content: &str) -> Result<String> {
        normalize_content(content, self.max_length).ok_or_else(|| {
            AppError::Validation(format!(
                "Comment must be between 1 and {} characters",
                self.max_length
            ))
        })
    }
}
