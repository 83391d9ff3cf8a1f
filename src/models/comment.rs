use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use validator::Validate;

use crate::models::user::AuthorSummary;

/// 评论以扁平方式存储，`parent_id` 为空表示顶层评论
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub author_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn can_be_managed_by(&self, user_id: &str, is_admin: bool) -> bool {
        is_admin || self.author_id == user_id
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "Article id is required"))]
    pub article_id: String,
    pub parent_comment_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    pub article_id: String,
    pub parent_comment_id: Option<String>,
    pub author: AuthorSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn new(comment: Comment, author: AuthorSummary) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
            article_id: comment.article_id,
            parent_comment_id: comment.parent_id,
            author,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// 顶层评论及其直接回复
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub replies: Vec<CommentResponse>,
}

/// 管理后台的评论列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCommentResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub article: Option<ArticleRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRef {
    pub id: String,
    pub title: String,
    pub slug: String,
}

/// 两级评论树：顶层按创建时间倒序，回复按创建时间正序。
///
/// 父评论不在 `top_level` 中的回复会被丢弃。
pub fn assemble_thread(
    mut top_level: Vec<CommentResponse>,
    replies: Vec<CommentResponse>,
) -> Vec<CommentThread> {
    let mut by_parent: HashMap<String, Vec<CommentResponse>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_comment_id.clone() {
            by_parent.entry(parent_id).or_default().push(reply);
        }
    }

    top_level.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    top_level
        .into_iter()
        .map(|comment| {
            let mut replies = by_parent.remove(&comment.id).unwrap_or_default();
            replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            CommentThread { comment, replies }
        })
        .collect()
}

/// 去空白后检查长度，返回要保存的内容
pub fn normalize_content(content: &str, max_length: usize) -> Option<String> {
    let content = content.trim();
    let length = content.chars().count();
    if length == 0 || length > max_length {
        return None;
    }
    Some(content.to_string())
}
