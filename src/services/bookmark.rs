use crate::{
    error::{AppError, Result},
    models::{article::ArticleStatus, bookmark::*, user::User},
    services::{ArticleService, Database},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct BookmarkService {
    db: Arc<Database>,
    articles: ArticleService,
}

#[derive(Debug, Deserialize)]
struct Removed {
    article_id: String,
}

impl BookmarkService {
    pub async fn new(db: Arc<Database>, articles: ArticleService) -> Result<Self> {
        Ok(Self { db, articles })
    }

    /// 切换收藏状态，返回切换后的状态。
    ///
    /// 草稿只有作者或管理员能收藏；已有的收藏总能取消。
    /// 并发插入由唯一索引拒绝，此时收藏已存在，按已收藏处理。
    pub async fn toggle_bookmark(&self, user: &User, article_id: &str) -> Result<bool> {
        let article = self
            .articles
            .get_article_by_id(article_id)
            .await?
            .ok_or_else(|| AppError::not_found("Article"))?;

        let params = json!({ "user_id": user.id, "article_id": article_id });

        let removed: Vec<Removed> = self
            .db
            .query_all(
                "DELETE bookmark WHERE user_id = $user_id AND article_id = $article_id RETURN BEFORE",
                params.clone(),
            )
            .await?;

        if let Some(bookmark) = removed.first() {
            info!("User {} removed bookmark on {}", user.id, bookmark.article_id);
            return Ok(false);
        }

        if !article.is_published() && !article.can_be_managed_by(&user.id, user.is_admin()) {
            return Err(AppError::not_found("Article"));
        }

        let mut params = params;
        params["id"] = json!(Uuid::new_v4().to_string());

        let created = self
            .db
            .query_with_params(
                r#"
                CREATE type::thing('bookmark', $id) SET
                    user_id = $user_id,
                    article_id = $article_id,
                    created_at = time::now()
                RETURN NONE
                "#,
                params,
            )
            .await;

        match created {
            Ok(_) => {
                info!("User {} bookmarked {}", user.id, article_id);
                Ok(true)
            }
            Err(e) if e.is_unique_violation() => {
                warn!("Duplicate bookmark for user {} on {} ignored", user.id, article_id);
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn is_bookmarked(&self, user: &User, article_id: &str) -> Result<bool> {
        let total = self
            .db
            .count(
                "SELECT count() AS total FROM bookmark WHERE user_id = $user_id AND article_id = $article_id GROUP ALL",
                json!({ "user_id": user.id, "article_id": article_id }),
            )
            .await?;
        Ok(total > 0)
    }

    /// 最新收藏在前；文章已不存在或对当前用户不可见的收藏被跳过
    pub async fn get_bookmarks(&self, user: &User) -> Result<Vec<BookmarkWithArticle>> {
        let bookmarks: Vec<Bookmark> = self
            .db
            .query_all(
                "SELECT *, meta::id(id) AS id FROM bookmark WHERE user_id = $user_id ORDER BY created_at DESC",
                json!({ "user_id": user.id }),
            )
            .await?;

        let article_ids: Vec<String> = bookmarks.iter().map(|b| b.article_id.clone()).collect();
        let mut articles = self.articles.get_responses_by_ids(&article_ids).await?;
        articles.retain(|a| {
            a.status == ArticleStatus::Published || a.author.id == user.id || user.is_admin()
        });

        let result: Vec<BookmarkWithArticle> = bookmarks
            .into_iter()
            .filter_map(|bookmark| {
                let index = articles.iter().position(|a| a.id == bookmark.article_id)?;
                Some(BookmarkWithArticle {
                    id: bookmark.id,
                    article: articles.swap_remove(index),
                    created_at: bookmark.created_at,
                })
            })
            .collect();

        debug!("User {} has {} bookmarks", user.id, result.len());
        Ok(result)
    }
}
