use crate::{
    error::Result,
    models::keyword::{aggregate_keywords, KeywordCount},
    services::Database,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// 关键词统计；每次调用都从当前文章数据重新计算
#[derive(Clone)]
pub struct KeywordService {
    db: Arc<Database>,
    top_limit: usize,
}

impl KeywordService {
    pub async fn new(db: Arc<Database>, top_limit: usize) -> Result<Self> {
        Ok(Self { db, top_limit })
    }

    /// 全站已发布文章中出现最多的关键词
    pub async fn get_top_keywords(&self) -> Result<Vec<KeywordCount>> {
        let keyword_lists: Vec<Vec<String>> = self
            .db
            .query_all(
                "SELECT VALUE keywords FROM article WHERE status = 'published'",
                json!({}),
            )
            .await?;

        let stats = aggregate_keywords(keyword_lists, Some(self.top_limit));
        debug!("Computed {} top keywords", stats.len());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_top_keywords_ignore_drafts() {
        let db = Arc::new(Database::new(&Config::default()).await.unwrap());
        db.migrate().await.unwrap();

        db.query(
            r#"
            CREATE article SET slug = 'a', status = 'published', keywords = ['rust', 'web'];
            CREATE article SET slug = 'b', status = 'published', keywords = ['rust'];
            CREATE article SET slug = 'c', status = 'draft', keywords = ['web', 'web2'];
            "#,
        )
        .await
        .unwrap();

        let service = KeywordService::new(db, 1).await.unwrap();
        let top = service.get_top_keywords().await.unwrap();

        assert_eq!(top, vec![KeywordCount { keyword: "rust".to_string(), count: 2 }]);
    }
}
