use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{article::ArticleResponse, user::UserResponse};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: usize,
    pub total_articles: usize,
    pub total_comments: usize,
    pub recent_users: Vec<UserResponse>,
    pub recent_articles: Vec<ArticleResponse>,
    pub articles_per_day: Vec<DailyCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

/// 按 UTC 日期（YYYY-MM-DD）分桶计数，日期升序
pub fn count_per_day(timestamps: &[DateTime<Utc>]) -> Vec<DailyCount> {
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for at in timestamps {
        *buckets.entry(at.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect()
}
