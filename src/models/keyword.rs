use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

/// 统计关键词出现次数：按次数降序，次数相同按关键词升序；`limit` 为 None 时不截断
pub fn aggregate_keywords<I>(keyword_lists: I, limit: Option<usize>) -> Vec<KeywordCount>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for keywords in keyword_lists {
        for keyword in keywords {
            *counts.entry(keyword).or_insert(0) += 1;
        }
    }

    let mut stats: Vec<KeywordCount> = counts
        .into_iter()
        .map(|(keyword, count)| KeywordCount { keyword, count })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));

    if let Some(limit) = limit {
        stats.truncate(limit);
    }

    stats
}
