use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};

static VALID_SLUG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid slug regex"));

/// 上一次发放的唯一性令牌（毫秒时间戳，严格递增）
static LAST_TOKEN: AtomicU64 = AtomicU64::new(0);

const MAX_BASE_LENGTH: usize = 80;

/// 从标题生成 URL 友好的 slug（转写为 ASCII 并小写）
pub fn generate_slug(title: &str) -> String {
    let mut slug = slug::slugify(title);

    // 限制长度，尽量在连字符处截断
    if slug.len() > MAX_BASE_LENGTH {
        slug.truncate(MAX_BASE_LENGTH);
        if let Some(last_hyphen) = slug.rfind('-') {
            if last_hyphen > MAX_BASE_LENGTH / 2 {
                slug.truncate(last_hyphen);
            }
        }
        slug = slug.trim_matches('-').to_string();
    }

    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    slug
}

/// 标题 slug 加上 base36 时间戳令牌，例如 `hello-world-lq2x9k1c`
pub fn generate_unique_slug(title: &str) -> String {
    format!("{}-{}", generate_slug(title), to_base36(next_token()))
}

/// 当前毫秒时间戳；同一毫秒内的多次调用依次加一，保证进程内不重复
fn next_token() -> u64 {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let previous = LAST_TOKEN
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(previous + 1)
}

pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::new();
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// 验证 slug 格式是否正确
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && VALID_SLUG_REGEX.is_match(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("JavaScript: The Good Parts"), "javascript-the-good-parts");
        assert_eq!(generate_slug("Hello, World! How are you?"), "hello-world-how-are-you");
        assert_eq!(generate_slug("Crème Brûlée"), "creme-brulee");
        assert_eq!(generate_slug(""), "untitled");
        assert_eq!(generate_slug("   "), "untitled");
        assert_eq!(generate_slug("---"), "untitled");
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let slug = generate_slug(&"word ".repeat(50));
        assert!(slug.len() <= MAX_BASE_LENGTH);
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_unique_slugs_for_identical_titles() {
        let first = generate_unique_slug("Hello World");
        let second = generate_unique_slug("Hello World");

        assert!(first.starts_with("hello-world-"));
        assert!(second.starts_with("hello-world-"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("hello-world"));
        assert!(is_valid_slug("hello123"));

        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("-hello"));
        assert!(!is_valid_slug("hello-"));
        assert!(!is_valid_slug("hello--world"));
        assert!(!is_valid_slug("hello world"));
        assert!(!is_valid_slug("Hello"));
    }

    proptest! {
        #[test]
        fn unique_slugs_are_url_safe(title in "\\PC{0,120}") {
            let slug = generate_unique_slug(&title);
            prop_assert!(is_valid_slug(&slug), "invalid slug {:?} for {:?}", slug, title);
        }
    }
}
