use ammonia::Builder;
use maplit::{hashmap, hashset};
use once_cell::sync::Lazy;
use regex::Regex;

/// 每分钟阅读的单词数
pub const WORDS_PER_MINUTE: usize = 200;

/// 自动摘要的最大字符数
pub const EXCERPT_LENGTH: usize = 160;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// 富文本内容处理：清理 HTML、提取纯文本、计算阅读时间与摘要
#[derive(Clone)]
pub struct ContentProcessor {}

impl Default for ContentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentProcessor {
    pub fn new() -> Self {
        Self {}
    }

    fn get_sanitizer() -> Builder<'static> {
        let mut sanitizer = Builder::default();

        sanitizer.tags(hashset![
            "h1", "h2", "h3", "h4", "h5", "h6",
            "p", "br", "hr",
            "strong", "b", "em", "i", "u", "s", "code",
            "pre", "blockquote",
            "ul", "ol", "li",
            "a", "img",
            "table", "thead", "tbody", "tr", "th", "td",
            "div", "span",
            "sup", "sub"
        ]);

        sanitizer.tag_attributes(hashmap![
            "a" => hashset!["href", "title", "target"],
            "img" => hashset!["src", "alt", "title", "width", "height"],
            "pre" => hashset!["class"],
            "code" => hashset!["class"],
            "div" => hashset!["class"],
            "span" => hashset!["class"],
        ]);

        sanitizer
    }

    /// 清理用户提交的 HTML，仅保留编辑器会产生的标签
    pub fn sanitize(&self, html: &str) -> String {
        Self::get_sanitizer().clean(html).to_string()
    }

    /// 去掉所有标签，得到纯文本
    pub fn to_text(&self, html: &str) -> String {
        TAG_REGEX.replace_all(html, "").into_owned()
    }

    pub fn count_words(&self, html: &str) -> usize {
        self.to_text(html).split_whitespace().count()
    }

    /// ceil(单词数 / 200)，至少 1 分钟
    pub fn estimate_reading_time(&self, html: &str) -> u32 {
        let words = self.count_words(html);
        let minutes = (words + WORDS_PER_MINUTE - 1) / WORDS_PER_MINUTE;
        minutes.max(1) as u32
    }

    /// 纯文本的前 160 个字符，被截断时追加省略号
    pub fn generate_excerpt(&self, html: &str) -> String {
        let text = self.to_text(html);

        if text.chars().count() <= EXCERPT_LENGTH {
            return text;
        }

        let mut excerpt: String = text.chars().take(EXCERPT_LENGTH).collect();
        excerpt.push_str("...");
        excerpt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_text_strips_tags() {
        let processor = ContentProcessor::new();
        assert_eq!(
            processor.to_text("<p>The <strong>quick</strong> brown fox</p>"),
            "The quick brown fox"
        );
    }

    #[test]
    fn test_reading_time() {
        let processor = ContentProcessor::new();
        let words = vec!["word"; 250].join(" ");

        assert_eq!(processor.estimate_reading_time(""), 1);
        assert_eq!(processor.estimate_reading_time("<p></p>"), 1);
        assert_eq!(processor.estimate_reading_time(&format!("<p>{}</p>", words)), 2);

        let exact = vec!["word"; 400].join(" ");
        assert_eq!(processor.estimate_reading_time(&exact), 2);
        let over = vec!["word"; 401].join(" ");
        assert_eq!(processor.estimate_reading_time(&over), 3);
    }

    #[test]
    fn test_generate_excerpt() {
        let processor = ContentProcessor::new();
        assert_eq!(processor.generate_excerpt("<p>short</p>"), "short");

        let long = "a".repeat(200);
        let excerpt = processor.generate_excerpt(&format!("<p>{}</p>", long));
        assert_eq!(excerpt.chars().count(), EXCERPT_LENGTH + 3);
        assert!(excerpt.ends_with("..."));

        let exactly = "é".repeat(EXCERPT_LENGTH);
        assert_eq!(processor.generate_excerpt(&exactly), exactly);
    }

    #[test]
    fn test_sanitize_removes_scripts() {
        let processor = ContentProcessor::new();
        let cleaned = processor.sanitize("<p>hello</p><script>alert(1)</script>");
        assert_eq!(cleaned, "<p>hello</p>");
    }

    proptest! {
        #[test]
        fn reading_time_matches_word_count(words in proptest::collection::vec("[a-z]{1,8}", 0..1000)) {
            let processor = ContentProcessor::new();
            let html = format!("<p>{}</p>", words.join(" "));
            let expected = std::cmp::max(1, (words.len() + 199) / 200) as u32;

            prop_assert_eq!(processor.estimate_reading_time(&html), expected);
            prop_assert_eq!(processor.estimate_reading_time(&html), processor.estimate_reading_time(&html));
        }
    }
}
