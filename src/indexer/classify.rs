//! Content type classification from URL path and title

use crate::store::ContentType;
use url::Url;

const HOMEPAGE_PATHS: &[&str] = &["", "/", "/index.html", "/index.htm", "/index.php", "/home"];
const CATEGORY_SEGMENTS: &[&str] = &["category", "categories", "tag", "tags", "collections"];
const PRODUCT_SEGMENTS: &[&str] = &[
    "product",
    "products",
    "item",
    "items",
    "shop",
    "catalogue",
    "catalog",
];
const DOCUMENTATION_SEGMENTS: &[&str] = &[
    "docs",
    "doc",
    "documentation",
    "manual",
    "guide",
    "guides",
    "api",
    "reference",
];
const ARTICLE_SEGMENTS: &[&str] = &["blog", "news", "article", "articles", "post", "posts"];

/// Classifies a page by its URL path and title
///
/// Rules, first match wins:
/// 1. `homepage`: root path or a root index page
/// 2. `category`: a category/tag path segment, or "category" in the title
/// 3. `documentation`: a docs/manual/api path segment, or "documentation" in the title
/// 4. `article`: a blog/news/post path segment, or a four-digit year segment
/// 5. `product`: a product/item/shop/catalogue path segment
/// 6. `other`
pub fn classify_content(url: &Url, title: &str) -> ContentType {
    let path = url.path().to_lowercase();
    let title = title.to_lowercase();

    if HOMEPAGE_PATHS.contains(&path.as_str()) {
        return ContentType::Homepage;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let has_segment = |names: &[&str]| segments.iter().any(|s| names.contains(s));

    if has_segment(CATEGORY_SEGMENTS) || title.contains("category") {
        ContentType::Category
    } else if has_segment(DOCUMENTATION_SEGMENTS) || title.contains("documentation") {
        ContentType::Documentation
    } else if has_segment(ARTICLE_SEGMENTS) || segments.iter().any(|s| is_year(s)) {
        ContentType::Article
    } else if has_segment(PRODUCT_SEGMENTS) {
        ContentType::Product
    } else {
        ContentType::Other
    }
}

fn is_year(segment: &str) -> bool {
    segment.len() == 4
        && segment.chars().all(|c| c.is_ascii_digit())
        && matches!(segment.as_bytes()[0], b'1' | b'2')
}
