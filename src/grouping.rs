use std::sync::LazyLock;

use regex::Regex;

use crate::models::NewsItem;

pub const DEFAULT_CATEGORY: &str = "General";

/// Leading decorative symbols such as emoji or bullets.
static LEADING_SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\w\s]+").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: String,
    pub items: Vec<NewsItem>,
}

impl Bucket {
    pub fn label(&self) -> String {
        clean_category_label(&self.key)
    }
}

/// Buckets in first-appearance order of their keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets(Vec<Bucket>);

impl Buckets {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[NewsItem]> {
        self.0
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.items.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|b| b.key.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket> {
        self.0.iter()
    }

    pub fn at(&self, index: usize) -> Option<&Bucket> {
        self.0.get(index)
    }
}

impl<'a> IntoIterator for &'a Buckets {
    type Item = &'a Bucket;
    type IntoIter = std::slice::Iter<'a, Bucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

pub fn category_key(item: &NewsItem) -> &str {
    match item.category.as_deref() {
        Some(category) if !category.is_empty() => category,
        _ => DEFAULT_CATEGORY,
    }
}

/// Partitions items by category, keeping input order inside each bucket.
/// An empty input yields no buckets.
pub fn group_by_category(items: &[NewsItem]) -> Buckets {
    let mut buckets: Vec<Bucket> = Vec::new();

    for item in items {
        let key = category_key(item);
        match buckets.iter_mut().find(|b| b.key == key) {
            Some(bucket) => bucket.items.push(item.clone()),
            None => buckets.push(Bucket {
                key: key.to_string(),
                items: vec![item.clone()],
            }),
        }
    }

    Buckets(buckets)
}

pub fn clean_category_label(raw: &str) -> String {
    let cleaned = LEADING_SYMBOLS.replace(raw, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        raw.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Slug used for tab ids: lowercase, anything outside `[a-z0-9]` becomes `-`.
pub fn category_slug(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect()
}
