use chrono::{DateTime, Utc};

use crate::grouping::{category_key, clean_category_label};
use crate::models::NewsItem;

pub const UNTITLED: &str = "Untitled Article";
pub const NO_SNIPPET: &str = "No description available.";
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Relative age label, truncated to whole minutes, hours or days.
/// Timestamps in the future count as zero minutes old.
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes().max(0);
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else {
        format!("{}d ago", days)
    }
}

/// "October 2026"
pub fn format_month(date: DateTime<Utc>) -> String {
    date.format("%B %Y").to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Display-ready fields for one news card.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub id: i64,
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub category: String,
    pub time_ago: String,
    /// Present only when the item links somewhere; templates render the
    /// link affordance and card click target from this alone.
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub image_alt: String,
}

impl ItemView {
    pub fn new(item: &NewsItem, now: DateTime<Utc>) -> Self {
        let title = non_blank(item.title.as_deref());

        Self {
            id: item.id,
            title: title.unwrap_or(UNTITLED).to_string(),
            snippet: non_blank(item.snippet.as_deref())
                .unwrap_or(NO_SNIPPET)
                .to_string(),
            source: non_blank(item.source.as_deref())
                .unwrap_or(UNKNOWN_SOURCE)
                .to_string(),
            category: clean_category_label(category_key(item)),
            time_ago: time_ago(item.created_at, now),
            url: non_blank(item.url.as_deref()).map(str::to_string),
            image_url: non_blank(item.image_url.as_deref()).map(str::to_string),
            image_alt: title.unwrap_or("News image").to_string(),
        }
    }

    pub fn has_link(&self) -> bool {
        self.url.is_some()
    }

    pub fn link(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    pub fn has_image(&self) -> bool {
        self.image_url.is_some()
    }

    pub fn image(&self) -> &str {
        self.image_url.as_deref().unwrap_or_default()
    }
}

pub fn item_views(items: &[NewsItem], now: DateTime<Utc>) -> Vec<ItemView> {
    items.iter().map(|item| ItemView::new(item, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn blank_item() -> NewsItem {
        NewsItem {
            id: 1,
            newsletter_id: None,
            title: None,
            snippet: None,
            category: None,
            source: None,
            url: None,
            image_url: None,
            created_at: now(),
        }
    }

    mod time_ago_tests {
        use super::*;

        fn ago(d: Duration) -> String {
            time_ago(now() - d, now())
        }

        #[test]
        fn test_minutes() {
            assert_eq!(ago(Duration::minutes(45)), "45m ago");
            assert_eq!(ago(Duration::minutes(59)), "59m ago");
        }

        #[test]
        fn test_zero() {
            assert_eq!(ago(Duration::zero()), "0m ago");
            assert_eq!(ago(Duration::seconds(59)), "0m ago");
        }

        #[test]
        fn test_hours_truncate() {
            assert_eq!(ago(Duration::minutes(60)), "1h ago");
            assert_eq!(ago(Duration::minutes(90)), "1h ago");
            assert_eq!(ago(Duration::minutes(23 * 60 + 59)), "23h ago");
        }

        #[test]
        fn test_days_truncate() {
            assert_eq!(ago(Duration::hours(24)), "1d ago");
            assert_eq!(ago(Duration::hours(30)), "1d ago");
            assert_eq!(ago(Duration::hours(24 * 9 + 23)), "9d ago");
        }

        #[test]
        fn test_future_counts_as_zero() {
            assert_eq!(time_ago(now() + Duration::hours(2), now()), "0m ago");
        }
    }

    mod item_view_tests {
        use super::*;

        #[test]
        fn test_missing_fields_use_defaults() {
            let view = ItemView::new(&blank_item(), now());
            assert_eq!(view.title, UNTITLED);
            assert_eq!(view.snippet, NO_SNIPPET);
            assert_eq!(view.source, UNKNOWN_SOURCE);
            assert_eq!(view.category, "General");
            assert_eq!(view.image_alt, "News image");
        }

        #[test]
        fn test_blank_strings_use_defaults() {
            let item = NewsItem {
                title: Some("   ".to_string()),
                source: Some(String::new()),
                ..blank_item()
            };
            let view = ItemView::new(&item, now());
            assert_eq!(view.title, UNTITLED);
            assert_eq!(view.source, UNKNOWN_SOURCE);
        }

        #[test]
        fn test_no_url_means_no_link() {
            let view = ItemView::new(&blank_item(), now());
            assert!(view.url.is_none());
            assert!(!view.has_link());
        }

        #[test]
        fn test_present_fields_pass_through() {
            let item = NewsItem {
                title: Some("Sparse attention".to_string()),
                snippet: Some("Faster transformers".to_string()),
                source: Some("arXiv".to_string()),
                category: Some("🔬 Research".to_string()),
                url: Some("https://arxiv.org/abs/2".to_string()),
                image_url: Some("https://img.example.com/x.png".to_string()),
                created_at: now() - Duration::minutes(90),
                ..blank_item()
            };

            let view = ItemView::new(&item, now());
            assert_eq!(view.title, "Sparse attention");
            assert_eq!(view.category, "Research");
            assert_eq!(view.time_ago, "1h ago");
            assert_eq!(view.image_alt, "Sparse attention");
            assert!(view.has_link());
        }
    }

    #[test]
    fn test_format_month() {
        assert_eq!(format_month(now()), "June 2025");
    }
}
