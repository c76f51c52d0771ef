//! Tab selection over category buckets, with swipe and drag navigation.

use std::str::FromStr;

use crate::grouping::{category_slug, clean_category_label, Buckets};

pub const SPOTLIGHT_LABEL: &str = "Spotlight";
pub const SPOTLIGHT_ID: &str = "spotlight";

/// Minimum horizontal displacement, in logical pixels, for a gesture to
/// change tabs.
pub const SWIPE_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub enum TabKind {
    /// All items across categories.
    Spotlight,
    /// Items of one bucket, by raw category key.
    Category(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub id: String,
    pub label: String,
    pub kind: TabKind,
}

impl Tab {
    fn spotlight() -> Self {
        Self {
            id: SPOTLIGHT_ID.to_string(),
            label: SPOTLIGHT_LABEL.to_string(),
            kind: TabKind::Spotlight,
        }
    }

    fn category(key: &str) -> Self {
        Self {
            id: format!("category-{}", category_slug(key)),
            label: clean_category_label(key),
            kind: TabKind::Category(key.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Next,
    Prev,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabController {
    tabs: Vec<Tab>,
    with_spotlight: bool,
    selected: Option<usize>,
    scroll_top: u32,
}

impl TabController {
    pub fn new(buckets: &Buckets, with_spotlight: bool) -> Self {
        let mut controller = Self {
            tabs: Vec::new(),
            with_spotlight,
            selected: None,
            scroll_top: 0,
        };
        controller.set_buckets(buckets);
        controller
    }

    /// Rebuilds the tabs for a new item set, keeping the selection in range.
    /// The Spotlight tab is only shown when there is something to show.
    pub fn set_buckets(&mut self, buckets: &Buckets) {
        let mut tabs = Vec::with_capacity(buckets.len() + 1);
        if self.with_spotlight && !buckets.is_empty() {
            tabs.push(Tab::spotlight());
        }
        tabs.extend(buckets.keys().map(Tab::category));
        self.tabs = tabs;

        self.selected = match (self.tabs.len(), self.selected) {
            (0, _) => None,
            (len, Some(i)) => Some(i.min(len - 1)),
            (_, None) => Some(0),
        };
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn categories(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_tab(&self) -> Option<&Tab> {
        self.selected.and_then(|i| self.tabs.get(i))
    }

    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    pub fn scroll_to(&mut self, offset: u32) {
        self.scroll_top = offset;
    }

    /// Selects tab `index`, clamping past-the-end requests to the last tab.
    /// Returns the index actually selected.
    pub fn select_tab(&mut self, index: usize) -> Option<usize> {
        if self.tabs.is_empty() {
            return None;
        }
        let index = index.min(self.tabs.len() - 1);
        self.selected = Some(index);
        self.scroll_top = 0;
        self.selected
    }

    pub fn next(&mut self) -> Option<usize> {
        let current = self.selected?;
        self.select_tab(current + 1)
    }

    pub fn prev(&mut self) -> Option<usize> {
        let current = self.selected?;
        self.select_tab(current.saturating_sub(1))
    }

    pub fn can_next(&self) -> bool {
        matches!(self.selected, Some(i) if i + 1 < self.tabs.len())
    }

    pub fn can_prev(&self) -> bool {
        matches!(self.selected, Some(i) if i > 0)
    }

    pub fn apply(&mut self, swipe: Swipe) -> Option<usize> {
        match swipe {
            Swipe::Next => self.next(),
            Swipe::Prev => self.prev(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modality {
    /// Commits on release.
    #[default]
    Touch,
    /// Commits as soon as the threshold is crossed.
    Mouse,
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "touch" => Ok(Modality::Touch),
            "mouse" => Ok(Modality::Mouse),
            other => Err(format!("unknown input modality: {}", other)),
        }
    }
}

/// Tracks one horizontal gesture from press to release.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureTracker {
    modality: Modality,
    start: Option<f64>,
    current: Option<f64>,
}

impl GestureTracker {
    pub fn new(modality: Modality) -> Self {
        Self {
            modality,
            start: None,
            current: None,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.start.is_some()
    }

    pub fn press(&mut self, x: f64) {
        self.start = Some(x);
        self.current = None;
    }

    pub fn move_to(&mut self, x: f64) -> Option<Swipe> {
        let start = self.start?;
        self.current = Some(x);

        match self.modality {
            Modality::Touch => None,
            Modality::Mouse => {
                let swipe = classify(start - x);
                if swipe.is_some() {
                    self.reset();
                }
                swipe
            }
        }
    }

    pub fn release(&mut self) -> Option<Swipe> {
        let swipe = match (self.modality, self.start, self.current) {
            (Modality::Touch, Some(start), Some(end)) => classify(start - end),
            _ => None,
        };
        self.reset();
        swipe
    }

    /// Pointer left the surface; drop the gesture without committing.
    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.start = None;
        self.current = None;
    }
}

/// Positive distance means the pointer moved left.
fn classify(distance: f64) -> Option<Swipe> {
    if distance > SWIPE_THRESHOLD {
        Some(Swipe::Next)
    } else if distance < -SWIPE_THRESHOLD {
        Some(Swipe::Prev)
    } else {
        None
    }
}
