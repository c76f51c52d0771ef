use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::debug;

use crate::api;
use crate::carousel::Carousel;
use crate::db::Database;
use crate::digest::{Clock, DigestSource, DigestStore};
use crate::grouping::{clean_category_label, group_by_category, Buckets};
use crate::models::NewsItem;
use crate::render::{format_month, item_views, ItemView};
use crate::subscribe::{SubscriberApi, SubscriptionSubmitter};
use crate::tabs::{GestureTracker, Modality, Swipe, TabController, TabKind, SWIPE_THRESHOLD};

/// Items shown on the Spotlight tab.
const SPOTLIGHT_ITEMS: usize = 6;
/// Inertia frames simulated per carousel request.
const CAROUSEL_FRAMES: usize = 600;

pub struct AppState {
    pub db: Arc<Database>,
    pub digest: Arc<dyn DigestSource>,
    pub clock: Arc<dyn Clock>,
    pub news_limit: i64,
}

pub fn app(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/subscribe", post(subscribe))
        .route("/spaces", get(spaces))
        .route("/digest", get(digest))
        .route("/carousel", get(carousel))
        .route("/api/subscribers", post(api::create_subscriber))
        .route("/api/news", get(api::list_news).post(api::create_news))
        .route("/api/health", get(api::health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub form: FormView,
}

/// Subscription form as rendered, flattened from the submitter state.
pub struct FormView {
    pub email: String,
    pub submitted: bool,
    pub error: String,
    pub toast_title: String,
    pub toast_description: String,
    pub toast_destructive: bool,
}

impl FormView {
    fn blank() -> Self {
        Self {
            email: String::new(),
            submitted: false,
            error: String::new(),
            toast_title: String::new(),
            toast_description: String::new(),
            toast_destructive: false,
        }
    }

    fn from_submitter<A: SubscriberApi>(submitter: &SubscriptionSubmitter<A>, email: &str) -> Self {
        let mut view = Self::blank();
        view.email = email.to_string();
        view.submitted = submitter.is_submitted();
        view.error = submitter.error().unwrap_or_default().to_string();
        if let Some(toast) = submitter.toast() {
            view.toast_title = toast.title.clone();
            view.toast_description = toast.description.clone();
            view.toast_destructive = toast.destructive;
        }
        view
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn has_toast(&self) -> bool {
        !self.toast_title.is_empty()
    }
}

pub struct TabLink {
    pub id: String,
    pub label: String,
    pub active: bool,
}

pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

#[derive(Template)]
#[template(path = "spaces.html")]
pub struct SpacesTemplate {
    pub empty: bool,
    pub tabs: Vec<TabLink>,
    pub spotlight: bool,
    pub heading: String,
    pub items: Vec<ItemView>,
    pub overview: Vec<CategoryCount>,
}

#[derive(Template)]
#[template(path = "digest.html")]
pub struct DigestTemplate {
    pub empty: bool,
    pub tabs: Vec<TabLink>,
    pub tab: usize,
    pub category: String,
    pub month: String,
    /// 1-based position of the item in view; updated client-side on scroll.
    pub position: usize,
    pub total: usize,
    /// Gestures shorter than this are not reported back.
    pub threshold: f64,
    pub has_prev: bool,
    pub has_next: bool,
    pub items: Vec<ItemView>,
}

pub struct CarouselCard {
    pub item: ItemView,
    pub style: String,
    pub visible: bool,
    pub interactive: bool,
}

#[derive(Template)]
#[template(path = "carousel.html")]
pub struct CarouselTemplate {
    pub empty: bool,
    pub rotation: String,
    pub cards: Vec<CarouselCard>,
    /// Rotations one card step either way.
    pub rotate_left: String,
    pub rotate_right: String,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// One digest read per page view; failures already degrade to empty.
async fn load_items(state: &AppState) -> Vec<NewsItem> {
    let mut store = DigestStore::mount(state.digest.clone());
    store.load().await;
    store.into_items()
}

fn tab_links(tabs: &TabController) -> Vec<TabLink> {
    tabs.tabs()
        .iter()
        .enumerate()
        .map(|(index, tab)| TabLink {
            id: tab.id.clone(),
            label: tab.label.clone(),
            active: tabs.selected_index() == Some(index),
        })
        .collect()
}

/// Raw page query. Handlers read it leniently so a malformed value falls
/// back to its default instead of rejecting the request.
type Params = HashMap<String, String>;

fn param<T: FromStr>(params: &Params, name: &str) -> Option<T> {
    params.get(name).and_then(|value| value.trim().parse().ok())
}

fn finite_param(params: &Params, name: &str) -> Option<f64> {
    param::<f64>(params, name).filter(|value| value.is_finite())
}

/// Negative or unparseable tabs select the first tab; large ones are
/// clamped by the controller.
fn tab_param(params: &Params) -> usize {
    param::<i64>(params, "tab").map_or(0, |tab| usize::try_from(tab).unwrap_or(0))
}

fn bucket_items(buckets: &Buckets, key: &str) -> Vec<NewsItem> {
    buckets.get(key).map(<[NewsItem]>::to_vec).unwrap_or_default()
}

// Route handlers
pub async fn index() -> impl IntoResponse {
    HtmlTemplate(IndexTemplate {
        form: FormView::blank(),
    })
}

#[derive(Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub email: String,
    /// Set by the rendered success state so a replayed post is ignored.
    #[serde(default)]
    pub submitted: bool,
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SubscribeForm>,
) -> impl IntoResponse {
    let mut submitter = if form.submitted {
        SubscriptionSubmitter::submitted(state.db.clone())
    } else {
        SubscriptionSubmitter::new(state.db.clone())
    };

    if let Err(e) = submitter.submit(&form.email).await {
        debug!("Subscription not completed: {}", e);
    }

    HtmlTemplate(IndexTemplate {
        form: FormView::from_submitter(&submitter, &form.email),
    })
}

pub async fn spaces(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> impl IntoResponse {
    let items = load_items(&state).await;
    let buckets = group_by_category(&items);
    let mut tabs = TabController::new(&buckets, true);
    tabs.select_tab(tab_param(&params));

    let now = state.clock.now();
    let (spotlight, heading, shown) = match tabs.selected_tab().map(|t| &t.kind) {
        Some(TabKind::Category(key)) => (
            false,
            clean_category_label(key),
            bucket_items(&buckets, key),
        ),
        _ => (
            true,
            "Latest from all categories".to_string(),
            items.iter().take(SPOTLIGHT_ITEMS).cloned().collect(),
        ),
    };

    let overview = buckets
        .iter()
        .map(|bucket| CategoryCount {
            label: bucket.label(),
            count: bucket.items.len(),
        })
        .collect();

    HtmlTemplate(SpacesTemplate {
        empty: items.is_empty(),
        tabs: tab_links(&tabs),
        spotlight,
        heading,
        items: item_views(&shown, now),
        overview,
    })
}

#[derive(Debug, Default, PartialEq)]
pub struct DigestQuery {
    pub tab: usize,
    /// Pointer x where a gesture began.
    pub start: Option<f64>,
    /// Pointer x where it ended.
    pub end: Option<f64>,
    pub input: Modality,
}

impl DigestQuery {
    fn from_params(params: &Params) -> Self {
        Self {
            tab: tab_param(params),
            start: finite_param(params, "start"),
            end: finite_param(params, "end"),
            input: param(params, "input").unwrap_or_default(),
        }
    }

    /// Replays a completed gesture through the tracker for its input kind.
    fn swipe(&self) -> Option<Swipe> {
        let (start, end) = (self.start?, self.end?);
        let mut tracker = GestureTracker::new(self.input);
        tracker.press(start);
        tracker.move_to(end).or_else(|| tracker.release())
    }
}

pub async fn digest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> impl IntoResponse {
    let query = DigestQuery::from_params(&params);
    let items = load_items(&state).await;
    let buckets = group_by_category(&items);
    let mut tabs = TabController::new(&buckets, false);
    tabs.select_tab(query.tab);
    if let Some(swipe) = query.swipe() {
        tabs.apply(swipe);
    }

    let now = state.clock.now();
    let tab = tabs.selected_index().unwrap_or_default();
    let (category, shown) = match tabs.selected_tab().map(|t| &t.kind) {
        Some(TabKind::Category(key)) => (clean_category_label(key), bucket_items(&buckets, key)),
        _ => (String::new(), Vec::new()),
    };

    let month = format_month(shown.first().map(|item| item.created_at).unwrap_or(now));

    HtmlTemplate(DigestTemplate {
        empty: items.is_empty(),
        tabs: tab_links(&tabs),
        tab,
        category,
        month,
        position: usize::from(!shown.is_empty()),
        total: shown.len(),
        threshold: SWIPE_THRESHOLD,
        has_prev: tabs.can_prev(),
        has_next: tabs.can_next(),
        items: item_views(&shown, now),
    })
}

#[derive(Debug, Default, PartialEq)]
pub struct CarouselQuery {
    pub rotation: f64,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl CarouselQuery {
    fn from_params(params: &Params) -> Self {
        Self {
            rotation: finite_param(params, "rotation").unwrap_or_default(),
            start: finite_param(params, "start"),
            end: finite_param(params, "end"),
        }
    }
}

pub async fn carousel(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> impl IntoResponse {
    let query = CarouselQuery::from_params(&params);
    let items = load_items(&state).await;

    let mut ring = Carousel::new(items.len()).with_rotation(query.rotation);
    if let (Some(start), Some(end)) = (query.start, query.end) {
        ring.press(start);
        ring.drag_to(end);
        ring.release();
        ring.settle(CAROUSEL_FRAMES);
    }

    let now = state.clock.now();
    let cards = ring
        .placements()
        .into_iter()
        .zip(item_views(&items, now))
        .map(|(placement, item)| CarouselCard {
            item,
            style: format!(
                "transform: translate3d({:.1}px, 0px, {:.1}px) rotateY({:.4}rad) scale({:.3}); opacity: {:.2}; z-index: {}; pointer-events: {}",
                placement.x,
                placement.z,
                -ring.rotation(),
                placement.scale,
                placement.opacity,
                placement.z_index,
                if placement.interactive { "auto" } else { "none" },
            ),
            visible: placement.visible,
            interactive: placement.interactive,
        })
        .collect();

    let step = if items.is_empty() {
        0.0
    } else {
        2.0 * PI / items.len() as f64
    };

    HtmlTemplate(CarouselTemplate {
        empty: items.is_empty(),
        rotation: format!("{:.4}", ring.rotation()),
        cards,
        rotate_left: format!("{:.4}", ring.rotation() + step),
        rotate_right: format!("{:.4}", ring.rotation() - step),
    })
}
