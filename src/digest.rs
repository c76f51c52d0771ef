//! Digest loading.
//!
//! A [`DigestStore`] is mounted once per page view and asks its
//! [`DigestSource`] for the current items exactly once. Sources are:
//!
//! * [`RemoteSource`] - a news-listing endpoint over HTTP,
//! * [`StaticSource`] - a per-date JSON file, cached for the rest of the day,
//! * [`DatabaseSource`] - the local database, for the all-in-one server.
//!
//! Every failure degrades to an empty digest; nothing here is fatal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{DigestConfig, DigestMode};
use crate::db::Database;
use crate::error::DigestError;
use crate::models::NewsItem;

/// Date key format for static digest files.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date used to address the static digest file.
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[async_trait]
pub trait DigestSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<NewsItem>, DigestError>;

    fn name(&self) -> &'static str;
}

pub struct RemoteSource {
    client: Client,
    url: String,
}

impl RemoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DigestError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("MLDigest/1.0")
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DigestSource for RemoteSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>, DigestError> {
        debug!("Fetching digest from {}", self.url);
        let items = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<NewsItem>>()
            .await?;
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Reads the raw digest for one date key.
#[async_trait]
pub trait DigestLoader: Send + Sync {
    async fn load(&self, date_key: &str) -> Result<Vec<NewsItem>, DigestError>;
}

/// Loads `<dir>/<YYYY-MM-DD>.json`.
pub struct FsLoader {
    dir: PathBuf,
}

impl FsLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, date_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", date_key))
    }
}

#[async_trait]
impl DigestLoader for FsLoader {
    async fn load(&self, date_key: &str) -> Result<Vec<NewsItem>, DigestError> {
        let path = self.path_for(date_key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DigestError::NotFound(date_key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

struct CachedDigest {
    date_key: String,
    items: Vec<NewsItem>,
}

/// Holds the digest for a single date. A load for a new date replaces the
/// previous entry wholesale.
#[derive(Default)]
pub struct DailyCache {
    entry: RwLock<Option<CachedDigest>>,
}

impl DailyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, date_key: &str) -> Option<Vec<NewsItem>> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|cached| cached.date_key == date_key)
            .map(|cached| cached.items.clone())
    }

    pub async fn put(&self, date_key: &str, items: Vec<NewsItem>) {
        let mut entry = self.entry.write().await;
        *entry = Some(CachedDigest {
            date_key: date_key.to_string(),
            items,
        });
    }

    pub async fn cached_key(&self) -> Option<String> {
        self.entry.read().await.as_ref().map(|c| c.date_key.clone())
    }
}

pub struct StaticSource {
    clock: Arc<dyn Clock>,
    loader: Arc<dyn DigestLoader>,
    cache: DailyCache,
}

impl StaticSource {
    pub fn new(clock: Arc<dyn Clock>, loader: Arc<dyn DigestLoader>) -> Self {
        Self {
            clock,
            loader,
            cache: DailyCache::new(),
        }
    }

    pub fn cache(&self) -> &DailyCache {
        &self.cache
    }
}

#[async_trait]
impl DigestSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>, DigestError> {
        let key = date_key(self.clock.today());

        if let Some(items) = self.cache.get(&key).await {
            debug!("Serving cached digest for {}", key);
            return Ok(items);
        }

        let items = self.loader.load(&key).await?;
        info!("Loaded {} digest items for {}", items.len(), key);
        self.cache.put(&key, items.clone()).await;
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct DatabaseSource {
    db: Arc<Database>,
    limit: i64,
}

impl DatabaseSource {
    pub fn new(db: Arc<Database>, limit: i64) -> Self {
        Self { db, limit }
    }
}

#[async_trait]
impl DigestSource for DatabaseSource {
    async fn fetch(&self) -> Result<Vec<NewsItem>, DigestError> {
        Ok(self.db.get_all_news(self.limit).await?)
    }

    fn name(&self) -> &'static str {
        "database"
    }
}

/// Builds the source selected by the deployment's `[digest]` table.
pub fn source_from_config(
    config: &DigestConfig,
    db: Arc<Database>,
    news_limit: i64,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn DigestSource>, DigestError> {
    let source: Arc<dyn DigestSource> = match config.mode {
        DigestMode::Database => Arc::new(DatabaseSource::new(db, news_limit)),
        DigestMode::Remote => {
            let url = config.news_url.clone().unwrap_or_default();
            Arc::new(RemoteSource::new(url, Duration::from_secs(config.timeout_secs))?)
        }
        DigestMode::Static => Arc::new(StaticSource::new(
            clock,
            Arc::new(FsLoader::new(&config.dir)),
        )),
    };
    info!("Digest source: {}", source.name());
    Ok(source)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Ready(Vec<NewsItem>),
}

/// The item set behind one page view.
pub struct DigestStore {
    source: Arc<dyn DigestSource>,
    state: LoadState,
}

impl DigestStore {
    pub fn mount(source: Arc<dyn DigestSource>) -> Self {
        Self {
            source,
            state: LoadState::Loading,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Issues the single read for this mount. Later calls are no-ops.
    pub async fn load(&mut self) {
        if !self.is_loading() {
            return;
        }

        let items = match self.source.fetch().await {
            Ok(items) => items,
            Err(DigestError::NotFound(key)) => {
                warn!("No {} digest published for {}", self.source.name(), key);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to load {} digest: {}", self.source.name(), e);
                Vec::new()
            }
        };

        self.state = LoadState::Ready(items);
    }

    /// Items currently loaded; empty while loading.
    pub fn list(&self) -> &[NewsItem] {
        match &self.state {
            LoadState::Loading => &[],
            LoadState::Ready(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<NewsItem> {
        match self.state {
            LoadState::Loading => Vec::new(),
            LoadState::Ready(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(id: i64, category: Option<&str>) -> NewsItem {
        NewsItem {
            id,
            newsletter_id: None,
            title: Some(format!("Item {}", id)),
            snippet: None,
            category: category.map(|c| c.to_string()),
            source: None,
            url: None,
            image_url: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    struct FixedClock {
        today: Mutex<NaiveDate>,
    }

    impl FixedClock {
        fn new(y: i32, m: u32, d: u32) -> Self {
            Self {
                today: Mutex::new(NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            }
        }

        fn advance_day(&self) {
            let mut today = self.today.lock().unwrap();
            *today = today.succ_opt().unwrap();
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.today().and_hms_opt(12, 0, 0).unwrap().and_utc()
        }

        fn today(&self) -> NaiveDate {
            *self.today.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct FakeLoader {
        calls: AtomicUsize,
        keys: Mutex<Vec<String>>,
        missing: bool,
    }

    #[async_trait]
    impl DigestLoader for FakeLoader {
        async fn load(&self, date_key: &str) -> Result<Vec<NewsItem>, DigestError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(date_key.to_string());
            if self.missing {
                return Err(DigestError::NotFound(date_key.to_string()));
            }
            Ok(vec![item(1, Some("Research")), item(2, None)])
        }
    }

    mod static_source_tests {
        use super::*;

        #[tokio::test]
        async fn test_loads_file_for_today() {
            let clock = Arc::new(FixedClock::new(2025, 3, 1));
            let loader = Arc::new(FakeLoader::default());
            let source = StaticSource::new(clock, loader.clone());

            let items = source.fetch().await.unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(*loader.keys.lock().unwrap(), vec!["2025-03-01"]);
        }

        #[tokio::test]
        async fn test_same_day_served_from_cache() {
            let clock = Arc::new(FixedClock::new(2025, 3, 1));
            let loader = Arc::new(FakeLoader::default());
            let source = StaticSource::new(clock, loader.clone());

            source.fetch().await.unwrap();
            source.fetch().await.unwrap();
            source.fetch().await.unwrap();

            assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_date_change_replaces_cache() {
            let clock = Arc::new(FixedClock::new(2025, 3, 1));
            let loader = Arc::new(FakeLoader::default());
            let source = StaticSource::new(clock.clone(), loader.clone());

            source.fetch().await.unwrap();
            clock.advance_day();
            source.fetch().await.unwrap();

            assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
            assert_eq!(
                source.cache().cached_key().await.as_deref(),
                Some("2025-03-02")
            );
        }

        #[tokio::test]
        async fn test_missing_file_not_cached() {
            let clock = Arc::new(FixedClock::new(2025, 3, 1));
            let loader = Arc::new(FakeLoader {
                missing: true,
                ..Default::default()
            });
            let source = StaticSource::new(clock, loader.clone());

            assert!(matches!(
                source.fetch().await,
                Err(DigestError::NotFound(ref k)) if k == "2025-03-01"
            ));
            assert!(source.fetch().await.is_err());
            assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
            assert!(source.cache().cached_key().await.is_none());
        }
    }

    mod fs_loader_tests {
        use super::*;

        #[tokio::test]
        async fn test_reads_dated_file() {
            let dir = tempfile::tempdir().unwrap();
            let json = serde_json::to_string(&vec![item(5, Some("Tools"))]).unwrap();
            std::fs::write(dir.path().join("2025-03-01.json"), json).unwrap();

            let loader = FsLoader::new(dir.path());
            let items = loader.load("2025-03-01").await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].id, 5);
        }

        #[tokio::test]
        async fn test_missing_file_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let loader = FsLoader::new(dir.path());

            let err = loader.load("2025-03-01").await.unwrap_err();
            assert!(matches!(err, DigestError::NotFound(_)));
        }

        #[tokio::test]
        async fn test_malformed_file_is_parse_error() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("2025-03-01.json"), "{not json").unwrap();

            let loader = FsLoader::new(dir.path());
            let err = loader.load("2025-03-01").await.unwrap_err();
            assert!(matches!(err, DigestError::Parse(_)));
        }
    }

    mod remote_source_tests {
        use super::*;

        #[tokio::test]
        async fn test_fetches_item_array() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/news"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(vec![item(1, Some("Research"))]),
                )
                .expect(1)
                .mount(&server)
                .await;

            let source = RemoteSource::new(
                format!("{}/api/news", server.uri()),
                Duration::from_secs(5),
            )
            .unwrap();

            let items = source.fetch().await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].category.as_deref(), Some("Research"));
        }

        #[tokio::test]
        async fn test_server_error_is_transport_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;

            let source = RemoteSource::new(server.uri(), Duration::from_secs(5)).unwrap();
            assert!(matches!(
                source.fetch().await,
                Err(DigestError::Transport(_))
            ));
        }
    }

    mod store_tests {
        use super::*;

        struct FailingSource;

        #[async_trait]
        impl DigestSource for FailingSource {
            async fn fetch(&self) -> Result<Vec<NewsItem>, DigestError> {
                Err(DigestError::Io(std::io::Error::other("boom")))
            }

            fn name(&self) -> &'static str {
                "failing"
            }
        }

        struct CountingSource {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl DigestSource for CountingSource {
            async fn fetch(&self) -> Result<Vec<NewsItem>, DigestError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![item(1, None)])
            }

            fn name(&self) -> &'static str {
                "counting"
            }
        }

        #[tokio::test]
        async fn test_loading_until_loaded() {
            let source = Arc::new(CountingSource {
                calls: AtomicUsize::new(0),
            });
            let mut store = DigestStore::mount(source);

            assert!(store.is_loading());
            assert!(store.list().is_empty());

            store.load().await;
            assert!(!store.is_loading());
            assert_eq!(store.list().len(), 1);
        }

        #[tokio::test]
        async fn test_single_read_per_mount() {
            let source = Arc::new(CountingSource {
                calls: AtomicUsize::new(0),
            });
            let mut store = DigestStore::mount(source.clone());

            store.load().await;
            store.load().await;
            assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn test_failure_degrades_to_empty() {
            let mut store = DigestStore::mount(Arc::new(FailingSource));
            store.load().await;

            assert_eq!(store.state(), &LoadState::Ready(Vec::new()));
            assert!(store.into_items().is_empty());
        }

        #[tokio::test]
        async fn test_missing_static_file_degrades_to_empty() {
            let clock = Arc::new(FixedClock::new(2025, 3, 1));
            let loader = Arc::new(FakeLoader {
                missing: true,
                ..Default::default()
            });
            let mut store = DigestStore::mount(Arc::new(StaticSource::new(clock, loader)));

            store.load().await;
            assert!(!store.is_loading());
            assert!(store.list().is_empty());
        }

        #[tokio::test]
        async fn test_database_source() {
            let db = Database::new("sqlite::memory:").await.unwrap();
            db.initialize().await.unwrap();
            db.create_news_item(&crate::models::NewNewsItem {
                title: Some("From the pool".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

            let mut store = DigestStore::mount(Arc::new(DatabaseSource::new(Arc::new(db), 50)));
            store.load().await;
            assert_eq!(store.list()[0].title.as_deref(), Some("From the pool"));
        }
    }

    #[tokio::test]
    async fn test_source_from_config_modes() {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(2025, 3, 1));

        let mut config = DigestConfig::default();
        let source = source_from_config(&config, db.clone(), 50, clock.clone()).unwrap();
        assert_eq!(source.name(), "database");

        config.mode = DigestMode::Static;
        let source = source_from_config(&config, db.clone(), 50, clock.clone()).unwrap();
        assert_eq!(source.name(), "static");

        config.mode = DigestMode::Remote;
        config.news_url = Some("http://localhost:5000/api/news".to_string());
        let source = source_from_config(&config, db, 50, clock).unwrap();
        assert_eq!(source.name(), "remote");
    }

    #[test]
    fn test_date_key_format() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(date_key(date), "2025-01-09");
    }
}
