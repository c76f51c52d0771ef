use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::debug;

use crate::error::{DbError, EMAIL_EXISTS};
use crate::models::{NewNewsItem, NewsItem, Subscriber, User};

pub type DbResult<T> = Result<T, DbError>;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_items (
                id INTEGER PRIMARY KEY,
                newsletter_id INTEGER,
                title TEXT,
                snippet TEXT,
                category TEXT,
                source TEXT,
                url TEXT,
                image_url TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_news_items_created
            ON news_items(created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_user(&self, username: &str, password: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password) VALUES (?, ?) RETURNING *",
        )
        .bind(username)
        .bind(password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_to_conflict(e, "Username already exists"))
    }

    pub async fn get_user(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_subscriber_by_email(&self, email: &str) -> DbResult<Option<Subscriber>> {
        let subscriber =
            sqlx::query_as::<_, Subscriber>("SELECT * FROM subscribers WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(subscriber)
    }

    /// Inserts a subscriber row. A second row for the same email is refused
    /// by the unique index and reported as a conflict.
    pub async fn create_subscriber(&self, email: &str) -> DbResult<Subscriber> {
        sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO subscribers (email, active, created_at)
            VALUES (?, 1, ?)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_to_conflict(e, EMAIL_EXISTS))
    }

    /// Registers a new email, rejecting (not upserting) duplicates.
    pub async fn add_subscriber(&self, email: &str) -> DbResult<Subscriber> {
        if self.get_subscriber_by_email(email).await?.is_some() {
            debug!("Rejecting duplicate subscriber {}", email);
            return Err(DbError::Conflict(EMAIL_EXISTS.to_string()));
        }
        self.create_subscriber(email).await
    }

    pub async fn active_emails(&self) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT email FROM subscribers WHERE active = 1 ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }

    pub async fn set_subscriber_active(&self, email: &str, active: bool) -> DbResult<bool> {
        let result = sqlx::query("UPDATE subscribers SET active = ? WHERE email = ?")
            .bind(active)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest items first, ties broken by id.
    pub async fn get_all_news(&self, limit: i64) -> DbResult<Vec<NewsItem>> {
        let items = sqlx::query_as::<_, NewsItem>(
            r#"
            SELECT * FROM news_items
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn create_news_item(&self, item: &NewNewsItem) -> DbResult<NewsItem> {
        let created_at = item.created_at.unwrap_or_else(Utc::now);

        let created = sqlx::query_as::<_, NewsItem>(
            r#"
            INSERT INTO news_items
                (newsletter_id, title, snippet, category, source, url, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(item.newsletter_id)
        .bind(&item.title)
        .bind(&item.snippet)
        .bind(&item.category)
        .bind(&item.source)
        .bind(&item.url)
        .bind(&item.image_url)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

fn unique_to_conflict(err: sqlx::Error, message: &str) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(message.to_string())
        }
        _ => DbError::Sqlx(err),
    }
}
