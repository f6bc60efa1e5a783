use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{debug, info};

use listpulse_core::error::{PulseError, Result};
use listpulse_core::metrics::check_listing_id;
use listpulse_core::{ListingId, ListingMetrics, MetricField};

use super::{store_err, Listing, MetricsStore, NewListing};
use crate::config::DatabaseSection;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price REAL NOT NULL DEFAULT 0,
        image_url TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS listing_metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        listing_id INTEGER NOT NULL UNIQUE REFERENCES listings(id) ON DELETE CASCADE,
        views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
        shares INTEGER NOT NULL DEFAULT 0 CHECK (shares >= 0),
        clicks INTEGER NOT NULL DEFAULT 0 CHECK (clicks >= 0),
        last_updated TEXT NOT NULL
    )
    "#,
];

const SELECT_METRICS: &str =
    "SELECT listing_id, views, shares, clicks, last_updated FROM listing_metrics WHERE listing_id = ?";

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the database named by `cfg` and ensure the schema exists.
    pub async fn connect(cfg: &DatabaseSection) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(&cfg.url)
            .map_err(store_err)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(cfg.busy_timeout());

        let mut pool_opts = SqlitePoolOptions::new();
        if cfg.is_memory() {
            // every connection to :memory: is a separate database
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            pool_opts = pool_opts.max_connections(cfg.max_connections);
        }

        let pool = pool_opts.connect_with(opts).await.map_err(store_err)?;
        info!(url = %cfg.url, "metrics store connected");
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and ensure the schema exists.
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await.map_err(store_err)?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn fetch_metrics(&self, id: ListingId) -> Result<Option<ListingMetrics>> {
        let row: Option<MetricsRow> = sqlx::query_as(SELECT_METRICS)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(ListingMetrics::try_from).transpose()
    }
}

// Fixed-width so that MAX() over the text column orders chronologically.
fn stamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PulseError::StoreFailure(format!("bad timestamp {s:?}: {e}")))
}

fn counter(v: i64, name: &str) -> Result<u64> {
    u64::try_from(v).map_err(|_| PulseError::StoreFailure(format!("negative {name} counter")))
}

#[derive(FromRow)]
struct MetricsRow {
    listing_id: i64,
    views: i64,
    shares: i64,
    clicks: i64,
    last_updated: String,
}

impl TryFrom<MetricsRow> for ListingMetrics {
    type Error = PulseError;

    fn try_from(r: MetricsRow) -> Result<Self> {
        Ok(ListingMetrics {
            listing_id: r.listing_id,
            views: counter(r.views, "views")?,
            shares: counter(r.shares, "shares")?,
            clicks: counter(r.clicks, "clicks")?,
            last_updated: parse_stamp(&r.last_updated)?,
        })
    }
}

#[derive(FromRow)]
struct ListingRow {
    id: i64,
    title: String,
    description: String,
    price: f64,
    image_url: String,
    created_at: String,
}

impl TryFrom<ListingRow> for Listing {
    type Error = PulseError;

    fn try_from(r: ListingRow) -> Result<Self> {
        Ok(Listing {
            id: r.id,
            title: r.title,
            description: r.description,
            price: r.price,
            image_url: r.image_url,
            created_at: parse_stamp(&r.created_at)?,
        })
    }
}

/// Upsert that creates the row with the first hit, or bumps one counter.
///
/// The `WHERE EXISTS` guard makes an unknown listing produce no row at all, so
/// the existence check, creation and increment commit as one statement.
fn increment_sql(field: MetricField) -> String {
    let col = field.column();
    format!(
        "INSERT INTO listing_metrics (listing_id, views, shares, clicks, last_updated) \
         SELECT ?1, ?2, ?3, ?4, ?5 WHERE EXISTS (SELECT 1 FROM listings WHERE id = ?1) \
         ON CONFLICT(listing_id) DO UPDATE SET \
             {col} = {col} + 1, \
             last_updated = MAX(last_updated, excluded.last_updated) \
         RETURNING listing_id, views, shares, clicks, last_updated"
    )
}

#[async_trait]
impl MetricsStore for SqliteStore {
    async fn listing_exists(&self, id: ListingId) -> Result<bool> {
        if id <= 0 {
            return Ok(false);
        }
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM listings WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn get_or_create(&self, id: ListingId) -> Result<ListingMetrics> {
        let id = check_listing_id(id)?;
        if let Some(m) = self.fetch_metrics(id).await? {
            return Ok(m);
        }

        let inserted = sqlx::query(
            "INSERT INTO listing_metrics (listing_id, views, shares, clicks, last_updated) \
             SELECT ?1, 0, 0, 0, ?2 WHERE EXISTS (SELECT 1 FROM listings WHERE id = ?1) \
             ON CONFLICT(listing_id) DO NOTHING",
        )
        .bind(id)
        .bind(stamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if inserted.rows_affected() > 0 {
            debug!(listing_id = id, "metrics record created");
        }

        self.fetch_metrics(id)
            .await?
            .ok_or_else(|| PulseError::listing_not_found(id))
    }

    async fn increment(&self, id: ListingId, field: MetricField) -> Result<ListingMetrics> {
        let id = check_listing_id(id)?;
        let first = |f: MetricField| i64::from(f == field);

        let row: Option<MetricsRow> = sqlx::query_as(&increment_sql(field))
            .bind(id)
            .bind(first(MetricField::Views))
            .bind(first(MetricField::Shares))
            .bind(first(MetricField::Clicks))
            .bind(stamp(Utc::now()))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.map(ListingMetrics::try_from)
            .transpose()?
            .ok_or_else(|| PulseError::listing_not_found(id))
    }

    async fn create_listing(&self, new: NewListing) -> Result<Listing> {
        new.validate()?;
        let now = stamp(Utc::now());

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let row: ListingRow = sqlx::query_as(
            "INSERT INTO listings (title, description, price, image_url, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING id, title, description, price, image_url, created_at",
        )
        .bind(new.title.trim())
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.image_url)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query(
            "INSERT INTO listing_metrics (listing_id, views, shares, clicks, last_updated) \
             VALUES (?, 0, 0, 0, ?)",
        )
        .bind(row.id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        info!(listing_id = row.id, "listing created");
        Listing::try_from(row)
    }

    async fn list_listings(&self) -> Result<Vec<Listing>> {
        let rows: Vec<ListingRow> = sqlx::query_as(
            "SELECT id, title, description, price, image_url, created_at \
             FROM listings ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter().map(Listing::try_from).collect()
    }
}
