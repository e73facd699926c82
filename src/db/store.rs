use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, types::ToSql, OptionalExtension, Row};
use tokio_rusqlite::Connection;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::StorageResult;
use crate::models::article::{format_datetime, parse_datetime};
use crate::models::{Article, ArticleFlag, ArticleId, ArticleQuery, NewArticle};

use super::schema::SCHEMA;

const ARTICLE_COLUMNS: &str = "id, title, description, content, author, source, url, image_url, \
                               published_at, category, is_bookmarked, is_saved_offline";

// Newest first; rowid keeps equal timestamps in insertion order.
const LISTING_ORDER: &str = " ORDER BY published_at DESC, id ASC";

/// What to read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Listing {
    Filter(ArticleQuery),
    Text(String),
}

/// Per-record outcome counts for a batch ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Durable article storage. All calls run on one SQLite connection thread,
/// so writes are serialized and every call sees a consistent snapshot.
#[derive(Clone)]
pub struct ArticleStore {
    conn: Connection,
}

impl ArticleStore {
    pub async fn open(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> StorageResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Ingest

    /// Insert `article` unless a record with the same url exists.
    /// Returns whether a row was inserted.
    pub async fn upsert_if_absent(&self, article: NewArticle) -> StorageResult<bool> {
        let inserted = self
            .conn
            .call(move |conn| Ok(insert_if_absent(conn, &article)?))
            .await?;
        Ok(inserted)
    }

    /// Ingest a batch record by record. A failing record is logged and
    /// counted; the rest of the batch is still attempted.
    pub async fn ingest(&self, articles: Vec<NewArticle>) -> StorageResult<IngestReport> {
        let report = self
            .conn
            .call(move |conn| Ok(ingest_batch(conn, &articles)?))
            .await?;
        Ok(report)
    }

    /// Ingest a batch and read `listing` back within one storage call, so no
    /// reader can observe a partially ingested batch in between.
    pub async fn ingest_then_list(
        &self,
        articles: Vec<NewArticle>,
        listing: Listing,
    ) -> StorageResult<(IngestReport, Vec<Article>)> {
        let result = self
            .conn
            .call(move |conn| {
                let report = ingest_batch(conn, &articles)?;
                let rows = select_listing(conn, &listing)?;
                Ok((report, rows))
            })
            .await?;
        Ok(result)
    }

    // Reads

    pub async fn query(&self, filter: ArticleQuery) -> StorageResult<Vec<Article>> {
        self.list(Listing::Filter(filter)).await
    }

    /// Substring match on title or description, ignoring case and
    /// diacritics. An empty query matches nothing.
    pub async fn search_text(&self, query: &str) -> StorageResult<Vec<Article>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.list(Listing::Text(query.to_string())).await
    }

    pub async fn list(&self, listing: Listing) -> StorageResult<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| Ok(select_listing(conn, &listing)?))
            .await?;
        Ok(articles)
    }

    pub async fn get(&self, id: ArticleId) -> StorageResult<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM articles WHERE id = ?1", ARTICLE_COLUMNS);
                let article = conn
                    .query_row(&sql, params![id.0], article_from_row)
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn count(&self) -> StorageResult<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    // Mutations

    /// Flip `flag` on the article and return its new value.
    /// An unknown id is a no-op and yields `None`: the record may have been
    /// evicted in the meantime.
    pub async fn toggle_flag(&self, id: ArticleId, flag: ArticleFlag) -> StorageResult<Option<bool>> {
        let column = flag.column();
        let value = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "UPDATE articles SET {col} = NOT {col} WHERE id = ?1 RETURNING {col}",
                    col = column
                );
                let value = conn
                    .query_row(&sql, params![id.0], |row| row.get::<_, bool>(0))
                    .optional()?;
                Ok(value)
            })
            .await?;

        if value.is_none() {
            tracing::debug!("Ignoring {:?} toggle for unknown article {}", flag, id);
        }
        Ok(value)
    }

    /// Remove unpinned articles published more than `max_age` ago.
    pub async fn evict_older_than(&self, max_age: Duration) -> StorageResult<usize> {
        self.evict_before(Utc::now() - max_age).await
    }

    /// Remove unpinned articles published strictly before `cutoff`.
    pub async fn evict_before(&self, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let bound = format_datetime(&cutoff);
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    r#"DELETE FROM articles
                       WHERE published_at < ?1
                         AND is_bookmarked = 0
                         AND is_saved_offline = 0"#,
                    params![bound],
                )?;
                Ok(removed)
            })
            .await?;

        tracing::info!("Evicted {} articles published before {}", removed, cutoff);
        Ok(removed)
    }
}

fn insert_if_absent(conn: &rusqlite::Connection, article: &NewArticle) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        r#"INSERT INTO articles (url, title, description, content, author, source, image_url, published_at, category)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT(url) DO NOTHING"#,
        params![
            article.url,
            article.title,
            article.description,
            article.content,
            article.author,
            article.source,
            article.image_url,
            format_datetime(&article.published_at),
            article.category,
        ],
    )?;
    Ok(changed > 0)
}

fn ingest_batch(conn: &mut rusqlite::Connection, articles: &[NewArticle]) -> rusqlite::Result<IngestReport> {
    let tx = conn.transaction()?;
    let mut report = IngestReport::default();

    for article in articles {
        match insert_if_absent(&tx, article) {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.existing += 1,
            Err(e) => {
                tracing::error!("Failed to ingest {}: {}", article.url, e);
                report.failed += 1;
            }
        }
    }

    tx.commit()?;
    Ok(report)
}

fn select_listing(conn: &rusqlite::Connection, listing: &Listing) -> rusqlite::Result<Vec<Article>> {
    match listing {
        Listing::Filter(filter) => select_filtered(conn, filter),
        Listing::Text(query) if query.is_empty() => Ok(Vec::new()),
        Listing::Text(query) => select_matching(conn, query),
    }
}

fn select_filtered(conn: &rusqlite::Connection, filter: &ArticleQuery) -> rusqlite::Result<Vec<Article>> {
    let mut sql = format!("SELECT {} FROM articles", ARTICLE_COLUMNS);
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(category) = &filter.category {
        clauses.push("category = ?");
        values.push(category);
    }
    if filter.bookmarked_only {
        clauses.push("is_bookmarked = 1");
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(LISTING_ORDER);

    let mut stmt = conn.prepare(&sql)?;
    let articles = stmt
        .query_map(values.as_slice(), article_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(articles)
}

fn select_matching(conn: &rusqlite::Connection, query: &str) -> rusqlite::Result<Vec<Article>> {
    let needle = fold(query);
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!("SELECT {} FROM articles{}", ARTICLE_COLUMNS, LISTING_ORDER);
    let mut stmt = conn.prepare(&sql)?;
    let mut articles = Vec::new();
    for article in stmt.query_map([], article_from_row)? {
        let article = article?;
        let in_title = fold(&article.title).contains(&needle);
        if in_title || article.description.as_deref().is_some_and(|d| fold(d).contains(&needle)) {
            articles.push(article);
        }
    }
    Ok(articles)
}

/// Case- and diacritic-insensitive form used for text matching.
fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: ArticleId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        content: row.get(3)?,
        author: row.get(4)?,
        source: row.get(5)?,
        url: row.get(6)?,
        image_url: row.get(7)?,
        published_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        category: row.get(9)?,
        is_bookmarked: row.get(10)?,
        is_saved_for_offline: row.get(11)?,
    })
}
