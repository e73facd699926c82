pub const SCHEMA: &str = r#"
-- articles table (one row per canonical url)
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    content TEXT,
    author TEXT,
    source TEXT NOT NULL,
    image_url TEXT,
    published_at TEXT NOT NULL,
    category TEXT,
    is_bookmarked INTEGER NOT NULL DEFAULT 0,
    is_saved_offline INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC, id);
CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
CREATE INDEX IF NOT EXISTS idx_articles_is_bookmarked ON articles(is_bookmarked);
"#;
