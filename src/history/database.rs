use crate::config;
use crate::error::{Error, Result};
use crate::history::backend::{
    now, BookmarkMatch, BookmarkStore, FullTextOptions, FullTextRow, HistoryBackend,
    KeywordSearchTerm, UrlDatabase, UrlRow,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use url::Url;

const URL_ROW_FIELDS: &str = "id, url, title, visit_count, typed_count, last_visit_time";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        title TEXT,
        visit_count INTEGER NOT NULL DEFAULT 0,
        typed_count INTEGER NOT NULL DEFAULT 0,
        last_visit_time INTEGER NOT NULL DEFAULT 0,
        first_visit_time INTEGER NOT NULL DEFAULT 0,
        hidden INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_urls_last_visit ON urls(last_visit_time DESC);

    CREATE TABLE IF NOT EXISTS redirects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chain_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        url TEXT NOT NULL,
        visit_time INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_redirects_url ON redirects(url);

    CREATE TABLE IF NOT EXISTS keyword_search_terms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        engine TEXT NOT NULL,
        term TEXT NOT NULL,
        lower_term TEXT NOT NULL,
        url TEXT NOT NULL,
        last_visit_time INTEGER NOT NULL,
        UNIQUE(engine, lower_term)
    );

    CREATE TABLE IF NOT EXISTS page_text (
        url TEXT PRIMARY KEY,
        body TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS bookmarks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        added_time INTEGER NOT NULL
    );
";

fn url_row(row: &Row<'_>) -> rusqlite::Result<UrlRow> {
    Ok(UrlRow {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        visit_count: row.get(3)?,
        typed_count: row.get(4)?,
        last_visit_time: row.get(5)?,
    })
}

fn query_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// SQLite-based history storage
pub struct HistoryDatabase {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for HistoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryDatabase").finish_non_exhaustive()
    }
}

impl HistoryDatabase {
    /// Create or open a history database in the given profile directory
    pub fn new(profile_path: &Path) -> Result<Self> {
        let db_path = profile_path.join(config::HISTORY_DB);
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA)?;

        log::info!("History database opened at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A throwaway database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Unavailable("history database lock poisoned".into()))
    }

    /// Record a page visit. `typed` is set when the user typed the URL.
    pub fn record_visit(&self, url: &Url, title: Option<&str>, typed: bool) -> Result<()> {
        let now = now();
        let url_str = url.as_str();

        self.conn()?.execute(
            "INSERT INTO urls (url, title, last_visit_time, first_visit_time, visit_count, typed_count)
             VALUES (?1, ?2, ?3, ?3, 1, ?4)
             ON CONFLICT(url) DO UPDATE SET
                 title = COALESCE(?2, title),
                 visit_count = visit_count + 1,
                 typed_count = typed_count + ?4,
                 last_visit_time = ?3",
            params![url_str, title, now, typed as i32],
        )?;

        log::debug!("Recorded visit to {}", url_str);

        Ok(())
    }

    /// Insert or replace a row with explicit counts, e.g. when importing
    /// history from another browser
    pub fn import_row(&self, row: &UrlRow) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO urls (url, title, visit_count, typed_count, last_visit_time, first_visit_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(url) DO UPDATE SET
                 title = ?2,
                 visit_count = ?3,
                 typed_count = ?4,
                 last_visit_time = ?5",
            params![row.url, row.title, row.visit_count, row.typed_count, row.last_visit_time],
        )?;
        let id = conn.query_row("SELECT id FROM urls WHERE url = ?1", params![row.url], |r| {
            r.get(0)
        })?;
        Ok(id)
    }

    /// Record that a navigation went through `chain`, first URL first
    pub fn record_redirects(&self, chain: &[Url]) -> Result<()> {
        if chain.len() < 2 {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let chain_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(chain_id), 0) + 1 FROM redirects",
            [],
            |r| r.get(0),
        )?;
        let now = now();
        for (position, url) in chain.iter().enumerate() {
            tx.execute(
                "INSERT INTO redirects (chain_id, position, url, visit_time) VALUES (?1, ?2, ?3, ?4)",
                params![chain_id, position as i64, url.as_str(), now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Remember a search issued through `engine`
    pub fn record_search_term(&self, engine: &str, term: &str, url: &Url) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO keyword_search_terms (engine, term, lower_term, url, last_visit_time)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(engine, lower_term) DO UPDATE SET
                 term = ?2,
                 url = ?4,
                 last_visit_time = ?5",
            params![engine, term, term.to_lowercase(), url.as_str(), now()],
        )?;
        Ok(())
    }

    /// Store the indexed text of a page
    pub fn set_page_text(&self, url: &Url, body: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO page_text (url, body) VALUES (?1, ?2)
             ON CONFLICT(url) DO UPDATE SET body = ?2",
            params![url.as_str(), body],
        )?;
        Ok(())
    }

    pub fn add_bookmark(&self, url: &Url, title: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO bookmarks (url, title, added_time) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET title = ?2",
            params![url.as_str(), title, now()],
        )?;
        Ok(())
    }

    /// Update the title for a URL (called when page title changes)
    pub fn update_title(&self, url: &Url, title: &str) -> Result<()> {
        self.conn()?.execute(
            "UPDATE urls SET title = ?1 WHERE url = ?2",
            params![title, url.as_str()],
        )?;
        Ok(())
    }

    /// Clear all history
    pub fn clear_all(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "DELETE FROM urls; DELETE FROM redirects; DELETE FROM keyword_search_terms; DELETE FROM page_text;",
        )?;
        log::info!("Cleared all history");
        Ok(())
    }

    /// Get the total number of history entries
    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn()?
            .query_row("SELECT COUNT(*) FROM urls", [], |row| row.get(0))?)
    }
}

impl UrlDatabase for HistoryDatabase {
    fn autocomplete_for_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<UrlRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {URL_ROW_FIELDS} FROM urls
             WHERE url >= ?1 AND substr(url, 1, length(?1)) = ?1 AND hidden = 0
             ORDER BY typed_count DESC, visit_count DESC, last_visit_time DESC
             LIMIT ?2"
        ))?;

        let rows = stmt
            .query_map(params![prefix, limit as i64], url_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn row_for_url(&self, url: &str) -> Result<Option<UrlRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {URL_ROW_FIELDS} FROM urls WHERE url = ?1"),
                params![url],
                url_row,
            )
            .optional()?;
        Ok(row)
    }

    fn find_shortest_url_between(
        &self,
        base: &str,
        target: &str,
        min_visits: i32,
        min_typed: i32,
        allow_base: bool,
    ) -> Result<Option<UrlRow>> {
        let comparison = if allow_base { ">=" } else { ">" };
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {URL_ROW_FIELDS} FROM urls
                     WHERE url {comparison} ?1 AND url < ?2 AND url = substr(?2, 1, length(url))
                       AND hidden = 0 AND visit_count >= ?3 AND typed_count >= ?4
                     ORDER BY url LIMIT 1"
                ),
                params![base, target, min_visits, min_typed],
                url_row,
            )
            .optional()?;
        Ok(row)
    }
}

impl HistoryBackend for HistoryDatabase {
    fn most_recent_redirects_from(&self, url: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let start: Option<(i64, i64)> = conn
            .query_row(
                "SELECT chain_id, position FROM redirects WHERE url = ?1
                 ORDER BY visit_time DESC, chain_id DESC LIMIT 1",
                params![url],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let Some((chain_id, position)) = start else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(
            "SELECT url FROM redirects WHERE chain_id = ?1 AND position > ?2 ORDER BY position",
        )?;
        let urls = stmt
            .query_map(params![chain_id, position], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(urls)
    }

    fn query_full_text(&self, text: &str, options: &FullTextOptions) -> Result<Vec<FullTextRow>> {
        let words = query_words(text);
        let Some(first) = words.first() else {
            return Ok(Vec::new());
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT u.id, u.url, u.title, u.visit_count, u.typed_count, u.last_visit_time,
                    COALESCE(p.body, '')
             FROM urls u LEFT JOIN page_text p ON p.url = u.url
             WHERE u.hidden = 0 AND u.last_visit_time >= ?1
               AND (instr(lower(COALESCE(u.title, '')), ?2) > 0
                    OR instr(lower(u.url), ?2) > 0
                    OR instr(lower(COALESCE(p.body, '')), ?2) > 0)
             ORDER BY u.last_visit_time DESC",
        )?;

        let candidates = stmt
            .query_map(params![options.begin_time, first], |r| {
                Ok((url_row(r)?, r.get::<_, String>(6)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let rows = candidates
            .into_iter()
            .filter_map(|(row, body)| {
                let title = row.title.to_lowercase();
                let haystack = format!("{} {} {}", title, row.url.to_lowercase(), body.to_lowercase());
                if !words.iter().all(|w| haystack.contains(w.as_str())) {
                    return None;
                }
                let title_match = words.iter().any(|w| title.contains(w.as_str()));
                Some(FullTextRow { row, title_match })
            })
            .take(options.max_count)
            .collect();
        Ok(rows)
    }

    fn keyword_search_terms(
        &self,
        engine: &str,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<KeywordSearchTerm>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT term, last_visit_time FROM keyword_search_terms
             WHERE engine = ?1 AND substr(lower_term, 1, length(?2)) = ?2
             ORDER BY last_visit_time DESC
             LIMIT ?3",
        )?;
        let terms = stmt
            .query_map(params![engine, prefix.to_lowercase(), limit as i64], |r| {
                Ok(KeywordSearchTerm {
                    term: r.get(0)?,
                    last_visit_time: r.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(terms)
    }

    fn typed_urls(&self) -> Result<Vec<UrlRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {URL_ROW_FIELDS} FROM urls WHERE typed_count > 0 AND hidden = 0"
        ))?;
        let rows = stmt
            .query_map([], url_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn delete_url(&self, url: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM urls WHERE url = ?1", params![url])?;
        conn.execute("DELETE FROM page_text WHERE url = ?1", params![url])?;
        log::debug!("Deleted {} from history", url);
        Ok(())
    }
}

impl BookmarkStore for HistoryDatabase {
    fn titles_matching(&self, text: &str, limit: usize) -> Result<Vec<BookmarkMatch>> {
        let words = query_words(text);
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT url, title FROM bookmarks ORDER BY added_time DESC, id DESC")?;
        let bookmarks = stmt
            .query_map([], |r| {
                Ok(BookmarkMatch {
                    url: r.get(0)?,
                    title: r.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(bookmarks
            .into_iter()
            .filter(|b| {
                let title = b.title.to_lowercase();
                words.iter().all(|w| title.contains(w.as_str()))
            })
            .take(limit)
            .collect())
    }

    fn is_bookmarked(&self, url: &str) -> Result<bool> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM bookmarks WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
