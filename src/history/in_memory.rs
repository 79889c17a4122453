//! Snapshot of typed URLs used for the synchronous first autocomplete pass.

use crate::error::Result;
use crate::history::backend::{HistoryBackend, UrlDatabase, UrlRow};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Typed URLs keyed by URL so prefix lookups are a range scan
#[derive(Debug, Clone, Default)]
pub struct InMemoryUrlIndex {
    rows: BTreeMap<String, UrlRow>,
}

impl InMemoryUrlIndex {
    /// Copy every typed URL out of `backend`
    pub fn load(backend: &dyn HistoryBackend) -> Result<Self> {
        let rows = backend.typed_urls()?;
        log::debug!("Loaded {} typed URLs into the in-memory index", rows.len());
        Ok(Self::from_rows(rows))
    }

    pub fn from_rows(rows: impl IntoIterator<Item = UrlRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|row| (row.url.clone(), row)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop a URL the user deleted
    pub fn remove(&mut self, url: &str) {
        self.rows.remove(url);
    }

    fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a UrlRow> + 'a {
        self.rows
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(url, _)| url.starts_with(prefix))
            .map(|(_, row)| row)
    }
}

impl UrlDatabase for InMemoryUrlIndex {
    fn autocomplete_for_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<UrlRow>> {
        let mut rows: Vec<UrlRow> = self.with_prefix(prefix).cloned().collect();
        rows.sort_by(|a, b| {
            b.typed_count
                .cmp(&a.typed_count)
                .then_with(|| b.visit_count.cmp(&a.visit_count))
                .then_with(|| b.last_visit_time.cmp(&a.last_visit_time))
        });
        rows.truncate(limit);
        Ok(rows)
    }

    fn row_for_url(&self, url: &str) -> Result<Option<UrlRow>> {
        Ok(self.rows.get(url).cloned())
    }

    fn find_shortest_url_between(
        &self,
        base: &str,
        target: &str,
        min_visits: i32,
        min_typed: i32,
        allow_base: bool,
    ) -> Result<Option<UrlRow>> {
        Ok(self
            .with_prefix(base)
            .filter(|row| allow_base || row.url != base)
            .filter(|row| row.url.len() < target.len() && target.starts_with(row.url.as_str()))
            .find(|row| row.visit_count >= min_visits && row.typed_count >= min_typed)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryDatabase;
    use url::Url;

    fn row(url: &str, visits: i32, typed: i32) -> UrlRow {
        UrlRow {
            url: url.to_string(),
            visit_count: visits,
            typed_count: typed,
            ..Default::default()
        }
    }

    #[test]
    fn test_load_only_typed() {
        let db = HistoryDatabase::open_in_memory().unwrap();
        db.record_visit(&Url::parse("http://typed.com/").unwrap(), None, true)
            .unwrap();
        db.record_visit(&Url::parse("http://linked.com/").unwrap(), None, false)
            .unwrap();

        let index = InMemoryUrlIndex::load(&db).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.row_for_url("http://typed.com/").unwrap().is_some());
    }

    #[test]
    fn test_prefix_ordering() {
        let index = InMemoryUrlIndex::from_rows([
            row("http://a.com/x", 10, 1),
            row("http://a.com/y", 3, 5),
            row("http://b.com/", 50, 50),
        ]);
        let rows = index.autocomplete_for_prefix("http://a.com/", 10).unwrap();
        let urls: Vec<_> = rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a.com/y", "http://a.com/x"]);
        assert_eq!(index.autocomplete_for_prefix("http://a.com/", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_shortest_between() {
        let index = InMemoryUrlIndex::from_rows([
            row("http://a.com/", 1, 1),
            row("http://a.com/b/", 5, 1),
            row("http://a.com/b/c", 9, 1),
        ]);
        let found = index
            .find_shortest_url_between("http://a.com/", "http://a.com/b/c", 2, 1, true)
            .unwrap();
        assert_eq!(found.unwrap().url, "http://a.com/b/");
        assert!(index
            .find_shortest_url_between("http://a.com/", "http://a.com/b/c", 10, 0, true)
            .unwrap()
            .is_none());
    }
}
