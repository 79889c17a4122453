//! Search engines: the built-in table plus user-defined keyword engines.

use crate::config;
use crate::settings::Settings;
use crate::url_bar::build_search_url;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEngine {
    pub id: String,
    pub name: String,
    pub keyword: String,
    /// Search URL template, {} is replaced by the terms
    pub search_template: String,
    pub suggest_template: Option<String>,
}

impl SearchEngine {
    pub fn search_url(&self, terms: &str) -> Option<Url> {
        match build_search_url(&self.search_template, terms) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Bad search template for {}: {}", self.id, e);
                None
            }
        }
    }

    pub fn suggest_url(&self, terms: &str) -> Option<Url> {
        let template = self.suggest_template.as_deref()?;
        build_search_url(template, terms).ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchEngines {
    engines: Vec<SearchEngine>,
    default_id: String,
}

impl SearchEngines {
    /// Built-in engines, overridden or extended by the user's engines
    pub fn from_settings(settings: &Settings) -> Self {
        let mut engines: Vec<SearchEngine> = config::SEARCH_ENGINES
            .iter()
            .map(|(id, name, keyword, url, suggest)| SearchEngine {
                id: id.to_string(),
                name: name.to_string(),
                keyword: keyword.to_string(),
                search_template: url.to_string(),
                suggest_template: (!suggest.is_empty()).then(|| suggest.to_string()),
            })
            .collect();

        for custom in &settings.engines {
            let engine = SearchEngine {
                id: custom.id.clone(),
                name: custom.name.clone(),
                keyword: custom.keyword.to_lowercase(),
                search_template: custom.url.clone(),
                suggest_template: custom.suggest_url.clone(),
            };
            match engines.iter_mut().find(|e| e.id == engine.id) {
                Some(existing) => *existing = engine,
                None => engines.push(engine),
            }
        }

        Self {
            engines,
            default_id: settings.search_engine.clone(),
        }
    }

    /// The engine plain searches go to. Falls back to the built-in default
    /// when the configured id is unknown.
    pub fn default_engine(&self) -> Option<&SearchEngine> {
        self.by_id(&self.default_id)
            .or_else(|| self.by_id(config::DEFAULT_SEARCH_ENGINE))
    }

    pub fn by_id(&self, id: &str) -> Option<&SearchEngine> {
        self.engines.iter().find(|e| e.id == id)
    }

    pub fn by_keyword(&self, keyword: &str) -> Option<&SearchEngine> {
        self.engines
            .iter()
            .find(|e| !e.keyword.is_empty() && e.keyword.eq_ignore_ascii_case(keyword))
    }

    /// Engines whose keyword starts with `prefix`, sorted by keyword
    pub fn keywords_starting_with(&self, prefix: &str) -> Vec<&SearchEngine> {
        let prefix = prefix.to_lowercase();
        let mut found: Vec<&SearchEngine> = self
            .engines
            .iter()
            .filter(|e| !e.keyword.is_empty() && e.keyword.starts_with(&prefix))
            .collect();
        found.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        found
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchEngine> {
        self.engines.iter()
    }
}
