/// Application name
pub const APP_NAME: &str = "qayeq";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent string for suggestion requests
pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/605.1.15 (KHTML, like Gecko) qayeq/",
    env!("CARGO_PKG_VERSION")
);

/// History database filename
pub const HISTORY_DB: &str = "history.db";

/// Settings filename inside the config directory
pub const SETTINGS_FILE: &str = "settings.toml";

// ============================================================================
// Search Engines
// ============================================================================

/// Built-in search engines: (id, display_name, keyword, url_template, suggest_template)
/// Use {} as placeholder for the search terms
pub const SEARCH_ENGINES: &[(&str, &str, &str, &str, &str)] = &[
    (
        "duckduckgo",
        "DuckDuckGo",
        "ddg",
        "https://duckduckgo.com/?q={}",
        "https://duckduckgo.com/ac/?q={}&type=list",
    ),
    (
        "google",
        "Google",
        "g",
        "https://www.google.com/search?q={}",
        "https://suggestqueries.google.com/complete/search?client=firefox&q={}",
    ),
    ("bing", "Bing", "b", "https://www.bing.com/search?q={}", ""),
    ("ecosia", "Ecosia", "eco", "https://www.ecosia.org/search?q={}", ""),
];

/// Default search engine id
pub const DEFAULT_SEARCH_ENGINE: &str = "duckduckgo";

/// Destination for the "search history" shortcut; {} is the query
pub const HISTORY_SEARCH_URL: &str = "about:history?q={}";

// ============================================================================
// URL Completion
// ============================================================================

/// Debounce delay before a remote suggestion request (milliseconds)
pub const SUGGEST_DEBOUNCE_MS: u64 = 200;

/// Timeout for a single suggestion request (milliseconds)
pub const SUGGEST_TIMEOUT_MS: u64 = 1500;

/// Maximum number of matches in the popup (one more slot is kept for the
/// history search shortcut)
pub const COMPLETION_MAX_RESULTS: usize = 6;

/// Maximum full-text history matches shown before the rest collapse into
/// the shortcut
pub const HISTORY_CONTENTS_MAX_MATCHES: usize = 3;

/// Upper bound on rows fetched from the full-text index per query
pub const HISTORY_CONTENTS_QUERY_LIMIT: usize = 50;

/// Full-text history search window (days)
pub const HISTORY_CONTENTS_DAYS: i64 = 30;

/// Rows with at most this many typed visits...
pub const LOW_QUALITY_TYPED_LIMIT: i32 = 1;

/// ...at most this many visits...
pub const LOW_QUALITY_VISIT_LIMIT: i32 = 3;

/// ...and no visit within this many days are dropped from URL matches
pub const LOW_QUALITY_AGE_LIMIT_DAYS: i64 = 3;

/// URL prefixes tried by the history provider, best first:
/// (prefix, number of components)
pub const URL_PREFIXES: &[(&str, usize)] = &[
    ("https://www.", 2),
    ("http://www.", 2),
    ("ftp://ftp.", 2),
    ("ftp://www.", 2),
    ("https://", 1),
    ("http://", 1),
    ("ftp://", 1),
    ("", 0),
];

/// Default text for the history search shortcut
pub const RECENT_HISTORY_TEMPLATE: &str = "See {count} previously viewed pages containing {query}";

/// Text used when the full-text search hit its row limit
pub const RECENT_HISTORY_MANY_TEMPLATE: &str = "Search recent history for {query}";
