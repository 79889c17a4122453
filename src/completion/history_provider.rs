//! History-based completion provider.
//!
//! Runs in two passes. The first uses the in-memory index of typed URLs on
//! the controller thread, so inline completion is available right away.
//! The second queries the full store on the history lane and replaces the
//! first pass's matches when it finishes. Only the second pass collapses
//! redirect chains.

use crate::completion::classify::{classify_location, classify_match_spans, format_url};
use crate::completion::dispatch::{CancelFlag, ReplySink};
use crate::completion::item::{CompletionItem, CompletionType, Style};
use crate::completion::provider::{
    AutocompleteProvider, ProviderKind, ProviderReply, RequestTokens,
};
use crate::config;
use crate::error::Result;
use crate::history::backend::now;
use crate::history::{BookmarkStore, HistoryBackend, InMemoryUrlIndex, UrlDatabase, UrlRow};
use crate::url_bar::fixup;
use crate::url_bar::{AutocompleteInput, InputType};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

const INLINE_AUTOCOMPLETE_RELEVANCE: i32 = 1400;
const NORMAL_RELEVANCE_BASE: i32 = 900;

fn what_you_typed_relevance(input_type: InputType) -> i32 {
    if input_type == InputType::RequestedUrl {
        1200
    } else {
        1300
    }
}

/// A history row and how it matched the typed text
#[derive(Debug, Clone)]
struct HistoryMatch {
    row: UrlRow,
    /// Where the typed text starts in the URL; `None` for rows added
    /// without a prefix match
    input_location: Option<usize>,
    /// Matched with the empty prefix, i.e. the text may cover the scheme
    match_in_scheme: bool,
    /// Matched after the longest prefix the URL has
    innermost_match: bool,
}

impl HistoryMatch {
    fn is_host_only(&self) -> bool {
        fixup::is_host_only(&self.row.url)
    }
}

#[derive(Debug, Clone, Copy)]
enum MatchKind {
    InlineAutocomplete,
    /// Number of rows ranked below this one
    Normal(usize),
}

/// Everything a pass needs; moved to the history lane for the second pass
#[derive(Debug, Clone)]
struct PassParams {
    input: AutocompleteInput,
    /// Typed text after fixup, used for matching
    text: String,
    /// The user did not type "http"
    trim_http: bool,
    what_you_typed: Option<CompletionItem>,
    max_matches: usize,
    /// Set once a pass promoted an inline match, so later passes agree
    dont_suggest_exact_input: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassState {
    NotStarted,
    InMemoryDone,
    PersistentPending,
    PersistentDone,
}

pub struct HistoryUrlProvider {
    backend: Option<Arc<dyn HistoryBackend>>,
    in_memory: Option<InMemoryUrlIndex>,
    bookmarks: Option<Arc<dyn BookmarkStore>>,
    max_matches: usize,
    matches: Vec<CompletionItem>,
    state: PassState,
    tokens: RequestTokens,
    pending: Option<(u64, CancelFlag)>,
}

impl HistoryUrlProvider {
    pub fn new(
        backend: Option<Arc<dyn HistoryBackend>>,
        in_memory: Option<InMemoryUrlIndex>,
        bookmarks: Option<Arc<dyn BookmarkStore>>,
        max_matches: usize,
    ) -> Self {
        Self {
            backend,
            in_memory,
            bookmarks,
            max_matches,
            matches: Vec::new(),
            state: PassState::NotStarted,
            tokens: RequestTokens::default(),
            pending: None,
        }
    }

    fn update_starred(&mut self) {
        let Some(bookmarks) = &self.bookmarks else {
            return;
        };
        for item in &mut self.matches {
            item.starred = bookmarks
                .is_bookmarked(&item.destination_url)
                .unwrap_or(false);
        }
    }
}

impl AutocompleteProvider for HistoryUrlProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HistoryUrl
    }

    fn start(&mut self, input: &AutocompleteInput, _minimal_changes: bool, sink: &ReplySink) {
        self.stop();
        self.matches.clear();
        self.state = PassState::NotStarted;

        if !matches!(
            input.input_type(),
            InputType::Unknown | InputType::RequestedUrl | InputType::Url
        ) {
            return;
        }

        let trim_http = !fixup::has_http_scheme(input.text());
        let what_you_typed = suggest_exact_input(input, trim_http);
        self.matches.extend(what_you_typed.iter().cloned());

        // Deliberately ignores the desired TLD so only the what-you-typed
        // item changes with it
        let text = fixup::fixup_user_input(input.text());
        if text.is_empty() {
            return;
        }

        let mut params = PassParams {
            input: input.clone(),
            text,
            trim_http,
            what_you_typed,
            max_matches: self.max_matches,
            dont_suggest_exact_input: false,
        };

        if let Some(index) = &self.in_memory {
            match do_autocomplete(index, None, &mut params, &CancelFlag::new()) {
                Ok(Some(matches)) => self.matches = matches,
                Ok(None) => {}
                Err(e) => log::warn!("In-memory history pass failed: {}", e),
            }
            self.update_starred();
        }
        self.state = PassState::InMemoryDone;

        if input.synchronous_only() {
            return;
        }
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let token = self.tokens.next();
        let cancel = CancelFlag::new();
        let job_cancel = cancel.clone();
        let queued = sink.on_history_lane(self.kind(), token, move || {
            let matches =
                match do_autocomplete(backend.as_ref(), Some(backend.as_ref()), &mut params, &job_cancel) {
                    Ok(matches) => matches,
                    Err(e) => {
                        log::warn!("History pass failed: {}", e);
                        None
                    }
                };
            ProviderReply::HistoryUrls(matches)
        });

        if queued {
            self.pending = Some((token, cancel));
            self.state = PassState::PersistentPending;
        } else {
            log::warn!("History lane unavailable, keeping in-memory matches");
        }
    }

    fn stop(&mut self) {
        if let Some((_, cancel)) = self.pending.take() {
            cancel.cancel();
        }
        if self.state == PassState::PersistentPending {
            self.state = PassState::InMemoryDone;
        }
    }

    fn done(&self) -> bool {
        self.state != PassState::PersistentPending
    }

    fn matches(&self) -> &[CompletionItem] {
        &self.matches
    }

    fn on_reply(&mut self, token: u64, reply: ProviderReply, _sink: &ReplySink) -> bool {
        let ProviderReply::HistoryUrls(matches) = reply else {
            return false;
        };
        if !matches!(&self.pending, Some((pending, _)) if *pending == token) {
            return false;
        }

        self.pending = None;
        self.state = PassState::PersistentDone;

        match matches {
            Some(matches) => {
                self.matches = matches;
                self.update_starred();
                true
            }
            None => false,
        }
    }

    fn delete_match(&mut self, item: &CompletionItem) {
        let url = item.destination_url.as_str();

        if item.deletable && item.provider == self.kind() {
            if let Some(backend) = &self.backend {
                if let Err(e) = backend.delete_url(url) {
                    log::warn!("Failed to delete {} from history: {}", url, e);
                    return;
                }
            }
            if let Some(index) = &mut self.in_memory {
                index.remove(url);
            }
        }
        self.matches.retain(|m| m.destination_url != url);
    }
}

/// The typed text as a URL, if it can be navigated to
fn suggest_exact_input(input: &AutocompleteInput, trim_http: bool) -> Option<CompletionItem> {
    let url = fixup::fixup_url(input.text(), input.desired_tld())?;
    let has_authority = matches!(url.scheme(), "http" | "https" | "ftp" | "ws" | "wss");
    if has_authority && url.host_str().map_or(true, str::is_empty) {
        return None;
    }

    let mut item = CompletionItem::new(
        ProviderKind::HistoryUrl,
        what_you_typed_relevance(input.input_type()),
        false,
        CompletionType::UrlWhatYouTyped,
    );
    item.destination_url = url.to_string();

    let mut fill = url.to_string();
    let trimmed = if trim_http {
        fixup::trim_http_prefix(&mut fill)
    } else {
        0
    };
    item.fill_into_edit = fill.clone();
    item.contents = fill;

    // Highlight the innermost match: "w" fixed up to "www.w.com" marks the
    // second "w"
    let location = best_prefix(&item.destination_url, input.text())
        .and_then(|(prefix, _)| prefix.len().checked_sub(trimmed));
    item.contents_class =
        classify_location(location, input.text().len(), item.contents.len(), Style::URL);
    item.is_history_what_you_typed_match = true;
    Some(item)
}

/// Longest configured prefix that `url` starts with, followed by `suffix`
fn best_prefix(url: &str, suffix: &str) -> Option<(&'static str, usize)> {
    let url = url.to_ascii_lowercase();
    let suffix = suffix.to_ascii_lowercase();
    config::URL_PREFIXES
        .iter()
        .copied()
        .find(|(prefix, _)| url.starts_with(&format!("{prefix}{suffix}")))
}

/// The typed text ends before the host of any prefixed URL, e.g. "http" or
/// "https:/"
fn typed_within_scheme(text: &str) -> bool {
    config::URL_PREFIXES
        .iter()
        .any(|(prefix, _)| !prefix.is_empty() && prefix.starts_with(text))
}

fn do_autocomplete<D: UrlDatabase + ?Sized>(
    db: &D,
    backend: Option<&dyn HistoryBackend>,
    params: &mut PassParams,
    cancel: &CancelFlag,
) -> Result<Option<Vec<CompletionItem>>> {
    let mut matches: Vec<CompletionItem> = params.what_you_typed.iter().cloned().collect();

    // Ask for more than needed; culling and redirect removal trim it down
    let mut history = Vec::new();
    for (prefix, components) in config::URL_PREFIXES {
        if cancel.is_canceled() {
            return Ok(None);
        }
        let query = format!("{prefix}{}", params.text);
        for row in db.autocomplete_for_prefix(&query, params.max_matches * 2)? {
            let best = best_prefix(&row.url, "").map_or(0, |(_, c)| c);
            history.push(HistoryMatch {
                row,
                input_location: Some(prefix.len()),
                match_in_scheme: *components == 0,
                innermost_match: *components >= best,
            });
        }
    }

    cull_poor_matches(&mut history, now());
    sort_matches(&mut history);
    promote_or_create_shorter_suggestion(db, params, &mut history)?;

    // An exact or inline match sits at the front of `history` and is
    // already in `matches`
    let mut first_match = 1;
    let mut exact_suggestion = 0;
    let have_what_you_typed = matches
        .first()
        .is_some_and(|m| m.is_history_what_you_typed_match);

    if have_what_you_typed
        && !params.dont_suggest_exact_input
        && fixup_exact_suggestion(db, params, &mut matches[0], &mut history)?
    {
        exact_suggestion = 1;
    } else if params.input.prevent_inline_autocomplete()
        || history.is_empty()
        || !promote_for_inline_autocomplete(params, &history[0], &mut matches)
    {
        first_match = 0;
        if have_what_you_typed && params.input.input_type() == InputType::Url {
            exact_suggestion = 1;
        }
    }

    let Some(backend) = backend else {
        return Ok(Some(matches));
    };
    if cancel.is_canceled() {
        return Ok(None);
    }

    cull_redirects(backend, &mut history, params.max_matches + exact_suggestion)?;

    let count = history.len();
    for (i, m) in history.iter().enumerate().skip(first_match) {
        matches.push(history_match_to_item(params, m, MatchKind::Normal(count - 1 - i)));
    }

    log::debug!(
        "History pass for {:?} produced {} matches",
        params.text,
        matches.len()
    );
    Ok(Some(matches))
}

/// Drop rows rarely typed, rarely visited and not visited lately
fn cull_poor_matches(history: &mut Vec<HistoryMatch>, now: i64) {
    let threshold = now - config::LOW_QUALITY_AGE_LIMIT_DAYS * 24 * 60 * 60;
    history.retain(|m| {
        !(m.row.typed_count <= config::LOW_QUALITY_TYPED_LIMIT
            && m.row.visit_count <= config::LOW_QUALITY_VISIT_LIMIT
            && m.row.last_visit_time < threshold)
    });
}

fn compare_history_match(a: &HistoryMatch, b: &HistoryMatch) -> Ordering {
    (b.row.typed_count > 0)
        .cmp(&(a.row.typed_count > 0))
        .then_with(|| b.innermost_match.cmp(&a.innermost_match))
        .then_with(|| b.row.typed_count.cmp(&a.row.typed_count))
        .then_with(|| {
            // typed once each: a bare host beats a page on it
            if a.row.typed_count == 1 {
                b.is_host_only().cmp(&a.is_host_only())
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| b.row.visit_count.cmp(&a.row.visit_count))
        .then_with(|| b.row.last_visit_time.cmp(&a.row.last_visit_time))
}

/// Sort best first and drop later duplicates. The same URL can match
/// through several prefixes, and the copies need not be adjacent.
fn sort_matches(history: &mut Vec<HistoryMatch>) {
    history.sort_by(compare_history_match);
    let mut seen = HashSet::new();
    history.retain(|m| seen.insert(m.row.url.clone()));
}

/// "scheme://host/" for the match, if the typed text still fits in it
fn convert_to_host_only(m: &HistoryMatch, text: &str) -> Option<String> {
    let host = fixup::host_only_url(&m.row.url)?;
    let start = m.input_location?;
    let end = start + text.len();
    if host.get(start..end)? != text {
        return None;
    }
    Some(host)
}

/// Suggest a shorter URL on the same host as the top match, when one has
/// enough visits, or the bare host if nothing better exists.
fn promote_or_create_shorter_suggestion<D: UrlDatabase + ?Sized>(
    db: &D,
    params: &PassParams,
    history: &mut Vec<HistoryMatch>,
) -> Result<()> {
    let Some(top) = history.first() else {
        return Ok(());
    };
    // input like "http" matches every URL through its scheme
    if top.match_in_scheme && typed_within_scheme(&params.text) {
        return Ok(());
    }

    let top_url = top.row.url.clone();
    let top_visits = top.row.visit_count;
    let top_typed = top.row.typed_count;
    let input_location = top.input_location;
    let match_in_scheme = top.match_in_scheme;
    let what_you_typed_url = params
        .what_you_typed
        .as_ref()
        .map(|m| m.destination_url.as_str());

    let mut can_add_base = what_you_typed_url.is_none();
    let search_base = match convert_to_host_only(top, &params.text) {
        Some(host) => {
            if !can_add_base {
                can_add_base = what_you_typed_url != Some(host.as_str());
            }
            host
        }
        None => {
            // the prefix of the top match the user has typed so far
            let end = input_location.unwrap_or(0) + params.text.len();
            let Some(typed) = top_url.get(..end) else {
                return Ok(());
            };
            match url::Url::parse(typed) {
                Ok(url) => url.to_string(),
                Err(_) => return Ok(()),
            }
        }
    };

    if search_base == top_url {
        return Ok(());
    }

    // worth suggesting only with a third of the visits; typed top matches
    // only promote typed shorter URLs so both passes agree
    let min_visits = (top_visits - 1) / 3 + 1;
    let min_typed = i32::from(top_typed > 0);

    let (row, promote) =
        match db.find_shortest_url_between(&search_base, &top_url, min_visits, min_typed, can_add_base)? {
            Some(row) => (row, true),
            None => {
                if !can_add_base {
                    return Ok(());
                }
                let row = db
                    .row_for_url(&search_base)?
                    .unwrap_or_else(|| UrlRow::new(&search_base));
                (row, top_typed <= 1)
            }
        };

    ensure_match_present(history, row, input_location, match_in_scheme, promote);
    Ok(())
}

/// Make sure `row` is in `history`, moving or inserting it at the front
/// when `promote` is set
fn ensure_match_present(
    history: &mut Vec<HistoryMatch>,
    row: UrlRow,
    input_location: Option<usize>,
    match_in_scheme: bool,
    promote: bool,
) {
    if let Some(pos) = history.iter().position(|m| m.row.url == row.url) {
        if promote {
            history[..=pos].rotate_right(1);
        }
        return;
    }

    let m = HistoryMatch {
        row,
        input_location,
        match_in_scheme,
        innermost_match: true,
    };
    if promote {
        history.insert(0, m);
    } else {
        history.push(m);
    }
}

/// Carry history data over to the what-you-typed item when the typed URL
/// is known. Returns true when it became the exact match.
fn fixup_exact_suggestion<D: UrlDatabase + ?Sized>(
    db: &D,
    params: &PassParams,
    what_you_typed: &mut CompletionItem,
    history: &mut Vec<HistoryMatch>,
) -> Result<bool> {
    let row = match db.row_for_url(&what_you_typed.destination_url)? {
        Some(row) => {
            what_you_typed.deletable = true;
            what_you_typed.description = row.title.clone();
            what_you_typed.description_class =
                classify_match_spans(&params.text, &row.title, Style::NONE);
            if row.typed_count == 0 {
                // stay below the search what-you-typed item
                what_you_typed.relevance = what_you_typed_relevance(params.input.input_type());
                return Ok(false);
            }
            row
        }
        None => {
            // Typing "foo" with a desired TLD gives "www.foo.com". If only the
            // intranet "foo" is known, keep the what-you-typed item on top so
            // the result doesn't change when the TLD key is pressed.
            if params.input.desired_tld().is_empty() {
                return Ok(false);
            }
            let Some(without_tld) = fixup::fixup_url(params.input.text(), "") else {
                return Ok(false);
            };
            if db.row_for_url(without_tld.as_str())?.is_none() {
                return Ok(false);
            }
            UrlRow::new(&what_you_typed.destination_url)
        }
    };

    what_you_typed.relevance = INLINE_AUTOCOMPLETE_RELEVANCE;
    ensure_match_present(history, row, None, false, true);
    Ok(true)
}

/// Promote the top row for inline completion if it was typed enough:
/// once for a bare host, twice for anything longer
fn promote_for_inline_autocomplete(
    params: &mut PassParams,
    m: &HistoryMatch,
    matches: &mut Vec<CompletionItem>,
) -> bool {
    if m.match_in_scheme && typed_within_scheme(&params.text) {
        return false;
    }
    let min_typed = if m.is_host_only() { 1 } else { 2 };
    if m.row.typed_count < min_typed {
        return false;
    }

    params.dont_suggest_exact_input = true;
    matches.push(history_match_to_item(params, m, MatchKind::InlineAutocomplete));
    true
}

/// Keep only the best-ranked member of each redirect chain, then trim to
/// `max_results`
fn cull_redirects(
    backend: &dyn HistoryBackend,
    history: &mut Vec<HistoryMatch>,
    max_results: usize,
) -> Result<()> {
    let mut source = 0;
    while source < history.len() && source < max_results {
        let url = history[source].row.url.clone();
        let mut redirects = backend.most_recent_redirects_from(&url)?;
        if redirects.is_empty() {
            source += 1;
            continue;
        }
        // the source may itself rank below one of its redirects
        redirects.push(url);
        source = remove_subsequent_matches_of(history, source, &redirects);
    }
    history.truncate(max_results);
    Ok(())
}

/// Remove all but the first match whose URL is in `remove`. Returns the
/// index after `source`, adjusted for removals before it.
fn remove_subsequent_matches_of(
    history: &mut Vec<HistoryMatch>,
    source: usize,
    remove: &[String],
) -> usize {
    let mut next_index = source + 1;
    let Some(first) = history.iter().position(|m| remove.contains(&m.row.url)) else {
        return next_index;
    };

    let mut i = first + 1;
    while i < history.len() {
        if remove.contains(&history[i].row.url) {
            history.remove(i);
            if i < next_index {
                next_index -= 1;
            }
        } else {
            i += 1;
        }
    }
    next_index
}

fn history_match_to_item(params: &PassParams, m: &HistoryMatch, kind: MatchKind) -> CompletionItem {
    let relevance = match kind {
        MatchKind::InlineAutocomplete => INLINE_AUTOCOMPLETE_RELEVANCE,
        MatchKind::Normal(below) => NORMAL_RELEVANCE_BASE + below as i32,
    };
    let mut item = CompletionItem::new(
        ProviderKind::HistoryUrl,
        relevance,
        m.row.visit_count > 0,
        CompletionType::HistoryUrl,
    );
    item.destination_url = m.row.url.clone();

    let trim_http = params.trim_http && !m.match_in_scheme;
    let mut match_start = m.input_location;
    let mut inline_offset = m.input_location.map(|l| l + params.text.len());
    item.fill_into_edit = format_url(&m.row.url, trim_http, &mut inline_offset);
    format_url(&m.row.url, trim_http, &mut match_start);
    item.contents = item.fill_into_edit.clone();

    let inline_offset = inline_offset.filter(|o| *o <= item.fill_into_edit.len());
    if !params.input.prevent_inline_autocomplete() {
        item.inline_autocomplete_offset = inline_offset;
    }

    item.contents_class = match (match_start, inline_offset) {
        (Some(start), Some(end)) if end > start => {
            classify_location(Some(start), end - start, item.contents.len(), Style::URL)
        }
        _ => classify_location(None, 0, item.contents.len(), Style::URL),
    };

    item.description = m.row.title.clone();
    item.description_class = classify_match_spans(&params.text, &m.row.title, Style::NONE);
    item
}
