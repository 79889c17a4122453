//! The merged, ordered list of completion items shown in the popup.

use crate::completion::classify;
use crate::completion::item::CompletionItem;
use crate::completion::provider::ProviderKind;
use std::cmp::Ordering;

/// What the previous default item was, so a rebuilt result can keep it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub destination_url: String,
    pub provider_affinity: Option<ProviderKind>,
    pub is_history_what_you_typed_match: bool,
}

impl Selection {
    pub fn of(item: &CompletionItem) -> Self {
        Self {
            destination_url: item.destination_url.clone(),
            provider_affinity: Some(item.provider),
            is_history_what_you_typed_match: item.is_history_what_you_typed_match,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    items: Vec<CompletionItem>,
    default_index: Option<usize>,
    max_matches: usize,
}

impl CompletionResult {
    pub fn new(max_matches: usize) -> Self {
        Self {
            items: Vec::new(),
            default_index: None,
            max_matches,
        }
    }

    pub fn max_matches(&self) -> usize {
        self.max_matches
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompletionItem> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&CompletionItem> {
        self.items.get(index)
    }

    pub fn default_index(&self) -> Option<usize> {
        self.default_index
    }

    pub fn default_item(&self) -> Option<&CompletionItem> {
        self.default_index.and_then(|i| self.items.get(i))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.default_index = None;
    }

    /// Insert keeping best-first order. Equal items keep arrival order.
    pub fn add(&mut self, item: CompletionItem) {
        debug_assert!(classify::spans_are_valid(&item.contents, &item.contents_class));
        debug_assert!(classify::spans_are_valid(&item.description, &item.description_class));

        let at = self
            .items
            .partition_point(|existing| CompletionItem::more_relevant(existing, &item) != Ordering::Greater);
        self.items.insert(at, item);
        self.default_index = None;
    }

    /// Append unsorted; call `sort_and_cull` afterwards
    pub fn append(&mut self, items: &[CompletionItem]) {
        self.items.extend_from_slice(items);
        self.default_index = None;
    }

    /// Keep the best item per destination, trim to capacity, lift
    /// suppression from the survivors and sort best first.
    pub fn sort_and_cull(&mut self) {
        self.items.sort_by(CompletionItem::destination_then_relevance);
        self.items
            .dedup_by(|later, kept| later.destination_url == kept.destination_url);

        if self.items.len() > self.max_matches {
            self.items.sort_by(CompletionItem::more_relevant);
            self.items.truncate(self.max_matches);
        }

        for item in &mut self.items {
            item.suppressed = false;
        }

        self.items.sort_by(CompletionItem::more_relevant);
        self.default_index = None;

        debug_assert!(self.destinations_are_unique());
    }

    /// Pick the default item. Returns true when `selection` matched an
    /// item exactly.
    pub fn select_default(&mut self, selection: &Selection) -> bool {
        self.default_index = None;

        for (index, item) in self.items.iter().enumerate() {
            if !selection.destination_url.is_empty()
                && item.destination_url == selection.destination_url
            {
                self.default_index = Some(index);
                return true;
            }
            if selection.is_history_what_you_typed_match && item.is_history_what_you_typed_match {
                self.default_index = Some(index);
                return true;
            }

            let Some(current) = self.default_index.map(|i| &self.items[i]) else {
                self.default_index = Some(index);
                continue;
            };

            let better = if selection.provider_affinity == Some(item.provider) {
                selection.provider_affinity != Some(current.provider)
                    || current.relevance < item.relevance
            } else {
                selection.provider_affinity != Some(current.provider)
                    && current.relevance < item.relevance
            };
            if better {
                self.default_index = Some(index);
            }
        }
        false
    }

    fn destinations_are_unique(&self) -> bool {
        let mut urls: Vec<&str> = self.items.iter().map(|i| i.destination_url.as_str()).collect();
        urls.sort_unstable();
        urls.windows(2).all(|w| w[0] != w[1])
    }
}

impl<'a> IntoIterator for &'a CompletionResult {
    type Item = &'a CompletionItem;
    type IntoIter = std::slice::Iter<'a, CompletionItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::item::{Classification, CompletionType, Style};

    fn item(provider: ProviderKind, relevance: i32, url: &str) -> CompletionItem {
        let mut item = CompletionItem::new(provider, relevance, false, CompletionType::HistoryUrl);
        item.destination_url = url.to_string();
        item.contents = url.to_string();
        item.contents_class = vec![Classification::new(0, Style::URL)];
        item
    }

    /// Deterministic pseudo-random item sets
    fn generated_sets() -> Vec<Vec<CompletionItem>> {
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        let providers = [
            ProviderKind::HistoryUrl,
            ProviderKind::Search,
            ProviderKind::HistoryContents,
            ProviderKind::Keyword,
        ];

        (0..200)
            .map(|_| {
                let len = (next() % 15) as usize;
                (0..len)
                    .map(|_| {
                        let mut it = item(
                            providers[(next() % 4) as usize],
                            (next() % 1500) as i32,
                            &format!("http://site{}.com/", next() % 8),
                        );
                        it.suppressed = next() % 5 == 0;
                        it
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_add_keeps_order() {
        let mut result = CompletionResult::new(6);
        result.add(item(ProviderKind::HistoryUrl, 900, "http://a/"));
        result.add(item(ProviderKind::Search, 1300, "http://b/"));
        result.add(item(ProviderKind::HistoryUrl, 1000, "http://c/"));

        let relevances: Vec<_> = result.iter().map(|i| i.relevance).collect();
        assert_eq!(relevances, vec![1300, 1000, 900]);
    }

    #[test]
    fn test_sort_and_cull_dedupes() {
        let mut result = CompletionResult::new(6);
        result.append(&[
            item(ProviderKind::HistoryUrl, 900, "http://a/"),
            item(ProviderKind::HistoryContents, 1200, "http://a/"),
            item(ProviderKind::Search, 1300, "http://b/"),
        ]);
        result.sort_and_cull();

        assert_eq!(result.len(), 2);
        assert_eq!(result.get(1).unwrap().provider, ProviderKind::HistoryContents);
    }

    #[test]
    fn test_suppressed_items_lose_then_recover() {
        let mut result = CompletionResult::new(2);
        let mut hidden = item(ProviderKind::HistoryContents, 1000, "http://hidden/");
        hidden.suppressed = true;
        result.append(&[
            hidden,
            item(ProviderKind::HistoryUrl, 900, "http://a/"),
            item(ProviderKind::HistoryUrl, 901, "http://b/"),
        ]);
        result.sort_and_cull();
        assert!(result.iter().all(|i| i.destination_url != "http://hidden/"));

        let mut hidden = item(ProviderKind::HistoryContents, 1000, "http://hidden/");
        hidden.suppressed = true;
        let mut result = CompletionResult::new(6);
        result.append(&[hidden, item(ProviderKind::HistoryUrl, 900, "http://a/")]);
        result.sort_and_cull();
        assert_eq!(result.get(0).unwrap().destination_url, "http://hidden/");
        assert!(!result.get(0).unwrap().suppressed);
    }

    #[test]
    fn test_cull_properties() {
        for set in generated_sets() {
            let mut once = CompletionResult::new(6);
            once.append(&set);
            once.sort_and_cull();

            assert!(once.len() <= 6);
            assert!(once.destinations_are_unique());
            assert!(once
                .items
                .windows(2)
                .all(|w| CompletionItem::more_relevant(&w[0], &w[1]) != Ordering::Greater));

            let mut twice = once.clone();
            twice.sort_and_cull();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_select_default_exact() {
        let mut result = CompletionResult::new(6);
        result.append(&[
            item(ProviderKind::Search, 1300, "http://search/"),
            item(ProviderKind::HistoryUrl, 900, "http://a/"),
        ]);
        result.sort_and_cull();

        let selection = Selection {
            destination_url: "http://a/".into(),
            ..Default::default()
        };
        assert!(result.select_default(&selection));
        assert_eq!(result.default_item().unwrap().destination_url, "http://a/");

        assert!(!result.select_default(&Selection::default()));
        assert_eq!(result.default_index(), Some(0));
    }

    #[test]
    fn test_select_default_provider_affinity() {
        let mut result = CompletionResult::new(6);
        result.append(&[
            item(ProviderKind::Search, 1300, "http://search/"),
            item(ProviderKind::HistoryUrl, 900, "http://a/"),
            item(ProviderKind::HistoryUrl, 950, "http://b/"),
        ]);
        result.sort_and_cull();

        let selection = Selection {
            destination_url: "http://gone/".into(),
            provider_affinity: Some(ProviderKind::HistoryUrl),
            is_history_what_you_typed_match: false,
        };
        assert!(!result.select_default(&selection));
        assert_eq!(result.default_item().unwrap().destination_url, "http://b/");
    }

    #[test]
    fn test_select_default_history_what_you_typed() {
        let mut result = CompletionResult::new(6);
        let mut wyt = item(ProviderKind::HistoryUrl, 1200, "http://typed/");
        wyt.is_history_what_you_typed_match = true;
        result.append(&[item(ProviderKind::Search, 1300, "http://search/"), wyt]);
        result.sort_and_cull();

        let selection = Selection {
            is_history_what_you_typed_match: true,
            ..Default::default()
        };
        assert!(result.select_default(&selection));
        assert_eq!(result.default_item().unwrap().destination_url, "http://typed/");
    }
}
