use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::error::Result;
use crate::scrape::http::Fetcher;

/// A user-supplied filter value, normalized at the API boundary instead of
/// shape-sniffed at use time: a scalar behaves exactly like the singleton
/// sequence containing it.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Flag(bool),
    Text(String),
    Many(Vec<String>),
}

impl FilterValue {
    /// Whether a Constant filter's parameter should be emitted at all.
    pub fn truthy(&self) -> bool {
        match self {
            FilterValue::Flag(flag) => *flag,
            FilterValue::Text(text) => !text.is_empty(),
            FilterValue::Many(values) => !values.is_empty(),
        }
    }

    /// The value as a sequence of wire strings.
    pub fn normalized(&self) -> Vec<String> {
        match self {
            FilterValue::Flag(flag) => vec![flag.to_string()],
            FilterValue::Text(text) => vec![text.clone()],
            FilterValue::Many(values) => values.clone(),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(flag: bool) -> Self {
        FilterValue::Flag(flag)
    }
}

impl From<&str> for FilterValue {
    fn from(text: &str) -> Self {
        FilterValue::Text(text.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(text: String) -> Self {
        FilterValue::Text(text)
    }
}

impl From<u64> for FilterValue {
    fn from(number: u64) -> Self {
        FilterValue::Text(number.to_string())
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::Many(values)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// How a filter's user value turns into wire values.
#[derive(Debug, Clone)]
pub enum FilterKind {
    /// Wire value is the user value verbatim
    Passthrough,
    /// Fixed wire value, emitted only when the user value is truthy
    Constant(&'static str),
    /// Finite label → wire-code mapping; unmatched labels are dropped
    Enumerated(BTreeMap<String, String>),
}

/// One resolvable filter: its wire key, value semantics, and (for binary
/// filters) the marker text the detail page shows when the attribute is set.
#[derive(Debug, Clone)]
pub struct FilterDef {
    pub url_key: String,
    pub kind: FilterKind,
    pub attr_marker: Option<&'static str>,
}

impl FilterDef {
    pub fn passthrough(url_key: &str) -> Self {
        Self {
            url_key: url_key.to_string(),
            kind: FilterKind::Passthrough,
            attr_marker: None,
        }
    }

    pub fn constant(url_key: &str, value: &'static str) -> Self {
        Self {
            url_key: url_key.to_string(),
            kind: FilterKind::Constant(value),
            attr_marker: None,
        }
    }

    pub fn constant_with_marker(url_key: &str, value: &'static str, marker: &'static str) -> Self {
        Self {
            url_key: url_key.to_string(),
            kind: FilterKind::Constant(value),
            attr_marker: Some(marker),
        }
    }

    pub fn enumerated(url_key: &str, options: BTreeMap<String, String>) -> Self {
        Self {
            url_key: url_key.to_string(),
            kind: FilterKind::Enumerated(options),
            attr_marker: None,
        }
    }
}

/// Filters accepted for every category.
pub fn base_filters() -> HashMap<&'static str, FilterDef> {
    HashMap::from([
        ("query", FilterDef::passthrough("query")),
        ("search_titles", FilterDef::constant("srchType", "T")),
        ("has_image", FilterDef::constant("hasPic", "1")),
        ("posted_today", FilterDef::constant("postedToday", "1")),
        ("bundle_duplicates", FilterDef::constant("bundleDuplicates", "1")),
        ("search_distance", FilterDef::passthrough("search_distance")),
        ("zip_code", FilterDef::passthrough("postal")),
    ])
}

/// Process-wide cache of the enumerated filters a search page declares,
/// keyed by search URL. Populated on miss, never invalidated; `clear` exists
/// for tests. Two tasks racing on the same URL may fetch twice, which is
/// idempotent.
#[derive(Clone, Default)]
pub struct ListFilterCache {
    inner: Arc<Mutex<HashMap<String, Arc<HashMap<String, FilterDef>>>>>,
}

impl ListFilterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_fetch(
        &self,
        fetcher: &dyn Fetcher,
        url: &str,
    ) -> Result<Arc<HashMap<String, FilterDef>>> {
        if let Some(cached) = self.inner.lock().unwrap().get(url) {
            return Ok(cached.clone());
        }
        let page = fetcher.get(url, &[]).await?;
        if !page.is_success() {
            warn!(url, status = page.status, "list filter discovery returned non-success status");
        }
        let filters = Arc::new(parse_list_filters(&page.body));
        debug!(url, count = filters.len(), "discovered list filters");
        self.inner
            .lock()
            .unwrap()
            .insert(url.to_string(), filters.clone());
        Ok(filters)
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

/// Reads the enumerated filter vocabulary a search page declares in its
/// search-attribute widgets.
fn parse_list_filters(html: &str) -> HashMap<String, FilterDef> {
    let attribute_sel = Selector::parse("div.search-attribute").unwrap();
    let label_sel = Selector::parse("label").unwrap();
    let input_sel = Selector::parse("input").unwrap();

    let doc = Html::parse_document(html);
    let mut filters = HashMap::new();
    for widget in doc.select(&attribute_sel) {
        let Some(key) = widget.value().attr("data-attr") else {
            continue;
        };
        let mut options = BTreeMap::new();
        for label in widget.select(&label_sel) {
            let text = label.text().collect::<String>().trim().to_string();
            let value = label
                .select(&input_sel)
                .next()
                .and_then(|input| input.value().attr("value"));
            if let (false, Some(value)) = (text.is_empty(), value) {
                options.insert(text, value.to_string());
            }
        }
        filters.insert(key.to_string(), FilterDef::enumerated(key, options));
    }
    filters
}

/// Resolves raw user filters into wire parameters.
///
/// Lookup order per key: base filters, then category filters, then the
/// page's enumerated list filters. An unknown key or an unmatched enumerated
/// option is logged and skipped, never fatal.
pub fn resolve_filters(
    raw: &BTreeMap<String, FilterValue>,
    base: &HashMap<&'static str, FilterDef>,
    category: &HashMap<&'static str, FilterDef>,
    list: &HashMap<String, FilterDef>,
) -> Vec<(String, String)> {
    // A search with few results gets padded with listings from nearby areas.
    // Setting searchNearby without any nearbyArea values suppresses that
    // padding. Always on, not user-configurable.
    let mut params = vec![("searchNearby".to_string(), "1".to_string())];

    for (key, value) in raw {
        let def = base
            .get(key.as_str())
            .or_else(|| category.get(key.as_str()))
            .or_else(|| list.get(key));
        let Some(def) = def else {
            warn!("'{key}' is not a valid filter");
            continue;
        };
        match &def.kind {
            FilterKind::Passthrough => {
                for wire_value in value.normalized() {
                    params.push((def.url_key.clone(), wire_value));
                }
            }
            FilterKind::Constant(wire_value) => {
                if value.truthy() {
                    params.push((def.url_key.clone(), wire_value.to_string()));
                }
            }
            FilterKind::Enumerated(options) => {
                for option in value.normalized() {
                    match options.get(&option) {
                        Some(code) => params.push((def.url_key.clone(), code.clone())),
                        None => warn!("'{option}' is not a valid option for {key}"),
                    }
                }
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::testutil::FakeFetcher;

    fn enumerated_laundry() -> HashMap<String, FilterDef> {
        let options = BTreeMap::from([
            ("laundry in bldg".to_string(), "1".to_string()),
            ("w/d in unit".to_string(), "2".to_string()),
        ]);
        HashMap::from([(
            "laundry".to_string(),
            FilterDef::enumerated("laundry", options),
        )])
    }

    fn resolve(raw: &BTreeMap<String, FilterValue>) -> Vec<(String, String)> {
        resolve_filters(raw, &base_filters(), &HashMap::new(), &enumerated_laundry())
    }

    #[test]
    fn nearby_padding_suppression_is_always_injected() {
        let params = resolve(&BTreeMap::new());
        assert_eq!(params, vec![("searchNearby".to_string(), "1".to_string())]);
    }

    #[test]
    fn unknown_key_is_dropped_without_error() {
        let raw = BTreeMap::from([("no_such_filter".to_string(), FilterValue::from("x"))]);
        let params = resolve(&raw);
        assert!(!params.iter().any(|(k, _)| k == "no_such_filter"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn passthrough_keeps_value_verbatim() {
        let raw = BTreeMap::from([("query".to_string(), FilterValue::from("red bike"))]);
        let params = resolve(&raw);
        assert!(params.contains(&("query".to_string(), "red bike".to_string())));
    }

    #[test]
    fn constant_emitted_only_when_truthy() {
        let raw = BTreeMap::from([("has_image".to_string(), FilterValue::from(true))]);
        let params = resolve(&raw);
        assert!(params.contains(&("hasPic".to_string(), "1".to_string())));

        let raw = BTreeMap::from([("has_image".to_string(), FilterValue::from(false))]);
        let params = resolve(&raw);
        assert!(!params.iter().any(|(k, _)| k == "hasPic"));
    }

    #[test]
    fn scalar_resolves_like_singleton_sequence() {
        let scalar = BTreeMap::from([("laundry".to_string(), FilterValue::from("w/d in unit"))]);
        let singleton =
            BTreeMap::from([("laundry".to_string(), FilterValue::from(vec!["w/d in unit"]))]);
        assert_eq!(resolve(&scalar), resolve(&singleton));
    }

    #[test]
    fn unmatched_enumerated_option_is_dropped_matched_kept() {
        let raw = BTreeMap::from([(
            "laundry".to_string(),
            FilterValue::from(vec!["laundry in bldg", "bogus option"]),
        )]);
        let params = resolve(&raw);
        let laundry: Vec<_> = params.iter().filter(|(k, _)| k == "laundry").collect();
        assert_eq!(laundry, vec![&("laundry".to_string(), "1".to_string())]);
    }

    #[test]
    fn passthrough_sequence_repeats_the_key() {
        let raw = BTreeMap::from([("query".to_string(), FilterValue::from(vec!["a", "b"]))]);
        let params = resolve(&raw);
        let values: Vec<_> = params
            .iter()
            .filter(|(k, _)| k == "query")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn parses_declared_list_filters() {
        let html = r#"
            <div class="search-attribute" data-attr="laundry">
                <label><input value="1"> laundry in bldg </label>
                <label><input value="2"> w/d in unit </label>
            </div>
            <div class="search-attribute">
                <label><input value="9"> ignored, no key </label>
            </div>
        "#;
        let filters = parse_list_filters(html);
        assert_eq!(filters.len(), 1);
        let def = &filters["laundry"];
        assert_eq!(def.url_key, "laundry");
        match &def.kind {
            FilterKind::Enumerated(options) => {
                assert_eq!(options["laundry in bldg"], "1");
                assert_eq!(options["w/d in unit"], "2");
            }
            other => panic!("expected enumerated filter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cache_populates_on_miss_and_clears() {
        let fake = FakeFetcher::new();
        fake.on(
            "https://x.test/search/hhh",
            r#"<div class="search-attribute" data-attr="laundry">
                <label><input value="1">laundry in bldg</label></div>"#,
        );
        let cache = ListFilterCache::new();

        let first = cache.get_or_fetch(&fake, "https://x.test/search/hhh").await.unwrap();
        let second = cache.get_or_fetch(&fake, "https://x.test/search/hhh").await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(fake.call_count("https://x.test/search/hhh"), 1);

        cache.clear();
        cache.get_or_fetch(&fake, "https://x.test/search/hhh").await.unwrap();
        assert_eq!(fake.call_count("https://x.test/search/hhh"), 2);
    }
}
