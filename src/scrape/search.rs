use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Result, ScoutError};
use crate::models::ListingSummary;
use crate::scrape::categories::Category;
use crate::scrape::detail::{apply_detail, apply_geotag, AttrMap};
use crate::scrape::extract::extract_page;
use crate::scrape::filters::{base_filters, resolve_filters, FilterValue, ListFilterCache};
use crate::scrape::http::{Fetcher, HttpClient};
use crate::scrape::sites::{search_url, SiteDirectory};

/// Number of rows the site returns per search page. A shorter page is the
/// last one.
pub const RESULTS_PER_PAGE: usize = 100;

/// Worker count for batch enrichment when the caller has no preference
pub const DEFAULT_ENRICH_WORKERS: usize = 8;

/// Result ordering, mapped to the site's wire sort codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Newest,
    PriceAsc,
    PriceDesc,
}

impl SortOrder {
    pub fn wire_code(self) -> &'static str {
        match self {
            SortOrder::Newest => "date",
            SortOrder::PriceAsc => "priceasc",
            SortOrder::PriceDesc => "pricedsc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "price_asc" => Ok(SortOrder::PriceAsc),
            "price_desc" => Ok(SortOrder::PriceDesc),
            other => Err(ScoutError::Configuration(format!(
                "'{other}' is not a valid sort order, use: 'newest', 'price_asc' or 'price_desc'"
            ))),
        }
    }
}

/// What to search for: site, optional sub-area, category and raw filters.
/// Immutable once resolved by [`Scraper::search`].
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub site: String,
    pub area: Option<String>,
    pub category: Category,
    pub filters: BTreeMap<String, FilterValue>,
}

impl SearchQuery {
    pub fn new(site: impl Into<String>, category: Category) -> Self {
        Self {
            site: site.into(),
            area: None,
            category,
            filters: BTreeMap::new(),
        }
    }

    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Options for one production run over a resolved search
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Cap on the number of records yielded across the whole run
    pub limit: Option<usize>,
    /// Paging cursor to resume from
    pub start: usize,
    pub sort_by: Option<SortOrder>,
}

impl SearchOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    pub fn sort_by(mut self, sort_by: SortOrder) -> Self {
        self.sort_by = Some(sort_by);
        self
    }
}

/// Which enrichment fetch results to keep. Either flag costs at most one
/// extra fetch per listing; both set costs the same single fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichOptions {
    pub geotag: bool,
    pub detail: bool,
}

impl EnrichOptions {
    pub fn geotag(mut self) -> Self {
        self.geotag = true;
        self
    }

    pub fn detail(mut self) -> Self {
        self.detail = true;
        self
    }
}

/// Entry point: owns the HTTP client, the site directory and the
/// process-wide list-filter cache.
pub struct Scraper {
    fetcher: Arc<dyn Fetcher>,
    directory: SiteDirectory,
    list_filters: ListFilterCache,
}

impl Scraper {
    pub fn new() -> Result<Self> {
        Ok(Self::with_fetcher(Arc::new(HttpClient::new()?)))
    }

    /// Builds a scraper over any page source; tests use this with synthetic
    /// backends.
    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            directory: SiteDirectory::new(fetcher.clone()),
            list_filters: ListFilterCache::new(),
            fetcher,
        }
    }

    /// Replaces the list-filter cache, e.g. to share one across scrapers or
    /// to clear it between tests.
    pub fn with_list_filter_cache(mut self, cache: ListFilterCache) -> Self {
        self.list_filters = cache;
        self
    }

    pub fn directory(&self) -> &SiteDirectory {
        &self.directory
    }

    pub fn list_filter_cache(&self) -> &ListFilterCache {
        &self.list_filters
    }

    /// Validates the query and resolves its filters into wire parameters.
    ///
    /// Site and sub-area problems surface here as configuration errors,
    /// before any paginated fetch.
    pub async fn search(&self, query: SearchQuery) -> Result<Search> {
        self.directory.validate_site(&query.site).await?;
        if let Some(area) = &query.area {
            self.directory.validate_area(&query.site, area).await?;
        }

        let url = search_url(&query.site, query.area.as_deref(), query.category.code());
        let category_filters = query.category.filters();
        let list_filters = self
            .list_filters
            .get_or_fetch(self.fetcher.as_ref(), &url)
            .await?;
        let params = resolve_filters(
            &query.filters,
            &base_filters(),
            &category_filters,
            &list_filters,
        );
        let attr_map = AttrMap::new(&category_filters, &list_filters);
        info!(url = %url, "search resolved");

        Ok(Search {
            fetcher: self.fetcher.clone(),
            url,
            category: query.category,
            params,
            attr_map,
        })
    }
}

/// A validated query with resolved wire parameters. Cheap to reuse for
/// several production runs and for enrichment passes.
pub struct Search {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    category: Category,
    params: Vec<(String, String)>,
    attr_map: AttrMap,
}

impl fmt::Debug for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("url", &self.url)
            .field("category", &self.category)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Search {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn wire_params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Starts a lazy production run. The run is not restartable in place;
    /// resume by building a new one with [`SearchOptions::start`].
    pub fn results(&self, options: SearchOptions) -> ResultStream {
        let mut params = self.params.clone();
        if let Some(sort_by) = options.sort_by {
            params.push(("sort".to_string(), sort_by.wire_code().to_string()));
        }
        ResultStream {
            fetcher: self.fetcher.clone(),
            url: self.url.clone(),
            params,
            category: self.category,
            limit: options.limit,
            start: options.start,
            yielded: 0,
            buffer: VecDeque::new(),
            exhausted: false,
            first_page: true,
            total_hint: None,
        }
    }

    /// Approximate number of results the site advertises for this search.
    ///
    /// Costs one extra fetch; usually within a few records of the actual
    /// count, and `None` when the page carries no hint.
    pub async fn approx_count(&self) -> Result<Option<u64>> {
        let page = self.fetcher.get(&self.url, &self.params).await?;
        if !page.is_success() {
            return Err(ScoutError::Fetch {
                url: page.url,
                status: page.status,
            });
        }
        Ok(extract_page(&page.body, &self.url, self.category).total_hint)
    }

    /// Fetches the listing's own page and attaches geotag and/or detail
    /// fields. Failure degrades the one listing and is never fatal.
    pub async fn enrich(&self, listing: &mut ListingSummary, options: EnrichOptions) {
        enrich_one(self.fetcher.as_ref(), &self.attr_map, listing, options).await;
    }

    /// Enriches a materialized batch with a pool of worker tasks draining
    /// a shared queue. Pass `None` for [`DEFAULT_ENRICH_WORKERS`]. Returns
    /// the listings in their input order once every worker has finished;
    /// one listing's failure never affects the others.
    pub async fn enrich_batch(
        &self,
        listings: Vec<ListingSummary>,
        options: EnrichOptions,
        workers: Option<usize>,
    ) -> Vec<ListingSummary> {
        let total = listings.len();
        if total == 0 {
            return listings;
        }
        let workers = workers.unwrap_or(DEFAULT_ENRICH_WORKERS).clamp(1, total);

        // Channel holds the whole batch up front, so queueing never blocks.
        let (task_tx, task_rx) = mpsc::channel::<(usize, ListingSummary)>(total);
        for task in listings.into_iter().enumerate() {
            let _ = task_tx.send(task).await;
        }
        drop(task_tx);
        let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));

        let (done_tx, mut done_rx) = mpsc::channel::<(usize, ListingSummary)>(total);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let task_rx = task_rx.clone();
            let done_tx = done_tx.clone();
            let fetcher = self.fetcher.clone();
            let attr_map = self.attr_map.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let task = task_rx.lock().await.recv().await;
                    let Some((index, mut listing)) = task else {
                        break;
                    };
                    debug!(worker, index, "enriching listing");
                    enrich_one(fetcher.as_ref(), &attr_map, &mut listing, options).await;
                    let _ = done_tx.send((index, listing)).await;
                }
            }));
        }
        drop(done_tx);

        let mut slots: Vec<Option<ListingSummary>> = (0..total).map(|_| None).collect();
        while let Some((index, listing)) = done_rx.recv().await {
            slots[index] = Some(listing);
        }
        // Join barrier: the batch is complete only when every worker exited.
        for handle in handles {
            let _ = handle.await;
        }
        slots.into_iter().flatten().collect()
    }
}

async fn enrich_one(
    fetcher: &dyn Fetcher,
    attr_map: &AttrMap,
    listing: &mut ListingSummary,
    options: EnrichOptions,
) {
    if !options.geotag && !options.detail {
        return;
    }
    let page = match fetcher.get(&listing.url, &[]).await {
        Ok(page) if page.is_success() => page,
        Ok(page) => {
            warn!(
                url = %listing.url,
                status = page.status,
                "detail fetch returned non-success status, skipping"
            );
            return;
        }
        Err(err) => {
            warn!(url = %listing.url, error = %err, "detail fetch failed, skipping");
            return;
        }
    };
    if options.geotag {
        apply_geotag(listing, &page.body);
    }
    if options.detail {
        apply_detail(listing, &page.body, attr_map);
    }
}

/// Lazy pagination cursor over one search.
///
/// Each page fetch blocks the run; records come out in document order, and
/// no cross-page deduplication is done. A non-success page status ends the
/// run with a fatal error, but everything already yielded stays valid.
pub struct ResultStream {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    params: Vec<(String, String)>,
    category: Category,
    limit: Option<usize>,
    start: usize,
    yielded: usize,
    buffer: VecDeque<ListingSummary>,
    exhausted: bool,
    first_page: bool,
    total_hint: Option<u64>,
}

impl ResultStream {
    /// Next record, fetching the next page when the current one is drained.
    pub async fn next(&mut self) -> Result<Option<ListingSummary>> {
        loop {
            if let Some(limit) = self.limit {
                if self.yielded >= limit {
                    return Ok(None);
                }
            }
            if let Some(listing) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(listing));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        // The paging cursor always equals start offset plus records yielded;
        // a page is only fetched once the previous one is fully drained.
        let offset = self.start + self.yielded;
        let mut params = self.params.clone();
        params.push(("s".to_string(), offset.to_string()));

        let page = self.fetcher.get(&self.url, &params).await?;
        if !page.is_success() {
            self.exhausted = true;
            return Err(ScoutError::Fetch {
                url: page.url,
                status: page.status,
            });
        }

        let extracted = extract_page(&page.body, &self.url, self.category);
        if self.first_page {
            self.first_page = false;
            self.total_hint = extracted.total_hint;
            debug!(total = ?self.total_hint, "approximate total count");
        }

        // Termination keys off the rows the page carried, not off the
        // records extracted from them: a full page with a malformed row is
        // still a full page.
        let rows_on_page = extracted.row_count;
        if rows_on_page < RESULTS_PER_PAGE {
            self.exhausted = true;
        }
        self.buffer.extend(extracted.listings);
        if let Some(limit) = self.limit {
            // Cap reached mid-page: keep what fits, no error.
            let remaining = limit.saturating_sub(self.yielded);
            if self.buffer.len() > remaining {
                self.buffer.truncate(remaining);
            }
        }
        debug!(offset, rows_on_page, "extracted page");
        Ok(())
    }

    /// Total-count hint read off the first page. Diagnostic only: it never
    /// influences termination, and stays `None` until the first fetch or
    /// when the page carries no hint.
    pub fn approx_count(&self) -> Option<u64> {
        self.total_hint
    }

    /// Records yielded so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Drains the run into a vector.
    pub async fn collect(mut self) -> Result<Vec<ListingSummary>> {
        let mut listings = Vec::new();
        while let Some(listing) = self.next().await? {
            listings.push(listing);
        }
        Ok(listings)
    }
}
