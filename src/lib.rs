//! Structured listing retrieval from craigslist search pages.
//!
//! A [`Scraper`] resolves a [`SearchQuery`] (site, optional sub-area,
//! category, filters) into a validated [`Search`], which lazily pages
//! through search results yielding [`ListingSummary`] records. Listings can
//! then be enriched one at a time or in a bounded worker-pool batch with
//! geotags and detail-page fields.
//!
//! ```no_run
//! use listing_scout::{Category, Scraper, SearchOptions, SearchQuery};
//!
//! # async fn run() -> listing_scout::Result<()> {
//! let scraper = Scraper::new()?;
//! let query = SearchQuery::new("sfbay", Category::Housing)
//!     .area("sfc")
//!     .filter("max_price", "2500")
//!     .filter("cats_ok", true);
//! let search = scraper.search(query).await?;
//!
//! let mut results = search.results(SearchOptions::default().limit(20));
//! while let Some(listing) = results.next().await? {
//!     println!("{} {}", listing.id, listing.name);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod models;
pub mod scrape;

pub use error::{Result, ScoutError};
pub use models::{Geotag, ListingDetail, ListingSummary};
pub use scrape::categories::Category;
pub use scrape::filters::{FilterValue, ListFilterCache};
pub use scrape::http::{FetchedPage, Fetcher, HttpClient};
pub use scrape::search::{
    EnrichOptions, ResultStream, Scraper, Search, SearchOptions, SearchQuery, SortOrder,
    DEFAULT_ENRICH_WORKERS, RESULTS_PER_PAGE,
};
pub use scrape::sites::SiteDirectory;
