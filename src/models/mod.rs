use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair parsed from a listing's map marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geotag {
    pub latitude: f64,
    pub longitude: f64,
}

/// Compact record built directly from one search-results row.
///
/// Identity is the `(id, site)` pair; within one crawl reposts can duplicate
/// content under different ids, so no further uniqueness is guaranteed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: String,
    /// Id of the posting this one is a repost of, when the site says so
    pub repost_of: Option<String>,
    pub name: String,
    /// Absolute URL of the listing's own page
    pub url: String,
    /// Last-updated timestamp as reported by the site, or the row's fallback
    /// label when no timestamp element is present
    pub last_updated: Option<String>,
    /// Currency-formatted price string exactly as the site renders it
    pub price: Option<String>,
    /// Neighborhood label with the surrounding parentheses stripped
    pub neighborhood: Option<String>,
    pub has_image: bool,
    pub geotag: Option<Geotag>,
    /// True when the posting was present in the results list but its own
    /// page had already been removed by the time it was fetched
    pub deleted: bool,
    pub scraped_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<ListingDetail>,
    /// Category-specific fields (e.g. bedrooms) and fields mapped from
    /// detail-page attribute tokens
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ListingSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repost_of: None,
            name: name.into(),
            url: url.into(),
            last_updated: None,
            price: None,
            neighborhood: None,
            has_image: false,
            geotag: None,
            deleted: false,
            scraped_at: Utc::now(),
            detail: None,
            extra: BTreeMap::new(),
        }
    }
}

/// Richer record produced only by fetching a listing's own page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDetail {
    /// Free-text posting body (direct text of the body container only)
    pub body: String,
    /// Creation timestamp, distinct from `last_updated`
    pub created: Option<String>,
    /// Image URLs in document order, thumbnails rewritten to full size
    pub images: Vec<String>,
    /// Raw attribute tokens in document order
    pub attrs: Vec<String>,
    pub address: Option<String>,
}
