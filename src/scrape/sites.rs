use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use scraper::{Html, Selector};
use tracing::debug;

use crate::error::{Result, ScoutError};
use crate::scrape::http::Fetcher;

pub(crate) const SITES_DIRECTORY_URL: &str = "https://www.craigslist.org/about/sites";

/// Base URL of one site
pub fn site_url(site: &str) -> String {
    format!("https://{site}.craigslist.org")
}

/// Search URL for a site, optional sub-area and category path code
pub fn search_url(site: &str, area: Option<&str>, category_code: &str) -> String {
    match area {
        Some(area) => format!("https://{site}.craigslist.org/search/{area}/{category_code}"),
        None => format!("https://{site}.craigslist.org/search/{category_code}"),
    }
}

/// Directory of known site identifiers and per-site sub-area labels.
///
/// Both lists live on the external property and are fetched at most once
/// each, then cached for the process lifetime. The lock is never held across
/// a fetch, so two tasks racing on a cold cache may fetch the same page
/// twice; the second result simply overwrites the first.
pub struct SiteDirectory {
    fetcher: Arc<dyn Fetcher>,
    sites: Mutex<Option<Arc<HashSet<String>>>>,
    areas: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl SiteDirectory {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            sites: Mutex::new(None),
            areas: Mutex::new(HashMap::new()),
        }
    }

    /// All site identifiers the directory page declares.
    pub async fn known_sites(&self) -> Result<Arc<HashSet<String>>> {
        if let Some(cached) = self.sites.lock().unwrap().clone() {
            return Ok(cached);
        }
        let page = self.fetcher.get(SITES_DIRECTORY_URL, &[]).await?;
        if !page.is_success() {
            return Err(ScoutError::Fetch {
                url: page.url,
                status: page.status,
            });
        }
        let sites = Arc::new(parse_site_directory(&page.body));
        debug!(count = sites.len(), "loaded site directory");
        *self.sites.lock().unwrap() = Some(sites.clone());
        Ok(sites)
    }

    /// Sub-area labels a site's front page declares.
    pub async fn known_areas(&self, site: &str) -> Result<Arc<Vec<String>>> {
        if let Some(cached) = self.areas.lock().unwrap().get(site).cloned() {
            return Ok(cached);
        }
        let url = site_url(site);
        let page = self.fetcher.get(&url, &[]).await?;
        if !page.is_success() {
            return Err(ScoutError::Fetch {
                url: page.url,
                status: page.status,
            });
        }
        let areas = Arc::new(parse_sublinks(&page.body));
        debug!(site, count = areas.len(), "loaded sub-areas");
        self.areas
            .lock()
            .unwrap()
            .insert(site.to_string(), areas.clone());
        Ok(areas)
    }

    pub async fn validate_site(&self, site: &str) -> Result<()> {
        if self.known_sites().await?.contains(site) {
            Ok(())
        } else {
            Err(ScoutError::Configuration(format!(
                "'{site}' is not a valid site"
            )))
        }
    }

    /// Membership is by label match against the front page's sub-area links.
    pub async fn validate_area(&self, site: &str, area: &str) -> Result<()> {
        if self.known_areas(site).await?.iter().any(|a| a == area) {
            Ok(())
        } else {
            Err(ScoutError::Configuration(format!(
                "'{area}' is not a valid area for site '{site}'"
            )))
        }
    }
}

fn parse_site_directory(html: &str) -> HashSet<String> {
    let link_sel = Selector::parse("div.box a").unwrap();

    let doc = Html::parse_document(html);
    let mut sites = HashSet::new();
    for link in doc.select(&link_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        // hrefs look like https://sfbay.craigslist.org; the site id is the
        // subdomain.
        let site = href
            .split("//")
            .last()
            .unwrap_or(href)
            .split('.')
            .next()
            .unwrap_or("");
        if !site.is_empty() {
            sites.insert(site.to_string());
        }
    }
    sites
}

fn parse_sublinks(html: &str) -> Vec<String> {
    let link_sel = Selector::parse("ul.sublinks li a").unwrap();

    let doc = Html::parse_document(html);
    doc.select(&link_sel)
        .map(|a| a.text().collect::<String>().trim().to_string())
        .filter(|label| !label.is_empty())
        .collect()
}
