//! Synthetic backends and HTML fixtures shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::scrape::http::{FetchedPage, Fetcher};

/// Makes the engine's logs visible under `cargo test -- --nocapture`.
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("listing_scout=debug")
        .try_init();
}

/// Canned-response fetcher. Routes are keyed by URL plus the value of the
/// paging cursor parameter, so one search URL can serve distinct pages per
/// offset. Unrouted requests get a 404.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    routes: Mutex<HashMap<(String, Option<String>), FetchedPage>>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, url: &str, body: &str) {
        self.on_status(url, 200, body);
    }

    pub fn on_status(&self, url: &str, status: u16, body: &str) {
        self.insert(url, None, status, body);
    }

    pub fn on_offset(&self, url: &str, offset: usize, body: &str) {
        self.insert(url, Some(offset.to_string()), 200, body);
    }

    pub fn on_offset_status(&self, url: &str, offset: usize, status: u16, body: &str) {
        self.insert(url, Some(offset.to_string()), status, body);
    }

    fn insert(&self, url: &str, offset: Option<String>, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            (url.to_string(), offset),
            FetchedPage {
                url: url.to_string(),
                status,
                body: body.to_string(),
            },
        );
    }

    /// Number of GETs issued against `url`, any parameters.
    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).count()
    }

    /// Paging cursor values of the GETs issued against `url`, in order.
    pub fn cursor_calls(&self, url: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .filter_map(|(_, q)| q.iter().find(|(k, _)| k == "s").map(|(_, v)| v.clone()))
            .collect()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<FetchedPage> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), query.to_vec()));
        let cursor = query.iter().find(|(k, _)| k == "s").map(|(_, v)| v.clone());
        let routes = self.routes.lock().unwrap();
        let page = routes
            .get(&(url.to_string(), cursor))
            .or_else(|| routes.get(&(url.to_string(), None)))
            .cloned()
            .unwrap_or(FetchedPage {
                url: url.to_string(),
                status: 404,
                body: String::new(),
            });
        Ok(page)
    }
}

/// One well-formed results row.
pub(crate) fn result_row(pid: u64) -> String {
    format!(
        r#"<li class="result-row" data-pid="{pid}">
            <span class="result-tags">pic</span>
            <a class="hdrlnk" href="/post/{pid}.html">listing {pid}</a>
            <time datetime="2026-08-01 10:00">aug 1</time>
            <span class="result-price">$100</span>
            <span class="result-hood"> (somewhere) </span>
        </li>"#
    )
}

/// A results page holding `count` rows with ids starting at `first_pid`.
pub(crate) fn results_page(first_pid: u64, count: usize, total: usize) -> String {
    let rows: String = (0..count as u64).map(|i| result_row(first_pid + i)).collect();
    format!(
        r#"<html><body>
            <span class="totalcount">{total}</span>
            <ul class="rows">{rows}</ul>
        </body></html>"#
    )
}

/// Site directory page declaring the given site ids.
pub(crate) fn sites_page(sites: &[&str]) -> String {
    let links: String = sites
        .iter()
        .map(|site| format!(r#"<a href="https://{site}.craigslist.org/">{site}</a>"#))
        .collect();
    format!(r#"<html><body><div class="box">{links}</div></body></html>"#)
}

/// Site front page declaring the given sub-area labels.
pub(crate) fn front_page(areas: &[&str]) -> String {
    let links: String = areas
        .iter()
        .map(|area| format!(r#"<li><a href="/{area}/">{area}</a></li>"#))
        .collect();
    format!(r#"<html><body><ul class="sublinks">{links}</ul></body></html>"#)
}

/// Listing detail page with a body, posting info, images and attributes.
pub(crate) fn detail_page(body: &str, attrs: &[&str]) -> String {
    let attr_spans: String = attrs
        .iter()
        .map(|attr| format!("<span>{attr}</span>"))
        .collect();
    format!(
        r#"<html><body>
            <section id="postingbody">{body}</section>
            <div class="postinginfos">
                <p>posted: <time datetime="2026-08-02T09:30:15-0700">aug 2</time></p>
            </div>
            <div id="map" data-latitude="37.7" data-longitude="-122.4"></div>
            <p class="attrgroup">{attr_spans}</p>
        </body></html>"#
    )
}
