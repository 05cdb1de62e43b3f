use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use crate::models::ListingSummary;
use crate::scrape::categories::Category;

/// Everything taken from one search-results page.
#[derive(Debug)]
pub struct ExtractedPage {
    /// Listings in document order; document order defines output ordering
    pub listings: Vec<ListingSummary>,
    /// Rows the page carried, counting malformed ones that yielded no
    /// listing. Termination logic keys off this, not off `listings`.
    pub row_count: usize,
    /// Approximate total result count the page advertises, when present
    pub total_hint: Option<u64>,
}

/// Extracts every listing row of a search page, in document order, plus the
/// page's total-count hint.
pub fn extract_page(html: &str, base_url: &str, category: Category) -> ExtractedPage {
    let row_sel = Selector::parse("ul.rows > li.result-row").unwrap();
    let total_sel = Selector::parse("span.totalcount").unwrap();

    let doc = Html::parse_document(html);
    let mut listings = Vec::new();
    let mut row_count = 0;
    for row in doc.select(&row_sel) {
        row_count += 1;
        match extract_row(&row, base_url, category) {
            Some(listing) => listings.push(listing),
            None => warn!(base_url, "skipping malformed result row"),
        }
    }
    let total_hint = doc
        .select(&total_sel)
        .next()
        .and_then(|el| el.text().collect::<String>().trim().parse().ok());

    ExtractedPage {
        listings,
        row_count,
        total_hint,
    }
}

/// Builds one summary from a results row. Returns `None` when the row lacks
/// its id or link, which only happens when the site's structure drifted.
pub fn extract_row(
    row: &ElementRef<'_>,
    base_url: &str,
    category: Category,
) -> Option<ListingSummary> {
    let link_sel = Selector::parse("a.hdrlnk").unwrap();
    let time_sel = Selector::parse("time").unwrap();
    let fallback_sel = Selector::parse("span.pl").unwrap();
    let price_sel = Selector::parse("span.result-price").unwrap();
    let hood_sel = Selector::parse("span.result-hood").unwrap();
    let tags_sel = Selector::parse("span.result-tags").unwrap();

    let id = row.value().attr("data-pid")?;
    let link = row.select(&link_sel).next()?;
    let href = link.value().attr("href")?;
    let name = link.text().collect::<String>().trim().to_string();

    let mut listing = ListingSummary::new(id, name, absolutize(base_url, href));
    listing.repost_of = row.value().attr("data-repost-of").map(str::to_string);

    // Rows normally carry a <time> element; older renderings fall back to a
    // "label: title" prefix span.
    listing.last_updated = match row.select(&time_sel).next() {
        Some(time) => time.value().attr("datetime").map(str::to_string),
        None => row.select(&fallback_sel).next().map(|pl| {
            let text = pl.text().collect::<String>();
            text.split(':').next().unwrap_or("").trim().to_string()
        }),
    };

    listing.price = row
        .select(&price_sel)
        .next()
        .map(|price| price.text().collect::<String>().trim().to_string());

    listing.neighborhood = row.select(&hood_sel).next().map(|hood| {
        let text = hood.text().collect::<String>();
        let text = text.trim();
        text.strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(text)
            .to_string()
    });

    let tags = row
        .select(&tags_sel)
        .next()
        .map(|tags| tags.text().collect::<String>())
        .unwrap_or_default();
    listing.has_image = tags.contains("pic");

    category.customize_row(&mut listing, row);
    Some(listing)
}

/// Resolves a row's link against the search page URL.
fn absolutize(base_url: &str, href: &str) -> String {
    Url::parse(base_url)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}
