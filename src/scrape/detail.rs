use std::collections::HashMap;

use scraper::{Html, Node, Selector};
use serde_json::Value;
use tracing::debug;

use crate::models::{Geotag, ListingDetail, ListingSummary};
use crate::scrape::filters::{FilterDef, FilterKind};

const THUMB_SIZE: &str = "50x50c";
const FULL_SIZE: &str = "600x450";

/// Lookup tables for mapping a detail page's raw attribute tokens back onto
/// filter keys: marker texts set boolean fields, enumerated option labels
/// set labeled fields.
#[derive(Debug, Clone, Default)]
pub struct AttrMap {
    /// (filter key, lowercase marker text) for binary filters
    flags: Vec<(String, String)>,
    /// (filter key, option labels) for enumerated filters
    labeled: Vec<(String, Vec<String>)>,
}

impl AttrMap {
    pub fn new(
        category: &HashMap<&'static str, FilterDef>,
        list: &HashMap<String, FilterDef>,
    ) -> Self {
        let mut flags = Vec::new();
        for (key, def) in category {
            if let (FilterKind::Constant(_), Some(marker)) = (&def.kind, def.attr_marker) {
                flags.push((key.to_string(), marker.to_lowercase()));
            }
        }
        flags.sort();

        let mut labeled = Vec::new();
        for (key, def) in list {
            if let FilterKind::Enumerated(options) = &def.kind {
                labeled.push((key.clone(), options.keys().cloned().collect()));
            }
        }
        labeled.sort();

        Self { flags, labeled }
    }

    fn apply(&self, listing: &mut ListingSummary, attrs: &[String]) {
        let lowered: Vec<String> = attrs.iter().map(|attr| attr.to_lowercase()).collect();
        for (key, marker) in &self.flags {
            if lowered.iter().any(|attr| attr == marker) {
                listing.extra.insert(key.clone(), Value::Bool(true));
            }
        }

        // Enumerated values are sometimes rendered as "{filter}: {value}",
        // usually as just "{value}". Stripping up to the colon reduces both
        // renderings to one case.
        let stripped: Vec<&str> = attrs
            .iter()
            .map(|attr| attr.split_once(": ").map_or(attr.as_str(), |(_, v)| v))
            .collect();
        for (key, labels) in &self.labeled {
            for label in labels {
                if stripped.iter().any(|attr| *attr == label.as_str()) {
                    listing.extra.insert(key.clone(), Value::String(label.clone()));
                    break; // first match per filter key wins
                }
            }
        }
    }
}

/// Extracts the detail record from a listing's own page and attaches it.
///
/// A page without the body container is a posting that was removed after the
/// results list was built: the listing is marked deleted and nothing else is
/// extracted.
pub fn apply_detail(listing: &mut ListingSummary, html: &str, attr_map: &AttrMap) {
    let body_sel = Selector::parse("section#postingbody").unwrap();
    let info_sel = Selector::parse("div.postinginfos p").unwrap();
    let time_sel = Selector::parse("time").unwrap();
    let img_sel = Selector::parse("img").unwrap();
    let attr_sel = Selector::parse("p.attrgroup span").unwrap();
    let address_sel = Selector::parse("div.mapaddress").unwrap();

    let doc = Html::parse_document(html);
    let Some(body) = doc.select(&body_sel).next() else {
        listing.deleted = true;
        debug!(url = %listing.url, "posting body missing, marking deleted");
        return;
    };

    let mut detail = ListingDetail::default();

    // Only the container's direct text nodes belong to the posting body;
    // nested elements are boilerplate (print banner, QR code block).
    let mut body_text = String::new();
    for child in body.children() {
        if let Node::Text(text) = child.value() {
            body_text.push_str(text);
        }
    }
    detail.body = body_text.trim().to_string();

    // Creation time lives in the posting-info paragraph marked "posted",
    // distinct from the row's last-updated time. Reformat the ISO value to
    // match last_updated: no T, no seconds.
    for info in doc.select(&info_sel) {
        let text = info.text().collect::<String>();
        if !text.contains("posted") {
            continue;
        }
        if let Some(datetime) = info
            .select(&time_sel)
            .next()
            .and_then(|time| time.value().attr("datetime"))
        {
            let mut created = datetime.replace('T', " ");
            if let Some(idx) = created.rfind(':') {
                created.truncate(idx);
            }
            detail.created = Some(created);
        }
    }

    // When a posting has several image references the first is a repeat of
    // the gallery thumbnail.
    let images: Vec<_> = doc.select(&img_sel).collect();
    let images = if images.len() > 1 { &images[1..] } else { &images[..] };
    detail.images = images
        .iter()
        .filter_map(|img| img.value().attr("src"))
        .map(|src| src.replace(THUMB_SIZE, FULL_SIZE))
        .collect();

    for attr in doc.select(&attr_sel) {
        let token = attr.text().collect::<String>().trim().to_string();
        if !token.is_empty() {
            detail.attrs.push(token);
        }
    }
    if !detail.attrs.is_empty() {
        attr_map.apply(listing, &detail.attrs);
    }

    detail.address = doc
        .select(&address_sel)
        .next()
        .map(|address| address.text().collect::<String>().trim().to_string());

    listing.detail = Some(detail);
}

/// Reads a lat/lng pair off the page's map marker. Absence is normal and
/// leaves the geotag untouched.
pub fn apply_geotag(listing: &mut ListingSummary, html: &str) {
    let map_sel = Selector::parse("div#map").unwrap();

    let doc = Html::parse_document(html);
    if let Some(map) = doc.select(&map_sel).next() {
        let latitude = map.value().attr("data-latitude").and_then(|v| v.parse().ok());
        let longitude = map.value().attr("data-longitude").and_then(|v| v.parse().ok());
        if let (Some(latitude), Some(longitude)) = (latitude, longitude) {
            listing.geotag = Some(Geotag { latitude, longitude });
        }
    }
}
