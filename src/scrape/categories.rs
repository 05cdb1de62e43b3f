use std::collections::{BTreeMap, HashMap};

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ListingSummary;
use crate::scrape::filters::FilterDef;

/// Search section. Selects the URL path code, the section-specific filter
/// vocabulary, and the row customization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Community,
    Events,
    ForSale,
    Gigs,
    Housing,
    Jobs,
    Resumes,
    Services,
}

impl Category {
    /// Wire path code used in the search URL
    pub fn code(self) -> &'static str {
        match self {
            Category::Community => "ccc",
            Category::Events => "eee",
            Category::ForSale => "sss",
            Category::Gigs => "ggg",
            Category::Housing => "hhh",
            Category::Jobs => "jjj",
            Category::Resumes => "rrr",
            Category::Services => "bbb",
        }
    }

    /// Section-specific filter vocabulary
    pub fn filters(self) -> HashMap<&'static str, FilterDef> {
        match self {
            Category::Events => event_filters(),
            Category::ForSale => for_sale_filters(),
            Category::Gigs => gig_filters(),
            Category::Housing => housing_filters(),
            Category::Jobs => job_filters(),
            Category::Community | Category::Resumes | Category::Services => HashMap::new(),
        }
    }

    /// Adds or overwrites category-specific fields on a freshly extracted
    /// summary, given the raw results row.
    pub fn customize_row(self, listing: &mut ListingSummary, row: &ElementRef<'_>) {
        match self {
            Category::Housing => customize_housing_row(listing, row),
            _ => {}
        }
    }
}

/// Housing rows carry a compact token like "2br - 850ft²". Both parts stay
/// text: the vocabulary includes non-numeric values such as "studio".
/// Last match wins when several parts could apply.
fn customize_housing_row(listing: &mut ListingSummary, row: &ElementRef<'_>) {
    let housing_sel = Selector::parse("span.housing").unwrap();
    listing.extra.insert("bedrooms".to_string(), Value::Null);
    listing.extra.insert("area".to_string(), Value::Null);

    let Some(info) = row.select(&housing_sel).next() else {
        return;
    };
    let text = info.text().collect::<String>();
    for part in text.split('-') {
        let part = part.trim();
        if let Some(bedrooms) = part.strip_suffix("br") {
            listing
                .extra
                .insert("bedrooms".to_string(), Value::String(bedrooms.to_string()));
        }
        // Area sizes end in the superscript two of ft²/m²
        if part.ends_with('²') || part.ends_with('2') {
            listing
                .extra
                .insert("area".to_string(), Value::String(part.to_string()));
        }
    }
}

fn event_filters() -> HashMap<&'static str, FilterDef> {
    HashMap::from([
        ("art", FilterDef::constant("event_art", "1")),
        ("film", FilterDef::constant("event_art", "1")),
        ("career", FilterDef::constant("event_career", "1")),
        ("charitable", FilterDef::constant("event_fundraiser_vol", "1")),
        ("fundraiser", FilterDef::constant("event_fundraiser_vol", "1")),
        ("athletics", FilterDef::constant("event_athletics", "1")),
        ("competition", FilterDef::constant("event_athletics", "1")),
        ("dance", FilterDef::constant("event_dance", "1")),
        ("festival", FilterDef::constant("event_festival", "1")),
        ("fair", FilterDef::constant("event_festival", "1")),
        ("fitness", FilterDef::constant("event_fitness_wellness", "1")),
        ("health", FilterDef::constant("event_fitness_wellness", "1")),
        ("food", FilterDef::constant("event_food", "1")),
        ("drink", FilterDef::constant("event_food", "1")),
        ("free", FilterDef::constant("event_free", "1")),
        ("kid_friendly", FilterDef::constant("event_kidfriendly", "1")),
        ("literary", FilterDef::constant("event_literary", "1")),
        ("music", FilterDef::constant("event_music", "1")),
        ("outdoor", FilterDef::constant("event_outdoor", "1")),
        ("sale", FilterDef::constant("event_sale", "1")),
        ("singles", FilterDef::constant("event_singles", "1")),
        ("tech", FilterDef::constant("event_geek", "1")),
    ])
}

fn for_sale_filters() -> HashMap<&'static str, FilterDef> {
    HashMap::from([
        ("min_price", FilterDef::passthrough("min_price")),
        ("max_price", FilterDef::passthrough("max_price")),
        ("make", FilterDef::passthrough("auto_make_model")),
        ("model", FilterDef::passthrough("auto_make_model")),
        ("min_year", FilterDef::passthrough("min_auto_year")),
        ("max_year", FilterDef::passthrough("max_auto_year")),
        ("min_miles", FilterDef::passthrough("min_auto_miles")),
        ("max_miles", FilterDef::passthrough("max_auto_miles")),
        (
            "min_engine_displacement",
            FilterDef::passthrough("min_engine_displacement_cc"),
        ),
        (
            "max_engine_displacement",
            FilterDef::passthrough("max_engine_displacement_cc"),
        ),
    ])
}

fn gig_filters() -> HashMap<&'static str, FilterDef> {
    // The site wants literal yes/no; boolean flags normalize to true/false,
    // so both spellings are accepted here.
    let paid_options = BTreeMap::from([
        ("yes".to_string(), "yes".to_string()),
        ("no".to_string(), "no".to_string()),
        ("true".to_string(), "yes".to_string()),
        ("false".to_string(), "no".to_string()),
    ]);
    HashMap::from([("is_paid", FilterDef::enumerated("is_paid", paid_options))])
}

fn housing_filters() -> HashMap<&'static str, FilterDef> {
    HashMap::from([
        ("min_price", FilterDef::passthrough("min_price")),
        ("max_price", FilterDef::passthrough("max_price")),
        ("min_bedrooms", FilterDef::passthrough("min_bedrooms")),
        ("max_bedrooms", FilterDef::passthrough("max_bedrooms")),
        ("min_bathrooms", FilterDef::passthrough("min_bathrooms")),
        ("max_bathrooms", FilterDef::passthrough("max_bathrooms")),
        ("min_ft2", FilterDef::passthrough("minSqft")),
        ("max_ft2", FilterDef::passthrough("maxSqft")),
        (
            "private_room",
            FilterDef::constant_with_marker("private_room", "1", "private room"),
        ),
        (
            "private_bath",
            FilterDef::constant_with_marker("private_bath", "1", "private bath"),
        ),
        (
            "cats_ok",
            FilterDef::constant_with_marker("pets_cat", "1", "cats are ok - purrr"),
        ),
        (
            "dogs_ok",
            FilterDef::constant_with_marker("pets_dog", "1", "dogs are ok - wooof"),
        ),
        (
            "is_furnished",
            FilterDef::constant_with_marker("is_furnished", "1", "furnished"),
        ),
        (
            "no_smoking",
            FilterDef::constant_with_marker("no_smoking", "1", "no smoking"),
        ),
        (
            "wheelchair_access",
            FilterDef::constant_with_marker("wheelchaccess", "1", "wheelchair accessible"),
        ),
        (
            "ev_charging",
            FilterDef::constant_with_marker("ev_charging", "1", "ev charging"),
        ),
    ])
}

fn job_filters() -> HashMap<&'static str, FilterDef> {
    HashMap::from([
        (
            "is_internship",
            FilterDef::constant_with_marker("is_internship", "1", "internship"),
        ),
        (
            "is_nonprofit",
            FilterDef::constant_with_marker("is_nonprofit", "1", "non-profit organization"),
        ),
        (
            "is_telecommuting",
            FilterDef::constant_with_marker("is_telecommuting", "1", "telecommuting okay"),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use scraper::{Html, Selector};

    use super::*;
    use crate::scrape::filters::{base_filters, resolve_filters, FilterValue};

    fn row_fixture(inner: &str) -> Html {
        Html::parse_document(&format!(
            r#"<ul class="rows"><li class="result-row" data-pid="1">{inner}</li></ul>"#
        ))
    }

    #[test]
    fn housing_row_parses_bedrooms_and_area_as_text() {
        let html = row_fixture(r#"<span class="housing">2br - 850ft² -</span>"#);
        let row = html
            .select(&Selector::parse("li.result-row").unwrap())
            .next()
            .unwrap();
        let mut listing = ListingSummary::new("1", "x", "http://x");
        Category::Housing.customize_row(&mut listing, &row);
        assert_eq!(listing.extra["bedrooms"], "2");
        assert_eq!(listing.extra["area"], "850ft²");
    }

    #[test]
    fn housing_row_without_token_defaults_to_null() {
        let html = row_fixture("");
        let row = html
            .select(&Selector::parse("li.result-row").unwrap())
            .next()
            .unwrap();
        let mut listing = ListingSummary::new("1", "x", "http://x");
        Category::Housing.customize_row(&mut listing, &row);
        assert!(listing.extra["bedrooms"].is_null());
        assert!(listing.extra["area"].is_null());
    }

    #[test]
    fn gigs_paid_flag_maps_to_yes_no() {
        let raw = BTreeMap::from([("is_paid".to_string(), FilterValue::from(true))]);
        let params = resolve_filters(
            &raw,
            &base_filters(),
            &Category::Gigs.filters(),
            &HashMap::new(),
        );
        assert!(params.contains(&("is_paid".to_string(), "yes".to_string())));
    }
}
