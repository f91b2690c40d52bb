use indexmap::IndexMap;
use scraper::Html;

use super::charts;
use super::locator::{collapse_whitespace, select, FieldExtractor, Locator};
use crate::record::{or_unknown, PricingSnapshot, ProfileRecord};

/// Present once a detail page has rendered its header.
pub const PROFILE_READY: &str = ".profile-header";

// Candidate locators per field, most current markup first.

const NAME: &[Locator] = &[
    Locator::Text("h1.profile-header__title"),
    Locator::Text(".profile-header h1"),
    Locator::Attr("meta[property='og:title']", "content"),
    Locator::JsonLd("name"),
];

const TAGLINE: &[Locator] = &[
    Locator::Text(".profile-summary__tagline"),
    Locator::Text(".profile-header__short-description"),
    Locator::Text(".profile-summary h2"),
];

const DESCRIPTION: &[Locator] = &[
    Locator::Paragraphs(".profile-summary__text"),
    Locator::Paragraphs("#profile-summary .profile-summary__description"),
    Locator::JsonLd("description"),
    Locator::Attr("meta[name='description']", "content"),
];

const WEBSITE: &[Locator] = &[
    Locator::Link("ul.profile-short-actions a[title='Visit website']"),
    Locator::Link(".profile-header a.website-link__item"),
    Locator::Link("a.profile-website-link"),
    Locator::JsonLd("url"),
];

const LANGUAGES: &[Locator] = &[
    Locator::Text("#profile-languages-modal .profile-modal--list li"),
    Locator::Text(".profile-languages li"),
];

const LOCATIONS: &[Locator] = &[
    Locator::Text("#profile-locations-modal .profile-modal--list li"),
    Locator::Text(".profile-locations li"),
];

const PROJECT_SIZE: &[Locator] = &[
    Locator::Text("#pricing-snapshot #common-project-size-value"),
    Locator::Text("#pricing-snapshot .pricing-snapshot__project-size"),
];

const CLIENT_FEEDBACK: &[Locator] = &[
    Locator::Text("#pricing-snapshot .pricing-snapshot__clients-feedback-description"),
    Locator::Text("#pricing-snapshot .pricing-snapshot__feedback"),
];

/// Item / label / value selectors of one summary-details layout.
struct DetailLayout {
    item: &'static str,
    label: &'static str,
    value: &'static str,
}

const DETAIL_LAYOUTS: &[DetailLayout] = &[
    DetailLayout {
        item: "ul.profile-summary__details li.profile-summary__detail, \
               ul.profile-summary__details li.profile-summary__detail-clickable",
        label: ".profile-summary__detail-label",
        value: ".profile-summary__detail-title",
    },
    DetailLayout {
        item: "#profile-summary .profile-summary__detail",
        label: "[data-label], .detail-label",
        value: ".detail-value",
    },
];

/// Summary-details label whose value stands in for a missing locations list.
const LOCATIONS_LABEL: &str = "Locations";

/// Build the full record for one detail page. Never fails: anything that
/// can't be resolved comes out as the unknown sentinel or an empty list.
pub fn build(doc: &Html, profile_url: &str, fx: &FieldExtractor) -> ProfileRecord {
    let summary_details = summary_details(doc);

    let languages = fx.resolve_all(doc, LANGUAGES);
    let mut locations = fx.resolve_all(doc, LOCATIONS);
    if locations.is_empty() {
        if let Some(loc) = summary_details.get(LOCATIONS_LABEL) {
            locations.push(loc.clone());
        }
    }

    let charts = charts::recover(doc);

    ProfileRecord {
        profile_url: profile_url.to_string(),
        name: or_unknown(fx.resolve(doc, NAME)),
        tagline: or_unknown(fx.resolve(doc, TAGLINE)),
        summary_description: or_unknown(fx.resolve(doc, DESCRIPTION)),
        website: or_unknown(fx.resolve(doc, WEBSITE)),
        summary_details,
        languages,
        locations,
        service_lines: charts.service_lines,
        focus_breakdown: charts.focus_breakdown,
        industries_focus: charts.industries_focus,
        client_focus: charts.client_focus,
        pricing_snapshot: PricingSnapshot {
            most_common_project_size: or_unknown(fx.resolve(doc, PROJECT_SIZE)),
            client_feedback_summary: or_unknown(fx.resolve(doc, CLIENT_FEEDBACK)),
        },
    }
}

/// Label -> value pairs from the first layout that yields any.
fn summary_details(doc: &Html) -> IndexMap<String, String> {
    for layout in DETAIL_LAYOUTS {
        let mut details = IndexMap::new();
        for item in select(doc.root_element(), layout.item) {
            let label = select(item, layout.label)
                .first()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()));
            let value = select(item, layout.value)
                .first()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()));
            if let (Some(label), Some(value)) = (label, value) {
                if !label.is_empty() && !value.is_empty() {
                    details.insert(label, value);
                }
            }
        }
        if !details.is_empty() {
            return details;
        }
    }
    IndexMap::new()
}
