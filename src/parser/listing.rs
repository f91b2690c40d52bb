use indexmap::IndexSet;
use scraper::Html;

use super::links::canonical_url;
use super::locator::{select, FieldExtractor, Locator};
use crate::record::{or_unknown, ListingCard};

/// Present once the listing's provider cards have rendered.
pub const LISTING_READY: &str = "li.provider-list-item";

const CARD: &str = "li.provider-list-item";

const DETAIL_LINK: &[Locator] = &[
    Locator::Attr("h3.provider__title a", "href"),
    Locator::Attr("a.provider__title-link", "href"),
];

const CARD_NAME: &[Locator] = &[
    Locator::Text("h3.provider__title a"),
    Locator::Text("a.provider__title-link"),
];
const CARD_TAGLINE: &[Locator] = &[Locator::Text(".provider__tagline")];
const CARD_LOCATION: &[Locator] = &[Locator::Text(".locality")];
const CARD_HOURLY_RATE: &[Locator] = &[Locator::Text(".hourly-rate")];
const CARD_MIN_PROJECT: &[Locator] = &[Locator::Text(".min-project-size")];
const CARD_TEAM_SIZE: &[Locator] = &[Locator::Text(".employees-count")];
const CARD_WEBSITE: &[Locator] = &[Locator::Link("a.website-link__item")];

/// Canonical detail-page URLs on a listing page, in document order,
/// without repeats.
pub fn detail_links(doc: &Html, fx: &FieldExtractor) -> Vec<String> {
    let mut links = IndexSet::new();
    for card in select(doc.root_element(), CARD) {
        let Some(href) = fx.resolve_in(card, DETAIL_LINK) else {
            continue;
        };
        if let Some(url) = canonical_url(&href, fx.origin()) {
            links.insert(url);
        }
    }
    links.into_iter().collect()
}

/// One card per provider that links to a detail page.
pub fn cards(doc: &Html, fx: &FieldExtractor) -> Vec<ListingCard> {
    select(doc.root_element(), CARD)
        .into_iter()
        .filter_map(|card| {
            let href = fx.resolve_in(card, DETAIL_LINK)?;
            let profile_url = canonical_url(&href, fx.origin())?;
            Some(ListingCard {
                profile_url,
                name: or_unknown(fx.resolve_in(card, CARD_NAME)),
                tagline: or_unknown(fx.resolve_in(card, CARD_TAGLINE)),
                location: or_unknown(fx.resolve_in(card, CARD_LOCATION)),
                hourly_rate: or_unknown(fx.resolve_in(card, CARD_HOURLY_RATE)),
                min_project_size: or_unknown(fx.resolve_in(card, CARD_MIN_PROJECT)),
                team_size: or_unknown(fx.resolve_in(card, CARD_TEAM_SIZE)),
                website: or_unknown(fx.resolve_in(card, CARD_WEBSITE)),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UNKNOWN;
    use url::Url;

    fn fx() -> FieldExtractor {
        FieldExtractor::new(Url::parse("https://clutch.co").unwrap())
    }

    fn fixture() -> Html {
        let html = std::fs::read_to_string("tests/fixtures/listing_page.html").unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn links_are_canonical_and_unique() {
        let links = detail_links(&fixture(), &fx());
        assert_eq!(
            links,
            vec![
                "https://clutch.co/profile/acme-labs",
                "https://clutch.co/profile/bright-pixel",
                "https://clutch.co/profile/cobalt-works",
            ]
        );
    }

    #[test]
    fn cards_carry_summary_fields() {
        let cards = cards(&fixture(), &fx());
        assert_eq!(cards.len(), 4);

        let acme = &cards[0];
        assert_eq!(acme.name, "Acme Labs");
        assert_eq!(acme.tagline, "Software that ships");
        assert_eq!(acme.location, "Pune, India");
        assert_eq!(acme.hourly_rate, "< $25 / hr");
        assert_eq!(acme.min_project_size, "$10,000+");
        assert_eq!(acme.team_size, "50 - 249");
        assert_eq!(acme.website, "https://acmelabs.io/");

        let cobalt = &cards[3];
        assert_eq!(cobalt.profile_url, "https://clutch.co/profile/cobalt-works");
        assert_eq!(cobalt.tagline, UNKNOWN);
        assert_eq!(cobalt.website, UNKNOWN);
    }

    #[test]
    fn page_without_cards() {
        let doc = Html::parse_document("<p>No providers match your filters.</p>");
        assert!(detail_links(&doc, &fx()).is_empty());
        assert!(cards(&doc, &fx()).is_empty());
    }
}
