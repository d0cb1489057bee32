use std::collections::HashSet;

use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use super::links::resolve;
use super::price::parse_price;
use super::Selectors;
use crate::model::NewObservation;

/// Every product tile on one listing page, in document order.
///
/// A tile missing its name, price or link still yields a record with that
/// field empty or zero.
pub fn parse_listing(html: &str, page_url: &Url, sel: &Selectors) -> Vec<NewObservation> {
    let document = Html::parse_document(html);
    document
        .select(&sel.tile)
        .map(|tile| parse_tile(tile, page_url, sel))
        .collect()
}

fn parse_tile(tile: ElementRef<'_>, page_url: &Url, sel: &Selectors) -> NewObservation {
    let name = first_text(tile, &sel.name).unwrap_or_else(|| {
        warn!(error_kind = "parse", page = %page_url, "tile without a name");
        String::new()
    });

    let price = match first_text(tile, &sel.price) {
        Some(raw) => parse_price(&raw).unwrap_or_else(|e| {
            warn!(error_kind = "parse", page = %page_url, product = %name, "{}", e);
            Decimal::ZERO
        }),
        None => {
            warn!(error_kind = "parse", page = %page_url, product = %name, "tile without a price");
            Decimal::ZERO
        }
    };

    let detail_url = tile
        .select(&sel.link)
        .find_map(|a| a.value().attr("href"))
        .and_then(|href| resolve(page_url, href))
        .unwrap_or_default();

    NewObservation {
        name,
        price,
        detail_url,
    }
}

/// Whitespace-collapsed text of the first match, if non-empty.
fn first_text(tile: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = tile.select(selector).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Collapse records sharing `(name, price, detail_url)`; first one wins.
pub fn dedup(records: Vec<NewObservation>) -> Vec<NewObservation> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.dedup_key()))
        .collect()
}
