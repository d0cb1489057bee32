pub mod links;
pub mod listing;
pub mod price;

use scraper::Selector;

use crate::error::ParseError;
use crate::settings::Settings;

/// Compiled CSS selectors for one retail site.
pub struct Selectors {
    pub menu: Selector,
    pub pagination: Selector,
    pub tile: Selector,
    pub name: Selector,
    pub price: Selector,
    pub link: Selector,
}

impl Selectors {
    pub fn from_settings(settings: &Settings) -> Result<Self, ParseError> {
        Ok(Selectors {
            menu: compile(&settings.menu_selector)?,
            pagination: compile(&settings.pagination_selector)?,
            tile: compile(&settings.tile_selector)?,
            name: compile(&settings.name_selector)?,
            price: compile(&settings.price_selector)?,
            link: compile(&settings.link_selector)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) fn default_selectors() -> Selectors {
    Selectors {
        menu: compile(".submenu li a").unwrap(),
        pagination: compile(".page-link").unwrap(),
        tile: compile(".grid_item").unwrap(),
        name: compile("h3").unwrap(),
        price: compile("span.new_price").unwrap(),
        link: compile("a").unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selector_is_a_parse_error() {
        match compile("div[") {
            Err(ParseError::Selector { selector, .. }) => assert_eq!(selector, "div["),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("selector should not compile"),
        }
    }
}
