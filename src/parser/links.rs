use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Absolute URLs of every `href` matched by `selector`, in document order.
///
/// Relative links are resolved against `base`. Fragments are dropped, and
/// empty, `#` and `javascript:` links are ignored.
pub fn collect_links(html: &str, base: &Url, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(selector) {
        let Some(url) = element.value().attr("href").and_then(|h| resolve(base, h)) else {
            continue;
        };
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

/// Resolve `href` against `base`, dropping links that go nowhere.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

/// Ordered union: every entry of `roots`, then unseen entries of `extra`.
pub fn merge_unique(roots: Vec<String>, extra: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    roots
        .into_iter()
        .chain(extra)
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.test/proteinas").unwrap()
    }

    #[test]
    fn resolves_relative_and_absolute() {
        let sel = Selector::parse("a").unwrap();
        let html = r##"
            <a href="/creatina">C</a>
            <a href="https://shop.test/whey?page=2#top">W</a>
            <a href="#">skip</a>
            <a href="javascript:void(0)">skip</a>
            <a>no href</a>
            <a href="/creatina">dup</a>
        "##;
        assert_eq!(
            collect_links(html, &base(), &sel),
            vec![
                "https://shop.test/creatina".to_string(),
                "https://shop.test/whey?page=2".to_string(),
            ]
        );
    }

    #[test]
    fn menu_entries_from_home_page() {
        let html = std::fs::read_to_string("tests/fixtures/home.html").unwrap();
        let seed = Url::parse("https://shop.test/").unwrap();
        let sel = Selector::parse(".submenu li a").unwrap();
        assert_eq!(
            collect_links(&html, &seed, &sel),
            vec!["https://shop.test/proteinas", "https://shop.test/creatinas"]
        );
    }

    #[test]
    fn pagination_links_from_listing() {
        let html = std::fs::read_to_string("tests/fixtures/listing.html").unwrap();
        let sel = Selector::parse(".page-link").unwrap();
        assert_eq!(
            collect_links(&html, &base(), &sel),
            vec![
                "https://shop.test/proteinas?page=2",
                "https://shop.test/proteinas?page=3",
            ]
        );
    }

    #[test]
    fn page_without_matches_yields_nothing() {
        let sel = Selector::parse(".page-link").unwrap();
        assert!(collect_links("<p>no pagination</p>", &base(), &sel).is_empty());
    }

    #[test]
    fn merge_keeps_first_occurrence_order() {
        let merged = merge_unique(
            vec!["a".into(), "b".into()],
            vec!["b".into(), "c".into(), "a".into(), "c".into()],
        );
        assert_eq!(merged, vec!["a", "b", "c"]);
    }
}
