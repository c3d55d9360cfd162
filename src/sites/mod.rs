use scraper::ElementRef;
use url::Url;

pub mod higher_ed;
pub mod idealist;
pub mod umich;

pub(crate) fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn join_url(base: &str, href: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|url| url.to_string())
}
