//! Not-found classification of rendered documents

use scraper::{Html, Selector};

/// Returns true if `html` contains an element whose id is `not_found_id`
///
/// An attribute selector is used so ids that are not valid CSS identifiers
/// (such as the default `404-page`) still match.
pub fn has_not_found_marker(html: &str, not_found_id: &str) -> bool {
    if not_found_id.is_empty() {
        return false;
    }

    let Ok(selector) = Selector::parse(&format!(r#"[id="{}"]"#, not_found_id)) else {
        tracing::warn!("Not-found id {:?} cannot be used as a selector", not_found_id);
        return false;
    };

    let document = Html::parse_document(html);
    document.select(&selector).next().is_some()
}

/// Status of a rendered page: 404 when the sentinel is present, else 200
pub fn classify_rendered(html: &str, not_found_id: &str) -> u16 {
    if has_not_found_marker(html, not_found_id) {
        404
    } else {
        200
    }
}
