// HTML metadata and text extraction via CSS-selector DOM queries. Grounded
// on `scraper`'s standard `Html::parse_document` + `Selector` pattern; no
// teacher precedent (the teacher never parses arbitrary third-party HTML),
// so this follows the crate's own documented idiom directly.

use scraper::{Html, Selector};

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub twitter_title: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    pub publisher: Option<String>,
    pub schema_org_json: Vec<String>,
    pub text: String,
}

fn select_one(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_attr(document: &Html, selector_str: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn select_all_text(document: &Html, selector_str: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector_str) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Pull title, Open Graph / Twitter Card meta tags, JSON-LD `schema.org`
/// blocks, author/publish-date hints, and the page's visible body text.
pub fn extract(html: &str) -> ExtractedMetadata {
    let document = Html::parse_document(html);

    ExtractedMetadata {
        title: select_one(&document, "title"),
        og_title: select_attr(&document, r#"meta[property="og:title"]"#, "content"),
        og_description: select_attr(&document, r#"meta[property="og:description"]"#, "content"),
        og_image: select_attr(&document, r#"meta[property="og:image"]"#, "content"),
        twitter_title: select_attr(&document, r#"meta[name="twitter:title"]"#, "content"),
        author: select_attr(&document, r#"meta[name="author"]"#, "content"),
        published_date: select_attr(&document, r#"meta[property="article:published_time"]"#, "content"),
        publisher: select_attr(&document, r#"meta[property="og:site_name"]"#, "content"),
        schema_org_json: select_all_text(&document, r#"script[type="application/ld+json"]"#),
        text: select_one(&document, "body").unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_og_tags() {
        let html = r#"
            <html><head>
                <title>Abandoned Mill</title>
                <meta property="og:title" content="The Old Mill">
                <meta property="og:description" content="A crumbling relic.">
            </head><body><p>History of the mill.</p></body></html>
        "#;
        let meta = extract(html);
        assert_eq!(meta.title.as_deref(), Some("Abandoned Mill"));
        assert_eq!(meta.og_title.as_deref(), Some("The Old Mill"));
        assert_eq!(meta.og_description.as_deref(), Some("A crumbling relic."));
        assert!(meta.text.contains("History of the mill."));
    }

    #[test]
    fn missing_tags_yield_none() {
        let meta = extract("<html><head></head><body></body></html>");
        assert!(meta.title.is_none());
        assert!(meta.og_title.is_none());
    }

    #[test]
    fn collects_json_ld_blocks() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@type":"Place"}</script>
        </head><body></body></html>"#;
        let meta = extract(html);
        assert_eq!(meta.schema_org_json.len(), 1);
        assert!(meta.schema_org_json[0].contains("Place"));
    }
}
