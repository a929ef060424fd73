//! DOM parsing, noise pruning, readability-style extraction and skeleton
//! hashing — spec.md §4.5 steps 2-4.

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};

const NOISE_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "iframe", "svg", "path", "br", "hr",
];

/// A parsed, noise-pruned document ready for extraction.
pub struct ParsedDocument {
    html: Html,
}

/// Readability-style signals pulled out of the main content area.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub primary_text: String,
    pub published_at: Option<String>,
    pub word_count: usize,
}

impl ParsedDocument {
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        let mut html = Html::parse_document(markup);
        prune_noise(&mut html);
        Self { html }
    }

    #[must_use]
    pub fn extract(&self) -> ExtractedContent {
        let title = select_text(&self.html, "title")
            .or_else(|| select_attr(&self.html, r#"meta[property="og:title"]"#, "content"));

        let byline = select_text(&self.html, "[rel=author], .byline, .author")
            .or_else(|| select_attr(&self.html, r#"meta[name="author"]"#, "content"));

        let excerpt = select_attr(&self.html, r#"meta[name="description"]"#, "content")
            .or_else(|| select_attr(&self.html, r#"meta[property="og:description"]"#, "content"));

        let published_at = select_attr(&self.html, "time[datetime]", "datetime").or_else(|| {
            select_attr(
                &self.html,
                r#"meta[property="article:published_time"]"#,
                "content",
            )
        });

        let primary_text = extract_primary_text(&self.html);
        let word_count = primary_text.split_whitespace().count();

        ExtractedContent {
            title,
            byline,
            excerpt,
            primary_text,
            published_at,
            word_count,
        }
    }

    /// Level 2 (structure) skeleton: tag names only, depth-first.
    #[must_use]
    pub fn skeleton_hash_structure(&self) -> String {
        skeleton_hash(&self.html, false)
    }

    /// Level 1 (template) skeleton: tag name plus `#id` and sorted
    /// `.classList`.
    #[must_use]
    pub fn skeleton_hash_template(&self) -> String {
        skeleton_hash(&self.html, true)
    }
}

fn prune_noise(html: &mut Html) {
    let to_remove: Vec<_> = html
        .tree
        .nodes()
        .filter_map(|node| match node.value() {
            scraper::node::Node::Element(el) if NOISE_TAGS.contains(&el.name()) => Some(node.id()),
            _ => None,
        })
        .collect();

    for id in to_remove {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn select_text(html: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    html.select(&selector).next().map(|el| {
        let text: String = el.text().collect::<Vec<_>>().join(" ");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    })
}

fn select_attr(html: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    html.select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

fn extract_primary_text(html: &Html) -> String {
    let selector = Selector::parse("p").expect("static selector");
    let mut paragraphs = Vec::new();
    for el in html.select(&selector) {
        let text: String = el.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    if paragraphs.is_empty() {
        if let Some(body) = Selector::parse("body")
            .ok()
            .and_then(|s| html.select(&s).next())
        {
            return collapse_whitespace(&body.text().collect::<Vec<_>>().join(" "));
        }
    }
    paragraphs.join("\n\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn skeleton_hash(html: &Html, with_attrs: bool) -> String {
    let mut serialized = String::new();
    serialize_skeleton(html.root_element(), with_attrs, &mut serialized);
    let digest = Sha256::digest(serialized.as_bytes());
    hex::encode(digest)[..16].to_string()
}

fn serialize_skeleton(el: ElementRef, with_attrs: bool, out: &mut String) {
    out.push_str(el.value().name());
    if with_attrs {
        if let Some(id) = el.value().attr("id") {
            out.push('#');
            out.push_str(id);
        }
        if let Some(class) = el.value().attr("class") {
            let mut classes: Vec<&str> = class.split_whitespace().collect();
            classes.sort_unstable();
            for c in classes {
                out.push('.');
                out.push_str(c);
            }
        }
    }
    out.push('(');
    for child in el.children().filter_map(ElementRef::wrap) {
        serialize_skeleton(child, with_attrs, out);
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prunes_script_and_style() {
        let doc = ParsedDocument::parse(
            "<html><head><style>.a{}</style><script>1</script></head>\
             <body><p>hello world</p></body></html>",
        );
        let extracted = doc.extract();
        assert!(!extracted.primary_text.contains('{'));
        assert!(extracted.primary_text.contains("hello world"));
    }

    #[test]
    fn extracts_title_and_metadata() {
        let doc = ParsedDocument::parse(
            r#"<html><head><title>Big Story</title>
               <meta name="description" content="a summary">
               <meta property="article:published_time" content="2024-01-01T00:00:00Z">
               </head><body><p>Some body text here.</p></body></html>"#,
        );
        let extracted = doc.extract();
        assert_eq!(extracted.title.as_deref(), Some("Big Story"));
        assert_eq!(extracted.excerpt.as_deref(), Some("a summary"));
        assert_eq!(
            extracted.published_at.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn structure_skeleton_ignores_attributes() {
        let a = ParsedDocument::parse(r#"<html><body><div id="x" class="b a">t</div></body></html>"#);
        let b = ParsedDocument::parse(r#"<html><body><div id="y" class="z">t</div></body></html>"#);
        assert_eq!(a.skeleton_hash_structure(), b.skeleton_hash_structure());
        assert_ne!(a.skeleton_hash_template(), b.skeleton_hash_template());
    }

    #[test]
    fn template_skeleton_sorts_class_list() {
        let a = ParsedDocument::parse(r#"<html><body><div class="b a">t</div></body></html>"#);
        let b = ParsedDocument::parse(r#"<html><body><div class="a b">t</div></body></html>"#);
        assert_eq!(a.skeleton_hash_template(), b.skeleton_hash_template());
    }

    #[test]
    fn structure_hash_is_invariant_to_text_node_content() {
        let a = ParsedDocument::parse(
            r#"<html><body><article><h1>First headline</h1><p>Short paragraph.</p></article></body></html>"#,
        );
        let b = ParsedDocument::parse(
            r#"<html><body><article><h1>A completely different headline</h1><p>Much longer paragraph text entirely.</p></article></body></html>"#,
        );
        assert_eq!(a.skeleton_hash_structure(), b.skeleton_hash_structure());
    }
}
