//! Owned element trees for XML and (leniently) HTML documents.
//!
//! Adapters walk these trees by slash-separated local-name paths, e.g.
//! `distributionManagement/relocation/groupId`. Namespaces are dropped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::error::FetchError;

/// HTML elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// A parsed document: a synthetic root holding the top-level elements, plus
/// every comment found anywhere in the source.
#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    pub root: XmlElement,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlDocument {
    /// Parse a well-formed XML document.
    pub fn parse_xml(content: &str) -> Result<Self, FetchError> {
        build(content, false)
    }

    /// Parse an HTML page, tolerating unclosed and mismatched tags.
    ///
    /// Parsing stops at the first unrecoverable syntax error and keeps
    /// whatever was read up to that point.
    pub fn parse_html(content: &str) -> Self {
        // Lenient mode never surfaces an error.
        build(content, true).unwrap_or_default()
    }

    /// The first top-level element (`<project>` for a POM, `<rss>` for a feed).
    pub fn root_element(&self) -> Option<&XmlElement> {
        self.root.children.first()
    }
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>, html: bool) -> Self {
        let mut name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
        if html {
            name.make_ascii_lowercase();
        }

        let attributes = if html {
            start.html_attributes()
        } else {
            start.attributes()
        }
        .filter_map(Result::ok)
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
            (key, value)
        })
        .collect();

        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow a slash-separated path of child names, taking the first match
    /// at every step.
    pub fn find(&self, path: &str) -> Option<&XmlElement> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self, |el, segment| el.child(segment))
    }

    /// Every element reachable by the path, fanning out at each step.
    pub fn find_all(&self, path: &str) -> Vec<&XmlElement> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|el| el.children.iter().filter(|c| c.name == segment))
                .collect();
        }
        current
    }

    /// Trimmed text of the element at `path`, if present and non-empty.
    pub fn text_at(&self, path: &str) -> Option<&str> {
        self.find(path)
            .map(|el| el.text.trim())
            .filter(|t| !t.is_empty())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whitespace-separated `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// This element and all of its descendants, in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(el) = stack.pop() {
            out.push(el);
            // Reversed so the first child is visited next.
            stack.extend(el.children.iter().rev());
        }
        out
    }

    /// Concatenated text of this element and everything below it.
    pub fn text_content(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.text_content());
        }
        out
    }
}

fn build(content: &str, html: bool) -> Result<XmlDocument, FetchError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    if html {
        reader.config_mut().check_end_names = false;
    }

    let mut stack: Vec<XmlElement> = vec![XmlElement::default()];
    let mut comments = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(_) if html => break,
            Err(e) => return Err(FetchError::Xml(e)),
        };

        match event {
            Event::Start(e) => {
                let el = XmlElement::from_start(&e, html);
                if html && VOID_ELEMENTS.contains(&el.name.as_str()) {
                    attach(&mut stack, el);
                } else {
                    stack.push(el);
                }
            }
            Event::Empty(e) => {
                let el = XmlElement::from_start(&e, html);
                attach(&mut stack, el);
            }
            Event::End(e) => {
                let mut name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if html {
                    name.make_ascii_lowercase();
                    // Unwind to the nearest open element of the same name;
                    // stray end tags are dropped.
                    if let Some(pos) = stack.iter().rposition(|el| el.name == name)
                        && pos > 0
                    {
                        while stack.len() > pos {
                            close(&mut stack);
                        }
                    }
                } else if stack.len() > 1 {
                    close(&mut stack);
                }
            }
            Event::Text(e) => {
                let text = match e.unescape() {
                    Ok(text) => text.to_string(),
                    Err(_) if html => String::from_utf8_lossy(&e).to_string(),
                    Err(e) => return Err(quick_xml::Error::from(e).into()),
                };
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Comment(e) => {
                comments.push(String::from_utf8_lossy(&e).trim().to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while stack.len() > 1 {
        close(&mut stack);
    }

    Ok(XmlDocument {
        root: stack.pop().unwrap_or_default(),
        comments,
    })
}

fn attach(stack: &mut [XmlElement], el: XmlElement) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(el);
    }
}

fn close(stack: &mut Vec<XmlElement>) {
    if let Some(el) = stack.pop() {
        attach(stack, el);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pom_paths() {
        let doc = XmlDocument::parse_xml(
            r#"<?xml version="1.0"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
    <!-- Licensed under http://www.apache.org/licenses/LICENSE-2.0 -->
    <groupId>org.clojure</groupId>
    <distributionManagement>
        <relocation><groupId>org.other</groupId></relocation>
    </distributionManagement>
    <licenses>
        <license><name>EPL</name></license>
        <license><name>MIT</name></license>
    </licenses>
</project>"#,
        )
        .unwrap();

        let project = doc.root_element().unwrap();
        assert_eq!(project.name, "project");
        assert_eq!(project.text_at("groupId"), Some("org.clojure"));
        assert_eq!(
            project.text_at("distributionManagement/relocation/groupId"),
            Some("org.other")
        );
        assert_eq!(project.text_at("distributionManagement/relocation/version"), None);

        let names: Vec<_> = project
            .find_all("licenses/license/name")
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(names, vec!["EPL", "MIT"]);
        assert_eq!(doc.comments.len(), 1);
        assert!(doc.comments[0].contains("LICENSE-2.0"));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(XmlDocument::parse_xml("<project><a></b></project>").is_err());
    }

    #[test]
    fn test_parse_html_lenient() {
        let doc = XmlDocument::parse_html(
            r#"<!DOCTYPE html>
<html><head><meta name="pypi:repository-version" content="1.1"><title>Simple index</title></head>
<body>
<a href="/simple/requests/">requests</a><br>
<a href="/simple/flask/">flask</a>
<p>unclosed paragraph
</body></html>"#,
        );

        let anchors: Vec<_> = doc
            .root
            .descendants()
            .into_iter()
            .filter(|e| e.name == "a")
            .map(|e| e.text_content())
            .collect();
        assert_eq!(anchors, vec!["requests", "flask"]);
    }

    #[test]
    fn test_descendants_document_order() {
        let doc = XmlDocument::parse_xml("<r><a><b/></a><c/></r>").unwrap();
        let names: Vec<_> = doc
            .root_element()
            .unwrap()
            .descendants()
            .iter()
            .map(|e| e.name.clone())
            .collect();
        assert_eq!(names, vec!["r", "a", "b", "c"]);
    }

    #[test]
    fn test_find_all_with_borrowed_path() {
        let doc = XmlDocument::parse_xml(
            "<metadata><versioning><versions><version>1.0</version><version>1.1</version></versions></versioning></metadata>",
        )
        .unwrap();
        let root = doc.root_element().unwrap();
        let found = {
            let path = String::from("versioning/versions/version");
            root.find_all(&path)
        };
        let versions: Vec<_> = found.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(versions, vec!["1.0", "1.1"]);
    }

    #[test]
    fn test_descendants_large_flat_page() {
        let mut html = String::from("<html><body>");
        for i in 0..50_000 {
            html.push_str(&format!("<a href=\"/simple/p{i}/\">p{i}</a>"));
        }
        html.push_str("</body></html>");
        let doc = XmlDocument::parse_html(&html);

        let started = std::time::Instant::now();
        let anchors: Vec<_> = doc
            .root
            .descendants()
            .into_iter()
            .filter(|e| e.name == "a")
            .collect();
        assert_eq!(anchors.len(), 50_000);
        assert_eq!(anchors[0].text, "p0");
        assert_eq!(anchors[49_999].text, "p49999");
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_has_class() {
        let doc = XmlDocument::parse_html(
            r#"<div class="result recent-jar-title"><a href="/x">x</a></div>"#,
        );
        let div = doc.root_element().unwrap();
        assert!(div.has_class("recent-jar-title"));
        assert!(!div.has_class("recent"));
    }
}
