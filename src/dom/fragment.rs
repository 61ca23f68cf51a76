//! HTML fragment parsing into detached nodes
//!
//! Lets script populate a picture-in-picture document the way `innerHTML`
//! would, without giving it a way to load the document from a URL.

use super::{Document, Node};
use crate::Result;
use scraper::{ElementRef, Html};

impl Document {
    /// Parse `html` as a body fragment and return the top-level nodes,
    /// owned by this document but not yet inserted anywhere.
    pub fn parse_fragment(&self, html: &str) -> Result<Vec<Node>> {
        let fragment = Html::parse_fragment(html);
        let mut out = Vec::new();
        self.convert_children(fragment.root_element(), &mut out)?;
        Ok(out)
    }

    fn convert_children(&self, parent: ElementRef<'_>, out: &mut Vec<Node>) -> Result<()> {
        for child in parent.children() {
            if let Some(element) = ElementRef::wrap(child) {
                let node = self.create_element(element.value().name())?;
                // scraper keeps attributes in a hash map; sort for stable output
                let mut attrs: Vec<(&str, &str)> = element.value().attrs().collect();
                attrs.sort_unstable();
                for (name, value) in attrs {
                    node.set_attribute(name, value)?;
                }
                let mut kids = Vec::new();
                self.convert_children(element, &mut kids)?;
                for kid in &kids {
                    node.append_child(kid)?;
                }
                out.push(node);
            } else if let Some(text) = child.value().as_text() {
                out.push(self.create_text_node(text)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn parses_nested_fragment() {
        let d = Document::new(Url::parse("https://example.com/").unwrap());
        let nodes = d
            .parse_fragment(r#"<div id="player" class="pip"><span>Now playing</span></div>tail"#)
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tag_name(), Some("div"));
        assert_eq!(nodes[0].get_attribute("class").as_deref(), Some("pip"));
        assert_eq!(nodes[0].text_content(), "Now playing");
        assert_eq!(nodes[1].text_content(), "tail");
        assert!(nodes[0].parent_node().is_none());

        let body = d.body().unwrap();
        for n in &nodes {
            body.append_child(n).unwrap();
        }
        assert_eq!(
            d.serialize(),
            "<html><head></head><body><div class=\"pip\" id=\"player\"><span>Now playing</span></div>tail</body></html>"
        );
    }
}
