use super::node::{Node, NodeKind};
use super::{DocumentHost, NavigationKind, NavigationOutcome, NavigationRequest};
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use url::{Origin, Url};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct DocumentInner {
    id: u64,
    url: Url,
    /// Relative URLs resolve against this; a created `about:blank` document
    /// takes its creator's.
    base_url: Url,
    origin: Origin,
    root: Node,
    active: AtomicBool,
    host: Mutex<Option<Weak<dyn DocumentHost>>>,
}

/// A handle to a document. Cloning the handle does not clone the document.
#[derive(Clone)]
pub struct Document(pub(crate) Arc<DocumentInner>);

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.0.id)
            .field("url", &self.0.url.as_str())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Document {
    /// A fresh document for `url` with the default `html > head + body`
    /// structure.
    pub fn new(url: Url) -> Document {
        let origin = url.origin();
        Document::with_origin(url, origin)
    }

    /// A fresh document whose origin is inherited rather than derived from
    /// its URL (e.g. `about:blank` documents created by script).
    pub fn with_origin(url: Url, origin: Origin) -> Document {
        let base_url = url.clone();
        Document::build(url, base_url, origin)
    }

    /// An `about:blank` document created by `creator`. It inherits the
    /// creator's origin and base URL.
    pub fn blank_for(creator: &Document) -> Result<Document> {
        let blank = Url::parse("about:blank")?;
        Ok(Document::build(
            blank,
            creator.0.base_url.clone(),
            creator.0.origin.clone(),
        ))
    }

    fn build(url: Url, base_url: Url, origin: Origin) -> Document {
        let inner = Arc::new_cyclic(|weak: &Weak<DocumentInner>| {
            let root = Node::new(NodeKind::Document, weak.clone());
            let html = Node::new_element("html", weak.clone());
            let head = Node::new_element("head", weak.clone());
            let body = Node::new_element("body", weak.clone());
            root.link_child(&html);
            html.link_child(&head);
            html.link_child(&body);
            DocumentInner {
                id: NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed),
                url,
                base_url,
                origin,
                root,
                active: AtomicBool::new(true),
                host: Mutex::new(None),
            }
        });
        Document(inner)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn url(&self) -> &Url {
        &self.0.url
    }

    pub fn base_url(&self) -> &Url {
        &self.0.base_url
    }

    pub fn origin(&self) -> &Origin {
        &self.0.origin
    }

    /// False once the hosting window has torn the document down.
    pub fn is_active(&self) -> bool {
        self.0.active.load(Ordering::Acquire)
    }

    pub fn is_same_document(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn document_node(&self) -> Node {
        self.0.root.clone()
    }

    pub fn document_element(&self) -> Option<Node> {
        self.0.root.children().into_iter().find(|n| n.tag_name().is_some())
    }

    pub fn head(&self) -> Option<Node> {
        self.html_child("head")
    }

    pub fn body(&self) -> Option<Node> {
        self.html_child("body")
    }

    fn html_child(&self, tag: &str) -> Option<Node> {
        self.document_element()?
            .children()
            .into_iter()
            .find(|n| n.tag_name() == Some(tag))
    }

    /// True while the document holds nothing beyond `html > head + body`.
    pub fn is_blank(&self) -> bool {
        match (self.head(), self.body()) {
            (Some(head), Some(body)) => !head.has_child_nodes() && !body.has_child_nodes(),
            _ => false,
        }
    }

    /// Whether `node` is part of this document's live tree.
    pub fn contains(&self, node: &Node) -> bool {
        node.root().is_same_node(&self.0.root)
    }

    pub fn create_element(&self, tag: &str) -> Result<Node> {
        self.ensure_active()?;
        validate_name(tag)?;
        Ok(Node::new_element(&tag.to_ascii_lowercase(), Arc::downgrade(&self.0)))
    }

    pub fn create_text_node(&self, text: &str) -> Result<Node> {
        self.ensure_active()?;
        Ok(Node::new_text(text, Arc::downgrade(&self.0)))
    }

    /// `location.href = href`. Relative URLs resolve against the document
    /// base URL. What happens next is up to the hosting window.
    pub fn navigate(&self, href: &str) -> Result<NavigationOutcome> {
        let url = self.0.base_url.join(href)?;
        self.host()?.navigate(
            self,
            NavigationRequest {
                url,
                kind: NavigationKind::Location,
            },
        )
    }

    pub fn reload(&self) -> Result<NavigationOutcome> {
        self.host()?.navigate(
            self,
            NavigationRequest {
                url: self.0.url.clone(),
                kind: NavigationKind::Reload,
            },
        )
    }

    pub fn open_window(&self, href: &str) -> Result<()> {
        let url = self.0.base_url.join(href)?;
        self.host()?.open_window(self, &url)
    }

    pub fn download(&self, href: &str) -> Result<()> {
        let url = self.0.base_url.join(href)?;
        self.host()?.download(self, &url)
    }

    /// `document.exitPictureInPicture()`. Closing nothing is not an error.
    pub fn exit_picture_in_picture(&self) -> Result<()> {
        self.host()?.exit_picture_in_picture(self)
    }

    /// Deterministic HTML serialization of the whole tree.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        serialize_node(&self.0.root, &mut out);
        out
    }

    /// SHA-256 hex digest of [`Document::serialize`].
    pub fn snapshot_digest(&self) -> String {
        hex::encode(Sha256::digest(self.serialize().as_bytes()))
    }

    pub(crate) fn attach_host(&self, host: Weak<dyn DocumentHost>) {
        *self.0.host.lock().unwrap_or_else(PoisonError::into_inner) = Some(host);
    }

    /// Tear the document down: detach the tree and refuse further mutation.
    pub(crate) fn destroy(&self) {
        if !self.0.active.swap(false, Ordering::AcqRel) {
            return;
        }
        self.0.host.lock().unwrap_or_else(PoisonError::into_inner).take();
        for child in self.0.root.children() {
            child.detach();
        }
        log::debug!("document {} destroyed", self.0.id);
    }

    fn host(&self) -> Result<Arc<dyn DocumentHost>> {
        self.ensure_active()?;
        self.0
            .host
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| Error::InvalidState("document has no browsing context".to_string()))
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(Error::InvalidState("document has been destroyed".to_string()));
        }
        Ok(())
    }
}

pub(crate) fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' || c == '.');
    if !valid {
        return Err(Error::Validation(format!("'{}' is not a valid name", name)));
    }
    Ok(())
}

fn serialize_node(node: &Node, out: &mut String) {
    match node.kind() {
        NodeKind::Document => {
            for child in node.children() {
                serialize_node(&child, out);
            }
        }
        NodeKind::Element { tag } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in node.attributes() {
                out.push(' ');
                out.push_str(&name);
                out.push_str("=\"");
                escape_into(&value, true, out);
                out.push('"');
            }
            out.push('>');
            for child in node.children() {
                serialize_node(&child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeKind::Text => escape_into(&node.text_content(), false, out),
    }
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_default_structure() {
        let d = Document::new(Url::parse("https://example.com/").unwrap());
        assert!(d.is_blank());
        assert_eq!(d.document_element().unwrap().tag_name(), Some("html"));
        assert_eq!(d.serialize(), "<html><head></head><body></body></html>");
    }

    #[test]
    fn destroyed_document_refuses_mutation() {
        let d = Document::new(Url::parse("https://example.com/").unwrap());
        let body = d.body().unwrap();
        d.destroy();
        assert!(!d.is_active());
        assert!(d.body().is_none());
        assert!(matches!(d.create_element("div"), Err(Error::InvalidState(_))));
        let orphan = Document::new(Url::parse("https://example.com/x").unwrap())
            .create_element("div")
            .unwrap();
        assert!(matches!(body.append_child(&orphan), Err(Error::InvalidState(_))));
    }

    #[test]
    fn unattached_document_cannot_navigate() {
        let d = Document::new(Url::parse("https://example.com/").unwrap());
        assert!(matches!(d.navigate("/next"), Err(Error::InvalidState(_))));
        assert!(matches!(d.navigate("http://[::1"), Err(Error::Syntax(_))));
    }

    #[test]
    fn blank_document_inherits_creator_origin_and_base() {
        let creator = Document::new(Url::parse("https://example.com/watch/42").unwrap());
        let blank = Document::blank_for(&creator).unwrap();
        assert_eq!(blank.url().as_str(), "about:blank");
        assert_eq!(blank.origin(), creator.origin());
        assert_eq!(blank.base_url().as_str(), "https://example.com/watch/42");
        assert_eq!(blank.base_url().join("/other").unwrap().as_str(), "https://example.com/other");
    }

    #[test]
    fn serialization_escapes_text_and_attributes() {
        let d = Document::new(Url::parse("https://example.com/").unwrap());
        let a = d.create_element("a").unwrap();
        a.set_attribute("title", "\"x\" & y").unwrap();
        a.set_text_content("<b>").unwrap();
        d.body().unwrap().append_child(&a).unwrap();
        assert_eq!(
            d.serialize(),
            "<html><head></head><body><a title=\"&quot;x&quot; &amp; y\">&lt;b&gt;</a></body></html>"
        );
    }

    #[test]
    fn invalid_tag_names_are_rejected() {
        let d = Document::new(Url::parse("https://example.com/").unwrap());
        assert!(matches!(d.create_element(""), Err(Error::Validation(_))));
        assert!(matches!(d.create_element("a b"), Err(Error::Validation(_))));
    }
}
