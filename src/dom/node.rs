use super::document::{Document, DocumentInner};
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element { tag: String },
    Text,
}

pub(crate) struct NodeInner {
    id: u64,
    kind: NodeKind,
    state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
    parent: Option<Weak<NodeInner>>,
    children: Vec<Node>,
    owner: Weak<DocumentInner>,
    attributes: Vec<(String, String)>,
    text: String,
}

/// A handle to a DOM node. Cloning the handle does not clone the node.
#[derive(Clone)]
pub struct Node(pub(crate) Arc<NodeInner>);

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Document => write!(f, "Node(#{} #document)", self.0.id),
            NodeKind::Element { tag } => write!(f, "Node(#{} <{}>)", self.0.id, tag),
            NodeKind::Text => write!(f, "Node(#{} #text)", self.0.id),
        }
    }
}

impl Node {
    pub(crate) fn new(kind: NodeKind, owner: Weak<DocumentInner>) -> Node {
        Node(Arc::new(NodeInner {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            state: Mutex::new(NodeState {
                owner,
                ..Default::default()
            }),
        }))
    }

    pub(crate) fn new_element(tag: &str, owner: Weak<DocumentInner>) -> Node {
        Node::new(NodeKind::Element { tag: tag.to_string() }, owner)
    }

    pub(crate) fn new_text(text: &str, owner: Weak<DocumentInner>) -> Node {
        let node = Node::new(NodeKind::Text, owner);
        node.lock().text = text.to_string();
        node
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn is_same_node(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent_node(&self) -> Option<Node> {
        self.lock().parent.as_ref().and_then(Weak::upgrade).map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.lock().children.clone()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.lock().children.first().cloned()
    }

    pub fn has_child_nodes(&self) -> bool {
        !self.lock().children.is_empty()
    }

    /// The document this node belongs to, if it is still alive.
    pub fn owner_document(&self) -> Option<Document> {
        self.lock().owner.upgrade().map(Document)
    }

    /// Inclusive descendant check (`Node.contains`).
    pub fn contains(&self, other: &Node) -> bool {
        let mut cur = Some(other.clone());
        while let Some(node) = cur {
            if node.is_same_node(self) {
                return true;
            }
            cur = node.parent_node();
        }
        false
    }

    pub(crate) fn root(&self) -> Node {
        let mut cur = self.clone();
        while let Some(parent) = cur.parent_node() {
            cur = parent;
        }
        cur
    }

    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text => self.lock().text.clone(),
            _ => {
                let mut out = String::new();
                for child in self.children() {
                    out.push_str(&child.text_content());
                }
                out
            }
        }
    }

    /// Replace the text of a text node, or the children of an element with
    /// a single text node.
    pub fn set_text_content(&self, text: &str) -> Result<()> {
        let doc = self.mutable_document()?;
        match self.0.kind {
            NodeKind::Text => {
                self.lock().text = text.to_string();
                Ok(())
            }
            NodeKind::Element { .. } => {
                for child in self.children() {
                    child.detach();
                }
                if !text.is_empty() {
                    self.append_child(&doc.create_text_node(text)?)?;
                }
                Ok(())
            }
            NodeKind::Document => Err(Error::HierarchyRequest(
                "cannot set text content of a document node".to_string(),
            )),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.lock()
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.lock().attributes.clone()
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        if self.tag_name().is_none() {
            return Err(Error::InvalidState("only elements carry attributes".to_string()));
        }
        super::document::validate_name(name)?;
        self.mutable_document()?;
        let name = name.to_ascii_lowercase();
        let mut st = self.lock();
        match st.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => st.attributes.push((name, value.to_string())),
        }
        Ok(())
    }

    /// Append `child`, moving it out of wherever it currently lives.
    ///
    /// A node from another same-origin document is adopted into this
    /// node's document. Cross-origin moves are refused.
    pub fn append_child(&self, child: &Node) -> Result<()> {
        let parent_doc = self.mutable_document()?;

        if matches!(self.0.kind, NodeKind::Text) {
            return Err(Error::HierarchyRequest("text nodes cannot have children".to_string()));
        }
        if matches!(child.0.kind, NodeKind::Document) {
            return Err(Error::HierarchyRequest("a document cannot be inserted as a child".to_string()));
        }
        if child.contains(self) {
            return Err(Error::HierarchyRequest(
                "the new child is an inclusive ancestor of the parent".to_string(),
            ));
        }
        if let Some(child_doc) = child.owner_document() {
            if child_doc.origin() != parent_doc.origin() {
                return Err(Error::Security(format!(
                    "cannot move a node from {} into {}",
                    child_doc.origin().ascii_serialization(),
                    parent_doc.origin().ascii_serialization()
                )));
            }
        }

        child.detach();
        child.adopt(&Arc::downgrade(&parent_doc.0));
        self.link_child(child);
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> Result<Node> {
        self.mutable_document()?;
        let is_child = child.parent_node().map(|p| p.is_same_node(self)).unwrap_or(false);
        if !is_child {
            return Err(Error::NotFound("node is not a child of this node".to_string()));
        }
        child.detach();
        Ok(child.clone())
    }

    /// `ChildNode.remove()`: detach from the parent, if any.
    pub fn remove(&self) {
        self.detach();
    }

    pub(crate) fn link_child(&self, child: &Node) {
        child.lock().parent = Some(Arc::downgrade(&self.0));
        self.lock().children.push(child.clone());
    }

    pub(crate) fn detach(&self) {
        if let Some(parent) = self.parent_node() {
            parent.lock().children.retain(|c| !c.is_same_node(self));
        }
        self.lock().parent = None;
    }

    fn adopt(&self, owner: &Weak<DocumentInner>) {
        self.lock().owner = owner.clone();
        for child in self.children() {
            child.adopt(owner);
        }
    }

    fn mutable_document(&self) -> Result<Document> {
        let doc = self
            .owner_document()
            .ok_or_else(|| Error::InvalidState("node's document has been discarded".to_string()))?;
        if !doc.is_active() {
            return Err(Error::InvalidState("node's document has been destroyed".to_string()));
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn doc(url: &str) -> Document {
        Document::new(Url::parse(url).unwrap())
    }

    #[test]
    fn append_moves_between_documents() {
        let a = doc("https://example.com/a");
        let b = doc("https://example.com/b");
        let div = a.create_element("div").unwrap();
        a.body().unwrap().append_child(&div).unwrap();

        b.body().unwrap().append_child(&div).unwrap();
        assert!(b.contains(&div));
        assert!(!a.contains(&div));
        assert!(div.owner_document().unwrap().is_same_document(&b));
        assert!(!a.body().unwrap().has_child_nodes());
    }

    #[test]
    fn cross_origin_move_is_refused() {
        let a = doc("https://example.com/");
        let b = doc("https://evil.example/");
        let div = a.create_element("div").unwrap();
        let err = b.body().unwrap().append_child(&div).unwrap_err();
        assert!(matches!(err, Error::Security(_)));
        assert!(div.owner_document().unwrap().is_same_document(&a));
    }

    #[test]
    fn ancestor_cannot_become_descendant() {
        let a = doc("https://example.com/");
        let outer = a.create_element("div").unwrap();
        let inner = a.create_element("span").unwrap();
        outer.append_child(&inner).unwrap();
        assert!(matches!(inner.append_child(&outer), Err(Error::HierarchyRequest(_))));
        assert!(matches!(outer.append_child(&outer), Err(Error::HierarchyRequest(_))));
    }

    #[test]
    fn remove_child_requires_parentage() {
        let a = doc("https://example.com/");
        let body = a.body().unwrap();
        let p = a.create_element("p").unwrap();
        assert!(matches!(body.remove_child(&p), Err(Error::NotFound(_))));
        body.append_child(&p).unwrap();
        body.remove_child(&p).unwrap();
        assert!(p.parent_node().is_none());
    }

    #[test]
    fn text_content_and_attributes() {
        let a = doc("https://example.com/");
        let p = a.create_element("p").unwrap();
        p.set_text_content("hello").unwrap();
        p.set_attribute("ID", "greeting").unwrap();
        assert_eq!(p.text_content(), "hello");
        assert_eq!(p.get_attribute("id").as_deref(), Some("greeting"));
        p.set_text_content("bye").unwrap();
        assert_eq!(p.children().len(), 1);
        assert_eq!(p.text_content(), "bye");
    }
}
