//! DOM synchronization
//!
//! Elements opt into translation with a `data-i18n="key"` attribute. An
//! optional `data-i18n-attr="name"` routes the translated text into that
//! attribute instead of the element's text content.
//!
//! The runtime only talks to the page through two seams:
//!
//! - [`DomTree`]: the element queries and writes a translation pass needs
//! - [`MutationWatcher`]: delivery of batches of inserted subtree roots
//!
//! [`Document`] and [`SharedDocument`] are the in-memory implementations.

use crate::error::{I18nError, I18nResult};
use crate::store::TranslationStore;
use crate::table::TranslationTable;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

/// Attribute holding the translation key
pub const I18N_ATTR: &str = "data-i18n";

/// Attribute naming the attribute that receives the translation
pub const I18N_TARGET_ATTR: &str = "data-i18n-attr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element-level access to a document
pub trait DomTree {
    fn body(&self) -> NodeId;

    fn is_element(&self, node: NodeId) -> bool;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> I18nResult<()>;

    /// Replace all children of `node` with a single text node
    fn set_text_content(&mut self, node: NodeId, text: &str) -> I18nResult<()>;

    /// Descendant elements of `node` (not `node` itself) carrying attribute
    /// `name`, in document order
    fn descendants_with_attribute(&self, node: NodeId, name: &str) -> Vec<NodeId>;
}

/// Callback receiving one batch of inserted subtree roots
pub type BatchHandler = Arc<dyn Fn(&mut dyn DomTree, &[NodeId]) -> I18nResult<()> + Send + Sync>;

/// Subscription to insertions anywhere under the document body
///
/// Only child-list changes are reported; attribute changes are not.
pub trait MutationWatcher: Send + Sync {
    /// Register `handler` for every future batch
    fn observe(&self, handler: BatchHandler);

    /// Run `visitor` against the document with its body node
    fn visit_body(&self, visitor: &mut dyn FnMut(&mut dyn DomTree, NodeId));
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document with a `body` root
///
/// Elements appended beneath the body are recorded as pending insertions
/// until [`Document::take_mutations`] drains them.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    pending: Vec<NodeId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = Node {
            data: NodeData::Element {
                tag: "body".to_string(),
                attributes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Document {
            nodes: vec![body],
            body: NodeId(0),
            pending: Vec::new(),
        }
    }

    /// Create a detached element
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
        })
    }

    /// Create a detached element with the given attributes
    pub fn create_element_with(&mut self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        self.push_node(NodeData::Element {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> I18nResult<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| I18nError::Dom(format!("Unknown node {:?}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> I18nResult<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| I18nError::Dom(format!("Unknown node {:?}", id)))
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text(_) => None,
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `node` is the body or one of its descendants
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.body, node)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id.0).and_then(|n| n.parent);
        }
        false
    }

    /// Append `child` as the last child of `parent`, moving it if attached
    ///
    /// Appending an element beneath the body records an insertion.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> I18nResult<()> {
        if matches!(self.node(parent)?.data, NodeData::Text(_)) {
            return Err(I18nError::Dom("Text nodes cannot have children".to_string()));
        }
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(I18nError::Dom(format!(
                "Cannot append {:?} into its own subtree",
                child
            )));
        }

        self.detach(child);
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);

        if self.is_connected(parent) && self.is_element(child) {
            self.pending.push(child);
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.parent = None;
        }
    }

    /// Concatenated text of `node` and its descendants
    pub fn text_content(&self, node: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(node, &mut text);
        text
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node.0) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { .. } => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Number of nodes ever allocated, attached or not
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drain the insertion records accumulated since the last call
    pub fn take_mutations(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn validate_attribute_name(name: &str) -> I18nResult<()> {
    let invalid = name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '\0'));
    if invalid {
        return Err(I18nError::Dom(format!("Invalid attribute name '{}'", name)));
    }
    Ok(())
}

impl DomTree for Document {
    fn body(&self) -> NodeId {
        self.body
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|n| &n.data),
            Some(NodeData::Element { .. })
        )
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.nodes.get(node.0)?.data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> I18nResult<()> {
        validate_attribute_name(name)?;
        match &mut self.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(k, _)| k == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            NodeData::Text(_) => Err(I18nError::Dom(
                "Cannot set an attribute on a text node".to_string(),
            )),
        }
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) -> I18nResult<()> {
        if let NodeData::Text(existing) = &mut self.node_mut(node)?.data {
            *existing = text.to_string();
            return Ok(());
        }

        // Reuse a lone text child so repeated passes don't grow the arena
        let lone_child = match self.node(node)?.children.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        if let Some(child) = lone_child.filter(|_| !text.is_empty()) {
            if let NodeData::Text(existing) = &mut self.node_mut(child)?.data {
                *existing = text.to_string();
                return Ok(());
            }
        }

        let old_children = std::mem::take(&mut self.node_mut(node)?.children);
        for child in old_children {
            if let Some(c) = self.nodes.get_mut(child.0) {
                c.parent = None;
            }
        }

        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.node_mut(text_node)?.parent = Some(node);
            self.node_mut(node)?.children.push(text_node);
        }
        Ok(())
    }

    fn descendants_with_attribute(&self, node: NodeId, name: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.attribute(id, name).is_some() {
                found.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        found
    }
}

/// Thread-safe handle to a [`Document`] that dispatches mutation batches
///
/// [`SharedDocument::flush_mutations`] stands in for the host event loop
/// delivering queued mutation records.
#[derive(Clone, Default)]
pub struct SharedDocument {
    document: Arc<Mutex<Document>>,
    handlers: Arc<Mutex<Vec<BatchHandler>>>,
}

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            document: Arc::new(Mutex::new(document)),
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Run `f` with exclusive access to the document
    pub fn with<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut document)
    }

    pub fn observer_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver pending insertions to every observer as one batch
    ///
    /// A handler that fails or panics is logged; the batch still reaches the
    /// remaining handlers and later batches are delivered normally.
    ///
    /// Returns the number of inserted roots delivered.
    pub fn flush_mutations(&self) -> usize {
        let handlers: Vec<BatchHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let roots = document.take_mutations();
        if roots.is_empty() || handlers.is_empty() {
            return roots.len();
        }

        debug!(
            "Delivering {} inserted nodes to {} observers",
            roots.len(),
            handlers.len()
        );
        for handler in &handlers {
            let tree: &mut dyn DomTree = &mut *document;
            match catch_unwind(AssertUnwindSafe(|| handler(tree, &roots))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Mutation observer failed: {}", e),
                Err(_) => error!("Mutation observer panicked"),
            }
        }
        roots.len()
    }
}

impl MutationWatcher for SharedDocument {
    fn observe(&self, handler: BatchHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    fn visit_body(&self, visitor: &mut dyn FnMut(&mut dyn DomTree, NodeId)) {
        let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let body = document.body();
        visitor(&mut *document, body);
    }
}

/// Write `text` into the target of a tagged element
pub fn apply_translation(tree: &mut dyn DomTree, element: NodeId, text: &str) -> I18nResult<()> {
    match tree.attribute(element, I18N_TARGET_ATTR) {
        Some(target) => tree.set_attribute(element, &target, text),
        None => tree.set_text_content(element, text),
    }
}

/// Translate `root` and every tagged descendant with `table`
///
/// Elements that cannot be updated are logged and skipped. Running the
/// pass twice with the same table yields the same document.
///
/// Returns the number of elements updated.
pub fn translate_subtree(tree: &mut dyn DomTree, root: NodeId, table: &TranslationTable) -> usize {
    let mut targets = Vec::new();
    if tree.is_element(root) && tree.attribute(root, I18N_ATTR).is_some() {
        targets.push(root);
    }
    targets.extend(tree.descendants_with_attribute(root, I18N_ATTR));

    let mut updated = 0;
    for element in targets {
        let Some(key) = tree.attribute(element, I18N_ATTR) else {
            continue;
        };
        let text = table.lookup(&key).to_string();
        match apply_translation(tree, element, &text) {
            Ok(()) => updated += 1,
            Err(e) => warn!("Failed to translate element with key '{}': {}", key, e),
        }
    }
    updated
}

/// Keeps tagged elements in sync with the active table
#[derive(Clone)]
pub struct DomSynchronizer {
    store: TranslationStore,
}

impl DomSynchronizer {
    pub fn new(store: TranslationStore) -> Self {
        Self { store }
    }

    /// Translate one subtree against the currently active table
    pub fn translate_subtree(&self, tree: &mut dyn DomTree, root: NodeId) -> usize {
        let table = self.store.table();
        translate_subtree(tree, root, &table)
    }

    /// Translate every inserted element root of a batch
    pub fn handle_batch(&self, tree: &mut dyn DomTree, roots: &[NodeId]) -> usize {
        let table = self.store.table();
        let mut updated = 0;
        for root in roots {
            if tree.is_element(*root) {
                updated += translate_subtree(tree, *root, &table);
            }
        }
        updated
    }

    /// Subscribe to `watcher` so that inserted subtrees get translated
    pub fn attach(&self, watcher: &dyn MutationWatcher) {
        let synchronizer = self.clone();
        watcher.observe(Arc::new(
            move |tree: &mut dyn DomTree, roots: &[NodeId]| -> I18nResult<()> {
                synchronizer.handle_batch(tree, roots);
                Ok(())
            },
        ));
    }

    /// Translate the whole body of the watched document
    pub fn translate_document(&self, watcher: &dyn MutationWatcher) -> usize {
        let mut updated = 0;
        watcher.visit_body(&mut |tree: &mut dyn DomTree, body: NodeId| {
            updated = self.translate_subtree(tree, body);
        });
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageCode;

    fn greet_table() -> TranslationTable {
        TranslationTable::new()
            .with_entry("greet", "Hello $name$")
            .with_entry("search", "Search")
    }

    #[test]
    fn test_translate_self_and_descendants() {
        let mut doc = Document::new();
        let body = doc.body();
        let outer = doc.create_element_with("div", &[(I18N_ATTR, "greet")]);
        let inner = doc.create_element_with("span", &[(I18N_ATTR, "missing.key")]);
        doc.append_child(outer, inner).unwrap();
        doc.append_child(body, outer).unwrap();

        let updated = translate_subtree(&mut doc, outer, &greet_table());
        assert_eq!(updated, 2);
        // Outer's text replaced its children, so only the translation remains
        assert_eq!(doc.text_content(outer), "Hello $name$");
        assert_eq!(doc.text_content(inner), "missing.key");
    }

    #[test]
    fn test_translate_into_attribute() {
        let mut doc = Document::new();
        let body = doc.body();
        let input = doc.create_element_with(
            "input",
            &[(I18N_ATTR, "search"), (I18N_TARGET_ATTR, "placeholder")],
        );
        doc.append_child(body, input).unwrap();

        translate_subtree(&mut doc, body, &greet_table());
        assert_eq!(doc.attribute(input, "placeholder").as_deref(), Some("Search"));
        assert_eq!(doc.text_content(input), "");
    }

    #[test]
    fn test_translation_is_idempotent() {
        let mut doc = Document::new();
        let body = doc.body();
        let span = doc.create_element_with("span", &[(I18N_ATTR, "greet")]);
        let label = doc.create_element_with(
            "img",
            &[(I18N_ATTR, "search"), (I18N_TARGET_ATTR, "alt")],
        );
        doc.append_child(body, span).unwrap();
        doc.append_child(body, label).unwrap();

        translate_subtree(&mut doc, body, &greet_table());
        let first = (doc.text_content(body), doc.attribute(label, "alt"));
        translate_subtree(&mut doc, body, &greet_table());
        let second = (doc.text_content(body), doc.attribute(label, "alt"));
        assert_eq!(first, second);
        assert_eq!(doc.children(span).len(), 1);
    }

    #[test]
    fn test_repeated_passes_reuse_text_nodes() {
        let mut doc = Document::new();
        let body = doc.body();
        let span = doc.create_element_with("span", &[(I18N_ATTR, "greet")]);
        doc.append_child(body, span).unwrap();

        translate_subtree(&mut doc, body, &greet_table());
        let allocated = doc.node_count();
        for _ in 0..5 {
            translate_subtree(&mut doc, body, &greet_table());
        }
        assert_eq!(doc.node_count(), allocated);

        let other = TranslationTable::new().with_entry("greet", "Hi");
        translate_subtree(&mut doc, body, &other);
        assert_eq!(doc.node_count(), allocated);
        assert_eq!(doc.text_content(span), "Hi");
    }

    #[test]
    fn test_handle_batch_skips_text_roots() {
        let mut doc = Document::new();
        let body = doc.body();
        let span = doc.create_element_with("span", &[(I18N_ATTR, "search")]);
        let text = doc.create_text("loose");
        doc.append_child(body, span).unwrap();
        doc.append_child(body, text).unwrap();

        let sync = DomSynchronizer::new(TranslationStore::with_table(
            LanguageCode::new("en"),
            greet_table(),
        ));
        assert_eq!(sync.handle_batch(&mut doc, &[span, text]), 1);
        assert_eq!(doc.text_content(span), "Search");
        assert_eq!(doc.text_content(text), "loose");
    }

    #[test]
    fn test_bad_target_attribute_only_skips_that_element() {
        let mut doc = Document::new();
        let body = doc.body();
        let broken = doc.create_element_with("a", &[(I18N_ATTR, "greet"), (I18N_TARGET_ATTR, "")]);
        let fine = doc.create_element_with("b", &[(I18N_ATTR, "search")]);
        doc.append_child(body, broken).unwrap();
        doc.append_child(body, fine).unwrap();

        assert_eq!(translate_subtree(&mut doc, body, &greet_table()), 1);
        assert_eq!(doc.text_content(fine), "Search");
    }

    #[test]
    fn test_insertions_recorded_only_under_body() {
        let mut doc = Document::new();
        let body = doc.body();
        let detached = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(detached, child).unwrap();
        assert!(!doc.has_pending_mutations());

        doc.append_child(body, detached).unwrap();
        let text = doc.create_text("hi");
        doc.append_child(detached, text).unwrap();
        assert_eq!(doc.take_mutations(), vec![detached]);
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn test_append_rejects_cycles() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert!(doc.append_child(inner, outer).is_err());
        assert!(doc.append_child(outer, outer).is_err());
    }

    #[test]
    fn test_synchronizer_translates_inserted_subtree_only() {
        let shared = SharedDocument::new(Document::new());
        let store = TranslationStore::with_table(LanguageCode::new("en"), greet_table());
        let sync = DomSynchronizer::new(store);
        sync.attach(&shared);

        let (existing, added) = shared.with(|doc| {
            let body = doc.body();
            let existing = doc.create_element_with("p", &[(I18N_ATTR, "search")]);
            doc.append_child(body, existing).unwrap();
            doc.take_mutations();

            let added = doc.create_element_with("span", &[(I18N_ATTR, "greet")]);
            doc.append_child(body, added).unwrap();
            (existing, added)
        });

        assert_eq!(shared.flush_mutations(), 1);
        shared.with(|doc| {
            assert_eq!(doc.text_content(added), "Hello $name$");
            assert_eq!(doc.text_content(existing), "");
        });
    }

    #[test]
    fn test_failing_handler_does_not_stop_later_batches() {
        let shared = SharedDocument::new(Document::new());
        shared.observe(Arc::new(
            |_: &mut dyn DomTree, _: &[NodeId]| -> I18nResult<()> { panic!("broken observer") },
        ));
        shared.observe(Arc::new(
            |_: &mut dyn DomTree, _: &[NodeId]| -> I18nResult<()> {
                Err(I18nError::Dom("broken".to_string()))
            },
        ));

        let sync = DomSynchronizer::new(TranslationStore::with_table(
            LanguageCode::new("en"),
            greet_table(),
        ));
        sync.attach(&shared);

        for _ in 0..2 {
            let span = shared.with(|doc| {
                let body = doc.body();
                let span = doc.create_element_with("span", &[(I18N_ATTR, "search")]);
                doc.append_child(body, span).unwrap();
                span
            });
            assert_eq!(shared.flush_mutations(), 1);
            shared.with(|doc| assert_eq!(doc.text_content(span), "Search"));
        }
    }

    #[test]
    fn test_translate_document() {
        let shared = SharedDocument::new(Document::new());
        shared.with(|doc| {
            let body = doc.body();
            for key in ["greet", "search", "other"] {
                let el = doc.create_element_with("span", &[(I18N_ATTR, key)]);
                doc.append_child(body, el).unwrap();
            }
        });

        let sync = DomSynchronizer::new(TranslationStore::with_table(
            LanguageCode::new("en"),
            greet_table(),
        ));
        assert_eq!(sync.translate_document(&shared), 3);
        shared.with(|doc| {
            assert_eq!(doc.text_content(doc.body()), "Hello $name$Searchother");
        });
    }
}
