//! Flattened document tree.
//!
//! Every node is stored once, by index, with its children replaced by the
//! indices of their entries. Indices are assigned in pre-order when the
//! document is flattened, so they give each original node a stable identity
//! that survives edits to the surrounding tree.

use std::collections::BTreeMap;
use std::mem;

use doctree::{Children, Document, Family, MetaValue, Node, ShapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A child container holding node indices instead of nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Single(NodeId),
    Sequence(Vec<NodeId>),
    Map(BTreeMap<String, NodeId>),
}

#[derive(Debug)]
struct Entry {
    /// The node with its children detached.
    node: Node,
    slots: Vec<Slot>,
}

#[derive(Debug, Default)]
pub struct Arena {
    entries: Vec<Entry>,
    root: Vec<Slot>,
}

impl Arena {
    pub fn flatten(document: Document) -> Self {
        let mut arena = Arena::default();
        let root = document
            .into_children()
            .into_iter()
            .map(|children| arena.insert_children(children))
            .collect();
        arena.root = root;
        arena
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a node and, recursively, its children.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.entries.len());
        let children = node.detach_children();
        self.entries.push(Entry {
            node,
            slots: Vec::new(),
        });
        let slots = children
            .into_iter()
            .map(|children| self.insert_children(children))
            .collect();
        self.entries[id.0].slots = slots;
        id
    }

    fn insert_children(&mut self, children: Children) -> Slot {
        match children {
            Children::Single(node) => Slot::Single(self.insert(node)),
            Children::Sequence(nodes) => {
                Slot::Sequence(nodes.into_iter().map(|node| self.insert(node)).collect())
            }
            Children::Map(entries) => Slot::Map(
                entries
                    .into_iter()
                    .map(|(key, node)| (key, self.insert(node)))
                    .collect(),
            ),
        }
    }

    /// The node stored at `id`, without its children.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.entries[id.0].node
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.entries[id.0].node
    }

    pub fn family(&self, id: NodeId) -> Family {
        self.entries[id.0].node.family()
    }

    pub fn slots(&self, id: NodeId) -> &[Slot] {
        &self.entries[id.0].slots
    }

    pub fn take_slots(&mut self, id: NodeId) -> Vec<Slot> {
        mem::take(&mut self.entries[id.0].slots)
    }

    pub fn set_slots(&mut self, id: NodeId, slots: Vec<Slot>) {
        self.entries[id.0].slots = slots;
    }

    pub fn root(&self) -> &[Slot] {
        &self.root
    }

    pub fn take_root(&mut self) -> Vec<Slot> {
        mem::take(&mut self.root)
    }

    pub fn set_root(&mut self, root: Vec<Slot>) {
        self.root = root;
    }

    /// Fit a run of nodes into a single-child slot of the given family.
    ///
    /// One node is used as is. Zero nodes become an empty generic container,
    /// several are wrapped in one.
    pub fn collapse(&mut self, family: Family, ids: Vec<NodeId>) -> NodeId {
        if let [id] = ids[..] {
            return id;
        }
        let container = self.insert(Node::container(family));
        self.set_slots(container, vec![Slot::Sequence(ids)]);
        container
    }

    /// Fit a run of nodes into one entry of a key/value slot. An empty run
    /// removes the entry; several nodes become a list.
    pub fn collapse_entry(&mut self, ids: Vec<NodeId>) -> Option<NodeId> {
        if ids.is_empty() {
            None
        } else {
            Some(self.collapse(Family::Meta, ids))
        }
    }

    /// Rebuild the owned tree.
    pub fn into_document(mut self) -> Result<Document, ShapeError> {
        let root = self.take_root();
        let children = root
            .into_iter()
            .map(|slot| self.build_children(slot))
            .collect::<Result<Vec<_>, _>>()?;
        Document::from_children(children)
    }

    fn build_children(&mut self, slot: Slot) -> Result<Children, ShapeError> {
        Ok(match slot {
            Slot::Single(id) => Children::Single(self.build(id)?),
            Slot::Sequence(ids) => Children::Sequence(
                ids.into_iter()
                    .map(|id| self.build(id))
                    .collect::<Result<_, _>>()?,
            ),
            Slot::Map(entries) => Children::Map(
                entries
                    .into_iter()
                    .map(|(key, id)| self.build(id).map(|node| (key, node)))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn build(&mut self, id: NodeId) -> Result<Node, ShapeError> {
        let entry = &mut self.entries[id.0];
        let mut node = mem::replace(&mut entry.node, Node::Meta(MetaValue::default()));
        let slots = mem::take(&mut entry.slots);
        let children = slots
            .into_iter()
            .map(|slot| self.build_children(slot))
            .collect::<Result<Vec<_>, _>>()?;
        node.attach_children(children)?;
        Ok(node)
    }
}
