use std::collections::BTreeMap;

use doctree::{Block, Family, Inline, MetaValue, Node, flatten_inlines};
use tracing::debug;

use crate::arena::{Arena, NodeId, Slot};

/// Where a replacement can go.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Replace the original node in its own slot.
    Splice(Vec<Node>),
    /// The original's slot cannot hold the replacement; substitute an
    /// ancestor after the walk instead.
    Defer(Vec<Node>),
}

/// Reconcile a replacement with the family of the node it replaces.
pub fn resolve(original: Family, nodes: Vec<Node>) -> Resolution {
    if nodes.iter().all(|node| node.family() == original) {
        return Resolution::Splice(nodes);
    }
    match original {
        Family::Inline => Resolution::Defer(nodes),
        Family::Block | Family::Meta => Resolution::Splice(lift(original, nodes)),
    }
}

/// Convert a replacement into nodes of the target family.
///
/// For blocks, each run of inline nodes is wrapped in a `Plain` block. For
/// metadata the whole replacement becomes one value. For inlines, blocks are
/// flattened into their inline content.
pub fn lift(target: Family, nodes: Vec<Node>) -> Vec<Node> {
    match target {
        Family::Block => to_blocks(nodes).into_iter().map(Node::Block).collect(),
        Family::Inline => to_inlines(nodes).into_iter().map(Node::Inline).collect(),
        Family::Meta => {
            if nodes.iter().all(|node| node.family() == Family::Meta) {
                return nodes;
            }
            let value = if nodes.iter().all(|node| node.family() == Family::Inline) {
                MetaValue::Inlines(to_inlines(nodes))
            } else {
                MetaValue::Blocks(to_blocks(nodes))
            };
            vec![Node::Meta(value)]
        }
    }
}

fn to_blocks(nodes: Vec<Node>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut run: Vec<Inline> = Vec::new();
    for node in nodes {
        match node {
            Node::Inline(inline) => run.push(inline),
            Node::Block(block) => {
                if !run.is_empty() {
                    blocks.push(Block::Plain(std::mem::take(&mut run)));
                }
                blocks.push(block);
            }
            Node::Meta(value) => {
                if !run.is_empty() {
                    blocks.push(Block::Plain(std::mem::take(&mut run)));
                }
                blocks.extend(meta_blocks(value));
            }
        }
    }
    if !run.is_empty() {
        blocks.push(Block::Plain(run));
    }
    blocks
}

fn to_inlines(nodes: Vec<Node>) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut run: Vec<Block> = Vec::new();
    for node in nodes {
        match node {
            Node::Inline(inline) => {
                inlines.extend(flatten_inlines(std::mem::take(&mut run)));
                inlines.push(inline);
            }
            Node::Block(block) => run.push(block),
            Node::Meta(value) => run.extend(meta_blocks(value)),
        }
    }
    inlines.extend(flatten_inlines(run));
    inlines
}

fn meta_blocks(value: MetaValue) -> Vec<Block> {
    match value {
        MetaValue::Bool(flag) => vec![Block::Plain(vec![Inline::Text(flag.to_string())])],
        MetaValue::Str(text) => vec![Block::Plain(vec![Inline::Text(text)])],
        MetaValue::Inlines(content) => vec![Block::Plain(content)],
        MetaValue::Blocks(blocks) => blocks,
        MetaValue::List(items) => items.into_iter().flat_map(meta_blocks).collect(),
        MetaValue::Map(entries) => entries.into_values().flat_map(meta_blocks).collect(),
    }
}

// ---------------------------------------------------------------------------
// Second pass
// ---------------------------------------------------------------------------

/// Replacements waiting for the walk to finish, keyed by target node.
#[derive(Debug, Default)]
pub struct PendingReplacements {
    entries: BTreeMap<NodeId, Vec<Node>>,
}

impl PendingReplacements {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a replacement for `target`. Returns `false`, leaving the
    /// existing entry in place, if `target` already has one.
    pub fn record(&mut self, target: NodeId, nodes: Vec<Node>) -> bool {
        if self.entries.contains_key(&target) {
            return false;
        }
        self.entries.insert(target, nodes);
        true
    }

    /// Substitute every recorded target that is still reachable from the
    /// root. Entries for unreachable targets are dropped.
    pub fn apply(mut self, arena: &mut Arena) {
        if self.entries.is_empty() {
            return;
        }
        let root = arena.take_root();
        let root = root
            .into_iter()
            .map(|slot| self.apply_slot(arena, slot))
            .collect();
        arena.set_root(root);

        for target in self.entries.keys() {
            debug!(
                target = target.index(),
                "dropping replacement for unreachable node"
            );
        }
    }

    fn apply_slot(&mut self, arena: &mut Arena, slot: Slot) -> Slot {
        match slot {
            Slot::Single(id) => {
                let family = arena.family(id);
                let ids = self.apply_node(arena, id);
                Slot::Single(arena.collapse(family, ids))
            }
            Slot::Sequence(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    out.extend(self.apply_node(arena, id));
                }
                Slot::Sequence(out)
            }
            Slot::Map(entries) => {
                let mut out = BTreeMap::new();
                for (key, id) in entries {
                    let ids = self.apply_node(arena, id);
                    if let Some(id) = arena.collapse_entry(ids) {
                        out.insert(key, id);
                    }
                }
                Slot::Map(out)
            }
        }
    }

    fn apply_node(&mut self, arena: &mut Arena, id: NodeId) -> Vec<NodeId> {
        if let Some(nodes) = self.entries.remove(&id) {
            let family = arena.family(id);
            debug!(target = id.index(), nodes = nodes.len(), "applying deferred replacement");
            return lift(family, nodes)
                .into_iter()
                .map(|node| arena.insert(node))
                .collect();
        }
        let slots = arena.take_slots(id);
        let slots = slots
            .into_iter()
            .map(|slot| self.apply_slot(arena, slot))
            .collect();
        arena.set_slots(id, slots);
        vec![id]
    }
}
