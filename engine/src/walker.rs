use std::collections::BTreeMap;

use doctree::{Document, Family, Node};
use tracing::{debug, warn};

use crate::arena::{Arena, NodeId, Slot};
use crate::config::SessionConfig;
use crate::dispatch::{Action, Dispatcher};
use crate::error::ExecError;
use crate::resolve::{PendingReplacements, Resolution, resolve};
use crate::session::{Executor, Launcher};

/// Execute every code fragment of `document` in reading order and return
/// the rewritten document.
pub fn execute_document(document: Document, config: &SessionConfig) -> Result<Document, ExecError> {
    execute_document_with(document, config, &config.shorthands)
}

/// [`execute_document`] with an arbitrary launcher.
///
/// The launcher's runner is started on the first executable node and closed
/// exactly once, whether or not the walk succeeds.
pub fn execute_document_with(
    document: Document,
    launcher: &dyn Launcher,
    shorthands: &[String],
) -> Result<Document, ExecError> {
    launcher.preflight()?;
    let dispatcher = Dispatcher::new(shorthands)?;
    let mut arena = Arena::flatten(document);
    debug!(nodes = arena.len(), "flattened document");

    let mut executor = Executor::new(launcher);
    let mut pending = PendingReplacements::default();
    let walked = {
        let mut walker = Walker {
            arena: &mut arena,
            dispatcher: &dispatcher,
            executor: &mut executor,
            pending: &mut pending,
            ancestors: Vec::new(),
        };
        walker.walk_root()
    };
    let closed = executor.close();
    walked?;
    closed?;

    debug!(pending = pending.len(), "applying deferred replacements");
    pending.apply(&mut arena);
    Ok(arena.into_document()?)
}

struct Walker<'w, 'a> {
    arena: &'w mut Arena,
    dispatcher: &'w Dispatcher,
    executor: &'w mut Executor<'a>,
    pending: &'w mut PendingReplacements,
    /// Nodes whose children are being walked, outermost first.
    ancestors: Vec<NodeId>,
}

impl Walker<'_, '_> {
    fn walk_root(&mut self) -> Result<(), ExecError> {
        let root = self.arena.take_root();
        let root = self.walk_slots(root)?;
        self.arena.set_root(root);
        Ok(())
    }

    fn walk_slots(&mut self, slots: Vec<Slot>) -> Result<Vec<Slot>, ExecError> {
        slots.into_iter().map(|slot| self.walk_slot(slot)).collect()
    }

    fn walk_slot(&mut self, slot: Slot) -> Result<Slot, ExecError> {
        match slot {
            Slot::Single(id) => {
                let family = self.arena.family(id);
                let ids = self.visit(id)?;
                Ok(Slot::Single(self.arena.collapse(family, ids)))
            }
            Slot::Sequence(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    out.extend(self.visit(id)?);
                }
                Ok(Slot::Sequence(out))
            }
            Slot::Map(entries) => {
                let mut out = BTreeMap::new();
                for (key, id) in entries {
                    let ids = self.visit(id)?;
                    if let Some(id) = self.arena.collapse_entry(ids) {
                        out.insert(key, id);
                    }
                }
                Ok(Slot::Map(out))
            }
        }
    }

    /// Walk a node's children, then dispatch the node itself. Returns the
    /// nodes that take its place in the parent's slot.
    fn visit(&mut self, id: NodeId) -> Result<Vec<NodeId>, ExecError> {
        let slots = self.arena.take_slots(id);
        self.ancestors.push(id);
        let walked = self.walk_slots(slots);
        self.ancestors.pop();
        let slots = walked?;
        self.arena.set_slots(id, slots);

        let action = self
            .dispatcher
            .dispatch(self.arena.node_mut(id), self.executor)?;
        let Action::Replace(nodes) = action else {
            return Ok(vec![id]);
        };

        match resolve(self.arena.family(id), nodes) {
            Resolution::Splice(nodes) => Ok(nodes
                .into_iter()
                .map(|node| self.arena.insert(node))
                .collect()),
            Resolution::Defer(nodes) => {
                self.defer(id, nodes);
                Ok(vec![id])
            }
        }
    }

    /// Queue a replacement for the nearest ancestor that is not an inline
    /// node. A target that already has one keeps it.
    fn defer(&mut self, id: NodeId, nodes: Vec<Node>) {
        let target = self
            .ancestors
            .iter()
            .rev()
            .copied()
            .find(|&ancestor| self.arena.family(ancestor) != Family::Inline);
        let Some(target) = target else {
            warn!(node = id.index(), "no block ancestor for deferred replacement; dropping it");
            return;
        };
        if self.pending.record(target, nodes) {
            debug!(node = id.index(), target = target.index(), "deferred replacement");
        } else {
            warn!(
                node = id.index(),
                target = target.index(),
                "target already has a deferred replacement; dropping this one"
            );
        }
    }
}
