//! Modifier propagation across tree edges.
//!
//! When a child connects to a parent, each modifier-kind attribute of the child is
//! pushed to entities selected by its definition's [`PropagationMode`]:
//!
//! | mode     | receivers                                        |
//! |----------|--------------------------------------------------|
//! | `Parent` | the parent                                       |
//! | `Child`  | every descendant of the parent (the child too)   |
//! | `Both`   | the parent and every descendant                  |
//!
//! Descendants are collected breadth-first after the edge exists. Every attachment
//! made for an edge is recorded in the [`PropagationLedger`], so retracting the edge
//! removes exactly those references even if the tree changed in between.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::container::Attachment;
use crate::definition::PropagationMode;
use crate::error::AttributeSystemError;
use crate::entity::{Entity, EntityId};
use crate::instance::InstanceId;
use crate::store::InstanceStore;
use crate::tree::{Edge, TreeConnectivity};

/// Outcome of applying or retracting one edge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub edge: Option<Edge>,
    /// Entities whose attributes gained or lost a modifier, in visit order.
    pub affected: Vec<EntityId>,
    /// Modifier references added or removed.
    pub changed: usize,
    /// Attachments that were rejected or found no target.
    pub skipped: usize,
}

impl PropagationReport {
    fn for_edge(edge: Edge) -> Self {
        Self {
            edge: Some(edge),
            ..Self::default()
        }
    }

    fn touch(&mut self, entity: EntityId) {
        if !self.affected.contains(&entity) {
            self.affected.push(entity);
        }
    }
}

/// Attachments made on behalf of each live edge.
#[derive(Clone, Debug, Default)]
pub struct PropagationLedger {
    entries: HashMap<Edge, Vec<Attachment>>,
}

impl PropagationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, edge: &Edge) -> Option<&[Attachment]> {
        self.entries.get(edge).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, edge: Edge, attachments: Vec<Attachment>) {
        self.entries.entry(edge).or_default().extend(attachments);
    }

    fn take(&mut self, edge: &Edge) -> Option<Vec<Attachment>> {
        self.entries.remove(edge)
    }
}

/// Borrowed view over the world state needed to apply or retract one edge.
pub struct PropagationEngine<'a, T: TreeConnectivity> {
    tree: &'a T,
    entities: &'a mut BTreeMap<EntityId, Entity>,
    store: &'a mut InstanceStore,
    ledger: &'a mut PropagationLedger,
}

impl<'a, T: TreeConnectivity> PropagationEngine<'a, T> {
    pub fn new(
        tree: &'a T,
        entities: &'a mut BTreeMap<EntityId, Entity>,
        store: &'a mut InstanceStore,
        ledger: &'a mut PropagationLedger,
    ) -> Self {
        Self {
            tree,
            entities,
            store,
            ledger,
        }
    }

    /// Every node below `root`, breadth-first, excluding `root`.
    pub fn descendants(&self, root: EntityId) -> Vec<EntityId> {
        let mut visited = HashSet::from([root]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for child in self.tree.children(node) {
                if visited.insert(child) {
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// Receivers of a `mode` modifier when an edge to `parent` is applied.
    pub fn targets(&self, parent: EntityId, mode: PropagationMode) -> Vec<EntityId> {
        let mut targets = Vec::new();
        if mode.reaches_parent() {
            targets.push(parent);
        }
        if mode.reaches_descendants() {
            targets.extend(self.descendants(parent));
        }
        targets
    }

    /// Pushes the child's modifiers across `edge`, which must already exist.
    pub fn apply(&mut self, edge: Edge) -> PropagationReport {
        let mut report = PropagationReport::for_edge(edge);
        let mut made = Vec::new();

        for (modifier, mode) in self.child_modifiers(edge.child) {
            for receiver in self.targets(edge.parent, mode) {
                let Some(entity) = self.entities.get_mut(&receiver) else {
                    continue;
                };
                match entity.container.attach(self.store, modifier) {
                    Ok(target) => {
                        made.push(Attachment { target, modifier });
                        report.touch(receiver);
                        report.changed += 1;
                    }
                    Err(err) => {
                        if err.severity().is_internal() {
                            tracing::warn!(%edge, entity = %receiver, modifier = %modifier, %err, "propagation skipped");
                        } else {
                            tracing::debug!(%edge, entity = %receiver, modifier = %modifier, %err, "propagation skipped");
                        }
                        report.skipped += 1;
                    }
                }
            }
        }

        tracing::debug!(
            %edge,
            attached = report.changed,
            skipped = report.skipped,
            receivers = report.affected.len(),
            "applied edge"
        );
        self.ledger.record(edge, made);
        report
    }

    /// Removes what [`apply`](Self::apply) attached for `edge`. Call before dropping the edge.
    ///
    /// Edges without a ledger entry fall back to the mirror traversal of `apply`.
    pub fn retract(&mut self, edge: Edge) -> PropagationReport {
        let mut report = PropagationReport::for_edge(edge);

        match self.ledger.take(&edge) {
            Some(attachments) => {
                for Attachment { target, modifier } in attachments {
                    let Some(receiver) = self.store.get(target).and_then(|i| i.owner()) else {
                        continue;
                    };
                    let Some(entity) = self.entities.get(&receiver) else {
                        continue;
                    };
                    match entity.container.remove_modifier(self.store, target, modifier) {
                        Ok(()) => {
                            report.touch(receiver);
                            report.changed += 1;
                        }
                        Err(_) => report.skipped += 1,
                    }
                }
            }
            None => {
                tracing::debug!(%edge, "no ledger entry; retracting by traversal");
                for (modifier, mode) in self.child_modifiers(edge.child) {
                    for receiver in self.targets(edge.parent, mode) {
                        let Some(entity) = self.entities.get(&receiver) else {
                            continue;
                        };
                        match entity.container.detach(self.store, modifier) {
                            Ok(_) => {
                                report.touch(receiver);
                                report.changed += 1;
                            }
                            Err(_) => report.skipped += 1,
                        }
                    }
                }
            }
        }

        tracing::debug!(%edge, removed = report.changed, "retracted edge");
        report
    }

    fn child_modifiers(&self, child: EntityId) -> Vec<(InstanceId, PropagationMode)> {
        let Some(entity) = self.entities.get(&child) else {
            return Vec::new();
        };
        entity
            .container
            .iter(self.store)
            .filter(|(_, instance)| instance.is_modifier())
            .filter_map(|(id, instance)| instance.definition().map(|d| (id, d.propagation)))
            .collect()
    }
}
