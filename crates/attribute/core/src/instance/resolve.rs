//! Value resolution.
//!
//! Resolution is pull-based: every read walks the live modifier graph and recomputes
//! from scratch. There is no cached numeric state to invalidate.
//!
//! ```text
//! value = definition missing  → 0
//!       | flag definition     → fold(flat, closure, AddFlag | RemoveFlag | Set | override)
//!       | numeric definition  → clamp((flat + Σflat) × (1 + factor + Σ factor × penalty[rank]))
//! ```
//!
//! The closure is collected depth-first (pre-order) with an explicit worklist. The
//! walk tracks the current path; reaching an instance that is already on the path
//! means the graph has a cycle, and that branch is skipped with a warning. The same
//! modifier reached through two distinct paths is counted twice.

use crate::definition::AttributeDefinition;
use crate::flags;
use crate::instance::{AttributeInstance, FlagOperator, InstanceId};
use crate::store::InstanceStore;

impl InstanceStore {
    /// Resolved value of `id`. Unknown and unbound instances resolve to zero.
    pub fn value(&self, id: InstanceId) -> f64 {
        let Some(instance) = self.get(id) else {
            tracing::debug!(instance = %id, "value requested for unknown instance");
            return 0.0;
        };
        let Some(definition) = instance.definition() else {
            return 0.0;
        };

        let closure: Vec<&AttributeInstance> = self
            .modifier_closure(id)
            .into_iter()
            .filter_map(|m| self.get(m))
            .collect();

        if definition.is_flags() {
            resolve_flags(instance.flat, &closure)
        } else {
            resolve_numeric(definition, instance, closure)
        }
    }

    /// Every modifier affecting `id`, depth-first: each direct modifier followed by
    /// its own closure.
    pub fn modifier_closure(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut closure = Vec::new();
        let Some(root) = self.get(id) else {
            return closure;
        };

        // path[d] is the ancestor at depth d of the entry being visited.
        let mut path = vec![id];
        let mut worklist: Vec<(InstanceId, usize)> =
            root.modifiers().iter().rev().map(|&m| (m, 1)).collect();

        while let Some((current, depth)) = worklist.pop() {
            path.truncate(depth);
            if path.contains(&current) {
                tracing::warn!(
                    instance = %id,
                    modifier = %current,
                    "modifier cycle detected; skipping branch"
                );
                continue;
            }
            let Some(instance) = self.get(current) else {
                tracing::debug!(modifier = %current, "dangling modifier reference");
                continue;
            };
            closure.push(current);
            path.push(current);
            worklist.extend(instance.modifiers().iter().rev().map(|&m| (m, depth + 1)));
        }

        closure
    }

    /// Returns true if `from` is `to` or `to` appears in the closure of `from`.
    pub(crate) fn reaches(&self, from: InstanceId, to: InstanceId) -> bool {
        from == to || self.modifier_closure(from).contains(&to)
    }

    /// Value as a boolean: anything other than zero is true.
    pub fn value_as_bool(&self, id: InstanceId) -> bool {
        self.value(id) != 0.0
    }

    /// Value truncated toward zero (saturating).
    pub fn value_as_i16(&self, id: InstanceId) -> i16 {
        self.value(id) as i16
    }

    /// Value truncated toward zero (saturating).
    pub fn value_as_i32(&self, id: InstanceId) -> i32 {
        self.value(id) as i32
    }

    /// Value truncated toward zero (saturating).
    pub fn value_as_i64(&self, id: InstanceId) -> i64 {
        self.value(id) as i64
    }

    /// Option label selected by the value, read as an index.
    ///
    /// Returns `None` for unbound instances, negative values, and indices past the
    /// end of the options table.
    pub fn value_as_option(&self, id: InstanceId) -> Option<&str> {
        let definition = self.get(id)?.definition()?;
        let value = self.value(id);
        if value < 0.0 {
            return None;
        }
        definition.options.get(value as usize).map(String::as_str)
    }

    /// Labels of every set flag, lowest bit first.
    ///
    /// Empty for non-flag definitions.
    pub fn value_as_flags(&self, id: InstanceId) -> Vec<&str> {
        let Some(definition) = self.get(id).and_then(|i| i.definition()) else {
            return Vec::new();
        };
        if !definition.is_flags() {
            return Vec::new();
        }
        flags::set_bits(self.value(id))
            .filter_map(|bit| definition.options.get(bit).map(String::as_str))
            .collect()
    }
}

fn resolve_flags(base: f64, closure: &[&AttributeInstance]) -> f64 {
    let bits = closure.iter().fold(flags::to_bits(base), |bits, modifier| {
        let operand = flags::to_bits(modifier.flat);
        if !modifier.is_flags() {
            // Non-flag modifiers override the running pattern.
            return operand;
        }
        match modifier.flag_operator {
            FlagOperator::AddFlag => bits | operand,
            FlagOperator::RemoveFlag => bits & !operand,
            FlagOperator::Set => operand,
        }
    });
    flags::from_bits(bits)
}

fn resolve_numeric(
    definition: &AttributeDefinition,
    instance: &AttributeInstance,
    mut closure: Vec<&AttributeInstance>,
) -> f64 {
    // Stable: equal factors keep their closure order.
    closure.sort_by(|a, b| b.factor.total_cmp(&a.factor));

    let (total_flat, total_factor) =
        closure
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(flat, factor), (rank, modifier)| {
                let weight = definition.stack_penalty_at(rank).unwrap_or(1.0);
                (flat + modifier.flat, factor + modifier.factor * weight)
            });

    let value = (instance.flat + total_flat) * (1.0 + instance.factor + total_factor);
    match definition.range {
        Some(range) => range.clamp(value),
        None => value,
    }
}
