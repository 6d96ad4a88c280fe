//! Selection and lock registries.
//!
//! Both are ordered sets of annotation references. Every mutation computes
//! what was actually added and removed; a change event is published only when
//! one of those lists is non-empty, so repeating a request is free.

use crate::annotation::{AnnotationId, AnnotationRef};
use crate::events::{EventBus, InteractionEvent, MembershipChange};

/// How a selection request combines with the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectMode {
    /// Clear everything else, then select.
    #[default]
    Replace,
    /// Add while keeping existing members.
    Add,
    /// Remove if already selected, otherwise add.
    Toggle,
}

/// Ordered membership with diff computation.
#[derive(Debug, Clone, Default)]
struct MembershipSet {
    members: Vec<AnnotationRef>,
}

impl MembershipSet {
    fn contains(&self, id: AnnotationId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    /// Remove `remove`, then add `add`, and report the net diff.
    fn apply(&mut self, remove: &[AnnotationId], add: &[AnnotationRef]) -> Option<MembershipChange> {
        let mut removed = Vec::new();
        self.members.retain(|member| {
            let drop = remove.contains(&member.id) && !add.iter().any(|a| a.id == member.id);
            if drop {
                removed.push(member.clone());
            }
            !drop
        });

        let mut added = Vec::new();
        for reference in add {
            if !self.contains(reference.id) {
                self.members.push(reference.clone());
                added.push(reference.clone());
            }
        }

        if added.is_empty() && removed.is_empty() {
            return None;
        }
        Some(MembershipChange {
            added,
            removed,
            members: self.members.clone(),
        })
    }

    fn ids(&self) -> Vec<AnnotationId> {
        self.members.iter().map(|m| m.id).collect()
    }

    fn by_tool(&self, tool_name: &str) -> Vec<&AnnotationRef> {
        self.members.iter().filter(|m| m.tool_name == tool_name).collect()
    }
}

/// Currently selected annotations.
#[derive(Debug, Clone, Default)]
pub struct SelectionRegistry {
    set: MembershipSet,
}

impl SelectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&mut self, bus: &mut EventBus, change: Option<MembershipChange>) -> bool {
        match change {
            Some(change) => {
                log::debug!(
                    "Selection changed: +{} -{} ({} selected)",
                    change.added.len(),
                    change.removed.len(),
                    change.members.len()
                );
                bus.publish(InteractionEvent::SelectionChanged(change.into()));
                true
            }
            None => false,
        }
    }

    /// Select an annotation. Returns whether the selection changed.
    pub fn select(&mut self, annotation: AnnotationRef, mode: SelectMode, bus: &mut EventBus) -> bool {
        let change = match mode {
            SelectMode::Replace => {
                let others = self.set.ids();
                self.set.apply(&others, std::slice::from_ref(&annotation))
            }
            SelectMode::Add => self.set.apply(&[], std::slice::from_ref(&annotation)),
            SelectMode::Toggle => {
                if self.set.contains(annotation.id) {
                    self.set.apply(&[annotation.id], &[])
                } else {
                    self.set.apply(&[], std::slice::from_ref(&annotation))
                }
            }
        };
        self.publish(bus, change)
    }

    pub fn deselect(&mut self, id: AnnotationId, bus: &mut EventBus) -> bool {
        let change = self.set.apply(&[id], &[]);
        self.publish(bus, change)
    }

    /// Replace the whole selection in one change.
    pub fn set_selection(&mut self, annotations: Vec<AnnotationRef>, bus: &mut EventBus) -> bool {
        let current = self.set.ids();
        let change = self.set.apply(&current, &annotations);
        self.publish(bus, change)
    }

    pub fn clear(&mut self, bus: &mut EventBus) -> bool {
        let current = self.set.ids();
        let change = self.set.apply(&current, &[]);
        self.publish(bus, change)
    }

    pub fn is_selected(&self, id: AnnotationId) -> bool {
        self.set.contains(id)
    }

    pub fn all_selected(&self) -> &[AnnotationRef] {
        &self.set.members
    }

    pub fn count(&self) -> usize {
        self.set.members.len()
    }

    pub fn find_by_tool_name(&self, tool_name: &str) -> Vec<&AnnotationRef> {
        self.set.by_tool(tool_name)
    }
}

/// Currently locked annotations. Locked annotations never match a handle
/// hit-test.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    set: MembershipSet,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&mut self, bus: &mut EventBus, change: Option<MembershipChange>) -> bool {
        match change {
            Some(change) => {
                log::debug!(
                    "Lock changed: +{} -{} ({} locked)",
                    change.added.len(),
                    change.removed.len(),
                    change.members.len()
                );
                bus.publish(InteractionEvent::LockChanged(change.into()));
                true
            }
            None => false,
        }
    }

    pub fn set_locked(&mut self, annotation: AnnotationRef, locked: bool, bus: &mut EventBus) -> bool {
        if locked {
            self.lock(annotation, bus)
        } else {
            self.unlock(annotation.id, bus)
        }
    }

    pub fn lock(&mut self, annotation: AnnotationRef, bus: &mut EventBus) -> bool {
        let change = self.set.apply(&[], std::slice::from_ref(&annotation));
        self.publish(bus, change)
    }

    pub fn unlock(&mut self, id: AnnotationId, bus: &mut EventBus) -> bool {
        let change = self.set.apply(&[id], &[]);
        self.publish(bus, change)
    }

    pub fn unlock_all(&mut self, bus: &mut EventBus) -> bool {
        let current = self.set.ids();
        let change = self.set.apply(&current, &[]);
        self.publish(bus, change)
    }

    pub fn is_locked(&self, id: AnnotationId) -> bool {
        self.set.contains(id)
    }

    pub fn all_locked(&self) -> &[AnnotationRef] {
        &self.set.members
    }

    pub fn count_locked(&self) -> usize {
        self.set.members.len()
    }

    pub fn find_by_tool_name(&self, tool_name: &str) -> Vec<&AnnotationRef> {
        self.set.by_tool(tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotation(tool: &str) -> AnnotationRef {
        AnnotationRef {
            id: AnnotationId::new(),
            tool_name: tool.to_string(),
        }
    }

    fn changes(bus: &mut EventBus) -> Vec<MembershipChange> {
        bus.drain()
            .into_iter()
            .filter_map(|e| match e {
                InteractionEvent::SelectionChanged(c) => Some(MembershipChange {
                    added: c.added,
                    removed: c.removed,
                    members: c.selection,
                }),
                InteractionEvent::LockChanged(c) => Some(MembershipChange {
                    added: c.added,
                    removed: c.removed,
                    members: c.locked,
                }),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_select_twice_publishes_once() {
        let mut bus = EventBus::new();
        let mut selection = SelectionRegistry::new();
        let a = annotation("Length");

        assert!(selection.select(a.clone(), SelectMode::Replace, &mut bus));
        assert!(!selection.select(a.clone(), SelectMode::Replace, &mut bus));

        let published = changes(&mut bus);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].added, vec![a]);
    }

    #[test]
    fn test_replace_is_one_atomic_change() {
        let mut bus = EventBus::new();
        let mut selection = SelectionRegistry::new();
        let a = annotation("Length");
        let b = annotation("Length");
        let c = annotation("Arrow");

        selection.set_selection(vec![a.clone(), b.clone()], &mut bus);
        bus.drain();

        selection.select(c.clone(), SelectMode::Replace, &mut bus);
        let published = changes(&mut bus);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].added, vec![c.clone()]);
        assert_eq!(published[0].removed, vec![a, b]);
        assert_eq!(published[0].members, vec![c]);
    }

    #[test]
    fn test_replace_with_existing_member_only_removes_others() {
        let mut bus = EventBus::new();
        let mut selection = SelectionRegistry::new();
        let a = annotation("Length");
        let b = annotation("Length");
        selection.set_selection(vec![a.clone(), b.clone()], &mut bus);
        bus.drain();

        selection.select(a.clone(), SelectMode::Replace, &mut bus);
        let published = changes(&mut bus);
        assert_eq!(published.len(), 1);
        assert!(published[0].added.is_empty());
        assert_eq!(published[0].removed, vec![b]);
        assert_eq!(selection.all_selected(), &[a]);
    }

    #[test]
    fn test_toggle_and_add() {
        let mut bus = EventBus::new();
        let mut selection = SelectionRegistry::new();
        let a = annotation("Length");
        let b = annotation("Length");

        selection.select(a.clone(), SelectMode::Add, &mut bus);
        selection.select(b.clone(), SelectMode::Toggle, &mut bus);
        assert_eq!(selection.count(), 2);

        selection.select(a.clone(), SelectMode::Toggle, &mut bus);
        assert!(!selection.is_selected(a.id));
        assert!(selection.is_selected(b.id));
        assert_eq!(changes(&mut bus).len(), 3);
    }

    #[test]
    fn test_noop_deselect_and_clear() {
        let mut bus = EventBus::new();
        let mut selection = SelectionRegistry::new();
        assert!(!selection.deselect(AnnotationId::new(), &mut bus));
        assert!(!selection.clear(&mut bus));
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_find_by_tool_name() {
        let mut bus = EventBus::new();
        let mut selection = SelectionRegistry::new();
        selection.set_selection(vec![annotation("Length"), annotation("Arrow"), annotation("Length")], &mut bus);
        assert_eq!(selection.find_by_tool_name("Length").len(), 2);
        assert_eq!(selection.find_by_tool_name("Angle").len(), 0);
    }

    #[test]
    fn test_lock_twice_publishes_once() {
        let mut bus = EventBus::new();
        let mut locks = LockRegistry::new();
        let a = annotation("Length");

        assert!(locks.lock(a.clone(), &mut bus));
        assert!(!locks.lock(a.clone(), &mut bus));

        let published = changes(&mut bus);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].added, vec![a.clone()]);
        assert!(locks.is_locked(a.id));
        assert_eq!(locks.count_locked(), 1);
    }

    #[test]
    fn test_unlock_all() {
        let mut bus = EventBus::new();
        let mut locks = LockRegistry::new();
        let a = annotation("Length");
        let b = annotation("Arrow");
        locks.set_locked(a.clone(), true, &mut bus);
        locks.set_locked(b.clone(), true, &mut bus);
        bus.drain();

        assert!(locks.unlock_all(&mut bus));
        let published = changes(&mut bus);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].removed, vec![a, b]);
        assert!(published[0].members.is_empty());
        assert!(!locks.unlock_all(&mut bus));
    }

    #[test]
    fn test_events_are_typed() {
        let mut bus = EventBus::new();
        let mut locks = LockRegistry::new();
        locks.lock(annotation("Length"), &mut bus);
        assert!(matches!(bus.pending()[0], InteractionEvent::LockChanged(_)));
    }
}
