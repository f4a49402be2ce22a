// Copyright (C) 2026 The Authors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use lt_tree::{lt_get, lt_lookup_exists, lt_lookup_insert, lt_put, End, Holder, Ltv, Name};
use thiserror::Error;

use crate::path::{parse, Path};

/// Where a reference currently stands. Bindings are recomputed on every
/// resolve/iterate step rather than cached across calls — a dropped
/// reference must not decrement node refs, so we never hold
/// onto a borrowed `Ltv` beyond the call that produced it except inside
/// `binding` itself, which is owned by the `Reference`.
#[derive(Clone, Debug, PartialEq)]
pub enum Binding {
    Unbound,
    /// The name exists (or was created) in `parent`, but no holder is
    /// selected yet — or the slot is empty.
    Slot { parent: Ltv, name: Name },
    /// A concrete holder is selected: `parent`'s slot named `name`, holder
    /// at `cursor` counting from the head.
    Holder { parent: Ltv, name: Name, cursor: usize },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum Error {
    #[error("reference is unbound")]
    Unbound,
    #[error("reference is bound to a slot but not to a holder")]
    NoHolder,
}

/// A compiled path plus its current binding (REF).
#[derive(Clone, Debug)]
pub struct Reference {
    path: Path,
    binding: Binding,
}

impl Reference {
    pub fn create(text: &[u8]) -> Self {
        Reference {
            path: parse(text),
            binding: Binding::Unbound,
        }
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// The name the final path segment designates, independent of whether
    /// the reference has ever been resolved. Used by opcodes (e.g.
    /// `BUILTIN`) that need the target name rather than its binding.
    pub fn target_name(&self) -> &Name {
        &self.path.segments.last().expect("path is never empty").name
    }

    /// Walk `path` from the first segment against `root`. At each segment,
    /// look up (optionally inserting) the named slot; if the segment has a
    /// delimiter, read the head/tail holder to get the next `current` node.
    /// The last segment has no delimiter — it is where `binding` lands.
    ///
    /// `insert=false` leaves the reference cleanly `Unbound` on a missing
    /// slot or holder, never an error.
    pub fn resolve(&mut self, root: &Ltv, insert: bool) -> bool {
        let mut current = root.clone();
        let n = self.path.segments.len();
        for (i, seg) in self.path.segments.iter().enumerate() {
            let exists = lt_lookup_exists(&current, &seg.name);
            if !exists {
                if insert {
                    lt_lookup_insert(&current, seg.name.clone());
                } else {
                    self.binding = Binding::Unbound;
                    return false;
                }
            }
            let is_last = i + 1 == n;
            if is_last {
                self.binding = Binding::Slot {
                    parent: current.clone(),
                    name: seg.name.clone(),
                };
                return true;
            }
            let end = seg.enter.expect("non-last segment always has a delimiter");
            match lt_get(&current, &seg.name, false, end) {
                Some(next) => current = next,
                None => {
                    if insert {
                        let fresh = Ltv::none();
                        lt_put(&current, seg.name.clone(), fresh.clone(), end);
                        current = fresh;
                    } else {
                        self.binding = Binding::Unbound;
                        return false;
                    }
                }
            }
        }
        // Empty path: bind to root itself as a degenerate slot-less case.
        self.binding = Binding::Unbound;
        false
    }

    /// Hierarchical resolve: try `resolve` against each dict context from
    /// top (end of the slice) to bottom, stopping at the first success.
    pub fn resolve_hierarchical(&mut self, dicts: &[Ltv], insert: bool) -> bool {
        for dict in dicts.iter().rev() {
            if self.resolve(dict, insert) {
                return true;
            }
        }
        self.binding = Binding::Unbound;
        false
    }

    /// The bound value-node, if bound to a concrete holder.
    pub fn ltv(&self) -> Option<Ltv> {
        match &self.binding {
            Binding::Holder { parent, name, cursor } => {
                let data = parent.lock();
                data.children.get(name)?.at(*cursor).map(|h| h.ltv().clone())
            }
            Binding::Slot { parent, name } => {
                let data = parent.lock();
                data.children.get(name)?.at(0).map(|h| h.ltv().clone())
            }
            Binding::Unbound => None,
        }
    }

    /// The bound slot's address, as a `(parent, name)` pair — a slot cannot
    /// outlive the lock on its parent, so we hand back the coordinates
    /// rather than a borrow.
    pub fn lti(&self) -> Option<(Ltv, Name)> {
        match &self.binding {
            Binding::Slot { parent, name } | Binding::Holder { parent, name, .. } => {
                Some((parent.clone(), name.clone()))
            }
            Binding::Unbound => None,
        }
    }

    /// Place `value` at the head of the bound slot, transitioning to
    /// holder-bound. Requires the last segment to already be slot-bound.
    pub fn assign(&mut self, value: Ltv) -> Result<(), Error> {
        let (parent, name) = match &self.binding {
            Binding::Slot { parent, name } => (parent.clone(), name.clone()),
            Binding::Holder { parent, name, .. } => (parent.clone(), name.clone()),
            Binding::Unbound => return Err(Error::Unbound),
        };
        lt_put(&parent, name.clone(), value, End::Head);
        self.binding = Binding::Holder { parent, name, cursor: 0 };
        Ok(())
    }

    /// Pop the currently bound holder from its slot. A `Slot` binding with
    /// no holder explicitly selected removes the head holder (cursor 0),
    /// matching `ltv()`'s treatment of an unselected slot as pointing at
    /// its head. Emptying the slot erases it (handled inside `lt_get`).
    pub fn remove(&mut self) -> Result<Ltv, Error> {
        let (parent, name, cursor) = match &self.binding {
            Binding::Holder { parent, name, cursor } => (parent.clone(), name.clone(), *cursor),
            Binding::Slot { parent, name } => (parent.clone(), name.clone(), 0),
            Binding::Unbound => return Err(Error::Unbound),
        };
        let removed = {
            let mut data = parent.lock();
            let slot = data.children.get_mut(&name).ok_or(Error::NoHolder)?;
            let holder = slot.remove_at(cursor).ok_or(Error::NoHolder)?;
            if slot.is_empty() {
                data.children.remove(&name);
            }
            holder
        };
        self.binding = Binding::Slot { parent, name };
        Ok(removed.into_ltv())
    }

    /// Advance the cursor to the next holder in the bound slot's sequence,
    /// optionally popping the one just visited. Yields unbound when the
    /// sequence is exhausted.
    pub fn iterate(&mut self, pop: bool) -> bool {
        let (parent, name, next_cursor) = match &self.binding {
            Binding::Holder { parent, name, cursor } => (parent.clone(), name.clone(), *cursor),
            Binding::Slot { parent, name } => (parent.clone(), name.clone(), 0),
            Binding::Unbound => return false,
        };
        if pop {
            let mut data = parent.lock();
            if let Some(slot) = data.children.get_mut(&name) {
                let _: Option<Holder> = slot.remove_at(next_cursor);
                if slot.is_empty() {
                    data.children.remove(&name);
                    self.binding = Binding::Unbound;
                    return false;
                }
            }
            if data.children.get(&name).is_some_and(|s| s.at(next_cursor).is_some()) {
                self.binding = Binding::Holder { parent, name, cursor: next_cursor };
                true
            } else {
                self.binding = Binding::Slot { parent, name };
                false
            }
        } else {
            let data = parent.lock();
            let has_next = data
                .children
                .get(&name)
                .is_some_and(|s| s.at(next_cursor + 1).is_some());
            drop(data);
            if has_next {
                self.binding = Binding::Holder {
                    parent,
                    name,
                    cursor: next_cursor + 1,
                };
                true
            } else {
                self.binding = Binding::Unbound;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolve_without_insert_is_clean_miss() {
        let root = Ltv::none();
        let mut r = Reference::create(b"a");
        assert!(!r.resolve(&root, false));
        assert_eq!(r.binding(), &Binding::Unbound);
    }

    #[test]
    fn insert_then_assign_then_reread() {
        let root = Ltv::none();
        let mut r = Reference::create(b"a");
        assert!(r.resolve(&root, true));
        r.assign(Ltv::from_bytes("hello")).unwrap();
        assert_eq!(r.ltv().unwrap().bytes().unwrap(), b"hello");

        let mut r2 = Reference::create(b"a");
        assert!(r2.resolve(&root, false));
        assert_eq!(r2.ltv().unwrap().bytes().unwrap(), b"hello");
    }

    #[test]
    fn path_idempotent_resolve_does_not_mutate() {
        let root = Ltv::none();
        let mut r = Reference::create(b"a");
        r.resolve(&root, true);
        r.assign(Ltv::from_bytes("x")).unwrap();

        let mut r2 = Reference::create(b"a");
        let first = r2.resolve(&root, false);
        let second = r2.resolve(&root, false);
        assert_eq!(first, second);
        assert_eq!(r2.ltv().unwrap().bytes().unwrap(), b"x");
    }

    #[test]
    fn assign_twice_remove_once_leaves_one_holder() {
        let root = Ltv::none();
        let mut r = Reference::create(b"a");
        r.resolve(&root, true);
        r.assign(Ltv::from_bytes("1")).unwrap();
        r.resolve(&root, true);
        r.assign(Ltv::from_bytes("2")).unwrap();
        let top = r.remove().unwrap();
        assert_eq!(top.bytes().unwrap(), b"2");
        assert!(r.ltv().unwrap().bytes().unwrap() == b"1");
    }

    #[test]
    fn remove_on_fresh_slot_binding_removes_head() {
        // A reference that was never assigned through (only resolved) is
        // merely Slot-bound; remove() must still take the head holder, the
        // same one ltv() would have peeked.
        let root = Ltv::none();
        let mut writer = Reference::create(b"a");
        writer.resolve(&root, true);
        writer.assign(Ltv::from_bytes("1")).unwrap();

        let mut remover = Reference::create(b"a");
        assert!(remover.resolve(&root, false));
        let removed = remover.remove().unwrap();
        assert_eq!(removed.bytes().unwrap(), b"1");
        assert!(!lt_lookup_exists(&root, &Name::from("a")));
    }

    #[test]
    fn hierarchical_resolve_binds_to_innermost() {
        let outer = Ltv::none();
        let inner = Ltv::none();
        let mut outer_ref = Reference::create(b"x");
        outer_ref.resolve(&outer, true);
        outer_ref.assign(Ltv::from_bytes("outer")).unwrap();
        let mut inner_ref = Reference::create(b"x");
        inner_ref.resolve(&inner, true);
        inner_ref.assign(Ltv::from_bytes("inner")).unwrap();

        let dicts = vec![outer, inner];
        let mut lookup = Reference::create(b"x");
        assert!(lookup.resolve_hierarchical(&dicts, false));
        assert_eq!(lookup.ltv().unwrap().bytes().unwrap(), b"inner");
    }

    #[test]
    fn multi_segment_path_descends_through_holders() {
        let root = Ltv::none();
        let child = Ltv::none();
        lt_put(&root, Name::from("a"), child.clone(), End::Head);
        let mut leaf = Reference::create(b"a.b");
        assert!(leaf.resolve(&root, true));
        leaf.assign(Ltv::from_bytes("leaf")).unwrap();
        assert_eq!(leaf.ltv().unwrap().bytes().unwrap(), b"leaf");

        // and it landed under `child`, not a fresh node, since `.` reads the
        // head holder of `a`'s slot.
        let mut via_child = Reference::create(b"b");
        assert!(via_child.resolve(&child, false));
        assert_eq!(via_child.ltv().unwrap().bytes().unwrap(), b"leaf");
    }
}
