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

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::holder::Holder;
use crate::name::Name;
use crate::slot::Slot;

/// Flags carried alongside a value's byte buffer: whether the buffer is
/// owned, whether it should be treated as opaque binary rather than text,
/// whether the node is read-only, and an explicit nil/none marker distinct
/// from "zero-length buffer". A barebones hand-rolled bitset rather than a
/// dependency pulled in for four bits.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LtvFlags(u8);

impl LtvFlags {
    pub const OWNED: LtvFlags = LtvFlags(0b0001);
    pub const BINARY: LtvFlags = LtvFlags(0b0010);
    pub const RO: LtvFlags = LtvFlags(0b0100);
    pub const NIL: LtvFlags = LtvFlags(0b1000);

    pub const fn empty() -> Self {
        LtvFlags(0)
    }

    pub fn contains(self, other: LtvFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for LtvFlags {
    type Output = LtvFlags;
    fn bitor(self, rhs: LtvFlags) -> LtvFlags {
        LtvFlags(self.0 | rhs.0)
    }
}

/// The data behind a [`Ltv`] handle. Locked as a unit: a node's bytes and
/// its child map are mutated together under one mutex.
pub struct LtvData {
    pub bytes: Option<Vec<u8>>,
    pub flags: LtvFlags,
    pub children: BTreeMap<Name, Slot>,
}

impl LtvData {
    fn new(bytes: Option<Vec<u8>>, flags: LtvFlags) -> Self {
        LtvData {
            bytes,
            flags,
            children: BTreeMap::new(),
        }
    }
}

/// A value node (LTV): a shared handle to an optional byte buffer plus a
/// named subtree. Sharing is `Arc`'s own refcount, read back out through
/// [`Ltv::refs`] rather than a field maintained by hand.
#[derive(Clone)]
pub struct Ltv(Arc<Mutex<LtvData>>);

impl Ltv {
    /// A node carrying no bytes and no children — the "none" marker, and
    /// what the resolver fabricates when `insert=true` walks past a missing
    /// segment.
    pub fn none() -> Self {
        Ltv(Arc::new(Mutex::new(LtvData::new(None, LtvFlags::NIL))))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Ltv(Arc::new(Mutex::new(LtvData::new(
            Some(bytes.into()),
            LtvFlags::OWNED,
        ))))
    }

    pub fn from_bytes_flagged(bytes: impl Into<Vec<u8>>, flags: LtvFlags) -> Self {
        Ltv(Arc::new(Mutex::new(LtvData::new(Some(bytes.into()), flags))))
    }

    pub fn lock(&self) -> MutexGuard<'_, LtvData> {
        self.0.lock().expect("lt-tree: value node lock poisoned")
    }

    /// Number of holders/working-registers/references that presently share
    /// this node. Exposed so callers can assert refcount soundness in tests.
    pub fn refs(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.lock().bytes.clone()
    }

    pub fn is_nil(&self) -> bool {
        self.lock().flags.contains(LtvFlags::NIL)
    }

    pub fn ptr_eq(&self, other: &Ltv) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Wrap this node as a holder, ready to be placed into a slot or a
    /// generic stack. The one sequence-element type reused everywhere a
    /// sequence of value references is needed (Design Notes §9).
    pub fn into_holder(self) -> Holder {
        Holder::new(self)
    }
}

impl Debug for Ltv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.lock();
        write!(
            f,
            "Ltv(bytes={:?}, flags={:?}, children={})",
            data.bytes.as_ref().map(|b| String::from_utf8_lossy(b).into_owned()),
            data.flags,
            data.children.len()
        )
    }
}

impl PartialEq for Ltv {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
