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

//! The LisTree: a hybrid ordered-by-name, ordered-by-insertion data
//! structure used simultaneously as dictionary, operand stack, and heap.

mod holder;
mod ltv;
mod name;
mod ops;
mod slot;

pub use holder::Holder;
pub use ltv::{Ltv, LtvData, LtvFlags};
pub use name::Name;
pub use ops::{lt_get, lt_lookup_exists, lt_lookup_insert, lt_put, lt_traverse};
pub use slot::{End, Slot};
