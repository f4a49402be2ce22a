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

/// The current generic-stack target, selected by a `RES_*` opcode. One-shot:
/// it persists until the next `RES_*`, it is not reset after a generic
/// push/pop/peek/dup/drop. We keep the original two-opcode dance (select a
/// resource, then act generically against it) rather than folding the
/// resource into every generic opcode's operand.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Resource {
    Dict,
    Code,
    Refs,
    Ip,
    #[default]
    Wip,
}
