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

//! Wire format for the VM's instruction stream: a concatenation of
//! `<opbyte>` or `<opbyte><len:u32BE><flags:u32BE><bytes[len]>` records,
//! terminated by a `0x00` byte. Big-endian on the wire, no alignment.

mod codec;
mod op;

pub use codec::{decode_one, decode_stream, encode_op, encode_stream, Error, TERMINATOR};
pub use op::{Op, LIT_TAG, REF_TAG};
