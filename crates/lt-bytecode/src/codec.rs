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

use thiserror::Error;

use crate::op::{Op, LIT_TAG, REF_TAG};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum Error {
    #[error("truncated record at offset {0}")]
    Truncated(usize),
    #[error("unknown opcode byte {0:#04x} at offset {1}")]
    UnknownOpcode(u8, usize),
}

/// Terminator tag. Implicit after the last record of a stream.
pub const TERMINATOR: u8 = 0x00;

/// Append `op`'s wire record to `out`.
pub fn encode_op(op: &Op, out: &mut Vec<u8>) {
    out.push(op.tag());
    match op {
        Op::Lit { bytes, flags } | Op::Ref { name: bytes, flags } => {
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(&flags.to_be_bytes());
            out.extend_from_slice(bytes);
        }
        _ => {}
    }
}

/// Encode a full instruction stream, with the terminator appended.
pub fn encode_stream(ops: &[Op]) -> Vec<u8> {
    let mut out = Vec::new();
    for op in ops {
        encode_op(op, &mut out);
    }
    out.push(TERMINATOR);
    out
}

fn non_extended_from_tag(tag: u8) -> Option<Op> {
    use Op::*;
    Some(match tag {
        1 => ResDict,
        2 => ResCode,
        3 => ResRefs,
        4 => ResIp,
        5 => ResWip,
        6 => Push,
        7 => Pop,
        8 => Peek,
        9 => Dup,
        10 => Drop,
        11 => SPush,
        12 => SPop,
        13 => SPeek,
        16 => RefIns,
        17 => RefRes,
        18 => RefHres,
        19 => RefIter,
        20 => RefDeq,
        21 => Deref,
        22 => Assign,
        23 => Remove,
        24 => Yield,
        25 => Throw,
        26 => Catch,
        27 => Edict,
        28 => Xml,
        29 => Json,
        30 => Yaml,
        31 => Lisp,
        32 => Massoc,
        33 => RdLock,
        34 => WrLock,
        35 => Unlock,
        36 => Builtin,
        37 => Map,
        38 => Append,
        39 => Compare,
        40 => CtxPop,
        _ => return None,
    })
}

/// Decode one record starting at `pos`. Returns `Ok(None)` at the
/// terminator or end of stream, `Ok(Some((op, next_pos)))` otherwise.
pub fn decode_one(bytecode: &[u8], pos: usize) -> Result<Option<(Op, usize)>, Error> {
    if pos >= bytecode.len() {
        return Ok(None);
    }
    let tag = bytecode[pos];
    if tag == TERMINATOR {
        return Ok(None);
    }
    if tag == LIT_TAG || tag == REF_TAG {
        let header_end = pos + 1 + 8;
        if bytecode.len() < header_end {
            return Err(Error::Truncated(pos));
        }
        let len = u32::from_be_bytes(bytecode[pos + 1..pos + 5].try_into().unwrap()) as usize;
        let flags = u32::from_be_bytes(bytecode[pos + 5..pos + 9].try_into().unwrap());
        let data_end = header_end + len;
        if bytecode.len() < data_end {
            return Err(Error::Truncated(pos));
        }
        let bytes = bytecode[header_end..data_end].to_vec();
        let op = if tag == LIT_TAG {
            Op::Lit { bytes, flags }
        } else {
            Op::Ref { name: bytes, flags }
        };
        return Ok(Some((op, data_end)));
    }
    match non_extended_from_tag(tag) {
        Some(op) => Ok(Some((op, pos + 1))),
        None => Err(Error::UnknownOpcode(tag, pos)),
    }
}

/// Decode an entire stream into a `Vec<Op>`, stopping at the terminator.
pub fn decode_stream(bytecode: &[u8]) -> Result<Vec<Op>, Error> {
    let mut ops = Vec::new();
    let mut pos = 0;
    while let Some((op, next)) = decode_one(bytecode, pos)? {
        ops.push(op);
        pos = next;
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(Op::ResDict; "res dict")]
    #[test_case(Op::ResWip; "res wip")]
    #[test_case(Op::Push; "push")]
    #[test_case(Op::Dup; "dup")]
    #[test_case(Op::SPush; "spush")]
    #[test_case(Op::RefIns; "ref ins")]
    #[test_case(Op::Deref; "deref")]
    #[test_case(Op::Assign; "assign")]
    #[test_case(Op::Yield; "yield")]
    #[test_case(Op::Edict; "edict")]
    #[test_case(Op::Builtin; "builtin")]
    #[test_case(Op::CtxPop; "ctx pop")]
    fn bare_opcode_round_trips(op: Op) {
        let bytes = encode_stream(&[op.clone()]);
        assert_eq!(decode_stream(&bytes).unwrap(), vec![op]);
    }

    #[test]
    fn round_trips_simple_stream() {
        let ops = vec![Op::ResWip, Op::Lit { bytes: b"hello".to_vec(), flags: 0 }, Op::SPush];
        let bytes = encode_stream(&ops);
        let decoded = decode_stream(&bytes).unwrap();
        assert_eq!(decoded, ops);
    }

    #[test]
    fn unknown_opcode_errors() {
        let bytes = vec![0xFD];
        assert!(matches!(decode_stream(&bytes), Err(Error::UnknownOpcode(0xFD, 0))));
    }

    #[test]
    fn truncated_extended_record_errors() {
        let mut bytes = vec![LIT_TAG];
        bytes.extend_from_slice(&10u32.to_be_bytes());
        // missing flags + payload
        assert!(matches!(decode_stream(&bytes), Err(Error::Truncated(0))));
    }

    #[test]
    fn empty_stream_decodes_to_nothing() {
        assert_eq!(decode_stream(&[]).unwrap(), vec![]);
        assert_eq!(decode_stream(&[TERMINATOR]).unwrap(), vec![]);
    }
}
