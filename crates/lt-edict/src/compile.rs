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

use lt_bytecode::{encode_stream, Op};
use thiserror::Error;
use tracing::warn;

use crate::lexer::{lex, LexError, Token};

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseError {
    #[error("lexical error: {0}")]
    Lex(LexError),
    #[error("front-end format {0:?} is not implemented")]
    UnsupportedFormat(crate::Format),
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

fn lower_op_char(ch: u8, ops: &mut Vec<Op>) {
    match ch {
        b'#' => ops.push(Op::Builtin),
        b'@' => ops.push(Op::Assign),
        b'/' => ops.push(Op::Remove),
        b'!' => {
            ops.push(Op::Edict);
            ops.push(Op::Yield);
        }
        b'&' => ops.push(Op::Throw),
        b'|' => ops.push(Op::Catch),
        b'%' => ops.push(Op::Map),
        b'+' => ops.push(Op::Append),
        b'=' => ops.push(Op::Compare),
        other => {
            // Unreachable in practice: `OP_CHARS` in the lexer is exactly
            // this set. Kept defensive in case that set is ever widened
            // without updating this match.
            warn!("edict: operator byte {other:#04x} has no lowering, ignoring");
        }
    }
}

fn lower_mono(ch: u8, ops: &mut Vec<Op>) {
    match ch {
        b'<' | b'(' | b'{' => {
            ops.push(Op::SPop);
            ops.push(Op::ResDict);
            ops.push(Op::Push);
        }
        b'>' | b'}' => {
            ops.push(Op::CtxPop);
            ops.push(Op::SPush);
        }
        b')' => {
            ops.push(Op::CtxPop);
            ops.push(Op::SPush);
            ops.push(Op::Edict);
        }
        other => warn!("edict: mono-op byte {other:#04x} has no lowering, ignoring"),
    }
}

/// Lower a token stream to an opcode list, one pass, left to right, with a
/// single token of lookahead to fuse an operator run with a trailing name.
pub fn lower(tokens: &[Token]) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut i = 0usize;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Literal(payload) => {
                ops.push(Op::Lit { bytes: payload.clone(), flags: 0 });
                i += 1;
            }
            Token::MonoOp(ch) => {
                lower_mono(*ch, &mut ops);
                i += 1;
            }
            Token::OpRun(chars) => {
                let name = if let Some(Token::Name(n)) = tokens.get(i + 1) {
                    Some(n.clone())
                } else {
                    None
                };
                if let Some(n) = &name {
                    ops.push(Op::Ref { name: n.clone(), flags: 0 });
                }
                for ch in chars {
                    lower_op_char(*ch, &mut ops);
                }
                if name.is_some() {
                    ops.push(Op::RefDeq);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            Token::Name(name) => {
                ops.push(Op::Ref { name: name.clone(), flags: 0 });
                ops.push(Op::Deref);
                i += 1;
            }
        }
    }
    ops
}

/// Compile edict source text into an opcode list.
pub fn compile_ops(src: &[u8]) -> Result<Vec<Op>, ParseError> {
    let tokens = lex(src)?;
    Ok(lower(&tokens))
}

/// Compile edict source text directly into an encoded bytecode stream
/// (ready to push onto the CODE resource).
pub fn compile_bytecode(src: &[u8]) -> Result<Vec<u8>, ParseError> {
    Ok(encode_stream(&compile_ops(src)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_literal_lowers_to_lit() {
        let ops = compile_ops(b"[hello]").unwrap();
        assert_eq!(ops, vec![Op::Lit { bytes: b"hello".to_vec(), flags: 0 }]);
    }

    #[test]
    fn assign_then_deref() {
        let ops = compile_ops(b"[hello]@a a").unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Lit { bytes: b"hello".to_vec(), flags: 0 },
                Op::Ref { name: b"a".to_vec(), flags: 0 },
                Op::Assign,
                Op::RefDeq,
                Op::Ref { name: b"a".to_vec(), flags: 0 },
                Op::Deref,
            ]
        );
    }

    #[test]
    fn postfix_remove_reuses_prior_reference() {
        // `a/` : bare name ref+deref, then a bare op-run reusing the
        // reference `a` left resolvable on REFS.
        let ops = compile_ops(b"a/").unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Ref { name: b"a".to_vec(), flags: 0 },
                Op::Deref,
                Op::Remove,
            ]
        );
    }

    #[test]
    fn immediate_block_lowers_mono_ops() {
        let ops = compile_ops(b"(a)").unwrap();
        assert_eq!(
            ops,
            vec![
                Op::SPop,
                Op::ResDict,
                Op::Push,
                Op::Ref { name: b"a".to_vec(), flags: 0 },
                Op::Deref,
                Op::CtxPop,
                Op::SPush,
                Op::Edict,
            ]
        );
    }

    #[test]
    fn bang_is_edict_then_yield() {
        // `!` is an op-run, `a` the name that follows it, so the REF/RefDeq
        // fusion rule applies the same as any other op-run+name pair: the
        // reference is emitted first, then the op-run's opcodes, then
        // `RefDeq` to retire it.
        let ops = compile_ops(b"!a").unwrap();
        assert_eq!(
            ops,
            vec![
                Op::Ref { name: b"a".to_vec(), flags: 0 },
                Op::Edict,
                Op::Yield,
                Op::RefDeq,
            ]
        );
    }
}
