//! In-process scanners for exercising the run loop without a guest module.
//!
//! [`ScriptedScanner`] replays a fixed list of steps, which makes faults and
//! status codes easy to stage. [`WordScanner`] is a small real scanner that
//! reads the null-terminated input out of its region the way a compiled
//! guest would.

use crate::error::{BridgeError, Result};
use crate::region::{self, RegionLayout};
use crate::scanner::{RawToken, Scanner};
use crate::token::{TokenKind, TokenRecord, special};

/// One action a scripted step performs, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestOp {
    /// Emit a token whose offset is relative to the setup offset.
    Emit(TokenRecord),
    /// Emit a token with an absolute pointer, as-is.
    EmitRaw(RawToken),
    /// Bulk fill through the region primitive.
    Fill {
        /// Absolute start offset.
        start: u32,
        /// Fill byte.
        value: u8,
        /// Byte count.
        count: u32,
    },
    /// Bulk copy through the region primitive.
    Copy {
        /// Absolute destination offset.
        dst: u32,
        /// Absolute source offset.
        src: u32,
        /// Byte count.
        count: u32,
    },
    /// Call the abort primitive.
    Abort(i32),
}

impl GuestOp {
    /// Emit a plain token at a staging-relative offset.
    pub fn emit(offset: u32, len: u32) -> Self {
        Self::Emit(TokenRecord {
            offset,
            len,
            line_no: 1,
            type_tag: TokenKind::Lit.tag(),
            special: 0,
        })
    }
}

#[derive(Debug, Clone)]
struct ScriptedStep {
    ops: Vec<GuestOp>,
    status: i32,
}

/// Replays a fixed script, restarting it on every setup call.
///
/// Once the script runs out every further step returns 0.
#[derive(Debug, Clone)]
pub struct ScriptedScanner {
    memory: Vec<u8>,
    script: Vec<ScriptedStep>,
    cursor: usize,
    setup_offset: Option<u32>,
    setup_calls: u64,
    step_calls: u64,
}

impl ScriptedScanner {
    /// Create a scanner with a zeroed region sized for `layout`.
    pub fn new(layout: RegionLayout) -> Self {
        Self {
            memory: vec![0; layout.capacity()],
            script: Vec::new(),
            cursor: 0,
            setup_offset: None,
            setup_calls: 0,
            step_calls: 0,
        }
    }

    /// Append a step that performs `ops` and then returns `status`.
    pub fn step(mut self, ops: Vec<GuestOp>, status: i32) -> Self {
        self.script.push(ScriptedStep { ops, status });
        self
    }

    /// Append a step that emits `(offset, len)` tokens and returns `status`.
    pub fn emit_step(self, tokens: &[(u32, u32)], status: i32) -> Self {
        let ops = tokens
            .iter()
            .map(|&(offset, len)| GuestOp::emit(offset, len))
            .collect();
        self.step(ops, status)
    }

    /// Number of setup calls so far.
    pub fn setup_calls(&self) -> u64 {
        self.setup_calls
    }

    /// Number of step calls so far.
    pub fn step_calls(&self) -> u64 {
        self.step_calls
    }

    /// Offset passed to the most recent setup call.
    pub fn setup_offset(&self) -> Option<u32> {
        self.setup_offset
    }
}

impl Scanner for ScriptedScanner {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn setup(&mut self, start: u32) -> Result<()> {
        self.setup_calls += 1;
        self.setup_offset = Some(start);
        self.cursor = 0;
        Ok(())
    }

    fn step(&mut self, emit: &mut Vec<RawToken>) -> Result<i32> {
        self.step_calls += 1;
        let Some(step) = self.script.get(self.cursor) else {
            return Ok(0);
        };
        self.cursor += 1;

        let base = self.setup_offset.unwrap_or(0);
        for op in &step.ops {
            match op {
                GuestOp::Emit(record) => emit.push(RawToken {
                    ptr: base + record.offset,
                    len: record.len,
                    line_no: record.line_no,
                    type_tag: record.type_tag,
                    special: record.special,
                }),
                GuestOp::EmitRaw(raw) => emit.push(*raw),
                GuestOp::Fill {
                    start,
                    value,
                    count,
                } => {
                    region::fill(&mut self.memory, *start, *value, *count)?;
                }
                GuestOp::Copy { dst, src, count } => {
                    region::copy(&mut self.memory, *dst, *src, *count)?;
                }
                GuestOp::Abort(code) => return Err(BridgeError::GuestFault { code: *code }),
            }
        }
        Ok(step.status)
    }
}

/// Splits input into words and single punctuation bytes, one token per step.
///
/// Words are runs of ASCII alphanumerics and `_`. Whitespace separates
/// tokens and `\n` advances the line counter.
#[derive(Debug, Clone)]
pub struct WordScanner {
    memory: Vec<u8>,
    at: usize,
    line_no: u32,
    last_line: Option<u32>,
}

impl WordScanner {
    /// Create a scanner with a zeroed region sized for `layout`.
    pub fn new(layout: RegionLayout) -> Self {
        Self {
            memory: vec![0; layout.capacity()],
            at: 0,
            line_no: 1,
            last_line: None,
        }
    }

    fn byte(&self, at: usize) -> u8 {
        self.memory.get(at).copied().unwrap_or(0)
    }

    fn classify(text: &[u8]) -> TokenKind {
        match text {
            [b';'] => TokenKind::Semicolon,
            [b'{'] => TokenKind::Brace,
            [b'['] => TokenKind::Array,
            [b'('] => TokenKind::Paren,
            [b'}' | b']' | b')'] => TokenKind::Close,
            [first, ..] if first.is_ascii_digit() => TokenKind::Number,
            [first, ..] if is_word(*first) => TokenKind::Symbol,
            _ => TokenKind::Op,
        }
    }
}

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl Scanner for WordScanner {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn setup(&mut self, start: u32) -> Result<()> {
        self.at = start as usize;
        self.line_no = 1;
        self.last_line = None;
        Ok(())
    }

    fn step(&mut self, emit: &mut Vec<RawToken>) -> Result<i32> {
        loop {
            match self.byte(self.at) {
                0 => return Ok(0),
                b'\n' => self.line_no += 1,
                b if b.is_ascii_whitespace() => {}
                _ => break,
            }
            self.at += 1;
        }

        let start = self.at;
        if is_word(self.byte(start)) {
            while is_word(self.byte(self.at)) {
                self.at += 1;
            }
        } else {
            self.at += 1;
        }

        let kind = Self::classify(&self.memory[start..self.at]);
        let special = if self.last_line == Some(self.line_no) {
            special::SAME_LINE
        } else {
            0
        };
        self.last_line = Some(self.line_no);

        emit.push(RawToken {
            ptr: start as u32,
            len: (self.at - start) as u32,
            line_no: self.line_no,
            type_tag: kind.tag(),
            special,
        });
        Ok(1)
    }
}
