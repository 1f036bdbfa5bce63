// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::fmt;
use super::opcode;

/// A single decoded bytecode instruction.  Every instruction records
/// the program counter (byte offset) at which it was decoded,
/// alongside its typed operation.  For a well-formed program the pc
/// values form an arithmetic progression: each instruction starts
/// exactly `width()` bytes after its predecessor, with no gaps.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// Byte offset at which this instruction was decoded.
    pub pc: usize,
    /// The operation performed, including all operand fields.
    pub op: Op,
}

/// Operations correspond to the regexp VM's bytecodes.  There are a
/// few points to make about this:
///
/// 1. The variants form a _closed_ family: the block builder and the
/// merge pass dispatch by pattern matching, never by run-time
/// introspection.
///
/// 2. Branch operands are absolute byte offsets into the program.
/// `target` names the branch taken when a check succeeds (or, for
/// `LoadCurrentChar` and `CheckCurrentPosition`, when the bounds
/// check fails -- the VM routes both through a single operand).
///
/// 3. Character operands are 16-bit code units stored widened to
/// `u32`, since one encoding packs them into a 24-bit immediate.
///
/// 4. Not every opcode of the engine is represented here; opcodes the
/// toolkit has never needed to analyse (backreferences, multi-char
/// loads) are known to the [`opcode`] tables but have no parser, and
/// decoding them is an error rather than a silent placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Push the address `offset` onto the backtrack stack.
    PushBt { offset: usize },
    /// Pop an address off the backtrack stack and jump to it.  This
    /// is an _indirect_ jump: its destination cannot be determined
    /// statically.
    PopBt,
    /// Push the current subject position onto the position stack.
    PushCp,
    /// Pop the current subject position off the position stack.
    PopCp,
    /// Push the value of register `reg` onto the register stack.
    PushRegister { reg: i32 },
    /// Pop the register stack into register `reg`.
    PopRegister { reg: i32 },
    /// Store the current subject position (plus `delta`) in `reg`.
    SetRegisterToCp { reg: i32, delta: u32 },
    /// Store the immediate `value` in `reg`.
    SetRegister { reg: i32, value: u32 },
    /// Add `advance` to register `reg`.
    AdvanceRegister { reg: i32, advance: u32 },
    /// Unconditional jump.
    GoTo { target: usize },
    /// Advance the subject position by `advance` characters, then
    /// jump.  Fused form of `ADVANCE_CP; GOTO`.
    AdvanceCpAndGoto { advance: i32, target: usize },
    /// Advance the subject position by `delta` characters.
    AdvanceCp { delta: i32 },
    /// Position the subject cursor `by` characters before the end.
    SetCurrentPositionFromEnd { by: i32 },
    /// Load the character `delta` positions ahead of the cursor,
    /// branching to `target` when that position is out of bounds.
    LoadCurrentChar { delta: i32, target: usize },
    /// As `LoadCurrentChar`, without the bounds check.
    LoadCurrentCharUnchecked { delta: i32 },
    /// Branch to `target` when the loaded character equals `ch`.
    CheckChar { ch: u32, target: usize },
    /// Branch to `target` when the loaded character differs from `ch`.
    CheckNotChar { ch: u32, target: usize },
    /// Mask the loaded character with `mask`, branching to `target`
    /// on equality with `ch`.
    AndCheckChar { ch: u32, mask: u32, target: usize },
    /// Mask the loaded character with `mask`, branching to `target`
    /// on inequality with `ch`.
    AndCheckNotChar { ch: u32, mask: u32, target: usize },
    /// Branch to `target` when the loaded character lies within
    /// `[from, to]` inclusive.
    CheckCharInRange { from: u16, to: u16, target: usize },
    /// Branch to `target` when the loaded character lies outside
    /// `[from, to]`.
    CheckCharNotInRange { from: u16, to: u16, target: usize },
    /// Branch to `target` when the position saved by the enclosing
    /// greedy loop equals the current position.
    CheckGreedy { target: usize },
    /// Branch to `target` when the loaded character is greater than
    /// `limit`.
    CheckGt { limit: u32, target: usize },
    /// Branch to `target` when the loaded character is less than
    /// `limit`.
    CheckLt { limit: u32, target: usize },
    /// Branch to `target` when register `reg` is less than `limit`.
    CheckRegisterLt { reg: i32, limit: u32, target: usize },
    /// Branch to `target` when register `reg` is at least `limit`.
    CheckRegisterGe { reg: i32, limit: u32, target: usize },
    /// Branch to `target` when the cursor (offset by `delta`) is not
    /// at the start of the subject.
    CheckNotAtStart { delta: i32, target: usize },
    /// Branch to `target` when the cursor is within `delta` of the
    /// subject end.
    CheckCurrentPosition { delta: i32, target: usize },
    /// Fused scanning loop: advance by `num_advance` until the
    /// character at `load_offset` has its bit set in `bit_table`,
    /// then branch to `match_target`; branch to `fail_target` on
    /// running off the subject.
    SkipUntilBitInTable {
        load_offset: i32,
        num_advance: i16,
        bit_table: [u8; 16],
        match_target: usize,
        fail_target: usize,
    },
    /// Fused scanning loop: advance by `advance` until the character
    /// at `delta` equals `ch`.
    SkipUntilChar {
        delta: i32,
        advance: i16,
        ch: u32,
        match_target: usize,
        fail_target: usize,
    },
    /// As `SkipUntilChar`, with an explicit position bound
    /// `max_delta` checked on every step.
    SkipUntilCharPosChecked {
        delta: i32,
        advance: i16,
        ch: u32,
        max_delta: u32,
        fail_target: usize,
        match_target: usize,
    },
    /// Match success: halt and report a match.
    Succeed,
    /// Match failure: pop the backtrack stack, or halt with no match
    /// when it is empty.
    Fail,
}

impl Instruction {
    /// Returns the byte width of this instruction, as given by the
    /// width table.
    pub fn width(&self) -> usize {
        // A name missing from the width table is a corrupted table.
        match opcode::instruction_width(self.op.name()) {
            Some(w) => w,
            None => panic!("no width for opcode {}", self.op.name()),
        }
    }

    /// Returns the pc immediately following this instruction, which
    /// is where execution continues in the absence of a branch.
    pub fn fall_through(&self) -> usize {
        self.pc + self.width()
    }
}

impl Op {
    /// Returns the mnemonic under which this operation appears in the
    /// opcode tables.
    pub fn name(&self) -> &'static str {
        match self {
            Op::PushBt { .. } => "PUSH_BT",
            Op::PopBt => "POP_BT",
            Op::PushCp => "PUSH_CP",
            Op::PopCp => "POP_CP",
            Op::PushRegister { .. } => "PUSH_REGISTER",
            Op::PopRegister { .. } => "POP_REGISTER",
            Op::SetRegisterToCp { .. } => "SET_REGISTER_TO_CP",
            Op::SetRegister { .. } => "SET_REGISTER",
            Op::AdvanceRegister { .. } => "ADVANCE_REGISTER",
            Op::GoTo { .. } => "GOTO",
            Op::AdvanceCpAndGoto { .. } => "ADVANCE_CP_AND_GOTO",
            Op::AdvanceCp { .. } => "ADVANCE_CP",
            Op::SetCurrentPositionFromEnd { .. } => "SET_CURRENT_POSITION_FROM_END",
            Op::LoadCurrentChar { .. } => "LOAD_CURRENT_CHAR",
            Op::LoadCurrentCharUnchecked { .. } => "LOAD_CURRENT_CHAR_UNCHECKED",
            Op::CheckChar { .. } => "CHECK_CHAR",
            Op::CheckNotChar { .. } => "CHECK_NOT_CHAR",
            Op::AndCheckChar { .. } => "AND_CHECK_CHAR",
            Op::AndCheckNotChar { .. } => "AND_CHECK_NOT_CHAR",
            Op::CheckCharInRange { .. } => "CHECK_CHAR_IN_RANGE",
            Op::CheckCharNotInRange { .. } => "CHECK_CHAR_NOT_IN_RANGE",
            Op::CheckGreedy { .. } => "CHECK_GREEDY",
            Op::CheckGt { .. } => "CHECK_GT",
            Op::CheckLt { .. } => "CHECK_LT",
            Op::CheckRegisterLt { .. } => "CHECK_REGISTER_LT",
            Op::CheckRegisterGe { .. } => "CHECK_REGISTER_GE",
            Op::CheckNotAtStart { .. } => "CHECK_NOT_AT_START",
            Op::CheckCurrentPosition { .. } => "CHECK_CURRENT_POSITION",
            Op::SkipUntilBitInTable { .. } => "SKIP_UNTIL_BIT_IN_TABLE",
            Op::SkipUntilChar { .. } => "SKIP_UNTIL_CHAR",
            Op::SkipUntilCharPosChecked { .. } => "SKIP_UNTIL_CHAR_POS_CHECKED",
            Op::Succeed => "SUCCEED",
            Op::Fail => "FAIL",
        }
    }
}

// ============================================================================
// Decoding Error
// ============================================================================

/// An error which arises when attempting to decode a packed byte
/// buffer into an instruction stream.  In essence, this indicates the
/// buffer is malformed (or misaligned) in some way.
pub enum DecodeError {
    /// Indicates the byte at the given pc is not the tag of any known
    /// opcode.
    UnknownOpcode { opcode: u8, pc: usize },
    /// Indicates the opcode is known to the tables but no operand
    /// parser exists for it.
    UnimplementedOpcode { name: &'static str, pc: usize },
    /// Indicates an operand read ran past the end of the buffer.
    Truncated { pc: usize },
    /// Indicates the width table has no entry for a name present in
    /// the byte table.  This is a configuration error rather than an
    /// input error.
    MissingWidth { name: &'static str },
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::UnknownOpcode { opcode, pc } => {
                write!(f, "unknown bytecode {:#04x} at {:#x}", opcode, pc)
            }
            DecodeError::UnimplementedOpcode { name, pc } => {
                write!(f, "no parser for {} at {:#x}", name, pc)
            }
            DecodeError::Truncated { pc } => {
                write!(f, "truncated operand at {:#x}", pc)
            }
            DecodeError::MissingWidth { name } => {
                write!(f, "no width table entry for {}", name)
            }
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Just reuse debug formatting.
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for DecodeError {}

// ============================================================================
// Operand readers
// ============================================================================

/// Read a little-endian 32-bit unsigned operand.
fn read_u32(bytes: &[u8], at: usize) -> Result<u32, DecodeError> {
    let word: [u8; 4] = bytes
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated { pc: at })?;
    Ok(u32::from_le_bytes(word))
}

/// Read a little-endian 16-bit unsigned operand.
fn read_u16(bytes: &[u8], at: usize) -> Result<u16, DecodeError> {
    let word: [u8; 2] = bytes
        .get(at..at + 2)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated { pc: at })?;
    Ok(u16::from_le_bytes(word))
}

/// Read a little-endian 16-bit signed operand.
fn read_i16(bytes: &[u8], at: usize) -> Result<i16, DecodeError> {
    Ok(read_u16(bytes, at)? as i16)
}

/// Read the 24-bit signed immediate packed into the high bytes of the
/// word containing the opcode tag.  The word is read as a 32-bit
/// little-endian integer and arithmetically shifted right by eight,
/// which discards the tag and preserves the immediate's sign.
fn read_imm24(bytes: &[u8], at: usize) -> Result<i32, DecodeError> {
    Ok((read_u32(bytes, at)? as i32) >> 8)
}

/// Read a branch target, which is an unsigned 32-bit byte offset.
fn read_target(bytes: &[u8], at: usize) -> Result<usize, DecodeError> {
    Ok(read_u32(bytes, at)? as usize)
}

/// Read the 16-byte bit table of `SKIP_UNTIL_BIT_IN_TABLE`.
fn read_bit_table(bytes: &[u8], at: usize) -> Result<[u8; 16], DecodeError> {
    bytes
        .get(at..at + 16)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated { pc: at })
}

// ============================================================================
// Decoder
// ============================================================================

impl Instruction {
    /// Decode one instruction at the given pc.  Returns the decoded
    /// instruction together with the pc of the next instruction.
    /// Observe that there is no recovery from a misaligned buffer:
    /// decoding simply produces a garbage instruction stream, or an
    /// error once an unknown tag byte is hit.
    pub fn decode_one(bytes: &[u8], pc: usize) -> Result<(Instruction, usize), DecodeError> {
        let code = *bytes.get(pc).ok_or(DecodeError::Truncated { pc })?;
        let name = match opcode::instruction_name(code) {
            Some(name) => name,
            None => {
                return Err(DecodeError::UnknownOpcode { opcode: code, pc });
            }
        };
        let width = match opcode::instruction_width(name) {
            Some(width) => width,
            None => {
                return Err(DecodeError::MissingWidth { name });
            }
        };
        let op = parse_operands(name, bytes, pc)?;
        Ok((Instruction { pc, op }, pc + width))
    }
}

/// Parse the operand fields for a given mnemonic, using the packed
/// layouts of the engine's irregular encoding.
fn parse_operands(name: &'static str, b: &[u8], pc: usize) -> Result<Op, DecodeError> {
    let op = match name {
        "PUSH_BT" => Op::PushBt {
            offset: read_target(b, pc + 4)?,
        },
        "POP_BT" => Op::PopBt,
        "PUSH_CP" => Op::PushCp,
        "POP_CP" => Op::PopCp,
        "PUSH_REGISTER" => Op::PushRegister {
            reg: read_imm24(b, pc)?,
        },
        "POP_REGISTER" => Op::PopRegister {
            reg: read_imm24(b, pc)?,
        },
        "SET_REGISTER_TO_CP" => Op::SetRegisterToCp {
            reg: read_imm24(b, pc)?,
            delta: read_u32(b, pc + 4)?,
        },
        "SET_REGISTER" => Op::SetRegister {
            reg: read_imm24(b, pc)?,
            value: read_u32(b, pc + 4)?,
        },
        "ADVANCE_REGISTER" => Op::AdvanceRegister {
            reg: read_imm24(b, pc)?,
            advance: read_u32(b, pc + 4)?,
        },
        "GOTO" => Op::GoTo {
            target: read_target(b, pc + 4)?,
        },
        "ADVANCE_CP_AND_GOTO" => Op::AdvanceCpAndGoto {
            advance: read_imm24(b, pc)?,
            target: read_target(b, pc + 4)?,
        },
        "ADVANCE_CP" => Op::AdvanceCp {
            delta: read_imm24(b, pc)?,
        },
        "SET_CURRENT_POSITION_FROM_END" => Op::SetCurrentPositionFromEnd {
            by: read_imm24(b, pc)?,
        },
        "LOAD_CURRENT_CHAR" => Op::LoadCurrentChar {
            delta: read_imm24(b, pc)?,
            target: read_target(b, pc + 4)?,
        },
        "LOAD_CURRENT_CHAR_UNCHECKED" => Op::LoadCurrentCharUnchecked {
            delta: read_imm24(b, pc)?,
        },
        "CHECK_CHAR" => Op::CheckChar {
            ch: read_imm24(b, pc)? as u32,
            target: read_target(b, pc + 4)?,
        },
        "CHECK_NOT_CHAR" => Op::CheckNotChar {
            ch: read_imm24(b, pc)? as u32,
            target: read_target(b, pc + 4)?,
        },
        "AND_CHECK_CHAR" => Op::AndCheckChar {
            ch: read_imm24(b, pc)? as u32,
            mask: read_u32(b, pc + 4)?,
            target: read_target(b, pc + 8)?,
        },
        "AND_CHECK_NOT_CHAR" => Op::AndCheckNotChar {
            ch: read_imm24(b, pc)? as u32,
            mask: read_u32(b, pc + 4)?,
            target: read_target(b, pc + 8)?,
        },
        "CHECK_CHAR_IN_RANGE" => Op::CheckCharInRange {
            from: read_u16(b, pc + 4)?,
            to: read_u16(b, pc + 6)?,
            target: read_target(b, pc + 8)?,
        },
        "CHECK_CHAR_NOT_IN_RANGE" => Op::CheckCharNotInRange {
            from: read_u16(b, pc + 4)?,
            to: read_u16(b, pc + 6)?,
            target: read_target(b, pc + 8)?,
        },
        "CHECK_GREEDY" => Op::CheckGreedy {
            target: read_target(b, pc + 4)?,
        },
        "CHECK_GT" => Op::CheckGt {
            limit: read_imm24(b, pc)? as u32,
            target: read_target(b, pc + 4)?,
        },
        "CHECK_LT" => Op::CheckLt {
            limit: read_imm24(b, pc)? as u32,
            target: read_target(b, pc + 4)?,
        },
        "CHECK_REGISTER_LT" => Op::CheckRegisterLt {
            reg: read_imm24(b, pc)?,
            limit: read_u32(b, pc + 4)?,
            target: read_target(b, pc + 8)?,
        },
        "CHECK_REGISTER_GE" => Op::CheckRegisterGe {
            reg: read_imm24(b, pc)?,
            limit: read_u32(b, pc + 4)?,
            target: read_target(b, pc + 8)?,
        },
        "CHECK_NOT_AT_START" => Op::CheckNotAtStart {
            delta: read_imm24(b, pc)?,
            target: read_target(b, pc + 4)?,
        },
        "CHECK_CURRENT_POSITION" => Op::CheckCurrentPosition {
            delta: read_imm24(b, pc)?,
            target: read_target(b, pc + 4)?,
        },
        "SKIP_UNTIL_BIT_IN_TABLE" => Op::SkipUntilBitInTable {
            load_offset: read_imm24(b, pc)?,
            num_advance: read_i16(b, pc + 4)?,
            bit_table: read_bit_table(b, pc + 8)?,
            match_target: read_target(b, pc + 24)?,
            fail_target: read_target(b, pc + 28)?,
        },
        "SKIP_UNTIL_CHAR" => Op::SkipUntilChar {
            delta: read_imm24(b, pc)?,
            advance: read_i16(b, pc + 4)?,
            ch: read_u16(b, pc + 6)? as u32,
            match_target: read_target(b, pc + 8)?,
            fail_target: read_target(b, pc + 12)?,
        },
        "SKIP_UNTIL_CHAR_POS_CHECKED" => Op::SkipUntilCharPosChecked {
            delta: read_imm24(b, pc)?,
            advance: read_i16(b, pc + 4)?,
            ch: read_u16(b, pc + 6)? as u32,
            max_delta: read_u32(b, pc + 8)?,
            match_target: read_target(b, pc + 12)?,
            fail_target: read_target(b, pc + 16)?,
        },
        "SUCCEED" => Op::Succeed,
        "FAIL" => Op::Fail,
        _ => {
            return Err(DecodeError::UnimplementedOpcode { name, pc });
        }
    };
    Ok(op)
}

// ============================================================================
// Display
// ============================================================================

impl Instruction {
    /// Write the operand fields of this instruction in the listing
    /// format, e.g. `{delta: 1, target: 0x20}`.  Branch operands are
    /// written in hex since they are addresses; scalar operands in
    /// decimal.  Instructions without operands write nothing.
    pub fn write_operands(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.op {
            Op::PushBt { offset } => write!(f, "{{offset: {:#x}}}", offset),
            Op::PopBt | Op::PushCp | Op::PopCp | Op::Succeed | Op::Fail => Ok(()),
            Op::PushRegister { reg } | Op::PopRegister { reg } => {
                write!(f, "{{reg: {}}}", reg)
            }
            Op::SetRegisterToCp { reg, delta } => {
                write!(f, "{{reg: {}, delta: {}}}", reg, delta)
            }
            Op::SetRegister { reg, value } => {
                write!(f, "{{reg: {}, value: {}}}", reg, value)
            }
            Op::AdvanceRegister { reg, advance } => {
                write!(f, "{{reg: {}, advance: {}}}", reg, advance)
            }
            Op::GoTo { target } => write!(f, "{{target: {:#x}}}", target),
            Op::AdvanceCpAndGoto { advance, target } => {
                write!(f, "{{advance: {}, target: {:#x}}}", advance, target)
            }
            Op::AdvanceCp { delta } => write!(f, "{{delta: {}}}", delta),
            Op::SetCurrentPositionFromEnd { by } => write!(f, "{{by: {}}}", by),
            Op::LoadCurrentChar { delta, target } => {
                write!(f, "{{delta: {}, target: {:#x}}}", delta, target)
            }
            Op::LoadCurrentCharUnchecked { delta } => write!(f, "{{delta: {}}}", delta),
            Op::CheckChar { ch, target } | Op::CheckNotChar { ch, target } => {
                write!(f, "{{char: {:?}, target: {:#x}}}", display_char(*ch), target)
            }
            Op::AndCheckChar { ch, mask, target } | Op::AndCheckNotChar { ch, mask, target } => {
                write!(
                    f,
                    "{{char: {:?}, mask: {:#x}, target: {:#x}}}",
                    display_char(*ch),
                    mask,
                    target
                )
            }
            Op::CheckCharInRange { from, to, target }
            | Op::CheckCharNotInRange { from, to, target } => {
                write!(f, "{{from: {}, to: {}, target: {:#x}}}", from, to, target)
            }
            Op::CheckGreedy { target } => write!(f, "{{target: {:#x}}}", target),
            Op::CheckGt { limit, target } | Op::CheckLt { limit, target } => {
                write!(f, "{{limit: {}, target: {:#x}}}", limit, target)
            }
            Op::CheckRegisterLt { reg, limit, target }
            | Op::CheckRegisterGe { reg, limit, target } => {
                write!(
                    f,
                    "{{reg: {}, limit: {}, target: {:#x}}}",
                    reg, limit, target
                )
            }
            Op::CheckNotAtStart { delta, target } | Op::CheckCurrentPosition { delta, target } => {
                write!(f, "{{delta: {}, target: {:#x}}}", delta, target)
            }
            Op::SkipUntilBitInTable {
                load_offset,
                num_advance,
                bit_table,
                match_target,
                fail_target,
            } => {
                write!(
                    f,
                    "{{load_offset: {}, num_advance: {}, bit_table: ",
                    load_offset, num_advance
                )?;
                for byte in bit_table {
                    write!(f, "{:02x}", byte)?;
                }
                write!(
                    f,
                    ", match_target: {:#x}, fail_target: {:#x}}}",
                    match_target, fail_target
                )
            }
            Op::SkipUntilChar {
                delta,
                advance,
                ch,
                match_target,
                fail_target,
            } => {
                write!(
                    f,
                    "{{delta: {}, advance: {}, char: {:?}, match_target: {:#x}, fail_target: {:#x}}}",
                    delta,
                    advance,
                    display_char(*ch),
                    match_target,
                    fail_target
                )
            }
            Op::SkipUntilCharPosChecked {
                delta,
                advance,
                ch,
                max_delta,
                fail_target,
                match_target,
            } => {
                write!(
                    f,
                    "{{delta: {}, advance: {}, char: {:?}, max_delta: {}, fail_target: {:#x}, match_target: {:#x}}}",
                    delta,
                    advance,
                    display_char(*ch),
                    max_delta,
                    fail_target,
                    match_target
                )
            }
        }
    }
}

/// Render a code unit as a character where possible, falling back to
/// the replacement character for unpaired surrogates and the like.
fn display_char(ch: u32) -> char {
    char::from_u32(ch).unwrap_or(char::REPLACEMENT_CHARACTER)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x} {} ", self.pc, self.op.name())?;
        self.write_operands(f)
    }
}
