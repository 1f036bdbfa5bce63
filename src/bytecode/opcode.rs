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

//! Opcode tables for the regexp VM's linear bytecode.  Every program
//! is a packed sequence of instructions, where each instruction
//! starts with a single opcode byte and occupies a fixed number of
//! bytes overall.  Two tables are maintained here: the byte tag for
//! every known opcode, and the byte width of every known opcode.
//! Observe that the tables deliberately cover the engine's _entire_
//! opcode space, including opcodes for which no operand parser exists
//! yet (e.g. the backreference checks).  This allows the decoder to
//! distinguish a genuinely unknown byte from a known-but-unhandled
//! instruction.

// Stack operations
pub const BREAK: u8 = 0x00;
pub const PUSH_CP: u8 = 0x01;
pub const PUSH_BT: u8 = 0x02;
pub const PUSH_REGISTER: u8 = 0x03;
pub const SET_REGISTER_TO_CP: u8 = 0x04;
pub const SET_CP_TO_REGISTER: u8 = 0x05;
pub const SET_REGISTER_TO_SP: u8 = 0x06;
pub const SET_SP_TO_REGISTER: u8 = 0x07;
pub const SET_REGISTER: u8 = 0x08;
pub const ADVANCE_REGISTER: u8 = 0x09;
pub const POP_CP: u8 = 0x0a;
pub const POP_BT: u8 = 0x0b;
pub const POP_REGISTER: u8 = 0x0c;
// Exits
pub const FAIL: u8 = 0x0d;
pub const SUCCEED: u8 = 0x0e;
// Cursor movement and unconditional control flow
pub const ADVANCE_CP: u8 = 0x0f;
pub const GOTO: u8 = 0x10;
// Character loads
pub const LOAD_CURRENT_CHAR: u8 = 0x11;
pub const LOAD_CURRENT_CHAR_UNCHECKED: u8 = 0x12;
pub const LOAD_2_CURRENT_CHARS: u8 = 0x13;
pub const LOAD_2_CURRENT_CHARS_UNCHECKED: u8 = 0x14;
pub const LOAD_4_CURRENT_CHARS: u8 = 0x15;
pub const LOAD_4_CURRENT_CHARS_UNCHECKED: u8 = 0x16;
// Character checks (branching)
pub const CHECK_4_CHARS: u8 = 0x17;
pub const CHECK_CHAR: u8 = 0x18;
pub const CHECK_NOT_4_CHARS: u8 = 0x19;
pub const CHECK_NOT_CHAR: u8 = 0x1a;
pub const AND_CHECK_4_CHARS: u8 = 0x1b;
pub const AND_CHECK_CHAR: u8 = 0x1c;
pub const AND_CHECK_NOT_4_CHARS: u8 = 0x1d;
pub const AND_CHECK_NOT_CHAR: u8 = 0x1e;
pub const MINUS_AND_CHECK_NOT_CHAR: u8 = 0x1f;
pub const CHECK_CHAR_IN_RANGE: u8 = 0x20;
pub const CHECK_CHAR_NOT_IN_RANGE: u8 = 0x21;
pub const CHECK_BIT_IN_TABLE: u8 = 0x22;
// Scalar and register checks (branching)
pub const CHECK_LT: u8 = 0x23;
pub const CHECK_GT: u8 = 0x24;
pub const CHECK_NOT_BACK_REF: u8 = 0x25;
pub const CHECK_NOT_BACK_REF_NO_CASE: u8 = 0x26;
pub const CHECK_NOT_BACK_REF_NO_CASE_UNICODE: u8 = 0x27;
pub const CHECK_NOT_BACK_REF_BACKWARD: u8 = 0x28;
pub const CHECK_NOT_BACK_REF_NO_CASE_BACKWARD: u8 = 0x29;
pub const CHECK_NOT_BACK_REF_NO_CASE_UNICODE_BACKWARD: u8 = 0x2a;
pub const CHECK_NOT_REGS_EQUAL: u8 = 0x2b;
pub const CHECK_REGISTER_LT: u8 = 0x2c;
pub const CHECK_REGISTER_GE: u8 = 0x2d;
pub const CHECK_REGISTER_EQ_POS: u8 = 0x2e;
pub const CHECK_AT_START: u8 = 0x2f;
pub const CHECK_NOT_AT_START: u8 = 0x30;
pub const CHECK_GREEDY: u8 = 0x31;
pub const ADVANCE_CP_AND_GOTO: u8 = 0x32;
pub const SET_CURRENT_POSITION_FROM_END: u8 = 0x33;
pub const CHECK_CURRENT_POSITION: u8 = 0x34;
// Fused skip loops
pub const SKIP_UNTIL_BIT_IN_TABLE: u8 = 0x35;
pub const SKIP_UNTIL_CHAR_AND: u8 = 0x36;
pub const SKIP_UNTIL_CHAR: u8 = 0x37;
pub const SKIP_UNTIL_CHAR_POS_CHECKED: u8 = 0x38;
pub const SKIP_UNTIL_CHAR_OR_CHAR: u8 = 0x39;
pub const SKIP_UNTIL_GT_OR_NOT_BIT_IN_TABLE: u8 = 0x3a;

/// Determine the mnemonic for a given opcode byte, or `None` if the
/// byte does not correspond to any known opcode.
pub fn instruction_name(opcode: u8) -> Option<&'static str> {
    let name = match opcode {
        BREAK => "BREAK",
        PUSH_CP => "PUSH_CP",
        PUSH_BT => "PUSH_BT",
        PUSH_REGISTER => "PUSH_REGISTER",
        SET_REGISTER_TO_CP => "SET_REGISTER_TO_CP",
        SET_CP_TO_REGISTER => "SET_CP_TO_REGISTER",
        SET_REGISTER_TO_SP => "SET_REGISTER_TO_SP",
        SET_SP_TO_REGISTER => "SET_SP_TO_REGISTER",
        SET_REGISTER => "SET_REGISTER",
        ADVANCE_REGISTER => "ADVANCE_REGISTER",
        POP_CP => "POP_CP",
        POP_BT => "POP_BT",
        POP_REGISTER => "POP_REGISTER",
        FAIL => "FAIL",
        SUCCEED => "SUCCEED",
        ADVANCE_CP => "ADVANCE_CP",
        GOTO => "GOTO",
        LOAD_CURRENT_CHAR => "LOAD_CURRENT_CHAR",
        LOAD_CURRENT_CHAR_UNCHECKED => "LOAD_CURRENT_CHAR_UNCHECKED",
        LOAD_2_CURRENT_CHARS => "LOAD_2_CURRENT_CHARS",
        LOAD_2_CURRENT_CHARS_UNCHECKED => "LOAD_2_CURRENT_CHARS_UNCHECKED",
        LOAD_4_CURRENT_CHARS => "LOAD_4_CURRENT_CHARS",
        LOAD_4_CURRENT_CHARS_UNCHECKED => "LOAD_4_CURRENT_CHARS_UNCHECKED",
        CHECK_4_CHARS => "CHECK_4_CHARS",
        CHECK_CHAR => "CHECK_CHAR",
        CHECK_NOT_4_CHARS => "CHECK_NOT_4_CHARS",
        CHECK_NOT_CHAR => "CHECK_NOT_CHAR",
        AND_CHECK_4_CHARS => "AND_CHECK_4_CHARS",
        AND_CHECK_CHAR => "AND_CHECK_CHAR",
        AND_CHECK_NOT_4_CHARS => "AND_CHECK_NOT_4_CHARS",
        AND_CHECK_NOT_CHAR => "AND_CHECK_NOT_CHAR",
        MINUS_AND_CHECK_NOT_CHAR => "MINUS_AND_CHECK_NOT_CHAR",
        CHECK_CHAR_IN_RANGE => "CHECK_CHAR_IN_RANGE",
        CHECK_CHAR_NOT_IN_RANGE => "CHECK_CHAR_NOT_IN_RANGE",
        CHECK_BIT_IN_TABLE => "CHECK_BIT_IN_TABLE",
        CHECK_LT => "CHECK_LT",
        CHECK_GT => "CHECK_GT",
        CHECK_NOT_BACK_REF => "CHECK_NOT_BACK_REF",
        CHECK_NOT_BACK_REF_NO_CASE => "CHECK_NOT_BACK_REF_NO_CASE",
        CHECK_NOT_BACK_REF_NO_CASE_UNICODE => "CHECK_NOT_BACK_REF_NO_CASE_UNICODE",
        CHECK_NOT_BACK_REF_BACKWARD => "CHECK_NOT_BACK_REF_BACKWARD",
        CHECK_NOT_BACK_REF_NO_CASE_BACKWARD => "CHECK_NOT_BACK_REF_NO_CASE_BACKWARD",
        CHECK_NOT_BACK_REF_NO_CASE_UNICODE_BACKWARD => {
            "CHECK_NOT_BACK_REF_NO_CASE_UNICODE_BACKWARD"
        }
        CHECK_NOT_REGS_EQUAL => "CHECK_NOT_REGS_EQUAL",
        CHECK_REGISTER_LT => "CHECK_REGISTER_LT",
        CHECK_REGISTER_GE => "CHECK_REGISTER_GE",
        CHECK_REGISTER_EQ_POS => "CHECK_REGISTER_EQ_POS",
        CHECK_AT_START => "CHECK_AT_START",
        CHECK_NOT_AT_START => "CHECK_NOT_AT_START",
        CHECK_GREEDY => "CHECK_GREEDY",
        ADVANCE_CP_AND_GOTO => "ADVANCE_CP_AND_GOTO",
        SET_CURRENT_POSITION_FROM_END => "SET_CURRENT_POSITION_FROM_END",
        CHECK_CURRENT_POSITION => "CHECK_CURRENT_POSITION",
        SKIP_UNTIL_BIT_IN_TABLE => "SKIP_UNTIL_BIT_IN_TABLE",
        SKIP_UNTIL_CHAR_AND => "SKIP_UNTIL_CHAR_AND",
        SKIP_UNTIL_CHAR => "SKIP_UNTIL_CHAR",
        SKIP_UNTIL_CHAR_POS_CHECKED => "SKIP_UNTIL_CHAR_POS_CHECKED",
        SKIP_UNTIL_CHAR_OR_CHAR => "SKIP_UNTIL_CHAR_OR_CHAR",
        SKIP_UNTIL_GT_OR_NOT_BIT_IN_TABLE => "SKIP_UNTIL_GT_OR_NOT_BIT_IN_TABLE",
        _ => {
            return None;
        }
    };
    Some(name)
}

/// Determine the byte width of a given opcode (by mnemonic), or
/// `None` if the mnemonic is unknown.  The width covers the opcode
/// byte itself plus all operand bytes, padded to the engine's word
/// alignment.  A mnemonic present in the name table but absent here
/// indicates a corrupted table and is treated as fatal by the
/// decoder.
pub fn instruction_width(name: &str) -> Option<usize> {
    let width = match name {
        "BREAK" => 4,
        "PUSH_CP" => 4,
        "PUSH_BT" => 8,
        "PUSH_REGISTER" => 4,
        "SET_REGISTER_TO_CP" => 8,
        "SET_CP_TO_REGISTER" => 4,
        "SET_REGISTER_TO_SP" => 4,
        "SET_SP_TO_REGISTER" => 4,
        "SET_REGISTER" => 8,
        "ADVANCE_REGISTER" => 8,
        "POP_CP" => 4,
        "POP_BT" => 4,
        "POP_REGISTER" => 4,
        "FAIL" => 4,
        "SUCCEED" => 4,
        "ADVANCE_CP" => 4,
        "GOTO" => 8,
        "LOAD_CURRENT_CHAR" => 8,
        "LOAD_CURRENT_CHAR_UNCHECKED" => 4,
        "LOAD_2_CURRENT_CHARS" => 8,
        "LOAD_2_CURRENT_CHARS_UNCHECKED" => 4,
        "LOAD_4_CURRENT_CHARS" => 8,
        "LOAD_4_CURRENT_CHARS_UNCHECKED" => 4,
        "CHECK_4_CHARS" => 12,
        "CHECK_CHAR" => 8,
        "CHECK_NOT_4_CHARS" => 12,
        "CHECK_NOT_CHAR" => 8,
        "AND_CHECK_4_CHARS" => 16,
        "AND_CHECK_CHAR" => 12,
        "AND_CHECK_NOT_4_CHARS" => 16,
        "AND_CHECK_NOT_CHAR" => 12,
        "MINUS_AND_CHECK_NOT_CHAR" => 12,
        "CHECK_CHAR_IN_RANGE" => 12,
        "CHECK_CHAR_NOT_IN_RANGE" => 12,
        "CHECK_BIT_IN_TABLE" => 24,
        "CHECK_LT" => 8,
        "CHECK_GT" => 8,
        "CHECK_NOT_BACK_REF" => 8,
        "CHECK_NOT_BACK_REF_NO_CASE" => 8,
        "CHECK_NOT_BACK_REF_NO_CASE_UNICODE" => 8,
        "CHECK_NOT_BACK_REF_BACKWARD" => 8,
        "CHECK_NOT_BACK_REF_NO_CASE_BACKWARD" => 8,
        "CHECK_NOT_BACK_REF_NO_CASE_UNICODE_BACKWARD" => 8,
        "CHECK_NOT_REGS_EQUAL" => 12,
        "CHECK_REGISTER_LT" => 12,
        "CHECK_REGISTER_GE" => 12,
        "CHECK_REGISTER_EQ_POS" => 8,
        "CHECK_AT_START" => 8,
        "CHECK_NOT_AT_START" => 8,
        "CHECK_GREEDY" => 8,
        "ADVANCE_CP_AND_GOTO" => 8,
        "SET_CURRENT_POSITION_FROM_END" => 4,
        "CHECK_CURRENT_POSITION" => 8,
        "SKIP_UNTIL_BIT_IN_TABLE" => 32,
        "SKIP_UNTIL_CHAR_AND" => 24,
        "SKIP_UNTIL_CHAR" => 16,
        "SKIP_UNTIL_CHAR_POS_CHECKED" => 20,
        "SKIP_UNTIL_CHAR_OR_CHAR" => 20,
        "SKIP_UNTIL_GT_OR_NOT_BIT_IN_TABLE" => 32,
        _ => {
            return None;
        }
    };
    Some(width)
}
