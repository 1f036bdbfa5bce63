#![allow(dead_code)]
use redoscope::bytecode::opcode;

/// A tiny assembler for constructing packed test programs.  Operand
/// layouts mirror the engine's encoding: the opcode byte shares its
/// word with a 24-bit immediate, and further operands follow as
/// little-endian words.
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    pub fn new() -> Self {
        Program { bytes: Vec::new() }
    }

    /// The pc at which the next emitted instruction will start.
    pub fn here(&self) -> usize {
        self.bytes.len()
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    // Word emitters

    fn tag(&mut self, op: u8, imm: i32) -> &mut Self {
        let word = ((imm as u32) << 8) | op as u32;
        self.bytes.extend(word.to_le_bytes());
        self
    }

    fn word(&mut self, value: u32) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    fn half(&mut self, value: u16) -> &mut Self {
        self.bytes.extend(value.to_le_bytes());
        self
    }

    // Instruction emitters

    pub fn push_bt(&mut self, offset: usize) -> &mut Self {
        self.tag(opcode::PUSH_BT, 0).word(offset as u32)
    }

    pub fn pop_bt(&mut self) -> &mut Self {
        self.tag(opcode::POP_BT, 0)
    }

    pub fn push_cp(&mut self) -> &mut Self {
        self.tag(opcode::PUSH_CP, 0)
    }

    pub fn pop_cp(&mut self) -> &mut Self {
        self.tag(opcode::POP_CP, 0)
    }

    pub fn goto(&mut self, target: usize) -> &mut Self {
        self.tag(opcode::GOTO, 0).word(target as u32)
    }

    pub fn advance_cp(&mut self, delta: i32) -> &mut Self {
        self.tag(opcode::ADVANCE_CP, delta)
    }

    pub fn advance_cp_and_goto(&mut self, advance: i32, target: usize) -> &mut Self {
        self.tag(opcode::ADVANCE_CP_AND_GOTO, advance)
            .word(target as u32)
    }

    pub fn check_char(&mut self, ch: char, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_CHAR, ch as i32).word(target as u32)
    }

    pub fn check_not_char(&mut self, ch: char, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_NOT_CHAR, ch as i32)
            .word(target as u32)
    }

    pub fn load_current_char(&mut self, delta: i32, target: usize) -> &mut Self {
        self.tag(opcode::LOAD_CURRENT_CHAR, delta).word(target as u32)
    }

    pub fn check_current_position(&mut self, delta: i32, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_CURRENT_POSITION, delta)
            .word(target as u32)
    }

    pub fn check_lt(&mut self, limit: u32, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_LT, limit as i32).word(target as u32)
    }

    pub fn check_gt(&mut self, limit: u32, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_GT, limit as i32).word(target as u32)
    }

    pub fn check_char_not_in_range(&mut self, from: u16, to: u16, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_CHAR_NOT_IN_RANGE, 0)
            .half(from)
            .half(to)
            .word(target as u32)
    }

    pub fn check_register_ge(&mut self, reg: i32, limit: u32, target: usize) -> &mut Self {
        self.tag(opcode::CHECK_REGISTER_GE, reg)
            .word(limit)
            .word(target as u32)
    }

    pub fn skip_until_bit_in_table(
        &mut self,
        load_offset: i32,
        num_advance: i16,
        bit_table: [u8; 16],
        match_target: usize,
        fail_target: usize,
    ) -> &mut Self {
        self.tag(opcode::SKIP_UNTIL_BIT_IN_TABLE, load_offset)
            .half(num_advance as u16)
            .half(0);
        self.bytes.extend(bit_table);
        self.word(match_target as u32).word(fail_target as u32)
    }

    pub fn succeed(&mut self) -> &mut Self {
        self.tag(opcode::SUCCEED, 0)
    }

    pub fn fail(&mut self) -> &mut Self {
        self.tag(opcode::FAIL, 0)
    }
}
