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
use super::{DecodeError, Instruction};

/// Decode an entire program from a packed byte buffer, starting at pc
/// zero and continuing to the end of the buffer.  The resulting pc
/// values form an arithmetic progression by instruction width, ending
/// exactly at the buffer length.
pub fn decode(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    let mut program = Vec::new();
    let mut pc = 0;
    while pc < bytes.len() {
        let (insn, next_pc) = Instruction::decode_one(bytes, pc)?;
        program.push(insn);
        pc = next_pc;
    }
    Ok(program)
}
