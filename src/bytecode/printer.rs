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
use super::Instruction;

/// Produce a disassembly listing for a given program, one line per
/// instruction of the form `<addr>  <mnemonic>  {field: value, ...}`.
/// Addresses are right-justified and mnemonics left-justified so the
/// operand column lines up.  There is no stability guarantee for this
/// format beyond round-trip of the decoder.
pub fn pretty_print(program: &[Instruction]) -> String {
    let mut out = String::new();
    if program.is_empty() {
        return out;
    }
    // Column widths follow the widest entry in the listing.
    let max_addr = program.iter().map(|i| i.pc).max().unwrap();
    let addr_width = format!("{:#x}", max_addr).len();
    let name_width = program.iter().map(|i| i.op.name().len()).max().unwrap();
    //
    for insn in program {
        let addr = format!("{:#x}", insn.pc);
        let line = format!(
            "{:>aw$}  {:<nw$}  {}",
            addr,
            insn.op.name(),
            Operands(insn),
            aw = addr_width,
            nw = name_width
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Adapter which renders just the operand fields of an instruction.
struct Operands<'a>(&'a Instruction);

impl fmt::Display for Operands<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.write_operands(f)
    }
}
