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
use std::collections::BTreeSet;
use crate::bytecode::{Instruction, Op};

/// A basic block begins at:
///    1. The start of the program;
///    2. The destination of a goto;
///    3. The instruction following a goto;
///    4. The stored instruction pointer of a backtrack push;
///    5. The destination of a branching instruction.
///
/// Blocks are identified by a stable integer id assigned at
/// construction, and the edge sets (`successors`, `predecessors`,
/// `side_exits`) store ids rather than references.  This makes the
/// later merge pass -- which retires blocks and rewrites every
/// reference to them -- a straightforward scan.
pub type BlockId = usize;

/// An ordered, non-empty sequence of instructions with contiguous pc
/// values, together with its control-flow edges.  `side_exits` is
/// only ever populated by the extended-block merge pass; the basic
/// block builder leaves it empty.
#[derive(Clone, Debug)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) successors: BTreeSet<BlockId>,
    pub(crate) predecessors: BTreeSet<BlockId>,
    pub(crate) side_exits: BTreeSet<BlockId>,
}

impl Block {
    pub(crate) fn new(id: BlockId, instructions: Vec<Instruction>) -> Self {
        assert!(!instructions.is_empty(), "empty basic block");
        Block {
            id,
            instructions,
            successors: BTreeSet::new(),
            predecessors: BTreeSet::new(),
            side_exits: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the first instruction of this block.  Blocks are never
    /// empty, so this cannot fail.
    pub fn first(&self) -> &Instruction {
        &self.instructions[0]
    }

    /// Returns the last instruction of this block.
    pub fn last(&self) -> &Instruction {
        self.instructions.last().unwrap()
    }

    /// Returns the pc of the first instruction in this block.
    pub fn start_pc(&self) -> usize {
        self.first().pc
    }

    pub fn successors(&self) -> &BTreeSet<BlockId> {
        &self.successors
    }

    pub fn predecessors(&self) -> &BTreeSet<BlockId> {
        &self.predecessors
    }

    pub fn side_exits(&self) -> &BTreeSet<BlockId> {
        &self.side_exits
    }

    /// Determine whether a given address falls within this block.
    /// Observe that containment is judged against the pc of the
    /// _last instruction_ rather than the block's byte extent, so an
    /// address inside the final instruction's operands is not
    /// contained.
    pub fn contains_pc(&self, addr: usize) -> bool {
        self.first().pc <= addr && addr <= self.last().pc
    }
}

// ============================================================================
// Pseudo-edges
// ============================================================================

/// Collect the pseudo-edges `(src_pc, dst_pc)` induced by each
/// instruction's control-flow semantics.  A `None` source marks an
/// edge whose consumer is unknown at analysis time (the indirect
/// destinations of the backtrack stack); such edges contribute a
/// leader but are never wired.
pub(crate) fn branch_edges(program: &[Instruction]) -> Vec<(Option<usize>, usize)> {
    let mut edges = Vec::new();
    for insn in program {
        let fall_through = insn.fall_through();
        match &insn.op {
            Op::GoTo { target } | Op::AdvanceCpAndGoto { target, .. } => {
                edges.push((Some(insn.pc), *target));
                edges.push((Some(insn.pc), fall_through));
            }
            Op::PushBt { offset } => {
                // Not sure which pop will consume this just yet, but
                // the target will definitely need to be a leader.
                edges.push((None, *offset));
            }
            Op::PopBt | Op::Succeed | Op::Fail => {
                // The fall-through address must be a leader, though
                // how it is reached is unknown here.
                edges.push((None, fall_through));
            }
            Op::CheckChar { target, .. }
            | Op::CheckNotChar { target, .. }
            | Op::CheckCurrentPosition { target, .. }
            | Op::LoadCurrentChar { target, .. } => {
                edges.push((Some(insn.pc), *target));
                edges.push((Some(insn.pc), fall_through));
            }
            Op::SkipUntilBitInTable {
                match_target,
                fail_target,
                ..
            } => {
                edges.push((Some(insn.pc), *match_target));
                edges.push((Some(insn.pc), *fail_target));
                edges.push((Some(insn.pc), fall_through));
            }
            _ => {}
        }
    }
    edges
}

// ============================================================================
// Block construction
// ============================================================================

/// Decompose a program into its basic blocks, wiring the predecessor
/// and successor sets along the way.  The returned blocks are sorted
/// by starting pc and partition the program: every instruction
/// belongs to exactly one block.
pub fn basic_blocks(program: &[Instruction]) -> Vec<Block> {
    let edges = branch_edges(program);
    // The leader set is the set of all destination pcs.
    let leaders: BTreeSet<usize> = edges.iter().map(|(_, dst)| *dst).collect();
    // Break the blocks up.  A new block starts at every leader;
    // leaders at pc zero or beyond the end of the program simply
    // coincide with the boundaries already there.
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();
    for insn in program {
        if leaders.contains(&insn.pc) && !current.is_empty() {
            blocks.push(Block::new(blocks.len(), std::mem::take(&mut current)));
        }
        current.push(insn.clone());
    }
    if !current.is_empty() {
        blocks.push(Block::new(blocks.len(), current));
    }
    // Set predecessors / successors.  Edges whose endpoints fall
    // outside the program are dropped.
    for (src, dst) in &edges {
        let Some(src_pc) = src else {
            // We don't quite know how this leader can be reached.
            continue;
        };
        let src_block = block_at(&blocks, *src_pc);
        let dst_block = block_at(&blocks, *dst);
        if let (Some(s), Some(d)) = (src_block, dst_block) {
            // Ids coincide with list positions at construction time.
            blocks[s].successors.insert(d);
            blocks[d].predecessors.insert(s);
        }
    }
    blocks
}

/// Determine which block encloses a given address, if any.
pub fn block_at(blocks: &[Block], addr: usize) -> Option<BlockId> {
    blocks
        .iter()
        .find(|blk| blk.contains_pc(addr))
        .map(|blk| blk.id)
}

/// Locate the position of a block (by id) within a block list, or
/// `None` if the block has been retired.
pub(crate) fn block_index(blocks: &[Block], id: BlockId) -> Option<usize> {
    blocks.iter().position(|blk| blk.id == id)
}
