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
use log::debug;
use crate::bytecode::Op;
use super::{block_at, block_index, Block, BlockId};

/// Merges basic blocks `A`, `B` where traversing `A -> B` is
/// unconditional modulo explicit failure paths.  That is, where:
///
/// 1. `A != B`, and
/// 2. `B` is not itself a live merge root, and
/// 3. `B` has no predecessor other than `A` (never merge across a
///    control-flow join), and
/// 4. one of the following applies:
///    a. `A` is succeeded by `B` unconditionally, or
///    b. `A`'s successors are exactly `B` and some `E` which proceeds
///       directly to failure, unconditionally.  `E` is recorded as a
///       _side exit_ of the merged block.
///
/// The regexp VM brackets each backtracking attempt between a push
/// and a pop of the backtrack stack; between them the engine runs a
/// straight-line attempt that either leaves via its normal exit or is
/// routed to a failure block.  Absorbing the failure continuation
/// into the parent lets downstream analyses treat an entire try-path
/// as one linear entity, which is the unit that matters for
/// catastrophic-backtracking detection.
pub fn extend(mut blocks: Vec<Block>) -> Vec<Block> {
    if blocks.is_empty() {
        return blocks;
    }
    let mut failing = failing_blocks(&blocks);
    let mut next_id = blocks.iter().map(|b| b.id).max().unwrap() + 1;
    // First, find the roots from which execution traces start: the
    // program entry point, plus the stored target of every backtrack
    // push anywhere in the program.
    let mut roots: BTreeSet<BlockId> = BTreeSet::new();
    roots.insert(blocks[0].id);
    for block in &blocks {
        for insn in &block.instructions {
            if let Op::PushBt { offset } = insn.op {
                let target = block_at(&blocks, offset).expect("backtrack target outside program");
                roots.insert(target);
            }
        }
    }
    // Work the roots to a fixed point: each merge produces a fresh
    // block which goes back on the list for further merging.
    let mut work_list: Vec<BlockId> = roots.into_iter().collect();
    while let Some(root) = work_list.pop() {
        let Some(root_ix) = block_index(&blocks, root) else {
            // Ignore orphans retired by an earlier merge.
            continue;
        };
        let root_block = &blocks[root_ix];
        if matches!(root_block.last().op, Op::PopBt) {
            // An indirect jump; we cannot reason about continuation.
            continue;
        }
        // Choose the block to merge with, plus any side exit.
        let (merge_with, side_exit) = match root_block.successors.len() {
            1 => {
                // Unconditional jump, can always merge.
                (*root_block.successors.iter().next().unwrap(), None)
            }
            2 => {
                let mut it = root_block.successors.iter();
                let s1 = *it.next().unwrap();
                let s2 = *it.next().unwrap();
                match (failing.contains(&s1), failing.contains(&s2)) {
                    (true, false) => (s2, Some(s1)),
                    (false, true) => (s1, Some(s2)),
                    // Neither successor fails: a genuine decision
                    // point.  Both fail: no useful forward path.
                    _ => continue,
                }
            }
            // A multi-decision node of sorts, or a dead end.
            _ => continue,
        };
        if merge_with == root {
            // No self-merges.
            continue;
        }
        if work_list.contains(&merge_with) {
            // Do not merge with other live roots.
            continue;
        }
        let merge_ix = block_index(&blocks, merge_with).expect("dangling successor");
        if blocks[merge_ix].predecessors.len() > 1 {
            // Do not merge across control-flow joins.
            continue;
        }
        //
        // Perform the merge.
        //
        let root_block = blocks[root_ix].clone();
        let merge_block = blocks[merge_ix].clone();
        debug!(
            "merging block {:#x} with {:#x}",
            root_block.start_pc(),
            merge_block.start_pc()
        );
        let id = next_id;
        next_id += 1;
        let mut instructions = root_block.instructions;
        instructions.extend(merge_block.instructions);
        let mut merged = Block::new(id, instructions);
        merged.successors = merge_block.successors;
        merged.predecessors = root_block.predecessors;
        merged.side_exits = root_block.side_exits;
        if let Some(exit) = side_exit {
            merged.side_exits.insert(exit);
        }
        // Retire the two originals and rewrite every reference to
        // them -- including any inside the replacement itself, which
        // arise when the pair formed a loop.
        blocks.retain(|b| b.id != root && b.id != merge_with);
        blocks.push(merged);
        for block in blocks.iter_mut() {
            replace_id(&mut block.successors, root, merge_with, id);
            replace_id(&mut block.predecessors, root, merge_with, id);
            replace_id(&mut block.side_exits, root, merge_with, id);
        }
        let was_failing = failing.remove(&root) | failing.remove(&merge_with);
        if was_failing {
            failing.insert(id);
        }
        // The fresh block goes back on the work list for analysis.
        work_list.push(id);
    }
    blocks.sort_by_key(|b| b.start_pc());
    // Every reference from a surviving block must point to a block
    // still present in the list.
    for block in &blocks {
        for id in block
            .successors
            .iter()
            .chain(&block.predecessors)
            .chain(&block.side_exits)
        {
            assert!(
                block_index(&blocks, *id).is_some(),
                "dangling block reference after merge"
            );
        }
    }
    blocks
}

/// Substitute two retired block ids with their replacement within a
/// single edge set.
fn replace_id(set: &mut BTreeSet<BlockId>, a: BlockId, b: BlockId, replacement: BlockId) {
    if set.remove(&a) | set.remove(&b) {
        set.insert(replacement);
    }
}

// ============================================================================
// Failing-block closure
// ============================================================================

/// Identify all basic blocks which unconditionally proceed to
/// matching failure.  Seeded with every block whose last instruction
/// is `FAIL`, then closed under "all successors fail" -- except that
/// a block ending in a backtrack pop is never absorbed, since its
/// actual destination is unknown.
pub fn failing_blocks(blocks: &[Block]) -> BTreeSet<BlockId> {
    let mut failing: BTreeSet<BlockId> = blocks
        .iter()
        .filter(|block| matches!(block.last().op, Op::Fail))
        .map(|block| block.id)
        .collect();
    loop {
        let mut changed = false;
        for block in blocks {
            if failing.contains(&block.id) {
                continue;
            }
            if matches!(block.last().op, Op::PopBt) {
                continue;
            }
            if block.successors.is_empty() {
                continue;
            }
            if block.successors.iter().all(|s| failing.contains(s)) {
                failing.insert(block.id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    failing
}
