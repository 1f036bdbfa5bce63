use redoscope::analysis::{basic_blocks, extend, failing_blocks, Block};
use redoscope::bytecode::{decode, Op};

mod util;
use util::Program;

#[test]
fn test_extend_01() {
    // The canonical try-path: a backtrack push saves the FAIL arm,
    // then a character check either succeeds or falls into it.  The
    // merge absorbs SUCCEED into the entry block, recording the FAIL
    // block as a side exit.
    let mut asm = Program::new();
    asm.push_bt(16); // 0
    asm.check_char('a', 20); // 8
    let fail = asm.here(); // 16
    asm.fail();
    asm.succeed(); // 20
    let blocks = check_extend(&asm.finish());
    assert_eq!(blocks.len(), 2);
    // Blocks are sorted by pc, so the merged block comes first.
    let merged = &blocks[0];
    let names: Vec<&str> = merged.instructions().iter().map(|i| i.op.name()).collect();
    assert_eq!(names, vec!["PUSH_BT", "CHECK_CHAR", "SUCCEED"]);
    assert_eq!(merged.side_exits().len(), 1);
    let exit = *merged.side_exits().iter().next().unwrap();
    assert_eq!(blocks[1].id(), exit);
    assert_eq!(blocks[1].start_pc(), fail);
}

#[test]
fn test_extend_02() {
    // An unconditional chain collapses into one block.
    let mut asm = Program::new();
    asm.goto(8); // 0
    asm.goto(16); // 8
    asm.succeed(); // 16
    let blocks = check_extend(&asm.finish());
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].instructions().len(), 3);
    assert!(blocks[0].side_exits().is_empty());
}

#[test]
fn test_extend_03() {
    // A block ending in a backtrack pop is never the source of a
    // merge: its continuation is indirect.
    let mut asm = Program::new();
    asm.pop_bt(); // 0
    asm.succeed(); // 4
    let blocks = check_extend(&asm.finish());
    assert_eq!(blocks.len(), 2);
}

#[test]
fn test_extend_04() {
    // A control-flow join is never absorbed: both arms of the
    // diamond keep their own block.
    let mut asm = Program::new();
    asm.check_char('a', 20); // 0: branch to the right arm
    asm.advance_cp(1); // 8: left arm
    asm.goto(28); // 12
    asm.advance_cp(2); // 20: right arm
    asm.goto(28); // 24  (falls through anyway)
    asm.succeed(); // 28: join point
    let blocks = check_extend(&asm.finish());
    let join = blocks
        .iter()
        .find(|b| b.instructions().iter().any(|i| i.op == Op::Succeed))
        .unwrap();
    assert_eq!(join.instructions().len(), 1);
    assert!(join.predecessors().len() > 1);
}

#[test]
fn test_extend_05() {
    // When both successors fail there is no useful forward path, and
    // no merge happens.
    let mut asm = Program::new();
    asm.check_char('a', 16); // 0
    asm.fail(); // 8  (fall-through arm)
    let pad = asm.here();
    assert_eq!(pad, 12);
    asm.fail(); // 12 (padding so both arms are distinct blocks)
    asm.fail(); // 16 (branch arm)
    let blocks = check_extend(&asm.finish());
    let head = &blocks[0];
    assert_eq!(head.instructions().len(), 1);
    assert!(head.side_exits().is_empty());
}

#[test]
fn test_extend_06() {
    // Merging cascades: each merge produces a fresh block which is
    // re-examined, absorbing further down the chain.
    let mut asm = Program::new();
    asm.goto(8); // 0
    asm.goto(16); // 8
    asm.goto(24); // 16
    asm.succeed(); // 24
    let blocks = check_extend(&asm.finish());
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].instructions().len(), 4);
}

#[test]
fn test_failing_01() {
    // The failing closure follows unconditional chains backwards:
    // both gotos proceed to FAIL and nothing else, while the check
    // and SUCCEED stay out.
    let mut asm = Program::new();
    asm.check_char('a', 28); // 0: decision point, not failing
    asm.goto(16); // 8
    asm.goto(24); // 16
    asm.fail(); // 24
    asm.succeed(); // 28
    let program = decode(&asm.finish()).unwrap();
    let blocks = basic_blocks(&program);
    let failing = failing_blocks(&blocks);
    for block in &blocks {
        let fails = block
            .instructions()
            .iter()
            .any(|i| matches!(i.op, Op::Fail | Op::GoTo { .. }));
        assert_eq!(failing.contains(&block.id()), fails);
    }
}

#[test]
fn test_failing_02() {
    // An indirect jump is never considered failing: its destination
    // is unknown, however bleak its surroundings look.
    let mut asm = Program::new();
    asm.check_char('a', 12); // 0 -> leaders at 8 and 12
    asm.pop_bt(); // 8
    asm.fail(); // 12
    let program = decode(&asm.finish()).unwrap();
    let blocks = basic_blocks(&program);
    let failing = failing_blocks(&blocks);
    assert_eq!(failing.len(), 1);
    let fail_block = blocks
        .iter()
        .find(|b| matches!(b.last().op, Op::Fail))
        .unwrap();
    assert!(failing.contains(&fail_block.id()));
}

/// Decode, decompose, merge, and check the final invariant: every
/// reference from a surviving block resolves to a surviving block.
fn check_extend(bytes: &[u8]) -> Vec<Block> {
    let program = decode(bytes).unwrap();
    let blocks = extend(basic_blocks(&program));
    for block in &blocks {
        for id in block
            .successors()
            .iter()
            .chain(block.predecessors())
            .chain(block.side_exits())
        {
            assert!(blocks.iter().any(|b| b.id() == *id));
        }
    }
    blocks
}
