//! Property-based tests for bytecov.
//!
//! Method bodies are generated as sequences of 3-byte units so that any
//! unit index is a valid jump target.

#![allow(clippy::unwrap_used)]

use bytecov::classfile::{decode, encode, ClassBuilder, ClassModel, MethodBody};
use bytecov::config::InstrumentConfig;
use bytecov::coverage::{apply, plan, ClassIdentity, ControlFlowGraph, CounterStore, ProbeId, SegmentId, PROBE_LEN};
use proptest::prelude::*;
use std::collections::HashMap;

const NOP: u8 = 0x00;
const IFEQ: u8 = 0x99;
const GOTO: u8 = 0xa7;
const RETURN: u8 = 0xb1;

#[derive(Debug, Clone)]
enum Unit {
    Straight,
    Goto(usize),
    IfEq(usize),
    Return,
}

fn unit_strategy(len: usize) -> impl Strategy<Value = Unit> {
    prop_oneof![
        3 => Just(Unit::Straight),
        1 => (0..len).prop_map(Unit::Goto),
        2 => (0..len).prop_map(Unit::IfEq),
        1 => Just(Unit::Return),
    ]
}

fn body_strategy() -> impl Strategy<Value = Vec<Unit>> {
    (1usize..40).prop_flat_map(|len| proptest::collection::vec(unit_strategy(len), len))
}

fn assemble(units: &[Unit]) -> Vec<u8> {
    let mut code = Vec::with_capacity(units.len() * 3 + 1);
    for (i, unit) in units.iter().enumerate() {
        let delta = |target: usize| ((target as i32 - i as i32) * 3) as i16;
        match unit {
            Unit::Straight => code.extend_from_slice(&[NOP, NOP, NOP]),
            Unit::Goto(t) => {
                code.push(GOTO);
                code.extend_from_slice(&delta(*t).to_be_bytes());
            }
            Unit::IfEq(t) => {
                code.push(IFEQ);
                code.extend_from_slice(&delta(*t).to_be_bytes());
            }
            Unit::Return => code.extend_from_slice(&[RETURN, NOP, NOP]),
        }
    }
    code.push(RETURN);
    code
}

fn class_of(units: &[Unit]) -> ClassModel {
    let mut builder = ClassBuilder::new("demo/Generated").unwrap();
    builder
        .method(MethodBody::new("run", "()V").limits(1, 0).code(assemble(units)))
        .unwrap();
    builder.build()
}

proptest! {
    /// Blocks partition the instruction list in order, none empty.
    #[test]
    fn prop_blocks_partition_instructions(units in body_strategy()) {
        let class = class_of(&units);
        let code = class.methods[0].code().unwrap();
        let cfg = ControlFlowGraph::build(code);

        let mut next = 0;
        for block in cfg.blocks() {
            prop_assert_eq!(block.instructions.start, next);
            prop_assert!(!block.instructions.is_empty());
            prop_assert_eq!(block.start, code.instructions[block.instructions.start].offset);
            next = block.instructions.end;
        }
        prop_assert_eq!(next, code.instructions.len());
    }

    /// Every jump lands on a block start and every edge names a block.
    #[test]
    fn prop_targets_are_block_starts(units in body_strategy()) {
        let class = class_of(&units);
        let code = class.methods[0].code().unwrap();
        let cfg = ControlFlowGraph::build(code);

        for insn in &code.instructions {
            for target in insn.op.targets() {
                prop_assert!(cfg.block_at(target).is_some(), "target {} inside a block", target);
            }
        }
        for block in cfg.blocks() {
            for edge in &block.successors {
                prop_assert!(cfg.block(edge.target).is_some());
            }
            prop_assert!(block.successors.len() <= 2);
        }
    }

    /// One probe per block; the rewritten method grows by exactly the
    /// probes plus any widened jumps and decodes again.
    #[test]
    fn prop_injection_accounts_for_every_byte(units in body_strategy()) {
        let class = class_of(&units);
        let before = class.methods[0].code().unwrap().clone();
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let blocks = plan.planned[0].cfg.len();
        prop_assert_eq!(plan.probe_count(), blocks);

        let layout = &plan.planned[0].layout;
        let grown = PROBE_LEN as usize * blocks + 2 * layout.widened_count();
        prop_assert_eq!(layout.code_length() as usize, before.code_length() as usize + grown);

        let mut out = class.clone();
        apply(&mut out, &plan, SegmentId::new(0)).unwrap();
        let decoded = decode(&encode(&out).unwrap()).unwrap();
        let after = decoded.methods[0].code().unwrap();
        prop_assert_eq!(after.instructions.len(), before.instructions.len() + 3 * blocks);
        prop_assert_eq!(after.max_stack, before.max_stack + 2);
    }

    /// Counters equal the number of hits sent to them.
    #[test]
    fn prop_counters_match_hits(
        sizes in proptest::collection::vec(1usize..16, 1..6),
        hits in proptest::collection::vec((0usize..6, 0u32..16), 0..200),
    ) {
        let store = CounterStore::with_capacity(8);
        let segments: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, n)| store.allocate(&ClassIdentity::new(format!("demo/C{i}"), 0), *n).unwrap())
            .collect();

        let mut expected: HashMap<(usize, u32), u64> = HashMap::new();
        for (segment, probe) in &hits {
            let Some(target) = segments.get(*segment) else { continue };
            target.increment(ProbeId::new(*probe));
            if (*probe as usize) < target.len() {
                *expected.entry((*segment, *probe)).or_default() += 1;
            }
        }

        for (i, segment) in segments.iter().enumerate() {
            for probe in 0..segment.len() as u32 {
                let want = expected.get(&(i, probe)).copied().unwrap_or(0);
                prop_assert_eq!(segment.get(ProbeId::new(probe)), want);
            }
        }
    }
}
