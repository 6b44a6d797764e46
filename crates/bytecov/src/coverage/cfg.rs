//! Control-flow graph over a decoded method body.
//!
//! Blocks live in one arena and refer to each other by [`BlockId`]. A block
//! starts at a leader (offset 0, a jump or switch target, a handler entry,
//! or the instruction after a block-ending instruction) and runs up to the
//! next leader.

use super::block::BlockId;
use crate::classfile::{opcodes, CodeModel, Instruction, Op};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

/// How control reaches a successor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Fallthrough,
    BranchTaken,
    Exception,
}

/// What ends a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    /// The next instruction is a leader
    Fallthrough,
    Conditional,
    Goto,
    Jsr,
    Switch,
    Return,
    Throw,
    Ret,
}

impl Terminator {
    fn of(op: &Op) -> Self {
        match op {
            Op::Plain { .. } | Op::Invoke { .. } => Self::Fallthrough,
            Op::Branch { opcode, .. } => match *opcode {
                opcodes::GOTO | opcodes::GOTO_W => Self::Goto,
                opcodes::JSR | opcodes::JSR_W => Self::Jsr,
                _ => Self::Conditional,
            },
            Op::Switch { .. } => Self::Switch,
            Op::Return { .. } => Self::Return,
            Op::Throw => Self::Throw,
            Op::Ret { .. } => Self::Ret,
        }
    }

    /// Whether the block chooses between several successors
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Conditional | Self::Switch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub target: BlockId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Offset of the first instruction
    pub start: u32,
    /// Offset one past the last instruction
    pub end: u32,
    /// Indices into the method's instruction list
    pub instructions: Range<usize>,
    /// Distinct source lines of the block's instructions, ascending
    pub lines: Vec<u16>,
    pub terminator: Terminator,
    pub successors: Vec<Edge>,
}

impl BasicBlock {
    /// Offset of the last instruction
    #[must_use]
    pub fn last_offset(&self, code: &CodeModel) -> u32 {
        code.instructions
            .get(self.instructions.end.saturating_sub(1))
            .map_or(self.start, |insn| insn.offset)
    }

    fn add_edge(&mut self, target: BlockId, kind: EdgeKind) {
        if !self.successors.iter().any(|edge| edge.target == target) {
            self.successors.push(Edge { target, kind });
        }
    }
}

/// Sorted `(start, line)` pairs for offset lookups
struct LineIndex(Vec<(u32, u16)>);

impl LineIndex {
    fn new(code: &CodeModel) -> Self {
        let mut entries: Vec<(u32, u16)> = code.line_numbers().map(|e| (e.start, e.line)).collect();
        entries.sort_unstable();
        Self(entries)
    }

    fn line_at(&self, offset: u32) -> Option<u16> {
        let upper = self.0.partition_point(|&(start, _)| start <= offset);
        upper.checked_sub(1).map(|i| self.0[i].1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
}

impl ControlFlowGraph {
    /// Build the graph of a method body
    #[must_use]
    pub fn build(code: &CodeModel) -> Self {
        let insns = &code.instructions;
        if insns.is_empty() {
            return Self::default();
        }

        let leaders = Self::leaders(code);
        let lines = LineIndex::new(code);

        let mut blocks: Vec<BasicBlock> = Vec::with_capacity(leaders.len());
        let mut first = 0usize;
        for (i, insn) in insns.iter().enumerate() {
            let last_in_block = insns.get(i + 1).map_or(true, |next| leaders.contains(&next.offset));
            if !last_in_block {
                continue;
            }
            let range = first..i + 1;
            let block_lines: BTreeSet<u16> = insns[range.clone()]
                .iter()
                .filter_map(|insn| lines.line_at(insn.offset))
                .collect();
            blocks.push(BasicBlock {
                id: BlockId::new(blocks.len() as u32),
                start: insns[first].offset,
                end: insn.end(),
                instructions: range,
                lines: block_lines.into_iter().collect(),
                terminator: Terminator::of(&insn.op),
                successors: Vec::new(),
            });
            first = i + 1;
        }

        let mut graph = Self { blocks };
        graph.link(insns);
        graph.link_handlers(code);
        graph
    }

    fn leaders(code: &CodeModel) -> BTreeSet<u32> {
        let insns = &code.instructions;
        let mut leaders = BTreeSet::new();
        leaders.insert(insns[0].offset);
        for (i, insn) in insns.iter().enumerate() {
            leaders.extend(insn.op.targets());
            if insn.op.ends_block() {
                if let Some(next) = insns.get(i + 1) {
                    leaders.insert(next.offset);
                }
            }
        }
        leaders.extend(code.handlers.iter().map(|h| h.handler));
        leaders
    }

    fn link(&mut self, insns: &[Instruction]) {
        for index in 0..self.blocks.len() {
            let block = &self.blocks[index];
            let Some(last) = insns.get(block.instructions.end - 1) else {
                continue;
            };
            let next = self.blocks.get(index + 1).map(|b| b.id);
            let mut edges: Vec<(BlockId, EdgeKind)> = last
                .op
                .targets()
                .into_iter()
                .filter_map(|target| self.block_at(target))
                .map(|target| (target, EdgeKind::BranchTaken))
                .collect();
            if last.op.falls_through() {
                edges.extend(next.map(|n| (n, EdgeKind::Fallthrough)));
            }
            let block = &mut self.blocks[index];
            for (target, kind) in edges {
                block.add_edge(target, kind);
            }
        }
    }

    fn link_handlers(&mut self, code: &CodeModel) {
        for handler in &code.handlers {
            let Some(target) = self.block_at(handler.handler) else {
                continue;
            };
            for block in &mut self.blocks {
                if block.start < handler.end && handler.start < block.end {
                    block.add_edge(target, EdgeKind::Exception);
                }
            }
        }
    }

    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// Block whose first instruction is at `offset`
    #[must_use]
    pub fn block_at(&self, offset: u32) -> Option<BlockId> {
        self.blocks
            .binary_search_by_key(&offset, |b| b.start)
            .ok()
            .map(|i| self.blocks[i].id)
    }

    /// Block containing the instruction at `offset`
    #[must_use]
    pub fn block_containing(&self, offset: u32) -> Option<BlockId> {
        let upper = self.blocks.partition_point(|b| b.start <= offset);
        let block = self.blocks.get(upper.checked_sub(1)?)?;
        (offset < block.end).then_some(block.id)
    }

    /// Blocks with an edge to `id`
    #[must_use]
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.successors.iter().any(|e| e.target == id))
            .map(|b| b.id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.blocks.iter().map(|b| b.successors.len()).sum()
    }
}
