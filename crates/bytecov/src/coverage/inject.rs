//! Probe injection.
//!
//! Injection is split so the counter segment can be allocated between the
//! two halves: [`plan`] decides which methods and blocks get probes and lays
//! out the rewritten code, [`apply`] patches the class once the segment id
//! is known. Every probe is the same 9-byte, stack-neutral sequence
//!
//! ```text
//! ldc_w         #segment          ; Integer
//! sipush        probe             ; ldc_w #Integer above 32767
//! invokestatic  bridge.hit(II)V
//! ```
//!
//! so the layout never depends on the segment id.

use super::block::{ProbeId, SegmentId};
use super::cfg::{ControlFlowGraph, EdgeKind};
use super::counters::ClassIdentity;
use super::metadata::{BranchSite, ClassMetadataRecord, MethodRecord, MethodStatus, ProbeRecord};
use crate::classfile::code::MAX_CODE_LENGTH;
use crate::classfile::constpool::MAX_POOL_SLOTS;
use crate::classfile::model::access;
use crate::classfile::{
    opcodes, ClassModel, CodeAttribute, CodeModel, ConstantPool, Instruction, MethodModel, Op,
    VerificationType,
};
use crate::config::{Granularity, InstrumentConfig, ProbeBridge};
use crate::result::{BytecovError, BytecovResult};
use std::collections::BTreeSet;

/// Size of one probe sequence in bytes
pub const PROBE_LEN: u32 = 9;

/// Operand stack slots a probe needs
pub const PROBE_STACK: u16 = 2;

/// Largest probe index pushed with `sipush`
const SIPUSH_MAX: u32 = i16::MAX as u32;

/// Offsets of a method body after probe insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    old_offsets: Vec<u32>,
    old_length: u32,
    /// Where control enters instruction `i`: its probe, if it has one
    labels: Vec<u32>,
    /// New offset of instruction `i` itself
    positions: Vec<u32>,
    /// `goto`/`jsr` that had to become `goto_w`/`jsr_w`
    widened: Vec<bool>,
    code_length: u32,
}

impl Layout {
    /// Lay out `code` with a probe before every instruction flagged in
    /// `probed`, widening unconditional jumps until every branch fits
    pub fn compute(code: &CodeModel, probed: &[bool], location: &str) -> BytecovResult<Self> {
        let insns = &code.instructions;
        let mut widened = vec![false; insns.len()];
        loop {
            let mut labels = Vec::with_capacity(insns.len());
            let mut positions = Vec::with_capacity(insns.len());
            let mut pos = 0u32;
            for (i, insn) in insns.iter().enumerate() {
                labels.push(pos);
                if probed.get(i).copied().unwrap_or(false) {
                    pos += PROBE_LEN;
                }
                positions.push(pos);
                pos += if widened[i] { 5 } else { insn.op.encoded_len(pos) };
            }
            if pos > MAX_CODE_LENGTH {
                return Err(BytecovError::capacity(
                    "instrumented code length",
                    pos as usize,
                    MAX_CODE_LENGTH as usize,
                ));
            }

            let layout = Self {
                old_offsets: insns.iter().map(|insn| insn.offset).collect(),
                old_length: code.code_length(),
                labels,
                positions,
                widened: widened.clone(),
                code_length: pos,
            };

            let mut changed = false;
            for (i, insn) in insns.iter().enumerate() {
                let Op::Branch { opcode, target } = insn.op else {
                    continue;
                };
                if widened[i] || matches!(opcode, opcodes::GOTO_W | opcodes::JSR_W) {
                    continue;
                }
                let Some(to) = layout.label(target) else {
                    return Err(BytecovError::encode(format!("{location}: branch to unknown offset {target}")));
                };
                let delta = i64::from(to) - i64::from(layout.positions[i]);
                if i16::try_from(delta).is_ok() {
                    continue;
                }
                if matches!(opcode, opcodes::GOTO | opcodes::JSR) {
                    widened[i] = true;
                    changed = true;
                } else {
                    return Err(BytecovError::unsupported(
                        location,
                        format!(
                            "{} at {} cannot reach its target after instrumentation",
                            opcodes::mnemonic(opcode),
                            insn.offset
                        ),
                    ));
                }
            }
            if !changed {
                return Ok(layout);
            }
        }
    }

    fn index(&self, old: u32) -> Option<usize> {
        self.old_offsets.binary_search(&old).ok()
    }

    /// New offset control should reach for old offset `old`
    #[must_use]
    pub fn label(&self, old: u32) -> Option<u32> {
        self.index(old).map(|i| self.labels[i])
    }

    /// Like [`label`](Self::label), also mapping the old code end
    #[must_use]
    pub fn label_end(&self, old: u32) -> Option<u32> {
        if old == self.old_length {
            Some(self.code_length)
        } else {
            self.label(old)
        }
    }

    /// New offset of the instruction itself, past any probe
    #[must_use]
    pub fn position(&self, old: u32) -> Option<u32> {
        self.index(old).map(|i| self.positions[i])
    }

    #[must_use]
    pub const fn code_length(&self) -> u32 {
        self.code_length
    }

    /// Number of jumps widened to their 32-bit form
    #[must_use]
    pub fn widened_count(&self) -> usize {
        self.widened.iter().filter(|w| **w).count()
    }
}

/// Probe placement for one method
#[derive(Debug, Clone)]
pub struct MethodPlan {
    /// Index into the class's method list
    pub method: usize,
    pub cfg: ControlFlowGraph,
    /// Probe of each block, indexed by block
    pub block_probes: Vec<Option<ProbeId>>,
    /// Probe inserted before each instruction, indexed by instruction
    probe_before: Vec<Option<ProbeId>>,
    pub layout: Layout,
}

impl MethodPlan {
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.block_probes.iter().flatten().count()
    }
}

/// Result of planning a class
#[derive(Debug, Clone)]
pub struct ClassPlan {
    pub class_name: String,
    pub source_file: Option<String>,
    /// Status of every method, in declaration order
    pub methods: Vec<MethodRecord>,
    pub planned: Vec<MethodPlan>,
    pub probes: Vec<ProbeRecord>,
    pub branches: Vec<BranchSite>,
    bridge: ProbeBridge,
}

impl ClassPlan {
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Whether applying the plan would change nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Metadata describing this plan's probes
    #[must_use]
    pub fn metadata(&self, identity: ClassIdentity) -> ClassMetadataRecord {
        ClassMetadataRecord {
            identity,
            source_file: self.source_file.clone(),
            methods: self.methods.clone(),
            probes: self.probes.clone(),
            branches: self.branches.clone(),
        }
    }
}

fn eligibility(method: &MethodModel, pool: &ConstantPool, config: &InstrumentConfig) -> MethodStatus {
    if method.has_flag(access::ABSTRACT | access::NATIVE) || method.code().is_none() {
        return MethodStatus::NoCode;
    }
    if method.has_flag(access::SYNTHETIC | access::BRIDGE) {
        return MethodStatus::Synthetic;
    }
    if config.is_excluded(&method.name) {
        return MethodStatus::Excluded;
    }
    if let Some(skip) = &config.skip_annotation {
        match method.annotation_types(pool) {
            Ok(types) if types.iter().any(|t| t == skip) => return MethodStatus::SkipAnnotated,
            Ok(_) => {}
            Err(err) => return failed(&BytecovError::from(err)),
        }
    }
    MethodStatus::Instrumented
}

fn failed(err: &BytecovError) -> MethodStatus {
    MethodStatus::Failed {
        kind: err.kind(),
        reason: err.to_string(),
    }
}

/// Blocks that get a probe and the lines each probe accounts for
fn assign_probes(cfg: &ControlFlowGraph, granularity: Granularity) -> Vec<Option<Vec<u16>>> {
    match granularity {
        Granularity::BasicBlock => cfg.blocks().iter().map(|b| Some(b.lines.clone())).collect(),
        Granularity::Line => {
            let mut seen = BTreeSet::new();
            cfg.blocks()
                .iter()
                .map(|b| {
                    let fresh: Vec<u16> = b.lines.iter().copied().filter(|l| seen.insert(*l)).collect();
                    (b.lines.is_empty() || !fresh.is_empty()).then_some(fresh)
                })
                .collect()
        }
    }
}

struct Planned {
    plan: MethodPlan,
    probes: Vec<ProbeRecord>,
    branches: Vec<BranchSite>,
}

fn plan_method(
    index: usize,
    method: &MethodModel,
    code: &CodeModel,
    pool: &ConstantPool,
    first_probe: u32,
    config: &InstrumentConfig,
    location: &str,
) -> BytecovResult<Planned> {
    if let Some(name) = code.opaque_attributes(pool).next() {
        return Err(BytecovError::unsupported(
            location,
            format!("code attribute {name} may carry offsets"),
        ));
    }
    if u32::from(code.max_stack) + u32::from(PROBE_STACK) > u32::from(u16::MAX) {
        return Err(BytecovError::capacity(
            "max stack",
            usize::from(code.max_stack) + usize::from(PROBE_STACK),
            usize::from(u16::MAX),
        ));
    }

    let cfg = ControlFlowGraph::build(code);
    let assignment = assign_probes(&cfg, config.granularity);

    let mut block_probes = vec![None; cfg.len()];
    let mut probe_before = vec![None; code.instructions.len()];
    let mut probes = Vec::new();
    let mut next = first_probe;
    for (block, lines) in cfg.blocks().iter().zip(assignment) {
        let Some(lines) = lines else {
            continue;
        };
        let probe = ProbeId::new(next);
        next += 1;
        block_probes[block.id.index()] = Some(probe);
        probe_before[block.instructions.start] = Some(probe);
        probes.push(ProbeRecord {
            probe,
            method: index,
            block: block.id,
            terminator: block.terminator,
            lines,
        });
    }

    let probed: Vec<bool> = probe_before.iter().map(Option::is_some).collect();
    let layout = Layout::compute(code, &probed, location)?;

    let mut branches = Vec::new();
    if config.granularity == Granularity::BasicBlock {
        for block in cfg.blocks().iter().filter(|b| b.terminator.is_branch()) {
            let successors: Vec<ProbeId> = block
                .successors
                .iter()
                .filter(|e| e.kind != EdgeKind::Exception)
                .filter_map(|e| block_probes[e.target.index()])
                .collect();
            if successors.len() < 2 {
                continue;
            }
            let offset = block.last_offset(code);
            branches.push(BranchSite {
                method: index,
                offset,
                line: code.line_at(offset),
                successors,
            });
        }
    }

    tracing::trace!(
        method = %method.signature(),
        blocks = cfg.len(),
        probes = probes.len(),
        widened = layout.widened_count(),
        "planned method"
    );

    Ok(Planned {
        plan: MethodPlan {
            method: index,
            cfg,
            block_probes,
            probe_before,
            layout,
        },
        probes,
        branches,
    })
}

/// Decide probe placement for every eligible method of `class`.
///
/// Methods that cannot be instrumented are recorded with a `Failed`
/// status and left out of the plan. The only class-level failure is a
/// constant pool that cannot take the probe constants.
pub fn plan(class: &ClassModel, config: &InstrumentConfig) -> BytecovResult<ClassPlan> {
    let pool = &class.constant_pool;
    let mut methods = Vec::with_capacity(class.methods.len());
    let mut planned = Vec::new();
    let mut probes = Vec::new();
    let mut branches = Vec::new();

    for (index, method) in class.methods.iter().enumerate() {
        let mut status = eligibility(method, pool, config);
        if let (MethodStatus::Instrumented, Some(code)) = (&status, method.code()) {
            let location = format!("{}.{}", class.name, method.signature());
            match plan_method(index, method, code, pool, probes.len() as u32, config, &location) {
                Ok(done) => {
                    planned.push(done.plan);
                    probes.extend(done.probes);
                    branches.extend(done.branches);
                }
                Err(err) => {
                    tracing::debug!(method = %location, error = %err, "method left uninstrumented");
                    status = failed(&err);
                }
            }
        }
        methods.push(MethodRecord {
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            status,
        });
    }

    let wide_probes = probes.len().saturating_sub(SIPUSH_MAX as usize + 1);
    let needed = pool.count() + ConstantPool::worst_case_slots(1 + wide_probes);
    if !probes.is_empty() && needed > MAX_POOL_SLOTS {
        return Err(BytecovError::capacity("constant pool slots", needed, MAX_POOL_SLOTS));
    }

    Ok(ClassPlan {
        class_name: class.name.clone(),
        source_file: class.source_file(),
        methods,
        planned,
        probes,
        branches,
        bridge: config.bridge.clone(),
    })
}

fn probe_ops(pool: &mut ConstantPool, segment_const: u16, bridge_ref: u16, probe: ProbeId) -> BytecovResult<[Op; 3]> {
    let index_op = if probe.as_u32() <= SIPUSH_MAX {
        Op::Plain {
            opcode: opcodes::SIPUSH,
            operands: (probe.as_u32() as u16).to_be_bytes().to_vec(),
        }
    } else {
        Op::Plain {
            opcode: opcodes::LDC_W,
            operands: pool.add_integer(probe.as_u32() as i32)?.to_be_bytes().to_vec(),
        }
    };
    Ok([
        Op::Plain {
            opcode: opcodes::LDC_W,
            operands: segment_const.to_be_bytes().to_vec(),
        },
        index_op,
        Op::Invoke {
            opcode: opcodes::INVOKESTATIC,
            index: bridge_ref,
            count: 0,
        },
    ])
}

fn remap(value: Option<u32>, what: &str, old: u32) -> BytecovResult<u32> {
    value.ok_or_else(|| BytecovError::encode(format!("{what} at {old} is not an instruction boundary")))
}

fn narrow(value: u32, what: &str) -> BytecovResult<u16> {
    u16::try_from(value).map_err(|_| BytecovError::encode(format!("{what} {value} exceeds u16")))
}

fn rewrite_method(
    code: &mut CodeModel,
    plan: &MethodPlan,
    pool: &mut ConstantPool,
    segment_const: u16,
    bridge_ref: u16,
) -> BytecovResult<()> {
    let layout = &plan.layout;
    let mut instructions = Vec::with_capacity(code.instructions.len() + 3 * plan.probe_count());
    for (i, insn) in code.instructions.iter().enumerate() {
        if let Some(probe) = plan.probe_before[i] {
            let mut at = layout.labels[i];
            for op in probe_ops(pool, segment_const, bridge_ref, probe)? {
                let len = op.encoded_len(at);
                instructions.push(Instruction { offset: at, op });
                at += len;
            }
        }
        let mut op = insn.op.clone();
        let mut unmapped = None;
        op.map_targets(|target| {
            layout.label(target).unwrap_or_else(|| {
                unmapped = Some(target);
                target
            })
        });
        if let Some(target) = unmapped {
            return Err(BytecovError::encode(format!("jump target {target} has no new offset")));
        }
        if layout.widened[i] {
            if let Op::Branch { opcode, .. } = &mut op {
                *opcode = if *opcode == opcodes::JSR {
                    opcodes::JSR_W
                } else {
                    opcodes::GOTO_W
                };
            }
        }
        instructions.push(Instruction {
            offset: layout.positions[i],
            op,
        });
    }

    for handler in &mut code.handlers {
        handler.start = remap(layout.label(handler.start), "handler start", handler.start)?;
        handler.end = remap(layout.label_end(handler.end), "handler end", handler.end)?;
        handler.handler = remap(layout.label(handler.handler), "handler", handler.handler)?;
    }

    for attribute in &mut code.attributes {
        match attribute {
            CodeAttribute::LineNumbers { entries, .. } => {
                for entry in entries {
                    entry.start = remap(layout.label(entry.start), "line entry", entry.start)?;
                }
            }
            CodeAttribute::LocalVariables { entries, .. } => {
                for entry in entries {
                    let end = entry.start + entry.length;
                    let start = remap(layout.label(entry.start), "variable start", entry.start)?;
                    let new_end = remap(layout.label_end(end), "variable end", end)?;
                    entry.start = start;
                    entry.length = new_end - start;
                }
            }
            CodeAttribute::StackMap { frames, .. } => {
                for frame in frames.iter_mut() {
                    frame.offset = remap(layout.label(frame.offset), "frame", frame.offset)?;
                    for ty in frame.types_mut() {
                        if let VerificationType::Uninitialized(at) = ty {
                            let old = u32::from(*at);
                            *at = narrow(remap(layout.position(old), "new", old)?, "new offset")?;
                        }
                    }
                }
            }
            CodeAttribute::Other(_) => {
                return Err(BytecovError::encode("opaque code attribute in planned method"));
            }
        }
    }

    code.instructions = instructions;
    code.max_stack += PROBE_STACK;
    Ok(())
}

/// Rewrite `class` according to `plan`, with probes reporting to `segment`
pub fn apply(class: &mut ClassModel, plan: &ClassPlan, segment: SegmentId) -> BytecovResult<()> {
    if plan.is_empty() {
        return Ok(());
    }
    let ClassModel {
        constant_pool,
        methods,
        ..
    } = class;
    let bridge_ref = constant_pool.add_method_ref(&plan.bridge.owner, &plan.bridge.name, &plan.bridge.descriptor)?;
    let segment_const = constant_pool.add_integer(segment.as_u32() as i32)?;

    for method_plan in &plan.planned {
        if method_plan.probe_count() == 0 {
            continue;
        }
        let method = methods
            .get_mut(method_plan.method)
            .ok_or_else(|| BytecovError::encode(format!("planned method {} missing", method_plan.method)))?;
        let location = format!("{}.{}", plan.class_name, method.signature());
        let code = method
            .code_mut()
            .ok_or_else(|| BytecovError::encode(format!("{location} lost its code")))?;
        rewrite_method(code, method_plan, constant_pool, segment_const, bridge_ref)?;
    }
    Ok(())
}
