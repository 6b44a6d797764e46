//! Inspect command handler

use crate::commands::{InspectArgs, InspectFormat};
use crate::config::CliConfig;
use crate::error::CliResult;
use bytecov::classfile::{self, ClassModel};
use bytecov::config::InstrumentConfig;
use bytecov::coverage::{
    plan, BasicBlock, BlockId, ControlFlowGraph, Edge, EdgeKind, MethodStatus, ProbeId, Terminator,
};
use serde::Serialize;

/// One basic block as shown by `inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockView {
    pub id: BlockId,
    pub start: u32,
    pub end: u32,
    pub lines: Vec<u16>,
    pub terminator: Terminator,
    pub successors: Vec<Edge>,
    pub probe: Option<ProbeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodInspection {
    pub name: String,
    pub descriptor: String,
    #[serde(flatten)]
    pub status: MethodStatus,
    pub code_length: Option<u32>,
    /// Code length once probes are in place
    pub instrumented_length: Option<u32>,
    pub blocks: Vec<BlockView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassInspection {
    pub class: String,
    pub source_file: Option<String>,
    pub probes: usize,
    pub branch_sites: usize,
    pub methods: Vec<MethodInspection>,
}

/// Execute the inspect command
pub fn execute_inspect(config: &CliConfig, args: &InspectArgs) -> CliResult<()> {
    let bytes = std::fs::read(&args.input)?;
    let class = classfile::decode(&bytes)?;
    let mut instrument = config.instrument.clone();
    if let Some(granularity) = args.granularity {
        instrument.granularity = granularity.into();
    }

    let mut inspection = inspect_class(&class, &instrument)?;
    if let Some(name) = &args.method {
        inspection.methods.retain(|m| &m.name == name);
    }

    match args.format {
        InspectFormat::Json => println!("{}", serde_json::to_string_pretty(&inspection)?),
        InspectFormat::Text => print!("{}", render_inspection(&inspection)),
    }
    Ok(())
}

fn block_view(block: &BasicBlock, probe: Option<ProbeId>) -> BlockView {
    BlockView {
        id: block.id,
        start: block.start,
        end: block.end,
        lines: block.lines.clone(),
        terminator: block.terminator,
        successors: block.successors.clone(),
        probe,
    }
}

/// Plan `class` under `config` and describe every method.
///
/// Methods that are not instrumented still list their blocks, without
/// probes.
pub fn inspect_class(class: &ClassModel, config: &InstrumentConfig) -> CliResult<ClassInspection> {
    let plan = plan(class, config)?;
    let methods = plan
        .methods
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let code = class.methods.get(index).and_then(|m| m.code());
            let planned = plan.planned.iter().find(|p| p.method == index);
            let blocks = match (planned, code) {
                (Some(planned), _) => planned
                    .cfg
                    .blocks()
                    .iter()
                    .zip(&planned.block_probes)
                    .map(|(block, probe)| block_view(block, *probe))
                    .collect(),
                (None, Some(code)) => ControlFlowGraph::build(code)
                    .blocks()
                    .iter()
                    .map(|block| block_view(block, None))
                    .collect(),
                (None, None) => Vec::new(),
            };
            MethodInspection {
                name: record.name.clone(),
                descriptor: record.descriptor.clone(),
                status: record.status.clone(),
                code_length: code.map(|c| c.code_length()),
                instrumented_length: planned.map(|p| p.layout.code_length()),
                blocks,
            }
        })
        .collect();
    Ok(ClassInspection {
        class: plan.class_name.clone(),
        source_file: plan.source_file.clone(),
        probes: plan.probe_count(),
        branch_sites: plan.branches.len(),
        methods,
    })
}

const fn edge_label(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Fallthrough => "fallthrough",
        EdgeKind::BranchTaken => "taken",
        EdgeKind::Exception => "handler",
    }
}

const fn terminator_label(terminator: Terminator) -> &'static str {
    match terminator {
        Terminator::Fallthrough => "fallthrough",
        Terminator::Conditional => "conditional",
        Terminator::Goto => "goto",
        Terminator::Jsr => "jsr",
        Terminator::Switch => "switch",
        Terminator::Return => "return",
        Terminator::Throw => "throw",
        Terminator::Ret => "ret",
    }
}

/// Render an inspection as an indented listing
#[must_use]
pub fn render_inspection(inspection: &ClassInspection) -> String {
    let mut out = format!("class {}", inspection.class);
    if let Some(source) = &inspection.source_file {
        out.push_str(&format!(" ({source})"));
    }
    out.push_str(&format!(
        ": {} probes, {} branch sites\n",
        inspection.probes, inspection.branch_sites
    ));

    for method in &inspection.methods {
        out.push_str(&format!(
            "\n  {}{} [{}]",
            method.name,
            method.descriptor,
            super::instrument::status_label(&method.status)
        ));
        match (method.code_length, method.instrumented_length) {
            (Some(before), Some(after)) => out.push_str(&format!(" {before} -> {after} bytes")),
            (Some(before), None) => out.push_str(&format!(" {before} bytes")),
            _ => {}
        }
        out.push('\n');

        for block in &method.blocks {
            out.push_str(&format!(
                "    {} [{}, {}) {}",
                block.id,
                block.start,
                block.end,
                terminator_label(block.terminator)
            ));
            if !block.lines.is_empty() {
                let lines: Vec<String> = block.lines.iter().map(ToString::to_string).collect();
                out.push_str(&format!(" lines {}", lines.join(",")));
            }
            if !block.successors.is_empty() {
                let edges: Vec<String> = block
                    .successors
                    .iter()
                    .map(|e| format!("{} ({})", e.target, edge_label(e.kind)))
                    .collect();
                out.push_str(&format!(" -> {}", edges.join(", ")));
            }
            if let Some(probe) = block.probe {
                out.push_str(&format!("  {probe}"));
            }
            out.push('\n');
        }
    }
    out
}
