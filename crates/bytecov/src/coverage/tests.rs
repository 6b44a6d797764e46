//! Tests for planning, injection and aggregation
//!
//! Each test states one falsifiable claim about how probes are placed,
//! where rewritten offsets land, or what the report says about counts.

#![allow(clippy::redundant_clone, clippy::float_cmp, clippy::unwrap_used)]

use super::*;
use crate::classfile::opcodes::*;
use crate::classfile::{
    access, decode, encode, ClassBuilder, ClassModel, CodeAttribute, FrameKind, MethodBody, Op, StackMapFrame,
    VerificationType,
};
use crate::config::{Granularity, InstrumentConfig};
use crate::result::ErrorKind;
use std::sync::Arc;

const IF_ICMPLE: u8 = 0xa4;
const ILOAD_0: u8 = 0x1a;
const ILOAD_1: u8 = 0x1b;

fn class_with(bodies: Vec<MethodBody>) -> ClassModel {
    let mut builder = ClassBuilder::new("demo/Subject").unwrap();
    builder.source_file("Subject.java").unwrap();
    for body in bodies {
        builder.method(body).unwrap();
    }
    builder.build()
}

/// `max(a, b)`: 0 iload_0, 1 iload_1, 2 if_icmple 7, 5 iload_0, 6 ireturn,
/// 7 iload_1, 8 ireturn; one line per block
fn max_method() -> MethodBody {
    MethodBody::new("max", "(II)I")
        .limits(2, 2)
        .code([ILOAD_0, ILOAD_1, IF_ICMPLE, 0, 5, ILOAD_0, IRETURN, ILOAD_1, IRETURN])
        .line(0, 3)
        .line(5, 4)
        .line(7, 5)
        .frame(StackMapFrame {
            offset: 7,
            kind: FrameKind::Same,
        })
}

fn answer_method() -> MethodBody {
    MethodBody::new("answer", "()I")
        .limits(1, 0)
        .code([BIPUSH, 42, IRETURN])
        .line(0, 7)
}

fn instrumented(class: &ClassModel, config: &InstrumentConfig, segment: u32) -> (ClassPlan, ClassModel) {
    let plan = plan(class, config).unwrap();
    let mut out = class.clone();
    apply(&mut out, &plan, SegmentId::new(segment)).unwrap();
    let bytes = encode(&out).unwrap();
    (plan, decode(&bytes).unwrap())
}

mod block_id_tests {
    use super::*;

    /// Index types display with distinct prefixes
    #[test]
    fn test_index_display() {
        assert_eq!(BlockId::new(3).to_string(), "B3");
        assert_eq!(ProbeId::new(3).to_string(), "P3");
        assert_eq!(SegmentId::new(3).to_string(), "S3");
    }

    /// Index types order by value and serialize as bare numbers
    #[test]
    fn test_index_ordering_and_serde() {
        assert!(ProbeId::new(1) < ProbeId::new(2));
        assert_eq!(serde_json::to_string(&ProbeId::new(9)).unwrap(), "9");
    }
}

mod plan_tests {
    use super::*;

    /// A straight-line method gets one probe carrying its line
    #[test]
    fn test_single_block_single_probe() {
        let class = class_with(vec![answer_method()]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        assert_eq!(plan.probe_count(), 1);
        assert_eq!(plan.probes[0].lines, vec![7]);
        assert_eq!(plan.probes[0].terminator, Terminator::Return);
        assert!(plan.branches.is_empty());
        assert_eq!(plan.source_file.as_deref(), Some("Subject.java"));
    }

    /// Probe ids are dense across methods in declaration order
    #[test]
    fn test_probe_ids_are_dense_across_methods() {
        let class = class_with(vec![max_method(), answer_method()]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let ids: Vec<u32> = plan.probes.iter().map(|p| p.probe.as_u32()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(plan.probes[3].method, 1);
    }

    /// A conditional yields a branch site whose taken probe comes first
    #[test]
    fn test_conditional_branch_site() {
        let class = class_with(vec![max_method()]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        assert_eq!(plan.branches.len(), 1);
        let site = &plan.branches[0];
        assert_eq!(site.offset, 2);
        assert_eq!(site.line, Some(3));
        assert_eq!(site.successors, vec![ProbeId::new(2), ProbeId::new(1)]);
    }

    /// Abstract, native, synthetic, excluded and opted-out methods are
    /// recorded but not probed
    #[test]
    fn test_method_eligibility() {
        let class = class_with(vec![
            MethodBody::new("nativeCall", "()V").access(access::PUBLIC | access::NATIVE),
            MethodBody::new("shape", "()V").access(access::PUBLIC | access::ABSTRACT),
            MethodBody::new("lambda$0", "()I")
                .access(access::PRIVATE | access::STATIC | access::SYNTHETIC)
                .limits(1, 0)
                .code([ICONST_0, IRETURN]),
            MethodBody::new("<clinit>", "()V").limits(0, 0).code([RETURN]),
            MethodBody::new("quiet", "()V")
                .limits(0, 0)
                .code([RETURN])
                .annotated(crate::config::DEFAULT_SKIP_ANNOTATION),
            answer_method(),
        ]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let statuses: Vec<&MethodStatus> = plan.methods.iter().map(|m| &m.status).collect();
        assert_eq!(
            statuses,
            vec![
                &MethodStatus::NoCode,
                &MethodStatus::NoCode,
                &MethodStatus::Synthetic,
                &MethodStatus::Excluded,
                &MethodStatus::SkipAnnotated,
                &MethodStatus::Instrumented,
            ]
        );
        assert_eq!(plan.probe_count(), 1);
        assert_eq!(plan.planned.len(), 1);
        assert_eq!(plan.planned[0].method, 5);
    }

    /// Clearing the skip annotation instruments annotated methods
    #[test]
    fn test_skip_annotation_disabled() {
        let class = class_with(vec![MethodBody::new("quiet", "()V")
            .limits(0, 0)
            .code([RETURN])
            .annotated(crate::config::DEFAULT_SKIP_ANNOTATION)]);
        let config = InstrumentConfig::builder().skip_annotation(None).build();
        let plan = plan(&class, &config).unwrap();
        assert_eq!(plan.methods[0].status, MethodStatus::Instrumented);
    }

    /// A method whose stack cannot grow by the probe's needs is skipped,
    /// siblings are still planned
    #[test]
    fn test_max_stack_overflow_fails_method_only() {
        let class = class_with(vec![
            MethodBody::new("deep", "()I").limits(u16::MAX - 1, 0).code([ICONST_0, IRETURN]),
            answer_method(),
        ]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        assert!(matches!(
            plan.methods[0].status,
            MethodStatus::Failed {
                kind: ErrorKind::Capacity,
                ..
            }
        ));
        assert_eq!(plan.methods[1].status, MethodStatus::Instrumented);
        assert_eq!(plan.probe_count(), 1);
    }

    /// A method that fits before rewriting but outgrows the code length
    /// limit afterwards is skipped, siblings are still planned
    #[test]
    fn test_code_length_overflow_fails_method_only() {
        // 6000 `goto +3` make 6001 blocks: 18_001 bytes before, 72_010 after
        let mut code: Vec<u8> = [GOTO, 0, 3].repeat(6000);
        code.push(RETURN);
        let class = class_with(vec![
            MethodBody::new("long", "()V").limits(0, 0).code(code),
            answer_method(),
        ]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        match &plan.methods[0].status {
            MethodStatus::Failed { kind, reason } => {
                assert_eq!(*kind, ErrorKind::Capacity);
                assert!(reason.contains("code length"), "{reason}");
            }
            other => panic!("expected a capacity failure, got {other:?}"),
        }
        assert_eq!(plan.methods[1].status, MethodStatus::Instrumented);
        assert_eq!(plan.planned.len(), 1);

        let (_, out) = instrumented(&class, &InstrumentConfig::default(), 0);
        assert_eq!(
            out.methods[0].code().unwrap().instructions,
            class.methods[0].code().unwrap().instructions
        );
    }

    /// Line granularity puts one probe on the first block of each line
    #[test]
    fn test_line_granularity() {
        // The whole of max() on one line, plus an unlined trailing block
        let class = class_with(vec![MethodBody::new("max", "(II)I")
            .limits(2, 2)
            .code([ILOAD_0, ILOAD_1, IF_ICMPLE, 0, 5, ILOAD_0, IRETURN, ILOAD_1, IRETURN])
            .line(0, 3)]);
        let config = InstrumentConfig::builder().granularity(Granularity::Line).build();
        let plan = plan(&class, &config).unwrap();
        assert_eq!(plan.probe_count(), 1);
        assert_eq!(plan.probes[0].lines, vec![3]);
        assert!(plan.branches.is_empty());

        let unlined = class_with(vec![MethodBody::new("max", "(II)I")
            .limits(2, 2)
            .code([ILOAD_0, ILOAD_1, IF_ICMPLE, 0, 5, ILOAD_0, IRETURN, ILOAD_1, IRETURN])]);
        let plan = super::plan(&unlined, &config).unwrap();
        assert_eq!(plan.probe_count(), 3);
        assert!(plan.probes.iter().all(|p| p.lines.is_empty()));
    }

    /// A conditional pushed out of 16-bit range makes the method unsupported
    #[test]
    fn test_conditional_out_of_range_is_unsupported() {
        // 0 iconst_0, 1 ifeq 32766, 4.. nops, 32766 return
        let mut code = vec![ICONST_0, IFEQ];
        code.extend_from_slice(&32765i16.to_be_bytes());
        code.resize(32766, NOP);
        code.push(RETURN);
        let class = class_with(vec![MethodBody::new("far", "()V").limits(1, 0).code(code)]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        assert!(matches!(
            plan.methods[0].status,
            MethodStatus::Failed {
                kind: ErrorKind::UnsupportedConstruct,
                ..
            }
        ));
        assert!(plan.is_empty());
    }

    /// Plan metadata carries the identity it is given
    #[test]
    fn test_metadata_from_plan() {
        let class = class_with(vec![max_method()]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let record = plan.metadata(ClassIdentity::new("demo/Subject", 7));
        assert_eq!(record.identity.digest, 7);
        assert_eq!(record.probe_count(), 3);
        assert_eq!(record.method_probes(0).count(), 3);
        assert_eq!(record.methods[0].name, "max");
    }
}

mod apply_tests {
    use super::*;

    fn code_of(class: &ClassModel, method: usize) -> &crate::classfile::CodeModel {
        class.methods[method].code().unwrap()
    }

    /// Each probe is ldc_w segment, sipush probe, invokestatic bridge
    #[test]
    fn test_probe_sequence_shape() {
        let class = class_with(vec![answer_method()]);
        let (_, out) = instrumented(&class, &InstrumentConfig::default(), 5);
        let code = code_of(&out, 0);
        let offsets: Vec<u32> = code.instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 3, 6, 9, 11]);
        assert_eq!(code.max_stack, 1 + PROBE_STACK);

        let Op::Plain { opcode, operands } = &code.instructions[0].op else {
            panic!("expected ldc_w");
        };
        assert_eq!(*opcode, LDC_W);
        let index = u16::from_be_bytes([operands[0], operands[1]]);
        assert_eq!(
            out.constant_pool.get(index),
            Some(&crate::classfile::Constant::Integer(5))
        );
        assert!(matches!(
            &code.instructions[1].op,
            Op::Plain { opcode: SIPUSH, operands } if operands == &vec![0, 0]
        ));
        assert!(matches!(
            code.instructions[2].op,
            Op::Invoke {
                opcode: INVOKESTATIC,
                ..
            }
        ));
    }

    /// Branch targets, line entries and frames move to the probe before
    /// their instruction
    #[test]
    fn test_offsets_remapped() {
        let class = class_with(vec![max_method()]);
        let (plan, out) = instrumented(&class, &InstrumentConfig::default(), 0);
        let layout = &plan.planned[0].layout;
        assert_eq!(layout.label(7), Some(25));
        assert_eq!(layout.position(7), Some(34));
        assert_eq!(layout.code_length(), 36);

        let code = code_of(&out, 0);
        let branch = code.instructions.iter().find(|i| i.op.opcode() == IF_ICMPLE).unwrap();
        assert_eq!(branch.offset, 11);
        assert_eq!(branch.op.targets(), vec![25]);

        let lines: Vec<(u32, u16)> = code.line_numbers().map(|e| (e.start, e.line)).collect();
        assert_eq!(lines, vec![(0, 3), (14, 4), (25, 5)]);

        let frames = code
            .attributes
            .iter()
            .find_map(|a| match a {
                CodeAttribute::StackMap { frames, .. } => Some(frames.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(frames[0].offset, 25);
    }

    /// A handler range and its entry are remapped; the range end maps to
    /// the new code end
    #[test]
    fn test_handler_remapped() {
        // 0 iconst_0, 1 ireturn, 2 pop (handler), 3 iconst_1, 4 ireturn
        let class = class_with(vec![MethodBody::new("guarded", "()I")
            .limits(1, 0)
            .code([ICONST_0, IRETURN, 0x57, 0x04, IRETURN])
            .handler(0, 2, 2, 0)]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let mut out = class.clone();
        apply(&mut out, &plan, SegmentId::new(0)).unwrap();
        let code = code_of(&out, 0);
        assert_eq!(code.handlers[0].start, 0);
        assert_eq!(code.handlers[0].end, 11);
        assert_eq!(code.handlers[0].handler, 11);
        assert_eq!(plan.planned[0].cfg.blocks()[0].successors.len(), 1);
    }

    /// Uninitialized frame entries follow the `new` itself, not its probe
    #[test]
    fn test_uninitialized_points_at_new() {
        let mut builder = ClassBuilder::new("demo/Factory").unwrap();
        let class_index = builder.pool_mut().add_class("demo/Box").unwrap();
        let init = builder.pool_mut().add_method_ref("demo/Box", "<init>", "(I)V").unwrap();
        let [c_hi, c_lo] = class_index.to_be_bytes();
        let [m_hi, m_lo] = init.to_be_bytes();
        // 0 new, 3 dup, 4 iload_0, 5 ifeq 12, 8 iconst_1, 9 goto 13,
        // 12 iconst_2, 13 invokespecial, 16 areturn
        let stack = vec![VerificationType::Uninitialized(0), VerificationType::Uninitialized(0)];
        let mut with_int = stack.clone();
        with_int.push(VerificationType::Integer);
        builder
            .method(
                MethodBody::new("make", "(I)Ldemo/Box;")
                    .limits(3, 1)
                    .code([
                        NEW, c_hi, c_lo, 0x59, ILOAD_0, IFEQ, 0, 7, 0x04, GOTO, 0, 4, 0x05, INVOKESPECIAL, m_hi,
                        m_lo, 0xb0,
                    ])
                    .frame(StackMapFrame {
                        offset: 12,
                        kind: FrameKind::Full {
                            locals: vec![VerificationType::Integer],
                            stack: stack.clone(),
                        },
                    })
                    .frame(StackMapFrame {
                        offset: 13,
                        kind: FrameKind::Full {
                            locals: vec![VerificationType::Integer],
                            stack: with_int,
                        },
                    }),
            )
            .unwrap();
        let class = builder.build();
        let (_, out) = instrumented(&class, &InstrumentConfig::default(), 1);
        let code = code_of(&out, 0);
        let frames = code
            .attributes
            .iter()
            .find_map(|a| match a {
                CodeAttribute::StackMap { frames, .. } => Some(frames.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(frames[0].offset, 30);
        assert_eq!(frames[1].offset, 40);
        let FrameKind::Full { stack, .. } = &frames[0].kind else {
            panic!("expected full frame");
        };
        assert_eq!(stack[0], VerificationType::Uninitialized(9));
        assert_eq!(code.instructions.iter().find(|i| i.op.opcode() == NEW).unwrap().offset, 9);
    }

    /// A goto pushed out of 16-bit range becomes goto_w
    #[test]
    fn test_goto_widened() {
        // 0 goto 32764, 3.. nops, 32764 return
        let mut code = vec![GOTO];
        code.extend_from_slice(&32764i16.to_be_bytes());
        code.resize(32764, NOP);
        code.push(RETURN);
        let class = class_with(vec![MethodBody::new("far", "()V").limits(0, 0).code(code)]);
        let (plan, out) = instrumented(&class, &InstrumentConfig::default(), 0);
        assert_eq!(plan.planned[0].layout.widened_count(), 1);

        let code = code_of(&out, 0);
        let jump = &code.instructions[3];
        assert_eq!(jump.offset, 9);
        assert!(matches!(jump.op, Op::Branch { opcode: GOTO_W, target: 32784 }));
        assert_eq!(code.code_length(), 32794);
    }

    /// An empty plan leaves the class untouched
    #[test]
    fn test_empty_plan_is_noop() {
        let class = class_with(vec![MethodBody::new("nativeCall", "()V").access(access::PUBLIC | access::NATIVE)]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        assert!(plan.is_empty());
        let mut out = class.clone();
        apply(&mut out, &plan, SegmentId::new(0)).unwrap();
        assert_eq!(encode(&out).unwrap(), encode(&class).unwrap());
    }
}

mod aggregate_tests {
    use super::*;

    fn max_record() -> Arc<ClassMetadataRecord> {
        let class = class_with(vec![max_method()]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        Arc::new(plan.metadata(ClassIdentity::new("demo/Subject", 1)))
    }

    fn snapshot_of(record: &ClassMetadataRecord, counts: Vec<u64>) -> CounterSnapshot {
        CounterSnapshot {
            segments: vec![SegmentSnapshot {
                id: SegmentId::new(0),
                identity: record.identity.clone(),
                counts,
            }],
        }
    }

    /// Taken three times one way, never the other: the condition line is
    /// partial, the taken arm covered, the other arm missed
    #[test]
    fn test_if_else_partial_line() {
        let record = max_record();
        // P0 condition, P1 fallthrough arm (line 4), P2 taken arm (line 5)
        let report = aggregate(&[Arc::clone(&record)], &snapshot_of(&record, vec![3, 3, 0]));
        let method = report.class("demo/Subject").unwrap().method("max").unwrap();

        let condition = method.line(3).unwrap();
        assert_eq!(condition.status, LineStatus::PartiallyCovered);
        assert_eq!(condition.hits, 3);
        assert_eq!((condition.branches_covered, condition.branches_total), (1, 2));
        assert_eq!(method.line(4).unwrap().status, LineStatus::Covered);
        assert_eq!(method.line(5).unwrap().status, LineStatus::Missed);
        assert_eq!(method.line(5).unwrap().hits, 0);
        assert_eq!(method.branches[0].covered, 1);
        assert_eq!((method.probes_hit, method.probes_total), (2, 3));
    }

    /// Both outcomes taken: every line covered
    #[test]
    fn test_both_arms_covered() {
        let record = max_record();
        let report = aggregate(&[Arc::clone(&record)], &snapshot_of(&record, vec![4, 1, 3]));
        let method = report.class("demo/Subject").unwrap().method("max").unwrap();
        assert!(method.lines.values().all(|l| l.status == LineStatus::Covered));
        assert_eq!(report.summary.lines_covered, 3);
        assert_eq!(report.coverage_percent(), 100.0);
    }

    /// A class without a segment is reported, all zero
    #[test]
    fn test_missing_segment_reads_as_zero() {
        let record = max_record();
        let report = aggregate(&[Arc::clone(&record)], &CounterSnapshot::default());
        let class = report.class("demo/Subject").unwrap();
        assert!(!class.executed);
        assert!(class.methods[0].lines.values().all(|l| l.status == LineStatus::Missed));
        assert!(report.executed_classes().is_empty());
        assert_eq!(report.coverage_percent(), 0.0);
    }

    /// Only classes with metadata appear
    #[test]
    fn test_unknown_segments_ignored() {
        let record = max_record();
        let mut snapshot = snapshot_of(&record, vec![1, 1, 1]);
        snapshot.segments.push(SegmentSnapshot {
            id: SegmentId::new(1),
            identity: ClassIdentity::new("demo/NeverRegistered", 2),
            counts: vec![9],
        });
        let report = aggregate(&[record], &snapshot);
        assert_eq!(report.classes.len(), 1);
        assert_eq!(report.executed_classes(), vec!["demo/Subject"]);
    }

    /// Uninstrumented methods keep their status and carry no lines
    #[test]
    fn test_uninstrumented_methods_listed() {
        let class = class_with(vec![
            MethodBody::new("nativeCall", "()V").access(access::PUBLIC | access::NATIVE),
            answer_method(),
        ]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let record = Arc::new(plan.metadata(ClassIdentity::new("demo/Subject", 3)));
        let report = aggregate(&[Arc::clone(&record)], &snapshot_of(&record, vec![1]));
        let class = report.class("demo/Subject").unwrap();
        assert_eq!(class.methods[0].status, MethodStatus::NoCode);
        assert!(class.methods[0].lines.is_empty());
        assert!(class.methods[1].executed());
        assert_eq!(report.summary.methods, 2);
        assert_eq!(report.summary.instrumented_methods, 1);
    }

    /// Two versions of one class both appear
    #[test]
    fn test_same_name_different_digest() {
        let first = max_record();
        let mut second = (*first).clone();
        second.identity.digest = 0xff;
        let report = aggregate(&[first, Arc::new(second)], &CounterSnapshot::default());
        assert_eq!(report.classes.len(), 2);
        assert!(report.class("demo/Subject").is_some());
        assert!(report.class("demo/Subject@00000000000000ff").is_some());
    }
}

mod report_tests {
    use super::*;

    /// An empty report is vacuously complete
    #[test]
    fn test_empty_report() {
        let report = CoverageReport::from_classes(Vec::new());
        assert_eq!(report.summary.classes, 0);
        assert_eq!(report.coverage_percent(), 100.0);
    }

    /// Line status follows probe and branch counts
    #[test]
    fn test_line_status_rules() {
        assert_eq!(LineCoverage::status_of(0, 2, 0, 0), LineStatus::Missed);
        assert_eq!(LineCoverage::status_of(2, 2, 0, 0), LineStatus::Covered);
        assert_eq!(LineCoverage::status_of(1, 2, 0, 0), LineStatus::PartiallyCovered);
        assert_eq!(LineCoverage::status_of(1, 1, 1, 2), LineStatus::PartiallyCovered);
        assert_eq!(LineCoverage::status_of(1, 1, 2, 2), LineStatus::Covered);
    }

    /// A class loaded in two versions is listed once among executed
    /// classes, even when an inner class sorts between the two keys
    #[test]
    fn test_executed_classes_unique_across_versions() {
        let class = |name: &str, digest: u64, executed: bool| ClassCoverage {
            name: name.to_string(),
            digest,
            source_file: None,
            executed,
            methods: Vec::new(),
        };
        let report = CoverageReport::from_classes(vec![
            class("demo/A", 1, true),
            class("demo/A", 2, true),
            class("demo/A$1", 3, true),
            class("demo/B", 4, false),
        ]);
        assert_eq!(report.classes.len(), 4);
        assert!(report.classes.contains_key("demo/A@0000000000000002"));
        assert_eq!(report.executed_classes(), vec!["demo/A", "demo/A$1"]);
        assert_eq!(report.summary.executed_classes, 3);
    }

    /// JSON output names statuses in snake case and flattens method status
    #[test]
    fn test_json_shape() {
        let class = class_with(vec![max_method()]);
        let plan = plan(&class, &InstrumentConfig::default()).unwrap();
        let record = Arc::new(plan.metadata(ClassIdentity::new("demo/Subject", 1)));
        let report = aggregate(&[record], &CounterSnapshot::default());
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"instrumented\""));
        assert!(json.contains("\"missed\""));
        assert!(json.contains("\"source_file\": \"Subject.java\""));
    }
}

mod diagnostics_tests {
    use super::*;
    use crate::result::BytecovError;

    /// The log counts class and method skips separately
    #[test]
    fn test_counts_by_action() {
        let mut log = DiagnosticLog::new();
        log.record(Diagnostic::skip_class(
            "demo/A",
            &BytecovError::capacity("constant pool slots", 70_000, 65_535),
        ));
        log.record(Diagnostic::skip_method(
            "demo/B",
            "run()V",
            ErrorKind::UnsupportedConstruct,
            "code attribute X may carry offsets",
        ));
        log.record(Diagnostic::warn("demo/B", "class bytes declare demo/C"));
        assert_eq!(log.len(), 3);
        assert_eq!(log.skipped_classes(), 1);
        assert_eq!(log.skipped_methods(), 1);
        assert_eq!(log.for_class("demo/B").len(), 2);
        assert_eq!(log.entries()[0].kind, Some(ErrorKind::Capacity));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_description() {
        let diagnostic = Diagnostic::skip_method("demo/B", "run()V", ErrorKind::Encode, "bad frame");
        assert_eq!(diagnostic.description(), "demo/B.run()V: method skipped: bad frame");
    }
}

mod metadata_tests {
    use super::*;

    fn record(name: &str, digest: u64) -> ClassMetadataRecord {
        ClassMetadataRecord {
            identity: ClassIdentity::new(name, digest),
            source_file: None,
            methods: Vec::new(),
            probes: Vec::new(),
            branches: Vec::new(),
        }
    }

    /// The first record for an identity is kept
    #[test]
    fn test_first_insert_wins() {
        let registry = MetadataRegistry::new();
        let first = registry.insert(record("demo/A", 1));
        let mut other = record("demo/A", 1);
        other.source_file = Some("Other.java".to_string());
        let kept = registry.insert(other);
        assert!(Arc::ptr_eq(&first, &kept));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&ClassIdentity::new("demo/A", 1)).unwrap().source_file.is_none());
    }

    /// Records come back in identity order
    #[test]
    fn test_records_ordered() {
        let registry = MetadataRegistry::new();
        registry.insert(record("demo/B", 1));
        registry.insert(record("demo/A", 2));
        let names: Vec<String> = registry.records().iter().map(|r| r.identity.name.clone()).collect();
        assert_eq!(names, vec!["demo/A", "demo/B"]);
        registry.clear();
        assert!(registry.is_empty());
    }
}
