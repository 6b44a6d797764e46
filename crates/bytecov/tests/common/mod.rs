//! Shared fixtures for integration tests.
//!
//! [`MiniVm`] executes the int-only subset of bytecode the fixtures use,
//! including `invokestatic` to the probe bridge, so instrumented classes
//! can be run and their counters checked without a JVM.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use bytecov::classfile::{decode, ClassModel, Constant, Op, SwitchCases};
use bytecov::config::ProbeBridge;
use bytecov::coverage::CounterStore;
use std::sync::Arc;

pub const ICONST_0: u8 = 0x03;
pub const ICONST_1: u8 = 0x04;
pub const BIPUSH: u8 = 0x10;
pub const ILOAD_0: u8 = 0x1a;
pub const ILOAD_1: u8 = 0x1b;
pub const ISTORE_1: u8 = 0x3c;
pub const IADD: u8 = 0x60;
pub const IMUL: u8 = 0x68;
pub const IDIV: u8 = 0x6c;
pub const IINC: u8 = 0x84;
pub const IFEQ: u8 = 0x99;
pub const IFNE: u8 = 0x9a;
pub const IF_ICMPGE: u8 = 0xa2;
pub const IF_ICMPLE: u8 = 0xa4;
pub const GOTO: u8 = 0xa7;
pub const IRETURN: u8 = 0xac;
pub const RETURN: u8 = 0xb1;
pub const POP: u8 = 0x57;
pub const ATHROW: u8 = 0xbf;

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Returned(Option<i32>),
    /// Uncaught throw; the thrown value is an int stand-in for the object
    Threw(i32),
}

/// Interpreter over one decoded class
pub struct MiniVm {
    class: ClassModel,
    bridge: ProbeBridge,
    store: Arc<CounterStore>,
    /// Instructions executed by the last top-level call, probes included
    pub steps: usize,
}

impl MiniVm {
    pub fn new(bytes: &[u8], store: Arc<CounterStore>) -> Self {
        Self {
            class: decode(bytes).unwrap(),
            bridge: ProbeBridge::default(),
            store,
            steps: 0,
        }
    }

    pub fn call(&mut self, name: &str, args: &[i32]) -> Completion {
        self.steps = 0;
        self.invoke(name, args)
    }

    fn method_ref(&self, index: u16) -> (String, String, String) {
        let pool = &self.class.constant_pool;
        let Some(Constant::MethodRef(class, nat)) = pool.get(index) else {
            panic!("#{index} is not a method ref");
        };
        let Some(Constant::NameAndType(name, descriptor)) = pool.get(*nat) else {
            panic!("#{nat} is not a name and type");
        };
        (
            pool.class_name(*class).unwrap(),
            pool.utf8(*name).unwrap(),
            pool.utf8(*descriptor).unwrap(),
        )
    }

    fn int_constant(&self, operands: &[u8]) -> i32 {
        let index = u16::from_be_bytes([operands[0], operands[1]]);
        match self.class.constant_pool.get(index) {
            Some(Constant::Integer(value)) => *value,
            other => panic!("ldc_w of {other:?}"),
        }
    }

    fn invoke(&mut self, name: &str, args: &[i32]) -> Completion {
        let method = self
            .class
            .methods
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("no method {name}"))
            .clone();
        let code = method.code().unwrap_or_else(|| panic!("{name} has no code"));
        let mut locals = vec![0i32; usize::from(code.max_locals).max(args.len())];
        locals[..args.len()].copy_from_slice(args);
        let mut stack: Vec<i32> = Vec::with_capacity(usize::from(code.max_stack));
        let mut pc = 0u32;

        loop {
            self.steps += 1;
            assert!(self.steps < 1_000_000, "runaway loop in {name}");
            assert!(stack.len() <= usize::from(code.max_stack), "stack overflow in {name} at {pc}");
            let index = code.index_of(pc).unwrap_or_else(|| panic!("{pc} is not an instruction"));
            let insn = &code.instructions[index];
            let next = insn.end();

            let thrown = match &insn.op {
                Op::Plain { opcode, operands } => match *opcode {
                    0x00 => None,
                    0x02..=0x08 => {
                        stack.push(i32::from(*opcode) - 3);
                        None
                    }
                    BIPUSH => {
                        stack.push(i32::from(operands[0] as i8));
                        None
                    }
                    0x11 => {
                        stack.push(i32::from(i16::from_be_bytes([operands[0], operands[1]])));
                        None
                    }
                    0x13 => {
                        stack.push(self.int_constant(operands));
                        None
                    }
                    0x15 => {
                        stack.push(locals[usize::from(operands[0])]);
                        None
                    }
                    0x1a..=0x1d => {
                        stack.push(locals[usize::from(*opcode - 0x1a)]);
                        None
                    }
                    0x36 => {
                        locals[usize::from(operands[0])] = stack.pop().unwrap();
                        None
                    }
                    0x3b..=0x3e => {
                        locals[usize::from(*opcode - 0x3b)] = stack.pop().unwrap();
                        None
                    }
                    POP => {
                        stack.pop().unwrap();
                        None
                    }
                    0x59 => {
                        let top = *stack.last().unwrap();
                        stack.push(top);
                        None
                    }
                    IADD | 0x64 | IMUL | IDIV | 0x70 => {
                        let b = stack.pop().unwrap();
                        let a = stack.pop().unwrap();
                        match *opcode {
                            IADD => stack.push(a.wrapping_add(b)),
                            0x64 => stack.push(a.wrapping_sub(b)),
                            IMUL => stack.push(a.wrapping_mul(b)),
                            _ if b == 0 => {}
                            IDIV => stack.push(a.wrapping_div(b)),
                            _ => stack.push(a.wrapping_rem(b)),
                        }
                        (b == 0 && matches!(*opcode, IDIV | 0x70)).then_some(-1)
                    }
                    0x74 => {
                        let a = stack.pop().unwrap();
                        stack.push(a.wrapping_neg());
                        None
                    }
                    IINC => {
                        let slot = usize::from(operands[0]);
                        locals[slot] = locals[slot].wrapping_add(i32::from(operands[1] as i8));
                        None
                    }
                    other => panic!("unsupported opcode {other:#04x} at {pc}"),
                },
                Op::Invoke { opcode: 0xb8, index, .. } => {
                    let (owner, callee, descriptor) = self.method_ref(*index);
                    let arity = descriptor
                        .trim_start_matches('(')
                        .split(')')
                        .next()
                        .map_or(0, str::len);
                    let split = stack.len() - arity;
                    let call_args: Vec<i32> = stack.split_off(split);
                    if owner == self.bridge.owner && callee == self.bridge.name {
                        self.store.hit(call_args[0] as u32, call_args[1] as u32);
                        None
                    } else if owner == self.class.name {
                        match self.invoke(&callee, &call_args) {
                            Completion::Returned(value) => {
                                stack.extend(value);
                                None
                            }
                            Completion::Threw(value) => Some(value),
                        }
                    } else {
                        panic!("call to {owner}.{callee}");
                    }
                }
                Op::Invoke { opcode, .. } => panic!("unsupported invoke {opcode:#04x}"),
                Op::Branch { opcode, target } => {
                    let taken = match *opcode {
                        0x99..=0x9e => {
                            let a = stack.pop().unwrap();
                            compare(*opcode - 0x99, a, 0)
                        }
                        0x9f..=0xa4 => {
                            let b = stack.pop().unwrap();
                            let a = stack.pop().unwrap();
                            compare(*opcode - 0x9f, a, b)
                        }
                        GOTO | 0xc8 => true,
                        other => panic!("unsupported branch {other:#04x}"),
                    };
                    pc = if taken { *target } else { next };
                    continue;
                }
                Op::Switch { default, cases, .. } => {
                    let key = stack.pop().unwrap();
                    pc = match cases {
                        SwitchCases::Table { low, targets } => key
                            .checked_sub(*low)
                            .and_then(|i| usize::try_from(i).ok())
                            .and_then(|i| targets.get(i).copied())
                            .unwrap_or(*default),
                        SwitchCases::Lookup(pairs) => pairs
                            .iter()
                            .find(|(k, _)| *k == key)
                            .map_or(*default, |(_, t)| *t),
                    };
                    continue;
                }
                Op::Return { opcode } => {
                    return Completion::Returned((*opcode == IRETURN).then(|| stack.pop().unwrap()));
                }
                Op::Throw => Some(stack.pop().unwrap()),
                Op::Ret { .. } => panic!("ret is not supported"),
            };

            match thrown {
                None => pc = next,
                Some(value) => match code.handlers.iter().find(|h| h.covers(pc)) {
                    Some(handler) => {
                        stack.clear();
                        stack.push(value);
                        pc = handler.handler;
                    }
                    None => return Completion::Threw(value),
                },
            }
        }
    }
}

fn compare(kind: u8, a: i32, b: i32) -> bool {
    match kind {
        0 => a == b,
        1 => a != b,
        2 => a < b,
        3 => a >= b,
        4 => a > b,
        _ => a <= b,
    }
}
