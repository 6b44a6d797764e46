//! JVM instruction opcodes and operand layout.
//!
//! Only the opcodes the engine treats specially get a named constant; the
//! rest are classified through [`operand_layout`].

pub const NOP: u8 = 0x00;
pub const ICONST_0: u8 = 0x03;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const ILOAD: u8 = 0x15;
pub const ISTORE: u8 = 0x36;
pub const IINC: u8 = 0x84;

pub const IFEQ: u8 = 0x99;
pub const IF_ACMPNE: u8 = 0xa6;
pub const GOTO: u8 = 0xa7;
pub const JSR: u8 = 0xa8;
pub const RET: u8 = 0xa9;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const IRETURN: u8 = 0xac;
pub const RETURN: u8 = 0xb1;

pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const INVOKEDYNAMIC: u8 = 0xba;
pub const NEW: u8 = 0xbb;
pub const ATHROW: u8 = 0xbf;

pub const WIDE: u8 = 0xc4;
pub const IFNULL: u8 = 0xc6;
pub const IFNONNULL: u8 = 0xc7;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;

/// Operand shape following an opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// Fixed number of operand bytes
    Fixed(usize),
    /// Signed 16-bit branch offset
    Branch16,
    /// Signed 32-bit branch offset
    Branch32,
    /// `tableswitch` / `lookupswitch` with alignment padding
    Switch,
    /// `wide` prefix; length depends on the modified opcode
    Wide,
}

/// Operand layout of `opcode`, or `None` if the byte is not a valid opcode
#[must_use]
pub const fn operand_layout(opcode: u8) -> Option<OperandLayout> {
    use OperandLayout::{Branch16, Branch32, Fixed, Switch, Wide};
    let layout = match opcode {
        0x00..=0x0f => Fixed(0),
        BIPUSH => Fixed(1),
        SIPUSH => Fixed(2),
        LDC => Fixed(1),
        LDC_W | 0x14 => Fixed(2),
        0x15..=0x19 => Fixed(1),
        0x1a..=0x35 => Fixed(0),
        0x36..=0x3a => Fixed(1),
        0x3b..=0x83 => Fixed(0),
        IINC => Fixed(2),
        0x85..=0x98 => Fixed(0),
        IFEQ..=JSR => Branch16,
        RET => Fixed(1),
        TABLESWITCH | LOOKUPSWITCH => Switch,
        IRETURN..=RETURN => Fixed(0),
        0xb2..=0xb5 => Fixed(2),
        INVOKEVIRTUAL..=INVOKESTATIC => Fixed(2),
        INVOKEINTERFACE | INVOKEDYNAMIC => Fixed(4),
        NEW => Fixed(2),
        0xbc => Fixed(1),
        0xbd => Fixed(2),
        0xbe | ATHROW => Fixed(0),
        0xc0 | 0xc1 => Fixed(2),
        0xc2 | 0xc3 => Fixed(0),
        WIDE => Wide,
        0xc5 => Fixed(3),
        IFNULL | IFNONNULL => Branch16,
        GOTO_W | JSR_W => Branch32,
        _ => return None,
    };
    Some(layout)
}

/// Whether `opcode` is a conditional branch
#[must_use]
pub const fn is_conditional_branch(opcode: u8) -> bool {
    matches!(opcode, IFEQ..=IF_ACMPNE | IFNULL | IFNONNULL)
}

/// Whether `opcode` may follow a `wide` prefix
#[must_use]
pub const fn is_widenable(opcode: u8) -> bool {
    matches!(opcode, ILOAD..=0x19 | ISTORE..=0x3a | RET | IINC)
}

const MNEMONICS: [&str; 202] = [
    "nop", "aconst_null", "iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3", "iconst_4",
    "iconst_5", "lconst_0", "lconst_1", "fconst_0", "fconst_1", "fconst_2", "dconst_0", "dconst_1",
    "bipush", "sipush", "ldc", "ldc_w", "ldc2_w", "iload", "lload", "fload", "dload", "aload",
    "iload_0", "iload_1", "iload_2", "iload_3", "lload_0", "lload_1", "lload_2", "lload_3",
    "fload_0", "fload_1", "fload_2", "fload_3", "dload_0", "dload_1", "dload_2", "dload_3",
    "aload_0", "aload_1", "aload_2", "aload_3", "iaload", "laload", "faload", "daload", "aaload",
    "baload", "caload", "saload", "istore", "lstore", "fstore", "dstore", "astore", "istore_0",
    "istore_1", "istore_2", "istore_3", "lstore_0", "lstore_1", "lstore_2", "lstore_3",
    "fstore_0", "fstore_1", "fstore_2", "fstore_3", "dstore_0", "dstore_1", "dstore_2",
    "dstore_3", "astore_0", "astore_1", "astore_2", "astore_3", "iastore", "lastore", "fastore",
    "dastore", "aastore", "bastore", "castore", "sastore", "pop", "pop2", "dup", "dup_x1",
    "dup_x2", "dup2", "dup2_x1", "dup2_x2", "swap", "iadd", "ladd", "fadd", "dadd", "isub",
    "lsub", "fsub", "dsub", "imul", "lmul", "fmul", "dmul", "idiv", "ldiv", "fdiv", "ddiv",
    "irem", "lrem", "frem", "drem", "ineg", "lneg", "fneg", "dneg", "ishl", "lshl", "ishr",
    "lshr", "iushr", "lushr", "iand", "land", "ior", "lor", "ixor", "lxor", "iinc", "i2l", "i2f",
    "i2d", "l2i", "l2f", "l2d", "f2i", "f2l", "f2d", "d2i", "d2l", "d2f", "i2b", "i2c", "i2s",
    "lcmp", "fcmpl", "fcmpg", "dcmpl", "dcmpg", "ifeq", "ifne", "iflt", "ifge", "ifgt", "ifle",
    "if_icmpeq", "if_icmpne", "if_icmplt", "if_icmpge", "if_icmpgt", "if_icmple", "if_acmpeq",
    "if_acmpne", "goto", "jsr", "ret", "tableswitch", "lookupswitch", "ireturn", "lreturn",
    "freturn", "dreturn", "areturn", "return", "getstatic", "putstatic", "getfield", "putfield",
    "invokevirtual", "invokespecial", "invokestatic", "invokeinterface", "invokedynamic", "new",
    "newarray", "anewarray", "arraylength", "athrow", "checkcast", "instanceof", "monitorenter",
    "monitorexit", "wide", "multianewarray", "ifnull", "ifnonnull", "goto_w", "jsr_w",
];

/// Assembler mnemonic for `opcode`
#[must_use]
pub fn mnemonic(opcode: u8) -> &'static str {
    MNEMONICS.get(opcode as usize).copied().unwrap_or("<invalid>")
}
