//! Built-in kernels with known results.
//!
//! Every kernel computes its global thread index as
//! `%blockIdx * %blockDim + %threadIdx`, so the results do not depend on how
//! many cores or threads per block the GPU is configured with.

use crate::fixed::{self, from_f64, Q115_MAX};
use crate::isa::asm;

/// A program, its initial data memory and the words it must leave behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    pub name: &'static str,
    pub description: &'static str,
    pub program: Vec<u16>,
    /// Loaded at data address 0.
    pub data: Vec<u16>,
    pub thread_count: u8,
    /// Address of the first checked word.
    pub expected_base: u16,
    pub expected: Vec<u16>,
}

const R0: u8 = 0;
const R1: u8 = 1;
const R2: u8 = 2;
const R3: u8 = 3;
const R4: u8 = 4;
const R5: u8 = 5;
const R6: u8 = 6;
const R7: u8 = 7;
const R8: u8 = 8;
const R9: u8 = 9;
const R10: u8 = 10;
const R11: u8 = 11;
const BLOCK_IDX: u8 = crate::isa::REG_BLOCK_IDX;
const BLOCK_DIM: u8 = crate::isa::REG_BLOCK_DIM;
const THREAD_IDX: u8 = crate::isa::REG_THREAD_IDX;

fn q(values: &[f64]) -> Vec<u16> {
    values.iter().map(|&v| from_f64(v)).collect()
}

/// `C[i] = A[i] + B[i]` over eight threads, A at 0, B at 8, C at 16.
fn matadd_program() -> Vec<u16> {
    vec![
        asm::mul(R0, BLOCK_IDX, BLOCK_DIM),
        asm::add(R0, R0, THREAD_IDX),
        asm::constant(R1, 0),
        asm::constant(R2, 8),
        asm::constant(R3, 16),
        asm::add(R4, R1, R0),
        asm::ldr(R4, R4),
        asm::add(R5, R2, R0),
        asm::ldr(R5, R5),
        asm::add(R6, R4, R5),
        asm::add(R7, R3, R0),
        asm::str(R7, R6),
        asm::ret(),
    ]
}

fn matadd_with(name: &'static str, description: &'static str, a: &[f64], b: &[f64]) -> Kernel {
    let a = q(a);
    let b = q(b);
    // ADD is the integer adder: Q1.15 words add exactly, wrapping on overflow.
    let expected = a.iter().zip(&b).map(|(x, y)| x.wrapping_add(*y)).collect();
    let mut data = a;
    data.extend(b);
    Kernel {
        name,
        description,
        program: matadd_program(),
        data,
        thread_count: 8,
        expected_base: 16,
        expected,
    }
}

/// 0.25 + 0.5 in every slot.
pub fn matadd() -> Kernel {
    matadd_with("matadd", "8-element add, 0.25 + 0.5 = 0.75", &[0.25; 8], &[0.5; 8])
}

/// Mixed-sign operands.
pub fn matadd_negative() -> Kernel {
    matadd_with(
        "matadd-neg",
        "8-element add with negative operands",
        &[-0.5, 0.25, -0.125, 0.75, -0.375, 0.0, -1.0, 0.5],
        &[0.25, -0.25, 0.125, -0.25, 0.125, 0.5, 0.5, -0.5],
    )
}

/// 2x2 matrix multiply, one output element per thread, accumulated with FMA.
///
/// A at 0..4, B at 4..8, C at 8..12, all row-major.
fn matmul_program() -> Vec<u16> {
    vec![
        asm::mul(R0, BLOCK_IDX, BLOCK_DIM), // 0: i
        asm::add(R0, R0, THREAD_IDX),
        asm::constant(R1, 1),
        asm::constant(R2, 2), // N
        asm::constant(R3, 0), // A
        asm::constant(R4, 4), // B
        asm::constant(R5, 8), // C
        asm::div(R6, R0, R2), // row
        asm::mul(R7, R6, R2),
        asm::sub(R7, R0, R7), // col
        asm::constant(R8, 0), // acc
        asm::constant(R9, 0), // k
        asm::mul(R10, R6, R2), // 12: loop
        asm::add(R10, R10, R9),
        asm::add(R10, R10, R3),
        asm::ldr(R10, R10),
        asm::mul(R11, R9, R2),
        asm::add(R11, R11, R7),
        asm::add(R11, R11, R4),
        asm::ldr(R11, R11),
        asm::fma(R8, R10, R11),
        asm::add(R9, R9, R1),
        asm::cmp(R9, R2),
        asm::brn(-12), // 23: back to 12 while k < N
        asm::add(R9, R5, R0),
        asm::str(R9, R8),
        asm::ret(),
    ]
}

fn matmul_with(name: &'static str, description: &'static str, a: &[f64; 4], b: &[f64; 4]) -> Kernel {
    let a = q(a);
    let b = q(b);
    let expected = (0..4)
        .map(|i| {
            let (row, col) = (i / 2, i % 2);
            (0..2).fold(0, |acc, k| fixed::mac(acc, a[row * 2 + k], b[k * 2 + col]))
        })
        .collect();
    let mut data = a;
    data.extend(b);
    Kernel {
        name,
        description,
        program: matmul_program(),
        data,
        thread_count: 4,
        expected_base: 8,
        expected,
    }
}

/// `A = B = 0.5` everywhere, so every `C` entry is `0.5`.
pub fn matmul() -> Kernel {
    matmul_with("matmul", "2x2 FMA matmul, all entries 0.5", &[0.5; 4], &[0.5; 4])
}

pub fn matmul_mixed() -> Kernel {
    matmul_with(
        "matmul-mixed",
        "2x2 FMA matmul with distinct entries",
        &[0.5, 0.25, 0.125, 0.5],
        &[0.5, 0.25, 0.25, 0.5],
    )
}

/// `CMP R1, R2; BRn +1` around a store of 7. mem[0] ends as 0 when the
/// branch is taken and 7 when it falls through; mem[1] is always 9.
pub fn branch_probe(r1: i16, r2: i16) -> Kernel {
    let taken = r1 < r2;
    Kernel {
        name: if taken { "branch-taken" } else { "branch-fallthrough" },
        description: if taken {
            "CMP R1 < R2 takes BRn"
        } else {
            "CMP R1 >= R2 falls through BRn"
        },
        program: vec![
            asm::constant(R1, r1),
            asm::constant(R2, r2),
            asm::cmp(R1, R2),
            asm::brn(1),
            asm::constant(R3, 7),
            asm::constant(R4, 9),
            asm::constant(R5, 0),
            asm::str(R5, R3),
            asm::constant(R6, 1),
            asm::str(R6, R4),
            asm::ret(),
        ],
        data: vec![0xFFFF, 0xFFFF],
        thread_count: 1,
        expected_base: 0,
        expected: vec![if taken { 0 } else { 7 }, 9],
    }
}

/// `y = relu(x + bias)` over four threads: x at 0, bias at 4, y at 8.
pub fn bias_relu() -> Kernel {
    let x = q(&[0.75, -0.5, 0.25, -0.75]);
    let bias = q(&[0.5, 0.25, -0.125, 0.5]);
    let mut data = x;
    data.extend(bias);
    Kernel {
        name: "bias-relu",
        description: "saturating bias add followed by ReLU",
        program: vec![
            asm::mul(R0, BLOCK_IDX, BLOCK_DIM),
            asm::add(R0, R0, THREAD_IDX),
            asm::constant(R1, 4),
            asm::add(R1, R1, R0),
            asm::ldr(R2, R0),
            asm::ldr(R3, R1),
            asm::act(R5, R2, R3), // rd = 0b0101 selects ReLU
            asm::constant(R6, 8),
            asm::add(R6, R6, R0),
            asm::str(R6, R5),
            asm::ret(),
        ],
        data,
        thread_count: 4,
        expected_base: 8,
        expected: vec![Q115_MAX, 0, from_f64(0.125), 0],
    }
}

/// Every built-in kernel.
pub fn all() -> Vec<Kernel> {
    vec![
        matadd(),
        matadd_negative(),
        matmul(),
        matmul_mixed(),
        branch_probe(1, 2),
        branch_probe(2, 2),
        bias_relu(),
    ]
}

/// Look up a built-in kernel by name.
pub fn by_name(name: &str) -> Option<Kernel> {
    all().into_iter().find(|k| k.name == name)
}
