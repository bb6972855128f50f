// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use primitive_types::{U256, U512};

use crate::EvmInstruction;

/// Evaluates an instruction whose result only depends on its arguments.
/// Returns `None` for instructions that read or write state, or when the
/// number of arguments does not match.
#[must_use]
pub fn evaluate_pure(instruction: EvmInstruction, arguments: &[U256]) -> Option<U256> {
    use EvmInstruction::*;

    let value = match (instruction, arguments) {
        (Add, [a, b]) => a.overflowing_add(*b).0,
        (Sub, [a, b]) => a.overflowing_sub(*b).0,
        (Mul, [a, b]) => a.overflowing_mul(*b).0,
        (Div, [a, b]) => if b.is_zero() { U256::zero() } else { *a / *b },
        (Mod, [a, b]) => if b.is_zero() { U256::zero() } else { *a % *b },
        (Sdiv, [a, b]) => signed_div(*a, *b),
        (Smod, [a, b]) => signed_mod(*a, *b),
        (Exp, [a, b]) => a.overflowing_pow(*b).0,
        (Addmod, [a, b, n]) => {
            if n.is_zero() {
                U256::zero()
            } else {
                narrow((U512::from(*a) + U512::from(*b)) % U512::from(*n))
            }
        }
        (Mulmod, [a, b, n]) => {
            if n.is_zero() {
                U256::zero()
            } else {
                narrow(a.full_mul(*b) % U512::from(*n))
            }
        }
        (Signextend, [b, x]) => sign_extend(*b, *x),
        (Lt, [a, b]) => bool_to_word(a < b),
        (Gt, [a, b]) => bool_to_word(a > b),
        (Slt, [a, b]) => bool_to_word(flip_sign(*a) < flip_sign(*b)),
        (Sgt, [a, b]) => bool_to_word(flip_sign(*a) > flip_sign(*b)),
        (Eq, [a, b]) => bool_to_word(a == b),
        (Iszero, [a]) => bool_to_word(a.is_zero()),
        (And, [a, b]) => *a & *b,
        (Or, [a, b]) => *a | *b,
        (Xor, [a, b]) => *a ^ *b,
        (Not, [a]) => !*a,
        (Byte, [index, x]) => {
            if *index >= U256::from(32) {
                U256::zero()
            } else {
                U256::from(x.byte(31 - index.as_usize()))
            }
        }
        (Shl, [shift, value]) => {
            if *shift >= U256::from(256) {
                U256::zero()
            } else {
                *value << shift.as_usize()
            }
        }
        (Shr, [shift, value]) => {
            if *shift >= U256::from(256) {
                U256::zero()
            } else {
                *value >> shift.as_usize()
            }
        }
        (Sar, [shift, value]) => arithmetic_shift_right(*shift, *value),
        _ => return None,
    };

    Some(value)
}

fn bool_to_word(value: bool) -> U256 {
    if value { U256::one() } else { U256::zero() }
}

fn is_negative(value: U256) -> bool {
    value.bit(255)
}

fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn absolute(value: U256) -> U256 {
    if is_negative(value) { negate(value) } else { value }
}

fn flip_sign(value: U256) -> U256 {
    value ^ (U256::one() << 255)
}

fn narrow(value: U512) -> U256 {
    U256::try_from(value).unwrap_or_default()
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }

    let quotient = absolute(a) / absolute(b);
    if is_negative(a) != is_negative(b) {
        negate(quotient)
    } else {
        quotient
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }

    let remainder = absolute(a) % absolute(b);
    if is_negative(a) {
        negate(remainder)
    } else {
        remainder
    }
}

fn sign_extend(byte: U256, value: U256) -> U256 {
    if byte >= U256::from(31) {
        return value;
    }

    let bit = byte.as_usize() * 8 + 7;
    let mask = (U256::one() << (bit + 1)) - U256::one();
    if value.bit(bit) {
        value | !mask
    } else {
        value & mask
    }
}

fn arithmetic_shift_right(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }

    let shift = shift.as_usize();
    if negative {
        !((!value) >> shift)
    } else {
        value >> shift
    }
}
