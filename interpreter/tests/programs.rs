// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use pretty_assertions::assert_eq;
use rstest::rstest;
use yul::{parse, EvmDialect, U256};
use yul_interpreter::{Interpreter, Termination};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).filter(None, log::LevelFilter::max()).try_init();
}

#[rstest]
#[case(
    "{
        function fib(n) -> r {
            r := n
            if gt(n, 1) { r := add(fib(sub(n, 1)), fib(sub(n, 2))) }
        }
        sstore(0, fib(10))
    }",
    55,
)]
#[case(
    "{
        let sum := 0
        for { let i := 1 } iszero(gt(i, 10)) { i := add(i, 1) } { sum := add(sum, i) }
        sstore(0, sum)
    }",
    55,
)]
#[case(
    "{
        mstore(0x40, 7)
        mstore8(0x5f, 9)
        sstore(0, mload(0x40))
    }",
    9,
)]
#[case(
    "{
        tstore(3, 11)
        sstore(0, add(tload(3), tload(4)))
    }",
    11,
)]
fn computes_storage(#[case] source: &str, #[case] expected: u64) {
    init_logger();

    let dialect = EvmDialect::new();
    let ast = parse(source).unwrap();
    let result = Interpreter::new(&dialect).run(&ast).unwrap();

    assert_eq!(result.termination, Termination::Stopped);
    assert_eq!(result.storage.get(&U256::zero()).copied(), Some(U256::from(expected)));
}

#[test]
fn reads_calldata() {
    init_logger();

    let dialect = EvmDialect::new();
    let ast = parse("{ sstore(calldatasize(), shr(248, calldataload(1))) }").unwrap();
    let result = Interpreter::new(&dialect).with_calldata([1, 2, 3]).run(&ast).unwrap();

    assert_eq!(result.storage.get(&U256::from(3)).copied(), Some(U256::from(2)));
}

#[test]
fn small_step_limits_stop_execution() {
    init_logger();

    let dialect = EvmDialect::new();
    let ast = parse("{ sstore(0, 1) sstore(1, 1) sstore(2, 1) }").unwrap();
    let result = Interpreter::new(&dialect).with_step_limit(2).run(&ast).unwrap();

    assert_eq!(result.termination, Termination::StepLimitReached);
    assert_eq!(result.trace.len(), 2);
}
