// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use rstest::rstest;
use yul::{parse, EvmDialect, U256};
use yul_interpreter::{ExecutionResult, Interpreter};
use yul_optimiser::{OptimiserSettings, OptimiserSuite};

const BRANCHES: &str = "{
    let x := calldataload(0)
    let y := add(x, 1)
    if gt(y, 3) { sstore(0, y) }
    sstore(1, mul(y, 2))
}";

const LOOP: &str = "{
    let sum := 0
    for { let i := 0 } lt(i, 10) { i := add(i, 1) } {
        sum := add(sum, mul(i, i))
    }
    sstore(0, sum)
}";

const FUNCTIONS: &str = "{
    function square(a) -> r { r := mul(a, a) }
    function twice(b) -> s { s := add(square(b), square(b)) }
    sstore(0, twice(calldataload(0)))
}";

const SWITCH: &str = "{
    switch calldataload(0)
    case 0 { sstore(0, 1) }
    case 5 { sstore(0, 2) }
    default { sstore(0, 3) }
    let z := 0
    z := 4
    sstore(1, z)
}";

const MEMORY: &str = "{
    mstore(0, 1)
    mstore(32, 2)
    sstore(0, add(mload(0), mload(32)))
    return(0, 64)
}";

const RECURSION: &str = "{
    function fact(n) -> r {
        r := 1
        if iszero(n) { leave }
        r := mul(n, fact(sub(n, 1)))
    }
    sstore(0, fact(5))
}";

const REVERT: &str = "{
    let v := calldataload(0)
    sstore(1, 1)
    if iszero(v) { revert(0, 0) }
    sstore(0, v)
}";

const BREAK_AND_CONTINUE: &str = "{
    let found := 0
    for { let i := 0 } 1 { i := add(i, 1) } {
        if lt(i, 3) { continue }
        found := i
        break
    }
    sstore(0, found)
}";

const UNUSED_CODE: &str = "{
    function unused(a) -> b { b := add(a, 1) }
    function store(key, value, ignored) { sstore(key, value) }
    let dead := mul(calldataload(0), 3)
    store(7, calldataload(0), 9)
}";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).filter(None, log::LevelFilter::max()).try_init();
}

fn calldata(value: u64) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    U256::from(value).to_big_endian(&mut bytes);
    bytes.to_vec()
}

fn execute(source: &str, calldata: &[u8]) -> ExecutionResult {
    let dialect = EvmDialect::new();
    let ast = parse(source).expect("program should parse");
    Interpreter::new(&dialect)
        .with_calldata(calldata)
        .run(&ast)
        .expect("program should execute")
}

fn optimise(source: &str, settings: &OptimiserSettings) -> String {
    let dialect = EvmDialect::new();
    let mut ast = parse(source).expect("program should parse");
    OptimiserSuite::new(&dialect, settings)
        .run(&mut ast, &BTreeSet::new())
        .expect("program should be optimised");
    ast.to_string()
}

#[track_caller]
fn assert_equivalent(source: &str, settings: &OptimiserSettings) {
    init_logger();

    let optimised = optimise(source, settings);
    log::debug!("Optimised program: {optimised}");

    for input in [0, 5] {
        let calldata = calldata(input);
        assert_eq!(execute(&optimised, &calldata), execute(source, &calldata), "calldata {input}");
    }
}

#[rstest]
#[case(BRANCHES)]
#[case(LOOP)]
#[case(FUNCTIONS)]
#[case(SWITCH)]
#[case(MEMORY)]
#[case(RECURSION)]
#[case(REVERT)]
#[case(BREAK_AND_CONTINUE)]
#[case(UNUSED_CODE)]
fn default_sequence_preserves_behaviour(#[case] source: &str) {
    assert_equivalent(source, &OptimiserSettings::default());
}

#[rstest]
#[case(BRANCHES)]
#[case(LOOP)]
#[case(FUNCTIONS)]
#[case(SWITCH)]
#[case(BREAK_AND_CONTINUE)]
fn ssa_round_trip_preserves_behaviour(#[case] source: &str, #[values("aV", "xaV", "xaVjul")] sequence: &str) {
    let settings = OptimiserSettings {
        sequence: sequence.to_string(),
        cleanup_sequence: String::new(),
        ..Default::default()
    };

    assert_equivalent(source, &settings);
}

#[test]
fn unused_code_is_removed() {
    init_logger();

    let optimised = optimise(UNUSED_CODE, &OptimiserSettings::default());
    assert!(!optimised.contains("unused"), "{optimised}");
    assert!(!optimised.contains("mul"), "{optimised}");
}
