// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use pretty_assertions::assert_eq;
use rstest::rstest;
use yul::*;

#[rstest]
#[case(
    "{ function f(a, b) -> r { r := add(a, b) } sstore(0, f(1, 2)) }",
    "{\n    function f(a, b) -> r {\n        r := add(a, b)\n    }\n    sstore(0, f(1, 2))\n}",
)]
#[case(
    "{ for { let i := 0 } lt(i, 10) { i := add(i, 1) } { mstore(i, i) } }",
    "{\n    for {\n        let i := 0\n    } lt(i, 10) {\n        i := add(i, 1)\n    } {\n        mstore(i, i)\n    }\n}",
)]
fn printed_programs_parse_to_the_same_tree(#[case] input: &str, #[case] expected: &str) {
    let block = parse(input).expect("input should parse");
    let printed = block.to_string();
    assert_eq!(printed, expected);

    let reparsed = parse(&printed).expect("printed program should parse");
    assert_eq!(reparsed, block);
}

#[test]
fn parsed_programs_pass_analysis() {
    let source = r#"
        {
            // comments are skipped
            let x := calldataload(0)
            switch x
            case 0 { revert(0, 0) }
            default {
                function double(v) -> w { w := mul(v, 2) }
                sstore(0, double(x))
            }
        }
    "#;

    let block = parse(source).expect("source should parse");
    let info = Analyzer::analyze(&EvmDialect::new(), &block).expect("source should be valid");
    assert!(!info.scopes.is_empty());
}

#[test]
fn analysis_collects_every_error() {
    let block = parse("{ let x := y function g() { } g(1) }").expect("source should parse");
    let errors = Analyzer::analyze(&EvmDialect::new(), &block).expect_err("source is invalid");
    let names: Vec<&str> = errors.iter().map(|error| error.as_ref()).collect();
    assert_eq!(names, vec!["UndeclaredVariable", "ArgumentCountMismatch"]);
}
