// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use rstest::rstest;
use yul::{
    parse,
    visit::{walk_function_definition, walk_variable_declaration, Visitor},
    Block, EvmDialect, FunctionDefinition, Statement, VariableDeclaration, YulString,
};
use yul_optimiser::{
    normalized_snapshot, OptimiserError, OptimiserSettings, OptimiserStep, OptimiserStepContext, OptimiserSuite,
    SequenceError, StepRegistry, UnusedPruner,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).filter(None, log::LevelFilter::max()).try_init();
}

fn settings(sequence: &str) -> OptimiserSettings {
    OptimiserSettings {
        sequence: sequence.to_string(),
        cleanup_sequence: String::new(),
        ..Default::default()
    }
}

fn optimise(source: &str, settings: &OptimiserSettings, reserved: &[&str]) -> Result<Block, OptimiserError> {
    init_logger();

    let dialect = EvmDialect::new();
    let reserved: BTreeSet<YulString> = reserved.iter().map(|name| YulString::from(*name)).collect();

    let mut ast = parse(source).expect("test input should parse");
    OptimiserSuite::new(&dialect, settings).run(&mut ast, &reserved)?;
    Ok(ast)
}

#[rstest]
#[case(
    "{ let a function f() { } }",
    "",
    "{ { let a } function f() { } }",
)]
#[case(
    "{ let a := mul(1, codesize()) let b := mul(1, codesize()) }",
    "c",
    "{ { let a := mul(1, codesize()) let b := a } }",
)]
#[case(
    "{ let a := mload(1) let b := mload(1) }",
    "c",
    "{ { let a := mload(1) let b := mload(1) } }",
)]
#[case(
    "{ revert(0, 0) let x := 1 }",
    "D",
    "{ { revert(0, 0) } }",
)]
#[case(
    "{ for { let i := 0 } lt(i, 3) { i := add(i, 1) } { } }",
    "",
    "{ { let i := 0 for { } lt(i, 3) { i := add(i, 1) } { } } }",
)]
#[case(
    "{ sstore(f(1), g(2)) function f(a) -> r { r := add(a, 1) } function g(b) -> s { s := add(b, 1) } }",
    "vu",
    "{ { sstore(f(1), f(2)) } function f(a) -> r { r := add(a, 1) } }",
)]
#[case(
    "{ sstore(0, 1) mstore(0, 2) sstore(0, 3) }",
    "S",
    "{ { sstore(0, 3) } }",
)]
fn runs_the_given_sequence(#[case] input: &str, #[case] sequence: &str, #[case] expected: &str) {
    let ast = optimise(input, &settings(sequence), &[]).unwrap();
    assert_eq!(ast.to_string(), parse(expected).unwrap().to_string());
}

#[test]
fn declared_names_are_unique_after_optimising() {
    #[derive(Default)]
    struct Declarations {
        names: Vec<YulString>,
    }

    impl<'ast> Visitor<'ast> for Declarations {
        fn visit_variable_declaration(&mut self, declaration: &'ast VariableDeclaration) {
            self.names.extend(declaration.variables.iter().map(|variable| variable.name.clone()));
            walk_variable_declaration(self, declaration);
        }

        fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
            self.names.push(function.name.clone());
            self.names.extend(function.parameters.iter().map(|variable| variable.name.clone()));
            self.names.extend(function.return_variables.iter().map(|variable| variable.name.clone()));
            walk_function_definition(self, function);
        }
    }

    let ast = optimise(
        "{
            { let x := 1 sstore(0, x) }
            { let x := 2 sstore(1, x) }
            function f(x) -> y { y := x }
            function g(x) -> y { y := f(x) }
            sstore(2, g(3))
        }",
        &settings("xa"),
        &[],
    ).unwrap();

    let mut declarations = Declarations::default();
    declarations.visit_block(&ast);

    let unique: BTreeSet<&YulString> = declarations.names.iter().collect();
    assert_eq!(unique.len(), declarations.names.len());
}

#[test]
fn reserved_identifiers_survive() {
    let ast = optimise(
        "{ function keep() -> r { r := 1 } function drop() { } }",
        &settings("u"),
        &["keep"],
    ).unwrap();

    assert_eq!(ast.to_string(), parse("{ { } function keep() -> r { r := 1 } }").unwrap().to_string());
}

#[test]
fn repeating_a_stable_sequence_changes_nothing() {
    let input = "{
        let a := calldataload(0)
        let b := add(a, 0)
        let c := mul(b, 1)
        sstore(c, add(a, 0))
        let unused := 5
    }";
    let settings = settings("[scul]");

    let once = optimise(input, &settings, &[]).unwrap();
    let twice = optimise(&once.to_string(), &settings, &[]).unwrap();

    assert_eq!(normalized_snapshot(&twice), normalized_snapshot(&once));
}

#[rstest]
#[case("xyz", SequenceError::UnknownAbbreviation { abbreviation: 'y', position: 1 })]
#[case("xa[r", SequenceError::UnterminatedBracket { position: 2 })]
#[case("c]", SequenceError::UnexpectedClosingBracket { position: 1 })]
#[case("[c:u]", SequenceError::InvalidColon { position: 2 })]
fn invalid_sequences_leave_the_program_untouched(#[case] sequence: &str, #[case] expected: SequenceError) {
    init_logger();

    let source = "{ let x := add(1, 2) function f() { } }";
    let dialect = EvmDialect::new();
    let settings = settings(sequence);

    let mut ast = parse(source).unwrap();
    let result = OptimiserSuite::new(&dialect, &settings).run(&mut ast, &BTreeSet::new());

    assert!(matches!(result, Err(OptimiserError::Sequence(ref error)) if *error == expected), "{result:?}");
    assert_eq!(ast, parse(source).unwrap());
}

#[test]
fn invalid_cleanup_sequence_is_reported() {
    let settings = OptimiserSettings {
        sequence: "c".to_string(),
        cleanup_sequence: "u:c".to_string(),
        ..Default::default()
    };

    let result = optimise("{ }", &settings, &[]);
    assert!(matches!(result, Err(OptimiserError::Sequence(SequenceError::InvalidColon { position: 1 }))), "{result:?}");
}

#[test]
fn steps_missing_from_the_registry_are_unknown() {
    init_logger();

    let dialect = EvmDialect::new();
    let settings = settings("uc");
    let mut registry = StepRegistry::new();
    registry.register::<UnusedPruner>();

    let mut ast = parse("{ }").unwrap();
    let result = OptimiserSuite::new(&dialect, &settings)
        .with_registry(registry)
        .run(&mut ast, &BTreeSet::new());

    assert!(matches!(
        result,
        Err(OptimiserError::Sequence(SequenceError::UnknownAbbreviation { abbreviation: 'c', position: 1 })),
    ), "{result:?}");
}

#[test]
fn deeply_nested_expressions_are_rejected() {
    let settings = OptimiserSettings {
        max_expression_depth: 2,
        ..settings("c")
    };

    let result = optimise("{ sstore(0, add(1, add(2, 3))) }", &settings, &[]);
    assert!(matches!(result, Err(OptimiserError::ExpressionTooDeep { depth: 3, limit: 2 })), "{result:?}");
}

#[rstest]
#[case("{ let x := y }")]
#[case("{ let x let x }")]
#[case("{ f() }")]
fn invalid_programs_are_rejected(#[case] source: &str) {
    let result = optimise(source, &settings("c"), &[]);
    assert!(matches!(result, Err(OptimiserError::InvalidProgram(..))), "{result:?}");
}

#[test]
fn settings_can_be_read_from_toml() {
    let settings = OptimiserSettings::from_toml("sequence = \"D\"\ncleanup-sequence = \"\"\n").unwrap();

    let ast = optimise("{ stop() sstore(0, 1) }", &settings, &[]).unwrap();
    assert_eq!(ast.to_string(), parse("{ { stop() } }").unwrap().to_string());
}

/// Moves the code of the leading block back into the top-level block.
#[derive(Debug, Default)]
struct Ungrouper;

impl OptimiserStep for Ungrouper {
    const NAME: &'static str = "Ungrouper";
    const ABBREVIATION: char = 'z';

    fn run(&mut self, _: &mut OptimiserStepContext<'_>, ast: &mut Block) {
        if let Some(Statement::Block(code)) = ast.statements.first_mut() {
            let code = std::mem::take(&mut code.statements);
            ast.statements.splice(0..1, code);
        }
    }
}

fn optimise_with_ungrouper(source: &str, sequence: &str) -> Block {
    init_logger();

    let dialect = EvmDialect::new();
    let settings = settings(sequence);
    let mut registry = StepRegistry::with_all_steps();
    registry.register::<Ungrouper>();

    let mut ast = parse(source).unwrap();
    OptimiserSuite::new(&dialect, &settings)
        .with_registry(registry)
        .run(&mut ast, &BTreeSet::new())
        .unwrap();
    ast
}

#[test]
#[should_panic(expected = "BlockFlattener requires FunctionsGrouped to hold")]
fn broken_invariants_are_no_longer_established() {
    optimise_with_ungrouper("{ sstore(0, 1) function f() { } }", "zf");
}

#[test]
fn broken_invariants_can_be_established_again() {
    let ast = optimise_with_ungrouper("{ sstore(0, 1) function f() { } }", "zgf");
    assert_eq!(ast.to_string(), parse("{ { sstore(0, 1) } function f() { } }").unwrap().to_string());
}

#[test]
fn programs_without_code_stay_grouped() {
    let ast = optimise(
        "{ function keep() { sstore(0, 1) } }",
        &OptimiserSettings::default(),
        &["keep"],
    ).unwrap();

    assert!(matches!(ast.statements.first(), Some(Statement::Block(..))), "{ast}");
}
