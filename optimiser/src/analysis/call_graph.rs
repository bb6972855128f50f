// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::{BTreeMap, BTreeSet};

use yul::{
    visit::{walk_for_loop, walk_function_call, walk_function_definition, Visitor},
    Block, ForLoop, FunctionCall, FunctionDefinition, YulString,
};

/// The functions (and builtins) every function calls directly. The code
/// outside of any function is recorded under the empty name.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    pub function_calls: BTreeMap<YulString, BTreeSet<YulString>>,
    pub functions_with_loops: BTreeSet<YulString>,
}

impl CallGraph {
    #[must_use]
    pub fn of(ast: &Block) -> Self {
        let mut generator = CallGraphGenerator {
            graph: CallGraph::default(),
            current: YulString::empty(),
        };
        generator.graph.function_calls.insert(YulString::empty(), BTreeSet::new());
        generator.visit_block(ast);
        generator.graph
    }

    #[must_use]
    pub fn callees(&self, function: &str) -> Option<&BTreeSet<YulString>> {
        self.function_calls.get(function)
    }

    /// The strongly connected components of the graph (restricted to the
    /// functions defined in the program), callees before callers.
    #[must_use]
    pub fn strongly_connected_components(&self) -> Vec<Vec<YulString>> {
        Tarjan::new(self).run()
    }

    /// The functions that can (indirectly) call themselves.
    #[must_use]
    pub fn recursive_functions(&self) -> BTreeSet<YulString> {
        let mut recursive = BTreeSet::new();
        for component in self.strongly_connected_components() {
            let calls_itself = component.len() == 1
                && self.function_calls[&component[0]].contains(&component[0]);

            if component.len() > 1 || calls_itself {
                recursive.extend(component);
            }
        }
        recursive
    }

    /// The functions reachable through calls from any of `roots`, including
    /// the roots themselves.
    #[must_use]
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a YulString>) -> BTreeSet<YulString> {
        let mut reached = BTreeSet::new();
        let mut worklist: Vec<YulString> = roots.into_iter().cloned().collect();

        while let Some(function) = worklist.pop() {
            if !reached.insert(function.clone()) {
                continue;
            }

            if let Some(callees) = self.function_calls.get(&function) {
                worklist.extend(callees.iter().filter(|callee| !reached.contains(*callee)).cloned());
            }
        }

        reached
    }
}

struct CallGraphGenerator {
    graph: CallGraph,
    current: YulString,
}

impl<'ast> Visitor<'ast> for CallGraphGenerator {
    fn visit_function_call(&mut self, call: &'ast FunctionCall) {
        self.graph.function_calls.entry(self.current.clone())
            .or_default()
            .insert(call.function_name.name.clone());
        walk_function_call(self, call);
    }

    fn visit_for_loop(&mut self, for_loop: &'ast ForLoop) {
        self.graph.functions_with_loops.insert(self.current.clone());
        walk_for_loop(self, for_loop);
    }

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        let previous = std::mem::replace(&mut self.current, function.name.clone());
        self.graph.function_calls.entry(function.name.clone()).or_default();
        walk_function_definition(self, function);
        self.current = previous;
    }
}

struct Tarjan<'g> {
    graph: &'g CallGraph,
    index: BTreeMap<&'g YulString, usize>,
    low_link: BTreeMap<&'g YulString, usize>,
    stack: Vec<&'g YulString>,
    on_stack: BTreeSet<&'g YulString>,
    components: Vec<Vec<YulString>>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g CallGraph) -> Self {
        Self {
            graph,
            index: BTreeMap::new(),
            low_link: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<YulString>> {
        for function in self.graph.function_calls.keys() {
            if !self.index.contains_key(function) {
                self.connect(function);
            }
        }
        self.components
    }

    fn connect(&mut self, function: &'g YulString) {
        let graph = self.graph;
        let index = self.index.len();
        self.index.insert(function, index);
        self.low_link.insert(function, index);
        self.stack.push(function);
        self.on_stack.insert(function);

        for callee in &graph.function_calls[function] {
            // Builtins have no entry of their own.
            let Some((callee, _)) = graph.function_calls.get_key_value(callee) else {
                continue;
            };

            if !self.index.contains_key(callee) {
                self.connect(callee);
                let low = self.low_link[function].min(self.low_link[callee]);
                self.low_link.insert(function, low);
            } else if self.on_stack.contains(callee) {
                let low = self.low_link[function].min(self.index[callee]);
                self.low_link.insert(function, low);
            }
        }

        if self.low_link[function] == self.index[function] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.clone());
                if member == function {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use yul::parse;

    use super::*;

    const PROGRAM: &str = "{
        pop(f(1))
        function f(a) -> r { r := g(a) }
        function g(a) -> r { r := add(h(a), 1) }
        function h(a) -> r { if a { r := g(sub(a, 1)) } }
        function k() { for { } 1 { } { k() } }
        function unused() { }
    }";

    fn names(set: &BTreeSet<YulString>) -> Vec<&str> {
        set.iter().map(|name| name.as_str()).collect()
    }

    #[test]
    fn records_direct_calls() {
        let graph = CallGraph::of(&parse(PROGRAM).unwrap());

        assert_eq!(names(&graph.function_calls[""]), vec!["f", "pop"]);
        assert_eq!(names(&graph.function_calls["g"]), vec!["add", "h"]);
        assert_eq!(names(&graph.functions_with_loops), vec!["k"]);
    }

    #[test]
    fn components_list_callees_first() {
        let graph = CallGraph::of(&parse(PROGRAM).unwrap());
        let components = graph.strongly_connected_components();

        let position = |name: &str| components.iter().position(|c| c.iter().any(|n| n == name)).unwrap();
        assert!(position("g") < position("f"));
        assert!(position("f") < position(""));
        assert_eq!(components[position("g")], vec![YulString::from("g"), YulString::from("h")]);
    }

    #[test]
    fn finds_recursion() {
        let graph = CallGraph::of(&parse(PROGRAM).unwrap());
        assert_eq!(names(&graph.recursive_functions()), vec!["g", "h", "k"]);
    }

    #[test]
    fn reachability_skips_unused_functions() {
        let graph = CallGraph::of(&parse(PROGRAM).unwrap());
        let reached = graph.reachable_from([&YulString::empty()]);
        assert!(!reached.contains("unused"));
        assert!(!reached.contains("k"));
        assert!(reached.contains("h"));
    }
}
