// Copyright (C) 2024 - 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

mod call_graph;
mod data_flow;
mod knowledge_base;
mod metrics;
mod side_effects;
mod termination;

pub use self::{
    call_graph::CallGraph,
    data_flow::{walk_arguments, AssignedValue, DataFlowAnalyzer, DataFlowHook, DataFlowState},
    knowledge_base::KnowledgeBase,
    metrics::{CodeSize, CodeSizeOracle, CostOracle},
    side_effects::{contains_msize, MovableChecker, SideEffectsCollector, SideEffectsPropagator},
    termination::{ControlFlow, TerminationFinder},
};
