//! Observation graphs
//!
//! A test case is a directed graph of expected events. Each node carries the
//! event it waits for, the actions to take once it matched, and the nodes
//! that may follow.

pub mod model;
pub mod validate;

pub use model::{
    Action, ActionKind, Actor, ControlCommand, EventKind, ExpectedEvent, Instruction, MatchRule,
    Observation, ObservationGraph, DOCUMENT_VERSION,
};
pub use validate::{validate, Issue, IssueKind, ValidationReport};
