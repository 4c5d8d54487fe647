//! Structural checks run before a graph is submitted
//!
//! Validation is advisory: the driver will submit any graph, but the
//! scenario runner refuses to contact the backend when a fatal issue is
//! present.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use super::model::ObservationGraph;
use crate::common::{Error, Result};

/// Kind of structural problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    /// No node carries the test-initiated marker
    MissingStartNode,
    /// More than one node carries the test-initiated marker
    MultipleStartNodes,
    /// Node cannot be reached from the start node
    UnreachableNode,
    /// Successor id with no matching node
    DanglingSuccessor,
    /// Graph has no node with an empty successor list
    NoTerminalNode,
    /// Terminal node without an end-test action
    MissingTerminationAction,
    /// Successor edge leads back to a node already on the path
    Cycle,
    /// Transition into a start node, which should have no incoming edges
    TransitionToStart,
}

impl IssueKind {
    /// Fatal issues block submission
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            IssueKind::MissingTerminationAction | IssueKind::Cycle | IssueKind::TransitionToStart
        )
    }
}

/// One structural finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Observation the issue concerns, if any
    pub observation: Option<String>,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.kind.is_fatal() { "error" } else { "warning" };
        write!(f, "{level}: {}", self.message)
    }
}

/// Result of validating one graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// True when no fatal issue is present
    pub fn is_submit_ready(&self) -> bool {
        self.fatal().next().is_none()
    }

    pub fn fatal(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.kind.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| !i.kind.is_fatal())
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }

    /// Turn fatal issues into a `GraphStructure` error
    pub fn into_result(self) -> Result<Self> {
        if self.is_submit_ready() {
            return Ok(self);
        }
        let messages: Vec<String> = self.fatal().map(|i| i.message.clone()).collect();
        Err(Error::GraphStructure(messages.join("; ")))
    }

    fn push(&mut self, kind: IssueKind, observation: Option<&str>, message: String) {
        self.issues.push(Issue {
            kind,
            observation: observation.map(str::to_string),
            message,
        });
    }
}

/// Check a graph for structural problems
pub fn validate(graph: &ObservationGraph) -> ValidationReport {
    let mut report = ValidationReport::default();

    let starts: Vec<&str> = graph
        .start_candidates()
        .map(|o| o.identifier.as_str())
        .collect();
    match starts.as_slice() {
        [] => report.push(
            IssueKind::MissingStartNode,
            None,
            "graph has no TestInitiated start node".to_string(),
        ),
        [_] => {}
        many => report.push(
            IssueKind::MultipleStartNodes,
            None,
            format!("graph has {} start nodes: {}", many.len(), many.join(", ")),
        ),
    }

    for obs in graph.observations() {
        for next in &obs.successors {
            match graph.get(next) {
                None => report.push(
                    IssueKind::DanglingSuccessor,
                    Some(&obs.identifier),
                    format!("'{}' transitions to unknown observation '{}'", obs.identifier, next),
                ),
                Some(target) if target.is_start() => report.push(
                    IssueKind::TransitionToStart,
                    Some(&obs.identifier),
                    format!("'{}' transitions back to start node '{}'", obs.identifier, next),
                ),
                Some(_) => {}
            }
        }
    }

    // Reachability only means something relative to a single start node
    if let Some(start) = graph.start_node().map(|o| o.identifier.as_str()) {
        let reachable: HashSet<&str> = graph.reachable_from(start).collect();
        for obs in graph.observations() {
            if !reachable.contains(obs.identifier.as_str()) {
                report.push(
                    IssueKind::UnreachableNode,
                    Some(&obs.identifier),
                    format!("'{}' is not reachable from start '{}'", obs.identifier, start),
                );
            }
        }
    }

    let terminals = graph.terminal_nodes();
    if terminals.is_empty() {
        report.push(
            IssueKind::NoTerminalNode,
            None,
            "graph has no terminal observation".to_string(),
        );
    }
    for obs in terminals {
        if !obs.response_actions.iter().any(|a| a.is_termination()) {
            report.push(
                IssueKind::MissingTerminationAction,
                Some(&obs.identifier),
                format!("terminal '{}' has no EndTest action", obs.identifier),
            );
        }
    }

    for (from, to) in back_edges(graph) {
        report.push(
            IssueKind::Cycle,
            Some(from),
            format!("'{from}' transitions back to '{to}'"),
        );
    }

    report
}

/// Edges that close a cycle, found by iterative depth-first search
fn back_edges(graph: &ObservationGraph) -> Vec<(&str, &str)> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnPath,
        Done,
    }

    let nodes = graph.observations();
    let position = |id: &str| nodes.iter().position(|o| o.identifier == id);
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut edges = Vec::new();

    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, next successor index to explore)
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::OnPath;
        while let Some((node, cursor)) = stack.last().copied() {
            let successors = &nodes[node].successors;
            if cursor >= successors.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            let next_id = successors[cursor].as_str();
            let Some(next) = position(next_id) else {
                continue;
            };
            match marks[next] {
                Mark::Unvisited => {
                    marks[next] = Mark::OnPath;
                    stack.push((next, 0));
                }
                Mark::OnPath => {
                    edges.push((nodes[node].identifier.as_str(), nodes[next].identifier.as_str()))
                }
                Mark::Done => {}
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{Action, Observation};

    fn graph(observations: Vec<Observation>) -> ObservationGraph {
        ObservationGraph::new(observations).unwrap()
    }

    #[test]
    fn test_valid_graph_has_no_issues() {
        let g = graph(vec![
            Observation::start("start").then(["greet"]),
            Observation::message("greet", "Welcome")
                .respond(Action::dtmf("press-1", 1))
                .then(["done"]),
            Observation::message("done", "selected sales").respond(Action::end_test("end")),
        ]);
        let report = validate(&g);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert!(report.is_submit_ready());
    }

    #[test]
    fn test_dangling_successor_is_fatal() {
        let g = graph(vec![
            Observation::start("start").then(["greet", "ghost"]),
            Observation::message("greet", "Welcome").respond(Action::end_test("end")),
        ]);
        let report = validate(&g);
        assert!(report.has(IssueKind::DanglingSuccessor));
        assert!(!report.is_submit_ready());
        let issue = report.fatal().next().unwrap();
        assert_eq!(issue.observation.as_deref(), Some("start"));
    }

    #[test]
    fn test_unreachable_node_is_fatal() {
        let g = graph(vec![
            Observation::start("start").then(["done"]),
            Observation::message("orphan", "never").then(["done"]),
            Observation::message("done", "bye").respond(Action::end_test("end")),
        ]);
        let report = validate(&g);
        let unreachable: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::UnreachableNode)
            .map(|i| i.observation.as_deref().unwrap())
            .collect();
        assert_eq!(unreachable, vec!["orphan"]);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_no_terminal_node() {
        let g = graph(vec![
            Observation::start("start").then(["menu"]),
            Observation::message("menu", "Press 1").then(["menu"]),
        ]);
        let report = validate(&g);
        assert!(report.has(IssueKind::NoTerminalNode));
        assert!(report.has(IssueKind::Cycle));
        assert!(!report.is_submit_ready());
    }

    #[test]
    fn test_missing_termination_action_is_warning() {
        let g = graph(vec![
            Observation::start("start").then(["welcome"]),
            Observation::message("welcome", "wisdom session"),
        ]);
        let report = validate(&g);
        assert!(report.has(IssueKind::MissingTerminationAction));
        assert!(report.is_submit_ready());
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_start_node_checks() {
        let g = graph(vec![Observation::message("only", "hi").respond(Action::end_test("e"))]);
        assert!(validate(&g).has(IssueKind::MissingStartNode));

        let g = graph(vec![
            Observation::start("a").then(["done"]),
            Observation::start("b").then(["done"]),
            Observation::message("done", "bye").respond(Action::end_test("e")),
        ]);
        let report = validate(&g);
        assert!(report.has(IssueKind::MultipleStartNodes));
        assert!(!report.has(IssueKind::UnreachableNode));
    }

    #[test]
    fn test_cycle_alone_is_not_fatal() {
        let g = graph(vec![
            Observation::start("start").then(["menu"]),
            Observation::message("menu", "Press 1").then(["repeat", "done"]),
            Observation::message("repeat", "Press 1 for sales").then(["menu"]),
            Observation::message("done", "bye").respond(Action::end_test("e")),
        ]);
        let report = validate(&g);
        assert!(report.is_submit_ready());
        let cycle = report.warnings().find(|i| i.kind == IssueKind::Cycle).unwrap();
        assert_eq!(cycle.observation.as_deref(), Some("repeat"));
        assert!(!report.has(IssueKind::TransitionToStart));
    }

    #[test]
    fn test_transition_to_start_is_flagged() {
        // "retry" sits off the depth-first path through "start", so the
        // edge back into start is not seen as a cycle there
        let g = graph(vec![
            Observation::message("retry", "Sorry, try again").then(["start"]),
            Observation::start("start").then(["done"]),
            Observation::message("done", "bye").respond(Action::end_test("e")),
        ]);
        let report = validate(&g);
        let flagged: Vec<_> = report
            .warnings()
            .filter(|i| i.kind == IssueKind::TransitionToStart)
            .map(|i| i.observation.as_deref().unwrap())
            .collect();
        assert_eq!(flagged, vec!["retry"]);
        assert!(!report.has(IssueKind::Cycle));
        // retry itself is unreachable, which is what blocks submission
        assert!(report.has(IssueKind::UnreachableNode));
    }

    #[test]
    fn test_loop_back_to_start_is_warning() {
        let g = graph(vec![
            Observation::start("start").then(["menu"]),
            Observation::message("menu", "Press 1").then(["start", "done"]),
            Observation::message("done", "bye").respond(Action::end_test("e")),
        ]);
        let report = validate(&g);
        assert!(report.is_submit_ready());
        assert!(report.has(IssueKind::TransitionToStart));
        assert!(report.has(IssueKind::Cycle));
    }
}
