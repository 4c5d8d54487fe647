//! Observation graph data types
//!
//! The graph types serialize directly to the backend's test-content
//! document, so a graph read from a suite file and a graph built in code
//! produce the same submission payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::common::{Error, Result};

/// Test-content document version understood by the backend
pub const DOCUMENT_VERSION: &str = "2019-10-30";

/// Who produces an event or performs an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    System,
    Customer,
}

/// How the backend compares the expected payload against the observed one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchRule {
    /// Observed payload must equal the expected one
    Exact,
    /// Observed payload need only contain the expected fragment
    Inclusion,
}

/// Kind of an expected event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Synthetic marker emitted when the test call is placed
    TestInitiated,
    /// A prompt played to the caller
    MessageReceived,
    /// Any other backend event kind, carried verbatim
    #[serde(untagged)]
    Other(String),
}

/// The event an observation waits for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpectedEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub identifier: String,
    #[serde(rename = "Type")]
    pub kind: EventKind,
    pub actor: Actor,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(
        rename = "MatchingCriteria",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub match_rule: Option<MatchRule>,
}

impl ExpectedEvent {
    /// The synthetic test-initiated marker
    pub fn test_initiated() -> Self {
        Self {
            identifier: String::new(),
            kind: EventKind::TestInitiated,
            actor: Actor::System,
            properties: BTreeMap::new(),
            match_rule: None,
        }
    }

    /// A system prompt containing `text`
    pub fn message(text: &str) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("Text".to_string(), Value::String(text.to_string()));
        Self {
            identifier: String::new(),
            kind: EventKind::MessageReceived,
            actor: Actor::System,
            properties,
            match_rule: Some(MatchRule::Inclusion),
        }
    }
}

/// A customer instruction such as a DTMF key press
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instruction {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Test-control commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    EndTest,
    Other(String),
}

impl ControlCommand {
    fn as_str(&self) -> &str {
        match self {
            ControlCommand::EndTest => "EndTest",
            ControlCommand::Other(s) => s,
        }
    }

    fn from_wire(s: String) -> Self {
        if s == "EndTest" {
            ControlCommand::EndTest
        } else {
            ControlCommand::Other(s)
        }
    }
}

/// What a response action does
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    SendInstruction {
        actor: Actor,
        instruction: Instruction,
    },
    TestControl {
        command: ControlCommand,
    },
}

/// An action performed once an observation's event matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub struct Action {
    pub identifier: String,
    pub kind: ActionKind,
}

impl Action {
    /// Customer presses a DTMF key
    pub fn dtmf(identifier: &str, value: u32) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("Value".to_string(), Value::from(value));
        Self {
            identifier: identifier.to_string(),
            kind: ActionKind::SendInstruction {
                actor: Actor::Customer,
                instruction: Instruction {
                    kind: "DtmfInput".to_string(),
                    properties,
                },
            },
        }
    }

    /// End the test call
    pub fn end_test(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            kind: ActionKind::TestControl {
                command: ControlCommand::EndTest,
            },
        }
    }

    /// True if this action ends the test
    pub fn is_termination(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::TestControl {
                command: ControlCommand::EndTest
            }
        )
    }
}

// Wire shape of an action. The action type and actor appear both at the top
// level and inside `Parameters`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawAction {
    identifier: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<Actor>,
    parameters: RawParameters,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawParameters {
    action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    actor: Option<Actor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instruction: Option<Instruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<RawCommand>,
}

#[derive(Serialize, Deserialize)]
struct RawCommand {
    #[serde(rename = "Type")]
    kind: String,
}

impl TryFrom<RawAction> for Action {
    type Error = String;

    fn try_from(raw: RawAction) -> std::result::Result<Self, Self::Error> {
        let kind = match raw.kind.as_str() {
            "SendInstruction" => {
                let instruction = raw.parameters.instruction.ok_or_else(|| {
                    format!("action '{}' is missing Parameters.Instruction", raw.identifier)
                })?;
                let actor = raw
                    .parameters
                    .actor
                    .or(raw.actor)
                    .unwrap_or(Actor::Customer);
                ActionKind::SendInstruction { actor, instruction }
            }
            "TestControl" => {
                let command = raw.parameters.command.ok_or_else(|| {
                    format!("action '{}' is missing Parameters.Command", raw.identifier)
                })?;
                ActionKind::TestControl {
                    command: ControlCommand::from_wire(command.kind),
                }
            }
            other => {
                return Err(format!(
                    "action '{}' has unsupported type '{}'",
                    raw.identifier, other
                ))
            }
        };
        Ok(Action {
            identifier: raw.identifier,
            kind,
        })
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        match action.kind {
            ActionKind::SendInstruction { actor, instruction } => RawAction {
                identifier: action.identifier,
                kind: "SendInstruction".to_string(),
                actor: Some(actor),
                parameters: RawParameters {
                    action_type: "SendInstruction".to_string(),
                    actor: Some(actor),
                    instruction: Some(instruction),
                    command: None,
                },
            },
            ActionKind::TestControl { command } => RawAction {
                identifier: action.identifier,
                kind: "TestControl".to_string(),
                actor: None,
                parameters: RawParameters {
                    action_type: "TestControl".to_string(),
                    actor: None,
                    instruction: None,
                    command: Some(RawCommand {
                        kind: command.as_str().to_string(),
                    }),
                },
            },
        }
    }
}

/// One node of the conversation graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Observation {
    pub identifier: String,
    #[serde(rename = "Event")]
    pub expected_event: ExpectedEvent,
    /// Empty means observe only and let the flow continue or time out
    #[serde(rename = "Actions", default)]
    pub response_actions: Vec<Action>,
    /// Empty marks a terminal node
    #[serde(rename = "Transitions", default, with = "transitions")]
    pub successors: Vec<String>,
}

impl Observation {
    /// The start node, waiting for the test-initiated marker
    pub fn start(identifier: &str) -> Self {
        Self::new(identifier, ExpectedEvent::test_initiated())
    }

    /// A node waiting for a system prompt containing `text`
    pub fn message(identifier: &str, text: &str) -> Self {
        Self::new(identifier, ExpectedEvent::message(text))
    }

    pub fn new(identifier: &str, expected_event: ExpectedEvent) -> Self {
        Self {
            identifier: identifier.to_string(),
            expected_event,
            response_actions: Vec::new(),
            successors: Vec::new(),
        }
    }

    /// Require an exact payload match instead of inclusion
    pub fn exact(mut self) -> Self {
        self.expected_event.match_rule = Some(MatchRule::Exact);
        self
    }

    /// Append a response action
    pub fn respond(mut self, action: Action) -> Self {
        self.response_actions.push(action);
        self
    }

    /// Add successor observations
    pub fn then<I, S>(mut self, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in next {
            let id = id.into();
            if !self.successors.contains(&id) {
                self.successors.push(id);
            }
        }
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn is_start(&self) -> bool {
        self.expected_event.kind == EventKind::TestInitiated
    }
}

mod transitions {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct TransitionsRef<'a> {
        next_observations: &'a [String],
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Transitions {
        #[serde(default)]
        next_observations: Vec<String>,
    }

    pub fn serialize<S: Serializer>(next: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        TransitionsRef {
            next_observations: next,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Transitions::deserialize(deserializer).map(|t| t.next_observations)
    }
}

/// A conversation described as a graph of expected events
///
/// Immutable after construction. Node order is the declaration order and is
/// preserved through serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct ObservationGraph {
    version: String,
    metadata: BTreeMap<String, Value>,
    observations: Vec<Observation>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GraphDocument {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
    observations: Vec<Observation>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl TryFrom<GraphDocument> for ObservationGraph {
    type Error = Error;

    fn try_from(doc: GraphDocument) -> Result<Self> {
        let mut graph = Self::new(doc.observations)?;
        graph.version = doc.version;
        graph.metadata = doc.metadata;
        Ok(graph)
    }
}

impl From<ObservationGraph> for GraphDocument {
    fn from(graph: ObservationGraph) -> Self {
        Self {
            version: graph.version,
            metadata: graph.metadata,
            observations: graph.observations,
        }
    }
}

impl ObservationGraph {
    /// Build a graph from observations in declaration order
    ///
    /// Fails only on duplicate identifiers. Events without an identifier get
    /// one derived from their observation.
    pub fn new(mut observations: Vec<Observation>) -> Result<Self> {
        let mut index = HashMap::with_capacity(observations.len());
        for (i, obs) in observations.iter_mut().enumerate() {
            if index.insert(obs.identifier.clone(), i).is_some() {
                return Err(Error::DuplicateObservationId(obs.identifier.clone()));
            }
            if obs.expected_event.identifier.is_empty() {
                obs.expected_event.identifier = format!("{}-event", obs.identifier);
            }
        }
        Ok(Self {
            version: default_version(),
            metadata: BTreeMap::new(),
            observations,
            index,
        })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&Observation> {
        self.index.get(identifier).map(|&i| &self.observations[i])
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains_key(identifier)
    }

    /// All nodes that carry the test-initiated marker
    pub fn start_candidates(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|o| o.is_start())
    }

    /// The unique start node, if the graph has exactly one
    pub fn start_node(&self) -> Option<&Observation> {
        let mut candidates = self.start_candidates();
        let first = candidates.next()?;
        match candidates.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// All nodes with an empty successor list
    pub fn terminal_nodes(&self) -> Vec<&Observation> {
        self.observations.iter().filter(|o| o.is_terminal()).collect()
    }

    /// Lazily walk successors breadth-first from `identifier`
    ///
    /// The origin is yielded first. Each node is yielded at most once, so the
    /// walk terminates on cyclic graphs too. Successor ids with no matching
    /// node are skipped. An unknown origin yields nothing.
    pub fn reachable_from<'a>(&'a self, identifier: &str) -> Reachable<'a> {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        if let Some(obs) = self.get(identifier) {
            visited.insert(obs.identifier.as_str());
            queue.push_back(obs);
        }
        Reachable {
            graph: self,
            queue,
            visited,
        }
    }

    /// Serialize to the backend's test-content JSON
    pub fn to_content_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Iterator returned by [`ObservationGraph::reachable_from`]
pub struct Reachable<'a> {
    graph: &'a ObservationGraph,
    queue: VecDeque<&'a Observation>,
    visited: HashSet<&'a str>,
}

impl<'a> Iterator for Reachable<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.queue.pop_front()?;
        for next in &current.successors {
            if let Some(obs) = self.graph.get(next) {
                if self.visited.insert(obs.identifier.as_str()) {
                    self.queue.push_back(obs);
                }
            }
        }
        Some(current.identifier.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_graph() -> ObservationGraph {
        ObservationGraph::new(vec![
            Observation::start("start").then(["greet"]),
            Observation::message("greet", "Welcome")
                .respond(Action::dtmf("press-1", 1))
                .then(["done"]),
            Observation::message("done", "selected sales").respond(Action::end_test("end")),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let err = ObservationGraph::new(vec![
            Observation::start("start"),
            Observation::message("start", "again"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateObservationId(id) if id == "start"));
    }

    #[test]
    fn test_terminal_nodes() {
        let graph = sales_graph();
        let terminals: Vec<&str> = graph
            .terminal_nodes()
            .iter()
            .map(|o| o.identifier.as_str())
            .collect();
        assert_eq!(terminals, vec!["done"]);
    }

    #[test]
    fn test_reachable_from_start() {
        let graph = sales_graph();
        let ids: Vec<&str> = graph.reachable_from("start").collect();
        assert_eq!(ids, vec!["start", "greet", "done"]);
        assert_eq!(graph.reachable_from("missing").count(), 0);
    }

    #[test]
    fn test_reachable_from_terminates_on_cycle() {
        let graph = ObservationGraph::new(vec![
            Observation::start("start").then(["menu"]),
            Observation::message("menu", "Press 1").then(["repeat", "menu"]),
            Observation::message("repeat", "again").then(["menu", "nowhere"]),
        ])
        .unwrap();
        let ids: Vec<&str> = graph.reachable_from("start").collect();
        assert_eq!(ids, vec!["start", "menu", "repeat"]);
    }

    #[test]
    fn test_start_node_requires_uniqueness() {
        assert_eq!(
            sales_graph().start_node().map(|o| o.identifier.as_str()),
            Some("start")
        );
        let graph = ObservationGraph::new(vec![
            Observation::start("a"),
            Observation::start("b"),
        ])
        .unwrap();
        assert!(graph.start_node().is_none());
    }

    #[test]
    fn test_serializes_to_backend_document() {
        let value = serde_json::to_value(sales_graph()).unwrap();
        assert_eq!(value["Version"], "2019-10-30");
        let greet = &value["Observations"][1];
        assert_eq!(greet["Identifier"], "greet");
        assert_eq!(greet["Event"]["Type"], "MessageReceived");
        assert_eq!(greet["Event"]["Identifier"], "greet-event");
        assert_eq!(greet["Event"]["Properties"]["Text"], "Welcome");
        assert_eq!(greet["Event"]["MatchingCriteria"], "Inclusion");
        assert_eq!(greet["Transitions"]["NextObservations"][0], "done");
        let press = &greet["Actions"][0];
        assert_eq!(press["Type"], "SendInstruction");
        assert_eq!(press["Actor"], "Customer");
        assert_eq!(press["Parameters"]["ActionType"], "SendInstruction");
        assert_eq!(press["Parameters"]["Instruction"]["Type"], "DtmfInput");
        assert_eq!(press["Parameters"]["Instruction"]["Properties"]["Value"], 1);

        let end = &value["Observations"][2]["Actions"][0];
        assert_eq!(end["Parameters"]["Command"]["Type"], "EndTest");
        assert!(end.get("Actor").is_none());

        let start = &value["Observations"][0]["Event"];
        assert!(start.get("MatchingCriteria").is_none());
    }

    #[test]
    fn test_deserializes_fixture_document() {
        let json = r#"{
            "Version": "2019-10-30",
            "Metadata": {},
            "Observations": [
                { "Identifier": "test-start",
                  "Event": { "Identifier": "init", "Type": "TestInitiated", "Actor": "System", "Properties": {} },
                  "Actions": [],
                  "Transitions": { "NextObservations": ["welcome"] } },
                { "Identifier": "welcome",
                  "Event": { "Identifier": "w", "Type": "MessageReceived", "Actor": "System",
                             "Properties": { "Text": "wisdom session" }, "MatchingCriteria": "Inclusion" },
                  "Actions": [ { "Identifier": "end", "Type": "TestControl",
                                 "Parameters": { "ActionType": "TestControl", "Command": { "Type": "EndTest" } } } ],
                  "Transitions": { "NextObservations": [] } }
            ]
        }"#;
        let graph: ObservationGraph = serde_json::from_str(json).unwrap();
        assert_eq!(graph.len(), 2);
        let welcome = graph.get("welcome").unwrap();
        assert_eq!(welcome.expected_event.identifier, "w");
        assert_eq!(welcome.expected_event.properties["Text"], "wisdom session");
        assert_eq!(welcome.expected_event.match_rule, Some(MatchRule::Inclusion));
        assert!(welcome.response_actions[0].is_termination());
        assert!(welcome.is_terminal());
    }

    #[test]
    fn test_deserialize_rejects_duplicates() {
        let json = r#"{ "Observations": [
            { "Identifier": "x", "Event": { "Type": "TestInitiated", "Actor": "System" } },
            { "Identifier": "x", "Event": { "Type": "TestInitiated", "Actor": "System" } }
        ] }"#;
        let err = serde_json::from_str::<ObservationGraph>(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate observation identifier 'x'"));
    }

    #[test]
    fn test_unknown_event_kind_carried_verbatim() {
        let json = r#"{ "Identifier": "bot", "Event": { "Type": "BotIntentMatched", "Actor": "System" } }"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert_eq!(
            obs.expected_event.kind,
            EventKind::Other("BotIntentMatched".to_string())
        );
        let back = serde_json::to_value(&obs).unwrap();
        assert_eq!(back["Event"]["Type"], "BotIntentMatched");
        assert!(obs.successors.is_empty());
    }
}
