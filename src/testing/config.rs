//! Test suite configuration types
//!
//! Defines the data structures for deserializing YAML test suites. Each
//! suite targets one flow and lists scenarios as observation graphs, either
//! inline or in a JSON/YAML file next to the suite.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::backend::Target;
use crate::common::{Error, Result};
use crate::graph::ObservationGraph;

use super::runner::{Scenario, SuitePolicy};

/// A test suite as written in a YAML file
#[derive(Deserialize, Debug)]
pub struct TestSuite {
    /// Name of the suite
    pub name: String,
    /// Optional description of what the suite covers
    pub description: Option<String>,
    /// Flow exercised by every scenario unless overridden
    pub target: TargetConfig,
    /// Polling overrides for this suite
    #[serde(default)]
    pub poll: PollConfig,
    /// Scenarios whose failure aborts the rest of the suite
    #[serde(default)]
    pub stop_on_failure_of: Vec<String>,
    /// Scenarios, run in order
    pub scenarios: Vec<ScenarioConfig>,
}

/// Flow under test
#[derive(Deserialize, Debug, Clone)]
pub struct TargetConfig {
    /// Instance hosting the flow; falls back to the config file
    pub instance_id: Option<String>,
    /// Flow the test call enters
    pub flow_id: String,
}

/// Polling overrides in seconds
#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct PollConfig {
    pub interval_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// One scenario entry
#[derive(Deserialize, Debug)]
pub struct ScenarioConfig {
    /// Scenario name, unique within the suite
    pub name: String,
    /// What the scenario exercises
    pub description: Option<String>,
    /// Run against a different flow than the suite target
    pub flow_id: Option<String>,
    /// Where the graph comes from
    #[serde(flatten)]
    pub source: GraphSource,
}

/// Inline graph or a path relative to the suite file
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum GraphSource {
    Inline { graph: ObservationGraph },
    File { graph_file: PathBuf },
}

/// A suite resolved into runnable scenarios
#[derive(Debug)]
pub struct LoadedSuite {
    pub name: String,
    pub description: Option<String>,
    pub poll: PollConfig,
    pub policy: SuitePolicy,
    pub scenarios: Vec<Scenario>,
}

impl LoadedSuite {
    /// Keep only the named scenarios, preserving suite order
    pub fn retain_only(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(missing) = names
            .iter()
            .find(|n| !self.scenarios.iter().any(|s| &s.name == *n))
        {
            return Err(Error::Config(format!(
                "Scenario '{}' not found in suite '{}'",
                missing, self.name
            )));
        }
        self.scenarios.retain(|s| names.contains(&s.name));
        Ok(())
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

/// Load a suite and resolve every scenario's graph and target
///
/// `default_instance` is used when the suite does not name an instance.
pub fn load_suite(path: &Path, default_instance: Option<&str>) -> Result<LoadedSuite> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read test suite '{}': {}", path.display(), e))
    })?;
    let suite: TestSuite = serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test suite: {}", e)))?;

    let suite_dir = path.parent().unwrap_or(Path::new("."));
    resolve(suite, suite_dir, default_instance)
}

fn resolve(suite: TestSuite, suite_dir: &Path, default_instance: Option<&str>) -> Result<LoadedSuite> {
    let instance_id = suite
        .target
        .instance_id
        .clone()
        .or_else(|| default_instance.map(str::to_string))
        .ok_or_else(|| {
            Error::Config(format!(
                "Suite '{}' has no target.instance_id and no default instance is configured",
                suite.name
            ))
        })?;

    let mut scenarios = Vec::with_capacity(suite.scenarios.len());
    for entry in suite.scenarios {
        if scenarios.iter().any(|s: &Scenario| s.name == entry.name) {
            return Err(Error::Config(format!(
                "Duplicate scenario name '{}' in suite '{}'",
                entry.name, suite.name
            )));
        }
        let graph = match entry.source {
            GraphSource::Inline { graph } => graph,
            GraphSource::File { graph_file } => load_graph(&suite_dir.join(graph_file))?,
        };
        scenarios.push(Scenario {
            name: entry.name,
            description: entry.description.unwrap_or_default(),
            target: Target {
                instance_id: instance_id.clone(),
                flow_id: entry.flow_id.unwrap_or_else(|| suite.target.flow_id.clone()),
            },
            graph,
        });
    }

    for gate in &suite.stop_on_failure_of {
        if !scenarios.iter().any(|s| &s.name == gate) {
            return Err(Error::Config(format!(
                "stop_on_failure_of names unknown scenario '{}'",
                gate
            )));
        }
    }

    Ok(LoadedSuite {
        name: suite.name,
        description: suite.description,
        poll: suite.poll,
        policy: SuitePolicy {
            stop_on_failure_of: suite.stop_on_failure_of,
        },
        scenarios,
    })
}

/// Read a graph document from JSON or YAML
fn load_graph(path: &Path) -> Result<ObservationGraph> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let parsed = if is_json {
        serde_json::from_str(&content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Config(format!("Invalid graph file '{}': {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
name: dtmf-menu
target:
  instance_id: inst-1
  flow_id: flow-main
poll:
  max_attempts: 3
stop_on_failure_of: [S1]
scenarios:
  - name: S1
    description: sales
    graph:
      Observations:
        - Identifier: start
          Event: { Type: TestInitiated, Actor: System }
          Transitions: { NextObservations: [done] }
        - Identifier: done
          Event: { Type: MessageReceived, Actor: System, Properties: { Text: "You selected sales" }, MatchingCriteria: Inclusion }
          Actions:
            - Identifier: end
              Type: TestControl
              Parameters: { ActionType: TestControl, Command: { Type: EndTest } }
  - name: S2
    flow_id: flow-other
    graph_file: s2.json
"#;

    const S2_JSON: &str = r#"{"Observations":[
        {"Identifier":"start","Event":{"Type":"TestInitiated","Actor":"System"}}
    ]}"#;

    #[test]
    fn test_load_suite_resolves_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, SUITE).unwrap();
        std::fs::write(dir.path().join("s2.json"), S2_JSON).unwrap();

        let suite = load_suite(&path, None).unwrap();
        assert_eq!(suite.name, "dtmf-menu");
        assert_eq!(suite.poll.max_attempts, Some(3));
        assert_eq!(suite.poll.interval_secs, None);
        assert_eq!(suite.policy.stop_on_failure_of, vec!["S1".to_string()]);

        let s1 = suite.scenario("S1").unwrap();
        assert_eq!(s1.target.flow_id, "flow-main");
        assert_eq!(s1.graph.len(), 2);
        assert!(s1.graph.get("done").unwrap().response_actions[0].is_termination());

        let s2 = suite.scenario("S2").unwrap();
        assert_eq!(s2.target.flow_id, "flow-other");
        assert_eq!(s2.target.instance_id, "inst-1");
        assert_eq!(s2.graph.len(), 1);
    }

    #[test]
    fn test_missing_instance_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, SUITE.replace("  instance_id: inst-1\n", "")).unwrap();
        std::fs::write(dir.path().join("s2.json"), S2_JSON).unwrap();

        assert!(matches!(load_suite(&path, None), Err(Error::Config(_))));
        let suite = load_suite(&path, Some("from-config")).unwrap();
        assert_eq!(suite.scenarios[0].target.instance_id, "from-config");
    }

    #[test]
    fn test_unknown_gate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, SUITE.replace("[S1]", "[S9]")).unwrap();
        std::fs::write(dir.path().join("s2.json"), S2_JSON).unwrap();
        let err = load_suite(&path, None).unwrap_err();
        assert!(err.to_string().contains("S9"));
    }

    #[test]
    fn test_retain_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, SUITE).unwrap();
        std::fs::write(dir.path().join("s2.json"), S2_JSON).unwrap();

        let mut suite = load_suite(&path, None).unwrap();
        assert!(suite.retain_only(&["S9".to_string()]).is_err());
        suite.retain_only(&["S2".to_string()]).unwrap();
        assert_eq!(suite.scenarios.len(), 1);
        assert_eq!(suite.scenarios[0].name, "S2");
    }
}
