//! Console reporting for suite runs

use colored::{ColoredString, Colorize};
use serde_json::Value;

use crate::backend::ObservationStatus;
use crate::classify::{ObservationOutcome, Verdict};
use crate::common::truncate;
use crate::graph::ValidationReport;

use super::runner::{Scenario, ScenarioOutcome, ScenarioResult, ScenarioStatus, SuiteObserver, SuiteReport};

/// Width of event text in one-line observation summaries
const TEXT_WIDTH: usize = 80;

fn status_label(status: ScenarioStatus) -> ColoredString {
    match status {
        ScenarioStatus::Passed => status.as_str().green().bold(),
        ScenarioStatus::TimedOut | ScenarioStatus::Stopped => status.as_str().yellow().bold(),
        _ => status.as_str().red().bold(),
    }
}

fn observation_icon(status: ObservationStatus) -> ColoredString {
    match status {
        ObservationStatus::Passed => "✓".green(),
        ObservationStatus::Failed => "✗".red(),
        ObservationStatus::Pending => "…".yellow(),
    }
}

fn event_text(event: Option<&Value>) -> &str {
    event
        .and_then(|e| e.pointer("/Properties/Text"))
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| value.to_string())
        .lines()
        .map(|l| format!("        {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints progress while a suite runs
pub struct ConsoleReporter {
    pub verbose: bool,
}

impl SuiteObserver for ConsoleReporter {
    fn scenario_started(&mut self, scenario: &Scenario) {
        println!(
            "\n{} {}",
            "Running Scenario:".blue().bold(),
            scenario.name.white().bold()
        );
        if !scenario.description.is_empty() {
            println!("  {}", scenario.description.dimmed());
        }
        if self.verbose {
            println!(
                "  Flow: {}  Observations: {}",
                scenario.target.flow_id.dimmed(),
                scenario.graph.len()
            );
        }
    }

    fn scenario_finished(&mut self, result: &ScenarioResult) {
        print_scenario_result(result, self.verbose);
    }
}

/// Print the outcome of one scenario
pub fn print_scenario_result(result: &ScenarioResult, verbose: bool) {
    match &result.outcome {
        ScenarioOutcome::Completed(verdict) => {
            println!(
                "  {} {}",
                status_label(result.status),
                verdict_line(verdict).dimmed()
            );
            if verbose || !result.passed() {
                print_observations(verdict, !result.passed());
            }
        }
        ScenarioOutcome::InvalidGraph(report) => {
            println!("  {}", status_label(result.status));
            print_validation(report);
        }
        ScenarioOutcome::SubmissionFailed { message } => {
            println!("  {} {}", status_label(result.status), message);
        }
    }
}

fn verdict_line(verdict: &Verdict) -> String {
    let mut line = format!("execution {}", verdict.execution_id);
    if let Some(summary) = verdict.observation_summary {
        line.push_str(&format!(
            " | obs: {}/{} pass, {} fail",
            summary.observations_passed, summary.total_observations, summary.observations_failed
        ));
    }
    if let Some(duration) = verdict.duration_seconds {
        line.push_str(&format!(" ({duration:.1}s)"));
    }
    line
}

/// Print per-observation detail, with full payloads for failures if asked
pub fn print_observations(verdict: &Verdict, detail: bool) {
    if verdict.records_unavailable {
        println!("    {}", "execution records unavailable".yellow());
        return;
    }
    if verdict.per_observation.is_empty() {
        println!("    {}", "no observation records".dimmed());
    }
    for outcome in &verdict.per_observation {
        print_outcome(outcome, detail);
    }
    if verdict.skipped_records > 0 {
        println!(
            "    {}",
            format!("{} malformed record(s) skipped", verdict.skipped_records).yellow()
        );
    }
}

fn print_outcome(outcome: &ObservationOutcome, detail: bool) {
    let text = truncate(event_text(outcome.expected_event.as_ref()), TEXT_WIDTH);
    println!(
        "    {} {}: {:?} | \"{}\"",
        observation_icon(outcome.status),
        outcome.identifier,
        outcome.status,
        text
    );
    if detail && outcome.status == ObservationStatus::Failed {
        if let Some(expected) = &outcome.expected_event {
            println!("      {}\n{}", "Expected event:".dimmed(), pretty(expected));
        }
        if let Some(actual) = &outcome.actual_event {
            println!("      {}\n{}", "Actual event:".dimmed(), pretty(actual));
        }
    }
}

/// Print validation issues, fatal first
pub fn print_validation(report: &ValidationReport) {
    for issue in report.fatal() {
        println!("    {} {}", "✗".red(), issue.message);
    }
    for issue in report.warnings() {
        println!("    {} {}", "!".yellow(), issue.message.dimmed());
    }
}

/// Print the closing summary table
pub fn print_summary(suite: &str, report: &SuiteReport) {
    let rule = "═".repeat(72);
    println!("\n{}", rule);
    println!("{} {}", "SUMMARY".bold(), suite.white().bold());
    println!("{}", "─".repeat(72));
    for result in &report.results {
        println!("  {:<18} {}", status_label(result.status), result.name);
    }
    for name in &report.skipped {
        println!("  {:<18} {}", "SKIPPED".dimmed(), name);
    }
    if let Some(gate) = &report.aborted_by {
        println!(
            "\n  {} '{}' did not pass, remaining scenarios were not run",
            "⚠".yellow(),
            gate
        );
    }
    println!("{}", "─".repeat(72));
    println!(
        "  {} passed, {} failed, {} timed out, {} skipped",
        report.passed().to_string().green(),
        report.failed().to_string().red(),
        report.count(ScenarioStatus::TimedOut).to_string().yellow(),
        report.skipped.len()
    );
    println!("{}", rule);
}
