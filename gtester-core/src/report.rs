//! Reporting of cycle outcomes.
//!
//! The harness only ever pushes [`Event`]s into a [`Reporter`]; it never reads
//! anything back. Colors are applied here, at the rendering boundary.

use crate::value::{render_list, Value};
use colored::{ColoredString, Colorize};
use std::io::{self, Write};
use std::time::Duration;
use tracing::warn;

/// Fixed palette used by the console renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Header,
    InfoBlue,
    InfoCyan,
    Success,
    Warning,
    Failure,
    Bold,
    Underline,
}

impl Style {
    /// Apply the style to `text`.
    pub fn apply(self, text: &str) -> ColoredString {
        match self {
            Style::Header => text.bright_magenta(),
            Style::InfoBlue => text.bright_blue(),
            Style::InfoCyan => text.bright_cyan(),
            Style::Success => text.bright_green(),
            Style::Warning => text.bright_yellow(),
            Style::Failure => text.bright_red(),
            Style::Bold => text.bold(),
            Style::Underline => text.underline(),
        }
    }
}

/// What happened in one cycle or fixed-list case.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 1-based test number.
    pub number: usize,
    pub args: Vec<Value>,
    pub actual: Option<Value>,
    pub expected: Vec<Value>,
    pub elapsed: Duration,
    pub limit: Option<Duration>,
    pub message: Option<String>,
}

impl CycleReport {
    /// Report for test `number` with nothing recorded beyond its arguments.
    pub fn new(number: usize, args: Vec<Value>) -> Self {
        CycleReport {
            number,
            args,
            actual: None,
            expected: Vec::new(),
            elapsed: Duration::ZERO,
            limit: None,
            message: None,
        }
    }
}

/// Events emitted by the harness.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A passing cycle. `detailed` asks for arguments and result.
    Passed { cycle: CycleReport, detailed: bool },
    /// The candidate disagreed with the reference.
    Failed(CycleReport),
    /// Correct answer, but slower than the limit.
    TimedOut(CycleReport),
    /// Candidate or reference returned an error or panicked.
    Errored(CycleReport),
    /// The failure budget ran out.
    Aborted { failures: usize },
    /// A fixed-list case whose answer was not acceptable.
    CaseFailed(CycleReport),
}

/// Write-only sink for harness events.
pub trait Reporter {
    fn report(&mut self, event: &Event);

    /// Called after every generated cycle with the cycles done so far and
    /// the cycles requested.
    fn progress(&mut self, _done: usize, _total: usize) {}
}

fn secs(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

struct Painter {
    color: bool,
}

impl Painter {
    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            style.apply(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn banner(&self, number: usize, label: &str, style: Style, number_style: Style) -> String {
        format!(
            "{}{}{}",
            self.paint("======== TEST ", style),
            self.paint(&format!("#{number}"), number_style),
            self.paint(&format!(" {label} ========"), style),
        )
    }
}

/// Render an event as report lines.
pub fn render(event: &Event, color: bool) -> String {
    let p = Painter { color };
    let mut lines = Vec::new();
    match event {
        Event::Passed { cycle, detailed } => {
            lines.push(p.banner(cycle.number, "PASSED", Style::Success, Style::InfoBlue));
            lines.push(p.paint(&format!("Time: {}", secs(cycle.elapsed)), Style::Bold));
            if *detailed {
                lines.push(format!("Args: {}", render_list(&cycle.args)));
                if let Some(actual) = &cycle.actual {
                    lines.push(format!("Result: {actual}"));
                }
            }
        }
        Event::Failed(cycle) => {
            lines.push(p.banner(cycle.number, "FAILED", Style::Failure, Style::InfoCyan));
            lines.push(format!("Args: {}", render_list(&cycle.args)));
            if let Some(actual) = &cycle.actual {
                lines.push(format!("Got: {actual}"));
            }
            match cycle.expected.as_slice() {
                [single] => lines.push(format!("Expected: {single}")),
                many => lines.push(format!("Expected: {}", render_list(many))),
            }
            lines.push(p.paint(&format!("Time: {}", secs(cycle.elapsed)), Style::Bold));
        }
        Event::TimedOut(cycle) => {
            lines.push(p.banner(cycle.number, "TIMEOUT", Style::Warning, Style::InfoCyan));
            lines.push(format!("Args: {}", render_list(&cycle.args)));
            let limit = cycle.limit.map(secs).unwrap_or_else(|| "-".to_string());
            lines.push(p.paint(
                &format!("Time: {} (limit {limit})", secs(cycle.elapsed)),
                Style::Bold,
            ));
        }
        Event::Errored(cycle) => {
            lines.push(p.banner(cycle.number, "ERROR", Style::Failure, Style::InfoCyan));
            lines.push(format!("Args: {}", render_list(&cycle.args)));
            if let Some(message) = &cycle.message {
                lines.push(p.paint(&format!("Error: {message}"), Style::Failure));
            }
        }
        Event::Aborted { failures } => {
            lines.push(p.paint(
                &format!("Too many failures ({failures}), aborting"),
                Style::Failure,
            ));
        }
        Event::CaseFailed(cycle) => {
            lines.push(p.banner(cycle.number, "FAILED", Style::Failure, Style::InfoCyan));
            lines.push(format!("Args: {}", render_list(&cycle.args)));
            match (&cycle.actual, &cycle.message) {
                (Some(actual), _) => lines.push(format!("Got: {actual}")),
                (None, Some(message)) => {
                    lines.push(p.paint(&format!("Error: {message}"), Style::Failure))
                }
                (None, None) => {}
            }
            lines.push(format!("Expected one of: {}", render_list(&cycle.expected)));
        }
    }
    lines.join("\n")
}

/// Line-oriented reporter writing to any `io::Write`.
pub struct ConsoleReporter<W: Write> {
    out: W,
    color: bool,
}

impl ConsoleReporter<io::Stdout> {
    /// Reporter writing to standard output.
    pub fn stdout(color: bool) -> Self {
        ConsoleReporter::new(io::stdout(), color)
    }
}

impl<W: Write> ConsoleReporter<W> {
    /// Reporter writing to `out`, with ANSI colors when `color` is set.
    pub fn new(out: W, color: bool) -> Self {
        ConsoleReporter { out, color }
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, event: &Event) {
        let text = render(event, self.color);
        if let Err(error) = writeln!(self.out, "{text}") {
            warn!(%error, "failed to write report");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<Event>,
    /// Last `(done, total)` progress update.
    pub progress: Option<(usize, usize)>,
}

impl Recorder {
    /// Empty recorder.
    pub fn new() -> Self {
        Recorder::default()
    }

    /// Test numbers of failed cycles and cases.
    pub fn failed_numbers(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Failed(cycle) | Event::CaseFailed(cycle) => Some(cycle.number),
                _ => None,
            })
            .collect()
    }

    /// Test numbers of reported passes.
    pub fn passed_numbers(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Passed { cycle, .. } => Some(cycle.number),
                _ => None,
            })
            .collect()
    }

    /// Whether the run ran out of failure budget.
    pub fn aborted(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, Event::Aborted { .. }))
    }
}

impl Reporter for Recorder {
    fn report(&mut self, event: &Event) {
        self.events.push(event.clone());
    }

    fn progress(&mut self, done: usize, total: usize) {
        self.progress = Some((done, total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_cycle() -> CycleReport {
        CycleReport {
            number: 3,
            args: vec![
                Value::Tuple(vec![Value::Int(4), Value::Int(-2)]),
                Value::from(vec![2, -2, 7, 1]),
            ],
            actual: Some(Value::Int(6)),
            expected: vec![Value::Int(8)],
            elapsed: Duration::from_millis(12),
            limit: Some(Duration::from_millis(500)),
            message: None,
        }
    }

    #[test]
    fn test_render_failure_plain() {
        let text = render(&Event::Failed(failed_cycle()), false);
        assert_eq!(
            text,
            "======== TEST #3 FAILED ========\n\
             Args: [(4, -2), [2, -2, 7, 1]]\n\
             Got: 6\n\
             Expected: 8\n\
             Time: 0.012s"
        );
    }

    #[test]
    fn test_render_failure_with_several_expected() {
        let mut cycle = failed_cycle();
        cycle.expected = vec![Value::Int(8), Value::Int(9)];
        let text = render(&Event::Failed(cycle), false);
        assert!(text.contains("\nExpected: [8, 9]\n"));
    }

    #[test]
    fn test_render_pass_levels() {
        let mut cycle = failed_cycle();
        cycle.actual = Some(Value::Int(8));
        let summary = render(
            &Event::Passed {
                cycle: cycle.clone(),
                detailed: false,
            },
            false,
        );
        assert_eq!(summary, "======== TEST #3 PASSED ========\nTime: 0.012s");

        let detailed = render(
            &Event::Passed {
                cycle,
                detailed: true,
            },
            false,
        );
        assert!(detailed.ends_with("Args: [(4, -2), [2, -2, 7, 1]]\nResult: 8"));
    }

    #[test]
    fn test_render_timeout_and_abort() {
        let mut cycle = failed_cycle();
        cycle.elapsed = Duration::from_millis(1300);
        let text = render(&Event::TimedOut(cycle), false);
        assert!(text.starts_with("======== TEST #3 TIMEOUT ========"));
        assert!(text.ends_with("Time: 1.300s (limit 0.500s)"));

        let text = render(&Event::Aborted { failures: 3 }, false);
        assert_eq!(text, "Too many failures (3), aborting");
    }

    #[test]
    fn test_console_reporter_writes_lines() {
        let mut reporter = ConsoleReporter::new(Vec::new(), false);
        reporter.report(&Event::Aborted { failures: 1 });
        reporter.report(&Event::Aborted { failures: 2 });
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(
            out,
            "Too many failures (1), aborting\nToo many failures (2), aborting\n"
        );
    }

    #[test]
    fn test_recorder_queries() {
        let mut recorder = Recorder::new();
        recorder.report(&Event::Failed(failed_cycle()));
        recorder.report(&Event::Passed {
            cycle: CycleReport::new(4, vec![]),
            detailed: false,
        });
        recorder.report(&Event::Aborted { failures: 1 });
        assert_eq!(recorder.failed_numbers(), vec![3]);
        assert_eq!(recorder.passed_numbers(), vec![4]);
        assert!(recorder.aborted());
    }

    #[test]
    fn snapshot_failure_report() {
        let text = render(&Event::Failed(failed_cycle()), false);
        archetype::snap("failure_report", text);
    }

    #[test]
    fn snapshot_case_failure_report() {
        let cycle = CycleReport {
            number: 2,
            args: vec![Value::Int(1), Value::Int(1)],
            actual: Some(Value::Int(2)),
            expected: vec![Value::Int(99)],
            elapsed: Duration::ZERO,
            limit: None,
            message: None,
        };
        archetype::snap("case_failure_report", render(&Event::CaseFailed(cycle), false));
    }
}
