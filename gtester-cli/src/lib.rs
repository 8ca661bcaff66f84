use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use gtester::{
    CheckSummary, Event, Harness, Pool, Reporter, RunSummary, Style, TestCase, Value,
};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Built-in functions the CLI can run against fixed cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Candidate {
    /// Sum of all integer arguments
    Sum,
    /// Sum that silently drops every 2
    BuggySum,
}

impl Candidate {
    /// Apply to a flat list of integer arguments, or to a single list argument.
    pub fn call(self, case: &TestCase) -> gtester::Result<Value> {
        let xs = match case.args() {
            [list @ Value::Seq(_)] => list.as_ints()?,
            args => args
                .iter()
                .map(Value::as_int)
                .collect::<gtester::Result<_>>()?,
        };
        let total = match self {
            Candidate::Sum => xs.iter().sum(),
            Candidate::BuggySum => xs.iter().filter(|&&x| x != 2).sum(),
        };
        Ok(Value::Int(total))
    }
}

/// The bundled demonstration: `[(n, m), xs]` with `n` in `[1, 10]`,
/// `m` in `[-10, 10]` and `xs` holding `n` values drawn like `m`.
///
/// The candidate drops every 2 from the sum, so any cycle whose list
/// contains a 2 fails.
pub fn demo_harness() -> Harness {
    let mut pool = Pool::new();
    let ten = pool.constant(10);
    let n = pool.positive_int(ten);
    let m = pool.int_range(-10, 10);
    let pair = pool.tuple(vec![n, m]);
    let xs = pool.sequence(m, n);

    Harness::new(
        pool,
        |case: &TestCase| {
            let xs = case.arg(1)?.as_ints()?;
            Ok(Value::Int(xs.iter().filter(|&&x| x != 2).sum()))
        },
        |case: &TestCase| Ok(Value::Int(case.arg(1)?.as_ints()?.iter().sum())),
        vec![pair, xs],
        vec![n, m, pair, xs],
    )
}

/// Parse fixed cases from JSON text: `[{"args": [...], "accepted": [...]}]`.
pub fn parse_cases(text: &str) -> Result<Vec<TestCase>> {
    serde_json::from_str(text).context("invalid test case file")
}

/// Load fixed cases from a JSON file.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cases = parse_cases(&text)?;
    debug!(count = cases.len(), path = %path.display(), "loaded fixed cases");
    Ok(cases)
}

/// Format header output
pub fn format_header(mode: &str) -> String {
    let title = format!("gtester {mode}");
    format!(
        "{}\n{}\n",
        Style::Header.apply(&title).bold(),
        Style::Header.apply(&"=".repeat(title.len()))
    )
}

/// Format the totals of a generated run
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{} {}\n",
        Style::Underline.apply("Cycles run:"),
        summary.cycles_run
    ));
    output.push_str(&format!(
        "  Passed: {}\n",
        Style::Success.apply(&summary.passed.to_string())
    ));
    output.push_str(&format!(
        "  Failed: {}\n",
        Style::Failure.apply(&summary.failed.to_string())
    ));
    output.push_str(&format!(
        "  Timed out: {}\n",
        Style::Warning.apply(&summary.timed_out.to_string())
    ));
    output.push_str(&format!(
        "  Errors: {}\n",
        Style::Failure.apply(&summary.errored.to_string())
    ));
    if summary.aborted {
        output.push_str(&format!(
            "{}\n",
            Style::Failure.apply("Run aborted early").bold()
        ));
    }
    output
}

/// Format the totals of a fixed-list check
pub fn format_check_summary(summary: &CheckSummary) -> String {
    let line = format!("{} of {} cases failed", summary.failed, summary.checked);
    if summary.failed == 0 {
        format!("{}\n", Style::Success.apply(&line))
    } else {
        format!("{}\n", Style::Failure.apply(&line).bold())
    }
}

/// Format a `done/total` progress bar
pub fn format_progress(done: usize, total: usize) -> String {
    const WIDTH: usize = 30;
    let filled = if total == 0 {
        WIDTH
    } else {
        done.min(total) * WIDTH / total
    };
    format!(
        "[{}{}] {done}/{total} cycles",
        "#".repeat(filled),
        ".".repeat(WIDTH - filled)
    )
}

/// Forwards events to `inner` while keeping a progress line on `out`.
///
/// The line is cleared before each forwarded event so reports are never
/// interleaved with it. A disabled reporter only forwards.
pub struct ProgressReporter<R: Reporter, W: Write> {
    inner: R,
    out: W,
    enabled: bool,
    drawn: usize,
}

impl<R: Reporter, W: Write> ProgressReporter<R, W> {
    /// Wrap `inner`, drawing progress on `out` only when `enabled`.
    pub fn new(inner: R, out: W, enabled: bool) -> Self {
        ProgressReporter {
            inner,
            out,
            enabled,
            drawn: 0,
        }
    }

    /// Erase a pending progress line.
    pub fn finish(&mut self) {
        if self.drawn > 0 {
            let blank = " ".repeat(self.drawn);
            self.write(&format!("\r{blank}\r"));
            self.drawn = 0;
        }
    }

    /// The wrapped reporter and the progress writer.
    pub fn into_parts(self) -> (R, W) {
        (self.inner, self.out)
    }

    fn write(&mut self, text: &str) {
        if let Err(error) = write!(self.out, "{text}").and_then(|_| self.out.flush()) {
            warn!(%error, "failed to write progress");
        }
    }
}

impl<R: Reporter, W: Write> Reporter for ProgressReporter<R, W> {
    fn report(&mut self, event: &Event) {
        self.finish();
        self.inner.report(event);
    }

    fn progress(&mut self, done: usize, total: usize) {
        self.inner.progress(done, total);
        if !self.enabled {
            return;
        }
        let line = format_progress(done, total);
        let padding = " ".repeat(self.drawn.saturating_sub(line.len()));
        self.write(&format!("\r{line}{padding}"));
        self.drawn = line.len();
    }
}
