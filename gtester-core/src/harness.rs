//! Differential test harness.
//!
//! A [`Harness`] owns a generator [`Pool`], the function under test and a
//! trusted reference. Every cycle regenerates the pool in the caller's order,
//! snapshots the argument generators into a [`TestCase`], runs both functions
//! and reports how the candidate did.

use crate::case::TestCase;
use crate::data::{Config, Source};
use crate::error::{GTesterError, Result};
use crate::gen::{GenId, Pool};
use crate::report::{CycleReport, Event, Reporter};
use crate::value::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Candidate or reference function.
pub type TestFn = Box<dyn Fn(&TestCase) -> Result<Value>>;

/// Classification of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Timeout,
    Error,
}

/// Classify a cycle whose functions both returned.
///
/// A wrong answer is a failure even when it was also slow.
pub fn classify(accepted: bool, elapsed: Duration, limit: Duration) -> Verdict {
    if !accepted {
        Verdict::Fail
    } else if elapsed > limit {
        Verdict::Timeout
    } else {
        Verdict::Pass
    }
}

/// Totals for one harness run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles_run: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub aborted: bool,
}

impl RunSummary {
    fn record(&mut self, verdict: Verdict) {
        self.cycles_run += 1;
        match verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::Fail => self.failed += 1,
            Verdict::Timeout => self.timed_out += 1,
            Verdict::Error => self.errored += 1,
        }
    }

    /// Cycles counted against the failure budget.
    pub fn failures(&self) -> usize {
        self.failed + self.errored
    }

    /// No failures, errors or abort. Timeouts are warnings only.
    pub fn is_clean(&self) -> bool {
        self.failures() == 0 && !self.aborted
    }
}

/// Totals for a fixed-list check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub checked: usize,
    pub failed: usize,
}

pub struct Harness {
    pool: Pool,
    candidate: TestFn,
    reference: Option<TestFn>,
    args: Vec<GenId>,
    order: Vec<GenId>,
}

impl Harness {
    /// Create a differential harness.
    ///
    /// `args` are the generators whose values become the call arguments;
    /// `order` is every generator to regenerate each cycle, in dependency
    /// order.
    pub fn new<C, R>(
        pool: Pool,
        candidate: C,
        reference: R,
        args: Vec<GenId>,
        order: Vec<GenId>,
    ) -> Self
    where
        C: Fn(&TestCase) -> Result<Value> + 'static,
        R: Fn(&TestCase) -> Result<Value> + 'static,
    {
        Harness {
            pool,
            candidate: Box::new(candidate),
            reference: Some(Box::new(reference)),
            args,
            order,
        }
    }

    /// Create a harness that only measures the candidate's running time.
    pub fn profiling<C>(pool: Pool, candidate: C, args: Vec<GenId>, order: Vec<GenId>) -> Self
    where
        C: Fn(&TestCase) -> Result<Value> + 'static,
    {
        Harness {
            pool,
            candidate: Box::new(candidate),
            reference: None,
            args,
            order,
        }
    }

    /// The generators, with the values of the last generated cycle.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Build the test case for cycle `cycle` of a run seeded with `seed`.
    pub fn generate(&mut self, seed: u64, cycle: usize) -> Result<TestCase> {
        generate_case(&mut self.pool, &self.args, &self.order, seed, cycle)
    }

    /// Run a timed differential test.
    pub fn test(&mut self, config: &Config, reporter: &mut dyn Reporter) -> Result<RunSummary> {
        let limit = config.time_limit()?;
        let reference = self
            .reference
            .as_ref()
            .ok_or(GTesterError::MissingReference)?;

        info!(
            cycles = config.cycles,
            fail_on = config.fail_on,
            seed = config.seed,
            "starting differential run"
        );

        let mut summary = RunSummary::default();
        for index in 0..config.cycles {
            let mut case =
                generate_case(&mut self.pool, &self.args, &self.order, config.seed, index)?;
            let mut cycle = CycleReport::new(index + 1, case.args().to_vec());
            cycle.limit = Some(limit);

            let start = Instant::now();
            let actual = invoke(&self.candidate, &case);
            cycle.elapsed = start.elapsed();

            let outcome = actual.and_then(|actual| {
                let expected = invoke(reference, &case)?;
                Ok((actual, expected))
            });

            let verdict = match outcome {
                Ok((actual, expected)) => {
                    case.set_accepted(vec![expected]);
                    let verdict = classify(case.accepts(&actual), cycle.elapsed, limit);
                    cycle.expected = case.accepted().to_vec();
                    let quiet = config.quiet_results.contains(&actual);
                    cycle.actual = Some(actual);
                    match verdict {
                        Verdict::Fail => reporter.report(&Event::Failed(cycle)),
                        Verdict::Timeout => reporter.report(&Event::TimedOut(cycle)),
                        _ if config.print_on_pass > 0 && !quiet => reporter.report(&Event::Passed {
                            cycle,
                            detailed: config.print_on_pass > 1,
                        }),
                        _ => {}
                    }
                    verdict
                }
                Err(error) => {
                    cycle.message = Some(error.to_string());
                    reporter.report(&Event::Errored(cycle));
                    Verdict::Error
                }
            };

            debug!(cycle = index + 1, ?verdict, "cycle classified");
            summary.record(verdict);
            reporter.progress(index + 1, config.cycles);

            if config.fail_on > 0 && summary.failures() >= config.fail_on {
                info!(failures = summary.failures(), "failure budget exhausted");
                reporter.report(&Event::Aborted {
                    failures: summary.failures(),
                });
                summary.aborted = true;
                break;
            }
        }

        info!(?summary, "differential run finished");
        Ok(summary)
    }

    /// Run the candidate only, reporting passes and timeouts.
    ///
    /// The reference is never called and nothing counts as a mismatch, so
    /// the run never aborts.
    pub fn profile(&mut self, config: &Config, reporter: &mut dyn Reporter) -> Result<RunSummary> {
        let limit = config.time_limit()?;
        info!(cycles = config.cycles, seed = config.seed, "starting profile run");

        let mut summary = RunSummary::default();
        for index in 0..config.cycles {
            let case = generate_case(&mut self.pool, &self.args, &self.order, config.seed, index)?;
            let mut cycle = CycleReport::new(index + 1, case.args().to_vec());
            cycle.limit = Some(limit);

            let start = Instant::now();
            let result = invoke(&self.candidate, &case);
            cycle.elapsed = start.elapsed();

            let verdict = match result {
                Err(error) => {
                    cycle.message = Some(error.to_string());
                    reporter.report(&Event::Errored(cycle));
                    Verdict::Error
                }
                Ok(_) if cycle.elapsed > limit => {
                    reporter.report(&Event::TimedOut(cycle));
                    Verdict::Timeout
                }
                Ok(actual) => {
                    if config.print_on_pass > 0 && !config.quiet_results.contains(&actual) {
                        cycle.actual = Some(actual);
                        reporter.report(&Event::Passed {
                            cycle,
                            detailed: config.print_on_pass > 1,
                        });
                    }
                    Verdict::Pass
                }
            };

            debug!(cycle = index + 1, ?verdict, "profile cycle classified");
            summary.record(verdict);
            reporter.progress(index + 1, config.cycles);
        }

        info!(?summary, "profile run finished");
        Ok(summary)
    }
}

/// Run `candidate` against pre-built cases, reporting only failures.
pub fn check_cases<F>(cases: &[TestCase], candidate: F, reporter: &mut dyn Reporter) -> CheckSummary
where
    F: Fn(&TestCase) -> Result<Value>,
{
    let mut summary = CheckSummary::default();
    for (index, case) in cases.iter().enumerate() {
        summary.checked += 1;
        let result = invoke(&candidate, case);
        if matches!(&result, Ok(answer) if case.accepts(answer)) {
            continue;
        }

        summary.failed += 1;
        let mut cycle = CycleReport::new(index + 1, case.args().to_vec());
        cycle.expected = case.accepted().to_vec();
        match result {
            Ok(answer) => cycle.actual = Some(answer),
            Err(error) => cycle.message = Some(error.to_string()),
        }
        debug!(case = index + 1, "fixed case failed");
        reporter.report(&Event::CaseFailed(cycle));
    }
    summary
}

fn generate_case(
    pool: &mut Pool,
    args: &[GenId],
    order: &[GenId],
    seed: u64,
    cycle: usize,
) -> Result<TestCase> {
    let mut source = Source::for_cycle(seed, cycle);
    pool.regenerate_all(order, &mut source)?;
    Ok(TestCase::from_args(pool.values(args)?))
}

/// Call a function under test, turning a panic into an error for this cycle.
fn invoke<F>(f: &F, case: &TestCase) -> Result<Value>
where
    F: Fn(&TestCase) -> Result<Value> + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| f(case))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%message, "function under test panicked");
            Err(GTesterError::Candidate(format!("panicked: {message}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Recorder;
    use std::cell::Cell;
    use std::rc::Rc;

    /// n in [1, 10], m in [-10, 10], args = [(n, m), list of n values of m].
    fn sum_pool() -> (Pool, Vec<GenId>, Vec<GenId>) {
        let mut pool = Pool::new();
        let ten = pool.constant(10);
        let n = pool.positive_int(ten);
        let m = pool.int_range(-10, 10);
        let b = pool.tuple(vec![n, m]);
        let a = pool.sequence(m, n);
        (pool, vec![b, a], vec![n, m, b, a])
    }

    fn sum(case: &TestCase) -> Result<Value> {
        Ok(Value::Int(case.arg(1)?.as_ints()?.iter().sum()))
    }

    fn sum_skipping_twos(case: &TestCase) -> Result<Value> {
        Ok(Value::Int(
            case.arg(1)?.as_ints()?.iter().filter(|&&x| x != 2).sum(),
        ))
    }

    #[test]
    fn test_classify_priority() {
        let limit = Duration::from_millis(10);
        let slow = Duration::from_millis(20);
        let fast = Duration::from_millis(1);
        assert_eq!(classify(false, slow, limit), Verdict::Fail);
        assert_eq!(classify(false, fast, limit), Verdict::Fail);
        assert_eq!(classify(true, slow, limit), Verdict::Timeout);
        assert_eq!(classify(true, fast, limit), Verdict::Pass);
        assert_eq!(classify(true, limit, limit), Verdict::Pass);
    }

    #[test]
    fn test_differential_run_flags_twos() {
        let (pool, args, order) = sum_pool();
        let mut harness = Harness::new(pool, sum_skipping_twos, sum, args, order);
        let config = Config::default()
            .with_cycles(60)
            .with_time_limit_secs(5.0)
            .with_print_on_pass(1);
        let mut recorder = Recorder::new();
        let summary = harness.test(&config, &mut recorder).unwrap();

        assert_eq!(summary.cycles_run, 60);
        assert_eq!(summary.passed + summary.failed, 60);

        for index in 0..60 {
            let case = harness.generate(0, index).unwrap();
            let has_two = case.arg(1).unwrap().as_ints().unwrap().contains(&2);
            let number = index + 1;
            if has_two {
                assert!(recorder.failed_numbers().contains(&number));
            } else {
                assert!(recorder.passed_numbers().contains(&number));
            }
        }
    }

    #[test]
    fn test_abort_after_budget() {
        let calls = Rc::new(Cell::new(0));
        let reference_calls = Rc::new(Cell::new(0));
        let (c, r) = (calls.clone(), reference_calls.clone());

        let mut pool = Pool::new();
        let n = pool.int_range(0, 5);
        let mut harness = Harness::new(
            pool,
            move |_: &TestCase| {
                c.set(c.get() + 1);
                Ok(Value::Int(-1))
            },
            move |_: &TestCase| {
                r.set(r.get() + 1);
                Ok(Value::Int(0))
            },
            vec![n],
            vec![n],
        );

        let config = Config::default().with_cycles(10).with_fail_on(3);
        let mut recorder = Recorder::new();
        let summary = harness.test(&config, &mut recorder).unwrap();

        assert_eq!(calls.get(), 3);
        assert_eq!(reference_calls.get(), 3);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.cycles_run, 3);
        assert!(summary.aborted);
        assert!(recorder.aborted());
        assert_eq!(
            recorder.events.last(),
            Some(&Event::Aborted { failures: 3 })
        );
    }

    #[test]
    fn test_unlimited_budget_runs_everything() {
        let mut pool = Pool::new();
        let n = pool.int_range(0, 5);
        let mut harness = Harness::new(
            pool,
            |_: &TestCase| Ok(Value::Int(-1)),
            |_: &TestCase| Ok(Value::Int(0)),
            vec![n],
            vec![n],
        );
        let config = Config::default().with_cycles(10);
        let summary = harness.test(&config, &mut Recorder::new()).unwrap();
        assert_eq!(summary.failed, 10);
        assert!(!summary.aborted);
    }

    #[test]
    fn test_slow_correct_answer_is_timeout() {
        let mut pool = Pool::new();
        let n = pool.int_range(0, 5);
        let mut harness = Harness::new(
            pool,
            |case: &TestCase| {
                std::thread::sleep(Duration::from_millis(15));
                Ok(case.arg(0)?.clone())
            },
            |case: &TestCase| Ok(case.arg(0)?.clone()),
            vec![n],
            vec![n],
        );
        let config = Config::default()
            .with_cycles(2)
            .with_time_limit_secs(0.001)
            .with_fail_on(1);
        let mut recorder = Recorder::new();
        let summary = harness.test(&config, &mut recorder).unwrap();

        // Timeouts never touch the failure budget
        assert_eq!(summary.timed_out, 2);
        assert!(!summary.aborted);
        assert!(summary.is_clean());
        assert!(matches!(recorder.events[0], Event::TimedOut(_)));
    }

    #[test]
    fn test_candidate_errors_and_panics_are_per_cycle() {
        let mut pool = Pool::new();
        let n = pool.int_range(0, 1);
        let mut harness = Harness::new(
            pool,
            |case: &TestCase| match case.arg(0)?.as_int()? {
                0 => Err(GTesterError::candidate("zero")),
                _ => panic!("boom"),
            },
            |_: &TestCase| Ok(Value::Int(0)),
            vec![n],
            vec![n],
        );
        let config = Config::default().with_cycles(8);
        let mut recorder = Recorder::new();
        let summary = harness.test(&config, &mut recorder).unwrap();

        assert_eq!(summary.errored, 8);
        assert_eq!(summary.failures(), 8);
        for event in &recorder.events {
            match event {
                Event::Errored(cycle) => {
                    let message = cycle.message.as_deref().unwrap();
                    assert!(message == "zero" || message == "panicked: boom");
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_quiet_results_are_not_reported() {
        let mut pool = Pool::new();
        let n = pool.int_range(0, 1);
        let mut harness = Harness::new(
            pool,
            |case: &TestCase| Ok(case.arg(0)?.clone()),
            |case: &TestCase| Ok(case.arg(0)?.clone()),
            vec![n],
            vec![n],
        );
        let config = Config::default()
            .with_cycles(20)
            .with_print_on_pass(1)
            .with_quiet_results(vec![Value::Int(0)]);
        let mut recorder = Recorder::new();
        let summary = harness.test(&config, &mut recorder).unwrap();

        assert_eq!(summary.passed, 20);
        for event in &recorder.events {
            if let Event::Passed { cycle, .. } = event {
                assert_eq!(cycle.actual, Some(Value::Int(1)));
            }
        }
    }

    #[test]
    fn test_silent_passes() {
        let (pool, args, order) = sum_pool();
        let mut harness = Harness::new(pool, sum, sum, args, order);
        let mut recorder = Recorder::new();
        let summary = harness
            .test(&Config::default().with_cycles(10), &mut recorder)
            .unwrap();
        assert_eq!(summary.passed, 10);
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn test_generation_error_fails_fast() {
        let mut pool = Pool::new();
        let n = pool.int_range(3, 1);
        let mut harness = Harness::new(pool, sum, sum, vec![n], vec![n]);
        let result = harness.test(&Config::default(), &mut Recorder::new());
        assert_eq!(result, Err(GTesterError::InvalidBounds { low: 3, high: 1 }));
    }

    #[test]
    fn test_unallocatable_length_fails_fast() {
        let mut pool = Pool::new();
        let e = pool.int_range(0, 1);
        let len = pool.constant(1_000_000_000_000_000_000i64);
        let xs = pool.sequence(e, len);
        let mut harness = Harness::new(pool, sum, sum, vec![xs], vec![xs]);
        let config = Config::default().with_cycles(1);

        let result = harness.test(&config, &mut Recorder::new());
        assert_eq!(
            result,
            Err(GTesterError::InvalidLength {
                length: 1_000_000_000_000_000_000
            })
        );
        assert!(harness.profile(&config, &mut Recorder::new()).is_err());
    }

    #[test]
    fn test_progress_after_every_cycle() {
        let (pool, args, order) = sum_pool();
        let mut harness = Harness::new(pool, sum, sum_skipping_twos, args, order);

        let mut recorder = Recorder::new();
        harness
            .test(&Config::default().with_cycles(12), &mut recorder)
            .unwrap();
        assert_eq!(recorder.progress, Some((12, 12)));

        // An aborted run stops counting at the cycle that ran out of budget
        let mut recorder = Recorder::new();
        let config = Config::default().with_cycles(500).with_fail_on(1);
        let summary = harness.test(&config, &mut recorder).unwrap();
        assert!(summary.aborted);
        assert_eq!(recorder.progress, Some((summary.cycles_run, 500)));
    }

    #[test]
    fn test_determinism_across_harnesses() {
        let (p1, a1, o1) = sum_pool();
        let (p2, a2, o2) = sum_pool();
        let mut h1 = Harness::new(p1, sum, sum, a1, o1);
        let mut h2 = Harness::new(p2, sum, sum, a2, o2);
        for cycle in [0, 5, 1, 5] {
            assert_eq!(h1.generate(9, cycle).unwrap(), h2.generate(9, cycle).unwrap());
        }
    }

    #[test]
    fn test_profile_never_calls_reference() {
        let (pool, args, order) = sum_pool();
        let mut harness = Harness::profiling(pool, sum_skipping_twos, args, order);
        let config = Config::default().with_cycles(15).with_print_on_pass(1);
        let mut recorder = Recorder::new();
        let summary = harness.profile(&config, &mut recorder).unwrap();

        assert_eq!(summary.passed, 15);
        assert_eq!(summary.failed, 0);
        assert_eq!(recorder.passed_numbers().len(), 15);

        let missing = harness.test(&config, &mut Recorder::new());
        assert_eq!(missing, Err(GTesterError::MissingReference));
    }

    #[test]
    fn test_profile_honours_quiet_results() {
        let mut pool = Pool::new();
        let n = pool.int_range(0, 1);
        let mut harness = Harness::profiling(
            pool,
            |case: &TestCase| Ok(case.arg(0)?.clone()),
            vec![n],
            vec![n],
        );
        let config = Config::default()
            .with_cycles(30)
            .with_print_on_pass(1)
            .with_quiet_results(vec![Value::Int(0)]);
        let mut recorder = Recorder::new();
        let summary = harness.profile(&config, &mut recorder).unwrap();

        assert_eq!(summary.passed, 30);
        assert!(recorder.passed_numbers().len() < 30);
        for event in &recorder.events {
            if let Event::Passed { cycle, .. } = event {
                assert_eq!(cycle.actual, Some(Value::Int(1)));
            }
        }
        assert_eq!(recorder.progress, Some((30, 30)));
    }

    #[test]
    fn test_profile_reports_timeouts() {
        let mut pool = Pool::new();
        let n = pool.int_range(0, 1);
        let mut harness = Harness::profiling(
            pool,
            |_: &TestCase| {
                std::thread::sleep(Duration::from_millis(10));
                Ok(Value::Int(0))
            },
            vec![n],
            vec![n],
        );
        let config = Config::default().with_cycles(2).with_time_limit_secs(0.001);
        let summary = harness.profile(&config, &mut Recorder::new()).unwrap();
        assert_eq!(summary.timed_out, 2);
    }

    #[test]
    fn test_check_cases() {
        let add = |case: &TestCase| -> Result<Value> {
            Ok(Value::Int(case.arg(0)?.as_int()? + case.arg(1)?.as_int()?))
        };
        let cases = vec![
            TestCase::new(vec![Value::Int(2), Value::Int(3)], vec![Value::Int(5)]),
            TestCase::new(
                vec![Value::Int(1), Value::Int(1)],
                vec![Value::Int(2), Value::Int(3)],
            ),
        ];
        let mut recorder = Recorder::new();
        let summary = check_cases(&cases, add, &mut recorder);
        assert_eq!(summary, CheckSummary { checked: 2, failed: 0 });
        assert!(recorder.events.is_empty());

        let cases = vec![
            cases[0].clone(),
            TestCase::new(vec![Value::Int(1), Value::Int(1)], vec![Value::Int(99)]),
        ];
        let summary = check_cases(&cases, add, &mut recorder);
        assert_eq!(summary.failed, 1);
        assert_eq!(recorder.failed_numbers(), vec![2]);
    }

    #[test]
    fn test_check_cases_reports_errors() {
        let cases = vec![TestCase::new(vec![Value::from("x")], vec![Value::Int(1)])];
        let mut recorder = Recorder::new();
        let summary = check_cases(
            &cases,
            |case: &TestCase| Ok(Value::Int(case.arg(0)?.as_int()?)),
            &mut recorder,
        );
        assert_eq!(summary.failed, 1);
        match &recorder.events[0] {
            Event::CaseFailed(cycle) => {
                assert!(cycle.actual.is_none());
                assert!(cycle.message.as_deref().unwrap().starts_with("Type mismatch"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
