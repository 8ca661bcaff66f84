//! Differential testing of a buggy sum against a correct one.
//!
//! Run with `cargo run -p gtester --example basic`.

use gtester::*;

fn main() {
    println!("=== Buggy sum vs reference ===");

    let mut pool = Pool::new();
    let ten = pool.constant(10);
    let n = pool.positive_int(ten);
    let m = pool.int_range(-10, 10);
    let pair = pool.tuple(vec![n, m]);
    let xs = pool.sequence(m, n);

    // Drops every 2 from the sum
    let candidate = |case: &TestCase| -> Result<Value> {
        let xs = case.arg(1)?.as_ints()?;
        Ok(Value::Int(xs.iter().filter(|&&x| x != 2).sum()))
    };
    let reference = |case: &TestCase| -> Result<Value> {
        Ok(Value::Int(case.arg(1)?.as_ints()?.iter().sum()))
    };

    let mut harness = Harness::new(
        pool,
        candidate,
        reference,
        vec![pair, xs],
        vec![n, m, pair, xs],
    );
    let config = Config::default()
        .with_cycles(10)
        .with_time_limit_secs(0.5)
        .with_print_on_pass(1)
        .with_fail_on(3);

    let mut reporter = ConsoleReporter::stdout(true);
    match harness.test(&config, &mut reporter) {
        Ok(summary) => println!(
            "\n{} passed, {} failed, {} errors",
            summary.passed, summary.failed, summary.errored
        ),
        Err(e) => eprintln!("generation failed: {e}"),
    }

    println!("\n=== Fixed cases ===");
    let cases = vec![
        TestCase::new(vec![Value::from(vec![1, 3])], vec![Value::Int(4)]),
        TestCase::new(vec![Value::from(vec![2, 2])], vec![Value::Int(4)]),
    ];
    let summary = check_cases(
        &cases,
        |case: &TestCase| {
            let xs = case.arg(0)?.as_ints()?;
            Ok(Value::Int(xs.iter().filter(|&&x| x != 2).sum()))
        },
        &mut reporter,
    );
    println!("{} of {} cases failed", summary.failed, summary.checked);
}
