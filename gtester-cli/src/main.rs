use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gtester::{check_cases, Config, ConsoleReporter};
use gtester_cli::{Candidate, ProgressReporter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Randomized differential testing from the command line
#[derive(Parser)]
#[command(name = "gtester")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Never draw the cycle counter on stderr
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bundled sum harness against its reference
    Demo(RunArgs),

    /// Run the bundled candidate alone, timing each cycle
    Profile(RunArgs),

    /// Run a built-in candidate against fixed cases from a JSON file
    Check {
        /// JSON file of `{"args": [...], "accepted": [...]}` entries
        #[arg(long)]
        cases: PathBuf,

        /// Function to check
        #[arg(long, value_enum, default_value = "sum")]
        candidate: Candidate,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Number of generation cycles
    #[arg(long, default_value_t = 100)]
    cycles: usize,

    /// Per-cycle time limit in seconds
    #[arg(long, default_value_t = 1.0)]
    time_limit: f64,

    /// 0 = silent on pass, 1 = banner and time, 2 = also args and result
    #[arg(long, default_value_t = 0)]
    print_on_pass: u8,

    /// Abort after this many failures (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_on: usize,

    /// Base seed for generation
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl RunArgs {
    fn config(&self) -> Config {
        Config::default()
            .with_cycles(self.cycles)
            .with_time_limit_secs(self.time_limit)
            .with_print_on_pass(self.print_on_pass)
            .with_fail_on(self.fail_on)
            .with_seed(self.seed)
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    // Colors only on a terminal unless explicitly requested
    let use_colors = !cli.no_color
        && std::env::var("NO_COLOR").is_err()
        && (atty::is(atty::Stream::Stdout) || std::env::var("FORCE_COLOR").is_ok());
    colored::control::set_override(use_colors);

    let show_progress = !cli.no_progress && atty::is(atty::Stream::Stderr);

    match run(cli.command, use_colors, show_progress) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the run was clean.
fn run(command: Commands, color: bool, show_progress: bool) -> Result<bool> {
    let console = ConsoleReporter::stdout(color);
    let mut reporter = ProgressReporter::new(console, std::io::stderr(), show_progress);
    match command {
        Commands::Demo(args) => {
            println!("{}", gtester_cli::format_header("demo"));
            let config = args.config();
            config.validate()?;
            let summary = gtester_cli::demo_harness()
                .test(&config, &mut reporter)
                .context("demo run failed")?;
            reporter.finish();
            print!("\n{}", gtester_cli::format_run_summary(&summary));
            Ok(summary.is_clean())
        }
        Commands::Profile(args) => {
            println!("{}", gtester_cli::format_header("profile"));
            let config = args.config();
            config.validate()?;
            let summary = gtester_cli::demo_harness()
                .profile(&config, &mut reporter)
                .context("profile run failed")?;
            reporter.finish();
            print!("\n{}", gtester_cli::format_run_summary(&summary));
            Ok(summary.is_clean())
        }
        Commands::Check { cases, candidate } => {
            let cases = gtester_cli::load_cases(&cases)?;
            let summary = check_cases(&cases, |case| candidate.call(case), &mut reporter);
            print!("{}", gtester_cli::format_check_summary(&summary));
            Ok(summary.failed == 0)
        }
    }
}
