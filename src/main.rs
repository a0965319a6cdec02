//! `cachesim`: replay cache traces against eviction policies.
//!
//! # Usage
//!
//! ```bash
//! # Miss ratio of SLRU with two segments on a 1000-object cache
//! cachesim run w01.oracleGeneral oracleGeneral slru 1000 -e n-seg=2
//!
//! # Same run described by a JSON file, printed as a report line
//! cachesim run --config run.json --output line
//!
//! # Search the parameter space, falling back to the defaults
//! cachesim tune w01.oracleGeneral oracleGeneral s3fifo 1000 --budget 30
//!
//! # Compare several policies in parallel
//! cachesim sweep w01.oracleGeneral oracleGeneral 1000 lru fifo twoq:Ain-size-ratio=0.3
//!
//! # Size the cache at a tenth of the trace's distinct objects
//! cachesim sweep w01.oracleGeneral oracleGeneral 0.1 lru s3fifo
//!
//! # Print the tunable parameters of a policy as JSON
//! cachesim params s3fifo 1000
//! ```
//!
//! Only results go to stdout; diagnostics go to stderr (`RUST_LOG` controls
//! the level). The exit code is 0 on success, 2 for bad input, 3 for an
//! unknown policy or bad parameters, 4 when a policy broke the eviction
//! contract and 5 when the trace held no requests.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use evictsim::config::{Capacity, SimConfig};
use evictsim::params::ParamSet;
use evictsim::policies::PolicyType;
use evictsim::stats::SimReport;
use evictsim::sweep::{sweep, SweepJob};
use evictsim::trace::{CsvOptions, TraceFormat};
use evictsim::tune::{tune_policy, RandomSearch};
use evictsim::{load_requests, resolve_capacity, run, Result, SimError, SizeMode};

/// Deterministic cache eviction simulator
#[derive(Parser, Debug)]
#[command(name = "cachesim")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a trace against one policy
    Run(RunArgs),
    /// Tune a policy's parameters on a trace
    Tune(TuneArgs),
    /// Evaluate several policies on the same trace in parallel
    Sweep(SweepArgs),
    /// Print a policy's parameter space as JSON
    Params {
        policy: String,
        /// Cache capacity the ranges are derived from
        #[arg(default_value_t = 1000)]
        capacity: u64,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    /// The miss ratio alone
    Ratio,
    /// One human-readable report line
    Line,
    /// The full report as JSON
    Json,
}

/// Layout of CSV traces
#[derive(Args, Debug)]
struct CsvArgs {
    /// Field delimiter
    #[arg(long)]
    delimiter: Option<char>,
    /// The first line is a header
    #[arg(long)]
    has_header: bool,
    /// 1-based column of the object id
    #[arg(long)]
    key_col: Option<usize>,
    /// 1-based column of the object size
    #[arg(long)]
    size_col: Option<usize>,
    /// 1-based column of the timestamp
    #[arg(long)]
    time_col: Option<usize>,
}

impl CsvArgs {
    fn apply(&self, mut options: CsvOptions) -> CsvOptions {
        if let Some(delimiter) = self.delimiter {
            options.delimiter = delimiter;
        }
        options.has_header |= self.has_header;
        if let Some(col) = self.key_col {
            options.key_column = col;
        }
        if self.size_col.is_some() {
            options.size_column = self.size_col;
        }
        if self.time_col.is_some() {
            options.time_column = self.time_col;
        }
        options
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Trace file
    trace: Option<PathBuf>,
    /// Trace format: oracleGeneral or csv
    format: Option<TraceFormat>,
    /// Policy name
    policy: Option<String>,
    /// Capacity in objects (bytes with --consider-obj-size), or a fraction
    /// of the trace's distinct objects such as 0.1
    capacity: Option<Capacity>,
    /// Policy parameters, `name=value,...`
    #[arg(short = 'e', long = "params")]
    params: Option<String>,
    /// Count object sizes against a byte capacity
    #[arg(long)]
    consider_obj_size: bool,
    /// Log progress every N units of trace time
    #[arg(long)]
    report_interval: Option<u64>,
    /// JSON run configuration; positional arguments and flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Output::Ratio)]
    output: Output,
    #[command(flatten)]
    csv: CsvArgs,
}

impl RunArgs {
    fn to_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => {
                let (Some(trace), Some(format), Some(policy), Some(capacity)) =
                    (&self.trace, self.format, &self.policy, self.capacity)
                else {
                    return Err(SimError::Config(
                        "expected <TRACE> <FORMAT> <POLICY> <CAPACITY> or --config".to_string(),
                    ));
                };
                SimConfig::new(trace, format, policy, 0).with_capacity(capacity)
            }
        };

        if let Some(trace) = &self.trace {
            config.trace.path = trace.clone();
        }
        if let Some(format) = self.format {
            config.trace.format = format;
        }
        if let Some(policy) = &self.policy {
            config.policy = policy.clone();
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(text) = &self.params {
            config.params = parse_params(&config.policy, config.capacity.bound(), text)?;
        }
        if self.consider_obj_size {
            config.size_mode = SizeMode::ConsiderObjectSize;
        }
        if self.report_interval.is_some() {
            config.report_interval = self.report_interval;
        }
        config.trace.csv = self.csv.apply(config.trace.csv);
        Ok(config)
    }
}

/// Trace arguments shared by `tune` and `sweep`
#[derive(Args, Debug)]
struct TraceArgs {
    /// Trace file
    trace: PathBuf,
    /// Trace format: oracleGeneral or csv
    format: TraceFormat,
    /// Count object sizes against a byte capacity
    #[arg(long)]
    consider_obj_size: bool,
    #[command(flatten)]
    csv: CsvArgs,
}

impl TraceArgs {
    fn size_mode(&self) -> SizeMode {
        if self.consider_obj_size {
            SizeMode::ConsiderObjectSize
        } else {
            SizeMode::IgnoreObjectSize
        }
    }

    fn load(&self) -> Result<Vec<evictsim::CacheObject>> {
        let csv = self.csv.apply(CsvOptions::default());
        load_requests(&self.trace, self.format, &csv, self.size_mode())
    }
}

#[derive(Args, Debug)]
struct TuneArgs {
    #[command(flatten)]
    trace: TraceArgs,
    /// Policy name
    policy: String,
    /// Capacity in objects (bytes with --consider-obj-size), or a fraction
    /// of the trace's distinct objects such as 0.1
    capacity: Capacity,
    /// Number of parameter sets to try
    #[arg(long, default_value_t = 20)]
    budget: usize,
    /// Seed of the random search
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args, Debug)]
struct SweepArgs {
    #[command(flatten)]
    trace: TraceArgs,
    /// Capacity in objects (bytes with --consider-obj-size), or a fraction
    /// of the trace's distinct objects such as 0.1
    capacity: Capacity,
    /// Jobs as `policy` or `policy:name=value,...`
    #[arg(required = true)]
    jobs: Vec<String>,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

/// Parse `-e` parameters; defaults are filled in once the capacity is known
fn parse_params(policy: &str, capacity: u64, text: &str) -> Result<ParamSet> {
    let policy: PolicyType = policy.parse()?;
    Ok(policy.parameter_space(capacity).parse_assignments(text)?)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| SimError::Config(e.to_string()))
}

fn print_report(report: &SimReport, output: Output) {
    match output {
        Output::Ratio => println!("{}", report.miss_ratio),
        Output::Line => println!("{report}"),
        Output::Json => println!("{}", report.to_json()),
    }
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run(args) => {
            let config = args.to_config()?;
            let report = run(&config)?;
            print_report(&report, args.output);
        }
        Command::Tune(args) => {
            let policy: PolicyType = args.policy.parse()?;
            let requests = args.trace.load()?;
            let capacity = resolve_capacity(args.capacity, &requests)?;
            let mut optimizer = RandomSearch::new(args.seed);
            let outcome = tune_policy(&requests, policy, capacity, &mut optimizer, args.budget)?;
            println!("{}", to_json(&outcome)?);
        }
        Command::Sweep(args) => {
            let jobs = args
                .jobs
                .iter()
                .map(|job| SweepJob::parse(job, args.capacity.bound()))
                .collect::<Result<Vec<_>>>()?;
            let requests = args.trace.load()?;
            let capacity = resolve_capacity(args.capacity, &requests)?;
            let results = sweep(&requests, capacity, &jobs)?;
            if args.json {
                println!("{}", to_json(&results)?);
            } else {
                for result in &results {
                    println!("{}\t{}\t{}", result.policy, result.params, result.miss_ratio);
                }
            }
        }
        Command::Params { policy, capacity } => {
            let policy: PolicyType = policy.parse()?;
            println!("{}", to_json(&policy.parameter_space(capacity))?);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = execute(cli.command);
    if let Err(e) = &result {
        eprintln!("error: {e}");
    }
    ExitCode::from(exit_status(&result))
}

/// Process exit status of a finished command
fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => e.kind().exit_code() as u8,
    }
}
