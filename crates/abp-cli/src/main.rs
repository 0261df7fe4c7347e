//! AdBlock Plus CLI
//!
//! CLI tool for checking URLs against filter lists and inspecting compiled rule sets.

mod bench;
mod config;
mod lists;
mod requests;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use abp_compiler::{PartitionStats, RuleSetOptions};
use abp_core::matcher::RuleSet;
use abp_core::types::{BinaryOptions, MatchDecision};

use crate::requests::{parse_option_flag, Request};

#[derive(Parser)]
#[command(name = "abp-cli")]
#[command(about = "AdBlock Plus filter list matcher and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Filter list inputs and build settings shared by every command.
#[derive(Args)]
struct ListArgs {
    /// Filter list files
    #[arg(short, long = "list", required = true)]
    lists: Vec<String>,

    /// JSON build configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Fail on the first rule that cannot be compiled
    #[arg(long)]
    strict: bool,

    /// Fail on rules using unsupported options instead of dropping them
    #[arg(long)]
    reject_unsupported: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether a single URL is blocked
    Check {
        #[command(flatten)]
        list: ListArgs,

        /// URL to check
        #[arg(short, long)]
        url: String,

        /// Source (page) domain
        #[arg(short, long)]
        domain: Option<String>,

        /// Request option: `name`, `~name` or `name=bool`
        #[arg(short, long = "option")]
        options: Vec<String>,
    },

    /// Decide every request in a JSON-lines file
    Batch {
        #[command(flatten)]
        list: ListArgs,

        /// Requests file, one JSON object per line
        #[arg(short, long)]
        requests: String,
    },

    /// Print rule set build statistics
    Stats {
        #[command(flatten)]
        list: ListArgs,
    },

    /// Measure matching latency over a JSON-lines request file
    Bench {
        #[command(flatten)]
        list: ListArgs,

        /// Requests file, one JSON object per line
        #[arg(short, long)]
        requests: String,

        /// Passes over the request file
        #[arg(long, default_value_t = 100)]
        iterations: usize,

        /// Warmup operations before measuring
        #[arg(long, default_value_t = 10_000)]
        warmup_ops: usize,

        /// Operations per latency sample
        #[arg(long, default_value_t = 256)]
        sample_batch_ops: usize,
    },
}

impl Commands {
    fn list_args(&self) -> &ListArgs {
        match self {
            Commands::Check { list, .. }
            | Commands::Batch { list, .. }
            | Commands::Stats { list }
            | Commands::Bench { list, .. } => list,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.command.list_args().verbose);

    let result = match cli.command {
        Commands::Check {
            list,
            url,
            domain,
            options,
        } => cmd_check(&list, &url, domain.as_deref(), &options),
        Commands::Batch { list, requests } => cmd_batch(&list, &requests),
        Commands::Stats { list } => cmd_stats(&list),
        Commands::Bench {
            list,
            requests,
            iterations,
            warmup_ops,
            sample_batch_ops,
        } => cmd_bench(
            &list,
            &requests,
            &bench::BenchOptions {
                iterations,
                warmup_ops,
                sample_batch_ops,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Route `log` and `tracing` records to stderr; `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(args: &ListArgs) -> Result<(RuleSet, lists::LoadStats), String> {
    let options: RuleSetOptions =
        config::load_options(args.config.as_deref(), args.strict, args.reject_unsupported)?;
    lists::load_rule_set(&args.lists, &options, args.verbose)
}

fn cmd_check(args: &ListArgs, url: &str, domain: Option<&str>, flags: &[String]) -> Result<(), String> {
    let (rule_set, _) = load(args)?;

    let mut options = BinaryOptions::new();
    for flag in flags {
        let (option, value) = parse_option_flag(flag)?;
        options.insert(option, value);
    }
    let request = Request::new(url, domain, options);

    print_decision(&rule_set, &request);
    Ok(())
}

fn cmd_batch(args: &ListArgs, requests_path: &str) -> Result<(), String> {
    let requests = requests::load_requests(requests_path)?;
    let (rule_set, _) = load(args)?;

    let mut blocked = 0usize;
    for request in &requests {
        if print_decision(&rule_set, request) == MatchDecision::Block {
            blocked += 1;
        }
    }

    log::info!("{} of {} requests blocked", blocked, requests.len());
    Ok(())
}

fn print_decision(rule_set: &RuleSet, request: &Request) -> MatchDecision {
    let result = rule_set.decide(&request.url, &request.context());
    let label = match result.decision {
        MatchDecision::Block => "BLOCK",
        MatchDecision::Allow => "ALLOW",
    };
    match result.rule {
        Some(rule) => println!("{}\t{}\t{}", label, request.url, rule.raw()),
        None => println!("{}\t{}", label, request.url),
    }
    result.decision
}

fn cmd_stats(args: &ListArgs) -> Result<(), String> {
    let (rule_set, stats) = load(args)?;
    let build = &stats.build;

    println!("Compiled {} filter list(s)", args.lists.len());
    println!("  Lines:          {} ({} blank)", build.lines, build.blank);
    println!("  Comments:       {}", build.comments);
    println!("  Element hiding: {}", build.element_hiding);
    println!("  Invalid:        {}", build.invalid);
    println!("  Unsupported:    {}", build.unsupported);
    println!("  Deduped:        {}", build.deduped);
    println!("  Rules:          {}", build.rules());
    print_partition("Blacklist", &build.blacklist, rule_set.blacklist().combined().is_some());
    print_partition("Whitelist", &build.whitelist, rule_set.whitelist().combined().is_some());
    println!("  Time:           {:.1}ms", stats.total_ms);
    Ok(())
}

fn print_partition(name: &str, stats: &PartitionStats, has_combined: bool) {
    println!("{}:", name);
    println!(
        "  Simple:         {}{}",
        stats.simple,
        if has_combined { " (combined regex)" } else { "" }
    );
    println!("  Domain-keyed:   {}", stats.domain_required);
    println!("  Option-only:    {}", stats.option_only);
}

fn cmd_bench(args: &ListArgs, requests_path: &str, opts: &bench::BenchOptions) -> Result<(), String> {
    println!("========================================================================");
    println!("AdBlock Plus Matching Benchmark");
    println!("========================================================================");

    let requests = requests::load_requests(requests_path)?;
    let (rule_set, stats) = load(args)?;

    println!(
        "Rules: {} ({} blacklist, {} whitelist), built in {:.1}ms",
        rule_set.len(),
        stats.build.blacklist.total(),
        stats.build.whitelist.total(),
        stats.total_ms
    );
    println!("Dataset size: {} requests", requests.len());
    println!("Iterations: {}", opts.iterations);
    println!();

    let report = bench::run(&rule_set, &requests, opts);
    println!("{}", bench::format_report(&report));
    println!();

    println!("Notes:");
    println!("- p50/p95/p99 computed from per-batch wall-time samples divided by batch size.");

    Ok(())
}
