//! `ppm`: a thin CLI front-end over `ppm-resolver`. Parses a typed configuration record out of
//! the process arguments, runs a resolve pass, writes the lock outputs, and prints a
//! human-readable (or, with `--json`, machine-readable) summary.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;
use url::Url;

use ppm_resolver::env::{HostEnvironment, DEFAULT_CPYTHON_MINOR};
use ppm_resolver::lock;
use ppm_resolver::{Resolver, ResolverConfig};

/// Resolves a set of PyPI requirements against one or more simple indexes and writes a
/// deterministic lock.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Requirement strings to resolve, e.g. `requests>=2` or `trio==0.18.0`.
    #[clap(num_args = 1.., required = true)]
    requirements: Vec<String>,

    /// Directory the `.ppm/` output tree and `pylock.toml` are written under. Defaults to the
    /// current working directory.
    #[clap(long)]
    root: Option<PathBuf>,

    /// Primary package index base URL.
    #[clap(long, default_value = "https://pypi.org/simple/")]
    index: Url,

    /// Additional package index base URLs, consulted in order after the primary.
    #[clap(long = "extra-index")]
    extra_index: Vec<Url>,

    /// Per-request HTTP timeout, in seconds.
    #[clap(long, default_value_t = 30)]
    timeout: u64,

    /// Per-request retry count for transient failures.
    #[clap(long, default_value_t = 2)]
    retries: u32,

    /// User-Agent header sent with every outgoing request.
    #[clap(long = "ua", default_value = "ppm/0.1")]
    user_agent: String,

    /// Skip the transitive dependency engine; only resolve the requirements given directly.
    #[clap(long = "no-transitives")]
    no_transitives: bool,

    /// Fail if any artifact ends up with no recorded SHA-256 digest.
    #[clap(long = "strict-hash")]
    strict_hash: bool,

    /// Also emit a machine-readable summary to stdout.
    #[clap(long)]
    json: bool,
}

#[derive(Serialize)]
struct Summary {
    resolved: bool,
    packages: Vec<SummaryPackage>,
    matrix_platform: String,
}

#[derive(Serialize)]
struct SummaryPackage {
    name: String,
    version: String,
    filename: String,
    sha256: String,
}

async fn actual_main() -> miette::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter()),
        )
        .init();

    let root = match args.root {
        Some(root) => root,
        None => std::env::current_dir().into_diagnostic()?,
    };

    let config = ResolverConfig {
        root,
        index_url: args.index,
        extra_index_urls: args.extra_index,
        requirements: args.requirements,
        follow_transitives: !args.no_transitives,
        strict_hash: args.strict_hash,
        timeout_seconds: args.timeout,
        retries: args.retries,
        user_agent: args.user_agent,
    };

    let env = HostEnvironment::probe(DEFAULT_CPYTHON_MINOR);
    let resolver = Resolver::new(config.clone(), env.clone())?;

    let resolved = tokio::select! {
        result = resolver.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\ninterrupted");
            std::process::exit(130);
        }
    };

    lock::write_all(&config, &env, &resolved)?;

    let mut packages: Vec<_> = resolved.values().collect();
    packages.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

    println!("{}", console::style("Resolved packages").bold());
    println!();
    let mut tabbed_stdout = tabwriter::TabWriter::new(std::io::stdout());
    writeln!(
        tabbed_stdout,
        "{}\t{}\t{}",
        console::style("Name").bold(),
        console::style("Version").bold(),
        console::style("Artifact").bold()
    )
    .into_diagnostic()?;
    for package in packages.iter().sorted_by(|a, b| a.name.as_str().cmp(b.name.as_str())) {
        writeln!(
            tabbed_stdout,
            "{}\t{}\t{}",
            package.name.as_str(),
            package.version,
            package.artifact.filename()
        )
        .into_diagnostic()?;
    }
    tabbed_stdout.flush().into_diagnostic()?;

    println!(
        "\nwrote {}, pylock.toml, matrix_inputs.txt, matrix_plan.json, and verify.rs under {}",
        console::style(".ppm/lock.json").bold(),
        config.ppm_dir().parent().unwrap_or(&config.root).display()
    );

    if args.json {
        let summary = Summary {
            resolved: true,
            packages: packages
                .iter()
                .map(|p| SummaryPackage {
                    name: p.name.as_str().to_string(),
                    version: p.version.to_string(),
                    filename: p.artifact.filename(),
                    sha256: p.artifact.sha256.clone(),
                })
                .collect(),
            matrix_platform: lock::classify_matrix_platform(&config),
        };
        println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match actual_main().await {
        Ok(()) => {}
        Err(report) => {
            // `ctrl_c` interrupts exit(130) directly from inside `actual_main`, so anything
            // that reaches this arm is a resolution failure.
            eprintln!("{report:?}");
            std::process::exit(1);
        }
    }
}

/// Constructs a default [`EnvFilter`] used when `RUST_LOG` is unset, mirroring the teacher's
/// `get_default_env_filter` convention.
fn default_env_filter() -> EnvFilter {
    EnvFilter::new("ppm_resolver=info")
        .add_directive(Directive::from("ppm=info".parse().unwrap()))
}
