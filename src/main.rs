//! subtree-split - split directories out of a repository's history
//!
//! # Usage
//! ```bash
//! subtree-split --prefix lib                          # print the split head
//! subtree-split --prefix lib --target lib-only        # and point a branch at it
//! subtree-split --prefix src:lib --prefix docs --progress
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subtree_split::{GitVersion, Prefix, PrefixSet, SplitConfig, SplitResult, split};

/// Split directories of a repository into their own history
#[derive(Parser)]
#[command(name = "subtree-split")]
#[command(about = "Split directories of a repository into their own history", long_about = None)]
struct Cli {
    /// The directory(ies) to split, as FROM or FROM:TO
    #[arg(long = "prefix", value_name = "FROM[:TO]", value_parser = Prefix::parse)]
    prefixes: Vec<Prefix>,

    /// The branch to split
    #[arg(long, default_value = "HEAD")]
    origin: String,

    /// The branch to create when split is finished
    #[arg(long)]
    target: Option<String>,

    /// The commit at which to start the split
    #[arg(long)]
    commit: Option<String>,

    /// The repository path
    #[arg(long, default_value = ".")]
    path: String,

    /// Flush the cache
    #[arg(long)]
    scratch: bool,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    /// Suppress the output
    #[arg(long)]
    quiet: bool,

    /// [DEPRECATED] Same as --git "<1.8.2"
    #[arg(long)]
    legacy: bool,

    /// Simulate a given version of Git
    #[arg(long = "git", default_value = "latest")]
    git_version: String,

    /// Show progress (ignored with --debug or --quiet)
    #[arg(long)]
    progress: bool,

    /// Number of rewrite workers
    #[arg(long, default_value = "1")]
    workers: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let debug = cli.debug && !cli.quiet;

    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let prefixes = match PrefixSet::new(cli.prefixes) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let git_version = if cli.legacy {
        eprintln!(r#"The --legacy option is deprecated (use --git="<1.8.2" instead)"#);
        GitVersion::Legacy
    } else {
        GitVersion::parse(&cli.git_version)?
    };

    let mut config = SplitConfig::new(&cli.path, prefixes)
        .with_origin(cli.origin)
        .with_git_version(git_version)
        .with_scratch(cli.scratch)
        .with_workers(cli.workers);
    if let Some(commit) = cli.commit {
        config = config.with_commit(commit);
    }
    if let Some(target) = cli.target {
        config = config.with_target(target);
    }

    if debug {
        tracing::debug!("Configuration: {}", serde_json::to_string(&config)?);
    }

    let result = Arc::new(SplitResult::new());
    let stop = Arc::new(AtomicBool::new(false));

    let reporter = (cli.progress && !debug && !cli.quiet).then(|| {
        let result = Arc::clone(&result);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                eprint!(
                    "{} commits created, {} commits traversed\r",
                    result.created(),
                    result.traversed()
                );
                thread::sleep(Duration::from_millis(50));
            }
        })
    });

    let outcome = split(&config, &result);

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = reporter {
        let _ = handle.join();
    }

    if let Err(e) = outcome {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if !cli.quiet {
        eprintln!(
            "{} commits created, {} commits traversed, in {}ms",
            result.created(),
            result.traversed(),
            result.duration().as_millis()
        );
    }

    if debug {
        tracing::debug!("Summary: {}", serde_json::to_string(&result.summary())?);
    }

    if let Some(head) = result.head() {
        println!("{}", head);
    }

    Ok(())
}
