//! depfetch command line

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use depfetch::commands;
use depfetch::registry::EntrySource;
use depfetch::{max_iterations_from_signed, Classifier, Config, Lockfile, ResolveOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depfetch")]
#[command(about = "Resolve and fetch JVM library dependencies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and download artifacts, printing their paths
    Fetch {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Fetch source artifacts
        #[arg(long)]
        sources: bool,

        /// Fetch javadoc artifacts
        #[arg(long)]
        javadoc: bool,

        /// Fetch the main artifact too when --sources or --javadoc is given
        #[arg(long)]
        default: bool,

        /// Print one path-separator-joined line
        #[arg(long)]
        classpath: bool,

        /// Pin versions from this lockfile
        #[arg(long, value_name = "PATH")]
        lock: Option<PathBuf>,
    },
    /// Resolve and print the selected versions
    Resolve {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Write the selected versions to this lockfile
        #[arg(long, value_name = "PATH")]
        write_lock: Option<PathBuf>,
    },
    /// Manage named repositories
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
}

#[derive(Args)]
struct ResolveArgs {
    /// Coordinates, as org:name:version
    #[arg(required = true)]
    coordinates: Vec<String>,

    /// Never touch the network
    #[arg(long)]
    offline: bool,

    /// Refetch metadata and artifacts even when cached
    #[arg(long)]
    force: bool,

    /// Iteration cap; negative for unbounded
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    max_iterations: Option<i64>,

    /// Concurrent downloads
    #[arg(long = "parallel", short = 'n', value_name = "N")]
    parallel: Option<usize>,

    /// Follow optional dependencies
    #[arg(long)]
    keep_optional: bool,

    /// Repository id to use, in order (repeatable)
    #[arg(short = 'r', long = "repository", value_name = "ID")]
    repositories: Vec<String>,
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Register a repository
    Add {
        id: String,
        url: String,

        /// Ivy layout instead of Maven
        #[arg(long)]
        ivy: bool,
    },
    /// List known repositories
    List,
    /// Show or replace the default repositories
    Default {
        /// New default ids, in order
        ids: Vec<String>,

        /// Keep ids that are not registered
        #[arg(long)]
        with_not_found: bool,
    },
}

impl ResolveArgs {
    fn options(&self, config: &Config) -> ResolveOptions {
        let mut options = ResolveOptions::default()
            .with_offline(self.offline)
            .with_force(self.force)
            .with_keep_optional(self.keep_optional)
            .with_parallelism(self.parallel.unwrap_or(config.parallelism));
        if let Some(max) = self.max_iterations {
            options = options.with_max_iterations(max_iterations_from_signed(max));
        }
        options
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    match cli.command {
        Commands::Fetch {
            resolve,
            sources,
            javadoc,
            default,
            classpath,
            lock,
        } => {
            let options = resolve.options(&config);
            let policy = options.policy();
            let context = commands::engine_context(&config, &resolve.repositories)?
                .with_parallelism(options.parallelism);
            let resolution =
                commands::resolve_seeds(&context, &resolve.coordinates, options, lock.as_deref())?;
            report_errors(&resolution.errors);

            let mut classifiers = Vec::new();
            if default || (!sources && !javadoc) {
                classifiers.push(Classifier::Main);
            }
            if sources {
                classifiers.push(Classifier::Sources);
            }
            if javadoc {
                classifiers.push(Classifier::Javadoc);
            }

            let fetched = commands::fetch_classpath(&context, &resolution, &classifiers, policy)?;
            if classpath {
                println!("{}", fetched.join());
            } else {
                for path in &fetched.paths {
                    println!("{}", path.display());
                }
            }
        }
        Commands::Resolve {
            resolve,
            write_lock,
        } => {
            let context = commands::engine_context(&config, &resolve.repositories)?;
            let resolution = commands::resolve_seeds(
                &context,
                &resolve.coordinates,
                resolve.options(&config),
                None,
            )?;
            report_errors(&resolution.errors);

            for coordinate in resolution.graph.coordinates() {
                println!("{}", coordinate);
            }
            commands::ensure_resolved(&resolution)?;

            if let Some(path) = write_lock {
                Lockfile::from_resolution(&resolution)
                    .to_file(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
        Commands::Repo { command } => match command {
            RepoCommands::Add { id, url, ivy } => {
                let entry = commands::add_repository(&config, &id, &url, ivy)?;
                println!("{}", entry.repository);
            }
            RepoCommands::List => {
                for entry in commands::list_repositories(&config)? {
                    let source = match &entry.source {
                        EntrySource::Builtin => "built-in".to_string(),
                        EntrySource::File(path) => path.display().to_string(),
                    };
                    println!("{}\t{}\t{}", entry.id, entry.repository.root(), source);
                }
            }
            RepoCommands::Default {
                ids,
                with_not_found,
            } => {
                for id in commands::set_default_repositories(&config, &ids, with_not_found)? {
                    println!("{}", id);
                }
            }
        },
    }

    Ok(())
}

fn report_errors(errors: &[depfetch::ResolutionError]) {
    for error in errors {
        eprintln!("warning: {}", error);
    }
}
