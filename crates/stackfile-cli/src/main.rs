//! Stackfile CLI - declarative orchestration of Helm releases

use clap::{Args, Parser, Subcommand};
use stackfile_core::SelectorInheritance;
use stackfile_run::{GraphOptions, NeedsPolicy, RunMode, RunOptions};
use stackfile_state::{DEFAULT_ENVIRONMENT, LoadOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod display;
mod error;
mod exit_codes;
mod workspace;

use error::{CliError, Result};
use workspace::Workspace;

/// Experimental feature switching nested inclusions to explicit selector inheritance
const EXPLICIT_SELECTOR_INHERITANCE: &str = "explicit-selector-inheritance";

#[derive(Parser)]
#[command(name = "stackfile")]
#[command(author = "Stackfile Contributors")]
#[command(version)]
#[command(about = "Declarative orchestration of Helm releases across environments", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args)]
struct GlobalArgs {
    /// State file (default: stackfile.yaml, helmfile.yaml, then helmfile.d/*.yaml)
    #[arg(short, long, global = true, env = "STACKFILE_FILE")]
    file: Option<PathBuf>,

    /// Environment to render the state with
    #[arg(short, long, global = true, env = "STACKFILE_ENVIRONMENT", default_value = DEFAULT_ENVIRONMENT)]
    environment: String,

    /// Label selector (key=value or key!=value, comma-separated); repeat to OR groups
    #[arg(short = 'l', long = "selector", global = true)]
    selectors: Vec<String>,

    /// Extra state values file, layered over environment values
    #[arg(long = "state-values-file", global = true)]
    state_values_files: Vec<PathBuf>,

    /// State value on the command line (key=value)
    #[arg(long = "state-values-set", global = true)]
    state_values_set: Vec<String>,

    /// Kube context for releases that do not set their own
    #[arg(long, global = true)]
    kube_context: Option<String>,

    /// Override the namespace of every release
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Path to the helm binary
    #[arg(long, global = true)]
    helm_binary: Option<String>,

    /// Nested states only inherit selectors when they ask for it
    #[arg(long, global = true)]
    explicit_selector_inheritance: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Args, Clone, Default)]
struct NeedsArgs {
    /// Drop needs on releases that are not selected
    #[arg(long, conflicts_with_all = ["include_needs", "include_transitive_needs"])]
    skip_needs: bool,

    /// Pull direct needs of selected releases into the run
    #[arg(long, conflicts_with = "include_transitive_needs")]
    include_needs: bool,

    /// Pull every transitive need of selected releases into the run
    #[arg(long)]
    include_transitive_needs: bool,
}

impl NeedsArgs {
    fn graph_options(&self) -> GraphOptions {
        let needs = if self.skip_needs {
            NeedsPolicy::Skip
        } else if self.include_transitive_needs {
            NeedsPolicy::IncludeTransitive
        } else if self.include_needs {
            NeedsPolicy::Include
        } else {
            NeedsPolicy::Strict
        };
        GraphOptions::default().with_needs(needs)
    }
}

#[derive(Args, Clone)]
struct RunArgs {
    #[command(flatten)]
    needs: NeedsArgs,

    /// Maximum number of releases processed at once (0 for unlimited)
    #[arg(long, default_value_t = 0)]
    concurrency: usize,

    /// Install new releases without diffing them first
    #[arg(long)]
    skip_diff_on_install: bool,

    /// Reset values stored with live releases
    #[arg(long)]
    reset_values: bool,

    /// Exit with 2 when changes were found or applied
    #[arg(long)]
    detailed_exitcode: bool,
}

impl RunArgs {
    fn run_options(&self) -> RunOptions {
        RunOptions::default()
            .with_concurrency(self.concurrency)
            .with_skip_diff_on_install(self.skip_diff_on_install)
            .with_reset_values(self.reset_values)
            .with_detailed_exitcode(self.detailed_exitcode)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List releases matching the selectors
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print every state after merging and rendering
    Build,

    /// Show the release graph grouped into dependency levels
    Plan {
        #[command(flatten)]
        needs: NeedsArgs,
    },

    /// Show what apply would change
    Diff {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Diff releases and apply the ones that changed
    Apply {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Apply every release without diffing
    Sync {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Delete every selected release, dependents first
    Destroy {
        /// Maximum number of releases processed at once (0 for unlimited)
        #[arg(long, default_value_t = 0)]
        concurrency: usize,
    },
}

impl GlobalArgs {
    fn load_options(&self, reverse: bool) -> LoadOptions {
        let mut options = LoadOptions::default()
            .with_environment(&self.environment)
            .with_selectors(self.selectors.iter().cloned())
            .with_inheritance(self.inheritance())
            .with_reverse(reverse);

        for file in &self.state_values_files {
            options = options.with_state_values_file(file);
        }
        for set in &self.state_values_set {
            options = options.with_state_values_set(set);
        }
        if let Some(context) = &self.kube_context {
            options = options.with_kube_context(context);
        }
        if let Some(namespace) = &self.namespace {
            options = options.with_namespace(namespace);
        }
        if let Some(binary) = &self.helm_binary {
            options = options.with_helm_binary(binary);
        }
        options
    }

    fn inheritance(&self) -> SelectorInheritance {
        let experimental = std::env::var("STACKFILE_EXPERIMENTAL").unwrap_or_default();
        let enabled = experimental
            .split(',')
            .any(|feature| feature.trim() == EXPLICIT_SELECTOR_INHERITANCE);

        if self.explicit_selector_inheritance || enabled {
            SelectorInheritance::Explicit
        } else {
            SelectorInheritance::Legacy
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Setup miette for nice error display; annotated messages stay on one line
    miette::set_panic_hook();
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().wrap_lines(false).build())
    }));

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(exit_codes::USAGE_ERROR);
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(exit_codes::SUCCESS);
        }
    };

    init_tracing(cli.global.debug);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let reverse = matches!(cli.command, Commands::Destroy { .. });
    let cwd = std::env::current_dir().map_err(CliError::from)?;
    let files = workspace::discover(cli.global.file.as_deref(), &cwd)?;
    let workspace = Workspace::load(&files, &cli.global.load_options(reverse))?;

    match cli.command {
        Commands::List { json } => commands::list::run(&workspace, json).map(|_| exit_codes::SUCCESS),

        Commands::Build => commands::build::run(&workspace).map(|_| exit_codes::SUCCESS),

        Commands::Plan { needs } => {
            commands::plan::run(&workspace, &needs.graph_options()).map(|_| exit_codes::SUCCESS)
        }

        Commands::Diff { run } => {
            commands::run::run(&workspace, RunMode::Diff, &run.needs.graph_options(), run.run_options())
                .await
        }

        Commands::Apply { run } => {
            commands::run::run(&workspace, RunMode::Apply, &run.needs.graph_options(), run.run_options())
                .await
        }

        Commands::Sync { run } => {
            commands::run::run(&workspace, RunMode::Sync, &run.needs.graph_options(), run.run_options())
                .await
        }

        // Only the selected releases go away; needs outside the selection do not matter
        Commands::Destroy { concurrency } => {
            commands::run::run(
                &workspace,
                RunMode::Destroy,
                &GraphOptions::default().with_needs(NeedsPolicy::Skip),
                RunOptions::default().with_concurrency(concurrency),
            )
            .await
        }
    }
}
