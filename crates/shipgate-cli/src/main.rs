use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(
    name = "shipgate",
    about = "Shipgate — rollout blocks for application releases",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to shipgate.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Data directory for the state store (overrides [store].data_dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage blocking policies
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Manage applications
    App {
        #[command(subcommand)]
        action: AppAction,
    },
    /// Run one reconciliation pass and print the verdict.
    ///
    /// Invalid overrides are removed from the application and its
    /// RolloutBlock condition refreshed before the verdict is printed.
    Check {
        namespace: String,
        name: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Show notifications recorded for an application
    Events {
        namespace: String,
        name: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Create or replace a blocking policy
    Add {
        name: String,
        /// Scope the policy to one namespace
        #[arg(short, long, conflicts_with = "cluster", required_unless_present = "cluster")]
        namespace: Option<String>,
        /// Scope the policy to the whole cluster
        #[arg(long)]
        cluster: bool,
        /// Reason shown to application owners
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Delete a blocking policy
    Remove {
        name: String,
        #[arg(short, long, conflicts_with = "cluster", required_unless_present = "cluster")]
        namespace: Option<String>,
        #[arg(long)]
        cluster: bool,
    },
    /// List policies (all, or those active for one namespace)
    List {
        #[arg(short, long)]
        namespace: Option<String>,
    },
}

#[derive(Subcommand)]
enum AppAction {
    /// Register an application
    Create {
        namespace: String,
        name: String,
        /// Comma-separated policy names to override
        #[arg(long, default_value = "")]
        overrides: String,
    },
    /// Print an application as JSON
    Show { namespace: String, name: String },
    /// List applications
    List,
    /// Replace an application's override declaration
    Override {
        namespace: String,
        name: String,
        /// Comma-separated policy names ("" clears)
        overrides: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = Context::load(cli.config.as_deref(), cli.data_dir)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&ctx.config.logging.filter))?,
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Policy { action } => match action {
            PolicyAction::Add {
                name,
                namespace,
                cluster: _,
                message,
            } => commands::policy::add(&ctx, &name, namespace.as_deref(), message.as_deref()),
            PolicyAction::Remove {
                name,
                namespace,
                cluster: _,
            } => commands::policy::remove(&ctx, &name, namespace.as_deref()),
            PolicyAction::List { namespace } => commands::policy::list(&ctx, namespace.as_deref()),
        },
        Commands::App { action } => match action {
            AppAction::Create {
                namespace,
                name,
                overrides,
            } => commands::app::create(&ctx, &namespace, &name, &overrides),
            AppAction::Show { namespace, name } => commands::app::show(&ctx, &namespace, &name),
            AppAction::List => commands::app::list(&ctx),
            AppAction::Override {
                namespace,
                name,
                overrides,
            } => commands::app::set_overrides(&ctx, &namespace, &name, &overrides),
        },
        Commands::Check {
            namespace,
            name,
            format,
        } => commands::check::check(&ctx, &namespace, &name, &format),
        Commands::Events {
            namespace,
            name,
            limit,
        } => commands::check::events(&ctx, &namespace, &name, limit),
    }
}
