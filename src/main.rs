use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cb_cli::cli::{
    AssetArgs, ConnectArgs, ModifierArgs, TestArgs, normalize_args, run_create, run_decompress,
    run_delete, run_diff, run_export, run_import, run_init, run_pull, run_push, run_target,
    run_test,
};

#[derive(Parser)]
#[command(name = "cb-cli")]
#[command(about = "Keep a local copy of a ClearBlade system in sync with the platform", long_about = None)]
struct Cli {
    /// Log debug detail to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by commands that talk to the system.
#[derive(Args)]
struct SyncArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    #[command(flatten)]
    assets: AssetArgs,

    #[command(flatten)]
    modifiers: ModifierArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repo for an existing system without pulling assets
    Init {
        #[command(flatten)]
        connect: ConnectArgs,

        #[command(flatten)]
        modifiers: ModifierArgs,
    },

    /// Create a repo for an existing system and pull every asset into it
    Export {
        #[command(flatten)]
        connect: ConnectArgs,

        #[command(flatten)]
        modifiers: ModifierArgs,
    },

    /// Create a new system from this repo and push every asset into it
    Import {
        #[command(flatten)]
        connect: ConnectArgs,

        #[command(flatten)]
        modifiers: ModifierArgs,
    },

    /// Fetch selected assets from the system into the repo
    Pull(SyncArgs),

    /// Send selected assets from the repo to the system
    #[command(alias = "update")]
    Push(SyncArgs),

    /// Show how selected local assets differ from the system
    Diff {
        #[command(flatten)]
        sync: SyncArgs,

        /// Also run a line diff of code against the remote source
        #[arg(long)]
        code: bool,
    },

    /// Write a skeleton asset into the repo
    Create {
        #[command(flatten)]
        assets: AssetArgs,
    },

    /// Delete assets from the system and the repo
    Delete(SyncArgs),

    /// Point the repo at another platform URL or system
    Target {
        #[command(flatten)]
        connect: ConnectArgs,
    },

    /// Run a code service or publish an MQTT message
    Test {
        #[command(flatten)]
        connect: ConnectArgs,

        #[command(flatten)]
        args: TestArgs,
    },

    /// Split legacy portal configs into per-file form
    Decompress {
        /// Portal name
        #[arg(long)]
        portal: Vec<String>,

        #[arg(long = "all-portals")]
        all_portals: bool,
    },

    /// Print the version
    Version,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "cb_cli=debug" } else { "cb_cli=info" };
    let filter = match level.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { connect, modifiers } => run_init(connect, modifiers),
        Commands::Export { connect, modifiers } => run_export(connect, modifiers),
        Commands::Import { connect, modifiers } => run_import(connect, modifiers),
        Commands::Pull(a) => run_pull(a.connect, a.assets, a.modifiers),
        Commands::Push(a) => run_push(a.connect, a.assets, a.modifiers),
        Commands::Diff { sync, code } => run_diff(sync.connect, sync.assets, sync.modifiers, code),
        Commands::Create { assets } => run_create(assets),
        Commands::Delete(a) => run_delete(a.connect, a.assets, a.modifiers),
        Commands::Target { connect } => run_target(connect),
        Commands::Test { connect, args } => run_test(connect, args),
        Commands::Decompress {
            portal,
            all_portals,
        } => run_decompress(portal, all_portals),
        Commands::Version => {
            println!("cb-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
