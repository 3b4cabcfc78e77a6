mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use menv_lib::EvalOptions;
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

/// menv - evaluate namespace manifests into environment variables
#[derive(Parser)]
#[command(name = "menv")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct ManifestArgs {
  /// Manifest files, read in order
  #[arg(short = 'f', long = "file", env = "MENV_FILE", default_value = "menv.conf")]
  files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
  /// Evaluate namespaces and print their variables
  Eval {
    /// Namespaces to evaluate
    #[arg(default_value = "default")]
    namespaces: Vec<String>,

    #[command(flatten)]
    manifests: ManifestArgs,

    /// Fail on references to undefined namespaces
    #[arg(long)]
    strict: bool,

    /// Maximum concurrently evaluated namespaces (0 = number of cores)
    #[arg(short = 'j', long, env = "MENV_JOBS", default_value_t = 0)]
    jobs: usize,

    /// Identifier bound to the current parameter in expressions
    #[arg(long, default_value = "_")]
    param_ident: String,

    /// Abort evaluation after this long (e.g. "500ms", "2s")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Print manifests in canonical form
  Fmt {
    #[command(flatten)]
    manifests: ManifestArgs,
  },

  /// List the namespaces defined by the manifests
  List {
    #[command(flatten)]
    manifests: ManifestArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the host facts and functions available to expressions
  Info {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Eval {
      namespaces,
      manifests,
      strict,
      jobs,
      param_ident,
      timeout,
      output,
    } => {
      let options = EvalOptions {
        strict,
        max_parallel_jobs: jobs,
        parameter_ident: param_ident,
        ..EvalOptions::default()
      };
      cmd::cmd_eval(&manifests.files, &namespaces, &options, timeout, output)
    }
    Commands::Fmt { manifests } => cmd::cmd_fmt(&manifests.files),
    Commands::List { manifests, output } => cmd::cmd_list(&manifests.files, output),
    Commands::Info { output } => cmd::cmd_info(output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::print_error(&format!("{:#}", err));
      if let Some(detail) = cmd::detail(&err) {
        output::print_detail(&detail);
      }
      ExitCode::FAILURE
    }
  }
}
