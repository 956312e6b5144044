//! codepod CLI
//!
//! Runs the code execution HTTP service, or executes a single local file in a
//! container.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codepod::{Config, DockerRuntime, EXAMPLE_CONFIG, Runner};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

mod server;

#[derive(Parser)]
#[command(name = "codepod")]
#[command(about = "Run untrusted code in resource-limited containers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to listen on (default: from config)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Run a source file (compiling first if the language needs it)
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        source: PathBuf,

        /// Language ID (e.g., cpp, python)
        #[arg(short, long)]
        language: String,

        /// File whose contents are fed to the program's stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// List available languages
    Languages,

    /// Show effective configuration
    ShowConfig,

    /// Initialize a new configuration file
    Init {
        /// Output path (default: codepod.toml)
        #[arg(short, long, default_value = "codepod.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using embedded configuration");
        Config::embedded().context("embedded configuration is invalid")?
    };

    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Run {
            source,
            language,
            input,
        } => run_execute(config, &source, &language, input.as_deref()).await,
        Commands::Languages => {
            list_languages(&config);
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
        Commands::Init { output, force } => init_config(&output, force).await,
    }
}

async fn connect(config: &Config) -> Result<DockerRuntime> {
    let runtime = DockerRuntime::connect(config.docker.socket.as_deref())
        .context("failed to connect to Docker")?;
    runtime.ping().await.context("Docker daemon is not responding")?;
    debug!("connected to Docker");
    Ok(runtime)
}

async fn serve(config: Config, bind: Option<SocketAddr>) -> Result<()> {
    let addr = bind.unwrap_or(config.server.bind);
    let runtime = connect(&config).await?;

    info!(
        languages = config.languages.len(),
        max_concurrent = config.max_concurrent_executions,
        "starting execution service"
    );

    let runner = Runner::new(Arc::new(runtime), config);
    server::serve(addr, server::AppState::new(runner)).await
}

async fn run_execute(
    config: Config,
    source: &Path,
    language_id: &str,
    input: Option<&Path>,
) -> Result<()> {
    let language = config
        .get_language(language_id)
        .context("unknown language")?;

    let code = tokio::fs::read_to_string(source)
        .await
        .context("failed to read source file")?;

    let input = if let Some(input_path) = input {
        Some(
            tokio::fs::read_to_string(input_path)
                .await
                .context("failed to read input file")?,
        )
    } else {
        None
    };

    let request = language.to_request(language_id, code, input);
    request
        .validate(&config.bounds)
        .context("request rejected")?;

    info!(language = %language.name, image = %language.image, "running program");

    let runtime = connect(&config).await?;
    let runner = Runner::new(Arc::new(runtime), config);
    let result = runner.execute(&request).await;

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    if let Some(ref error) = result.error {
        eprintln!("{error}");
    }

    // Log execution info via tracing (stderr), keeping stdout clean for piping
    info!(
        success = result.success,
        time = format_args!("{}ms", result.execution_time),
        memory = ?result.memory_usage,
        "execution result"
    );

    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    for id in config.language_ids() {
        let Some(lang) = config.languages.get(id) else {
            continue;
        };
        let lang_type = if lang.is_compiled() {
            "compiled"
        } else {
            "interpreted"
        };
        println!("  {:<15} {} ({}, {})", id, lang.name, lang.image, lang_type);
    }
}

fn show_config(config: &Config) {
    let options = config.execution_options();
    println!("Execution policy:");
    println!("  Timeout: {} ms", options.timeout_ms);
    println!("  Memory limit: {}", options.memory_limit);
    println!("  CPU limit: {}", options.cpu_limit);
    println!("  Max processes: {}", options.max_processes);
    println!();
    println!("Request bounds:");
    println!("  Max code length: {} chars", config.bounds.max_code_length);
    println!("  Max input length: {} chars", config.bounds.max_input_length);
    println!();
    match config.docker.socket {
        Some(ref socket) => println!("Docker socket: {}", socket.display()),
        None => println!("Docker socket: (local default)"),
    }
    println!("Auto remove: {}", config.docker.auto_remove);
    println!("Workspace: {}", config.docker.workspace_dir);
    for mount in &config.docker.scratch_mounts {
        println!("  tmpfs {} ({})", mount.target, mount.options);
    }
    println!();
    println!("Max concurrent executions: {}", config.max_concurrent_executions);
    println!("Bind address: {}", config.server.bind);
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
