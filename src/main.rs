use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vaultpress::build::{self, Builder};
use vaultpress::config::{self, CONFIG_FILENAME};
use vaultpress::io::FsIo;
use vaultpress::logger::TracingLogger;
use vaultpress::output;
use vaultpress::route::RouteAnalyzer;

#[derive(Parser)]
#[command(name = "vaultpress")]
#[command(about = "Publish a vault of markdown notes as a static content tree")]
#[command(long_about = "\
Publish a vault of markdown notes as a static content tree

Your filesystem is the data source. Folders become categories, notes are
ordered by numeric prefix, and every note carries a YAML header.

Vault structure:

  blog/
  ├── vaultpress.toml              # Build config (optional)
  ├── vault/
  │   ├── 010-tech/                # Published as tech/
  │   │   ├── 001-intro.md         # Published as tech/intro.md
  │   │   ├── 002-ownership.md
  │   │   └── diagram.png          # Media is copied as-is
  │   └── about.md
  └── dist/                        # Output (generated)

Headers are validated and completed on the way out: missing fields get
defaults, `href` and `params` come from the route shape, siblings get
pagination links, series members get their position, and every category
gets an index document.

Run 'vaultpress gen-config' to generate a documented vaultpress.toml.")]
#[command(version)]
struct Cli {
    /// Config file; relative vault/output roots resolve against its folder
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Log every plugin run, not just warnings and errors
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: scan → plugins → publish
    Build {
        /// Rewrite every copy and rerun every plugin
        #[arg(long)]
        no_cache: bool,
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate config, vault and document headers without writing
    Check {
        /// Print the check report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Analyze a route shape, optionally binding a path against it
    Route {
        /// Shape such as /[category]/[...post]
        shape: String,
        /// Slash-separated path to bind, e.g. tech/rust/intro
        #[arg(long)]
        bind: Option<String>,
        #[arg(long, default_value = "[")]
        open_tag: String,
        #[arg(long, default_value = "]")]
        close_tag: String,
    },
    /// Print a stock vaultpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { no_cache, json } => {
            let config = config::load_config(&cli.config)?;
            let base = config_base(&cli.config);
            let mut builder = Builder::from_config(
                &config,
                &base,
                Arc::new(FsIo::new()),
                Arc::new(TracingLogger),
            )?;
            if no_cache {
                builder.set_cache(false);
            }
            println!(
                "==> Building {} → {}",
                builder.vault_root().display(),
                builder.output_root().display()
            );
            let report = builder.build()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_build_report(&report);
            }
            if !report.is_clean() {
                return Err("build finished with failures".into());
            }
            println!("==> Build complete: {}", report.output_root.display());
        }
        Command::Check { json } => {
            let config = config::load_config(&cli.config)?;
            let base = config_base(&cli.config);
            let report = build::check(&config, &base, &FsIo::new())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("==> Checking {}", report.vault_root.display());
                output::print_check_report(&report);
            }
            if !report.is_clean() {
                return Err("vault has problems".into());
            }
            if !json {
                println!("==> Vault is valid");
            }
        }
        Command::Route {
            shape,
            bind,
            open_tag,
            close_tag,
        } => {
            let analyzed = RouteAnalyzer::new(&open_tag, &close_tag)?.analyze_param(&shape)?;
            let binding = match bind.as_deref() {
                Some(path) => {
                    let components: Vec<&str> =
                        path.split('/').filter(|c| !c.is_empty()).collect();
                    Some(analyzed.bind(&components)?)
                }
                None => None,
            };
            output::print_route_shape(&shape, &analyzed, binding.as_ref());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise warnings, or info with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "vaultpress=info" } else { "vaultpress=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Folder relative roots resolve against: the config file's parent.
fn config_base(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
