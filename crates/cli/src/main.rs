//! Shadow-route assignment command-line tool.
//!
//! Assigns batches of mail identities to backend shadow route files, and
//! provides read-only helpers to inspect domain bases and where an identity
//! is currently routed.

mod logging;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use shadowroute_core::config::{AppConfig, DEFAULT_CONFIG};
use shadowroute_core::domain_base::OtrsRule;
use shadowroute_core::route::{RouteFileLocator, RouteIndex, RouteWriter};
use shadowroute_core::{BatchOrchestrator, BatchResult, DomainBaseResolver, RunContext, Service};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Shadow-route assignment tool.
#[derive(Parser, Debug)]
#[command(
    name = "shadowroute",
    version,
    about = "Assign mail identities to backend shadow route files"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/shadowroute/config.toml"
    )]
    config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assign a comma-separated list of addresses to their route files.
    Assign {
        /// Backend: google or otrs (case-insensitive).
        #[arg(short, long)]
        service: String,

        /// Remove the identity from every route file already holding it.
        #[arg(long = "override", alias = "force")]
        force: bool,

        /// Use this route tree instead of the configured one.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Addresses, e.g. "jdoe@example.com,alice@hfm.com".
        emails: String,
    },

    /// Show the domain base and route file for one or more domains.
    Resolve {
        /// Backend: google or otrs (case-insensitive).
        #[arg(short, long, value_parser = parse_service)]
        service: Service,

        /// Domains (or full addresses) to resolve.
        #[arg(required = true)]
        domains: Vec<String>,
    },

    /// List the route files currently holding an identity.
    Locate {
        /// Backend: google or otrs (case-insensitive).
        #[arg(short, long, value_parser = parse_service)]
        service: Service,

        /// Identity (local part) to look for.
        identity: String,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./shadowroute.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

fn parse_service(s: &str) -> Result<Service, String> {
    s.parse::<Service>().map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output).map(|()| ExitCode::SUCCESS),
        Commands::Validate => cmd_validate(&cli.config).map(|()| ExitCode::SUCCESS),
        command => {
            let mut config = load_config(&cli.config)?;
            let level = cli
                .log_level
                .clone()
                .unwrap_or_else(|| config.log.level.clone());
            let _logging = logging::init(&level, config.log.file.as_deref())
                .context("failed to set up the run's log stream")?;

            match command {
                Commands::Assign {
                    service,
                    force,
                    output_dir,
                    emails,
                } => cmd_assign(&mut config, &service, force, output_dir, &emails),
                Commands::Resolve { service, domains } => {
                    cmd_resolve(&config, service, &domains).map(|()| ExitCode::SUCCESS)
                }
                Commands::Locate { service, identity } => {
                    cmd_locate(&config, service, &identity).map(|()| ExitCode::SUCCESS)
                }
                Commands::Init { .. } | Commands::Validate => unreachable!(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_validate(path).context("failed to load configuration file")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_assign(
    config: &mut AppConfig,
    selector: &str,
    force: bool,
    output_dir: Option<PathBuf>,
    emails: &str,
) -> Result<ExitCode> {
    if let (Some(dir), Ok(service)) = (output_dir, selector.parse::<Service>()) {
        config.set_output_dir(service, dir);
    }

    let ctx = RunContext::new();
    let result = BatchOrchestrator::new(&ctx, config)
        .run(emails, selector, force)
        .context("batch aborted before any address was processed")?;

    print_summary(&result);

    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_summary(result: &BatchResult) {
    println!();
    let service = result
        .service
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown service".to_string());
    println!(
        "{}",
        style::header(&format!("Shadow route batch ({})", service))
    );
    println!("{}", style::dim(&format!("run {}", result.run_id)));
    println!();

    for assignment in &result.succeeded {
        let file = assignment
            .route_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| assignment.route_file.display().to_string());
        println!(
            "  {}",
            style::success(&format!("{:<32} → {}", assignment.address, file))
        );
        for from in &assignment.displaced_from {
            println!(
                "      {}",
                style::dim(&format!("removed from {}", from.display()))
            );
        }
    }

    if !result.failed.is_empty() {
        println!();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Address", "Reason", "Detail"]);
        for failed in &result.failed {
            table.add_row(vec![
                Cell::new(&failed.address),
                Cell::new(failed.error.kind()).fg(Color::Red),
                Cell::new(failed.error.to_string()),
            ]);
        }
        println!("{}", table);
    }

    println!();
    let tally = format!(
        "{} succeeded, {} failed ({} total)",
        result.succeeded_count(),
        result.failed_count(),
        result.total()
    );
    if result.is_success() {
        println!("{}", style::success(&tally));
    } else {
        println!("{}", style::error(&tally));
    }
}

fn cmd_resolve(config: &AppConfig, service: Service, domains: &[String]) -> Result<()> {
    let resolver = DomainBaseResolver::new(&config.otrs.exceptions);
    let locator = RouteFileLocator::new(config.output_dir(service));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Domain", "Domain base", "Route file", "Exists"]);

    for input in domains {
        let domain = input.rsplit('@').next().unwrap_or(input);
        let base = resolver.resolve(service, domain);
        let path = locator.locate(service, &base);
        let exists = if RouteWriter::is_provisioned(&path) {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("missing").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(domain),
            Cell::new(base.as_str()),
            Cell::new(path.display().to_string()),
            exists,
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn cmd_locate(config: &AppConfig, service: Service, identity: &str) -> Result<()> {
    let root = config.output_dir(service);
    let index = RouteIndex::build(root)
        .with_context(|| format!("failed to scan route tree {}", root.display()))?;

    let files = index.locations(identity);
    if files.is_empty() {
        println!(
            "{}",
            style::warn(&format!("'{}' is not routed for {}", identity, service))
        );
        return Ok(());
    }

    if files.len() > 1 {
        println!(
            "{}",
            style::error(&format!(
                "'{}' appears in {} route files; re-assign with --override to repair",
                identity,
                files.len()
            ))
        );
    }
    for file in &files {
        println!("  {}", file.display());
    }
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Point [google] and [otrs] output_dir at the provisioned route trees");
    println!("  2. Add any OTRS domain exceptions under [otrs.exceptions]");
    println!(
        "  3. Validate with: shadowroute validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    match logging::parse_filter(&config.log.level) {
        Ok(_) => println!("  [OK] Log level parses"),
        Err(e) => {
            println!("  [FAIL] {:#}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    for service in Service::ALL {
        let dir = config.output_dir(service);
        println!(
            "  {:<14}: {} ({})",
            format!("{} routes", service),
            dir.display(),
            if dir.is_dir() { "present" } else { "MISSING" }
        );
    }
    println!(
        "  OTRS exceptions: {} ({} from config)",
        OtrsRule::new(&config.otrs.exceptions).exceptions().len(),
        config.otrs.exceptions.len()
    );
    println!(
        "  Tree lock     : {}",
        if config.routes.lock { "enabled" } else { "disabled" }
    );
    println!("  Log level     : {}", config.log.level);
    println!(
        "  Log file      : {}",
        config
            .log
            .file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stderr only".to_string())
    );
    println!();
    println!("Configuration is valid.");

    Ok(())
}
