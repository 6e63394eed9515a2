// `spike-server check-config`: load and validate the configuration without
// starting the server.

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use spike_core::env::is_production;

use crate::config::{DatabaseBackend, ServerConfig};

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Path to the configuration file (default: ./spike.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Validate with production rules regardless of SPIKE_ENV
    #[arg(long)]
    pub production: bool,
}

pub fn run(args: CheckConfigArgs) -> anyhow::Result<()> {
    let config = ServerConfig::load(args.config.as_deref())?;
    let production = args.production || is_production();

    print_summary(&config, production);
    config.validate(production)?;

    println!("{}", "Configuration is valid.".green().bold());
    Ok(())
}

fn print_summary(config: &ServerConfig, production: bool) {
    let mode = if production { "production" } else { "development" };
    let options = &config.options;

    println!();
    println!("{}", "spike configuration".bold());
    println!("  mode:            {mode}");
    println!("  listen:          {}:{}", config.server.host, config.server.port);
    println!("  base url:        {}", options.base_url.as_deref().unwrap_or("(unset)"));
    println!("  base path:       {}", options.base_path);
    println!(
        "  secret:          {}",
        if options.secret.is_empty() { "(unset)".red().to_string() } else { "set".to_string() }
    );
    println!(
        "  device binding:  {}",
        if options.session.enforce_device_binding { "enforced" } else { "soft" }
    );
    println!(
        "  rate limit:      {}",
        if options.rate_limit.enabled { "on" } else { "off" }
    );
    println!(
        "  client ip:       {}",
        if options.trusted_ip_headers.is_empty() {
            "socket peer".to_string()
        } else {
            options.trusted_ip_headers.join(", ")
        }
    );
    for tier in &options.payment.tiers {
        println!("  tier:            {} month(s) = {}", tier.months, tier.amount);
    }
    println!(
        "  database:        {}",
        match config.database.backend {
            DatabaseBackend::Memory => "memory".to_string(),
            DatabaseBackend::Mongodb => format!("mongodb ({})", config.database.name),
        }
    );
    println!(
        "  counters:        {}",
        if config.redis.url.is_some() { "redis" } else { "memory" }
    );
    println!(
        "  gateway:         {}",
        config.gateway.as_ref().map(|g| g.base_url.as_str()).unwrap_or("(missing)")
    );
    println!();
}
