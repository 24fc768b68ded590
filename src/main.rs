use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{debug, info};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use netpool::config::Config;
use netpool::config_loader::{load_config, open_registry};
use netpool::ip::cidr::{family_of_net, parse_cidr};
use netpool::pool::{AllocationRequest, IpPoolSpec, PoolSpec, RtRdPoolSpec};
use netpool::space::Family;
use netpool::PoolRegistry;

/// Allocator for IP subnet blocks and BGP RT/RD values
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State snapshot file, overrides general.state_file
    #[arg(short, long)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Summarize every pool
    Pools,
    /// Summarize one pool
    Show { pool: String },
    /// Create an IPv4 or IPv6 pool; the family follows the CIDR
    CreateIp {
        name: String,
        cidr: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Create a Route Target or Route Distinguisher pool
    CreateRtrd {
        name: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        format_type: u8,
        #[arg(long)]
        admin_value: String,
        #[arg(long)]
        range_start: u64,
        #[arg(long)]
        range_end: u64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a pool and all of its allocations
    Delete { pool: String },
    /// Allocate a subnet block (--prefix) or the next RT/RD value
    Allocate {
        pool: String,
        #[arg(long)]
        prefix: Option<u8>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        allocated_to: Option<String>,
    },
    /// Release an allocation by CIDR or admin:number
    Release { pool: String, identifier: String },
    /// List the allocations of a pool in address order
    List {
        pool: String,
        /// Only list allocations after this identifier
        #[arg(long)]
        after: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RoleArg {
    Rt,
    Rd,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).wrap_err("Failed to render output")?;
    println!("{}", text);
    Ok(())
}

fn ip_pool_spec(name: String, cidr: String, description: Option<String>) -> PoolSpec {
    let family = parse_cidr(&cidr).map(|net| family_of_net(&net));
    let spec = IpPoolSpec {
        name,
        description,
        cidr,
    };
    match family {
        Ok(Family::Ipv6) => PoolSpec::Ipv6(spec),
        // Malformed CIDRs are reported by pool validation
        _ => PoolSpec::Ipv4(spec),
    }
}

fn run(registry: &PoolRegistry, command: Command) -> Result<()> {
    match command {
        Command::Pools => print_json(&registry.pools()),
        Command::Show { pool } => print_json(&registry.pool(&pool)?),
        Command::CreateIp {
            name,
            cidr,
            description,
        } => {
            let summary = registry.create_pool(&ip_pool_spec(name, cidr, description))?;
            print_json(&summary)
        }
        Command::CreateRtrd {
            name,
            role,
            format_type,
            admin_value,
            range_start,
            range_end,
            description,
        } => {
            let spec = RtRdPoolSpec {
                name,
                description,
                format_type,
                admin_value,
                range_start,
                range_end,
            };
            let spec = match role {
                RoleArg::Rt => PoolSpec::Rt(spec),
                RoleArg::Rd => PoolSpec::Rd(spec),
            };
            print_json(&registry.create_pool(&spec)?)
        }
        Command::Delete { pool } => {
            registry.delete_pool(&pool)?;
            print_json(&json!({ "deleted": pool }))
        }
        Command::Allocate {
            pool,
            prefix,
            description,
            allocated_to,
        } => {
            let mut request = match prefix {
                Some(prefix) => AllocationRequest::block(prefix),
                None => AllocationRequest::value(),
            };
            request.metadata.description = description;
            request.metadata.allocated_to = allocated_to;
            print_json(&registry.allocate(&pool, request)?)
        }
        Command::Release { pool, identifier } => {
            registry.release(&pool, &identifier)?;
            print_json(&json!({ "pool": pool, "released": identifier }))
        }
        Command::List { pool, after } => {
            let listing = registry.list(&pool)?;
            let listing = match after {
                Some(after) => listing.resume_after(&after)?,
                None => listing,
            };
            print_json(&listing.collect::<Vec<_>>())
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(Env::default().default_filter_or(config.general.log_level.as_str()))
        .init();

    info!("Starting netpool v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration file: {:?}", args.config);

    let registry = open_registry(&config, args.state.as_deref())?;
    run(&registry, args.command)
}
