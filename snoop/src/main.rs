//! Lanscope Snoop - Passive LAN Topology Observer
//!
//! Captures Ethernet frames from a live interface or a pcap savefile and
//! writes binary network topology events to stdout.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lanscope_snoop::capture::{self, print_interfaces};
use lanscope_snoop::config::Config;
use lanscope_snoop::engine::Snoop;
use lanscope_snoop::lookup::{AsnTable, OuiTable, PrefixTable, Tables};

/// Lanscope Passive LAN Observer
#[derive(Parser, Debug)]
#[command(name = "lanscope-snoop")]
#[command(author = "SecuAAS")]
#[command(version)]
#[command(about = "Writes binary network topology events to stdout", long_about = None)]
struct Args {
    /// Read packets from the named interface
    #[arg(short = 'i', long)]
    interface: Option<String>,

    /// Read packets from the named pcap savefile
    #[arg(short = 'r', long, conflicts_with = "interface")]
    read: Option<PathBuf>,

    /// Read OUI information from the named CSV file
    #[arg(long)]
    oui: Option<PathBuf>,

    /// Read IPv4 prefix-to-ASN information from the named file
    #[arg(long)]
    prefixes: Option<PathBuf>,

    /// Read ASN-to-organization information from the named file
    #[arg(long)]
    asns: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List available network interfaces
    #[arg(long)]
    list_interfaces: bool,

    /// Be verbose. Print packet stats to stderr on exit
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // List interfaces and exit if requested
    if args.list_interfaces {
        print_interfaces();
        return Ok(());
    }

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    config.validate()?;

    // Setup logging. Stdout carries the event stream, so diagnostics go to
    // stderr.
    setup_logging(&config, args.verbose)?;

    let tables = load_tables(&args)?;

    if args.interface.is_some() == args.read.is_some() {
        bail!(
            "please provide either a pcap savefile (-r filename) or an interface (-i iface) \
             to read packets from"
        );
    }

    // Setup signal handling: SIGINT/SIGTERM/SIGHUP finish the current frame
    // and exit cleanly.
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    info!("Lanscope Snoop starting...");

    let mut snoop = Snoop::with_session_capacity(
        tables,
        config.model_options(),
        config.capture.session_cache_size,
        io::stdout(),
    );

    if let Some(interface) = &args.interface {
        capture::live::run(interface, &config.capture, &mut snoop, &running)?;
    } else if let Some(path) = &args.read {
        capture::file::run(path, &mut snoop, &running)?;
    }

    if args.verbose {
        eprintln!("{}", snoop.stats());
        eprintln!(
            "    {:>9} ARP bindings without an interface",
            snoop.model().arp_unknown_mac()
        );
        eprintln!();
        snoop.model().report(&mut io::stderr())?;
    }

    info!("Lanscope Snoop stopped");
    Ok(())
}

/// Setup logging based on configuration
fn setup_logging(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        match config.logging.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("lanscope_snoop={}", level).parse()?);

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(io::stderr))
            .init();
    }

    Ok(())
}

/// Load whichever lookup tables were named on the command line.
fn load_tables(args: &Args) -> Result<Tables> {
    let mut tables = Tables::default();

    if let Some(path) = &args.oui {
        tables.oui = OuiTable::load(path)
            .with_context(|| format!("Failed to load OUI table from {:?}", path))?;
        info!("{} OUI entries loaded from {:?}", tables.oui.len(), path);
    }

    if let Some(path) = &args.prefixes {
        tables.prefixes = PrefixTable::load(path)
            .with_context(|| format!("Failed to load prefix table from {:?}", path))?;
        info!(
            "{} IPv4 prefixes loaded from {:?}",
            tables.prefixes.len(),
            path
        );
    }

    if let Some(path) = &args.asns {
        tables.asns = AsnTable::load(path)
            .with_context(|| format!("Failed to load ASN table from {:?}", path))?;
        info!("{} ASNs loaded from {:?}", tables.asns.len(), path);
    }

    Ok(tables)
}
