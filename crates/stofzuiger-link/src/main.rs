//! `stofzuiger`: configure the vacuum robot from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use stofzuiger_link::{render_status, EmulatorServer, Link, LinkConfig, LinkError, Result};
use stofzuiger_protocol::{Address, FirmwareVariant, ProtocolError, Register};
use stofzuiger_session::{describe_metrics, RegisterFile, TimeOfDay, MAX_TIMINGS};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stofzuiger",
    version,
    about = "Read and change the stofzuiger robot's configuration"
)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Robot serial bridge address
    #[arg(long, global = true, value_name = "HOST:PORT")]
    endpoint: Option<String>,

    /// Firmware register layout
    #[arg(long, global = true, value_enum)]
    variant: Option<VariantArg>,

    /// Re-read the on minute after every on-hour report, like the phone app
    #[arg(long, global = true)]
    legacy_refetch: bool,

    /// Seconds to wait for the robot
    #[arg(long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Current,
    Extended,
}

impl From<VariantArg> for FirmwareVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Current => FirmwareVariant::Current,
            VariantArg::Extended => FirmwareVariant::Extended,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch and print the whole configuration
    Status {
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Write a register by name (fan-on, stuck-range, ...) or address
    Set { register: String, value: i32 },
    /// Edit the cleaning schedule
    Timing {
        #[command(subcommand)]
        action: TimingAction,
    },
    /// Start cleaning
    Run,
    /// Pause cleaning
    Pause,
    /// Interactive serial terminal
    Terminal,
    /// Serve an emulated robot over TCP
    Emulate {
        /// Port to listen on
        #[arg(long, default_value_t = 5000)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Number of schedule entries to start with
        #[arg(long, default_value_t = 0)]
        timings: usize,
    },
}

#[derive(Subcommand, Debug)]
enum TimingAction {
    /// Append an empty timing
    Add,
    /// Drop the last timing
    Remove,
    /// Change a timing's start and duration
    Edit {
        index: usize,
        /// Start time, HH:MM
        on: String,
        /// Run time, HH:MM
        run: String,
    },
}

fn load_config(cli: &Cli) -> Result<LinkConfig> {
    let mut config = match &cli.config {
        Some(path) => LinkConfig::load(path)?,
        None => LinkConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(variant) = cli.variant {
        config.variant = variant.into();
    }
    if cli.legacy_refetch {
        config.legacy_refetch = true;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    Ok(config)
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Accept a register name or a numeric address.
fn parse_target(s: &str) -> Result<(Address, Option<Register>)> {
    if let Ok(addr) = s.parse::<u16>() {
        return Ok((Address(addr), None));
    }
    match Register::from_name(s) {
        Some(register) => Ok((register.address(), Some(register))),
        None => Err(ProtocolError::UnknownRegister(s.to_string()).into()),
    }
}

async fn connect(config: &LinkConfig) -> Result<Link> {
    info!("connecting to {}", config.endpoint);
    Link::connect(&config.endpoint, config.session_config()).await
}

async fn status(config: &LinkConfig, json: bool) -> Result<()> {
    let mut link = connect(config).await?;
    link.sync(config.timeout()).await?;
    let snapshot = link.session().store().snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", render_status(&snapshot));
    }
    link.close().await
}

async fn set(config: &LinkConfig, target: &str, value: i32) -> Result<()> {
    let (address, register) = parse_target(target)?;
    let mut link = connect(config).await?;
    link.sync(config.timeout()).await?;

    let before = link.session().stats().config_events;
    link.session_mut().set_raw(address, value)?;
    link.wait_for(config.timeout(), |s| s.stats().config_events > before)
        .await?;

    match register.and_then(|r| link.session().store().value(r).map(|v| (r, v))) {
        Some((register, reported)) => println!("{} = {}", register, reported),
        None => println!("{} <- {}", address, value),
    }
    link.close().await
}

async fn timing(config: &LinkConfig, action: TimingAction) -> Result<()> {
    let mut link = connect(config).await?;
    link.sync(config.timeout()).await?;
    let count = link.session().store().time_count();

    match action {
        TimingAction::Add => {
            link.session_mut().add_timing()?;
            link.wait_for(config.timeout(), |s| {
                s.store().time_count() == count + 1 && s.store().is_synchronized()
            })
            .await?;
        }
        TimingAction::Remove => {
            if !link.session_mut().remove_timing()? {
                println!("No timings to remove.");
                return link.close().await;
            }
            link.wait_for(config.timeout(), |s| s.store().time_count() + 1 == count)
                .await?;
        }
        TimingAction::Edit { index, on, run } => {
            let on = TimeOfDay::parse(&on)?;
            let run = TimeOfDay::parse(&run)?;
            link.session_mut().edit_timing(index, on, run)?;
            let expected = [on.hour, on.minute, run.hour, run.minute].map(|v| Some(v as i32));
            link.wait_for(config.timeout(), |s| {
                s.store().entry(index).is_some_and(|e| {
                    [e.on_hour, e.on_minute, e.run_hour, e.run_minute] == expected
                }) && s.store().is_synchronized()
            })
            .await?;
        }
    }

    print!("{}", render_status(&link.session().store().snapshot()));
    link.close().await
}

async fn action(config: &LinkConfig, run: bool) -> Result<()> {
    let mut link = connect(config).await?;
    if run {
        link.session_mut().run()?;
    } else {
        link.session_mut().pause()?;
    }
    link.close().await
}

async fn terminal(config: &LinkConfig) -> Result<()> {
    let mut link = connect(config).await?;
    eprintln!("Connected to {}. Type :add, :remove, :status or :quit.", link.peer());
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    match link.run_terminal(stdin, &mut stdout).await {
        Ok(()) => link.close().await,
        Err(LinkError::Disconnected) => Ok(()),
        Err(e) => Err(e),
    }
}

async fn emulate(config: &LinkConfig, bind: &str, port: u16, timings: usize) -> Result<()> {
    let count = timings.min(MAX_TIMINGS);
    let mut schedule = Vec::with_capacity(count);
    for i in 0..count {
        let on = TimeOfDay::new((8 + i as u32) % 24, 0)?;
        let run = TimeOfDay::new(1, 0)?;
        schedule.push((on, run));
    }
    let robot = RegisterFile::new(config.variant).with_timings(&schedule);

    let server = EmulatorServer::bind((bind, port), robot).await?;
    eprintln!(
        "Emulating a {:?} robot with {} timings on {}",
        config.variant,
        count,
        server.local_addr()?
    );
    server.run().await?;
    Ok(())
}

async fn run(cli: Cli, config: LinkConfig) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status(&config, json).await,
        Commands::Set { register, value } => set(&config, &register, value).await,
        Commands::Timing { action: timing_action } => timing(&config, timing_action).await,
        Commands::Run => action(&config, true).await,
        Commands::Pause => action(&config, false).await,
        Commands::Terminal => terminal(&config).await,
        Commands::Emulate {
            port,
            bind,
            timings,
        } => emulate(&config, &bind, port, timings).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_filter);
    describe_metrics();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
