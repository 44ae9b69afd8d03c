//! `chardev` binary.
//!
//! Loads the device module into an in-process host and drives it the way a
//! shell would drive a device node.
//!
//! # Usage
//!
//! ```bash
//! # cat /dev/chardev, three times
//! chardev cat --times 3
//!
//! # echo hi > /dev/chardev
//! chardev echo hi
//!
//! # several processes racing for the device
//! chardev contend --readers 4
//!
//! # device snapshot as JSON
//! chardev --config chardev.json status
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chardev_core::DeviceNumber;
use chardev_host::{CharDeviceRegistry, ChardevModule, FileHandle, HostError, ModuleConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Read-only hello-world character device
#[derive(Parser, Debug)]
#[command(name = "chardev")]
#[command(about = "Load the chardev module and talk to it")]
#[command(version)]
struct Args {
    /// Path to a JSON module configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Device name, overrides the configuration
    #[arg(long)]
    name: Option<String>,

    /// Major number to request (0 for dynamic), overrides the configuration
    #[arg(long)]
    major: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Open, drain and close the device, printing the message
    Cat {
        /// Number of sessions to run
        #[arg(short, long, default_value_t = 1)]
        times: u32,
    },

    /// Try to write to the device
    Echo {
        /// Text to write
        text: String,
    },

    /// Race several readers for the device
    Contend {
        /// Number of concurrent readers
        #[arg(short, long, default_value_t = 4)]
        readers: u32,

        /// Delay before retrying a busy open, in milliseconds
        #[arg(long, default_value_t = 5)]
        backoff_ms: u64,
    },

    /// Run one session and print the device status as JSON
    Status,
}

impl Args {
    /// Resolve the module configuration from file and flags.
    fn module_config(&self) -> Result<ModuleConfig> {
        let mut config = match &self.config {
            Some(path) => ModuleConfig::load(path)
                .with_context(|| format!("loading configuration from {path}"))?,
            None => ModuleConfig::default(),
        };
        if let Some(name) = &self.name {
            config.device_name = name.clone();
        }
        if let Some(major) = self.major {
            config.major = major;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run `times` sessions, collecting each message.
fn cat(registry: &CharDeviceRegistry, number: DeviceNumber, times: u32) -> Result<Vec<String>> {
    (0..times)
        .map(|_| -> Result<String> {
            let mut file = FileHandle::open(registry, number)?;
            let message = file.read_message()?;
            file.close()?;
            Ok(String::from_utf8_lossy(&message).into_owned())
        })
        .collect()
}

/// Attempt a write, returning the device's rejection.
fn echo(registry: &CharDeviceRegistry, number: DeviceNumber, text: &str) -> Result<HostError> {
    let mut file = FileHandle::open(registry, number)?;
    let mut line = text.as_bytes().to_vec();
    line.push(b'\n');
    match file.write_bytes(&line) {
        Ok(n) => anyhow::bail!("device unexpectedly accepted {n} bytes"),
        Err(e) => Ok(e),
    }
}

/// Retry a busy open until a session is granted, then drain it.
async fn reader(
    registry: Arc<CharDeviceRegistry>,
    number: DeviceNumber,
    reader: u32,
    backoff: Duration,
) -> chardev_host::Result<(u32, String)> {
    let mut retries = 0u32;
    loop {
        match FileHandle::open(&registry, number) {
            Ok(mut file) => {
                let message = file.read_message()?;
                file.close()?;
                tracing::debug!(reader, retries, "reader finished");
                return Ok((reader, String::from_utf8_lossy(&message).into_owned()));
            }
            Err(HostError::Device(e)) if e.is_retryable() => {
                retries += 1;
                tracing::trace!(reader, retries, "device busy, backing off");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Race `readers` concurrent readers for the device. Results are ordered
/// by reader index.
async fn contend(
    registry: Arc<CharDeviceRegistry>,
    number: DeviceNumber,
    readers: u32,
    backoff: Duration,
) -> Result<Vec<(u32, String)>> {
    let mut tasks = tokio::task::JoinSet::new();
    for index in 0..readers {
        tasks.spawn(reader(Arc::clone(&registry), number, index, backoff));
    }

    let mut results = Vec::with_capacity(readers as usize);
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("reader task panicked")??);
    }
    results.sort_by_key(|(index, _)| *index);
    Ok(results)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.module_config()?;
    let registry = Arc::new(CharDeviceRegistry::new());
    let module = ChardevModule::init(config, &registry)?;
    let number = module.device_number();
    let mut stdout = std::io::stdout().lock();

    match &args.command {
        Command::Cat { times } => {
            for message in cat(&registry, number, *times)? {
                stdout.write_all(message.as_bytes())?;
            }
        }
        Command::Echo { text } => {
            let rejection = echo(&registry, number, text)?;
            writeln!(stdout, "write rejected: {rejection} (errno {})", rejection.errno())?;
        }
        Command::Contend {
            readers,
            backoff_ms,
        } => {
            let backoff = Duration::from_millis(*backoff_ms);
            for (reader, message) in contend(Arc::clone(&registry), number, *readers, backoff).await? {
                write!(stdout, "reader {reader}: {message}")?;
            }
        }
        Command::Status => {
            cat(&registry, number, 1)?;
            let status = serde_json::to_string_pretty(&module.status())?;
            writeln!(stdout, "{status}")?;
        }
    }

    tracing::debug!("{}", registry.proc_devices());
    module.cleanup(&registry).map_err(|(_, e)| e)?;
    Ok(())
}
