use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::command::command_loop::command_loop;
use crate::config::io::load_config;
use crate::device::btle::BtleTransport;
use crate::device::session::{command_channel, CommandSender, DeviceSession};
use crate::device::types::TerminationReason;
use crate::error::AppRunError;
use crate::sink::FileSink;

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod sink;

/// Control a rocking device over bluetooth low energy.
#[derive(Parser, Debug, Default)]
#[command(version, about)]
pub struct Args {
    /// Path to the JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File that decoded notifications are appended to
    #[arg(long)]
    pub notifications_file: Option<PathBuf>,

    /// Only connect to the device with this address
    #[arg(long)]
    pub address: Option<String>,

    /// Log debug messages
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn init_logging(verbose: bool) {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    // stdout is used for the interactive prompt
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub async fn run(args: Args) -> Result<(), AppRunError> {
    let mut config = load_config(args.config.as_deref()).await?;
    if let Some(notifications_file) = args.notifications_file {
        config.notifications_file = notifications_file;
    }
    if let Some(address) = args.address {
        config.address = Some(address);
    }

    info!("Appending notifications to {}", config.notifications_file.to_string_lossy());
    let sink = Arc::new(FileSink::open(&config.notifications_file).await?);
    let transport = BtleTransport::new().await?;
    let cancel = CancellationToken::new();
    spawn(cancel_on_interrupt(cancel.clone()));

    let session = DeviceSession::new(transport, sink, config.device_filter(), config.timings(), cancel.clone());
    let (commands, requests) = command_channel();
    let session_handle = spawn(session.run(requests));

    let reason = interact(
        session_handle,
        cancel,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        commands,
    ).await?;

    match reason {
        TerminationReason::Shutdown => Ok(()),
        reason => Err(AppRunError::SessionTerminated { reason }),
    }
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupted");
            cancel.cancel();
        },
        Err(err) => warn!("Failed to listen for Ctrl-C: {}", err),
    }
}

/// Runs the command loop until it or the session ends, and returns the termination reason. The
/// session is always joined before this returns, so its connection has been released, also when
/// the command loop failed.
pub async fn interact<R, W>(
    mut session: JoinHandle<TerminationReason>,
    cancel: CancellationToken,
    input: R,
    output: W,
    commands: CommandSender,
) -> Result<TerminationReason, AppRunError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let interaction = command_loop(input, output, commands);

    tokio::select! {
        result = &mut session => Ok(result?),
        result = interaction => {
            cancel.cancel();
            let reason = session.await?;
            result?;
            Ok(reason)
        },
    }
}
