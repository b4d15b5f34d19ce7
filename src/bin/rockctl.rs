use clap::Parser;
use log::{error, info};
use rockctl::{init_logging, run, Args};
use rockctl::error::AppRunError;

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!(concat!("rockctl ", env!("CARGO_PKG_VERSION")));

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(args));

    // stdin is read on a blocking thread that can not be interrupted, do not wait for it
    runtime.shutdown_background();

    if let Err(err) = &result {
        error!("{}", err);
    }
    result
}
