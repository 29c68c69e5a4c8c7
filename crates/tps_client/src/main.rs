//! `tps-client`: run one load-generation pass and print the result.
mod cli;
mod logging;

use clap::Parser;
use tps_pipeline::pipeline::{HttpTarget, Pipeline, SimulatedWorkload};
use tracing::info;

use crate::cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), tps_pipeline::Error> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();
    let args = Args::parse();
    let _log_guard = logging::init(args.log_file.as_deref())?;
    if dotenv_loaded {
        info!(".env file loaded successfully.");
    }

    let settings = args.settings();
    info!(target: "config_final", ?settings, "Pipeline configuration loaded.");

    let target = HttpTarget::new(settings.endpoint(), settings.request_timeout())?;
    let workload = SimulatedWorkload::new(settings.work_time());

    let report = Pipeline::new(settings).run(target, workload).await?;
    println!("{}", report.render());
    println!("[Main] demo finished");

    Ok(())
}
