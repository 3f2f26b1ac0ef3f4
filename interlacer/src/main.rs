use std::process;

use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use tokio::{signal, task};

use interlacer::{DeviceContext, TrainArgs, prepare};

/// The exit status of a process stopped by SIGINT.
const INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = TrainArgs::parse();
    let device = DeviceContext::init()?;
    let (launch, guard) = prepare(&args)?;

    let stop = launch.stop_handle();
    let mut fit = task::spawn_blocking(move || launch.fit_on(&device));

    tokio::select! {
        ret = &mut fit => {
            let history = ret??;
            if let Some(last) = history.last() {
                info!("finished after {} epoch(s), final loss {:.6}", last.epoch, last.loss);
            }
        }
        _ = signal::ctrl_c() => {
            warn!("received SIGINT, stopping after the current step");
            stop.stop();

            // The run directory can only be cleaned once nothing writes to it anymore.
            match fit.await {
                Ok(Err(e)) => warn!("training failed while stopping: {e}"),
                Err(e) => warn!("training task failed while stopping: {e}"),
                Ok(Ok(_)) => {}
            }

            drop(guard);
            process::exit(INTERRUPTED);
        }
    }

    drop(guard);
    Ok(())
}
