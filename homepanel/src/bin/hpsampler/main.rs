/*
 *     Copyright 2025 The Homepanel Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::Parser;
use homepanel::counter::CounterReader;
use homepanel::publisher::Publisher;
use homepanel::sampler::{init_reconciler, Sampler};
use homepanel::tracing::init_tracing;
use homepanel_config::sampler::{self, CloudMode};
use homepanel_util::shutdown;
use homepanel_util::sysinfo::SystemMonitor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(
    name = sampler::NAME,
    author,
    version,
    about = "hpsampler samples the network usage of the host",
    long_about = "A long-running sampler of the homepanel server control panel. \
    It polls the interface counters, cpu and memory usage every tick, reconciles the traffic of the \
    billing period with the cloud provider and publishes the result into a lock-protected json file."
)]
struct Args {
    #[arg(
        short = 'c',
        long = "config",
        default_value_os_t = sampler::default_sampler_config_path(),
        help = "Specify config file to use")
    ]
    config: PathBuf,

    #[arg(
        long = "cloud-mode",
        help = "Override the cloud mode of the config [disabled, auto, required]"
    )]
    cloud_mode: Option<CloudMode>,

    #[arg(
        short = 'l',
        long,
        default_value = "info",
        help = "Specify the logging level [trace, debug, info, warn, error]"
    )]
    log_level: Level,

    #[arg(
        long,
        default_value_os_t = sampler::default_sampler_log_dir(),
        help = "Specify the log directory"
    )]
    log_dir: PathBuf,

    #[arg(
        long,
        default_value_t = 7,
        help = "Specify the max number of log files"
    )]
    log_max_files: usize,

    #[arg(
        long = "redirect-stderr",
        default_value_t = false,
        help = "Specify whether to redirect stderr into the log directory"
    )]
    redirect_stderr: bool,

    #[arg(
        long = "verbose",
        default_value_t = false,
        help = "Specify whether to print log"
    )]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments.
    let args = Args::parse();

    // Load config.
    let mut config = sampler::Config::load(&args.config).await?;
    if let Some(cloud_mode) = args.cloud_mode {
        config.cloud.mode = cloud_mode;
    }

    // Initialize tracing.
    let _guards = init_tracing(
        sampler::NAME,
        &args.log_dir,
        args.log_level,
        args.log_max_files,
        args.redirect_stderr,
        args.verbose,
    )?;

    // Initialize publisher.
    let publisher = Publisher::new(config.publisher.path.clone(), config.publisher.lock_timeout);

    // Initialize billing reconciler, a required cloud without identity leaves
    // an error report for the readers and terminates.
    let reconciler = init_reconciler(&config.cloud, &publisher).await?;

    // Initialize counter reader.
    let probe = Arc::new(CounterReader::new(SystemMonitor::new(
        config.sampler.cpu_refresh_interval,
        config.sampler.interfaces.clone(),
    )));

    // Initialize channel for graceful shutdown.
    let shutdown = shutdown::Shutdown::default();
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::unbounded_channel();

    // Initialize sampler.
    let sampler = Sampler::new(
        config.sampler.interval,
        probe,
        reconciler,
        publisher,
        shutdown.clone(),
        shutdown_complete_tx.clone(),
    );

    // Log sampler started pid.
    info!(
        "hpsampler started at pid {}, publishing to {}",
        std::process::id(),
        config.publisher.path.display()
    );

    // Wait for the sampler to exit or shutdown signal.
    tokio::select! {
        _ = tokio::spawn(async move { sampler.run().await }) => {
            info!("sampler exited");
        },

        _ = shutdown::shutdown_signal() => {},
    }

    // Trigger shutdown signal to the sampler.
    shutdown.trigger();

    // Drop shutdown_complete_tx to wait for the sampler to exit.
    drop(shutdown_complete_tx);

    // Wait for the sampler to exit.
    let _ = shutdown_complete_rx.recv().await;

    Ok(())
}
