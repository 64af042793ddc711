#![deny(warnings, clippy::all)]

use clap::Parser;
use ebpf_tracer::{perf, prelude::*, tracing::try_init_tracing_subscriber};
use std::sync::Arc;
use tracing::{error, info};

/// Decode log records from the tracer's kernel probes
#[derive(Parser, Debug, Clone)]
#[clap(version)]
pub struct Opts {
    #[clap(flatten)]
    pub tracer_opts: TracerOpts,
}

#[tokio::main]
async fn main() {
    match do_main().await {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

async fn do_main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    let cfg = TracerConfig::load_merge_with_opts(opts.tracer_opts)?;

    try_init_tracing_subscriber(cfg.debug)?;

    info!("Starting tracer...");

    let catalog = Arc::new(MessageCatalog::builtin()?);
    let source = perf::open_pinned(&cfg.log_map_pin, cfg.log_buffer_size)?;
    let task = DecoderTask::spawn(TelemetryDecoder::new(source, catalog, TracingSink));

    // Owned for the process lifetime so the packet-processing layer can mirror into it
    let _replay = match cfg.replay.interface.as_deref() {
        Some(iface) => {
            let enc = CaptureReplayEncoder::from_config(&cfg.replay, iface)?;
            info!(
                iface,
                unit = %enc.timestamp_unit(),
                "Capture replay encoder ready"
            );
            Some(enc)
        }
        None => None,
    };

    let close = task.close_handle();
    ctrlc::set_handler(move || {
        if close.is_closed() {
            // 128 (fatal error signal "n") + 2 (control-c is fatal error signal 2)
            std::process::exit(130);
        } else {
            close.close();
        }
    })?;

    match task.join().await? {
        PollExit::Closed => {
            info!("Shutting down");
            Ok(())
        }
        PollExit::Failed(e) => {
            error!("Telemetry decoder stopped");
            Err(e.into())
        }
    }
}
