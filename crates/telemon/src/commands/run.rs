//! `telemon run`: connect, then ingest and render until Ctrl-C.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use telemon_config::{
    Config, OutputKind, TransportKind, build_manager, build_pipeline, bus_url, monitor_config,
    serial_config,
};
use telemon_core::{Monitor, RemoteSink, RunSummary, Source, TerminalSink};
use telemon_ingest::bus::{BusSubscription, ReconnectConfig};
use telemon_ingest::{ByteStreamTransport, SystemPorts};

use crate::cli::{GlobalOpts, OutputArg, RunArgs};
use crate::commands::load_config;
use crate::error::CliError;
use crate::serve;

/// Fold command-line flags over the loaded config.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(port) = &args.port {
        config.transport.kind = TransportKind::Serial;
        config.transport.port = Some(port.clone());
    }
    if let Some(search) = &args.search {
        config.transport.port = None;
        config.transport.device_search_pattern = Some(search.clone());
    }
    if let Some(baud) = args.baud {
        config.transport.baud_rate = baud;
    }
    if let Some(output) = args.output {
        config.renderer.output = match output {
            OutputArg::Terminal => OutputKind::Terminal,
            OutputArg::Remote => OutputKind::Remote,
        };
    }
    if let Some(listen) = &args.listen {
        config.renderer.output = OutputKind::Remote;
        config.renderer.listen = listen.clone();
    }
}

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = load_config(global)?;
    apply_overrides(&mut config, &args);

    let pipeline = build_pipeline(&config)?;
    let manager = build_manager(&config)?;
    let timing = monitor_config(&config)?;
    if manager.is_empty() {
        warn!("layout is empty; nothing will be drawn");
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            ctrl_c.cancel();
        }
    });

    let source = match config.transport.kind {
        TransportKind::Serial => Source::Serial {
            transport: ByteStreamTransport::open(
                serial_config(&config.transport),
                Arc::new(SystemPorts),
            )?,
            pipeline,
        },
        TransportKind::Bus => Source::Bus {
            subscription: BusSubscription::connect(
                bus_url(&config.transport)?,
                ReconnectConfig::from_delay(timing.reconnect_delay),
                cancel.child_token(),
            ),
            pipeline,
        },
    };

    let monitor = Monitor::new(manager, timing);
    let summary = match config.renderer.output {
        OutputKind::Terminal => monitor.run(source, TerminalSink::stdout(), cancel).await,
        OutputKind::Remote => {
            let listener = TcpListener::bind(&config.renderer.listen).await?;
            let addr = listener.local_addr()?;
            eprintln!("Serving dashboard on ws://{addr}/ (Ctrl-C to stop)");

            let sink = RemoteSink::default();
            let server = tokio::spawn(serve::serve(listener, sink.clone(), cancel.child_token()));
            let summary = monitor.run(source, sink, cancel).await;
            if let Err(e) = server.await {
                warn!(error = %e, "push server task failed");
            }
            summary
        }
    };

    report(&summary);
    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        accepted = summary.pipeline.frames.accepted,
        rejected = summary.pipeline.frames.rejected,
        superseded = summary.pipeline.frames.superseded,
        decode_errors = summary.pipeline.decode_errors,
        unknown_ids = summary.dispatch.unknown_ids,
        frames_rendered = summary.frames_rendered,
        reconnects = summary.reconnects,
        "session summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            port: None,
            baud: None,
            search: None,
            output: None,
            listen: None,
        }
    }

    #[test]
    fn port_flag_forces_serial_path() {
        let mut config = Config::default();
        config.transport.kind = TransportKind::Bus;
        apply_overrides(
            &mut config,
            &RunArgs {
                port: Some("/dev/ttyUSB9".into()),
                baud: Some(9600),
                ..args()
            },
        );
        assert_eq!(config.transport.kind, TransportKind::Serial);
        assert_eq!(config.transport.port.as_deref(), Some("/dev/ttyUSB9"));
        assert_eq!(config.transport.baud_rate, 9600);
    }

    #[test]
    fn listen_implies_remote_output() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            &RunArgs {
                listen: Some("0.0.0.0:9000".into()),
                ..args()
            },
        );
        assert_eq!(config.renderer.output, OutputKind::Remote);
        assert_eq!(config.renderer.listen, "0.0.0.0:9000");
    }
}
