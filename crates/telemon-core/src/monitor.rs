//! The run loop.
//!
//! Two loops share one task: ingestion drains the source and dispatches
//! decoded updates, rendering repaints the sink at a fixed rate. They
//! share the manager behind an async mutex that is only ever held for
//! a synchronous dispatch or render, never across I/O waits.

use std::sync::Arc;

use serde::Serialize;
use telemon_ingest::bus::BusSubscription;
use telemon_ingest::{ByteStreamTransport, DecodedUpdate, Pipeline, PipelineStats};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::manager::{DispatchStats, Manager};
use crate::sink::RenderSink;

/// Where telemetry comes from.
#[derive(Debug)]
pub enum Source {
    /// A polled serial link.
    Serial {
        transport: ByteStreamTransport,
        pipeline: Pipeline,
    },
    /// Whole messages pushed from a bus subscription.
    Bus {
        subscription: BusSubscription,
        pipeline: Pipeline,
    },
}

/// Totals reported when [`Monitor::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pipeline: PipelineStats,
    pub dispatch: DispatchStats,
    pub frames_rendered: u64,
    pub reconnects: u64,
}

pub struct Monitor {
    manager: Arc<Mutex<Manager>>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(manager: Manager, config: MonitorConfig) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Shared handle on the manager, e.g. for out-of-band updates.
    pub fn manager(&self) -> Arc<Mutex<Manager>> {
        Arc::clone(&self.manager)
    }

    /// Run until `cancel` fires or a bus source closes.
    pub async fn run<S: RenderSink>(
        &self,
        source: Source,
        sink: S,
        cancel: CancellationToken,
    ) -> RunSummary {
        let stop = cancel.child_token();
        info!(
            render_ms = u64::try_from(self.config.render_interval.as_millis()).unwrap_or(u64::MAX),
            "monitor started"
        );

        let ingest = async {
            let outcome = self.ingest(source, &stop).await;
            stop.cancel();
            outcome
        };
        let ((pipeline, reconnects), frames_rendered) =
            tokio::join!(ingest, self.render(sink, &stop));

        let summary = RunSummary {
            pipeline,
            dispatch: self.manager.lock().await.stats(),
            frames_rendered,
            reconnects,
        };
        info!(
            frames = summary.frames_rendered,
            applied = summary.dispatch.applied,
            reconnects = summary.reconnects,
            "monitor stopped"
        );
        summary
    }

    // ── Ingestion ────────────────────────────────────────────────────

    async fn ingest(&self, source: Source, cancel: &CancellationToken) -> (PipelineStats, u64) {
        match source {
            Source::Serial {
                mut transport,
                mut pipeline,
            } => {
                let reconnects = self.ingest_serial(&mut transport, &mut pipeline, cancel).await;
                transport.close();
                (pipeline.stats(), reconnects)
            }
            Source::Bus {
                mut subscription,
                mut pipeline,
            } => {
                self.ingest_bus(&mut subscription, &mut pipeline, cancel).await;
                (pipeline.stats(), 0)
            }
        }
    }

    async fn ingest_serial(
        &self,
        transport: &mut ByteStreamTransport,
        pipeline: &mut Pipeline,
        cancel: &CancellationToken,
    ) -> u64 {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reconnects = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let polled = if transport.is_open() {
                transport.poll()
            } else {
                Err(telemon_ingest::Error::NotConnected)
            };
            let result = match polled {
                Ok(false) => continue,
                Ok(true) => transport.read(),
                Err(e) => Err(e),
            };

            match result {
                Ok(bytes) => {
                    let updates = pipeline.ingest(&bytes);
                    self.dispatch(&updates).await;
                }
                Err(e) => {
                    warn!(path = transport.path(), error = %e, "telemetry link lost");
                    pipeline.reset();
                    reconnects += 1;
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        _ = transport.reconnect(self.config.reconnect_delay) => {}
                    }
                }
            }
        }
        reconnects
    }

    async fn ingest_bus(
        &self,
        subscription: &mut BusSubscription,
        pipeline: &mut Pipeline,
        cancel: &CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = subscription.recv() => message,
            };
            let Some(message) = message else {
                debug!("bus subscription closed");
                break;
            };
            if let Some(update) = pipeline.ingest_message(&message) {
                self.dispatch(std::slice::from_ref(&update)).await;
            }
        }
        subscription.shutdown();
    }

    async fn dispatch(&self, updates: &[DecodedUpdate]) {
        if updates.is_empty() {
            return;
        }
        let mut manager = self.manager.lock().await;
        for update in updates {
            manager.dispatch(update);
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    async fn render<S: RenderSink>(&self, mut sink: S, cancel: &CancellationToken) -> u64 {
        let mut ticker = tokio::time::interval(self.config.render_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let frame = {
                let mut manager = self.manager.lock().await;
                manager.render();
                sink.capture(&manager)
            };
            if let Some(frame) = frame {
                if let Err(e) = sink.present(frame) {
                    warn!(error = %e, "render sink failed");
                }
            }
            frames += 1;
        }
        frames
    }
}
