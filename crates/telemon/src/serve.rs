//! WebSocket push server for `--output remote`.
//!
//! Every connected viewer gets each rendered frame as one JSON text
//! message mapping element ids to their rendered text. Viewers that fall
//! behind skip frames instead of queueing them.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use telemon_core::RemoteSink;

/// Accept viewers until `cancel` fires.
pub async fn serve(listener: TcpListener, sink: RemoteSink, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let frames = sink.subscribe();
        let viewer_cancel = cancel.clone();
        tokio::spawn(async move {
            match push_frames(stream, peer, frames, viewer_cancel).await {
                Ok(()) => debug!(%peer, "viewer disconnected"),
                Err(e) => debug!(%peer, error = %e, "viewer dropped"),
            }
        });
    }
    debug!("push server stopped");
}

async fn push_frames(
    stream: TcpStream,
    peer: SocketAddr,
    mut frames: broadcast::Receiver<String>,
    cancel: CancellationToken,
) -> Result<(), tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    info!(%peer, "viewer connected");
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            incoming = read.next() => match incoming {
                None | Some(Ok(Message::Close(_))) => return Ok(()),
                Some(Err(e)) => return Err(e),
                // Pings are answered by tungstenite; anything else is ignored.
                Some(Ok(_)) => {}
            },
            frame = frames.recv() => match frame {
                Ok(json) => write.send(Message::text(json)).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(%peer, skipped, "viewer lagging, skipping frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    write.close().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use telemon_core::element::TextElementConfig;
    use telemon_core::{ElementTemplate, Manager, RenderSink, WidgetSpec};
    use telemon_ingest::Value;

    #[tokio::test]
    async fn viewer_receives_rendered_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut sink = RemoteSink::default();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve(listener, sink.clone(), cancel.clone()));

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
            .await
            .unwrap();

        // The viewer subscribes once the server has accepted it.
        while sink.viewers() == 0 {
            tokio::task::yield_now().await;
        }

        let mut manager = Manager::new();
        manager
            .add_template(&ElementTemplate::new(
                "status",
                WidgetSpec::Text(TextElementConfig::default()),
            ))
            .unwrap();
        manager.update("status", &[Value::from("armed")]).unwrap();
        manager.render();
        let frame = sink.capture(&manager).unwrap();
        sink.present(frame).unwrap();

        let message = ws.next().await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
        assert_eq!(parsed["status"], "armed");

        cancel.cancel();
        server.await.unwrap();
    }
}
