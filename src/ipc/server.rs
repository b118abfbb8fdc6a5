use std::sync::Arc;

use futures::channel::mpsc::UnboundedReceiver;
use futures::{FutureExt as _, StreamExt as _};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use super::dispatch::dispatch;
use super::protocol::{Frame, FrameKind};
use crate::handler::RequestHandler;
use crate::updater::UpdateEvent;

/// Name used for error frames that cannot be tied to a request.
const PROTOCOL_ERROR_NAME: &str = "protocol";

/// Serve requests read from `reader` until EOF, writing replies and updater
/// events to `writer`.
///
/// Each request runs on its own task, so a slow update check never blocks a
/// ping. All in-flight requests are answered and queued events flushed before
/// the writer is shut down. Lines that are not UTF-8 get an `error` frame.
pub async fn serve<R, W>(
    handler: Arc<RequestHandler>,
    mut reader: R,
    writer: W,
    events: Option<UnboundedReceiver<UpdateEvent>>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Frame>();
    let writer_task = tokio::spawn(write_frames(writer, rx));

    let (stop_tx, stop_rx) = oneshot::channel();
    let forwarder = events.map(|events| tokio::spawn(forward_events(events, tx.clone(), stop_rx)));

    let mut in_flight = JoinSet::new();
    let mut buf = Vec::new();
    let read_result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Frame is not valid UTF-8: {e}");
                let _ = tx.send(Frame::error(PROTOCOL_ERROR_NAME, format!("Invalid UTF-8: {e}")));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match Frame::parse(line) {
            Ok(frame) if frame.kind == FrameKind::Request => {
                let handler = handler.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let reply = dispatch(&handler, &frame.name, &frame.payload).await;
                    let _ = tx.send(reply);
                });
            }
            Ok(frame) => {
                log::warn!("Ignoring `{}` frame from client", frame.kind);
                let _ = tx.send(Frame::error(
                    frame.name,
                    format!("Unexpected message type from client: `{}`", frame.kind),
                ));
            }
            Err(err) => {
                log::warn!("Malformed frame: {err}");
                let _ = tx.send(Frame::error(PROTOCOL_ERROR_NAME, err));
            }
        }
    };

    if let Err(e) = &read_result {
        log::error!("Failed to read input: {e}");
    }
    log::debug!("Input closed, waiting for {} in-flight request(s)", in_flight.len());
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            log::error!("Request task failed: {e}");
        }
    }

    let _ = stop_tx.send(());
    if let Some(forwarder) = forwarder
        && let Err(e) = forwarder.await
    {
        log::error!("Event forwarder failed: {e}");
    }
    drop(tx);
    writer_task.await??;
    read_result?;
    Ok(())
}

/// Forward updater events until told to stop, then flush whatever is queued.
async fn forward_events(
    mut events: UnboundedReceiver<UpdateEvent>,
    tx: mpsc::UnboundedSender<Frame>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    if tx.send(event_frame(&event)).is_err() {
                        return;
                    }
                }
                None => return,
            },
            _ = &mut stop => break,
        }
    }

    while let Some(Some(event)) = events.next().now_or_never() {
        if tx.send(event_frame(&event)).is_err() {
            return;
        }
    }
}

fn event_frame(event: &UpdateEvent) -> Frame {
    Frame::event(event.name(), event.payload().to_string())
}

async fn write_frames<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Frame>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let line = match frame.encode() {
            Ok(line) => line,
            Err(e) => {
                log::error!("Dropping `{}` frame: {e}", frame.name);
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
