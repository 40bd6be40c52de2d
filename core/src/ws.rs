//! WebSocket transport for the core's `/logs` endpoint

use crate::subscription::{FeedConnector, FeedHandle, FeedSink};
use crate::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Opens one socket task per feed on a tokio runtime
#[derive(Clone)]
pub struct WsConnector {
    runtime: Handle,
}

impl WsConnector {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime of the calling context
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::transport(format!("no tokio runtime: {}", e)))
    }
}

/// Dropping the handle also stops the socket task
pub struct WsHandle {
    shutdown: oneshot::Sender<()>,
}

impl FeedConnector for WsConnector {
    type Handle = WsHandle;

    fn open(&self, url: &str, sink: FeedSink) -> WsHandle {
        let (shutdown, shutdown_rx) = oneshot::channel();
        self.runtime.spawn(run_feed(url.to_string(), sink, shutdown_rx));
        WsHandle { shutdown }
    }
}

impl FeedHandle for WsHandle {
    fn close(self) {
        let _ = self.shutdown.send(());
    }
}

async fn run_feed(url: String, sink: FeedSink, mut shutdown: oneshot::Receiver<()>) {
    // Fetched alongside the handshake; live messages are read only once the
    // batch is in the store
    let history = sink.has_history().then(|| {
        let sink = sink.clone();
        tokio::task::spawn_blocking(move || sink.load_history())
    });

    let mut stream = tokio::select! {
        _ = &mut shutdown => return,
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(e) => {
                sink.fail(e);
                return;
            }
        },
    };

    sink.opened();

    if let Some(task) = history {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = stream.close(None).await {
                    log::debug!("Close frame not sent: {}", e);
                }
                return;
            }
            result = task => {
                if let Err(e) = result {
                    log::warn!("Log history task failed: {}", e);
                }
            }
        }
    }

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    log::debug!("Close frame not sent: {}", e);
                }
                break;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = sink.deliver(text.as_str()) {
                        log::warn!("Skipping log message: {}", e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    log::debug!("Core closed log feed: {:?}", frame);
                    sink.closed();
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    sink.fail(e);
                    break;
                }
                None => {
                    sink.closed();
                    break;
                }
            },
        }
    }
}
