//! Async Stark client handle.
//!
//! `StarkClient` is a cheap, cloneable handle. Construction spawns the worker
//! task that owns the protocol session (it does not connect yet), so it must be
//! called from within a tokio runtime. There is no global client: build one
//! and pass it to whatever needs it.
//!
//! ```no_run
//! # async fn demo() -> stark_core::Result<()> {
//! use stark_client::{ClientConfig, ClientEvent, StarkClient};
//! use stark_core::Envelope;
//!
//! let (client, mut events) = StarkClient::new(&ClientConfig::for_host("localhost:8080"));
//! client.connect()?;
//! let reply = client.request(Envelope::new("event/last"))?;
//! while let Some(ev) = events.recv().await {
//!     if ev == ClientEvent::Open {
//!         break;
//!     }
//! }
//! if let Some(env) = reply.wait().await {
//!     println!("{:?}", env.p);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use stark_core::error::{Result, StarkError};
use stark_core::{DeviceId, Envelope};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::obs::ClientMetrics;
use crate::session::{Session, SessionEvent};
use crate::transport::ws::{Command, Worker};

/// Lifecycle and inbound events: `Open`, `Message(envelope)`, `Close`.
pub type ClientEvent = SessionEvent;

/// Receiver side of the client's event stream.
///
/// Lazy and non-restartable: each event is delivered once. Ends when every
/// client handle has been dropped.
#[derive(Debug)]
pub struct Events {
    rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl Events {
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.rx.recv().await
    }

    /// Next event if one is ready.
    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.rx.try_recv().ok()
    }
}

/// Reply to a request, resolved by the worker.
#[derive(Debug)]
pub struct PendingReply {
    id: String,
    rx: oneshot::Receiver<Envelope>,
}

impl PendingReply {
    /// Id of the request envelope; replies carry it as `corr`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the reply. `None` if the request timed out or the client is gone.
    pub async fn wait(self) -> Option<Envelope> {
        self.rx.await.ok()
    }
}

/// Handle to a Stark protocol client.
#[derive(Clone)]
pub struct StarkClient {
    device: DeviceId,
    commands: mpsc::UnboundedSender<Command>,
    metrics: Arc<ClientMetrics>,
}

impl StarkClient {
    /// Client with the identity from `cfg` (fixed id, or name + random suffix).
    pub fn new(cfg: &ClientConfig) -> (Self, Events) {
        Self::with_device(cfg, cfg.client.device())
    }

    pub fn with_device(cfg: &ClientConfig, device: DeviceId) -> (Self, Events) {
        let metrics = Arc::new(ClientMetrics::default());
        let session = Session::with_metrics(
            device.clone(),
            cfg.client.session_options(),
            Arc::clone(&metrics),
        );

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();

        let span = tracing::info_span!("stark_client", device = %device);
        let worker = Worker::new(cfg.client.stream_url(), session, cmd_rx, ev_tx);
        tokio::spawn(worker.run().instrument(span));

        let client = Self {
            device,
            commands: cmd_tx,
            metrics,
        };
        (client, Events { rx: ev_rx })
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Open the channel. Failure to connect is reported as a `Close` event.
    pub fn connect(&self) -> Result<()> {
        self.send(Command::Connect)
    }

    /// Close the channel gracefully. Queued and pending state is kept.
    pub fn close(&self) -> Result<()> {
        self.send(Command::Close)
    }

    /// Send now, or queue until the channel opens.
    pub fn publish(&self, env: Envelope) -> Result<()> {
        let env = self.prepare(env)?;
        self.send(Command::Publish(env))
    }

    /// Subscribe to `action` (empty: all). `device` may be a device id,
    /// `"self"`, or empty, which subscribes both unscoped and to this device.
    pub fn subscribe(&self, action: &str, device: &str) -> Result<()> {
        self.send(Command::Subscribe {
            action: action.to_owned(),
            device: device.to_owned(),
        })
    }

    /// Publish and get a handle to the correlated reply.
    pub fn request(&self, env: Envelope) -> Result<PendingReply> {
        let (tx, rx) = oneshot::channel();
        let id = self.request_with(env, move |reply| {
            let _ = tx.send(reply);
        })?;
        Ok(PendingReply { id, rx })
    }

    /// Publish and run `on_reply` once with the correlated reply. Nothing runs
    /// if the request times out. Returns the request id.
    pub fn request_with<F>(&self, env: Envelope, on_reply: F) -> Result<String>
    where
        F: FnOnce(Envelope) + Send + 'static,
    {
        let env = self.prepare(env)?;
        let id = env.id.clone();
        self.send(Command::Request {
            env,
            on_reply: Some(Box::new(on_reply)),
        })?;
        Ok(id)
    }

    /// Publish `template` as a reply to `orig`.
    pub fn reply(&self, orig: &Envelope, template: Envelope) -> Result<()> {
        self.publish(orig.reply(template))
    }

    fn prepare(&self, mut env: Envelope) -> Result<Envelope> {
        env.fill_defaults(self.device.as_str());
        env.validate()?;
        Ok(env)
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).map_err(|_| StarkError::ClientClosed)
    }
}
