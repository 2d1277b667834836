//! WebSocket worker.
//!
//! One task owns the `Session` and, while connected, the socket. Handles talk
//! to it through an unbounded command channel, so every protocol operation
//! runs to completion on this task and the session needs no locking.
//!
//! Lifecycle per channel: idle -> connecting -> open -> closed -> idle. The
//! worker never reconnects on its own; a new `Connect` command starts the
//! next channel.

use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use stark_core::Envelope;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::session::{ReplyHandler, Session, SessionEvent};
use crate::transport::codec::{classify, Inbound};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Requests from client handles.
pub(crate) enum Command {
    Connect,
    Publish(Envelope),
    Subscribe { action: String, device: String },
    Request { env: Envelope, on_reply: Option<ReplyHandler> },
    Close,
}

enum Flow {
    /// Open a channel.
    Connect,
    /// Go back to idle and wait for the next `Connect`.
    Idle,
    /// Every handle is gone.
    Shutdown,
}

enum Connecting {
    Opened(Box<Socket>),
    Aborted(Flow),
}

pub(crate) struct Worker {
    url: String,
    session: Session,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Worker {
    pub(crate) fn new(
        url: String,
        session: Session,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            url,
            session,
            commands,
            events,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            if let Flow::Shutdown = self.idle().await {
                break;
            }
            let socket = match self.connecting().await {
                Connecting::Opened(socket) => socket,
                Connecting::Aborted(Flow::Shutdown) => break,
                Connecting::Aborted(_) => continue,
            };
            if let Flow::Shutdown = self.open(*socket).await {
                break;
            }
        }
        tracing::debug!("stark client worker stopped");
    }

    // --------------------
    // Phases
    // --------------------

    /// No channel: everything published lands in the outbound queue.
    async fn idle(&mut self) -> Flow {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        None => return Flow::Shutdown,
                        Some(Command::Connect) => match self.session.begin_connect() {
                            Ok(()) => return Flow::Connect,
                            Err(e) => tracing::warn!(error = %e, "connect ignored"),
                        },
                        Some(Command::Close) => tracing::debug!("close ignored: no channel"),
                        Some(cmd) => self.apply(cmd),
                    }
                }
                _ = sleep_until_deadline(self.session.next_deadline()) => {
                    self.session.expire(now());
                }
            }
            self.forward_events();
        }
    }

    async fn connecting(&mut self) -> Connecting {
        tracing::info!(url = %self.url, "connecting");
        let connect = connect_async(self.url.clone());
        tokio::pin!(connect);

        let flow = loop {
            tokio::select! {
                res = &mut connect => {
                    match res {
                        Ok((socket, _)) => return Connecting::Opened(Box::new(socket)),
                        Err(e) => {
                            tracing::warn!(error = %e, "connect failed");
                            break Flow::Idle;
                        }
                    }
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        None => break Flow::Shutdown,
                        Some(Command::Close) => break Flow::Idle,
                        Some(Command::Connect) => {
                            if let Err(e) = self.session.begin_connect() {
                                tracing::debug!(error = %e, "connect ignored");
                            }
                        }
                        Some(cmd) => self.apply(cmd),
                    }
                }
                _ = sleep_until_deadline(self.session.next_deadline()) => {
                    self.session.expire(now());
                }
            }
        };

        self.session.handle_close();
        self.forward_events();
        Connecting::Aborted(flow)
    }

    async fn open(&mut self, mut socket: Socket) -> Flow {
        if let Err(e) = self.session.handle_open() {
            tracing::warn!(error = %e, "auto-subscribe failed");
        }

        let flow = loop {
            if !self.flush(&mut socket).await {
                break Flow::Idle;
            }
            self.forward_events();

            tokio::select! {
                cmd = self.commands.recv() => {
                    match cmd {
                        None => {
                            let _ = socket.close(None).await;
                            break Flow::Shutdown;
                        }
                        Some(Command::Close) => {
                            let _ = socket.close(None).await;
                            break Flow::Idle;
                        }
                        Some(Command::Connect) => {
                            if let Err(e) = self.session.begin_connect() {
                                tracing::debug!(error = %e, "connect ignored");
                            }
                        }
                        Some(cmd) => self.apply(cmd),
                    }
                }
                incoming = socket.next() => {
                    let Some(Ok(msg)) = incoming else { break Flow::Idle; };
                    match classify(msg) {
                        Inbound::Text(text) => self.session.handle_text(&text, now()),
                        Inbound::Ping(payload) => {
                            if socket.send(Message::Pong(payload)).await.is_err() {
                                break Flow::Idle;
                            }
                        }
                        Inbound::Pong => {}
                        Inbound::Binary { bytes_len } => {
                            tracing::debug!(bytes_len, "binary frame ignored");
                        }
                        Inbound::Close => break Flow::Idle,
                    }
                }
                _ = sleep_until_deadline(self.session.next_deadline()) => {
                    self.session.expire(now());
                }
            }
        };

        self.session.handle_close();
        self.forward_events();
        flow
    }

    // --------------------
    // Helpers
    // --------------------

    fn apply(&mut self, cmd: Command) {
        let res = match cmd {
            Command::Publish(env) => self.session.publish(env),
            Command::Subscribe { action, device } => self.session.subscribe(&action, &device),
            Command::Request { env, on_reply } => self
                .session
                .request(env, on_reply, now())
                .map(|_| ()),
            Command::Connect | Command::Close => Ok(()),
        };
        if let Err(e) = res {
            tracing::warn!(error = %e, "command failed");
        }
    }

    /// Write everything the session wants sent. False if the socket broke;
    /// the failed frame stays with the session and is requeued on close.
    async fn flush(&mut self, socket: &mut Socket) -> bool {
        while let Some(raw) = self.session.peek_transmit().map(str::to_owned) {
            if let Err(e) = socket.send(Message::Text(raw)).await {
                tracing::warn!(error = %e, "send failed");
                return false;
            }
            self.session.poll_transmit();
        }
        true
    }

    fn forward_events(&mut self) {
        while let Some(ev) = self.session.poll_event() {
            // receiver may be gone; the worker keeps serving handles regardless
            let _ = self.events.send(ev);
        }
    }
}

/// Session clock. Follows tokio time, so a paused runtime drives expiry.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending::<()>().await,
    }
}
