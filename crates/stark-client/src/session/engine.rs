use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use stark_core::error::{Result, StarkError};
use stark_core::protocol::{
    SubscribePayload, ACK_ACTION, PING_ACTION, SELF_ALIAS, SUBSCRIBE_ACTION,
};
use stark_core::{DeviceId, Envelope};

use crate::obs::ClientMetrics;
use crate::session::outbound::{DrainOrder, OutboundQueue};
use crate::session::pending::{PendingRequests, ReplyHandler, Take};
use crate::session::state::ChannelState;

/// Tunables for one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// How long a request waits for its reply before the handler is dropped.
    pub request_timeout: Duration,
    pub drain_order: DrainOrder,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(300),
            drain_order: DrainOrder::Fifo,
        }
    }
}

/// What a session reports to its consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Channel established; auto-subscriptions and queued envelopes already went out.
    Open,
    /// Inbound envelope that is neither a keep-alive nor a reply to a pending request.
    Message(Envelope),
    /// Channel terminated, or never opened.
    Close,
}

/// A frame waiting for the driver.
struct Outgoing {
    raw: String,
    /// Auto-subscription of the current channel; regenerated on every open.
    auto: bool,
}

/// Stark protocol state machine. See the module docs.
pub struct Session {
    device: DeviceId,
    state: ChannelState,
    opts: SessionOptions,
    pending: PendingRequests,
    queue: OutboundQueue,
    transmit: VecDeque<Outgoing>,
    events: VecDeque<SessionEvent>,
    metrics: Arc<ClientMetrics>,
}

impl Session {
    pub fn new(device: DeviceId, opts: SessionOptions) -> Self {
        Self::with_metrics(device, opts, Arc::new(ClientMetrics::default()))
    }

    pub fn with_metrics(device: DeviceId, opts: SessionOptions, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            device,
            state: ChannelState::Unconnected,
            opts,
            pending: PendingRequests::new(),
            queue: OutboundQueue::new(opts.drain_order),
            transmit: VecDeque::new(),
            events: VecDeque::new(),
            metrics,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    // --------------------
    // Channel events
    // --------------------

    /// Start a new channel. Only valid from `Unconnected` or `Closed`.
    pub fn begin_connect(&mut self) -> Result<()> {
        if !self.state.can_connect() {
            return Err(StarkError::AlreadyConnected);
        }
        self.transition(ChannelState::Connecting);
        Ok(())
    }

    /// The channel is open: subscribe to keep-alives and to everything
    /// addressed to us, flush the queue, then report `Open`.
    pub fn handle_open(&mut self) -> Result<()> {
        if self.state != ChannelState::Connecting {
            tracing::warn!(state = self.state.as_str(), "open event outside of connect; ignored");
            return Ok(());
        }
        self.transition(ChannelState::Open);

        let auto_from = self.transmit.len();
        self.subscribe(PING_ACTION, "")?;
        self.subscribe("", SELF_ALIAS)?;
        for out in self.transmit.iter_mut().skip(auto_from) {
            out.auto = true;
        }

        let queued = self.queue.drain();
        if !queued.is_empty() {
            tracing::debug!(count = queued.len(), "flushing outbound queue");
        }
        self.metrics.queue_flushed.add(&[], queued.len() as u64);
        self.transmit
            .extend(queued.into_iter().map(|raw| Outgoing { raw, auto: false }));
        self.update_gauges();

        self.events.push_back(SessionEvent::Open);
        Ok(())
    }

    /// One inbound text frame.
    pub fn handle_text(&mut self, text: &str, now: Instant) {
        let env = match Envelope::decode(text) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, bytes_len = text.len(), "dropping malformed inbound frame");
                self.metrics.inbound.inc(&[("outcome", "malformed")]);
                return;
            }
        };
        tracing::debug!(action = %env.action, id = %env.id, src = %env.src, "receive");

        if env.action == PING_ACTION {
            self.metrics.inbound.inc(&[("outcome", "ping")]);
            let ack = env.reply(Envelope::new(ACK_ACTION).with_corr(env.id.clone()));
            if let Err(e) = self.publish(ack) {
                tracing::warn!(error = %e, "failed to acknowledge ping");
            }
            return;
        }

        if let Some(corr) = env.corr.as_deref() {
            match self.pending.take(corr, now) {
                Take::Live { handler, elapsed } => {
                    self.metrics.inbound.inc(&[("outcome", "reply")]);
                    self.metrics.reply_latency.observe(&[], elapsed);
                    self.update_gauges();
                    handler(env);
                    return;
                }
                Take::Expired => {
                    self.metrics.inbound.inc(&[("outcome", "expired_reply")]);
                    self.metrics.requests_expired.inc(&[]);
                    self.update_gauges();
                }
                Take::Missing => {}
            }
        }

        self.metrics.inbound.inc(&[("outcome", "message")]);
        self.events.push_back(SessionEvent::Message(env));
    }

    /// The channel terminated (or the connect attempt failed).
    ///
    /// Frames the driver did not write go back to the front of the outbound
    /// queue, except this channel's auto-subscriptions.
    pub fn handle_close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.transition(ChannelState::Closed);

        let unsent: Vec<String> = self
            .transmit
            .drain(..)
            .filter(|out| !out.auto)
            .map(|out| out.raw)
            .collect();
        if !unsent.is_empty() {
            tracing::debug!(count = unsent.len(), "requeueing unsent frames");
            self.queue.requeue_front(unsent);
            self.update_gauges();
        }
        self.events.push_back(SessionEvent::Close);
    }

    /// Drop requests whose reply did not arrive in time.
    pub fn expire(&mut self, now: Instant) -> usize {
        let n = self.pending.expire(now);
        if n > 0 {
            tracing::debug!(count = n, "pending requests expired");
            self.metrics.requests_expired.add(&[], n as u64);
            self.update_gauges();
        }
        n
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    // --------------------
    // API
    // --------------------

    /// Fill defaults and send, or queue while the channel is not open.
    pub fn publish(&mut self, mut env: Envelope) -> Result<()> {
        env.fill_defaults(self.device.as_str());
        env.validate()?;
        let raw = env.encode()?;

        if self.state.is_open() {
            tracing::debug!(action = %env.action, id = %env.id, "publish");
            self.metrics.envelopes_sent.inc(&[("action", env.action.as_str())]);
            self.transmit.push_back(Outgoing { raw, auto: false });
        } else {
            tracing::debug!(action = %env.action, id = %env.id, state = self.state.as_str(), "publish queued");
            self.metrics.envelopes_queued.inc(&[("action", env.action.as_str())]);
            self.queue.push(raw);
            self.update_gauges();
        }
        Ok(())
    }

    /// Publish a `proto/sub`. An empty `device` also subscribes to envelopes
    /// addressed to this device, so two subscriptions go out.
    pub fn subscribe(&mut self, action: &str, device: &str) -> Result<()> {
        if device.is_empty() {
            let own = self.device.as_str().to_owned();
            self.subscribe(action, &own)?;
        }
        let device = if device.is_empty() {
            None
        } else {
            Some(self.device.resolve(device).to_owned())
        };
        let env = Envelope::new(SUBSCRIBE_ACTION).with_payload(&SubscribePayload::new(action, device))?;
        self.publish(env)
    }

    /// Publish and wait (asynchronously) for a reply correlated by id.
    ///
    /// `on_reply` runs at most once; it is dropped without being called if no
    /// reply arrives within the request timeout. Returns the envelope id.
    pub fn request(&mut self, mut env: Envelope, on_reply: Option<ReplyHandler>, now: Instant) -> Result<String> {
        env.fill_defaults(self.device.as_str());
        env.validate()?;
        let id = env.id.clone();

        if let Some(handler) = on_reply {
            if self.pending.insert(id.clone(), handler, now, self.opts.request_timeout) {
                tracing::warn!(id = %id, "request id reused; previous reply handler dropped");
            }
            self.update_gauges();
        }

        self.publish(env)?;
        Ok(id)
    }

    /// Publish `template` as a reply to `orig`.
    pub fn reply(&mut self, orig: &Envelope, template: Envelope) -> Result<()> {
        self.publish(orig.reply(template))
    }

    // --------------------
    // Driver side
    // --------------------

    /// Next serialized envelope to write to the channel.
    pub fn poll_transmit(&mut self) -> Option<String> {
        self.transmit.pop_front().map(|out| out.raw)
    }

    /// Next frame without taking it. Drivers pop it with `poll_transmit`
    /// once the write succeeded, so a failed write is requeued on close.
    pub fn peek_transmit(&self) -> Option<&str> {
        self.transmit.front().map(|out| out.raw.as_str())
    }

    pub fn drain_transmit(&mut self) -> Vec<String> {
        self.transmit.drain(..).map(|out| out.raw).collect()
    }

    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    pub fn has_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    fn transition(&mut self, next: ChannelState) {
        tracing::info!(device = %self.device, from = self.state.as_str(), to = next.as_str(), "channel state");
        self.metrics.channel_transitions.inc(&[("state", next.as_str())]);
        self.state = next;
    }

    fn update_gauges(&self) {
        self.metrics.pending_requests.set(&[], self.pending.len() as i64);
        self.metrics.queue_depth.set(&[], self.queue.len() as i64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn open_session() -> Session {
        let mut s = Session::new(DeviceId::new("web-AB12CD34"), SessionOptions::default());
        s.begin_connect().unwrap();
        s.handle_open().unwrap();
        s.drain_transmit();
        assert_eq!(s.poll_event(), Some(SessionEvent::Open));
        s
    }

    #[test]
    fn connect_is_rejected_while_connecting_or_open() {
        let mut s = Session::new(DeviceId::new("d"), SessionOptions::default());
        s.begin_connect().unwrap();
        assert_eq!(s.begin_connect().unwrap_err().code().as_str(), "ALREADY_CONNECTED");
        s.handle_open().unwrap();
        assert!(s.begin_connect().is_err());
        s.handle_close();
        assert_eq!(s.state(), ChannelState::Closed);
        assert!(s.begin_connect().is_ok());
    }

    #[test]
    fn close_is_reported_once() {
        let mut s = open_session();
        s.handle_close();
        s.handle_close();
        assert_eq!(s.poll_event(), Some(SessionEvent::Close));
        assert_eq!(s.poll_event(), None);
    }

    #[test]
    fn open_without_connect_is_ignored() {
        let mut s = Session::new(DeviceId::new("d"), SessionOptions::default());
        s.handle_open().unwrap();
        assert_eq!(s.state(), ChannelState::Unconnected);
        assert!(s.poll_transmit().is_none());
        assert!(s.poll_event().is_none());
    }

    #[test]
    fn malformed_frame_is_dropped_and_counted() {
        let mut s = open_session();
        s.handle_text("not json", Instant::now());
        assert!(s.poll_event().is_none());
        assert!(s.poll_transmit().is_none());
        assert_eq!(s.metrics().inbound.get(&[("outcome", "malformed")]), 1);
    }

    #[test]
    fn publish_without_action_is_rejected() {
        let mut s = open_session();
        let err = s.publish(Envelope::default()).unwrap_err();
        assert_eq!(err.code().as_str(), "INVALID_ENVELOPE");
        assert!(s.poll_transmit().is_none());
    }

    #[test]
    fn late_reply_goes_to_generic_dispatch() {
        let mut s = open_session();
        let now = Instant::now();
        let id = s
            .request(Envelope::new("event/last"), Some(Box::new(|_: Envelope| unreachable!("expired"))), now)
            .unwrap();
        s.drain_transmit();

        let late = format!(r#"{{"action":"reply","corr":"{id}"}}"#);
        s.handle_text(&late, now + Duration::from_secs(301));
        assert!(matches!(s.poll_event(), Some(SessionEvent::Message(_))));
        assert!(!s.has_pending(&id));
        assert_eq!(s.metrics().requests_expired.get(&[]), 1);
    }

    #[test]
    fn ping_without_source_acks_without_destination() {
        let mut s = open_session();
        s.handle_text(r#"{"action":"ping","id":"P2","corr":"older"}"#, Instant::now());
        let raw = s.poll_transmit().unwrap();
        assert!(!raw.contains("\"dst\""), "{raw}");
        let ack = Envelope::decode(&raw).unwrap();
        assert_eq!(ack.action, "ack");
        assert_eq!(ack.dst, None);
        assert_eq!(ack.corr.as_deref(), Some("P2"));
    }

    #[test]
    fn reply_helper_targets_original_sender() {
        let mut s = open_session();
        let orig = Envelope::decode(r#"{"action":"q","id":"Q1","src":"phone"}"#).unwrap();
        s.reply(&orig, Envelope::new("a")).unwrap();
        let sent = Envelope::decode(&s.poll_transmit().unwrap()).unwrap();
        assert_eq!(sent.dst.as_deref(), Some("phone"));
        assert_eq!(sent.corr.as_deref(), Some("Q1"));
        assert_eq!(sent.src, "web-AB12CD34");
    }
}
