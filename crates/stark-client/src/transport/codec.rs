//! Frame classification for the transport layer.
//!
//! - Text frames carry one envelope each and go to the session untouched
//! - Binary frames are not part of the Stark protocol and are skipped
//! - Ping/Pong/Close are surfaced for lifecycle management

use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, PartialEq)]
pub enum Inbound {
    Text(String),
    Binary { bytes_len: usize },
    Ping(Vec<u8>),
    Pong,
    Close,
}

pub fn classify(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Text(s),
        Message::Binary(b) => Inbound::Binary { bytes_len: b.len() },
        Message::Ping(v) => Inbound::Ping(v),
        Message::Pong(_) => Inbound::Pong,
        Message::Close(_) => Inbound::Close,
        // raw frames only show up when reading with a custom config
        Message::Frame(f) => Inbound::Binary { bytes_len: f.len() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_passes_through() {
        let msg = Message::Text(r#"{"action":"ping"}"#.into());
        assert_eq!(classify(msg), Inbound::Text(r#"{"action":"ping"}"#.into()));
    }

    #[test]
    fn lifecycle_frames() {
        assert_eq!(classify(Message::Ping(vec![1, 2])), Inbound::Ping(vec![1, 2]));
        assert_eq!(classify(Message::Pong(vec![])), Inbound::Pong);
        assert_eq!(classify(Message::Close(None)), Inbound::Close);
        assert_eq!(classify(Message::Binary(vec![0; 3])), Inbound::Binary { bytes_len: 3 });
    }
}
