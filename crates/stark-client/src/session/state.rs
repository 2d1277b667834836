/// Channel lifecycle: `Unconnected -> Connecting -> Open -> Closed`.
///
/// `Closed` is terminal for one channel; a new `connect` starts another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unconnected,
    Connecting,
    Open,
    Closed,
}

impl ChannelState {
    pub fn is_open(self) -> bool {
        matches!(self, ChannelState::Open)
    }

    /// Whether `connect` may start a new channel from this state.
    pub fn can_connect(self) -> bool {
        matches!(self, ChannelState::Unconnected | ChannelState::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Unconnected => "unconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Closed => "closed",
        }
    }
}
