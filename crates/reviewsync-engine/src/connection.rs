/// Which transport is currently feeding the store.
///
/// Owned by the engine, one instance per active subscription. There is no
/// automatic retry of the push channel after falling back to polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Live,
    DegradedPolling,
    Closed,
}

impl ConnectionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Live | Self::DegradedPolling)
    }
}
