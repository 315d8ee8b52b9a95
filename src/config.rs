use crate::AnnounceFlags;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Dht Configurations
pub struct Config {
    /// Port announced by [Dht::announce](crate::Dht::announce).
    ///
    /// Defaults to `0`, leaving the port to the engine.
    pub announce_port: u16,
    /// Flags used by [Dht::announce](crate::Dht::announce).
    ///
    /// Defaults to [AnnounceFlags::NONE].
    pub announce_flags: AnnounceFlags,
    /// Fail requests immediately with [DhtError::NotRunning](crate::errors::DhtError::NotRunning)
    /// if the engine reports the DHT is not running, instead of sending them
    /// anyway and waiting for the whole timeout.
    ///
    /// Defaults to `true`.
    pub require_running: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            announce_port: 0,
            announce_flags: AnnounceFlags::NONE,
            require_running: true,
        }
    }
}
