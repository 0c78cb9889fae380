//! Network reachability signal consumed as the sync gate.

use tokio::sync::watch;

/// Kind of link currently carrying traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    None,
    /// Wi-Fi, ethernet and other links without a data cap
    Unmetered,
    /// Cellular or tethered links
    Metered,
}

/// Snapshot of the device's connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStatus {
    pub reachable: bool,
    pub transport: Transport,
}

impl NetworkStatus {
    pub const fn offline() -> Self {
        Self {
            reachable: false,
            transport: Transport::None,
        }
    }

    pub const fn unmetered() -> Self {
        Self {
            reachable: true,
            transport: Transport::Unmetered,
        }
    }

    pub const fn metered() -> Self {
        Self {
            reachable: true,
            transport: Transport::Metered,
        }
    }

    /// Whether sync may use the network right now under the given policy
    pub const fn is_usable(self, allow_metered: bool) -> bool {
        match self.transport {
            Transport::None => false,
            Transport::Unmetered => self.reachable,
            Transport::Metered => self.reachable && allow_metered,
        }
    }
}

/// Source of the current network status, polled before every remote call
pub trait ConnectivitySignal: Send + Sync + 'static {
    fn current(&self) -> NetworkStatus;
}

/// Connectivity signal backed by a `watch` channel fed by the platform
#[derive(Debug, Clone)]
pub struct WatchConnectivity {
    rx: watch::Receiver<NetworkStatus>,
}

impl WatchConnectivity {
    pub const fn new(rx: watch::Receiver<NetworkStatus>) -> Self {
        Self { rx }
    }

    /// A fresh receiver for tasks that wait on changes
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.rx.clone()
    }
}

impl ConnectivitySignal for WatchConnectivity {
    fn current(&self) -> NetworkStatus {
        *self.rx.borrow()
    }
}

/// Create a sender and the matching signal, starting at `initial`
pub fn channel(initial: NetworkStatus) -> (watch::Sender<NetworkStatus>, WatchConnectivity) {
    let (tx, rx) = watch::channel(initial);
    (tx, WatchConnectivity::new(rx))
}
