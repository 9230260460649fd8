//! Network reachability as seen by the sync state machine.

/// Tri-state reachability.
///
/// Platform sensors report `None` until they have resolved reachability,
/// which maps to [`Connectivity::Unknown`]. The state machine takes no
/// subscription action while connectivity is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Connectivity {
    /// Reachability not resolved yet.
    #[default]
    Unknown,
    /// Network reachable.
    Online,
    /// Network unreachable.
    Offline,
}

impl Connectivity {
    /// Map a sensor reading (`None` = not resolved yet).
    pub fn from_reachability(is_connected: Option<bool>) -> Self {
        match is_connected {
            None => Self::Unknown,
            Some(true) => Self::Online,
            Some(false) => Self::Offline,
        }
    }

    /// True if reachability is known.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl From<bool> for Connectivity {
    fn from(is_connected: bool) -> Self {
        Self::from_reachability(Some(is_connected))
    }
}
