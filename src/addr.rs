use std::fmt;

/// The two serial collaborators the controller drives directly.
///
/// The vision module is not a `Peer`: it only ever produces `DetectionEvent`s
/// onto the bus and never receives commands or sends ACKs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    /// Locomotion controller (drive base).
    Actor,
    /// Manipulator (egg picker).
    Arm,
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor => write!(f, "ACTOR"),
            Self::Arm => write!(f, "ARM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Peer::Actor.to_string(), "ACTOR");
        assert_eq!(Peer::Arm.to_string(), "ARM");
    }
}
