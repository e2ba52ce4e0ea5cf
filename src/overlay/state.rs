#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLifecycle {
    Uninitialized,
    Starting,
    Ready,
    Active,
    TextUpdated,
    Stopping,
    Destroyed,
}

impl SurfaceLifecycle {
    pub fn is_live(self) -> bool {
        matches!(self, Self::Ready | Self::Active | Self::TextUpdated)
    }
}

pub fn can_transition(from: SurfaceLifecycle, to: SurfaceLifecycle) -> bool {
    use SurfaceLifecycle::*;
    matches!(
        (from, to),
        (Uninitialized, Starting)
            | (Starting, Ready)
            | (Starting, Destroyed)
            | (Ready, Active)
            | (Ready, Stopping)
            | (Active, TextUpdated)
            | (TextUpdated, Active)
            | (Active, Stopping)
            | (TextUpdated, Stopping)
            | (Stopping, Destroyed)
    ) || from == to
}

#[cfg(test)]
mod tests {
    use super::{can_transition, SurfaceLifecycle::*};

    #[test]
    fn happy_path_is_allowed() {
        let path = [
            Uninitialized,
            Starting,
            Ready,
            Active,
            TextUpdated,
            Active,
            Stopping,
            Destroyed,
        ];
        for pair in path.windows(2) {
            assert!(can_transition(pair[0], pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn creation_failure_skips_straight_to_destroyed() {
        assert!(can_transition(Starting, Destroyed));
        assert!(!can_transition(Destroyed, Active));
        assert!(!can_transition(Uninitialized, Active));
    }
}
