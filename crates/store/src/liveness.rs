/// Which snapshots a read may return.
///
/// Soft-deleted snapshots stay in storage, so every snapshot read states
/// whether it wants them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liveness {
    /// Only snapshots with `is_active = true`.
    ActiveOnly,
    /// Active and soft-deleted snapshots alike.
    IncludeInactive,
}

impl Liveness {
    /// Returns true if a snapshot with the given flag passes this filter.
    pub fn admits(&self, is_active: bool) -> bool {
        match self {
            Liveness::ActiveOnly => is_active,
            Liveness::IncludeInactive => true,
        }
    }

    pub(crate) fn includes_inactive(&self) -> bool {
        matches!(self, Liveness::IncludeInactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_only_filters_inactive() {
        assert!(Liveness::ActiveOnly.admits(true));
        assert!(!Liveness::ActiveOnly.admits(false));
        assert!(Liveness::IncludeInactive.admits(false));
    }
}
