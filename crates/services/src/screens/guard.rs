use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Collections a screen fetches independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Disasters,
    Disaster,
    SocialMedia,
    Resources,
    OfficialUpdates,
}

impl Slot {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        self as usize
    }
}

/// Proof that a fetch was issued; only the latest ticket per slot may
/// write back, and only while the screen is mounted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ticket {
    slot: Slot,
    seq: u64,
}

#[derive(Debug, Default)]
pub(crate) struct FetchGuard {
    mounted: AtomicBool,
    issued: [AtomicU64; Slot::COUNT],
}

impl FetchGuard {
    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::SeqCst);
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub(crate) fn issue(&self, slot: Slot) -> Ticket {
        let seq = self.issued[slot.index()].fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { slot, seq }
    }

    pub(crate) fn is_current(&self, ticket: Ticket) -> bool {
        self.is_mounted() && self.issued[ticket.slot.index()].load(Ordering::SeqCst) == ticket.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes_older() {
        let guard = FetchGuard::default();
        guard.set_mounted(true);
        let old = guard.issue(Slot::Resources);
        let new = guard.issue(Slot::Resources);
        let other = guard.issue(Slot::SocialMedia);
        assert!(!guard.is_current(old));
        assert!(guard.is_current(new));
        assert!(guard.is_current(other));
    }

    #[test]
    fn nothing_is_current_after_unmount() {
        let guard = FetchGuard::default();
        guard.set_mounted(true);
        let ticket = guard.issue(Slot::Disaster);
        guard.set_mounted(false);
        assert!(!guard.is_current(ticket));
    }
}
