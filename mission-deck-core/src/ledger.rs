//! Bounded collection of pending approval requests.

use std::collections::VecDeque;

use crate::models::ApprovalRequest;

/// Maximum number of pending approvals kept.
pub const LEDGER_CAPACITY: usize = 20;

/// Pending approvals, most-recent-first, capped at [`LEDGER_CAPACITY`].
///
/// Only the state-owning writer touches the ledger, so none of these
/// operations lock.
#[derive(Debug, Clone, Default)]
pub struct ApprovalLedger {
    entries: VecDeque<ApprovalRequest>,
}

impl ApprovalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request, or merge it into the entry with the same id, and
    /// move it to the front. The oldest entries fall off past capacity.
    pub fn upsert(&mut self, request: ApprovalRequest) {
        let existing = self
            .entries
            .iter()
            .position(|e| e.id == request.id)
            .and_then(|index| self.entries.remove(index));
        let entry = match existing {
            Some(mut existing) => {
                existing.merge(request);
                existing
            }
            None => request,
        };
        self.entries.push_front(entry);
        self.entries.truncate(LEDGER_CAPACITY);
    }

    /// Drop the entry with `id`. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn most_recent(&self) -> Option<&ApprovalRequest> {
        self.entries.front()
    }

    pub fn get(&self, id: &str) -> Option<&ApprovalRequest> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApprovalRequest> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(id: &str, command: &str) -> ApprovalRequest {
        ApprovalRequest::new(id, command, Utc::now())
    }

    #[test]
    fn upsert_moves_existing_entry_to_front() {
        let mut ledger = ApprovalLedger::new();
        ledger.upsert(request("a", "ls"));
        ledger.upsert(request("b", "pwd"));
        ledger.upsert(request("a", "ls -la"));

        let ids: Vec<_> = ledger.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(ledger.most_recent().unwrap().command, "ls -la");
    }

    #[test]
    fn merge_keeps_known_command() {
        let mut ledger = ApprovalLedger::new();
        ledger.upsert(request("a", "ls"));
        ledger.upsert(request("a", ""));
        assert_eq!(ledger.get("a").unwrap().command, "ls");
    }

    #[test]
    fn removing_absent_id_is_noop() {
        let mut ledger = ApprovalLedger::new();
        ledger.upsert(request("a", "ls"));
        assert!(!ledger.remove("zzz"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.remove("a"));
        assert!(ledger.is_empty());
        assert!(ledger.most_recent().is_none());
    }
}
