//! Duplicate-approval broker — pending requests awaiting an operator
//! decision. Each request resolves to exactly one of approved, ignored,
//! or expired.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crossfeed_core::types::{ApprovalRequest, MediaItem};

/// Why an `/ok` or `/ignore` could not be resolved.
#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    NonePending,
    /// More than one pending; an id is required.
    Ambiguous(usize),
    NotFound(u64),
}

/// Owns the pending-approval map. Ids are unique for the lifetime of
/// the process.
pub struct ApprovalBroker {
    pending: BTreeMap<u64, ApprovalRequest>,
    next_id: u64,
}

impl ApprovalBroker {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register a duplicate awaiting a decision; returns its id.
    pub fn create(&mut self, media: Vec<MediaItem>, caption: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            id,
            ApprovalRequest {
                id,
                media,
                caption,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Remove and return a pending request. With no id, succeeds only
    /// when exactly one request is pending.
    pub fn resolve(&mut self, id: Option<u64>) -> Result<ApprovalRequest, ResolveError> {
        match id {
            Some(id) => self.pending.remove(&id).ok_or(ResolveError::NotFound(id)),
            None => match self.pending.len() {
                1 => self
                    .pending
                    .pop_first()
                    .map(|(_, r)| r)
                    .ok_or(ResolveError::NonePending),
                0 => Err(ResolveError::NonePending),
                n => Err(ResolveError::Ambiguous(n)),
            },
        }
    }

    /// Pending requests in id order (pure read).
    pub fn list(&self) -> Vec<&ApprovalRequest> {
        self.pending.values().collect()
    }

    /// Remove and return every request created before the cutoff.
    pub fn expire_before(&mut self, cutoff: DateTime<Utc>) -> Vec<ApprovalRequest> {
        let expired_ids: Vec<u64> = self
            .pending
            .values()
            .filter(|r| r.created_at < cutoff)
            .map(|r| r.id)
            .collect();
        expired_ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for ApprovalBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn broker_with(n: usize) -> (ApprovalBroker, Vec<u64>) {
        let mut broker = ApprovalBroker::new();
        let ids = (0..n)
            .map(|i| broker.create(Vec::new(), format!("dup {i}")))
            .collect();
        (broker, ids)
    }

    #[test]
    fn test_roundtrip_by_id() {
        let (mut broker, ids) = broker_with(2);
        let req = broker.resolve(Some(ids[1])).unwrap();
        assert_eq!(req.caption, "dup 1");
        assert_eq!(broker.len(), 1);
        // resolved exactly once
        assert_eq!(
            broker.resolve(Some(ids[1])).unwrap_err(),
            ResolveError::NotFound(ids[1])
        );
    }

    #[test]
    fn test_omitted_id_needs_sole_pending() {
        let (mut broker, _) = broker_with(1);
        assert!(broker.resolve(None).is_ok());
        assert_eq!(broker.resolve(None).unwrap_err(), ResolveError::NonePending);

        let (mut broker, _) = broker_with(2);
        assert_eq!(broker.resolve(None).unwrap_err(), ResolveError::Ambiguous(2));
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let (broker, ids) = broker_with(3);
        assert_eq!(ids, vec![1, 2, 3]);
        let listed: Vec<u64> = broker.list().iter().map(|r| r.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn test_expire_before_cutoff() {
        let (mut broker, ids) = broker_with(2);
        let future = Utc::now() + Duration::seconds(60);
        let expired = broker.expire_before(future);
        assert_eq!(expired.len(), 2);
        assert!(broker.is_empty());
        assert_eq!(expired[0].id, ids[0]);

        // nothing left to expire
        assert!(broker.expire_before(future).is_empty());
    }

    #[test]
    fn test_expire_ignores_fresh_requests() {
        let (mut broker, _) = broker_with(1);
        let past = Utc::now() - Duration::seconds(60);
        assert!(broker.expire_before(past).is_empty());
        assert_eq!(broker.len(), 1);
    }
}
