//! In-flight request tracking.
//!
//! [`PendingRequests`] remembers every request sent with a correlation
//! identifier until the matching response arrives. Entries are removed
//! exactly once; a late or duplicate response finds nothing and is reported
//! to the handler without its original request.

use dashmap::DashMap;

use crate::message::{Request, RequestId};

/// Concurrent table of requests awaiting a response, keyed by
/// [`RequestId`].
#[derive(Debug, Default)]
pub struct PendingRequests(DashMap<RequestId, Request>);

impl PendingRequests {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Remember `request` under `id`.
    ///
    /// Identifiers are unique per connection, so an existing entry is never
    /// replaced; a clash is logged and the original entry kept.
    pub fn register(&self, id: RequestId, request: Request) {
        match self.0.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                tracing::warn!(request_id = %entry.key(), "duplicate request id, keeping first");
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(request);
            }
        }
    }

    /// Remove and return the request registered under `id`.
    #[must_use]
    pub fn resolve(&self, id: &RequestId) -> Option<Request> {
        self.0.remove(id).map(|(_, request)| request)
    }

    /// Drop every pending request.
    pub fn clear(&self) { self.0.clear(); }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` if nothing is awaiting a response.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::PendingRequests;
    use crate::message::{Request, RequestId, method};

    fn request(seq: u64) -> Request {
        Request::new(RequestId::from_seq(seq), method::STOP_STREAM, json!({"id": seq}))
    }

    #[test]
    fn resolves_in_any_order() {
        let table = PendingRequests::new();
        for seq in 0..5 {
            table.register(RequestId::from_seq(seq), request(seq));
        }

        for seq in (0..5).rev() {
            let resolved = table.resolve(&RequestId::from_seq(seq));
            assert_eq!(resolved, Some(request(seq)));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn resolves_each_entry_once() {
        let table = PendingRequests::new();
        let id = RequestId::from_seq(9);
        table.register(id.clone(), request(9));

        assert!(table.resolve(&id).is_some());
        assert!(table.resolve(&id).is_none());
    }

    #[test]
    fn duplicate_register_keeps_first_entry() {
        let table = PendingRequests::new();
        let id = RequestId::from_seq(1);
        table.register(id.clone(), request(1));
        table.register(id.clone(), request(2));

        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(&id), Some(request(1)));
    }

    #[test]
    fn clear_drops_everything() {
        let table = PendingRequests::new();
        table.register(RequestId::from_seq(1), request(1));
        table.register(RequestId::from_seq(2), request(2));

        table.clear();

        assert!(table.is_empty());
    }
}
