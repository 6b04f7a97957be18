use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::LatLon;

use super::{GeocodingService, LookupOutcome, LookupRequest, LookupToken};

/// Keeps at most one outstanding lookup per coordinate and filters out
/// completions that no longer matter.
///
/// Each issued lookup gets a fresh generation token. Cancelling or
/// re-issuing a coordinate replaces its token, so an answer to an older
/// request is discarded on arrival even if the provider could not stop it.
pub struct AddressResolver {
    service: Arc<dyn GeocodingService>,
    outstanding: HashMap<LatLon, LookupToken>,
    next_token: u64,
    tx: mpsc::UnboundedSender<LookupOutcome>,
    rx: mpsc::UnboundedReceiver<LookupOutcome>,
}

impl AddressResolver {
    pub fn new(service: Arc<dyn GeocodingService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            outstanding: HashMap::new(),
            next_token: 0,
            tx,
            rx,
        }
    }

    /// Cancel whatever is in flight for `point` and issue a new lookup.
    pub fn request(&mut self, point: LatLon) -> LookupToken {
        self.cancel(point);
        self.next_token += 1;
        let token = LookupToken(self.next_token);
        self.outstanding.insert(point, token);
        debug!(%point, token = token.0, "Issuing address lookup");
        self.service
            .lookup(LookupRequest::new(point, token, self.tx.clone()));
        token
    }

    /// Issue a lookup for `point` unless one is already outstanding.
    pub fn ensure(&mut self, point: LatLon) -> bool {
        if self.outstanding.contains_key(&point) {
            return false;
        }
        self.request(point);
        true
    }

    /// Drop the outstanding lookup for `point`, if any.
    pub fn cancel(&mut self, point: LatLon) -> bool {
        match self.outstanding.remove(&point) {
            Some(token) => {
                debug!(%point, token = token.0, "Cancelling address lookup");
                self.service.cancel(point);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        let points: Vec<LatLon> = self.outstanding.keys().copied().collect();
        for point in points {
            self.cancel(point);
        }
    }

    /// Bring outstanding lookups in line with the coordinates that still
    /// need an address: cancel the rest, issue the missing ones.
    pub fn track_pending(&mut self, pending: &HashSet<LatLon>) {
        let stale: Vec<LatLon> = self
            .outstanding
            .keys()
            .filter(|point| !pending.contains(point))
            .copied()
            .collect();
        for point in stale {
            self.cancel(point);
        }
        for point in pending {
            self.ensure(*point);
        }
    }

    pub fn is_outstanding(&self, point: &LatLon) -> bool {
        self.outstanding.contains_key(point)
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Next current completion that has already arrived, skipping stale ones.
    pub fn try_next(&mut self) -> Option<LookupOutcome> {
        while let Ok(outcome) = self.rx.try_recv() {
            if self.accept(&outcome) {
                return Some(outcome);
            }
        }
        None
    }

    /// Wait for the next current completion. Returns `None` right away when
    /// nothing is outstanding.
    pub async fn next(&mut self) -> Option<LookupOutcome> {
        while !self.outstanding.is_empty() {
            let outcome = self.rx.recv().await?;
            if self.accept(&outcome) {
                return Some(outcome);
            }
        }
        None
    }

    fn accept(&mut self, outcome: &LookupOutcome) -> bool {
        match self.outstanding.get(&outcome.point) {
            Some(token) if *token == outcome.token => {
                self.outstanding.remove(&outcome.point);
                true
            }
            _ => {
                debug!(point = %outcome.point, token = outcome.token.0, "Dropping stale lookup result");
                false
            }
        }
    }
}
