use tokio::sync::mpsc;
use tracing::debug;

use crate::models::LatLon;

/// Generation token of one issued lookup. A completion only counts while
/// its token is still the current one for the coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LookupToken(pub u64);

/// A finished lookup on its way back to the owner of the marker lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub point: LatLon,
    pub token: LookupToken,
    pub address: String,
}

/// One reverse geocoding request handed to a `GeocodingService`.
///
/// The service answers by calling `complete`, from any thread. A request
/// that is dropped without completing simply never reports back.
#[derive(Debug)]
pub struct LookupRequest {
    point: LatLon,
    token: LookupToken,
    reply: mpsc::UnboundedSender<LookupOutcome>,
}

impl LookupRequest {
    pub fn new(
        point: LatLon,
        token: LookupToken,
        reply: mpsc::UnboundedSender<LookupOutcome>,
    ) -> Self {
        Self {
            point,
            token,
            reply,
        }
    }

    pub fn point(&self) -> LatLon {
        self.point
    }

    pub fn token(&self) -> LookupToken {
        self.token
    }

    /// Deliver the resolved address. An empty string means "not found".
    pub fn complete(self, address: impl Into<String>) {
        let outcome = LookupOutcome {
            point: self.point,
            token: self.token,
            address: address.into(),
        };
        if self.reply.send(outcome).is_err() {
            debug!(point = %self.point, "Lookup finished after its receiver went away");
        }
    }
}

/// Reverse geocoding provider.
///
/// `lookup` must not block; work happens out of band and the answer comes
/// back through `LookupRequest::complete`. Ordering across coordinates is
/// not guaranteed. `cancel` is best effort: a completion may still arrive.
pub trait GeocodingService: Send + Sync {
    fn lookup(&self, request: LookupRequest);

    fn cancel(&self, point: LatLon);
}

/// Provider that never answers. Used when address lookup is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGeocoder;

impl GeocodingService for DisabledGeocoder {
    fn lookup(&self, request: LookupRequest) {
        debug!(point = %request.point(), "Address lookup disabled, request dropped");
    }

    fn cancel(&self, _point: LatLon) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_sends_outcome() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = LookupRequest::new(LatLon::new(1.0, 2.0), LookupToken(7), tx);
        request.complete("Somewhere");

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.point, LatLon::new(1.0, 2.0));
        assert_eq!(outcome.token, LookupToken(7));
        assert_eq!(outcome.address, "Somewhere");
    }

    #[test]
    fn test_complete_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        LookupRequest::new(LatLon::new(0.0, 0.0), LookupToken(1), tx).complete("");
    }
}
