use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::geocoding::LookupOutcome;
use crate::models::{LatLon, MarkerList, MarkerRecord};
use crate::persistence::PersistenceGateway;

use super::MarkerRepository;

impl<G: PersistenceGateway> MarkerRepository<G> {
    /// Issue a fresh lookup for every coordinate, in either list, whose
    /// marker still waits for an address. Any lookup already in flight for
    /// that coordinate is cancelled first. Returns the number of lookups
    /// issued.
    pub fn resolve_all(&mut self) -> usize {
        let mut seen = HashSet::new();
        let points: Vec<LatLon> = self
            .active
            .iter()
            .chain(self.history.iter())
            .filter(|m| m.is_address_pending())
            .map(|m| m.point)
            .filter(|point| seen.insert(*point))
            .collect();
        for point in &points {
            self.resolver.request(*point);
        }
        debug!(count = points.len(), "Address lookups issued");
        points.len()
    }

    /// Number of coordinates with a lookup in flight.
    pub fn pending_lookups(&self) -> usize {
        self.resolver.outstanding_count()
    }

    pub fn is_lookup_pending(&self, point: &LatLon) -> bool {
        self.resolver.is_outstanding(point)
    }

    /// Apply every lookup result that has already arrived. Never fails;
    /// results that cannot be applied are logged and dropped. Returns the
    /// number of results applied.
    pub fn process_address_results(&mut self) -> usize {
        let mut applied = 0;
        while let Some(outcome) = self.resolver.try_next() {
            if self.apply_address(outcome) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for outstanding lookups and apply them as they arrive, until
    /// none are left or `timeout` has passed. Returns the number applied.
    pub async fn settle_addresses(&mut self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut applied = 0;
        loop {
            match tokio::time::timeout_at(deadline, self.resolver.next()).await {
                Ok(Some(outcome)) => {
                    if self.apply_address(outcome) {
                        applied += 1;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = self.resolver.outstanding_count(),
                        "Timed out waiting for address lookups"
                    );
                    break;
                }
            }
        }
        applied
    }

    /// Write one lookup result into every marker at that coordinate that
    /// still waits for an address, then notify a single-marker change for
    /// each. A result with no such marker left is dropped.
    fn apply_address(&mut self, outcome: LookupOutcome) -> bool {
        let updates: Vec<(MarkerList, usize, MarkerRecord)> = self
            .active
            .iter()
            .chain(self.history.iter())
            .filter(|m| m.point == outcome.point && m.is_address_pending())
            .map(|m| {
                let mut record = m.to_record();
                record.description.resolve_address(&outcome.address);
                (m.list(), m.index, record)
            })
            .collect();

        if updates.is_empty() {
            debug!(point = %outcome.point, "No marker waiting for this address");
            return false;
        }

        let mut written = Vec::with_capacity(updates.len());
        for (list, ordinal, record) in updates {
            let result = match list {
                MarkerList::Active => self.gateway.update_active(ordinal, record),
                MarkerList::History => self.gateway.update_history(ordinal, record),
            };
            match result {
                Ok(_) => written.push((list, ordinal)),
                Err(e) => {
                    warn!(point = %outcome.point, %list, error = %e, "Failed to store resolved address");
                    break;
                }
            }
        }
        if written.is_empty() {
            return false;
        }

        if let Err(e) = self.load() {
            warn!(error = %e, "Failed to reload markers after address update");
            return false;
        }
        for (list, ordinal) in written {
            if let Some(marker) = self.list(list).get(ordinal) {
                self.notifier.notify_marker_changed(marker);
            }
        }
        info!(point = %outcome.point, "Address resolved");
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::geocoding::resolver::tests::ManualGeocoder;
    use crate::geocoding::GeocodingService;
    use crate::models::{Marker, MarkerColor, PointDescription, ADDRESS_NOT_FOUND};
    use crate::notifier::MarkerObserver;
    use crate::persistence::MemoryStore;

    #[derive(Default)]
    struct Events {
        log: Mutex<Vec<String>>,
    }

    impl MarkerObserver for Events {
        fn on_marker_changed(&self, marker: &Marker) {
            self.log.lock().unwrap().push(format!(
                "marker:{}:{}",
                marker.list(),
                marker.description.name
            ));
        }

        fn on_markers_changed(&self) {
            self.log.lock().unwrap().push("markers".to_string());
        }
    }

    impl Events {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.log.lock().unwrap())
        }
    }

    struct Fixture {
        geocoder: Arc<ManualGeocoder>,
        events: Arc<Events>,
        repo: MarkerRepository<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let geocoder = Arc::new(ManualGeocoder::default());
        let service: Arc<dyn GeocodingService> = geocoder.clone();
        let mut repo = MarkerRepository::open(MemoryStore::new(), service).unwrap();
        let events = Arc::new(Events::default());
        repo.subscribe(events.clone());
        Fixture {
            geocoder,
            events,
            repo,
        }
    }

    fn p(v: f64) -> LatLon {
        LatLon::new(v, v)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let Fixture {
            geocoder,
            events,
            mut repo,
        } = fixture();

        repo.add_markers([(p(10.0), None), (p(20.0), None)]).unwrap();
        let active = repo.active_markers();
        assert_eq!(repo.active_points(), vec![p(10.0), p(20.0)]);
        assert_eq!(active[0].color, MarkerColor::Blue);
        assert_eq!(active[1].color, MarkerColor::Green);

        assert!(repo.remove_active(&active[0]).unwrap());
        let active = repo.active_markers();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].point, p(20.0));
        assert_eq!(active[0].color_index(), 1);
        assert_eq!(active[0].index, 0);

        repo.clear_active().unwrap();
        assert!(repo.active_markers().is_empty());
        let history = repo.history_markers();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].point, p(20.0));
        assert!(history[0].is_history());
        assert!(!history[0].is_selected());
        events.take();

        assert!(geocoder.answer(p(20.0), ""));
        assert_eq!(repo.process_address_results(), 1);

        let p2 = &repo.history_markers()[0];
        assert_eq!(p2.description.name, ADDRESS_NOT_FOUND);
        assert!(!p2.is_address_pending());
        assert_eq!(events.take(), vec![format!("marker:history:{}", ADDRESS_NOT_FOUND)]);
    }

    #[test]
    fn test_add_issues_one_lookup_per_coordinate() {
        let Fixture { geocoder, mut repo, .. } = fixture();
        repo.add_markers([(p(1.0), None), (p(1.0), None), (p(2.0), None)])
            .unwrap();
        assert_eq!(repo.pending_lookups(), 2);
        assert_eq!(geocoder.request_count(), 2);
    }

    #[test]
    fn test_shared_coordinate_resolves_both_markers() {
        let Fixture {
            geocoder,
            events,
            mut repo,
        } = fixture();
        repo.add_markers([(p(1.0), None)]).unwrap();
        repo.clear_active().unwrap();
        repo.add_markers([(p(1.0), None)]).unwrap();
        events.take();

        // The clear re-issued the lookup; only the newest request counts.
        while geocoder.answer(p(1.0), "Pier 39") {}
        assert_eq!(repo.process_address_results(), 1);
        assert_eq!(repo.active_markers()[0].description.name, "Pier 39");
        assert_eq!(repo.history_markers()[0].description.name, "Pier 39");
        assert_eq!(
            events.take(),
            vec!["marker:active:Pier 39", "marker:history:Pier 39"]
        );
    }

    #[test]
    fn test_stale_completion_after_remove_is_dropped() {
        let Fixture {
            geocoder,
            events,
            mut repo,
        } = fixture();
        repo.add_markers([(p(5.0), None)]).unwrap();
        let marker = repo.first_active().unwrap();
        repo.remove_active(&marker).unwrap();
        assert_eq!(geocoder.cancel_count(p(5.0)), 1);
        events.take();

        let writes = repo.gateway().write_count();
        assert!(geocoder.answer(p(5.0), "Gone St"));
        assert_eq!(repo.process_address_results(), 0);
        assert_eq!(repo.gateway().write_count(), writes);
        assert!(events.take().is_empty());
    }

    #[test]
    fn test_cancelled_lookup_does_not_touch_surviving_marker() {
        // A request superseded by resolve_all answers late; only the new
        // request's answer is applied.
        let Fixture { geocoder, mut repo, .. } = fixture();
        repo.add_markers([(p(6.0), None)]).unwrap();
        assert_eq!(repo.resolve_all(), 1);
        assert_eq!(geocoder.cancel_count(p(6.0)), 1);

        assert!(geocoder.answer_oldest(p(6.0), "Stale Ave"));
        assert_eq!(repo.process_address_results(), 0);
        assert!(repo.first_active().unwrap().is_address_pending());

        assert!(geocoder.answer(p(6.0), "Fresh Ave"));
        assert_eq!(repo.process_address_results(), 1);
        assert_eq!(repo.first_active().unwrap().description.name, "Fresh Ave");
    }

    #[test]
    fn test_moved_marker_ignores_old_coordinate_result() {
        let Fixture { geocoder, mut repo, .. } = fixture();
        repo.add_markers([(p(7.0), None)]).unwrap();
        let marker = repo.first_active().unwrap();
        repo.move_marker(&marker, p(8.0)).unwrap();
        assert!(repo.is_lookup_pending(&p(8.0)));
        assert!(!repo.is_lookup_pending(&p(7.0)));

        geocoder.answer(p(7.0), "Old Rd");
        assert_eq!(repo.process_address_results(), 0);
        geocoder.answer(p(8.0), "New Rd");
        assert_eq!(repo.process_address_results(), 1);
        assert_eq!(repo.first_active().unwrap().description.name, "New Rd");
    }

    #[test]
    fn test_store_failure_while_applying_is_not_fatal() {
        let Fixture {
            geocoder,
            events,
            mut repo,
        } = fixture();
        repo.add_markers([(p(9.0), None)]).unwrap();
        events.take();

        repo.gateway_mut().set_unavailable(true);
        geocoder.answer(p(9.0), "Dock St");
        assert_eq!(repo.process_address_results(), 0);
        assert!(events.take().is_empty());

        repo.gateway_mut().set_unavailable(false);
        assert!(repo.first_active().unwrap().is_address_pending());
        assert_eq!(repo.resolve_all(), 1);
    }

    #[test]
    fn test_labelled_markers_need_no_lookup() {
        let Fixture { geocoder, mut repo, .. } = fixture();
        repo.add_markers([(p(1.0), Some(PointDescription::named("Home")))])
            .unwrap();
        assert_eq!(repo.resolve_all(), 0);
        assert_eq!(geocoder.request_count(), 0);
    }

    #[tokio::test]
    async fn test_settle_addresses_applies_async_answers() {
        let Fixture { geocoder, mut repo, .. } = fixture();
        repo.add_markers([(p(1.0), None), (p(2.0), None)]).unwrap();

        let answering = geocoder.clone();
        tokio::spawn(async move {
            answering.answer(p(2.0), "Second");
            answering.answer(p(1.0), "First");
        });

        let applied = repo.settle_addresses(Duration::from_secs(5)).await;
        assert_eq!(applied, 2);
        let names: Vec<String> = repo
            .active_markers()
            .iter()
            .map(|m| m.description.name.clone())
            .collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(repo.pending_lookups(), 0);
    }

    #[tokio::test]
    async fn test_settle_addresses_times_out() {
        let Fixture { mut repo, .. } = fixture();
        repo.add_markers([(p(1.0), None)]).unwrap();
        let applied = repo.settle_addresses(Duration::from_millis(20)).await;
        assert_eq!(applied, 0);
        assert_eq!(repo.pending_lookups(), 1);
    }
}
