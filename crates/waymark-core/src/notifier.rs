//! Fan-out of marker change events.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::models::Marker;

/// Receives marker change events. Called synchronously on the thread that
/// owns the repository, so implementations must return quickly.
pub trait MarkerObserver: Send + Sync {
    /// A single marker changed in place (e.g. its address was resolved).
    fn on_marker_changed(&self, marker: &Marker);

    /// The set of markers changed structurally.
    fn on_markers_changed(&self);
}

/// Registered observers, notified in registration order.
///
/// A panicking observer is logged and skipped; the remaining observers
/// still receive the event.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: Vec<Arc<dyn MarkerObserver>>,
}

fn same_observer(a: &Arc<dyn MarkerObserver>, b: &Arc<dyn MarkerObserver>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Returns false if it was already registered.
    pub fn subscribe(&mut self, observer: Arc<dyn MarkerObserver>) -> bool {
        if self.observers.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        self.observers.push(observer);
        true
    }

    /// Returns false if the observer was not registered.
    pub fn unsubscribe(&mut self, observer: &Arc<dyn MarkerObserver>) -> bool {
        let before = self.observers.len();
        self.observers.retain(|o| !same_observer(o, observer));
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Returns the number of observers that panicked.
    pub fn notify_marker_changed(&self, marker: &Marker) -> usize {
        self.deliver("marker_changed", |o| o.on_marker_changed(marker))
    }

    /// Returns the number of observers that panicked.
    pub fn notify_collection_changed(&self) -> usize {
        self.deliver("markers_changed", |o| o.on_markers_changed())
    }

    fn deliver(&self, event: &str, f: impl Fn(&dyn MarkerObserver)) -> usize {
        // Snapshot so the list in use cannot shift under delivery.
        let observers = self.observers.clone();
        let mut failed = 0;
        for (position, observer) in observers.iter().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| f(observer.as_ref())));
            if let Err(panic) = result {
                failed += 1;
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(event, position, reason = %reason, "Marker observer panicked");
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::models::{LatLon, MarkerColor, MarkerList, MarkerRecord, PointDescription};

    #[derive(Default)]
    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl MarkerObserver for Recorder {
        fn on_marker_changed(&self, marker: &Marker) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:marker:{}", self.tag, marker.description.name));
        }

        fn on_markers_changed(&self) {
            self.log.lock().unwrap().push(format!("{}:markers", self.tag));
        }
    }

    struct Panicker;

    impl MarkerObserver for Panicker {
        fn on_marker_changed(&self, _marker: &Marker) {
            panic!("observer failure");
        }

        fn on_markers_changed(&self) {
            panic!("observer failure");
        }
    }

    fn marker() -> Marker {
        let record = MarkerRecord::new(
            LatLon::new(1.0, 2.0),
            PointDescription::named("Summit"),
            MarkerColor::Blue,
        );
        Marker::from_record(record, MarkerList::Active, 0)
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let mut notifier = ChangeNotifier::new();
        let observer: Arc<dyn MarkerObserver> = Arc::new(Recorder::default());
        assert!(notifier.subscribe(observer.clone()));
        assert!(!notifier.subscribe(observer.clone()));
        assert_eq!(notifier.len(), 1);

        assert!(notifier.unsubscribe(&observer));
        assert!(!notifier.unsubscribe(&observer));
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = ChangeNotifier::new();
        notifier.subscribe(Arc::new(Recorder { tag: "a", log: log.clone() }));
        notifier.subscribe(Arc::new(Recorder { tag: "b", log: log.clone() }));

        notifier.notify_marker_changed(&marker());
        notifier.notify_collection_changed();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:marker:Summit", "b:marker:Summit", "a:markers", "b:markers"]
        );
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = ChangeNotifier::new();
        notifier.subscribe(Arc::new(Panicker));
        notifier.subscribe(Arc::new(Recorder { tag: "b", log: log.clone() }));

        assert_eq!(notifier.notify_collection_changed(), 1);
        assert_eq!(notifier.notify_marker_changed(&marker()), 1);
        assert_eq!(*log.lock().unwrap(), vec!["b:markers", "b:marker:Summit"]);
    }
}
