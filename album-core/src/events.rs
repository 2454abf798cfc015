use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::catalog::PhotoIndex;
use crate::filter::ResultsSummary;
use crate::view_mode::ViewMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryEvent {
    /// The catalog finished populating the filter panel.
    CatalogReady { total: usize },
    /// A visibility batch settled; `visible` is in catalog order.
    VisibilityChanged { visible: Vec<PhotoIndex> },
    ResultsChanged(Option<ResultsSummary>),
    ViewModeChanged(ViewMode),
    LightboxOpened { photo: PhotoIndex, position: usize },
    LightboxMoved { photo: PhotoIndex, position: usize },
    LightboxClosed,
    /// A card pointing at a detail page was activated; the host navigates.
    FollowLink { href: String },
}

type Queue = Mutex<VecDeque<GalleryEvent>>;

/// Fan-out channel. Every subscriber gets its own queue and drains it at its
/// own pace; publishing never runs subscriber code.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Weak<Queue>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        self.subscribers.lock().push(Arc::downgrade(&queue));
        Subscription { queue }
    }

    pub fn publish(&self, event: GalleryEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|weak| match weak.upgrade() {
            Some(queue) => {
                queue.lock().push_back(event.clone());
                true
            }
            None => false,
        });
    }
}

/// Receiving end of an [`EventBus`]. Dropping it unsubscribes.
pub struct Subscription {
    queue: Arc<Queue>,
}

impl Subscription {
    pub fn drain(&self) -> Vec<GalleryEvent> {
        self.queue.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(GalleryEvent::LightboxClosed);
        bus.publish(GalleryEvent::CatalogReady { total: 3 });

        assert_eq!(
            first.drain(),
            vec![
                GalleryEvent::LightboxClosed,
                GalleryEvent::CatalogReady { total: 3 }
            ]
        );
        assert!(first.drain().is_empty());
        assert_eq!(second.drain().len(), 2);
    }

    #[test]
    fn dropped_subscriptions_do_not_affect_others() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(GalleryEvent::LightboxClosed);
        assert_eq!(kept.drain(), vec![GalleryEvent::LightboxClosed]);
    }

    #[test]
    fn late_subscribers_miss_earlier_events() {
        let bus = EventBus::new();
        bus.publish(GalleryEvent::LightboxClosed);
        let late = bus.subscribe();
        assert!(late.drain().is_empty());
    }
}
