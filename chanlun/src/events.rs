use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constant::{EventType, ListChange};

#[derive(Debug, Clone, Default)]
pub struct EventPayload {
    pub datetime: Option<DateTime<Utc>>,
    pub level: Option<usize>,
    pub change: Option<ListChange>,
    pub note: Option<String>,
}

pub type Subscriber = Arc<dyn Fn(EventType, &EventPayload) + Send + Sync>;

/// Subscribers keyed by event type, plus catch-all subscribers.
#[derive(Default)]
pub struct Observable {
    subscribers: HashMap<EventType, Vec<Subscriber>>,
    all_subscribers: Vec<Subscriber>,
}

impl Observable {
    pub fn subscribe(&mut self, event_type: Option<EventType>, subscriber: Subscriber) {
        if let Some(event_type) = event_type {
            self.subscribers
                .entry(event_type)
                .or_default()
                .push(subscriber);
        } else {
            self.all_subscribers.push(subscriber);
        }
    }

    pub fn notify(&self, event_type: EventType, payload: EventPayload) {
        if let Some(subscribers) = self.subscribers.get(&event_type) {
            for subscriber in subscribers {
                subscriber(event_type, &payload);
            }
        }

        for subscriber in &self.all_subscribers {
            subscriber(event_type, &payload);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_subscribers.is_empty() && self.subscribers.values().all(Vec::is_empty)
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("typed", &self.subscribers.values().map(Vec::len).sum::<usize>())
            .field("all", &self.all_subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_typed_and_catch_all_subscribers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observable = Observable::default();
        assert!(observable.is_empty());

        let typed = Arc::clone(&seen);
        observable.subscribe(
            Some(EventType::StrokeChanged),
            Arc::new(move |event, _| typed.lock().unwrap().push(("typed", event))),
        );
        let all = Arc::clone(&seen);
        observable.subscribe(
            None,
            Arc::new(move |event, _| all.lock().unwrap().push(("all", event))),
        );

        observable.notify(EventType::StrokeChanged, EventPayload::default());
        observable.notify(EventType::BarAccepted, EventPayload::default());

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ("typed", EventType::StrokeChanged),
                ("all", EventType::StrokeChanged),
                ("all", EventType::BarAccepted),
            ]
        );
    }
}
