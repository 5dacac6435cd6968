use crate::models::ConnectionId;

use super::ServerEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub connection_id: ConnectionId,
    pub event: ServerEvent,
}

/// Ordered deliveries produced by handling one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            deliveries: Vec::new(),
        }
    }

    pub fn unicast(&mut self, connection_id: ConnectionId, event: ServerEvent) {
        self.deliveries.push(Delivery {
            connection_id,
            event,
        });
    }

    pub fn to_many<I>(&mut self, connections: I, event: &ServerEvent)
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        for connection_id in connections {
            self.unicast(connection_id, event.clone());
        }
    }

    pub fn extend(&mut self, other: Self) {
        self.deliveries.extend(other.deliveries);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Delivery> {
        self.deliveries.iter()
    }

    /// Events addressed to one connection, in send order.
    #[must_use]
    pub fn events_for(&self, connection_id: &ConnectionId) -> Vec<&ServerEvent> {
        self.deliveries
            .iter()
            .filter(|d| &d.connection_id == connection_id)
            .map(|d| &d.event)
            .collect()
    }
}

impl IntoIterator for Outbox {
    type Item = Delivery;
    type IntoIter = std::vec::IntoIter<Delivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.deliveries.into_iter()
    }
}

impl From<Delivery> for Outbox {
    fn from(delivery: Delivery) -> Self {
        Self {
            deliveries: vec![delivery],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_many_preserves_order() {
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        let mut outbox = Outbox::new();
        outbox.unicast(a.clone(), ServerEvent::RoomError { message: "first".into() });
        outbox.to_many(
            vec![a.clone(), b.clone()],
            &ServerEvent::RoomDestroyed { message: "bye".into() },
        );

        assert_eq!(outbox.len(), 3);
        let for_a = outbox.events_for(&a);
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].name(), "room:error");
        assert_eq!(for_a[1].name(), "room:destroyed");
        assert_eq!(outbox.events_for(&b).len(), 1);
    }
}
