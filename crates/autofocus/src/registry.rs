use slotmap::SecondaryMap;
use tracing::trace;

use crate::{
    error::{Error, Result, Stage},
    id::ParticipantId,
    index::{Comparator, OrderedIndex, ascending},
    order::OrderKey,
    source::FocusHandler,
};

/// A participant's bookkeeping, as removed by [`Registry::unregister`].
#[derive(Debug)]
pub struct Registration {
    /// The participant's order key.
    pub key: OrderKey,
    /// The participant's focus handler, if any.
    pub handler: Option<FocusHandler>,
}

/// Three consistent views of the registered participants: id to order key, id
/// to focus handler, and order key to id.
pub struct Registry {
    /// Order key per participant.
    orders: SecondaryMap<ParticipantId, OrderKey>,
    /// Focus handler per participant.
    handlers: SecondaryMap<ParticipantId, Option<FocusHandler>>,
    /// Participants in traversal order.
    index: OrderedIndex<ParticipantId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(ascending())
    }
}

impl Registry {
    /// An empty registry whose index is ordered by `cmp`.
    pub fn new(cmp: Comparator) -> Self {
        Self {
            orders: SecondaryMap::new(),
            handlers: SecondaryMap::new(),
            index: OrderedIndex::with_comparator(cmp),
        }
    }

    /// Record `id` at `key`. The key must be unique; registering an id twice
    /// without unregistering it first is a caller error.
    pub fn register(&mut self, id: ParticipantId, key: OrderKey, handler: Option<FocusHandler>) {
        trace!(?id, %key, focusable = handler.is_some(), "register");
        self.handlers.insert(id, handler);
        self.orders.insert(id, key);
        self.index.insert(key, id);
    }

    /// Remove `id` from every view. Unknown ids are ignored.
    pub fn unregister(&mut self, id: ParticipantId) -> Option<Registration> {
        let key = self.orders.remove(id)?;
        let handler = self.handlers.remove(id).flatten();
        if self.index.get(key) == Some(&id) {
            self.index.remove(key);
        }
        trace!(?id, %key, "unregister");
        Some(Registration { key, handler })
    }

    /// The focus handler for `id`, if it is registered and has one.
    pub fn focus_handler_of(&self, id: ParticipantId) -> Option<FocusHandler> {
        self.handlers.get(id).cloned().flatten()
    }

    /// The order key for `id`.
    pub fn order_key_of(&self, id: ParticipantId) -> Option<OrderKey> {
        self.orders.get(id).copied()
    }

    /// Is `id` registered?
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.orders.contains_key(id)
    }

    /// Resolve `id` to its position, checking both the key record and the
    /// index entry.
    pub fn locate(&self, id: ParticipantId) -> Result<OrderKey> {
        let key = self
            .order_key_of(id)
            .ok_or(Error::NotSubscribed(Stage::OrderKey))?;
        if self.index.get(key) != Some(&id) {
            return Err(Error::NotSubscribed(Stage::Index));
        }
        Ok(key)
    }

    /// Is `key` held by a participant other than `id`?
    pub fn is_taken_by_other(&self, key: OrderKey, id: ParticipantId) -> bool {
        self.index.get(key).is_some_and(|owner| *owner != id)
    }

    /// The ordered view.
    pub fn index(&self) -> &OrderedIndex<ParticipantId> {
        &self.index
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Is the registry empty?
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn ids(n: usize) -> Vec<ParticipantId> {
        let mut map: SlotMap<ParticipantId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn views_stay_in_step() {
        let ids = ids(3);
        let mut reg = Registry::default();
        reg.register(ids[0], OrderKey(1), Some(FocusHandler::new(|| ())));
        reg.register(ids[1], OrderKey(2), None);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.index().len(), 2);
        assert!(reg.focus_handler_of(ids[0]).is_some());
        assert!(reg.focus_handler_of(ids[1]).is_none());
        assert_eq!(reg.order_key_of(ids[1]), Some(OrderKey(2)));
        assert_eq!(reg.locate(ids[1]), Ok(OrderKey(2)));

        let removed = reg.unregister(ids[0]).unwrap();
        assert_eq!(removed.key, OrderKey(1));
        assert!(removed.handler.is_some());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.index().len(), 1);
        assert!(!reg.contains(ids[0]));
    }

    #[test]
    fn unknown_ids() {
        let ids = ids(2);
        let mut reg = Registry::default();
        assert!(reg.unregister(ids[0]).is_none());
        assert_eq!(reg.locate(ids[0]), Err(Error::NotSubscribed(Stage::OrderKey)));
        assert!(reg.focus_handler_of(ids[0]).is_none());
    }

    #[test]
    fn locate_detects_divergent_index() {
        let ids = ids(2);
        let mut reg = Registry::default();
        reg.register(ids[0], OrderKey(7), None);
        reg.register(ids[1], OrderKey(7), None);
        assert_eq!(reg.locate(ids[0]), Err(Error::NotSubscribed(Stage::Index)));
        assert!(reg.is_taken_by_other(OrderKey(7), ids[0]));
        assert!(!reg.is_taken_by_other(OrderKey(7), ids[1]));
    }
}
