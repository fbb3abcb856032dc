use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt,
    io::Write,
    rc::{Rc, Weak},
};

use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use slotmap::SlotMap;
use tracing::{debug, trace, warn};

use crate::{
    config::FocusConfig,
    direction::{Direction, DirectionArg},
    error::{Error, Result},
    id::ParticipantId,
    index::{Comparator, ascending},
    order::{OrderAllocator, OrderKey},
    participant::Participant,
    registry::{Registration, Registry},
    source::{FocusHandler, FocusSource, Focusable, Target},
};

/// Action invoked when traversal runs off one end of the order. Whatever it
/// returns is returned by the traversal that reached the boundary.
pub type Boundary = Rc<dyn Fn() -> Result<Option<Continuation>>>;

/// Mutable container state.
struct State {
    /// Ids minted by this container.
    ids: SlotMap<ParticipantId, ()>,
    /// Participant bookkeeping.
    registry: Registry,
    /// Order key allocation.
    allocator: OrderAllocator,
}

/// Shared container internals.
struct Inner {
    /// Registry and allocator. Never borrowed while user code runs.
    state: RefCell<State>,
    /// Called when forward traversal passes the last participant.
    skip_to_next: Option<Boundary>,
    /// Called when backward traversal passes the first participant.
    skip_to_prev: Option<Boundary>,
    /// Configuration.
    config: FocusConfig,
}

/// A focus-order engine for one subtree of participants.
///
/// `Container` is a cheap handle; clones share the same state. Focus handlers
/// and boundary callbacks run with no internal borrow held, so they may mount,
/// unmount or traverse re-entrantly and later steps see the result.
#[derive(Clone)]
pub struct Container {
    /// Shared state.
    inner: Rc<Inner>,
}

/// A non-owning [`Container`] handle.
#[derive(Clone)]
pub struct WeakContainer {
    /// Shared state.
    inner: Weak<Inner>,
}

impl WeakContainer {
    /// Recover a strong handle if the container is still alive.
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

/// One row of [`Container::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEntry {
    /// Order key.
    pub key: OrderKey,
    /// Participant holding the key.
    pub id: ParticipantId,
    /// Does the participant have a focus handler?
    pub focusable: bool,
}

/// Repeats a traversal from the participant that just received focus.
pub struct Continuation {
    /// Container to traverse.
    container: Container,
    /// Participant that received focus.
    from: ParticipantId,
    /// Direction of the traversal that produced this continuation.
    direction: Direction,
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("from", &self.from)
            .field("direction", &self.direction)
            .finish()
    }
}

impl Continuation {
    /// The participant that received focus.
    pub fn participant(&self) -> ParticipantId {
        self.from
    }

    /// Direction of the traversal.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Advance again, in the same direction, from the same participant.
    pub fn resume(self) -> Result<Option<Self>> {
        self.container.step(self.from, self.direction)
    }
}

/// Builder for [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    /// Forward boundary.
    skip_to_next: Option<Boundary>,
    /// Backward boundary.
    skip_to_prev: Option<Boundary>,
    /// Key ordering.
    comparator: Option<Comparator>,
    /// Configuration.
    config: FocusConfig,
}

impl ContainerBuilder {
    /// Action run when forward traversal runs off the end.
    pub fn skip_to_next(mut self, f: impl Fn() -> Result<Option<Continuation>> + 'static) -> Self {
        self.skip_to_next = Some(Rc::new(f));
        self
    }

    /// Action run when backward traversal runs off the start.
    pub fn skip_to_prev(mut self, f: impl Fn() -> Result<Option<Continuation>> + 'static) -> Self {
        self.skip_to_prev = Some(Rc::new(f));
        self
    }

    /// Order keys with `f` instead of numeric ascending.
    pub fn comparator(mut self, f: impl Fn(OrderKey, OrderKey) -> Ordering + 'static) -> Self {
        self.comparator = Some(Rc::new(f));
        self
    }

    /// Direction used when `focus` is called without one.
    pub fn default_direction(mut self, direction: Direction) -> Self {
        self.config.default_direction = direction;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: FocusConfig) -> Self {
        self.config = config;
        self
    }

    /// Make this container a participant of another: running off either end
    /// continues from `parent` in the enclosing container.
    pub fn nested_in(self, parent: &Participant) -> Self {
        let outer = parent.container().downgrade();
        let id = parent.id();
        let outer_prev = outer.clone();
        self.skip_to_next(move || match outer.upgrade() {
            Some(c) => c.next(id),
            None => Ok(None),
        })
        .skip_to_prev(move || match outer_prev.upgrade() {
            Some(c) => c.prev(id),
            None => Ok(None),
        })
    }

    /// Build the container.
    pub fn build(self) -> Container {
        let cmp = self.comparator.unwrap_or_else(ascending);
        Container {
            inner: Rc::new(Inner {
                state: RefCell::new(State {
                    ids: SlotMap::with_key(),
                    registry: Registry::new(cmp),
                    allocator: OrderAllocator::new(),
                }),
                skip_to_next: self.skip_to_next,
                skip_to_prev: self.skip_to_prev,
                config: self.config,
            }),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("order", &self.order())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Container {
    /// A container with no boundaries and default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a container.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// A non-owning handle.
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &FocusConfig {
        &self.inner.config
    }

    /// Mint a fresh participant id.
    pub fn allocate_id(&self) -> ParticipantId {
        self.inner.state.borrow_mut().ids.insert(())
    }

    /// Unmount `id` and retire it. Retired ids are never reissued.
    pub fn release_id(&self, id: ParticipantId) {
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            state.ids.remove(id);
            state.registry.unregister(id)
        };
        drop(removed);
    }

    /// Mint an id wrapped in a [`Participant`] handle.
    pub fn participant(&self) -> Participant {
        Participant::new(self.clone())
    }

    /// Lifecycle entry point. `Some(target)` mounts `id`; `None` unmounts it.
    pub fn subscribe(
        &self,
        id: ParticipantId,
        source: &FocusSource,
        hint: Option<i64>,
        target: Option<&Target>,
    ) -> Result<()> {
        match target {
            Some(target) => self.mount(id, target, source, hint).map(|_| ()),
            None => {
                self.unmount(id);
                Ok(())
            }
        }
    }

    /// Register `id`, backed by `target`, at a key derived from `hint`.
    ///
    /// The focus source is resolved and the key computed before anything
    /// changes, so a failed mount leaves the container as it was. Mounting an
    /// id that is already mounted re-registers it. Ids must come from
    /// [`allocate_id`](Self::allocate_id) and not yet be released.
    pub fn mount(
        &self,
        id: ParticipantId,
        target: &Target,
        source: &FocusSource,
        hint: Option<i64>,
    ) -> Result<OrderKey> {
        let handler = source.resolve(target, self.inner.config.warn_on_absent_source)?;
        let (key, previous) = {
            let mut state = self.inner.state.borrow_mut();
            let state = &mut *state;
            if !state.ids.contains_key(id) {
                return Err(Error::UnknownParticipant(id));
            }
            let registry = &state.registry;
            let key = state
                .allocator
                .peek(hint, |k| registry.is_taken_by_other(k, id))?;
            state.allocator.commit(key);
            let previous = state.registry.unregister(id);
            state.registry.register(id, key, handler);
            (key, previous)
        };
        if previous.is_some() {
            debug!(?id, %key, "participant re-registered");
        }
        drop(previous);
        debug!(?id, %key, ?hint, "mounted");
        Ok(key)
    }

    /// Unregister `id`. Returns `false` if it was not registered.
    pub fn unmount(&self, id: ParticipantId) -> bool {
        let removed: Option<Registration> = self.inner.state.borrow_mut().registry.unregister(id);
        if let Some(r) = &removed {
            debug!(?id, key = %r.key, "unmounted");
        }
        removed.is_some()
    }

    /// Move focus into the order from one end, in `direction`.
    ///
    /// With no participants, the boundary for `direction` runs instead.
    pub fn focus(&self, direction: impl Into<DirectionArg>) -> Result<Option<Continuation>> {
        let direction = direction.into().normalize()?;
        self.focus_towards(direction)
    }

    /// [`focus`](Self::focus) in the configured default direction.
    pub fn focus_default(&self) -> Result<Option<Continuation>> {
        self.focus_towards(self.inner.config.default_direction)
    }

    /// Focus the first focusable participant after `id`.
    pub fn next(&self, id: ParticipantId) -> Result<Option<Continuation>> {
        self.step(id, Direction::Forward)
    }

    /// Focus the last focusable participant before `id`.
    pub fn prev(&self, id: ParticipantId) -> Result<Option<Continuation>> {
        self.step(id, Direction::Backward)
    }

    /// Participants in traversal order.
    pub fn order(&self) -> Vec<OrderEntry> {
        let state = self.inner.state.borrow();
        state
            .registry
            .index()
            .iter()
            .map(|(key, id)| OrderEntry {
                key,
                id: *id,
                focusable: state.registry.focus_handler_of(*id).is_some(),
            })
            .collect()
    }

    /// Number of mounted participants.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().registry.len()
    }

    /// Are there no mounted participants?
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().registry.is_empty()
    }

    /// Is `id` mounted?
    pub fn is_mounted(&self, id: ParticipantId) -> bool {
        self.inner.state.borrow().registry.contains(id)
    }

    /// Order key held by `id`.
    pub fn order_key_of(&self, id: ParticipantId) -> Option<OrderKey> {
        self.inner.state.borrow().registry.order_key_of(id)
    }

    /// The most recently issued order key.
    pub fn last_order(&self) -> i64 {
        self.inner.state.borrow().allocator.last()
    }

    /// Output a formatted table of the focus order to a writer.
    pub fn print_order_table(&self, w: &mut dyn Write) -> Result<()> {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["key", "participant", "focus"]);
        for entry in self.order() {
            let focus = if entry.focusable {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("skip").fg(Color::DarkGrey)
            };
            table.add_row(vec![
                Cell::new(entry.key).fg(Color::Green),
                Cell::new(format!("{:?}", entry.id)),
                focus,
            ]);
        }
        writeln!(w, "{table}").map_err(|x| Error::Internal(x.to_string()))
    }

    /// Focus the extreme participant for `direction`, or cross the boundary.
    fn focus_towards(&self, direction: Direction) -> Result<Option<Continuation>> {
        let extreme = {
            let state = self.inner.state.borrow();
            let index = state.registry.index();
            let end = match direction {
                Direction::Forward => index.min(),
                Direction::Backward => index.max(),
            };
            end.map(|(_, id)| (*id, state.registry.focus_handler_of(*id)))
        };
        match extreme {
            None => self.cross_boundary(direction),
            Some((id, Some(handler))) => Ok(Some(self.land(id, &handler, direction))),
            Some((id, None)) => self.step(id, direction),
        }
    }

    /// Walk from `from` in `direction`, skipping participants with no handler.
    fn step(&self, from: ParticipantId, direction: Direction) -> Result<Option<Continuation>> {
        let mut current = from;
        loop {
            let neighbour = {
                let state = self.inner.state.borrow();
                let key = state.registry.locate(current)?;
                let index = state.registry.index();
                let found = match direction {
                    Direction::Forward => index.successor(key),
                    Direction::Backward => index.predecessor(key),
                };
                found.map(|(_, id)| (*id, state.registry.focus_handler_of(*id)))
            };
            match neighbour {
                Some((id, Some(handler))) => return Ok(Some(self.land(id, &handler, direction))),
                Some((id, None)) => {
                    trace!(?id, "skipping participant without focus handler");
                    current = id;
                }
                None => return self.cross_boundary(direction),
            }
        }
    }

    /// Invoke `handler` for `id` and return a continuation from it.
    fn land(&self, id: ParticipantId, handler: &FocusHandler, direction: Direction) -> Continuation {
        trace!(?id, %direction, "focus");
        handler.invoke();
        Continuation {
            container: self.clone(),
            from: id,
            direction,
        }
    }

    /// Hand off to the boundary for `direction`, if any.
    fn cross_boundary(&self, direction: Direction) -> Result<Option<Continuation>> {
        let boundary = match direction {
            Direction::Forward => &self.inner.skip_to_next,
            Direction::Backward => &self.inner.skip_to_prev,
        };
        match boundary {
            Some(boundary) => {
                debug!(%direction, "order exhausted, crossing boundary");
                boundary()
            }
            None => Ok(None),
        }
    }
}

impl Focusable for Container {
    fn type_name(&self) -> &str {
        "Container"
    }

    /// `"focus"` enters this container in its default direction.
    fn bind(self: Rc<Self>, method: &str) -> Option<FocusHandler> {
        if method != "focus" {
            return None;
        }
        let weak = self.downgrade();
        Some(FocusHandler::new(move || {
            let Some(container) = weak.upgrade() else {
                return;
            };
            if let Err(e) = container.focus_default() {
                warn!("nested container focus failed: {e}");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Probe;

    impl Focusable for Probe {
        fn bind(self: Rc<Self>, _method: &str) -> Option<FocusHandler> {
            None
        }
    }

    fn counting(hits: &Rc<Cell<u32>>) -> FocusSource {
        let hits = hits.clone();
        FocusSource::extractor(move |_| {
            let hits = hits.clone();
            Some(FocusHandler::new(move || hits.set(hits.get() + 1)))
        })
    }

    #[test]
    fn failed_mount_changes_nothing() {
        let c = Container::new();
        let target: Target = Rc::new(Probe);
        let a = c.allocate_id();
        let b = c.allocate_id();
        c.mount(a, &target, &FocusSource::Skip, Some(2)).unwrap();
        let before = c.order();
        let last = c.last_order();

        assert!(matches!(
            c.mount(b, &target, &FocusSource::Skip, Some(2)),
            Err(Error::DuplicateOrderHint { hint: 2, .. })
        ));
        assert!(matches!(
            c.mount(b, &target, &FocusSource::method("focus"), None),
            Err(Error::InvalidFocusExtractor(_))
        ));
        assert_eq!(c.order(), before);
        assert_eq!(c.last_order(), last);
        assert!(!c.is_mounted(b));
    }

    #[test]
    fn remount_with_same_hint_is_allowed() {
        let c = Container::new();
        let target: Target = Rc::new(Probe);
        let a = c.allocate_id();
        c.mount(a, &target, &FocusSource::Skip, Some(3)).unwrap();
        let key = c.mount(a, &target, &FocusSource::Skip, Some(3)).unwrap();
        assert_eq!(key, OrderKey(3072));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn continuation_resumes_from_landing_point() {
        let c = Container::new();
        let target: Target = Rc::new(Probe);
        let hits: Vec<Rc<Cell<u32>>> = (0..3).map(|_| Rc::new(Cell::new(0))).collect();
        for h in &hits {
            let id = c.allocate_id();
            c.mount(id, &target, &counting(h), None).unwrap();
        }
        let cont = c.focus(Direction::Forward).unwrap().unwrap();
        assert_eq!(cont.direction(), Direction::Forward);
        let cont = cont.resume().unwrap().unwrap();
        let cont = cont.resume().unwrap().unwrap();
        assert!(cont.resume().unwrap().is_none());
        assert!(hits.iter().all(|h| h.get() == 1));
    }

    #[test]
    fn release_id_unmounts() {
        let c = Container::new();
        let target: Target = Rc::new(Probe);
        let a = c.allocate_id();
        c.mount(a, &target, &FocusSource::Skip, None).unwrap();
        c.release_id(a);
        assert!(c.is_empty());
        assert!(matches!(c.next(a), Err(Error::NotSubscribed(_))));
    }

    #[test]
    fn released_id_cannot_mount() {
        let c = Container::new();
        let target: Target = Rc::new(Probe);
        let a = c.allocate_id();
        c.release_id(a);
        let b = c.allocate_id();
        c.mount(b, &target, &FocusSource::Skip, None).unwrap();

        assert_eq!(
            c.mount(a, &target, &FocusSource::Skip, Some(3)),
            Err(Error::UnknownParticipant(a))
        );
        assert_eq!(c.len(), 1);
        assert_eq!(c.order().len(), 1);
        assert!(!c.is_mounted(a));
        assert!(c.is_mounted(b));

        // The hint is still free for a live id.
        let fresh = c.allocate_id();
        assert_eq!(
            c.mount(fresh, &target, &FocusSource::Skip, Some(3)),
            Ok(OrderKey(3072))
        );
        assert_eq!(c.order().len(), c.len());
    }

    #[test]
    fn foreign_id_cannot_mount() {
        let c = Container::new();
        let other = Container::new();
        let target: Target = Rc::new(Probe);
        let _ = other.allocate_id();
        let foreign = other.allocate_id();
        assert!(matches!(
            c.mount(foreign, &target, &FocusSource::Skip, None),
            Err(Error::UnknownParticipant(_))
        ));
        assert!(c.is_empty());
    }

    #[test]
    fn order_table_lists_participants() {
        let c = Container::new();
        let target: Target = Rc::new(Probe);
        let hits = Rc::new(Cell::new(0));
        c.mount(c.allocate_id(), &target, &counting(&hits), None).unwrap();
        c.mount(c.allocate_id(), &target, &FocusSource::Skip, Some(4)).unwrap();
        let mut out = Vec::new();
        c.print_order_table(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("4096"));
        assert!(text.contains("skip"));
        assert!(text.contains("yes"));
    }
}
