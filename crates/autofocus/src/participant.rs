use crate::{
    container::{Container, Continuation},
    error::Result,
    id::ParticipantId,
    order::OrderKey,
    source::{FocusSource, Target},
};

/// An owned participant id bound to its container.
///
/// This is the adapter a host framework holds per mounted element: it mounts
/// and unmounts on lifecycle events and exposes `next`/`prev` without the
/// caller tracking ids. Dropping it unmounts the participant and retires the
/// id.
pub struct Participant {
    /// Owning container.
    container: Container,
    /// Minted id.
    id: ParticipantId,
}

impl Participant {
    /// Mint a new participant in `container`.
    pub fn new(container: Container) -> Self {
        let id = container.allocate_id();
        Self { container, id }
    }

    /// This participant's id.
    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// The owning container.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Mount, backed by `target`.
    pub fn mount(&self, target: &Target, source: &FocusSource, hint: Option<i64>) -> Result<OrderKey> {
        self.container.mount(self.id, target, source, hint)
    }

    /// Unmount. Returns `false` if not mounted.
    pub fn unmount(&self) -> bool {
        self.container.unmount(self.id)
    }

    /// Is this participant mounted?
    pub fn is_mounted(&self) -> bool {
        self.container.is_mounted(self.id)
    }

    /// Focus the next focusable participant.
    pub fn next(&self) -> Result<Option<Continuation>> {
        self.container.next(self.id)
    }

    /// Focus the previous focusable participant.
    pub fn prev(&self) -> Result<Option<Continuation>> {
        self.container.prev(self.id)
    }

    /// Wrap `callback` so that calling the result first moves focus forward
    /// from this participant, then runs `callback`.
    pub fn chain_next<F, R>(&self, callback: F) -> impl Fn() -> Result<R> + use<F, R>
    where
        F: Fn() -> R,
    {
        let container = self.container.downgrade();
        let id = self.id;
        move || {
            if let Some(c) = container.upgrade() {
                c.next(id)?;
            }
            Ok(callback())
        }
    }

    /// Wrap `callback` so that calling the result first moves focus backward
    /// from this participant, then runs `callback`.
    pub fn chain_prev<F, R>(&self, callback: F) -> impl Fn() -> Result<R> + use<F, R>
    where
        F: Fn() -> R,
    {
        let container = self.container.downgrade();
        let id = self.id;
        move || {
            if let Some(c) = container.upgrade() {
                c.prev(id)?;
            }
            Ok(callback())
        }
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.container.release_id(self.id);
    }
}
