use slotmap::new_key_type;

new_key_type! {
    /// Opaque identifier for a participant, minted by a
    /// [`Container`](crate::Container).
    pub struct ParticipantId;
}
