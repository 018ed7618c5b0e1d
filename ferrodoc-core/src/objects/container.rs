/// Dirty and immutable state shared by every value that can hold other
/// values.
///
/// `is_dirty` reports the flag of the value itself OR'd with every child.
/// Clearing the flag cascades to children; setting it only marks the value
/// itself. Immutability always cascades.
pub trait Container {
    fn is_dirty(&self) -> bool;
    fn set_dirty(&mut self, dirty: bool);
    fn is_immutable(&self) -> bool;
    fn set_immutable(&mut self, immutable: bool);
}
