use glam::Vec2;

pub trait Respawnable {
    fn ready_to_respawn(&self, now: u64) -> bool;

    fn respawn_position(&self) -> Vec2;
}

/// Entities with teardown work that must not run while the map is iterating
/// them. Maps hand these to the deferred teardown queue instead.
pub trait Disposable {
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}
