//! Router state: the session source plus the controller a route group serves.

use std::sync::Arc;

pub struct ControllerState<D, C> {
    pub db: D,
    pub controller: Arc<C>,
}

impl<D, C> ControllerState<D, C> {
    pub fn new(db: D, controller: C) -> Self {
        ControllerState {
            db,
            controller: Arc::new(controller),
        }
    }
}

// Derived Clone would require `C: Clone`; only the Arc is cloned.
impl<D: Clone, C> Clone for ControllerState<D, C> {
    fn clone(&self) -> Self {
        ControllerState {
            db: self.db.clone(),
            controller: Arc::clone(&self.controller),
        }
    }
}
