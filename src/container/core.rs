//! Ordered controller storage with a reserved front slot.
//!
//! Child indices follow the list shown to users: slot `0` is the current
//! controller (possibly vacant) and slots `1..` hold saved controllers in order.
//! Generic insertion can never reach slot `0`; only [`ControllerContainer::add_child_to_front`]
//! may fill it.

use crate::controller::{ControllerId, ControllerNode};

#[derive(Debug, Default)]
pub struct ControllerContainer {
    front: Option<ControllerNode>,
    saved: Vec<ControllerNode>,
}

impl ControllerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupied slots, counting the front slot only when filled.
    pub fn num_children(&self) -> usize {
        self.saved.len() + usize::from(self.front.is_some())
    }

    pub fn num_saved(&self) -> usize {
        self.saved.len()
    }

    pub fn has_front(&self) -> bool {
        self.front.is_some()
    }

    pub fn front(&self) -> Option<&ControllerNode> {
        self.front.as_ref()
    }

    pub fn front_mut(&mut self) -> Option<&mut ControllerNode> {
        self.front.as_mut()
    }

    pub fn child_at(&self, index: usize) -> Option<&ControllerNode> {
        match index {
            0 => self.front.as_ref(),
            _ => self.saved.get(index - 1),
        }
    }

    pub fn child_at_mut(&mut self, index: usize) -> Option<&mut ControllerNode> {
        match index {
            0 => self.front.as_mut(),
            _ => self.saved.get_mut(index - 1),
        }
    }

    /// Insert at `index`. Index `0` is redirected to `1`; indices past the end append.
    pub fn add_child(&mut self, child: ControllerNode, index: usize) {
        let position = index.max(1) - 1;
        let position = position.min(self.saved.len());
        self.saved.insert(position, child);
    }

    pub fn push_child(&mut self, child: ControllerNode) {
        self.saved.push(child);
    }

    /// Place `child` in the front slot, returning whatever occupied it.
    pub fn add_child_to_front(&mut self, child: ControllerNode) -> Option<ControllerNode> {
        self.front.replace(child)
    }

    pub fn take_front(&mut self) -> Option<ControllerNode> {
        self.front.take()
    }

    /// Remove and return a saved child. The front slot is never taken here.
    pub fn take_child_at(&mut self, index: usize) -> Option<ControllerNode> {
        if index == 0 || index > self.saved.len() {
            return None;
        }
        Some(self.saved.remove(index - 1))
    }

    /// Drop every saved child from `index` onward (`0` behaves like `1`).
    pub fn remove_children(&mut self, index: usize) {
        let position = index.max(1) - 1;
        if position < self.saved.len() {
            self.saved.truncate(position);
        }
    }

    /// Child index of `id`, if present.
    pub fn index_of(&self, id: ControllerId) -> Option<usize> {
        if self.front.as_ref().map(ControllerNode::id) == Some(id) {
            return Some(0);
        }
        self.saved
            .iter()
            .position(|node| node.id() == id)
            .map(|position| position + 1)
    }

    pub fn saved(&self) -> impl Iterator<Item = &ControllerNode> {
        self.saved.iter()
    }

    /// Drop everything, front slot included.
    pub fn clear(&mut self) {
        self.front = None;
        self.saved.clear();
    }
}
