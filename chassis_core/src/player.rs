//! Sequential action queue with breaker-driven rerouting.

use std::collections::VecDeque;
use std::sync::Arc;

use chassis_traits::Transport;

use crate::action::{Action, OverridePolicy};
use crate::controller::CloseLoopController;

/// Runs queued actions to completion, in order. When a running action's
/// breaker fires, its substitutes either replace the remaining queue or
/// are spliced in front of it, per the action's policy; substitutes are
/// ordinary actions and may themselves be interrupted.
#[derive(Debug, Default)]
pub struct ActionPlayer {
    queue: VecDeque<Arc<Action>>,
}

impl ActionPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueue one action; with `run_now` the whole queue is played
    /// immediately after.
    pub fn append<T: Transport + Send + 'static>(
        &mut self,
        controller: &mut CloseLoopController<T>,
        action: Arc<Action>,
        run_now: bool,
    ) {
        self.queue.push_back(action);
        if run_now {
            self.play(controller);
        }
    }

    /// Enqueue several actions; with `run_now` the whole queue is played
    /// immediately after.
    pub fn extend<T: Transport + Send + 'static>(
        &mut self,
        controller: &mut CloseLoopController<T>,
        actions: impl IntoIterator<Item = Arc<Action>>,
        run_now: bool,
    ) {
        self.queue.extend(actions);
        if run_now {
            self.play(controller);
        }
    }

    /// Drop everything queued.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Replace the whole queue with `actions`.
    pub fn override_queue(&mut self, actions: impl IntoIterator<Item = Arc<Action>>) {
        self.queue.clear();
        self.queue.extend(actions);
    }

    /// Splice `actions` in front of the queue, preserving their order.
    pub fn insert_front(&mut self, actions: impl IntoIterator<Item = Arc<Action>>) {
        let incoming: Vec<Arc<Action>> = actions.into_iter().collect();
        for action in incoming.into_iter().rev() {
            self.queue.push_front(action);
        }
    }

    /// Run actions until the queue is empty.
    pub fn play<T: Transport + Send + 'static>(
        &mut self,
        controller: &mut CloseLoopController<T>,
    ) {
        while let Some(action) = self.queue.pop_front() {
            if let Some(interrupt) = action.start(controller) {
                match interrupt.policy {
                    OverridePolicy::Override => {
                        tracing::debug!(
                            dropped = self.queue.len(),
                            substitutes = interrupt.substitutes.len(),
                            "breaker override, replacing queue"
                        );
                        self.override_queue(interrupt.substitutes);
                    }
                    OverridePolicy::Insert => {
                        tracing::debug!(
                            substitutes = interrupt.substitutes.len(),
                            "breaker insert, splicing substitutes"
                        );
                        self.insert_front(interrupt.substitutes);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionBuilder;

    fn quick(speed: i32) -> Arc<Action> {
        Arc::new(
            ActionBuilder::new()
                .with_speed(speed)
                .with_duration_ms(0)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn insert_front_preserves_order() {
        let mut player = ActionPlayer::new();
        let (a, b, c) = (quick(1), quick(2), quick(3));
        player.override_queue([Arc::clone(&c)]);
        player.insert_front([Arc::clone(&a), Arc::clone(&b)]);
        assert_eq!(player.len(), 3);
        assert!(Arc::ptr_eq(&player.queue[0], &a));
        assert!(Arc::ptr_eq(&player.queue[1], &b));
        assert!(Arc::ptr_eq(&player.queue[2], &c));
    }

    #[test]
    fn override_queue_replaces_everything() {
        let mut player = ActionPlayer::new();
        player.override_queue([quick(1), quick(2)]);
        let replacement = quick(9);
        player.override_queue([Arc::clone(&replacement)]);
        assert_eq!(player.len(), 1);
        assert!(Arc::ptr_eq(&player.queue[0], &replacement));
    }
}
