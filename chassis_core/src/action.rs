//! Timed motion actions and the builder that normalizes them.
//!
//! An `Action` pairs a motor command with a duration, an optional breaker
//! predicate, and the substitute actions to run when the breaker fires.
//! Actions are immutable once built and are shared as `Arc<Action>` so the
//! memoizer, the player queue and break-action lists can alias them freely.

use std::sync::Arc;
use std::time::Duration;

use chassis_traits::Transport;
use serde::{Deserialize, Serialize};

use crate::codec::{CompiledCommand, MotorLayout, SpeedVector, MOTOR_COUNT};
use crate::controller::CloseLoopController;
use crate::error::BuildError;
use crate::memo::ActionCacheKey;
use crate::spin;
use crate::watcher::Watcher;

/// Margin subtracted from an uninterruptible action's duration when
/// deriving its post-send hang time. The sender task sleeps through the
/// move and wakes this early; the busy-wait covers the tail exactly.
pub const MAX_HANG_ERROR_MS: u32 = 50;

/// What an action submits to the controller when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandSource {
    /// Pre-rendered wire bytes, bypassing encode and diffing.
    Compiled(CompiledCommand),
    /// A speed vector encoded through the controller's diff path at
    /// start time.
    Speeds(SpeedVector),
}

/// Where an interrupted action's substitutes land in the player queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePolicy {
    /// Discard everything queued and run the substitutes instead.
    Override,
    /// Run the substitutes first, then resume the original queue.
    Insert,
}

impl Default for OverridePolicy {
    fn default() -> Self {
        OverridePolicy::Override
    }
}

/// Result of a breaker firing mid-action: the actions to run in its place
/// and how they combine with the rest of the queue.
#[derive(Debug)]
pub struct Interrupt {
    pub substitutes: Vec<Arc<Action>>,
    pub policy: OverridePolicy,
}

pub struct Action {
    source: CommandSource,
    duration_ms: u64,
    breaker: Option<Watcher>,
    break_actions: Vec<Arc<Action>>,
    policy: OverridePolicy,
    hang_time: Duration,
}

impl Action {
    pub fn builder() -> ActionBuilder {
        ActionBuilder::new()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn hang_time(&self) -> Duration {
        self.hang_time
    }

    pub fn has_breaker(&self) -> bool {
        self.breaker.is_some()
    }

    /// What this action submits to the controller when started.
    pub fn command(&self) -> &CommandSource {
        &self.source
    }

    /// Submit the command and hold for the action's duration.
    ///
    /// Returns `Some(Interrupt)` when the breaker fired before the duration
    /// elapsed. A zero-duration action submits its command and returns
    /// immediately without polling the breaker, so it can be used to change
    /// speed without blocking.
    pub fn start<T: Transport + Send + 'static>(
        &self,
        controller: &mut CloseLoopController<T>,
    ) -> Option<Interrupt> {
        match &self.source {
            CommandSource::Compiled(cmd) => {
                controller.append_to_queue(cmd.clone(), self.hang_time);
            }
            CommandSource::Speeds(speeds) => {
                controller.set_motors_speed(*speeds, self.hang_time);
            }
        }
        if self.duration_ms == 0 {
            return None;
        }
        let fired = spin::spin_until(self.duration(), self.breaker.as_ref());
        if fired {
            tracing::debug!(duration_ms = self.duration_ms, "action interrupted by breaker");
            return Some(Interrupt {
                substitutes: self.break_actions.clone(),
                policy: self.policy,
            });
        }
        None
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("source", &self.source)
            .field("duration_ms", &self.duration_ms)
            .field("breaker", &self.breaker.is_some())
            .field("break_actions", &self.break_actions.len())
            .field("policy", &self.policy)
            .field("hang_time", &self.hang_time)
            .finish()
    }
}

/// Chainable builder that normalizes speed and duration inputs into an
/// immutable `Action`.
///
/// Input precedence: an explicit per-motor list overrides a scalar speed;
/// multipliers apply to whatever is set when `build` runs, truncating
/// toward zero. The post-send hang time is derived from the duration only
/// for breaker-free actions; anything with a breaker must keep the sender
/// task hot for substitutes, so its hang time is zero unless set
/// explicitly.
#[derive(Default)]
pub struct ActionBuilder {
    scalar_speed: Option<i32>,
    speed_list: Option<SpeedVector>,
    speed_multiplier: f64,
    duration_ms: u64,
    duration_multiplier: f64,
    breaker: Option<Watcher>,
    breaker_tag: Option<String>,
    break_actions: Vec<Arc<Action>>,
    policy: OverridePolicy,
    hang_time: Option<Duration>,
    precompile_layout: Option<MotorLayout>,
}

impl ActionBuilder {
    pub fn new() -> Self {
        Self {
            speed_multiplier: 1.0,
            duration_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Uniform speed applied to every motor unless a per-motor list is
    /// also given.
    pub fn with_speed(mut self, speed: i32) -> Self {
        self.scalar_speed = Some(speed);
        self
    }

    /// Per-motor speed list in wiring order; takes precedence over the
    /// scalar speed.
    pub fn with_speeds(mut self, speeds: SpeedVector) -> Self {
        self.speed_list = Some(speeds);
        self
    }

    /// Scale the effective speeds; the product truncates toward zero.
    pub fn with_speed_multiplier(mut self, multiplier: f64) -> Self {
        self.speed_multiplier = multiplier;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Scale the duration; the product truncates toward zero.
    pub fn with_duration_multiplier(mut self, multiplier: f64) -> Self {
        self.duration_multiplier = multiplier;
        self
    }

    pub fn with_breaker(mut self, breaker: Watcher) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Stable label for the breaker, used to keep otherwise-identical
    /// actions with different breakers distinct in the memoizer.
    pub fn with_breaker_tag(mut self, tag: impl Into<String>) -> Self {
        self.breaker_tag = Some(tag.into());
        self
    }

    /// Substitute actions to run when the breaker fires, and how they
    /// combine with the rest of the queue.
    pub fn with_break_actions(
        mut self,
        actions: Vec<Arc<Action>>,
        policy: OverridePolicy,
    ) -> Self {
        self.break_actions = actions;
        self.policy = policy;
        self
    }

    /// Explicit post-send hang time, overriding derivation.
    pub fn with_hang_time(mut self, hang_time: Duration) -> Self {
        self.hang_time = Some(hang_time);
        self
    }

    /// Render the effective speeds through `layout` at build time, so
    /// starting the action skips encoding and the controller's diff
    /// entirely. Order-insensitive with respect to the other setters.
    pub fn precompiled(mut self, layout: &MotorLayout) -> Self {
        self.precompile_layout = Some(*layout);
        self
    }

    fn effective_speeds(&self) -> SpeedVector {
        let base = self
            .speed_list
            .or(self.scalar_speed.map(|s| [s; MOTOR_COUNT]))
            .unwrap_or([0; MOTOR_COUNT]);
        base.map(|s| (s as f64 * self.speed_multiplier) as i32)
    }

    fn effective_duration_ms(&self) -> u64 {
        (self.duration_ms as f64 * self.duration_multiplier) as u64
    }

    /// The memoization key for the action this builder would produce.
    pub fn cache_key(&self) -> ActionCacheKey {
        ActionCacheKey {
            speeds: self.effective_speeds(),
            duration_ms: self.effective_duration_ms(),
            hang_ms: self.hang_time.map(|h| h.as_millis() as u64),
            breaker_tag: self.breaker_tag.clone(),
        }
    }

    pub fn build(self) -> Result<Action, BuildError> {
        if !self.break_actions.is_empty() && self.breaker.is_none() {
            return Err(BuildError::BreakActionsWithoutBreaker);
        }
        // A non-finite multiplier would truncate to a nonsense speed or
        // duration and poison the cache key.
        if !self.speed_multiplier.is_finite() || !self.duration_multiplier.is_finite() {
            return Err(BuildError::InvalidAction("non-finite multiplier"));
        }
        let duration_ms = self.effective_duration_ms();
        let hang_time = match self.hang_time {
            Some(explicit) => explicit,
            None if self.breaker.is_some() => Duration::ZERO,
            None => derive_hang_time(duration_ms),
        };
        let source = match self.precompile_layout {
            Some(layout) => CommandSource::Compiled(layout.compile(&self.effective_speeds())),
            None => CommandSource::Speeds(self.effective_speeds()),
        };
        Ok(Action {
            source,
            duration_ms,
            breaker: self.breaker,
            break_actions: self.break_actions,
            policy: self.policy,
            hang_time,
        })
    }
}

/// Sleep the sender for the duration minus the error margin; short
/// actions derive zero and leave the whole wait to the busy loop.
fn derive_hang_time(duration_ms: u64) -> Duration {
    Duration::from_millis(duration_ms.saturating_sub(u64::from(MAX_HANG_ERROR_MS)))
}

/// Rebuild an action from persisted fields. Breakers are not serializable,
/// so only breaker-free actions round-trip through here.
pub(crate) fn from_persisted(
    source: CommandSource,
    duration_ms: u64,
    hang_ms: Option<u64>,
) -> Action {
    let hang_time = hang_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| derive_hang_time(duration_ms));
    Action {
        source,
        duration_ms,
        breaker: None,
        break_actions: Vec::new(),
        policy: OverridePolicy::Override,
        hang_time,
    }
}

pub(crate) fn persisted_fields(action: &Action) -> (CommandSource, u64, Option<u64>) {
    (
        action.source.clone(),
        action.duration_ms,
        Some(action.hang_time.as_millis() as u64),
    )
}
