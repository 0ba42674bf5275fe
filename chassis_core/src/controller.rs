//! Close-loop motor controller.
//!
//! Owns the per-motor commanded-speed state and the transmit queue for one
//! driver board. All mutating calls only append to the queue; the sender
//! task performs every physical write. `CommandedSpeedState` is updated
//! synchronously with enqueue, so back-to-back `set_motors_speed` calls see
//! a consistent diff even while earlier commands are still in flight.

use std::io::{BufRead, Write as _};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chassis_traits::{Clock, MonotonicClock, Transport};
use eyre::WrapErr;

use crate::codec::{
    self, CompiledCommand, Direction, MotorId, MotorLayout, SpeedVector, MOTOR_COUNT,
};
use crate::error::Result;
use crate::sender::{QueueEntry, SenderTask};

pub struct CloseLoopController<T: Transport + Send + 'static> {
    layout: MotorLayout,
    /// Last-sent speed per motor; authoritative for diffing, updated on
    /// every set call even for unchanged motors.
    commanded: SpeedVector,
    sender: SenderTask,
    transport: Arc<Mutex<T>>,
}

impl<T: Transport + Send + 'static> CloseLoopController<T> {
    /// Start the controller: spawns the sender task and enqueues `RESET`
    /// so firmware state is known regardless of prior process state.
    pub fn new(layout: MotorLayout, transport: T) -> Self {
        Self::with_clock(layout, transport, MonotonicClock::new())
    }

    /// As `new`, with an explicit clock driving the sender's hang sleeps.
    pub fn with_clock(
        layout: MotorLayout,
        transport: T,
        clock: impl Clock + Send + 'static,
    ) -> Self {
        let transport = Arc::new(Mutex::new(transport));
        let sender = SenderTask::spawn(transport.clone(), clock);
        let controller = Self {
            layout,
            commanded: [0; MOTOR_COUNT],
            sender,
            transport,
        };
        tracing::info!(ids = ?controller.layout.ids, "close-loop controller starting");
        controller.append_to_queue(codec::reset_command(), Duration::ZERO);
        controller
    }

    pub fn motor_ids(&self) -> [MotorId; MOTOR_COUNT] {
        self.layout.ids
    }

    pub fn motor_dirs(&self) -> [Direction; MOTOR_COUNT] {
        self.layout.dirs
    }

    pub fn layout(&self) -> MotorLayout {
        self.layout
    }

    /// Last commanded speed vector, in wiring order.
    pub fn commanded_speeds(&self) -> SpeedVector {
        self.commanded
    }

    /// Commands enqueued but not yet written to the transport.
    pub fn pending(&self) -> usize {
        self.sender.pending()
    }

    /// Set per-motor speeds with change detection.
    ///
    /// A uniform target takes the broadcast fast path. Otherwise only the
    /// motors whose target differs from the commanded state are re-encoded,
    /// as a single batch; when nothing changed, nothing is enqueued. The
    /// commanded state is always updated to `target`.
    pub fn set_motors_speed(&mut self, target: SpeedVector, hang_time: Duration) {
        if codec::is_uniform(&target) {
            self.set_all_motors_speed(target[0], hang_time);
            return;
        }

        let changed: Vec<(MotorId, i32)> = self
            .layout
            .ids
            .iter()
            .zip(target)
            .zip(self.commanded)
            .zip(self.layout.dirs)
            .filter(|(((_, speed), current), _)| speed != current)
            .map(|(((&id, speed), _), dir)| (id, speed * dir.factor()))
            .collect();

        self.commanded = target;

        if changed.is_empty() {
            tracing::trace!(?target, "speed target unchanged, nothing enqueued");
            return;
        }
        self.append_to_queue(codec::encode_pairs(&changed), hang_time);
    }

    /// Set every motor to `speed` via the broadcast form. No diff is
    /// computed and no direction is applied: this is the intentionally
    /// cheap path for full-stop and full-speed commands.
    pub fn set_all_motors_speed(&mut self, speed: i32, hang_time: Duration) {
        self.append_to_queue(codec::encode_broadcast(speed), hang_time);
        self.commanded = [speed; MOTOR_COUNT];
    }

    /// Differential-drive convenience: left pair / right pair.
    pub fn move_cmd(&mut self, left_speed: i32, right_speed: i32) {
        self.set_motors_speed(
            [left_speed, left_speed, right_speed, right_speed],
            Duration::ZERO,
        );
    }

    /// Raw escape hatch for precompiled commands.
    pub fn append_to_queue(&self, command: CompiledCommand, hang_time: Duration) {
        self.sender.push(QueueEntry {
            bytes: command,
            hang_time,
        });
    }

    /// Interactive pass-through to the driver board for bench testing.
    ///
    /// Reads command lines from stdin, enqueues them raw, and echoes any
    /// bytes the board sends back. `exit` closes the channel. Not part of
    /// the automated control path.
    pub fn open_debug_channel(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        let mut ct = 0usize;
        writeln!(stdout, "debug channel open; enter commands, `exit` to close")
            .wrap_err("debug channel stdout")?;
        for line in stdin.lock().lines() {
            let line = line.wrap_err("debug channel stdin")?;
            let cmd = line.trim();
            if cmd == "exit" {
                writeln!(stdout, "debug channel closed").wrap_err("debug channel stdout")?;
                break;
            }
            if !cmd.is_empty() {
                self.append_to_queue(codec::encode_raw(cmd), Duration::ZERO);
            }
            if let Ok(mut port) = self.transport.lock()
                && let Ok(echo) = port.read(64)
                && !echo.is_empty()
            {
                writeln!(stdout, "out[{ct}]: {}", String::from_utf8_lossy(&echo))
                    .wrap_err("debug channel stdout")?;
            }
            ct += 1;
        }
        Ok(())
    }
}

impl<T: Transport + Send + 'static> std::fmt::Debug for CloseLoopController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseLoopController")
            .field("ids", &self.layout.ids)
            .field("commanded", &self.commanded)
            .field("pending", &self.pending())
            .finish()
    }
}
