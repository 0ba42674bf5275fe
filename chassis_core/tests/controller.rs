//! End-to-end controller tests over a recording transport: reset handshake,
//! broadcast fast path, per-motor diffing and the lossy-but-live policy.

use std::time::Duration;

use chassis_core::mocks::MockTransport;
use chassis_core::{CloseLoopController, Direction, MotorLayout};
use chassis_traits::TestClock;
use crossbeam_channel as xch;
use rstest::rstest;

fn layout() -> MotorLayout {
    MotorLayout::new(
        [1, 2, 3, 4],
        [
            Direction::Forward,
            Direction::Forward,
            Direction::Reverse,
            Direction::Reverse,
        ],
    )
}

fn recv(rx: &xch::Receiver<Vec<u8>>) -> Vec<u8> {
    rx.recv_timeout(Duration::from_millis(500))
        .expect("sender task should have written")
}

#[rstest]
fn reset_is_the_first_thing_on_the_wire() {
    let (transport, rx) = MockTransport::new();
    let _ctl = CloseLoopController::new(layout(), transport);
    assert_eq!(recv(&rx), b"RESET\r");
}

#[rstest]
fn uniform_target_takes_broadcast_path() {
    let (transport, rx) = MockTransport::new();
    let mut ctl = CloseLoopController::new(layout(), transport);
    assert_eq!(recv(&rx), b"RESET\r");

    ctl.set_motors_speed([500; 4], Duration::ZERO);
    assert_eq!(recv(&rx), b"v500\r");
    assert_eq!(ctl.commanded_speeds(), [500; 4]);
}

#[rstest]
fn mixed_target_applies_directions_per_motor() {
    let (transport, rx) = MockTransport::new();
    let mut ctl = CloseLoopController::new(layout(), transport);
    assert_eq!(recv(&rx), b"RESET\r");

    ctl.set_motors_speed([100, 200, 300, 400], Duration::ZERO);
    assert_eq!(recv(&rx), b"1v100\r2v200\r3v-300\r4v-400\r");
}

#[rstest]
fn unchanged_motors_are_not_reencoded() {
    let (transport, rx) = MockTransport::new();
    let mut ctl = CloseLoopController::new(layout(), transport);
    assert_eq!(recv(&rx), b"RESET\r");

    ctl.set_motors_speed([100, 200, 300, 400], Duration::ZERO);
    assert_eq!(recv(&rx), b"1v100\r2v200\r3v-300\r4v-400\r");

    // Only motor 2 changes; the batch contains exactly its record.
    ctl.set_motors_speed([100, 250, 300, 400], Duration::ZERO);
    assert_eq!(recv(&rx), b"2v250\r");
}

#[rstest]
fn identical_target_enqueues_nothing() {
    let (transport, rx) = MockTransport::new();
    let mut ctl = CloseLoopController::new(layout(), transport);
    assert_eq!(recv(&rx), b"RESET\r");

    ctl.set_motors_speed([100, 200, 300, 400], Duration::ZERO);
    assert_eq!(recv(&rx), b"1v100\r2v200\r3v-300\r4v-400\r");

    ctl.set_motors_speed([100, 200, 300, 400], Duration::ZERO);
    ctl.set_motors_speed([0; 4], Duration::ZERO);
    // The no-op target left no trace between the batch and the stop.
    assert_eq!(recv(&rx), b"v0\r");
}

#[rstest]
fn hang_time_reaches_the_sender_clock() {
    let (transport, rx) = MockTransport::new();
    let clock = TestClock::new();
    let mut ctl = CloseLoopController::with_clock(layout(), transport, clock.clone());
    assert_eq!(recv(&rx), b"RESET\r");

    ctl.set_motors_speed([100, 200, 300, 400], Duration::from_millis(25));
    assert_eq!(recv(&rx), b"1v100\r2v200\r3v-300\r4v-400\r");

    // The stop goes out only after the previous entry's hang elapsed on
    // the injected clock.
    ctl.set_all_motors_speed(0, Duration::ZERO);
    assert_eq!(recv(&rx), b"v0\r");
    assert_eq!(clock.slept(), Duration::from_millis(25));
}

#[rstest]
fn move_cmd_maps_to_left_right_pairs() {
    let (transport, rx) = MockTransport::new();
    let mut ctl = CloseLoopController::new(layout(), transport);
    assert_eq!(recv(&rx), b"RESET\r");

    ctl.move_cmd(300, -300);
    assert_eq!(recv(&rx), b"1v300\r2v300\r3v300\r4v300\r");
    assert_eq!(ctl.commanded_speeds(), [300, 300, -300, -300]);
}

/// Transport whose first `fail_count` writes error, recording the rest.
struct FlakyTransport {
    fail_count: usize,
    written: xch::Sender<Vec<u8>>,
}

impl chassis_traits::Transport for FlakyTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_count > 0 {
            self.fail_count -= 1;
            return Err(Box::new(std::io::Error::other("flaky write")));
        }
        self.written
            .send(bytes.to_vec())
            .map_err(|e| Box::new(std::io::Error::other(e.to_string())) as _)
    }

    fn read(
        &mut self,
        _max_len: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Vec::new())
    }
}

#[rstest]
fn write_failure_drops_the_command_but_keeps_the_queue_alive() {
    let (tx, rx) = xch::unbounded();
    let transport = FlakyTransport {
        fail_count: 1,
        written: tx,
    };
    // The reset write fails and is dropped; the next command still goes out.
    let mut ctl = CloseLoopController::new(layout(), transport);
    ctl.set_motors_speed([700; 4], Duration::ZERO);
    assert_eq!(recv(&rx), b"v700\r");
}
