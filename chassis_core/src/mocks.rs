//! Test and helper mocks for chassis_core.

use crossbeam_channel as xch;

/// Transport that forwards every written buffer to a channel, letting tests
/// observe exactly what the sender task put on the wire and in what order.
pub struct MockTransport {
    written: xch::Sender<Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> (Self, xch::Receiver<Vec<u8>>) {
        let (tx, rx) = xch::unbounded();
        (Self { written: tx }, rx)
    }
}

impl chassis_traits::Transport for MockTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
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

/// Transport whose writes always fail; exercises the sender task's
/// lossy-but-live policy.
pub struct FailingTransport;

impl chassis_traits::Transport for FailingTransport {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("failing transport")))
    }

    fn read(
        &mut self,
        _max_len: usize,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Vec::new())
    }
}
