//! Sensor transport.
//!
//! Each configured device gets its own worker thread that owns the WebSocket,
//! reconnects with exponential backoff, and forwards frames, lifecycle notices
//! and status changes over one bounded channel. Messages from a single device
//! arrive in the order they were read.

pub mod connection;
pub mod types;

pub use connection::{classify_text, Backoff, DeviceConnection, Incoming};
pub use types::{DeviceStatus, RawFinger, RawFrame, RawHand, SensorMessage};

use crate::config::{DeviceConfig, TransportConfig};
use crate::error::TransportError;
use crate::stats::SharedStats;
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the device workers and the receiving end of their channel.
pub struct SensorHub {
    devices: Vec<DeviceConfig>,
    transport: TransportConfig,
    sender: Sender<SensorMessage>,
    receiver: Receiver<SensorMessage>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
    stats: SharedStats,
}

impl SensorHub {
    pub fn new(devices: Vec<DeviceConfig>, transport: TransportConfig, stats: SharedStats) -> Self {
        let (sender, receiver) = bounded(transport.channel_capacity.max(1));
        Self {
            devices,
            transport,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
            stats,
        }
    }

    /// Spawn one worker per device.
    pub fn start(&mut self) -> Result<(), TransportError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(TransportError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        for (index, device) in self.devices.iter().enumerate() {
            let worker = DeviceWorker {
                index,
                device: device.clone(),
                transport: self.transport.clone(),
                sender: self.sender.clone(),
                running: self.running.clone(),
                stats: self.stats.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("device-{index}"))
                .spawn(move || worker.run())
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            self.handles.push(handle);
        }
        Ok(())
    }

    /// Signal the workers to stop and wait for them.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<SensorMessage> {
        &self.receiver
    }
}

impl Drop for SensorHub {
    fn drop(&mut self) {
        self.stop();
    }
}

struct DeviceWorker {
    index: usize,
    device: DeviceConfig,
    transport: TransportConfig,
    sender: Sender<SensorMessage>,
    running: Arc<AtomicBool>,
    stats: SharedStats,
}

impl DeviceWorker {
    fn run(self) {
        let mut backoff = Backoff::new(&self.transport);

        while self.is_running() {
            self.publish(DeviceStatus::Connecting {
                attempt: backoff.attempt() + 1,
            });

            let reason = match DeviceConnection::open(&self.device, self.transport.read_timeout) {
                Ok((connection, handshake)) => {
                    backoff.reset();
                    self.publish(DeviceStatus::Online { handshake });
                    match self.pump(connection) {
                        Some(err) => err.to_string(),
                        None => break,
                    }
                }
                Err(err) => err.to_string(),
            };

            if !self.is_running() {
                break;
            }

            match backoff.next_delay() {
                Some(delay) => {
                    warn!("Device {} offline ({reason}), retrying in {delay:?}", self.index);
                    self.stats.record_reconnect();
                    self.publish(DeviceStatus::Offline {
                        reason,
                        retry_in: Some(delay),
                    });
                    self.sleep(delay);
                }
                None => {
                    warn!(
                        "Device {} offline ({reason}), giving up after {} attempts",
                        self.index,
                        backoff.attempt()
                    );
                    self.publish(DeviceStatus::Offline {
                        reason,
                        retry_in: None,
                    });
                    break;
                }
            }
        }
        debug!("Device {} worker stopped", self.index);
    }

    /// Forward messages until the connection is lost (`Some`) or the hub stops (`None`).
    fn pump(&self, mut connection: DeviceConnection) -> Option<TransportError> {
        while self.is_running() {
            let message = match connection.next_message() {
                Ok(Incoming::Frame(frame)) => {
                    self.stats.record_frame_received();
                    SensorMessage::Frame {
                        device: self.index,
                        frame: *frame,
                        received_at: Utc::now(),
                    }
                }
                Ok(Incoming::Lifecycle(text)) => {
                    info!("Device {}: {text}", self.index);
                    self.stats.record_lifecycle_message();
                    SensorMessage::Lifecycle {
                        device: self.index,
                        text,
                    }
                }
                Err(err) if !err.is_connection_lost() => {
                    warn!("Device {}: discarding message: {err}", self.index);
                    self.stats.record_malformed_message();
                    continue;
                }
                Err(err) => {
                    connection.close();
                    return Some(err);
                }
            };

            if !self.forward(message) {
                break;
            }
        }
        connection.close();
        None
    }

    fn publish(&self, status: DeviceStatus) {
        self.forward(SensorMessage::Status {
            device: self.index,
            status,
        });
    }

    /// Send without blocking shutdown. Returns false once nobody is listening.
    fn forward(&self, mut message: SensorMessage) -> bool {
        loop {
            match self.sender.send_timeout(message, POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Disconnected(_)) => return false,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !self.is_running() {
                        return false;
                    }
                    message = returned;
                }
            }
        }
    }

    fn sleep(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() && self.is_running() {
            let step = remaining.min(POLL_INTERVAL);
            thread::sleep(step);
            remaining -= step;
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
