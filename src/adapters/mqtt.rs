//! MQTT threshold ingress.
//!
//! The MQTT client runs its own event thread.  That thread never touches
//! controller state: it filters messages by topic, copies the payload,
//! stamps it with the monotonic receive time and offers it to a bounded
//! [`ThresholdQueue`].  The control-loop task drains the queue and hands
//! each message to the application service, so the setpoint has exactly
//! one owner.
//!
//! ```text
//!   broker ──▶ MQTT thread ──▶ THRESHOLD_CHANNEL ──▶ control loop ──▶ AppService
//!              (filter, stamp)  (embassy-sync, 4)      (drain)
//! ```
//!
//! When the queue is full the oldest pending message is discarded: only
//! the newest setpoint matters.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`MqttAdapter`] wraps `EspMqttClient` and
//!   re-subscribes after every broker (re)connect.
//! - **all targets**: the queue itself, so host tests can inject payloads.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, warn};

use crate::app::commands::{ThresholdMessage, MAX_PAYLOAD_LEN};
use crate::error::{CommsError, Error, ThresholdError};

/// Pending threshold messages between the MQTT thread and the control loop.
pub const THRESHOLD_QUEUE_DEPTH: usize = 4;

/// Bounded single-consumer queue of stamped threshold payloads.
pub struct ThresholdQueue {
    channel: Channel<CriticalSectionRawMutex, ThresholdMessage, THRESHOLD_QUEUE_DEPTH>,
}

impl Default for ThresholdQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ThresholdQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Offer one inbound message.
    ///
    /// Returns `Ok(false)` if `topic` is not `subscribed_topic` (the
    /// message is ignored), `Ok(true)` once queued.  Oversized payloads are
    /// rejected as [`ThresholdError::TooLong`].
    pub fn offer(
        &self,
        subscribed_topic: &str,
        topic: Option<&str>,
        payload: &[u8],
        received_at_ms: u64,
    ) -> Result<bool, Error> {
        if topic != Some(subscribed_topic) {
            debug!("MQTT: ignoring message on {:?}", topic);
            return Ok(false);
        }
        let Some(msg) = ThresholdMessage::new(payload, received_at_ms) else {
            warn!(
                "THRESH | rejected: {} bytes exceeds {}",
                payload.len(),
                MAX_PAYLOAD_LEN
            );
            return Err(ThresholdError::TooLong.into());
        };

        match self.channel.try_send(msg) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(msg)) => {
                warn!("MQTT: threshold queue full, dropping oldest");
                let _ = self.channel.try_receive();
                self.channel
                    .try_send(msg)
                    .map(|()| true)
                    .map_err(|_| CommsError::QueueFull.into())
            }
        }
    }

    /// Next pending message, oldest first.
    pub fn try_next(&self) -> Option<ThresholdMessage> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

/// The queue shared by the MQTT thread and the control loop.
pub static THRESHOLD_CHANNEL: ThresholdQueue = ThresholdQueue::new();

// ───────────────────────────────────────────────────────────────
// ESP-IDF client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::MqttAdapter;

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use esp_idf_svc::mqtt::client::{
        Details, EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
    };
    use heapless::String;
    use log::{error, info, warn};

    use super::THRESHOLD_CHANNEL;
    use crate::adapters::time::Esp32TimeAdapter;
    use crate::app::ports::ClockPort;
    use crate::config::{NetworkConfig, MAX_TOPIC_LEN};
    use crate::error::CommsError;

    const EVENT_THREAD_STACK: usize = 6 * 1024;

    /// Owns the MQTT client; the connection is serviced on its own thread.
    pub struct MqttAdapter {
        client: EspMqttClient<'static>,
        topic: String<MAX_TOPIC_LEN>,
        /// Set by the event thread on every (re)connect.
        needs_subscribe: Arc<AtomicBool>,
    }

    impl MqttAdapter {
        pub fn start(net: &NetworkConfig, topic: &str) -> Result<Self, CommsError> {
            let topic: String<MAX_TOPIC_LEN> =
                String::try_from(topic).map_err(|_| CommsError::MqttSubscribeFailed)?;
            let conf = MqttClientConfiguration {
                client_id: Some(net.client_id.as_str()),
                ..Default::default()
            };

            let (client, mut connection) = EspMqttClient::new(net.broker_url.as_str(), &conf)
                .map_err(|e| {
                    error!("MQTT: client init failed: {}", e);
                    CommsError::MqttConnectFailed
                })?;

            let needs_subscribe = Arc::new(AtomicBool::new(false));
            let flag = needs_subscribe.clone();
            let filter = topic.clone();

            std::thread::Builder::new()
                .name("mqtt-rx".into())
                .stack_size(EVENT_THREAD_STACK)
                .spawn(move || {
                    let clock = Esp32TimeAdapter::new();
                    info!("MQTT: event thread running");
                    while let Ok(event) = connection.next() {
                        match event.payload() {
                            EventPayload::Connected(_) => {
                                info!("MQTT: connected");
                                flag.store(true, Ordering::Release);
                            }
                            EventPayload::Disconnected => warn!("MQTT: disconnected"),
                            EventPayload::Received {
                                topic,
                                data,
                                details: Details::Complete,
                                ..
                            } => {
                                let _ = THRESHOLD_CHANNEL.offer(
                                    filter.as_str(),
                                    topic,
                                    data,
                                    clock.now_ms(),
                                );
                            }
                            EventPayload::Received { .. } => {
                                warn!("MQTT: fragmented message dropped");
                            }
                            EventPayload::Error(e) => warn!("MQTT: {}", e),
                            _ => {}
                        }
                    }
                    warn!("MQTT: event thread exiting");
                })
                .map_err(|_| CommsError::MqttConnectFailed)?;

            info!("MQTT: client started ({})", net.broker_url);
            Ok(Self {
                client,
                topic,
                needs_subscribe,
            })
        }

        /// Subscribe if the broker connected since the last call.
        ///
        /// Called from the control loop so the client is only ever used
        /// from one task.  On failure the flag stays set and the next call
        /// retries.
        pub fn poll_subscription(&mut self) -> Result<(), CommsError> {
            if !self.needs_subscribe.load(Ordering::Acquire) {
                return Ok(());
            }
            match self.client.subscribe(self.topic.as_str(), QoS::AtMostOnce) {
                Ok(_) => {
                    self.needs_subscribe.store(false, Ordering::Release);
                    info!("MQTT: subscribed to {}", self.topic);
                    Ok(())
                }
                Err(e) => {
                    warn!("MQTT: subscribe failed: {}", e);
                    Err(CommsError::MqttSubscribeFailed)
                }
            }
        }
    }
}
