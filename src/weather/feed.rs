//! MQTT weather feed
//!
//! Connects to an MQTT broker and subscribes to a topic carrying JSON
//! weather observations. Observations are forwarded to the frame loop.

use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::WeatherObservation;
use crate::error::{Result, SkyError};
use crate::util::StopHandle;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "skyglass/weather";

/// Weather feed that receives observations on a background thread
pub struct WeatherFeed {
    receiver: Receiver<WeatherObservation>,
    stop: StopHandle,
    _thread: thread::JoinHandle<()>,
}

impl WeatherFeed {
    /// Connect to the broker and subscribe.
    /// Fails immediately if the connection cannot be established.
    pub fn connect(host: &str, port: u16, topic: &str, stop: StopHandle) -> Result<Self> {
        let topic = if topic.is_empty() { DEFAULT_TOPIC } else { topic };

        let mut options = MqttOptions::new("skyglass", host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(options, 10);

        client.subscribe(topic, QoS::AtMostOnce).map_err(|e| {
            SkyError::Feed(format!("failed to subscribe to topic '{}': {}", topic, e))
        })?;

        // Poll once so an unreachable broker fails fast
        match connection.iter().next() {
            Some(Ok(_)) => {},
            Some(Err(e)) => {
                return Err(SkyError::Feed(format!(
                    "failed to connect to MQTT broker at {}:{} - {}",
                    host, port, e
                )));
            },
            None => {
                return Err(SkyError::Feed(format!(
                    "failed to connect to MQTT broker at {}:{} - connection closed",
                    host, port
                )));
            },
        }

        let (sender, receiver) = mpsc::channel();
        let topic_owned = topic.to_string();
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("weather-feed".into())
            .spawn(move || {
                Self::message_loop(connection, sender, &topic_owned, &thread_stop);
            })?;

        info!(host, port, topic, "weather feed connected");

        Ok(Self {
            receiver,
            stop,
            _thread: handle,
        })
    }

    fn message_loop(
        mut connection: Connection,
        sender: Sender<WeatherObservation>,
        topic: &str,
        stop: &StopHandle,
    ) {
        for event in connection.iter() {
            if stop.is_stopped() {
                break;
            }
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic != topic {
                        continue;
                    }
                    let Some(obs) = parse_payload(&publish.payload) else {
                        continue;
                    };
                    if sender.send(obs).is_err() {
                        // Frame loop gone
                        break;
                    }
                },
                Ok(_) => {},
                Err(e) => {
                    // Keep going; rumqttc reconnects on the next iteration
                    error!("MQTT error: {}", e);
                },
            }
        }
        debug!("weather feed thread exiting");
    }

    /// Latest observation received since the last poll (non-blocking).
    /// Older observations are discarded.
    pub fn poll(&self) -> Option<WeatherObservation> {
        let mut latest = None;
        while let Ok(obs) = self.receiver.try_recv() {
            latest = Some(obs);
        }
        latest
    }

    /// Ask the background thread to exit after its next event
    pub fn stop(&self) {
        self.stop.stop();
    }
}

/// Decode one publish payload. Malformed payloads are logged and dropped.
fn parse_payload(payload: &[u8]) -> Option<WeatherObservation> {
    let text = std::str::from_utf8(payload).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    match WeatherObservation::from_json(text) {
        Ok(obs) => Some(obs.sanitized()),
        Err(e) => {
            warn!("ignoring malformed weather payload: {}", e);
            None
        },
    }
}
