use anyhow::{Context, Result};
use log::{debug, warn};
use rumqttc::{Client, Event, MqttOptions, Outgoing, QoS};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::present::{Frame, Presenter};
use crate::pulse::Marker;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 10;

/// Publishes dashboard frames as retained JSON on the configured topic and
/// marker pulses on `<topic>/marker`. Publishing never blocks: while the
/// broker is unreachable and the request queue is full, messages are dropped.
pub struct MqttPresenter {
    client: Client,
    topic: String,
    marker_topic: String,
}

impl MqttPresenter {
    /// Connect to the broker. The event loop is driven on its own thread,
    /// which keeps reconnecting after connection errors.
    pub fn connect(config: &Config, host: &str) -> Result<Self> {
        let mut opts = MqttOptions::new(&config.mqtt_client_id, host, config.mqtt_port);
        opts.set_keep_alive(Duration::from_secs(60));

        let (client, mut connection) = Client::new(opts, REQUEST_CAPACITY);
        let broker = format!("{}:{}", host, config.mqtt_port);

        thread::Builder::new()
            .name("mqtt-eventloop".into())
            .spawn(move || {
                for event in connection.iter() {
                    match event {
                        Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                            debug!("Published to {}", broker);
                        }
                        Err(e) => {
                            warn!("MQTT connection error on {}: {}", broker, e);
                            thread::sleep(RECONNECT_DELAY);
                        }
                        _ => continue,
                    }
                }
            })
            .context("Failed to spawn MQTT event loop")?;

        Ok(Self::with_client(client, &config.mqtt_topic))
    }

    fn with_client(client: Client, topic: &str) -> Self {
        Self {
            client,
            topic: topic.to_string(),
            marker_topic: format!("{}/marker", topic),
        }
    }

    fn publish(&self, topic: &str, payload: String, retain: bool) {
        if let Err(e) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.into_bytes())
        {
            warn!("Dropped MQTT publish on {}: {}", topic, e);
        }
    }
}

impl Presenter for MqttPresenter {
    fn show_frame(&self, frame: &Frame) -> Result<()> {
        let payload = serde_json::to_string(frame).context("Failed to serialize frame to JSON")?;
        self.publish(&self.topic, payload, true);
        Ok(())
    }

    fn show_marker(&self, marker: Option<&Marker>) -> Result<()> {
        let payload =
            serde_json::to_string(&marker).context("Failed to serialize marker to JSON")?;
        self.publish(&self.marker_topic, payload, false);
        Ok(())
    }
}
