//! One-shot MQTT publish for `cb-cli test -topic`.

use std::time::{Duration, Instant};

use rumqttc::{Client, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use tracing::debug;

use crate::error::{Error, Result};

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Broker address and credentials: the developer token as username and the
/// system key as password.
#[derive(Debug, Clone)]
pub struct Broker {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub system_key: String,
}

/// Publishes `payload` to `topic` at QoS 1 and waits for the broker's
/// acknowledgement, up to `timeout`.
pub fn publish(broker: &Broker, topic: &str, payload: &[u8], timeout: Duration) -> Result<()> {
    let client_id = format!("cb-cli-{}", uuid::Uuid::new_v4().simple());
    let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
    options.set_credentials(broker.token.clone(), broker.system_key.clone());
    options.set_keep_alive(KEEP_ALIVE);

    let (client, mut connection) = Client::new(options, 10);
    client
        .publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
        .map_err(|e| Error::Transport(format!("mqtt publish: {e}")))?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Transport(format!(
                "no acknowledgement from {}:{} within {}s",
                broker.host,
                broker.port,
                timeout.as_secs()
            )));
        }

        match connection.recv_timeout(remaining) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                if ack.code != ConnectReturnCode::Success {
                    return Err(Error::AuthFailure(format!("broker refused connection: {:?}", ack.code)));
                }
                debug!("connected to broker");
            }
            Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => break,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(Error::Transport(format!("mqtt: {e}"))),
            Err(_) => continue,
        }
    }

    client
        .disconnect()
        .map_err(|e| Error::Transport(format!("mqtt disconnect: {e}")))?;
    Ok(())
}
