use std::collections::VecDeque;
use std::time::Duration;

use rumqttc::v5::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions,
    mqttbytes::QoS,
    mqttbytes::v5::{ConnectReturnCode, Packet},
};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, warn};

use telenode::command::CommandMessage;
use telenode::error::{Error, ErrorKind};
use telenode::session::{ConnectRequest, Connection, Transport};

// The capacity of the bounded asynchronous channels.
const ASYNC_CHANNEL_CAPACITY: usize = 10;

// Keep alive time to send `pingreq` to broker when the connection is idle.
const KEEP_ALIVE_TIME: Duration = Duration::from_secs(5);

// What the network task reports to the control loop.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Connected,
    Refused,
    Message(CommandMessage),
    Lost,
}

#[inline]
fn classify(event: &Result<Event, ConnectionError>) -> Option<Inbound> {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            error!("Connection error: {e}");
            return Some(Inbound::Lost);
        }
    };

    let Event::Incoming(packet) = event else {
        return None;
    };

    match packet {
        Packet::ConnAck(ack) if ack.code == ConnectReturnCode::Success => Some(Inbound::Connected),
        Packet::ConnAck(ack) => {
            warn!("Connection refused by the broker: {:?}", ack.code);
            Some(Inbound::Refused)
        }
        Packet::Publish(publish) => Some(Inbound::Message(CommandMessage::new(
            String::from_utf8_lossy(&publish.topic),
            String::from_utf8_lossy(&publish.payload),
        ))),
        Packet::Disconnect(_) => Some(Inbound::Lost),
        packet => {
            debug!("Packet ignored: {packet:?}");
            None
        }
    }
}

async fn run_network_task(
    client: AsyncClient,
    mut eventloop: EventLoop,
    cancellation_token: CancellationToken,
    sender: mpsc::Sender<Inbound>,
) {
    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            // Poll the `MQTT` event coming from the network
            event = eventloop.poll() => {
                let Some(inbound) = classify(&event) else {
                    continue;
                };
                // The engine decides when to reconnect.
                let last = matches!(inbound, Inbound::Lost | Inbound::Refused);

                if let Err(e) = sender.send(inbound).await {
                    debug!("Stop forwarding network events: {e}");
                    break;
                }
                if last {
                    break;
                }
            }
        }
    }
    drop(sender);
    drop(eventloop);
    drop(client);
}

struct Session {
    client: AsyncClient,
    receiver: mpsc::Receiver<Inbound>,
    cancellation_token: CancellationToken,
}

/// An `MQTT` v5 [`Transport`].
///
/// The network is driven by a task spawned on the given runtime for each
/// session, the control loop only exchanges messages with it.
pub struct MqttTransport {
    runtime: Handle,
    session: Option<Session>,
    connection: Connection,
    inbound: VecDeque<CommandMessage>,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("connection", &self.connection)
            .field("inbound", &self.inbound.len())
            .finish_non_exhaustive()
    }
}

impl MqttTransport {
    /// Creates a [`MqttTransport`] spawning its network tasks on `runtime`.
    #[must_use]
    pub const fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            session: None,
            connection: Connection::Down,
            inbound: VecDeque::new(),
        }
    }

    // Moves what the network task reported into the transport state.
    fn pump(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        loop {
            match session.receiver.try_recv() {
                Ok(Inbound::Connected) => self.connection = Connection::Up,
                Ok(Inbound::Message(message)) => self.inbound.push_back(message),
                Ok(Inbound::Refused | Inbound::Lost) => {
                    self.connection = Connection::Down;
                    break;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.connection = Connection::Down;
                    break;
                }
            }
        }
    }

    fn client(&self) -> Result<&AsyncClient, Error> {
        self.session
            .as_ref()
            .map(|session| &session.client)
            .ok_or_else(|| Error::new(ErrorKind::Session, "no session"))
    }
}

fn session_error(e: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::Session, e.to_string())
}

impl Transport for MqttTransport {
    type Error = Error;

    fn connect(&mut self, request: &ConnectRequest<'_>) -> Result<(), Self::Error> {
        self.disconnect();

        let broker = request.broker;
        let mut mqttoptions =
            MqttOptions::new(request.client_id, broker.host.as_str(), broker.port);
        let _ = mqttoptions
            .set_keep_alive(KEEP_ALIVE_TIME)
            .set_clean_start(true);
        if let Some(login) = &broker.login {
            let _ = mqttoptions.set_credentials(login.username.as_str(), login.password.as_str());
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, ASYNC_CHANNEL_CAPACITY);
        let (sender, receiver) = mpsc::channel(ASYNC_CHANNEL_CAPACITY);
        let cancellation_token = CancellationToken::new();

        drop(self.runtime.spawn(run_network_task(
            client.clone(),
            eventloop,
            cancellation_token.clone(),
            sender,
        )));

        self.session = Some(Session {
            client,
            receiver,
            cancellation_token,
        });
        self.connection = Connection::Pending;
        Ok(())
    }

    fn connection(&mut self) -> Connection {
        self.pump();
        self.connection
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.client.try_disconnect() {
                debug!("Disconnect request not sent: {e}");
            }
            session.cancellation_token.cancel();
        }
        self.connection = Connection::Down;
        self.inbound.clear();
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client()?
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(session_error)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        self.client()?
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(session_error)
    }

    fn receive(&mut self) -> Option<CommandMessage> {
        self.pump();
        self.inbound.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use rumqttc::v5::{
        ConnectionError, Event,
        mqttbytes::QoS,
        mqttbytes::v5::{ConnAck, ConnectReturnCode, Packet, Publish},
    };

    use telenode::command::CommandMessage;
    use telenode::session::{Connection, Transport};

    use super::{Inbound, MqttTransport, classify};

    fn connack(code: ConnectReturnCode) -> Result<Event, ConnectionError> {
        Ok(Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code,
            properties: None,
        })))
    }

    #[test]
    fn connection_acknowledgements() {
        assert_eq!(
            classify(&connack(ConnectReturnCode::Success)),
            Some(Inbound::Connected)
        );
        assert_eq!(
            classify(&connack(ConnectReturnCode::NotAuthorized)),
            Some(Inbound::Refused)
        );
    }

    #[test]
    fn published_messages_become_commands() {
        let publish = Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: Bytes::from_static(b"iot-cybot/node1/cmd"),
            pkid: 0,
            payload: Bytes::from_static(b"restart"),
            properties: None,
        };

        assert_eq!(
            classify(&Ok(Event::Incoming(Packet::Publish(publish)))),
            Some(Inbound::Message(CommandMessage::new(
                "iot-cybot/node1/cmd",
                "restart"
            )))
        );
    }

    #[test]
    fn connection_errors_end_the_session() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");

        assert_eq!(
            classify(&Err(ConnectionError::Io(io))),
            Some(Inbound::Lost)
        );
    }

    #[tokio::test]
    async fn without_session_nothing_is_sent() {
        let mut transport = MqttTransport::new(tokio::runtime::Handle::current());

        assert_eq!(transport.connection(), Connection::Down);
        assert!(transport.publish("iot-cybot/node1/data", b"{}").is_err());
        assert!(transport.subscribe("iot-cybot/node1/cmd").is_err());
        assert_eq!(transport.receive(), None);
    }
}
