/*!
Broker MQTT 3.1.1 minimal pour tester le transport des cibles sans mosquitto

- écoute sur 127.0.0.1, port libre choisi par l'OS
- répond CONNACK / SUBACK / PUBACK / PINGRESP
- enregistre les abonnements et les publish reçus
- peut publier vers les clients connectés et couper leurs connexions
*/

use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use symbion_inspector::config::MqttConf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

const CONNECT: u8 = 1;
const PUBLISH: u8 = 3;
const SUBSCRIBE: u8 = 8;
const PINGREQ: u8 = 12;
const DISCONNECT: u8 = 14;

/// Publish reçu d'un client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPublish {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
enum Outbound {
    Packet(Vec<u8>),
    Kick,
}

#[derive(Clone)]
pub struct FakeBroker {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    published: Arc<Mutex<Vec<ReceivedPublish>>>,
    outbound: broadcast::Sender<Outbound>,
}

impl FakeBroker {
    pub async fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let (outbound, _) = broadcast::channel(256);
        let broker = Self {
            addr: listener.local_addr()?,
            connections: Arc::new(AtomicUsize::new(0)),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            published: Arc::new(Mutex::new(Vec::new())),
            outbound,
        };

        let acceptor = broker.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let session = acceptor.clone();
                tokio::spawn(async move {
                    if let Err(e) = session.serve(stream).await {
                        tracing::debug!("[BROKER] session ended: {}", e);
                    }
                });
            }
        });

        Ok(broker)
    }

    /// Configuration client pointant sur ce broker
    pub fn mqtt_conf(&self, client_id: &str) -> MqttConf {
        MqttConf {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            client_id: client_id.to_string(),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Nombre de CONNECT reçus depuis le démarrage
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Nombre d'abonnements reçus pour ce topic (un par connexion)
    pub fn subscription_count(&self, topic: &str) -> usize {
        self.subscriptions.lock().iter().filter(|t| *t == topic).count()
    }

    pub fn published(&self) -> Vec<ReceivedPublish> {
        self.published.lock().clone()
    }

    /// Publish reçus dont le topic commence par `prefix`
    pub fn published_on(&self, prefix: &str) -> Vec<ReceivedPublish> {
        self.published
            .lock()
            .iter()
            .filter(|p| p.topic.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Envoie un publish QoS 0 à tous les clients connectés
    pub fn publish(&self, topic: &str, payload: &[u8]) {
        let _ = self.outbound.send(Outbound::Packet(encode_publish(topic, payload)));
    }

    /// Ferme toutes les connexions en cours (le client doit se reconnecter)
    pub fn kick_clients(&self) {
        let _ = self.outbound.send(Outbound::Kick);
    }

    async fn serve(&self, stream: TcpStream) -> io::Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let mut outbound = self.outbound.subscribe();
        let (reply_tx, mut replies) = mpsc::unbounded_channel::<Vec<u8>>();

        let session = self.clone();
        let read_task = tokio::spawn(async move {
            loop {
                let (header, body) = match read_packet(&mut reader).await {
                    Ok(packet) => packet,
                    Err(_) => return,
                };
                match session.handle_packet(header, &body) {
                    Some(Ok(reply)) => {
                        if reply_tx.send(reply).is_err() {
                            return;
                        }
                    }
                    Some(Err(())) => return,
                    None => {}
                }
            }
        });

        let result = write_loop(&mut writer, &mut replies, &mut outbound).await;
        read_task.abort();
        result
    }

    /// `None` : rien à répondre, `Some(Err)` : le client se déconnecte
    fn handle_packet(&self, header: u8, body: &[u8]) -> Option<Result<Vec<u8>, ()>> {
        match header >> 4 {
            CONNECT => {
                self.connections.fetch_add(1, Ordering::SeqCst);
                Some(Ok(vec![0x20, 0x02, 0x00, 0x00]))
            }
            PUBLISH => {
                let qos = (header >> 1) & 0x03;
                let (topic, mut rest) = read_string(body)?;
                let mut reply = None;
                if qos > 0 {
                    let id = rest.get(..2)?.to_vec();
                    rest = &rest[2..];
                    reply = Some(Ok(vec![0x40, 0x02, id[0], id[1]]));
                }
                self.published.lock().push(ReceivedPublish { topic, payload: rest.to_vec() });
                reply
            }
            SUBSCRIBE => {
                let id = body.get(..2)?;
                let mut rest = &body[2..];
                let mut granted = Vec::new();
                while !rest.is_empty() {
                    let (topic, after) = read_string(rest)?;
                    let qos = *after.first()?;
                    rest = &after[1..];
                    self.subscriptions.lock().push(topic);
                    granted.push(qos.min(1));
                }
                let mut packet = vec![0x90];
                encode_remaining_length(2 + granted.len(), &mut packet);
                packet.extend_from_slice(id);
                packet.extend(granted);
                Some(Ok(packet))
            }
            PINGREQ => Some(Ok(vec![0xD0, 0x00])),
            DISCONNECT => Some(Err(())),
            _ => None,
        }
    }
}

async fn write_loop(
    writer: &mut OwnedWriteHalf,
    replies: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: &mut broadcast::Receiver<Outbound>,
) -> io::Result<()> {
    loop {
        tokio::select! {
            reply = replies.recv() => match reply {
                Some(bytes) => writer.write_all(&bytes).await?,
                None => return Ok(()),
            },
            msg = outbound.recv() => match msg {
                Ok(Outbound::Packet(bytes)) => writer.write_all(&bytes).await?,
                Ok(Outbound::Kick) => return Ok(()),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<(u8, Vec<u8>)> {
    let header = reader.read_u8().await?;
    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8().await?;
        len |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    reader.read_exact(&mut body).await?;
    Ok((header, body))
}

fn read_string(buf: &[u8]) -> Option<(String, &[u8])> {
    let len = u16::from_be_bytes([*buf.first()?, *buf.get(1)?]) as usize;
    let raw = buf.get(2..2 + len)?;
    Some((String::from_utf8_lossy(raw).into_owned(), &buf[2 + len..]))
}

fn encode_remaining_length(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

fn encode_publish(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + topic.len() + payload.len());
    body.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    body.extend_from_slice(topic.as_bytes());
    body.extend_from_slice(payload);

    let mut packet = vec![0x30];
    encode_remaining_length(body.len(), &mut packet);
    packet.extend(body);
    packet
}
