//! NetworkSink - UDP fire-and-forget streaming of envelopes

use std::collections::HashMap;
use std::net::SocketAddr;

use contracts::{ContractError, DataSink, Envelope};
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Largest UDP payload we try to send by default
const DEFAULT_MAX_PACKET: usize = 65000;

/// Wire encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    #[default]
    Json,
    Bincode,
}

#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Envelopes encoding larger than this are rejected, not fragmented
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;
        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{addr_str}': {e}"))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{other}'")),
        };

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_PACKET);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Sink that streams envelopes over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&config.addr).await?;
        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config =
            NetworkSinkConfig::from_params(params).map_err(|e| ContractError::SinkConnection {
                sink_name: name.clone(),
                message: e,
            })?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ContractError> {
        let data = match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(envelope).map_err(|e| e.to_string()),
            NetworkFormat::Bincode => bincode::serialize(envelope).map_err(|e| e.to_string()),
        }
        .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                topic = %envelope.topic,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, not sent"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "{} byte packet exceeds {} byte limit",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "network_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, topic = %envelope.topic)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket closed"))?;
        let data = self.encode(envelope)?;

        // best effort: a lost datagram is not a sink failure
        match socket.send(&data).await {
            Ok(sent) => debug!(sink = %self.name, bytes = sent, "Sent"),
            Err(e) => error!(sink = %self.name, error = %e, "UDP send failed"),
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        Header, ImageEncoding, ImageMessage, InterruptLevel, InterruptMessage, Message,
        IMAGE_HEIGHT, IMAGE_PIXELS, IMAGE_WIDTH,
    };

    async fn sink_to(addr: SocketAddr, format: NetworkFormat) -> NetworkSink {
        let config = NetworkSinkConfig {
            addr,
            format,
            max_packet_size: DEFAULT_MAX_PACKET,
        };
        NetworkSink::new("test_net", config).await.unwrap()
    }

    fn interrupt() -> Envelope {
        Envelope::new(
            "uav_nav/signal_interrupt",
            Message::Interrupt(InterruptMessage::now(InterruptLevel::Proximity)),
        )
    }

    #[test]
    fn test_config_parsing() {
        let mut params = HashMap::new();
        params.insert("addr".to_string(), "127.0.0.1:9999".to_string());
        params.insert("format".to_string(), "bincode".to_string());

        let config = NetworkSinkConfig::from_params(&params).unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.max_packet_size, DEFAULT_MAX_PACKET);

        params.insert("format".to_string(), "xml".to_string());
        assert!(NetworkSinkConfig::from_params(&params).is_err());
    }

    #[tokio::test]
    async fn test_interrupt_reaches_receiver_as_json() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut sink = sink_to(receiver.local_addr().unwrap(), NetworkFormat::Json).await;

        sink.write(&interrupt()).await.unwrap();

        let mut buf = vec![0u8; 2048];
        let n = receiver.recv(&mut buf).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(value["topic"], "uav_nav/signal_interrupt");
        assert_eq!(value["message"]["level"], "proximity");
    }

    #[tokio::test]
    async fn test_full_frame_exceeds_packet_limit() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut sink = sink_to(receiver.local_addr().unwrap(), NetworkFormat::Bincode).await;
        let frame = Envelope::new(
            "uav_nav/guidance/left_image",
            Message::Image(ImageMessage {
                header: Header::now("front"),
                width: IMAGE_WIDTH,
                height: IMAGE_HEIGHT,
                encoding: ImageEncoding::Mono8,
                data: vec![0u8; IMAGE_PIXELS].into(),
            }),
        );

        let err = sink.write(&frame).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let mut sink = sink_to("127.0.0.1:19998".parse().unwrap(), NetworkFormat::Json).await;
        sink.close().await.unwrap();
        assert!(sink.write(&interrupt()).await.is_err());
    }
}
