use crate::config::RelayConfig;
use crate::error::RelayError;
use agrimon_core::error::PublishError;
use agrimon_core::publish;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use utoipa::ToSchema;


const KEEP_ALIVE_SECS: u64 = 60;
const CLIENT_ID_PREFIX: &str = "agrimon-";
const REQUEST_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Mqtt,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Attempt {
    pub endpoint: String,
    pub transport: Transport,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayRequest {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayReport {
    pub delivered_via: Option<Transport>,
    pub attempts: Vec<Attempt>,
}

impl RelayReport {
    pub fn is_delivered(&self) -> bool {
        self.delivered_via.is_some()
    }

    /// Error of the last failed attempt.
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| a.error.as_deref())
    }
}

#[derive(Serialize)]
struct FallbackBody<'a> {
    topic: &'a str,
    message: &'a str,
}

/// Forwards one message to a field device's broker.
///
/// The primary attempt speaks MQTT over a fresh WebSocket connection:
/// CONNECT, wait for CONNACK, PUBLISH with QoS 0, linger, DISCONNECT. If
/// that fails the message is POSTed once to the broker host's HTTP endpoint.
pub struct Relay {
    config: RelayConfig,
    http: reqwest::Client,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.connect_timeout)
            .build()?;
        Ok(Relay { config, http })
    }

    pub fn default_topic(&self) -> &str {
        &self.config.default_topic
    }

    /// Delivers `request`, reporting every endpoint that was tried.
    ///
    /// Topic and payload are checked before any socket is opened, a request
    /// that cannot be published is rejected without a delivery attempt.
    #[tracing::instrument(skip(self, request), fields(host = %request.host, port = request.port))]
    pub async fn deliver(&self, request: &RelayRequest) -> Result<RelayReport, PublishError> {
        publish::validate_topic(&request.topic)?;
        publish::validate_payload(request.message.as_bytes())?;
        let host = normalize_host(&request.host);
        let mut attempts = Vec::with_capacity(2);

        let port = publish::candidate_port(request.port);
        let ws_endpoint = format!("ws://{}", endpoint(host, port));
        match self
            .publish_mqtt(&ws_endpoint, port, &request.topic, &request.message)
            .await
        {
            Ok(()) => {
                info!(endpoint = %ws_endpoint, topic = %request.topic, "Published message");
                attempts.push(Attempt {
                    endpoint: ws_endpoint,
                    transport: Transport::Mqtt,
                    error: None,
                });
                return Ok(RelayReport {
                    delivered_via: Some(Transport::Mqtt),
                    attempts,
                });
            }
            Err(e) => {
                warn!(endpoint = %ws_endpoint, "Primary delivery failed: {}", e);
                attempts.push(Attempt {
                    endpoint: ws_endpoint,
                    transport: Transport::Mqtt,
                    error: Some(e.to_string()),
                });
            }
        }

        let http_endpoint = format!(
            "http://{}{}",
            endpoint(host, self.config.fallback_port),
            self.config.fallback_path
        );
        match self
            .publish_http(&http_endpoint, &request.topic, &request.message)
            .await
        {
            Ok(()) => {
                info!(endpoint = %http_endpoint, "Delivered message over HTTP fallback");
                attempts.push(Attempt {
                    endpoint: http_endpoint,
                    transport: Transport::Http,
                    error: None,
                });
                Ok(RelayReport {
                    delivered_via: Some(Transport::Http),
                    attempts,
                })
            }
            Err(e) => {
                warn!(endpoint = %http_endpoint, "Fallback delivery failed: {}", e);
                attempts.push(Attempt {
                    endpoint: http_endpoint,
                    transport: Transport::Http,
                    error: Some(e.to_string()),
                });
                Ok(RelayReport {
                    delivered_via: None,
                    attempts,
                })
            }
        }
    }

    async fn publish_mqtt(
        &self,
        url: &str,
        port: u16,
        topic: &str,
        message: &str,
    ) -> Result<(), RelayError> {
        let mut options = MqttOptions::new(generate_client_id(), url, port);
        options
            .set_transport(rumqttc::Transport::Ws)
            .set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS))
            .set_clean_session(true);
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        // socket, websocket upgrade, CONNECT and CONNACK happen in the first poll
        match timeout(self.config.connect_timeout, eventloop.poll()).await {
            Err(_) => return Err(RelayError::ConnectTimeout(url.to_owned())),
            Ok(Err(e)) => return Err(connection_error(url, e)),
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {}
            Ok(Ok(other)) => {
                return Err(RelayError::UnexpectedResponse(format!(
                    "expected CONNACK, got {:?}",
                    other
                )))
            }
        }
        debug!(endpoint = %url, "Broker acknowledged connection");

        client
            .publish(topic, QoS::AtMostOnce, false, message.as_bytes().to_vec())
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        timeout(
            self.config.response_timeout,
            poll_until(&mut eventloop, |o| matches!(o, Outgoing::Publish(_))),
        )
        .await
        .map_err(|_| RelayError::PublishTimeout(url.to_owned()))?
        .map_err(|e| connection_error(url, e))?;

        // QoS 0 has no confirmation, give the broker time to route it
        tokio::time::sleep(self.config.linger).await;
        if let Err(e) = client.disconnect().await {
            debug!("Failed queueing DISCONNECT: {}", e);
            return Ok(());
        }
        match timeout(
            self.config.response_timeout,
            poll_until(&mut eventloop, |o| matches!(o, Outgoing::Disconnect)),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Failed sending DISCONNECT: {}", e),
            Err(_) => debug!("Sending DISCONNECT timed out"),
        }
        Ok(())
    }

    async fn publish_http(&self, url: &str, topic: &str, message: &str) -> Result<(), RelayError> {
        let resp = self
            .http
            .post(url)
            .json(&FallbackBody { topic, message })
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(RelayError::HttpStatus(resp.status().as_u16()))
        }
    }
}

/// Drives the event loop until it has written the wanted outgoing packet.
async fn poll_until<F>(eventloop: &mut EventLoop, wanted: F) -> Result<(), ConnectionError>
where
    F: Fn(&Outgoing) -> bool,
{
    loop {
        if let Event::Outgoing(outgoing) = eventloop.poll().await? {
            if wanted(&outgoing) {
                return Ok(());
            }
        }
    }
}

fn connection_error(url: &str, err: ConnectionError) -> RelayError {
    match err {
        ConnectionError::Io(e) if e.kind() == ErrorKind::ConnectionRefused => {
            RelayError::ConnectRefused(url.to_owned())
        }
        ConnectionError::NetworkTimeout => RelayError::ConnectTimeout(url.to_owned()),
        ConnectionError::ConnectionRefused(code) => RelayError::Rejected(code),
        ConnectionError::NotConnAck(packet) => {
            RelayError::UnexpectedResponse(format!("expected CONNACK, got {:?}", packet))
        }
        other => RelayError::Transport(other.to_string()),
    }
}

/// Strips a scheme and anything after the authority from user input.
pub fn normalize_host(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_scheme = match trimmed.find("://") {
        Some(idx) => &trimmed[idx + 3..],
        None => trimmed,
    };
    let authority = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme);
    if authority.starts_with('[') {
        return authority.trim_start_matches('[').split(']').next().unwrap_or(authority);
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            host
        }
        _ => authority,
    }
}

fn endpoint(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn generate_client_id() -> String {
    use rand::distributions::{Alphanumeric, DistString};
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 6);
    format!("{}{}", CLIENT_ID_PREFIX, suffix)
}
