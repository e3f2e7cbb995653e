//! Connector ke gateway WhatsApp Web (API gaya Evolution API).
//!
//! Gateway memegang socket WhatsApp-nya sendiri; relay ini hanya menyimpan
//! token instance sebagai kredensial dan mem-poll status koneksinya.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;

use super::SessionError;
use super::connector::{AuthState, Connection, ConnectionEvent, Connector, Link};
use super::event_channel;
use crate::models::session::{DisconnectReason, Identity};
use crate::utils::jid_number;

const CREDS_KEY: &str = "creds";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub instance: String,
    pub poll_interval: Duration,
    /// Batas waktu satu request HTTP ke gateway
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GatewayCreds {
    instance: String,
    token: String,
}

pub struct GatewayConnector {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayConnector {
    pub fn new(config: GatewayConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn stored_creds(&self, auth: &AuthState) -> Option<GatewayCreds> {
        let creds: GatewayCreds = serde_json::from_value(auth.get(CREDS_KEY)?.clone()).ok()?;
        (creds.instance == self.config.instance).then_some(creds)
    }

    async fn create_instance(&self) -> Result<GatewayCreds, SessionError> {
        let url = format!("{}/instance/create", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(&json!({
                "instanceName": self.config.instance,
                "qrcode": true,
                "integration": "WHATSAPP-BAILEYS",
            }))
            .send()
            .await?;

        let token = match check(resp).await {
            Ok(resp) => resp.json::<CreateResponse>().await?.hash.into_token(),
            // Instance sudah ada di gateway tapi token lokal hilang
            Err(SessionError::Gateway { status, .. }) if status == 403 || status == 409 => {
                log::warn!(
                    "Instance {} sudah ada, memakai API key global",
                    self.config.instance
                );
                None
            }
            Err(e) => return Err(e),
        };

        Ok(GatewayCreds {
            instance: self.config.instance.clone(),
            token: token.unwrap_or_else(|| self.config.api_key.clone()),
        })
    }
}

#[async_trait]
impl Connector for GatewayConnector {
    async fn connect(&self, auth: AuthState) -> Result<Connection, SessionError> {
        let (tx, rx) = event_channel();

        let creds = match self.stored_creds(&auth) {
            Some(creds) => creds,
            None => {
                log::info!("Kredensial belum ada, membuat instance {}", self.config.instance);
                let creds = self.create_instance().await?;
                let mut update = AuthState::new();
                update.insert(CREDS_KEY.to_string(), serde_json::to_value(&creds)?);
                let _ = tx.send(ConnectionEvent::CredsUpdate(update)).await;
                creds
            }
        };

        let api = GatewayApi {
            client: self.client.clone(),
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            instance: creds.instance,
            token: creds.token,
        };

        tokio::spawn(poll_connection(api.clone(), self.config.poll_interval, tx));

        Ok(Connection {
            link: Arc::new(api),
            events: rx,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    hash: CreateHash,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum CreateHash {
    Token(String),
    Keyed { apikey: String },
    #[default]
    Missing,
}

impl CreateHash {
    fn into_token(self) -> Option<String> {
        match self {
            CreateHash::Token(token) | CreateHash::Keyed { apikey: token } => Some(token),
            CreateHash::Missing => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    instance: InstanceState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceState {
    state: String,
    #[serde(default)]
    status_reason: Option<u16>,
}

impl InstanceState {
    fn close_reason(&self) -> DisconnectReason {
        self.status_reason
            .map(DisconnectReason::from_code)
            .unwrap_or(DisconnectReason::ConnectionClosed)
    }
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceInfo {
    #[serde(default)]
    owner_jid: Option<String>,
    #[serde(default)]
    profile_name: Option<String>,
}

#[derive(Clone)]
struct GatewayApi {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    token: String,
}

impl GatewayApi {
    async fn get(&self, path: &str) -> Result<reqwest::Response, SessionError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("apikey", &self.token)
            .send()
            .await?;
        check(resp).await
    }

    async fn connection_state(&self) -> Result<InstanceState, SessionError> {
        let path = format!("/instance/connectionState/{}", self.instance);
        Ok(self.get(&path).await?.json::<StateResponse>().await?.instance)
    }

    async fn pairing_code(&self) -> Result<Option<String>, SessionError> {
        let path = format!("/instance/connect/{}", self.instance);
        Ok(self.get(&path).await?.json::<ConnectResponse>().await?.code)
    }

    async fn identity(&self) -> Result<Identity, SessionError> {
        let path = format!("/instance/fetchInstances?instanceName={}", self.instance);
        let infos: Vec<InstanceInfo> = self.get(&path).await?.json().await?;

        let info = infos.into_iter().next().ok_or_else(|| {
            SessionError::Transport(format!("instance {} tidak ditemukan", self.instance))
        })?;

        Ok(Identity {
            id: info.owner_jid.unwrap_or_else(|| self.instance.clone()),
            name: info.profile_name,
        })
    }
}

#[async_trait]
impl Link for GatewayApi {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), SessionError> {
        let resp = self
            .client
            .post(format!("{}/message/sendText/{}", self.base_url, self.instance))
            .header("apikey", &self.token)
            .json(&json!({ "number": jid_number(jid), "text": text }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SessionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SessionError::Gateway {
        status: status.as_u16(),
        body,
    })
}

/// Terjemahkan status gateway menjadi event koneksi sampai koneksi tertutup
/// atau penerima event dilepas.
async fn poll_connection(
    api: GatewayApi,
    interval: Duration,
    tx: mpsc::Sender<ConnectionEvent>,
) {
    let mut opened = false;
    let mut last_qr: Option<String> = None;

    loop {
        let event = match api.connection_state().await {
            Ok(current) => match current.state.as_str() {
                "open" if !opened => match api.identity().await {
                    Ok(identity) => {
                        opened = true;
                        Some(ConnectionEvent::Open(identity))
                    }
                    Err(e) => {
                        log::warn!("Gagal membaca identitas akun: {}", e);
                        None
                    }
                },
                "close" if opened => Some(ConnectionEvent::Close(current.close_reason())),
                "close" if current.status_reason == Some(401) => {
                    Some(ConnectionEvent::Close(DisconnectReason::LoggedOut))
                }
                _ if !opened => match api.pairing_code().await {
                    Ok(Some(code)) if last_qr.as_deref() != Some(code.as_str()) => {
                        last_qr = Some(code.clone());
                        Some(ConnectionEvent::Qr(code))
                    }
                    Ok(_) => None,
                    Err(e) => {
                        log::warn!("Gagal mengambil QR: {}", e);
                        None
                    }
                },
                _ => None,
            },
            Err(SessionError::Gateway { status, .. }) if status == 401 || status == 404 => {
                Some(ConnectionEvent::Close(DisconnectReason::LoggedOut))
            }
            Err(e) => {
                log::warn!("Gateway tidak bisa dihubungi: {}", e);
                Some(ConnectionEvent::Close(DisconnectReason::ConnectionLost))
            }
        };

        if let Some(event) = event {
            let closing = matches!(event, ConnectionEvent::Close(_));
            if tx.send(event).await.is_err() || closing {
                return;
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(interval).await;
    }
}
