//! Sesi WhatsApp: satu koneksi keluar per proses, dijaga tetap hidup.
//!
//! [`SessionManager::run`] menjalankan siklus koneksi:
//! Initializing -> AwaitingScan (QR) -> Open -> Closed, lalu reconnect
//! kecuali alasan putusnya logout. Logout bersifat final sampai proses restart.

pub mod auth_store;
pub mod connector;
pub mod gateway;
pub mod reconnect;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qrcode::QrCode;
use qrcode::render::unicode;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, watch};

use crate::models::session::{DisconnectReason, Identity, SessionState, SessionStatus};
use auth_store::AuthStore;
use connector::{Connection, ConnectionEvent, Connector, Link};
use reconnect::ReconnectPolicy;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("WhatsApp belum terhubung")]
    NotConnected,

    #[error("Pengiriman melebihi batas waktu {0:?}")]
    Timeout(Duration),

    #[error("Gagal mengirim pesan: {0}")]
    Transport(String),

    #[error("Gateway membalas {status}: {body}")]
    Gateway { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Antarmuka sesi yang dipakai lapisan HTTP.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    fn state(&self) -> SessionState;

    fn subscribe(&self) -> watch::Receiver<SessionState>;

    async fn send(&self, jid: &str, text: &str) -> Result<(), SessionError>;
}

pub struct SessionManager {
    state: watch::Sender<SessionState>,
    link: RwLock<Option<Arc<dyn Link>>>,
    auth: AuthStore,
    connector: Arc<dyn Connector>,
    policy: Arc<dyn ReconnectPolicy>,
    send_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        auth: AuthStore,
        connector: Arc<dyn Connector>,
        policy: Arc<dyn ReconnectPolicy>,
        send_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::initializing());
        Self {
            state,
            link: RwLock::new(None),
            auth,
            connector,
            policy,
            send_timeout,
        }
    }

    /// Loop koneksi; selesai hanya saat logout atau kebijakan reconnect menyerah.
    pub async fn run(self: Arc<Self>) {
        let mut attempt: u32 = 0;

        loop {
            self.set_status(SessionStatus::Initializing, None);

            let (reason, opened) = match self.connect_once().await {
                Ok(connection) => self.drive(connection).await,
                Err(e) => {
                    log::error!("Gagal membuka koneksi WhatsApp: {}", e);
                    (DisconnectReason::ConnectionLost, false)
                }
            };

            *self.link.write().await = None;

            if reason.is_terminal() {
                log::warn!(
                    "WhatsApp logout. Hapus folder {} lalu restart bot untuk scan ulang.",
                    self.auth.dir().display()
                );
                self.set_status(SessionStatus::LoggedOut, None);
                return;
            }

            if opened {
                attempt = 0;
            }
            attempt += 1;

            match self.policy.next_delay(attempt) {
                Some(delay) => {
                    self.set_status(SessionStatus::Closed, None);
                    log::info!(
                        "Koneksi tertutup (kode {}), reconnect ke-{} dalam {:?}...",
                        reason.code(),
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    self.set_status(SessionStatus::Closed, None);
                    log::error!("Reconnect dihentikan setelah {} percobaan", attempt - 1);
                    return;
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<Connection, SessionError> {
        let creds = self.auth.load().await?;
        log::info!("Menghubungkan ke WhatsApp ({} file kredensial)...", creds.len());
        self.connector.connect(creds).await
    }

    /// Proses event satu koneksi sampai tertutup. Mengembalikan alasan putus
    /// dan apakah koneksi sempat terbuka.
    async fn drive(&self, connection: Connection) -> (DisconnectReason, bool) {
        let Connection { link, mut events } = connection;
        *self.link.write().await = Some(link);
        let mut opened = false;

        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::Qr(payload) => {
                    self.set_status(SessionStatus::AwaitingScan, None);
                    print_qr(&payload);
                }
                ConnectionEvent::Open(identity) => {
                    log::info!("WhatsApp terhubung sebagai {}", identity.id);
                    opened = true;
                    self.set_status(SessionStatus::Open, Some(identity));
                }
                ConnectionEvent::CredsUpdate(update) => {
                    if let Err(e) = self.auth.save(&update).await {
                        log::error!("Gagal menyimpan kredensial: {}", e);
                    }
                }
                ConnectionEvent::Close(reason) => {
                    self.set_status(SessionStatus::Closed, None);
                    return (reason, opened);
                }
            }
        }

        (DisconnectReason::ConnectionLost, opened)
    }

    fn set_status(&self, status: SessionStatus, identity: Option<Identity>) {
        self.state.send_modify(|state| {
            if state.status != status {
                log::debug!("Status sesi: {:?} -> {:?}", state.status, status);
            }
            state.status = status;
            state.identity = identity;
        });
    }
}

#[async_trait]
impl SessionHandle for SessionManager {
    fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    async fn send(&self, jid: &str, text: &str) -> Result<(), SessionError> {
        let open = self.state.borrow().is_open();
        if !open {
            return Err(SessionError::NotConnected);
        }

        let link = self
            .link
            .read()
            .await
            .clone()
            .ok_or(SessionError::NotConnected)?;

        tokio::time::timeout(self.send_timeout, link.send_text(jid, text))
            .await
            .map_err(|_| SessionError::Timeout(self.send_timeout))?
    }
}

fn print_qr(payload: &str) {
    log::info!("Scan QR berikut dari aplikasi WhatsApp (Perangkat tertaut):");
    log::debug!("QR payload: {}", payload);

    match QrCode::new(payload.as_bytes()) {
        Ok(code) => {
            let image = code
                .render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark)
                .build();
            println!("{}", image);
        }
        Err(e) => {
            log::warn!("QR tidak bisa dirender ({}), payload mentah: {}", e, payload);
        }
    }
}

/// Channel event untuk connector buatan sendiri.
pub fn event_channel() -> (mpsc::Sender<ConnectionEvent>, mpsc::Receiver<ConnectionEvent>) {
    mpsc::channel(32)
}
