// src/session/connector.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::SessionError;
use crate::models::session::{DisconnectReason, Identity};

/// Kredensial sesi, satu entri per file yang disimpan.
pub type AuthState = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// QR pairing yang harus di-scan operator
    Qr(String),
    Open(Identity),
    CredsUpdate(AuthState),
    Close(DisconnectReason),
}

/// Sisi kirim dari koneksi yang sudah terbuka.
#[async_trait]
pub trait Link: Send + Sync {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), SessionError>;
}

pub struct Connection {
    pub link: Arc<dyn Link>,
    pub events: mpsc::Receiver<ConnectionEvent>,
}

/// Membuka satu percobaan koneksi ke jaringan WhatsApp.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, auth: AuthState) -> Result<Connection, SessionError>;
}
