//! Role classification and the in-process session table.
//!
//! Identities never reach the database. A login hands out an opaque token
//! that the client carries in the `feedback_session` cookie, and every
//! request resolves that token into a [`Viewer`].

use crate::errors::FeedbackError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use rand::RngCore;
use std::{
    collections::{HashMap, VecDeque},
    convert::Infallible,
    sync::Arc,
};
use tokio::sync::Mutex;

pub const SESSION_COOKIE: &str = "feedback_session";
pub const ADMIN_ID: &str = "admin";
const MIN_USER_ID_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Admin,
    User(String),
}

impl Identity {
    pub fn role(&self) -> &'static str {
        match self {
            Identity::Admin => "admin",
            Identity::User(_) => "user",
        }
    }

    /// The id recorded in the vote ledger.
    pub fn id(&self) -> &str {
        match self {
            Identity::Admin => ADMIN_ID,
            Identity::User(id) => id,
        }
    }
}

pub fn classify(raw: &str) -> Result<Identity, FeedbackError> {
    let id = raw.trim();
    if id == ADMIN_ID {
        return Ok(Identity::Admin);
    }
    if id.len() >= MIN_USER_ID_LEN && id.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(Identity::User(id.to_string()));
    }
    Err(FeedbackError::validation(
        "Enter 'admin' or a numeric ID with at least 5 digits.",
    ))
}

const MAX_SESSIONS: usize = 10_000;

#[derive(Default)]
struct SessionTable {
    by_token: HashMap<String, Identity>,
    // login order, oldest first
    order: VecDeque<String>,
}

impl SessionTable {
    fn remove(&mut self, token: &str) -> Option<Identity> {
        let identity = self.by_token.remove(token)?;
        self.order.retain(|existing| existing != token);
        Some(identity)
    }
}

/// Token to identity table. One live token per identity, and at most
/// `capacity` tokens overall; the oldest login is evicted first.
#[derive(Clone)]
pub struct Sessions {
    inner: Arc<Mutex<SessionTable>>,
    capacity: usize,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl Sessions {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionTable::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn login(&self, identity: Identity) -> String {
        let token = new_token();
        let mut table = self.inner.lock().await;

        let stale: Vec<String> = table
            .by_token
            .iter()
            .filter(|(_, existing)| **existing == identity)
            .map(|(token, _)| token.clone())
            .collect();
        for token in stale {
            table.remove(&token);
        }

        while table.by_token.len() >= self.capacity {
            let Some(oldest) = table.order.pop_front() else {
                break;
            };
            table.by_token.remove(&oldest);
        }

        table.by_token.insert(token.clone(), identity);
        table.order.push_back(token.clone());
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<Identity> {
        self.inner.lock().await.by_token.get(token).cloned()
    }

    pub async fn logout(&self, token: &str) -> Option<Identity> {
        self.inner.lock().await.remove(token)
    }

    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.by_token.len()
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
}

pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The identity behind the current request, if any.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Identity>);

impl Viewer {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    pub fn require_admin(&self) -> Result<(), FeedbackError> {
        match self.0 {
            Some(Identity::Admin) => Ok(()),
            _ => Err(FeedbackError::Forbidden),
        }
    }

    /// Returns the voter id for any logged-in viewer.
    pub fn require_identified(&self) -> Result<&str, FeedbackError> {
        self.0
            .as_ref()
            .map(Identity::id)
            .ok_or(FeedbackError::Unauthenticated)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = match session_token(&parts.headers) {
            Some(token) => state.sessions.resolve(&token).await,
            None => None,
        };
        Ok(Viewer(identity))
    }
}
