use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::DuelState;

/// 存档最长保留 24 小时。
pub const SESSION_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// 进行中的对局存档，用于刷新后恢复。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelSession {
    pub state: DuelState,
    pub opponent_id: u32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode session: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode session: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("session is {age_ms} ms old")]
    Expired { age_ms: u64 },
}

impl DuelSession {
    pub fn new(state: DuelState, opponent_id: u32, timestamp_ms: u64) -> Self {
        Self {
            state,
            opponent_id,
            timestamp_ms,
        }
    }

    pub fn encode(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(SessionError::Encode)
    }

    pub fn decode(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json).map_err(SessionError::Decode)
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.age_ms(now_ms) > SESSION_MAX_AGE_MS
    }

    /// 解码存档，超过一天的存档视为失效。
    pub fn restore(json: &str, now_ms: u64) -> Result<Self, SessionError> {
        let session = Self::decode(json)?;
        if session.is_expired(now_ms) {
            return Err(SessionError::Expired {
                age_ms: session.age_ms(now_ms),
            });
        }
        Ok(session)
    }
}

/// 存档后端。浏览器端由宿主提供，测试和原生环境使用内存实现。
pub trait SessionStore {
    fn save(&mut self, session: &DuelSession) -> Result<(), SessionError>;

    /// 过期或无法解析的存档会被清除，并按不存在处理。
    fn load(&mut self, now_ms: u64) -> Option<DuelSession>;

    fn clear(&mut self);

    fn has_session(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    stored: Option<String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(json: impl Into<String>) -> Self {
        Self {
            stored: Some(json.into()),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&mut self, session: &DuelSession) -> Result<(), SessionError> {
        self.stored = Some(session.encode()?);
        Ok(())
    }

    fn load(&mut self, now_ms: u64) -> Option<DuelSession> {
        let json = self.stored.as_deref()?;
        match DuelSession::restore(json, now_ms) {
            Ok(session) => Some(session),
            Err(err) => {
                log::warn!("discarding duel session: {err}");
                self.clear();
                None
            }
        }
    }

    fn clear(&mut self) {
        self.stored = None;
    }

    fn has_session(&self) -> bool {
        self.stored.is_some()
    }
}
