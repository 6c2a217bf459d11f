// Конфигурация приложения
// Логирование по умолчанию включено только в режиме разработки

use crate::peer::types::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене только предупреждения

/// Фильтр логов по умолчанию
pub fn default_log_filter() -> String {
    if LOGGING_ENABLED {
        "info".into()
    } else {
        "warn".into()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Настройки сигналинга и peer connection
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SignalingConfig {
    /// Коллекция документов сессий
    pub calls_collection: String,
    /// Подколлекция кандидатов звонящего
    pub offer_candidates: String,
    /// Подколлекция кандидатов отвечающего
    pub answer_candidates: String,
    pub ice_servers: Vec<ServerConfig>,
    pub ice_candidate_pool_size: u8,
    pub log_filter: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            calls_collection: "calls".into(),
            offer_candidates: "offerCandidates".into(),
            answer_candidates: "answerCandidates".into(),
            ice_servers: default_ice_servers(),
            ice_candidate_pool_size: 10,
            log_filter: default_log_filter(),
        }
    }
}

/// Дефолтные STUN серверы
pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![ServerConfig {
        id: "default-stun".into(),
        r#type: "stun".into(),
        url: "stun:stun1.l.google.com:19302".into(),
        extra_urls: vec!["stun:stun2.l.google.com:19302".into()],
        username: None,
        credential: None,
    }]
}

impl SignalingConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("calls_collection", &self.calls_collection),
            ("offer_candidates", &self.offer_candidates),
            ("answer_candidates", &self.answer_candidates),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid(format!("{name} cannot be empty")));
            }
        }
        if self.offer_candidates == self.answer_candidates {
            return Err(ConfigError::Invalid(
                "offer and answer candidates must use different collections".into(),
            ));
        }

        // Валидация серверов
        for server in &self.ice_servers {
            if server.url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "server {} URL cannot be empty",
                    server.id
                )));
            }
            if server.r#type == "turn"
                && (server.username.is_none() || server.credential.is_none())
            {
                return Err(ConfigError::Invalid(format!(
                    "TURN server {} requires username and credential",
                    server.id
                )));
            }
        }
        Ok(())
    }
}
