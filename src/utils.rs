use crate::peer::types::ServerConfig;
use rand::Rng;

/// Случайный идентификатор документа (hex, 16 символов)
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Добавляет схему протокола к URL ICE сервера, если она отсутствует
fn add_scheme(url: &str, server_type: &str) -> String {
    // Если url уже начинается с "turn:" или "stun:", возвращаем как есть
    if url.starts_with("turn:") || url.starts_with("stun:") || url.starts_with("turns:") {
        url.to_string()
    } else {
        let scheme = if server_type == "turn" { "turn:" } else { "stun:" };
        format!("{}{}", scheme, url)
    }
}

/// Все URL сервера с нормализованной схемой
pub fn normalized_urls(config: &ServerConfig) -> Vec<String> {
    std::iter::once(&config.url)
        .chain(config.extra_urls.iter())
        .filter(|u| !u.is_empty())
        .map(|u| add_scheme(u, &config.r#type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: &str, url: &str) -> ServerConfig {
        ServerConfig {
            id: "s".into(),
            r#type: kind.into(),
            url: url.into(),
            extra_urls: Vec::new(),
            username: None,
            credential: None,
        }
    }

    #[test]
    fn random_ids_are_hex_and_distinct() {
        let a = random_id();
        let b = random_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn scheme_is_added_by_server_type() {
        assert_eq!(
            normalized_urls(&server("stun", "stun1.l.google.com:19302")),
            vec!["stun:stun1.l.google.com:19302".to_string()]
        );
        assert_eq!(
            normalized_urls(&server("turn", "turn.example.org:3478")),
            vec!["turn:turn.example.org:3478".to_string()]
        );
        assert_eq!(
            add_scheme("stun:already.example.org", "turn"),
            "stun:already.example.org"
        );
        assert_eq!(add_scheme("turns:relay.example.org", "turn"), "turns:relay.example.org");
    }

    #[test]
    fn normalized_urls_include_extra_urls() {
        let mut cfg = server("stun", "stun1.l.google.com:19302");
        cfg.extra_urls = vec!["stun2.l.google.com:19302".into(), String::new()];
        assert_eq!(
            normalized_urls(&cfg),
            vec![
                "stun:stun1.l.google.com:19302".to_string(),
                "stun:stun2.l.google.com:19302".to_string(),
            ]
        );
    }
}
