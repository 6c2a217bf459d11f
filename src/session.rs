use crate::config::SignalingConfig;
use crate::error::SignalingError;
use crate::peer::types::{IceCandidate, SdpType, SessionDescription};
use crate::store::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Непрозрачный id сессии, передаётся второй стороне вручную (copy-paste)
pub type SessionId = String;

/// Роль участника в двусторонних переговорах
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Caller,
    Answerer,
}

impl SessionRole {
    pub fn peer(self) -> Self {
        match self {
            SessionRole::Caller => SessionRole::Answerer,
            SessionRole::Answerer => SessionRole::Caller,
        }
    }

    /// Поле документа сессии, которое пишет эта роль
    pub fn description_field(self) -> &'static str {
        match self {
            SessionRole::Caller => "offer",
            SessionRole::Answerer => "answer",
        }
    }

    pub fn sdp_type(self) -> SdpType {
        match self {
            SessionRole::Caller => SdpType::Offer,
            SessionRole::Answerer => SdpType::Answer,
        }
    }

    /// Подколлекция кандидатов, которую публикует эта роль
    pub fn candidates_collection(self, config: &SignalingConfig) -> &str {
        match self {
            SessionRole::Caller => &config.offer_candidates,
            SessionRole::Answerer => &config.answer_candidates,
        }
    }
}

/// Читает offer/answer из документа сессии. `Ok(None)`, если поля ещё нет.
pub fn read_description(
    doc: &Document,
    role: SessionRole,
) -> Result<Option<SessionDescription>, SignalingError> {
    let Some(value) = doc.get(role.description_field()) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let desc: SessionDescription = serde_json::from_value(value.clone())
        .map_err(|e| SignalingError::malformed("session description", e))?;
    if desc.kind != role.sdp_type() {
        return Err(SignalingError::malformed(
            "session description",
            format!("expected {} in `{}`, got {}", role.sdp_type(), role.description_field(), desc.kind),
        ));
    }
    Ok(Some(desc))
}

/// Элемент подколлекции кандидатов
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    pub origin: SessionRole,
    /// Порядковый номер в наборе кандидатов этой стороны
    pub sequence: u64,
    pub candidate: IceCandidate,
    pub ts: i64,
}

impl CandidateRecord {
    pub fn new(session_id: &str, origin: SessionRole, sequence: u64, candidate: IceCandidate) -> Self {
        Self {
            session_id: session_id.to_string(),
            origin,
            sequence,
            candidate,
            ts: chrono::Utc::now().timestamp(),
        }
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: Value) -> Result<Self, SignalingError> {
        serde_json::from_value(value).map_err(|e| SignalingError::malformed("candidate record", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn description_is_read_from_role_field() {
        let mut doc = Document::new();
        doc.insert("offer".into(), json!({"type": "offer", "sdp": "OFFER_X"}));
        assert_eq!(
            read_description(&doc, SessionRole::Caller).unwrap(),
            Some(SessionDescription::offer("OFFER_X"))
        );
        assert_eq!(read_description(&doc, SessionRole::Answerer).unwrap(), None);
    }

    #[test]
    fn description_with_wrong_type_is_malformed() {
        let mut doc = Document::new();
        doc.insert("answer".into(), json!({"type": "offer", "sdp": "x"}));
        assert!(matches!(
            read_description(&doc, SessionRole::Answerer),
            Err(SignalingError::Malformed { .. })
        ));
    }

    #[test]
    fn candidate_record_uses_wire_field_names() {
        let rec = CandidateRecord::new("s1", SessionRole::Caller, 3, IceCandidate::new("c"));
        let value = rec.to_value().unwrap();
        assert_eq!(value["sessionId"], json!("s1"));
        assert_eq!(value["origin"], json!("caller"));
        assert_eq!(value["candidate"]["sdpMLineIndex"], json!(0));
        assert_eq!(CandidateRecord::from_value(value).unwrap(), rec);
    }

    #[test]
    fn roles_map_to_disjoint_partitions() {
        let config = SignalingConfig::default();
        assert_eq!(SessionRole::Caller.candidates_collection(&config), "offerCandidates");
        assert_eq!(SessionRole::Answerer.candidates_collection(&config), "answerCandidates");
        assert_eq!(SessionRole::Caller.peer(), SessionRole::Answerer);
    }
}
