//! Event-channel wire messages.
//!
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.
//! Inbound frames are validated into [`ClientEvent`] variants at the boundary;
//! anything that does not fit is rejected with a [`MessageError`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Room every schedule screen joins.
pub const SCHEDULE_ROOM: &str = "schedule_update";

/// Cage id carried by the global stop's background event.
pub const ESTOP_CAGE_ID: u32 = 999;

/// An arena id, normalized to its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CageId(String);

impl CageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Accept a JSON number or a non-empty string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Room name for this arena.
    pub fn room(&self) -> String {
        format!("cage_no_{}", self.0)
    }
}

impl fmt::Display for CageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why an inbound frame was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MessageError {
    #[error("frame is not an event envelope: {0}")]
    Malformed(String),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("{event} missing {field}")]
    MissingField { event: &'static str, field: &'static str },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Presence announcement after (re)connect.
    Exists,
    /// A schedule screen subscribing to schedule updates.
    NotifySchedule { location: Value },
    JoinCage { cage: CageId },
    /// Timer command; only `message` is relayed.
    Timer { cage: CageId, message: Value },
    /// Timer background colour; relayed verbatim.
    TimerBackground { cage: CageId, payload: Value },
    PlayerReady { cage: CageId, payload: Value },
    PlayerTapout { cage: CageId, payload: Value },
    ColorNames { cage: CageId, red: Value, blue: Value },
    PlaySound { cage: CageId, sound: Value },
    ResetScreens { cage: CageId },
    GlobalEstop,
    /// Known event that needs no action: a location report, a schedule
    /// request or a connectivity check.
    Ignored { name: &'static str },
}

fn object_cage(event: &'static str, data: &Value, field: &'static str) -> Result<CageId, MessageError> {
    data.get(field)
        .and_then(CageId::from_value)
        .ok_or(MessageError::MissingField { event, field })
}

fn required(event: &'static str, data: &Value, field: &'static str) -> Result<Value, MessageError> {
    data.get(field)
        .cloned()
        .ok_or(MessageError::MissingField { event, field })
}

impl ClientEvent {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|e| MessageError::Malformed(e.to_string()))?;
        Self::from_parts(&envelope.event, envelope.data)
    }

    /// Validate an event name and its payload.
    pub fn from_parts(event: &str, data: Value) -> Result<Self, MessageError> {
        match event {
            "exists" => Ok(ClientEvent::Exists),
            "client_notify_schedule" => Ok(ClientEvent::NotifySchedule { location: data }),
            "join_cage_request" => Ok(ClientEvent::JoinCage { cage: object_cage("join_cage_request", &data, "cage_id")? }),
            "timer_event" => Ok(ClientEvent::Timer {
                cage: object_cage("timer_event", &data, "cageID")?,
                message: required("timer_event", &data, "message")?,
            }),
            "timer_bg_event" => {
                let cage = object_cage("timer_bg_event", &data, "cageID")?;
                Ok(ClientEvent::TimerBackground { cage, payload: data })
            }
            "player_ready" => {
                let cage = object_cage("player_ready", &data, "cageID")?;
                Ok(ClientEvent::PlayerReady { cage, payload: data })
            }
            "player_tapout" => {
                let cage = object_cage("player_tapout", &data, "cageID")?;
                Ok(ClientEvent::PlayerTapout { cage, payload: data })
            }
            "robot_match_color_name" => {
                let missing = |field| MessageError::MissingField { event: "robot_match_color_name", field };
                let Value::Array(args) = data else {
                    return Err(missing("arguments"));
                };
                let cage = args
                    .first()
                    .and_then(CageId::from_value)
                    .ok_or_else(|| missing("cageID"))?;
                let red = args.get(1).cloned().ok_or_else(|| missing("red_name"))?;
                let blue = args.get(2).cloned().ok_or_else(|| missing("blue_name"))?;
                Ok(ClientEvent::ColorNames { cage, red, blue })
            }
            "c_play_sound_event" => Ok(ClientEvent::PlaySound {
                cage: object_cage("c_play_sound_event", &data, "cageID")?,
                sound: required("c_play_sound_event", &data, "sound")?,
            }),
            "reset_screen_states" => {
                Ok(ClientEvent::ResetScreens { cage: object_cage("reset_screen_states", &data, "cageID")? })
            }
            "globalESTOP" => Ok(ClientEvent::GlobalEstop),
            "client_attests_existence" => Ok(ClientEvent::Ignored { name: "client_attests_existence" }),
            "client_requests_schedule" => Ok(ClientEvent::Ignored { name: "client_requests_schedule" }),
            "test_connect" => Ok(ClientEvent::Ignored { name: "test_connect" }),
            other => Err(MessageError::UnknownEvent(other.to_string())),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Exists => "exists",
            ClientEvent::NotifySchedule { .. } => "client_notify_schedule",
            ClientEvent::JoinCage { .. } => "join_cage_request",
            ClientEvent::Timer { .. } => "timer_event",
            ClientEvent::TimerBackground { .. } => "timer_bg_event",
            ClientEvent::PlayerReady { .. } => "player_ready",
            ClientEvent::PlayerTapout { .. } => "player_tapout",
            ClientEvent::ColorNames { .. } => "robot_match_color_name",
            ClientEvent::PlaySound { .. } => "c_play_sound_event",
            ClientEvent::ResetScreens { .. } => "reset_screen_states",
            ClientEvent::GlobalEstop => "globalESTOP",
            ClientEvent::Ignored { name } => name,
        }
    }
}

/// An outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ServerEvent {
    pub fn new(event: &str, data: Value) -> Self {
        Self { event: event.to_string(), data: Some(data) }
    }

    /// An event with no payload.
    pub fn bare(event: &str) -> Self {
        Self { event: event.to_string(), data: None }
    }

    pub fn query_location() -> Self {
        Self::bare("arena_query_location")
    }

    pub fn joined_room(room: &str) -> Self {
        Self::new("client_joined_room", Value::String(room.to_string()))
    }

    pub fn timer(message: Value) -> Self {
        Self::new("timer_event", message)
    }

    pub fn timer_background(payload: Value) -> Self {
        Self::new("timer_bg_event", payload)
    }

    pub fn estop_timer() -> Self {
        Self::timer(Value::String("STOP".into()))
    }

    pub fn estop_background() -> Self {
        Self::timer_background(json!({"color": "red", "cageID": ESTOP_CAGE_ID}))
    }

    pub fn player_ready(payload: Value) -> Self {
        Self::new("control_player_ready_event", payload)
    }

    pub fn player_tapout(payload: Value) -> Self {
        Self::new("control_player_tapout_event", payload)
    }

    pub fn share_name(color: &str, name: Value) -> Self {
        Self::new("robot_match_share_name", json!([color, name]))
    }

    pub fn play_sound(sound: Value) -> Self {
        Self::new("play_sound_event", sound)
    }

    pub fn reset_screens() -> Self {
        Self::bare("reset_screen_states")
    }

    /// Encode as a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cage_id_normalization() {
        assert_eq!(CageId::from_value(&json!(5)).unwrap().room(), "cage_no_5");
        assert_eq!(CageId::from_value(&json!("5")).unwrap().room(), "cage_no_5");
        assert_eq!(CageId::from_value(&json!(" 12 ")).unwrap().as_str(), "12");
        assert!(CageId::from_value(&json!("")).is_none());
        assert!(CageId::from_value(&json!(null)).is_none());
        assert!(CageId::from_value(&json!({"id": 1})).is_none());
    }

    #[test]
    fn test_parse_player_ready() {
        let event = ClientEvent::parse(r#"{"event": "player_ready", "data": {"cageID": 5, "color": "red"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::PlayerReady { cage: CageId::new("5"), payload: json!({"cageID": 5, "color": "red"}) }
        );
    }

    #[test]
    fn test_missing_cage_rejected() {
        let err = ClientEvent::parse(r#"{"event": "player_ready", "data": {"color": "red"}}"#).unwrap_err();
        assert_eq!(err, MessageError::MissingField { event: "player_ready", field: "cageID" });

        let err = ClientEvent::parse(r#"{"event": "join_cage_request", "data": {"cageID": 1}}"#).unwrap_err();
        assert_eq!(err, MessageError::MissingField { event: "join_cage_request", field: "cage_id" });

        let err = ClientEvent::parse(r#"{"event": "timer_event", "data": {"cageID": 1}}"#).unwrap_err();
        assert_eq!(err, MessageError::MissingField { event: "timer_event", field: "message" });
    }

    #[test]
    fn test_malformed_and_unknown() {
        assert!(matches!(ClientEvent::parse("not json"), Err(MessageError::Malformed(_))));
        assert!(matches!(ClientEvent::parse(r#"{"data": 1}"#), Err(MessageError::Malformed(_))));
        assert_eq!(
            ClientEvent::parse(r#"{"event": "launch_rockets"}"#).unwrap_err(),
            MessageError::UnknownEvent("launch_rockets".into())
        );
    }

    #[test]
    fn test_color_names_positional() {
        let event = ClientEvent::parse(r#"{"event": "robot_match_color_name", "data": [3, "Red Bot", "Blue Bot"]}"#)
            .unwrap();
        assert_eq!(
            event,
            ClientEvent::ColorNames { cage: CageId::new("3"), red: json!("Red Bot"), blue: json!("Blue Bot") }
        );
        assert!(ClientEvent::parse(r#"{"event": "robot_match_color_name", "data": [3, "Red"]}"#).is_err());
        assert!(ClientEvent::parse(r#"{"event": "robot_match_color_name", "data": {"cageID": 3}}"#).is_err());
    }

    #[test]
    fn test_events_without_payload() {
        assert_eq!(ClientEvent::parse(r#"{"event": "exists"}"#).unwrap(), ClientEvent::Exists);
        assert_eq!(ClientEvent::parse(r#"{"event": "globalESTOP", "data": null}"#).unwrap(), ClientEvent::GlobalEstop);
    }

    #[test]
    fn test_no_op_events_are_known() {
        for name in ["client_attests_existence", "client_requests_schedule", "test_connect"] {
            let event = ClientEvent::from_parts(name, json!("/schedule")).unwrap();
            assert_eq!(event, ClientEvent::Ignored { name });
            assert_eq!(event.name(), name);
        }
    }

    #[test]
    fn test_server_event_encoding() {
        assert_eq!(ServerEvent::reset_screens().to_text().unwrap(), r#"{"event":"reset_screen_states"}"#);
        assert_eq!(
            ServerEvent::share_name("red", json!("Lynx")).to_text().unwrap(),
            r#"{"event":"robot_match_share_name","data":["red","Lynx"]}"#
        );
        assert_eq!(ServerEvent::estop_background().data.unwrap(), json!({"color": "red", "cageID": 999}));
    }
}
