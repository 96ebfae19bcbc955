//! # Localiser message envelope
//!
//! Every input to the localiser is a [`LocMsg`]. Messages are encoded as JSON objects with a
//! `type` string and a `payload`, for example:
//!
//! ```json
//! {"type": "ODOM", "payload": {"seq": 1, "timestamp_s": 0.1, "forward_m": 0.05, "heading_rad": 0.0}}
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::de::DeserializeOwned;
use serde_json::{self, json, Value};
use thiserror::Error;

// Internal
use crate::eqpt::{lidar::LaserScan, odom::OdomDelta};
use crate::tc::{InitSpread, LocParamsUpdate, LocTc};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const TYPE_ODOM: &str = "ODOM";
const TYPE_SCAN: &str = "SCAN";
const TYPE_SET_POSE: &str = "SET_POSE";
const TYPE_RECONFIGURE: &str = "RECONFIGURE";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An input to the localiser.
#[derive(Debug, Clone, PartialEq)]
pub enum LocMsg {
    Odom(OdomDelta),
    Scan(LaserScan),
    Tc(LocTc),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum LocMsgParseError {
    #[error("Message contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Message has an invalid type ({0})")]
    InvalidType(String),

    #[error("Message of type {0} is expected to have a payload but it doesn't")]
    MissingPayload(String),

    #[error("Message of type {0} has an invalid payload: {1}")]
    InvalidPayload(String, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocMsg {
    /// Parse a message from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, LocMsgParseError> {
        // Parse the JSON string into a value
        let mut val: Value =
            serde_json::from_str(json_str).map_err(LocMsgParseError::InvalidJson)?;

        let msg_type = match val["type"].as_str() {
            Some(s) => s.to_string(),
            None => {
                return Err(LocMsgParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };

        let payload = val["payload"].take();
        if payload.is_null() {
            return Err(LocMsgParseError::MissingPayload(msg_type));
        }

        match msg_type.as_str() {
            TYPE_ODOM => Ok(LocMsg::Odom(parse_payload(&msg_type, payload)?)),
            TYPE_SCAN => Ok(LocMsg::Scan(parse_payload(&msg_type, payload)?)),
            TYPE_SET_POSE => {
                let p: SetPosePayload = parse_payload(&msg_type, payload)?;
                Ok(LocMsg::Tc(LocTc::SetPose {
                    x_m: p.x_m,
                    y_m: p.y_m,
                    heading_rad: p.heading_rad,
                    spread: p.spread,
                }))
            }
            TYPE_RECONFIGURE => {
                let u: LocParamsUpdate = parse_payload(&msg_type, payload)?;
                Ok(LocMsg::Tc(LocTc::Reconfigure(u)))
            }
            t => Err(LocMsgParseError::InvalidType(format!(
                "{} is not a recognised message type",
                t
            ))),
        }
    }

    /// Encode the message as a JSON packet which [`LocMsg::from_json`] accepts.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let (msg_type, payload) = match self {
            LocMsg::Odom(o) => (TYPE_ODOM, serde_json::to_value(o)?),
            LocMsg::Scan(s) => (TYPE_SCAN, serde_json::to_value(s)?),
            LocMsg::Tc(LocTc::SetPose {
                x_m,
                y_m,
                heading_rad,
                spread,
            }) => (
                TYPE_SET_POSE,
                serde_json::to_value(SetPosePayload {
                    x_m: *x_m,
                    y_m: *y_m,
                    heading_rad: *heading_rad,
                    spread: *spread,
                })?,
            ),
            LocMsg::Tc(LocTc::Reconfigure(u)) => (TYPE_RECONFIGURE, serde_json::to_value(u)?),
        };

        serde_json::to_string(&json!({ "type": msg_type, "payload": payload }))
    }

    /// A short name for the message type, used in logs.
    pub fn type_str(&self) -> &'static str {
        match self {
            LocMsg::Odom(_) => TYPE_ODOM,
            LocMsg::Scan(_) => TYPE_SCAN,
            LocMsg::Tc(LocTc::SetPose { .. }) => TYPE_SET_POSE,
            LocMsg::Tc(LocTc::Reconfigure(_)) => TYPE_RECONFIGURE,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE ITEMS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize, serde::Deserialize)]
struct SetPosePayload {
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spread: Option<InitSpread>,
}

fn parse_payload<T: DeserializeOwned>(
    msg_type: &str,
    payload: Value,
) -> Result<T, LocMsgParseError> {
    serde_json::from_value(payload)
        .map_err(|e| LocMsgParseError::InvalidPayload(msg_type.to_string(), e))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_odom() {
        let msg = LocMsg::from_json(
            r#"{"type": "ODOM", "payload": {"seq": 1, "timestamp_s": 0.1, "forward_m": 0.05, "heading_rad": 0.01}}"#,
        )
        .unwrap();

        match msg {
            LocMsg::Odom(o) => {
                assert_eq!(o.seq, 1);
                assert_eq!(o.forward_m, 0.05);
                assert_eq!(o.strafe_m, 0.0);
            }
            m => panic!("Expected odom, got {:?}", m),
        }
    }

    #[test]
    fn test_parse_tcs() {
        let msg =
            LocMsg::from_json(r#"{"type": "SET_POSE", "payload": {"x_m": 1.0, "y_m": 2.0, "heading_rad": 0.5}}"#)
                .unwrap();
        assert_eq!(
            msg,
            LocMsg::Tc(LocTc::SetPose {
                x_m: 1.0,
                y_m: 2.0,
                heading_rad: 0.5,
                spread: None
            })
        );

        let msg = LocMsg::from_json(
            r#"{"type": "RECONFIGURE", "payload": {"num_particles": 50, "fill_strategy": "ReuseDraws"}}"#,
        )
        .unwrap();
        match msg {
            LocMsg::Tc(LocTc::Reconfigure(u)) => {
                assert_eq!(u.num_particles, Some(50));
                assert_eq!(u.fill_strategy, Some(crate::tc::FillStrategy::ReuseDraws));
                assert_eq!(u.sample_factor, None);
            }
            m => panic!("Expected reconfigure, got {:?}", m),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            LocMsg::from_json("{not json"),
            Err(LocMsgParseError::InvalidJson(_))
        ));
        assert!(matches!(
            LocMsg::from_json(r#"{"type": "TELEPORT", "payload": {}}"#),
            Err(LocMsgParseError::InvalidType(_))
        ));
        assert!(matches!(
            LocMsg::from_json(r#"{"type": 4, "payload": {}}"#),
            Err(LocMsgParseError::InvalidType(_))
        ));
        assert!(matches!(
            LocMsg::from_json(r#"{"type": "SCAN"}"#),
            Err(LocMsgParseError::MissingPayload(_))
        ));
        assert!(matches!(
            LocMsg::from_json(r#"{"type": "ODOM", "payload": {"seq": "one"}}"#),
            Err(LocMsgParseError::InvalidPayload(_, _))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let msgs = vec![
            LocMsg::Odom(OdomDelta {
                seq: 3,
                timestamp_s: 0.3,
                forward_m: 0.1,
                strafe_m: 0.0,
                heading_rad: -0.02,
            }),
            LocMsg::Tc(LocTc::SetPose {
                x_m: 0.0,
                y_m: -1.0,
                heading_rad: 3.0,
                spread: Some(InitSpread {
                    linear_sigma_m: 0.0,
                    angular_sigma_rad: 0.0,
                }),
            }),
        ];

        for m in msgs {
            assert_eq!(LocMsg::from_json(&m.to_json().unwrap()).unwrap(), m);
        }
    }
}
