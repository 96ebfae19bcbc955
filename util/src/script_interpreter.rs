//! # Replay script interpreter module
//!
//! This module provides an interpreter for replay scripts, allowing recorded or generated
//! localiser inputs to be fed back through the filter.
//!
//! A script is a text file where each entry has the form `<time_s>: <json message>;`, with the
//! JSON message in the format accepted by [`LocMsg::from_json`]. Entries must be in time order.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::Path;
use std::fs;
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use comms_if::msg::{LocMsg, LocMsgParseError};
use crate::session::get_elapsed_seconds;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A message which is scripted to occur at a specific time.
#[derive(Debug)]
struct ScriptedMsg {
    /// The time the message is supposed to be delivered at
    exec_time_s: f64,

    msg: LocMsg
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_msgs` to
/// acquire a list of messages that need delivering.
#[derive(Debug)]
pub struct ScriptInterpreter {
    msgs: VecDeque<ScriptedMsg>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script entry at {0} s is earlier than the entry before it")]
    OutOfOrder(f64),

    #[error("Script contains an invalid message at {0} s: {1}")]
    InvalidMsg(f64, LocMsgParseError)
}

#[derive(Debug)]
pub enum PendingMsgs {
    None,
    Some(Vec<LocMsg>),
    EndOfScript
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = script_path.as_ref();

        // Check that the script file exists.
        if !path.exists() {
            return Err(
                ScriptError::ScriptNotFound(path.display().to_string()));
        }

        // Load the script into a string
        let script = fs::read_to_string(path)
            .map_err(ScriptError::ScriptLoadError)?;

        Self::from_script_str(&script)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_script_str(script: &str) -> Result<Self, ScriptError> {
        // Empty queue of messages
        let mut msg_queue: VecDeque<ScriptedMsg> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::
            new(r"^\s*(\S+?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(|e| ScriptError::InvalidTimestamp(e.to_string()))?;

        for cap in re.captures_iter(script) {
            let time_str = cap.get(1).map_or("", |m| m.as_str());
            let msg_str = cap.get(2).map_or("", |m| m.as_str());

            // Parse the exec time
            let exec_time_s: f64 = match time_str.parse() {
                Ok(t) if t >= 0.0 => t,
                _ => return Err(ScriptError::InvalidTimestamp(time_str.to_string()))
            };

            if let Some(prev) = msg_queue.back() {
                if exec_time_s < prev.exec_time_s {
                    return Err(ScriptError::OutOfOrder(exec_time_s))
                }
            }

            // Parse the message from the payload. The scripts contain JSON only.
            let msg = LocMsg::from_json(msg_str)
                .map_err(|e| ScriptError::InvalidMsg(exec_time_s, e))?;

            msg_queue.push_back(ScriptedMsg {
                exec_time_s,
                msg
            });
        }

        if msg_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            msgs: msg_queue
        })
    }

    /// Return the messages due by the current session time.
    pub fn get_pending_msgs(&mut self) -> PendingMsgs {
        self.get_pending_msgs_at(get_elapsed_seconds())
    }

    /// Return the messages due by `current_time_s`, or `None` if no messages need delivering.
    pub fn get_pending_msgs_at(&mut self, current_time_s: f64) -> PendingMsgs {

        // If the queue is empty the script is over and we return the end of
        // script variant
        if self.msgs.is_empty() {
            return PendingMsgs::EndOfScript
        }

        let mut msg_vec: Vec<LocMsg> = vec![];

        // Pop items from the queue while their exec time has passed
        while let Some(m) = self.msgs.front() {
            if m.exec_time_s > current_time_s {
                break
            }
            if let Some(m) = self.msgs.pop_front() {
                msg_vec.push(m.msg);
            }
        }

        if msg_vec.is_empty() {
            PendingMsgs::None
        }
        else {
            PendingMsgs::Some(msg_vec)
        }
    }

    /// Pop the next message regardless of its time, used when replaying as fast as possible.
    pub fn next_msg(&mut self) -> Option<(f64, LocMsg)> {
        self.msgs.pop_front().map(|m| (m.exec_time_s, m.msg))
    }

    /// Get the number of messages remaining in the script
    pub fn get_num_msgs(&self) -> usize {
        self.msgs.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.msgs.back() {
            Some(m) => m.exec_time_s,
            None => 0f64
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
        0.0: {"type": "SET_POSE", "payload": {"x_m": 0.0, "y_m": 0.0, "heading_rad": 0.0}};
        0.1: {"type": "ODOM", "payload": {"seq": 1, "timestamp_s": 0.1, "forward_m": 0.1, "heading_rad": 0.0}};
        0.1: {"type": "ODOM", "payload": {"seq": 2, "timestamp_s": 0.1, "forward_m": 0.1, "heading_rad": 0.0}};
        1.5: {"type": "RECONFIGURE", "payload": {"num_particles": 50}};
    "#;

    #[test]
    fn test_parse_script() {
        let mut si = ScriptInterpreter::from_script_str(SCRIPT).unwrap();

        assert_eq!(si.get_num_msgs(), 4);
        assert_eq!(si.get_duration(), 1.5);

        match si.get_pending_msgs_at(0.05) {
            PendingMsgs::Some(v) => assert_eq!(v.len(), 1),
            p => panic!("Expected one message, got {:?}", p)
        }
        assert!(matches!(si.get_pending_msgs_at(0.05), PendingMsgs::None));
        match si.get_pending_msgs_at(1.0) {
            PendingMsgs::Some(v) => {
                assert_eq!(v.len(), 2);
                assert!(v.iter().all(|m| m.type_str() == "ODOM"));
            }
            p => panic!("Expected two messages, got {:?}", p)
        }

        let (t, m) = si.next_msg().unwrap();
        assert_eq!(t, 1.5);
        assert_eq!(m.type_str(), "RECONFIGURE");
        assert!(matches!(si.get_pending_msgs_at(10.0), PendingMsgs::EndOfScript));
    }

    #[test]
    fn test_empty_script() {
        assert!(matches!(
            ScriptInterpreter::from_script_str("# nothing here\n"),
            Err(ScriptError::ScriptEmpty)
        ));
    }

    #[test]
    fn test_bad_timestamp() {
        assert!(matches!(
            ScriptInterpreter::from_script_str(
                r#"soon: {"type": "SCAN", "payload": {}};"#
            ),
            Err(ScriptError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            ScriptInterpreter::from_script_str(
                "1.0: {\"type\": \"RECONFIGURE\", \"payload\": {}};\n\
                 0.5: {\"type\": \"RECONFIGURE\", \"payload\": {}};"
            ),
            Err(ScriptError::OutOfOrder(_))
        ));
    }

    #[test]
    fn test_bad_msg() {
        assert!(matches!(
            ScriptInterpreter::from_script_str(r#"2.0: {"type": "TELEPORT", "payload": {}};"#),
            Err(ScriptError::InvalidMsg(t, _)) if t == 2.0
        ));
    }

    #[test]
    fn test_missing_script() {
        assert!(matches!(
            ScriptInterpreter::new("/not/a/real/script.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
