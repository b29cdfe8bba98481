//! Wire types: parsed requests, responses and the per-command error type.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use wgcap_core::CaptureError;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Undefined command: {name}")]
    UnknownCommand { name: String },

    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("No active capture session")]
    NoActiveSession,

    #[error("No frame delivered after {attempts} polls")]
    FrameTimeout { attempts: u32 },

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

fn malformed(reason: impl Into<String>) -> CommandError {
    CommandError::MalformedRequest { reason: reason.into() }
}

// ── Command ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    EnumWindows,
    CaptureStart { window_id: u64 },
    CaptureEnd,
    /// Poll the active session for a frame and write it as a bitmap.
    CaptureFrame { path: Option<PathBuf> },
}

impl Command {
    /// Route on the `cmd` field and pull out the fields that command needs.
    pub fn parse(request: &Value) -> Result<Self, CommandError> {
        let name = request
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("expected a string field `cmd`"))?;

        match name {
            "enum_windows" => Ok(Self::EnumWindows),
            "capture_start" => Ok(Self::CaptureStart { window_id: parse_hwnd(request.get("hwnd"))? }),
            "capture_end" => Ok(Self::CaptureEnd),
            "capture_frame" => {
                let path = match request.get("path") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(p)) if !p.is_empty() => Some(PathBuf::from(p)),
                    Some(_) => return Err(malformed("`path` must be a non-empty string")),
                };
                Ok(Self::CaptureFrame { path })
            }
            other => Err(CommandError::UnknownCommand { name: other.to_owned() }),
        }
    }
}

/// Window handles arrive as decimal strings; plain JSON integers are accepted too.
fn parse_hwnd(value: Option<&Value>) -> Result<u64, CommandError> {
    match value {
        Some(Value::String(text)) => text
            .trim()
            .parse()
            .map_err(|e| malformed(format!("`hwnd` {text:?} is not a decimal window handle: {e}"))),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| malformed(format!("`hwnd` {n} is not a window handle"))),
        Some(_) => Err(malformed("`hwnd` must be a decimal string")),
        None => Err(malformed("missing field `hwnd`")),
    }
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// `{"result": ...}` or `{"error": {"message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ok { result: Value },
    Error { error: ErrorBody },
}

impl Response {
    pub fn ok(result: Value) -> Self {
        Self::Ok { result }
    }

    pub fn error(err: &CommandError) -> Self {
        Self::Error { error: ErrorBody { message: err.to_string() } }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse(&json!({"cmd": "enum_windows"})).unwrap(), Command::EnumWindows);
        assert_eq!(Command::parse(&json!({"cmd": "capture_end"})).unwrap(), Command::CaptureEnd);
        assert_eq!(
            Command::parse(&json!({"cmd": "capture_start", "hwnd": "132456"})).unwrap(),
            Command::CaptureStart { window_id: 132_456 }
        );
        assert_eq!(
            Command::parse(&json!({"cmd": "capture_start", "hwnd": 77})).unwrap(),
            Command::CaptureStart { window_id: 77 }
        );
        assert_eq!(
            Command::parse(&json!({"cmd": "capture_frame", "path": "a.bmp"})).unwrap(),
            Command::CaptureFrame { path: Some(PathBuf::from("a.bmp")) }
        );
        assert_eq!(
            Command::parse(&json!({"cmd": "capture_frame"})).unwrap(),
            Command::CaptureFrame { path: None }
        );
    }

    #[test]
    fn unknown_command_names_the_command() {
        let err = Command::parse(&json!({"cmd": "bogus"})).unwrap_err();
        assert!(matches!(err, CommandError::UnknownCommand { ref name } if name == "bogus"));
        assert_eq!(err.to_string(), "Undefined command: bogus");
    }

    #[test]
    fn rejects_malformed_requests() {
        for request in [
            json!({}),
            json!({"cmd": 3}),
            json!(["enum_windows"]),
            json!({"cmd": "capture_start"}),
            json!({"cmd": "capture_start", "hwnd": "0x1234"}),
            json!({"cmd": "capture_start", "hwnd": -5}),
            json!({"cmd": "capture_frame", "path": 12}),
        ] {
            assert!(
                matches!(Command::parse(&request), Err(CommandError::MalformedRequest { .. })),
                "{request} should be malformed"
            );
        }
    }

    #[test]
    fn response_shapes() {
        let ok = serde_json::to_value(Response::ok(json!("OK"))).unwrap();
        assert_eq!(ok, json!({"result": "OK"}));

        let err = Response::error(&CommandError::UnknownCommand { name: "bogus".into() });
        assert!(err.is_error());
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({"error": {"message": "Undefined command: bogus"}})
        );
    }
}
