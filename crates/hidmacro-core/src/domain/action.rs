//! Timed playback actions and their JSON schema.
//!
//! One element of a macro payload looks like:
//!
//! ```json
//! {"type": "click", "x": 100, "y": 200, "button": "left", "delay": 0.1}
//! ```
//!
//! | Field    | Type          | Required                        | Default  |
//! |----------|---------------|---------------------------------|----------|
//! | `type`   | string        | always                          | –        |
//! | `x`, `y` | integer       | `move`; optional for `click`    | –        |
//! | `button` | string        | no (`click` only)               | `"left"` |
//! | `delay`  | float seconds | no                              | `0.05`   |
//! | `delta`  | integer       | `scroll`                        | –        |
//!
//! `delay` is capped at [`MAX_DELAY`] (one day) so every deadline the
//! playback engine computes stays representable.
//!
//! A `type` this version does not know is *not* a parse error: it becomes
//! [`Action::Unsupported`] and the playback engine skips it with a warning.
//! Everything else (missing fields, wrong JSON types, negative delays, unknown
//! button names) is rejected.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hid::report::ButtonMask;

/// Wait applied after an action whose payload omits `delay`.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Longest `delay` a payload may carry (one day).
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors produced while validating an action payload.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The payload is not valid JSON, not an array, or has a mistyped field.
    #[error("invalid action JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field required by the action's `type` is absent.
    #[error("action of type '{kind}' is missing field '{field}'")]
    MissingField { kind: String, field: &'static str },

    /// `button` is not one of `left`, `right`, `middle`.
    #[error("unknown mouse button: '{0}'")]
    UnknownButton(String),

    /// `delay` is negative, NaN, or longer than [`MAX_DELAY`].
    #[error("invalid delay: {0}")]
    InvalidDelay(f64),
}

/// Mouse button named by a click action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Report bit(s) for this button.
    pub fn mask(self) -> ButtonMask {
        match self {
            MouseButton::Left => ButtonMask::LEFT,
            MouseButton::Right => ButtonMask::RIGHT,
            MouseButton::Middle => ButtonMask::MIDDLE,
        }
    }

    /// Lower-case wire name (`"left"`, `"right"`, `"middle"`).
    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = ActionError;

    /// Parses a button name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            _ => Err(ActionError::UnknownButton(s.to_string())),
        }
    }
}

/// One step of a macro.
///
/// Coordinates are pixels on the host screen.  They are kept signed and
/// unclamped here; clamping happens when the engine maps them to the absolute
/// range.  `delay` is the wait *after* the action runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub enum Action {
    /// Move the pointer to `(x, y)`.
    Move { x: i64, y: i64, delay: Duration },
    /// Optionally move to `position`, then press and release `button`.
    Click {
        position: Option<(i64, i64)>,
        button: MouseButton,
        delay: Duration,
    },
    /// Roll the wheel by `delta` detents (positive = away from the user).
    Scroll { delta: i32, delay: Duration },
    /// An action `type` this version does not implement.
    Unsupported { kind: String, delay: Duration },
}

impl Action {
    /// Wait to apply after this action.
    pub fn delay(&self) -> Duration {
        match self {
            Action::Move { delay, .. }
            | Action::Click { delay, .. }
            | Action::Scroll { delay, .. }
            | Action::Unsupported { delay, .. } => *delay,
        }
    }

    /// Wire name of the action type.
    pub fn kind(&self) -> &str {
        match self {
            Action::Move { .. } => "move",
            Action::Click { .. } => "click",
            Action::Scroll { .. } => "scroll",
            Action::Unsupported { kind, .. } => kind,
        }
    }
}

/// Parses a JSON array of actions.
///
/// # Errors
///
/// Returns [`ActionError`] if the payload is not a JSON array or any element
/// fails validation.  Validation is all-or-nothing: no partial list is returned.
///
/// # Examples
///
/// ```rust
/// use hidmacro_core::domain::action::parse_actions;
/// use hidmacro_core::Action;
///
/// let actions = parse_actions(r#"[{"type":"move","x":10,"y":20}]"#).unwrap();
/// assert!(matches!(actions[0], Action::Move { x: 10, y: 20, .. }));
/// ```
pub fn parse_actions(payload: &str) -> Result<Vec<Action>, ActionError> {
    Ok(serde_json::from_str(payload)?)
}

/// Serializes actions to the compact single-line JSON used on the wire.
///
/// # Errors
///
/// Returns [`ActionError::Json`] if serialization fails.
pub fn actions_to_json(actions: &[Action]) -> Result<String, ActionError> {
    Ok(serde_json::to_string(actions)?)
}

// ── JSON shadow type ──────────────────────────────────────────────────────────

/// Flat JSON shape shared by every action type.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    button: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<i32>,
}

impl RawAction {
    fn missing(&self, field: &'static str) -> ActionError {
        ActionError::MissingField {
            kind: self.kind.clone(),
            field,
        }
    }

    fn require<T>(&self, value: Option<T>, field: &'static str) -> Result<T, ActionError> {
        value.ok_or_else(|| self.missing(field))
    }

    fn delay(&self) -> Result<Duration, ActionError> {
        match self.delay {
            None => Ok(DEFAULT_DELAY),
            Some(secs) => Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|delay| *delay <= MAX_DELAY)
                .ok_or(ActionError::InvalidDelay(secs)),
        }
    }
}

impl TryFrom<RawAction> for Action {
    type Error = ActionError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let delay = raw.delay()?;
        match raw.kind.as_str() {
            "move" => Ok(Action::Move {
                x: raw.require(raw.x, "x")?,
                y: raw.require(raw.y, "y")?,
                delay,
            }),
            "click" => {
                let position = match (raw.x, raw.y) {
                    (Some(x), Some(y)) => Some((x, y)),
                    (None, None) => None,
                    (Some(_), None) => return Err(raw.missing("y")),
                    (None, Some(_)) => return Err(raw.missing("x")),
                };
                let button = match raw.button.as_deref() {
                    Some(name) => name.parse()?,
                    None => MouseButton::default(),
                };
                Ok(Action::Click {
                    position,
                    button,
                    delay,
                })
            }
            "scroll" => Ok(Action::Scroll {
                delta: raw.require(raw.delta, "delta")?,
                delay,
            }),
            _ => Ok(Action::Unsupported {
                kind: raw.kind.clone(),
                delay,
            }),
        }
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let mut raw = RawAction {
            kind: action.kind().to_string(),
            x: None,
            y: None,
            button: None,
            delay: Some(action.delay().as_secs_f64()),
            delta: None,
        };
        match action {
            Action::Move { x, y, .. } => {
                raw.x = Some(x);
                raw.y = Some(y);
            }
            Action::Click {
                position, button, ..
            } => {
                if let Some((x, y)) = position {
                    raw.x = Some(x);
                    raw.y = Some(y);
                }
                raw.button = Some(button.as_str().to_string());
            }
            Action::Scroll { delta, .. } => raw.delta = Some(delta),
            Action::Unsupported { .. } => {}
        }
        raw
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
