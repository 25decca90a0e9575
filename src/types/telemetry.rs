//! Raw pointer telemetry captured by the slider widget

use serde::{Deserialize, Serialize};

/// Pointer event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
}

/// One pointer sample in track-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    #[serde(rename = "type")]
    pub kind: PointerEventKind,
    pub t_ms: f64,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, t_ms: f64, x: f64, y: f64) -> Self {
        Self { kind, t_ms, x, y }
    }
}

/// Everything recorded for one widget interaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionSession {
    #[serde(default)]
    pub widget_shown_at_ms: Option<f64>,
    #[serde(default)]
    pub interaction_started_at_ms: Option<f64>,
    #[serde(default)]
    pub interaction_ended_at_ms: Option<f64>,
    #[serde(default)]
    pub events: Vec<PointerEvent>,
}
