//! Observability utilities.
//!
//! Tracing goes to stderr: stdout carries protocol frames.

use serde_json::{Map, Value};
use std::sync::OnceLock;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::envelope::ResponseEnvelope;
use crate::types::{CorrelationId, ObservabilityConfig};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Argument keys whose values never reach the logs.
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret", "otp", "auth_code"];

/// Longest string argument logged verbatim.
const MAX_LOGGED_STRING: usize = 200;

/// Initialize tracing subscriber once for the process.
///
/// Filter comes from `RUST_LOG`, falling back to the configured level. JSON
/// output is selected by `json_logs` (or `MINUTES_LOG_FORMAT=json` at load).
pub fn init_tracing(config: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

        let result = if config.json_logs {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

/// Copy of `args` safe to log: secrets redacted, long strings truncated.
pub fn sanitize_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let clean: Map<String, Value> = map
                .iter()
                .map(|(key, value)| {
                    let lower = key.to_ascii_lowercase();
                    if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), sanitize_args(value))
                    }
                })
                .collect();
            Value::Object(clean)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_args).collect()),
        Value::String(s) if s.chars().count() > MAX_LOGGED_STRING => {
            let truncated: String = s.chars().take(MAX_LOGGED_STRING).collect();
            Value::String(format!("{}...", truncated))
        }
        other => other.clone(),
    }
}

/// Handle returned by [`ToolLogger::tool_start`].
#[derive(Debug)]
pub struct ToolCall {
    pub id: CorrelationId,
    started: Instant,
}

impl ToolCall {
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Structured start/finish logging for tool calls. Purely observational.
#[derive(Debug, Default, Clone)]
pub struct ToolLogger;

impl ToolLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn tool_start(&self, tool: &str, args: &Value) -> ToolCall {
        let call = ToolCall {
            id: CorrelationId::new(),
            started: Instant::now(),
        };
        tracing::info!(
            correlation_id = %call.id,
            tool = %tool,
            args = %sanitize_args(args),
            "tool_start"
        );
        call
    }

    /// Logs the outcome shape only. Messages can carry sign-in codes and links.
    pub fn tool_success(&self, call: &ToolCall, tool: &str, envelope: &ResponseEnvelope) {
        tracing::info!(
            correlation_id = %call.id,
            tool = %tool,
            success = envelope.success,
            requires_user_action = envelope.needs_user_action(),
            duration_ms = call.elapsed_ms(),
            message_len = envelope.message.len(),
            images = envelope.images.len(),
            "tool_success"
        );
    }

    pub fn tool_error(&self, call: &ToolCall, tool: &str, message: &str) {
        tracing::error!(
            correlation_id = %call.id,
            tool = %tool,
            duration_ms = call.elapsed_ms(),
            error = %message,
            "tool_error"
        );
    }
}
