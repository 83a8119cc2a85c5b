//! Platform command descriptors and the outcomes reported back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::{ToolClass, ToolKind, ToolOperation};

/// Instruction emitted by a tool for the front-end platform to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Whether the tool accepted its arguments.
    pub success: bool,
    /// Human-readable status.
    pub message: String,
    /// Platform command name (e.g. `query_scene`).
    pub func: String,
    /// The tool that produced this descriptor.
    pub kind: ToolKind,
    /// Command arguments, `null` for argument-less commands.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Locally computed data (read tools only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandDescriptor {
    /// Descriptor forwarding `operation` to the platform.
    #[must_use]
    pub fn forward(operation: &ToolOperation, message: impl Into<String>) -> Self {
        let kind = operation.kind();
        Self {
            success: true,
            message: message.into(),
            func: kind.platform_command().to_string(),
            kind,
            args: operation.arguments(),
            data: None,
        }
    }

    /// Descriptor for a tool that rejected its arguments.
    #[must_use]
    pub fn failure(operation: &ToolOperation, message: impl Into<String>) -> Self {
        let kind = operation.kind();
        Self {
            success: false,
            message: message.into(),
            func: kind.platform_command().to_string(),
            kind,
            args: operation.arguments(),
            data: None,
        }
    }

    /// Descriptor carrying data computed in-process.
    #[must_use]
    pub fn local(
        operation: &ToolOperation,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        let kind = operation.kind();
        Self {
            success: true,
            message: message.into(),
            func: kind.platform_command().to_string(),
            kind,
            args: operation.arguments(),
            data: Some(data),
        }
    }

    /// Serialized form stored as the tool message content.
    #[must_use]
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }

    /// The outcome this descriptor represents when it never leaves the
    /// process (local reads and validation failures).
    #[must_use]
    pub fn to_outcome(&self) -> CommandOutcome {
        CommandOutcome {
            success: self.success,
            message: self.message.clone(),
            tool_func: Some(self.func.clone()),
            data: self.data.clone(),
        }
    }
}

/// Result of a platform command as reported by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the platform executed the command.
    pub success: bool,
    /// Platform status message.
    pub message: String,
    /// The platform command this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_func: Option<String>,
    /// Returned data (query commands).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Why an external result payload could not be understood.
#[derive(Debug, Error)]
pub enum OutcomeParseError {
    /// The payload was a string that is not JSON.
    #[error("Result is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not a JSON object.
    #[error("Result must be a JSON object")]
    NotAnObject,

    /// A field has the wrong type.
    #[error("Invalid field '{field}' in result")]
    InvalidField {
        /// Field name.
        field: &'static str,
    },
}

impl CommandOutcome {
    /// Parses an external result payload.
    ///
    /// Accepted shapes:
    ///
    /// * `{"success": .., "message": .., "data": .., "tool_func": ..}`
    /// * `{"tool_func": .., "result": {"success": .., "message": ..}}`
    /// * either of the above encoded as a JSON string
    ///
    /// `success` defaults to `true` and `message` to the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeParseError`] if the payload is not an object or a
    /// known field has the wrong type.
    pub fn parse(payload: &serde_json::Value) -> Result<Self, OutcomeParseError> {
        if let serde_json::Value::String(raw) = payload {
            let decoded: serde_json::Value = serde_json::from_str(raw)?;
            if decoded.is_string() {
                return Err(OutcomeParseError::NotAnObject);
            }
            return Self::parse(&decoded);
        }

        let outer = payload.as_object().ok_or(OutcomeParseError::NotAnObject)?;
        let inner = match outer.get("result") {
            Some(serde_json::Value::Object(inner)) => inner,
            Some(serde_json::Value::Null) | None => outer,
            Some(_) => return Err(OutcomeParseError::InvalidField { field: "result" }),
        };

        let success = match inner.get("success") {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(_) => return Err(OutcomeParseError::InvalidField { field: "success" }),
        };

        let message = match inner.get("message") {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) => return Err(OutcomeParseError::InvalidField { field: "message" }),
        };

        let tool_func = match inner.get("tool_func").or_else(|| outer.get("tool_func")) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(OutcomeParseError::InvalidField { field: "tool_func" }),
        };

        let data = inner
            .get("data")
            .or_else(|| outer.get("data"))
            .filter(|v| !v.is_null())
            .cloned();

        Ok(Self {
            success,
            message,
            tool_func,
            data,
        })
    }

    /// Whether this outcome answers a query command.
    #[must_use]
    pub fn is_query(&self, kind: Option<ToolKind>) -> bool {
        self.tool_func
            .as_deref()
            .map_or_else(
                || kind.is_some_and(|k| k.class() == ToolClass::Query),
                |f| f.starts_with("query_"),
            )
    }

    /// User-facing summary of the outcome.
    ///
    /// Query and read results append the returned data on a new line. An empty
    /// platform message falls back to a generic success/failure sentence.
    #[must_use]
    pub fn render(&self, kind: Option<ToolKind>) -> String {
        let label = kind.map_or("执行操作", ToolKind::action_label);
        let message = if self.message.is_empty() {
            if self.success {
                format!("已成功{label}")
            } else {
                format!("{label}失败")
            }
        } else {
            self.message.clone()
        };

        if self.is_query(kind) || kind.is_some_and(|k| k.class() == ToolClass::Read) {
            let data = self
                .data
                .as_ref()
                .map_or_else(|| "[]".to_string(), serde_json::Value::to_string);
            format!("{message}\n{data}")
        } else {
            message
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::RenameArgs;

    #[test]
    fn parses_nested_result_shape() {
        let payload = serde_json::json!({
            "type": "tool_result",
            "tool_func": "create_scenario",
            "result": { "success": true, "message": "成功创建场景" }
        });
        let outcome = CommandOutcome::parse(&payload).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "成功创建场景");
        assert_eq!(outcome.tool_func.as_deref(), Some("create_scenario"));
    }

    #[test]
    fn parses_flat_shape_from_string() {
        let payload = serde_json::Value::String(
            r#"{"success":false,"message":"场景不存在","tool_func":"query_scene"}"#.to_string(),
        );
        let outcome = CommandOutcome::parse(&payload).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "场景不存在");
    }

    #[test]
    fn success_defaults_to_true() {
        let outcome = CommandOutcome::parse(&serde_json::json!({"message": "ok"})).unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            CommandOutcome::parse(&serde_json::json!([1, 2])),
            Err(OutcomeParseError::NotAnObject)
        ));
        assert!(matches!(
            CommandOutcome::parse(&serde_json::Value::String("not json".to_string())),
            Err(OutcomeParseError::Json(_))
        ));
    }

    #[test]
    fn rejects_wrongly_typed_success() {
        let err = CommandOutcome::parse(&serde_json::json!({"success": "yes"})).unwrap_err();
        assert!(matches!(err, OutcomeParseError::InvalidField { field: "success" }));
    }

    #[test]
    fn query_results_append_data() {
        let outcome = CommandOutcome {
            success: true,
            message: "查询成功".to_string(),
            tool_func: Some("query_scene_entities".to_string()),
            data: Some(serde_json::json!(["卫星A"])),
        };
        assert_eq!(outcome.render(None), "查询成功\n[\"卫星A\"]");
    }

    #[test]
    fn empty_message_falls_back_to_label() {
        let outcome = CommandOutcome {
            success: true,
            message: String::new(),
            tool_func: Some("create_scenario".to_string()),
            data: None,
        };
        assert_eq!(outcome.render(Some(ToolKind::CreateScenario)), "已成功创建场景");
    }

    #[test]
    fn forward_uses_platform_command_name() {
        let op = ToolOperation::RenameScenario(RenameArgs {
            new_name: "新名称".to_string(),
        });
        let descriptor = CommandDescriptor::forward(&op, "重命名场景: 新名称成功");
        assert!(descriptor.success);
        assert_eq!(descriptor.func, "rename_scenario");
        assert_eq!(descriptor.args["new_name"], "新名称");
    }
}
