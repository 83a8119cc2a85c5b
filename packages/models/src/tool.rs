//! Typed tool operations the assistant may request.
//!
//! The LLM names a tool and supplies a JSON argument string. That pair is
//! parsed once, strictly, into a [`ToolCall`]; everything downstream works
//! with the [`ToolOperation`] variant and its typed payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every tool the agent knows about.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    /// Ask the human to confirm collected parameters.
    ConfirmUserAction,
    /// Look up a scenario by name on the platform.
    QueryScenario,
    /// List the entities of the platform's current scenario.
    QueryScenarioEntities,
    /// List the entity types the platform supports.
    ListEntityTypes,
    /// Create a new scenario.
    CreateScenario,
    /// Rename the current scenario.
    RenameScenario,
    /// Add a point-like entity (ground station, target, ...).
    AddPointEntity,
    /// Add a satellite propagated from TLE data.
    AddSatelliteEntity,
    /// Remove every entity from the current scenario.
    ClearEntities,
    /// Remove the current scenario.
    ClearScene,
}

/// Routing class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    /// Poses a yes/no question to the human.
    Confirmation,
    /// Forwarded to the platform; the graph waits for its answer.
    Query,
    /// Answered in-process without a platform round trip.
    Read,
    /// Mutates the scene; requires an affirmative confirmation first.
    Write,
}

impl ToolKind {
    /// All tools, in catalog order.
    pub const ALL: &[Self] = &[
        Self::ConfirmUserAction,
        Self::QueryScenario,
        Self::QueryScenarioEntities,
        Self::ListEntityTypes,
        Self::CreateScenario,
        Self::RenameScenario,
        Self::AddPointEntity,
        Self::AddSatelliteEntity,
        Self::ClearEntities,
        Self::ClearScene,
    ];

    /// Static partition of the tool catalog.
    #[must_use]
    pub const fn class(self) -> ToolClass {
        match self {
            Self::ConfirmUserAction => ToolClass::Confirmation,
            Self::QueryScenario | Self::QueryScenarioEntities => ToolClass::Query,
            Self::ListEntityTypes => ToolClass::Read,
            Self::CreateScenario
            | Self::RenameScenario
            | Self::AddPointEntity
            | Self::AddSatelliteEntity
            | Self::ClearEntities
            | Self::ClearScene => ToolClass::Write,
        }
    }

    /// Name of the command the front-end platform executes for this tool.
    #[must_use]
    pub fn platform_command(self) -> &'static str {
        match self {
            Self::QueryScenario => "query_scene",
            Self::QueryScenarioEntities => "query_scene_entities",
            other => other.into(),
        }
    }

    /// Short verb phrase used in user-facing result messages.
    #[must_use]
    pub const fn action_label(self) -> &'static str {
        match self {
            Self::ConfirmUserAction => "确认操作",
            Self::QueryScenario => "查询场景",
            Self::QueryScenarioEntities => "查询场景实体",
            Self::ListEntityTypes => "查询实体类型",
            Self::CreateScenario => "创建场景",
            Self::RenameScenario => "重命名场景",
            Self::AddPointEntity => "添加实体",
            Self::AddSatelliteEntity => "添加卫星",
            Self::ClearEntities => "清除实体",
            Self::ClearScene => "清除场景",
        }
    }

    /// JSON schema handed to the LLM for this tool.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn definition(self) -> serde_json::Value {
        let (description, parameters) = match self {
            Self::ConfirmUserAction => (
                "在执行创建或修改操作前，调用此工具向用户确认信息。",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "action_description": { "type": "string", "description": "需要确认的操作描述，例如 '创建以下场景'" },
                        "details": { "type": "object", "description": "需要用户确认的具体信息" }
                    },
                    "required": ["action_description", "details"]
                }),
            ),
            Self::QueryScenario => (
                "根据场景名称查询场景。",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "场景名称" }
                    },
                    "required": ["name"]
                }),
            ),
            Self::QueryScenarioEntities => (
                "查询当前场景所包含的所有实体。",
                serde_json::json!({ "type": "object", "properties": {}, "required": [] }),
            ),
            Self::ListEntityTypes => (
                "列出平台支持的实体类型。",
                serde_json::json!({ "type": "object", "properties": {}, "required": [] }),
            ),
            Self::CreateScenario => (
                "创建一个新的空间场景。",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "场景名称" },
                        "centralBody": { "type": "string", "description": "中心天体英文名，例如 Earth、Moon、Mars" },
                        "startTime": { "type": "string", "description": "纪元UTC开始时间，例如 2021-05-01T00:00:00.000Z" },
                        "endTime": { "type": "string", "description": "纪元UTC结束时间，例如 2021-05-02T00:00:00.000Z" },
                        "description": { "type": "string", "description": "场景描述" }
                    },
                    "required": ["name", "centralBody", "startTime", "endTime"]
                }),
            ),
            Self::RenameScenario => (
                "重命名当前场景。",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "new_name": { "type": "string", "description": "新的场景名称" }
                    },
                    "required": ["new_name"]
                }),
            ),
            Self::AddPointEntity => (
                "向当前场景添加一个点类型的实体。",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "实体名称" },
                        "entityType": {
                            "type": "string",
                            "enum": EntityType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                            "description": "实体类型"
                        },
                        "position": {
                            "type": "object",
                            "properties": {
                                "longitude": { "type": "number" },
                                "latitude": { "type": "number" },
                                "height": { "type": "number" }
                            },
                            "required": ["longitude", "latitude"]
                        },
                        "properties": { "type": "object", "description": "其他属性" }
                    },
                    "required": ["name", "entityType"]
                }),
            ),
            Self::AddSatelliteEntity => (
                "向当前场景添加一颗卫星，使用SGP4根据两行轨道数据计算轨道。",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "Start": { "type": "string", "description": "纪元UTC开始时间，例如 2021-05-01T00:00:00.000Z" },
                        "Stop": { "type": "string", "description": "纪元UTC结束时间，例如 2021-05-02T00:00:00.000Z" },
                        "SatelliteNumber": { "type": "string", "description": "卫星编号，例如 SL-44291" },
                        "TLEs": { "type": "array", "items": { "type": "string" }, "description": "两行轨道数据" }
                    },
                    "required": ["Start", "Stop", "SatelliteNumber", "TLEs"]
                }),
            ),
            Self::ClearEntities => (
                "清除当前场景中的所有实体。",
                serde_json::json!({ "type": "object", "properties": {}, "required": [] }),
            ),
            Self::ClearScene => (
                "清除当前场景，包括所有实体和设置。",
                serde_json::json!({ "type": "object", "properties": {}, "required": [] }),
            ),
        };

        serde_json::json!({
            "name": self.as_ref(),
            "description": description,
            "parameters": parameters,
        })
    }
}

/// Entity categories the platform can render.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(try_from = "String", into = "&'static str")]
#[strum(serialize_all = "camelCase")]
pub enum EntityType {
    /// Ground station.
    #[strum(serialize = "ground_station")]
    GroundStation,
    /// Named place.
    Place,
    /// Point target.
    Target,
    /// Facility.
    Facility,
    /// Aircraft.
    Aircraft,
    /// Missile.
    Missile,
    /// Satellite.
    Satellite,
    /// Sensor.
    Sensor,
    /// Ground vehicle.
    GroundVehicle,
    /// Ship.
    Ship,
    /// Launch vehicle.
    LaunchVehicle,
    /// Line target.
    LineTarget,
    /// Area target.
    AreaTarget,
    /// Communication chain.
    Chain,
}

impl EntityType {
    /// All entity types.
    pub const ALL: &[Self] = &[
        Self::GroundStation,
        Self::Place,
        Self::Target,
        Self::Facility,
        Self::Aircraft,
        Self::Missile,
        Self::Satellite,
        Self::Sensor,
        Self::GroundVehicle,
        Self::Ship,
        Self::LaunchVehicle,
        Self::LineTarget,
        Self::AreaTarget,
        Self::Chain,
    ];

    /// Wire name used by the platform.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::GroundStation => "地面站",
            Self::Place => "地点",
            Self::Target => "目标点",
            Self::Facility => "设施",
            Self::Aircraft => "飞机",
            Self::Missile => "导弹",
            Self::Satellite => "卫星",
            Self::Sensor => "传感器",
            Self::GroundVehicle => "地面车",
            Self::Ship => "船",
            Self::LaunchVehicle => "火箭",
            Self::LineTarget => "线目标",
            Self::AreaTarget => "区域目标",
            Self::Chain => "链路",
        }
    }
}

impl TryFrom<String> for EntityType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Arguments of `confirm_user_action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmArgs {
    /// What is being confirmed (e.g. "创建以下场景").
    pub action_description: String,
    /// Parameters shown to the human.
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Arguments of `query_scenario`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryScenarioArgs {
    /// Scenario name.
    pub name: String,
}

/// Arguments of `create_scenario`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    /// Scenario name.
    pub name: String,
    /// Central body in English ("Earth", "Moon", ...).
    pub central_body: String,
    /// Epoch start.
    pub start_time: String,
    /// Epoch end.
    pub end_time: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Arguments of `rename_scenario`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameArgs {
    /// New scenario name.
    pub new_name: String,
}

/// Geodetic position of a point entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPosition {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Height in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// Arguments of `add_point_entity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// Entity name.
    pub name: String,
    /// Entity category.
    pub entity_type: EntityType,
    /// Where the entity sits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<EntityPosition>,
    /// Extra platform properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Arguments of `add_satellite_entity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatelliteTleParams {
    /// Propagation start (UTC).
    #[serde(rename = "Start")]
    pub start: String,
    /// Propagation stop (UTC).
    #[serde(rename = "Stop")]
    pub stop: String,
    /// Catalog designation, e.g. `SL-44291`.
    #[serde(rename = "SatelliteNumber")]
    pub satellite_number: String,
    /// Two-line element set (optionally preceded by a title line).
    #[serde(rename = "TLEs")]
    pub tles: Vec<String>,
}

/// A tool operation with its typed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolOperation {
    /// See [`ToolKind::ConfirmUserAction`].
    ConfirmUserAction(ConfirmArgs),
    /// See [`ToolKind::QueryScenario`].
    QueryScenario(QueryScenarioArgs),
    /// See [`ToolKind::QueryScenarioEntities`].
    QueryScenarioEntities,
    /// See [`ToolKind::ListEntityTypes`].
    ListEntityTypes,
    /// See [`ToolKind::CreateScenario`].
    CreateScenario(ScenarioConfig),
    /// See [`ToolKind::RenameScenario`].
    RenameScenario(RenameArgs),
    /// See [`ToolKind::AddPointEntity`].
    AddPointEntity(EntityConfig),
    /// See [`ToolKind::AddSatelliteEntity`].
    AddSatelliteEntity(SatelliteTleParams),
    /// See [`ToolKind::ClearEntities`].
    ClearEntities,
    /// See [`ToolKind::ClearScene`].
    ClearScene,
}

impl ToolOperation {
    /// Decodes the typed payload for `kind` from a JSON argument object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolParseError::MalformedArguments`] if the arguments do
    /// not match the tool's schema.
    pub fn from_arguments(
        kind: ToolKind,
        arguments: serde_json::Value,
    ) -> Result<Self, ToolParseError> {
        Ok(match kind {
            ToolKind::ConfirmUserAction => Self::ConfirmUserAction(decode(kind, arguments)?),
            ToolKind::QueryScenario => Self::QueryScenario(decode(kind, arguments)?),
            ToolKind::QueryScenarioEntities => Self::QueryScenarioEntities,
            ToolKind::ListEntityTypes => Self::ListEntityTypes,
            ToolKind::CreateScenario => Self::CreateScenario(decode(kind, arguments)?),
            ToolKind::RenameScenario => Self::RenameScenario(decode(kind, arguments)?),
            ToolKind::AddPointEntity => Self::AddPointEntity(decode(kind, arguments)?),
            ToolKind::AddSatelliteEntity => Self::AddSatelliteEntity(decode(kind, arguments)?),
            ToolKind::ClearEntities => Self::ClearEntities,
            ToolKind::ClearScene => Self::ClearScene,
        })
    }

    /// The tool this operation invokes.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        match self {
            Self::ConfirmUserAction(_) => ToolKind::ConfirmUserAction,
            Self::QueryScenario(_) => ToolKind::QueryScenario,
            Self::QueryScenarioEntities => ToolKind::QueryScenarioEntities,
            Self::ListEntityTypes => ToolKind::ListEntityTypes,
            Self::CreateScenario(_) => ToolKind::CreateScenario,
            Self::RenameScenario(_) => ToolKind::RenameScenario,
            Self::AddPointEntity(_) => ToolKind::AddPointEntity,
            Self::AddSatelliteEntity(_) => ToolKind::AddSatelliteEntity,
            Self::ClearEntities => ToolKind::ClearEntities,
            Self::ClearScene => ToolKind::ClearScene,
        }
    }

    /// Arguments as a JSON value (`null` for argument-less tools).
    #[must_use]
    pub fn arguments(&self) -> serde_json::Value {
        match self {
            Self::ConfirmUserAction(args) => serde_json::to_value(args).unwrap_or_default(),
            Self::QueryScenario(args) => serde_json::to_value(args).unwrap_or_default(),
            Self::CreateScenario(args) => serde_json::to_value(args).unwrap_or_default(),
            Self::RenameScenario(args) => serde_json::to_value(args).unwrap_or_default(),
            Self::AddPointEntity(args) => serde_json::to_value(args).unwrap_or_default(),
            Self::AddSatelliteEntity(args) => serde_json::to_value(args).unwrap_or_default(),
            Self::QueryScenarioEntities
            | Self::ListEntityTypes
            | Self::ClearEntities
            | Self::ClearScene => serde_json::Value::Null,
        }
    }

    /// Sentence fragment describing what a confirmation is asked for.
    #[must_use]
    pub fn confirmation_action(&self) -> String {
        match self {
            Self::ConfirmUserAction(args) => args.action_description.clone(),
            Self::CreateScenario(_) => "创建以下场景".to_string(),
            Self::RenameScenario(_) => "重命名当前场景".to_string(),
            Self::AddPointEntity(_) => "添加以下实体".to_string(),
            Self::AddSatelliteEntity(_) => "添加以下卫星".to_string(),
            Self::ClearEntities => "清除当前场景中的所有实体".to_string(),
            Self::ClearScene => "清除当前场景".to_string(),
            other => other.kind().action_label().to_string(),
        }
    }

    /// Key/value lines shown to the human when confirming this operation.
    ///
    /// Null values are skipped; string values are shown without quotes.
    #[must_use]
    pub fn confirmation_details(&self) -> Vec<(String, String)> {
        let object = match self {
            Self::ConfirmUserAction(args) => args.details.clone(),
            other => match other.arguments() {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
        };

        object
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let shown = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, shown)
            })
            .collect()
    }
}

fn decode<T: DeserializeOwned>(
    kind: ToolKind,
    arguments: serde_json::Value,
) -> Result<T, ToolParseError> {
    serde_json::from_value(arguments)
        .map_err(|source| ToolParseError::MalformedArguments { tool: kind, source })
}

/// A tool call requested by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier.
    pub call_id: String,
    /// The requested operation.
    pub operation: ToolOperation,
}

impl ToolCall {
    /// Strictly parses a raw tool call emitted by the LLM.
    ///
    /// An empty argument string is treated as `{}`.
    ///
    /// # Errors
    ///
    /// * [`ToolParseError::UnknownTool`] if `name` is not in the catalog
    /// * [`ToolParseError::MalformedArguments`] if the arguments are not
    ///   valid JSON or do not match the tool's schema
    pub fn parse(call_id: &str, name: &str, raw_arguments: &str) -> Result<Self, ToolParseError> {
        let kind: ToolKind = name.parse().map_err(|_| ToolParseError::UnknownTool {
            name: name.to_string(),
        })?;

        let raw = raw_arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw)
                .map_err(|source| ToolParseError::MalformedArguments { tool: kind, source })?
        };

        Ok(Self {
            call_id: call_id.to_string(),
            operation: ToolOperation::from_arguments(kind, arguments)?,
        })
    }

    /// The tool this call invokes.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        self.operation.kind()
    }
}

/// Why a raw tool call could not be turned into a [`ToolCall`].
#[derive(Debug, Error)]
pub enum ToolParseError {
    /// The tool name is not in the catalog.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The name the LLM used.
        name: String,
    },

    /// The arguments did not match the tool's schema.
    #[error("Malformed arguments for {tool}: {source}")]
    MalformedArguments {
        /// The tool whose arguments failed.
        tool: ToolKind,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

/// JSON schemas for the given tools, in the shape the providers expect
/// (`name`, `description`, `parameters`).
#[must_use]
pub fn tool_definitions(kinds: &[ToolKind]) -> Vec<serde_json::Value> {
    kinds.iter().map(|k| k.definition()).collect()
}
