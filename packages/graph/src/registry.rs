//! Tool catalog and executors.
//!
//! Tools never touch the scene themselves. Query and write tools turn their
//! typed arguments into a [`CommandDescriptor`] for the platform; read tools
//! answer in-process.

use space_agent_models::tool::{EntityConfig, EntityType, SatelliteTleParams, ScenarioConfig};
use space_agent_models::{CommandDescriptor, ToolKind, ToolOperation, validate_datetime};

/// The set of tools offered to the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRegistry {
    tools: Vec<ToolKind>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self {
            tools: ToolKind::ALL.to_vec(),
        }
    }
}

impl ToolRegistry {
    /// Registry offering only `tools`.
    #[must_use]
    pub fn new(tools: impl IntoIterator<Item = ToolKind>) -> Self {
        Self {
            tools: tools.into_iter().collect(),
        }
    }

    /// Registered tools, in catalog order.
    #[must_use]
    pub fn tools(&self) -> &[ToolKind] {
        &self.tools
    }

    /// Whether `kind` is offered.
    #[must_use]
    pub fn contains(&self, kind: ToolKind) -> bool {
        self.tools.contains(&kind)
    }

    /// JSON schemas for the registered tools.
    #[must_use]
    pub fn definitions(&self) -> Vec<serde_json::Value> {
        space_agent_models::tool::tool_definitions(&self.tools)
    }

    /// Answers a read tool in-process.
    #[must_use]
    pub fn execute_read(&self, operation: &ToolOperation) -> CommandDescriptor {
        match operation {
            ToolOperation::ListEntityTypes => {
                let types: Vec<serde_json::Value> = EntityType::ALL
                    .iter()
                    .map(|t| serde_json::json!({ "type": t.as_str(), "label": t.label() }))
                    .collect();
                CommandDescriptor::local(
                    operation,
                    format!("平台支持 {} 种实体类型", types.len()),
                    serde_json::Value::Array(types),
                )
            }
            other => CommandDescriptor::failure(
                other,
                format!("{} 不是本地读取工具", other.kind()),
            ),
        }
    }

    /// Builds the platform command for a query tool.
    #[must_use]
    pub fn prepare_query(&self, operation: &ToolOperation) -> CommandDescriptor {
        let message = match operation {
            ToolOperation::QueryScenario(_) => "向平台发送查询场景指令",
            ToolOperation::QueryScenarioEntities => "向平台发送查询场景实体指令",
            _ => "向平台发送查询指令",
        };
        CommandDescriptor::forward(operation, message)
    }

    /// Validates a write tool's arguments and builds its platform command.
    ///
    /// The returned descriptor has `success == false` when validation fails;
    /// it must then not be forwarded.
    #[must_use]
    pub fn prepare_write(&self, operation: &ToolOperation) -> CommandDescriptor {
        match validate_write(operation) {
            Ok(message) => CommandDescriptor::forward(operation, message),
            Err(message) => CommandDescriptor::failure(operation, message),
        }
    }
}

fn validate_write(operation: &ToolOperation) -> Result<String, String> {
    match operation {
        ToolOperation::CreateScenario(config) => validate_scenario(config),
        ToolOperation::RenameScenario(args) => {
            if args.new_name.trim().is_empty() {
                Err("请告诉我新的场景名称".to_string())
            } else {
                Ok(format!("重命名场景: {}成功", args.new_name))
            }
        }
        ToolOperation::AddPointEntity(config) => validate_entity(config),
        ToolOperation::AddSatelliteEntity(params) => validate_satellite(params),
        ToolOperation::ClearEntities => Ok("已清除当前场景中的所有实体。".to_string()),
        ToolOperation::ClearScene => Ok("场景已成功清除。".to_string()),
        other => Err(format!("{} 不是写入工具", other.kind())),
    }
}

fn validate_scenario(config: &ScenarioConfig) -> Result<String, String> {
    if config.name.trim().is_empty() {
        return Err("请告诉我场景名称".to_string());
    }
    if !validate_datetime(&config.start_time) || !validate_datetime(&config.end_time) {
        return Err("请告诉我创建场景的纪元开始时间和结束时间".to_string());
    }
    Ok(format!("场景:{} 创建成功", config.name))
}

fn validate_entity(config: &EntityConfig) -> Result<String, String> {
    if config.name.trim().is_empty() {
        return Err("请告诉我实体名称".to_string());
    }
    if let Some(position) = &config.position
        && (!(-180.0..=180.0).contains(&position.longitude)
            || !(-90.0..=90.0).contains(&position.latitude))
    {
        return Err("实体位置超出范围：经度需在 -180 到 180 之间，纬度需在 -90 到 90 之间".to_string());
    }
    Ok(format!(
        "实体: '{}', 类型: '{}' 已成功添加。",
        config.name,
        config.entity_type.as_str()
    ))
}

fn validate_satellite(params: &SatelliteTleParams) -> Result<String, String> {
    if !validate_datetime(&params.start) || !validate_datetime(&params.stop) {
        return Err("请告诉我卫星轨道计算的开始时间和结束时间".to_string());
    }
    if params.satellite_number.trim().is_empty() {
        return Err("请告诉我卫星编号".to_string());
    }

    let has_line = |prefix: &str| {
        params
            .tles
            .iter()
            .any(|line| line.trim_start().starts_with(prefix) && line.trim().len() >= 60)
    };
    if !has_line("1 ") || !has_line("2 ") {
        return Err("请提供有效的两行轨道数据（TLE）".to_string());
    }

    Ok(format!(
        "卫星 {} 的轨道计算指令已发送。",
        params.satellite_number
    ))
}
