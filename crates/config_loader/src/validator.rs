//! 配置校验模块
//!
//! 字段级规则由 `validator` derive 完成 (非空名称、窗口宽度 > 0 等)，
//! 这里补充跨字段规则：
//! - 节点 id、名称唯一
//! - 恰好一个触发节点
//! - 节点数不超过 32 (计分板位宽)
//! - sink 名称唯一且非空

use std::collections::HashSet;

use contracts::{ContractError, DaqBlueprint};
use validator::Validate;

/// 计分板能容纳的最大节点数
pub const MAX_NODES: usize = 32;

/// 校验 DaqBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    validate_node_count(blueprint)?;
    validate_fields(blueprint)?;
    validate_node_ids(blueprint)?;
    validate_node_names(blueprint)?;
    validate_trigger(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_fields(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        // 只报告第一个出错的字段路径
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

fn validate_node_count(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    if blueprint.nodes.len() > MAX_NODES {
        return Err(ContractError::TooManyNodes {
            count: blueprint.nodes.len(),
            max: MAX_NODES,
        });
    }
    Ok(())
}

/// 校验节点 id 唯一性
fn validate_node_ids(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for node in &blueprint.nodes {
        if !seen.insert(node.id) {
            return Err(ContractError::config_validation(
                format!("nodes[id={:#06x}]", node.id),
                "duplicate node id",
            ));
        }
    }
    Ok(())
}

/// 校验节点名称唯一性
fn validate_node_names(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for node in &blueprint.nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("nodes[name={}]", node.name),
                "duplicate node name",
            ));
        }
    }
    Ok(())
}

fn validate_trigger(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    let triggers: Vec<_> = blueprint
        .nodes
        .iter()
        .filter(|n| n.trigger)
        .map(|n| n.name.as_str())
        .collect();

    match triggers.len() {
        1 => Ok(()),
        0 => Err(ContractError::config_validation(
            "nodes.trigger",
            "exactly one trigger node is required, found none",
        )),
        _ => Err(ContractError::config_validation(
            "nodes.trigger",
            format!(
                "exactly one trigger node is required, found {}",
                triggers.join(", ")
            ),
        )),
    }
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                format!("duplicate sink name '{}'", sink.name),
            ));
        }
    }
    Ok(())
}
