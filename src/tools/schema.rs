//! 可调用操作的 Schema 与注册表
//!
//! OperationSchema 即发送给模型的 function 定义（name / description / parameters），
//! SchemaRegistry 保持注册顺序并保证名称唯一、parameters 为 object 类型。

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::PilotError;

/// 一个可调用操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema，顶层恒为 {"type": "object", ...}
    pub parameters: Value,
}

impl OperationSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Result<Self, PilotError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PilotError::InvalidSchema("operation name is empty".to_string()));
        }
        let is_object = parameters.is_object()
            && parameters.get("type").and_then(Value::as_str) == Some("object");
        if !is_object {
            return Err(PilotError::InvalidSchema(format!(
                "{name}: parameters must describe an object type"
            )));
        }
        Ok(Self {
            name,
            description: description.into(),
            parameters,
        })
    }

    /// 参数 schema 的 properties 键（按声明顺序）
    pub fn property_names(&self) -> Vec<&str> {
        self.parameters
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// 有序、按名唯一的操作目录
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    operations: Vec<OperationSchema>,
    names: HashSet<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_operations(
        operations: impl IntoIterator<Item = OperationSchema>,
    ) -> Result<Self, PilotError> {
        let mut registry = Self::new();
        for op in operations {
            registry.register(op)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, op: OperationSchema) -> Result<(), PilotError> {
        if !self.names.insert(op.name.clone()) {
            return Err(PilotError::DuplicateOperation(op.name));
        }
        self.operations.push(op);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OperationSchema> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn operations(&self) -> &[OperationSchema] {
        &self.operations
    }

    pub fn names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// API tools 数组形态：[{"type": "function", "function": {...}}]
    pub fn to_tools_json(&self) -> Value {
        Value::Array(
            self.operations
                .iter()
                .map(|op| {
                    serde_json::json!({
                        "type": "function",
                        "function": op,
                    })
                })
                .collect(),
        )
    }
}
