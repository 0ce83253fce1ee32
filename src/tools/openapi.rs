//! 从 OpenAPI 接口描述派生操作 Schema
//!
//! 按 (path, method) 逐个生成 OperationSchema，每个操作先内联它自己用到的 `$ref`（`#/...` JSON Pointer），
//! 未被任何操作引用的 components（哪怕是递归定义）不参与展开：
//! - name：operationId（缺失时由 method 与 path 拼出）
//! - description：description，其次 summary
//! - parameters：requestBody 的 application/json schema 放在 `requestBody`，
//!   各参数的 schema 放在 `parameters.<name>`；都没有时 properties 为空

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::core::PilotError;
use crate::tools::{OperationSchema, SchemaRegistry};

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// 读取并解析接口描述文件
pub fn load_spec(path: &Path) -> Result<Value, PilotError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PilotError::SpecRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| PilotError::SpecParse(format!("{}: {e}", path.display())))
}

/// 内联文档中的所有本地 `$ref`
///
/// 引用对象整体被目标替换（同级键丢弃）；目标内的引用递归展开。
pub fn resolve_refs(doc: &Value) -> Result<Value, PilotError> {
    let mut stack = Vec::new();
    resolve_value(doc, doc, &mut stack)
}

fn resolve_value(root: &Value, value: &Value, stack: &mut Vec<String>) -> Result<Value, PilotError> {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                return resolve_reference(root, reference, stack);
            }
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(root, v, stack)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_value(root, v, stack))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    root: &Value,
    reference: &str,
    stack: &mut Vec<String>,
) -> Result<Value, PilotError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| PilotError::UnresolvedRef(format!("{reference} (only local references are supported)")))?;
    if stack.iter().any(|r| r == reference) {
        return Err(PilotError::RefCycle(reference.to_string()));
    }
    let target = root
        .pointer(pointer)
        .ok_or_else(|| PilotError::UnresolvedRef(reference.to_string()))?;

    stack.push(reference.to_string());
    let resolved = resolve_value(root, target, stack);
    stack.pop();
    resolved
}

/// 从接口描述派生操作列表（保持文档顺序）
pub fn openapi_to_operations(spec: &Value) -> Result<Vec<OperationSchema>, PilotError> {
    let paths = spec
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| PilotError::SpecParse("missing `paths` object".to_string()))?;

    let mut operations = Vec::new();
    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else {
            tracing::debug!(path = %path, "path item is not an object, skipped");
            continue;
        };
        for (method, op) in methods {
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }
            let op = resolve_value(spec, op, &mut Vec::new())?;
            operations.push(derive_operation(path, method, &op)?);
        }
    }
    Ok(operations)
}

/// 派生并注册为 SchemaRegistry；operationId 重复时报错
pub fn openapi_to_registry(spec: &Value) -> Result<SchemaRegistry, PilotError> {
    SchemaRegistry::from_operations(openapi_to_operations(spec)?)
}

fn derive_operation(path: &str, method: &str, op: &Value) -> Result<OperationSchema, PilotError> {
    let name = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| fallback_name(method, path));

    let description = op
        .get("description")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| op.get("summary").and_then(Value::as_str))
        .unwrap_or_default();

    let mut properties = Map::new();

    let request_body = op
        .pointer("/requestBody/content/application~1json/schema")
        .filter(|s| !s.is_null());
    if let Some(schema) = request_body {
        properties.insert("requestBody".to_string(), schema.clone());
    }

    let params = op
        .get("parameters")
        .and_then(Value::as_array)
        .filter(|p| !p.is_empty());
    if let Some(params) = params {
        let param_properties: Map<String, Value> = params
            .iter()
            .filter_map(|p| {
                let name = p.get("name")?.as_str()?;
                let schema = p.get("schema")?;
                Some((name.to_string(), schema.clone()))
            })
            .collect();
        properties.insert(
            "parameters".to_string(),
            json!({"type": "object", "properties": param_properties}),
        );
    }

    OperationSchema::new(
        name,
        description,
        json!({"type": "object", "properties": properties}),
    )
}

/// operationId 缺失时的名字：get /events/{id} -> get_events_id
fn fallback_name(method: &str, path: &str) -> String {
    let mut name = method.to_lowercase();
    let mut pending_sep = true;
    for c in path.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep {
                name.push('_');
                pending_sep = false;
            }
            name.push(c);
        } else {
            pending_sep = true;
        }
    }
    name
}
