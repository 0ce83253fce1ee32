//! 工具层：操作 Schema 注册表、无人机目录、OpenAPI 派生、动作执行

pub mod drone;
pub mod executor;
pub mod openapi;
pub mod schema;

pub use drone::{drone_registry, DRONE_SYSTEM_PROMPT, REJECT_REQUEST, SAMPLE_PROMPTS};
pub use executor::{ActionHandler, SimulatedHandler, ToolExecutor};
pub use openapi::{load_spec, openapi_to_operations, openapi_to_registry, resolve_refs};
pub use schema::{OperationSchema, SchemaRegistry};
