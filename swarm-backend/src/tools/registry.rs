use crate::tools::error::ToolError;
use crate::tools::types::{ToolCategory, ToolContext, ToolDefinition, ToolOutput};
use async_trait::async_trait;
use jsonschema::{JSONSchema, ValidationError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition (name, description, input schema)
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool. Parameters have already been validated against
    /// the declared schema when called through a `ToolHandle`.
    async fn execute(&self, params: Value, context: &ToolContext) -> Result<ToolOutput, ToolError>;

    /// Returns the tool's name
    fn name(&self) -> String {
        self.definition().name
    }
}

/// Compile a tool's published JSON Schema. The top level must describe an
/// object, since parameters are always passed as a JSON object.
pub fn compile_schema(schema: &Value) -> Result<JSONSchema, String> {
    if !schema.is_object() {
        return Err("schema must be a JSON object".to_string());
    }
    if let Some(t) = schema.get("type") {
        if t.as_str() != Some("object") {
            return Err(format!("top-level schema type must be 'object', got {}", t));
        }
    }
    JSONSchema::compile(schema).map_err(|e| e.to_string())
}

fn describe(error: &ValidationError<'_>) -> String {
    let path = error.instance_path.to_string();
    if path.is_empty() {
        error.to_string()
    } else {
        format!("{}: {}", path, error)
    }
}

/// A registered tool together with the category it was registered under
/// and its compiled schema. Cheap to clone; this is what agents hold on to.
#[derive(Clone)]
pub struct ToolHandle {
    category: ToolCategory,
    definition: Arc<ToolDefinition>,
    validator: Arc<JSONSchema>,
    tool: Arc<dyn Tool>,
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("category", &self.category)
            .field("name", &self.definition.name)
            .finish()
    }
}

impl ToolHandle {
    fn new(category: ToolCategory, tool: Arc<dyn Tool>) -> Result<Self, ToolError> {
        let definition = tool.definition();
        let validator = compile_schema(&definition.input_schema).map_err(|reason| {
            ToolError::Configuration(format!(
                "tool '{}' has an invalid input schema: {}",
                definition.name, reason
            ))
        })?;
        Ok(ToolHandle {
            category,
            definition: Arc::new(definition),
            validator: Arc::new(validator),
            tool,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn category(&self) -> ToolCategory {
        self.category
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// `category/name`, unique within a registry
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.category, self.definition.name)
    }

    /// Validate `params` against the declared schema, then execute.
    /// `null` is treated as `{}`.
    pub async fn invoke(&self, params: Value, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let params = if params.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            params
        };

        let problems: Vec<String> = match self.validator.validate(&params) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| describe(&e)).collect(),
        };
        if !problems.is_empty() {
            return Err(ToolError::validation(self.name(), problems.join("; ")));
        }

        let started = Instant::now();
        let result = self.tool.execute(params, context).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &result {
            Ok(_) => log::debug!(
                "[REGISTRY] {} ok in {}ms (request={:?})",
                self.qualified_name(),
                elapsed_ms,
                context.request_id
            ),
            Err(e) => log::debug!(
                "[REGISTRY] {} failed in {}ms (request={:?}, kind={}): {}",
                self.qualified_name(),
                elapsed_ms,
                context.request_id,
                e.kind(),
                e
            ),
        }

        result
    }
}

type ToolKey = (ToolCategory, String);

/// Registry of tools keyed by `(category, name)`.
///
/// Registration goes through a write lock and whole batches are applied
/// atomically, so readers never observe a half-registered category.
/// Duplicate `(category, name)` pairs are rejected.
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<ToolKey, ToolHandle>>,
    bootstrapped: Mutex<bool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: RwLock::new(BTreeMap::new()),
            bootstrapped: Mutex::new(false),
        }
    }

    /// Register a single tool under `category`.
    pub fn register(&self, tool: Arc<dyn Tool>, category: ToolCategory) -> Result<(), ToolError> {
        self.register_many(category, vec![tool])
    }

    /// Register a batch of tools under one category. Either every tool in the
    /// batch is registered, or none is.
    pub fn register_many(
        &self,
        category: ToolCategory,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Result<(), ToolError> {
        let handles = prepare(category, tools)?;
        self.insert_all(handles).map(|_| ())
    }

    /// Register every built-in tool exactly once. Later calls are no-ops that
    /// return `Ok(0)`. All categories are checked before any is inserted, so a
    /// failed bootstrap leaves the registry untouched.
    pub fn bootstrap(&self) -> Result<usize, ToolError> {
        let mut done = self.bootstrapped.lock();
        if *done {
            log::debug!("[REGISTRY] Bootstrap already ran, skipping");
            return Ok(0);
        }

        let mut handles = Vec::new();
        for (category, tools) in crate::tools::builtin_tools() {
            handles.extend(prepare(category, tools)?);
        }
        let count = self.insert_all(handles)?;
        *done = true;

        log::info!("[REGISTRY] Bootstrapped {} built-in tools", count);
        Ok(count)
    }

    pub fn is_bootstrapped(&self) -> bool {
        *self.bootstrapped.lock()
    }

    fn insert_all(&self, handles: Vec<ToolHandle>) -> Result<usize, ToolError> {
        let mut tools = self.tools.write();
        let mut incoming = HashSet::new();
        for handle in &handles {
            let key = (handle.category(), handle.name().to_string());
            if tools.contains_key(&key) || !incoming.insert(key) {
                return Err(ToolError::Configuration(format!(
                    "tool '{}' is already registered",
                    handle.qualified_name()
                )));
            }
        }

        let count = handles.len();
        for handle in handles {
            log::debug!("[REGISTRY] Registered {}", handle.qualified_name());
            tools.insert((handle.category(), handle.name().to_string()), handle);
        }
        Ok(count)
    }

    /// Get a tool by category and name
    pub fn get(&self, category: ToolCategory, name: &str) -> Result<ToolHandle, ToolError> {
        self.tools
            .read()
            .get(&(category, name.to_string()))
            .cloned()
            .ok_or_else(|| ToolError::not_found(Some(category), name))
    }

    /// Resolve a capability name. Accepts `category/name`, or a bare name
    /// which is looked up in `ToolCategory::all()` order.
    pub fn find(&self, capability: &str) -> Result<ToolHandle, ToolError> {
        if let Some((category, name)) = capability.split_once('/') {
            let category = category
                .parse::<ToolCategory>()
                .map_err(|_| ToolError::not_found(None, capability))?;
            return self.get(category, name);
        }

        let tools = self.tools.read();
        ToolCategory::all()
            .into_iter()
            .find_map(|category| tools.get(&(category, capability.to_string())).cloned())
            .ok_or_else(|| ToolError::not_found(None, capability))
    }

    /// Resolve an agent's declared capability list into tools, preserving
    /// declaration order and dropping repeats. Unknown names are an error.
    pub fn tools_for_agent(&self, capability_names: &[String]) -> Result<Vec<ToolHandle>, ToolError> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(capability_names.len());
        for capability in capability_names {
            let handle = self.find(capability)?;
            if seen.insert(handle.qualified_name()) {
                resolved.push(handle);
            }
        }
        Ok(resolved)
    }

    /// List all registered tools, ordered by category then name
    pub fn list(&self) -> Vec<ToolHandle> {
        self.tools.read().values().cloned().collect()
    }

    pub fn has_tool(&self, category: ToolCategory, name: &str) -> bool {
        self.tools.read().contains_key(&(category, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

/// Compile schemas and check names for one category's batch
fn prepare(category: ToolCategory, tools: Vec<Arc<dyn Tool>>) -> Result<Vec<ToolHandle>, ToolError> {
    tools
        .into_iter()
        .map(|tool| {
            let handle = ToolHandle::new(category, tool)?;
            let name = handle.name();
            if name.trim().is_empty() {
                return Err(ToolError::Configuration(format!(
                    "tool in category '{}' has an empty name",
                    category
                )));
            }
            if name.contains('/') {
                return Err(ToolError::Configuration(format!(
                    "tool name '{}' must not contain '/'",
                    name
                )));
            }
            Ok(handle)
        })
        .collect()
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
