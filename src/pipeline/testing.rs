//! Scripted oracle and stub provider shared by the pipeline unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::llm::{LlmClient, LlmError, Message};
use crate::tools::{CapabilityProvider, ProviderError, ToolCatalog, ToolDescriptor};

/// Oracle answering from a queue; an empty queue answers with an error
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedOracle {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedOracle {
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Unavailable("script exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub tool: String,
    pub args: Map<String, Value>,
    pub builtin: bool,
}

/// Provider with canned per-tool outcomes and a call log
pub struct StubProvider {
    id: String,
    enabled: bool,
    tools: Vec<ToolDescriptor>,
    primary: HashMap<String, Result<Value, String>>,
    builtin: HashMap<String, Result<Value, String>>,
    disconnected: bool,
    delay: Option<Duration>,
    timeout: Duration,
    calls: Mutex<Vec<RecordedCall>>,
}

impl StubProvider {
    pub fn new(id: &str, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
            tools,
            primary: HashMap::new(),
            builtin: HashMap::new(),
            disconnected: false,
            delay: None,
            timeout: Duration::from_secs(5),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, tool: &str, value: Value) -> Self {
        self.primary.insert(tool.to_string(), Ok(value));
        self
    }

    pub fn fail(mut self, tool: &str, message: &str) -> Self {
        self.primary.insert(tool.to_string(), Err(message.to_string()));
        self
    }

    pub fn builtin(mut self, tool: &str, outcome: Result<Value, String>) -> Self {
        self.builtin.insert(tool.to_string(), outcome);
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn slow(mut self, delay: Duration, timeout: Duration) -> Self {
        self.delay = Some(delay);
        self.timeout = timeout;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, tool: &str) -> usize {
        self.calls().iter().filter(|c| c.tool == tool).count()
    }

    fn record(&self, tool: &str, args: &Map<String, Value>, builtin: bool) {
        self.calls.lock().unwrap().push(RecordedCall {
            tool: tool.to_string(),
            args: args.clone(),
            builtin,
        });
    }
}

#[async_trait]
impl CapabilityProvider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn description(&self) -> String {
        format!("{} stub", self.id)
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ProviderError> {
        self.record(name, args, false);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.disconnected {
            return Err(ProviderError::NotConnected(self.id.clone()));
        }
        match self.primary.get(name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(ProviderError::Call(message.clone())),
            None => Ok(serde_json::json!({"success": true})),
        }
    }

    async fn call_tool_builtin(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ProviderError> {
        self.record(name, args, true);
        match self.builtin.get(name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(ProviderError::Call(message.clone())),
            None => Err(ProviderError::NoBuiltin(self.id.clone())),
        }
    }
}

/// Catalog holding one stub provider with the given tools
pub fn catalog_with(owner: &str, tools: Vec<ToolDescriptor>) -> ToolCatalog {
    catalog_of(Arc::new(StubProvider::new(owner, tools)))
}

/// Catalog holding the given provider
pub fn catalog_of(provider: Arc<StubProvider>) -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.add_provider(provider);
    catalog
}
