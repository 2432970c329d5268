//! Shared mocks for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use toolpilot::llm::{LlmClient, LlmError, Message};
use toolpilot::tools::{CapabilityProvider, ProviderError, ToolCatalog, ToolDescriptor};

/// Oracle replaying canned responses in order and recording every prompt
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }

    /// The user-side content of the n-th prompt
    pub fn prompt_text(&self, n: usize) -> String {
        self.prompts()[n].iter().skip(1).map(|m| m.content.clone()).collect::<Vec<_>>().join("\n")
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Unavailable("no scripted response left".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub tool: String,
    pub args: Map<String, Value>,
    pub builtin: bool,
}

/// Provider with canned results per tool and a call log
pub struct RecordingProvider {
    id: String,
    tools: Vec<ToolDescriptor>,
    results: HashMap<String, Value>,
    builtin_results: HashMap<String, Value>,
    not_connected: bool,
    calls: Mutex<Vec<Call>>,
}

impl RecordingProvider {
    pub fn new(id: &str, tools: Vec<ToolDescriptor>) -> Self {
        Self {
            id: id.to_string(),
            tools,
            results: HashMap::new(),
            builtin_results: HashMap::new(),
            not_connected: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(mut self, tool: &str, value: Value) -> Self {
        self.results.insert(tool.to_string(), value);
        self
    }

    pub fn builtin_returning(mut self, tool: &str, value: Value) -> Self {
        self.builtin_results.insert(tool.to_string(), value);
        self
    }

    /// Primary transport answers every call with a "не подключен" error payload
    pub fn not_connected(mut self) -> Self {
        self.not_connected = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, tool: &str, builtin: bool) -> usize {
        self.calls().iter().filter(|c| c.tool == tool && c.builtin == builtin).count()
    }

    fn record(&self, tool: &str, args: &Map<String, Value>, builtin: bool) {
        self.calls.lock().unwrap().push(Call {
            tool: tool.to_string(),
            args: args.clone(),
            builtin,
        });
    }
}

#[async_trait]
impl CapabilityProvider for RecordingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        format!("recording provider {}", self.id)
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ProviderError> {
        self.record(name, args, false);
        if self.not_connected {
            return Ok(json!({"error": format!("MCP сервер {} не подключен", self.id)}));
        }
        Ok(self.results.get(name).cloned().unwrap_or_else(|| json!({"success": true})))
    }

    async fn call_tool_builtin(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ProviderError> {
        self.record(name, args, true);
        match self.builtin_results.get(name) {
            Some(value) => Ok(value.clone()),
            None => Err(ProviderError::NoBuiltin(self.id.clone())),
        }
    }
}

pub fn catalog(providers: Vec<Arc<RecordingProvider>>) -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    for provider in providers {
        catalog.add_provider(provider);
    }
    catalog
}
