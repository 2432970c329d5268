//! Static provider returning canned responses from configuration

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::config::ProviderConfig;
use crate::error::Result;

use super::definition::ToolDescriptor;
use super::provider::{CapabilityProvider, ProviderError, payload_error};

pub struct CannedProvider {
    id: String,
    description: String,
    tools: Vec<ToolDescriptor>,
    responses: HashMap<String, Value>,
}

impl CannedProvider {
    /// Registry factory
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn CapabilityProvider>> {
        Ok(Arc::new(Self::from_config(config)))
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        let responses = config
            .tools
            .iter()
            .map(|t| (t.name.clone(), t.response.clone().unwrap_or_else(|| json!({"success": true}))))
            .collect();

        Self {
            id: config.id.clone(),
            description: config.description.clone(),
            tools: config
                .tools
                .iter()
                .map(|t| ToolDescriptor::from_config(&config.id, t))
                .collect(),
            responses,
        }
    }
}

#[async_trait]
impl CapabilityProvider for CannedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    async fn call_tool(&self, name: &str, _args: &Map<String, Value>) -> std::result::Result<Value, ProviderError> {
        let response = self
            .responses
            .get(name)
            .ok_or_else(|| ProviderError::UnknownTool(name.to_string()))?;
        match payload_error(response) {
            Some(message) => Err(ProviderError::Call(message)),
            None => Ok(response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const YAML: &str = r#"
providers:
  - id: demo
    kind: static
    tools:
      - name: list_projects
        response: [{ key: DEMO, name: Demo project }]
      - name: ping
      - name: offline
        response: { error: Server not connected }
"#;

    fn provider() -> CannedProvider {
        let config = Config::from_yaml(YAML).unwrap();
        CannedProvider::from_config(&config.providers[0])
    }

    #[tokio::test]
    async fn test_configured_response() {
        let value = provider().call_tool("list_projects", &Map::new()).await.unwrap();
        assert_eq!(value[0]["key"], "DEMO");
    }

    #[tokio::test]
    async fn test_default_response() {
        let value = provider().call_tool("ping", &Map::new()).await.unwrap();
        assert_eq!(value, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_error_payload() {
        let err = provider().call_tool("offline", &Map::new()).await.unwrap_err();
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn test_unknown() {
        let err = provider().call_tool("missing", &Map::new()).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownTool(_)));
    }
}
