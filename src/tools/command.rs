//! Shell command provider
//!
//! Each tool maps to a bash command. Arguments arrive as a JSON object on stdin and as
//! `TOOL_ARG_<NAME>` environment variables. Stdout is parsed as JSON when possible.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::ProviderConfig;
use crate::error::{Result, ToolpilotError};

use super::definition::ToolDescriptor;
use super::provider::{CapabilityProvider, ProviderError, payload_error};

/// Maximum bytes of stdout kept from one call
pub const MAX_OUTPUT_BYTES: usize = 100_000;

pub struct CommandProvider {
    id: String,
    description: String,
    tools: Vec<ToolDescriptor>,
    commands: HashMap<String, String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl CommandProvider {
    /// Registry factory
    pub fn create(config: &ProviderConfig) -> Result<Arc<dyn CapabilityProvider>> {
        Ok(Arc::new(Self::from_config(config)?))
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let mut commands = HashMap::new();
        for tool in &config.tools {
            let command = tool.command.clone().ok_or_else(|| {
                ToolpilotError::Config(format!(
                    "command provider '{}': tool '{}' has no command",
                    config.id, tool.name
                ))
            })?;
            commands.insert(tool.name.clone(), command);
        }

        Ok(Self {
            id: config.id.clone(),
            description: config.description.clone(),
            tools: config
                .tools
                .iter()
                .map(|t| ToolDescriptor::from_config(&config.id, t))
                .collect(),
            commands,
            timeout: Duration::from_millis(config.timeout_ms),
            max_output_bytes: MAX_OUTPUT_BYTES,
        })
    }

    fn env_name(param: &str) -> String {
        let cleaned: String = param
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("TOOL_ARG_{}", cleaned)
    }

    fn env_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    async fn execute(
        &self,
        command: &str,
        args: &Map<String, Value>,
    ) -> std::result::Result<(String, bool), ProviderError> {
        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in args {
            cmd.env(Self::env_name(name), Self::env_value(value));
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProviderError::Call(format!("Failed to spawn bash: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = Value::Object(args.clone()).to_string();
            // a command that never reads stdin closes the pipe early
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                log::debug!("stdin write to '{}' failed: {}", command, e);
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
            .map_err(|e| ProviderError::Call(format!("IO error: {}", e)))?;

        let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            let mut message = stderr.trim().to_string();
            if message.is_empty() {
                message = stdout.trim().to_string();
            }
            if message.is_empty() {
                message = format!("command exited with {}", output.status);
            }
            return Ok((message, false));
        }

        if stdout.len() > self.max_output_bytes {
            let mut cut = self.max_output_bytes;
            while !stdout.is_char_boundary(cut) {
                cut -= 1;
            }
            stdout.truncate(cut);
            stdout.push_str("\n... [output truncated]");
        }
        Ok((stdout, true))
    }

    fn parse_output(stdout: &str) -> Value {
        let trimmed = stdout.trim();
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(_) => Value::String(trimmed.to_string()),
        }
    }
}

#[async_trait]
impl CapabilityProvider for CommandProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call_tool(&self, name: &str, args: &Map<String, Value>) -> std::result::Result<Value, ProviderError> {
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| ProviderError::UnknownTool(name.to_string()))?;

        log::debug!("Running command tool '{}'", name);
        let (output, success) = self.execute(command, args).await?;
        if !success {
            return Err(ProviderError::Call(output));
        }

        let value = Self::parse_output(&output);
        match payload_error(&value) {
            Some(message) => Err(ProviderError::Call(message)),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn provider(yaml: &str) -> CommandProvider {
        let config = Config::from_yaml(yaml).unwrap();
        CommandProvider::from_config(&config.providers[0]).unwrap()
    }

    const YAML: &str = r#"
providers:
  - id: shell
    kind: command
    timeout-ms: 500
    tools:
      - name: echo_project
        command: 'printf "{\"key\": \"%s\"}" "$TOOL_ARG_PROJECT_KEY"'
        params:
          - { name: project_key, required: true }
      - name: read_stdin
        command: cat
      - name: plain
        command: echo hello
      - name: fails
        command: 'echo broken >&2; exit 3'
      - name: reports_error
        command: 'echo "{\"error\": \"Сервер не подключен\"}"'
      - name: slow
        command: sleep 5
"#;

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_env_name() {
        assert_eq!(CommandProvider::env_name("project_key"), "TOOL_ARG_PROJECT_KEY");
        assert_eq!(CommandProvider::env_name("file-path"), "TOOL_ARG_FILE_PATH");
    }

    #[test]
    fn test_missing_command_rejected() {
        let config = Config::from_yaml("providers:\n  - { id: s, kind: command, tools: [{ name: t }] }\n").unwrap();
        assert!(CommandProvider::from_config(&config.providers[0]).is_err());
    }

    #[tokio::test]
    async fn test_args_via_env() {
        let result = provider(YAML)
            .call_tool("echo_project", &args(&[("project_key", json!("DEMO"))]))
            .await
            .unwrap();
        assert_eq!(result, json!({"key": "DEMO"}));
    }

    #[tokio::test]
    async fn test_args_via_stdin() {
        let result = provider(YAML)
            .call_tool("read_stdin", &args(&[("limit", json!(5))]))
            .await
            .unwrap();
        assert_eq!(result, json!({"limit": 5}));
    }

    #[tokio::test]
    async fn test_plain_text_output() {
        let result = provider(YAML).call_tool("plain", &Map::new()).await.unwrap();
        assert_eq!(result, json!("hello"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_call_error() {
        let err = provider(YAML).call_tool("fails", &Map::new()).await.unwrap_err();
        assert!(matches!(&err, ProviderError::Call(msg) if msg == "broken"));
    }

    #[tokio::test]
    async fn test_error_payload_keeps_marker() {
        let err = provider(YAML).call_tool("reports_error", &Map::new()).await.unwrap_err();
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = provider(YAML).call_tool("slow", &Map::new()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = provider(YAML).call_tool("nope", &Map::new()).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownTool(_)));
    }
}
