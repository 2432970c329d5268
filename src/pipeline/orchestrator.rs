//! Request orchestration
//!
//! One call to [`Orchestrator::handle`] runs extraction, selection, invocation, recovery and
//! rendering against a single catalog snapshot, and always ends in readable text.

use std::sync::Arc;

use serde_json::Value;

use crate::config::PipelineConfig;
use crate::llm::LlmClient;
use crate::session::SessionHistory;
use crate::tools::{CatalogHandle, ToolCatalog, ToolDescriptor};

use super::extractor::ContextExtractor;
use super::fallback::{FallbackCoordinator, Recovery};
use super::invoker::{ExecutionResult, ToolInvoker};
use super::render::ResultRenderer;
use super::selector::ToolSelector;

pub const NO_TOOL_MESSAGE: &str = "Sorry, I could not find a suitable tool for your request.";

pub struct Orchestrator {
    catalog: Arc<CatalogHandle>,
    llm: Arc<dyn LlmClient>,
    extractor: ContextExtractor,
    selector: ToolSelector,
    invoker: ToolInvoker,
    renderer: ResultRenderer,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(catalog: Arc<CatalogHandle>, llm: Arc<dyn LlmClient>, config: PipelineConfig) -> Self {
        Self {
            extractor: ContextExtractor::new(llm.clone(), config.history_window),
            selector: ToolSelector::new(llm.clone()),
            invoker: ToolInvoker::new(config.min_confidence),
            renderer: ResultRenderer::new(config.locale, config.list_limit),
            catalog,
            llm,
            config,
        }
    }

    pub fn catalog(&self) -> Arc<ToolCatalog> {
        self.catalog.snapshot()
    }

    /// Publish a rebuilt catalog; requests already running keep their snapshot
    pub fn reload(&self, catalog: ToolCatalog) -> u64 {
        self.catalog.publish(catalog)
    }

    pub fn set_polish(&mut self, polish: bool) {
        self.config.polish = polish;
    }

    /// Answer one request
    pub async fn handle(&self, utterance: &str, session: &dyn SessionHistory) -> String {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return NO_TOOL_MESSAGE.to_string();
        }

        let snapshot = self.catalog.snapshot();
        log::info!("Handling request against catalog v{} ({} tools)", snapshot.version(), snapshot.len());

        let turns = session.recent_turns(self.config.history_window);
        let notes = session.user_notes();
        let extraction = self
            .extractor
            .extract(utterance, &turns, notes.as_deref(), &snapshot)
            .await;

        let Some(selection) = self
            .selector
            .select(utterance, &extraction.tools, &extraction.candidates, snapshot.tools())
            .await
        else {
            log::info!("No tool selected");
            return NO_TOOL_MESSAGE.to_string();
        };
        log::debug!("Selection reason: {}", selection.reason);

        let result = self
            .invoker
            .invoke(&snapshot, &selection.tool, &extraction.candidates, utterance)
            .await;

        let (tool, payload) = match result {
            ExecutionResult::Success(payload) => (selection.tool, payload),
            failure => {
                log::info!("'{}' did not succeed ({}), taking fallback", selection.tool.name, failure);
                let coordinator =
                    FallbackCoordinator::new(&self.selector, &self.invoker, self.config.lookup_query_tokens);
                match coordinator
                    .handle_failure(&snapshot, &selection.tool, failure, &extraction.candidates, utterance)
                    .await
                {
                    Recovery::Recovered { tool, payload } => (tool, payload),
                    Recovery::Failed(message) => return message,
                }
            }
        };

        self.present(&tool, &payload).await
    }

    async fn present(&self, tool: &ToolDescriptor, payload: &Value) -> String {
        let text = self.renderer.render(payload, &tool.name, &tool.owner);
        if self.config.polish {
            self.renderer.polish(self.llm.as_ref(), &text).await
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{ScriptedOracle, StubProvider, catalog_of};
    use crate::session::InMemorySession;
    use crate::tools::ParamType;
    use serde_json::json;

    fn no_polish() -> PipelineConfig {
        PipelineConfig {
            polish: false,
            ..PipelineConfig::default()
        }
    }

    fn search_issues() -> ToolDescriptor {
        ToolDescriptor::new("search_issues", "Search issues by text", "jira").with_required("query", ParamType::String)
    }

    #[tokio::test]
    async fn test_empty_utterance() {
        let orchestrator = Orchestrator::new(
            Arc::new(CatalogHandle::default()),
            Arc::new(ScriptedOracle::new(vec![])),
            no_polish(),
        );
        assert_eq!(orchestrator.handle("   ", &InMemorySession::new()).await, NO_TOOL_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_catalog_has_no_tool() {
        let orchestrator = Orchestrator::new(
            Arc::new(CatalogHandle::default()),
            Arc::new(ScriptedOracle::new(vec![])),
            no_polish(),
        );
        assert_eq!(orchestrator.handle("find something", &InMemorySession::new()).await, NO_TOOL_MESSAGE);
    }

    #[tokio::test]
    async fn test_happy_path_renders_with_header() {
        let provider = Arc::new(
            StubProvider::new("jira", vec![search_issues()])
                .respond("search_issues", json!([{"key": "DEMO-1", "summary": "Login"}])),
        );
        let oracle = Arc::new(ScriptedOracle::new(vec![
            r#"{"parameters": {"query": "login"}, "found_tools": ["search_issues"]}"#,
        ]));
        let orchestrator = Orchestrator::new(
            Arc::new(CatalogHandle::new(catalog_of(provider.clone()))),
            oracle,
            no_polish(),
        );

        let reply = orchestrator.handle("find issues about login", &InMemorySession::new()).await;
        assert!(reply.starts_with("Result of search_issues (jira):"));
        assert!(reply.contains("DEMO-1"));
        assert_eq!(provider.call_count("search_issues"), 1);
        assert_eq!(provider.calls()[0].args["query"], "login");
    }

    #[tokio::test]
    async fn test_polish_applied_when_enabled() {
        let provider = Arc::new(StubProvider::new("jira", vec![search_issues()]).respond("search_issues", json!("ok")));
        let oracle = Arc::new(ScriptedOracle::new(vec![
            r#"{"parameters": {"query": "login"}, "found_tools": ["search_issues"]}"#,
            "Polished reply",
        ]));
        let orchestrator = Orchestrator::new(
            Arc::new(CatalogHandle::new(catalog_of(provider))),
            oracle,
            PipelineConfig::default(),
        );
        assert_eq!(orchestrator.handle("find login", &InMemorySession::new()).await, "Polished reply");
    }

    #[tokio::test]
    async fn test_history_and_notes_reach_the_oracle() {
        let provider = Arc::new(StubProvider::new("jira", vec![search_issues()]));
        let oracle = Arc::new(ScriptedOracle::new(vec![r#"{"found_tools": ["search_issues"]}"#]));
        let orchestrator = Orchestrator::new(
            Arc::new(CatalogHandle::new(catalog_of(provider))),
            oracle.clone(),
            no_polish(),
        );
        let mut session = InMemorySession::new().with_notes("prefers project DEMO");
        session.record_exchange("first question", "first answer");
        session.record_exchange("second question", "second answer");

        orchestrator.handle("find login", &session).await;

        let prompt = &oracle.prompts()[0][1].content;
        assert!(prompt.contains("prefers project DEMO"));
        assert!(prompt.contains("second answer"));
        assert!(!prompt.contains("first question"));
    }

    #[tokio::test]
    async fn test_reload_publishes_new_snapshot() {
        let orchestrator = Orchestrator::new(
            Arc::new(CatalogHandle::default()),
            Arc::new(ScriptedOracle::new(vec![])),
            no_polish(),
        );
        let before = orchestrator.catalog();
        let version = orchestrator.reload(catalog_of(Arc::new(StubProvider::new("jira", vec![search_issues()]))));

        assert!(version > before.version());
        assert!(before.is_empty());
        assert!(orchestrator.catalog().contains("search_issues"));
    }
}
