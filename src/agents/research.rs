// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Research agent
//!
//! Gathers web evidence about the subject and compiles it into a sourced
//! brief. Empty search results are tolerated; the brief then records that no
//! usable evidence was found instead of failing the stage.

use async_trait::async_trait;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

use super::{system_prompt, StageAgent, StageInput, StageOutput};
use crate::errors::EvalflowError;
use crate::llm::{ChatBackend, ChatMessage, ChatRequest};
use crate::pipeline::{Role, Stage};
use crate::tools::{Snippet, WebResearch};

/// Research agent
pub struct ResearchAgent {
    backend: Arc<dyn ChatBackend>,
    research_tool: Arc<dyn WebResearch>,
    url_pattern: Regex,
}

impl ResearchAgent {
    pub fn new(backend: Arc<dyn ChatBackend>, research_tool: Arc<dyn WebResearch>) -> Self {
        Self {
            backend,
            research_tool,
            url_pattern: Regex::new(r"https?://[^\s)>\]]+").expect("invalid url pattern"),
        }
    }

    fn format_evidence(snippets: &[Snippet]) -> String {
        if snippets.is_empty() {
            return "No usable web evidence was found for this subject.".to_string();
        }

        let mut section = String::new();
        for (i, snippet) in snippets.iter().enumerate() {
            let title = snippet.title.as_deref().unwrap_or("untitled");
            let _ = writeln!(
                section,
                "{}. {} ({})\n{}\n",
                i + 1,
                title,
                snippet.source_url,
                snippet.text.trim()
            );
        }
        section
    }
}

#[async_trait]
impl StageAgent for ResearchAgent {
    async fn execute(
        &self,
        stage: &Stage,
        input: &StageInput,
    ) -> Result<StageOutput, EvalflowError> {
        let mut snippets = self.research_tool.search(&input.subject).await?;

        // Pages named directly in the subject are scraped as evidence too
        for url in self.url_pattern.find_iter(&input.subject) {
            if let Some(snippet) = self.research_tool.fetch(url.as_str()).await? {
                snippets.push(snippet);
            }
        }

        debug!(stage = %stage.name, snippets = snippets.len(), "web research completed");

        let evidence = Self::format_evidence(&snippets);

        let request = ChatRequest::new(vec![
            ChatMessage::system(system_prompt(stage)),
            ChatMessage::user(format!(
                "{}\n\nSubject:\n{}\n\nWeb evidence:\n{}",
                stage.prompt.instructions, input.subject, evidence
            )),
        ]);

        let response = self.backend.complete(request).await?;
        Ok(StageOutput::text(response.text))
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), EvalflowError> {
        if stage.role != Role::Research {
            return Err(EvalflowError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Expected a research stage".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatResponse;
    use crate::pipeline::Pipeline;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, EvalflowError> {
            Ok(ChatResponse {
                text: request.messages.last().unwrap().content.clone(),
            })
        }
    }

    struct FixedSearch {
        snippets: Vec<Snippet>,
        page: Option<Snippet>,
    }

    impl FixedSearch {
        fn results(snippets: Vec<Snippet>) -> Self {
            Self {
                snippets,
                page: None,
            }
        }

        fn with_page(page: Snippet) -> Self {
            Self {
                snippets: Vec::new(),
                page: Some(page),
            }
        }
    }

    #[async_trait]
    impl WebResearch for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<Snippet>, EvalflowError> {
            Ok(self.snippets.clone())
        }

        async fn fetch(&self, _url: &str) -> Result<Option<Snippet>, EvalflowError> {
            Ok(self.page.clone())
        }
    }

    fn research_stage() -> Stage {
        Pipeline::speaker_evaluation_template("t", "#c").stages[0].clone()
    }

    #[tokio::test]
    async fn test_evidence_reaches_the_prompt() {
        let agent = ResearchAgent::new(
            Arc::new(EchoBackend),
            Arc::new(FixedSearch::results(vec![Snippet {
                text: "Keynote at RustConf".into(),
                source_url: "https://example.com/talk".into(),
                title: Some("RustConf 2024".into()),
            }])),
        );

        let output = agent
            .execute(&research_stage(), &StageInput::initial("Dr. Doe"))
            .await
            .unwrap();

        assert!(output.text.contains("Keynote at RustConf"));
        assert!(output.text.contains("https://example.com/talk"));
    }

    #[tokio::test]
    async fn test_urls_in_the_subject_are_scraped() {
        let agent = ResearchAgent::new(
            Arc::new(EchoBackend),
            Arc::new(FixedSearch::with_page(Snippet {
                text: "Maintains a popular tracing library".into(),
                source_url: "https://example.com/profile".into(),
                title: Some("Profile".into()),
            })),
        );

        let output = agent
            .execute(
                &research_stage(),
                &StageInput::initial("Dr. Doe, see https://example.com/profile"),
            )
            .await
            .unwrap();

        assert!(output.text.contains("Maintains a popular tracing library"));
        assert!(output.text.contains("https://example.com/profile"));
    }

    #[tokio::test]
    async fn test_empty_search_results_are_not_an_error() {
        let agent = ResearchAgent::new(Arc::new(EchoBackend), Arc::new(FixedSearch::results(vec![])));

        let output = agent
            .execute(&research_stage(), &StageInput::initial("Dr. Doe"))
            .await
            .unwrap();

        assert!(output.text.contains("No usable web evidence"));
    }

    #[test]
    fn test_validate_rejects_wrong_role() {
        let agent =
            ResearchAgent::new(Arc::new(EchoBackend), Arc::new(FixedSearch::results(vec![])));
        let stage = Pipeline::speaker_evaluation_template("t", "#c").stages[1].clone();
        assert!(agent.validate_stage(&stage).is_err());
    }
}
