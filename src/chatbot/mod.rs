
use std::sync::Arc;
use tracing::info;

use crate::Result;
use crate::answer::{Answer, AnswerGenerator, ConversationTurn};
use crate::config::Config;
use crate::index::KnowledgeBase;
use crate::llm::LlmProvider;
use crate::retrieval::Retriever;

/// Retrieve-then-generate pipeline behind the query endpoint and `ask`
#[derive(Debug)]
pub struct Chatbot {
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl Chatbot {
    #[inline]
    pub fn new(retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Wire a chatbot that reads whatever index `knowledge` currently serves
    #[inline]
    pub fn from_config(
        config: &Config,
        knowledge: &KnowledgeBase,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let retriever = Retriever::new(
            knowledge.handle(),
            knowledge.embedder(),
            config.retrieval.top_k,
        );
        Self::new(retriever, AnswerGenerator::from_config(config, llm))
    }

    #[inline]
    pub async fn ask(&self, query: &str, history: &[ConversationTurn]) -> Result<Answer> {
        let documents = self.retriever.retrieve(query).await?;
        let answer = self.generator.generate(query, &documents, history).await?;
        info!(
            "Answered query with {} documents (grounded: {})",
            documents.len(),
            answer.grounded
        );
        Ok(answer)
    }
}
