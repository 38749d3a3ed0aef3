//! Keyword-intent search agent.
//!
//! Classifies the query into a source intent, runs one similarity search
//! against the store, and asks the LLM gateway to synthesize an answer
//! from the retrieved context. Any gateway failure degrades to a plain
//! formatted rendering of the raw results; a search turn never fails
//! because the model endpoint is down.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::gateway::LlmGateway;
use crate::models::{ConversationTurn, Intent, QueryResult};
use crate::store::VectorStore;

/// Terms that mark a query as being about cluster state. Checked before
/// the repository terms so "deployment" outranks an incidental "file".
const KUBERNETES_TERMS: &[&str] = &[
    "pod",
    "pods",
    "service",
    "services",
    "deployment",
    "deployments",
    "namespace",
    "namespaces",
    "ingress",
    "ingresses",
    "configmap",
    "configmaps",
    "secret",
    "secrets",
    "kubernetes",
    "k8s",
    "cluster",
    "kubectl",
];

const GITHUB_TERMS: &[&str] = &[
    "code",
    "file",
    "files",
    "repository",
    "repositories",
    "repo",
    "repos",
    "function",
    "functions",
    "class",
    "classes",
    "import",
    "imports",
    "commit",
    "commits",
    "github",
    "readme",
];

const SYSTEM_PROMPT: &str = "You are a knowledge-base assistant. Answer the user's \
question using only the provided context documents. Cite document titles when you \
draw on them. If the context does not contain the answer, say so plainly.";

/// Classify a query by exact token match against the intent term lists.
///
/// Tokens are lowercased and split on non-alphanumeric characters, so
/// "Pods," matches "pods" but "podcast" matches nothing.
pub fn classify_intent(query: &str) -> Intent {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    let k8s = tokens.iter().any(|t| KUBERNETES_TERMS.contains(&t.as_str()));
    let github = tokens.iter().any(|t| GITHUB_TERMS.contains(&t.as_str()));

    match (k8s, github) {
        (true, true) => Intent::Mixed,
        (true, false) => Intent::Kubernetes,
        (false, true) => Intent::Github,
        (false, false) => Intent::Unknown,
    }
}

pub struct SearchAgent {
    store: VectorStore,
    gateway: LlmGateway,
    top_k: usize,
}

impl SearchAgent {
    pub fn new(store: VectorStore, gateway: LlmGateway, top_k: usize) -> Self {
        Self {
            store,
            gateway,
            top_k,
        }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Run one search turn. Store failures propagate; gateway failures
    /// degrade to [`format_results`] output with `degraded = true`.
    ///
    /// `history` is the session's prior turns. It shapes the turn log
    /// only; context sent to the model comes from retrieval, not from
    /// earlier exchanges.
    pub async fn answer(
        &self,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<ConversationTurn> {
        let intent = classify_intent(query);
        debug!(intent = %intent, history_len = history.len(), "search turn");
        let results = self
            .store
            .query(query, intent.source_filter(), self.top_k)
            .await
            .context("similarity search failed")?;

        if results.is_empty() {
            return Ok(ConversationTurn {
                query: query.to_string(),
                intent,
                results,
                response_text: "No matching documents found. Try `operius sync` first, or \
                                rephrase the question."
                    .to_string(),
                degraded: false,
            });
        }

        let (response_text, degraded) = if self.gateway.configured() {
            let prompt = build_prompt(query, &results);
            match self.gateway.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(text) => (text, false),
                Err(e) => {
                    warn!(error = %e, "gateway call failed, falling back to raw results");
                    (format_results(&results), true)
                }
            }
        } else {
            (format_results(&results), true)
        };

        Ok(ConversationTurn {
            query: query.to_string(),
            intent,
            results,
            response_text,
            degraded,
        })
    }
}

fn build_prompt(query: &str, results: &[QueryResult]) -> String {
    let mut prompt = String::from("Context documents:\n\n");
    for result in results {
        prompt.push_str(&format!(
            "--- [{}] {} (source: {}, score: {:.3}) ---\n{}\n\n",
            result.rank,
            result.document.title,
            result.document.source,
            result.score,
            snippet(&result.document.content, 1500),
        ));
    }
    prompt.push_str(&format!("Question: {}", query));
    prompt
}

/// Plain rendering of search hits, used whenever the gateway is missing
/// or fails. Always non-empty for a non-empty result set.
pub fn format_results(results: &[QueryResult]) -> String {
    let mut out = format!("Found {} matching document(s):\n", results.len());
    for result in results {
        out.push_str(&format!(
            "\n{}. {} [{}] (score: {:.3})\n   {}\n",
            result.rank,
            result.document.title,
            result.document.source,
            result.score,
            snippet(&result.document.content, 200).replace('\n', " "),
        ));
    }
    out
}

fn snippet(content: &str, max: usize) -> String {
    if content.len() <= max {
        return content.to_string();
    }
    let mut end = max;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &content[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_deterministic() {
        assert_eq!(classify_intent("Find all running pods"), Intent::Kubernetes);
        assert_eq!(
            classify_intent("What's in the GitHub repository?"),
            Intent::Github
        );
        assert_eq!(
            classify_intent("Show me Kubernetes configs and related code"),
            Intent::Mixed
        );
        assert_eq!(classify_intent("hello"), Intent::Unknown);
    }

    #[test]
    fn test_kubernetes_intent() {
        assert_eq!(classify_intent("show me the failing pods"), Intent::Kubernetes);
        assert_eq!(classify_intent("what services are exposed?"), Intent::Kubernetes);
    }

    #[test]
    fn test_github_intent() {
        assert_eq!(classify_intent("where is the retry function?"), Intent::Github);
        assert_eq!(classify_intent("show recent commits"), Intent::Github);
    }

    #[test]
    fn test_mixed_intent() {
        assert_eq!(
            classify_intent("which file defines the payment deployment?"),
            Intent::Mixed
        );
    }

    #[test]
    fn test_unknown_intent() {
        assert_eq!(classify_intent("how does billing work?"), Intent::Unknown);
    }

    #[test]
    fn test_tokenization_is_exact_match() {
        // Substrings never match: "podcast" is not "pod".
        assert_eq!(classify_intent("my favorite podcast"), Intent::Unknown);
        // Punctuation is stripped before matching.
        assert_eq!(classify_intent("Pods!"), Intent::Kubernetes);
    }
}
