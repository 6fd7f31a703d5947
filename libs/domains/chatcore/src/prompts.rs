//! System prompt loading: read overrides from the document store, falling back
//! to built-in defaults when a key is absent.

use crate::error::ChatCoreResult;
use crate::traits::DocumentStore;

pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";
pub const RAG_PROMPT_TEMPLATE_KEY: &str = "rag_prompt_template";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's questions clearly and concisely.";

/// Must contain a `{context}` placeholder; `format_rag_prompt` substitutes it.
pub const DEFAULT_RAG_PROMPT_TEMPLATE: &str = "You are a helpful assistant. Use the following context to answer the user's question. If the context doesn't contain the answer, say so rather than guessing.\n\nContext:\n{context}";

pub struct LoadedPrompts {
    pub system_prompt: String,
    pub rag_prompt_template: String,
}

pub async fn load_prompts(store: &dyn DocumentStore) -> ChatCoreResult<LoadedPrompts> {
    let system_prompt = store
        .get_prompt(SYSTEM_PROMPT_KEY)
        .await?
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    let rag_prompt_template = store
        .get_prompt(RAG_PROMPT_TEMPLATE_KEY)
        .await?
        .unwrap_or_else(|| DEFAULT_RAG_PROMPT_TEMPLATE.to_string());

    Ok(LoadedPrompts {
        system_prompt,
        rag_prompt_template,
    })
}

/// Substitute `{context}` in `template` with the joined knowledge-base context.
pub fn format_rag_prompt(template: &str, context: &str) -> String {
    template.replace("{context}", context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockDocumentStore;

    #[tokio::test]
    async fn falls_back_to_defaults_when_store_has_no_overrides() {
        let mut store = MockDocumentStore::new();
        store.expect_get_prompt().returning(|_| Ok(None));

        let prompts = load_prompts(&store).await.unwrap();
        assert_eq!(prompts.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(prompts.rag_prompt_template, DEFAULT_RAG_PROMPT_TEMPLATE);
    }

    #[tokio::test]
    async fn uses_store_override_when_present() {
        let mut store = MockDocumentStore::new();
        store
            .expect_get_prompt()
            .withf(|key| key == SYSTEM_PROMPT_KEY)
            .returning(|_| Ok(Some("custom prompt".to_string())));
        store
            .expect_get_prompt()
            .withf(|key| key == RAG_PROMPT_TEMPLATE_KEY)
            .returning(|_| Ok(None));

        let prompts = load_prompts(&store).await.unwrap();
        assert_eq!(prompts.system_prompt, "custom prompt");
    }

    #[test]
    fn format_rag_prompt_substitutes_context() {
        let out = format_rag_prompt("ctx: {context}", "some facts");
        assert_eq!(out, "ctx: some facts");
    }
}
