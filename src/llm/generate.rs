use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::RagError;
use crate::models::{ContextChunk, GenerationResult};
use crate::pipeline::Generator;

/// Medical disclaimer, guaranteed verbatim in every answer.
pub const MEDICAL_DISCLAIMER: &str = "⚠️ Bu bilgi tıbbi tavsiye değildir. \
    Sağlık kararlarınız için mutlaka hekiminize danışın.";

/// Per-chunk character budget inside the context block.
const MAX_CHUNK_CHARS: usize = 500;

/// Provider call attempts before degrading to the fallback answer.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay, doubled on each retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Grounded-answer client for the OpenAI chat completions API.
///
/// Builds a numbered-source context block, enforces the medical disclaimer
/// and retries transient provider failures with exponential backoff.
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_context_chunks: usize,
}

impl GenerationClient {
    pub fn new(http: reqwest::Client, config: &LlmConfig, max_context_chunks: usize) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().unwrap_or_default(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_context_chunks,
        }
    }

    async fn call_provider(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<(String, u32), ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!(
                "chat API returned {status}: {body}"
            )));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Fatal(format!("invalid chat response: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Fatal("chat response had no choices".to_string()))?;

        let tokens = body.usage.map(|u| u.total_tokens).unwrap_or(0);
        Ok((content, tokens))
    }
}

#[async_trait::async_trait]
impl Generator for GenerationClient {
    async fn generate(
        &self,
        question: &str,
        context_chunks: &[ContextChunk],
    ) -> Result<GenerationResult, RagError> {
        // Designed short-circuit, not an error: no context means no provider
        // call and a canned answer.
        if context_chunks.is_empty() {
            tracing::warn!("No context chunks provided for answer generation");
            return Ok(GenerationResult {
                answer: format!(
                    "Üzgünüm, bu soruyla ilgili bilgi bulamadım. \
                     Lütfen sorunuzu farklı şekilde ifade etmeyi deneyin.\n\n{MEDICAL_DISCLAIMER}"
                ),
                tokens_used: 0,
                model: self.model.clone(),
                error: None,
            });
        }

        let context_block = build_context_block(context_chunks, self.max_context_chunks);
        let system_prompt = build_system_prompt();
        let user_prompt = build_user_prompt(question, &context_block);

        tracing::debug!(
            "Calling {} with {} context chunks",
            self.model,
            context_chunks.len().min(self.max_context_chunks)
        );

        let mut last_error = String::new();
        for attempt in 0..MAX_ATTEMPTS {
            match self.call_provider(&system_prompt, &user_prompt).await {
                Ok((content, tokens_used)) => {
                    let answer = ensure_disclaimer(content);
                    tracing::info!(
                        "Generated answer: {tokens_used} tokens, {} chars",
                        answer.len()
                    );
                    return Ok(GenerationResult {
                        answer,
                        tokens_used,
                        model: self.model.clone(),
                        error: None,
                    });
                }
                Err(ProviderError::Transient(msg)) => {
                    tracing::warn!("Generation attempt {} failed: {msg}", attempt + 1);
                    last_error = msg;
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt)).await;
                    }
                }
                Err(ProviderError::Fatal(msg)) => {
                    tracing::error!("Unexpected error during answer generation: {msg}");
                    return Err(RagError::Generation(msg));
                }
            }
        }

        // Retries exhausted: degrade to a user-safe answer, recoverable at
        // pipeline level.
        tracing::error!("Generation provider failed after {MAX_ATTEMPTS} attempts: {last_error}");
        Ok(GenerationResult {
            answer: format!(
                "Üzgünüm, şu anda cevap oluşturamıyorum. \
                 Lütfen tekrar deneyin.\n\n{MEDICAL_DISCLAIMER}"
            ),
            tokens_used: 0,
            model: self.model.clone(),
            error: Some(format!("Provider error: {last_error}")),
        })
    }
}

enum ProviderError {
    /// Transport or status failure, retried with backoff.
    Transient(String),
    /// Malformed provider response, surfaced as `RagError::Generation`.
    Fatal(String),
}

/// Number the top chunks as `[Kaynak i]`, truncating each to the per-chunk
/// budget.
fn build_context_block(chunks: &[ContextChunk], max_chunks: usize) -> String {
    chunks
        .iter()
        .take(max_chunks)
        .enumerate()
        .map(|(i, chunk)| format!("[Kaynak {}]: {}", i + 1, truncate_text(&chunk.text, MAX_CHUNK_CHARS)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_system_prompt() -> String {
    format!(
        "Sen bir sağlık bilgilendirme asistanısın. Sağlık konularında bilgilendirme yapıyorsun.\n\n\
         ÖNEMLİ KURALLAR:\n\
         1. Verilen KAYNAK bilgilerini kullanarak cevap ver\n\
         2. Kaynak göster: [Kaynak 1], [Kaynak 2] şeklinde\n\
         3. MUTLAKA tıbbi sorumluluk reddi ekle\n\
         4. Teşhis veya tedavi önerme, sadece bilgilendir\n\
         5. Türkçe ve anlaşılır cevap ver\n\
         6. Bilmiyorsan veya kaynaklarda yoksa belirt\n\n\
         SORUMLULUK REDDİ (MUTLAKA EKLE):\n{MEDICAL_DISCLAIMER}\n"
    )
}

fn build_user_prompt(question: &str, context_block: &str) -> String {
    format!(
        "SORU: {question}\n\n\
         KAYNAK BİLGİLER:\n{context_block}\n\n\
         Yukarıdaki kaynaklara dayanarak soruyu cevapla. \
         Kaynak numaralarını belirt ve tıbbi sorumluluk reddi ekle."
    )
}

/// Append the disclaimer if the model left it out.
fn ensure_disclaimer(answer: String) -> String {
    if answer.contains(MEDICAL_DISCLAIMER) {
        answer
    } else {
        tracing::warn!("Medical disclaimer not in answer, appending it");
        format!("{answer}\n\n{MEDICAL_DISCLAIMER}")
    }
}

/// Truncate to `max_chars` characters on a UTF-8 boundary, appending "..."
/// when anything was cut.
pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}
