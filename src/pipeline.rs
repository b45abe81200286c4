use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cache::{ResultCache, make_cache_key};
use crate::error::GatewayError;
use crate::metrics::UPSTREAM_ERRORS;
use crate::models::{GenerateBody, GeneratedCode, GenerationRequest, GenerationResult};
use crate::normalize::{NO_CODE_PLACEHOLDER, normalize_non_empty};
use crate::upstream::UpstreamClient;

/// validate -> key -> cache lookup -> (miss) upstream -> normalize -> store.
///
/// Concurrent identical requests that both miss will both reach the
/// upstream; there is no in-flight deduplication.
#[derive(Clone)]
pub struct RequestPipeline {
    cache: ResultCache,
    upstream: UpstreamClient,
}

impl RequestPipeline {
    pub fn new(cache: ResultCache, upstream: UpstreamClient) -> Self {
        Self { cache, upstream }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Runs a raw inbound body. Validation failures return before any I/O.
    pub async fn run(
        &self,
        body: GenerateBody,
        request_id: Uuid,
    ) -> Result<GenerationResult, GatewayError> {
        let request = GenerationRequest::from_body(body).inspect_err(|e| {
            debug!(%request_id, error = %e, "Rejected invalid request");
        })?;
        self.generate(&request, request_id).await
    }

    #[instrument(
        skip_all,
        fields(request_id = %request_id, model = %request.model, language = %request.language)
    )]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        request_id: Uuid,
    ) -> Result<GenerationResult, GatewayError> {
        let key = make_cache_key(request.model, request.language, &request.prompt);

        if let Some(hit) = self.cache.get(&key).await {
            return Ok(GenerationResult {
                code: hit.code,
                explanation: hit.explanation,
                model: request.model,
                language: request.language,
                served_from_cache: true,
            });
        }

        let raw = self
            .upstream
            .generate(request, request_id)
            .await
            .inspect_err(|e| {
                let retryable = if e.is_retryable() { "true" } else { "false" };
                UPSTREAM_ERRORS.with_label_values(&[retryable]).inc();
            })?;

        let explanation = raw
            .explanation
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let code = match normalize_non_empty(&raw.code) {
            Some(code) => {
                let entry = GeneratedCode {
                    code,
                    explanation: explanation.clone(),
                };
                self.cache.store(&key, &entry).await;
                entry.code
            }
            None => {
                warn!("Upstream returned no code, skipping cache");
                NO_CODE_PLACEHOLDER.to_string()
            }
        };

        info!("Generated code from upstream");
        Ok(GenerationResult {
            code,
            explanation,
            model: request.model,
            language: request.language,
            served_from_cache: false,
        })
    }
}
