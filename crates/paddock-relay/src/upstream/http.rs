use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::TryStreamExt;
use paddock_config::RelayConfig;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::ExposeSecret;

use super::{GeneratedImage, Upstream};
use crate::convert::{self, parse_payload};
use crate::error::RelayError;
use crate::parser::{DeltaStream, FragmentParser, split_think_tags};
use crate::protocol::image::{ImageGenerationRequest, ImageGenerationResponse};
use crate::target::{Dialect, ProviderTarget};
use crate::types::{CompletionRequest, DeltaFragment};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// reqwest-backed upstream
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    /// Build the shared HTTP client
    ///
    /// Only the connect phase has a timeout here; the session as a whole is
    /// bounded by the relay's request timeout.
    pub fn new(settings: &RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn authorize(target: &ProviderTarget, builder: RequestBuilder) -> RequestBuilder {
        let Some(token) = &target.auth_token else {
            return builder;
        };
        let token = token.expose_secret();

        match target.dialect {
            Dialect::OpenAi => builder.bearer_auth(token),
            Dialect::Anthropic => builder.header("x-api-key", token),
            Dialect::Google => builder.header("x-goog-api-key", token),
        }
    }

    async fn post<T: serde::Serialize + Sync>(
        &self,
        target: &ProviderTarget,
        url: &str,
        body: &T,
    ) -> Result<Response, RelayError> {
        let mut builder = self.client.post(url).json(body);
        if target.dialect == Dialect::Anthropic {
            builder = builder.header("anthropic-version", ANTHROPIC_VERSION);
        }
        let builder = Self::authorize(target, builder);

        let response = builder.send().await.map_err(|e| {
            tracing::error!(endpoint = %target.endpoint_id, error = %e, "upstream request failed");
            RelayError::from_transport(&e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(endpoint = %target.endpoint_id, status = %status, "upstream returned error");
        Err(RelayError::from_response(status, &body))
    }

    async fn body_text(target: &ProviderTarget, response: Response) -> Result<String, RelayError> {
        response.text().await.map_err(|e| {
            tracing::warn!(endpoint = %target.endpoint_id, error = %e, "failed to read upstream body");
            RelayError::from_transport(&e)
        })
    }
}

/// A blocking body that does not decode is the provider's fault
fn unreadable(error: RelayError) -> RelayError {
    match error {
        RelayError::MalformedChunk(reason) => RelayError::UpstreamServer {
            status: 502,
            message: format!("unreadable response: {reason}"),
        },
        other => other,
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn open_stream(
        &self,
        target: &ProviderTarget,
        request: &CompletionRequest,
    ) -> Result<DeltaStream, RelayError> {
        let body = convert::encode_request(target.dialect, request)?;

        tracing::debug!(endpoint = %target.endpoint_id, model = %target.model_id, "opening upstream stream");
        let response = self.post(target, &target.chat_url(true), &body).await?;

        let bytes = response.bytes_stream().map_err(|e| RelayError::from_transport(&e));
        Ok(DeltaStream::new(bytes, FragmentParser::for_target(target)))
    }

    async fn complete(
        &self,
        target: &ProviderTarget,
        request: &CompletionRequest,
    ) -> Result<Vec<DeltaFragment>, RelayError> {
        let body = convert::encode_request(target.dialect, request)?;

        tracing::debug!(endpoint = %target.endpoint_id, model = %target.model_id, "sending blocking completion");
        let response = self.post(target, &target.chat_url(false), &body).await?;
        let text = Self::body_text(target, response).await?;

        let fragments = convert::decode_response(target.dialect, &target.capabilities, &text).map_err(unreadable)?;
        Ok(if target.capabilities.think_tags {
            split_think_tags(fragments)
        } else {
            fragments
        })
    }

    async fn generate_image(&self, target: &ProviderTarget, prompt: &str) -> Result<GeneratedImage, RelayError> {
        let request = ImageGenerationRequest {
            model: target.model_id.clone(),
            prompt: prompt.to_owned(),
            n: 1,
            response_format: "b64_json",
        };

        tracing::debug!(endpoint = %target.endpoint_id, model = %target.model_id, "sending image generation request");
        let response = self.post(target, &target.image_url(), &request).await?;
        let text = Self::body_text(target, response).await?;

        let parsed: ImageGenerationResponse = parse_payload(&text).map_err(unreadable)?;
        let Some(datum) = parsed.data.into_iter().next() else {
            return Err(RelayError::UpstreamServer {
                status: 502,
                message: "provider returned no image".to_owned(),
            });
        };

        let bytes = match (datum.b64_json, datum.url) {
            (Some(encoded), _) => BASE64.decode(encoded.trim()).map_err(|e| RelayError::UpstreamServer {
                status: 502,
                message: format!("image payload is not valid base64: {e}"),
            })?,
            (None, Some(url)) => {
                let download = self.client.get(&url).send().await.map_err(|e| RelayError::from_transport(&e))?;
                if !download.status().is_success() {
                    return Err(RelayError::from_response(download.status(), ""));
                }
                download
                    .bytes()
                    .await
                    .map_err(|e| RelayError::from_transport(&e))?
                    .to_vec()
            }
            (None, None) => {
                return Err(RelayError::UpstreamServer {
                    status: 502,
                    message: "image entry carries neither data nor a URL".to_owned(),
                });
            }
        };

        Ok(GeneratedImage {
            bytes,
            revised_prompt: datum.revised_prompt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_blocking_body_is_a_provider_error() {
        let err = unreadable(RelayError::MalformedChunk("expected value".to_owned()));
        assert!(matches!(err, RelayError::UpstreamServer { status: 502, .. }));
        assert!(matches!(unreadable(RelayError::RateLimited("x".to_owned())), RelayError::RateLimited(_)));
    }

    #[test]
    fn client_builds_from_defaults() {
        assert!(HttpUpstream::new(&RelayConfig::default()).is_ok());
    }
}
