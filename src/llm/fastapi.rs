use crate::{
    application::USER_AGENT,
    error::RelayError,
    llm::{BackendResult, GenerationBackend, HistoryEcho},
    model::{
        conversation::{ConversationTurn, Role},
        event::InvocationContext,
    },
};

use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

const MAX_NEW_TOKENS: u32 = 512;
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 0.9;

/// 自前の推論サーバー (`POST /generate`) を利用したバックエンド。
///
/// 単発の生成のみ対応しているので、送信するのは最新のユーザー発話だけ。
#[derive(Debug, Clone)]
pub struct FastapiBackend(Arc<FastapiBackendInner>);

impl FastapiBackend {
    pub fn new(base_url: &str) -> Result<FastapiBackend, RelayError> {
        let client = reqwest::ClientBuilder::new().user_agent(USER_AGENT).build()?;
        Ok(FastapiBackend(Arc::new(FastapiBackendInner {
            client,
            endpoint: generate_endpoint(base_url),
        })))
    }

    pub fn endpoint(&self) -> &str {
        &self.0.endpoint
    }
}

impl GenerationBackend for FastapiBackend {
    fn history_echo(&self) -> HistoryEcho {
        HistoryEcho::AssistantOnly
    }

    fn generate<'a>(
        &'a self,
        turns: &'a [ConversationTurn],
        _context: &'a InvocationContext,
    ) -> BoxFuture<'a, Result<BackendResult, RelayError>> {
        async move { self.0.generate(turns).await }.boxed()
    }
}

#[derive(Debug)]
struct FastapiBackendInner {
    client: Client,
    endpoint: String,
}

impl FastapiBackendInner {
    async fn generate(&self, turns: &[ConversationTurn]) -> Result<BackendResult, RelayError> {
        let Some(request) = GenerationRequest::from_latest_user_turn(turns) else {
            return Err(RelayError::MalformedRequest("no user message to send".into()));
        };

        info!("sending prompt to {}", self.endpoint);
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("generation server returned {status}");
            return Err(RelayError::UpstreamFailure(format!("HTTP {status}").into()));
        }

        let body = response.bytes().await?;
        debug!("generation server response: {}", String::from_utf8_lossy(&body));

        let generated: GenerationResponse = serde_json::from_slice(&body)?;
        let (Some(generated_text), Some(response_time)) = (generated.generated_text, generated.response_time) else {
            return Err(RelayError::InvalidUpstreamResponse(
                format!("unexpected response from generation server: {}", String::from_utf8_lossy(&body)).into(),
            ));
        };

        Ok(BackendResult {
            generated_text,
            response_time: Some(response_time),
        })
    }
}

/// ベース URL 末尾の `/` を取り除いて `/generate` を付ける。
fn generate_endpoint(base_url: &str) -> String {
    format!("{}/generate", base_url.trim_end_matches('/'))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct GenerationRequest {
    prompt: String,
    max_new_tokens: u32,
    do_sample: bool,
    temperature: f64,
    top_p: f64,
}

impl GenerationRequest {
    fn from_latest_user_turn(turns: &[ConversationTurn]) -> Option<GenerationRequest> {
        let latest = turns.iter().rev().find(|t| t.role == Role::User)?;
        Some(GenerationRequest {
            prompt: latest.content.clone(),
            max_new_tokens: MAX_NEW_TOKENS,
            do_sample: true,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GenerationResponse {
    generated_text: Option<String>,
    response_time: Option<f64>,
}
