mod client;

pub use client::{
    BedrockClientFactory, BedrockRuntimeClient, DEFAULT_REGION, HostedClientFactory, HostedModelClient,
    extract_region_from_arn,
};

use crate::{
    error::RelayError,
    llm::{BackendResult, GenerationBackend, HistoryEcho},
    model::{
        conversation::{ConversationTurn, Role},
        event::InvocationContext,
    },
};

use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

const MAX_TOKENS: u32 = 512;
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 0.9;

/// Amazon Bedrock の `invoke_model` を利用したバックエンド。
///
/// クライアントは最初の呼び出し時に作成され、以後プロセス内で使い回される。
#[derive(Debug, Clone)]
pub struct BedrockBackend(Arc<BedrockBackendInner>);

impl BedrockBackend {
    pub fn new(model_id: impl Into<String>, factory: impl HostedClientFactory + 'static) -> BedrockBackend {
        BedrockBackend(Arc::new(BedrockBackendInner {
            model_id: model_id.into(),
            factory: Box::new(factory),
            client: OnceCell::new(),
        }))
    }
}

impl GenerationBackend for BedrockBackend {
    fn history_echo(&self) -> HistoryEcho {
        HistoryEcho::Full
    }

    fn generate<'a>(
        &'a self,
        turns: &'a [ConversationTurn],
        context: &'a InvocationContext,
    ) -> BoxFuture<'a, Result<BackendResult, RelayError>> {
        async move { self.0.generate(turns, context).await }.boxed()
    }
}

#[derive(Debug)]
struct BedrockBackendInner {
    model_id: String,
    factory: Box<dyn HostedClientFactory + 'static>,
    client: OnceCell<Arc<dyn HostedModelClient>>,
}

impl BedrockBackendInner {
    async fn client(&self, context: &InvocationContext) -> Result<&Arc<dyn HostedModelClient>, RelayError> {
        self.client
            .get_or_try_init(|| async {
                let region = extract_region_from_arn(&context.invoked_function_arn);
                let client = self.factory.create_client(&region).await?;
                info!("initialized Bedrock client in region: {region}");
                Ok(client)
            })
            .await
    }

    async fn generate(
        &self,
        turns: &[ConversationTurn],
        context: &InvocationContext,
    ) -> Result<BackendResult, RelayError> {
        let client = self.client(context).await?;

        let request = InvokeModelRequest::new(turns);
        let dropped = turns.len() - request.messages.len();
        if dropped > 0 {
            debug!("dropped {dropped} turn(s) with unsupported role");
        }

        let payload = serde_json::to_vec(&request).map_err(|e| RelayError::MalformedRequest(e.into()))?;
        info!("using model: {}", self.model_id);
        debug!("calling invoke_model with payload: {}", String::from_utf8_lossy(&payload));

        let response_bytes = client.invoke_model(&self.model_id, payload).await?;
        debug!("Bedrock response: {}", String::from_utf8_lossy(&response_bytes));

        let response: InvokeModelResponse = serde_json::from_slice(&response_bytes)?;
        Ok(BackendResult {
            generated_text: response.into_text()?,
            response_time: None,
        })
    }
}

/// `invoke_model` のリクエストボディ (Messages API 形式)。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeModelRequest {
    messages: Vec<HostedMessage>,
    inference_config: InferenceConfig,
}

impl InvokeModelRequest {
    fn new(turns: &[ConversationTurn]) -> InvokeModelRequest {
        InvokeModelRequest {
            messages: turns.iter().filter_map(transform_turn).collect(),
            inference_config: InferenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    stop_sequences: Vec<String>,
    temperature: f64,
    top_p: f64,
}

impl Default for InferenceConfig {
    fn default() -> InferenceConfig {
        InferenceConfig {
            max_tokens: MAX_TOKENS,
            stop_sequences: vec![],
            temperature: TEMPERATURE,
            top_p: TOP_P,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct HostedMessage {
    role: HostedRole,
    content: Vec<HostedContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum HostedRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct HostedContent {
    text: String,
}

/// user と assistant 以外の role は送信しない。
// MEMO: 不明な role を黙って捨てるので、壊れた履歴が来ても気付けない
fn transform_turn(turn: &ConversationTurn) -> Option<HostedMessage> {
    let role = match turn.role {
        Role::User => HostedRole::User,
        Role::Assistant => HostedRole::Assistant,
        Role::Other(_) => return None,
    };
    Some(HostedMessage {
        role,
        content: vec![HostedContent {
            text: turn.content.clone(),
        }],
    })
}

#[derive(Debug, Clone, Deserialize)]
struct InvokeModelResponse {
    output: Option<ResponseOutput>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseOutput {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<Vec<ResponseContent>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseContent {
    text: Option<String>,
}

impl InvokeModelResponse {
    /// `output.message.content[0].text` を取り出す。
    fn into_text(self) -> Result<String, RelayError> {
        let Some(first_content) = self
            .output
            .and_then(|o| o.message)
            .and_then(|m| m.content)
            .and_then(|c| c.into_iter().next())
        else {
            return Err(RelayError::InvalidUpstreamResponse("no response content from the model".into()));
        };
        first_content
            .text
            .ok_or_else(|| RelayError::InvalidUpstreamResponse("response content has no text".into()))
    }
}
