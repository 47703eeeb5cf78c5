mod bedrock;
mod fastapi;

pub use bedrock::{
    BedrockBackend, BedrockClientFactory, BedrockRuntimeClient, DEFAULT_REGION, HostedClientFactory,
    HostedModelClient, extract_region_from_arn,
};
pub use fastapi::FastapiBackend;

use crate::{
    application::cli::{Arguments, BackendKind},
    error::RelayError,
    model::{conversation::ConversationTurn, event::InvocationContext},
};

use std::{fmt::Debug, sync::Arc};

use futures::future::BoxFuture;

/// 生成バックエンドの抽象化。
pub trait GenerationBackend: Send + Sync + Debug {
    /// 返却する会話履歴の組み立て方。
    fn history_echo(&self) -> HistoryEcho;

    /// 組み立て済みの会話 (末尾が今回のユーザー発話) を送信する。
    fn generate<'a>(
        &'a self,
        turns: &'a [ConversationTurn],
        context: &'a InvocationContext,
    ) -> BoxFuture<'a, Result<BackendResult, RelayError>>;
}

/// バックエンドに依らない生成結果。
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    pub generated_text: String,
    pub response_time: Option<f64>,
}

/// レスポンスの `conversationHistory` をどう作るか。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEcho {
    /// 今回のユーザー発話を含む送信列に応答を追加する。
    Full,

    /// 呼び出し側の履歴に応答のみを追加する。ユーザー発話は含まれない。
    AssistantOnly,
}

pub fn create_backend(args: &Arguments) -> Result<Arc<dyn GenerationBackend>, RelayError> {
    match args.backend {
        BackendKind::Hosted => Ok(Arc::new(BedrockBackend::new(&args.model_id, BedrockClientFactory))),
        BackendKind::SelfHosted => Ok(Arc::new(FastapiBackend::new(&args.fastapi_url)?)),
    }
}
