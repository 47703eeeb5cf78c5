use crate::{
    error::RelayError,
    llm::{BackendResult, GenerationBackend, HistoryEcho},
    model::{
        conversation::{ConversationHistory, ConversationTurn, append_turn},
        envelope::OutboundResponse,
        event::{InboundEvent, InvocationContext},
    },
};

use std::sync::Arc;

use tracing::{debug, error, info};

/// 1 回の呼び出しを処理して envelope を返す。状態は持たない。
#[derive(Debug, Clone)]
pub struct ChatRelay(Arc<dyn GenerationBackend>);

impl ChatRelay {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> ChatRelay {
        ChatRelay(backend)
    }

    /// 失敗した場合も含め、必ずレスポンスを返す。
    pub async fn handle(&self, event: InboundEvent, context: &InvocationContext) -> OutboundResponse {
        match self.process(&event, context).await {
            Ok(update) => OutboundResponse::success(update.response, update.response_time, update.history),
            Err(err) => {
                error!("request {} failed: {err}", context.request_id);
                OutboundResponse::failure(&err)
            }
        }
    }

    async fn process(&self, event: &InboundEvent, context: &InvocationContext) -> Result<RelayUpdate, RelayError> {
        debug!("received event: {event:?}");
        if let Some(user) = event.authenticated_user() {
            info!("authenticated user: {user}");
        }

        let request = event.parse_request()?;
        info!("processing message: {}", request.message);

        let assembled = request.assemble_history();
        let BackendResult {
            generated_text,
            response_time,
        } = self.0.generate(&assembled, context).await?;

        let echoed_base = match self.0.history_echo() {
            HistoryEcho::Full => &assembled,
            HistoryEcho::AssistantOnly => &request.conversation_history,
        };
        let history = append_turn(echoed_base, ConversationTurn::assistant(&generated_text));

        Ok(RelayUpdate {
            response: generated_text,
            response_time,
            history,
        })
    }
}

#[derive(Debug, Clone)]
struct RelayUpdate {
    response: String,
    response_time: Option<f64>,
    history: ConversationHistory,
}
