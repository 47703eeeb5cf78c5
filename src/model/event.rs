use crate::{
    error::RelayError,
    model::conversation::{ConversationHistory, ConversationTurn, append_turn},
};

use lambda_runtime::Context as LambdaContext;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as JsonValue};

/// API Gateway (Lambda proxy integration) から渡されるイベント。
///
/// 不正なイベントでも失敗 envelope を返せるよう、すべてのフィールドを省略可能にしている。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub authorizer: Option<Authorizer>,
}

/// Cognito authorizer が付与した認証情報。ログ出力にのみ使う。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Authorizer {
    #[serde(default)]
    pub claims: Option<Map<String, JsonValue>>,
}

impl InboundEvent {
    pub fn with_body(body: impl Into<String>) -> InboundEvent {
        InboundEvent {
            body: Some(body.into()),
            request_context: None,
        }
    }

    pub fn claims(&self) -> Option<&Map<String, JsonValue>> {
        self.request_context.as_ref()?.authorizer.as_ref()?.claims.as_ref()
    }

    /// 認証済みユーザーの識別子。`email` がなければ `cognito:username` を使う。
    pub fn authenticated_user(&self) -> Option<&str> {
        let claims = self.claims()?;
        ["email", "cognito:username"]
            .into_iter()
            .filter_map(|key| claims.get(key).and_then(JsonValue::as_str))
            .find(|value| !value.is_empty())
    }

    pub fn parse_request(&self) -> Result<InboundRequest, RelayError> {
        let Some(body) = &self.body else {
            return Err(RelayError::MalformedRequest("request body is missing".into()));
        };
        InboundRequest::from_body(body)
    }
}

/// リクエストボディ。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    pub message: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub conversation_history: ConversationHistory,
}

impl InboundRequest {
    pub fn from_body(body: &str) -> Result<InboundRequest, RelayError> {
        serde_json::from_str(body).map_err(|e| RelayError::MalformedRequest(e.into()))
    }

    /// 既存の履歴に今回のユーザー発話を追加した送信用の列を作る。
    pub fn assemble_history(&self) -> ConversationHistory {
        append_turn(&self.conversation_history, ConversationTurn::user(&self.message))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<ConversationHistory, D::Error>
where
    D: Deserializer<'de>,
{
    let history: Option<ConversationHistory> = Option::deserialize(deserializer)?;
    Ok(history.unwrap_or_default())
}

/// 呼び出しごとの実行コンテキスト。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
    pub invoked_function_arn: String,
}

impl From<&LambdaContext> for InvocationContext {
    fn from(value: &LambdaContext) -> InvocationContext {
        InvocationContext {
            request_id: value.request_id.clone(),
            invoked_function_arn: value.invoked_function_arn.clone(),
        }
    }
}
