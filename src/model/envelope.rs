use crate::{error::RelayError, model::conversation::ConversationHistory};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer, ser::Error as SerError};

/// すべてのレスポンスに付与する固定ヘッダー。
pub const RESPONSE_HEADERS: [(&str, &str); 4] = [
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token",
    ),
    ("Access-Control-Allow-Methods", "OPTIONS,POST"),
];

/// API Gateway に返すレスポンス。`body` は JSON 文字列としてシリアライズされる。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundResponse {
    pub status_code: u16,
    pub headers: BTreeMap<&'static str, &'static str>,

    #[serde(serialize_with = "serialize_as_json_string")]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,

    #[serde(default, rename = "conversationHistory", skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<ConversationHistory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutboundResponse {
    pub fn success(response: String, response_time: Option<f64>, history: ConversationHistory) -> OutboundResponse {
        OutboundResponse {
            status_code: 200,
            headers: fixed_headers(),
            body: ResponseBody {
                success: true,
                response: Some(response),
                response_time,
                conversation_history: Some(history),
                error: None,
            },
        }
    }

    pub fn failure(error: &RelayError) -> OutboundResponse {
        OutboundResponse {
            status_code: 500,
            headers: fixed_headers(),
            body: ResponseBody {
                success: false,
                response: None,
                response_time: None,
                conversation_history: None,
                error: Some(error.to_string()),
            },
        }
    }
}

fn fixed_headers() -> BTreeMap<&'static str, &'static str> {
    RESPONSE_HEADERS.into_iter().collect()
}

fn serialize_as_json_string<S>(body: &ResponseBody, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let encoded = serde_json::to_string(body).map_err(<S::Error as SerError>::custom)?;
    serializer.serialize_str(&encoded)
}
