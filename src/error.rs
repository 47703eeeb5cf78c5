use std::error::Error as StdError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error as ThisError;

/// リクエスト処理全体のエラー。
///
/// どの種類でもレスポンスとしては同じ失敗 envelope にまとめられる。
#[derive(Debug, ThisError)]
pub enum RelayError {
    /// リクエストの形式が不正。
    #[error("malformed request: {0}")]
    MalformedRequest(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// バックエンドとの通信に失敗した、もしくは成功以外のステータスが返された。
    #[error("upstream failure: {0}")]
    UpstreamFailure(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// バックエンドは応答したが、必要なフィールドが欠けている。
    #[error("invalid upstream response: {0}")]
    InvalidUpstreamResponse(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

impl From<ReqwestError> for RelayError {
    fn from(value: ReqwestError) -> Self {
        RelayError::UpstreamFailure(value.into())
    }
}

/// バックエンドの応答の復元に失敗した場合のみに使う。
/// リクエスト側の JSON エラーは `MalformedRequest` に明示的に変換すること。
impl From<SerdeJsonError> for RelayError {
    fn from(value: SerdeJsonError) -> Self {
        RelayError::InvalidUpstreamResponse(value.into())
    }
}
