use crate::error::RelayError;

use std::{
    fmt::Debug,
    sync::{Arc, LazyLock},
};

use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::{
    Client,
    config::http::HttpResponse,
    error::SdkError,
    operation::invoke_model::InvokeModelError,
    primitives::Blob,
};
use futures::{FutureExt, future::BoxFuture};
use regex::Regex;

pub const DEFAULT_REGION: &str = "us-east-1";

static RE_LAMBDA_ARN_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"arn:aws:lambda:([^:]+):"#).expect("invalid regex"));

/// Lambda 関数の ARN からリージョンを取り出す。見つからなければ `us-east-1`。
pub fn extract_region_from_arn(arn: &str) -> String {
    RE_LAMBDA_ARN_REGION
        .captures(arn)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| DEFAULT_REGION.to_string(), |region| region.as_str().to_string())
}

/// ホスト型モデルの `invoke_model` 呼び出し。
pub trait HostedModelClient: Send + Sync + Debug {
    /// `body` は JSON エンコード済みのリクエスト。レスポンスのボディをそのまま返す。
    fn invoke_model<'a>(&'a self, model_id: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, RelayError>>;
}

/// リージョンを指定して `HostedModelClient` を作成する。
pub trait HostedClientFactory: Send + Sync + Debug {
    fn create_client<'a>(&'a self, region: &'a str) -> BoxFuture<'a, Result<Arc<dyn HostedModelClient>, RelayError>>;
}

/// Bedrock Runtime を利用したクライアント。
#[derive(Debug, Clone)]
pub struct BedrockRuntimeClient(Client);

impl BedrockRuntimeClient {
    pub fn new(client: Client) -> BedrockRuntimeClient {
        BedrockRuntimeClient(client)
    }
}

impl HostedModelClient for BedrockRuntimeClient {
    fn invoke_model<'a>(&'a self, model_id: &'a str, body: Vec<u8>) -> BoxFuture<'a, Result<Vec<u8>, RelayError>> {
        async move {
            let output = self
                .0
                .invoke_model()
                .model_id(model_id)
                .content_type("application/json")
                .body(Blob::new(body))
                .send()
                .await?;
            Ok(output.body.into_inner())
        }
        .boxed()
    }
}

/// 環境の認証情報を使って `BedrockRuntimeClient` を作る。
#[derive(Debug, Clone, Copy, Default)]
pub struct BedrockClientFactory;

impl HostedClientFactory for BedrockClientFactory {
    fn create_client<'a>(&'a self, region: &'a str) -> BoxFuture<'a, Result<Arc<dyn HostedModelClient>, RelayError>> {
        async move {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load()
                .await;
            let client: Arc<dyn HostedModelClient> = Arc::new(BedrockRuntimeClient::new(Client::new(&sdk_config)));
            Ok(client)
        }
        .boxed()
    }
}

impl From<SdkError<InvokeModelError, HttpResponse>> for RelayError {
    fn from(value: SdkError<InvokeModelError, HttpResponse>) -> Self {
        RelayError::UpstreamFailure(value.into())
    }
}
