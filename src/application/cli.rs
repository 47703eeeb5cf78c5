use clap::{Parser, ValueEnum};

pub const DEFAULT_MODEL_ID: &str = "us.amazon.nova-lite-v1:0";
pub const DEFAULT_FASTAPI_URL: &str = "http://localhost:8000";

/// Lambda からは引数なしで起動されるため、すべて環境変数でも指定できる。
#[derive(Debug, Clone, Parser)]
#[clap(author, version)]
pub struct Arguments {
    /// Backend to forward conversations to.
    #[clap(long, env = "CHAT_BACKEND", value_enum, default_value = "hosted")]
    pub backend: BackendKind,

    /// Model ID for the hosted (Bedrock) backend.
    #[clap(long, env = "MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Base URL of the self-hosted generation server.
    #[clap(long, env = "FASTAPI_URL", default_value = DEFAULT_FASTAPI_URL)]
    pub fastapi_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Amazon Bedrock `invoke_model`
    Hosted,

    /// `POST <FASTAPI_URL>/generate`
    SelfHosted,
}
