pub mod cli;

/// HTTP クライアントに設定する UserAgent。
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
