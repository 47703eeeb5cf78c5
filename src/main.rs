use chat_relay::{
    application::cli::Arguments,
    llm::create_backend,
    model::event::{InboundEvent, InvocationContext},
    relay::ChatRelay,
};

use anyhow::{Result, anyhow};
use clap::Parser;
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "chat_relay=info".into()))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).without_time())
        .init();

    let args = Arguments::parse();
    let backend = create_backend(&args)?;
    info!("starting relay with {:?} backend", args.backend);

    let relay = ChatRelay::new(backend);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<InboundEvent>| {
        let relay = relay.clone();
        async move {
            let context = InvocationContext::from(&event.context);
            Ok::<_, LambdaError>(relay.handle(event.payload, &context).await)
        }
    }))
    .await
    .map_err(|err| anyhow!("Lambda runtime terminated: {err}"))?;

    Ok(())
}
