use commonai::{create_service, Config, Content};
use futures::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("commonai_core=debug".parse()?),
        )
        .init();

    let config = Config::load_or_default();
    let service = create_service(&config)?;
    println!("Provider: {}", service.provider_name());

    let model = service.model(&config.model);
    let mut chat = model.start_chat(vec![Content::system("You are a concise assistant.")]);

    let reply = chat.send(vec![Content::user("Hi!")]).await?;
    println!("Response: {}", reply.text);

    let mut stream = chat.send_stream(vec![Content::user("Name three rivers.")]);
    let mut previous = String::new();
    while let Some(message) = stream.next().await {
        let text = message?.text;
        match text.strip_prefix(previous.as_str()) {
            Some(delta) => print!("{delta}"),
            None => print!("\n{text}"),
        }
        previous = text;
    }
    println!();

    println!("History: {} turns", chat.history().len());
    Ok(())
}
