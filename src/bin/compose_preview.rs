//! Composes one post per kind and prints it instead of publishing.
//! Usage: `compose_preview [price|news ...]` (both kinds when no args).

use crypto_pulse_bot::bootstrap::BotRuntime;
use crypto_pulse_bot::{PostComposer, PostKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let mut kinds = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.to_ascii_lowercase().as_str() {
            "price" => kinds.push(PostKind::Price),
            "news" => kinds.push(PostKind::News),
            other => anyhow::bail!("unknown post kind '{other}' (expected price|news)"),
        }
    }
    if kinds.is_empty() {
        kinds = vec![PostKind::Price, PostKind::News];
    }

    let runtime = BotRuntime::from_env()?;
    for kind in kinds {
        match runtime.newsroom.compose(kind).await {
            Some(post) => println!(
                "--- {} ({} chars) ---\n{}\n",
                kind.as_str(),
                post.text.chars().count(),
                post.text
            ),
            None => println!("--- {} ---\n(no publishable content)\n", kind.as_str()),
        }
    }

    println!("compose-preview done");
    Ok(())
}
