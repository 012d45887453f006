use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio::spawn;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::fmt::format::{Compact, DefaultFields};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stream_herald::config::ConfigStore;
use stream_herald::discord::DiscordClient;
use stream_herald::monitor::{TikTokMonitor, TwitchMonitor, YouTubeMonitor};
use stream_herald::tiktok::TikTokClient;
use stream_herald::twitch::api::HelixClient;
use stream_herald::twitch::Credentials;
use stream_herald::youtube::YouTubeClient;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Guild store file
    #[arg(short, long, default_value_t = String::from("guilds.yaml"))]
    config: String,
    /// Log to file
    #[arg(short, long)]
    log_file: Option<String>,
}

fn get_layer<S>(
    layer: tracing_subscriber::fmt::Layer<S>,
) -> tracing_subscriber::fmt::Layer<
    S,
    DefaultFields,
    tracing_subscriber::fmt::format::Format<Compact, ChronoLocal>,
> {
    layer
        .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
        .compact()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = std::env::var("LOG").unwrap_or("info".to_owned());
    let tracing_opts = tracing_subscriber::registry()
        .with(EnvFilter::new(format!("stream_herald={log_level}")))
        .with(get_layer(tracing_subscriber::fmt::layer()));

    let file_appender = tracing_appender::rolling::never(
        ".",
        args.log_file.clone().unwrap_or("herald.log".to_owned()),
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    if args.log_file.is_some() {
        tracing_opts
            .with(get_layer(tracing_subscriber::fmt::layer()).with_writer(non_blocking))
            .init();
    } else {
        tracing_opts.init();
    }

    let store = ConfigStore::load(&args.config).await?;
    info!("loaded guild store with {} guild(s)", store.guilds.len());
    let poll = store.poll.clone();
    let store = Arc::new(RwLock::new(store));

    let bot_token =
        std::env::var("DISCORD_BOT_TOKEN").context("DISCORD_BOT_TOKEN not set")?;
    let discord =
        Arc::new(DiscordClient::new(&bot_token).context("Building discord client")?);

    let helix = Arc::new(
        HelixClient::new(Credentials::from_env()?).context("Building twitch client")?,
    );
    let youtube = Arc::new(
        YouTubeClient::new(std::env::var("YOUTUBE_API_KEY").ok())
            .context("Building youtube client")?,
    );
    let tiktok = Arc::new(TikTokClient::new().context("Building tiktok client")?);

    let twitch_monitor = spawn(
        TwitchMonitor::new(
            store.clone(),
            helix,
            discord.clone(),
            Duration::from_secs(poll.twitch_secs),
        )
        .run(),
    );
    let youtube_monitor = spawn(
        YouTubeMonitor::new(
            store.clone(),
            youtube,
            discord.clone(),
            Duration::from_secs(poll.youtube_secs),
        )
        .run(),
    );
    let tiktok_monitor = spawn(
        TikTokMonitor::new(
            store,
            tiktok,
            discord,
            Duration::from_secs(poll.tiktok_secs),
        )
        .run(),
    );

    info!("monitoring streams, uploads and posts");

    twitch_monitor.await?;
    youtube_monitor.await?;
    tiktok_monitor.await?;

    Ok(())
}
