use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use global_pulse::api::ApiClient;
use global_pulse::config;
use global_pulse::filter::Lang;
use global_pulse::model::pretty_label;

#[derive(Debug, Parser)]
#[command(author, version, about = "Fetch and print one article from the feed backend")]
struct Args {
    /// Path to YAML config file (./config.yaml is used when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Article language (en|zh)
    #[arg(long, default_value = "en")]
    lang: String,

    /// Article id
    id: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    let client = ApiClient::from_config(&cfg)?;

    let item = client
        .news_detail(args.id, Lang::from_param(&args.lang))
        .await?;

    println!("{}", item.title);
    println!(
        "{} | published {} | fetched {}",
        item.source_name,
        item.published_at.format("%Y-%m-%d %H:%M"),
        item.fetched_at.format("%Y-%m-%d %H:%M")
    );
    if item.china_related {
        println!("flagged: China Focus");
    }
    let mut labels: Vec<String> = item.country_tags.iter().map(|t| pretty_label(t)).collect();
    labels.extend(item.topic_tags.iter().map(|t| pretty_label(t)));
    if !labels.is_empty() {
        println!("tags: {}", labels.join(", "));
    }
    if !item.summary.is_empty() {
        println!("\n{}", item.summary);
    }
    if !item.content.is_empty() {
        println!("\n{}", item.content);
    }
    if !item.article_url.is_empty() {
        println!("\noriginal: {}", item.article_url);
    }
    Ok(())
}
