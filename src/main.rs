use anyhow::Result;
use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use global_pulse::api::{resolve_push_url, ApiClient, NewsBackend};
use global_pulse::config;
use global_pulse::filter::{FilterState, Lang};
use global_pulse::live::{self, LiveChannelHandle, LiveSettings};
use global_pulse::model::{pretty_label, FilterOptions};
use global_pulse::session::{FeedSession, SessionEffect};
use global_pulse::sync::{load_filter_options, FeedSynchronizer, ViewState};

#[derive(Debug, Parser)]
#[command(author, version, about = "Terminal companion for the Global Pulse news feed")]
struct Args {
    /// Path to YAML config file (./config.yaml is used when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial filters as a page query string, e.g. "lang=zh&china=1&q=trade"
    #[arg(long, default_value = "")]
    query: String,

    /// Language override (en|zh)
    #[arg(long)]
    lang: Option<String>,

    /// Restrict to focus-flagged items
    #[arg(long)]
    china_only: bool,

    /// Committed keyword override
    #[arg(long)]
    keyword: Option<String>,

    /// Country label override
    #[arg(long)]
    country: Option<String>,

    /// Topic label override
    #[arg(long)]
    topic: Option<String>,
}

impl Args {
    fn initial_filter(&self) -> FilterState {
        let mut filter = FilterState::decode_query(&self.query);
        if let Some(lang) = &self.lang {
            filter.lang = Lang::from_param(lang);
        }
        if self.china_only {
            filter.china_only = true;
        }
        if let Some(keyword) = &self.keyword {
            filter.keyword = keyword.trim().to_string();
        }
        if let Some(country) = &self.country {
            filter.country = country.trim().to_string();
        }
        if let Some(topic) = &self.topic {
            filter.topic = topic.trim().to_string();
        }
        filter
    }
}

struct FeedApp {
    session: FeedSession,
    options: FilterOptions,
    channel: LiveChannelHandle,
    push_url: Option<Url>,
    secure_context: bool,
    live_settings: LiveSettings,
    refresh_tx: mpsc::Sender<()>,
}

impl FeedApp {
    fn request_refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    /// One committed filter change: rewrite the shareable query, recycle
    /// the push channel so it belongs to the new snapshot, fire one fetch.
    async fn apply_effect(&mut self, effect: SessionEffect) {
        info!(query = %effect.query, "filters updated");
        println!("view: /?{}", effect.query);
        let fresh = live::spawn(
            self.push_url.clone(),
            self.secure_context,
            self.live_settings,
            self.refresh_tx.clone(),
        );
        let old = std::mem::replace(&mut self.channel, fresh);
        old.shutdown().await;
        self.request_refresh();
    }

    /// Returns false when the session should end.
    async fn handle_command(&mut self, line: &str) -> bool {
        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        let effect = match command {
            "" => None,
            "quit" | "exit" => return false,
            "help" => {
                print_help();
                None
            }
            "url" => {
                println!("view: /?{}", self.session.query());
                None
            }
            "options" => {
                print_options(&self.options);
                None
            }
            "refresh" => {
                self.request_refresh();
                None
            }
            "lang" => self.session.set_lang(Lang::from_param(rest)),
            "china" => self.session.set_china_only(rest == "on" || rest == "1"),
            "kw" => {
                self.session.set_draft_keyword(rest);
                None
            }
            "submit" => self.session.submit_keyword(),
            "q" => {
                self.session.set_draft_keyword(rest);
                self.session.submit_keyword()
            }
            "country" => self.session.set_country(rest),
            "topic" => self.session.set_topic(rest),
            "reset" => self.session.reset(),
            other => {
                println!("unknown command: {other} (try `help`)");
                None
            }
        };
        if let Some(effect) = effect {
            self.apply_effect(effect).await;
        }
        true
    }
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
    let origin = client.origin().clone();
    let secure_context = origin.scheme() == "https";
    let push_url = resolve_push_url(&origin, cfg.backend.push_url.as_deref());
    let live_settings = LiveSettings {
        heartbeat: Duration::from_secs(cfg.live.heartbeat_seconds),
        max_backoff: Duration::from_secs(cfg.live.max_backoff_seconds),
    };

    let backend: Arc<dyn NewsBackend> = Arc::new(client);
    let options = load_filter_options(backend.as_ref()).await;
    let (sync, mut view_rx) = FeedSynchronizer::new(backend, cfg.feed.page_size);

    let (refresh_tx, mut refresh_rx) = mpsc::channel::<()>(8);
    let channel = live::spawn(
        push_url.clone(),
        secure_context,
        live_settings,
        refresh_tx.clone(),
    );

    let mut app = FeedApp {
        session: FeedSession::new(args.initial_filter()),
        options,
        channel,
        push_url,
        secure_context,
        live_settings,
        refresh_tx,
    };

    tokio::spawn(async move {
        while view_rx.changed().await.is_ok() {
            let view = view_rx.borrow().clone();
            render(&view);
        }
    });

    info!(%origin, "starting feed session");
    println!("view: /?{}", app.session.query());
    print_help();
    app.request_refresh();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(()) = refresh_rx.recv() => {
                // Push events and user commands both land here; the fetch
                // always uses the filter as it is *now*.
                let sync = sync.clone();
                let filter = app.session.filter().clone();
                tokio::spawn(async move { sync.run(filter).await });
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !app.handle_command(line.trim()).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    error!(?err, "failed to read command");
                    break;
                }
            },
        }
    }

    app.channel.shutdown().await;
    Ok(())
}

fn print_help() {
    println!(
        "commands: lang en|zh | china on|off | kw <draft> | submit | q <keyword> | \
         country [label] | topic [label] | reset | refresh | url | options | help | quit"
    );
}

fn print_options(options: &FilterOptions) {
    if options.countries.is_empty() && options.topics.is_empty() {
        println!("no filter vocabulary loaded");
        return;
    }
    let countries: Vec<String> = options.countries.iter().map(|c| pretty_label(c)).collect();
    let topics: Vec<String> = options.topics.iter().map(|t| pretty_label(t)).collect();
    println!("countries: {}", countries.join(", "));
    println!("topics:    {}", topics.join(", "));
}

fn render(view: &ViewState) {
    if let Some(err) = &view.error {
        println!("!! {err}");
    }
    let Some(snapshot) = &view.snapshot else {
        if view.loading {
            println!("loading...");
        }
        return;
    };
    if view.loading {
        return;
    }

    if !snapshot.focus.is_empty() {
        println!("== China Focus ==");
        for item in &snapshot.focus {
            println!("  [{}] {} ({})", item.id, item.title, item.source_name);
        }
    }

    println!(
        "== Latest International Headlines ({} of {}) ==",
        snapshot.news.len(),
        snapshot.total
    );
    for item in &snapshot.news {
        let mut labels: Vec<String> = item.country_tags.iter().map(|t| pretty_label(t)).collect();
        labels.extend(item.topic_tags.iter().map(|t| pretty_label(t)));
        let tags = if labels.is_empty() {
            String::new()
        } else {
            format!(" [{}]", labels.join(", "))
        };
        println!(
            "  [{}] {} ({}, {}){}",
            item.id,
            item.title,
            item.source_name,
            item.published_at.format("%Y-%m-%d %H:%M"),
            tags
        );
    }

    println!("== Sources ==");
    for health in &snapshot.health {
        let latency = health
            .last_latency_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} failures={} latency={} items={}",
            health.last_status.as_str(),
            health.source_name,
            health.consecutive_failures,
            latency,
            health.last_items_count
        );
        if let Some(last_error) = &health.last_error {
            println!("    last error: {last_error}");
        }
    }
    println!(
        "retry queue: {} pending / {} due",
        snapshot.retry.pending, snapshot.retry.due
    );
}
