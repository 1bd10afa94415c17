use std::sync::Arc;

use anyhow::Context;
use image_saver::api::client::HttpFetcher;
use image_saver::events::{ChannelSink, Event, EventSink, LogSink, TeeSink};
use image_saver::pipeline::paginator::SearchSettings;
use image_saver::storage::DirectoryStore;
use image_saver::utils::config::Config;
use image_saver::utils::logging;
use image_saver::SearchController;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

/// Drains pending events; returns false once the search cannot continue.
fn report(events: &mut UnboundedReceiver<Event>, pages: &mut u32) -> bool {
    let mut more = true;
    while let Ok(event) = events.try_recv() {
        match event {
            Event::EntriesAppended { range, .. } => {
                *pages += 1;
                info!(page = *pages, results = range.len(), "page received");
            }
            Event::NoResults { term } => {
                println!("No images found for {:?}", term);
                more = false;
            }
            Event::NetworkError { cause } | Event::ParseError { cause } => {
                eprintln!("Error: {}", cause);
                more = false;
            }
            Event::Exhausted => more = false,
            Event::SaveError { index, cause } => eprintln!("Save error for #{}: {}", index, cause),
            Event::SaveComplete { saved } => println!("Saved {} image(s)", saved),
            Event::EntryUpdated { .. } | Event::HydrationFailed { .. } => {}
        }
    }
    more
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();
    let term = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if term.trim().is_empty() {
        anyhow::bail!("usage: image-saver <search term>");
    }

    let fetcher = Arc::new(HttpFetcher::new(cfg.timeout).context("Failed to build fetcher")?);
    let store = Arc::new(DirectoryStore::new(cfg.output.clone()));
    let (channel, mut events) = ChannelSink::new();
    let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogSink), Arc::new(channel)];
    let mut ctl = SearchController::new(SearchSettings::from(&cfg), fetcher, store, Arc::new(TeeSink::new(sinks)));

    ctl.search(&term);
    let mut pages = 0u32;
    loop {
        ctl.settle().await;
        if !report(&mut events, &mut pages) || pages >= cfg.max_pages {
            break;
        }
        let Some(last) = ctl.entries().len().checked_sub(1) else { break };
        if !ctl.on_visible(last) {
            break;
        }
    }

    for (index, entry) in ctl.entries().iter().enumerate() {
        let thumb = entry.thumbnail.as_ref().map(|t| format!("{}x{}", t.width(), t.height()));
        println!(
            "#{:<3} {:<24} {:<10} {}",
            index,
            entry.author.as_deref().unwrap_or("-"),
            thumb.as_deref().unwrap_or("no thumb"),
            entry.description.as_deref().unwrap_or("")
        );
    }

    let count = cfg.save_count.min(ctl.entries().len());
    if count > 0 {
        for index in 0..count {
            ctl.set_selected(index, true);
        }
        if ctl.save_selected().is_some() {
            ctl.settle().await;
            report(&mut events, &mut pages);
            println!("Photos directory: {}", cfg.output.display());
        }
    }
    ctl.shutdown();
    Ok(())
}
