use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::Client;
use rusqlite::Connection;
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::db::{self, DeviceRecord};
use crate::parser;
use crate::parser::classify;

const START_URLS: &[&str] = &["https://noteb.com/?search/search.php?type=99&sort_by=value"];
const UA: &str = "Mozilla/5.0 (PC-Slim Noteb Scraper v2)";

/// Politeness delay between consecutive fetches.
const PAUSE: Duration = Duration::from_secs(1);
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1200;

static DETAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(product|notebook|search/detail)").unwrap());
static NEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Next|Volgende|>").unwrap());

pub struct ScrapeStats {
    pub total: usize,
    pub saved: usize,
    pub skipped_os: usize,
    pub skipped_identity: usize,
    pub errors: usize,
}

/// Keep/skip decision for one assembled record, taken before anything
/// touches the staging store.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    Stage,
    ExcludedOs,
    MissingIdentity,
}

/// First application of the OS filter plus the identity precondition:
/// excluded devices and heading-less records never reach staging.
pub fn staging_disposition(rec: &DeviceRecord) -> Disposition {
    if rec.os.as_deref().is_some_and(classify::is_excluded_os) {
        Disposition::ExcludedOs
    } else if rec.brand.is_none() || rec.model_name.is_none() {
        Disposition::MissingIdentity
    } else {
        Disposition::Stage
    }
}

/// Crawl the listing pagination, fetch each detail page sequentially, and
/// upsert every record that passes the OS filter into staging. Fetch
/// failures are retried a bounded number of times and then skipped; store
/// failures abort the run.
pub async fn scrape(conn: &Connection, limit: Option<usize>) -> Result<ScrapeStats> {
    let client = Client::builder().user_agent(UA).build()?;

    let mut urls = Vec::new();
    for start in START_URLS {
        urls.extend(collect_detail_urls(&client, start).await?);
    }
    if let Some(n) = limit {
        urls.truncate(n);
    }

    let mut stats = ScrapeStats {
        total: urls.len(),
        saved: 0,
        skipped_os: 0,
        skipped_identity: 0,
        errors: 0,
    };

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    for url in &urls {
        tokio::time::sleep(PAUSE).await;
        pb.inc(1);

        let html = match fetch_with_retry(&client, url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("detail fetch failed, skipping {}: {}", url, e);
                stats.errors += 1;
                continue;
            }
        };

        let rec = parser::parse_detail(url, &html);
        match staging_disposition(&rec) {
            Disposition::ExcludedOs => {
                info!(
                    "skip OS {:?}: {:?} {:?}",
                    rec.os, rec.brand, rec.model_name
                );
                stats.skipped_os += 1;
            }
            Disposition::MissingIdentity => {
                warn!("no brand/model in heading, skipping {}", url);
                stats.skipped_identity += 1;
            }
            Disposition::Stage => {
                db::upsert_raw(conn, &rec)?;
                stats.saved += 1;
            }
        }
    }

    pb.finish_and_clear();
    info!(
        "scraped {} pages: {} saved, {} OS-skipped, {} without identity, {} errors",
        stats.total, stats.saved, stats.skipped_os, stats.skipped_identity, stats.errors
    );
    Ok(stats)
}

/// Walk the result pagination from `start`, collecting deduplicated detail
/// page URLs until there is no next-page link.
async fn collect_detail_urls(client: &Client, start: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut visited_pages = HashSet::new();
    let mut out = Vec::new();
    let mut next = Some(start.to_string());

    while let Some(page_url) = next {
        visited_pages.insert(page_url.clone());
        let html = fetch_with_retry(client, &page_url).await?;
        let (links, next_href) = listing_links(&page_url, &html);
        for link in links {
            if seen.insert(link.clone()) {
                out.push(link);
            }
        }
        next = next_unvisited(&visited_pages, next_href);
        tokio::time::sleep(PAUSE).await;
    }

    info!("found {} detail pages", out.len());
    Ok(out)
}

/// A next link pointing back at an already-fetched listing page ends the
/// walk instead of cycling.
fn next_unvisited(visited: &HashSet<String>, next_href: Option<String>) -> Option<String> {
    match next_href {
        Some(url) if visited.contains(&url) => {
            warn!("pagination cycle at {}, stopping", url);
            None
        }
        other => other,
    }
}

/// Extract detail links and the next-page href from a listing page.
fn listing_links(page_url: &str, html: &str) -> (Vec<String>, Option<String>) {
    let doc = Html::parse_document(html);
    let anchor = Selector::parse("a[href]").unwrap();
    let base = Url::parse(page_url).ok();

    let absolutize = |href: &str| -> Option<String> {
        match &base {
            Some(b) => b.join(href).ok().map(Into::into),
            None => Some(href.to_string()),
        }
    };

    let mut links = Vec::new();
    let mut next = None;
    for a in doc.select(&anchor) {
        let Some(href) = a.value().attr("href") else { continue };
        if DETAIL_RE.is_match(href) {
            links.extend(absolutize(href));
        }
        let text: String = a.text().collect();
        if next.is_none() && NEXT_RE.is_match(text.trim()) {
            next = absolutize(href);
        }
    }
    (links, next)
}

async fn fetch_with_retry(client: &Client, url: &str) -> Result<String> {
    let mut last_err = None;
    for attempt in 1..=MAX_RETRIES {
        match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * attempt as u64);
                    warn!(
                        "fetch {} failed (attempt {}/{}), backing off {:.1}s: {}",
                        url,
                        attempt,
                        MAX_RETRIES,
                        backoff.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("fetch failed: {}", url)))
}

async fn fetch_once(client: &Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .timeout(Duration::from_secs(25))
        .send()
        .await
        .with_context(|| format!("request failed: {url}"))?;
    let resp = resp.error_for_status()?;
    Ok(resp.text().await?)
}
