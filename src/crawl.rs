use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use url::Url;

use crate::error::FetchError;
use crate::model::NewObservation;
use crate::parser::links::{collect_links, merge_unique};
use crate::parser::listing::{dedup, parse_listing};
use crate::parser::Selectors;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;
const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Outcome of one extraction run.
pub struct ScrapeSummary {
    pub pages: usize,
    pub failed_pages: usize,
    pub extracted: usize,
    pub records: Vec<NewObservation>,
}

/// Discover every listing page from `seed_url` and extract its products,
/// deduplicated by `(name, price, detail_url)`.
pub async fn scrape_site(
    client: &Client,
    seed_url: &str,
    sel: &Selectors,
    concurrency: usize,
) -> Result<ScrapeSummary> {
    let pages = discover_listing_pages(client, seed_url, sel).await?;
    info!("Discovered {} listing pages", pages.len());
    let total = pages.len();

    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Workers only fetch; parsing happens here so results can be put back in page order.
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(usize, String, Result<String, FetchError>)>(concurrency * 2);

    for (index, page_url) in pages.into_iter().enumerate() {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let result = fetch_with_retry(&client, &page_url).await;
            let _ = tx.send((index, page_url, result)).await;
        });
    }
    drop(tx);

    let mut per_page: Vec<(usize, Vec<NewObservation>)> = Vec::with_capacity(total);
    let mut failed_pages = 0usize;

    while let Some((index, page_url, result)) = rx.recv().await {
        match result.and_then(|html| parse_url(&page_url).map(|u| (html, u))) {
            Ok((html, url)) => {
                let records = parse_listing(&html, &url, sel);
                if records.is_empty() {
                    info!(page = %page_url, "no product tiles");
                }
                per_page.push((index, records));
            }
            Err(e) => {
                warn!(error_kind = "fetch", page = %page_url, "skipping page: {}", e);
                failed_pages += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    per_page.sort_by_key(|(index, _)| *index);
    let all: Vec<NewObservation> = per_page.into_iter().flat_map(|(_, r)| r).collect();
    let extracted = all.len();
    let records = dedup(all);

    info!(
        "Extracted {} records from {} pages ({} failed), {} unique",
        extracted,
        total,
        failed_pages,
        records.len()
    );

    Ok(ScrapeSummary {
        pages: total,
        failed_pages,
        extracted,
        records,
    })
}

/// Seed menu entries plus each entry's pagination links, first occurrence wins.
pub async fn discover_listing_pages(
    client: &Client,
    seed_url: &str,
    sel: &Selectors,
) -> Result<Vec<String>> {
    let seed = parse_url(seed_url)?;
    info!("Fetching seed page: {}", seed_url);
    let html = fetch_with_retry(client, seed_url)
        .await
        .context("Failed to fetch seed page")?;

    let roots = collect_links(&html, &seed, &sel.menu);
    info!("Menu entries: {}", roots.len());

    let mut pagination = Vec::new();
    for root in &roots {
        let page = match fetch_with_retry(client, root).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error_kind = "fetch", page = %root, "no pagination discovered: {}", e);
                continue;
            }
        };
        let base = parse_url(root)?;
        pagination.extend(collect_links(&page, &base, &sel.pagination));
    }

    Ok(merge_unique(roots, pagination))
}

async fn fetch_with_retry(client: &Client, url: &str) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_html(client, url).await {
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                attempt += 1;
                warn!(
                    "{} (attempt {}/{}), backing off {:.1}s",
                    e,
                    attempt,
                    MAX_RETRIES,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
            other => return other,
        }
    }
}

pub async fn fetch_html(client: &Client, url: &str) -> Result<String, FetchError> {
    let http_err = |source: reqwest::Error| FetchError::Http {
        url: url.to_string(),
        source,
    };
    let response = client
        .get(url)
        .header(USER_AGENT, BROWSER_UA)
        .send()
        .await
        .map_err(http_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }
    response.text().await.map_err(http_err)
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}
