use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use crate::error::Result;
use crate::fetch::{
    decode_orders, ensure_concurrency_limit, request::orders_url, FetchOutcome, PayloadFormat,
    RemoteFetcher,
};
use crate::records::{MarketOrder, RegionId};
use crate::storage::MarketStore;

use super::SyncReport;

/// How a region's page walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEnd {
    /// An empty page marked the end of the book.
    Drained,
    /// A later page failed after retries; the partial book is discarded.
    Truncated { page: u32, reason: String },
    /// The first page failed, so there is nothing to replace with.
    Unavailable { reason: String },
    /// The configured page bound was hit before an empty page.
    PageLimit,
    Cancelled,
}

impl PageEnd {
    /// Whether the collected pages may replace the stored snapshot.
    pub fn replaces_snapshot(&self) -> bool {
        matches!(self, PageEnd::Drained | PageEnd::PageLimit)
    }
}

#[derive(Debug)]
pub struct RegionBook {
    pub region_id: RegionId,
    pub orders: Vec<MarketOrder>,
    pub pages: u32,
    pub end: PageEnd,
}

/// Walks each region's paged order book and swaps the stored snapshot.
/// Pages within a region are sequential; regions run side by side.
pub struct OrderSync {
    store: Arc<dyn MarketStore>,
    fetcher: RemoteFetcher,
    template: String,
    format: PayloadFormat,
    concurrency: usize,
    max_pages: u32,
}

impl OrderSync {
    pub fn new(
        store: Arc<dyn MarketStore>,
        fetcher: RemoteFetcher,
        template: impl Into<String>,
        format: PayloadFormat,
        concurrency: usize,
        max_pages: u32,
    ) -> Self {
        Self {
            store,
            fetcher,
            template: template.into(),
            format,
            concurrency: ensure_concurrency_limit(concurrency),
            max_pages: max_pages.max(1),
        }
    }

    pub async fn run_cycle(&self, regions: &[RegionId]) -> Result<SyncReport> {
        let books: Vec<Result<RegionBook>> = stream::iter(regions.iter().copied())
            .map(|region_id| self.collect_region(region_id))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SyncReport {
            jobs: regions.len(),
            ..SyncReport::default()
        };

        for book in books {
            let book = book?;
            if !book.end.replaces_snapshot() {
                warn!(
                    "keeping previous orders for region {}: {:?}",
                    book.region_id, book.end
                );
                report.failed += 1;
                continue;
            }

            let written = self.store.replace_orders(book.region_id, &book.orders)?;
            info!(
                "region {}: replaced orders with {} row(s) from {} page(s)",
                book.region_id, written, book.pages
            );
            report.succeeded += 1;
            report.rows_written += written;
        }

        Ok(report)
    }

    /// Fetch pages 1.. until an empty page, a failure or the page bound.
    pub async fn collect_region(&self, region_id: RegionId) -> Result<RegionBook> {
        let mut orders = Vec::new();
        let mut pages = 0;

        let end = loop {
            if pages >= self.max_pages {
                warn!(
                    "region {region_id}: stopped at the {} page limit",
                    self.max_pages
                );
                break PageEnd::PageLimit;
            }

            let page = pages + 1;
            let url = orders_url(&self.template, region_id, page)?;

            let failure = match self.fetcher.fetch(&url).await {
                FetchOutcome::Succeeded(body) => match decode_orders(&body, self.format, region_id) {
                    Ok(batch) if batch.is_empty() => {
                        debug!("region {region_id}: page {page} empty, book complete");
                        break PageEnd::Drained;
                    }
                    Ok(batch) => {
                        orders.extend(batch);
                        pages = page;
                        continue;
                    }
                    Err(err) => format!("undecodable page: {err}"),
                },
                FetchOutcome::Exhausted { last_error, .. } => last_error,
                FetchOutcome::Cancelled => break PageEnd::Cancelled,
            };

            break if page == 1 {
                PageEnd::Unavailable { reason: failure }
            } else {
                warn!("region {region_id}: page {page} failed after {pages} good page(s): {failure}");
                PageEnd::Truncated {
                    page,
                    reason: failure,
                }
            };
        };

        Ok(RegionBook {
            region_id,
            orders,
            pages,
            end,
        })
    }
}
