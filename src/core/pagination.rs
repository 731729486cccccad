use crate::domain::model::AggregateResult;
use crate::domain::ports::PageSource;
use crate::utils::error::LicenseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The backend reported no further pages.
    Exhausted,
    /// Fetching `page` failed; earlier pages are kept.
    FetchFailed { page: u32 },
    /// The page ceiling was reached before the backend stopped.
    PageLimit,
}

#[derive(Debug)]
pub struct PageAggregation {
    pub result: AggregateResult,
    pub stop: StopReason,
    pub error: Option<LicenseError>,
}

/// Walks pages 1.. of `source` strictly in order, concatenating records.
///
/// Stops on the first failed fetch, when the backend reports no more pages
/// (`hasMore == false` or `currentPage >= totalPages`), or once `max_pages`
/// pages have been fetched. Totals are taken from the last page that was
/// fetched successfully.
pub async fn aggregate_pages<P>(source: &P, max_pages: u32) -> PageAggregation
where
    P: PageSource + ?Sized,
{
    let mut result = AggregateResult::default();
    let mut page_number: u32 = 1;

    let stop = loop {
        if result.pages_fetched >= max_pages {
            tracing::warn!(
                "Stopped listing after {} pages: page ceiling reached",
                result.pages_fetched
            );
            break StopReason::PageLimit;
        }

        match source.fetch_page(page_number).await {
            Ok(page) => {
                tracing::debug!(
                    "Page {}/{}: {} records (hasMore={})",
                    page.current_page,
                    page.total_pages,
                    page.licenses.len(),
                    page.has_more
                );

                let finished = !page.has_more || page_number >= page.total_pages;
                result.total_pages = page.total_pages;
                result.total_count = page.total_count;
                result.pages_fetched += 1;
                result.licenses.extend(page.licenses);

                if finished {
                    break StopReason::Exhausted;
                }
                page_number += 1;
            }
            Err(err) => {
                tracing::warn!("Failed to fetch page {}: {}", page_number, err);
                return PageAggregation {
                    result,
                    stop: StopReason::FetchFailed { page: page_number },
                    error: Some(err),
                };
            }
        }
    };

    tracing::info!(
        "Aggregated {} licenses across {} page(s)",
        result.licenses.len(),
        result.pages_fetched
    );

    PageAggregation {
        result,
        stop,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LicensePage, LicenseRecord};
    use crate::utils::error::Result;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn records(page: u32, count: usize) -> Vec<LicenseRecord> {
        (0..count)
            .map(|i| {
                LicenseRecord::new(json!({
                    "email": format!("user{}-{}@example.com", page, i),
                    "accountNumber": "ACC-1"
                }))
            })
            .collect()
    }

    /// Serves `sizes.len()` pages, failing from `fail_from` onward when set.
    struct ScriptedSource {
        sizes: Vec<usize>,
        fail_from: Option<u32>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(sizes: Vec<usize>) -> Self {
            Self {
                sizes,
                fail_from: None,
                calls: AtomicU32::new(0),
            }
        }

        fn failing_from(mut self, page: u32) -> Self {
            self.fail_from = Some(page);
            self
        }
    }

    #[async_trait::async_trait]
    impl PageSource for ScriptedSource {
        async fn fetch_page(&self, page_number: u32) -> Result<LicensePage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_from.is_some_and(|p| page_number >= p) {
                return Err(LicenseError::Transport("connection reset".into()));
            }
            let total_pages = self.sizes.len() as u32;
            let size = self.sizes[(page_number - 1) as usize];
            Ok(LicensePage {
                licenses: records(page_number, size),
                current_page: page_number,
                total_pages,
                total_count: self.sizes.iter().sum::<usize>() as u64,
                has_more: page_number < total_pages,
            })
        }
    }

    /// Claims there is always another page.
    struct EndlessSource {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl PageSource for EndlessSource {
        async fn fetch_page(&self, page_number: u32) -> Result<LicensePage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(LicensePage {
                licenses: records(page_number, 1),
                current_page: page_number,
                total_pages: u32::MAX,
                total_count: 1,
                has_more: true,
            })
        }
    }

    #[tokio::test]
    async fn test_collects_all_pages_in_order() {
        let source = ScriptedSource::new(vec![10, 10, 4]);
        let aggregation = aggregate_pages(&source, 100).await;

        assert_eq!(aggregation.stop, StopReason::Exhausted);
        assert!(aggregation.error.is_none());
        let result = aggregation.result;
        assert_eq!(result.licenses.len(), 24);
        assert_eq!(result.pages_fetched, 3);
        assert_eq!(result.total_pages, 3);
        assert_eq!(result.total_count, 24);
        assert_eq!(result.licenses[0].email(), Some("user1-0@example.com"));
        assert_eq!(result.licenses[10].email(), Some("user2-0@example.com"));
        assert_eq!(result.licenses[23].email(), Some("user3-3@example.com"));
    }

    #[tokio::test]
    async fn test_failed_page_keeps_earlier_records() {
        let source = ScriptedSource::new(vec![5, 5, 5, 5]).failing_from(3);
        let aggregation = aggregate_pages(&source, 100).await;

        assert_eq!(aggregation.stop, StopReason::FetchFailed { page: 3 });
        assert!(matches!(aggregation.error, Some(LicenseError::Transport(_))));
        assert_eq!(aggregation.result.licenses.len(), 10);
        assert_eq!(aggregation.result.pages_fetched, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_page_failure_yields_empty_result() {
        let source = ScriptedSource::new(vec![5]).failing_from(1);
        let aggregation = aggregate_pages(&source, 100).await;

        assert_eq!(aggregation.stop, StopReason::FetchFailed { page: 1 });
        assert_eq!(aggregation.result.pages_fetched, 0);
        assert!(aggregation.result.licenses.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_page_ceiling() {
        let source = EndlessSource {
            calls: AtomicU32::new(0),
        };
        let aggregation = aggregate_pages(&source, 100).await;

        assert_eq!(aggregation.stop, StopReason::PageLimit);
        assert_eq!(source.calls.load(Ordering::SeqCst), 100);
        assert_eq!(aggregation.result.pages_fetched, 100);
        assert_eq!(aggregation.result.licenses.len(), 100);
    }

    #[tokio::test]
    async fn test_custom_ceiling_is_honoured() {
        let source = EndlessSource {
            calls: AtomicU32::new(0),
        };
        let aggregation = aggregate_pages(&source, 7).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 7);
        assert_eq!(aggregation.result.pages_fetched, 7);
    }
}
