//! Filtered, paginated interface listing

use crate::error::{EniError, Result};
use crate::reconciler::Reconciler;
use eniflow_cloud::{InterfaceFilter, NetworkInterface, NetworkProvider, PageRequest};
use std::collections::HashSet;
use tracing::{debug, info};

impl<P: NetworkProvider> Reconciler<P> {
    /// Every interface matching `filter`, across all pages.
    ///
    /// Pages are fetched until one comes back shorter than the page size.
    /// Entries repeated across pages are kept once, in first-seen order.
    /// Fields the provider did not honor are applied again locally. No match
    /// is an empty list, not an error.
    #[tracing::instrument(skip_all)]
    pub async fn list_interfaces(&self, filter: &InterfaceFilter) -> Result<Vec<NetworkInterface>> {
        let filter = filter.normalized();
        let mut page = PageRequest::first(self.config.page_size);
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        loop {
            let batch = self
                .provider
                .list_interfaces(&filter, page)
                .await
                .map_err(|e| EniError::from_provider("network interfaces", "list", e))?;
            let fetched = batch.len();
            debug!("Page {} returned {} interface(s)", page.number, fetched);

            for eni in batch {
                if filter.matches(&eni) && seen.insert(eni.id.clone()) {
                    found.push(eni);
                }
            }

            if fetched < page.size as usize {
                break;
            }
            page = page.next();
        }

        info!("Found {} network interface(s)", found.len());
        Ok(found)
    }
}
