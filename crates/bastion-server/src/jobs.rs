//! Background maintenance tasks.

use std::time::Duration;

use bastion_core::error::BastionResult;
use bastion_core::repository::{Pagination, RefreshTokenRepository, TenantRepository};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tenants fetched per page while sweeping.
const SWEEP_PAGE: u64 = 100;

/// Remove expired refresh records in every tenant. Returns the total
/// removed.
pub async fn sweep_expired_refresh_tokens<N, T>(tenants: &N, refresh: &T) -> BastionResult<u64>
where
    N: TenantRepository,
    T: RefreshTokenRepository,
{
    let mut page = Pagination {
        offset: 0,
        limit: SWEEP_PAGE,
    };
    let mut removed = 0;

    loop {
        let batch = tenants.list(page.clone()).await?;
        for tenant in &batch.items {
            removed += refresh.cleanup_expired(tenant.id).await?;
        }
        page.offset += batch.items.len() as u64;
        if batch.items.is_empty() || page.offset >= batch.total {
            break;
        }
    }

    Ok(removed)
}

/// Sweep expired refresh records across all tenants every `interval`.
/// Returns `None` when `interval` is zero.
pub fn spawn_refresh_cleanup<N, T>(
    tenants: N,
    refresh: T,
    interval: Duration,
) -> Option<JoinHandle<()>>
where
    N: TenantRepository + 'static,
    T: RefreshTokenRepository + 'static,
{
    if interval.is_zero() {
        info!("refresh record cleanup disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match sweep_expired_refresh_tokens(&tenants, &refresh).await {
                Ok(0) => debug!("no expired refresh records"),
                Ok(removed) => info!(removed, "expired refresh records removed"),
                Err(e) => warn!(error = %e, "refresh record cleanup failed"),
            }
        }
    }))
}
