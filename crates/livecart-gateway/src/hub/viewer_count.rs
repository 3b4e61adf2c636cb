use std::sync::{Arc, Weak};

use livecart_protocol::frames::ViewerCountPayload;
use livecart_protocol::EventPayload;
use tracing::debug;

use super::{Hub, HubError};

/// Spawn the trailing-debounce task that turns registration churn into
/// `viewer_count` events. A burst of joins inside one debounce window yields
/// a single event carrying the final count.
pub(super) fn spawn(hub: &Arc<Hub>) {
    let membership = Arc::clone(&hub.membership);
    let debounce = hub.settings.viewer_count_debounce;
    let weak: Weak<Hub> = Arc::downgrade(hub);

    tokio::spawn(async move {
        let mut last_sent: Option<u64> = None;
        loop {
            membership.notified().await;
            tokio::time::sleep(debounce).await;

            let Some(hub) = weak.upgrade() else {
                break;
            };
            let count = hub.client_count() as u64;
            if last_sent == Some(count) {
                continue;
            }
            match hub.publish(EventPayload::ViewerCount(ViewerCountPayload { count })) {
                Ok(_) => last_sent = Some(count),
                Err(HubError::ShutDown) => break,
                Err(e) => debug!(error = %e, "viewer count not published"),
            }
        }
        debug!("viewer count task stopped");
    });
}
