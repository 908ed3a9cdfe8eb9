//! Record-level broadcast helpers shared by sessions and the server.

use std::sync::Arc;

use tracing::{error, info};

use relay_core::{ConnectionId, DisplayName};
use relay_protocol::{encode_server, ServerRecord};

use crate::registry::{BroadcastReport, RegistryHandle};

/// Encodes `record` once and delivers it to every registered connection.
pub async fn broadcast_record(registry: &RegistryHandle, record: &ServerRecord) -> BroadcastReport {
    match encode_server(record) {
        Ok(payload) => registry.broadcast(Arc::from(payload)).await,
        Err(e) => {
            error!(error = %e, "Failed to encode record");
            BroadcastReport::default()
        }
    }
}

/// Sends `announcement` followed by a fresh `user_list`.
///
/// The two broadcasts are back-to-back but not atomic; another session's
/// join or leave may interleave.
pub async fn announce_roster_change(registry: &RegistryHandle, announcement: &ServerRecord) {
    broadcast_record(registry, announcement).await;

    let users = registry.snapshot_names().await;
    let report = broadcast_record(registry, &ServerRecord::user_list(users)).await;
    if report.failed > 0 {
        info!(
            delivered = report.delivered,
            failed = report.failed,
            "User list partially delivered"
        );
    }
}

/// Removes the connection's entry and, if one existed, announces the departure.
///
/// Safe to call more than once for the same connection: only the call that
/// actually removed the entry announces anything.
pub async fn cleanup_connection(
    registry: &RegistryHandle,
    connection_id: ConnectionId,
) -> Option<DisplayName> {
    let name = registry.remove(connection_id).await?;

    info!(connection = %connection_id, name = %name, "Member left");
    announce_roster_change(registry, &ServerRecord::left(&name)).await;

    Some(name)
}
