mod broker;
mod dispatch;

pub use broker::{ChannelBroker, MessageBroker};
pub use dispatch::DispatchService;

use serde::{Deserialize, Serialize};

/// Payload published per accepted job. Carries only addressing data; the
/// worker re-reads the authoritative record from the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub job_id: String,
    pub organization_id: String,
    pub storage_key: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
