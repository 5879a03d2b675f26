use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only view of a platform user, as the identity collaborator reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub is_active: bool,
}
