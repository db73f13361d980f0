//! The visited-count badge collaborator.

use async_trait::async_trait;

/// Displays the deduplicated visited-URL count to the user. How it is shown
/// is the control surface's concern.
#[async_trait]
pub trait Badge: Send + Sync {
    async fn show_count(&self, count: usize);
}

/// Badge sink that discards updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBadge;

#[async_trait]
impl Badge for NullBadge {
    async fn show_count(&self, _count: usize) {}
}
