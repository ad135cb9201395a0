use anyhow::Result;
use async_trait::async_trait;

use crate::models::{AccountDescriptor, AccountState, FolderDefinition};

/// Persistence seam for accounts. The saga calls `commit` exactly once per
/// successful run (or on an explicit skip), never on abort.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fresh mutable draft for a new provisioning run.
    fn create_draft(&self) -> AccountDescriptor;

    /// Detaches the draft into an immutable, stored account state.
    async fn commit(&self, draft: AccountDescriptor) -> Result<AccountState>;

    /// Flushes pending account changes.
    async fn save(&self) -> Result<()>;
}

/// Journal exposed by a registered folder, on which selective-sync lists are
/// set after registration.
pub trait SyncJournal: Send + Sync {
    fn set_selective_sync_blacklist(&self, entries: Vec<String>);
    fn set_selective_sync_whitelist(&self, entries: Vec<String>);
}

pub trait FolderHandle: Send + Sync {
    fn journal(&self) -> &dyn SyncJournal;
}

/// Registry of configured sync folders.
#[async_trait]
pub trait FolderRegistry: Send + Sync {
    async fn add_folder(
        &self,
        account: &AccountState,
        definition: FolderDefinition,
    ) -> Result<Box<dyn FolderHandle>>;
}
