//! In-memory collaborators for exercising the provisioning saga without an
//! account database or a folder engine behind it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::config::DAV_ROOT_PATH;
use crate::credentials::{CredentialSupplier, Credentials, HttpBasicCredentials};
use crate::models::{AccountDescriptor, AccountState, AuthKind, FolderDefinition};
use crate::store::{AccountStore, FolderHandle, FolderRegistry, SyncJournal};

/// Installs a tracing subscriber for tests. Safe to call repeatedly; only the
/// first call wins.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Account store that keeps committed accounts in memory.
#[derive(Default)]
pub struct MemoryAccountStore {
    committed: Mutex<Vec<AccountState>>,
    saves: AtomicU32,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> Vec<AccountState> {
        self.committed.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> u32 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    fn create_draft(&self) -> AccountDescriptor {
        AccountDescriptor::new(
            Url::parse("https://localhost/").expect("static URL parses"),
            DAV_ROOT_PATH,
        )
    }

    async fn commit(&self, draft: AccountDescriptor) -> Result<AccountState> {
        let state = AccountState::from(draft);
        self.committed.lock().unwrap().push(state.clone());
        Ok(state)
    }

    async fn save(&self) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJournal {
    blacklist: Mutex<Vec<String>>,
    whitelist: Mutex<Vec<String>>,
}

impl MemoryJournal {
    pub fn blacklist(&self) -> Vec<String> {
        self.blacklist.lock().unwrap().clone()
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.whitelist.lock().unwrap().clone()
    }
}

impl SyncJournal for MemoryJournal {
    fn set_selective_sync_blacklist(&self, entries: Vec<String>) {
        *self.blacklist.lock().unwrap() = entries;
    }

    fn set_selective_sync_whitelist(&self, entries: Vec<String>) {
        *self.whitelist.lock().unwrap() = entries;
    }
}

struct RegisteredHandle {
    journal: Arc<MemoryJournal>,
}

impl FolderHandle for RegisteredHandle {
    fn journal(&self) -> &dyn SyncJournal {
        self.journal.as_ref()
    }
}

/// Folder registry that records registrations and their journals.
#[derive(Default)]
pub struct MemoryFolderRegistry {
    folders: Mutex<Vec<FolderDefinition>>,
    journals: Mutex<Vec<Arc<MemoryJournal>>>,
}

impl MemoryFolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folders(&self) -> Vec<FolderDefinition> {
        self.folders.lock().unwrap().clone()
    }

    pub fn journals(&self) -> Vec<Arc<MemoryJournal>> {
        self.journals.lock().unwrap().clone()
    }
}

#[async_trait]
impl FolderRegistry for MemoryFolderRegistry {
    async fn add_folder(
        &self,
        _account: &AccountState,
        definition: FolderDefinition,
    ) -> Result<Box<dyn FolderHandle>> {
        self.folders.lock().unwrap().push(definition);
        let journal = Arc::new(MemoryJournal::default());
        self.journals.lock().unwrap().push(journal.clone());
        Ok(Box::new(RegisteredHandle { journal }))
    }
}

/// Credential supplier that plays back a scripted sequence of answers; a
/// `None` entry stands for the user declining.
pub struct ScriptedCredentialSupplier {
    answers: Mutex<VecDeque<Option<Arc<dyn Credentials>>>>,
    calls: AtomicU32,
}

impl ScriptedCredentialSupplier {
    pub fn new(answers: Vec<Option<Arc<dyn Credentials>>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn basic(username: &str, password: &str) -> Option<Arc<dyn Credentials>> {
        Some(Arc::new(HttpBasicCredentials::new(username, password)))
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSupplier for ScriptedCredentialSupplier {
    async fn supply(&self, _kind: AuthKind) -> Option<Arc<dyn Credentials>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers.lock().unwrap().pop_front().flatten()
    }
}
