/*!
 * Account provisioning for a file-sync client: probe a server for an
 * installed instance, negotiate the authentication scheme, verify
 * credentials against the WebDAV root, provision the first folder pair and
 * commit the account, all as one cancellable saga.
 */

pub mod config;
pub mod credentials;
pub mod dav_xml;
pub mod errors;
pub mod models;
pub mod saga;
pub mod services;
pub mod store;
pub mod test_utils;

pub use config::SetupConfig;
pub use credentials::{CredentialSupplier, Credentials, DummyCredentials, HttpBasicCredentials};
pub use errors::SetupError;
pub use models::{
    AccountDescriptor, AccountState, AuthKind, FolderDefinition, LogLevel, LogLine, ProbeOutcome,
    ProbeReport, ProvisioningResult, ProxyMode,
};
pub use saga::{ProvisioningSaga, SagaHandle, SagaOptions, SagaRunner, SagaState};
pub use store::{AccountStore, FolderHandle, FolderRegistry, SyncJournal};
