use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SetupConfig;
use crate::credentials::{CredentialSupplier, DummyCredentials};
use crate::errors::SetupError;
use crate::models::{
    AccountDescriptor, AuthKind, FolderDefinition, LogLine, ProbeOutcome, ProvisioningResult,
    ProxyMode,
};
use crate::services::auth_negotiator::AuthTypeNegotiator;
use crate::services::connectivity::AuthenticatedConnectivityProbe;
use crate::services::folder_provisioner::{FolderProvisioner, LocalOutcome, RemoteOutcome};
use crate::services::probe_client::ProbeClient;
use crate::services::server_probe::ServerExistenceProbe;
use crate::store::{AccountStore, FolderRegistry};

/// Saga progress, strictly ordered. `Commit` and `Aborted` are the only
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Start,
    ServerExistenceCheck,
    AuthTypeNegotiation,
    AuthenticatedVerification,
    FolderProvisioning,
    Commit,
    Aborted,
}

/// Per-run inputs collected from the user before the saga starts.
#[derive(Debug, Clone)]
pub struct SagaOptions {
    pub server_url: String,
    pub local_folder: String,
    pub remote_folder: String,
    pub proxy_mode: ProxyMode,
    /// Persist the account without provisioning any folder pair.
    pub skip_folder_setup: bool,
    /// When false, the user pre-accepted the selective-sync dialog and the
    /// whitelist is seeded with the root.
    pub confirm_big_folders: bool,
    pub selective_sync_blacklist: Vec<String>,
}

impl SagaOptions {
    pub fn new(server_url: impl Into<String>, config: &SetupConfig) -> Self {
        Self {
            server_url: server_url.into(),
            local_folder: config.default_local_folder.clone(),
            remote_folder: config.default_remote_folder.clone(),
            proxy_mode: ProxyMode::default(),
            skip_folder_setup: false,
            confirm_big_folders: false,
            selective_sync_blacklist: Vec::new(),
        }
    }
}

/// The account provisioning saga: one ordered, cancellable workflow from a
/// user-entered URL to a persisted, sync-ready account. Probes resolve to
/// outcome values; the saga alone decides transitions and owns the draft.
pub struct ProvisioningSaga {
    config: SetupConfig,
    options: SagaOptions,
    supplier: Arc<dyn CredentialSupplier>,
    store: Arc<dyn AccountStore>,
    registry: Arc<dyn FolderRegistry>,
    cancel: CancellationToken,
    state: SagaState,
    log: Vec<LogLine>,
    invalid_remote_folder: Option<String>,
}

impl ProvisioningSaga {
    pub fn new(
        config: SetupConfig,
        options: SagaOptions,
        supplier: Arc<dyn CredentialSupplier>,
        store: Arc<dyn AccountStore>,
        registry: Arc<dyn FolderRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            options,
            supplier,
            store,
            registry,
            cancel,
            state: SagaState::Start,
            log: Vec::new(),
            invalid_remote_folder: None,
        }
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub async fn run(mut self) -> ProvisioningResult {
        let mut account = self.store.create_draft();
        if let Err(error) = self.prepare_account(&mut account) {
            return self.abort(error);
        }

        if self.options.skip_folder_setup {
            // Account-only setup: persist and finish without touching folders.
            self.transition(SagaState::Commit);
            return self.commit(account, None).await;
        }

        account.proxy_mode = resolve_proxy(&self.options.proxy_mode).await;
        let client = match ProbeClient::new(&account.proxy_mode, self.cancel.clone()) {
            Ok(client) => client,
            Err(e) => return self.abort(SetupError::network_transport(e.to_string())),
        };

        self.transition(SagaState::ServerExistenceCheck);
        self.log_info(format!("Trying to connect to {}...", account.base_url));
        let report = ServerExistenceProbe::new(&client, &self.config)
            .probe(&account)
            .await;
        if self.cancel.is_cancelled() {
            return self.abort(SetupError::UserCancelled);
        }
        match report.outcome {
            ProbeOutcome::Success {
                version,
                canonical_url,
            } => {
                self.log_info(format!(
                    "Successfully connected to {}: version {}",
                    canonical_url,
                    version.as_deref().unwrap_or("unknown")
                ));
                account.server_version = version;
                account.set_base_url(canonical_url);
            }
            other => {
                let error = self.probe_error(&account, other);
                return self.abort_probe(error, report.downgrade_advised);
            }
        }

        self.transition(SagaState::AuthTypeNegotiation);
        let kind = AuthTypeNegotiator::new(&client, &self.config)
            .negotiate(&account)
            .await;
        if self.cancel.is_cancelled() {
            return self.abort(SetupError::UserCancelled);
        }
        account.auth_kind = Some(kind);
        self.log_info(match kind {
            AuthKind::HttpBasic => "The server asks for a username and a password.",
            AuthKind::FederatedSso => {
                "The server hands authentication off to an identity provider."
            }
        });

        loop {
            let Some(credentials) = self.supplier.supply(kind).await else {
                return self.abort(SetupError::UserCancelled);
            };
            account.credentials = credentials;

            self.transition(SagaState::AuthenticatedVerification);
            self.log_info(format!("Verifying credentials against {}...", account.dav_url()));
            let report = AuthenticatedConnectivityProbe::new(&client, &self.config)
                .verify(&mut account)
                .await;
            if self.cancel.is_cancelled() {
                return self.abort(SetupError::UserCancelled);
            }
            match report.outcome {
                ProbeOutcome::Success { .. } => break,
                ProbeOutcome::AuthRequired => {
                    // Recoverable by user action: hand control back to
                    // credential collection instead of aborting.
                    self.log_error(format!(
                        "Access forbidden by server. To verify that you have proper access, \
                         open {} in your browser.",
                        account.base_url
                    ));
                    continue;
                }
                other => {
                    let error = self.probe_error(&account, other);
                    return self.abort_probe(error, report.downgrade_advised);
                }
            }
        }

        self.transition(SagaState::FolderProvisioning);
        let provisioner = FolderProvisioner::new(&client, self.config.probe_timeout());

        let local_path = FolderDefinition::prepare_local_path(&self.options.local_folder);
        match provisioner.ensure_local(&local_path).await {
            Ok(LocalOutcome::AlreadyExists) => self.log_info(format!(
                "Local sync folder {local_path} already exists, setting it up for sync."
            )),
            Ok(LocalOutcome::Created) => {
                self.log_info(format!("Creating local sync folder {local_path}... ok"))
            }
            Err(error) => return self.abort(error),
        }

        let remote_path = FolderDefinition::prepare_remote_path(&self.options.remote_folder);
        match provisioner.ensure_remote(&account, &remote_path).await {
            Ok(RemoteOutcome::Existed) => self.log_info(format!(
                "Remote folder {remote_path} already exists, connecting it for syncing."
            )),
            Ok(RemoteOutcome::Created) => {
                self.log_info(format!("Remote folder {remote_path} created successfully."))
            }
            Err(error) => {
                if matches!(error, SetupError::AuthenticationInvalid { .. }) {
                    // A rejected remote name must not be offered again on
                    // the next attempt; the result carries it back.
                    self.invalid_remote_folder = Some(remote_path.clone());
                }
                return self.abort(error);
            }
        }

        let folder = FolderDefinition {
            local_path,
            remote_path,
            ignore_hidden_files: self.config.ignore_hidden_files,
            selective_sync_blacklist: self.options.selective_sync_blacklist.clone(),
            selective_sync_whitelist: if self.options.confirm_big_folders {
                Vec::new()
            } else {
                vec!["/".to_string()]
            },
        };

        self.transition(SagaState::Commit);
        self.commit(account, Some(folder)).await
    }

    /// Applies the user-entered URL to the draft and resets it to a neutral
    /// credential, so the first probe never carries authentication material.
    fn prepare_account(&mut self, account: &mut AccountDescriptor) -> Result<(), SetupError> {
        let raw = self.options.server_url.trim();
        if raw.is_empty() {
            return Err(SetupError::network_transport("Invalid URL"));
        }
        // A bare host defaults to the secure scheme, not the parser's
        // plaintext default.
        let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| SetupError::network_transport(format!("Invalid URL '{raw}': {e}")))?;

        account.set_base_url(url);
        account.server_version = None;
        account.auth_kind = None;
        account.credentials = Arc::new(DummyCredentials);
        Ok(())
    }

    async fn commit(
        mut self,
        account: AccountDescriptor,
        folder: Option<FolderDefinition>,
    ) -> ProvisioningResult {
        // Detaching the draft first means nothing can mutate what gets
        // persisted, not even this saga.
        let state = match self.store.commit(account).await {
            Ok(state) => state,
            Err(e) => {
                self.log_error(format!("Could not save the new account: {e}"));
                return self.finish(false, None);
            }
        };
        if let Err(e) = self.store.save().await {
            self.log_error(format!("Could not save the new account: {e}"));
            return self.finish(false, None);
        }

        let Some(folder) = folder else {
            self.log_info("Successfully connected!");
            return self.finish(true, None);
        };

        match self.registry.add_folder(&state, folder.clone()).await {
            Ok(handle) => {
                let journal = handle.journal();
                journal.set_selective_sync_blacklist(folder.selective_sync_blacklist.clone());
                if !folder.selective_sync_whitelist.is_empty() {
                    journal.set_selective_sync_whitelist(folder.selective_sync_whitelist.clone());
                }
                self.log_info(format!(
                    "A sync connection from {} to remote directory {} was set up.",
                    folder.local_path, folder.remote_path
                ));
                self.log_info("Successfully connected!");
                self.finish(true, Some(folder))
            }
            Err(e) => {
                self.log_error(format!("Could not register the sync folder: {e}"));
                self.finish(false, None)
            }
        }
    }

    fn probe_error(&self, account: &AccountDescriptor, outcome: ProbeOutcome) -> SetupError {
        match outcome {
            ProbeOutcome::NotFound => SetupError::server_not_found(account.base_url.as_str()),
            ProbeOutcome::Timeout => SetupError::network_transport(format!(
                "Timeout while trying to connect to {}.",
                account.base_url
            )),
            ProbeOutcome::AuthRequired => SetupError::authentication_invalid(format!(
                "Access forbidden by server. To verify that you have proper access, \
                 open {} in your browser.",
                account.base_url
            )),
            ProbeOutcome::TransportError { message, .. } => {
                SetupError::network_transport(message)
            }
            ProbeOutcome::Success { .. } => {
                SetupError::network_transport("unexpected probe outcome")
            }
        }
    }

    fn abort(mut self, error: SetupError) -> ProvisioningResult {
        self.log.push(LogLine::error(error.user_message()));
        warn!(code = error.error_code(), "provisioning aborted: {}", error);
        self.transition(SagaState::Aborted);
        self.finish(false, None)
    }

    fn abort_probe(mut self, error: SetupError, downgrade_advised: bool) -> ProvisioningResult {
        self.log.push(LogLine::error(error.user_message()));
        if downgrade_advised {
            self.log.push(LogLine::info(
                "If the server address is correct, you can try connecting over plain HTTP instead.",
            ));
        }
        warn!(code = error.error_code(), "provisioning aborted: {}", error);
        self.transition(SagaState::Aborted);
        self.finish(false, None)
    }

    fn finish(self, success: bool, committed_folder: Option<FolderDefinition>) -> ProvisioningResult {
        ProvisioningResult {
            success,
            log: self.log,
            committed_folder,
            invalid_remote_folder: self.invalid_remote_folder,
        }
    }

    fn transition(&mut self, next: SagaState) {
        debug!("saga: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn log_info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.log.push(LogLine::info(text));
    }

    fn log_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.log.push(LogLine::error(text));
    }
}

/// System proxy lookup runs off the async control flow; its result is
/// applied to the draft before the first probe is issued.
async fn resolve_proxy(mode: &ProxyMode) -> ProxyMode {
    match mode {
        ProxyMode::System => {
            let resolved = tokio::task::spawn_blocking(|| {
                ["https_proxy", "HTTPS_PROXY", "http_proxy", "HTTP_PROXY"]
                    .iter()
                    .find_map(|name| std::env::var(name).ok().filter(|value| !value.is_empty()))
            })
            .await
            .ok()
            .flatten();
            match resolved {
                Some(proxy_url) => {
                    debug!("using system proxy {}", proxy_url);
                    ProxyMode::Custom(proxy_url)
                }
                None => {
                    debug!("no system proxy configured");
                    ProxyMode::NoProxy
                }
            }
        }
        other => other.clone(),
    }
}

/// Owns the single-instance discipline: at most one saga per runner is in
/// flight, and starting another while one is active is a documented no-op.
pub struct SagaRunner {
    config: SetupConfig,
    supplier: Arc<dyn CredentialSupplier>,
    store: Arc<dyn AccountStore>,
    registry: Arc<dyn FolderRegistry>,
    in_flight: Arc<AtomicBool>,
}

impl SagaRunner {
    pub fn new(
        config: SetupConfig,
        supplier: Arc<dyn CredentialSupplier>,
        store: Arc<dyn AccountStore>,
        registry: Arc<dyn FolderRegistry>,
    ) -> Self {
        Self {
            config,
            supplier,
            store,
            registry,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts a provisioning run. Returns `None` while another run is still
    /// active.
    pub fn start(&self, options: SagaOptions) -> Option<SagaHandle> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            warn!("a provisioning run is already active, ignoring start request");
            return None;
        }

        let cancel = CancellationToken::new();
        let saga = ProvisioningSaga::new(
            self.config.clone(),
            options,
            self.supplier.clone(),
            self.store.clone(),
            self.registry.clone(),
            cancel.clone(),
        );
        let guard = InFlightGuard(self.in_flight.clone());
        let task = tokio::spawn(async move {
            let _guard = guard;
            saga.run().await
        });

        Some(SagaHandle { cancel, task })
    }
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owned handle to an in-flight saga. Dropping it cancels the run; any
/// continuation still waiting on the network then resolves without touching
/// the draft account.
pub struct SagaHandle {
    cancel: CancellationToken,
    task: JoinHandle<ProvisioningResult>,
}

impl SagaHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(mut self) -> ProvisioningResult {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(_) => ProvisioningResult {
                success: false,
                log: vec![LogLine::error(SetupError::UserCancelled.user_message())],
                committed_folder: None,
                invalid_remote_folder: None,
            },
        }
    }
}

impl Drop for SagaHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
