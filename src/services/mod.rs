// Probe and provisioning services, leaves first.

pub mod probe_client;
pub mod tls_advisor;
pub mod server_probe;
pub mod auth_negotiator;
pub mod connectivity;
pub mod folder_provisioner;

// Re-export main types for convenience
pub use auth_negotiator::AuthTypeNegotiator;
pub use connectivity::AuthenticatedConnectivityProbe;
pub use folder_provisioner::{FolderProvisioner, LocalOutcome, RemoteOutcome};
pub use probe_client::{ProbeClient, ProbeFailure, ProbeResponse};
pub use server_probe::ServerExistenceProbe;
