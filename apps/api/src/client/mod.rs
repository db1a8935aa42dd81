//! Client runtime for keeping a local copy of a league in sync.
//!
//! Two channels feed a [`LeagueStateReconciler`]: full snapshots from the
//! change feed ([`LeagueApiClient::watch_league`]) and version-tagged deltas
//! from the push channel ([`SyncClient`]).

pub mod api;
pub mod backoff;
pub mod connection;
pub mod error;
pub mod reconciler;

pub use api::LeagueApiClient;
pub use backoff::ReconnectPolicy;
pub use connection::{StaticToken, SyncClient, SyncClientConfig, SyncEvent, TokenSource};
pub use error::{ClientError, ClientResult};
pub use reconciler::{LeagueStateReconciler, Reconciliation};
