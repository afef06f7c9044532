//! Server side of the kiosk: pair-id listing, asset downloads, and vote
//! submission over plain GET endpoints.
//!
//! [`RemoteCoordinator`] is the seam the rest of the workspace talks to;
//! [`HttpCoordinator`] is the production implementation. Votes go through
//! a dedicated worker thread so a slow server never stalls the display
//! loop. The worker drains a bounded channel and exits when the last
//! [`VoteHandle`] is dropped.

use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use core_events::{VOTES_ENQUEUED, VOTES_FAILED};
use core_gallery::{ItemId, VoteSink};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, info, warn};

/// Upper bound on buffered vote submissions. Presses arrive at human
/// speed with a settle delay in between, so this never fills in practice.
pub const VOTE_CHANNEL_CAP: usize = 64;

/// Per-request timeout applied by the production client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// -------------------------------------------------------------------------------------------------
// Coordinator seam
// -------------------------------------------------------------------------------------------------

/// Everything the kiosk asks of the server.
///
/// Implementations must not block forever; the production client caps
/// every request with [`REQUEST_TIMEOUT`].
pub trait RemoteCoordinator: Send + Sync + 'static {
    /// All pair ids the server currently holds.
    fn list_known_ids(&self) -> Result<Vec<u32>>;

    /// Raw bytes of one image half. `id` is the zero-padded string form,
    /// `slot` is 1 for left and 2 for right.
    fn fetch_asset(&self, id: &str, slot: u8) -> Result<Vec<u8>>;

    /// Attributes one vote to a pair. Option 1 is the right image, 2 the
    /// left.
    fn record_vote(&self, id: &str, option: u8) -> Result<()>;
}

// -------------------------------------------------------------------------------------------------
// HTTP implementation
// -------------------------------------------------------------------------------------------------

/// Connection settings for [`HttpCoordinator`].
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Vote/listing API, e.g. `https://example.net`.
    pub server_url: String,
    /// Public storage prefix the asset files live under.
    pub asset_base_url: String,
    pub api_key: String,
}

pub struct HttpCoordinator {
    http: reqwest::blocking::Client,
    server_url: String,
    asset_base_url: String,
    api_key: String,
}

impl HttpCoordinator {
    pub fn new(settings: RemoteSettings) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            server_url: settings.server_url.trim_end_matches('/').to_string(),
            asset_base_url: settings.asset_base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
        })
    }

    fn ids_url(&self) -> String {
        format!("{}/get-all-pair-ids", self.server_url)
    }

    fn vote_url(&self) -> String {
        format!("{}/vote", self.server_url)
    }

    fn asset_url(&self, id: &str, slot: u8) -> String {
        format!("{}/{id}_{slot}.jpg", self.asset_base_url)
    }
}

impl RemoteCoordinator for HttpCoordinator {
    fn list_known_ids(&self) -> Result<Vec<u32>> {
        let response = self
            .http
            .get(self.ids_url())
            .query(&[("key", self.api_key.as_str())])
            .send()?
            .error_for_status()?;
        let ids: Vec<u32> = response.json()?;
        debug!(target: "remote.http", count = ids.len(), "pair_ids_listed");
        Ok(ids)
    }

    fn fetch_asset(&self, id: &str, slot: u8) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.asset_url(id, slot))
            .send()?
            .error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }

    fn record_vote(&self, id: &str, option: u8) -> Result<()> {
        let option = option.to_string();
        self.http
            .get(self.vote_url())
            .query(&[
                ("id", id),
                ("option", option.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
// Vote worker
// -------------------------------------------------------------------------------------------------

struct VoteRequest {
    id: String,
    option: u8,
}

/// Cloneable enqueue side of the vote worker. Implements [`VoteSink`] so
/// the gallery can hand votes straight to it.
#[derive(Clone)]
pub struct VoteHandle {
    sender: Sender<VoteRequest>,
}

impl VoteSink for VoteHandle {
    fn record_vote(&self, id: &ItemId, option: u8) {
        let request = VoteRequest {
            id: id.to_string(),
            option,
        };
        match self.sender.try_send(request) {
            Ok(()) => {
                VOTES_ENQUEUED.fetch_add(1, Ordering::Relaxed);
                debug!(target: "remote.vote", id = %id, option, "vote_enqueued");
            }
            Err(TrySendError::Full(_)) => {
                VOTES_FAILED.fetch_add(1, Ordering::Relaxed);
                warn!(target: "remote.vote", id = %id, option, "vote_dropped_channel_full");
            }
            Err(TrySendError::Disconnected(_)) => {
                VOTES_FAILED.fetch_add(1, Ordering::Relaxed);
                warn!(target: "remote.vote", id = %id, option, "vote_dropped_worker_gone");
            }
        }
    }
}

/// Spawns the vote worker thread with the default channel capacity.
pub fn spawn_vote_worker(
    remote: Arc<dyn RemoteCoordinator>,
) -> io::Result<(VoteHandle, JoinHandle<()>)> {
    spawn_vote_worker_with_cap(remote, VOTE_CHANNEL_CAP)
}

pub fn spawn_vote_worker_with_cap(
    remote: Arc<dyn RemoteCoordinator>,
    cap: usize,
) -> io::Result<(VoteHandle, JoinHandle<()>)> {
    let (sender, receiver) = bounded(cap);
    let worker = thread::Builder::new()
        .name("vote-worker".to_string())
        .spawn(move || worker_loop(remote, receiver))?;
    Ok((VoteHandle { sender }, worker))
}

fn worker_loop(remote: Arc<dyn RemoteCoordinator>, requests: Receiver<VoteRequest>) {
    for request in requests.iter() {
        match remote.record_vote(&request.id, request.option) {
            Ok(()) => {
                info!(
                    target: "remote.vote",
                    id = %request.id,
                    option = request.option,
                    "vote_recorded"
                );
            }
            Err(err) => {
                VOTES_FAILED.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "remote.vote",
                    id = %request.id,
                    option = request.option,
                    error = %err,
                    "vote_failed"
                );
            }
        }
    }
    debug!(target: "remote.vote", "vote_worker_stopped");
}
