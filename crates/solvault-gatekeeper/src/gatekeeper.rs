//! dApp request gate.
//!
//! One request at a time occupies the user-facing slot; later ones wait in
//! FIFO order and take the slot when it frees. The requester's future
//! resolves through a oneshot when the user approves, rejects, the request
//! expires, or its origin disconnects.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, info, warn};

use solvault_core::config::GatekeeperConfig;
use solvault_core::{Clock, VaultError, VaultResult};
use solvault_store::Store;

use crate::handle::VaultHandle;
use crate::request::{Method, Notification, Outcome, PendingRequest, Response};
use crate::sites::{ConnectedSite, SiteRegistry};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct GatekeeperOptions {
    /// None: every signing request re-asks for the password
    pub reauth_window: Option<Duration>,
    pub request_timeout: Duration,
}

impl Default for GatekeeperOptions {
    fn default() -> Self {
        Self::from_config(&GatekeeperConfig::default())
    }
}

impl GatekeeperOptions {
    pub fn from_config(config: &GatekeeperConfig) -> Self {
        Self {
            reauth_window: config.reauth_window_secs.map(Duration::from_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

struct Entry {
    request: PendingRequest,
    reply: oneshot::Sender<VaultResult<Response>>,
}

#[derive(Default)]
struct Queue {
    current: Option<Entry>,
    waiting: VecDeque<Entry>,
}

impl Queue {
    /// Returns the request if it took the slot.
    fn enqueue(&mut self, entry: Entry) -> Option<PendingRequest> {
        if self.current.is_some() {
            self.waiting.push_back(entry);
            return None;
        }
        let shown = entry.request.clone();
        self.current = Some(entry);
        Some(shown)
    }

    fn current_mut(&mut self, id: u64) -> Option<&mut Entry> {
        self.current.as_mut().filter(|e| e.request.id == id)
    }

    fn take(&mut self, id: u64) -> Option<Entry> {
        if self.current_mut(id).is_some() {
            return self.current.take();
        }
        let pos = self.waiting.iter().position(|e| e.request.id == id)?;
        self.waiting.remove(pos)
    }

    fn take_origin(&mut self, origin: &str) -> Vec<Entry> {
        let mut taken = Vec::new();
        if self
            .current
            .as_ref()
            .is_some_and(|e| e.request.origin == origin)
        {
            taken.extend(self.current.take());
        }
        let (matched, kept): (VecDeque<Entry>, VecDeque<Entry>) = std::mem::take(&mut self.waiting)
            .into_iter()
            .partition(|e| e.request.origin == origin);
        self.waiting = kept;
        taken.extend(matched);
        taken
    }

    /// Move the next waiter into a free slot.
    fn promote(&mut self) -> Option<PendingRequest> {
        if self.current.is_some() {
            return None;
        }
        self.current = self.waiting.pop_front();
        self.current.as_ref().map(|e| e.request.clone())
    }
}

pub struct Gatekeeper<V> {
    vault: Arc<V>,
    sites: SiteRegistry,
    clock: Arc<dyn Clock>,
    options: GatekeeperOptions,
    queue: Mutex<Queue>,
    next_id: AtomicU64,
    events: broadcast::Sender<Notification>,
}

impl<V: VaultHandle> Gatekeeper<V> {
    pub fn new(
        vault: Arc<V>,
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        options: GatekeeperOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            vault,
            sites: SiteRegistry::new(store),
            clock,
            options,
            queue: Mutex::new(Queue::default()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    /// The request currently shown to the user.
    pub async fn pending(&self) -> Option<PendingRequest> {
        self.queue
            .lock()
            .await
            .current
            .as_ref()
            .map(|e| e.request.clone())
    }

    pub async fn waiting(&self) -> usize {
        self.queue.lock().await.waiting.len()
    }

    /// Handle one dApp call and wait for its outcome.
    pub async fn request(&self, origin: &str, method: Method) -> VaultResult<Response> {
        let connected = self.sites.get(origin).await?;
        if connected.is_none() && !matches!(method, Method::Connect { .. }) {
            warn!(origin, method = method.name(), "request from unconnected origin");
            return Err(VaultError::Unauthorized(origin.to_string()));
        }

        let unlocked = self.vault.is_unlocked().await;
        match &method {
            Method::Disconnect => {
                self.disconnect(origin).await?;
                return Ok(Response::Disconnected);
            }
            Method::GetPublicKey => {
                if !unlocked {
                    return Err(VaultError::NotUnlocked);
                }
                return self.vault.active_public_key().await.map(Response::PublicKey);
            }
            Method::Connect { .. } if connected.is_some() && unlocked => {
                debug!(origin, "already connected");
                return self.vault.active_public_key().await.map(Response::PublicKey);
            }
            _ => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = PendingRequest {
            id,
            origin: origin.to_string(),
            requires_reauth: self.requires_reauth(&method).await,
            method,
            created_at_ms: self.clock.now_ms(),
        };
        let (reply, mut rx) = oneshot::channel();

        let shown = self.queue.lock().await.enqueue(Entry { request, reply });
        match shown {
            Some(request) => {
                debug!(request_id = id, origin, "request pending");
                self.notify(Notification::Pending { request });
            }
            None => debug!(request_id = id, origin, "request queued"),
        }

        match tokio::time::timeout(self.options.request_timeout, &mut rx).await {
            Ok(reply) => reply.unwrap_or(Err(VaultError::Cancelled)),
            Err(_) => self.expire(id, rx).await,
        }
    }

    /// Approve the pending request, producing the response through the vault.
    pub async fn approve(&self, id: u64) -> VaultResult<()> {
        let request = self.approvable(id).await?;
        let response = match &request.method {
            Method::Connect { .. } | Method::GetPublicKey => {
                Response::PublicKey(self.vault.active_public_key().await?)
            }
            Method::SignTransaction { tx } => Response::Signature(self.vault.sign_transaction(tx).await?),
            Method::SignAllTransactions { txs } => {
                Response::Signatures(self.vault.sign_all_transactions(txs).await?)
            }
            Method::SignMessage { message } => {
                Response::Signature(self.vault.sign_message(message).await?)
            }
            Method::Disconnect => Response::Disconnected,
        };
        self.finish_approval(&request, response).await
    }

    /// Approve with a response produced elsewhere (a hardware signer).
    pub async fn approve_with(&self, id: u64, response: Response) -> VaultResult<()> {
        let request = self.approvable(id).await?;
        self.finish_approval(&request, response).await
    }

    pub async fn reject(&self, id: u64, reason: &str) -> VaultResult<()> {
        info!(request_id = id, reason, "request rejected");
        self.resolve(
            id,
            Err(VaultError::Rejected {
                request_id: id,
                reason: reason.to_string(),
            }),
            Outcome::Rejected(reason.to_string()),
        )
        .await
    }

    /// Check the password for the pending request and clear its reauth flag.
    pub async fn reauthenticate(&self, id: u64, password: &SecretString) -> VaultResult<()> {
        if self.queue.lock().await.current_mut(id).is_none() {
            return Err(VaultError::RequestNotFound(id));
        }
        self.vault.reauthenticate(password).await?;

        let updated = {
            let mut queue = self.queue.lock().await;
            let entry = queue
                .current_mut(id)
                .ok_or(VaultError::RequestNotFound(id))?;
            entry.request.requires_reauth = false;
            entry.request.clone()
        };
        debug!(request_id = id, "reauthenticated");
        self.notify(Notification::Pending { request: updated });
        Ok(())
    }

    /// Remove the origin from the registry and cancel its requests.
    pub async fn disconnect(&self, origin: &str) -> VaultResult<bool> {
        let was_connected = self.sites.disconnect(origin).await?;
        self.cancel_origin(origin).await;
        if was_connected {
            info!(origin, "site disconnected");
            self.notify(Notification::Disconnected {
                origin: origin.to_string(),
            });
        }
        Ok(was_connected)
    }

    /// Cancel every request from `origin` (tab closed or navigated away).
    pub async fn cancel_origin(&self, origin: &str) -> usize {
        let (cancelled, promoted) = {
            let mut queue = self.queue.lock().await;
            let cancelled = queue.take_origin(origin);
            (cancelled, queue.promote())
        };

        let count = cancelled.len();
        for entry in cancelled {
            let _ = entry.reply.send(Err(VaultError::Cancelled));
            self.notify(Notification::Response {
                request_id: entry.request.id,
                origin: entry.request.origin,
                outcome: Outcome::Cancelled,
            });
        }
        if let Some(request) = promoted {
            self.notify(Notification::Pending { request });
        }
        if count > 0 {
            debug!(origin, count, "requests cancelled");
        }
        count
    }

    async fn requires_reauth(&self, method: &Method) -> bool {
        let unlocked = self.vault.is_unlocked().await;
        if !method.is_signing() {
            return matches!(method, Method::Connect { .. }) && !unlocked;
        }
        if !unlocked {
            return true;
        }
        let Some(window) = self.options.reauth_window else {
            return true;
        };
        match self.vault.last_auth_ms().await {
            Some(at) => self.clock.now_ms().saturating_sub(at) > window.as_millis() as u64,
            None => true,
        }
    }

    /// Clone of the slot's request if it is `id` and needs no password.
    async fn approvable(&self, id: u64) -> VaultResult<PendingRequest> {
        let mut queue = self.queue.lock().await;
        let entry = queue
            .current_mut(id)
            .ok_or(VaultError::RequestNotFound(id))?;
        if entry.request.requires_reauth {
            return Err(VaultError::ReauthRequired(id));
        }
        Ok(entry.request.clone())
    }

    async fn finish_approval(&self, request: &PendingRequest, response: Response) -> VaultResult<()> {
        if let (Method::Connect { favicon }, Response::PublicKey(public_key)) =
            (&request.method, &response)
        {
            let site = ConnectedSite {
                connected_at: self.clock.now_ms(),
                public_key: public_key.clone(),
                favicon: favicon.clone(),
            };
            self.sites.connect(&request.origin, site).await?;
            info!(origin = %request.origin, "site connected");
        }
        self.resolve(request.id, Ok(response), Outcome::Approved).await
    }

    async fn resolve(
        &self,
        id: u64,
        result: VaultResult<Response>,
        outcome: Outcome,
    ) -> VaultResult<()> {
        let (entry, promoted) = {
            let mut queue = self.queue.lock().await;
            let entry = queue.take(id).ok_or(VaultError::RequestNotFound(id))?;
            (entry, queue.promote())
        };

        if entry.reply.send(result).is_err() {
            debug!(request_id = id, "requester gone before response");
        }
        self.notify(Notification::Response {
            request_id: id,
            origin: entry.request.origin,
            outcome,
        });
        if let Some(request) = promoted {
            self.notify(Notification::Pending { request });
        }
        Ok(())
    }

    async fn expire(
        &self,
        id: u64,
        rx: oneshot::Receiver<VaultResult<Response>>,
    ) -> VaultResult<Response> {
        let (entry, promoted) = {
            let mut queue = self.queue.lock().await;
            let entry = queue.take(id);
            let promoted = entry.as_ref().and_then(|_| queue.promote());
            (entry, promoted)
        };

        let Some(entry) = entry else {
            // resolved while the timer fired
            return rx.await.unwrap_or(Err(VaultError::Cancelled));
        };
        warn!(request_id = id, origin = %entry.request.origin, "request expired");
        self.notify(Notification::Response {
            request_id: id,
            origin: entry.request.origin,
            outcome: Outcome::Expired,
        });
        if let Some(request) = promoted {
            self.notify(Notification::Pending { request });
        }
        Err(VaultError::RequestExpired(id))
    }

    fn notify(&self, notification: Notification) {
        // no subscribers is fine
        let _ = self.events.send(notification);
    }
}
