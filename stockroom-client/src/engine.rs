//! The synchronization engine.
//!
//! One instance owns every mutable structure: the four page caches, the
//! request ledger, the mirrored inventory, the unread set, and the
//! notices. All of it is mutated from one logical thread; background
//! fetches and fire-and-forget submits are spawned tasks that report
//! back through the engine's message channel and never touch state
//! themselves.
//!
//! Truth flows network -> cache/ledger -> projector; intent flows
//! user action -> optimistic mutation -> network call -> reconciliation
//! by response or push event, whichever lands first.

use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use stockroom_api_types::{
    ApproveBody, BulkApproveBody, BulkRejectBody, ChannelKind, CreateIssueRequestBody,
    FinanceEvent, InventoryEvent, PageEnvelope, RawChannelMessage, RejectBody, RequestsEvent,
    SubmitBody,
};
use stockroom_core::{
    validate_issue_quantity, validate_remark, Bill, EquipmentItem, Handout, IssueRequest, ItemRef,
    RecordId, RequestStatus, RequesterRef, StatusTab, SubmissionStatus, Timestamp, ValidationError,
};
use stockroom_store::{CacheConfig, CachedPage, JsonFileStore, PartitionKey, TieredPageCache};

use crate::config::ClientConfig;
use crate::coordinator::RevalidationCoordinator;
use crate::error::{EngineError, EngineResult};
use crate::events::EngineMessage;
use crate::gateway::{ApiGateway, RestGateway};
use crate::ledger::{resolve_selection, LedgerEvent, RequestLedger};
use crate::normalizer;
use crate::notifications::{Notice, NoticeLevel};
use crate::projector::{self, RequesterGroup};

/// Options for an approval.
///
/// `return_date` takes precedence over `return_days` when both are
/// supplied; callers should supply exactly one.
#[derive(Debug, Clone, Default)]
pub struct ApproveOptions {
    pub return_days: Option<u32>,
    pub return_date: Option<Timestamp>,
    pub remark: Option<String>,
    pub mark_submitted: bool,
}

impl ApproveOptions {
    pub fn days(days: u32) -> Self {
        Self {
            return_days: Some(days),
            ..Self::default()
        }
    }

    pub fn date(date: Timestamp) -> Self {
        Self {
            return_date: Some(date),
            ..Self::default()
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn mark_submitted(mut self) -> Self {
        self.mark_submitted = true;
        self
    }

    fn return_by(&self, now: Timestamp) -> Option<Timestamp> {
        self.return_date
            .or_else(|| self.return_days.map(|days| now + Duration::days(days as i64)))
    }

    fn body(&self) -> ApproveBody {
        ApproveBody {
            return_days: self.return_days,
            return_by: self.return_date,
            remarks: self.remark.clone(),
        }
    }
}

fn submission_remark(now: Timestamp) -> String {
    format!("Submitted on {}", now.format("%Y-%m-%d %H:%M"))
}

fn page_from<T>(envelope: PageEnvelope<T>) -> CachedPage<T> {
    CachedPage::new(
        envelope.items,
        envelope.page,
        envelope.total_pages,
        envelope.total,
    )
}

pub struct SyncEngine {
    gateway: Arc<dyn ApiGateway>,
    tx: mpsc::Sender<EngineMessage>,
    requests_cache: TieredPageCache<IssueRequest>,
    items_cache: TieredPageCache<EquipmentItem>,
    bills_cache: TieredPageCache<Bill>,
    handouts_cache: TieredPageCache<Handout>,
    ledger: RequestLedger,
    items: Vec<EquipmentItem>,
    unread: HashSet<RecordId>,
    notices: Vec<Notice>,
    coordinator: RevalidationCoordinator,
    current_user: RequesterRef,
    notify_email: bool,
    next_placeholder_id: RecordId,
    channels_up: HashSet<ChannelKind>,
}

impl SyncEngine {
    /// Engine with memory-only caches.
    pub fn new(
        gateway: Arc<dyn ApiGateway>,
        current_user: RequesterRef,
        cache_config: CacheConfig,
    ) -> (Self, mpsc::Receiver<EngineMessage>) {
        let (tx, rx) = mpsc::channel(256);
        let engine = Self {
            gateway,
            tx,
            requests_cache: TieredPageCache::new(cache_config.clone()),
            items_cache: TieredPageCache::new(cache_config.clone()),
            bills_cache: TieredPageCache::new(cache_config.clone()),
            handouts_cache: TieredPageCache::new(cache_config),
            ledger: RequestLedger::new(),
            items: Vec::new(),
            unread: HashSet::new(),
            notices: Vec::new(),
            coordinator: RevalidationCoordinator::new(),
            current_user,
            notify_email: true,
            next_placeholder_id: -1,
            channels_up: HashSet::new(),
        };
        (engine, rx)
    }

    /// Engine with durable tiers under `dir`, one subdirectory per
    /// resource.
    pub fn with_durable_dir(
        gateway: Arc<dyn ApiGateway>,
        current_user: RequesterRef,
        cache_config: CacheConfig,
        dir: &Path,
    ) -> (Self, mpsc::Receiver<EngineMessage>) {
        let (mut engine, rx) = Self::new(gateway, current_user, cache_config.clone());
        engine.requests_cache = TieredPageCache::with_durable(
            cache_config.clone(),
            Box::new(JsonFileStore::new(dir.join("issue-requests"))),
        );
        engine.items_cache = TieredPageCache::with_durable(
            cache_config.clone(),
            Box::new(JsonFileStore::new(dir.join("items"))),
        );
        engine.bills_cache = TieredPageCache::with_durable(
            cache_config.clone(),
            Box::new(JsonFileStore::new(dir.join("bills"))),
        );
        engine.handouts_cache = TieredPageCache::with_durable(
            cache_config,
            Box::new(JsonFileStore::new(dir.join("handouts"))),
        );
        (engine, rx)
    }

    /// Engine wired from configuration, with a REST gateway.
    pub fn from_config(
        config: &ClientConfig,
        current_user: RequesterRef,
    ) -> EngineResult<(Self, mpsc::Receiver<EngineMessage>)> {
        let gateway = Arc::new(RestGateway::new(config)?);
        let cache_config = config.cache.to_cache_config();
        let (mut engine, rx) = match &config.durable_dir {
            Some(dir) => Self::with_durable_dir(gateway, current_user, cache_config, dir),
            None => Self::new(gateway, current_user, cache_config),
        };
        engine.notify_email = config.notify_email;
        Ok((engine, rx))
    }

    /// Sender half of the engine's message channel, for channel
    /// managers and hosts.
    pub fn sender(&self) -> mpsc::Sender<EngineMessage> {
        self.tx.clone()
    }

    pub fn current_user(&self) -> &RequesterRef {
        &self.current_user
    }

    // ========================================================================
    // READ PATHS (stale-while-revalidate)
    // ========================================================================

    /// One page of issue requests. A cached page (fresh or stale) is
    /// returned immediately, with a background revalidation when stale;
    /// only a cold key blocks on the network, and only then can a read
    /// failure surface.
    pub async fn requests_page(
        &mut self,
        key: &PartitionKey,
    ) -> EngineResult<CachedPage<IssueRequest>> {
        if let Some(hit) = self.requests_cache.get(key, Utc::now()) {
            if !hit.is_fresh() {
                self.revalidate_requests(key);
            }
            return Ok(hit.into_page());
        }
        let gateway = Arc::clone(&self.gateway);
        let envelope = gateway.fetch_requests(key).await?;
        let page = page_from(envelope);
        self.requests_cache.set(key, page.clone(), Utc::now());
        self.absorb_requests_page(&page);
        Ok(page)
    }

    /// One page of equipment items; also refreshes the mirrored
    /// inventory the create path validates against.
    pub async fn items_page(
        &mut self,
        key: &PartitionKey,
    ) -> EngineResult<CachedPage<EquipmentItem>> {
        if let Some(hit) = self.items_cache.get(key, Utc::now()) {
            if !hit.is_fresh() {
                self.revalidate_items(key);
            }
            return Ok(hit.into_page());
        }
        let gateway = Arc::clone(&self.gateway);
        let envelope = gateway.fetch_items(key).await?;
        let page = page_from(envelope);
        self.items_cache.set(key, page.clone(), Utc::now());
        self.absorb_items_page(&page);
        Ok(page)
    }

    /// One page of bills.
    pub async fn bills_page(&mut self, key: &PartitionKey) -> EngineResult<CachedPage<Bill>> {
        if let Some(hit) = self.bills_cache.get(key, Utc::now()) {
            if !hit.is_fresh() {
                self.revalidate_bills(key);
            }
            return Ok(hit.into_page());
        }
        let gateway = Arc::clone(&self.gateway);
        let envelope = gateway.fetch_bills(key).await?;
        let page = page_from(envelope);
        self.bills_cache.set(key, page.clone(), Utc::now());
        Ok(page)
    }

    /// One page of handouts.
    pub async fn handouts_page(
        &mut self,
        key: &PartitionKey,
    ) -> EngineResult<CachedPage<Handout>> {
        if let Some(hit) = self.handouts_cache.get(key, Utc::now()) {
            if !hit.is_fresh() {
                self.revalidate_handouts(key);
            }
            return Ok(hit.into_page());
        }
        let gateway = Arc::clone(&self.gateway);
        let envelope = gateway.fetch_handouts(key).await?;
        let page = page_from(envelope);
        self.handouts_cache.set(key, page.clone(), Utc::now());
        Ok(page)
    }

    // ========================================================================
    // REVALIDATION (fire-and-forget, de-duplicated per key)
    // ========================================================================

    pub fn revalidate_requests(&mut self, key: &PartitionKey) {
        if !self.coordinator.begin(key) {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_requests(&key).await;
            let _ = tx
                .send(EngineMessage::RequestsPageFetched { key, result })
                .await;
        });
    }

    pub fn revalidate_items(&mut self, key: &PartitionKey) {
        if !self.coordinator.begin(key) {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_items(&key).await;
            let _ = tx
                .send(EngineMessage::ItemsPageFetched { key, result })
                .await;
        });
    }

    pub fn revalidate_bills(&mut self, key: &PartitionKey) {
        if !self.coordinator.begin(key) {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_bills(&key).await;
            let _ = tx
                .send(EngineMessage::BillsPageFetched { key, result })
                .await;
        });
    }

    pub fn revalidate_handouts(&mut self, key: &PartitionKey) {
        if !self.coordinator.begin(key) {
            return;
        }
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let result = gateway.fetch_handouts(&key).await;
            let _ = tx
                .send(EngineMessage::HandoutsPageFetched { key, result })
                .await;
        });
    }

    // ========================================================================
    // MESSAGE LOOP
    // ========================================================================

    /// Apply one message. Hosts drive this from their receive loop.
    pub fn handle_message(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Channel { channel, frame } => {
                self.apply_channel_frame(channel, frame);
            }
            EngineMessage::ChannelUp { channel } => {
                tracing::info!(?channel, "channel connected");
                self.channels_up.insert(channel);
            }
            EngineMessage::ChannelDown { channel, reason } => {
                tracing::info!(?channel, reason, "channel disconnected");
                self.channels_up.remove(&channel);
            }
            EngineMessage::RequestsPageFetched { key, result } => {
                self.coordinator.finish(&key);
                match result {
                    Ok(envelope) => {
                        let page = page_from(envelope);
                        self.requests_cache.set(&key, page.clone(), Utc::now());
                        self.absorb_requests_page(&page);
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "revalidation failed, keeping stale page");
                    }
                }
            }
            EngineMessage::ItemsPageFetched { key, result } => {
                self.coordinator.finish(&key);
                match result {
                    Ok(envelope) => {
                        let page = page_from(envelope);
                        self.items_cache.set(&key, page.clone(), Utc::now());
                        self.absorb_items_page(&page);
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "revalidation failed, keeping stale page");
                    }
                }
            }
            EngineMessage::BillsPageFetched { key, result } => {
                self.coordinator.finish(&key);
                match result {
                    Ok(envelope) => {
                        self.bills_cache.set(&key, page_from(envelope), Utc::now());
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "revalidation failed, keeping stale page");
                    }
                }
            }
            EngineMessage::HandoutsPageFetched { key, result } => {
                self.coordinator.finish(&key);
                match result {
                    Ok(envelope) => {
                        self.handouts_cache
                            .set(&key, page_from(envelope), Utc::now());
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "revalidation failed, keeping stale page");
                    }
                }
            }
            EngineMessage::SubmitFinished { id, result } => {
                if let Err(err) = result {
                    // Expected for consumables the server auto-submits.
                    tracing::warn!(id, error = %err, "submit call reported failure");
                    self.notify(
                        NoticeLevel::Warning,
                        format!("Submit for request {} reported: {}", id, err),
                    );
                }
            }
        }
    }

    /// Drain everything currently queued without blocking. Returns the
    /// number of messages handled.
    pub fn drain_messages(&mut self, rx: &mut mpsc::Receiver<EngineMessage>) -> usize {
        let mut handled = 0;
        while let Ok(message) = rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    fn apply_channel_frame(&mut self, channel: ChannelKind, frame: RawChannelMessage) {
        match channel {
            ChannelKind::Requests => match RequestsEvent::decode(&frame) {
                Ok(event) => normalizer::apply_requests_event(
                    &mut self.requests_cache,
                    &mut self.ledger,
                    &mut self.unread,
                    event,
                    Utc::now(),
                ),
                Err(err) => {
                    tracing::warn!(event = %frame.event, error = %err, "dropping requests event");
                }
            },
            ChannelKind::Inventory => match InventoryEvent::decode(&frame) {
                Ok(event) => normalizer::apply_inventory_event(
                    &mut self.items_cache,
                    &mut self.items,
                    event,
                ),
                Err(err) => {
                    tracing::warn!(event = %frame.event, error = %err, "dropping inventory event");
                }
            },
            ChannelKind::Finance => match FinanceEvent::decode(&frame) {
                Ok(event) => normalizer::apply_finance_event(
                    &mut self.bills_cache,
                    &mut self.handouts_cache,
                    event,
                ),
                Err(err) => {
                    tracing::warn!(event = %frame.event, error = %err, "dropping finance event");
                }
            },
        }
    }

    // ========================================================================
    // LIFECYCLE OPERATIONS
    // ========================================================================

    /// Create an issue request for the current user.
    ///
    /// Validation failures surface synchronously and nothing is
    /// touched. Otherwise a placeholder goes in, the mirrored
    /// availability drops, and the create call runs; failure rolls both
    /// back (rollback here is unambiguous, unlike approve/submit).
    pub async fn create_request(
        &mut self,
        item_id: RecordId,
        quantity: u32,
    ) -> EngineResult<RecordId> {
        let item = self
            .items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or(ValidationError::UnknownItem { id: item_id })?
            .clone();
        validate_issue_quantity(&item, quantity)?;

        let placeholder_id = self.next_placeholder_id;
        self.next_placeholder_id -= 1;
        let now = Utc::now();
        let placeholder = IssueRequest {
            id: placeholder_id,
            item: ItemRef {
                id: item.id,
                name: item.name.clone(),
                consumable: item.consumable,
            },
            requester: self.current_user.clone(),
            quantity,
            status: RequestStatus::Pending,
            submission_status: SubmissionStatus::NotRequired,
            created_at: now,
            approved_at: None,
            return_by: None,
            submitted_at: None,
            remarks: None,
        };
        self.ledger.apply(LedgerEvent::PlaceholderInserted {
            request: placeholder.clone(),
        });
        self.adjust_available(item_id, -(quantity as i64));
        normalizer::insert_into_request_pages(&mut self.requests_cache, &placeholder);

        let gateway = Arc::clone(&self.gateway);
        let body = CreateIssueRequestBody { item_id, quantity };
        match gateway.create_request(&body).await {
            Ok(confirmed) => {
                let id = confirmed.id;
                self.resolve_placeholder(placeholder_id, confirmed);
                Ok(id)
            }
            Err(err) => {
                self.ledger
                    .apply(LedgerEvent::PlaceholderAbandoned { placeholder_id });
                self.requests_cache.apply_matching(
                    |_| true,
                    |_key, page| {
                        page.remove_by_id(placeholder_id);
                    },
                );
                self.adjust_available(item_id, quantity as i64);
                self.notify(
                    NoticeLevel::Error,
                    format!("Request for {} failed: {}", item.name, err),
                );
                Err(err.into())
            }
        }
    }

    /// Approve a pending request, optionally marking it submitted in
    /// the same gesture.
    ///
    /// The optimistic transition stands even when a call fails: a
    /// rollback could contradict a concurrent push event, so the next
    /// reconciling event wins instead. The submit call is independent
    /// and its failures are benign (consumables auto-submit
    /// server-side).
    pub async fn approve_request(
        &mut self,
        id: RecordId,
        opts: ApproveOptions,
    ) -> EngineResult<()> {
        let request = self
            .ledger
            .get(id)
            .ok_or(ValidationError::UnknownRequest { id })?;
        if request.status != RequestStatus::Pending {
            return Err(ValidationError::InvalidTransition {
                id,
                status: request.status.to_string(),
                action: "approved",
            }
            .into());
        }

        let now = Utc::now();
        self.ledger.apply(LedgerEvent::Approved {
            id,
            approved_at: now,
            return_by: opts.return_by(now),
            remark: opts.remark.clone(),
        });
        if opts.mark_submitted {
            self.ledger.apply(LedgerEvent::Submitted {
                id,
                at: now,
                remark: submission_remark(now),
            });
        }
        if let Some(updated) = self.ledger.get(id).cloned() {
            normalizer::reconcile_request_pages(&mut self.requests_cache, &updated);
        }

        let gateway = Arc::clone(&self.gateway);
        let approve_result = gateway.approve_request(id, &opts.body()).await;
        match &approve_result {
            Ok(updated) => {
                self.ledger.apply(LedgerEvent::RemoteUpsert {
                    request: updated.clone(),
                });
                if let Some(current) = self.ledger.get(id).cloned() {
                    normalizer::reconcile_request_pages(&mut self.requests_cache, &current);
                }
            }
            Err(err) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Approve for request {} failed: {}", id, err),
                );
            }
        }

        if opts.mark_submitted {
            if let Err(err) = gateway
                .submit_request(
                    id,
                    &SubmitBody {
                        notify_email: self.notify_email,
                    },
                )
                .await
            {
                tracing::warn!(id, error = %err, "submit call after approve reported failure");
                self.notify(
                    NoticeLevel::Warning,
                    format!("Submit for request {} reported: {}", id, err),
                );
            }
        }

        approve_result.map(|_| ()).map_err(EngineError::from)
    }

    /// Reject a pending request. The remark is mandatory and checked
    /// before any network traffic.
    pub async fn reject_request(&mut self, id: RecordId, remark: &str) -> EngineResult<()> {
        let trimmed = validate_remark(remark, "reject")?.to_string();
        let request = self
            .ledger
            .get(id)
            .ok_or(ValidationError::UnknownRequest { id })?;
        if request.status != RequestStatus::Pending {
            return Err(ValidationError::InvalidTransition {
                id,
                status: request.status.to_string(),
                action: "rejected",
            }
            .into());
        }

        self.ledger.apply(LedgerEvent::Rejected {
            id,
            remark: trimmed.clone(),
        });
        if let Some(updated) = self.ledger.get(id).cloned() {
            normalizer::reconcile_request_pages(&mut self.requests_cache, &updated);
        }

        let gateway = Arc::clone(&self.gateway);
        match gateway
            .reject_request(id, &RejectBody { remarks: trimmed })
            .await
        {
            Ok(updated) => {
                self.ledger
                    .apply(LedgerEvent::RemoteUpsert { request: updated });
                Ok(())
            }
            Err(err) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Reject for request {} failed: {}", id, err),
                );
                Err(err.into())
            }
        }
    }

    /// Approve a set of requests in one call. An empty selection means
    /// every eligible (pending, confirmed) request in the current view.
    /// All ids transition locally before the network call goes out.
    pub async fn bulk_approve(
        &mut self,
        selection: &[RecordId],
        opts: ApproveOptions,
    ) -> EngineResult<Vec<RecordId>> {
        let eligible: Vec<RecordId> = self
            .ledger
            .requests()
            .iter()
            .filter(|request| {
                request.status == RequestStatus::Pending && !request.is_placeholder()
            })
            .map(|request| request.id)
            .collect();
        let ids = resolve_selection(selection, &eligible);
        if ids.is_empty() {
            return Ok(ids);
        }

        let now = Utc::now();
        let return_by = opts.return_by(now);
        for &id in &ids {
            self.ledger.apply(LedgerEvent::Approved {
                id,
                approved_at: now,
                return_by,
                remark: opts.remark.clone(),
            });
            if opts.mark_submitted {
                self.ledger.apply(LedgerEvent::Submitted {
                    id,
                    at: now,
                    remark: submission_remark(now),
                });
            }
            if let Some(updated) = self.ledger.get(id).cloned() {
                normalizer::reconcile_request_pages(&mut self.requests_cache, &updated);
            }
        }

        let gateway = Arc::clone(&self.gateway);
        let body = BulkApproveBody {
            ids: ids.clone(),
            return_days: opts.return_days,
            return_by: opts.return_date,
            remarks: opts.remark.clone(),
        };
        if let Err(err) = gateway.bulk_approve(&body).await {
            self.notify(
                NoticeLevel::Error,
                format!("Bulk approve of {} requests failed: {}", ids.len(), err),
            );
            return Err(err.into());
        }
        Ok(ids)
    }

    /// Reject a set of requests in one call; same selection semantics
    /// as [`Self::bulk_approve`], same mandatory remark as
    /// [`Self::reject_request`].
    pub async fn bulk_reject(
        &mut self,
        selection: &[RecordId],
        remark: &str,
    ) -> EngineResult<Vec<RecordId>> {
        let trimmed = validate_remark(remark, "bulk reject")?.to_string();
        let eligible: Vec<RecordId> = self
            .ledger
            .requests()
            .iter()
            .filter(|request| {
                request.status == RequestStatus::Pending && !request.is_placeholder()
            })
            .map(|request| request.id)
            .collect();
        let ids = resolve_selection(selection, &eligible);
        if ids.is_empty() {
            return Ok(ids);
        }

        self.ledger.apply(LedgerEvent::BulkRejected {
            ids: ids.clone(),
            remark: Some(trimmed.clone()),
        });
        for &id in &ids {
            if let Some(updated) = self.ledger.get(id).cloned() {
                normalizer::reconcile_request_pages(&mut self.requests_cache, &updated);
            }
        }

        let gateway = Arc::clone(&self.gateway);
        let body = BulkRejectBody {
            ids: ids.clone(),
            remarks: trimmed,
        };
        if let Err(err) = gateway.bulk_reject(&body).await {
            self.notify(
                NoticeLevel::Error,
                format!("Bulk reject of {} requests failed: {}", ids.len(), err),
            );
            return Err(err.into());
        }
        Ok(ids)
    }

    /// Mark approved requests as submitted, with a generated timestamp
    /// remark. The network call per id is fire-and-forget; outcomes
    /// come back as [`EngineMessage::SubmitFinished`].
    pub fn mark_submitted(&mut self, selection: &[RecordId]) -> Vec<RecordId> {
        let eligible: Vec<RecordId> = self
            .ledger
            .requests()
            .iter()
            .filter(|request| {
                request.status == RequestStatus::Approved
                    && request.submission_status != SubmissionStatus::Submitted
                    && !request.is_placeholder()
            })
            .map(|request| request.id)
            .collect();
        let ids = resolve_selection(selection, &eligible);

        let now = Utc::now();
        for &id in &ids {
            self.ledger.apply(LedgerEvent::Submitted {
                id,
                at: now,
                remark: submission_remark(now),
            });
            if let Some(updated) = self.ledger.get(id).cloned() {
                normalizer::reconcile_request_pages(&mut self.requests_cache, &updated);
            }

            let gateway = Arc::clone(&self.gateway);
            let tx = self.tx.clone();
            let notify_email = self.notify_email;
            tokio::spawn(async move {
                let result = gateway
                    .submit_request(id, &SubmitBody { notify_email })
                    .await;
                let _ = tx.send(EngineMessage::SubmitFinished { id, result }).await;
            });
        }
        ids
    }

    // ========================================================================
    // VIEWS AND ACCESSORS
    // ========================================================================

    /// The authoritative request collection.
    pub fn requests(&self) -> &[IssueRequest] {
        self.ledger.requests()
    }

    /// The mirrored equipment inventory.
    pub fn items(&self) -> &[EquipmentItem] {
        &self.items
    }

    /// Requests for one tab, recomputed from the collection.
    pub fn tab(&self, tab: StatusTab) -> Vec<&IssueRequest> {
        projector::filter_tab(self.ledger.requests(), tab)
    }

    /// Requester groups for the admin overview, newest activity first.
    pub fn requester_groups(&self) -> Vec<RequesterGroup> {
        projector::group_by_requester(self.ledger.requests(), &self.unread)
    }

    pub fn mark_read(&mut self, requester_id: RecordId) {
        self.unread.remove(&requester_id);
    }

    pub fn unread_requesters(&self) -> &HashSet<RecordId> {
        &self.unread
    }

    pub fn channel_connected(&self, channel: ChannelKind) -> bool {
        self.channels_up.contains(&channel)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice::new(level, message));
    }

    fn absorb_requests_page(&mut self, page: &CachedPage<IssueRequest>) {
        for request in &page.items {
            self.ledger.apply(LedgerEvent::RemoteUpsert {
                request: request.clone(),
            });
        }
    }

    fn absorb_items_page(&mut self, page: &CachedPage<EquipmentItem>) {
        for item in &page.items {
            match self.items.iter_mut().find(|existing| existing.id == item.id) {
                Some(existing) => *existing = item.clone(),
                None => self.items.push(item.clone()),
            }
        }
    }

    fn adjust_available(&mut self, item_id: RecordId, delta: i64) {
        let Some(item) = self.items.iter_mut().find(|item| item.id == item_id) else {
            return;
        };
        item.available = (item.available as i64 + delta).max(0) as u32;
        let updated = item.clone();
        self.items_cache.apply_matching(
            |_| true,
            |_key, page| {
                page.replace_by_id(&updated);
            },
        );
    }

    fn resolve_placeholder(&mut self, placeholder_id: RecordId, confirmed: IssueRequest) {
        // The created event may have resolved it first; every step here
        // tolerates that.
        self.ledger.apply(LedgerEvent::PlaceholderResolved {
            placeholder_id,
            confirmed: confirmed.clone(),
        });
        self.requests_cache.apply_matching(
            |_| true,
            |_key, page| {
                page.remove_by_id(placeholder_id);
            },
        );
        normalizer::insert_into_request_pages(&mut self.requests_cache, &confirmed);
    }
}
