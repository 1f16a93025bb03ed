//! Applies decoded push events to the caches and the ledger.
//!
//! Events are applied in arrival order per channel; every application is
//! idempotent, so duplicate delivery is harmless. Partition targeting:
//! creations go to the first page of partitions the payload provably
//! belongs to, updates and deletions hit every cached page of the
//! resource.

use std::collections::HashSet;
use stockroom_api_types::{FinanceEvent, InventoryEvent, RequestsEvent};
use stockroom_core::{Bill, EquipmentItem, Handout, IssueRequest, RecordId, Timestamp};
use stockroom_store::TieredPageCache;

use crate::ledger::{LedgerEvent, RequestLedger};

/// Apply one requests-channel event.
pub fn apply_requests_event(
    cache: &mut TieredPageCache<IssueRequest>,
    ledger: &mut RequestLedger,
    unread: &mut HashSet<RecordId>,
    event: RequestsEvent,
    now: Timestamp,
) {
    match event {
        RequestsEvent::Created(request) => {
            let matched = ledger.find_matching_placeholder(
                request.requester.id,
                request.item.id,
                now,
            );
            if let Some(placeholder_id) = matched {
                ledger.apply(LedgerEvent::PlaceholderResolved {
                    placeholder_id,
                    confirmed: request.clone(),
                });
                cache.apply_matching(
                    |_| true,
                    |_key, page| {
                        page.remove_by_id(placeholder_id);
                    },
                );
            } else {
                ledger.apply(LedgerEvent::RemoteUpsert {
                    request: request.clone(),
                });
            }
            insert_into_request_pages(cache, &request);
        }
        RequestsEvent::Updated(request) => {
            ledger.apply(LedgerEvent::RemoteUpsert {
                request: request.clone(),
            });
            reconcile_request_pages(cache, &request);
        }
        RequestsEvent::Deleted { id } => {
            ledger.apply(LedgerEvent::Removed { id });
            cache.apply_matching(
                |_| true,
                |_key, page| {
                    page.remove_by_id(id);
                },
            );
        }
        RequestsEvent::BulkRejected { ids, remarks } => {
            ledger.apply(LedgerEvent::BulkRejected {
                ids: ids.clone(),
                remark: remarks,
            });
            for id in ids {
                if let Some(updated) = ledger.get(id).cloned() {
                    reconcile_request_pages(cache, &updated);
                }
            }
        }
        RequestsEvent::Message(note) => {
            unread.insert(note.requester_id);
        }
    }
}

/// A freshly created request belongs to first pages of partitions whose
/// status filter (if any) it satisfies; nothing else may assume it.
pub fn insert_into_request_pages(
    cache: &mut TieredPageCache<IssueRequest>,
    request: &IssueRequest,
) {
    let cap = cache.config().page_cap;
    let status = request.status.to_string();
    cache.apply_matching(
        |key| {
            key.is_first_page()
                && key
                    .param("status")
                    .map(|filter| filter == status)
                    .unwrap_or(true)
        },
        |_key, page| page.upsert_front(request.clone(), cap),
    );
}

/// Replace the record on pages whose filter it still satisfies; drop it
/// from pages it has transitioned out of.
pub fn reconcile_request_pages(
    cache: &mut TieredPageCache<IssueRequest>,
    request: &IssueRequest,
) {
    let status = request.status.to_string();
    cache.apply_matching(
        |_| true,
        |key, page| match key.param("status") {
            Some(filter) if filter != status => {
                page.remove_by_id(request.id);
            }
            _ => {
                page.replace_by_id(request);
            }
        },
    );
}

/// Apply one inventory-channel event to the cache and the mirrored
/// collection the create path validates against.
pub fn apply_inventory_event(
    cache: &mut TieredPageCache<EquipmentItem>,
    items: &mut Vec<EquipmentItem>,
    event: InventoryEvent,
) {
    match event {
        InventoryEvent::Created(item) => {
            upsert_item_mirror(items, item.clone());
            let cap = cache.config().page_cap;
            cache.apply_matching(
                |key| key.is_first_page(),
                |_key, page| page.upsert_front(item.clone(), cap),
            );
        }
        InventoryEvent::Updated(item) => {
            upsert_item_mirror(items, item.clone());
            cache.apply_matching(
                |_| true,
                |_key, page| {
                    page.replace_by_id(&item);
                },
            );
        }
        InventoryEvent::Deleted { id } => {
            items.retain(|item| item.id != id);
            cache.apply_matching(
                |_| true,
                |_key, page| {
                    page.remove_by_id(id);
                },
            );
        }
    }
}

fn upsert_item_mirror(items: &mut Vec<EquipmentItem>, item: EquipmentItem) {
    match items.iter_mut().find(|existing| existing.id == item.id) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// Apply one finance-channel event.
///
/// A created bill belongs only to first-page keys of its fiscal year;
/// likewise a handout and its lab. Creations never leak into other
/// partitions.
pub fn apply_finance_event(
    bills: &mut TieredPageCache<Bill>,
    handouts: &mut TieredPageCache<Handout>,
    event: FinanceEvent,
) {
    match event {
        FinanceEvent::BillCreated(bill) => {
            let cap = bills.config().page_cap;
            bills.apply_matching(
                |key| {
                    key.is_first_page()
                        && key.param("financial_year") == Some(bill.financial_year.as_str())
                },
                |_key, page| page.upsert_front(bill.clone(), cap),
            );
        }
        FinanceEvent::BillUpdated(bill) => {
            bills.apply_matching(
                |_| true,
                |_key, page| {
                    page.replace_by_id(&bill);
                },
            );
        }
        FinanceEvent::BillDeleted { id } => {
            bills.apply_matching(
                |_| true,
                |_key, page| {
                    page.remove_by_id(id);
                },
            );
        }
        FinanceEvent::HandoutCreated(handout) => {
            let cap = handouts.config().page_cap;
            handouts.apply_matching(
                |key| key.is_first_page() && key.param("lab") == Some(handout.lab.as_str()),
                |_key, page| page.upsert_front(handout.clone(), cap),
            );
        }
        FinanceEvent::HandoutUpdated(handout) => {
            handouts.apply_matching(
                |_| true,
                |_key, page| {
                    page.replace_by_id(&handout);
                },
            );
        }
        FinanceEvent::HandoutDeleted { id } => {
            handouts.apply_matching(
                |_| true,
                |_key, page| {
                    page.remove_by_id(id);
                },
            );
        }
    }
}
