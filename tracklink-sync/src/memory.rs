//! In-process [`Backend`] holding items in memory.
//!
//! Records every write so tests can assert on the exact calls a pass made,
//! and can be told to fail or reject specific calls.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use tracklink_core::{Backend, CounterpartFields, Item, ItemId, RemoteError, Side};

/// A write issued against a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create { id: ItemId, fields: CounterpartFields },
    SetStatus { id: ItemId, status: String },
}

/// Vec-backed backend for one side.
#[derive(Debug)]
pub struct MemoryBackend {
    side: Side,
    id_prefix: String,
    container: String,
    touched_at: DateTime<Utc>,
    items: RefCell<Vec<Item>>,
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    failing: RefCell<HashSet<ItemId>>,
    failing_targets: RefCell<HashSet<(ItemId, String)>>,
    rejecting: RefCell<HashSet<ItemId>>,
    fail_creates: Cell<bool>,
    fail_fetch: Cell<bool>,
}

impl MemoryBackend {
    /// New ids are `<id_prefix>-<n>`; new items land in `container`.
    pub fn new(side: Side, id_prefix: &str, container: &str) -> Self {
        Self {
            side,
            id_prefix: id_prefix.to_string(),
            container: container.to_string(),
            touched_at: Utc::now(),
            items: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            failing: RefCell::new(HashSet::new()),
            failing_targets: RefCell::new(HashSet::new()),
            rejecting: RefCell::new(HashSet::new()),
            fail_creates: Cell::new(false),
            fail_fetch: Cell::new(false),
        }
    }

    /// Timestamp stamped on items this backend creates or updates, standing in
    /// for the remote's own `updated` clock.
    pub fn with_touched_at(mut self, at: DateTime<Utc>) -> Self {
        self.touched_at = at;
        self
    }

    pub fn insert(&self, item: Item) {
        self.items.borrow_mut().push(item);
    }

    pub fn items(&self) -> Vec<Item> {
        self.items.borrow().clone()
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.items.borrow().iter().find(|i| i.id.as_str() == id).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn creates(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .count()
    }

    pub fn status_changes(&self) -> Vec<(ItemId, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::SetStatus { id, status } => Some((id.clone(), status.clone())),
                Call::Create { .. } => None,
            })
            .collect()
    }

    /// Status changes on `id` fail with an HTTP 500.
    pub fn fail_status_changes_for(&self, id: &str) {
        self.failing.borrow_mut().insert(ItemId::from(id));
    }

    /// Only changes moving `id` to `status` fail; other changes go through.
    pub fn fail_status_change_to(&self, id: &str, status: &str) {
        self.failing_targets
            .borrow_mut()
            .insert((ItemId::from(id), status.to_string()));
    }

    /// Status changes on `id` are refused by the workflow.
    pub fn reject_status_changes_for(&self, id: &str) {
        self.rejecting.borrow_mut().insert(ItemId::from(id));
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.set(fail);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.set(fail);
    }

    fn server_error(&self, what: &str) -> RemoteError {
        RemoteError::Http {
            url: format!("memory://{}/{what}", self.side),
            status: 500,
            body: "simulated failure".to_string(),
        }
    }
}

impl Backend for MemoryBackend {
    fn side(&self) -> Side {
        self.side
    }

    fn fetch_all(&self) -> Result<Vec<Item>, RemoteError> {
        if self.fail_fetch.get() {
            return Err(self.server_error("items"));
        }
        Ok(self.items())
    }

    fn get(&self, id: &ItemId) -> Result<Item, RemoteError> {
        self.item(id.as_str()).ok_or_else(|| RemoteError::NotFound {
            kind: "item",
            name: id.to_string(),
        })
    }

    fn create(&self, fields: &CounterpartFields) -> Result<ItemId, RemoteError> {
        if self.fail_creates.get() {
            return Err(self.server_error("create"));
        }
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        let id = ItemId::from(format!("{}-{n}", self.id_prefix));

        self.items.borrow_mut().push(Item {
            side: self.side,
            id: id.clone(),
            title: fields.title.clone(),
            description: Some(fields.description.clone()),
            status: fields.status.clone(),
            priority: fields.priority.clone(),
            due_date: fields.due_date,
            last_updated: self.touched_at,
            container_name: self.container.clone(),
        });
        self.calls.borrow_mut().push(Call::Create {
            id: id.clone(),
            fields: fields.clone(),
        });
        Ok(id)
    }

    fn set_status(&self, id: &ItemId, status: &str) -> Result<(), RemoteError> {
        let targeted = self
            .failing_targets
            .borrow()
            .contains(&(id.clone(), status.to_string()));
        if targeted || self.failing.borrow().contains(id) {
            return Err(self.server_error(id.as_str()));
        }
        if self.rejecting.borrow().contains(id) {
            return Err(RemoteError::TransitionRejected {
                id: id.clone(),
                status: status.to_string(),
                reason: "workflow does not allow this transition".to_string(),
            });
        }

        let mut items = self.items.borrow_mut();
        let item = items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| RemoteError::NotFound {
                kind: "item",
                name: id.to_string(),
            })?;
        item.status = status.to_string();
        item.last_updated = self.touched_at;
        self.calls.borrow_mut().push(Call::SetStatus {
            id: id.clone(),
            status: status.to_string(),
        });
        Ok(())
    }
}
