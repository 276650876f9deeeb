//! # Host Platform
//!
//! In-process stand-in for the platform that owns record storage and fires
//! triggers. Every bulk DML call goes through the same cycle:
//!
//! 1. **Validate** each record against the store (and against the mode).
//! 2. **Group** accepted records by object, keeping first-seen order.
//! 3. **Before** event per object: registered handlers may edit the batch.
//! 4. **Persist** the batch (inserts get fresh ids here).
//! 5. **After** event per object with the persisted records.
//!
//! Each call keeps an undo journal of the ids it wrote. Any error replays
//! that journal in reverse, which also undoes nested calls issued from
//! triggers in the same context. Writes committed by other contexts in the
//! meantime are left alone.
//!
//! The store lock is never held while handlers run, handlers re-enter the
//! platform through the [`Mutator`](crate::ports::mutator::Mutator) port.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use dispatchr_common::error::{BulkMutationError, MutationError, PortError};
use dispatchr_common::event::{LifecycleEvent, OperationKind, Phase};
use dispatchr_common::mutation::{BulkOutcome, MutationMode, OutcomeStatus, RecordOutcome};
use dispatchr_common::record::{Record, RecordId, RecordMap};
use tracing::{debug, info, warn};

use crate::context::{ContextId, ExecutionContext};
use crate::handler::TriggerHandler;
use crate::router::LifecycleEventRouter;

pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn TriggerHandler> + Send + Sync>;

#[derive(Debug, Default)]
struct RecordStore {
    live: BTreeMap<RecordId, Record>,
    recycle_bin: BTreeMap<RecordId, Record>,
}

/// Where one id was before a write touched it.
#[derive(Debug)]
struct Undo {
    id: RecordId,
    live: Option<Record>,
    recycled: Option<Record>,
}

/// Open undo frames per context, innermost call last.
type Journals = HashMap<ContextId, Vec<Vec<Undo>>>;

/// A record that passed validation, with what the store knows about it.
struct Accepted {
    index: usize,
    id: Option<RecordId>,
    object: String,
    input: Record,
    stored: Option<Record>,
}

impl RecordStore {
    fn check(
        &self,
        operation: OperationKind,
        record: Record,
        index: usize,
    ) -> Result<Accepted, String> {
        if operation == OperationKind::Insert {
            if record.id.is_some() {
                return Err("id must be empty on insert".into());
            }
            if record.object.is_empty() {
                return Err("object name is required".into());
            }
            return Ok(Accepted {
                index,
                id: None,
                object: record.object.clone(),
                input: record,
                stored: None,
            });
        }

        let Some(id) = record.id.clone() else {
            return Err(format!("id is required to {operation}"));
        };

        let stored = match operation {
            OperationKind::Undelete => {
                if self.live.contains_key(&id) {
                    return Err("record is not deleted".into());
                }
                self.recycle_bin.get(&id)
            }
            _ => {
                if self.recycle_bin.contains_key(&id) {
                    return Err("entity is deleted".into());
                }
                self.live.get(&id)
            }
        };
        let Some(stored) = stored.cloned() else {
            return Err(format!("record {id} not found"));
        };

        if !record.object.is_empty() && record.object != stored.object {
            return Err(format!(
                "record {id} is a {}, not a {}",
                stored.object, record.object
            ));
        }

        Ok(Accepted {
            index,
            id: Some(id),
            object: stored.object.clone(),
            input: record,
            stored: Some(stored),
        })
    }

    fn undo_for(&self, id: &RecordId) -> Undo {
        Undo {
            id: id.clone(),
            live: self.live.get(id).cloned(),
            recycled: self.recycle_bin.get(id).cloned(),
        }
    }

    fn restore(&mut self, undo: Undo) {
        match undo.live {
            Some(record) => self.live.insert(undo.id.clone(), record),
            None => self.live.remove(&undo.id),
        };
        match undo.recycled {
            Some(record) => self.recycle_bin.insert(undo.id, record),
            None => self.recycle_bin.remove(&undo.id),
        };
    }
}

/// One call's undo frame. Dropping it without [`commit`](Self::commit) rolls
/// the call back, so a panicking handler leaves the store as it found it.
struct Transaction<'a> {
    platform: &'a Platform,
    context: ContextId,
    committed: bool,
}

impl<'a> Transaction<'a> {
    fn begin(platform: &'a Platform, context: ContextId) -> Self {
        platform
            .lock_journals()
            .entry(context)
            .or_default()
            .push(Vec::new());
        Self {
            platform,
            context,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.platform.close_frame(self.context, self.committed);
    }
}

#[derive(Clone, Default)]
pub struct Platform {
    store: Arc<Mutex<RecordStore>>,
    journals: Arc<Mutex<Journals>>,
    triggers: Arc<RwLock<HashMap<String, Vec<HandlerFactory>>>>,
    router: LifecycleEventRouter,
}

impl Platform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires a fresh handler from `factory` for every DML call on `object`.
    pub fn register_trigger<H, F>(&self, object: impl Into<String>, factory: F)
    where
        H: TriggerHandler,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let object = object.into();
        debug!(%object, handler = std::any::type_name::<H>(), "trigger registered");

        let factory: HandlerFactory = Arc::new(move || Box::new(factory()));
        self.triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(object)
            .or_default()
            .push(factory);
    }

    /// Stores records without firing triggers or charging usage.
    pub fn seed(&self, records: impl IntoIterator<Item = Record>) -> Vec<RecordId> {
        let mut store = self.lock_store();
        records
            .into_iter()
            .map(|mut record| {
                let id = record.id.clone().unwrap_or_else(RecordId::generate);
                record.id = Some(id.clone());
                store.live.insert(id.clone(), record);
                id
            })
            .collect()
    }

    /// Looks up a live record without charging usage.
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.lock_store().live.get(id).cloned()
    }

    pub fn is_deleted(&self, id: &RecordId) -> bool {
        self.lock_store().recycle_bin.contains_key(id)
    }

    /// Live records of one object, ordered by id.
    pub fn records(&self, object: &str) -> Vec<Record> {
        self.lock_store()
            .live
            .values()
            .filter(|record| record.object == object)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_store().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One query: fetches the live records among `ids`.
    pub fn select(
        &self,
        ctx: &ExecutionContext,
        ids: &BTreeSet<RecordId>,
    ) -> Result<RecordMap, PortError> {
        ctx.usage().charge_query()?;

        let store = self.lock_store();
        Ok(ids
            .iter()
            .filter_map(|id| store.live.get(id).map(|record| (id.clone(), record.clone())))
            .collect())
    }

    /// One DML statement over the whole batch, firing triggers around it.
    pub fn execute(
        &self,
        ctx: &ExecutionContext,
        operation: OperationKind,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        ctx.usage().charge_dml()?;

        let transaction = Transaction::begin(self, ctx.id());
        let result = self.apply(ctx, operation, records, mode);

        match &result {
            Ok(outcome) => {
                transaction.commit();
                info!(
                    %operation,
                    records = outcome.len(),
                    failed = outcome.failed_count(),
                    "bulk mutation applied"
                );
            }
            Err(err) => {
                drop(transaction);
                warn!(%operation, error = %err, "bulk mutation rolled back");
            }
        }
        result
    }

    fn apply(
        &self,
        ctx: &ExecutionContext,
        operation: OperationKind,
        records: Vec<Record>,
        mode: MutationMode,
    ) -> Result<BulkOutcome, MutationError> {
        let ids: Vec<Option<RecordId>> = records.iter().map(|r| r.id.clone()).collect();
        let mut outcomes: Vec<Option<RecordOutcome>> = vec![None; records.len()];
        let mut accepted = Vec::with_capacity(records.len());

        {
            let store = self.lock_store();
            let mut seen = HashSet::new();

            for (index, record) in records.into_iter().enumerate() {
                let checked = match &record.id {
                    Some(id) if !seen.insert(id.clone()) => {
                        Err(format!("duplicate id {id} in batch"))
                    }
                    _ => store.check(operation, record, index),
                };
                match checked {
                    Ok(record) => accepted.push(record),
                    Err(reason) if mode == MutationMode::AllOrNone => {
                        return Err(rejected(operation, &ids, index, reason).into());
                    }
                    Err(reason) => {
                        let id = ids[index].clone();
                        outcomes[index] = Some(RecordOutcome::failed(index, id, reason));
                    }
                }
            }
        }

        for (object, batch) in group_by_object(accepted) {
            for (index, id) in self.run_batch(ctx, operation, &object, batch)? {
                outcomes[index] = Some(RecordOutcome::succeeded(index, Some(id)));
            }
        }

        let outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.unwrap_or_else(|| {
                    RecordOutcome::failed(index, ids[index].clone(), "not processed")
                })
            })
            .collect();
        Ok(BulkOutcome::new(operation, outcomes))
    }

    fn run_batch(
        &self,
        ctx: &ExecutionContext,
        operation: OperationKind,
        object: &str,
        batch: Vec<Accepted>,
    ) -> Result<Vec<(usize, RecordId)>, MutationError> {
        let handlers = self.handlers_for(object);
        let indices: Vec<usize> = batch.iter().map(|a| a.index).collect();
        let ids: Vec<Option<RecordId>> = batch.iter().map(|a| a.id.clone()).collect();

        let mut old = RecordMap::new();
        let mut new = Vec::new();
        for accepted in batch {
            match (operation, accepted.id, accepted.stored) {
                (OperationKind::Insert, _, _) => new.push(accepted.input),
                (OperationKind::Update, Some(id), Some(stored)) => {
                    let mut merged = stored.clone();
                    merged.fields.extend(accepted.input.fields);
                    new.push(merged);
                    old.insert(id, stored);
                }
                (OperationKind::Delete, Some(id), Some(stored)) => {
                    old.insert(id, stored);
                }
                (OperationKind::Undelete, _, Some(stored)) => new.push(stored),
                _ => {}
            }
        }

        let mut before = LifecycleEvent::new(operation, Phase::Before, new, old.clone());
        self.fire(ctx, &mut before, &handlers)?;

        let persisted = self.persist(ctx.id(), operation, &ids, before.into_new_records());
        let assigned: Vec<RecordId> = match operation {
            OperationKind::Delete => ids.into_iter().flatten().collect(),
            _ => persisted.iter().filter_map(|r| r.id.clone()).collect(),
        };

        let mut after = LifecycleEvent::new(operation, Phase::After, persisted, old);
        self.fire(ctx, &mut after, &handlers)?;

        Ok(indices.into_iter().zip(assigned).collect())
    }

    /// Writes a validated batch, returning the records as stored.
    fn persist(
        &self,
        context: ContextId,
        operation: OperationKind,
        ids: &[Option<RecordId>],
        mut new: Vec<Record>,
    ) -> Vec<Record> {
        let mut undo = Vec::with_capacity(ids.len());
        {
            let mut store = self.lock_store();

            match operation {
                OperationKind::Insert => {
                    for record in &mut new {
                        let id = RecordId::generate();
                        undo.push(store.undo_for(&id));
                        record.id = Some(id.clone());
                        store.live.insert(id, record.clone());
                    }
                }
                OperationKind::Update => {
                    for (record, id) in new.iter_mut().zip(ids.iter().flatten()) {
                        undo.push(store.undo_for(id));
                        record.id = Some(id.clone());
                        store.live.insert(id.clone(), record.clone());
                    }
                }
                OperationKind::Delete => {
                    for id in ids.iter().flatten() {
                        undo.push(store.undo_for(id));
                        if let Some(record) = store.live.remove(id) {
                            store.recycle_bin.insert(id.clone(), record);
                        }
                    }
                }
                OperationKind::Undelete => {
                    for (record, id) in new.iter_mut().zip(ids.iter().flatten()) {
                        undo.push(store.undo_for(id));
                        record.id = Some(id.clone());
                        store.recycle_bin.remove(id);
                        store.live.insert(id.clone(), record.clone());
                    }
                }
            }
        }

        if let Some(frame) = self
            .lock_journals()
            .get_mut(&context)
            .and_then(|frames| frames.last_mut())
        {
            frame.extend(undo);
        }
        new
    }

    /// Pops the innermost frame of `context`. A committed nested frame moves
    /// into its enclosing call, which may still fail. A rolled back frame is
    /// replayed newest first.
    fn close_frame(&self, context: ContextId, committed: bool) {
        let mut journals = self.lock_journals();
        let Some(frames) = journals.get_mut(&context) else {
            return;
        };
        let frame = frames.pop().unwrap_or_default();

        if frames.is_empty() {
            journals.remove(&context);
        } else if committed {
            if let Some(enclosing) = frames.last_mut() {
                enclosing.extend(frame);
            }
            return;
        }
        drop(journals);

        if committed {
            return;
        }
        debug!(context = %context, writes = frame.len(), "undoing call");
        let mut store = self.lock_store();
        for undo in frame.into_iter().rev() {
            store.restore(undo);
        }
    }

    fn fire(
        &self,
        ctx: &ExecutionContext,
        event: &mut LifecycleEvent,
        handlers: &[Box<dyn TriggerHandler>],
    ) -> Result<(), MutationError> {
        let operation = event.operation();
        for handler in handlers {
            self.router
                .dispatch(ctx, event, handler.as_ref())
                .map_err(|source| MutationError::Trigger {
                    operation,
                    source: Box::new(source),
                })?;
            ctx.usage().check_cpu()?;
        }
        Ok(())
    }

    fn handlers_for(&self, object: &str) -> Vec<Box<dyn TriggerHandler>> {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(object)
            .map(|factories| factories.iter().map(|factory| factory()).collect())
            .unwrap_or_default()
    }

    fn lock_store(&self) -> MutexGuard<'_, RecordStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_journals(&self) -> MutexGuard<'_, Journals> {
        self.journals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// All-or-none rejection: the failing record carries the reason, every other
/// record is reported as rolled back.
fn rejected(
    operation: OperationKind,
    ids: &[Option<RecordId>],
    failed: usize,
    reason: String,
) -> BulkMutationError {
    let mut outcomes: Vec<RecordOutcome> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| RecordOutcome {
            index,
            id: id.clone(),
            status: OutcomeStatus::RolledBack,
        })
        .collect();
    outcomes[failed].status = OutcomeStatus::Failed(reason);
    BulkMutationError { operation, outcomes }
}

fn group_by_object(accepted: Vec<Accepted>) -> Vec<(String, Vec<Accepted>)> {
    let mut groups: Vec<(String, Vec<Accepted>)> = Vec::new();
    for record in accepted {
        match groups.iter_mut().find(|(object, _)| *object == record.object) {
            Some((_, batch)) => batch.push(record),
            None => groups.push((record.object.clone(), vec![record])),
        }
    }
    groups
}
