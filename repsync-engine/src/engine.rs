//! The sync engine.
//!
//! One `SyncEngine` instance runs per device, with its store and
//! transport injected at construction. All mutations funnel through a
//! single writer gate: transport callbacks and UI calls alike go through
//! engine entry points, so the store never sees concurrent writers.
//!
//! Delivery policy: `send_immediate` first while the peer is reachable;
//! on failure or while unreachable, per-set events fall back to the
//! durable outbox (preserving write-ahead order), and the
//! program-catalog exchange falls back to the store-and-forward channel.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use repsync_core::{resume_point, LinkAction, LinkEvent, LinkState, ResumePoint};
use repsync_store::{RecordStore, StoreError};
use repsync_types::{
    DeviceId, DeviceRole, EntryId, ExerciseLogEntry, ExercisePlan, SessionId, SessionStatus,
    SyncEvent, TemplateId, TemplateRecord, WorkoutSession, WorkoutStart, WorkoutUpdate,
};

use crate::merge::{BatchReport, MergeEngine};
use crate::outbox::{FlushReport, Outbox, QueueStatus};
use crate::transport::{Transport, TransportError};

/// Engine errors surfaced to the caller.
///
/// Transport failures are absorbed into the outbox and never appear
/// here; only store failures and caller mistakes do.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Local durability failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Transport session could not be activated.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The referenced session does not exist locally.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The referenced session is already completed and immutable.
    #[error("session already completed: {0}")]
    SessionCompleted(SessionId),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// This device's identity.
    pub device_id: DeviceId,
    /// Which side of the link this device plays.
    pub role: DeviceRole,
    /// Bound on every immediate send attempt.
    pub immediate_timeout: Duration,
}

impl EngineConfig {
    /// Create a configuration with the default send timeout.
    pub fn new(device_id: DeviceId, role: DeviceRole) -> Self {
        Self {
            device_id,
            role,
            immediate_timeout: Duration::from_secs(5),
        }
    }

    /// Override the immediate-send timeout.
    pub fn with_immediate_timeout(mut self, timeout: Duration) -> Self {
        self.immediate_timeout = timeout;
        self
    }
}

/// The cross-device sync engine for one device.
pub struct SyncEngine<T: Transport> {
    config: EngineConfig,
    store: Arc<dyn RecordStore>,
    transport: Arc<T>,
    outbox: Outbox,
    merge: MergeEngine,
    link: tokio::sync::Mutex<LinkState>,
    write_gate: tokio::sync::Mutex<()>,
}

impl<T: Transport> SyncEngine<T> {
    /// Create an engine over an injected store and transport.
    ///
    /// Reloads any outbox items persisted by an earlier process.
    pub async fn new(
        config: EngineConfig,
        store: Arc<dyn RecordStore>,
        transport: Arc<T>,
    ) -> Result<Self, StoreError> {
        let outbox = Outbox::open(Arc::clone(&store)).await?;
        let merge = MergeEngine::new(Arc::clone(&store));
        tracing::debug!(device = %config.device_id, role = ?config.role, "sync engine ready");
        Ok(Self {
            config,
            store,
            transport,
            outbox,
            merge,
            link: tokio::sync::Mutex::new(LinkState::new()),
            write_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// The injected transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// This device's role.
    pub fn role(&self) -> DeviceRole {
        self.config.role
    }

    /// Activate the transport session.
    ///
    /// If the peer is already reachable, queued events are flushed
    /// immediately after activation.
    pub async fn activate(&self) -> Result<(), EngineError> {
        let actions = {
            let mut link = self.link.lock().await;
            let (next, actions) = link.clone().on_event(LinkEvent::ActivateRequested);
            *link = next;
            actions
        };
        if !actions.contains(&LinkAction::BeginActivation) {
            return Ok(());
        }

        let outcome = self.transport.activate().await;
        let event = match &outcome {
            Ok(()) => LinkEvent::ActivationSucceeded {
                reachable: self.transport.is_reachable(),
            },
            Err(err) => LinkEvent::ActivationFailed {
                error: err.to_string(),
            },
        };
        let actions = {
            let mut link = self.link.lock().await;
            let (next, actions) = link.clone().on_event(event);
            *link = next;
            actions
        };

        if actions.contains(&LinkAction::FlushOutbox) {
            self.flush().await;
        }
        outcome.map_err(EngineError::from)
    }

    /// Feed a reachability change from the transport path monitor.
    ///
    /// Flushes the outbox on each offline→online edge (single-fire; a
    /// repeated "online" report is a path detail change and does
    /// nothing).
    pub async fn on_reachability(&self, reachable: bool) {
        let actions = {
            let mut link = self.link.lock().await;
            let (next, actions) = link
                .clone()
                .on_event(LinkEvent::ReachabilityChanged { reachable });
            *link = next;
            actions
        };

        if actions.contains(&LinkAction::FlushOutbox) {
            tracing::info!("peer became reachable; draining outbox");
            self.flush().await;
        }
    }

    /// Begin a workout, optionally from a template.
    ///
    /// Writes the session and its plan locally first, then announces the
    /// start to the peer (immediate or queued).
    pub async fn start_workout(
        &self,
        template_id: Option<TemplateId>,
    ) -> Result<WorkoutSession, EngineError> {
        let _write = self.write_gate.lock().await;

        let session = WorkoutSession::start(template_id, now_ms());
        let plan: Vec<ExercisePlan> = match template_id {
            Some(id) => self
                .store
                .template_exercises(&id)
                .await?
                .iter()
                .map(ExercisePlan::from_template_exercise)
                .collect(),
            None => Vec::new(),
        };

        self.store.put_session(&session).await?;
        self.store.put_plan(&session.id, &plan).await?;
        self.store.save().await?;
        tracing::info!(session = %session.id, exercises = plan.len(), "workout started");

        self.send_or_enqueue(SyncEvent::WorkoutStart(WorkoutStart {
            session_id: session.id,
            template_id,
            started_at: session.started_at,
            exercises: plan,
        }))
        .await?;

        Ok(session)
    }

    /// Log one completed set.
    ///
    /// Write-ahead: the entry is committed to the local store before any
    /// transport attempt, so the workout survives even if every delivery
    /// fails from here on.
    pub async fn log_set(
        &self,
        session_id: SessionId,
        exercise_order_index: u32,
        set_number: u32,
        reps: u32,
        weight: f64,
    ) -> Result<ExerciseLogEntry, EngineError> {
        let _write = self.write_gate.lock().await;

        let session = self
            .store
            .session(&session_id)
            .await?
            .ok_or(EngineError::UnknownSession(session_id))?;
        if !session.is_active() {
            return Err(EngineError::SessionCompleted(session_id));
        }

        let entry = ExerciseLogEntry {
            id: EntryId::new(),
            session_id,
            exercise_order_index,
            set_number,
            weight,
            reps,
            completed: true,
            created_at: now_ms(),
        };
        self.store.append_log_entry(&entry).await?;
        self.store.save().await?;

        let exercise_name = self
            .store
            .plan(&session_id)
            .await?
            .get(exercise_order_index as usize)
            .map(|p| p.name.clone())
            .unwrap_or_default();

        self.send_or_enqueue(SyncEvent::WorkoutUpdate(WorkoutUpdate {
            entry_id: entry.id,
            session_id,
            exercise_name,
            exercise_order_index,
            set_number,
            reps,
            weight,
            logged_at: entry.created_at,
        }))
        .await?;

        Ok(entry)
    }

    /// Suspend an active workout, banking elapsed active time.
    pub async fn pause_workout(&self, session_id: SessionId) -> Result<(), EngineError> {
        let _write = self.write_gate.lock().await;

        let mut session = self.active_session_for_update(session_id).await?;
        bank_active_time(&mut session, now_ms());
        session.last_resumed_at = None;
        self.store.put_session(&session).await?;
        self.store.save().await?;
        Ok(())
    }

    /// Resume a suspended workout and return where to continue.
    pub async fn resume_workout(&self, session_id: SessionId) -> Result<ResumePoint, EngineError> {
        {
            let _write = self.write_gate.lock().await;
            let mut session = self.active_session_for_update(session_id).await?;
            if session.last_resumed_at.is_none() {
                session.last_resumed_at = Some(now_ms());
                self.store.put_session(&session).await?;
                self.store.save().await?;
            }
        }
        self.resume_point(session_id).await
    }

    /// Finish a workout. Completing twice is a no-op.
    pub async fn complete_workout(
        &self,
        session_id: SessionId,
    ) -> Result<WorkoutSession, EngineError> {
        let _write = self.write_gate.lock().await;

        let mut session = self
            .store
            .session(&session_id)
            .await?
            .ok_or(EngineError::UnknownSession(session_id))?;
        if session.status == SessionStatus::Completed {
            return Ok(session);
        }

        bank_active_time(&mut session, now_ms());
        session.last_resumed_at = None;
        session.status = SessionStatus::Completed;
        self.store.put_session(&session).await?;
        self.store.save().await?;
        tracing::info!(
            session = %session.id,
            active_secs = session.active_duration_secs,
            "workout completed"
        );
        Ok(session)
    }

    /// Recompute the resume point for a session from local state alone.
    ///
    /// Called on every cold start and view re-entry; requires no
    /// network.
    pub async fn resume_point(&self, session_id: SessionId) -> Result<ResumePoint, EngineError> {
        self.store
            .session(&session_id)
            .await?
            .ok_or(EngineError::UnknownSession(session_id))?;

        let plan = self.store.plan(&session_id).await?;
        let entries = self.store.log_entries(&session_id).await?;
        Ok(resume_point(&plan, &entries))
    }

    /// The active workout with its resume point, if any.
    pub async fn active_workout(
        &self,
    ) -> Result<Option<(WorkoutSession, ResumePoint)>, EngineError> {
        let Some(session) = self.store.active_session().await? else {
            return Ok(None);
        };
        let point = self.resume_point(session.id).await?;
        Ok(Some((session, point)))
    }

    /// Ask the peer to resend the active session's start record.
    ///
    /// Used when this device has no local session record but the peer
    /// believes a workout is in progress.
    pub async fn request_active_workout(&self) -> Result<(), EngineError> {
        self.send_or_enqueue(SyncEvent::RequestSync(repsync_types::RequestSync {}))
            .await
    }

    /// Local-apply path for the template editor on the owning device.
    ///
    /// Runs the same idempotent upsert as the network path, with no
    /// transport involved. Callers follow up with [`push_program`].
    ///
    /// [`push_program`]: SyncEngine::push_program
    pub async fn apply_local_template(
        &self,
        record: &TemplateRecord,
    ) -> Result<BatchReport, EngineError> {
        let _write = self.write_gate.lock().await;
        Ok(self
            .merge
            .apply_template_batch(std::slice::from_ref(record))
            .await?)
    }

    /// Push the full template catalog to the peer.
    ///
    /// Immediate when reachable; otherwise (or on failure) rebroadcast
    /// through the store-and-forward channel - the catalog exchange is
    /// idempotent, so opportunistic redelivery is harmless.
    pub async fn push_program(&self) -> Result<(), EngineError> {
        let mut templates = Vec::new();
        for template in self.store.templates().await? {
            let exercises = self
                .store
                .template_exercises(&template.id)
                .await?
                .iter()
                .map(|ex| ExercisePlan {
                    exercise_id: ex.id,
                    name: ex.name.clone(),
                    order_index: ex.order_index,
                    target_sets: ex.target_sets,
                    target_reps: ex.target_reps,
                    target_weight: ex.target_weight,
                })
                .collect();
            templates.push(TemplateRecord {
                template_id: template.id,
                owner_id: template.owner_id,
                name: template.name,
                day_of_week: template.day_of_week,
                exercises,
            });
        }

        self.send_or_defer(SyncEvent::ProgramSync(repsync_types::ProgramSync {
            templates,
        }))
        .await;
        Ok(())
    }

    /// Request a full catalog resync from the peer.
    ///
    /// Used when local state is empty or suspected stale.
    pub async fn request_program_resync(&self) -> Result<(), EngineError> {
        self.send_or_defer(SyncEvent::FetchProgram(repsync_types::FetchProgram {}))
            .await;
        Ok(())
    }

    /// Dispatch one inbound event.
    ///
    /// Transport callbacks marshal through here, inside the single
    /// writer gate.
    pub async fn handle_incoming(&self, event: SyncEvent) -> Result<(), EngineError> {
        let _write = self.write_gate.lock().await;
        tracing::debug!(kind = event.kind(), "inbound event");

        match event {
            SyncEvent::ProgramSync(sync) => {
                if self.config.role == DeviceRole::Primary {
                    // Templates flow primary → companion only; accepting
                    // them here would let a stale companion cache
                    // overwrite the catalog of record.
                    tracing::warn!("ignoring program_sync on primary device");
                    return Ok(());
                }
                let report = self.merge.apply_template_batch(&sync.templates).await?;
                tracing::info!(
                    applied = report.applied,
                    skipped = report.skipped,
                    "program catalog merged"
                );
            }
            SyncEvent::FetchProgram(_) => {
                if self.config.role == DeviceRole::Primary {
                    self.push_program().await?;
                } else {
                    tracing::warn!("ignoring fetch_program on companion device");
                }
            }
            SyncEvent::WorkoutStart(start) => {
                self.merge.apply_workout_start(&start).await?;
            }
            SyncEvent::WorkoutUpdate(update) => {
                self.merge.apply_workout_update(&update).await?;
            }
            SyncEvent::RequestSync(_) => {
                self.resend_active_start().await?;
            }
        }
        Ok(())
    }

    /// Drain the outbox now (reachability-restored and user-triggered
    /// retry both land here). Non-reentrant.
    pub async fn flush(&self) -> FlushReport {
        self.outbox
            .flush(self.transport.as_ref(), self.config.immediate_timeout)
            .await
    }

    /// Queue depth and last-attempt timestamp for the UI layer.
    pub async fn queue_status(&self) -> QueueStatus {
        self.outbox.status().await
    }

    /// Run the inbound receive loop until the transport closes.
    pub fn spawn_inbound(engine: Arc<Self>) -> JoinHandle<()>
    where
        T: 'static,
    {
        tokio::spawn(async move {
            loop {
                match engine.transport.recv().await {
                    Ok(event) => {
                        if let Err(err) = engine.handle_incoming(event).await {
                            tracing::warn!(%err, "failed to apply inbound event");
                        }
                    }
                    Err(TransportError::Closed) => break,
                    Err(err) => {
                        tracing::debug!(%err, "inbound receive failed");
                        break;
                    }
                }
            }
        })
    }

    // Immediate-first for per-set events: on failure or while
    // unreachable, the durable outbox keeps write-ahead order.
    async fn send_or_enqueue(&self, event: SyncEvent) -> Result<(), EngineError> {
        if self.transport.is_reachable() {
            let attempt = tokio::time::timeout(
                self.config.immediate_timeout,
                self.transport.send_immediate(event.clone()),
            )
            .await;
            match attempt {
                Ok(Ok(_ack)) => return Ok(()),
                Ok(Err(err)) => {
                    tracing::debug!(kind = event.kind(), %err, "immediate send failed; queueing")
                }
                Err(_elapsed) => {
                    tracing::debug!(kind = event.kind(), "immediate send timed out; queueing")
                }
            }
        }
        self.outbox.enqueue(event).await?;
        Ok(())
    }

    // Immediate-first for the catalog exchange: last resort is the
    // store-and-forward channel, not the outbox.
    async fn send_or_defer(&self, event: SyncEvent) {
        if self.transport.is_reachable() {
            let attempt = tokio::time::timeout(
                self.config.immediate_timeout,
                self.transport.send_immediate(event.clone()),
            )
            .await;
            if matches!(attempt, Ok(Ok(_))) {
                return;
            }
            tracing::debug!(kind = event.kind(), "immediate send failed; deferring");
        }
        self.transport.send_deferred(event);
    }

    async fn resend_active_start(&self) -> Result<(), EngineError> {
        let Some(session) = self.store.active_session().await? else {
            tracing::debug!("request_sync received but no active session");
            return Ok(());
        };
        let plan = self.store.plan(&session.id).await?;

        self.send_or_enqueue(SyncEvent::WorkoutStart(WorkoutStart {
            session_id: session.id,
            template_id: session.template_id,
            started_at: session.started_at,
            exercises: plan,
        }))
        .await
    }

    async fn active_session_for_update(
        &self,
        session_id: SessionId,
    ) -> Result<WorkoutSession, EngineError> {
        let session = self
            .store
            .session(&session_id)
            .await?
            .ok_or(EngineError::UnknownSession(session_id))?;
        if !session.is_active() {
            return Err(EngineError::SessionCompleted(session_id));
        }
        Ok(session)
    }
}

/// Roll elapsed time since the last resume into the accumulated active
/// duration.
fn bank_active_time(session: &mut WorkoutSession, now: i64) {
    if let Some(resumed_at) = session.last_resumed_at {
        let elapsed_ms = now.saturating_sub(resumed_at);
        if elapsed_ms > 0 {
            session.active_duration_secs += (elapsed_ms / 1000) as u64;
        }
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
