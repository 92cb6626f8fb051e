use serde_json::json;
use tracing::{debug, error, info, warn};
use tripwise_catalog::{today, TripCatalog};
use tripwise_core::{
    payment, status, CoreError, CoreResult, Operation, PartialFailure, PaymentBreakdown,
    SeatLedger, WriteStep,
};
use tripwise_shared::{Collection, Participant, Payment, Trip, TripStatus};
use tripwise_store::{CasOutcome, Filter, PersistenceGateway};
use crate::models::{CancelReceipt, JoinReceipt, JoinRequest};

/// Orchestrates joins and cancellations. Holds no state of its own; all of
/// it lives behind the gateway, so clones share nothing but the store.
#[derive(Clone)]
pub struct ParticipationCoordinator {
    catalog: TripCatalog,
}

fn partial(
    operation: Operation,
    failed_step: WriteStep,
    participant: &Participant,
    cause: &CoreError,
) -> CoreError {
    let failure = PartialFailure {
        operation,
        failed_step,
        trip_id: participant.trip_id.clone(),
        user_id: participant.user_id.clone(),
        participant_id: participant.id.clone(),
        passengers: participant.passenger_count,
        cause: cause.to_string(),
    };
    error!("Partial failure needs compensation: {}", failure);
    CoreError::PartialFailure(failure)
}

impl ParticipationCoordinator {
    pub fn new(catalog: TripCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TripCatalog {
        &self.catalog
    }

    pub(crate) fn gateway(&self) -> &PersistenceGateway {
        self.catalog.gateway()
    }

    /// Amounts the user confirms before paying the advance
    pub async fn quote(&self, trip_id: &str, passengers: u32) -> CoreResult<PaymentBreakdown> {
        if passengers == 0 {
            return Err(CoreError::ValidationError("passengers must be at least 1".to_string()));
        }
        let trip = self.catalog.get_trip(trip_id).await?;
        payment::breakdown(&trip, passengers)
    }

    /// Reserve seats for a user. Writes, in order: the participant (which
    /// doubles as the per-(trip, user) guard), the trip counters, the payment.
    pub async fn join(&self, req: JoinRequest) -> CoreResult<JoinReceipt> {
        if req.payment.method.trim().is_empty() || req.payment.transaction_id.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "payment method and transaction id are required".to_string(),
            ));
        }

        let trip = self.catalog.get_trip(&req.trip_id).await?;
        let existing = self.active_participant(&req.trip_id, &req.user_id).await?;
        SeatLedger::check_join_eligibility(
            &trip,
            &req.user_id,
            existing.is_some(),
            req.passengers,
            today(),
        )?;
        let breakdown = payment::breakdown(&trip, req.passengers)?;

        let participant = Participant::new(
            req.trip_id.clone(),
            req.user_id.clone(),
            req.passengers,
            breakdown.total_amount,
            breakdown.advance_amount,
        );
        let guard = Participant::guard_key(&req.trip_id, &req.user_id);
        let created = self
            .gateway()
            .create_unique(
                Collection::Participants,
                &guard,
                PersistenceGateway::to_record(&participant)?,
            )
            .await?;
        if created.is_none() {
            debug!("Concurrent join for {} on trip {} lost the guard", req.user_id, req.trip_id);
            return Err(CoreError::AlreadyJoined);
        }

        let reserved = self
            .reserve_seats(&req.trip_id, &req.user_id, &participant.id, req.passengers)
            .await;
        let trip = match reserved {
            Ok(trip) => trip,
            Err(
                e @ (CoreError::InsufficientSeats { .. }
                | CoreError::NotJoinable
                | CoreError::NotFound(_)),
            ) => {
                // Lost the race for the last seats; undo our participant so
                // nothing is left behind.
                warn!(
                    "Join of trip {} by {} rejected after guard: {}",
                    req.trip_id, req.user_id, e
                );
                if let Err(cleanup) = self.withdraw(&participant).await {
                    return Err(partial(
                        Operation::Join,
                        WriteStep::TripCounters,
                        &participant,
                        &cleanup,
                    ));
                }
                return Err(e);
            }
            Err(e) => {
                return Err(partial(Operation::Join, WriteStep::TripCounters, &participant, &e))
            }
        };

        let payment = Payment::new(
            req.trip_id.clone(),
            req.user_id.clone(),
            participant.id.clone(),
            breakdown.advance_amount,
            req.payment.method.clone(),
            req.payment.transaction_id.clone(),
        );
        let stored = match PersistenceGateway::to_record(&payment) {
            Ok(record) => self
                .gateway()
                .insert(Collection::Payments, record)
                .await
                .map_err(CoreError::from),
            Err(e) => Err(CoreError::from(e)),
        };
        if let Err(e) = stored {
            return Err(partial(Operation::Join, WriteStep::Payment, &participant, &e));
        }

        info!(
            "User {} joined trip {} with {} passengers ({} seats left)",
            req.user_id, req.trip_id, req.passengers, trip.available_seats
        );
        Ok(JoinReceipt { participant, trip, payment, breakdown })
    }

    /// Release a user's reservation. The payment record is not touched;
    /// refunds are handled elsewhere.
    pub async fn cancel(&self, trip_id: &str, user_id: &str) -> CoreResult<CancelReceipt> {
        let participant = self
            .active_participant(trip_id, user_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("reservation of user {} on trip {}", user_id, trip_id))
            })?;

        let cancelled = self.mark_cancelled(&participant).await?;

        let released = self
            .release_seats(trip_id, user_id, &participant.id, participant.passenger_count)
            .await;
        let trip = match released {
            Ok(trip) => trip,
            Err(e) => {
                return Err(partial(Operation::Cancel, WriteStep::TripCounters, &participant, &e))
            }
        };

        // The guard goes last so a rejoin cannot start before the seats are back
        if let Err(e) = self.release_guard(&participant.trip_id, user_id, &participant.id).await {
            return Err(partial(Operation::Cancel, WriteStep::Participant, &participant, &e));
        }

        info!("User {} cancelled reservation on trip {}", user_id, trip_id);
        Ok(CancelReceipt { participant: cancelled, trip })
    }

    /// Finish cleaning up after a partial failure. Everything is keyed on the
    /// failed participant: seats are released only while that participant
    /// still holds them and the guard only while it still names it, so
    /// repeated calls, or calls after the user rejoined, leave later
    /// reservations alone.
    pub async fn compensate(&self, failure: &PartialFailure) -> CoreResult<()> {
        warn!("Compensating {}", failure);

        if failure.operation == Operation::Join {
            let participant: Option<Participant> = self
                .gateway()
                .get_as(Collection::Participants, &failure.participant_id)
                .await?;
            if let Some(p) = participant.filter(|p| p.is_active()) {
                self.mark_cancelled(&p).await?;
            }
        }

        self.release_seats(
            &failure.trip_id,
            &failure.user_id,
            &failure.participant_id,
            failure.passengers,
        )
        .await?;
        self.release_guard(&failure.trip_id, &failure.user_id, &failure.participant_id)
            .await?;
        Ok(())
    }

    pub(crate) async fn active_participant(
        &self,
        trip_id: &str,
        user_id: &str,
    ) -> CoreResult<Option<Participant>> {
        let filter = Filter::all().eq("trip_id", trip_id).eq("user_id", user_id);
        let found: Vec<Participant> =
            self.gateway().list_as(Collection::Participants, &filter).await?;
        Ok(found.into_iter().find(|p| p.is_active()))
    }

    async fn mark_cancelled(&self, participant: &Participant) -> CoreResult<Participant> {
        let mut cancelled = participant.clone();
        cancelled.cancel();
        let patch = json!({
            "status": cancelled.status,
            "cancelled_at": cancelled.cancelled_at,
        });
        self.gateway()
            .update(Collection::Participants, &participant.id, &patch)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("participant {}", participant.id)))?;
        Ok(cancelled)
    }

    /// Undo a participant whose seats were never reserved
    async fn withdraw(&self, participant: &Participant) -> CoreResult<()> {
        self.mark_cancelled(participant).await?;
        self.release_guard(&participant.trip_id, &participant.user_id, &participant.id)
            .await
    }

    /// Free the per-(trip, user) guard if `participant_id` still holds it
    async fn release_guard(
        &self,
        trip_id: &str,
        user_id: &str,
        participant_id: &str,
    ) -> CoreResult<()> {
        let guard = Participant::guard_key(trip_id, user_id);
        let released = self
            .gateway()
            .release_unique(Collection::Participants, &guard, participant_id)
            .await?;
        if !released {
            debug!("Guard {} no longer held by participant {}", guard, participant_id);
        }
        Ok(())
    }

    /// Conditional decrement of the trip's seats. Retries when another
    /// writer got there first; the ledger re-checks capacity every time.
    async fn reserve_seats(
        &self,
        trip_id: &str,
        user_id: &str,
        participant_id: &str,
        passengers: u32,
    ) -> CoreResult<Trip> {
        for attempt in 0..self.gateway().retry_limit() {
            let trip = self.catalog.load_raw(trip_id).await?;
            if status::effective_status(&trip, today()) != TripStatus::Planned {
                return Err(CoreError::NotJoinable);
            }
            let updated = SeatLedger::apply_join_delta(&trip, user_id, participant_id, passengers)?;
            match self.catalog.store_trip(trip.revision, &updated).await? {
                CasOutcome::Swapped => return Ok(updated),
                CasOutcome::Missing => {
                    return Err(CoreError::NotFound(format!("trip {}", trip_id)))
                }
                CasOutcome::Conflict => debug!(
                    "Seat reservation on {} conflicted (attempt {})",
                    trip_id,
                    attempt + 1
                ),
            }
        }
        Err(CoreError::StorageUnavailable(format!("trip {} under heavy contention", trip_id)))
    }

    /// Inverse of `reserve_seats`; a no-op if `participant_id` holds no
    /// seats on the trip or the trip is gone.
    async fn release_seats(
        &self,
        trip_id: &str,
        user_id: &str,
        participant_id: &str,
        passengers: u32,
    ) -> CoreResult<Option<Trip>> {
        for attempt in 0..self.gateway().retry_limit() {
            let trip = match self.catalog.load_raw(trip_id).await {
                Ok(trip) => trip,
                Err(CoreError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let Some(updated) =
                SeatLedger::apply_cancel_delta(&trip, user_id, participant_id, passengers)
            else {
                return Ok(Some(trip));
            };
            match self.catalog.store_trip(trip.revision, &updated).await? {
                CasOutcome::Swapped => return Ok(Some(updated)),
                CasOutcome::Missing => return Ok(None),
                CasOutcome::Conflict => debug!(
                    "Seat release on {} conflicted (attempt {})",
                    trip_id,
                    attempt + 1
                ),
            }
        }
        Err(CoreError::StorageUnavailable(format!("trip {} under heavy contention", trip_id)))
    }
}
