//! Network interface lifecycle
//!
//! `Creating → Available → (Updating ⟲ Available) → Deleting → Gone`
//!
//! Create is a single provider call followed by a poll until the interface
//! reports Available. Delete keeps re-issuing the call while the provider
//! answers with one of the expected transitional conflicts, then polls
//! until the interface is gone.

use crate::error::{EniError, Result};
use crate::poller::{PollResult, Probe};
use crate::reconciler::{Reconciler, interface_entity};
use async_trait::async_trait;
use eniflow_cloud::{
    ConflictCode, CreateInterfaceRequest, ErrorClass, InterfaceStatus, InterfaceUpdate,
    NetworkInterface, NetworkProvider,
};
use tracing::{debug, info, warn};

/// Conflicts that clear on their own while dependent attachments detach
pub const DELETE_RETRYABLE_CONFLICTS: &[ConflictCode] = &[
    ConflictCode::DetachPrimaryEniNotAllowed,
    ConflictCode::InvalidEniType,
    ConflictCode::InvalidEniState,
];

impl<P: NetworkProvider> Reconciler<P> {
    /// Create an interface and wait until it is Available.
    ///
    /// The create call itself is attempted once. Use a client token in the
    /// request to make a re-invocation after a failure safe. The returned
    /// snapshot is the one that reported Available.
    #[tracing::instrument(skip(self, request), fields(subnet = %request.subnet_id))]
    pub async fn create_interface(
        &self,
        request: &CreateInterfaceRequest,
    ) -> Result<NetworkInterface> {
        let request = request.normalized();

        info!("Creating network interface in subnet {}", request.subnet_id);
        let id = self
            .provider
            .create_interface(&request)
            .await
            .map_err(|e| {
                EniError::from_provider(
                    format!("network interface in subnet {}", request.subnet_id),
                    "create",
                    e,
                )
            })?;
        info!("Created network interface {}, waiting for it to become available", id);

        let mut probe = CreateProbe {
            provider: &self.provider,
            interface_id: &id,
        };
        let eni = self
            .poller
            .poll(
                &interface_entity(&id),
                "become Available",
                self.config.create_timeout(),
                &mut probe,
            )
            .await?;

        info!("Network interface {} is available", id);
        Ok(eni)
    }

    /// Read the current snapshot. `None` means the interface no longer exists.
    #[tracing::instrument(skip(self))]
    pub async fn read_interface(&self, interface_id: &str) -> Result<Option<NetworkInterface>> {
        match self.provider.describe_interface(interface_id).await {
            Ok(eni) => {
                eni.check_invariants()?;
                Ok(Some(eni))
            }
            Err(e) if e.class().is_not_found() => {
                info!("Network interface {} no longer exists", interface_id);
                Ok(None)
            }
            Err(e) => Err(EniError::from_provider(
                interface_entity(interface_id),
                "describe",
                e,
            )),
        }
    }

    /// Apply the attributes of `desired` that differ from `observed`.
    ///
    /// Nothing is sent when no field differs. A conflict is returned as is:
    /// the interface is mid-transition and the whole reconciliation should
    /// be retried later from a fresh read.
    #[tracing::instrument(skip_all, fields(interface_id = %observed.id))]
    pub async fn update_interface(
        &self,
        observed: &NetworkInterface,
        desired: &InterfaceUpdate,
    ) -> Result<NetworkInterface> {
        let changes = desired.diff_against(observed);

        if changes.is_empty() {
            debug!("Network interface {} is up to date", observed.id);
        } else {
            info!(
                "Updating network interface {}: {}",
                observed.id,
                changes.field_names().join(", ")
            );
            self.provider
                .modify_interface_attributes(&observed.id, &changes)
                .await
                .map_err(|e| EniError::from_provider(interface_entity(&observed.id), "modify", e))?;
        }

        self.read_interface(&observed.id)
            .await?
            .ok_or_else(|| EniError::NotFound {
                entity: interface_entity(&observed.id),
                message: "disappeared during update".to_string(),
            })
    }

    /// Delete an interface and wait until it is gone.
    ///
    /// Deleting an interface that does not exist succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete_interface(&self, interface_id: &str) -> Result<()> {
        info!("Deleting network interface {}", interface_id);

        let entity = interface_entity(interface_id);
        let mut probe = DeleteProbe {
            provider: &self.provider,
            interface_id,
            accepted: false,
        };
        self.poller
            .poll(&entity, "disappear", self.config.delete_timeout(), &mut probe)
            .await?;

        info!("Network interface {} deleted", interface_id);
        Ok(())
    }
}

/// Waits for a freshly created interface to leave Creating
struct CreateProbe<'a, P> {
    provider: &'a P,
    interface_id: &'a str,
}

#[async_trait]
impl<'a, P: NetworkProvider> Probe for CreateProbe<'a, P> {
    type Output = NetworkInterface;

    async fn probe(&mut self) -> PollResult<NetworkInterface> {
        let eni = match self.provider.describe_interface(self.interface_id).await {
            Ok(eni) => eni,
            // Reads may lag the create call
            Err(e) if e.class().is_not_found() => {
                return PollResult::Continue(format!("not visible yet ({})", e));
            }
            Err(e) if e.class() == ErrorClass::Transient => {
                warn!("Transient error describing {}: {}", self.interface_id, e);
                return PollResult::Continue(format!("transient error: {}", e));
            }
            Err(e) => {
                return PollResult::Failed(EniError::from_provider(
                    interface_entity(self.interface_id),
                    "describe",
                    e,
                ));
            }
        };

        if let Err(violation) = eni.check_invariants() {
            return PollResult::Failed(violation.into());
        }

        match eni.status {
            InterfaceStatus::Available => PollResult::Done(eni),
            InterfaceStatus::Creating => PollResult::Continue(format!("status {}", eni.status)),
            observed => PollResult::Failed(EniError::UnexpectedState {
                entity: interface_entity(self.interface_id),
                expected: InterfaceStatus::Available,
                observed,
            }),
        }
    }
}

/// Issues the delete until accepted, then waits for the interface to vanish
struct DeleteProbe<'a, P> {
    provider: &'a P,
    interface_id: &'a str,
    accepted: bool,
}

#[async_trait]
impl<'a, P: NetworkProvider> Probe for DeleteProbe<'a, P> {
    type Output = ();

    async fn probe(&mut self) -> PollResult<()> {
        if !self.accepted {
            match self.provider.delete_interface(self.interface_id).await {
                Ok(()) => {
                    debug!("Delete of {} accepted", self.interface_id);
                    self.accepted = true;
                }
                Err(e) => match e.class() {
                    ErrorClass::NotFound => {
                        debug!("{} already gone", self.interface_id);
                        self.accepted = true;
                    }
                    class if class.is_conflict_in(DELETE_RETRYABLE_CONFLICTS) => {
                        warn!("Delete of {} rejected, will retry: {}", self.interface_id, e);
                        return PollResult::Continue(format!("delete rejected: {}", e));
                    }
                    ErrorClass::Transient => {
                        warn!("Transient error deleting {}: {}", self.interface_id, e);
                        return PollResult::Continue(format!("transient error: {}", e));
                    }
                    _ => {
                        return PollResult::Failed(EniError::from_provider(
                            interface_entity(self.interface_id),
                            "delete",
                            e,
                        ));
                    }
                },
            }
        }

        match self.provider.describe_interface(self.interface_id).await {
            Ok(eni) => PollResult::Continue(format!("still visible with status {}", eni.status)),
            Err(e) => match e.class() {
                ErrorClass::NotFound => PollResult::Done(()),
                ErrorClass::Transient => {
                    PollResult::Continue(format!("transient error: {}", e))
                }
                _ => PollResult::Failed(EniError::from_provider(
                    interface_entity(self.interface_id),
                    "describe",
                    e,
                )),
            },
        }
    }
}
