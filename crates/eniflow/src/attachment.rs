//! Attachment lifecycle
//!
//! `Detached → Attaching → Attached → Detaching → Detached`
//!
//! The provider does not store attachments. An attachment exists when the
//! instance lists the interface among its members, so every wait here polls
//! the instance, not the interface.

use crate::error::{EniError, Result};
use crate::poller::{PollResult, Probe};
use crate::reconciler::{Reconciler, instance_entity};
use async_trait::async_trait;
use eniflow_cloud::{
    Attachment, AttachmentId, ConflictCode, ErrorClass, NetworkProvider, ProviderError,
};
use tracing::{debug, info, warn};

/// Conflicts worth waiting out during detach
pub const DETACH_RETRYABLE_CONFLICTS: &[ConflictCode] = &[ConflictCode::InvalidEcsState];

impl<P: NetworkProvider> Reconciler<P> {
    /// Attach an interface to an instance and wait until the instance lists it.
    ///
    /// Nothing is sent when the instance already lists the interface. The
    /// attach call is not retried. On timeout no attachment is returned even
    /// though the provider may still complete the request; reading the
    /// attachment later tells.
    #[tracing::instrument(skip(self))]
    pub async fn attach_interface(
        &self,
        interface_id: &str,
        instance_id: &str,
    ) -> Result<Attachment> {
        let id = AttachmentId::try_new(interface_id, instance_id)?;

        let instance = self
            .provider
            .describe_instance(&id.instance_id)
            .await
            .map_err(|e| {
                EniError::from_provider(instance_entity(&id.instance_id), "describe-instance", e)
            })?;
        if instance.has_interface(&id.interface_id) {
            info!("Attachment {} already exists", id);
            return Ok(Attachment { id });
        }

        info!(
            "Attaching network interface {} to instance {}",
            id.interface_id, id.instance_id
        );
        self.provider
            .attach_interface(&id.interface_id, &id.instance_id)
            .await
            .map_err(|e| EniError::from_provider(attachment_entity(&id), "attach", e))?;

        let mut probe = MembershipProbe {
            provider: &self.provider,
            id: &id,
            expect_member: true,
        };
        self.poller
            .poll(
                &attachment_entity(&id),
                &format!("appear on instance {}", id.instance_id),
                self.config.attach_timeout(),
                &mut probe,
            )
            .await?;

        info!("Attachment {} established", id);
        Ok(Attachment { id })
    }

    /// Read an attachment. `None` means it no longer exists, including when
    /// the instance itself is gone.
    #[tracing::instrument(skip(self, id), fields(attachment = %id))]
    pub async fn read_attachment(&self, id: &AttachmentId) -> Result<Option<Attachment>> {
        let instance = match self.provider.describe_instance(&id.instance_id).await {
            Ok(instance) => instance,
            Err(e) if e.class().is_not_found() => {
                info!("Instance {} no longer exists", id.instance_id);
                return Ok(None);
            }
            Err(e) => {
                return Err(EniError::from_provider(
                    instance_entity(&id.instance_id),
                    "describe-instance",
                    e,
                ));
            }
        };

        if instance.has_interface(&id.interface_id) {
            Ok(Some(Attachment { id: id.clone() }))
        } else {
            info!("Attachment {} no longer exists", id);
            Ok(None)
        }
    }

    /// Read an attachment from its serialized `<interface-id>:<instance-id>` form
    pub async fn import_attachment(&self, raw_id: &str) -> Result<Option<Attachment>> {
        let id: AttachmentId = raw_id.parse()?;
        self.read_attachment(&id).await
    }

    /// Detach an interface from an instance and wait until the instance no
    /// longer lists it.
    ///
    /// A missing instance counts as detached. A busy instance is waited out;
    /// any other rejection is surfaced unless the instance turns out not to
    /// list the interface anyway.
    #[tracing::instrument(skip(self, id), fields(attachment = %id))]
    pub async fn detach_interface(&self, id: &AttachmentId) -> Result<()> {
        info!(
            "Detaching network interface {} from instance {}",
            id.interface_id, id.instance_id
        );

        let mut probe = DetachProbe {
            membership: MembershipProbe {
                provider: &self.provider,
                id,
                expect_member: false,
            },
            issued: false,
            rejected: None,
        };
        self.poller
            .poll(
                &attachment_entity(id),
                &format!("leave instance {}", id.instance_id),
                self.config.detach_timeout(),
                &mut probe,
            )
            .await?;

        info!("Attachment {} removed", id);
        Ok(())
    }
}

fn attachment_entity(id: &AttachmentId) -> String {
    format!("attachment {}", id)
}

/// Watches the instance's interface list for the interface to (dis)appear
struct MembershipProbe<'a, P> {
    provider: &'a P,
    id: &'a AttachmentId,
    expect_member: bool,
}

impl<'a, P: NetworkProvider> MembershipProbe<'a, P> {
    async fn observe(&self) -> PollResult<()> {
        let member = match self.provider.describe_instance(&self.id.instance_id).await {
            Ok(instance) => instance.has_interface(&self.id.interface_id),
            // A missing instance lists nothing and never will
            Err(e) if e.class().is_not_found() && !self.expect_member => false,
            Err(e) if e.class() == ErrorClass::Transient => {
                warn!("Transient error describing {}: {}", self.id.instance_id, e);
                return PollResult::Continue(format!("transient error: {}", e));
            }
            Err(e) => {
                return PollResult::Failed(EniError::from_provider(
                    instance_entity(&self.id.instance_id),
                    "describe-instance",
                    e,
                ));
            }
        };

        if member == self.expect_member {
            PollResult::Done(())
        } else {
            PollResult::Continue(format!(
                "instance {} {} interface {}",
                self.id.instance_id,
                if member { "still lists" } else { "does not list" },
                self.id.interface_id
            ))
        }
    }
}

#[async_trait]
impl<'a, P: NetworkProvider> Probe for MembershipProbe<'a, P> {
    type Output = ();

    async fn probe(&mut self) -> PollResult<()> {
        self.observe().await
    }
}

/// Issues the detach until it goes through, then waits for the membership
/// to drop the interface
struct DetachProbe<'a, P> {
    membership: MembershipProbe<'a, P>,
    issued: bool,
    /// A non-retryable rejection, surfaced only if the interface is still a member
    rejected: Option<ProviderError>,
}

#[async_trait]
impl<'a, P: NetworkProvider> Probe for DetachProbe<'a, P> {
    type Output = ();

    async fn probe(&mut self) -> PollResult<()> {
        let id = self.membership.id;

        if !self.issued {
            match self
                .membership
                .provider
                .detach_interface(&id.interface_id, &id.instance_id)
                .await
            {
                Ok(()) => {
                    debug!("Detach of {} accepted", id);
                    self.issued = true;
                }
                Err(e) => match e.class() {
                    class if class.is_conflict_in(DETACH_RETRYABLE_CONFLICTS) => {
                        warn!("Detach of {} rejected, will retry: {}", id, e);
                        return PollResult::Continue(format!("detach rejected: {}", e));
                    }
                    ErrorClass::Transient => {
                        warn!("Transient error detaching {}: {}", id, e);
                        return PollResult::Continue(format!("transient error: {}", e));
                    }
                    ErrorClass::NotFound => {
                        debug!("Detach of {} found nothing to detach: {}", id, e);
                        self.issued = true;
                    }
                    _ => {
                        debug!("Detach of {} failed, checking membership: {}", id, e);
                        self.issued = true;
                        self.rejected = Some(e);
                    }
                },
            }
        }

        match self.membership.observe().await {
            PollResult::Continue(observed) => match self.rejected.take() {
                Some(e) => PollResult::Failed(EniError::from_provider(
                    attachment_entity(id),
                    "detach",
                    e,
                )),
                None => PollResult::Continue(observed),
            },
            other => other,
        }
    }
}
