//! Lifecycle reconciler

use crate::config::ReconcilerConfig;
use crate::error::Result;
use crate::poller::Poller;
use eniflow_cloud::NetworkProvider;

/// Drives network interfaces and their attachments to a target state
///
/// Holds no state of its own beyond the provider handle and its timing
/// settings; every operation starts from a fresh provider read. Operations
/// are idempotent, so a caller that got a [`crate::EniError::Timeout`] can
/// simply invoke the same operation again.
///
/// Interface operations live in [`crate::interface`], attachment
/// operations in [`crate::attachment`].
pub struct Reconciler<P> {
    pub(crate) provider: P,
    pub(crate) config: ReconcilerConfig,
    pub(crate) poller: Poller,
}

impl<P: NetworkProvider> Reconciler<P> {
    pub fn new(provider: P, config: ReconcilerConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Reconciler for provider '{}' polling every {}s",
            provider.name(),
            config.poll_interval_secs
        );
        Ok(Self {
            poller: Poller::new(config.poll_interval()),
            provider,
            config,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Display name of an interface in logs and errors
pub(crate) fn interface_entity(interface_id: &str) -> String {
    format!("network interface {}", interface_id)
}

/// Display name of an instance in logs and errors
pub(crate) fn instance_entity(instance_id: &str) -> String {
    format!("instance {}", instance_id)
}
