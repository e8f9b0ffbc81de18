use async_trait::async_trait;
use eniflow::eniflow_cloud::{
    CreateInterfaceRequest, Instance, InterfaceFilter, InterfaceStatus, InterfaceType,
    InterfaceUpdate, NetworkInterface, NetworkProvider, PageRequest, PrivateIpAddress, Result,
};
use eniflow::{Reconciler, ReconcilerConfig};
use eniflow_cloud_memory::{MemoryConfig, MemoryProvider};
use std::sync::Arc;

pub const SUBNET: &str = "subnet-1";
pub const INSTANCE: &str = "i-001";

/// A memory provider with one subnet and one instance, plus a reconciler on top
pub struct TestCloud {
    pub provider: Arc<MemoryProvider>,
    pub reconciler: Reconciler<Arc<MemoryProvider>>,
}

impl TestCloud {
    pub fn new() -> Self {
        Self::with(MemoryConfig::default(), test_config())
    }

    #[allow(dead_code)]
    pub fn with_convergence_calls(convergence_calls: u64) -> Self {
        Self::with(MemoryConfig { convergence_calls }, test_config())
    }

    #[allow(dead_code)]
    pub fn with_page_size(page_size: u32) -> Self {
        Self::with(
            MemoryConfig::default(),
            ReconcilerConfig {
                page_size,
                ..test_config()
            },
        )
    }

    fn with(memory: MemoryConfig, config: ReconcilerConfig) -> Self {
        init_tracing();
        let provider = Arc::new(MemoryProvider::new(memory));
        provider.add_subnet(SUBNET, "vpc-1", "zone-a");
        provider.add_instance(Instance::new(INSTANCE));
        let reconciler = Reconciler::new(Arc::clone(&provider), config).unwrap();
        Self {
            provider,
            reconciler,
        }
    }
}

/// Short timeouts; tests run on a paused clock anyway
pub fn test_config() -> ReconcilerConfig {
    ReconcilerConfig {
        poll_interval_secs: 1,
        create_timeout_secs: 30,
        delete_timeout_secs: 60,
        attach_timeout_secs: 10,
        detach_timeout_secs: 60,
        page_size: 50,
    }
}

/// A converged interface as the provider would report it
#[allow(dead_code)]
pub fn interface(id: &str, ip: &str, instance_id: Option<&str>) -> NetworkInterface {
    NetworkInterface {
        id: id.to_string(),
        subnet_id: SUBNET.to_string(),
        vpc_id: "vpc-1".to_string(),
        zone_id: "zone-a".to_string(),
        security_group_ids: vec!["sg-1".to_string()],
        primary_ip_address: ip.to_string(),
        private_ips: vec![PrivateIpAddress::primary(ip)],
        associated_public_ip: None,
        name: None,
        description: None,
        client_token: None,
        status: if instance_id.is_some() {
            InterfaceStatus::InUse
        } else {
            InterfaceStatus::Available
        },
        interface_type: InterfaceType::Secondary,
        mac_address: None,
        instance_id: instance_id.map(str::to_string),
        creation_time: None,
    }
}

/// Wraps the memory provider to bend what it reports or does after a call
#[allow(dead_code)]
pub struct Hooked {
    pub inner: Arc<MemoryProvider>,
    /// Applied to every interface snapshot returned by describe
    pub rewrite_interface: fn(&mut NetworkInterface),
    /// Runs after every accepted attach call
    pub after_attach: fn(&MemoryProvider),
}

#[allow(dead_code)]
impl Hooked {
    pub fn new(inner: Arc<MemoryProvider>) -> Self {
        Self {
            inner,
            rewrite_interface: |_| {},
            after_attach: |_| {},
        }
    }
}

#[async_trait]
impl NetworkProvider for Hooked {
    fn name(&self) -> &str {
        "hooked"
    }

    async fn create_interface(&self, request: &CreateInterfaceRequest) -> Result<String> {
        self.inner.create_interface(request).await
    }

    async fn describe_interface(&self, interface_id: &str) -> Result<NetworkInterface> {
        let mut eni = self.inner.describe_interface(interface_id).await?;
        (self.rewrite_interface)(&mut eni);
        Ok(eni)
    }

    async fn modify_interface_attributes(
        &self,
        interface_id: &str,
        update: &InterfaceUpdate,
    ) -> Result<()> {
        self.inner.modify_interface_attributes(interface_id, update).await
    }

    async fn delete_interface(&self, interface_id: &str) -> Result<()> {
        self.inner.delete_interface(interface_id).await
    }

    async fn attach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()> {
        self.inner.attach_interface(interface_id, instance_id).await?;
        (self.after_attach)(&self.inner);
        Ok(())
    }

    async fn detach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()> {
        self.inner.detach_interface(interface_id, instance_id).await
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Instance> {
        self.inner.describe_instance(instance_id).await
    }

    async fn list_interfaces(
        &self,
        filter: &InterfaceFilter,
        page: PageRequest,
    ) -> Result<Vec<NetworkInterface>> {
        self.inner.list_interfaces(filter, page).await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
