//! In-memory provider implementation

use async_trait::async_trait;
use chrono::Utc;
use eniflow_cloud::{
    CreateInterfaceRequest, Instance, InterfaceFilter, InterfaceStatus, InterfaceType,
    InterfaceUpdate, NetworkInterface, NetworkProvider, PageRequest, PrivateIpAddress,
    ProviderError, Result,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Provider error codes emitted by the in-memory provider
pub mod codes {
    pub const ENI_NOT_FOUND: &str = "InvalidEniId.NotFound";
    pub const INSTANCE_NOT_FOUND: &str = "InvalidInstanceId.NotFound";
    pub const SUBNET_NOT_FOUND: &str = "InvalidVSwitchId.NotFound";
    pub const DETACH_PRIMARY: &str = "InvalidOperation.DetachPrimaryEniNotAllowed";
    pub const INVALID_ENI_TYPE: &str = "InvalidOperation.InvalidEniType";
    pub const INVALID_ENI_STATE: &str = "InvalidOperation.InvalidEniState";
    pub const INVALID_ECS_STATE: &str = "InvalidOperation.InvalidEcsState";
    pub const ENI_NOT_ATTACHED: &str = "InvalidOperation.EniNotAttached";
    pub const IP_IN_USE: &str = "InvalidPrivateIpAddress.Duplicated";
}

/// Provider operations, used for call counting and failure scripting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateInterface,
    DescribeInterface,
    ModifyInterfaceAttributes,
    DeleteInterface,
    AttachInterface,
    DetachInterface,
    DescribeInstance,
    ListInterfaces,
}

/// Behaviour knobs of a [`MemoryProvider`]
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Number of further calls before an accepted mutation becomes visible
    pub convergence_calls: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            convergence_calls: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct Subnet {
    vpc_id: String,
    zone_id: String,
}

#[derive(Debug, Clone)]
enum Transition {
    Created,
    Deleted,
    Attached(String),
    Detached(String),
}

#[derive(Debug, Clone)]
struct Pending {
    interface_id: String,
    transition: Transition,
    visible_at: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    clock: u64,
    next_id: u32,
    subnets: HashMap<String, Subnet>,
    interfaces: BTreeMap<String, NetworkInterface>,
    instances: BTreeMap<String, Instance>,
    client_tokens: HashMap<String, String>,
    pending: Vec<Pending>,
    failures: HashMap<Operation, VecDeque<ProviderError>>,
    stalled: HashSet<Operation>,
    calls: HashMap<Operation, u32>,
}

impl MemoryState {
    /// Count the call and advance the clock before any scripted failure
    fn record(&mut self, op: Operation) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        self.tick();
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => {
                tracing::debug!("Injected failure for {:?}: {}", op, err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Advance the call clock and apply every transition that became visible
    fn tick(&mut self) {
        self.clock += 1;
        let clock = self.clock;
        let (ready, waiting): (Vec<Pending>, Vec<Pending>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.visible_at <= clock);
        self.pending = waiting;

        for pending in ready {
            self.apply(pending);
        }
    }

    fn apply(&mut self, pending: Pending) {
        let id = pending.interface_id;
        match pending.transition {
            Transition::Created => {
                if let Some(eni) = self.interfaces.get_mut(&id) {
                    eni.status = InterfaceStatus::Available;
                }
            }
            Transition::Deleted => {
                self.interfaces.remove(&id);
                self.client_tokens.retain(|_, eni_id| eni_id != &id);
            }
            Transition::Attached(instance_id) => {
                if let Some(eni) = self.interfaces.get_mut(&id) {
                    eni.status = InterfaceStatus::InUse;
                    eni.instance_id = Some(instance_id.clone());
                }
                if let Some(instance) = self.instances.get_mut(&instance_id) {
                    if !instance.has_interface(&id) {
                        instance.network_interface_ids.push(id.clone());
                    }
                }
            }
            Transition::Detached(instance_id) => {
                if let Some(eni) = self.interfaces.get_mut(&id) {
                    eni.status = InterfaceStatus::Available;
                    eni.instance_id = None;
                }
                if let Some(instance) = self.instances.get_mut(&instance_id) {
                    instance.network_interface_ids.retain(|eni_id| eni_id != &id);
                }
            }
        }
    }

    fn schedule(&mut self, op: Operation, interface_id: &str, transition: Transition, lag: u64) {
        let visible_at = if self.stalled.contains(&op) {
            u64::MAX
        } else {
            self.clock + lag
        };
        self.pending.push(Pending {
            interface_id: interface_id.to_string(),
            transition,
            visible_at,
        });
    }

    fn has_pending(&self, interface_id: &str) -> bool {
        self.pending.iter().any(|p| p.interface_id == interface_id)
    }

    /// Whether an attach or detach on `instance_id` is still in flight
    fn instance_busy(&self, instance_id: &str) -> bool {
        self.pending.iter().any(|p| match &p.transition {
            Transition::Attached(id) | Transition::Detached(id) => id == instance_id,
            _ => false,
        })
    }

    fn interface(&self, interface_id: &str) -> Result<&NetworkInterface> {
        self.interfaces.get(interface_id).ok_or_else(|| {
            ProviderError::new(
                codes::ENI_NOT_FOUND,
                format!("The specified ENI {} does not exist.", interface_id),
            )
            .with_status(404)
        })
    }

    fn instance(&self, instance_id: &str) -> Result<&Instance> {
        self.instances.get(instance_id).ok_or_else(|| {
            ProviderError::new(
                codes::INSTANCE_NOT_FOUND,
                format!("The specified instance {} does not exist.", instance_id),
            )
            .with_status(404)
        })
    }
}

fn ecs_state_conflict(instance_id: &str) -> ProviderError {
    ProviderError::new(
        codes::INVALID_ECS_STATE,
        format!(
            "The instance {} is changing its network interfaces, try again later.",
            instance_id
        ),
    )
    .with_status(403)
}

fn eni_state_conflict(interface_id: &str, status: InterfaceStatus) -> ProviderError {
    ProviderError::new(
        codes::INVALID_ENI_STATE,
        format!(
            "The ENI {} is {} and does not support this operation.",
            interface_id, status
        ),
    )
    .with_status(403)
}

/// Eventually consistent in-memory provider
///
/// Accepted mutations (create, delete, attach, detach) only become visible
/// after [`MemoryConfig::convergence_calls`] further provider calls, mimicking
/// a control plane whose reads lag its writes. An instance with an attach or
/// detach in flight rejects further attach and detach calls with
/// [`codes::INVALID_ECS_STATE`].
pub struct MemoryProvider {
    config: MemoryConfig,
    state: Mutex<MemoryState>,
}

impl MemoryProvider {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a subnet that interfaces can be created in
    pub fn add_subnet(
        &self,
        subnet_id: impl Into<String>,
        vpc_id: impl Into<String>,
        zone_id: impl Into<String>,
    ) {
        self.state().subnets.insert(
            subnet_id.into(),
            Subnet {
                vpc_id: vpc_id.into(),
                zone_id: zone_id.into(),
            },
        );
    }

    /// Seed an instance
    pub fn add_instance(&self, instance: Instance) {
        self.state().instances.insert(instance.id.clone(), instance);
    }

    /// Seed an interface as if it had been created and converged already
    pub fn insert_interface(&self, eni: NetworkInterface) {
        let mut state = self.state();
        if let Some(instance_id) = eni.instance_id.clone() {
            if let Some(instance) = state.instances.get_mut(&instance_id) {
                if !instance.has_interface(&eni.id) {
                    instance.network_interface_ids.push(eni.id.clone());
                }
            }
        }
        state.interfaces.insert(eni.id.clone(), eni);
    }

    /// Remove an instance, e.g. to simulate its termination
    pub fn remove_instance(&self, instance_id: &str) -> Option<Instance> {
        self.state().instances.remove(instance_id)
    }

    /// Fail the next call of `op` with `err`. Failures queue up in order.
    pub fn fail_next(&self, op: Operation, err: ProviderError) {
        self.state().failures.entry(op).or_default().push_back(err);
    }

    /// Accept calls of `op` but never make their effect visible
    pub fn stall(&self, op: Operation) {
        self.state().stalled.insert(op);
    }

    /// Number of calls of `op` received so far, failed ones included
    pub fn calls(&self, op: Operation) -> u32 {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Current stored interface, without advancing the read clock
    pub fn peek_interface(&self, interface_id: &str) -> Option<NetworkInterface> {
        self.state().interfaces.get(interface_id).cloned()
    }

    /// Current stored instance, without advancing the read clock
    pub fn peek_instance(&self, instance_id: &str) -> Option<Instance> {
        self.state().instances.get(instance_id).cloned()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

#[async_trait]
impl NetworkProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_interface(&self, request: &CreateInterfaceRequest) -> Result<String> {
        let mut state = self.state();
        state.record(Operation::CreateInterface)?;

        if let Some(token) = &request.client_token {
            if let Some(existing) = state.client_tokens.get(token) {
                tracing::debug!("Client token {} already used by {}", token, existing);
                return Ok(existing.clone());
            }
        }

        let subnet = state.subnets.get(&request.subnet_id).cloned().ok_or_else(|| {
            ProviderError::new(
                codes::SUBNET_NOT_FOUND,
                format!("The specified vswitch {} does not exist.", request.subnet_id),
            )
            .with_status(400)
        })?;

        state.next_id += 1;
        let n = state.next_id;
        let id = format!("eni-{:03}", n);
        let primary_ip = request
            .primary_ip_address
            .clone()
            .unwrap_or_else(|| format!("10.0.{}.{}", n / 250, n % 250 + 2));

        if state
            .interfaces
            .values()
            .any(|eni| eni.subnet_id == request.subnet_id && eni.primary_ip_address == primary_ip)
        {
            return Err(ProviderError::new(
                codes::IP_IN_USE,
                format!("The private address {} is already in use.", primary_ip),
            )
            .with_status(400));
        }

        let eni = NetworkInterface {
            id: id.clone(),
            subnet_id: request.subnet_id.clone(),
            vpc_id: subnet.vpc_id,
            zone_id: subnet.zone_id,
            security_group_ids: vec![request.security_group_id.clone()],
            primary_ip_address: primary_ip.clone(),
            private_ips: vec![PrivateIpAddress::primary(primary_ip)],
            associated_public_ip: None,
            name: request.name.clone(),
            description: request.description.clone(),
            client_token: request.client_token.clone(),
            status: InterfaceStatus::Creating,
            interface_type: InterfaceType::Secondary,
            mac_address: Some(format!("00:16:3e:00:{:02x}:{:02x}", n / 256, n % 256)),
            instance_id: None,
            creation_time: Some(Utc::now()),
        };

        state.interfaces.insert(id.clone(), eni);
        if let Some(token) = &request.client_token {
            state.client_tokens.insert(token.clone(), id.clone());
        }
        let lag = self.config.convergence_calls;
        state.schedule(Operation::CreateInterface, &id, Transition::Created, lag);

        Ok(id)
    }

    async fn describe_interface(&self, interface_id: &str) -> Result<NetworkInterface> {
        let mut state = self.state();
        state.record(Operation::DescribeInterface)?;
        state.interface(interface_id).cloned()
    }

    async fn modify_interface_attributes(
        &self,
        interface_id: &str,
        update: &InterfaceUpdate,
    ) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::ModifyInterfaceAttributes)?;

        let status = state.interface(interface_id)?.status;
        if matches!(status, InterfaceStatus::Creating | InterfaceStatus::Deleting) {
            return Err(eni_state_conflict(interface_id, status));
        }

        if let Some(eni) = state.interfaces.get_mut(interface_id) {
            if let Some(name) = &update.name {
                eni.name = Some(name.clone());
            }
            if let Some(description) = &update.description {
                eni.description = Some(description.clone());
            }
            if let Some(security_group_ids) = &update.security_group_ids {
                eni.security_group_ids = security_group_ids.clone();
            }
        }
        Ok(())
    }

    async fn delete_interface(&self, interface_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::DeleteInterface)?;

        let eni = state.interface(interface_id)?;
        if eni.interface_type == InterfaceType::Primary {
            return Err(ProviderError::new(
                codes::INVALID_ENI_TYPE,
                format!("The primary ENI {} cannot be deleted.", interface_id),
            )
            .with_status(403));
        }
        match eni.status {
            InterfaceStatus::Deleting => return Ok(()),
            InterfaceStatus::Available if !state.has_pending(interface_id) => {}
            status => return Err(eni_state_conflict(interface_id, status)),
        }

        if let Some(eni) = state.interfaces.get_mut(interface_id) {
            eni.status = InterfaceStatus::Deleting;
        }
        let lag = self.config.convergence_calls;
        state.schedule(Operation::DeleteInterface, interface_id, Transition::Deleted, lag);
        Ok(())
    }

    async fn attach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::AttachInterface)?;

        let status = state.interface(interface_id)?.status;
        state.instance(instance_id)?;
        if status != InterfaceStatus::Available || state.has_pending(interface_id) {
            return Err(eni_state_conflict(interface_id, status));
        }
        if state.instance_busy(instance_id) {
            return Err(ecs_state_conflict(instance_id));
        }

        let lag = self.config.convergence_calls;
        state.schedule(
            Operation::AttachInterface,
            interface_id,
            Transition::Attached(instance_id.to_string()),
            lag,
        );
        Ok(())
    }

    async fn detach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()> {
        let mut state = self.state();
        state.record(Operation::DetachInterface)?;

        let eni = state.interface(interface_id)?.clone();
        state.instance(instance_id)?;

        if eni.interface_type == InterfaceType::Primary {
            return Err(ProviderError::new(
                codes::DETACH_PRIMARY,
                format!("The primary ENI {} cannot be detached.", interface_id),
            )
            .with_status(403));
        }
        if !eni.is_attached_to(instance_id) {
            return Err(ProviderError::new(
                codes::ENI_NOT_ATTACHED,
                format!(
                    "The ENI {} is not attached to instance {}.",
                    interface_id, instance_id
                ),
            )
            .with_status(403));
        }
        if state.has_pending(interface_id) {
            return Err(eni_state_conflict(interface_id, eni.status));
        }
        if state.instance_busy(instance_id) {
            return Err(ecs_state_conflict(instance_id));
        }

        let lag = self.config.convergence_calls;
        state.schedule(
            Operation::DetachInterface,
            interface_id,
            Transition::Detached(instance_id.to_string()),
            lag,
        );
        Ok(())
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Instance> {
        let mut state = self.state();
        state.record(Operation::DescribeInstance)?;
        state.instance(instance_id).cloned()
    }

    async fn list_interfaces(
        &self,
        filter: &InterfaceFilter,
        page: PageRequest,
    ) -> Result<Vec<NetworkInterface>> {
        let mut state = self.state();
        state.record(Operation::ListInterfaces)?;

        Ok(state
            .interfaces
            .values()
            .filter(|eni| filter.matches(eni))
            .skip(page.offset())
            .take(page.size as usize)
            .cloned()
            .collect())
    }
}
