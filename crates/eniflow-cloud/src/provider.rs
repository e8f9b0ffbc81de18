//! Network provider trait definition

use crate::error::Result;
use crate::model::{Instance, InterfaceType, NetworkInterface};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Network interface provider abstraction
///
/// Each method is exactly one request/response call against the provider's
/// control plane. Implementations must not retry or poll; mutating calls
/// return as soon as the provider has accepted the request, which may be
/// well before the change is visible to `describe_*`.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// Returns the provider name (e.g., "aliyun-ecs", "memory")
    fn name(&self) -> &str;

    /// Create an interface and return its provider-assigned id
    async fn create_interface(&self, request: &CreateInterfaceRequest) -> Result<String>;

    /// Describe one interface; fails with a NotFound-class error if unknown
    async fn describe_interface(&self, interface_id: &str) -> Result<NetworkInterface>;

    /// Modify the mutable attributes present in `update`
    async fn modify_interface_attributes(
        &self,
        interface_id: &str,
        update: &InterfaceUpdate,
    ) -> Result<()>;

    async fn delete_interface(&self, interface_id: &str) -> Result<()>;

    async fn attach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()>;

    async fn detach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()>;

    /// Describe one instance; fails with a NotFound-class error if unknown
    async fn describe_instance(&self, instance_id: &str) -> Result<Instance>;

    /// Fetch one page of interfaces matching `filter`
    ///
    /// A page shorter than `page.size` is the last one.
    async fn list_interfaces(
        &self,
        filter: &InterfaceFilter,
        page: PageRequest,
    ) -> Result<Vec<NetworkInterface>>;
}

#[async_trait]
impl<P: NetworkProvider + ?Sized> NetworkProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn create_interface(&self, request: &CreateInterfaceRequest) -> Result<String> {
        (**self).create_interface(request).await
    }

    async fn describe_interface(&self, interface_id: &str) -> Result<NetworkInterface> {
        (**self).describe_interface(interface_id).await
    }

    async fn modify_interface_attributes(
        &self,
        interface_id: &str,
        update: &InterfaceUpdate,
    ) -> Result<()> {
        (**self)
            .modify_interface_attributes(interface_id, update)
            .await
    }

    async fn delete_interface(&self, interface_id: &str) -> Result<()> {
        (**self).delete_interface(interface_id).await
    }

    async fn attach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()> {
        (**self).attach_interface(interface_id, instance_id).await
    }

    async fn detach_interface(&self, interface_id: &str, instance_id: &str) -> Result<()> {
        (**self).detach_interface(interface_id, instance_id).await
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Instance> {
        (**self).describe_instance(instance_id).await
    }

    async fn list_interfaces(
        &self,
        filter: &InterfaceFilter,
        page: PageRequest,
    ) -> Result<Vec<NetworkInterface>> {
        (**self).list_interfaces(filter, page).await
    }
}

/// Parameters of a create call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInterfaceRequest {
    pub subnet_id: String,
    pub security_group_id: String,
    #[serde(default)]
    pub primary_ip_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Lets the provider de-duplicate a repeated create
    #[serde(default)]
    pub client_token: Option<String>,
}

impl CreateInterfaceRequest {
    pub fn new(subnet_id: impl Into<String>, security_group_id: impl Into<String>) -> Self {
        Self {
            subnet_id: subnet_id.into(),
            security_group_id: security_group_id.into(),
            ..Default::default()
        }
    }

    pub fn with_primary_ip_address(mut self, address: impl Into<String>) -> Self {
        self.primary_ip_address = Some(address.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_client_token(mut self, token: impl Into<String>) -> Self {
        self.client_token = Some(token.into());
        self
    }

    /// Copy of the request with blank optional fields removed
    pub fn normalized(&self) -> Self {
        Self {
            subnet_id: self.subnet_id.trim().to_string(),
            security_group_id: self.security_group_id.trim().to_string(),
            primary_ip_address: non_blank(&self.primary_ip_address),
            name: non_blank(&self.name),
            description: non_blank(&self.description),
            client_token: non_blank(&self.client_token),
        }
    }
}

/// A partial attribute update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub security_group_ids: Option<Vec<String>>,
}

impl InterfaceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.security_group_ids.is_none()
    }

    /// Keep only the fields that differ from `observed`
    pub fn diff_against(&self, observed: &NetworkInterface) -> Self {
        Self {
            name: self
                .name
                .clone()
                .filter(|name| observed.name.as_deref().unwrap_or_default() != name.as_str()),
            description: self.description.clone().filter(|description| {
                observed.description.as_deref().unwrap_or_default() != description.as_str()
            }),
            security_group_ids: self
                .security_group_ids
                .clone()
                .filter(|ids| ids != &observed.security_group_ids),
        }
    }

    /// Names of the fields carried by this update, for logging
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.security_group_ids.is_some() {
            fields.push("security_group_ids");
        }
        fields
    }
}

/// Listing filter; unset fields do not constrain the result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceFilter {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub primary_ip_address: Option<String>,
    #[serde(default)]
    pub security_group_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub interface_type: Option<InterfaceType>,
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl InterfaceFilter {
    /// Copy with every string trimmed and blank values unset
    pub fn normalized(&self) -> Self {
        Self {
            ids: self
                .ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            vpc_id: non_blank(&self.vpc_id),
            subnet_id: non_blank(&self.subnet_id),
            primary_ip_address: non_blank(&self.primary_ip_address),
            security_group_id: non_blank(&self.security_group_id),
            name: non_blank(&self.name),
            interface_type: self.interface_type,
            instance_id: non_blank(&self.instance_id),
        }
    }

    /// Whether `eni` satisfies every set field
    pub fn matches(&self, eni: &NetworkInterface) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map(|f| f == value).unwrap_or(true)
        }

        (self.ids.is_empty() || self.ids.iter().any(|id| id == &eni.id))
            && eq(&self.vpc_id, &eni.vpc_id)
            && eq(&self.subnet_id, &eni.subnet_id)
            && eq(&self.primary_ip_address, &eni.primary_ip_address)
            && self
                .security_group_id
                .as_ref()
                .map(|sg| eni.security_group_ids.contains(sg))
                .unwrap_or(true)
            && eq(&self.name, eni.name.as_deref().unwrap_or_default())
            && self
                .interface_type
                .map(|t| t == eni.interface_type)
                .unwrap_or(true)
            && eq(&self.instance_id, eni.instance_id.as_deref().unwrap_or_default())
    }
}

/// Page cursor for [`NetworkProvider::list_interfaces`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn first(size: u32) -> Self {
        Self { number: 1, size }
    }

    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            size: self.size,
        }
    }

    /// Number of entries that precede this page
    pub fn offset(&self) -> usize {
        (self.number.saturating_sub(1) as usize) * self.size as usize
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
