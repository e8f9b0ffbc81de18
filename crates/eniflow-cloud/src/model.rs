//! Typed snapshots of provider entities
//!
//! Every value here is a cache of the last provider read. Nothing in this
//! module talks to the provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the two halves of an [`AttachmentId`]
pub const ATTACHMENT_ID_SEPARATOR: char = ':';

/// Lifecycle status of a network interface as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceStatus {
    /// Create accepted, not yet usable
    Creating,
    /// Exists and is not attached
    Available,
    /// Attached to an instance
    InUse,
    /// Delete accepted, not yet gone
    Deleting,
}

impl std::fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceStatus::Creating => write!(f, "Creating"),
            InterfaceStatus::Available => write!(f, "Available"),
            InterfaceStatus::InUse => write!(f, "InUse"),
            InterfaceStatus::Deleting => write!(f, "Deleting"),
        }
    }
}

/// Whether the interface is an instance's built-in interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceType {
    Primary,
    #[default]
    Secondary,
}

impl std::fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceType::Primary => write!(f, "Primary"),
            InterfaceType::Secondary => write!(f, "Secondary"),
        }
    }
}

/// A public address associated with a private one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIp {
    pub allocation_id: String,
    pub public_ip_address: String,
}

/// One private address of an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateIpAddress {
    pub private_ip_address: String,
    pub primary: bool,
    #[serde(default)]
    pub associated_public_ip: Option<PublicIp>,
}

impl PrivateIpAddress {
    pub fn primary(address: impl Into<String>) -> Self {
        Self {
            private_ip_address: address.into(),
            primary: true,
            associated_public_ip: None,
        }
    }

    pub fn secondary(address: impl Into<String>) -> Self {
        Self {
            private_ip_address: address.into(),
            primary: false,
            associated_public_ip: None,
        }
    }

    pub fn with_public_ip(mut self, public_ip: PublicIp) -> Self {
        self.associated_public_ip = Some(public_ip);
        self
    }
}

/// Snapshot of a network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Provider-assigned id
    pub id: String,

    /// Subnet (vswitch) the interface lives in
    pub subnet_id: String,

    pub vpc_id: String,

    pub zone_id: String,

    /// Ordered security group ids
    pub security_group_ids: Vec<String>,

    /// Primary private address, fixed at creation
    pub primary_ip_address: String,

    /// All private addresses, primary included
    pub private_ips: Vec<PrivateIpAddress>,

    /// Public address associated with the primary private address
    #[serde(default)]
    pub associated_public_ip: Option<PublicIp>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Idempotency token supplied at creation
    #[serde(default)]
    pub client_token: Option<String>,

    pub status: InterfaceStatus,

    #[serde(default)]
    pub interface_type: InterfaceType,

    #[serde(default)]
    pub mac_address: Option<String>,

    /// Instance the interface is attached to; set iff status is InUse
    #[serde(default)]
    pub instance_id: Option<String>,

    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

impl NetworkInterface {
    /// Private addresses other than the primary one
    pub fn secondary_ips(&self) -> impl Iterator<Item = &PrivateIpAddress> {
        self.private_ips.iter().filter(|ip| !ip.primary)
    }

    pub fn is_attached_to(&self, instance_id: &str) -> bool {
        self.status == InterfaceStatus::InUse && self.instance_id.as_deref() == Some(instance_id)
    }

    /// Verify the structural invariants of a snapshot
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantViolation> {
        let primaries: Vec<&PrivateIpAddress> =
            self.private_ips.iter().filter(|ip| ip.primary).collect();

        if primaries.len() != 1 {
            return Err(InvariantViolation::PrimaryAddressCount {
                interface_id: self.id.clone(),
                count: primaries.len(),
            });
        }
        if primaries[0].private_ip_address != self.primary_ip_address {
            return Err(InvariantViolation::PrimaryAddressMismatch {
                interface_id: self.id.clone(),
                listed: primaries[0].private_ip_address.clone(),
                primary: self.primary_ip_address.clone(),
            });
        }

        let attached = self
            .instance_id
            .as_deref()
            .map(|id| !id.is_empty())
            .unwrap_or(false);
        match (self.status, attached) {
            (InterfaceStatus::InUse, false) => Err(InvariantViolation::InUseWithoutInstance {
                interface_id: self.id.clone(),
            }),
            (status, true) if status != InterfaceStatus::InUse => {
                Err(InvariantViolation::InstanceWithoutInUse {
                    interface_id: self.id.clone(),
                    status,
                })
            }
            _ => Ok(()),
        }
    }
}

/// A snapshot that cannot be a faithful provider read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("interface {interface_id} has {count} primary addresses, expected exactly one")]
    PrimaryAddressCount { interface_id: String, count: usize },

    #[error(
        "interface {interface_id} lists {listed} as primary but reports primary address {primary}"
    )]
    PrimaryAddressMismatch {
        interface_id: String,
        listed: String,
        primary: String,
    },

    #[error("interface {interface_id} is InUse but has no attached instance")]
    InUseWithoutInstance { interface_id: String },

    #[error("interface {interface_id} is {status} but reports an attached instance")]
    InstanceWithoutInUse {
        interface_id: String,
        status: InterfaceStatus,
    },
}

/// Snapshot of an instance, reduced to its interface membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    /// Ids of every interface currently attached, primary included
    pub network_interface_ids: Vec<String>,
}

impl Instance {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network_interface_ids: Vec::new(),
        }
    }

    pub fn has_interface(&self, interface_id: &str) -> bool {
        self.network_interface_ids.iter().any(|id| id == interface_id)
    }
}

/// Composite identity of an attachment: `<interface-id>:<instance-id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttachmentId {
    pub interface_id: String,
    pub instance_id: String,
}

impl AttachmentId {
    pub fn new(interface_id: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            interface_id: interface_id.into().trim().to_string(),
            instance_id: instance_id.into().trim().to_string(),
        }
    }

    /// Like [`AttachmentId::new`], but only for parts that survive a
    /// format/parse round trip: non-empty and free of the separator
    pub fn try_new(
        interface_id: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> std::result::Result<Self, InvalidAttachmentId> {
        let id = Self::new(interface_id, instance_id);
        let valid = |part: &str| !part.is_empty() && !part.contains(ATTACHMENT_ID_SEPARATOR);
        if valid(&id.interface_id) && valid(&id.instance_id) {
            Ok(id)
        } else {
            Err(InvalidAttachmentId(id.to_string()))
        }
    }
}

impl std::fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.interface_id, ATTACHMENT_ID_SEPARATOR, self.instance_id
        )
    }
}

impl std::str::FromStr for AttachmentId {
    type Err = InvalidAttachmentId;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(ATTACHMENT_ID_SEPARATOR) {
            Some((interface_id, instance_id)) => Self::try_new(interface_id, instance_id)
                .map_err(|_| InvalidAttachmentId(s.to_string())),
            None => Err(InvalidAttachmentId(s.to_string())),
        }
    }
}

impl TryFrom<String> for AttachmentId {
    type Error = InvalidAttachmentId;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AttachmentId> for String {
    fn from(id: AttachmentId) -> Self {
        id.to_string()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid attachment id '{0}', expected '<interface-id>:<instance-id>'")]
pub struct InvalidAttachmentId(pub String);

/// An interface plugged into an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
}

impl Attachment {
    pub fn interface_id(&self) -> &str {
        &self.id.interface_id
    }

    pub fn instance_id(&self) -> &str {
        &self.id.instance_id
    }
}
