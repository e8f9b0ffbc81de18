//! Interface create/read/update/delete against the memory provider

mod common;

use common::{Hooked, SUBNET, TestCloud, interface, test_config};
use eniflow::{EniError, Reconciler};
use eniflow::eniflow_cloud::{
    ConflictCode, CreateInterfaceRequest, InterfaceStatus, InterfaceType, InterfaceUpdate,
    NetworkInterface, ProviderError,
};
use eniflow_cloud_memory::{Operation, codes};
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn test_create_waits_until_available() -> anyhow::Result<()> {
    let cloud = TestCloud::with_convergence_calls(3);

    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await?;

    assert_eq!(eni.id, "eni-001");
    assert_eq!(eni.status, InterfaceStatus::Available);
    assert_eq!(eni.vpc_id, "vpc-1");
    // Creating, Creating, Available
    assert_eq!(cloud.provider.calls(Operation::DescribeInterface), 3);
    assert_eq!(cloud.provider.calls(Operation::CreateInterface), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_create_omits_blank_fields() -> anyhow::Result<()> {
    let cloud = TestCloud::new();

    let request = CreateInterfaceRequest::new(SUBNET, "sg-1")
        .with_name("web")
        .with_description("   ")
        .with_primary_ip_address("");
    let eni = cloud.reconciler.create_interface(&request).await?;

    assert_eq!(eni.name.as_deref(), Some("web"));
    assert_eq!(eni.description, None);
    assert!(!eni.primary_ip_address.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_create_is_not_retried() {
    let cloud = TestCloud::new();
    cloud.provider.fail_next(
        Operation::CreateInterface,
        ProviderError::new("ServiceUnavailable", "try again").with_status(503),
    );

    let err = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, EniError::Transient { .. }));
    assert_eq!(cloud.provider.calls(Operation::CreateInterface), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_in_unknown_subnet_is_fatal() {
    let cloud = TestCloud::new();

    let err = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new("subnet-404", "sg-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, EniError::Fatal { .. }));
    assert!(err.to_string().contains("subnet-404"));
}

#[tokio::test(start_paused = true)]
async fn test_create_times_out_while_creating() {
    let cloud = TestCloud::new();
    cloud.provider.stall(Operation::CreateInterface);

    let err = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await
        .unwrap_err();

    match err {
        EniError::Timeout {
            entity,
            last_observed,
            ..
        } => {
            assert_eq!(entity, "network interface eni-001");
            assert!(last_observed.contains("Creating"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    // Nothing is rolled back
    assert!(cloud.provider.peek_interface("eni-001").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_create_poll_survives_transient_reads() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    cloud.provider.fail_next(
        Operation::DescribeInterface,
        ProviderError::new("Throttling", "slow down"),
    );

    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await?;

    assert_eq!(eni.status, InterfaceStatus::Available);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_create_fails_when_interface_turns_deleting() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let reconciler = Reconciler::new(
        Hooked {
            rewrite_interface: |eni: &mut NetworkInterface| eni.status = InterfaceStatus::Deleting,
            ..Hooked::new(Arc::clone(&cloud.provider))
        },
        test_config(),
    )?;

    let err = reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await
        .unwrap_err();

    match err {
        EniError::UnexpectedState {
            expected, observed, ..
        } => {
            assert_eq!(expected, InterfaceStatus::Available);
            assert_eq!(observed, InterfaceStatus::Deleting);
        }
        other => panic!("expected unexpected state, got {:?}", other),
    }
    assert_eq!(cloud.provider.calls(Operation::DescribeInterface), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_read_missing_interface_is_none() -> anyhow::Result<()> {
    let cloud = TestCloud::new();

    assert!(cloud.reconciler.read_interface("eni-404").await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_read_rejects_inconsistent_snapshot() {
    let cloud = TestCloud::new();
    let mut eni = interface("eni-100", "10.0.0.100", None);
    eni.status = InterfaceStatus::InUse;
    cloud.provider.insert_interface(eni);

    let err = cloud.reconciler.read_interface("eni-100").await.unwrap_err();

    assert!(matches!(err, EniError::Invariant(_)));
}

#[tokio::test(start_paused = true)]
async fn test_update_without_changes_sends_nothing() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1").with_name("web"))
        .await?;

    let desired = InterfaceUpdate {
        name: Some("web".to_string()),
        security_group_ids: Some(vec!["sg-1".to_string()]),
        ..Default::default()
    };
    let updated = cloud.reconciler.update_interface(&eni, &desired).await?;

    assert_eq!(updated, eni);
    assert_eq!(cloud.provider.calls(Operation::ModifyInterfaceAttributes), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_update_applies_changed_fields() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1").with_name("web"))
        .await?;

    let desired = InterfaceUpdate {
        name: Some("web".to_string()),
        description: Some("frontend".to_string()),
        security_group_ids: Some(vec!["sg-1".to_string(), "sg-2".to_string()]),
    };
    let updated = cloud.reconciler.update_interface(&eni, &desired).await?;

    assert_eq!(updated.description.as_deref(), Some("frontend"));
    assert_eq!(updated.security_group_ids, vec!["sg-1", "sg-2"]);
    assert_eq!(cloud.provider.calls(Operation::ModifyInterfaceAttributes), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_update_conflict_is_not_retried() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await?;
    cloud.provider.fail_next(
        Operation::ModifyInterfaceAttributes,
        ProviderError::new(codes::INVALID_ENI_STATE, "ENI is attaching").with_status(403),
    );

    let desired = InterfaceUpdate {
        name: Some("db".to_string()),
        ..Default::default()
    };
    let err = cloud
        .reconciler
        .update_interface(&eni, &desired)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EniError::Conflict {
            code: ConflictCode::InvalidEniState,
            operation: "modify",
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(cloud.provider.calls(Operation::ModifyInterfaceAttributes), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_retries_allowlisted_conflicts() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await?;
    for _ in 0..2 {
        cloud.provider.fail_next(
            Operation::DeleteInterface,
            ProviderError::new(codes::DETACH_PRIMARY, "still detaching").with_status(403),
        );
    }

    cloud.reconciler.delete_interface(&eni.id).await?;

    assert_eq!(cloud.provider.calls(Operation::DeleteInterface), 3);
    assert!(cloud.reconciler.read_interface(&eni.id).await?.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_retries_transient_errors() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await?;
    cloud.provider.fail_next(
        Operation::DeleteInterface,
        ProviderError::new("ServiceUnavailable", "try again").with_status(503),
    );

    cloud.reconciler.delete_interface(&eni.id).await?;

    assert_eq!(cloud.provider.calls(Operation::DeleteInterface), 2);
    assert!(cloud.provider.peek_interface(&eni.id).is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_missing_interface_succeeds() -> anyhow::Result<()> {
    let cloud = TestCloud::new();

    cloud.reconciler.delete_interface("eni-404").await?;

    assert_eq!(cloud.provider.calls(Operation::DeleteInterface), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_twice_succeeds() -> anyhow::Result<()> {
    let cloud = TestCloud::new();
    let eni = cloud
        .reconciler
        .create_interface(&CreateInterfaceRequest::new(SUBNET, "sg-1"))
        .await?;

    cloud.reconciler.delete_interface(&eni.id).await?;
    cloud.reconciler.delete_interface(&eni.id).await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_primary_interface_times_out() {
    let cloud = TestCloud::new();
    let mut eni = interface("eni-100", "10.0.0.100", Some(common::INSTANCE));
    eni.interface_type = InterfaceType::Primary;
    cloud.provider.insert_interface(eni);

    let err = cloud.reconciler.delete_interface("eni-100").await.unwrap_err();

    match &err {
        EniError::Timeout { last_observed, .. } => {
            assert!(last_observed.contains(codes::INVALID_ENI_TYPE));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_delete_fatal_error_is_not_retried() {
    let cloud = TestCloud::new();
    cloud.provider.insert_interface(interface("eni-100", "10.0.0.100", None));
    cloud.provider.fail_next(
        Operation::DeleteInterface,
        ProviderError::new("Forbidden.RAM", "not allowed").with_status(403),
    );

    let err = cloud.reconciler.delete_interface("eni-100").await.unwrap_err();

    assert!(matches!(err, EniError::Fatal { .. }));
    assert_eq!(cloud.provider.calls(Operation::DeleteInterface), 1);
    assert!(cloud.provider.peek_interface("eni-100").is_some());
}
