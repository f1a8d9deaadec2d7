//! 单主机失败、补偿与请求超时

mod common;

use std::time::Duration;

use common::*;
use modulehost::{
    ContextParams, StoreError, TransferError, TransferHostToInnerModule, codes, report,
};
use tokio_util::sync::CancellationToken;

fn to_idle(host_ids: Vec<i64>) -> TransferHostToInnerModule {
    TransferHostToInnerModule {
        business_id: BIZ_A,
        module_id: IDLE_A,
        host_ids,
    }
}

async fn three_hosts() -> anyhow::Result<Fixture> {
    let fx = Fixture::new().await?;
    fx.seed(&[(BIZ_A, 101, M1), (BIZ_A, 102, M1), (BIZ_A, 103, M1)])
        .await?;
    Ok(fx)
}

#[tokio::test]
async fn test_middle_host_insert_failure() -> anyhow::Result<()> {
    let mut fx = three_hosts().await?;
    fx.faulty.fail_inserts(102, InsertFault::Reject, 1);

    let err = fx
        .service
        .transfer_host_to_inner_module(&ContextParams::new(OWNER), &to_idle(vec![101, 102, 103]))
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Aggregate { total: 3, .. }));
    assert_eq!(err.code(), codes::TRANSFER_HOST_MODULE_FAILED);
    let exceptions = err.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].host_id, 102);
    assert_eq!(exceptions[0].code, codes::DB_INSERT_FAILED);

    assert_eq!(fx.modules_of(BIZ_A, 101).await?, vec![IDLE_A]);
    assert_eq!(fx.modules_of(BIZ_A, 102).await?, vec![M1]);
    assert_eq!(fx.modules_of(BIZ_A, 103).await?, vec![IDLE_A]);

    let hosts: Vec<i64> = fx.drain_events().iter().map(|e| e.host_id).collect();
    assert_eq!(hosts, vec![101, 103]);
    Ok(())
}

#[tokio::test]
async fn test_exceptions_keep_input_order() -> anyhow::Result<()> {
    let fx = three_hosts().await?;
    fx.faulty.fail_inserts(103, InsertFault::Reject, 1);
    fx.faulty.fail_inserts(101, InsertFault::Reject, 1);

    let err = fx
        .service
        .transfer_host_to_inner_module(&ContextParams::new(OWNER), &to_idle(vec![103, 102, 101]))
        .await
        .unwrap_err();

    let hosts: Vec<i64> = err.exceptions().iter().map(|e| e.host_id).collect();
    assert_eq!(hosts, vec![103, 101]);

    let report = err.into_report();
    assert_eq!(report.exceptions.len(), 2);
    assert_eq!(
        report.error.map(|e| e.code),
        Some(codes::TRANSFER_HOST_MODULE_FAILED)
    );
    Ok(())
}

#[tokio::test]
async fn test_partial_insert_is_rolled_back() -> anyhow::Result<()> {
    let fx = three_hosts().await?;
    fx.faulty.fail_inserts(102, InsertFault::AfterWrite, 1);

    let err = fx
        .service
        .transfer_host_to_inner_module(&ContextParams::new(OWNER), &to_idle(vec![102]))
        .await
        .unwrap_err();

    assert_eq!(err.exceptions()[0].code, codes::DB_INSERT_FAILED);
    assert_eq!(fx.modules_of(BIZ_A, 102).await?, vec![M1]);
    Ok(())
}

#[tokio::test]
async fn test_delete_failure_restores_prior_set() -> anyhow::Result<()> {
    let mut fx = three_hosts().await?;
    fx.faulty.fail_deletes(102, 1);

    let err = fx
        .service
        .transfer_host_to_inner_module(&ContextParams::new(OWNER), &to_idle(vec![102]))
        .await
        .unwrap_err();

    let exception = &err.exceptions()[0];
    assert_eq!(exception.code, codes::DB_DELETE_FAILED);
    assert!(!exception.message.contains("compensation"));
    assert_eq!(fx.modules_of(BIZ_A, 102).await?, vec![M1]);
    assert!(fx.drain_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_compensation_is_reported() -> anyhow::Result<()> {
    let fx = three_hosts().await?;
    fx.faulty.fail_deletes(102, 2);

    let ctx = ContextParams::new(OWNER);
    let transfer = fx
        .service
        .new_host_module_transfer(&ctx, BIZ_A, &[IDLE_A], false);
    let err = transfer.transfer(102).await.unwrap_err();

    assert!(matches!(
        err,
        TransferError::Store(StoreError::CompensationFailed { .. })
    ));
    assert_eq!(err.code(), codes::DB_DELETE_FAILED);
    assert!(err.to_string().contains("compensation failed"));
    // 两次删除都失败，主机同时保留新旧关系，不会没有任何关系
    assert_eq!(fx.modules_of(BIZ_A, 102).await?, vec![IDLE_A, M1]);
    Ok(())
}

#[tokio::test]
async fn test_retry_after_failure_converges() -> anyhow::Result<()> {
    let fx = three_hosts().await?;
    fx.faulty.fail_deletes(102, 2);
    let ctx = ContextParams::new(OWNER);

    let _ = fx
        .service
        .transfer_host_to_inner_module(&ctx, &to_idle(vec![102]))
        .await;
    fx.service
        .transfer_host_to_inner_module(&ctx, &to_idle(vec![102]))
        .await?;
    assert_eq!(fx.modules_of(BIZ_A, 102).await?, vec![IDLE_A]);
    Ok(())
}

#[tokio::test]
async fn test_deadline_fails_host_without_writes() -> anyhow::Result<()> {
    let fx = three_hosts().await?;
    fx.faulty.delay_reads(Duration::from_millis(500));

    let ctx = ContextParams::new(OWNER).with_timeout(Duration::from_millis(50));
    let err = fx
        .service
        .transfer_host_to_inner_module(&ctx, &to_idle(vec![101]))
        .await
        .unwrap_err();

    let exceptions = err.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].code, codes::REQUEST_ABORTED);
    assert_eq!(fx.modules_of(BIZ_A, 101).await?, vec![M1]);
    Ok(())
}

#[tokio::test]
async fn test_cancelled_request_aborts_whole_call() -> anyhow::Result<()> {
    let mut fx = three_hosts().await?;
    let token = CancellationToken::new();
    token.cancel();

    let ctx = ContextParams::new(OWNER).with_cancel(token);
    let result = fx
        .service
        .transfer_host_to_inner_module(&ctx, &to_idle(vec![101, 102]))
        .await;
    let report = report(result);

    // 共享的模块查询失败，不产生主机异常列表
    assert!(report.exceptions.is_empty());
    assert_eq!(report.error.map(|e| e.code), Some(codes::REQUEST_ABORTED));
    assert_eq!(fx.modules_of(BIZ_A, 101).await?, vec![M1]);
    assert!(fx.drain_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancel_between_writes_restores_prior_set() -> anyhow::Result<()> {
    let mut fx = three_hosts().await?;
    let token = CancellationToken::new();
    fx.faulty.cancel_on_next_delete(102, token.clone());

    let ctx = ContextParams::new(OWNER).with_cancel(token);
    let err = fx
        .service
        .transfer_host_to_inner_module(&ctx, &to_idle(vec![102]))
        .await
        .unwrap_err();

    let exception = &err.exceptions()[0];
    assert_eq!(exception.code, codes::REQUEST_ABORTED);
    assert!(!exception.message.contains("compensation"));
    // 插入的空闲机关系已撤回，不会同时属于空闲机和普通模块
    assert_eq!(fx.modules_of(BIZ_A, 102).await?, vec![M1]);
    fx.assert_homogeneous(BIZ_A, 102).await?;
    assert!(fx.drain_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_deadline_between_writes_restores_prior_set() -> anyhow::Result<()> {
    let fx = three_hosts().await?;
    fx.faulty.stall_next_delete(103);

    let ctx = ContextParams::new(OWNER).with_timeout(Duration::from_secs(1));
    let err = fx
        .service
        .transfer_host_to_inner_module(&ctx, &to_idle(vec![103]))
        .await
        .unwrap_err();

    assert_eq!(err.exceptions()[0].code, codes::REQUEST_ABORTED);
    assert_eq!(fx.modules_of(BIZ_A, 103).await?, vec![M1]);
    Ok(())
}
