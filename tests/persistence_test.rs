#![cfg(feature = "storage-rocksdb")]

mod common;

use common::{MockGateway, account_with_requirements};
use merchant_onboarding::domain::ports::{ProviderGatewayRef, SnapshotStoreRef};
use merchant_onboarding::infrastructure::rocksdb::RocksDBSnapshotStore;
use merchant_onboarding::{OnboardingConfig, OnboardingService};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_cached_snapshots_survive_restart() {
    let dir = tempdir().unwrap();
    let gateway = MockGateway::new();
    gateway.seed_account("acct_1", account_with_requirements("acct_1", &[]));

    {
        let gateway: ProviderGatewayRef = gateway.clone();
        let store: SnapshotStoreRef = Arc::new(RocksDBSnapshotStore::open(dir.path()).unwrap());
        let service = OnboardingService::new(gateway, store, OnboardingConfig::default());
        service.account("acct_1").await.unwrap();
    }

    // a fresh service over the same database serves the snapshot locally
    let gateway_ref: ProviderGatewayRef = gateway.clone();
    let store: SnapshotStoreRef = Arc::new(RocksDBSnapshotStore::open(dir.path()).unwrap());
    let service = OnboardingService::new(gateway_ref, store, OnboardingConfig::default());
    let snapshot = service.account("acct_1").await.unwrap();

    assert_eq!(snapshot.str_field("country"), Some("US"));
    assert_eq!(gateway.calls("retrieve_account"), 1);
}
