//! Behaviour shared by the in-memory and file-backed license stores.

use std::sync::Arc;

use lic_core::{CustomerId, EditionId, LicenseId, ProductId, Timestamp};
use lic_crypto::LocalKeyProvider;
use lic_issuance::{
    Customer, Edition, FileLicenseStore, InMemoryLicenseStore, IssuerIdentity, LicenseRecord,
    LicenseStatus, LicenseStore, LicenseType, PayloadBuilder, Product, Signer, SignerConfig,
    StoreError, Validity,
};

fn record_at(created: &str) -> LicenseRecord {
    let product = Product::new(ProductId::new("prod-a").unwrap(), "a", "Product A");
    let edition = Edition::new(EditionId::new("ed-a").unwrap(), product.id.clone(), "std", "Standard");
    let customer = Customer::new(CustomerId::new("cust-a").unwrap(), "Customer A");
    let validity = Validity::new(
        Timestamp::parse("2025-01-01T00:00:00Z").unwrap(),
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
    )
    .unwrap();
    let payload = PayloadBuilder::new(LicenseId::new(), &customer, &product, &edition, LicenseType::Perpetual, validity)
        .build(&IssuerIdentity::new("1", "ops"), Timestamp::parse(created).unwrap())
        .unwrap();
    let signer = Signer::new(Arc::new(LocalKeyProvider::from_seed(&[2u8; 32])), SignerConfig::default());
    let signed = signer.sign(payload, None).unwrap();
    LicenseRecord::from_signed(&signed, Some("initial".into()), Timestamp::parse(created).unwrap()).unwrap()
}

fn exercise_store(store: &dyn LicenseStore) {
    let older = record_at("2025-01-01T00:00:00Z");
    let newer = record_at("2025-02-01T00:00:00Z");

    store.insert(older.clone()).unwrap();
    store.insert(newer.clone()).unwrap();

    assert!(matches!(
        store.insert(older.clone()),
        Err(StoreError::Conflict(id)) if id == older.license_id
    ));

    assert_eq!(store.get(&older.license_id).unwrap(), Some(older.clone()));
    assert_eq!(store.get(&LicenseId::new()).unwrap(), None);

    let ids: Vec<_> = store.list().unwrap().into_iter().map(|r| r.license_id).collect();
    assert_eq!(ids, vec![newer.license_id, older.license_id]);

    let revoked = store
        .update_status(&older.license_id, LicenseStatus::Revoked, Some("chargeback"))
        .unwrap();
    assert_eq!(revoked.status, LicenseStatus::Revoked);
    assert_eq!(revoked.notes.as_deref(), Some("initial\nchargeback"));
    assert_eq!(revoked.payload, older.payload);
    assert_eq!(revoked.signature, older.signature);
    assert_eq!(store.get(&older.license_id).unwrap().unwrap().status, LicenseStatus::Revoked);

    assert!(matches!(
        store.update_status(&older.license_id, LicenseStatus::Active, None),
        Err(StoreError::InvalidTransition {
            from: LicenseStatus::Revoked,
            to: LicenseStatus::Active
        })
    ));
    assert!(matches!(
        store.update_status(&LicenseId::new(), LicenseStatus::Revoked, None),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn in_memory_store_contract() {
    exercise_store(&InMemoryLicenseStore::new());
}

#[test]
fn file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileLicenseStore::open(dir.path().join("licenses")).unwrap();
    exercise_store(&store);
}

#[test]
fn file_store_survives_reopen_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let record = record_at("2025-03-01T00:00:00Z");
    {
        let store = FileLicenseStore::open(dir.path()).unwrap();
        store.insert(record.clone()).unwrap();
    }
    let reopened = FileLicenseStore::open(dir.path()).unwrap();
    let loaded = reopened.get(&record.license_id).unwrap().unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.to_signed_license(), record.to_signed_license());

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![format!("{}.json", record.license_id)]);
}

#[test]
fn record_mirrors_signed_license() {
    let record = record_at("2025-04-01T00:00:00Z");
    let signed = record.to_signed_license();
    assert_eq!(signed.payload.license_id(), record.license_id);
    assert_eq!(signed.meta.key_id, record.meta_key_id);
    assert_eq!(record.payload_digest.len(), 64);
    assert_eq!(record.customer_id.as_str(), "cust-a");
    assert_eq!(record.valid_from.to_iso8601(), "2025-01-01T00:00:00Z");
    assert_eq!(record.status, LicenseStatus::Active);
}

#[test]
fn file_store_reload_keeps_numbers_verifiable() {
    use lic_crypto::KeyProvider;

    let provider = Arc::new(LocalKeyProvider::from_seed(&[5u8; 32]));
    let product = Product::new(ProductId::new("prod-a").unwrap(), "a", "Product A");
    let edition = Edition::new(EditionId::new("ed-a").unwrap(), product.id.clone(), "std", "Standard");
    let customer = Customer::new(CustomerId::new("cust-a").unwrap(), "Customer A");
    let validity = Validity::new(
        Timestamp::parse("2025-01-01T00:00:00Z").unwrap(),
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
    )
    .unwrap();
    let limits: lic_issuance::Attributes = serde_json::from_str(
        r#"{"ratio":0.30000000000000004,"tiny":1e-7,"events":100000000000000000000}"#,
    )
    .unwrap();
    let payload = PayloadBuilder::new(LicenseId::new(), &customer, &product, &edition, LicenseType::Trial, validity)
        .usage_limits(Some(limits))
        .build(&IssuerIdentity::new("1", "ops"), Timestamp::parse("2025-01-01T00:00:00Z").unwrap())
        .unwrap();
    let signed = Signer::new(provider.clone(), SignerConfig::default())
        .sign(payload, None)
        .unwrap();
    let record = LicenseRecord::from_signed(&signed, None, Timestamp::now()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    FileLicenseStore::open(dir.path()).unwrap().insert(record.clone()).unwrap();
    let reloaded = FileLicenseStore::open(dir.path())
        .unwrap()
        .get(&record.license_id)
        .unwrap()
        .unwrap();

    let vk = provider.signing_key().unwrap().verifying_key();
    assert!(reloaded.to_signed_license().verify(&vk).is_ok());
    assert_eq!(reloaded.payload_digest, record.payload_digest);
    assert_eq!(
        reloaded.payload.usage_limits()["events"].to_string(),
        "100000000000000000000"
    );
}
