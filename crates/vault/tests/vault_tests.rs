#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::sync::Arc;

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    docscan_vault::{
        Aes256GcmCipher, Cipher, DecryptOutcome, DocumentVault, EncryptedEnvelope, FileKeyStore,
        Identity, IdentityEvent, KeyManager, KeyStatus, MemoryKeyStore, SqliteRecordStore,
        StoredContent, VaultCodec, VaultError, VaultKey,
    },
    serde_json::{Value, json},
};

fn identity(id: &str) -> Identity {
    Identity::new(id).unwrap()
}

#[test]
fn passport_record_decodes_to_equal_object() {
    let codec = VaultCodec::new();
    let key = VaultKey::generate();
    let record = json!({
        "cognome": "ROSSI",
        "nome": "MARIO",
        "tipo_documento": "Passaporto",
    });

    let envelope = codec.encrypt(&record, &key).unwrap();
    let wire = serde_json::to_value(&envelope).unwrap();
    assert_eq!(wire["isEncrypted"], json!(true));

    // Decrypt the `data` field by hand with the raw key.
    let nonce: [u8; 12] = STANDARD
        .decode(wire["iv"].as_str().unwrap())
        .unwrap()
        .try_into()
        .unwrap();
    let ciphertext = STANDARD.decode(wire["data"].as_str().unwrap()).unwrap();
    let plaintext = Aes256GcmCipher
        .decrypt(key.as_bytes(), &nonce, &ciphertext, b"")
        .unwrap();
    let decoded: Value = serde_json::from_slice(&plaintext).unwrap();

    // Key order is irrelevant to equality.
    let reordered = json!({
        "tipo_documento": "Passaporto",
        "nome": "MARIO",
        "cognome": "ROSSI",
    });
    assert_eq!(decoded, reordered);
    assert_eq!(decoded, record);
}

#[test]
fn legacy_passthrough_from_wire() {
    let codec = VaultCodec::new();
    for stored in [
        json!({ "cognome": "ROSSI" }),
        json!({ "cognome": "ROSSI", "isEncrypted": false }),
    ] {
        let content = StoredContent::from_value(stored.clone()).unwrap();
        assert_eq!(codec.open(&content, None).unwrap(), stored);
    }
}

#[test]
fn envelope_parses_from_persisted_json() {
    let codec = VaultCodec::new();
    let key = VaultKey::generate();
    let envelope = codec.encrypt(&json!({ "nome": "LUCIA" }), &key).unwrap();

    let persisted = serde_json::to_string(&envelope).unwrap();
    let parsed: EncryptedEnvelope = serde_json::from_str(&persisted).unwrap();
    let content = StoredContent::from_value(serde_json::from_str(&persisted).unwrap()).unwrap();

    assert_eq!(parsed, envelope);
    assert_eq!(codec.open(&content, Some(&key)).unwrap(), json!({ "nome": "LUCIA" }));
}

#[tokio::test]
async fn batch_with_since_reset_key() {
    let keys = KeyManager::new(Arc::new(MemoryKeyStore::new()));
    let codec = VaultCodec::new();
    let user = identity("user-42");

    let k1 = keys.synchronize(&user).await.unwrap();
    let first = codec.encrypt(&json!({ "n": 1 }), &k1).unwrap();
    keys.reset().await.unwrap();

    let k2 = keys.synchronize(&user).await.unwrap();
    assert_ne!(*k1, *k2);
    let second = codec.encrypt(&json!({ "n": 3 }), &k2).unwrap();

    // Position 2 of 3 was sealed under the discarded key.
    let stale = codec.encrypt(&json!({ "n": 2 }), &k1).unwrap();
    let outcomes = codec
        .decrypt_all(
            vec![Ok(second.clone().into()), Ok(stale.into()), Ok(second.into())],
            Some(k2),
        )
        .await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].record(), Some(&json!({ "n": 3 })));
    assert!(matches!(outcomes[1], DecryptOutcome::Unreadable(_)));
    assert_eq!(outcomes[2].record(), Some(&json!({ "n": 3 })));

    let with_old = codec.decrypt::<Value>(&first, &keys.active_key().await.unwrap());
    assert!(matches!(with_old, Err(VaultError::DecryptionFailed(_))));
}

#[tokio::test]
async fn key_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault_keys.json");
    let user = identity("user-7");
    let codec = VaultCodec::new();

    let envelope = {
        let keys = KeyManager::new(Arc::new(FileKeyStore::new(&path)));
        let key = keys.synchronize(&user).await.unwrap();
        codec.encrypt(&json!({ "nome": "GIULIA" }), &key).unwrap()
    };

    let keys = KeyManager::new(Arc::new(FileKeyStore::new(&path)));
    assert!(matches!(
        keys.active_key().await,
        Err(VaultError::KeyUnavailable)
    ));
    let key = keys.synchronize(&user).await.unwrap();
    assert_eq!(
        codec.decrypt::<Value>(&envelope, &key).unwrap(),
        json!({ "nome": "GIULIA" })
    );
}

#[tokio::test]
async fn sign_out_then_sign_in_as_someone_else() {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    docscan_vault::run_migrations(&pool).await.unwrap();

    let keys = Arc::new(KeyManager::new(Arc::new(MemoryKeyStore::new())));
    let vault = DocumentVault::new(
        Arc::clone(&keys),
        VaultCodec::new(),
        Arc::new(SqliteRecordStore::new(pool)),
    );
    let anna = identity("anna");
    let marco = identity("marco");

    keys.handle_event(IdentityEvent::SignedIn(anna.clone()))
        .await
        .unwrap();
    vault.save(&anna, &json!({ "owner": "anna" })).await.unwrap();

    let status = keys.handle_event(IdentityEvent::SignedOut).await.unwrap();
    assert_eq!(status, KeyStatus::Unavailable);
    assert!(matches!(
        vault.save(&anna, &json!({})).await,
        Err(VaultError::KeyUnavailable)
    ));

    keys.handle_event(IdentityEvent::SignedIn(marco.clone()))
        .await
        .unwrap();
    vault.save(&marco, &json!({ "owner": "marco" })).await.unwrap();

    let docs = vault.load_all(&marco).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].outcome.record(), Some(&json!({ "owner": "marco" })));

    // Anna's record is still there, sealed under a key that was reset.
    let docs = vault.load_all(&anna).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].outcome.is_unreadable());
}
