use bazaar_crypto::KeyRing;
use bazaar_storage::{MailboxEntry, P2PDataStorage, ProtectedStorageEntry, StorageEvent, DEFAULT_TTL};
use bazaar_types::{Announcement, NodeAddress, ProtocolVersion, StoragePayload};
use chrono::{TimeZone, Utc};
use std::time::Duration;

fn announcement(ring: &KeyRing, port: u16) -> StoragePayload {
    StoragePayload::Announcement(Announcement {
        version: ProtocolVersion::current(),
        node_address: NodeAddress::new("localhost", port),
        pub_key_ring: ring.pub_key_ring(),
        timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    })
}

fn entry(ring: &KeyRing, port: u16, seq: u64) -> ProtectedStorageEntry {
    ProtectedStorageEntry::new_signed(announcement(ring, port), seq, DEFAULT_TTL, &ring.signing)
        .unwrap()
}

#[tokio::test]
async fn higher_sequence_number_replaces_stored_entry() {
    let (store, _events) = P2PDataStorage::new();
    let ring = KeyRing::generate();

    assert!(store.add(entry(&ring, 8002, 4)).await);
    let payload_id = entry(&ring, 8002, 4).payload_id();

    // Scenario: stored seq 4, candidate seq 5 with a valid signature
    assert!(store.add(entry(&ring, 8002, 5)).await);
    assert_eq!(store.get(&payload_id).await.unwrap().sequence_number, 5);
}

#[tokio::test]
async fn lower_sequence_number_is_rejected() {
    let (store, _events) = P2PDataStorage::new();
    let ring = KeyRing::generate();

    assert!(store.add(entry(&ring, 8002, 4)).await);
    // Scenario: candidate seq 3 arrives after seq 4 was stored
    assert!(!store.add(entry(&ring, 8002, 3)).await);

    let payload_id = entry(&ring, 8002, 4).payload_id();
    assert_eq!(store.get(&payload_id).await.unwrap().sequence_number, 4);
}

#[tokio::test]
async fn replaying_the_same_entry_has_no_additional_effect() {
    let (store, mut events) = P2PDataStorage::new();
    let ring = KeyRing::generate();

    assert!(store.add(entry(&ring, 8002, 1)).await);
    assert!(!store.add(entry(&ring, 8002, 1)).await);
    assert_eq!(store.len().await, 1);

    // Exactly one event for the single acceptance
    assert!(matches!(events.recv().await, Some(StorageEvent::EntryAdded(_))));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let (store, _events) = P2PDataStorage::new();
    let ring = KeyRing::generate();

    let mut bad = entry(&ring, 8002, 1);
    bad.sequence_number = 9; // no longer covered by the signature
    assert!(!store.add(bad).await);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn old_remove_cannot_erase_newer_add() {
    let (store, _events) = P2PDataStorage::new();
    let ring = KeyRing::generate();
    let payload_id = entry(&ring, 8002, 1).payload_id();

    assert!(store.add(entry(&ring, 8002, 5)).await);
    // Remove op carrying an older sequence number must not win
    assert!(!store.remove(entry(&ring, 8002, 4)).await);
    assert!(store.get(&payload_id).await.is_some());

    // A fresh remove wins, and afterwards a stale add cannot resurrect
    assert!(store.remove(entry(&ring, 8002, 6)).await);
    assert!(store.get(&payload_id).await.is_none());
    assert!(!store.add(entry(&ring, 8002, 6)).await);
    assert!(store.add(entry(&ring, 8002, 7)).await);
}

#[tokio::test]
async fn remove_requires_matching_owner() {
    let (store, _events) = P2PDataStorage::new();
    let ring = KeyRing::generate();
    let mallory = KeyRing::generate();

    assert!(store.add(entry(&ring, 8002, 1)).await);

    // Mallory signs a remove over the same payload with a higher number
    let forged = ProtectedStorageEntry::new_signed(
        announcement(&ring, 8002),
        2,
        DEFAULT_TTL,
        &mallory.signing,
    )
    .unwrap();
    assert!(!store.remove(forged).await);
}

#[tokio::test]
async fn convergence_is_independent_of_delivery_order() {
    let ring = KeyRing::generate();
    let ops: Vec<ProtectedStorageEntry> = (1..=4).map(|seq| entry(&ring, 8002, seq)).collect();
    let payload_id = ops[0].payload_id();

    let (forward, _e1) = P2PDataStorage::new();
    for op in &ops {
        forward.add(op.clone()).await;
    }

    let (reversed, _e2) = P2PDataStorage::new();
    for op in ops.iter().rev() {
        reversed.add(op.clone()).await;
    }

    assert_eq!(
        forward.get(&payload_id).await.unwrap().sequence_number,
        reversed.get(&payload_id).await.unwrap().sequence_number,
    );
}

#[tokio::test]
async fn expired_entries_are_purged() {
    let (store, _events) = P2PDataStorage::new();
    let ring = KeyRing::generate();

    let short_lived = ProtectedStorageEntry::new_signed(
        announcement(&ring, 8002),
        1,
        Duration::from_millis(10),
        &ring.signing,
    )
    .unwrap();
    assert!(store.add(short_lived).await);
    assert!(store.add(entry(&ring, 9002, 1)).await);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(store.purge_expired().await, 1);
    assert_eq!(store.len().await, 1);
}

mod mailbox {
    use super::*;
    use bazaar_crypto::seal_and_sign;

    fn mailbox_entry(sender: &KeyRing, receiver: &KeyRing, seq: u64) -> MailboxEntry {
        let sealed = seal_and_sign(
            sender,
            receiver.encryption.public_key(),
            b"payment started",
        )
        .unwrap();
        MailboxEntry::new_signed(
            StoragePayload::Mailbox(sealed),
            seq,
            &sender.signing,
            *receiver.signing.public_key(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn mailbox_entry_is_retrievable_by_receiver_only() {
        let (store, _events) = P2PDataStorage::new();
        let sender = KeyRing::generate();
        let receiver = KeyRing::generate();
        let other = KeyRing::generate();

        assert!(store.add_mailbox(mailbox_entry(&sender, &receiver, 1)).await);

        assert_eq!(
            store
                .mailbox_entries_for(receiver.signing.public_key())
                .await
                .len(),
            1
        );
        assert!(store
            .mailbox_entries_for(other.signing.public_key())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn mailbox_entry_removed_after_single_retrieval() {
        let (store, _events) = P2PDataStorage::new();
        let sender = KeyRing::generate();
        let receiver = KeyRing::generate();

        let stored = mailbox_entry(&sender, &receiver, 1);
        assert!(store.add_mailbox(stored.clone()).await);

        // Receiver retrieves and acknowledges by issuing a signed remove
        let retrieved = store
            .mailbox_entries_for(receiver.signing.public_key())
            .await;
        assert_eq!(retrieved.len(), 1);

        let ack = MailboxEntry::new_signed(
            retrieved[0].entry.payload.clone(),
            retrieved[0].entry.sequence_number + 1,
            &receiver.signing,
            *receiver.signing.public_key(),
        )
        .unwrap();
        assert!(store.remove_mailbox(ack).await);

        // A second delivery attempt from a stale peer view yields nothing
        assert!(!store.add_mailbox(stored).await);
        assert!(store
            .mailbox_entries_for(receiver.signing.public_key())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn mailbox_remove_requires_receiver_signature() {
        let (store, _events) = P2PDataStorage::new();
        let sender = KeyRing::generate();
        let receiver = KeyRing::generate();
        let mallory = KeyRing::generate();

        let stored = mailbox_entry(&sender, &receiver, 1);
        assert!(store.add_mailbox(stored.clone()).await);

        let forged = MailboxEntry::new_signed(
            stored.entry.payload.clone(),
            2,
            &mallory.signing,
            *mallory.signing.public_key(),
        )
        .unwrap();
        assert!(!store.remove_mailbox(forged).await);
        assert_eq!(
            store
                .mailbox_entries_for(receiver.signing.public_key())
                .await
                .len(),
            1
        );
    }
}
