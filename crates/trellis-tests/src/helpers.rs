//! Shared test helpers for integration and adversarial tests.

use std::sync::Arc;

use trellis_core::types::{MemberRecord, WalletAddress};
use trellis_service_lib::{ServiceConfig, TrellisService};

/// Deterministic wallet from a seed.
pub fn wallet(seed: u8) -> WalletAddress {
    WalletAddress::from_bytes([seed; 20])
}

/// Deterministic wallet from a wide seed, for tests needing more than
/// 256 distinct wallets.
pub fn wallet_wide(seed: u16) -> WalletAddress {
    let mut bytes = [0u8; 20];
    bytes[18..].copy_from_slice(&seed.to_be_bytes());
    WalletAddress::from_bytes(bytes)
}

/// An activated member record at the given level.
pub fn activated(seed: u8, level: u8) -> MemberRecord {
    MemberRecord {
        wallet: wallet(seed),
        current_level: level,
        is_activated: true,
        sponsor: None,
    }
}

/// A fresh service with wallet 0 registered as the tree root and known
/// to the directory at level 19.
pub fn seeded_service() -> Arc<TrellisService> {
    let service = TrellisService::new(&ServiceConfig::default());
    service.register_root(wallet(0)).unwrap();
    service.upsert_member(activated(0, 19));
    service
}

/// Place wallets `1..=len` in a straight line under the root (each
/// sponsored by its predecessor, landing in the L slot), registering
/// each with the directory at the given level.
pub fn seed_line(service: &TrellisService, len: u8, level: u8) {
    for seed in 1..=len {
        service.upsert_member(activated(seed, level));
        service
            .place_member(&wallet(seed), &wallet(seed - 1))
            .unwrap();
    }
}
