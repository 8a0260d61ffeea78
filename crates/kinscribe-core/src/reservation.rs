//! Per-sender UTXO reservations.
//!
//! Outputs picked for a pending transaction are reserved under the sender's
//! address until the owning session terminates or the reservation expires.
//! Each address has its own lock, so sessions for different senders never
//! contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use kaspa_consensus_core::tx::TransactionOutpoint;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::address::Address;
use crate::error::CoreError;
use crate::transfer::session::SessionId;
use crate::tx::UnsignedTransaction;
use crate::types::{outpoint_label, UtxoWithOutpoint};

#[derive(Debug, Clone)]
struct Reservation {
    session: SessionId,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct AddressReservations {
    entries: HashMap<TransactionOutpoint, Reservation>,
}

impl AddressReservations {
    fn purge_expired(&mut self, address: &Address, now: Instant) {
        self.entries.retain(|outpoint, reservation| {
            let live = reservation.expires_at > now;
            if !live {
                warn!(
                    address = %address,
                    outpoint = %outpoint_label(outpoint),
                    session_id = %reservation.session,
                    "reservation expired"
                );
            }
            live
        });
    }
}

pub struct ReservationRegistry {
    timeout: Duration,
    addresses: StdMutex<HashMap<Address, Arc<Mutex<AddressReservations>>>>,
}

impl ReservationRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            addresses: StdMutex::new(HashMap::new()),
        }
    }

    fn slot(&self, address: &Address) -> Arc<Mutex<AddressReservations>> {
        let mut addresses = self
            .addresses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(addresses.entry(address.clone()).or_default())
    }

    fn slots(&self) -> Vec<(Address, Arc<Mutex<AddressReservations>>)> {
        let addresses = self
            .addresses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        addresses
            .iter()
            .map(|(address, slot)| (address.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Run `selector` over the candidates not reserved by anyone, under the
    /// address lock, and reserve every candidate the built transaction spends.
    pub async fn select_and_reserve<F>(
        &self,
        address: &Address,
        session: &SessionId,
        candidates: &[UtxoWithOutpoint],
        selector: F,
    ) -> Result<UnsignedTransaction, CoreError>
    where
        F: FnOnce(&[UtxoWithOutpoint]) -> Result<UnsignedTransaction, CoreError>,
    {
        let slot = self.slot(address);
        let mut reservations = slot.lock().await;
        let now = Instant::now();
        reservations.purge_expired(address, now);

        let available: Vec<UtxoWithOutpoint> = candidates
            .iter()
            .filter(|entry| !reservations.entries.contains_key(&entry.outpoint))
            .cloned()
            .collect();
        debug!(
            address = %address,
            session_id = %session,
            candidates = candidates.len(),
            available = available.len(),
            "selecting funding"
        );

        let unsigned = selector(&available)?;
        let expires_at = now + self.timeout;
        for entry in &unsigned.entries {
            if available.iter().any(|a| a.outpoint == entry.outpoint) {
                reservations.entries.insert(
                    entry.outpoint,
                    Reservation {
                        session: session.clone(),
                        expires_at,
                    },
                );
            }
        }
        Ok(unsigned)
    }

    /// Drop every reservation owned by `session`.
    pub async fn release(&self, session: &SessionId) -> usize {
        let mut released = 0;
        for (address, slot) in self.slots() {
            let mut reservations = slot.lock().await;
            let before = reservations.entries.len();
            reservations.entries.retain(|_, r| &r.session != session);
            let dropped = before - reservations.entries.len();
            if dropped > 0 {
                debug!(address = %address, session_id = %session, released = dropped, "released reservations");
            }
            released += dropped;
        }
        released
    }

    pub async fn reserved_count(&self, address: &Address) -> usize {
        let slot = self.slot(address);
        let mut reservations = slot.lock().await;
        reservations.purge_expired(address, Instant::now());
        reservations.entries.len()
    }
}
