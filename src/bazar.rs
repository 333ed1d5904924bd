//! TaskBazar service
//!
//! Holds the injected store handle (through the [`Ledger`]) and exposes one
//! async method per endpoint. The methods live next to their business rules in
//! `wheel`, `bonus`, `campaign` and `referral`.

use std::sync::Arc;

use crate::ledger::Ledger;
use crate::store::Store;

pub struct TaskBazar {
    ledger: Ledger,
}

impl TaskBazar {
    pub fn new(store: Arc<dyn Store>, app_id: &str) -> Self {
        Self {
            ledger: Ledger::new(store, app_id),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn store_backend(&self) -> &'static str {
        self.ledger.store().backend()
    }
}
