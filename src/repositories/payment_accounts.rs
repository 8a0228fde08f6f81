use super::record_table::{RecordTable, StoreError, Versioned};
use crate::models::PaymentAccount;

/// Keyed storage for seller payment accounts.
#[derive(Debug, Default)]
pub struct PaymentAccountStore {
    table: RecordTable<PaymentAccount>,
}

impl PaymentAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, account: PaymentAccount) -> Result<Versioned<PaymentAccount>, StoreError> {
        self.table.insert(account.id.clone(), account)
    }

    pub fn find(&self, id: &str) -> Option<Versioned<PaymentAccount>> {
        self.table.get(id)
    }

    /// Sets all three capability flags together. A second call is a no-op.
    pub fn complete_onboarding(&self, id: &str) -> Result<Versioned<PaymentAccount>, StoreError> {
        self.table.update(id, |account| {
            if account.is_onboarded() {
                return false;
            }
            account.details_submitted = true;
            account.payouts_enabled = true;
            account.charges_enabled = true;
            true
        })
    }
}
