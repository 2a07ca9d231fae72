//! In-memory collaborators for tests. **Never use in production.**
//!
//! - [`InMemoryToken`]: balances and allowances for any number of assets
//! - [`InMemoryMarginLedger`]: a margin ledger with markets, operators, and an
//!   optional withdrawal fee
//! - [`InMemoryCollateralLedger`]: a collateral ledger with one margin asset
//!
//! Both ledgers hold real token balances in the shared [`InMemoryToken`], so
//! the bridge's custody measurements see exactly what a ledger released.
//! Every trait call is counted, queries included.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{Address, U256};
use marginbridge_types::{
    AssetCustody, CollateralLedger, LedgerError, LedgerResult, MarginAccount, MarginDeposit,
    MarginLedger, MarginWithdrawal, WithdrawAmount,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// InMemoryToken
// ---------------------------------------------------------------------------

/// Balances and allowances keyed by asset address.
#[derive(Debug, Default)]
pub struct InMemoryToken {
    balances: Mutex<HashMap<(Address, Address), U256>>,
    allowances: Mutex<HashMap<(Address, Address, Address), U256>>,
    /// Reject raising a nonzero allowance to another nonzero value.
    zero_first: AtomicBool,
    approve_calls: AtomicUsize,
}

impl InMemoryToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like assets that require resetting an allowance to zero
    /// before changing it.
    pub fn require_zero_first(&self, on: bool) {
        self.zero_first.store(on, Ordering::SeqCst);
    }

    pub fn mint(&self, asset: Address, holder: Address, amount: U256) {
        let mut balances = lock(&self.balances);
        let entry = balances.entry((asset, holder)).or_default();
        *entry += amount;
    }

    pub fn balance(&self, asset: Address, holder: Address) -> U256 {
        lock(&self.balances)
            .get(&(asset, holder))
            .copied()
            .unwrap_or_default()
    }

    /// Set an allowance directly, bypassing the zero-first rule.
    pub fn approve_unchecked(&self, asset: Address, owner: Address, spender: Address, amount: U256) {
        lock(&self.allowances).insert((asset, owner, spender), amount);
    }

    pub fn approve_calls(&self) -> usize {
        self.approve_calls.load(Ordering::SeqCst)
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(&self, asset: Address, from: Address, to: Address, amount: U256) -> LedgerResult<()> {
        let mut balances = lock(&self.balances);
        let available = balances.get(&(asset, from)).copied().unwrap_or_default();
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        balances.insert((asset, from), available - amount);
        *balances.entry((asset, to)).or_default() += amount;
        Ok(())
    }

    /// Move `amount` from `from` to `to` on behalf of `spender`, spending
    /// allowance. A maximal allowance is never decremented.
    pub fn transfer_from(
        &self,
        asset: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> LedgerResult<()> {
        let key = (asset, from, spender);
        let approved = lock(&self.allowances).get(&key).copied().unwrap_or_default();
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }
        self.transfer(asset, from, to, amount)?;
        if approved != U256::MAX {
            lock(&self.allowances).insert(key, approved - amount);
        }
        Ok(())
    }
}

impl AssetCustody for InMemoryToken {
    fn balance_of(&self, asset: Address, holder: Address) -> LedgerResult<U256> {
        Ok(self.balance(asset, holder))
    }

    fn approve(&self, asset: Address, owner: Address, spender: Address, amount: U256) -> LedgerResult<()> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        let mut allowances = lock(&self.allowances);
        let current = allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or_default();
        if self.zero_first.load(Ordering::SeqCst) && !current.is_zero() && !amount.is_zero() {
            return Err(LedgerError::Rejected {
                reason: "allowance must be reset to zero first".into(),
            });
        }
        allowances.insert((asset, owner, spender), amount);
        Ok(())
    }

    fn allowance(&self, asset: Address, owner: Address, spender: Address) -> LedgerResult<U256> {
        Ok(lock(&self.allowances)
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// InMemoryMarginLedger
// ---------------------------------------------------------------------------

/// Margin ledger holding per-(account, market) balances.
#[derive(Debug)]
pub struct InMemoryMarginLedger {
    address: Address,
    token: Arc<InMemoryToken>,
    markets: HashMap<U256, Address>,
    balances: Mutex<HashMap<(MarginAccount, U256), U256>>,
    local_operators: Mutex<HashSet<(Address, Address)>>,
    global_operators: Mutex<HashSet<Address>>,
    /// Kept by the ledger out of every withdrawal.
    withdraw_fee: Mutex<U256>,
    calls: AtomicUsize,
}

impl InMemoryMarginLedger {
    #[must_use]
    pub fn new(address: Address, token: Arc<InMemoryToken>) -> Self {
        Self {
            address,
            token,
            markets: HashMap::new(),
            balances: Mutex::new(HashMap::new()),
            local_operators: Mutex::new(HashSet::new()),
            global_operators: Mutex::new(HashSet::new()),
            withdraw_fee: Mutex::new(U256::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_market(mut self, market_id: U256, asset: Address) -> Self {
        self.markets.insert(market_id, asset);
        self
    }

    /// Credit an account and mint the backing tokens to the ledger.
    pub fn credit(&self, account: MarginAccount, market_id: U256, amount: U256) {
        if let Some(asset) = self.markets.get(&market_id) {
            self.token.mint(*asset, self.address, amount);
        }
        *lock(&self.balances).entry((account, market_id)).or_default() += amount;
    }

    pub fn balance(&self, account: MarginAccount, market_id: U256) -> U256 {
        lock(&self.balances)
            .get(&(account, market_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_withdraw_fee(&self, fee: U256) {
        *lock(&self.withdraw_fee) = fee;
    }

    pub fn add_local_operator(&self, owner: Address, operator: Address) {
        lock(&self.local_operators).insert((owner, operator));
    }

    pub fn add_global_operator(&self, operator: Address) {
        lock(&self.global_operators).insert(operator);
    }

    /// Number of trait calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn asset(&self, market_id: U256) -> LedgerResult<Address> {
        self.markets
            .get(&market_id)
            .copied()
            .ok_or_else(|| LedgerError::Rejected {
                reason: format!("unknown market {market_id}"),
            })
    }
}

impl MarginLedger for InMemoryMarginLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn market_asset(&self, market_id: U256) -> LedgerResult<Address> {
        self.tick();
        self.asset(market_id)
    }

    fn is_local_operator(&self, owner: Address, operator: Address) -> LedgerResult<bool> {
        self.tick();
        Ok(lock(&self.local_operators).contains(&(owner, operator)))
    }

    fn is_global_operator(&self, operator: Address) -> LedgerResult<bool> {
        self.tick();
        Ok(lock(&self.global_operators).contains(&operator))
    }

    fn withdraw(&self, withdrawal: MarginWithdrawal) -> LedgerResult<()> {
        self.tick();
        let asset = self.asset(withdrawal.market_id)?;
        let key = (withdrawal.account, withdrawal.market_id);
        let mut balances = lock(&self.balances);
        let available = balances.get(&key).copied().unwrap_or_default();
        let amount = match withdrawal.amount {
            WithdrawAmount::Exact(amount) => amount,
            WithdrawAmount::All => available,
        };
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let fee = (*lock(&self.withdraw_fee)).min(amount);
        self.token
            .transfer(asset, self.address, withdrawal.destination, amount - fee)?;
        balances.insert(key, available - amount);
        Ok(())
    }

    fn deposit(&self, deposit: MarginDeposit) -> LedgerResult<()> {
        self.tick();
        let asset = self.asset(deposit.market_id)?;
        self.token
            .transfer_from(asset, self.address, deposit.source, self.address, deposit.amount)?;
        *lock(&self.balances)
            .entry((deposit.account, deposit.market_id))
            .or_default() += deposit.amount;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryCollateralLedger
// ---------------------------------------------------------------------------

/// Collateral ledger holding one balance per account in one margin asset.
#[derive(Debug)]
pub struct InMemoryCollateralLedger {
    address: Address,
    asset: Address,
    token: Arc<InMemoryToken>,
    balances: Mutex<HashMap<Address, U256>>,
    delegates: Mutex<HashSet<(Address, Address)>>,
    fail_deposits: AtomicBool,
    deposits: AtomicUsize,
    calls: AtomicUsize,
}

impl InMemoryCollateralLedger {
    #[must_use]
    pub fn new(address: Address, asset: Address, token: Arc<InMemoryToken>) -> Self {
        Self {
            address,
            asset,
            token,
            balances: Mutex::new(HashMap::new()),
            delegates: Mutex::new(HashSet::new()),
            fail_deposits: AtomicBool::new(false),
            deposits: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Credit an account and mint the backing tokens to the ledger.
    pub fn credit(&self, account: Address, amount: U256) {
        self.token.mint(self.asset, self.address, amount);
        *lock(&self.balances).entry(account).or_default() += amount;
    }

    pub fn balance(&self, account: Address) -> U256 {
        lock(&self.balances).get(&account).copied().unwrap_or_default()
    }

    pub fn add_delegate(&self, account: Address, operator: Address) {
        lock(&self.delegates).insert((account, operator));
    }

    /// Make every subsequent deposit fail.
    pub fn fail_deposits(&self, on: bool) {
        self.fail_deposits.store(on, Ordering::SeqCst);
    }

    /// Number of successful deposits.
    pub fn deposit_count(&self) -> usize {
        self.deposits.load(Ordering::SeqCst)
    }

    /// Number of trait calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl CollateralLedger for InMemoryCollateralLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn margin_asset(&self) -> LedgerResult<Address> {
        self.tick();
        Ok(self.asset)
    }

    fn has_account_permissions(&self, account: Address, operator: Address) -> LedgerResult<bool> {
        self.tick();
        Ok(lock(&self.delegates).contains(&(account, operator)))
    }

    fn deposit(&self, source: Address, account: Address, amount: U256) -> LedgerResult<()> {
        self.tick();
        if self.fail_deposits.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("deposits halted".into()));
        }
        self.token
            .transfer_from(self.asset, self.address, source, self.address, amount)?;
        *lock(&self.balances).entry(account).or_default() += amount;
        self.deposits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn withdraw(&self, account: Address, destination: Address, amount: U256) -> LedgerResult<()> {
        self.tick();
        let mut balances = lock(&self.balances);
        let available = balances.get(&account).copied().unwrap_or_default();
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.token
            .transfer(self.asset, self.address, destination, amount)?;
        balances.insert(account, available - amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USD: Address = Address::repeat_byte(5);
    const A: Address = Address::repeat_byte(1);
    const B: Address = Address::repeat_byte(2);

    #[test]
    fn transfer_from_spends_allowance() {
        let token = InMemoryToken::new();
        token.mint(USD, A, U256::from(100));
        token.approve(USD, A, B, U256::from(30)).unwrap();

        token.transfer_from(USD, B, A, B, U256::from(20)).unwrap();
        assert_eq!(token.allowance(USD, A, B).unwrap(), U256::from(10));
        assert!(token.transfer_from(USD, B, A, B, U256::from(20)).is_err());
        assert_eq!(token.balance(USD, B), U256::from(20));
    }

    #[test]
    fn maximal_allowance_not_decremented() {
        let token = InMemoryToken::new();
        token.mint(USD, A, U256::from(100));
        token.approve(USD, A, B, U256::MAX).unwrap();
        token.transfer_from(USD, B, A, B, U256::from(100)).unwrap();
        assert_eq!(token.allowance(USD, A, B).unwrap(), U256::MAX);
    }

    #[test]
    fn zero_first_rule() {
        let token = InMemoryToken::new();
        token.require_zero_first(true);
        token.approve(USD, A, B, U256::from(1)).unwrap();
        assert!(token.approve(USD, A, B, U256::from(2)).is_err());
        token.approve(USD, A, B, U256::ZERO).unwrap();
        token.approve(USD, A, B, U256::from(2)).unwrap();
        assert_eq!(token.approve_calls(), 4);
    }

    #[test]
    fn margin_withdraw_all_empties_account() {
        let token = Arc::new(InMemoryToken::new());
        let ledger = InMemoryMarginLedger::new(A, Arc::clone(&token)).with_market(U256::ZERO, USD);
        let account = MarginAccount::new(B, U256::ZERO);
        ledger.credit(account, U256::ZERO, U256::from(80));

        ledger
            .withdraw(MarginWithdrawal {
                account,
                market_id: U256::ZERO,
                amount: WithdrawAmount::All,
                destination: B,
            })
            .unwrap();
        assert_eq!(ledger.balance(account, U256::ZERO), U256::ZERO);
        assert_eq!(token.balance(USD, B), U256::from(80));
        assert_eq!(ledger.call_count(), 1);
    }
}
