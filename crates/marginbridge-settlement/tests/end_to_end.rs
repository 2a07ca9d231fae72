//! End-to-end integration tests across all three layers.
//!
//! Hashing -> Authorization (owner, delegate, signed) -> Settlement, driven
//! through the orchestrator against in-memory ledgers that hold real token
//! balances. Covers replay, invalidation, expiration, asset checks, measured
//! deltas, partial execution, allowance bootstrap, and racing relayers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use alloy::primitives::{Address, U256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use marginbridge_settlement::testing::{
    InMemoryCollateralLedger, InMemoryMarginLedger, InMemoryToken,
};
use marginbridge_settlement::{EventLog, EventSink, TransferOrchestrator};
use marginbridge_types::{
    AssetCustody, BridgeConfig, BridgeError, BridgeEvent, CallContext, CollateralLedger,
    LedgerError, MarginAccount, MarginLedger, RawMode, SignatureType, Transfer, TransferMode,
    TransferOptions, TypedSignature,
};
use tracing_subscriber::EnvFilter;

const BRIDGE: Address = Address::repeat_byte(0xb1);
const MARGIN: Address = Address::repeat_byte(0xaa);
const COLLATERAL: Address = Address::repeat_byte(0xcc);
const USD: Address = Address::repeat_byte(0x05);
const EUR: Address = Address::repeat_byte(0x06);
const RELAYER: Address = Address::repeat_byte(0x77);
const NOW: u64 = 1_700_000_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct World {
    holder: PrivateKeySigner,
    token: Arc<InMemoryToken>,
    margin: Arc<InMemoryMarginLedger>,
    collateral: Arc<InMemoryCollateralLedger>,
    log: Arc<EventLog>,
    bridge: TransferOrchestrator,
}

impl World {
    fn new() -> Self {
        Self::with_collateral_asset(USD)
    }

    fn with_collateral_asset(collateral_asset: Address) -> Self {
        let world = Self::unbootstrapped(collateral_asset);
        world.bridge.approve_maximum_on_margin(U256::ZERO).unwrap();
        world.bridge.approve_maximum_on_collateral(COLLATERAL).unwrap();
        world
    }

    fn unbootstrapped(collateral_asset: Address) -> Self {
        init_tracing();
        let token = Arc::new(InMemoryToken::new());
        let margin = Arc::new(
            InMemoryMarginLedger::new(MARGIN, Arc::clone(&token)).with_market(U256::ZERO, USD),
        );
        let collateral = Arc::new(InMemoryCollateralLedger::new(
            COLLATERAL,
            collateral_asset,
            Arc::clone(&token),
        ));
        let log = Arc::new(EventLog::new());
        let bridge = TransferOrchestrator::new(
            BridgeConfig::new(1, BRIDGE),
            Arc::clone(&margin) as Arc<dyn MarginLedger>,
            Arc::clone(&token) as Arc<dyn AssetCustody>,
        )
        .unwrap()
        .with_counterparty(Arc::clone(&collateral) as Arc<dyn CollateralLedger>)
        .with_sink(Arc::clone(&log) as Arc<dyn EventSink>);

        Self {
            holder: PrivateKeySigner::random(),
            token,
            margin,
            collateral,
            log,
            bridge,
        }
    }

    fn account(&self) -> Address {
        self.holder.address()
    }

    fn margin_account(&self) -> MarginAccount {
        MarginAccount::new(self.account(), U256::ZERO)
    }

    fn fund_margin(&self, amount: u64) {
        self.margin
            .credit(self.margin_account(), U256::ZERO, U256::from(amount));
    }

    fn fund_collateral(&self, amount: u64) {
        self.collateral.credit(self.account(), U256::from(amount));
    }

    fn margin_balance(&self) -> U256 {
        self.margin.balance(self.margin_account(), U256::ZERO)
    }

    fn transfer(&self, mode: TransferMode, amount: u64, expiration: u128) -> Transfer {
        Transfer::dummy_with(self.account(), COLLATERAL, U256::from(amount), mode, expiration)
    }

    fn sign(&self, transfer: &Transfer, ty: SignatureType) -> Vec<u8> {
        let hash = self.bridge.transfer_hash(transfer);
        let digest = ty.signed_digest(hash.as_b256());
        let sig = self.holder.sign_hash_sync(&digest).unwrap();
        TypedSignature::from_rsv(&sig.as_bytes(), ty)
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn ledger_calls(&self) -> usize {
        self.margin.call_count() + self.collateral.call_count()
    }
}

fn relayer() -> CallContext {
    CallContext::new(RELAYER, NOW)
}

// ---------------------------------------------------------------------------
// Delegation
// ---------------------------------------------------------------------------

#[test]
fn global_delegate_moves_without_signature() {
    let w = World::new();
    w.fund_margin(100);
    w.margin.add_global_operator(RELAYER);
    let transfer = w.transfer(TransferMode::SomeToDestination, 100, 0);

    let outcome = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &TypedSignature::placeholder())
        .unwrap();

    assert_eq!(outcome.amount, U256::from(100));
    assert!(!outcome.signature_consumed);
    assert_eq!(w.margin_balance(), U256::ZERO);
    assert_eq!(w.collateral.balance(w.account()), U256::from(100));

    let events = w.log.transfers();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].account, w.account());
    assert_eq!(events[0].counterparty, COLLATERAL);
    assert!(events[0].to_destination);
    assert_eq!(events[0].amount, U256::from(100));

    assert!(!w.bridge.is_signature_used(&outcome.transfer_hash));
}

#[test]
fn collateral_delegate_moves_toward_source() {
    let w = World::new();
    w.fund_collateral(80);
    w.collateral.add_delegate(w.account(), RELAYER);
    let transfer = w.transfer(TransferMode::SomeToSource, 30, 0);

    let outcome = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &[])
        .unwrap();
    assert_eq!(outcome.amount, U256::from(30));
    assert_eq!(w.collateral.balance(w.account()), U256::from(50));
    assert_eq!(w.margin_balance(), U256::from(30));
    assert!(!w.log.transfers()[0].to_destination);
}

#[test]
fn margin_delegate_cannot_move_toward_source() {
    let w = World::new();
    w.fund_collateral(80);
    w.margin.add_global_operator(RELAYER);
    let transfer = w.transfer(TransferMode::SomeToSource, 30, 0);

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &TypedSignature::placeholder())
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidSignature), "Got: {err:?}");
    assert_eq!(w.collateral.balance(w.account()), U256::from(80));
}

// ---------------------------------------------------------------------------
// Signatures and replay
// ---------------------------------------------------------------------------

#[test]
fn signed_transfer_then_replay_rejected() {
    let w = World::new();
    w.fund_margin(500);
    let transfer = w.transfer(TransferMode::SomeToDestination, 100, 0);
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let outcome = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap();
    assert!(outcome.signature_consumed);
    assert!(w.bridge.is_signature_used(&outcome.transfer_hash));

    for sig in [signature, w.sign(&transfer, SignatureType::Decimal)] {
        let err = w
            .bridge
            .bridge_transfer(&relayer(), &transfer, &sig)
            .unwrap_err();
        assert!(
            matches!(err, BridgeError::SignatureAlreadyUsedOrInvalidated(h) if h == outcome.transfer_hash),
            "Got: {err:?}"
        );
    }
    assert_eq!(w.margin_balance(), U256::from(400));
}

#[test]
fn every_signature_type_authorizes() {
    let w = World::new();
    w.fund_margin(300);
    for ty in [
        SignatureType::NoPrepend,
        SignatureType::Decimal,
        SignatureType::Hexadecimal,
    ] {
        let transfer = w.transfer(TransferMode::SomeToDestination, 100, 0);
        let signature = w.sign(&transfer, ty);
        w.bridge
            .bridge_transfer(&relayer(), &transfer, &signature)
            .unwrap();
    }
    assert_eq!(w.collateral.balance(w.account()), U256::from(300));
}

#[test]
fn personal_message_signature_authorizes() {
    let w = World::new();
    w.fund_margin(10);
    let transfer = w.transfer(TransferMode::SomeToDestination, 10, 0);
    let hash = w.bridge.transfer_hash(&transfer);
    let sig = w.holder.sign_message_sync(hash.as_b256().as_slice()).unwrap();
    let signature = TypedSignature::from_rsv(&sig.as_bytes(), SignatureType::Decimal)
        .unwrap()
        .to_bytes();

    w.bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap();
}

#[test]
fn salt_distinguishes_identical_authorizations() {
    let w = World::new();
    w.fund_margin(200);
    let first = w.transfer(TransferMode::SomeToDestination, 100, 0);
    let mut second = first;
    second.options = TransferOptions::pack(
        TransferMode::SomeToDestination,
        0,
        first.options.salt().wrapping_add(1),
    )
    .unwrap();

    for t in [first, second] {
        let signature = w.sign(&t, SignatureType::NoPrepend);
        w.bridge.bridge_transfer(&relayer(), &t, &signature).unwrap();
    }
    assert_eq!(w.margin_balance(), U256::ZERO);
}

#[test]
fn forged_signature_rejected() {
    let w = World::new();
    w.fund_margin(100);
    let transfer = w.transfer(TransferMode::SomeToDestination, 100, 0);
    let mut signature = w.sign(&transfer, SignatureType::NoPrepend);
    signature[10] ^= 0xff;

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidSignature), "Got: {err:?}");
    assert_eq!(w.margin_balance(), U256::from(100));
    assert!(!w.bridge.is_signature_used(&w.bridge.transfer_hash(&transfer)));
}

#[test]
fn malformed_signature_rejected_on_signature_path_only() {
    let w = World::new();
    w.fund_margin(100);
    let transfer = w.transfer(TransferMode::SomeToDestination, 50, 0);

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &[1, 2, 3])
        .unwrap_err();
    assert!(matches!(err, BridgeError::MalformedSignature { .. }));

    let owner = CallContext::new(w.account(), NOW);
    w.bridge.bridge_transfer(&owner, &transfer, &[1, 2, 3]).unwrap();
}

// ---------------------------------------------------------------------------
// Invalidation
// ---------------------------------------------------------------------------

#[test]
fn invalidation_blocks_future_use() {
    let w = World::new();
    w.fund_margin(100);
    let transfer = w.transfer(TransferMode::SomeToDestination, 100, 0);
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let owner = CallContext::new(w.account(), NOW);
    let record = w.bridge.invalidate_signature(&owner, &transfer).unwrap();
    assert_eq!(record.account, w.account());

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap_err();
    assert!(matches!(err, BridgeError::SignatureAlreadyUsedOrInvalidated(_)));
    assert_eq!(w.margin_balance(), U256::from(100));
    assert!(matches!(
        w.log.events().as_slice(),
        [BridgeEvent::SignatureInvalidated(_)]
    ));
}

#[test]
fn invalidation_follows_transfer_direction() {
    let w = World::new();
    w.margin.add_local_operator(w.account(), RELAYER);
    let toward_destination = w.transfer(TransferMode::AllToDestination, 1, 0);
    let toward_source = w.transfer(TransferMode::SomeToSource, 1, 0);

    w.bridge
        .invalidate_signature(&relayer(), &toward_destination)
        .unwrap();
    let err = w
        .bridge
        .invalidate_signature(&relayer(), &toward_source)
        .unwrap_err();
    assert!(matches!(err, BridgeError::PermissionDenied { caller, .. } if caller == RELAYER));

    w.collateral.add_delegate(w.account(), RELAYER);
    w.bridge
        .invalidate_signature(&relayer(), &toward_source)
        .unwrap();
}

#[test]
fn signature_holder_cannot_invalidate() {
    let w = World::new();
    let transfer = w.transfer(TransferMode::SomeToDestination, 1, 0);
    let err = w
        .bridge
        .invalidate_signature(&relayer(), &transfer)
        .unwrap_err();
    assert!(matches!(err, BridgeError::PermissionDenied { .. }));
    assert!(w.log.is_empty());
}

#[test]
fn holder_cancels_before_counterparty_is_registered() {
    let mut w = World::new();
    w.fund_margin(100);
    let late = Address::repeat_byte(0xdd);
    let transfer = Transfer::dummy_with(
        w.account(),
        late,
        U256::from(100),
        TransferMode::SomeToDestination,
        0,
    );
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let owner = CallContext::new(w.account(), NOW);
    w.bridge.invalidate_signature(&owner, &transfer).unwrap();

    let ledger = Arc::new(InMemoryCollateralLedger::new(late, USD, Arc::clone(&w.token)));
    w.bridge
        .register_counterparty(Arc::clone(&ledger) as Arc<dyn CollateralLedger>);
    w.bridge.approve_maximum_on_collateral(late).unwrap();

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap_err();
    assert!(matches!(err, BridgeError::SignatureAlreadyUsedOrInvalidated(_)), "Got: {err:?}");
    assert_eq!(w.margin_balance(), U256::from(100));
    assert_eq!(ledger.balance(w.account()), U256::ZERO);
}

// ---------------------------------------------------------------------------
// Ownership and expiration
// ---------------------------------------------------------------------------

#[test]
fn owner_bypasses_expiration_and_replay() {
    let w = World::new();
    w.fund_margin(100);
    let transfer = w.transfer(TransferMode::SomeToDestination, 40, 5);
    let owner = CallContext::new(w.account(), NOW);
    w.bridge.invalidate_signature(&owner, &transfer).unwrap();

    let outcome = w
        .bridge
        .bridge_transfer(&owner, &transfer, &TypedSignature::placeholder())
        .unwrap();
    assert_eq!(outcome.amount, U256::from(40));
    assert!(!outcome.signature_consumed);

    // Same transfer again: the owner path never consults the flag.
    w.bridge
        .bridge_transfer(&owner, &transfer, &TypedSignature::placeholder())
        .unwrap();
    assert_eq!(w.margin_balance(), U256::from(20));
}

#[test]
fn delegate_ignores_expiration() {
    let w = World::new();
    w.fund_margin(100);
    w.margin.add_global_operator(RELAYER);
    let transfer = w.transfer(TransferMode::SomeToDestination, 25, u128::from(NOW - 1));

    let outcome = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &TypedSignature::placeholder())
        .unwrap();
    assert_eq!(outcome.amount, U256::from(25));
    assert!(!outcome.signature_consumed);
    assert!(!w.bridge.is_signature_used(&outcome.transfer_hash));
    assert_eq!(w.collateral.balance(w.account()), U256::from(25));
}

#[test]
fn expiration_boundary_is_inclusive() {
    let w = World::new();
    w.fund_margin(100);

    let at_now = w.transfer(TransferMode::SomeToDestination, 10, u128::from(NOW));
    let signature = w.sign(&at_now, SignatureType::NoPrepend);
    w.bridge
        .bridge_transfer(&relayer(), &at_now, &signature)
        .unwrap();

    let past = w.transfer(TransferMode::SomeToDestination, 10, u128::from(NOW - 1));
    let signature = w.sign(&past, SignatureType::NoPrepend);
    let err = w
        .bridge
        .bridge_transfer(&relayer(), &past, &signature)
        .unwrap_err();
    assert!(
        matches!(err, BridgeError::SignatureExpired { expiration, now }
            if expiration == u128::from(NOW - 1) && now == NOW),
        "Got: {err:?}"
    );
    assert!(!w.bridge.is_signature_used(&w.bridge.transfer_hash(&past)));
    assert_eq!(w.margin_balance(), U256::from(90));
}

// ---------------------------------------------------------------------------
// Assets and modes
// ---------------------------------------------------------------------------

#[test]
fn asset_mismatch_fails_every_mode() {
    let w = World::with_collateral_asset(EUR);
    w.fund_margin(100);
    w.fund_collateral(100);
    let owner = CallContext::new(w.account(), NOW);

    for mode in [
        TransferMode::SomeToDestination,
        TransferMode::SomeToSource,
        TransferMode::AllToDestination,
    ] {
        let transfer = w.transfer(mode, 10, 0);
        let err = w
            .bridge
            .bridge_transfer(&owner, &transfer, &TypedSignature::placeholder())
            .unwrap_err();
        assert!(
            matches!(err, BridgeError::AssetMismatch { margin_asset, collateral_asset }
                if margin_asset == USD && collateral_asset == EUR),
            "{mode}: {err:?}"
        );
    }
    assert_eq!(w.margin_balance(), U256::from(100));
    assert_eq!(w.collateral.balance(w.account()), U256::from(100));
    assert!(w.log.is_empty());
}

#[test]
fn asset_mismatch_leaves_signature_unused() {
    let w = World::with_collateral_asset(EUR);
    w.fund_margin(100);
    let transfer = w.transfer(TransferMode::SomeToDestination, 10, 0);
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap_err();
    assert!(matches!(err, BridgeError::AssetMismatch { .. }));
    assert!(!w.bridge.is_signature_used(&w.bridge.transfer_hash(&transfer)));
}

#[test]
fn all_mode_reports_measured_delta() {
    let w = World::new();
    w.fund_margin(1_000);
    w.margin.set_withdraw_fee(U256::from(3));
    // A client estimate of 1_000 is ignored; the ledger keeps a fee.
    let transfer = w.transfer(TransferMode::AllToDestination, 1_000, 0);
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let outcome = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap();
    assert_eq!(outcome.amount, U256::from(997));
    assert_eq!(outcome.event.amount, U256::from(997));
    assert_eq!(w.collateral.balance(w.account()), U256::from(997));
    assert_eq!(w.margin_balance(), U256::ZERO);
    assert_eq!(w.token.balance(USD, BRIDGE), U256::ZERO);
}

#[test]
fn unknown_mode_makes_no_ledger_calls() {
    let w = World::new();
    w.fund_margin(100);
    let mut transfer = w.transfer(TransferMode::SomeToDestination, 10, 0);
    transfer.options = TransferOptions::pack(RawMode(7), 0, 42).unwrap();
    let signature = w.sign(&transfer, SignatureType::NoPrepend);
    let calls_before = w.ledger_calls();

    let owner = CallContext::new(w.account(), NOW);
    for ctx in [owner, relayer()] {
        let err = w
            .bridge
            .bridge_transfer(&ctx, &transfer, &signature)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTransferMode(7)));
    }
    assert_eq!(w.ledger_calls(), calls_before);
    assert!(!w.bridge.is_signature_used(&w.bridge.transfer_hash(&transfer)));
}

// ---------------------------------------------------------------------------
// Partial execution and bootstrap
// ---------------------------------------------------------------------------

#[test]
fn failed_deposit_is_reported_and_signature_stays_usable() {
    let w = World::new();
    w.fund_margin(100);
    w.collateral.fail_deposits(true);
    let transfer = w.transfer(TransferMode::SomeToDestination, 70, 0);
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let err = w
        .bridge
        .bridge_transfer(&relayer(), &transfer, &signature)
        .unwrap_err();
    assert!(
        matches!(err, BridgeError::PartialExecution { amount, .. } if amount == U256::from(70)),
        "Got: {err:?}"
    );
    // Withdrawn funds wait in bridge custody for reconciliation.
    assert_eq!(w.margin_balance(), U256::from(30));
    assert_eq!(w.token.balance(USD, BRIDGE), U256::from(70));
    assert!(!w.bridge.is_signature_used(&w.bridge.transfer_hash(&transfer)));
    assert!(w.log.is_empty());
}

#[test]
fn transfers_need_allowance_bootstrap() {
    let w = World::unbootstrapped(USD);
    w.fund_margin(100);
    let owner = CallContext::new(w.account(), NOW);
    let transfer = w.transfer(TransferMode::SomeToDestination, 10, 0);

    let err = w
        .bridge
        .bridge_transfer(&owner, &transfer, &[])
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::PartialExecution {
            source: LedgerError::InsufficientAllowance { .. },
            ..
        }
    ));

    w.token.require_zero_first(true);
    w.bridge.approve_maximum_on_margin(U256::ZERO).unwrap();
    w.bridge.approve_maximum_on_collateral(COLLATERAL).unwrap();
    // Idempotent.
    w.bridge.approve_maximum_on_collateral(COLLATERAL).unwrap();

    let transfer = w.transfer(TransferMode::SomeToDestination, 10, 0);
    w.bridge.bridge_transfer(&owner, &transfer, &[]).unwrap();
    assert_eq!(w.collateral.balance(w.account()), U256::from(10));
}

#[test]
fn bootstrap_for_unknown_counterparty_fails() {
    let w = World::new();
    let err = w
        .bridge
        .approve_maximum_on_collateral(Address::repeat_byte(0xdd))
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownCounterparty(_)));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_relays_consume_signature_once() {
    let w = World::new();
    w.fund_margin(10_000);
    let transfer = w.transfer(TransferMode::SomeToDestination, 100, 0);
    let signature = w.sign(&transfer, SignatureType::NoPrepend);

    let threads = 8;
    let barrier = Barrier::new(threads);
    let successes = AtomicUsize::new(0);
    let replays = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                barrier.wait();
                match w.bridge.bridge_transfer(&relayer(), &transfer, &signature) {
                    Ok(_) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(BridgeError::SignatureAlreadyUsedOrInvalidated(_)) => {
                        replays.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(replays.load(Ordering::SeqCst), threads - 1);
    assert_eq!(w.margin_balance(), U256::from(9_900));
    assert_eq!(w.log.transfers().len(), 1);
}
