//! Integration tests for the vault request lifecycle.
//!
//! Each test drives a vault through the public API only: request, cancel,
//! make claimable, fulfill, redeem. The vault starts with ALICE and BOB
//! funded on the underlying asset and the vault approved to pull from both.

use alloy_primitives::{Address, U256};
use tokenvault_engine::config::PRICE_SCALE;
use tokenvault_engine::{
    AssetLedger, Erc20Ledger, ErrorKind, RequestKind, RequestStatus, Role, TokenVault, VaultError,
    VaultEvent, VaultInit,
};

const VAULT: Address = Address::repeat_byte(0x11);
const TOKEN: Address = Address::repeat_byte(0xA5);
const ADMIN: Address = Address::repeat_byte(0xAD);
const SETTER: Address = Address::repeat_byte(0x9E);
const ALICE: Address = Address::repeat_byte(0xA1);
const BOB: Address = Address::repeat_byte(0xB0);
const OPERATOR: Address = Address::repeat_byte(0x0F);

/// Helper: `n` whole asset units (18 decimals).
fn units(n: u64) -> U256 {
    U256::from(n) * U256::from(PRICE_SCALE)
}

/// Helper: a fresh vault with funded, approving depositors.
fn setup() -> TokenVault {
    let mut token = Erc20Ledger::new(TOKEN, "TestToken", "TTK");
    for holder in [ALICE, BOB] {
        token.mint_to(holder, units(10_000)).unwrap();
        token.approve(holder, VAULT, U256::MAX);
    }
    let init = VaultInit::new(VAULT, TOKEN, "TestVault", "TVT", ADMIN, SETTER);
    TokenVault::new(init, token).unwrap()
}

fn event_names(vault: &TokenVault, since: u64) -> Vec<&'static str> {
    vault
        .events_since(since)
        .iter()
        .map(|r| r.event.name())
        .collect()
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn construction_sets_roles_and_defaults() {
    let vault = setup();
    assert!(vault.has_role(Role::Admin, ADMIN));
    assert!(vault.has_role(Role::PriceSetter, SETTER));
    assert!(!vault.has_role(Role::Keeper, ADMIN));
    assert_eq!(vault.asset(), TOKEN);
    assert_eq!(vault.get_price(), U256::from(PRICE_SCALE));
    assert_eq!(vault.fee(), 1);
    assert!(!vault.paused());
    assert_eq!(vault.name(), "TestVault");
    assert_eq!(vault.symbol(), "TVT");
    assert_eq!(vault.decimals(), 30);
    assert_eq!(event_names(&vault, 0), vec!["RoleGranted", "RoleGranted"]);
}

#[test]
fn construction_rejects_mismatched_asset() {
    let token = Erc20Ledger::new(Address::repeat_byte(0x77), "Other", "OTH");
    let init = VaultInit::new(VAULT, TOKEN, "TestVault", "TVT", ADMIN, SETTER);
    let err = TokenVault::new(init, token).unwrap_err();
    assert!(matches!(err, VaultError::InvalidConfig(_)));
}

// ---------------------------------------------------------------------------
// Deposit Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn reference_deposit_scenario_mints_exact_shares() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(100), ALICE, ALICE).unwrap();
    let shares = vault.deposit(ADMIN, units(100), ALICE, ALICE).unwrap();

    // effective = 100 - 0.1% = 99.9 units; one asset unit = 10^12 share units.
    let effective = units(100) - units(100) / U256::from(1_000);
    let expected = effective * U256::from(1_000_000_000_000u64);
    assert_eq!(shares, expected);
    assert_eq!(vault.balance_of(ALICE), expected);
}

#[test]
fn request_then_claimable_then_fulfill() {
    let mut vault = setup();
    let cursor = vault.events().next_cursor();

    let id = vault.request_deposit(ALICE, units(40), ALICE, ALICE).unwrap();
    assert_eq!(vault.request_status(RequestKind::Deposit, ALICE), RequestStatus::Pending);
    assert_eq!(vault.pending_deposit_request(ALICE), units(40));
    assert_eq!(vault.claimable_deposit_request(ALICE), U256::ZERO);

    vault.make_deposit_claimable(ADMIN, ALICE).unwrap();
    assert_eq!(vault.pending_deposit_request(ALICE), U256::ZERO);
    assert_eq!(vault.claimable_deposit_request(ALICE), units(40));

    vault.deposit(ADMIN, units(40), ALICE, ALICE).unwrap();
    assert_eq!(vault.request_status(RequestKind::Deposit, ALICE), RequestStatus::None);
    assert_eq!(vault.claimable_deposit_request(ALICE), U256::ZERO);

    assert_eq!(
        event_names(&vault, cursor),
        vec!["DepositRequest", "DepositClaimable", "Transfer", "Deposit"]
    );
    let last = &vault.events().records().last().unwrap().event;
    assert!(matches!(last, VaultEvent::Deposit { request_id, .. } if *request_id == id));
}

#[test]
fn duplicate_request_keeps_original_amount() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(100), ALICE, ALICE).unwrap();
    let events = vault.events().len();

    let err = vault
        .request_deposit(ALICE, units(5), ALICE, ALICE)
        .unwrap_err();
    assert!(matches!(err, VaultError::PendingRequestExists { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(vault.pending_deposit_request(ALICE), units(100));
    assert_eq!(vault.underlying().balance_of(ALICE), units(9_900));
    assert_eq!(vault.events().len(), events);
}

#[test]
fn claimable_request_also_blocks_a_new_one() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(1), ALICE, ALICE).unwrap();
    vault.make_deposit_claimable(ADMIN, ALICE).unwrap();
    assert!(matches!(
        vault.request_deposit(ALICE, units(1), ALICE, ALICE),
        Err(VaultError::PendingRequestExists { .. })
    ));
}

#[test]
fn deposit_and_redeem_slots_are_independent() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();
    let shares = vault.deposit(ADMIN, units(10), ALICE, ALICE).unwrap();

    vault.request_deposit(ALICE, units(20), ALICE, ALICE).unwrap();
    vault.request_redeem(ALICE, shares, ALICE, ALICE).unwrap();
    assert_eq!(vault.pending_deposit_request(ALICE), units(20));
    assert_eq!(vault.pending_redeem_request(ALICE), shares);
}

#[test]
fn cancel_twice_second_fails_without_state_change() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(50), ALICE, ALICE).unwrap();
    vault.cancel_deposit(ALICE, ALICE).unwrap();

    let balance = vault.underlying().balance_of(ALICE);
    let events = vault.events().len();
    let err = vault.cancel_deposit(ALICE, ALICE).unwrap_err();
    assert!(matches!(err, VaultError::NoPendingRequest { .. }));
    assert_eq!(vault.underlying().balance_of(ALICE), balance);
    assert_eq!(vault.events().len(), events);
}

#[test]
fn cancel_refunds_the_owner_not_the_controller() {
    let mut vault = setup();
    vault.set_operator(BOB, OPERATOR, true).unwrap();
    vault.set_operator(ALICE, OPERATOR, true).unwrap();

    // BOB's assets, tracked under ALICE.
    vault.request_deposit(OPERATOR, units(30), ALICE, BOB).unwrap();
    assert_eq!(vault.underlying().balance_of(BOB), units(9_970));

    vault.cancel_deposit(OPERATOR, ALICE).unwrap();
    assert_eq!(vault.underlying().balance_of(BOB), units(10_000));
    assert_eq!(vault.underlying().balance_of(ALICE), units(10_000));
}

// ---------------------------------------------------------------------------
// Redeem Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn redeem_after_price_change_pays_at_new_price() {
    let mut vault = setup();
    vault.set_fee(ADMIN, 0).unwrap();
    vault.request_deposit(ALICE, units(100), ALICE, ALICE).unwrap();
    let shares = vault.deposit(ADMIN, units(100), ALICE, ALICE).unwrap();

    // Yield arrives in the vault, NAV goes up 10%.
    vault.underlying_mut().mint_to(VAULT, units(10)).unwrap();
    vault
        .set_price(SETTER, U256::from(PRICE_SCALE) * U256::from(11) / U256::from(10))
        .unwrap();

    vault.request_redeem(ALICE, shares, ALICE, ALICE).unwrap();
    vault.make_redeem_claimable(ADMIN, ALICE).unwrap();
    assert_eq!(vault.claimable_redeem_request(ALICE), shares);

    let assets = vault.redeem(ADMIN, shares, ALICE, ALICE).unwrap();
    assert_eq!(assets, units(110));
    assert_eq!(vault.total_supply(), U256::ZERO);
    assert_eq!(vault.total_assets(), U256::ZERO);
    assert_eq!(vault.underlying().balance_of(ALICE), units(10_010));
}

#[test]
fn redeem_round_trip_never_returns_more_than_deposited() {
    let mut vault = setup();
    vault.set_fee(ADMIN, 7).unwrap();
    let deposit = units(123) + U256::from(456_789u64);
    vault.request_deposit(ALICE, deposit, ALICE, ALICE).unwrap();
    let shares = vault.deposit(ADMIN, deposit, ALICE, ALICE).unwrap();

    vault.request_redeem(ALICE, shares, ALICE, ALICE).unwrap();
    let assets = vault.redeem(ADMIN, shares, ALICE, ALICE).unwrap();
    let fee = deposit * U256::from(7) / U256::from(1_000);
    assert!(assets <= deposit - fee);
}

#[test]
fn redeem_cancel_returns_shares() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();
    let shares = vault.deposit(ADMIN, units(10), ALICE, ALICE).unwrap();

    vault.request_redeem(ALICE, shares, ALICE, ALICE).unwrap();
    assert_eq!(vault.balance_of(ALICE), U256::ZERO);
    assert_eq!(vault.cancel_redeem(ALICE, ALICE).unwrap(), shares);
    assert_eq!(vault.balance_of(ALICE), shares);
    assert_eq!(vault.balance_of(VAULT), U256::ZERO);
}

#[test]
fn redeem_more_than_held_fails() {
    let mut vault = setup();
    let err = vault
        .request_redeem(ALICE, U256::from(1), ALICE, ALICE)
        .unwrap_err();
    assert!(matches!(err, VaultError::InsufficientShares { .. }));
    assert_eq!(vault.requests().peek_id(), 1);
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

#[test]
fn paused_request_fails_then_succeeds_after_unpause() {
    let mut vault = setup();
    vault.pause(ADMIN).unwrap();
    let err = vault
        .request_deposit(ALICE, units(10), ALICE, ALICE)
        .unwrap_err();
    assert!(matches!(err, VaultError::ContractPaused));
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);

    vault.unpause(ADMIN).unwrap();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();
    assert_eq!(vault.pending_deposit_request(ALICE), units(10));
}

#[test]
fn cancellation_still_works_while_paused() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();
    vault.pause(ADMIN).unwrap();
    assert_eq!(vault.cancel_deposit(ALICE, ALICE).unwrap(), units(10));
    assert!(matches!(
        vault.make_deposit_claimable(ADMIN, ALICE),
        Err(VaultError::ContractPaused)
    ));
}

#[test]
fn frozen_transfer_fails_then_succeeds_after_unfreeze() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();
    let shares = vault.deposit(ADMIN, units(10), ALICE, ALICE).unwrap();
    let half = shares / U256::from(2);

    vault.freeze_account(ADMIN, ALICE).unwrap();
    let err = vault.transfer(ALICE, BOB, half).unwrap_err();
    assert!(matches!(err, VaultError::SenderFrozen(account) if account == ALICE));
    assert_eq!(vault.balance_of(ALICE), shares);

    vault.unfreeze_account(ADMIN, ALICE).unwrap();
    vault.transfer(ALICE, BOB, half).unwrap();
    assert_eq!(vault.balance_of(ALICE), shares - half);
    assert_eq!(vault.balance_of(BOB), half);
}

#[test]
fn frozen_account_can_still_request() {
    let mut vault = setup();
    vault.freeze_account(ADMIN, ALICE).unwrap();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();
    assert!(vault.deposit(ADMIN, units(10), ALICE, ALICE).is_ok());
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[test]
fn unauthorized_calls_are_typed() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(10), ALICE, ALICE).unwrap();

    for err in [
        vault.deposit(BOB, units(10), ALICE, ALICE).unwrap_err(),
        vault.pause(BOB).unwrap_err(),
        vault.set_price(BOB, units(2)).unwrap_err(),
        vault.cancel_deposit(BOB, ALICE).unwrap_err(),
        vault.freeze_account(BOB, ALICE).unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Unauthorized, "{err}");
    }
}

#[test]
fn revoked_operator_loses_access() {
    let mut vault = setup();
    vault.set_operator(ALICE, OPERATOR, true).unwrap();
    vault.request_deposit(OPERATOR, units(1), ALICE, ALICE).unwrap();
    vault.set_operator(ALICE, OPERATOR, false).unwrap();
    assert!(!vault.is_operator(ALICE, OPERATOR));
    assert!(matches!(
        vault.request_redeem(OPERATOR, U256::from(1), ALICE, ALICE),
        Err(VaultError::NotOperator { .. })
    ));
}

#[test]
fn pending_and_claimable_never_both_nonzero() {
    let mut vault = setup();
    let check = |v: &TokenVault| {
        let p = v.pending_deposit_request(ALICE);
        let c = v.claimable_deposit_request(ALICE);
        assert!(p.is_zero() || c.is_zero());
    };
    check(&vault);
    vault.request_deposit(ALICE, units(3), ALICE, ALICE).unwrap();
    check(&vault);
    vault.make_deposit_claimable(ADMIN, ALICE).unwrap();
    check(&vault);
    vault.deposit(ADMIN, units(3), ALICE, ALICE).unwrap();
    check(&vault);
}
