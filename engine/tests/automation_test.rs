//! Integration tests for the automated-fulfillment path: `check_log`,
//! `perform_upkeep`, replay rejection and the `Keeper` poll/sweep loop.

use alloy_primitives::{Address, U256};
use tokenvault_engine::config::PRICE_SCALE;
use tokenvault_engine::{
    Erc20Ledger, Keeper, PendingRequestScanner, PerformData, SharedVault, TokenVault, VaultError,
    VaultEvent, VaultInit,
};

const VAULT: Address = Address::repeat_byte(0x11);
const TOKEN: Address = Address::repeat_byte(0xA5);
const ADMIN: Address = Address::repeat_byte(0xAD);
const SETTER: Address = Address::repeat_byte(0x9E);
const KEEPER: Address = Address::repeat_byte(0x4B);
const ALICE: Address = Address::repeat_byte(0xA1);
const BOB: Address = Address::repeat_byte(0xB0);

fn units(n: u64) -> U256 {
    U256::from(n) * U256::from(PRICE_SCALE)
}

/// Helper: vault with a keeper and two funded depositors.
fn setup() -> TokenVault {
    let mut token = Erc20Ledger::new(TOKEN, "TestToken", "TTK");
    for holder in [ALICE, BOB] {
        token.mint_to(holder, units(1_000)).unwrap();
        token.approve(holder, VAULT, U256::MAX);
    }
    let init = VaultInit::new(VAULT, TOKEN, "TestVault", "TVT", ADMIN, SETTER);
    let mut vault = TokenVault::new(init, token).unwrap();
    vault.grant_keeper_role(ADMIN, KEEPER).unwrap();
    vault
}

/// Helper: perform data for the most recent record.
fn payload_for_last(vault: &TokenVault) -> Vec<u8> {
    let record = vault.events().records().last().unwrap().clone();
    let check = vault.check_log(&record, &[]).unwrap();
    assert!(check.upkeep_needed);
    check.perform_data
}

// ---------------------------------------------------------------------------
// check_log / perform_upkeep
// ---------------------------------------------------------------------------

#[test]
fn upkeep_fulfills_to_controller() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(100), ALICE, ALICE).unwrap();
    let payload = payload_for_last(&vault);

    let shares = vault.perform_upkeep(KEEPER, &payload).unwrap();
    assert_eq!(vault.balance_of(ALICE), shares);
    assert_eq!(vault.pending_deposit_request(ALICE), U256::ZERO);

    let last = &vault.events().records().last().unwrap().event;
    assert!(matches!(last, VaultEvent::Deposit { sender, .. } if *sender == KEEPER));
}

#[test]
fn replayed_payload_is_rejected() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(100), ALICE, ALICE).unwrap();
    let payload = payload_for_last(&vault);

    vault.perform_upkeep(KEEPER, &payload).unwrap();
    let supply = vault.total_supply();
    let events = vault.events().len();

    let err = vault.perform_upkeep(KEEPER, &payload).unwrap_err();
    assert!(matches!(err, VaultError::NoMatchingRequest { .. }));
    assert_eq!(vault.total_supply(), supply);
    assert_eq!(vault.events().len(), events);
}

#[test]
fn replay_cannot_consume_a_later_identical_request() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(5), ALICE, ALICE).unwrap();
    let payload = payload_for_last(&vault);
    vault.perform_upkeep(KEEPER, &payload).unwrap();

    vault.request_deposit(ALICE, units(5), ALICE, ALICE).unwrap();
    assert!(vault.perform_upkeep(KEEPER, &payload).is_err());
    assert_eq!(vault.pending_deposit_request(ALICE), units(5));
}

#[test]
fn upkeep_respects_pause() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(5), ALICE, ALICE).unwrap();
    let payload = payload_for_last(&vault);
    vault.pause(ADMIN).unwrap();
    assert!(matches!(
        vault.perform_upkeep(KEEPER, &payload),
        Err(VaultError::ContractPaused)
    ));
}

#[test]
fn upkeep_works_on_claimable_requests() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(5), ALICE, ALICE).unwrap();
    let payload = payload_for_last(&vault);
    vault.make_deposit_claimable(KEEPER, ALICE).unwrap();
    assert!(vault.perform_upkeep(KEEPER, &payload).is_ok());
}

#[test]
fn redeem_requests_do_not_trigger_upkeep() {
    let mut vault = setup();
    vault.request_deposit(ALICE, units(5), ALICE, ALICE).unwrap();
    let payload = payload_for_last(&vault);
    let shares = vault.perform_upkeep(KEEPER, &payload).unwrap();

    vault.request_redeem(ALICE, shares, ALICE, ALICE).unwrap();
    let record = vault.events().records().last().unwrap().clone();
    assert!(matches!(record.event, VaultEvent::RedeemRequest { .. }));
    assert!(!vault.check_log(&record, &[]).unwrap().upkeep_needed);
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

#[test]
fn keeper_poll_fulfills_new_requests_once() {
    let shared = SharedVault::new(setup());
    let mut keeper = Keeper::new(KEEPER);

    shared.write(|v| v.request_deposit(ALICE, units(10), ALICE, ALICE)).unwrap();
    shared.write(|v| v.request_deposit(BOB, units(20), BOB, BOB)).unwrap();

    let report = keeper.poll(&shared);
    assert_eq!(report.fulfilled.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.fulfilled[0].request.controller, ALICE);
    assert_eq!(report.fulfilled[1].request.controller, BOB);

    // The keeper's own fulfillment events are observed but need nothing.
    let report = keeper.poll(&shared);
    assert!(report.observed > 0);
    assert!(report.is_idle());

    let report = keeper.poll(&shared);
    assert_eq!(report.observed, 0);
    assert_eq!(keeper.cursor(), shared.read(|v| v.events().next_cursor()));
}

#[test]
fn keeper_reports_requests_cancelled_before_perform() {
    let shared = SharedVault::new(setup());
    let mut keeper = Keeper::new(KEEPER);

    shared.write(|v| v.request_deposit(ALICE, units(10), ALICE, ALICE)).unwrap();
    shared.write(|v| v.cancel_deposit(ALICE, ALICE)).unwrap();

    let report = keeper.poll(&shared);
    assert!(report.fulfilled.is_empty());
    assert_eq!(report.failed.len(), 1);
    let failure = &report.failed[0];
    assert_eq!(failure.request.map(|r| r.controller), Some(ALICE));
    assert!(matches!(failure.error, VaultError::NoMatchingRequest { .. }));
}

#[test]
fn keeper_without_role_reports_every_failure() {
    let shared = SharedVault::new(setup());
    let mut keeper = Keeper::new(BOB);

    shared.write(|v| v.request_deposit(ALICE, units(10), ALICE, ALICE)).unwrap();
    let report = keeper.poll(&shared);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].error, VaultError::MissingRole { .. }));
    assert_eq!(shared.read(|v| v.pending_deposit_request(ALICE)), units(10));
}

#[test]
fn sweep_picks_up_requests_the_log_never_showed() {
    let shared = SharedVault::new(setup());
    shared.write(|v| v.request_deposit(ALICE, units(10), ALICE, ALICE)).unwrap();

    // A keeper that starts past the request's record.
    let cursor = shared.read(|v| v.events().next_cursor());
    let mut keeper = Keeper::starting_at(KEEPER, cursor);
    assert!(keeper.poll(&shared).is_idle());

    assert_eq!(shared.read(|v| v.pending_deposits()).len(), 1);
    let report = keeper.sweep(&shared);
    assert_eq!(report.fulfilled.len(), 1);
    assert_eq!(report.fulfilled[0].request.assets, units(10));
    assert!(shared.read(|v| v.pending_deposits()).is_empty());
}

#[test]
fn scanner_orders_by_request_id() {
    let mut vault = setup();
    vault.request_deposit(BOB, units(2), BOB, BOB).unwrap();
    vault.request_deposit(ALICE, units(1), ALICE, ALICE).unwrap();
    let pending: Vec<PerformData> = vault.pending_deposits();
    let ids: Vec<u64> = pending.iter().map(|p| p.request_id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(pending[0].controller, BOB);
}

#[tokio::test]
async fn subscribers_receive_request_events() {
    let shared = SharedVault::new(setup());
    let mut rx = shared.subscribe();

    let writer = shared.clone();
    tokio::spawn(async move {
        writer
            .write(|v| v.request_deposit(ALICE, units(3), ALICE, ALICE))
            .unwrap();
    })
    .await
    .unwrap();

    let record = rx.recv().await.unwrap();
    assert!(matches!(
        record.event,
        VaultEvent::DepositRequest { controller, .. } if controller == ALICE
    ));
    let check = shared.read(|v| v.check_log(&record, &[])).unwrap();
    assert!(check.upkeep_needed);
}
