mod support;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use parity_launchpad::errors::SubmissionError;
use parity_launchpad::ledger::LedgerErrorKind;
use parity_launchpad::submission::{OutcomeProbe, PROCESSED_BUT_NOT_FOUND};
use parity_launchpad::wallet::KeypairWallet;
use solana_sdk::pubkey::Pubkey;
use support::{
    submission, test_blockhash, unsigned_tx, ConfirmCall, ConfirmScript, DisconnectedWallet,
    MockLedger, RejectingWallet, SendScript, LAST_VALID_BLOCK_HEIGHT,
};

struct FixedProbe {
    landed: bool,
    calls: AtomicUsize,
}

impl FixedProbe {
    fn new(landed: bool) -> Self {
        Self {
            landed,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl OutcomeProbe for FixedProbe {
    async fn has_landed(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.landed
    }
}

fn ledger(send: SendScript, confirm: ConfirmScript) -> Arc<MockLedger> {
    Arc::new(MockLedger::new(send, confirm))
}

#[tokio::test(start_paused = true)]
async fn rebroadcast_stops_when_confirmation_arrives() {
    let ledger = ledger(SendScript::Ok, ConfirmScript::OkAfter(Duration::from_secs(9)));
    let wallet = Arc::new(KeypairWallet::new_random());
    let tx = unsigned_tx(&wallet.address(), false);

    let expected_height = LAST_VALID_BLOCK_HEIGHT + 150;

    let sig = submission(ledger.clone(), wallet.clone())
        .submit_and_confirm(&tx, expected_height, None)
        .await
        .unwrap();
    assert_ne!(sig, solana_sdk::signature::Signature::default());

    // Initial send plus re-sends at 2, 4, 6 and 8 seconds.
    assert_eq!(ledger.send_count(), 5);
    for sent in ledger.sends() {
        assert!(sent.skip_preflight, "every send skips preflight");
        assert_eq!(sent.signature, sig);
    }
    assert_eq!(
        ledger.confirms(),
        vec![ConfirmCall {
            signature: sig,
            blockhash: test_blockhash(),
            last_valid_block_height: expected_height,
        }]
    );

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(ledger.send_count(), 5, "no sends after submit_and_confirm returned");
}

#[tokio::test(start_paused = true)]
async fn rebroadcast_gives_up_after_sixty_seconds() {
    let ledger = ledger(SendScript::Ok, ConfirmScript::ExpireAfter(Duration::from_secs(90)));
    let wallet = Arc::new(KeypairWallet::new_random());
    let tx = unsigned_tx(&wallet.address(), false);

    let err = submission(ledger.clone(), wallet)
        .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::ConfirmationTimeout { last_valid_block_height } if last_valid_block_height == LAST_VALID_BLOCK_HEIGHT
    ));

    let times = ledger.send_times();
    assert_eq!(times.len(), 31);
    let span = times[times.len() - 1] - times[0];
    assert!(span <= Duration::from_secs(60), "rebroadcast ran for {:?}", span);
}

#[tokio::test]
async fn accepts_legacy_and_versioned_encodings() {
    for versioned in [false, true] {
        let ledger = ledger(SendScript::Ok, ConfirmScript::OkAfter(Duration::from_millis(1)));
        let wallet = Arc::new(KeypairWallet::new_random());
        let tx = unsigned_tx(&wallet.address(), versioned);

        let res = submission(ledger, wallet)
            .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
            .await;
        assert!(res.is_ok(), "versioned={} failed: {:?}", versioned, res);
    }
}

#[tokio::test]
async fn malformed_transactions_fail_to_decode() {
    let wallet = Arc::new(KeypairWallet::new_random());
    let controller = submission(
        ledger(SendScript::Ok, ConfirmScript::OkAfter(Duration::from_millis(1))),
        wallet,
    );

    for bad in ["not base64!!".to_string(), STANDARD.encode([1u8, 2, 3, 4, 5])] {
        let err = controller
            .submit_and_confirm(&bad, LAST_VALID_BLOCK_HEIGHT, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Decode(_)), "{:?}", err);
    }
}

#[tokio::test]
async fn ambiguous_send_consults_the_probe() {
    for (landed, expect_ok) in [(true, true), (false, false)] {
        let ledger = ledger(
            SendScript::Ambiguous(LedgerErrorKind::AlreadyProcessed),
            ConfirmScript::OkAfter(Duration::from_millis(1)),
        );
        let wallet = Arc::new(KeypairWallet::new_random());
        let tx = unsigned_tx(&wallet.address(), false);
        let probe = FixedProbe::new(landed);

        let res = submission(ledger.clone(), wallet)
            .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, Some(&probe))
            .await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.send_count(), 1);
        if expect_ok {
            assert!(res.is_ok());
        } else {
            assert!(matches!(
                res,
                Err(SubmissionError::SubmissionFailed { ref reason }) if reason == PROCESSED_BUT_NOT_FOUND
            ));
        }
    }
}

#[tokio::test]
async fn ambiguous_send_without_probe_is_settled_by_confirmation() {
    let ledger = ledger(
        SendScript::Ambiguous(LedgerErrorKind::AlreadyProcessed),
        ConfirmScript::OkAfter(Duration::from_millis(1)),
    );
    let wallet = Arc::new(KeypairWallet::new_random());
    let tx = unsigned_tx(&wallet.address(), true);

    let sig = submission(ledger, wallet)
        .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
        .await
        .unwrap();
    assert_ne!(sig, solana_sdk::signature::Signature::default());
}

#[tokio::test]
async fn send_failure_reports_program_error_log() {
    let ledger = ledger(
        SendScript::Fail {
            message: "Transaction simulation failed".to_string(),
            logs: vec![
                "Program log: Instruction: Swap".to_string(),
                "Program log: Error: exceeded slippage tolerance".to_string(),
            ],
        },
        ConfirmScript::OkAfter(Duration::from_millis(1)),
    );
    let wallet = Arc::new(KeypairWallet::new_random());
    let tx = unsigned_tx(&wallet.address(), false);

    let err = submission(ledger.clone(), wallet)
        .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::SubmissionFailed { ref reason } if reason == "Program log: Error: exceeded slippage tolerance"
    ));
    assert_eq!(ledger.send_count(), 1);
}

#[tokio::test]
async fn on_chain_failure_is_a_submission_failure() {
    let ledger = ledger(SendScript::Ok, ConfirmScript::Fail("custom program error: 0x1771".to_string()));
    let wallet = Arc::new(KeypairWallet::new_random());
    let tx = unsigned_tx(&wallet.address(), false);

    let err = submission(ledger, wallet)
        .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::SubmissionFailed { ref reason } if reason.contains("0x1771")
    ));
}

#[tokio::test]
async fn wallet_problems_stop_before_sending() {
    let l = ledger(SendScript::Ok, ConfirmScript::OkAfter(Duration::from_millis(1)));
    let payer = Pubkey::new_unique();
    let tx = unsigned_tx(&payer, false);

    let err = submission(l.clone(), Arc::new(RejectingWallet(payer)))
        .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::UserRejected));
    assert!(err.is_cancellation());

    let err = submission(l.clone(), Arc::new(DisconnectedWallet))
        .submit_and_confirm(&tx, LAST_VALID_BLOCK_HEIGHT, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::WalletNotConnected));

    assert_eq!(l.send_count(), 0);
}
