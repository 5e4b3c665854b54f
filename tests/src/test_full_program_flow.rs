use std::sync::Arc;
use std::time::Duration;

use ballot_cli::{MerkleAccumulator, WhitelistSnapshot};
use ballot_registry::{
    merkle_helper::identity_leaf, ErrorCode, Identity, ProgramConfig, RegistryEvent, EMPTY_ROOT,
};
use proof_service::{database::Database, LocalLedger, ProofService, RetryPolicy, RootPublisher};

use crate::utils::{
    assert::assert_rejected, data_types::ProgramTestContext, fetch_utils::*, merkle::*,
};

fn test_ballot_scenario(context: &ProgramTestContext, ballot_id: u64) -> anyhow::Result<()> {
    let ledger = &context.ledger;
    let service = &context.service;
    let (a, b) = (context.voters[0], context.voters[1]);

    // A votes for "Y"
    let proof = service.generate_proof(ballot_id, &a);
    assert!(proof.is_whitelisted);
    ledger.vote(a, ballot_id, 1, &proof.proof)?;

    assert_eq!(ledger.view(|r| r.get_vote_count(ballot_id, 1))?, 1);
    assert!(ledger.view(|r| r.has_voted(ballot_id, &a))?);
    assert!(!ledger.view(|r| r.has_voted(ballot_id, &b))?);

    // One vote per identity, whatever proposal it targets
    for index in 0..2 {
        assert_rejected(
            ledger.vote(a, ballot_id, index, &proof.proof),
            ErrorCode::AlreadyVoted,
        );
    }
    assert_eq!(vote_counts(context, ballot_id), vec![0, 1]);

    // Out of range proposal is checked before the proof
    let proof_b = service.generate_proof(ballot_id, &b);
    assert_rejected(
        ledger.vote(b, ballot_id, 2, &proof_b.proof),
        ErrorCode::InvalidProposal,
    );
    ledger.vote(b, ballot_id, 0, &proof_b.proof)?;
    assert_eq!(vote_counts(context, ballot_id), vec![1, 1]);

    let events = ledger.view(|r| Ok(r.events().to_vec()))?;
    assert!(events.contains(&RegistryEvent::VoteCast {
        ballot_id,
        identity: a,
        proposal_index: 1
    }));
    Ok(())
}

fn test_invalid_proofs(
    context: &ProgramTestContext,
    ballot_id: u64,
    other_ballot_id: u64,
) -> anyhow::Result<()> {
    let ledger = &context.ledger;
    let service = &context.service;
    let voter = context.voters[2];

    // Outsiders get no proof and cannot vote with a borrowed one
    let outsider = service.generate_proof(ballot_id, &context.outsider);
    assert!(!outsider.is_whitelisted);
    assert!(outsider.proof.is_empty());
    let borrowed = service.generate_proof(ballot_id, &voter);
    assert_rejected(
        ledger.vote(context.outsider, ballot_id, 0, &borrowed.proof),
        ErrorCode::InvalidProof,
    );

    // Forged siblings fail
    assert_rejected(
        ledger.vote(voter, ballot_id, 0, &forged_proof(borrowed.proof.len())),
        ErrorCode::InvalidProof,
    );

    // Membership does not carry across ballots
    let foreign = service.generate_proof(other_ballot_id, &voter);
    assert!(!foreign.is_whitelisted);
    assert_rejected(
        ledger.vote(voter, other_ballot_id, 0, &borrowed.proof),
        ErrorCode::InvalidProof,
    );

    // Failed votes leave no trace
    assert!(!ledger.view(|r| r.has_voted(ballot_id, &voter))?);
    assert_rejected(ledger.vote(voter, 999, 0, &[]), ErrorCode::UnknownBallot);
    Ok(())
}

async fn test_root_update_invalidates_old_proofs(
    context: &ProgramTestContext,
    ballot_id: u64,
) -> anyhow::Result<()> {
    let voter = context.voters[3];
    let stale = context.service.generate_proof(ballot_id, &voter);

    let newcomers = random_identities(3);
    let root = whitelist_and_sync(context, ballot_id, &newcomers).await?;
    assert_ne!(root, stale.merkle_root);

    assert_rejected(
        context.ledger.vote(voter, ballot_id, 0, &stale.proof),
        ErrorCode::InvalidProof,
    );

    let fresh = context.service.generate_proof(ballot_id, &voter);
    assert_eq!(fresh.merkle_root, root);
    context.ledger.vote(voter, ballot_id, 0, &fresh.proof)?;

    let newcomer = context.service.generate_proof(ballot_id, &newcomers[0]);
    context.ledger.vote(newcomers[0], ballot_id, 1, &newcomer.proof)?;
    Ok(())
}

fn test_closed_ballot(context: &ProgramTestContext, ballot_id: u64) -> anyhow::Result<()> {
    let ledger = &context.ledger;
    ledger.close_ballot(ballot_id)?;
    // Closing twice is a no-op
    ledger.close_ballot(ballot_id)?;
    assert!(!ledger.view(|r| r.is_active(ballot_id))?);

    let voter = context.voters[4];
    let proof = context.service.generate_proof(ballot_id, &voter);
    assert!(proof.is_whitelisted);
    for index in 0..2 {
        assert_rejected(
            ledger.vote(voter, ballot_id, index, &proof.proof),
            ErrorCode::BallotNotActive,
        );
    }

    let closed_events = ledger.view(|r| {
        Ok(r.events()
            .iter()
            .filter(|e| matches!(e, RegistryEvent::BallotClosed { ballot_id: id } if *id == ballot_id))
            .count())
    })?;
    assert_eq!(closed_events, 1);
    Ok(())
}

fn test_snapshot_matches_service(context: &ProgramTestContext, ballot_id: u64) -> anyhow::Result<()> {
    let tree = context.service.tree(ballot_id).expect("live tree");
    let snapshot = WhitelistSnapshot::build(ballot_id, tree.identities().to_vec())?;

    assert_eq!(snapshot.root, tree.root());
    assert_eq!(snapshot.root, context.ledger.fetch_root(ballot_id)?);
    assert!(snapshot.verify_integrity());

    for voter in &context.voters {
        let proof = snapshot.proof_for(voter).expect("voter in snapshot");
        assert!(MerkleAccumulator::verify(
            identity_leaf(voter),
            proof,
            &snapshot.root
        ));
    }
    Ok(())
}

fn test_validation(context: &ProgramTestContext) -> anyhow::Result<()> {
    let before = context.ledger.ballot_count();
    assert_rejected(
        context.ledger.create_ballot(EMPTY_ROOT, vec![]),
        ErrorCode::EmptyProposalList,
    );
    assert_eq!(context.ledger.ballot_count(), before);

    // Empty whitelist ballots accept no vote at all
    let id = create_ballot(context, &["only"]);
    assert_rejected(
        context.ledger.vote(context.voters[0], id, 0, &[]),
        ErrorCode::InvalidProof,
    );
    Ok(())
}

#[tokio::test]
async fn full_program_flow() {
    let operator = Identity::new([0xAA; 32]);
    let ledger = Arc::new(LocalLedger::new(ProgramConfig::default(), operator));
    let db = Database::in_memory().await.unwrap();
    let retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
    };
    let (service, _worker) = ProofService::start(db, ledger.clone(), retry).await.unwrap();

    let context = ProgramTestContext {
        ledger,
        service,
        voters: random_identities(5),
        outsider: Identity::new([0xEE; 32]),
    };

    let main_ballot = create_ballot(&context, &["X", "Y"]);
    let other_ballot = create_ballot(&context, &["X", "Y"]);
    assert_eq!((main_ballot, other_ballot), (0, 1));

    whitelist_and_sync(&context, main_ballot, &context.voters)
        .await
        .unwrap();
    whitelist_and_sync(&context, other_ballot, &random_identities(4))
        .await
        .unwrap();

    test_ballot_scenario(&context, main_ballot).unwrap();
    test_invalid_proofs(&context, main_ballot, other_ballot).unwrap();
    test_root_update_invalidates_old_proofs(&context, main_ballot)
        .await
        .unwrap();
    test_snapshot_matches_service(&context, main_ballot).unwrap();
    test_closed_ballot(&context, main_ballot).unwrap();
    test_validation(&context).unwrap();

    // The other ballot was never touched by votes on the first
    assert_eq!(vote_counts(&context, other_ballot), vec![0, 0]);
}
