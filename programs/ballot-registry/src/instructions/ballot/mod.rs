pub mod cast_vote;
pub mod close_ballot;
pub mod create_ballot;
pub mod update_merkle_root;
