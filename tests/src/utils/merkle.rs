use ballot_registry::{Digest, Identity};
use rand::{thread_rng, Rng};

pub fn random_identities(n: usize) -> Vec<Identity> {
    let mut rng = thread_rng();
    (0..n).map(|_| Identity::new(rng.gen())).collect()
}

/// A proof of the right shape that no root accepts.
pub fn forged_proof(len: usize) -> Vec<Digest> {
    let mut rng = thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}
