use sha2::{Digest as _, Sha256};

use crate::{error::ErrorCode, Digest, Identity, Result};

macro_rules! hashv {
    ($($part:expr),+ $(,)?) => {{
        let mut hasher = Sha256::new();
        $(hasher.update($part);)+
        let out: Digest = hasher.finalize().into();
        out
    }};
}

// We need to discern between leaf and intermediate nodes to prevent trivial second
// pre-image attacks.
// https://flawed.net.nz/2018/02/21/attacking-merkle-trees-with-a-second-preimage-attack
const LEAF_PREFIX: &[u8] = &[0];
const INTERMEDIATE_PREFIX: &[u8] = &[1];

/// Upper bound on proof length. A tree this deep would hold more leaves than
/// can ever be stored, so longer proofs are rejected without hashing.
pub const MAX_PROOF_LEN: usize = 64;

pub fn hash_leaf(leaf_content: &[u8]) -> Digest {
    hashv!(LEAF_PREFIX, leaf_content)
}

/// Leaf digest for a voter identity.
pub fn identity_leaf(identity: &Identity) -> Digest {
    hash_leaf(identity.as_bytes())
}

/// Hashes two sibling nodes in sorted order, so the parent does not depend on
/// which side each child sits.
pub fn hash_intermediate(a: &Digest, b: &Digest) -> Digest {
    if a <= b {
        hashv!(INTERMEDIATE_PREFIX, a, b)
    } else {
        hashv!(INTERMEDIATE_PREFIX, b, a)
    }
}

/// Replays the sorted-pair hashing from `leaf` through `proof` and compares the
/// result with `root`.
pub fn verify(leaf: Digest, proof: &[Digest], root: &Digest) -> bool {
    if proof.len() > MAX_PROOF_LEN {
        return false;
    }
    let node = proof
        .iter()
        .fold(leaf, |node, sibling| hash_intermediate(&node, sibling));
    &node == root
}

/// Verifies a Merkle proof from a leaf's content and its sibling hashes.
///
/// Returns [`ErrorCode::InvalidProof`] if the reconstructed root doesn't match `root`.
pub fn verify_helper(leaf_content: &[u8], proof: &[Digest], root: &Digest) -> Result<()> {
    if !verify(hash_leaf(leaf_content), proof, root) {
        log::warn!(
            "Proof of {} siblings does not reach root {}",
            proof.len(),
            bs58::encode(root).into_string()
        );
        return Err(ErrorCode::InvalidProof);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_and_node_domains_differ() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let mut concat = Vec::new();
        concat.extend_from_slice(&a);
        concat.extend_from_slice(&b);
        assert_ne!(hash_leaf(&concat), hash_intermediate(&a, &b));
    }

    #[test]
    fn test_intermediate_is_order_independent() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(hash_intermediate(&a, &b), hash_intermediate(&b, &a));
    }

    #[test]
    fn test_verify_two_leaves() {
        let alice = Identity::new([10; 32]);
        let bob = Identity::new([20; 32]);
        let la = identity_leaf(&alice);
        let lb = identity_leaf(&bob);
        let root = hash_intermediate(&la, &lb);

        assert!(verify(la, &[lb], &root));
        assert!(verify(lb, &[la], &root));
        assert!(verify_helper(alice.as_bytes(), &[lb], &root).is_ok());
        assert_eq!(
            verify_helper(alice.as_bytes(), &[la], &root),
            Err(ErrorCode::InvalidProof)
        );
    }

    #[test]
    fn test_verify_single_leaf_tree() {
        let alice = Identity::new([10; 32]);
        let root = identity_leaf(&alice);
        assert!(verify(root, &[], &root));
        assert!(!verify(root, &[[0; 32]], &root));
    }

    #[test]
    fn test_verify_rejects_oversized_proof() {
        let leaf = [5u8; 32];
        let proof = vec![[0u8; 32]; MAX_PROOF_LEN + 1];
        assert!(!verify(leaf, &proof, &leaf));
    }
}
