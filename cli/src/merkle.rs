//! Merkle accumulator over a ballot's whitelist.
//!
//! Leaves are `hash_leaf(identity)`; parents hash their two children in sorted
//! order. Leaves are sorted before the tree is built, so the root depends only
//! on the set of identities and not on the order they were added in.
//!
//! Odd levels: the last node of a level with an odd number of nodes is promoted
//! unchanged to the next level and contributes no sibling to proofs at that
//! level. Verification needs no special case for it.

use std::collections::{BTreeSet, HashMap};

use ballot_registry::{
    merkle_helper::{hash_intermediate, identity_leaf, verify},
    Digest, Identity, EMPTY_ROOT,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("whitelist is empty")]
    EmptyWhitelist,
    #[error("identity {0} is not whitelisted")]
    NotWhitelisted(Identity),
}

#[derive(Debug, Clone)]
pub struct MerkleAccumulator {
    /// Identities in leaf order.
    identities: Vec<Identity>,
    /// Position of each identity's leaf in `levels[0]`.
    leaf_index: HashMap<Identity, usize>,
    /// `levels[0]` holds the sorted leaves; the last level holds the root alone.
    levels: Vec<Vec<Digest>>,
}

// Never empty: `build` refuses an empty whitelist.
#[allow(clippy::len_without_is_empty)]
impl MerkleAccumulator {
    /// Builds the tree for a set of identities. Duplicates are ignored.
    pub fn build<I>(identities: I) -> Result<Self, MerkleError>
    where
        I: IntoIterator<Item = Identity>,
    {
        let unique: BTreeSet<Identity> = identities.into_iter().collect();
        if unique.is_empty() {
            return Err(MerkleError::EmptyWhitelist);
        }

        let mut leaves: Vec<(Digest, Identity)> = unique
            .into_iter()
            .map(|identity| (identity_leaf(&identity), identity))
            .collect();
        leaves.sort_unstable();

        let identities: Vec<Identity> = leaves.iter().map(|(_, identity)| *identity).collect();
        let leaf_index = identities
            .iter()
            .enumerate()
            .map(|(idx, identity)| (*identity, idx))
            .collect();

        let mut levels = vec![leaves.into_iter().map(|(leaf, _)| leaf).collect::<Vec<_>>()];
        while levels[levels.len() - 1].len() > 1 {
            let next = levels[levels.len() - 1]
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_intermediate(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        Ok(Self {
            identities,
            leaf_index,
            levels,
        })
    }

    pub fn root(&self) -> Digest {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.leaf_index.contains_key(identity)
    }

    /// Identities in leaf order.
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Tree height, counting the leaf level.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Sibling digests from the identity's leaf up to the root.
    pub fn proof(&self, identity: &Identity) -> Result<Vec<Digest>, MerkleError> {
        let mut idx = *self
            .leaf_index
            .get(identity)
            .ok_or(MerkleError::NotWhitelisted(*identity))?;

        let mut proof = Vec::with_capacity(self.levels.len());
        for level in &self.levels[..self.levels.len() - 1] {
            // A promoted node has no sibling at this level.
            if let Some(sibling) = level.get(idx ^ 1) {
                proof.push(*sibling);
            }
            idx /= 2;
        }
        Ok(proof)
    }

    /// Checks `proof` for `leaf` against `root`. Never panics.
    pub fn verify(leaf: Digest, proof: &[Digest], root: &Digest) -> bool {
        verify(leaf, proof, root)
    }
}

/// Root for a whitelist, failing on an empty set.
pub fn build_root<I>(identities: I) -> Result<Digest, MerkleError>
where
    I: IntoIterator<Item = Identity>,
{
    MerkleAccumulator::build(identities).map(|tree| tree.root())
}

/// Root for a whitelist, using [`EMPTY_ROOT`] when there are no identities.
pub fn root_or_empty<I>(identities: I) -> Digest
where
    I: IntoIterator<Item = Identity>,
{
    build_root(identities).unwrap_or(EMPTY_ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{seq::SliceRandom, thread_rng, Rng};

    fn random_identities(n: usize) -> Vec<Identity> {
        let mut rng = thread_rng();
        (0..n).map(|_| Identity::new(rng.gen())).collect()
    }

    #[test]
    fn test_every_member_verifies() {
        for n in 1..=17 {
            let whitelist = random_identities(n);
            let tree = MerkleAccumulator::build(whitelist.clone()).unwrap();
            assert_eq!(tree.len(), n);
            for identity in &whitelist {
                let proof = tree.proof(identity).unwrap();
                assert!(
                    MerkleAccumulator::verify(identity_leaf(identity), &proof, &tree.root()),
                    "member of a {}-leaf tree failed to verify",
                    n
                );
            }
        }
    }

    #[test]
    fn test_root_is_order_independent() {
        let mut whitelist = random_identities(11);
        let root = build_root(whitelist.clone()).unwrap();
        for _ in 0..5 {
            whitelist.shuffle(&mut thread_rng());
            assert_eq!(build_root(whitelist.clone()).unwrap(), root);
        }

        let mut with_duplicates = whitelist.clone();
        with_duplicates.extend_from_slice(&whitelist[..3]);
        assert_eq!(build_root(with_duplicates).unwrap(), root);
    }

    #[test]
    fn test_non_member() {
        let whitelist = random_identities(6);
        let tree = MerkleAccumulator::build(whitelist.clone()).unwrap();
        let outsider = Identity::new([0xFF; 32]);

        assert!(!tree.contains(&outsider));
        assert_eq!(
            tree.proof(&outsider),
            Err(MerkleError::NotWhitelisted(outsider))
        );

        // A member's proof does not carry over to another identity.
        let borrowed = tree.proof(&whitelist[0]).unwrap();
        assert!(!MerkleAccumulator::verify(
            identity_leaf(&outsider),
            &borrowed,
            &tree.root()
        ));

        let forged: Vec<Digest> = random_identities(3).iter().map(|i| i.to_bytes()).collect();
        assert!(!MerkleAccumulator::verify(
            identity_leaf(&outsider),
            &forged,
            &tree.root()
        ));
    }

    #[test]
    fn test_empty_whitelist() {
        assert_eq!(
            MerkleAccumulator::build(Vec::new()).unwrap_err(),
            MerkleError::EmptyWhitelist
        );
        assert_eq!(root_or_empty(Vec::new()), EMPTY_ROOT);
    }

    #[test]
    fn test_single_member_tree() {
        let alice = Identity::new([4; 32]);
        let tree = MerkleAccumulator::build([alice]).unwrap();
        assert_eq!(tree.root(), identity_leaf(&alice));
        assert!(tree.proof(&alice).unwrap().is_empty());
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_promoted_node_has_short_proof() {
        // Three leaves: the third is promoted past the first level.
        let whitelist = random_identities(3);
        let tree = MerkleAccumulator::build(whitelist).unwrap();
        let promoted = tree.identities()[2];
        assert_eq!(tree.proof(&promoted).unwrap().len(), 1);
        assert_eq!(tree.proof(&tree.identities()[0]).unwrap().len(), 2);
    }

    #[test]
    fn test_root_changes_with_membership() {
        let whitelist = random_identities(4);
        let before = build_root(whitelist.clone()).unwrap();
        let mut grown = whitelist.clone();
        grown.push(Identity::new([1; 32]));
        let after = build_root(grown).unwrap();
        assert_ne!(before, after);

        // Proof against the old root fails for a still-whitelisted identity.
        let old_tree = MerkleAccumulator::build(whitelist.clone()).unwrap();
        let stale = old_tree.proof(&whitelist[0]).unwrap();
        assert!(!MerkleAccumulator::verify(
            identity_leaf(&whitelist[0]),
            &stale,
            &after
        ));
    }
}
