use ballot_registry::{merkle_helper::identity_leaf, Digest, Identity};
use borsh::{BorshDeserialize, BorshSerialize};
use flate2::{write::GzEncoder, Compression};
use sha2::{Digest as _, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::merkle::{MerkleAccumulator, MerkleError};
use crate::utils::{decompress_gzip_with_limit, max_snapshot_bytes, read_all_with_limit};

/// Exported whitelist for one ballot, with a precomputed proof per identity.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct WhitelistSnapshot {
    /// Ballot the whitelist belongs to.
    pub ballot_id: u64,
    /// Root of the whitelist tree.
    pub root: [u8; 32],
    /// One entry per identity, in leaf order.
    pub entries: Vec<WhitelistSnapshotEntry>,
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct WhitelistSnapshotEntry {
    pub identity: [u8; 32],
    /// Proof to verify the identity's leaf against `root`.
    pub proof: Vec<[u8; 32]>,
}

impl WhitelistSnapshot {
    pub fn build(ballot_id: u64, identities: Vec<Identity>) -> Result<Self, MerkleError> {
        let tree = MerkleAccumulator::build(identities)?;
        Self::from_accumulator(ballot_id, &tree)
    }

    pub fn from_accumulator(ballot_id: u64, tree: &MerkleAccumulator) -> Result<Self, MerkleError> {
        let entries = tree
            .identities()
            .iter()
            .map(|identity| -> Result<WhitelistSnapshotEntry, MerkleError> {
                Ok(WhitelistSnapshotEntry {
                    identity: identity.to_bytes(),
                    proof: tree.proof(identity)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            ballot_id,
            root: tree.root(),
            entries,
        })
    }

    pub fn proof_for(&self, identity: &Identity) -> Option<&[Digest]> {
        self.entries
            .iter()
            .find(|entry| entry.identity == identity.to_bytes())
            .map(|entry| entry.proof.as_slice())
    }

    /// Rebuilds the tree from the stored identities and checks every stored proof.
    pub fn verify_integrity(&self) -> bool {
        let identities: Vec<Identity> = self.entries.iter().map(|e| Identity(e.identity)).collect();
        match MerkleAccumulator::build(identities) {
            Ok(tree) if tree.root() == self.root => self.entries.iter().all(|entry| {
                MerkleAccumulator::verify(
                    identity_leaf(&Identity(entry.identity)),
                    &entry.proof,
                    &self.root,
                )
            }),
            _ => false,
        }
    }

    pub fn save_compressed(&self, path: PathBuf) -> io::Result<()> {
        let data = self.try_to_vec()?;
        let file = File::create(path)?;
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(&data)?;
        enc.finish()?;

        Ok(())
    }

    pub fn save(&self, path: PathBuf) -> io::Result<()> {
        let data = self.try_to_vec()?;
        std::fs::write(path, data)
    }

    pub fn read(path: PathBuf, is_compressed: bool) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::read_from_bytes(bytes, is_compressed)
    }

    pub fn read_from_bytes(bytes: Vec<u8>, is_compressed: bool) -> io::Result<Self> {
        Self::read_from_bytes_with_hash(bytes, is_compressed).map(|(snapshot, _)| snapshot)
    }

    /// Parses a snapshot and returns it together with the SHA256 hash of its
    /// uncompressed bytes.
    pub fn read_from_bytes_with_hash(
        bytes: Vec<u8>,
        is_compressed: bool,
    ) -> io::Result<(Self, Digest)> {
        let limit = max_snapshot_bytes();
        let buf = if is_compressed {
            decompress_gzip_with_limit(&bytes[..], limit)?
        } else {
            read_all_with_limit(&bytes[..], limit)?
        };

        let hash: Digest = Sha256::digest(&buf).into();
        let snapshot = Self::try_from_slice(&buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok((snapshot, hash))
    }
}
