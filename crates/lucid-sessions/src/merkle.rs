//! Merkle tree builder.
//!
//! Binary BLAKE3 tree over the encrypted chunks of a session, in sequence
//! order. Leaves are `BLAKE3(chunk_bytes)`, inner nodes
//! `BLAKE3(left || right)`; an odd node at any level is paired with itself.
//! Proof verification is a pure function and never consults persisted roots.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::{debug, info};

use lucid_crypto::hashing::blake3_hash;
use lucid_types::Hash32;

use crate::config::SessionPipelineConfig;
use crate::error::SessionError;

/// Root of a session's chunk tree, with shape metadata.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleRootInfo {
    pub session_id: String,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub root_hash: Hash32,
    pub tree_depth: u32,
    pub leaf_count: u32,
    pub total_nodes: u32,
    pub timestamp: DateTime<Utc>,
}

impl MerkleRootInfo {
    pub fn root_hex(&self) -> String {
        hex::encode(self.root_hash)
    }
}

/// Inclusion proof for one leaf.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub leaf_hash: Hash32,
    /// Sibling hash at each level, leaf upward.
    #[serde_as(as = "Vec<serde_with::hex::Hex>")]
    pub proof_path: Vec<Hash32>,
    pub leaf_index: u32,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub root_hash: Hash32,
}

/// Builds chunk trees and persists root metadata.
#[derive(Debug, Clone)]
pub struct MerkleTreeBuilder {
    output_dir: PathBuf,
}

fn combine(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left);
    buf[32..].copy_from_slice(right);
    blake3_hash(&buf)
}

/// Folds every level of the tree above `leaves`, returning the root and the
/// number of levels folded.
fn fold_to_root(mut level: Vec<Hash32>) -> (Hash32, u32, u32) {
    let mut depth = 0;
    let mut total_nodes = level.len() as u32;
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => combine(left, right),
                [odd] => combine(odd, odd),
                _ => unreachable!("chunks(2) yields one or two nodes"),
            })
            .collect();
        total_nodes += level.len() as u32;
        depth += 1;
    }
    (level[0], depth, total_nodes)
}

impl MerkleTreeBuilder {
    pub fn new(config: &SessionPipelineConfig) -> Self {
        Self {
            output_dir: config.merkle_dir.clone(),
        }
    }

    /// Creates the output directory. Must be called before building.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Builds the tree over encrypted chunk bytes in sequence order and
    /// persists the root metadata. Fails on an empty chunk list.
    pub async fn build_tree(
        &self,
        encrypted_chunks: &[(String, Vec<u8>)],
        session_id: &str,
    ) -> Result<MerkleRootInfo, SessionError> {
        let leaves: Vec<Hash32> = encrypted_chunks
            .par_iter()
            .map(|(_, bytes)| blake3_hash(bytes))
            .collect();
        let info = self.build_tree_from_leaves(leaves, session_id)?;
        self.persist_root(&info).await?;
        info!(
            session_id,
            depth = info.tree_depth,
            leaves = info.leaf_count,
            root = %&info.root_hex()[..16],
            "merkle tree built"
        );
        Ok(info)
    }

    /// Core tree construction over precomputed leaf hashes.
    pub fn build_tree_from_leaves(
        &self,
        leaves: Vec<Hash32>,
        session_id: &str,
    ) -> Result<MerkleRootInfo, SessionError> {
        if leaves.is_empty() {
            return Err(SessionError::EmptyChunkList);
        }
        let leaf_count = leaves.len() as u32;
        let (root_hash, tree_depth, total_nodes) = fold_to_root(leaves);
        Ok(MerkleRootInfo {
            session_id: session_id.to_string(),
            root_hash,
            tree_depth,
            leaf_count,
            total_nodes,
            timestamp: Utc::now(),
        })
    }

    /// Rebuilds the tree and collects the sibling at each level for the
    /// chunk at `chunk_index`.
    pub fn generate_proof(
        &self,
        root: &MerkleRootInfo,
        chunk_index: u32,
        encrypted_chunks: &[(String, Vec<u8>)],
    ) -> Result<MerkleProof, SessionError> {
        let leaf_count = encrypted_chunks.len() as u32;
        if chunk_index >= leaf_count {
            return Err(SessionError::ProofIndexOutOfRange {
                index: chunk_index,
                leaf_count,
            });
        }

        let mut level: Vec<Hash32> = encrypted_chunks
            .par_iter()
            .map(|(_, bytes)| blake3_hash(bytes))
            .collect();
        let leaf_hash = level[chunk_index as usize];

        let mut proof_path = Vec::new();
        let mut index = chunk_index as usize;
        while level.len() > 1 {
            let sibling = if index % 2 == 0 {
                // Odd level ends duplicate the last node as its own sibling.
                *level.get(index + 1).unwrap_or(&level[index])
            } else {
                level[index - 1]
            };
            proof_path.push(sibling);

            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => combine(left, right),
                    [odd] => combine(odd, odd),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            index /= 2;
        }

        debug!(chunk_index, "merkle proof generated");
        Ok(MerkleProof {
            leaf_hash,
            proof_path,
            leaf_index: chunk_index,
            root_hash: root.root_hash,
        })
    }

    /// Writes the root metadata sidecar for a session.
    pub async fn persist_root(&self, info: &MerkleRootInfo) -> Result<(), SessionError> {
        let path = self
            .output_dir
            .join(format!("{}_merkle_root.json", info.session_id));
        tokio::fs::write(&path, serde_json::to_vec_pretty(info)?).await?;
        Ok(())
    }

    /// Loads previously persisted root metadata, if any.
    pub async fn load_root(&self, session_id: &str) -> Result<Option<MerkleRootInfo>, SessionError> {
        let path = self.output_dir.join(format!("{session_id}_merkle_root.json"));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Removes persisted root metadata for a session.
    pub async fn cleanup_session(&self, session_id: &str) -> Result<bool, SessionError> {
        let path = self.output_dir.join(format!("{session_id}_merkle_root.json"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Verifies an inclusion proof by folding the path from the leaf upward.
///
/// At each level an even index combines as `H(current || sibling)`, an odd
/// index as `H(sibling || current)`.
pub fn verify_proof(proof: &MerkleProof) -> bool {
    let mut current = proof.leaf_hash;
    let mut index = proof.leaf_index as usize;
    for sibling in &proof.proof_path {
        current = if index % 2 == 0 {
            combine(&current, sibling)
        } else {
            combine(sibling, &current)
        };
        index /= 2;
    }
    current == proof.root_hash
}
