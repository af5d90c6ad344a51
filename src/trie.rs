//! Modified Merkle-Patricia trie matching the remote ledger's receipt
//! trie, with inclusion proofs emitted as a self-contained witness.
//!
//! Nodes are owned values: the trie is built fresh for each verification
//! pass and consumed, so there is no shared node database. A node's
//! reference is its RLP when shorter than 32 bytes, otherwise the keccak
//! of its RLP; the root reference is always the hash.

use std::collections::HashMap;

use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::rlp::{self, CodecError, Item};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProofError {
    #[error("node not present in proof: {0}")]
    MissingNode(B256),

    #[error("node hash does not match its reference: expected {expected}")]
    HashMismatch { expected: B256 },

    #[error("path diverges from the trie at nibble offset {offset}")]
    Divergence { offset: usize },

    #[error("key not present in trie")]
    KeyAbsent,

    #[error("malformed trie node: {0}")]
    MalformedNode(&'static str),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Inclusion witness: every node on the root-to-value path, keyed by its
/// reference bytes (32-byte hash, or the inline RLP for short nodes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieProof {
    nodes: HashMap<Vec<u8>, Vec<u8>>,
}

impl TrieProof {
    pub fn insert(&mut self, reference: Vec<u8>, encoded: Vec<u8>) {
        self.nodes.insert(reference, encoded);
    }

    pub fn get(&self, reference: &[u8]) -> Option<&[u8]> {
        self.nodes.get(reference).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Empty,
    Leaf {
        path: Vec<u8>,
        value: Vec<u8>,
    },
    Extension {
        path: Vec<u8>,
        child: Box<Node>,
    },
    Branch {
        children: [Option<Box<Node>>; 16],
        value: Option<Vec<u8>>,
    },
}

impl Node {
    fn empty_branch() -> Node {
        Node::Branch {
            children: Default::default(),
            value: None,
        }
    }
}

/// Append-only Merkle-Patricia trie.
#[derive(Debug, Clone, Default)]
pub struct PatriciaTrie {
    root: Option<Node>,
}

impl PatriciaTrie {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Insert a key/value pair, rewriting nodes along the touched path.
    /// Re-inserting an existing key overwrites its value.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) {
        let nibbles = to_nibbles(key);
        let root = self.root.take().unwrap_or(Node::Empty);
        self.root = Some(insert_node(root, &nibbles, value));
    }

    /// Root hash: keccak of the root node's RLP. The empty trie hashes the
    /// empty byte string.
    pub fn root_hash(&self) -> B256 {
        match &self.root {
            None => keccak256(rlp::encode_bytes(&[])),
            Some(root) => keccak256(encode_node(root)),
        }
    }

    /// Produce the inclusion witness for `key`: the ordered set of nodes
    /// visited from the root to the node holding the value, keyed by
    /// reference.
    pub fn prove(&self, key: &[u8]) -> Result<TrieProof, ProofError> {
        let nibbles = to_nibbles(key);
        let mut proof = TrieProof::default();
        let mut node = self.root.as_ref().ok_or(ProofError::KeyAbsent)?;
        let mut offset = 0usize;
        let mut at_root = true;

        loop {
            let encoded = encode_node(node);
            let reference = if at_root || encoded.len() >= 32 {
                keccak256(&encoded).to_vec()
            } else {
                encoded.clone()
            };
            proof.insert(reference, encoded);
            at_root = false;

            match node {
                Node::Empty => return Err(ProofError::KeyAbsent),
                Node::Leaf { path, .. } => {
                    if &nibbles[offset..] == path.as_slice() {
                        return Ok(proof);
                    }
                    return Err(ProofError::KeyAbsent);
                }
                Node::Extension { path, child } => {
                    if nibbles[offset..].starts_with(path) {
                        offset += path.len();
                        node = child;
                    } else {
                        return Err(ProofError::KeyAbsent);
                    }
                }
                Node::Branch { children, value } => {
                    if offset == nibbles.len() {
                        if value.is_some() {
                            return Ok(proof);
                        }
                        return Err(ProofError::KeyAbsent);
                    }
                    let idx = nibbles[offset] as usize;
                    match &children[idx] {
                        Some(child) => {
                            offset += 1;
                            node = child;
                        }
                        None => return Err(ProofError::KeyAbsent),
                    }
                }
            }
        }
    }
}

/// Reconstruct the path for `key` from a witness and return the proven
/// value. Fails if a node is missing, a reference does not hash to its
/// node, or the path diverges.
pub fn verify_proof(
    root: B256,
    key: &[u8],
    proof: &TrieProof,
) -> Result<Vec<u8>, ProofError> {
    let nibbles = to_nibbles(key);
    let mut offset = 0usize;
    let mut encoded = lookup(proof, root)?;

    loop {
        let item = rlp::decode(&encoded)?;
        let parts = item.as_list()?;

        match parts.len() {
            2 => {
                let (path, is_leaf) = hp_decode(parts[0].as_bytes()?)?;
                if is_leaf {
                    if nibbles[offset..] != path[..] {
                        return Err(ProofError::Divergence { offset });
                    }
                    return Ok(parts[1].as_bytes()?.to_vec());
                }
                if !nibbles[offset..].starts_with(&path) {
                    return Err(ProofError::Divergence { offset });
                }
                offset += path.len();
                encoded = resolve_child(proof, &parts[1], offset)?;
            }
            17 => {
                if offset == nibbles.len() {
                    let value = parts[16].as_bytes()?;
                    if value.is_empty() {
                        return Err(ProofError::KeyAbsent);
                    }
                    return Ok(value.to_vec());
                }
                let idx = nibbles[offset] as usize;
                offset += 1;
                encoded = resolve_child(proof, &parts[idx], offset)?;
            }
            _ => return Err(ProofError::MalformedNode("expected 2 or 17 items")),
        }
    }
}

/// Follow a child reference: a 32-byte string is a hash looked up in the
/// witness; a nested list is an inline node; an empty string is a missing
/// child.
fn resolve_child(
    proof: &TrieProof,
    child: &Item,
    offset: usize,
) -> Result<Vec<u8>, ProofError> {
    match child {
        Item::Bytes(bytes) if bytes.len() == 32 => {
            lookup(proof, B256::from_slice(bytes))
        }
        Item::Bytes(bytes) if bytes.is_empty() => {
            Err(ProofError::Divergence { offset })
        }
        Item::Bytes(_) => Err(ProofError::MalformedNode("bad reference length")),
        Item::List(_) => Ok(rlp::encode_item(child)),
    }
}

fn lookup(proof: &TrieProof, reference: B256) -> Result<Vec<u8>, ProofError> {
    let encoded = proof
        .get(reference.as_slice())
        .ok_or(ProofError::MissingNode(reference))?;
    if keccak256(encoded) != reference {
        return Err(ProofError::HashMismatch {
            expected: reference,
        });
    }
    Ok(encoded.to_vec())
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn insert_node(node: Node, path: &[u8], value: Vec<u8>) -> Node {
    match node {
        Node::Empty => Node::Leaf {
            path: path.to_vec(),
            value,
        },
        Node::Leaf {
            path: leaf_path,
            value: leaf_value,
        } => {
            let common = common_prefix(&leaf_path, path);
            if common == leaf_path.len() && common == path.len() {
                return Node::Leaf {
                    path: leaf_path,
                    value,
                };
            }
            let mut branch = Node::empty_branch();
            place(&mut branch, &leaf_path[common..], leaf_value);
            place(&mut branch, &path[common..], value);
            wrap_extension(&path[..common], branch)
        }
        Node::Extension {
            path: ext_path,
            child,
        } => {
            let common = common_prefix(&ext_path, path);
            if common == ext_path.len() {
                return Node::Extension {
                    path: ext_path,
                    child: Box::new(insert_node(*child, &path[common..], value)),
                };
            }
            // Split at the divergence: the existing child drops under its
            // next nibble, shortened or promoted as needed.
            let mut branch = Node::empty_branch();
            let remainder = &ext_path[common + 1..];
            let demoted = if remainder.is_empty() {
                *child
            } else {
                Node::Extension {
                    path: remainder.to_vec(),
                    child,
                }
            };
            if let Node::Branch { children, .. } = &mut branch {
                children[ext_path[common] as usize] = Some(Box::new(demoted));
            }
            place(&mut branch, &path[common..], value);
            wrap_extension(&path[..common], branch)
        }
        Node::Branch {
            mut children,
            value: branch_value,
        } => {
            if path.is_empty() {
                return Node::Branch {
                    children,
                    value: Some(value),
                };
            }
            let idx = path[0] as usize;
            let child = children[idx]
                .take()
                .map(|boxed| *boxed)
                .unwrap_or(Node::Empty);
            children[idx] = Some(Box::new(insert_node(child, &path[1..], value)));
            Node::Branch {
                children,
                value: branch_value,
            }
        }
    }
}

/// Attach a remaining path to a branch: an empty remainder lands in the
/// value slot, otherwise the first nibble selects the child and the rest
/// becomes a leaf suffix.
fn place(branch: &mut Node, remainder: &[u8], value: Vec<u8>) {
    let Node::Branch { children, value: slot } = branch else {
        unreachable!("place is only called on branch nodes");
    };
    if remainder.is_empty() {
        *slot = Some(value);
    } else {
        children[remainder[0] as usize] = Some(Box::new(Node::Leaf {
            path: remainder[1..].to_vec(),
            value,
        }));
    }
}

fn wrap_extension(prefix: &[u8], node: Node) -> Node {
    if prefix.is_empty() {
        node
    } else {
        Node::Extension {
            path: prefix.to_vec(),
            child: Box::new(node),
        }
    }
}

fn encode_node(node: &Node) -> Vec<u8> {
    match node {
        Node::Empty => rlp::encode_bytes(&[]),
        Node::Leaf { path, value } => rlp::encode_list(&[
            rlp::encode_bytes(&hp_encode(path, true)),
            rlp::encode_bytes(value),
        ]),
        Node::Extension { path, child } => rlp::encode_list(&[
            rlp::encode_bytes(&hp_encode(path, false)),
            child_reference(child),
        ]),
        Node::Branch { children, value } => {
            let mut items = Vec::with_capacity(17);
            for child in children {
                items.push(match child {
                    Some(child) => child_reference(child),
                    None => rlp::encode_bytes(&[]),
                });
            }
            items.push(rlp::encode_bytes(value.as_deref().unwrap_or(&[])));
            rlp::encode_list(&items)
        }
    }
}

/// Encoded child reference as embedded in the parent: short nodes are
/// spliced inline, long ones are replaced by their hash.
fn child_reference(child: &Node) -> Vec<u8> {
    let encoded = encode_node(child);
    if encoded.len() >= 32 {
        rlp::encode_bytes(keccak256(&encoded).as_slice())
    } else {
        encoded
    }
}

fn to_nibbles(key: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(key.len() * 2);
    for byte in key {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// Hex-prefix encoding: a 4-bit flag distinguishing leaf/extension and
/// odd/even path length, then the nibbles packed two per byte.
fn hp_encode(nibbles: &[u8], leaf: bool) -> Vec<u8> {
    let flag = if leaf { 2u8 } else { 0u8 };
    let odd = nibbles.len() % 2 == 1;
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let rest = if odd {
        out.push((flag + 1) << 4 | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    for pair in rest.chunks(2) {
        out.push(pair[0] << 4 | pair[1]);
    }
    out
}

fn hp_decode(encoded: &[u8]) -> Result<(Vec<u8>, bool), ProofError> {
    let first = *encoded
        .first()
        .ok_or(ProofError::MalformedNode("empty path"))?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(ProofError::MalformedNode("bad hex-prefix flag"));
    }
    let leaf = flag & 2 != 0;
    let mut nibbles = Vec::new();
    if flag & 1 != 0 {
        nibbles.push(first & 0x0f);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    Ok((nibbles, leaf))
}
