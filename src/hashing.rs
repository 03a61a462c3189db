// src/hashing.rs
//! Hashing and identity layer
//!
//! Every identifier in the ledger is a Keccak-256 digest over a packed,
//! big-endian, fixed-width encoding of its fields:
//! - `bytes32` fields are written as their 32 raw bytes
//! - `uint256` fields are written as 32-byte big-endian integers
//! - `uint64` fields are written as 8-byte big-endian integers
//! - `bool` fields are written as a single byte
//!
//! All functions here are pure.

use sha3::{Digest, Keccak256};

use crate::types::{Address, ChildType, Hash, TimeTicks};

/// Type code of an empty tuple value
const TUPLE_TYPE_CODE: u8 = 3;

/// Hash of the empty tuple, the initial inbox top
pub fn empty_tuple_hash() -> Hash {
    PackedEncoder::new().uint8(TUPLE_TYPE_CODE).finish()
}

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Builder for packed encodings
#[derive(Debug, Default, Clone)]
pub struct PackedEncoder {
    buf: Vec<u8>,
}

impl PackedEncoder {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(160) }
    }

    pub fn bytes32(mut self, value: &Hash) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn address(mut self, value: &Address) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn uint256(mut self, value: u128) -> Self {
        self.buf.extend_from_slice(&[0u8; 16]);
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn ticks(self, value: TimeTicks) -> Self {
        self.uint256(value.value())
    }

    pub fn uint64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn uint8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn boolean(self, value: bool) -> Self {
        self.uint8(u8::from(value))
    }

    /// Encoded bytes so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Hash the encoded bytes
    pub fn finish(self) -> Hash {
        keccak256(&self.buf)
    }
}

/// Keccak of two concatenated 32-byte values
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    PackedEncoder::new().bytes32(left).bytes32(right).finish()
}

/// Inner hash of a node: everything except the parent
///
/// This is the value a path proof carries for each step, so that folding a
/// parent with it reproduces [`node_hash`].
pub fn node_inner_hash_raw(
    proto_state_hash: &Hash,
    deadline: TimeTicks,
    data_hash: &Hash,
    rank: u64,
) -> Hash {
    PackedEncoder::new()
        .bytes32(proto_state_hash)
        .ticks(deadline)
        .bytes32(data_hash)
        .uint256(u128::from(rank))
        .finish()
}

pub fn node_inner_hash(
    proto_state_hash: &Hash,
    deadline: TimeTicks,
    data_hash: &Hash,
    child_type: ChildType,
) -> Hash {
    node_inner_hash_raw(proto_state_hash, deadline, data_hash, child_type.rank())
}

/// Identifier of a child node
pub fn node_hash(
    parent: &Hash,
    proto_state_hash: &Hash,
    deadline: TimeTicks,
    data_hash: &Hash,
    child_type: ChildType,
) -> Hash {
    hash_pair(parent, &node_inner_hash(proto_state_hash, deadline, data_hash, child_type))
}

/// Identifier of the root node of a fresh rollup
pub fn genesis_node_hash(vm_proto_hash: &Hash) -> Hash {
    let inner = node_inner_hash_raw(vm_proto_hash, TimeTicks::zero(), &Hash::zero(), 0);
    hash_pair(&Hash::zero(), &inner)
}

/// Challenge data for a disputed inbox top
pub fn inbox_top_challenge_data_hash(lower_hash: &Hash, top_hash: &Hash, chain_length: u128) -> Hash {
    PackedEncoder::new()
        .bytes32(lower_hash)
        .bytes32(top_hash)
        .uint256(chain_length)
        .finish()
}

/// Challenge data for a disputed message import
pub fn message_challenge_data_hash(
    inbox_start: &Hash,
    inbox_end: &Hash,
    messages_start: &Hash,
    messages_end: &Hash,
    import_length: u128,
) -> Hash {
    PackedEncoder::new()
        .bytes32(inbox_start)
        .bytes32(inbox_end)
        .bytes32(messages_start)
        .bytes32(messages_end)
        .uint256(import_length)
        .finish()
}

/// Challenge data for a disputed execution
pub fn execution_data_hash(num_steps: u64, precondition_hash: &Hash, assertion_hash: &Hash) -> Hash {
    PackedEncoder::new()
        .uint64(num_steps)
        .bytes32(precondition_hash)
        .bytes32(assertion_hash)
        .finish()
}

/// Node data hash of an invalid child: challenge data plus the challenge period
pub fn challenge_node_data_hash(challenge_data_hash: &Hash, challenge_period: TimeTicks) -> Hash {
    PackedEncoder::new()
        .bytes32(challenge_data_hash)
        .ticks(challenge_period)
        .finish()
}

/// Deterministic address for the `nonce`-th contract created by `creator`
pub fn derive_address(creator: &Address, nonce: u64) -> Address {
    let digest = PackedEncoder::new().address(creator).uint64(nonce).finish();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest.as_bytes()[12..]);
    Address(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_known_vector() {
        // keccak256("") is a well-known constant
        assert_eq!(
            keccak256(&[]).to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_packed_widths() {
        let enc = PackedEncoder::new()
            .bytes32(&Hash([1; 32]))
            .uint256(5)
            .uint64(7)
            .boolean(true);
        let bytes = enc.as_bytes();
        assert_eq!(bytes.len(), 32 + 32 + 8 + 1);
        assert_eq!(bytes[63], 5);
        assert_eq!(bytes[32..63], [0u8; 31]);
        assert_eq!(bytes[71], 7);
        assert_eq!(bytes[72], 1);
    }

    #[test]
    fn test_node_hash_is_parent_plus_inner() {
        let parent = Hash([9; 32]);
        let proto = Hash([1; 32]);
        let data = Hash([2; 32]);
        let inner = node_inner_hash(&proto, TimeTicks(40), &data, ChildType::Valid);
        assert_eq!(
            node_hash(&parent, &proto, TimeTicks(40), &data, ChildType::Valid),
            hash_pair(&parent, &inner)
        );
    }

    #[test]
    fn test_node_hash_depends_on_every_field() {
        let base = node_hash(&Hash([9; 32]), &Hash([1; 32]), TimeTicks(40), &Hash([2; 32]), ChildType::Valid);
        assert_ne!(base, node_hash(&Hash([8; 32]), &Hash([1; 32]), TimeTicks(40), &Hash([2; 32]), ChildType::Valid));
        assert_ne!(base, node_hash(&Hash([9; 32]), &Hash([0; 32]), TimeTicks(40), &Hash([2; 32]), ChildType::Valid));
        assert_ne!(base, node_hash(&Hash([9; 32]), &Hash([1; 32]), TimeTicks(41), &Hash([2; 32]), ChildType::Valid));
        assert_ne!(base, node_hash(&Hash([9; 32]), &Hash([1; 32]), TimeTicks(40), &Hash([3; 32]), ChildType::Valid));
        assert_ne!(
            base,
            node_hash(&Hash([9; 32]), &Hash([1; 32]), TimeTicks(40), &Hash([2; 32]), ChildType::InvalidExecution)
        );
    }

    #[test]
    fn test_genesis_matches_rank_zero_child_of_zero() {
        let proto = Hash([4; 32]);
        assert_eq!(
            genesis_node_hash(&proto),
            node_hash(&Hash::zero(), &proto, TimeTicks::zero(), &Hash::zero(), ChildType::InvalidPendingTop)
        );
    }

    /// 32-byte big-endian word
    fn word(value: u128) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[16..].copy_from_slice(&value.to_be_bytes());
        out
    }

    fn concat(parts: &[&[u8]]) -> Hash {
        keccak256(&parts.concat())
    }

    #[test]
    fn test_genesis_known_bytes() {
        let machine = [0x42u8; 32];
        let empty_tuple = keccak256(&[3]);
        let proto = concat(&[&machine, &empty_tuple.0, &word(0)]);
        let inner = concat(&[&proto.0, &word(0), &[0u8; 32], &word(0)]);
        let expected = concat(&[&[0u8; 32], &inner.0]);

        assert_eq!(empty_tuple_hash(), empty_tuple);
        assert_eq!(genesis_node_hash(&proto), expected);
    }

    #[test]
    fn test_node_hash_known_bytes() {
        let inner = concat(&[&[1u8; 32], &word(20_003), &[2u8; 32], &word(1)]);
        let expected = concat(&[&[9u8; 32], &inner.0]);
        assert_eq!(
            node_hash(&Hash([9; 32]), &Hash([1; 32]), TimeTicks(20_003), &Hash([2; 32]), ChildType::InvalidMessages),
            expected
        );
    }

    #[test]
    fn test_challenge_data_known_bytes() {
        let (a, b, c, d) = ([1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]);

        assert_eq!(
            inbox_top_challenge_data_hash(&Hash(a), &Hash(b), 7),
            concat(&[&a, &b, &word(7)])
        );
        assert_eq!(
            message_challenge_data_hash(&Hash(a), &Hash(b), &Hash(c), &Hash(d), 5),
            concat(&[&a, &b, &c, &d, &word(5)])
        );
        assert_eq!(
            execution_data_hash(500, &Hash(a), &Hash(b)),
            concat(&[&500u64.to_be_bytes(), &a, &b])
        );
        assert_eq!(
            challenge_node_data_hash(&Hash(c), TimeTicks(11_000)),
            concat(&[&c, &word(11_000)])
        );
    }

    #[test]
    fn test_derive_address_known_bytes() {
        let digest = concat(&[&[7u8; 20], &3u64.to_be_bytes()]);
        assert_eq!(derive_address(&Address([7; 20]), 3).0[..], digest.0[12..]);
    }

    #[test]
    fn test_derive_address_varies_with_nonce() {
        let creator = Address([7; 20]);
        assert_ne!(derive_address(&creator, 0), derive_address(&creator, 1));
        assert_eq!(derive_address(&creator, 3), derive_address(&creator, 3));
    }
}
