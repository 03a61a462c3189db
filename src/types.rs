// src/types.rs
//! Primitive types shared by every rollup subsystem
//!
//! Identifiers are fixed-width byte arrays rendered as `0x`-prefixed hex.
//! Time is kept in two distinct units: raw block heights and the scaled
//! "time ticks" used for every deadline. The only conversion between the
//! two is [`TimeTicks::from_blocks`].

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of time ticks that elapse per block
pub const TICKS_PER_BLOCK: u128 = 1000;

/// Error returned when parsing a hex identifier fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    /// The input was not valid hex
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The input decoded to the wrong number of bytes
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| ParseIdError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseIdError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A 32-byte Keccak-256 digest
///
/// Node identifiers, path-proof elements and every challenge data hash are
/// values of this type.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The all-zero hash
    pub const fn zero() -> Self {
        Hash([0u8; 32])
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(Hash)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A 20-byte actor or contract address
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address
    pub const fn zero() -> Self {
        Address([0u8; 20])
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Address)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Raw block height reported by the chain source
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockHeight(pub u64);

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scaled time unit used for all deadlines
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeTicks(pub u128);

impl TimeTicks {
    pub const fn zero() -> Self {
        TimeTicks(0)
    }

    /// Ticks elapsed by the start of block `height`
    pub fn from_blocks(height: BlockHeight) -> Self {
        TimeTicks(u128::from(height.0).saturating_mul(TICKS_PER_BLOCK))
    }

    /// Saturating addition
    pub fn add(self, other: TimeTicks) -> Self {
        TimeTicks(self.0.saturating_add(other.0))
    }

    pub fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TimeTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ticks", self.0)
    }
}

/// Branch kind of a child node in the assertion tree
///
/// Variants are declared in rank order, so the derived `Ord` is the rank
/// order used when opening a challenge: `Valid` outranks every invalid
/// branch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum ChildType {
    /// The claimed inbox top does not match the pending inbox
    InvalidPendingTop,
    /// The imported message slice is not a prefix of the pending inbox
    InvalidMessages,
    /// The claimed execution is wrong
    InvalidExecution,
    /// The assertion is correct
    Valid,
}

impl ChildType {
    /// Highest rank held by an invalid branch
    pub const MAX_INVALID: ChildType = ChildType::InvalidExecution;

    /// Numeric rank hashed into node identifiers
    pub fn rank(&self) -> u64 {
        match self {
            ChildType::InvalidPendingTop => 0,
            ChildType::InvalidMessages => 1,
            ChildType::InvalidExecution => 2,
            ChildType::Valid => 3,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ChildType::Valid)
    }
}

/// Run state of the rollup's machine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum MachineStatus {
    /// Machine can keep executing
    Extensive,
    /// Machine hit an error and stopped
    ErrorStop,
    /// Machine halted normally
    Halt,
}

impl MachineStatus {
    /// Whether new assertions may extend the tree
    pub fn is_runnable(&self) -> bool {
        matches!(self, MachineStatus::Extensive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_round_trip() {
        let hash = Hash([0xab; 32]);
        let text = hash.to_string();
        assert!(text.starts_with("0xabab"));
        assert_eq!(text.parse::<Hash>().unwrap(), hash);

        // Prefix is optional when parsing
        let bare = hex::encode([0x01u8; 32]);
        assert_eq!(bare.parse::<Hash>().unwrap(), Hash([0x01; 32]));
    }

    #[test]
    fn test_ids_serialize_as_hex_strings() {
        let hash = Hash([0x0f; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "0f".repeat(32)));
        assert_eq!(serde_json::from_str::<Hash>(&json).unwrap(), hash);

        let address: Address = serde_json::from_str(&format!("\"0x{}\"", "ab".repeat(20))).unwrap();
        assert_eq!(address, Address([0xab; 20]));
        assert!(serde_json::from_str::<Address>("\"0x01\"").is_err());
        assert!(!hash.is_zero());
        assert!(Hash::zero().is_zero());
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let err = "0x0102".parse::<Address>().unwrap_err();
        assert_eq!(err, ParseIdError::InvalidLength { expected: 20, actual: 2 });
        assert!("0xzz".parse::<Address>().is_err());
    }

    #[test]
    fn test_ticks_from_blocks() {
        assert_eq!(TimeTicks::from_blocks(BlockHeight(0)), TimeTicks(0));
        assert_eq!(TimeTicks::from_blocks(BlockHeight(21)), TimeTicks(21_000));
        assert_eq!(TimeTicks(5).add(TimeTicks(7)), TimeTicks(12));
        assert_eq!(TimeTicks(u128::MAX).add(TimeTicks(1)), TimeTicks(u128::MAX));
    }

    #[test]
    fn test_child_type_ranks_follow_ordering() {
        let all = [
            ChildType::InvalidPendingTop,
            ChildType::InvalidMessages,
            ChildType::InvalidExecution,
            ChildType::Valid,
        ];
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
        assert_eq!(ChildType::MAX_INVALID.rank(), 2);
        assert!(ChildType::Valid.is_valid());
    }

    #[test]
    fn test_machine_status_runnable() {
        assert!(MachineStatus::Extensive.is_runnable());
        assert!(!MachineStatus::ErrorStop.is_runnable());
        assert!(!MachineStatus::Halt.is_runnable());
    }
}
