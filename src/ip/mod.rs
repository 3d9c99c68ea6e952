//! IP Membership Structures
//!
//! A bit-trie over CIDR ranges and the blocklist wrapper built on it.

pub mod blocklist;
pub mod trie;

pub use blocklist::BlockList;
pub use trie::IpRange;
