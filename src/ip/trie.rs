//! CIDR Range Trie
//!
//! A binary trie over address bits, most significant bit first, with separate
//! roots for IPv4 and IPv6. A terminal node means "every address under this
//! prefix is a member", so lookups can stop at the first terminal on their
//! path and coarse ranges dominate anything inserted beneath them.
//!
//! Updates come from periodic control-plane refreshes and fully rebuild the
//! structure; a reader-writer lock keeps in-flight lookups consistent.

use std::net::IpAddr;

use parking_lot::RwLock;

const NO_NODE: usize = usize::MAX;

#[derive(Clone, Copy)]
struct Node {
    children: [usize; 2],
    terminal: bool,
}

impl Node {
    fn new() -> Self {
        Self {
            children: [NO_NODE; 2],
            terminal: false,
        }
    }
}

struct Arena {
    nodes: Vec<Node>,
    v4_root: usize,
    v6_root: usize,
}

impl Arena {
    fn new() -> Self {
        Self {
            nodes: vec![Node::new(), Node::new()],
            v4_root: 0,
            v6_root: 1,
        }
    }

    fn alloc(&mut self) -> usize {
        self.nodes.push(Node::new());
        self.nodes.len() - 1
    }
}

/// A set of IP ranges with longest-prefix membership queries.
pub struct IpRange {
    arena: RwLock<Arena>,
}

impl Default for IpRange {
    fn default() -> Self {
        Self::new()
    }
}

impl IpRange {
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(Arena::new()),
        }
    }

    /// Inserts a CIDR range (`10.0.0.0/24`, `2001:db8::/32`) or a bare
    /// address (implicit `/32` or `/128`). Malformed input is ignored.
    pub fn insert_range(&self, cidr_or_ip: &str) {
        let Some((addr, prefix_len)) = parse_cidr(cidr_or_ip) else {
            tracing::debug!(input = cidr_or_ip, "Ignoring malformed IP range");
            return;
        };

        let mut arena = self.arena.write();
        let mut node = match addr {
            IpAddr::V4(_) => arena.v4_root,
            IpAddr::V6(_) => arena.v6_root,
        };

        let mut remaining = prefix_len;
        'outer: for byte in address_bytes(&addr) {
            for bit_index in (0..8).rev() {
                if remaining == 0 {
                    break 'outer;
                }
                let bit = ((byte >> bit_index) & 1) as usize;
                if arena.nodes[node].children[bit] == NO_NODE {
                    let child = arena.alloc();
                    arena.nodes[node].children[bit] = child;
                }
                node = arena.nodes[node].children[bit];
                remaining -= 1;
            }
        }
        arena.nodes[node].terminal = true;
    }

    /// Returns true if `ip` falls inside any inserted range. Unparseable
    /// input returns false.
    pub fn is_ip_in_range(&self, ip: &str) -> bool {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return false;
        };

        let arena = self.arena.read();
        let mut node = match addr {
            IpAddr::V4(_) => arena.v4_root,
            IpAddr::V6(_) => arena.v6_root,
        };

        for byte in address_bytes(&addr) {
            for bit_index in (0..8).rev() {
                if arena.nodes[node].terminal {
                    return true;
                }
                let bit = ((byte >> bit_index) & 1) as usize;
                let child = arena.nodes[node].children[bit];
                if child == NO_NODE {
                    return false;
                }
                node = child;
            }
        }
        arena.nodes[node].terminal
    }

    /// True if at least one range has been inserted.
    pub fn has_items(&self) -> bool {
        let arena = self.arena.read();
        let roots = [arena.v4_root, arena.v6_root];
        roots.into_iter().any(|root| {
            arena.nodes[root].terminal || arena.nodes[root].children.iter().any(|&c| c != NO_NODE)
        })
    }

    /// Removes all ranges.
    pub fn clear(&self) {
        *self.arena.write() = Arena::new();
    }
}

fn parse_cidr(cidr_or_ip: &str) -> Option<(IpAddr, u8)> {
    let (ip_part, prefix_part) = match cidr_or_ip.split_once('/') {
        Some((ip, prefix)) => (ip, Some(prefix)),
        None => (cidr_or_ip, None),
    };

    let addr: IpAddr = ip_part.trim().parse().ok()?;
    let max_bits = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    let prefix_len = match prefix_part {
        Some(p) => {
            let parsed: u8 = p.trim().parse().ok()?;
            if parsed > max_bits {
                return None;
            }
            parsed
        }
        None => max_bits,
    };
    Some((addr, prefix_len))
}

fn address_bytes(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}
