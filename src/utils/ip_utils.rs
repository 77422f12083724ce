use std::net::Ipv4Addr;

/// IPv4 subnet arithmetic used by the address allocator and route computation

/// Netmask for a prefix length (e.g. 24 -> 255.255.255.0)
pub fn netmask(prefix_len: u8) -> Ipv4Addr {
    Ipv4Addr::from(mask_bits(prefix_len))
}

/// Network address of `addr` under `prefix_len`
pub fn network_of(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) & mask_bits(prefix_len))
}

/// Usable host addresses in a subnet (network and broadcast excluded)
pub fn host_capacity(prefix_len: u8) -> usize {
    match prefix_len {
        p if p >= 31 => 0,
        p => (1usize << (32 - p as u32)) - 2,
    }
}

/// The `index`-th subnet of size `prefix_len` counting up from `base`
///
/// Returns `None` when the subnet would fall outside the IPv4 space.
pub fn nth_subnet(base: Ipv4Addr, prefix_len: u8, index: usize) -> Option<Ipv4Addr> {
    let block = 1u64 << (32 - prefix_len.min(32) as u32);
    let start = u64::from(u32::from(network_of(base, prefix_len)));
    let offset = block.checked_mul(index as u64)?;
    let value = start.checked_add(offset)?;
    u32::try_from(value).ok().map(Ipv4Addr::from)
}

/// The `n`-th host address (1-based) inside `subnet`
pub fn host_address(subnet: Ipv4Addr, n: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(subnet).wrapping_add(n))
}

fn mask_bits(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - p as u32),
    }
}
