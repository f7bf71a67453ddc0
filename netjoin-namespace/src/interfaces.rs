//! Interface enumeration in the current network namespace
//!
//! Nothing here switches namespaces: [`list`] reports whatever namespace the
//! calling thread is in, so it is meant to be run as work through
//! [`NamespaceHandle::try_exec`](crate::NamespaceHandle::try_exec).
//!
//! The `getifaddrs(3)` list is walked directly: link-layer entries carry
//! addresses of any length (4-byte tunnel endpoints, 20-byte InfiniBand
//! GUIDs) and only the raw `sll_halen` says how many bytes are valid.

#![allow(unsafe_code)]

use netjoin_core::Result;
use nix::errno::Errno;
use nix::net::if_::{InterfaceFlags, if_nametoindex};
use serde::{Serialize, Serializer};
use std::ffi::CStr;
use std::{fmt, mem, ptr, slice};

/// Bytes of link-layer address room libc reserves in `AF_PACKET` entries
const MAX_HARDWARE_ADDR_LEN: usize = 24;

/// Hardware (link-layer) address, as many bytes as the device reports
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HardwareAddr(Vec<u8>);

impl HardwareAddr {
    /// Wrap raw bytes; an empty or all-zero address means "none" and yields `None`
    #[must_use]
    pub fn new(bytes: impl AsRef<[u8]>) -> Option<Self> {
        let bytes = bytes.as_ref();
        bytes.iter().any(|&b| b != 0).then(|| Self(bytes.to_vec()))
    }

    /// Raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for HardwareAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A network interface as seen from one namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    /// Kernel interface index (0 if unknown)
    pub index: u32,
    /// Interface name
    pub name: String,
    /// Hardware address, if the interface has a non-zero one
    pub hardware_addr: Option<HardwareAddr>,
    /// Administratively up (`IFF_UP`)
    pub up: bool,
    /// Operationally running (`IFF_RUNNING`)
    pub running: bool,
    /// Loopback interface (`IFF_LOOPBACK`)
    pub loopback: bool,
}

/// One `getifaddrs` record, reduced to what enumeration needs
#[derive(Debug, Clone)]
struct Record {
    name: String,
    flags: InterfaceFlags,
    index: Option<u32>,
    hardware: Option<Vec<u8>>,
}

/// Owned `getifaddrs(3)` list, freed on drop
struct IfAddrs(*mut libc::ifaddrs);

impl IfAddrs {
    fn get() -> std::result::Result<Self, Errno> {
        let mut head = ptr::null_mut();
        // SAFETY: on success getifaddrs stores a list head that we own until freeifaddrs.
        Errno::result(unsafe { libc::getifaddrs(&raw mut head) })?;
        Ok(Self(head))
    }

    fn records(&self) -> impl Iterator<Item = Record> + '_ {
        let mut cursor = self.0.cast_const();
        std::iter::from_fn(move || {
            // SAFETY: every node stays valid until the list is freed, which
            // cannot happen while `self` is borrowed.
            let ifa = unsafe { cursor.as_ref()? };
            cursor = ifa.ifa_next.cast_const();
            // SAFETY: `ifa` is a node of a live getifaddrs list.
            Some(unsafe { Record::from_raw(ifa) })
        })
    }
}

impl Drop for IfAddrs {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the head came from getifaddrs and is freed exactly once.
            unsafe { libc::freeifaddrs(self.0) };
        }
    }
}

impl Record {
    /// # Safety
    /// `ifa` must be a node of a live `getifaddrs` list.
    unsafe fn from_raw(ifa: &libc::ifaddrs) -> Self {
        // SAFETY: getifaddrs names are NUL-terminated and live as long as the node.
        let name = unsafe { CStr::from_ptr(ifa.ifa_name) }
            .to_string_lossy()
            .into_owned();
        #[allow(clippy::cast_possible_wrap)]
        let flags = InterfaceFlags::from_bits_truncate(ifa.ifa_flags as libc::c_int);
        // SAFETY: ifa_addr is null or points at a sockaddr sized for its family.
        let link = unsafe { link_layer(ifa.ifa_addr) };

        Self {
            name,
            flags,
            index: link.as_ref().and_then(|(index, _)| *index),
            hardware: link.map(|(_, bytes)| bytes),
        }
    }
}

/// Interface index and hardware address of an `AF_PACKET` entry.
///
/// # Safety
/// `addr` must be null or point at a sockaddr whose storage covers its
/// family; for `AF_PACKET` that is a `sockaddr_ll` with room for `sll_halen`
/// address bytes (libc reserves [`MAX_HARDWARE_ADDR_LEN`]).
unsafe fn link_layer(addr: *const libc::sockaddr) -> Option<(Option<u32>, Vec<u8>)> {
    if addr.is_null() {
        return None;
    }
    // SAFETY: non-null and at least a sockaddr header per the contract.
    if i32::from(unsafe { (*addr).sa_family }) != libc::AF_PACKET {
        return None;
    }

    let ll = addr.cast::<libc::sockaddr_ll>();
    // SAFETY: AF_PACKET entries are sockaddr_ll; no reference is formed, so
    // reading past the declared 8-byte sll_addr stays within the allocation.
    unsafe {
        let index = u32::try_from((*ll).sll_ifindex).ok();
        let len = usize::from((*ll).sll_halen).min(MAX_HARDWARE_ADDR_LEN);
        let base = addr.cast::<u8>().add(mem::offset_of!(libc::sockaddr_ll, sll_addr));
        Some((index, slice::from_raw_parts(base, len).to_vec()))
    }
}

/// List the network interfaces of the calling thread's namespace, in index order
///
/// # Errors
/// Returns error if `getifaddrs(3)` fails.
pub fn list() -> Result<Vec<Interface>> {
    let addrs = IfAddrs::get()?;
    let mut interfaces = collect(addrs.records());
    drop(addrs);

    for iface in interfaces.iter_mut().filter(|i| i.index == 0) {
        if let Ok(index) = if_nametoindex(iface.name.as_str()) {
            iface.index = index;
        }
    }
    interfaces.sort_by_key(|i| if i.index == 0 { u32::MAX } else { i.index });

    tracing::debug!(count = interfaces.len(), "enumerated interfaces");
    Ok(interfaces)
}

/// Fold per-address records into one entry per interface, first-seen order
fn collect(records: impl IntoIterator<Item = Record>) -> Vec<Interface> {
    let mut interfaces: Vec<Interface> = Vec::new();

    for record in records {
        let pos = match interfaces.iter().position(|i| i.name == record.name) {
            Some(pos) => pos,
            None => {
                interfaces.push(Interface {
                    index: 0,
                    name: record.name.clone(),
                    hardware_addr: None,
                    up: false,
                    running: false,
                    loopback: false,
                });
                interfaces.len() - 1
            }
        };

        let iface = &mut interfaces[pos];
        iface.up |= record.flags.contains(InterfaceFlags::IFF_UP);
        iface.running |= record.flags.contains(InterfaceFlags::IFF_RUNNING);
        iface.loopback |= record.flags.contains(InterfaceFlags::IFF_LOOPBACK);
        if let Some(index) = record.index {
            iface.index = index;
        }
        if let Some(addr) = record.hardware.and_then(HardwareAddr::new) {
            iface.hardware_addr = Some(addr);
        }
    }

    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, flags: InterfaceFlags, link: Option<(u32, &[u8])>) -> Record {
        Record {
            name: name.to_string(),
            flags,
            index: link.map(|(index, _)| index),
            hardware: link.map(|(_, bytes)| bytes.to_vec()),
        }
    }

    /// `sockaddr_ll` followed by the extra address room libc allocates
    #[repr(C)]
    #[allow(dead_code)]
    struct WideLinkAddr {
        ll: libc::sockaddr_ll,
        extra: [u8; MAX_HARDWARE_ADDR_LEN - 8],
    }

    fn wide_link_addr(index: i32, bytes: &[u8]) -> WideLinkAddr {
        // SAFETY: both structs are plain integers and byte arrays.
        let mut wide: WideLinkAddr = unsafe { std::mem::zeroed() };
        wide.ll.sll_family = libc::AF_PACKET as libc::c_ushort;
        wide.ll.sll_ifindex = index;
        wide.ll.sll_halen = u8::try_from(bytes.len()).unwrap();
        // SAFETY: sll_addr and extra are contiguous and MAX_HARDWARE_ADDR_LEN long.
        unsafe {
            let base = (&raw mut wide)
                .cast::<u8>()
                .add(mem::offset_of!(libc::sockaddr_ll, sll_addr));
            ptr::copy_nonoverlapping(bytes.as_ptr(), base, bytes.len());
        }
        wide
    }

    #[test]
    fn test_records_fold_per_interface() {
        let up = InterfaceFlags::IFF_UP | InterfaceFlags::IFF_RUNNING;
        let records = vec![
            record("lo", up | InterfaceFlags::IFF_LOOPBACK, Some((1, &[0; 6][..]))),
            record("eth0", up, Some((2, &[0x02, 0x42, 0xac, 0x11, 0, 2][..]))),
            record("lo", up | InterfaceFlags::IFF_LOOPBACK, None),
            record("eth0", up, None),
            record("eth1", InterfaceFlags::empty(), Some((3, &[0xaa; 6][..]))),
        ];

        let interfaces = collect(records);
        assert_eq!(interfaces.len(), 3);

        let lo = &interfaces[0];
        assert_eq!(lo.name, "lo");
        assert_eq!(lo.index, 1);
        assert!(lo.up && lo.running && lo.loopback);
        assert_eq!(lo.hardware_addr, None);

        let eth0 = &interfaces[1];
        assert_eq!(
            eth0.hardware_addr.as_ref().map(ToString::to_string).as_deref(),
            Some("02:42:ac:11:00:02")
        );

        let eth1 = &interfaces[2];
        assert!(!eth1.up);
        assert!(!eth1.running);
    }

    #[test]
    fn test_tunnel_address_keeps_its_length() {
        let up = InterfaceFlags::IFF_UP | InterfaceFlags::IFF_RUNNING;
        let interfaces = collect(vec![record("ipip0", up, Some((4, &[10, 0, 0, 1][..])))]);

        let addr = interfaces[0].hardware_addr.as_ref().unwrap();
        assert_eq!(addr.as_bytes().len(), 4);
        assert_eq!(addr.to_string(), "0a:00:00:01");
    }

    #[test]
    fn test_infiniband_address_is_not_truncated() {
        let guid: Vec<u8> = (1..=20).collect();
        let ib0 = record("ib0", InterfaceFlags::IFF_UP, Some((5, guid.as_slice())));
        let interfaces = collect(vec![ib0]);

        let addr = interfaces[0].hardware_addr.as_ref().unwrap();
        assert_eq!(addr.as_bytes(), guid.as_slice());
        assert!(addr.to_string().ends_with(":12:13:14"));
    }

    #[test]
    fn test_link_layer_reads_halen_bytes() {
        let short = wide_link_addr(4, &[10, 0, 0, 1]);
        // SAFETY: points at a complete WideLinkAddr.
        let (index, bytes) =
            unsafe { link_layer(ptr::from_ref(&short).cast::<libc::sockaddr>()) }.unwrap();
        assert_eq!(index, Some(4));
        assert_eq!(bytes, vec![10, 0, 0, 1]);

        let guid: Vec<u8> = (1..=20).collect();
        let wide = wide_link_addr(5, &guid);
        // SAFETY: points at a complete WideLinkAddr.
        let (_, bytes) =
            unsafe { link_layer(ptr::from_ref(&wide).cast::<libc::sockaddr>()) }.unwrap();
        assert_eq!(bytes, guid);
    }

    #[test]
    fn test_link_layer_ignores_other_families() {
        // SAFETY: sockaddr_in is plain integers.
        let mut inet: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        inet.sin_family = libc::AF_INET as libc::sa_family_t;

        // SAFETY: null is allowed, and `inet` is a complete sockaddr_in.
        unsafe {
            assert!(link_layer(ptr::null()).is_none());
            assert!(link_layer(ptr::from_ref(&inet).cast::<libc::sockaddr>()).is_none());
        }
    }

    #[test]
    fn test_zero_mac_is_absent() {
        assert!(HardwareAddr::new([0; 6]).is_none());
        assert!(HardwareAddr::new(Vec::<u8>::new()).is_none());
        assert_eq!(
            HardwareAddr::new([0xde, 0xad, 0xbe, 0xef, 0, 1]).unwrap().as_bytes(),
            &[0xde, 0xad, 0xbe, 0xef, 0, 1]
        );
    }

    #[test]
    fn test_interface_json() {
        let iface = Interface {
            index: 2,
            name: "eth0".to_string(),
            hardware_addr: HardwareAddr::new([0x02, 0, 0, 0, 0, 1]),
            up: true,
            running: false,
            loopback: false,
        };

        let json = serde_json::to_value(&iface).unwrap();
        assert_eq!(json["hardware_addr"], "02:00:00:00:00:01");
        assert_eq!(json["up"], true);
    }

    #[test]
    fn test_list_current_namespace_has_loopback() {
        let interfaces = list().unwrap();
        assert!(interfaces.iter().any(|i| i.name == "lo" && i.loopback));
    }
}
