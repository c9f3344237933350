//! Default gateway discovery.
//!
//! No network requests are made here: the address is obtained by
//! inspecting the routing state the OS already holds.

use std::io;
use std::net::Ipv4Addr;

/// Returns the IPv4 address of the default gateway configured for this host
///
/// Fails with [`io::ErrorKind::NotFound`] when no default route exists and
/// with [`io::ErrorKind::Unsupported`] on platforms where the routing state
/// cannot be inspected.
pub fn default_gateway() -> io::Result<Ipv4Addr> {
    imp::default_gateway()
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn not_found() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "no default gateway found")
}

#[cfg(target_os = "linux")]
mod imp {
    use super::*;

    pub fn default_gateway() -> io::Result<Ipv4Addr> {
        let table = std::fs::read_to_string("/proc/net/route")?;
        parse_route_table(&table).ok_or_else(not_found)
    }

    /// The default route has an all-zeros destination; the gateway column
    /// is hexadecimal in host byte order
    fn parse_route_table(table: &str) -> Option<Ipv4Addr> {
        for line in table.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 || fields[1] != "00000000" {
                continue;
            }
            if let Ok(raw) = u32::from_str_radix(fields[2], 16) {
                return Some(Ipv4Addr::from(raw.to_be()));
            }
        }
        None
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn route_table_parsing() {
            let table = "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\n\
                         eth0\t0016A8C0\t00000000\t0001\t0\t0\t0\t00FFFFFF\n\
                         eth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\n";
            assert_eq!(
                parse_route_table(table),
                Some(Ipv4Addr::new(192, 168, 1, 1))
            );
        }

        #[test]
        fn no_default_route() {
            let table = "Iface\tDestination\tGateway\tFlags\n\
                         eth0\t0016A8C0\t00000000\t0001\n";
            assert_eq!(parse_route_table(table), None);
        }
    }
}

#[cfg(target_os = "macos")]
mod imp {
    use super::*;

    /// `route -n get default` prints the gateway on its own labelled line
    pub fn default_gateway() -> io::Result<Ipv4Addr> {
        let output = std::process::Command::new("route")
            .args(["-n", "get", "default"])
            .output()?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines()
            .filter_map(|line| line.trim().strip_prefix("gateway:"))
            .find_map(|gateway| gateway.trim().parse().ok())
            .ok_or_else(not_found)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod imp {
    use super::*;

    pub fn default_gateway() -> io::Result<Ipv4Addr> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "gateway discovery is not implemented for this platform",
        ))
    }
}
