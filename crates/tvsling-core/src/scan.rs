// LAN device discovery.
//
// Derives /24 host ranges from the local IPv4 interfaces, probes the
// developer-API port on every candidate with bounded concurrency, and
// queries responders for device metadata. Per-host failures never abort
// the scan; cancellation returns whatever has been collected so far.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use pnet::datalink;
use pnet::ipnetwork::IpNetwork;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use tvsling_api::{DEVELOPER_API_PORT, DeviceInfoClient};

use crate::error::CoreError;
use crate::model::NetworkDevice;

/// Scan tuning knobs. Defaults suit a home /24.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Per-host budget for the TCP probe.
    pub probe_timeout: Duration,
    /// Maximum number of in-flight probes.
    pub concurrency: usize,
    /// Include ranges derived from virtual/host-only adapters.
    pub include_virtual: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(1500),
            concurrency: 64,
            include_virtual: false,
        }
    }
}

/// Discovers TVs exposing the developer API on the local network.
#[derive(Debug, Clone)]
pub struct DeviceScanner {
    info: DeviceInfoClient,
    port: u16,
}

impl DeviceScanner {
    pub fn new(info: DeviceInfoClient) -> Self {
        Self {
            info,
            port: DEVELOPER_API_PORT,
        }
    }

    /// Scanner bound to a non-standard port. Used by tests; real devices
    /// always listen on [`DEVELOPER_API_PORT`].
    pub fn with_port(info: DeviceInfoClient, port: u16) -> Self {
        Self { info, port }
    }

    /// Probe every candidate address derived from the local interfaces.
    ///
    /// Results accumulate in completion order. Cancelling stops new probes
    /// and abandons in-flight ones, but already-resolved devices are
    /// returned rather than discarded.
    pub async fn scan(
        &self,
        opts: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Vec<NetworkDevice> {
        self.scan_addresses(candidate_addresses(opts.include_virtual), opts, cancel)
            .await
    }

    /// Probe an explicit candidate list. [`scan`](Self::scan) derives its
    /// candidates from the local interfaces; tests supply loopback
    /// listeners directly.
    pub async fn scan_addresses(
        &self,
        candidates: Vec<Ipv4Addr>,
        opts: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Vec<NetworkDevice> {
        info!(hosts = candidates.len(), "starting device scan");

        let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
        let mut tasks: JoinSet<Option<NetworkDevice>> = JoinSet::new();

        for address in candidates {
            let scanner = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let probe_timeout = opts.probe_timeout;

            tasks.spawn(async move {
                // A probe that never got a permit must not start after
                // cancellation; one that did start is abandoned by the
                // select below.
                let _permit = tokio::select! {
                    () = cancel.cancelled() => return None,
                    permit = semaphore.acquire_owned() => permit.ok()?,
                };

                tokio::select! {
                    () = cancel.cancelled() => None,
                    device = scanner.probe(address, probe_timeout) => device,
                }
            });
        }

        let mut devices = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some(device)) = joined {
                debug!(address = %device.address, "device responded");
                devices.push(device);
            }
        }

        info!(found = devices.len(), "device scan finished");
        devices
    }

    /// Validate one caller-supplied address: port probe plus info fetch,
    /// without a range scan.
    pub async fn validate(
        &self,
        address: Ipv4Addr,
        probe_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<NetworkDevice, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let probe = self.probe(address, probe_timeout);
        let device = tokio::select! {
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            device = probe => device,
        };

        device.ok_or_else(|| CoreError::DeviceUnreachable {
            address: address.to_string(),
            timeout_ms: u64::try_from(probe_timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// One host: TCP connect bounded by `probe_timeout`, then the info
    /// fetch. Closed/filtered ports yield `None`; an open port with a
    /// failed info fetch degrades to an address-only record.
    async fn probe(&self, address: Ipv4Addr, probe_timeout: Duration) -> Option<NetworkDevice> {
        match timeout(probe_timeout, TcpStream::connect((address, self.port))).await {
            Ok(Ok(_stream)) => {}
            // Refused, unreachable, or timed out: count as closed.
            Ok(Err(_)) | Err(_) => return None,
        }

        let base = Url::parse(&format!("http://{address}:{}", self.port)).ok()?;
        match self.info.fetch_at(&base).await {
            Ok(info) => Some(NetworkDevice::from_info(address, info)),
            Err(err) => {
                warn!(%address, %err, "device info fetch failed, keeping address-only record");
                Some(NetworkDevice::address_only(address))
            }
        }
    }
}

/// All host addresses in the /24 of each usable local IPv4 interface,
/// de-duplicated, excluding the interfaces' own addresses.
fn candidate_addresses(include_virtual: bool) -> Vec<Ipv4Addr> {
    let mut own = BTreeSet::new();
    let mut candidates = BTreeSet::new();

    for iface in datalink::interfaces() {
        if !iface.is_up() || iface.is_loopback() {
            continue;
        }
        if !include_virtual && is_virtual_interface(&iface.name) {
            debug!(name = %iface.name, "skipping virtual interface");
            continue;
        }

        for network in &iface.ips {
            let IpNetwork::V4(v4) = network else { continue };
            own.insert(v4.ip());

            let octets = v4.ip().octets();
            for host in 1..=254u8 {
                candidates.insert(Ipv4Addr::new(octets[0], octets[1], octets[2], host));
            }
        }
    }

    candidates.into_iter().filter(|a| !own.contains(a)).collect()
}

/// Heuristic for virtual/host-only adapters by interface name.
fn is_virtual_interface(name: &str) -> bool {
    const PREFIXES: [&str; 8] = [
        "docker", "veth", "br-", "virbr", "vmnet", "vboxnet", "vEthernet", "tailscale",
    ];
    PREFIXES.iter().any(|p| name.starts_with(p))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn virtual_interface_heuristic() {
        assert!(is_virtual_interface("docker0"));
        assert!(is_virtual_interface("vboxnet0"));
        assert!(is_virtual_interface("vEthernet (WSL)"));
        assert!(!is_virtual_interface("eth0"));
        assert!(!is_virtual_interface("wlan0"));
    }

    #[tokio::test]
    async fn probe_drops_closed_ports() {
        // Bind-and-drop gives a port that nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let info = DeviceInfoClient::new(Duration::from_millis(500)).unwrap();
        let scanner = DeviceScanner::with_port(info, port);

        let result = scanner
            .probe(Ipv4Addr::LOCALHOST, Duration::from_millis(500))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn probe_degrades_to_address_only_on_bad_info() {
        // A raw TCP listener accepts the probe but serves no HTTP.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                drop(stream);
            }
        });

        let info = DeviceInfoClient::new(Duration::from_millis(500)).unwrap();
        let scanner = DeviceScanner::with_port(info, port);

        let device = scanner
            .probe(Ipv4Addr::LOCALHOST, Duration::from_millis(500))
            .await
            .expect("open port must yield a record");
        assert_eq!(device.address, Ipv4Addr::LOCALHOST);
        assert!(device.name.is_none());
        assert!(!device.developer_mode);
    }

    #[tokio::test]
    async fn scan_collects_loopback_responder() {
        // Accept-and-drop: the port probe passes, the info fetch fails,
        // so the scan records an address-only device.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else { break };
                drop(stream);
            }
        });

        let info = DeviceInfoClient::new(Duration::from_millis(500)).unwrap();
        let scanner = DeviceScanner::with_port(info, port);

        let devices = scanner
            .scan_addresses(
                vec![Ipv4Addr::LOCALHOST],
                &ScanOptions::default(),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address, Ipv4Addr::LOCALHOST);
    }

    #[tokio::test]
    async fn cancelled_scan_starts_no_probes() {
        // A live listener that would respond; cancellation must win
        // before any probe acquires a permit.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let info = DeviceInfoClient::new(Duration::from_millis(500)).unwrap();
        let scanner = DeviceScanner::with_port(info, port);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let devices = tokio::time::timeout(
            Duration::from_secs(5),
            scanner.scan_addresses(vec![Ipv4Addr::LOCALHOST], &ScanOptions::default(), &cancel),
        )
        .await
        .expect("cancelled scan must not block");
        assert!(devices.is_empty());
    }

    // The whole 127/8 block is routable on Linux, which gives two
    // distinct candidate addresses sharing one port.
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn mid_scan_cancellation_keeps_collected_devices() {
        let fast = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = fast.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = fast.accept().await else { break };
                drop(stream);
            }
        });

        // Accepts the connection and never answers, so this probe only
        // ends when cancellation abandons it.
        let slow = tokio::net::TcpListener::bind(("127.0.0.2", port)).await.unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                let Ok((stream, _)) = slow.accept().await else { break };
                held.push(stream);
            }
        });

        let info = DeviceInfoClient::new(Duration::from_secs(30)).unwrap();
        let scanner = DeviceScanner::with_port(info, port);
        let opts = ScanOptions {
            probe_timeout: Duration::from_secs(5),
            concurrency: 2,
            include_virtual: false,
        };

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let devices = tokio::time::timeout(
            Duration::from_secs(5),
            scanner.scan_addresses(
                vec![Ipv4Addr::LOCALHOST, Ipv4Addr::new(127, 0, 0, 2)],
                &opts,
                &cancel,
            ),
        )
        .await
        .expect("cancellation must unblock the scan");

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address, Ipv4Addr::LOCALHOST);
    }

    #[tokio::test]
    async fn validate_reports_cancellation() {
        let info = DeviceInfoClient::new(Duration::from_millis(500)).unwrap();
        let scanner = DeviceScanner::with_port(info, 1);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = scanner
            .validate(Ipv4Addr::LOCALHOST, Duration::from_millis(500), &cancel)
            .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn validate_reports_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let info = DeviceInfoClient::new(Duration::from_millis(500)).unwrap();
        let scanner = DeviceScanner::with_port(info, port);

        let result = scanner
            .validate(
                Ipv4Addr::LOCALHOST,
                Duration::from_millis(300),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(CoreError::DeviceUnreachable { .. })));
    }
}
