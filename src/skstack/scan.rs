//! Active scan results (`EPANDESC` blocks).

use log::warn;
use serde::Serialize;
use std::net::Ipv6Addr;

/// A coordinator found by active scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub channel: u8,
    pub channel_page: Option<u8>,
    pub pan_id: u16,
    pub mac_address: u64,
    pub lqi: Option<u8>,
    pub pair_id: Option<String>,
}

impl ScanResult {
    /// Link-local address the module derives from the MAC address: EUI-64
    /// with the universal/local bit flipped, under fe80::/64.
    pub fn link_local_address(&self) -> Ipv6Addr {
        let iid = self.mac_address ^ 0x0200_0000_0000_0000;
        Ipv6Addr::from((0xFE80_u128 << 112) | u128::from(iid))
    }
}

/// Collects the indented `key:value` lines of an `EPANDESC` block.
#[derive(Debug, Default)]
pub struct ScanCollector {
    channel: Option<u8>,
    channel_page: Option<u8>,
    pan_id: Option<u16>,
    mac_address: Option<u64>,
    lqi: Option<u8>,
    pair_id: Option<String>,
}

impl ScanCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one field line such as `  Channel:21`.
    pub fn accept(&mut self, line: &str) {
        let Some((key, value)) = line.trim().split_once(':') else {
            warn!("Ignoring scan line without separator: {line:?}");
            return;
        };
        let value = value.trim();
        match key.trim() {
            "Channel" => self.channel = parse_hex(key, value),
            "Channel Page" => self.channel_page = parse_hex(key, value),
            "Pan ID" => self.pan_id = parse_hex(key, value),
            "Addr" => self.mac_address = parse_hex(key, value),
            "LQI" => self.lqi = parse_hex(key, value),
            "PairID" => self.pair_id = Some(value.to_string()),
            other => warn!("Ignoring unknown scan field {other:?}"),
        }
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// The scan result, if channel, PAN ID and address were all seen.
    pub fn finish(self) -> Option<ScanResult> {
        let channel = self.channel?;
        let (Some(pan_id), Some(mac_address)) = (self.pan_id, self.mac_address) else {
            warn!("Scan reported channel {channel:02X} without PAN ID or address");
            return None;
        };
        Some(ScanResult {
            channel,
            channel_page: self.channel_page,
            pan_id,
            mac_address,
            lqi: self.lqi,
            pair_id: self.pair_id,
        })
    }
}

fn parse_hex<T: FromHex>(key: &str, value: &str) -> Option<T> {
    let parsed = T::from_hex(value);
    if parsed.is_none() {
        warn!("Scan field {key} has invalid value {value:?}");
    }
    parsed
}

trait FromHex: Sized {
    fn from_hex(s: &str) -> Option<Self>;
}

impl FromHex for u8 {
    fn from_hex(s: &str) -> Option<Self> {
        u8::from_str_radix(s, 16).ok()
    }
}

impl FromHex for u16 {
    fn from_hex(s: &str) -> Option<Self> {
        u16::from_str_radix(s, 16).ok()
    }
}

impl FromHex for u64 {
    fn from_hex(s: &str) -> Option<Self> {
        u64::from_str_radix(s, 16).ok()
    }
}
