//! Device identity resolution for connected gamepads.
//!
//! Raw gamepad identifier strings vary between platforms and even between
//! firmware revisions of the same controller, so mappings are keyed by the
//! (vendor, product) pair extracted from the raw string instead of the raw
//! string itself. Two textual formats are accepted:
//!
//! - `"Xbox Wireless Controller (STANDARD GAMEPAD Vendor: 045e Product: 0b13)"`
//! - `"045e-028e-Xbox 360 Controller"`
//!
//! Resolution is pure and stateless: the same raw string always yields the
//! same identity, or always none.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static VENDOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Vendor:\s*([0-9a-fA-F]+)").expect("valid vendor pattern"));
static PRODUCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Product:\s*([0-9a-fA-F]+)").expect("valid product pattern"));
static DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9a-fA-F]{4})-([0-9a-fA-F]{4})").expect("valid dash pattern"));

/// Normalized (vendor, product) pair for a physical controller.
///
/// Both ids are lowercase hex strings. Compare identities, not raw id
/// strings, when deciding whether two descriptors are the same device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: String,
    pub product_id: String,
}

impl DeviceIdentity {
    /// Parses a raw device identifier string into a stable identity.
    ///
    /// Returns `None` when neither accepted format matches; callers treat
    /// that as a normal fallback trigger, never as an error.
    pub fn parse(raw: &str) -> Option<Self> {
        if let (Some(vendor), Some(product)) = (VENDOR_RE.captures(raw), PRODUCT_RE.captures(raw)) {
            return Some(Self {
                vendor_id: vendor[1].to_lowercase(),
                product_id: product[1].to_lowercase(),
            });
        }

        if let Some(caps) = DASH_RE.captures(raw) {
            return Some(Self {
                vendor_id: caps[1].to_lowercase(),
                product_id: caps[2].to_lowercase(),
            });
        }

        None
    }

    /// Canonical synced-storage key for this device's mapping table.
    pub fn storage_key(&self) -> String {
        format!("controllerMapping_{}_{}", self.vendor_id, self.product_id)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor_id, self.product_id)
    }
}

/// Whether two raw identifiers describe the same physical device.
///
/// Raw strings may differ by firmware string revision while the hardware ids
/// stay stable, so equality is decided on the parsed identities. Two
/// unparsable identifiers are never considered the same device.
pub fn same_device(raw_a: &str, raw_b: &str) -> bool {
    match (DeviceIdentity::parse(raw_a), DeviceIdentity::parse(raw_b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
