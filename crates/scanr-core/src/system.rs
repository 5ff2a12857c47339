use std::sync::OnceLock;

static VENDOR_VERSION: OnceLock<String> = OnceLock::new();

/// Record the vendor version for the lifetime of the process.
///
/// Only the first call has an effect; returns `false` when a version was
/// already recorded.
pub fn set_vendor_version(version: impl Into<String>) -> bool {
    VENDOR_VERSION.set(version.into()).is_ok()
}

/// Vendor version recorded by [`set_vendor_version`], if any.
pub fn vendor_version() -> Option<&'static str> {
    VENDOR_VERSION.get().map(String::as_str)
}

#[inline]
pub fn platform() -> &'static str {
    std::env::consts::OS
}

#[inline]
pub fn arch() -> &'static str {
    std::env::consts::ARCH
}

/// One-line banner logged when a scan process starts.
pub fn start_message() -> String {
    let mut msg = format!(
        "scanr {} ({}/{})",
        env!("CARGO_PKG_VERSION"),
        platform(),
        arch()
    );
    if let Some(vendor) = vendor_version() {
        msg.push_str(", vendor version ");
        msg.push_str(vendor);
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_version_is_set_once() {
        set_vendor_version("Greenbone 22.4");
        assert!(!set_vendor_version("other"));

        assert_eq!(vendor_version(), Some("Greenbone 22.4"));
        assert!(start_message().ends_with("vendor version Greenbone 22.4"));
    }

    #[test]
    fn start_message_names_platform() {
        let msg = start_message();
        assert!(msg.starts_with("scanr "));
        assert!(msg.contains(platform()));
        assert!(msg.contains(arch()));
    }
}
