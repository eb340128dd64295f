//! Capability probe.
//!
//! Candidate backends are tried in order at first use; the first success
//! selects the backend for the whole process and the result never changes
//! afterwards. Every rejected candidate keeps its reason, both logged and
//! retained on [`Capability`], so "why is this unsupported" is answerable
//! without a debugger.

use std::sync::OnceLock;

/// One rejected probe candidate.
#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub candidate: &'static str,
    pub reason: String,
}

/// Process-wide capture capability, computed once.
#[derive(Debug)]
pub struct Capability {
    /// True iff a capture backend probed successfully.
    pub supported: bool,
    /// Name of the selected backend, when supported.
    pub backend: Option<&'static str>,
    /// Rejection reasons for every candidate tried before the selected one
    /// (all candidates, when unsupported).
    pub failures: Vec<ProbeFailure>,
}

static CAPABILITY: OnceLock<Capability> = OnceLock::new();

/// The process-wide capability, probing on first call.
pub fn capability() -> &'static Capability {
    CAPABILITY.get_or_init(run_probe)
}

/// True iff a capture backend is available on this platform/build.
pub fn is_supported() -> bool {
    capability().supported
}

type Check = fn() -> Result<(), String>;

fn run_probe() -> Capability {
    let mut failures = Vec::new();
    for (name, check) in candidates() {
        match check() {
            Ok(()) => {
                tracing::debug!(backend = name, "capture backend selected");
                return Capability { supported: true, backend: Some(name), failures };
            }
            Err(reason) => {
                tracing::debug!(candidate = name, reason, "capture backend rejected");
                failures.push(ProbeFailure { candidate: name, reason });
            }
        }
    }
    if failures.is_empty() {
        tracing::debug!("no capture backend candidates for this platform");
    }
    Capability { supported: false, backend: None, failures }
}

#[cfg(target_os = "linux")]
fn candidates() -> &'static [(&'static str, Check)] {
    &[("pipewire-portal", check_portal)]
}

#[cfg(target_os = "macos")]
fn candidates() -> &'static [(&'static str, Check)] {
    &[("screencapturekit", check_screencapturekit)]
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn candidates() -> &'static [(&'static str, Check)] {
    &[]
}

/// The portal backend needs a session bus to reach xdg-desktop-portal and a
/// GStreamer installation with the pipeline elements the session builds.
/// Kept side-effect-light: the portal itself is only contacted at stream
/// construction, so no dialog can appear from probing.
#[cfg(target_os = "linux")]
fn check_portal() -> Result<(), String> {
    if std::env::var_os("DBUS_SESSION_BUS_ADDRESS").is_none()
        && std::env::var_os("XDG_RUNTIME_DIR").is_none()
    {
        return Err("no session bus (DBUS_SESSION_BUS_ADDRESS and XDG_RUNTIME_DIR unset)".into());
    }
    gstreamer::init().map_err(|e| format!("GStreamer init failed: {e}"))?;
    for element in ["pipewiresrc", "videoconvert", "videoscale", "appsink"] {
        if gstreamer::ElementFactory::find(element).is_none() {
            return Err(format!("GStreamer element '{element}' not found"));
        }
    }
    Ok(())
}

/// ScreenCaptureKit ships with macOS 12.3+.
#[cfg(target_os = "macos")]
fn check_screencapturekit() -> Result<(), String> {
    let output = std::process::Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .map_err(|e| format!("sw_vers failed: {e}"))?;
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();

    let mut parts = version.split('.');
    let major: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    if major < 12 || (major == 12 && minor < 3) {
        return Err(format!("ScreenCaptureKit requires macOS 12.3+ (found {version})"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_is_one_time_initialized() {
        let a = capability();
        let b = capability();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn supported_iff_a_backend_was_selected() {
        let cap = capability();
        assert_eq!(cap.supported, cap.backend.is_some());
        assert_eq!(is_supported(), cap.supported);
    }

    #[test]
    fn rejections_carry_reasons() {
        for failure in &capability().failures {
            assert!(!failure.candidate.is_empty());
            assert!(!failure.reason.is_empty());
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    #[test]
    fn platforms_without_candidates_are_unsupported() {
        let cap = capability();
        assert!(!cap.supported);
        assert!(cap.failures.is_empty());
    }
}
