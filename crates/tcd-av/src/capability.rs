//! Hardware encoder capability probing.
//!
//! Asks ffmpeg which encoders it was built with and distills the listing
//! into a [`Capabilities`] snapshot: which hardware backends exist, which
//! codecs each can encode, and a platform-ordered preferred pick. Probing
//! never fails -- a missing ffmpeg or a broken invocation simply yields an
//! empty capability set, which downstream code treats as "software only".

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;
use tcd_core::{Codec, HwAccel};
use tokio::sync::OnceCell;

use crate::command::ToolCommand;
use crate::settings::hw_encoder_name;
use crate::tools::ToolRegistry;

/// Backend preference order for the current platform.
fn platform_order() -> &'static [HwAccel] {
    if cfg!(target_os = "macos") {
        &[HwAccel::Videotoolbox, HwAccel::Nvenc, HwAccel::Qsv]
    } else {
        &[HwAccel::Nvenc, HwAccel::Qsv, HwAccel::Videotoolbox]
    }
}

/// Immutable snapshot of the hardware encoders usable on this host.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Capabilities {
    /// Codecs each backend can encode. Backends with no usable codec are
    /// absent from the map.
    backends: HashMap<HwAccel, HashSet<Codec>>,
}

impl Capabilities {
    /// Probe ffmpeg for available encoders.
    ///
    /// Never errors: any failure along the way is logged and produces an
    /// empty snapshot.
    pub async fn probe(tools: &ToolRegistry) -> Self {
        let ffmpeg = match tools.require("ffmpeg") {
            Ok(path) => path.clone(),
            Err(e) => {
                tracing::warn!("Capability probe skipped: {e}");
                return Self::default();
            }
        };

        let output = ToolCommand::new(ffmpeg)
            .args(["-hide_banner", "-v", "error", "-encoders"])
            .timeout(Duration::from_secs(15))
            .execute()
            .await;

        match output {
            Ok(out) => {
                let caps = Self::from_encoder_listing(&out.stdout);
                tracing::info!(
                    backends = ?caps.available_backends(),
                    "Hardware capability probe complete"
                );
                caps
            }
            Err(e) => {
                tracing::warn!("Capability probe failed, assuming software only: {e}");
                Self::default()
            }
        }
    }

    /// Parse an `ffmpeg -encoders` listing.
    pub fn from_encoder_listing(listing: &str) -> Self {
        let mut backends: HashMap<HwAccel, HashSet<Codec>> = HashMap::new();

        for &hw in HwAccel::all() {
            for &codec in Codec::all() {
                let Some(name) = hw_encoder_name(codec, hw) else {
                    continue;
                };
                // Encoder names appear as their own whitespace-delimited
                // word in the listing.
                if listing
                    .split_whitespace()
                    .any(|word| word == name)
                {
                    backends.entry(hw).or_default().insert(codec);
                }
            }
        }

        Self { backends }
    }

    /// Whether any hardware backend is usable at all.
    pub fn any_available(&self) -> bool {
        !self.backends.is_empty()
    }

    /// Whether `hw` can encode `codec`.
    pub fn supports(&self, hw: HwAccel, codec: Codec) -> bool {
        self.backends
            .get(&hw)
            .map(|codecs| codecs.contains(&codec))
            .unwrap_or(false)
    }

    /// Backends with at least one usable codec, in platform order.
    pub fn available_backends(&self) -> Vec<HwAccel> {
        platform_order()
            .iter()
            .copied()
            .filter(|hw| self.backends.contains_key(hw))
            .collect()
    }

    /// The platform-preferred backend, regardless of codec.
    pub fn preferred(&self) -> Option<HwAccel> {
        self.available_backends().into_iter().next()
    }

    /// The platform-preferred backend that can encode `codec`.
    pub fn preferred_for(&self, codec: Codec) -> Option<HwAccel> {
        platform_order()
            .iter()
            .copied()
            .find(|&hw| self.supports(hw, codec))
    }
}

/// Process-lifetime cache around [`Capabilities::probe`].
///
/// The probe runs once, on first use; every later call returns the cached
/// snapshot. The snapshot is never invalidated.
#[derive(Debug)]
pub struct CapabilityCache {
    cell: OnceCell<Capabilities>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The cached snapshot, probing on first call.
    pub async fn get(&self, tools: &ToolRegistry) -> &Capabilities {
        self.cell
            .get_or_init(|| Capabilities::probe(tools))
            .await
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NVENC_LISTING: &str = "\
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D libx265              libx265 H.265 / HEVC (codec hevc)
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder (codec hevc)
 V....D libsvtav1            SVT-AV1(Scalable Video Technology for AV1) encoder (codec av1)
";

    #[test]
    fn parses_nvenc_listing() {
        let caps = Capabilities::from_encoder_listing(NVENC_LISTING);
        assert!(caps.any_available());
        assert!(caps.supports(HwAccel::Nvenc, Codec::X264));
        assert!(caps.supports(HwAccel::Nvenc, Codec::X265));
        assert!(!caps.supports(HwAccel::Nvenc, Codec::Av1));
        assert!(!caps.supports(HwAccel::Qsv, Codec::X264));
    }

    #[test]
    fn empty_listing_means_software_only() {
        let caps = Capabilities::from_encoder_listing("");
        assert!(!caps.any_available());
        assert!(caps.preferred().is_none());
        assert!(caps.available_backends().is_empty());
    }

    #[test]
    fn software_encoders_do_not_count_as_hardware() {
        let listing = " V....D libx264   libx264 H.264\n V....D libx265  libx265 HEVC\n";
        let caps = Capabilities::from_encoder_listing(listing);
        assert!(!caps.any_available());
    }

    #[test]
    fn preferred_follows_platform_order() {
        let listing = "\
 V....D h264_qsv             Intel QSV H.264 encoder (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
";
        let caps = Capabilities::from_encoder_listing(listing);
        if cfg!(target_os = "macos") {
            // Neither backend is videotoolbox; nvenc still wins over qsv.
            assert_eq!(caps.preferred(), Some(HwAccel::Nvenc));
        } else {
            assert_eq!(caps.preferred(), Some(HwAccel::Nvenc));
        }
    }

    #[test]
    fn preferred_for_skips_unsupported_codec() {
        let listing = "\
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D av1_qsv              Intel QSV AV1 encoder (codec av1)
";
        let caps = Capabilities::from_encoder_listing(listing);
        assert_eq!(caps.preferred_for(Codec::X264), Some(HwAccel::Nvenc));
        assert_eq!(caps.preferred_for(Codec::Av1), Some(HwAccel::Qsv));
        assert_eq!(caps.preferred_for(Codec::X265), None);
    }

    #[tokio::test]
    async fn probe_without_ffmpeg_is_empty() {
        let tools = ToolRegistry::with_paths([]);
        let caps = Capabilities::probe(&tools).await;
        assert!(!caps.any_available());
    }

    #[tokio::test]
    async fn cache_probes_once() {
        let tools = ToolRegistry::with_paths([]);
        let cache = CapabilityCache::new();
        let first = cache.get(&tools).await as *const Capabilities;
        let second = cache.get(&tools).await as *const Capabilities;
        assert_eq!(first, second);
    }
}
