//! Fixed HLS bitrate ladder.
//!
//! Two renditions regardless of source quality. A low-resolution source is scaled up
//! to the higher rung.

use clipvault_core::constants::VARIANT_MANIFEST_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendition {
    /// Output directory name, also the stream name in the variant map
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

pub const FIXED_LADDER: [Rendition; 2] = [
    Rendition {
        name: "v0",
        width: 854,
        height: 480,
        video_bitrate_kbps: 1000,
        audio_bitrate_kbps: 128,
    },
    Rendition {
        name: "v1",
        width: 1280,
        height: 720,
        video_bitrate_kbps: 2800,
        audio_bitrate_kbps: 128,
    },
];

impl Rendition {
    /// Peak bandwidth advertised in the master playlist, in bits per second.
    pub fn bandwidth(&self) -> u64 {
        let peak_video = u64::from(self.video_bitrate_kbps) * 6 / 5;
        (peak_video + u64::from(self.audio_bitrate_kbps)) * 1000
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Variant playlist path relative to the bundle root.
    pub fn playlist_path(&self) -> String {
        format!("{}/{}", self.name, VARIANT_MANIFEST_NAME)
    }
}

/// Master playlist referencing every rendition of `ladder`.
pub fn master_playlist(ladder: &[Rendition]) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n\n");

    for rendition in ladder {
        playlist.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n{}\n\n",
            rendition.bandwidth(),
            rendition.resolution(),
            rendition.playlist_path()
        ));
    }

    playlist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_playlist_references_both_renditions() {
        let playlist = master_playlist(&FIXED_LADDER);
        assert!(playlist.starts_with("#EXTM3U\n"));
        assert_eq!(playlist.matches("#EXT-X-STREAM-INF").count(), 2);
        assert!(playlist.contains("RESOLUTION=854x480\nv0/index.m3u8"));
        assert!(playlist.contains("BANDWIDTH=3488000,RESOLUTION=1280x720\nv1/index.m3u8"));
    }

    #[test]
    fn test_ladder_is_ascending() {
        assert!(FIXED_LADDER[0].bandwidth() < FIXED_LADDER[1].bandwidth());
        assert!(FIXED_LADDER[0].height < FIXED_LADDER[1].height);
    }
}
