use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Named traffic pattern the shaper imitates. Each profile fixes a target
/// on-wire size distribution and an inter-packet delay distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficProfile {
    Gaming,
    VoiceCall,
    VideoStreaming,
    FileDownload,
}

impl TrafficProfile {
    /// Target on-wire sizes in bytes. Capped below the wire bound so a shaped
    /// packet of control size never exceeds it.
    pub fn size_range(&self) -> RangeInclusive<usize> {
        match self {
            TrafficProfile::Gaming => 50..=300,
            TrafficProfile::VoiceCall => 120..=320,
            TrafficProfile::VideoStreaming => 600..=1300,
            TrafficProfile::FileDownload => 1000..=1390,
        }
    }

    /// Inter-packet delay in milliseconds.
    pub fn delay_range_ms(&self) -> RangeInclusive<u64> {
        match self {
            TrafficProfile::Gaming => 10..=33,
            TrafficProfile::VoiceCall => 18..=22,
            TrafficProfile::VideoStreaming => 2..=8,
            TrafficProfile::FileDownload => 0..=1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficProfile::Gaming => "gaming",
            TrafficProfile::VoiceCall => "voice_call",
            TrafficProfile::VideoStreaming => "video_streaming",
            TrafficProfile::FileDownload => "file_download",
        }
    }
}

impl fmt::Display for TrafficProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrafficProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gaming" => Ok(TrafficProfile::Gaming),
            "voice_call" => Ok(TrafficProfile::VoiceCall),
            "video_streaming" => Ok(TrafficProfile::VideoStreaming),
            "file_download" => Ok(TrafficProfile::FileDownload),
            other => Err(format!("unknown traffic profile: {other}")),
        }
    }
}
