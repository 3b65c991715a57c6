use std::time::Duration;

use meshwire_lib::shaping::{TrafficAnalyzer, TrafficProfile, TrafficShaper};

#[test]
fn profile_identifiers_parse() {
    assert_eq!("gaming".parse::<TrafficProfile>().unwrap(), TrafficProfile::Gaming);
    assert_eq!("voice_call".parse::<TrafficProfile>().unwrap(), TrafficProfile::VoiceCall);
    assert_eq!(
        "video_streaming".parse::<TrafficProfile>().unwrap(),
        TrafficProfile::VideoStreaming
    );
    assert_eq!(
        "file_download".parse::<TrafficProfile>().unwrap(),
        TrafficProfile::FileDownload
    );
    assert!("torrent".parse::<TrafficProfile>().is_err());
    assert!("GAMING".parse::<TrafficProfile>().is_err());
}

#[test]
fn identifier_resolution_disables_unknown_profiles() {
    assert!(TrafficShaper::from_identifier("none").is_none());
    assert!(TrafficShaper::from_identifier("torrent").is_none());
    assert!(TrafficShaper::from_identifier("gaming").is_some());
}

#[test]
fn unshape_is_left_inverse_of_shape() {
    for profile in [
        TrafficProfile::Gaming,
        TrafficProfile::VoiceCall,
        TrafficProfile::VideoStreaming,
        TrafficProfile::FileDownload,
    ] {
        let shaper = TrafficShaper::new(profile);
        for size in [0usize, 1, 16, 100, 299, 1396, 2000] {
            let data = vec![0xC3u8; size];
            let shaped = shaper.shape_packet(&data);
            assert_eq!(shaper.unshape_packet(&shaped), data, "{profile} size {size}");
        }
    }
}

#[test]
fn small_buffers_pad_into_the_profile_size_range() {
    let shaper = TrafficShaper::new(TrafficProfile::Gaming);
    for _ in 0..200 {
        let shaped = shaper.shape_packet(b"tiny");
        assert!(
            (50..=300).contains(&shaped.len()),
            "shaped to {} bytes",
            shaped.len()
        );
    }
}

#[test]
fn large_buffers_grow_only_by_the_length_prefix() {
    let shaper = TrafficShaper::new(TrafficProfile::Gaming);
    let data = vec![1u8; 2000];
    assert_eq!(shaper.shape_packet(&data).len(), 2004);
}

#[test]
fn sampled_delays_stay_inside_the_profile_range() {
    let cases = [
        (TrafficProfile::Gaming, 10u64, 33u64),
        (TrafficProfile::VoiceCall, 18, 22),
        (TrafficProfile::VideoStreaming, 2, 8),
        (TrafficProfile::FileDownload, 0, 1),
    ];
    for (profile, lo, hi) in cases {
        let shaper = TrafficShaper::new(profile);
        for _ in 0..100 {
            let delay = shaper.get_send_delay();
            assert!(delay >= Duration::from_millis(lo), "{profile}: {delay:?}");
            assert!(delay <= Duration::from_millis(hi), "{profile}: {delay:?}");
        }
    }
}

#[test]
fn unshape_passes_implausible_buffers_through() {
    let shaper = TrafficShaper::new(TrafficProfile::Gaming);

    let too_short = vec![1u8, 2];
    assert_eq!(shaper.unshape_packet(&too_short), too_short);

    // Prefix claims far more bytes than the buffer holds.
    let mut lying = vec![0xFFu8, 0xFF, 0xFF, 0xFF];
    lying.extend_from_slice(b"rest");
    assert_eq!(shaper.unshape_packet(&lying), lying);
}

#[test]
fn analyzer_aggregates_sizes() {
    let analyzer = TrafficAnalyzer::new();
    let empty = analyzer.statistics();
    assert_eq!(empty.packets, 0);
    assert_eq!(empty.min_bytes, 0);
    assert_eq!(empty.mean_bytes, 0.0);

    for size in [100usize, 200, 600] {
        analyzer.record_packet(size);
    }
    let stats = analyzer.statistics();
    assert_eq!(stats.packets, 3);
    assert_eq!(stats.total_bytes, 900);
    assert_eq!(stats.min_bytes, 100);
    assert_eq!(stats.max_bytes, 600);
    assert_eq!(stats.mean_bytes, 300.0);
}
