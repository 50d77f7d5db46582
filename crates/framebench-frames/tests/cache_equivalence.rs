use framebench_frames::{frame_file_path, FrameCache, FrameSource, SyntheticPattern};
use framebench_types::CacheConfig;
use proptest::prelude::*;

fn assert_matches_source(cache: &FrameCache, config: &CacheConfig) {
    let source = SyntheticPattern;
    let mut buf = Vec::new();
    for index in 0..config.total_frame_count {
        let expected = source.generate(config.width, config.height, index);
        let frame = cache.get_frame(index).unwrap();
        assert_eq!(frame, expected, "frame {index}");

        cache.read_frame_into(index, &mut buf).unwrap();
        assert_eq!(buf.as_slice(), expected.data.as_ref());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_memory_cache_independent_of_worker_count(
        frames in 1usize..40,
        workers in 1usize..12,
    ) {
        let config = CacheConfig::in_memory(16, 8, frames).with_worker_threads(workers);
        let cache = FrameCache::synthetic();
        cache.initialize(&config).unwrap();

        prop_assert!(cache.is_ready());
        assert_matches_source(&cache, &config);
    }

    #[test]
    fn test_disk_cache_independent_of_worker_count(
        frames in 1usize..24,
        workers in 1usize..8,
    ) {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("cache");
        let config = CacheConfig::on_disk(16, 8, frames, &dir).with_worker_threads(workers);

        let cache = FrameCache::synthetic();
        cache.initialize(&config).unwrap();
        assert_matches_source(&cache, &config);

        cache.reset();
        for index in 0..frames {
            prop_assert!(!frame_file_path(&dir, index).exists());
        }
        prop_assert!(!dir.exists());
    }
}
