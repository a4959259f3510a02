//! Integration tests for cache scanning, registry sync and eviction.

mod common;

use std::time::Duration;

use common::TestContext;
use streamseed::registry::RegistryStore;
use streamseed::seeder::maintenance;

#[tokio::test]
async fn scan_and_sync_registers_segments_per_quality() {
    let ctx = TestContext::new();
    ctx.write_cached("m1", None, "master.m3u8", b"#EXTM3U");
    ctx.write_cached("m1", Some("720p"), "init.mp4", b"init");
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");
    ctx.write_cached("m1", Some("1080p"), "seg_0001.m4s", b"data");

    let segments = ctx.state.seeder.scan_cache().await;
    assert_eq!(segments.len(), 4);
    ctx.state.seeder.sync_to_registry(&segments).await;

    let movie_level = ctx.registry.set_members("movie:m1:segments").await.unwrap();
    assert!(movie_level.contains("master.m3u8"));

    let p720 = ctx
        .registry
        .set_members("movie:m1:quality:720p:segments")
        .await
        .unwrap();
    assert!(p720.contains("init.mp4"));
    assert!(p720.contains("seg_0001.m4s"));

    let p1080 = ctx
        .registry
        .set_members("movie:m1:quality:1080p:segments")
        .await
        .unwrap();
    assert_eq!(p1080.len(), 1);
}

#[tokio::test]
async fn critical_segments_survive_any_age() {
    // A zero cache window makes every media segment instantly expired.
    let ctx = TestContext::with_config_tweak(|c| c.cache_window = Duration::from_secs(0));
    ctx.write_cached("m1", None, "master.m3u8", b"#EXTM3U");
    ctx.write_cached("m1", Some("720p"), "init.mp4", b"init");
    ctx.write_cached("m1", Some("720p"), "playlist.m3u8", b"#EXTM3U");
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");

    let segments = ctx.state.seeder.scan_cache().await;
    let expired = ctx.state.seeder.find_expired(&segments);

    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].segment_id, "seg_0001.m4s");
}

#[tokio::test]
async fn fresh_media_is_not_selected() {
    let ctx = TestContext::new(); // 240s window
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");

    let segments = ctx.state.seeder.scan_cache().await;
    assert!(ctx.state.seeder.find_expired(&segments).is_empty());
}

#[tokio::test]
async fn purge_is_idempotent_and_cleans_registry() {
    let ctx = TestContext::with_config_tweak(|c| c.cache_window = Duration::from_secs(0));
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");

    let segments = ctx.state.seeder.scan_cache().await;
    ctx.state.seeder.sync_to_registry(&segments).await;
    let expired = ctx.state.seeder.find_expired(&segments);
    assert_eq!(expired.len(), 1);

    // Delete the backing file out from under the purge: it must not error
    // and must still retract the registry entry.
    std::fs::remove_file(&expired[0].path).unwrap();
    ctx.state.seeder.purge_expired(&expired).await;

    let remaining = ctx
        .registry
        .set_members("movie:m1:quality:720p:segments")
        .await
        .unwrap();
    assert!(remaining.is_empty());

    // Purging again is a no-op, not an error.
    ctx.state.seeder.purge_expired(&expired).await;
}

#[tokio::test]
async fn maintenance_tick_evicts_expired_media_only() {
    let ctx = TestContext::with_config_tweak(|c| c.cache_window = Duration::from_secs(0));
    ctx.write_cached("m1", None, "master.m3u8", b"#EXTM3U");
    ctx.write_cached("m1", Some("720p"), "init.mp4", b"init");
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");

    maintenance::run_tick(&ctx.state.seeder).await;

    let movie_dir = ctx.cache_dir.path().join("m1");
    assert!(movie_dir.join("master.m3u8").exists());
    assert!(movie_dir.join("720p/init.mp4").exists());
    assert!(!movie_dir.join("720p/seg_0001.m4s").exists());

    let remaining = ctx
        .registry
        .set_members("movie:m1:quality:720p:segments")
        .await
        .unwrap();
    assert!(remaining.contains("init.mp4"));
    assert!(!remaining.contains("seg_0001.m4s"));
}

#[tokio::test]
async fn startup_announce_registers_preexisting_cache() {
    let ctx = TestContext::with_config_tweak(|c| c.cache_window = Duration::from_secs(0));
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");

    maintenance::startup_announce(&ctx.state.seeder).await;

    // Announced, and not evicted: the boot pass never purges.
    let registered = ctx
        .registry
        .set_members("movie:m1:quality:720p:segments")
        .await
        .unwrap();
    assert!(registered.contains("seg_0001.m4s"));
    assert!(ctx.cache_dir.path().join("m1/720p/seg_0001.m4s").exists());
}

#[tokio::test]
async fn refresh_ttl_keeps_live_keys_alive() {
    let ctx = TestContext::with_config_tweak(|c| c.segment_ttl = Duration::from_millis(300));
    ctx.write_cached("m1", Some("720p"), "seg_0001.m4s", b"data");

    let segments = ctx.state.seeder.scan_cache().await;
    ctx.state.seeder.sync_to_registry(&segments).await;

    // Without a refresh the key would lapse at 300ms.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let live: Vec<_> = segments.iter().collect();
    ctx.state.seeder.refresh_ttl(&live).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let members = ctx
        .registry
        .set_members("movie:m1:quality:720p:segments")
        .await
        .unwrap();
    assert!(members.contains("seg_0001.m4s"));

    // Once refreshes stop, the TTL wins.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(ctx
        .registry
        .set_members("movie:m1:quality:720p:segments")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn critical_keys_are_persisted() {
    let ctx = TestContext::with_config_tweak(|c| c.segment_ttl = Duration::from_millis(100));
    ctx.write_cached("m1", None, "master.m3u8", b"#EXTM3U");

    let segments = ctx.state.seeder.scan_cache().await;
    ctx.state.seeder.sync_to_registry(&segments).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    let members = ctx.registry.set_members("movie:m1:segments").await.unwrap();
    assert!(members.contains("master.m3u8"));
}
