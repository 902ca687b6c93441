//! End-to-end discovery workflow tests over mock infrastructure.

use std::sync::Arc;

use harmonia_core::testing::{torrent_source, MockAdapter, MockLlmClient, MockMetadataProvider};
use harmonia_core::{
    DiscoveryOutcome, MetadataProvider, MusicSource, OutcomeCode, SearchEngine, SearchOptions,
    SearchOrchestrator, SongStrategy, SourceAdapter,
};

fn engine(adapters: Vec<Arc<dyn SourceAdapter>>) -> Arc<SearchEngine> {
    Arc::new(SearchEngine::new(adapters))
}

fn options() -> SearchOptions {
    SearchOptions {
        min_seeders: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn simple_album_query_selects_flac() {
    let metadata = Arc::new(MockMetadataProvider::new().with_recordings(vec![
        MockMetadataProvider::release(
            "mbid-okc",
            "Radiohead",
            "OK Computer",
            Some("OK Computer"),
            98,
        ),
    ]));

    let adapter = MockAdapter::new("indexer-a").with_handler(|query| {
        if query.contains("OK Computer") {
            vec![
                torrent_source("Radiohead - OK Computer [FLAC]", "aaa111", 40, 600),
                torrent_source("Radiohead - OK Computer [MP3 320]", "bbb222", 80, 150),
            ]
        } else {
            Vec::new()
        }
    });

    let orchestrator = SearchOrchestrator::new(
        engine(vec![Arc::new(adapter)]),
        metadata,
        None,
        None,
    );

    let options = options();
    let (parsed, selection) = match orchestrator.begin("radiohead ok computer", &options).await {
        DiscoveryOutcome::Candidates { parsed, selection } => (parsed, selection),
        DiscoveryOutcome::Completed(outcome) => {
            panic!("expected candidates, got {:?}", outcome.code)
        }
    };

    assert_eq!(parsed.artist.as_deref(), Some("radiohead"));
    assert_eq!(selection.releases.len(), 1);

    let outcome = orchestrator
        .resume(
            &parsed,
            &selection.releases[0],
            SongStrategy::SingleOrAlbum,
            &options,
        )
        .await;

    assert_eq!(outcome.code, OutcomeCode::Ok);
    assert!(!outcome.results.is_empty());
    let decision = outcome.decision.expect("selection decision");
    // Quality fallback (no advisor): FLAC outranks MP3.
    assert!(decision.fallback_used);
    assert_eq!(decision.selected.format.as_deref(), Some("FLAC"));
}

#[tokio::test]
async fn song_query_album_mismatch_advances_to_album_attempt() {
    let metadata = Arc::new(MockMetadataProvider::new().with_recordings(vec![
        MockMetadataProvider::release(
            "mbid-bos",
            "Iron Maiden",
            "Fear of the Dark",
            Some("The Book of Souls: Live Chapter"),
            95,
        ),
    ]));

    let adapter = MockAdapter::new("indexer-a").with_handler(|query| {
        if query.contains("Fear of the Dark") && !query.contains("Book of Souls") {
            // Small single-track torrents from other albums.
            vec![
                torrent_source("Iron Maiden - Fear of the Dark (single) [MP3 320]", "c1", 25, 12),
                torrent_source("Iron Maiden - Fear of the Dark live [FLAC]", "c2", 10, 60),
            ]
        } else if query.contains("Book of Souls") {
            vec![torrent_source(
                "Iron Maiden - The Book of Souls Live Chapter [FLAC]",
                "d1",
                55,
                900,
            )]
        } else {
            Vec::new()
        }
    });

    // Advisor call order: parse, group, select (attempt A), select (attempt B).
    let advisor = Arc::new(MockLlmClient::with_sequence(vec![
        r#"{"artist": "Iron Maiden", "song": "Fear of the Dark", "search_type": "song", "confidence": 0.9}"#,
        r#"{"search_type": "song", "explanation": "Live album", "groups": [{"index": 0, "label": "The Book of Souls: Live Chapter", "recommended": true}]}"#,
        r#"{"selected_index": -1, "reasoning": "no candidate is from that album"}"#,
        r#"{"selected_index": 0, "reasoning": "matches the selected album"}"#,
    ]));

    let orchestrator = SearchOrchestrator::new(
        engine(vec![Arc::new(adapter)]),
        metadata,
        Some(advisor),
        None,
    );

    let options = options();
    let (parsed, selection) = match orchestrator
        .begin("Iron Maiden Fear of the Dark", &options)
        .await
    {
        DiscoveryOutcome::Candidates { parsed, selection } => (parsed, selection),
        DiscoveryOutcome::Completed(outcome) => {
            panic!("expected candidates, got {:?}", outcome.code)
        }
    };

    let outcome = orchestrator
        .resume(&parsed, &selection.releases[0], SongStrategy::Auto, &options)
        .await;

    assert_eq!(outcome.code, OutcomeCode::Ok);
    let decision = outcome.decision.expect("selection decision");
    assert!(!decision.fallback_used);
    assert!(decision.selected.title.contains("Book of Souls"));
    // The final search was the album attempt.
    assert!(outcome.query_used.contains("The Book of Souls"));
    // Edition suffix was sanitized out of the torrent query.
    assert!(!outcome.query_used.contains(':'));
}

#[tokio::test]
async fn zero_results_fall_back_to_direct_search() {
    let metadata = Arc::new(MockMetadataProvider::new());
    let adapter = MockAdapter::new("indexer-a");

    let orchestrator = SearchOrchestrator::new(
        engine(vec![Arc::new(adapter)]),
        metadata,
        None,
        None,
    );

    let outcome = match orchestrator
        .begin("nonsense_band_xyz nonsense_album", &options())
        .await
    {
        DiscoveryOutcome::Completed(outcome) => outcome,
        DiscoveryOutcome::Candidates { .. } => panic!("expected completed fallback"),
    };

    assert_eq!(outcome.code, OutcomeCode::MetadataUnavailable);
    assert!(outcome.results.is_empty());
    assert!(outcome.decision.is_none());
}

#[tokio::test]
async fn tripped_adapter_is_excluded_from_results() {
    let failing = Arc::new(MockAdapter::new("flaky"));
    failing.set_failing(true);

    let healthy_sources = vec![{
        let mut source = torrent_source("Good Album [FLAC]", "eee333", 20, 500);
        source.indexer = "steady".to_string();
        source
    }];
    let steady = Arc::new(MockAdapter::new("steady").with_results(healthy_sources));

    let engine = engine(vec![
        Arc::clone(&failing) as Arc<dyn SourceAdapter>,
        Arc::clone(&steady) as Arc<dyn SourceAdapter>,
    ]);

    // Three failures trip the breaker.
    for _ in 0..3 {
        engine.search("warmup", None, 1).await;
    }
    assert!(!failing.is_healthy());

    let results = engine.search("good album", None, 1).await;
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.indexer != "flaky"));
    // The tripped adapter saw the three warmups but not the fourth query.
    assert_eq!(failing.recorded_queries().len(), 3);
}

#[tokio::test]
async fn duplicate_magnets_across_adapters_collapse() {
    let first = Arc::new(MockAdapter::new("first").with_results(vec![torrent_source(
        "Release from first",
        "ABC123",
        10,
        300,
    )]));
    let second = Arc::new(MockAdapter::new("second").with_results(vec![torrent_source(
        "Release from second",
        "abc123",
        30,
        300,
    )]));

    let engine = engine(vec![
        first as Arc<dyn SourceAdapter>,
        second as Arc<dyn SourceAdapter>,
    ]);

    let results = engine.search("release", None, 1).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].identity(), "abc123");
}

#[tokio::test]
async fn metadata_search_is_deterministic_across_calls() {
    let provider = MockMetadataProvider::new().with_recordings(vec![
        MockMetadataProvider::release("m3", "A", "Yesterday", Some("Help!"), 90),
        MockMetadataProvider::release("m1", "A", "Yesterday", Some("Anthology"), 90),
        MockMetadataProvider::release("m2", "A", "Yesterday", Some("1"), 95),
    ]);

    let first = provider
        .search_recordings("yesterday", None, 10)
        .await
        .unwrap();
    let second = provider
        .search_recordings("yesterday", None, 10)
        .await
        .unwrap();

    let ids = |v: &[harmonia_core::MetadataRelease]| {
        v.iter().map(|r| r.mbid.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(ids(&first), vec!["m2", "m1", "m3"]);
}

#[tokio::test]
async fn prefilter_drops_unavailable_releases() {
    let metadata = Arc::new(MockMetadataProvider::new().with_recordings(vec![
        MockMetadataProvider::release("m1", "Artist", "Song", Some("Available Album"), 95),
        MockMetadataProvider::release("m2", "Artist", "Song", Some("Ghost Album"), 90),
    ]));

    let adapter = MockAdapter::new("indexer-a").with_handler(|query| {
        if query.contains("Available Album") {
            vec![torrent_source("Artist - Available Album [FLAC]", "f1", 15, 400)]
        } else {
            Vec::new()
        }
    });

    let orchestrator = SearchOrchestrator::new(
        engine(vec![Arc::new(adapter)]),
        metadata,
        None,
        None,
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let options = SearchOptions {
        min_seeders: 1,
        progress: Some(tx),
        ..Default::default()
    };

    match orchestrator.begin("Artist Song Title", &options).await {
        DiscoveryOutcome::Candidates { selection, .. } => {
            assert_eq!(selection.releases.len(), 1);
            assert_eq!(
                selection.releases[0].release.album.as_deref(),
                Some("Available Album")
            );
        }
        DiscoveryOutcome::Completed(outcome) => {
            panic!("expected candidates, got {:?}", outcome.code)
        }
    }

    // Progress events were emitted along the way, monotonically.
    let mut percents = Vec::new();
    while let Ok(event) = rx.try_recv() {
        percents.push(event.percent);
    }
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn no_available_release_falls_back_to_artist_search() {
    let metadata = Arc::new(MockMetadataProvider::new().with_recordings(vec![
        MockMetadataProvider::release("m1", "Radiohead", "Song", Some("Ghost Album"), 95),
    ]));

    let adapter = MockAdapter::new("indexer-a").with_handler(|query| {
        // Nothing for any album, but a discography hit for the bare artist.
        if query.trim() == "radiohead" {
            vec![torrent_source("Radiohead Discography [FLAC]", "g1", 60, 5000)]
        } else {
            Vec::new()
        }
    });

    let orchestrator = SearchOrchestrator::new(
        engine(vec![Arc::new(adapter)]),
        metadata,
        None,
        None,
    );

    let outcome = match orchestrator.begin("radiohead some song", &options()).await {
        DiscoveryOutcome::Completed(outcome) => outcome,
        DiscoveryOutcome::Candidates { .. } => panic!("expected artist fallback"),
    };

    assert_eq!(outcome.code, OutcomeCode::Ok);
    assert_eq!(outcome.query_used, "radiohead");
    assert!(outcome.decision.is_some());
}

#[tokio::test]
async fn strict_mode_disables_format_fallback() {
    let metadata = Arc::new(MockMetadataProvider::new().with_recordings(vec![
        MockMetadataProvider::release("m1", "Artist", "Song", Some("Album"), 95),
    ]));

    // Only MP3 exists.
    let adapter = MockAdapter::new("indexer-a").with_handler(|query| {
        if query.contains("Album") {
            vec![torrent_source("Artist - Album [MP3 320]", "h1", 30, 120)]
        } else {
            Vec::new()
        }
    });

    let orchestrator = SearchOrchestrator::new(
        engine(vec![Arc::new(adapter)]),
        metadata,
        None,
        None,
    );

    let strict = SearchOptions {
        format_filter: Some("FLAC".to_string()),
        strict: true,
        min_seeders: 1,
        ..Default::default()
    };
    let lenient = SearchOptions {
        format_filter: Some("FLAC".to_string()),
        strict: false,
        min_seeders: 1,
        ..Default::default()
    };

    let (parsed, selection) = match orchestrator.begin("Artist Song Album", &lenient).await {
        DiscoveryOutcome::Candidates { parsed, selection } => (parsed, selection),
        DiscoveryOutcome::Completed(outcome) => {
            panic!("expected candidates, got {:?}", outcome.code)
        }
    };

    // Strict: FLAC-only search finds nothing and stays empty.
    let outcome = orchestrator
        .resume(&parsed, &selection.releases[0], SongStrategy::SingleOrAlbum, &strict)
        .await;
    assert_eq!(outcome.code, OutcomeCode::NoResults);

    // Lenient: falls back to any format and selects the MP3.
    let outcome = orchestrator
        .resume(&parsed, &selection.releases[0], SongStrategy::SingleOrAlbum, &lenient)
        .await;
    assert_eq!(outcome.code, OutcomeCode::Ok);
    let selected: &MusicSource = &outcome.decision.as_ref().unwrap().selected;
    assert_eq!(selected.format.as_deref(), Some("MP3"));
}
