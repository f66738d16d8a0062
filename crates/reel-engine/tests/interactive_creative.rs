mod common;

use std::time::Duration;

use common::{interactive_ad, response, Harness};
use reel_core::creative::{CreativeEvent, CreativeEventKind};
use reel_core::errors::ErrorKind;
use reel_core::events::{AdEvent, AdEventKind};
use reel_engine::mock::{FakeCreativeLoader, ScriptedCreative, StaticParser, TrackerCall};
use reel_engine::SessionState;
use serde_json::json;

fn interactive_harness(loader: FakeCreativeLoader) -> Harness {
    Harness::builder(StaticParser::respond(response(vec![interactive_ad("v1", None)])))
        .loader(loader)
        .build()
}

/// Request, init and start an interactive ad backed by `creative`.
async fn started(creative: &ScriptedCreative) -> Harness {
    let mut h = interactive_harness(FakeCreativeLoader::delivering(creative.clone()));
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    h.manager.start();
    h.settle().await;
    h
}

async fn emit(h: &mut Harness, creative: &ScriptedCreative, event: CreativeEvent) {
    assert!(creative.emit(event));
    h.settle().await;
}

#[tokio::test(start_paused = true)]
async fn interactive_ad_plays_through() {
    let creative = ScriptedCreative::vpaid2().with_timing(20.0, 20.0);
    let mut h = interactive_harness(FakeCreativeLoader::delivering(creative.clone()));
    h.request().await;

    h.manager.init(640, 360, "normal");
    h.settle().await;
    assert_eq!(h.manager.state(), SessionState::Loaded);
    assert!(h.manager.session().is_interactive);

    let args = creative.init_args().unwrap();
    assert_eq!(args[0], json!(640));
    assert_eq!(args[1], json!(360));
    assert_eq!(args[2], json!("normal"));
    assert_eq!(args[3], json!(268));
    assert_eq!(args[4], json!({ "AdParameters": "{\"campaign\":7}" }));
    assert_eq!(
        args[5],
        json!({ "slot": "fake-slot", "videoSlot": "fake-video", "videoSlotCanAutoPlay": true })
    );

    h.manager.start();
    h.settle().await;
    assert_eq!(h.manager.state(), SessionState::Playing);

    emit(&mut h, &creative, CreativeEvent::AdImpression).await;
    assert_eq!(h.manager.get_duration(), Some(20.0));

    // the poll derives progress from the remaining time
    creative.set_remaining(18.0);
    h.advance(Duration::from_millis(1050)).await;
    creative.set_remaining(9.0);
    h.advance(Duration::from_millis(1000)).await;

    emit(&mut h, &creative, CreativeEvent::AdVideoComplete).await;
    h.manager.stop();
    h.settle().await;

    assert_eq!(
        h.kinds(),
        vec![
            AdEventKind::SessionReady,
            AdEventKind::Loaded,
            AdEventKind::Started,
            AdEventKind::Impression,
            AdEventKind::VideoStart,
            AdEventKind::FirstQuartile,
            AdEventKind::Midpoint,
            AdEventKind::ThirdQuartile,
            AdEventKind::VideoComplete,
            AdEventKind::Stopped,
            AdEventKind::AllCompleted,
        ]
    );
    assert_eq!(h.manager.state(), SessionState::Idle);
    assert_eq!(h.trackers.count(&TrackerCall::Impression), 1);
    assert_eq!(h.trackers.count(&TrackerCall::Complete), 1);
    assert_eq!(h.trackers.count(&TrackerCall::Duration(20.0)), 1);
    assert!(h.trackers.count(&TrackerCall::Progress(11.0)) >= 1);

    assert_eq!(creative.subscriptions(), 0);
    assert_eq!(h.loader.closed().len(), 1);
    assert_eq!(h.loader.opened()[0].0, "https://cdn/v1.js");
}

#[tokio::test(start_paused = true)]
async fn reported_checkpoints_flush_skipped_ones() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();

    emit(&mut h, &creative, CreativeEvent::AdImpression).await;
    emit(&mut h, &creative, CreativeEvent::AdVideoMidpoint).await;
    emit(&mut h, &creative, CreativeEvent::AdVideoFirstQuartile).await;

    assert_eq!(
        h.kinds(),
        vec![
            AdEventKind::Impression,
            AdEventKind::VideoStart,
            AdEventKind::FirstQuartile,
            AdEventKind::Midpoint,
        ]
    );
    assert_eq!(h.manager.session().next_quartile_index, 4);
}

#[tokio::test(start_paused = true)]
async fn host_operations_reach_the_creative() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();

    h.manager.pause();
    h.settle().await;
    assert_eq!(h.manager.state(), SessionState::Paused);
    h.manager.resume();
    h.settle().await;
    assert_eq!(h.manager.state(), SessionState::Playing);

    h.manager.set_volume(0.3);
    h.settle().await;
    assert_eq!(h.manager.get_volume(), Some(0.3));

    h.manager.resize(800, 450, "fullscreen");
    h.manager.collapse();
    h.manager.expand();
    h.settle().await;

    assert_eq!(
        h.kinds(),
        vec![
            AdEventKind::Paused,
            AdEventKind::Playing,
            AdEventKind::VolumeChanged,
            AdEventKind::SizeChanged,
        ]
    );
    let calls = creative.calls();
    for method in ["pauseAd", "resumeAd", "setAdVolume", "resizeAd", "collapseAd", "expandAd"] {
        assert!(calls.iter().any(|c| c == method), "{method} not called");
    }
    assert_eq!(h.manager.get_remaining_time(), Some(15.0));
}

#[tokio::test(start_paused = true)]
async fn missing_optional_method_is_a_no_op() {
    let creative = ScriptedCreative::vpaid2().without("skipAd");
    let mut h = started(&creative).await;
    h.drain();

    h.manager.skip();
    h.settle().await;
    assert!(h.drain().is_empty());
    assert_eq!(h.manager.state(), SessionState::Playing);

    h.manager.pause();
    h.settle().await;
    assert_eq!(h.kinds(), vec![AdEventKind::Paused]);
}

#[tokio::test(start_paused = true)]
async fn stop_without_stop_ad_is_a_no_op() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();
    // the creative drops stopAd after the handshake accepted it
    creative.remove_method("stopAd");

    h.manager.stop();
    h.settle().await;
    assert!(h.drain().is_empty());
    assert_eq!(h.manager.state(), SessionState::Playing);
    assert!(!creative.calls().iter().any(|c| c == "stopAd"));

    h.manager.set_volume(0.5);
    h.manager.pause();
    h.settle().await;
    h.manager.resume();
    h.settle().await;
    assert_eq!(h.manager.state(), SessionState::Playing);
    let calls = creative.calls();
    for method in ["setAdVolume", "pauseAd", "resumeAd"] {
        assert!(calls.iter().any(|c| c == method), "{method} not called");
    }
}

#[tokio::test(start_paused = true)]
async fn skip_is_tracked() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();

    h.manager.skip();
    h.settle().await;
    assert_eq!(h.kinds(), vec![AdEventKind::Skipped, AdEventKind::AllCompleted]);
    assert_eq!(h.trackers.count(&TrackerCall::Skip), 1);
}

async fn handshake_error(creative: ScriptedCreative) -> reel_core::errors::ErrorRecord {
    let mut h = interactive_harness(FakeCreativeLoader::delivering(creative));
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    let events = h.drain();
    assert!(!events.iter().any(|e| e.kind() == AdEventKind::Loaded));
    assert_eq!(h.manager.state(), SessionState::Idle);
    Harness::error_of(&events)
}

#[tokio::test(start_paused = true)]
async fn handshake_rejections() {
    let error = handshake_error(
        ScriptedCreative::vpaid2()
            .without("getAdLinear")
            .without("unsubscribe"),
    )
    .await;
    assert_eq!(error.code(), 901);
    assert_eq!(
        error.message(),
        "Missing interfaces in the VPAID creative: unsubscribe getAdLinear"
    );

    let error = handshake_error(ScriptedCreative::vpaid2().with_version(Some("1.1"))).await;
    assert_eq!(error.message(), "Only support creatives with VPAID version >= 2.0");

    let error = handshake_error(ScriptedCreative::vpaid2().with_version(None)).await;
    assert_eq!(error.message(), "Cannot get VPAID version from the creative");

    let error = handshake_error(ScriptedCreative::vpaid2().with_version(Some("1.9.9"))).await;
    assert_eq!(error.kind(), ErrorKind::InteractiveCreativeError);
}

#[tokio::test(start_paused = true)]
async fn newer_handshake_version_is_accepted() {
    let creative = ScriptedCreative::vpaid2().with_version(Some("3.0"));
    let h = started(&creative).await;
    assert_eq!(h.manager.state(), SessionState::Playing);
}

#[tokio::test(start_paused = true)]
async fn load_failures() {
    let mut h = interactive_harness(FakeCreativeLoader::delivering_none());
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    let error = Harness::error_of(&h.drain());
    assert_eq!(error.message(), "VPAID creative object not obtainable");

    let mut h = interactive_harness(FakeCreativeLoader::failing("script 404"));
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    let error = Harness::error_of(&h.drain());
    assert_eq!(error.code(), 901);
    assert_eq!(error.inner_cause(), Some("script 404"));

    let creative = ScriptedCreative::vpaid2().failing("initAd", "bad parameters");
    let mut h = interactive_harness(FakeCreativeLoader::delivering(creative));
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    let error = Harness::error_of(&h.drain());
    assert_eq!(error.inner_cause(), Some("creative threw: bad parameters"));
}

#[tokio::test(start_paused = true)]
async fn creative_that_never_loads_times_out() {
    let mut h = interactive_harness(FakeCreativeLoader::manual());
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    assert_eq!(h.manager.state(), SessionState::CreativeSelected);

    h.advance(Duration::from_millis(7_990)).await;
    assert_eq!(h.kinds(), vec![AdEventKind::SessionReady]);

    h.advance(Duration::from_millis(20)).await;
    let error = Harness::error_of(&h.drain());
    assert_eq!(error.code(), 402);
    assert_eq!(
        error.message(),
        "VAST media file loading reached a timeout of 8 seconds."
    );
    assert_eq!(h.loader.closed().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn loaded_creative_cancels_the_load_timeout() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();
    h.advance(Duration::from_secs(10)).await;
    assert!(h.drain().is_empty());
    assert_eq!(h.manager.state(), SessionState::Playing);
}

#[tokio::test(start_paused = true)]
async fn delivery_for_a_superseded_load_is_dropped() {
    let mut h = interactive_harness(FakeCreativeLoader::manual());
    h.request().await;
    h.manager.init(640, 360, "normal");
    let stale = h.loader.last_sink().unwrap();

    h.request().await;
    h.manager.init(640, 360, "normal");
    let fresh = h.loader.last_sink().unwrap();
    assert_ne!(stale.token(), fresh.token());
    h.drain();

    let old = ScriptedCreative::vpaid2();
    stale.loaded(Some(Box::new(old.clone())));
    h.settle().await;
    assert!(h.drain().is_empty());
    assert!(old.calls().is_empty());

    let current = ScriptedCreative::vpaid2();
    fresh.loaded(Some(Box::new(current.clone())));
    h.settle().await;
    assert_eq!(h.kinds(), vec![AdEventKind::Loaded]);
    assert_eq!(current.calls()[0], "handshakeVersion");
}

#[tokio::test(start_paused = true)]
async fn stopped_before_started_is_an_error() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = interactive_harness(FakeCreativeLoader::delivering(creative.clone()));
    h.request().await;
    h.manager.init(640, 360, "normal");
    h.settle().await;
    h.drain();

    emit(&mut h, &creative, CreativeEvent::AdStopped).await;
    let error = Harness::error_of(&h.drain());
    assert_eq!(error.code(), 901);
    assert_eq!(error.inner_cause(), Some("creative stopped before it started"));
    assert_eq!(creative.subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn creative_error_and_log_events() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();

    emit(
        &mut h,
        &creative,
        CreativeEvent::AdLog {
            message: "buffering".into(),
        },
    )
    .await;
    emit(
        &mut h,
        &creative,
        CreativeEvent::AdError {
            message: "renderer crashed".into(),
        },
    )
    .await;

    let events = h.drain();
    assert_eq!(
        events[0],
        AdEvent::Log {
            message: "buffering".into()
        }
    );
    let error = Harness::error_of(&events);
    assert_eq!(error.code(), 901);
    assert_eq!(error.message(), "renderer crashed");
    assert_eq!(h.trackers.count(&TrackerCall::Error(901)), 1);
}

#[tokio::test(start_paused = true)]
async fn click_through_is_forwarded() {
    let creative = ScriptedCreative::vpaid2();
    let mut h = started(&creative).await;
    h.drain();

    emit(
        &mut h,
        &creative,
        CreativeEvent::AdClickThru {
            url: Some("https://advertiser.example".into()),
            id: Some("cta".into()),
            player_handles: false,
        },
    )
    .await;
    assert_eq!(
        h.drain(),
        vec![AdEvent::ClickThrough {
            url: Some("https://advertiser.example".into()),
            id: Some("cta".into()),
            player_handles: false,
        }]
    );
    assert_eq!(h.trackers.count(&TrackerCall::Click), 1);

    // slot clicks are the creative's business on this path
    h.manager.click();
    assert_eq!(h.trackers.count(&TrackerCall::Click), 1);
}

#[tokio::test(start_paused = true)]
async fn duration_change_is_read_from_the_creative() {
    let creative = ScriptedCreative::vpaid2().with_timing(30.0, 30.0);
    let mut h = started(&creative).await;
    h.drain();

    emit(&mut h, &creative, CreativeEvent::AdDurationChange).await;
    assert_eq!(h.kinds(), vec![AdEventKind::DurationChanged]);
    assert_eq!(h.manager.session().duration, Some(30.0));
    assert_eq!(h.trackers.count(&TrackerCall::Duration(30.0)), 1);
}

#[tokio::test(start_paused = true)]
async fn poll_stops_with_the_session() {
    let creative = ScriptedCreative::vpaid2().with_timing(20.0, 20.0);
    let mut h = started(&creative).await;
    emit(&mut h, &creative, CreativeEvent::AdImpression).await;
    h.manager.abort();
    h.drain();
    let calls = creative.calls().len();

    creative.set_remaining(1.0);
    h.advance(Duration::from_secs(5)).await;
    assert!(h.drain().is_empty());
    assert_eq!(creative.calls().len(), calls);
    assert_eq!(creative.subscriptions(), 0);
    assert!(!creative.emit(CreativeEvent::AdVideoMidpoint));
}

#[tokio::test(start_paused = true)]
async fn every_event_kind_is_subscribed() {
    let creative = ScriptedCreative::vpaid2();
    let _h = started(&creative).await;
    assert_eq!(creative.subscriptions(), CreativeEventKind::ALL.len());
}
