//! Visibility rules every effect shares.

mod common;

use std::rc::Rc;

use common::Rig;
use masoneffect::host::manual::ManualVisibility;
use masoneffect::surface::MemorySurface;
use masoneffect::{
    Count, CountConfig, MemoryCanvas, Phase, ScrollFadeIn, ScrollFadeInConfig, Size, TextSpin,
    TextSpinConfig, TextToParticle, TextToParticleConfig, Typing, TypingConfig,
};

/// A mounted effect seen through its run state only.
struct Mounted {
    name: &'static str,
    is_running: Box<dyn Fn() -> bool>,
}

fn mount_all(rig: &Rig, trigger_once: bool) -> Vec<Mounted> {
    let host = || rig.host.clone();
    let surface = || Rc::new(MemorySurface::new().with_size(Size::new(300.0, 200.0)));
    let mut mounted = Vec::new();

    let mut config = CountConfig::new(100.0);
    config.trigger.trigger_once = trigger_once;
    let count = Count::new(surface(), host(), config);
    mounted.push(Mounted {
        name: "count",
        is_running: Box::new(move || count.is_running()),
    });

    let mut config = ScrollFadeInConfig::default();
    config.trigger.trigger_once = trigger_once;
    let fade = ScrollFadeIn::new(surface(), host(), config);
    mounted.push(Mounted {
        name: "scroll fade in",
        is_running: Box::new(move || fade.is_running()),
    });

    let mut config = TextSpinConfig::new("spin");
    config.trigger.trigger_once = trigger_once;
    let spin = TextSpin::new(surface(), host(), config).unwrap();
    mounted.push(Mounted {
        name: "text spin",
        is_running: Box::new(move || spin.is_running()),
    });

    let mut config = TypingConfig::new("typing");
    config.trigger.trigger_once = trigger_once;
    let typing = Typing::new(surface(), host(), config).unwrap();
    mounted.push(Mounted {
        name: "typing",
        is_running: Box::new(move || typing.is_running()),
    });

    if !trigger_once {
        let canvas = Rc::new(MemoryCanvas::new(Size::new(300.0, 150.0)));
        let field = TextToParticle::new(canvas, host(), TextToParticleConfig::default());
        mounted.push(Mounted {
            name: "text to particle",
            is_running: Box::new(move || field.is_running()),
        });
    }
    mounted
}

#[test]
fn leaving_view_always_stops_the_run() {
    for trigger_once in [false, true] {
        let rig = Rig::new();
        let mounted = mount_all(&rig, trigger_once);
        rig.show();
        rig.frames(1);
        for effect in &mounted {
            assert!((effect.is_running)(), "{} should run", effect.name);
        }
        rig.hide();
        for effect in &mounted {
            assert!(
                !(effect.is_running)(),
                "{} kept running after hide (trigger_once = {trigger_once})",
                effect.name
            );
        }
    }
}

#[test]
fn background_tab_stops_and_foreground_resumes() {
    let rig = Rig::new();
    let mounted = mount_all(&rig, false);
    rig.show();
    rig.visibility.set_page_visible(false);
    for effect in &mounted {
        assert!(!(effect.is_running)(), "{} ran in a hidden tab", effect.name);
    }
    rig.visibility.set_page_visible(true);
    for effect in &mounted {
        assert!((effect.is_running)(), "{} did not resume", effect.name);
    }
}

#[test]
fn hidden_tab_holds_back_the_first_run() {
    let rig = Rig::with_visibility(ManualVisibility::new().with_page_hidden());
    let mounted = mount_all(&rig, false);
    rig.show();
    for effect in &mounted {
        assert!(!(effect.is_running)(), "{} started in a hidden tab", effect.name);
    }
    rig.visibility.set_page_visible(true);
    for effect in &mounted {
        assert!((effect.is_running)(), "{} did not start", effect.name);
    }
}

#[test]
fn trigger_once_never_replays_a_finished_run() {
    let rig = Rig::new();
    let mut config = CountConfig::new(100.0);
    config.duration = 100.0;
    config.trigger.trigger_once = true;
    let surface = Rc::new(MemorySurface::new());
    let count = Count::new(surface.clone(), rig.host.clone(), config);

    rig.show();
    rig.run_for(200.0);
    assert_eq!(count.phase(), Phase::Completed);
    let requests = rig.scheduler.frame_requests();

    rig.hide();
    rig.show();
    rig.frames(3);
    assert!(!count.is_running());
    assert_eq!(count.phase(), Phase::Completed);
    assert_eq!(surface.text(), "100");
    assert_eq!(rig.scheduler.frame_requests(), requests);
}

#[test]
fn trigger_once_resumes_an_interrupted_run() {
    let rig = Rig::new();
    let mut config = CountConfig::new(1000.0);
    config.duration = 1000.0;
    config.trigger.trigger_once = true;
    let count = Count::new(Rc::new(MemorySurface::new()), rig.host.clone(), config);

    rig.show();
    rig.run_for(480.0);
    rig.hide();
    assert_eq!(count.phase(), Phase::Paused);
    let paused_at = count.value();
    assert!(paused_at > 0.0);

    rig.run_for(2000.0);
    assert_eq!(count.value(), paused_at);
    rig.show();
    assert!(count.is_running());
    rig.run_for(1000.0);
    assert_eq!(count.value(), 1000.0);
}

#[test]
fn missing_intersection_observer_runs_immediately() {
    let rig = Rig::with_visibility(ManualVisibility::without_intersection());
    let mut config = CountConfig::new(10.0);
    config.duration = 100.0;
    let count = Count::new(Rc::new(MemorySurface::new()), rig.host.clone(), config);
    assert!(count.is_running());
    rig.run_for(200.0);
    assert_eq!(count.phase(), Phase::Completed);
    assert_eq!(count.value(), 10.0);
}

#[test]
fn missing_page_visibility_only_follows_the_element() {
    let rig = Rig::with_visibility(ManualVisibility::without_page_visibility());
    let count = Count::new(
        Rc::new(MemorySurface::new()),
        rig.host.clone(),
        CountConfig::new(10.0),
    );
    rig.visibility.set_page_visible(false);
    rig.show();
    assert!(count.is_running());
    assert_eq!(rig.visibility.active_page_listeners(), 0);
}
