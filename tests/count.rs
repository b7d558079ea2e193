mod common;

use std::rc::Rc;

use common::{counter, recorder, Rig};
use masoneffect::surface::MemorySurface;
use masoneffect::{Count, CountConfig, CountPatch, Phase};

fn mount(rig: &Rig, config: CountConfig) -> (Count, Rc<MemorySurface>) {
    let surface = Rc::new(MemorySurface::new());
    let count = Count::new(surface.clone(), rig.host.clone(), config);
    (count, surface)
}

#[test]
fn shows_the_start_value_until_visible() {
    let rig = Rig::new();
    let mut config = CountConfig::new(50.0);
    config.start_value = 10.0;
    let (count, surface) = mount(&rig, config);
    assert_eq!(count.phase(), Phase::Armed);
    assert_eq!(surface.text(), "10");
    rig.frames(5);
    assert_eq!(count.value(), 10.0);
    assert_eq!(rig.scheduler.pending(), 0);
}

#[test]
fn lands_exactly_on_the_target() {
    let rig = Rig::new();
    let (on_complete, completions) = counter();
    let (on_update, updates) = recorder::<f64>();
    let mut config = CountConfig::new(1000.0);
    config.on_complete = Some(on_complete);
    config.on_update = Some(on_update);
    let (count, surface) = mount(&rig, config);

    rig.show();
    assert!(count.is_running());
    rig.run_for(1000.0);
    let midway = count.value();
    assert!(midway > 0.0 && midway < 1000.0);
    assert_eq!(midway, midway.floor());

    rig.run_for(1100.0);
    assert_eq!(count.phase(), Phase::Completed);
    assert_eq!(count.value(), 1000.0);
    assert_eq!(surface.text(), "1,000");
    assert_eq!(completions.get(), 1);
    assert_eq!(rig.scheduler.pending(), 0);

    let updates = updates.borrow();
    assert!(updates.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(updates.iter().all(|value| *value <= 1000.0));
}

#[test]
fn fractional_targets_are_not_floored_at_the_end() {
    let rig = Rig::new();
    let mut config = CountConfig::new(99.5);
    config.duration = 100.0;
    let (count, _surface) = mount(&rig, config);
    rig.show();
    rig.run_for(200.0);
    assert_eq!(count.value(), 99.5);
}

#[test]
fn zero_duration_completes_on_the_first_frame() {
    let rig = Rig::new();
    let (on_complete, completions) = counter();
    let mut config = CountConfig::new(100.0);
    config.duration = 0.0;
    config.on_complete = Some(on_complete);
    let (count, surface) = mount(&rig, config);

    rig.show();
    assert_eq!(completions.get(), 0);
    rig.frames(1);
    assert_eq!(completions.get(), 1);
    assert_eq!(count.value(), 100.0);
    assert_eq!(surface.text(), "100");
    assert_eq!(count.phase(), Phase::Completed);
}

#[test]
fn start_while_running_keeps_a_single_chain() {
    let rig = Rig::new();
    let (count, _surface) = mount(&rig, CountConfig::new(100.0));
    rig.show();
    rig.frames(2);
    let requests = rig.scheduler.frame_requests();
    count.start();
    count.start();
    assert_eq!(rig.scheduler.frame_requests(), requests);
    assert_eq!(rig.scheduler.pending_frames(), 1);
    rig.frames(1);
    assert_eq!(rig.scheduler.pending_frames(), 1);
}

#[test]
fn destroy_twice_leaves_nothing_behind() {
    let rig = Rig::new();
    let (count, _surface) = mount(&rig, CountConfig::new(100.0));
    rig.show();
    rig.frames(3);
    count.destroy();
    count.destroy();
    assert_eq!(count.phase(), Phase::Destroyed);
    assert_eq!(rig.scheduler.pending(), 0);
    assert_eq!(rig.visibility.active_observers(), 0);
    assert_eq!(rig.visibility.active_page_listeners(), 0);
    count.start();
    rig.show();
    assert_eq!(rig.scheduler.pending(), 0);
}

#[test]
fn hiding_resets_and_showing_replays() {
    let rig = Rig::new();
    let (count, surface) = mount(&rig, CountConfig::new(100.0));
    rig.show();
    rig.run_for(500.0);
    assert!(count.value() > 0.0);

    rig.hide();
    assert!(!count.is_running());
    assert_eq!(count.phase(), Phase::Armed);
    assert_eq!(surface.text(), "0");
    assert_eq!(rig.scheduler.pending(), 0);

    rig.show();
    assert!(count.is_running());
    rig.run_for(2100.0);
    assert_eq!(count.value(), 100.0);
}

#[test]
fn update_config_keeps_callbacks() {
    let rig = Rig::new();
    let (on_complete, completions) = counter();
    let mut config = CountConfig::new(100.0);
    config.on_complete = Some(on_complete);
    let (count, _surface) = mount(&rig, config);

    count.update_config(CountPatch {
        duration: Some(500.0),
        ..CountPatch::default()
    });
    assert!(count.config().on_complete.is_some());
    rig.show();
    rig.run_for(600.0);
    assert_eq!(completions.get(), 1);
}

#[test]
fn update_config_while_running_restarts() {
    let rig = Rig::new();
    let (count, _surface) = mount(&rig, CountConfig::new(100.0));
    rig.show();
    rig.run_for(1000.0);
    assert!(count.value() > 0.0);

    count.update_config(CountPatch {
        target_value: Some(10.0),
        ..CountPatch::default()
    });
    assert!(count.is_running());
    assert_eq!(count.value(), 0.0);
    assert_eq!(rig.scheduler.pending_frames(), 1);
    rig.run_for(2100.0);
    assert_eq!(count.value(), 10.0);
}

#[test]
fn retargeting_while_hidden_only_resets() {
    let rig = Rig::new();
    let (count, surface) = mount(&rig, CountConfig::new(100.0));
    count.update_config(CountPatch {
        start_value: Some(5.0),
        ..CountPatch::default()
    });
    assert_eq!(count.phase(), Phase::Armed);
    assert_eq!(surface.text(), "5");
    assert_eq!(rig.scheduler.pending(), 0);
}

#[test]
fn threshold_changes_recreate_the_observer() {
    let rig = Rig::new();
    let (count, _surface) = mount(&rig, CountConfig::new(100.0));
    assert_eq!(rig.visibility.observe_calls(), 1);
    let patch: CountPatch = serde_json::from_str(r#"{"threshold":0.6}"#).unwrap();
    count.update_config(patch);
    assert_eq!(rig.visibility.observe_calls(), 2);
    assert_eq!(rig.visibility.active_observers(), 1);
    assert_eq!(rig.visibility.last_options().unwrap().threshold, 0.6);
    assert_eq!(rig.visibility.active_page_listeners(), 1);
}

#[test]
fn disabled_counts_never_start() {
    let rig = Rig::new();
    let patch: CountPatch =
        serde_json::from_str(r#"{"targetValue":100,"enabled":false}"#).unwrap();
    let (count, _surface) = mount(&rig, CountConfig::from_patch(patch).unwrap());
    rig.show();
    count.start();
    assert!(!count.is_running());

    count.update_config(serde_json::from_str(r#"{"enabled":true}"#).unwrap());
    assert!(count.is_running());
}

#[test]
fn observation_changes_while_running_keep_the_run_going() {
    for trigger_once in [false, true] {
        let rig = Rig::new();
        let mut config = CountConfig::new(100.0);
        config.trigger.trigger_once = trigger_once;
        let (count, surface) = mount(&rig, config);
        rig.show();
        rig.run_for(500.0);
        assert!(count.is_running());

        let patch: CountPatch = serde_json::from_str(r#"{"threshold":0.6}"#).unwrap();
        count.update_config(patch);
        assert!(count.is_running(), "trigger_once = {trigger_once}");
        assert_eq!(rig.visibility.active_observers(), 1);

        rig.run_for(2500.0);
        assert_eq!(count.phase(), Phase::Completed);
        assert_eq!(surface.text(), "100");
    }
}
