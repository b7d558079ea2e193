mod common;

use std::rc::Rc;

use common::{counter, Rig};
use masoneffect::distance::Direction;
use masoneffect::surface::MemorySurface;
use masoneffect::{Phase, ScrollFadeIn, ScrollFadeInConfig, ScrollFadeInPatch, Size};

fn mount(
    rig: &Rig,
    surface: MemorySurface,
    config: ScrollFadeInConfig,
) -> (ScrollFadeIn, Rc<MemorySurface>) {
    let surface = Rc::new(surface);
    let fade = ScrollFadeIn::new(surface.clone(), rig.host.clone(), config);
    (fade, surface)
}

fn style(surface: &MemorySurface, property: &str) -> Option<String> {
    surface.style(property)
}

#[test]
fn starts_offset_and_transparent() {
    let rig = Rig::new();
    let (fade, surface) = mount(&rig, MemorySurface::new(), ScrollFadeInConfig::default());
    assert_eq!(fade.phase(), Phase::Armed);
    assert_eq!(fade.distance_px(), 50.0);
    assert_eq!(style(&surface, "transform").as_deref(), Some("translate(0px, 50px)"));
    assert_eq!(style(&surface, "opacity").as_deref(), Some("0"));
    assert_eq!(style(&surface, "transition").as_deref(), Some("none"));
}

#[test]
fn slides_in_and_restores_the_original_transform() {
    let rig = Rig::new();
    let (on_start, starts) = counter();
    let (on_complete, completions) = counter();
    let config = ScrollFadeInConfig {
        on_start: Some(on_start),
        on_complete: Some(on_complete),
        ..ScrollFadeInConfig::default()
    };
    let (fade, surface) = mount(&rig, MemorySurface::new().with_transform("rotate(5deg)"), config);
    assert_eq!(
        style(&surface, "transform").as_deref(),
        Some("translate(0px, 50px) rotate(5deg)")
    );

    rig.show();
    assert_eq!(starts.get(), 1);
    rig.run_for(400.0);
    assert_eq!(style(&surface, "opacity").as_deref(), Some("0.875"));
    assert_eq!(
        style(&surface, "transform").as_deref(),
        Some("translate(0px, 6.25px) rotate(5deg)")
    );

    rig.run_for(500.0);
    assert_eq!(fade.phase(), Phase::Completed);
    assert_eq!(completions.get(), 1);
    assert_eq!(style(&surface, "opacity").as_deref(), Some("1"));
    assert_eq!(style(&surface, "transform").as_deref(), Some("rotate(5deg)"));
}

#[test]
fn identity_transforms_are_not_preserved() {
    let rig = Rig::new();
    let surface = MemorySurface::new().with_transform("none");
    let (_fade, surface) = mount(&rig, surface, ScrollFadeInConfig::default());
    assert_eq!(style(&surface, "transform").as_deref(), Some("translate(0px, 50px)"));
}

#[test]
fn relative_distances_resolve_against_the_element() {
    let rig = Rig::new();
    let config = ScrollFadeInConfig {
        direction: Direction::Top,
        distance: "50%".into(),
        ..ScrollFadeInConfig::default()
    };
    let surface = MemorySurface::new().with_size(Size::new(300.0, 200.0));
    let (fade, surface) = mount(&rig, surface, config);
    assert_eq!(fade.distance_px(), 100.0);
    assert_eq!(style(&surface, "transform").as_deref(), Some("translate(0px, -100px)"));

    fade.update_config(ScrollFadeInPatch {
        distance: Some("2rem".into()),
        ..ScrollFadeInPatch::default()
    });
    assert_eq!(fade.distance_px(), 32.0);

    fade.update_config(ScrollFadeInPatch {
        distance: Some("garbage".into()),
        ..ScrollFadeInPatch::default()
    });
    assert_eq!(fade.distance_px(), 50.0);
}

#[test]
fn direction_change_moves_the_start_position() {
    let rig = Rig::new();
    let (fade, surface) = mount(&rig, MemorySurface::new(), ScrollFadeInConfig::default());
    fade.update_config(ScrollFadeInPatch {
        direction: Some(Direction::Left),
        ..ScrollFadeInPatch::default()
    });
    assert_eq!(style(&surface, "transform").as_deref(), Some("translate(-50px, 0px)"));
    assert_eq!(fade.phase(), Phase::Armed);
}

#[test]
fn leaving_view_reverts_and_allows_replay() {
    let rig = Rig::new();
    let (on_start, starts) = counter();
    let config = ScrollFadeInConfig {
        on_start: Some(on_start),
        ..ScrollFadeInConfig::default()
    };
    let (fade, surface) = mount(&rig, MemorySurface::new(), config);
    rig.show();
    rig.run_for(900.0);
    assert_eq!(fade.phase(), Phase::Completed);

    rig.hide();
    assert_eq!(fade.phase(), Phase::Armed);
    assert!(!fade.has_triggered());
    assert_eq!(style(&surface, "opacity").as_deref(), Some("0"));

    rig.show();
    assert!(fade.is_running());
    assert_eq!(starts.get(), 2);
}

#[test]
fn rem_distances_follow_the_root_font_size() {
    let rig = Rig::new();
    let config = ScrollFadeInConfig {
        distance: "2rem".into(),
        ..ScrollFadeInConfig::default()
    };
    let surface = MemorySurface::new().with_root_font_size(Some(20.0));
    let (fade, surface) = mount(&rig, surface, config);
    assert_eq!(fade.distance_px(), 40.0);
    assert_eq!(style(&surface, "transform").as_deref(), Some("translate(0px, 40px)"));
}

#[test]
fn destroy_cleans_inline_styles() {
    let rig = Rig::new();
    let surface = MemorySurface::new().with_transform("scale(2)");
    let (fade, surface) = mount(&rig, surface, ScrollFadeInConfig::default());
    rig.show();
    rig.frames(3);
    fade.destroy();
    fade.destroy();
    assert_eq!(style(&surface, "transform").as_deref(), Some("scale(2)"));
    assert_eq!(style(&surface, "opacity"), None);
    assert_eq!(style(&surface, "transition"), None);
    assert_eq!(rig.scheduler.pending(), 0);
}

#[test]
fn options_parse_from_json() {
    let patch: ScrollFadeInPatch =
        serde_json::from_str(r#"{"direction":"right","distance":"10vw","duration":300}"#).unwrap();
    let rig = Rig::new();
    let config = ScrollFadeInConfig::from_patch(patch);
    let surface = MemorySurface::new().with_viewport(Size::new(1000.0, 500.0));
    let (fade, surface) = mount(&rig, surface, config);
    assert_eq!(fade.distance_px(), 100.0);
    assert_eq!(style(&surface, "transform").as_deref(), Some("translate(100px, 0px)"));
}
