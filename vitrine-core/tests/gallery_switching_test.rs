use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vitrine_core::{
    ActivationError, Catalog, Gallery, GalleryError, HeadlessBackend, HookRegistry, PlanOptions,
    RenderBackend, ResourceCounts,
};

const MANIFEST: &str = r#"
[[entry]]
key = "plasma"
name = "Plasma"
sort = 10
tags = ["basic"]
source = """
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    float v = sin(uv.x * 10.0 + iTime) + sin(uv.y * 10.0 + iTime);
    fragColor = vec4(0.5 + 0.5 * cos(v + vec3(0.0, 2.0, 4.0)), 1.0);
}
"""

[[entry]]
key = "textured"
name = "Textured"
sort = 20
source = """
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    fragColor = texture(iChannel0, uv) * texture(iChannel1, uv * 2.0);
}
"""

[[entry.channel]]
index = 0
texture = "missing.png"

[[entry.channel]]
index = 1
texture = "missing.png"
wrap = "repeat"

[[entry]]
key = "feedback"
name = "Feedback"
sort = 30
source = """
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = texture(iChannel0, fragCoord / iResolution.xy);
}
"""

[[entry.channel]]
index = 0
buffer = "trail"

[[entry.buffer]]
name = "trail"
source = """
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    vec4 previous = texture(iChannel0, uv);
    float spot = step(length(fragCoord - iMouse.xy), 8.0);
    fragColor = max(previous * 0.98, vec4(spot));
}
"""

[[entry.buffer.channel]]
index = 0
buffer = "trail"

[[entry]]
key = "broken"
sort = 40
source = """
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(notDeclared, 1.0);
}
"""

[[entry]]
key = "tuned"
sort = 50
source = """
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    fragColor = vec4(vec3(brightness), 1.0);
}
"""

[[entry.param]]
name = "brightness"
default = 0.5
min = 0.0
max = 1.0
step = 0.1
"#;

fn catalog_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("catalog.toml"), MANIFEST).unwrap();
    dir
}

fn load_gallery(dir: &Path) -> Gallery<HeadlessBackend> {
    let catalog = Catalog::load(&[dir.to_path_buf()]).unwrap();
    Gallery::new(
        catalog,
        HookRegistry::with_builtins(),
        HeadlessBackend::new(640, 360),
        PlanOptions::default(),
    )
    .unwrap()
}

#[test]
fn test_catalog_order_from_disk() {
    let dir = catalog_dir();
    let gallery = load_gallery(dir.path());
    let keys: Vec<&str> = gallery.catalog().keys().collect();
    assert_eq!(keys, vec!["plasma", "textured", "feedback", "broken", "tuned"]);
}

#[test]
fn test_switching_never_leaks_resources() {
    let dir = catalog_dir();
    let mut gallery = load_gallery(dir.path());

    for key in ["plasma", "textured", "feedback", "tuned", "plasma", "feedback"] {
        gallery.select(key).unwrap();
        assert_eq!(gallery.active_key(), Some(key));

        // Only the entry just activated may own GPU objects.
        let descriptor = gallery.catalog().get(key).unwrap();
        let plan =
            vitrine_core::ActivationPlan::build(descriptor, &PlanOptions::default()).unwrap();
        assert_eq!(
            gallery.backend().live_resources(),
            ResourceCounts::for_plan(&plan),
            "after switching to '{}'",
            key
        );
        assert!(gallery.frame().unwrap());
    }

    gallery.deactivate();
    assert!(gallery.backend().live_resources().is_zero());
    assert_eq!(gallery.active_key(), None);
}

#[test]
fn test_missing_textures_become_placeholders() {
    let dir = catalog_dir();
    let mut gallery = load_gallery(dir.path());
    gallery.select("textured").unwrap();

    // Both channels point at the same missing file, so one texture is shared.
    let live = gallery.backend().live_resources();
    assert_eq!(live.programs, 1);
    assert_eq!(live.textures, 1);
    assert!(gallery.last_error().is_none());
    assert!(gallery.frame().unwrap());
}

#[test]
fn test_buffer_pass_draws_before_image() {
    let dir = catalog_dir();
    let mut gallery = load_gallery(dir.path());
    gallery.select("feedback").unwrap();
    gallery.backend_mut().take_draws();

    gallery.mouse_move(100.0, 50.0);
    gallery.mouse_press();
    for _ in 0..3 {
        gallery.frame().unwrap();
    }

    let draws = gallery.backend_mut().take_draws();
    let passes: Vec<&str> = draws.iter().map(|d| d.pass.as_str()).collect();
    assert_eq!(
        passes,
        vec!["trail", "image", "trail", "image", "trail", "image"]
    );
    let frames: Vec<i32> = draws.iter().map(|d| d.inputs.frame).collect();
    assert_eq!(frames, vec![0, 0, 1, 1, 2, 2]);

    // Mouse y is flipped to a bottom-left origin.
    assert_eq!(draws[0].inputs.mouse[0], 100.0);
    assert_eq!(draws[0].inputs.mouse[1], 310.0);
    assert!(draws[0].inputs.mouse[2] > 0.0);
}

#[test]
fn test_invalid_shader_is_isolated() {
    let dir = catalog_dir();
    let mut gallery = load_gallery(dir.path());
    gallery.select("feedback").unwrap();

    let err = gallery.select("broken").unwrap_err();
    match &err {
        GalleryError::Activation {
            key,
            source: ActivationError::Compile { .. },
        } => assert_eq!(key, "broken"),
        other => panic!("expected a compile failure, got {:?}", other),
    }
    assert_eq!(err.key(), Some("broken"));

    // The previous entry was torn down and nothing replaced it.
    assert_eq!(gallery.active_key(), None);
    assert!(gallery.backend().live_resources().is_zero());
    assert_eq!(gallery.cursor(), gallery.catalog().position("broken"));
    assert!(gallery.last_error().unwrap().contains("broken"));
    assert!(!gallery.frame().unwrap());

    // Navigation keeps working from the failed entry.
    gallery.next().unwrap();
    assert_eq!(gallery.active_key(), Some("tuned"));
    assert!(gallery.last_error().is_none());

    gallery.prev().unwrap_err();
    gallery.prev().unwrap();
    assert_eq!(gallery.active_key(), Some("feedback"));
}

#[test]
fn test_panel_values_reach_the_shader() {
    let dir = catalog_dir();
    let mut gallery = load_gallery(dir.path());
    gallery.select("tuned").unwrap();
    assert_eq!(gallery.panel().value("brightness"), Some(0.5));

    gallery.panel_mut().adjust(2);
    gallery.frame().unwrap();
    let inputs = gallery.backend().draws().last().unwrap().inputs;
    assert!((inputs.params[0][0] - 0.7).abs() < 1e-5);

    // Switching away and back starts from the declared default again.
    gallery.select("plasma").unwrap();
    assert!(gallery.panel().is_empty());
    gallery.select("tuned").unwrap();
    assert_eq!(gallery.panel().value("brightness"), Some(0.5));
}

#[test]
fn test_unknown_entry() {
    let dir = catalog_dir();
    let mut gallery = load_gallery(dir.path());
    gallery.select("plasma").unwrap();
    let err = gallery.select("nope").unwrap_err();
    assert!(matches!(err, GalleryError::UnknownEntry(ref key) if key == "nope"));
    // An unknown key does not disturb the running entry.
    assert_eq!(gallery.active_key(), Some("plasma"));
}
