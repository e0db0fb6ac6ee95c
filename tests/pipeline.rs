use std::fs;
use std::path::Path;
use std::sync::Arc;

use swview::texture::TextureCache;
use swview::{AssetError, Mesh, RenderConfig, ResolutionScale, Viewer};

const BACKGROUND: [u8; 4] = [0x20, 0x20, 0x20, 0xFF];

const QUAD_OBJ: &str = "\
mtllib scene.mtl
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl red
f 1/1 2/2 3/3 4/4
";

const SCENE_MTL: &str = "\
newmtl red
Ka 1 1 1
map_Kd textures/red.png

newmtl also_red
map_Ka textures/red.png
";

fn write_texture(path: &Path, rgba: [u8; 4]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let data = rgba.repeat(4);
    image::RgbaImage::from_raw(2, 2, data)
        .unwrap()
        .save(path)
        .unwrap();
}

fn write_scene(dir: &Path, obj: &str) -> std::path::PathBuf {
    write_texture(&dir.join("textures/red.png"), [200, 10, 10, 255]);
    fs::write(dir.join("scene.mtl"), SCENE_MTL).unwrap();
    let obj_path = dir.join("scene.obj");
    fs::write(&obj_path, obj).unwrap();
    obj_path
}

fn config() -> RenderConfig {
    RenderConfig {
        width: 64,
        height: 48,
        ..RenderConfig::default()
    }
}

fn rgba_at(frame: &[u8], width: usize, x: usize, y: usize) -> [u8; 4] {
    let i = (y * width + x) * 4;
    [frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]
}

#[test]
fn textured_quad_renders_lit_texels() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = Mesh::load_obj(&write_scene(dir.path(), QUAD_OBJ)).unwrap();
    assert_eq!(mesh.triangle_count, 2);
    assert!(mesh.triangles.iter().all(|t| t.texture.is_some()));

    let mut viewer = Viewer::new(mesh, &config(), ResolutionScale::X1);
    let mut frame = vec![0; 64 * 48 * 4];
    let stats = viewer.draw(&mut frame);
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.culled, 0);

    // The default light hits the quad at 45 degrees
    assert_eq!(rgba_at(&frame, 64, 32, 24), [141, 7, 7, 255]);
    assert_eq!(rgba_at(&frame, 64, 0, 0), BACKGROUND);
    assert_eq!(rgba_at(&frame, 64, 63, 47), BACKGROUND);
}

#[test]
fn low_resolution_frames_fill_the_display() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = Mesh::load_obj(&write_scene(dir.path(), QUAD_OBJ)).unwrap();

    let mut viewer = Viewer::new(mesh, &config(), ResolutionScale::X4);
    let mut frame = vec![0; 64 * 48 * 4];
    viewer.draw(&mut frame);

    // Render pixel (8, 6) covers display pixels 32..36 by 24..28
    for y in 24..28 {
        for x in 32..36 {
            assert_eq!(rgba_at(&frame, 64, x, y), [141, 7, 7, 255]);
        }
    }
    assert_eq!(rgba_at(&frame, 64, 0, 0), BACKGROUND);
}

#[test]
fn untextured_faces_use_the_fallback_color() {
    let obj = QUAD_OBJ.replace("usemtl red\n", "").replace("mtllib scene.mtl\n", "");
    let dir = tempfile::tempdir().unwrap();
    let mesh = Mesh::load_obj(&write_scene(dir.path(), &obj)).unwrap();
    assert!(mesh.triangles.iter().all(|t| t.texture.is_none()));

    let mut viewer = Viewer::new(mesh, &config(), ResolutionScale::X1);
    let mut frame = vec![0; 64 * 48 * 4];
    viewer.draw(&mut frame);
    assert_eq!(rgba_at(&frame, 64, 32, 24), [180, 0, 180, 255]);
}

#[test]
fn flipped_normals_cull_the_front() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = Mesh::load_obj(&write_scene(dir.path(), QUAD_OBJ)).unwrap();

    let mut viewer = Viewer::new(mesh, &config(), ResolutionScale::X1);
    viewer.camera_mut().flip_normals = true;
    let mut frame = vec![0; 64 * 48 * 4];
    let stats = viewer.draw(&mut frame);
    assert_eq!(stats.culled, 2);
    assert_eq!(stats.pixels_written, 0);
    assert!(frame.chunks_exact(4).all(|px| px == BACKGROUND));
}

#[test]
fn materials_share_textures_by_path() {
    let obj = "\
mtllib scene.mtl
v 0 0 0
v 1 0 0
v 0 1 0
usemtl red
f 1 2 3
usemtl also_red
f 1 2 3
";
    let dir = tempfile::tempdir().unwrap();
    let path = write_scene(dir.path(), obj);
    let mut textures = TextureCache::new();
    let mesh = Mesh::parse_obj(obj, &path, &mut textures).unwrap();

    assert_eq!(textures.unique_texture_count(), 1);
    assert_eq!(textures.total_texture_data_size(), 2 * 2 * 4);
    let first = mesh.triangles[0].texture.as_ref().unwrap();
    let second = mesh.triangles[1].texture.as_ref().unwrap();
    assert!(Arc::ptr_eq(first, second));
}

#[test]
fn missing_assets_are_reported() {
    let dir = tempfile::tempdir().unwrap();

    let missing_obj = Mesh::load_obj(&dir.path().join("nothing.obj"));
    assert!(matches!(missing_obj, Err(AssetError::Io { .. })));

    let obj_path = dir.path().join("scene.obj");
    fs::write(&obj_path, QUAD_OBJ).unwrap();
    let missing_mtl = Mesh::load_obj(&obj_path);
    assert!(matches!(missing_mtl, Err(AssetError::Io { .. })));

    fs::write(dir.path().join("scene.mtl"), SCENE_MTL).unwrap();
    let missing_png = Mesh::load_obj(&obj_path);
    assert!(matches!(missing_png, Err(AssetError::Image { .. })));
}
