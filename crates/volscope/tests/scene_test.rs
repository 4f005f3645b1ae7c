//! Scene behavior against a recording backend (no GPU required).

use std::collections::HashMap;

use proptest::prelude::*;
use volscope::*;

#[derive(Default)]
struct RecordingBackend {
    size: (u32, u32),
    eye: Vec3,
    volume_uploads: Vec<String>,
    tf_uploads: Vec<String>,
    released: Vec<String>,
    frames: Vec<Vec<(String, ShaderKind)>>,
    hits: HashMap<String, Vec4>,
    pick_renders: usize,
}

impl RecordingBackend {
    fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            eye: Vec3::new(0.0, 0.0, 10.0),
            ..Self::default()
        }
    }
}

impl VolumeBackend for RecordingBackend {
    fn upload_volume(&mut self, name: &str, _grid: &VoxelGrid) -> Result<()> {
        self.volume_uploads.push(name.to_string());
        Ok(())
    }

    fn release_volume(&mut self, name: &str) {
        self.released.push(name.to_string());
    }

    fn upload_transfer_function(&mut self, name: &str, table: &[u8]) -> Result<()> {
        assert_eq!(table.len() % 4, 0);
        self.tf_uploads.push(name.to_string());
        Ok(())
    }

    fn release_transfer_function(&mut self, name: &str) {
        self.released.push(name.to_string());
    }

    fn render_frame(&mut self, nodes: &[NodeDraw<'_>]) -> Result<Vec<u8>> {
        self.frames.push(
            nodes
                .iter()
                .map(|draw| (draw.node.to_string(), draw.shader))
                .collect(),
        );
        Ok(vec![0; (self.size.0 * self.size.1 * 4) as usize])
    }
}

impl PickBackend for RecordingBackend {
    fn viewport_size(&self) -> (u32, u32) {
        self.size
    }

    fn eye_position(&self) -> Vec3 {
        self.eye
    }

    fn allocate_pick_target(&mut self, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    fn begin_pick(&mut self, _x: u32, _y: u32) -> Result<()> {
        Ok(())
    }

    fn render_pick_pixel(&mut self, draw: &NodeDraw<'_>) -> Result<Vec4> {
        assert_eq!(draw.shader, ShaderKind::PickPosition);
        self.pick_renders += 1;
        Ok(self.hits.get(draw.node).copied().unwrap_or(Vec4::ZERO))
    }

    fn end_pick(&mut self) {}
}

fn scene() -> Scene<RecordingBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    Scene::new(RecordingBackend::new(64, 48), Options::default()).unwrap()
}

fn cube_grid() -> VoxelGrid {
    VoxelGrid::from_u8(UVec3::splat(2), vec![10, 20, 30, 40, 50, 60, 70, 80])
}

#[test]
fn test_end_to_end_grid_queries() {
    let mut scene = scene();
    let name = scene.add_volume(cube_grid(), Some("cube")).unwrap();
    let grid = scene.volume(&name).unwrap();

    assert_eq!(grid.voxel(1, 1, 1).unwrap(), vec![80]);
    let histogram = grid.histogram().unwrap();
    assert_eq!(histogram[80], 1);
    assert_eq!(histogram.iter().sum::<u64>(), 8);
    assert_eq!(histogram[0], 0);
    assert_eq!(grid.min().unwrap(), 10);
    assert_eq!(grid.max().unwrap(), 80);
}

#[test]
fn test_new_registers_and_uploads_default_transfer_function() {
    let scene = scene();
    let tf = scene.transfer_function(DEFAULT_TRANSFER_FUNCTION).unwrap();
    assert_eq!(tf.state(), TfState::Clean);
    assert_eq!(tf.width(), scene.options().transfer_function_width);
    assert_eq!(scene.backend().tf_uploads, vec![DEFAULT_TRANSFER_FUNCTION]);
}

#[test]
fn test_oversized_table_width_is_rejected() {
    let options = Options {
        transfer_function_width: 512,
        ..Options::default()
    };
    let err = Scene::new(RecordingBackend::new(64, 48), options).unwrap_err();
    assert!(matches!(err, VolscopeError::Precondition(_)));
}

#[test]
fn test_unnamed_resources_get_prefixed_names() {
    let mut scene = scene();
    let a = scene.add_volume(cube_grid(), None).unwrap();
    let b = scene.add_volume(cube_grid(), None).unwrap();
    assert_eq!(a, "volume_0");
    assert_eq!(b, "volume_1");

    let tf = scene
        .add_transfer_function(TransferFunction::linear_ramp(16), None)
        .unwrap();
    // "tf_default" already occupies one slot
    assert_eq!(tf, "tf_1");

    let node = scene.add_volume_node(VolumeNode::new(a), None).unwrap();
    assert_eq!(node, "node_0");
}

#[test]
fn test_invalid_grid_is_rejected_before_upload() {
    let mut scene = scene();
    let bad = VoxelGrid::from_u8(UVec3::splat(2), vec![0; 7]);
    let err = scene.add_volume(bad, Some("bad")).unwrap_err();
    assert!(matches!(err, VolscopeError::InvalidGrid { .. }));
    assert!(scene.backend().volume_uploads.is_empty());
    assert!(scene.volume("bad").is_none());
}

#[test]
fn test_node_requires_registered_volume() {
    let mut scene = scene();
    let err = scene
        .add_volume_node(VolumeNode::new("missing"), Some("n"))
        .unwrap_err();
    assert!(matches!(
        err,
        VolscopeError::NotFound { kind: "volume", ref name } if name == "missing"
    ));
    assert!(scene.volume_node("n").is_none());
}

#[test]
fn test_node_gets_defaults_and_geometry() {
    let mut scene = scene();
    let grid = VoxelGrid::new(
        UVec3::new(4, 2, 2),
        Vec3::new(0.5, 1.0, 1.0),
        1,
        8,
        vec![0; 16],
    );
    scene.add_volume(grid, Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();

    let node = scene.volume_node("n").unwrap();
    assert_eq!(node.transfer_function(), Some(DEFAULT_TRANSFER_FUNCTION));
    assert_eq!(node.shader(), Some(ShaderKind::Raymarch));
    assert_eq!(node.resolution(), UVec3::new(4, 2, 2));
    assert_eq!(node.scaling(), Vec3::new(2.0, 2.0, 2.0));
}

#[test]
fn test_replacing_volume_rebinds_nodes() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();

    let larger = VoxelGrid::from_u8(UVec3::new(4, 4, 2), vec![0; 32]);
    scene.add_volume(larger, Some("v")).unwrap();
    assert_eq!(
        scene.volume_node("n").unwrap().resolution(),
        UVec3::new(4, 4, 2)
    );
    assert_eq!(scene.registry().volumes.len(), 1);
}

#[test]
fn test_edits_coalesce_into_one_upload() {
    let mut scene = scene();
    let before = scene
        .transfer_function(DEFAULT_TRANSFER_FUNCTION)
        .unwrap()
        .recompute_count();

    let tf = scene
        .transfer_function_mut(DEFAULT_TRANSFER_FUNCTION)
        .unwrap();
    tf.add_point(Channel::R, ControlPoint::new(0.5, 0.0));
    tf.add_point(Channel::A, ControlPoint::new(0.25, 0.9));
    assert_eq!(tf.state(), TfState::PendingRecompute);

    assert_eq!(scene.sync().unwrap(), 1);
    assert_eq!(scene.sync().unwrap(), 0);

    let tf = scene.transfer_function(DEFAULT_TRANSFER_FUNCTION).unwrap();
    assert_eq!(tf.recompute_count(), before + 1);
    assert_eq!(tf.state(), TfState::Clean);
    assert_eq!(scene.backend().tf_uploads.len(), 2);
}

#[test]
fn test_render_draws_enabled_nodes_in_order() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("b")).unwrap();
    let mut mip = VolumeNode::new("v");
    mip.set_shader(ShaderKind::MaximumIntensity);
    scene.add_volume_node(mip, Some("a")).unwrap();
    let mut hidden = VolumeNode::new("v");
    hidden.set_enabled(false);
    scene.add_volume_node(hidden, Some("hidden")).unwrap();

    let pixels = scene.render_to_image().unwrap();
    assert_eq!(pixels.len(), 64 * 48 * 4);
    assert_eq!(
        scene.backend().frames,
        vec![vec![
            ("b".to_string(), ShaderKind::Raymarch),
            ("a".to_string(), ShaderKind::MaximumIntensity),
        ]]
    );
}

#[test]
fn test_pick_maps_local_hit_to_world() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    let mut node = VolumeNode::new("v");
    node.set_transform(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    scene.add_volume_node(node, Some("n")).unwrap();
    scene
        .backend_mut()
        .hits
        .insert("n".to_string(), Vec4::new(0.5, 0.0, 1.0, 1.0));

    let hit = scene.pick(32, 24).unwrap().unwrap();
    assert_eq!(hit.node, "n");
    assert!(hit.world_position.abs_diff_eq(Vec3::new(1.5, 0.0, 1.0), 1e-5));
    assert!((hit.distance - Vec3::new(1.5, 0.0, 9.0).length()).abs() < 1e-4);

    let position = scene.pick_position(32, 24).unwrap();
    assert_eq!(position, Some(hit.world_position));
    assert_eq!(scene.picking().allocations(), 1);
}

#[test]
fn test_pick_prefers_nearest_node() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("far")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("near")).unwrap();
    let hits = &mut scene.backend_mut().hits;
    hits.insert("far".to_string(), Vec4::new(0.0, 0.0, -1.0, 1.0));
    hits.insert("near".to_string(), Vec4::new(0.0, 0.0, 1.0, 1.0));

    let hit = scene.pick(10, 10).unwrap().unwrap();
    assert_eq!(hit.node, "near");
    assert_eq!(scene.backend().pick_renders, 2);
}

#[test]
fn test_pick_miss_is_none() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();
    assert_eq!(scene.pick_position(0, 0).unwrap(), None);
}

#[test]
fn test_pick_flushes_pending_tables_first() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();
    scene
        .transfer_function_mut(DEFAULT_TRANSFER_FUNCTION)
        .unwrap()
        .set_points(Channel::A, vec![ControlPoint::new(0.0, 1.0)]);

    scene.pick_position(1, 1).unwrap();
    assert_eq!(scene.backend().tf_uploads.len(), 2);
    assert_eq!(
        scene
            .transfer_function(DEFAULT_TRANSFER_FUNCTION)
            .unwrap()
            .state(),
        TfState::Clean
    );
}

#[test]
fn test_removed_volume_is_released_and_skipped() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();
    scene
        .backend_mut()
        .hits
        .insert("n".to_string(), Vec4::new(0.0, 0.0, 0.0, 1.0));

    assert!(scene.remove_volume("v").is_some());
    assert!(scene.remove_volume("v").is_none());
    assert_eq!(scene.backend().released, vec!["v"]);

    assert_eq!(scene.pick_position(5, 5).unwrap(), None);
    assert_eq!(scene.backend().pick_renders, 0);
    scene.render_to_image().unwrap();
    assert_eq!(scene.backend().frames, vec![Vec::new()]);
}

#[test]
fn test_remove_all_keeps_default_transfer_function() {
    let mut scene = scene();
    scene.add_volume(cube_grid(), Some("v")).unwrap();
    scene
        .add_transfer_function(TransferFunction::linear_ramp(8), Some("bone"))
        .unwrap();
    scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();

    scene.remove_all();
    assert!(scene.registry().volumes.is_empty());
    assert!(scene.registry().nodes.is_empty());
    assert_eq!(
        scene.registry().transfer_functions.names().collect::<Vec<_>>(),
        vec![DEFAULT_TRANSFER_FUNCTION]
    );
    assert_eq!(scene.backend().released, vec!["v", "bone"]);
}

#[test]
fn test_volume_loaded_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cube.vl");
    vl::write_file(&path, &cube_grid()).unwrap();

    let mut scene = scene();
    let name = scene.add_volume(vl::read_file(&path).unwrap(), None).unwrap();
    assert_eq!(scene.volume(&name), Some(&cube_grid()));
}

#[test]
fn test_world_bounds_cover_transformed_nodes() {
    let mut scene = scene();
    assert!(scene.world_bounds().is_none());

    scene.add_volume(cube_grid(), Some("v")).unwrap();
    let mut node = VolumeNode::new("v");
    node.set_transform(Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)));
    scene.add_volume_node(node, None).unwrap();

    let (min, max) = scene.world_bounds().unwrap();
    assert!(min.abs_diff_eq(Vec3::new(-1.0, 2.0, -1.0), 1e-6));
    assert!(max.abs_diff_eq(Vec3::new(1.0, 4.0, 1.0), 1e-6));
}

proptest! {
    #[test]
    fn prop_pick_outside_viewport_renders_nothing(x in 64u32..10_000, y in 0u32..10_000) {
        let mut scene = scene();
        scene.add_volume(cube_grid(), Some("v")).unwrap();
        scene.add_volume_node(VolumeNode::new("v"), Some("n")).unwrap();
        scene.backend_mut().hits.insert("n".to_string(), Vec4::W);

        prop_assert_eq!(scene.pick_position(x, y).unwrap(), None);
        prop_assert_eq!(scene.pick_position(y % 64, x).unwrap(), None);
        prop_assert_eq!(scene.backend().pick_renders, 0);
    }
}
