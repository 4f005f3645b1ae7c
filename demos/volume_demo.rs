//! Renders a synthetic 16-bit volume to `volume_demo.png` and picks a few pixels.
//!
//! Run with: `cargo run --example volume_demo -- [output.png]`

use volscope::*;

const RESOLUTION: u32 = 64;
const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// Two nested spherical shells with a faint haze between them.
fn shells() -> VoxelGrid {
    let n = RESOLUTION;
    let mut values = Vec::with_capacity((n * n * n) as usize);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let p = (Vec3::new(i as f32, j as f32, k as f32) + 0.5) / n as f32 * 2.0 - 1.0;
                let r = p.length();
                let value = if (0.85..0.95).contains(&r) {
                    60_000
                } else if (0.35..0.45).contains(&r) {
                    40_000
                } else if r < 0.85 {
                    4_000
                } else {
                    0
                };
                values.push(value);
            }
        }
    }
    VoxelGrid::from_u16(UVec3::splat(n), Vec3::splat(1.0 / 32.0), &values)
}

fn main() -> Result<()> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "volume_demo.png".to_string());

    let mut scene = new_headless_scene(WIDTH, HEIGHT)?;

    let volume = scene.add_volume(shells(), Some("shells"))?;
    if let Some(grid) = scene.volume(&volume) {
        println!(
            "volume '{volume}': {} voxels, values {}..={}",
            grid.num_voxels(),
            grid.min()?,
            grid.max()?
        );
    }

    // Haze stays nearly clear, the outer shell is translucent red, the inner one opaque white.
    let tf = TransferFunction::from_points(
        256,
        [
            vec![ControlPoint::new(0.0, 0.2), ControlPoint::new(0.9, 1.0)],
            vec![ControlPoint::new(0.0, 0.2), ControlPoint::new(0.6, 1.0), ControlPoint::new(0.9, 0.3)],
            vec![ControlPoint::new(0.0, 0.6), ControlPoint::new(0.6, 1.0), ControlPoint::new(0.9, 0.3)],
            vec![
                ControlPoint::new(0.0, 0.0),
                ControlPoint::new(0.06, 0.02),
                ControlPoint::new(0.6, 0.9),
                ControlPoint::new(0.9, 0.15),
            ],
        ],
    );
    let tf = scene.add_transfer_function(tf, Some("shells tf"))?;

    let mut node = VolumeNode::new(&volume);
    node.set_transfer_function(&tf).set_intensity(1.2);
    scene.add_volume_node(node, Some("shells"))?;

    scene.fit_camera();
    scene.render_to_file(&output)?;
    println!("wrote {output}");

    for (x, y) in [(WIDTH / 2, HEIGHT / 2), (WIDTH / 2 + 120, HEIGHT / 2), (0, 0)] {
        match scene.pick(x, y)? {
            Some(hit) => println!(
                "pixel ({x}, {y}) -> '{}' at {} ({:.3} from the eye)",
                hit.node, hit.world_position, hit.distance
            ),
            None => println!("pixel ({x}, {y}) -> nothing"),
        }
    }

    // Lower the outer shell's opacity; the next query sees the change.
    if let Some(tf) = scene.transfer_function_mut("shells tf") {
        tf.move_point(Channel::A, 3, ControlPoint::new(0.9, 0.0))?;
    }
    if let Some(p) = scene.pick_position(WIDTH / 2, HEIGHT / 2)? {
        println!("with a clear outer shell the center hits {p}");
    }

    Ok(())
}
