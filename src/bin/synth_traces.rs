// src/bin/synth_traces.rs
//
// Seeded synthetic trace generator.
//
// Produces a directory of trace archives that exercise the full pipeline:
// road-gray frames with chevron markers, correlated telemetry, and
// mutually-exclusive throttle/brake actions skewed towards coasting (so
// the balancing weighter has something to balance). Useful for smoke tests
// and benchmarking without real session recordings.

use std::path::PathBuf;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use slipstream::io::write_record;
use slipstream::record::TraceRecord;
use slipstream::types::Frame;

#[derive(Debug, Parser)]
#[command(
    name = "synth-traces",
    about = "Generate synthetic driving-trace archives",
    version
)]
struct Args {
    /// Output directory (created if missing).
    #[arg(long)]
    out_dir: PathBuf,

    /// Number of trace archives to generate.
    #[arg(long, default_value_t = 4)]
    records: u32,

    /// Timesteps per trace.
    #[arg(long, default_value_t = 200)]
    timesteps: usize,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 96)]
    height: usize,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 96)]
    width: usize,

    /// Deterministic seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

const ROAD_GRAY: u8 = 105;

fn synthetic_frame(rng: &mut ChaCha8Rng, height: usize, width: usize) -> Frame {
    let mut frame = Frame::filled(height, width, 3, ROAD_GRAY);
    // Grass borders left and right of the road band.
    let road_left = width / 4;
    let road_right = width - width / 4;
    for y in 0..height {
        for x in 0..width {
            if x < road_left || x >= road_right {
                frame.set(y, x, 0, 60);
                frame.set(y, x, 1, 160);
                frame.set(y, x, 2, 60);
            }
        }
    }
    // A few red chevron patches on the road edge.
    for _ in 0..rng.gen_range(0..4) {
        let cy = rng.gen_range(0..height.saturating_sub(3).max(1));
        let cx = rng.gen_range(road_left..road_right.max(road_left + 1));
        for dy in 0..3usize.min(height - cy) {
            for dx in 0..2usize.min(width - cx) {
                frame.set(cy + dy, cx + dx, 0, 210);
                frame.set(cy + dy, cx + dx, 1, 45);
                frame.set(cy + dy, cx + dx, 2, 45);
            }
        }
    }
    frame
}

fn synthetic_record(rng: &mut ChaCha8Rng, args: &Args) -> TraceRecord {
    let n = args.timesteps;
    let mut record = TraceRecord::empty();

    let mut speed = 15.0_f64;
    let mut steer = 0.0_f64;
    for _ in 0..n {
        record
            .frames
            .push(synthetic_frame(rng, args.height, args.width));

        // Correlated random walks for the vehicle state.
        speed = (speed + rng.gen_range(-0.5..0.5)).clamp(0.0, 40.0);
        steer = (steer + rng.gen_range(-0.05..0.05)).clamp(-1.0, 1.0);
        let omega_base = speed * 3.2;
        let omegas = [
            omega_base + rng.gen_range(-0.4..0.4),
            omega_base + rng.gen_range(-0.4..0.4),
            omega_base + rng.gen_range(-0.4..0.4),
            omega_base + rng.gen_range(-0.4..0.4),
        ];

        record.speed.push(speed);
        record.wheel_omegas.push(omegas);
        record.angular_velocity.push(steer * speed * 0.08);
        record.steering_joint_angle.push(steer * 0.3);

        // Mostly coasting, occasional throttle, rare hard braking. Pedals
        // are never engaged together.
        let roll: f64 = rng.gen();
        let (throttle, brake) = if roll < 0.70 {
            (0.0, 0.0)
        } else if roll < 0.93 {
            (rng.gen_range(0.2..1.0_f64) as f32, 0.0)
        } else {
            (0.0, rng.gen_range(0.5..1.0_f64) as f32)
        };
        record.actions.push([steer as f32, throttle, brake]);

        record.curvature.push(steer * 0.05 + rng.gen_range(-0.002..0.002));
    }

    record
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("synth-traces: {err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> std::io::Result<()> {
    std::fs::create_dir_all(&args.out_dir)?;
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    for i in 0..args.records {
        let record = synthetic_record(&mut rng, args);
        let path = args.out_dir.join(format!("trace_{i:04}.trace"));
        write_record(&path, &record)?;
    }

    println!(
        "synth-traces | records={} | timesteps={} | frame={}x{} | seed={} | out={}",
        args.records,
        args.timesteps,
        args.height,
        args.width,
        args.seed,
        args.out_dir.display()
    );
    Ok(())
}
