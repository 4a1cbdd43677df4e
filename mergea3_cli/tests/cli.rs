use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use common::test_utils::test_output_path;
use mergea3::Raster;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CONFIG: &str = "\
search:
  first_scale_reduction: 4
  min_level_size: 16
  max_vertical_shift_fraction: 0.1
  max_angle_degrees: 1.0
  angle_step_degrees: 0.5
";

fn page(width: usize, height: usize, seed: u64) -> Raster {
    let mut rng = StdRng::seed_from_u64(seed);
    let cols = width.div_ceil(5);
    let blocks: Vec<u8> = (0..cols * height.div_ceil(5))
        .map(|_| rng.random())
        .collect();
    let noise: Vec<u8> = (0..width * height)
        .map(|_| rng.random_range(0..40))
        .collect();

    Raster::from_fn(width, height, |x, y| {
        let v = blocks[(y / 5) * cols + x / 5] as u32 * 3 / 4 + noise[y * width + x] as u32;
        let v = v.min(255) as u8;
        [v, 255 - v, v / 3 + 80]
    })
}

/// Writes left/center/right strips plus a config file; returns their paths.
fn write_inputs(name: &str) -> (Vec<PathBuf>, PathBuf) {
    let page = page(340, 130, 5);
    let strips = [
        ("left", page.crop(0, 5, 150, 118)),
        ("center", page.crop(100, 3, 150, 118)),
        ("right", page.crop(200, 7, 140, 104)),
    ];

    let paths = strips
        .iter()
        .map(|(part, raster)| {
            let path = test_output_path(
                env!("CARGO_MANIFEST_DIR"),
                &format!("cli_{}_{}.png", name, part),
            );
            raster.save_file(&path).unwrap();
            path
        })
        .collect();

    let config = test_output_path(env!("CARGO_MANIFEST_DIR"), &format!("cli_{}.yaml", name));
    std::fs::write(&config, CONFIG).unwrap();
    (paths, config)
}

fn run_cli(inputs: &[PathBuf], output: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mergea3"))
        .args(inputs)
        .arg("--output")
        .arg(output)
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn cli_merges_three_fragments() {
    let (inputs, config) = write_inputs("merge");
    let output = test_output_path(env!("CARGO_MANIFEST_DIR"), "cli_merge_page.png");
    let _ = std::fs::remove_file(&output);

    let result = run_cli(
        &inputs,
        &output,
        &["--config", config.to_str().unwrap(), "--no-scanner-correction"],
    );
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("Step 1:"));
    assert!(stdout.contains("Step 2:"));
    assert!(!stdout.contains("Too high"));

    let merged = Raster::read_file(&output).unwrap();
    assert!(
        (merged.width() as i64 - 340).abs() <= 2,
        "width {}",
        merged.width()
    );
}

#[test]
fn cli_fails_on_missing_input() {
    let (mut inputs, _) = write_inputs("missing");
    inputs[1] = test_output_path(env!("CARGO_MANIFEST_DIR"), "cli_missing_nothing_here.png");
    let _ = std::fs::remove_file(&inputs[1]);
    let output = test_output_path(env!("CARGO_MANIFEST_DIR"), "cli_missing_page.png");
    let _ = std::fs::remove_file(&output);

    let result = run_cli(&inputs, &output, &[]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("center fragment"));
    assert!(!output.exists());
}

#[test]
fn cli_rejects_unknown_output_format() {
    let (inputs, _) = write_inputs("format");
    let output = test_output_path(env!("CARGO_MANIFEST_DIR"), "cli_format_page.xyz");

    let result = run_cli(&inputs, &output, &[]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Unsupported output format"));
}
