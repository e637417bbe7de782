use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn voxsnake_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_voxsnake").expect("voxsnake test binary not built")
}

#[test]
fn voxsnake_help_mentions_name() {
    let output = Command::new(voxsnake_bin())
        .arg("--help")
        .output()
        .expect("run voxsnake --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("VoxSnake"));
    assert!(combined.contains("--no-voice"));
}

#[test]
fn voxsnake_lists_test_devices() {
    let output = Command::new(voxsnake_bin())
        .arg("--list-input-devices")
        .env("VOXSNAKE_TEST_DEVICES", "Desk Mic, Headset")
        .output()
        .expect("run voxsnake --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("  - Desk Mic"));
    assert!(combined.contains("  - Headset"));
}

#[test]
fn voxsnake_reports_no_devices() {
    let output = Command::new(voxsnake_bin())
        .arg("--list-input-devices")
        .env("VOXSNAKE_TEST_DEVICES", "")
        .output()
        .expect("run voxsnake --list-input-devices");
    assert!(output.status.success());
    assert!(combined_output(&output).contains("No audio input devices detected."));
}

#[test]
fn voxsnake_rejects_out_of_range_grid() {
    let output = Command::new(voxsnake_bin())
        .args(["--grid-width", "2", "--no-voice"])
        .output()
        .expect("run voxsnake --grid-width 2");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--grid-width"));
}
