use anyhow::Result;
use voxsnake::audio;

/// Names from `VOXSNAKE_TEST_DEVICES` (comma separated) when set, otherwise
/// whatever the audio host reports.
fn input_device_names() -> Vec<String> {
    if let Ok(raw) = std::env::var("VOXSNAKE_TEST_DEVICES") {
        return parse_device_list(&raw);
    }
    audio::Recorder::list_devices().unwrap_or_else(|err| {
        eprintln!("Failed to list audio input devices: {err}");
        Vec::new()
    })
}

fn parse_device_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

pub(crate) fn list_input_devices() -> Result<()> {
    let devices = input_device_names();
    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}
