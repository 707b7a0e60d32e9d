use std::sync::Mutex;

use tempfile::NamedTempFile;

use sort_station::config::SorterConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SORTER_CONFIG",
        "SORTER_CAMERA_DEVICE",
        "SORTER_CLIP_PATH",
        "SORTER_MODEL_PATH",
        "SORTER_SERIAL_PORT",
        "SORTER_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SorterConfig::load().expect("load config");
    assert_eq!(cfg.camera_device, "stub://camera");
    assert_eq!(cfg.camera_width, 640);
    assert_eq!(cfg.camera_height, 480);
    assert_eq!(cfg.clip_path, "stub://movie");
    assert_eq!(cfg.threshold, 0.5);
    assert!(cfg.serial_port.is_none());
    assert_eq!(cfg.timing.dwell.as_secs(), 6);
    assert_eq!(cfg.timing.cooldown.as_secs(), 3);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [camera]
        device = "/dev/video1"
        width = 800
        height = 600

        [clip]
        path = "/var/lib/sorter/clips"

        [detector]
        model_path = "station.onnx"
        threshold = 0.6

        [serial]
        port = "/dev/ttyUSB0"

        [timing]
        tick_ms = 50
        dwell_secs = 4
        cooldown_secs = 2
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("SORTER_CONFIG", file.path());
    std::env::set_var("SORTER_CAMERA_DEVICE", "/dev/video2");
    std::env::set_var("SORTER_THRESHOLD", "0.75");

    let cfg = SorterConfig::load().expect("load config");
    // Env beats file.
    assert_eq!(cfg.camera_device, "/dev/video2");
    assert_eq!(cfg.threshold, 0.75);
    // File beats defaults.
    assert_eq!(cfg.camera_width, 800);
    assert_eq!(cfg.clip_path, "/var/lib/sorter/clips");
    assert_eq!(cfg.model_path, "station.onnx");
    assert_eq!(cfg.serial_port.as_deref(), Some("/dev/ttyUSB0"));
    assert_eq!(cfg.timing.tick.as_millis(), 50);
    assert_eq!(cfg.timing.dwell.as_secs(), 4);
    assert_eq!(cfg.timing.cooldown.as_secs(), 2);

    clear_env();
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SORTER_THRESHOLD", "1.5");
    assert!(SorterConfig::load().is_err());

    std::env::set_var("SORTER_THRESHOLD", "not-a-number");
    assert!(SorterConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_missing_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SORTER_CONFIG", "/nonexistent/sorter.toml");
    assert!(SorterConfig::load().is_err());

    clear_env();
}
