use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_robot36"))
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("robot36-cli-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("Failed to create test directory");
    dir
}

/// Quadrant test card: red, green, blue and white
fn create_test_image(path: &PathBuf, width: u32, height: u32) {
    let card = image::RgbImage::from_fn(width, height, |x, y| {
        match (x < width / 2, y < height / 2) {
            (true, true) => image::Rgb([255, 0, 0]),
            (false, true) => image::Rgb([0, 255, 0]),
            (true, false) => image::Rgb([0, 0, 255]),
            (false, false) => image::Rgb([255, 255, 255]),
        }
    });
    card.save(path).expect("Failed to write test image");
}

fn run_robot36(args: &[&str]) -> Output {
    Command::new(binary())
        .args(args)
        .output()
        .expect("Failed to execute robot36")
}

fn combined(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout)
}

#[test]
fn test_encode_writes_wav() {
    let dir = test_dir("encode");
    let input = dir.join("card.png");
    let output = dir.join("card.wav");
    create_test_image(&input, 320, 240);

    let result = run_robot36(&["encode", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(result.status.success(), "Encode failed: {}", combined(&result));

    let reader = hound::WavReader::open(&output).expect("Output is not a WAV file");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 11025);
    assert_eq!(spec.bits_per_sample, 16);

    // ~37.8 s of audio
    let seconds = reader.duration() as f32 / spec.sample_rate as f32;
    assert!((seconds - 37.85).abs() < 0.1, "Unexpected duration {}", seconds);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_encode_resizes_input() {
    let dir = test_dir("resize");
    let input = dir.join("small.png");
    let output = dir.join("small.wav");
    create_test_image(&input, 64, 48);

    let result = run_robot36(&["encode", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(result.status.success(), "Encode failed: {}", combined(&result));

    let resized = hound::WavReader::open(&output).expect("Output is not a WAV file");
    assert_eq!(resized.duration(), 417_101);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_encode_at_other_sample_rate() {
    let dir = test_dir("rate");
    let input = dir.join("card.png");
    let encoded = dir.join("card48k.wav");
    let decoded = dir.join("decoded.png");
    create_test_image(&input, 320, 240);

    let result = run_robot36(&[
        "encode",
        input.to_str().unwrap(),
        encoded.to_str().unwrap(),
        "--sample-rate",
        "48000",
    ]);
    assert!(result.status.success(), "Encode failed: {}", combined(&result));

    let reader = hound::WavReader::open(&encoded).expect("Output is not a WAV file");
    assert_eq!(reader.spec().sample_rate, 48000);
    let seconds = reader.duration() as f32 / 48000.0;
    assert!((seconds - 37.85).abs() < 0.1, "Unexpected duration {}", seconds);

    let result = run_robot36(&["decode", encoded.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(result.status.success(), "Decode failed: {}", combined(&result));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_decode_recording_without_tail() {
    let dir = test_dir("notail");
    let input = dir.join("card.png");
    let encoded = dir.join("card.wav");
    let trimmed = dir.join("trimmed.wav");
    let decoded = dir.join("decoded.png");
    create_test_image(&input, 320, 240);

    let result = run_robot36(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(result.status.success(), "Encode failed: {}", combined(&result));

    // Cut the recording at the last chroma sample
    let mut reader = hound::WavReader::open(&encoded).unwrap();
    let spec = reader.spec();
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    let tail = 11025 * 700 / 1000;
    let mut writer = hound::WavWriter::create(&trimmed, spec).unwrap();
    for &sample in &samples[..samples.len() - tail] {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();

    let result = run_robot36(&["decode", trimmed.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(result.status.success(), "Decode failed: {}", combined(&result));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_encode_then_decode() {
    let dir = test_dir("roundtrip");
    let input = dir.join("card.png");
    let encoded = dir.join("card.wav");
    let decoded = dir.join("decoded.png");
    create_test_image(&input, 320, 240);

    let result = run_robot36(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(result.status.success(), "Encode failed: {}", combined(&result));

    let result = run_robot36(&["decode", encoded.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(result.status.success(), "Decode failed: {}", combined(&result));

    let image = image::open(&decoded).expect("Decoded image unreadable").to_rgb8();
    assert_eq!(image.dimensions(), (320, 240));

    // Sample the middle of each quadrant
    let red = image.get_pixel(80, 60);
    assert!(red[0] > 150 && red[1] < 90 && red[2] < 90, "Red quadrant: {:?}", red);
    let green = image.get_pixel(240, 60);
    assert!(green[1] > 150 && green[0] < 90 && green[2] < 90, "Green quadrant: {:?}", green);
    let blue = image.get_pixel(80, 180);
    assert!(blue[2] > 150 && blue[0] < 90 && blue[1] < 90, "Blue quadrant: {:?}", blue);
    let white = image.get_pixel(240, 180);
    assert!(white.0.iter().all(|&c| c > 170), "White quadrant: {:?}", white);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_decode_json_progress() {
    let dir = test_dir("json");
    let input = dir.join("card.png");
    let encoded = dir.join("card.wav");
    let decoded = dir.join("decoded.png");
    create_test_image(&input, 320, 240);

    let result = run_robot36(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(result.status.success(), "Encode failed: {}", combined(&result));

    let result = run_robot36(&[
        "decode",
        encoded.to_str().unwrap(),
        decoded.to_str().unwrap(),
        "--json",
        "--chunk-ms",
        "250",
    ]);
    assert!(result.status.success(), "Decode failed: {}", combined(&result));

    let stdout = String::from_utf8_lossy(&result.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("Progress line is not JSON"))
        .collect();
    assert!(!records.is_empty());

    let last = records.last().unwrap();
    assert_eq!(last["line"], 240);
    assert_eq!(last["completed"], true);

    let lines: Vec<u64> = records.iter().filter_map(|r| r["line"].as_u64()).collect();
    assert!(lines.windows(2).all(|w| w[0] <= w[1]), "Line count went backwards");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_decode_silence_fails() {
    let dir = test_dir("silence");
    let input = dir.join("silence.wav");
    let output = dir.join("silence.png");

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&input, spec).unwrap();
    for _ in 0..48000 * 2 {
        writer.write_sample(0i16).unwrap();
    }
    writer.finalize().unwrap();

    let result = run_robot36(&["decode", input.to_str().unwrap(), output.to_str().unwrap()]);
    assert!(!result.status.success(), "Silence should not decode");
    assert!(combined(&result).contains("incomplete"), "Got: {}", combined(&result));

    // Partial output is still written
    let image = image::open(&output).expect("Partial image missing").to_rgb8();
    assert_eq!(image.dimensions(), (320, 240));
    assert_eq!(image.get_pixel(160, 120).0, [0, 0, 0]);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_invalid_input_fails() {
    let dir = test_dir("invalid");
    let input = dir.join("not-a-wav.wav");
    fs::write(&input, b"definitely not audio").unwrap();

    let result = run_robot36(&["decode", input.to_str().unwrap(), dir.join("out.png").to_str().unwrap()]);
    assert!(!result.status.success());

    let result = run_robot36(&["encode", input.to_str().unwrap(), dir.join("out.wav").to_str().unwrap()]);
    assert!(!result.status.success());

    fs::remove_dir_all(&dir).ok();
}
