use std::path::Path;

use anyhow::Context;
use tokio::process::Command;

/// Read the container duration of a local media file with `ffprobe`.
pub async fn probe_duration(path: &Path) -> anyhow::Result<f64> {
    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .await
        .context("spawn ffprobe")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe exited with {}", output.status);
    }

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).context("parse ffprobe output")?;
    parse_duration(&json).context("ffprobe output has no duration")
}

fn parse_duration(json: &serde_json::Value) -> Option<f64> {
    json.get("format")?
        .get("duration")?
        .as_str()?
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Seconds at two-decimal precision.
pub fn round_duration(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
