//! Integration tests for cardplay-cli.
//!
//! Tests spawn the `cardplay` binary against factory projects and project
//! files written to temporary directories.

use std::process::{Command, Output};

use cardplay_config::ProjectFile;
use cardplay_core::{Event, ParamValue};
use tempfile::TempDir;

/// Helper to get the path to the `cardplay` binary built by cargo.
fn cardplay_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cardplay"))
}

fn run(args: &[&str]) -> Output {
    cardplay_bin()
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run cardplay {args:?}: {e}"))
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// `cardplay cards`
// ---------------------------------------------------------------------------

#[test]
fn cli_cards_lists_builtins() {
    let output = run(&["cards"]);
    assert!(output.status.success(), "cardplay cards failed");

    let stdout = stdout(&output);
    assert!(stdout.contains("Available Cards"));
    for card in ["gen.pulse", "fx.transpose", "synth.sine", "merge.events", "util.delay.events", "out.audio"] {
        assert!(stdout.contains(card), "listing should contain '{card}'");
    }
    assert!(!stdout.contains("arp.up"), "pack cards are hidden without --packs");
}

#[test]
fn cli_cards_detail_shows_ports_and_parameters() {
    let output = run(&["cards", "gen.pulse"]);
    assert!(output.status.success());

    let stdout = stdout(&output);
    assert!(stdout.contains("Ports:"));
    assert!(stdout.contains("Parameters:"));
    assert!(stdout.contains("per_beat"));
    assert!(stdout.contains("notes"));
}

#[test]
fn cli_cards_pack_cards_need_flag() {
    assert!(!run(&["cards", "arp.up"]).status.success());

    let output = run(&["cards", "arp.up", "--packs"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Pack: arp 0.1.0"));
}

#[test]
fn cli_cards_json_is_parseable() {
    let output = run(&["cards", "--json"]);
    assert!(output.status.success());
    let cards: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert!(cards.as_array().is_some_and(|a| a.iter().any(|c| c["type"] == "fx.gain")));
}

// ---------------------------------------------------------------------------
// `cardplay projects`
// ---------------------------------------------------------------------------

#[test]
fn cli_projects_list_and_export() {
    let output = run(&["projects"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    for name in ["Pulse", "Sine", "Clip", "Echo", "Arp", "Needs Fix"] {
        assert!(listing.contains(name), "listing should contain '{name}'");
    }

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("pulse.toml");
    let path_str = path.to_str().unwrap();
    assert!(run(&["projects", "export", "pulse", path_str]).status.success());
    assert_eq!(ProjectFile::load(&path).unwrap().name, "Pulse");

    assert!(!run(&["projects", "export", "pulse", path_str]).status.success(), "refuses to overwrite");
    assert!(run(&["projects", "export", "pulse", path_str, "--force"]).status.success());
}

#[test]
fn cli_projects_show() {
    let output = run(&["projects", "show", "clip"]);
    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("phrase: 3 events"));
    assert!(stdout.contains("clip -> grid -> out"));
}

// ---------------------------------------------------------------------------
// `cardplay lint` / `fix` / `plan`
// ---------------------------------------------------------------------------

#[test]
fn cli_lint_reports_issues() {
    let output = run(&["lint", "needs-fix"]);
    assert!(output.status.success(), "lint without --strict succeeds");
    let stdout = stdout(&output);
    assert!(stdout.contains("ImplicitFanIn"));
    assert!(stdout.contains("TypeIncompatible"));
    assert!(stdout.contains("fix:"));

    assert!(!run(&["lint", "needs-fix", "--strict"]).status.success());
    assert!(run(&["lint", "pulse", "--strict"]).status.success());
}

#[test]
fn cli_lint_json() {
    let output = run(&["lint", "needs-fix", "--json"]);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let kinds: Vec<&str> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"implicit-fan-in"), "{kinds:?}");
    assert_eq!(report["coverage"]["nodes"], 4);
}

#[test]
fn cli_fix_writes_clean_project() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fixed.toml");
    let path_str = path.to_str().unwrap();

    let output = run(&["fix", "needs-fix", "-o", path_str]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("insert"));
    assert!(path.exists());

    assert!(run(&["lint", path_str, "--strict"]).status.success());
}

#[test]
fn cli_fix_preview_shows_provisional_nodes() {
    let output = run(&["fix", "needs-fix", "--preview"]);
    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("Preview nodes"));
    assert!(stdout.contains("merge.events"));
}

#[test]
fn cli_plan_orders_stack() {
    let output = run(&["plan", "pulse"]);
    assert!(output.status.success());
    let stdout = stdout(&output);
    let gen_at = stdout.find("gen.pulse").unwrap();
    let up_at = stdout.find("fx.transpose").unwrap();
    let out_at = stdout.find("out.events").unwrap();
    assert!(gen_at < up_at && up_at < out_at);
}

// ---------------------------------------------------------------------------
// `cardplay render`
// ---------------------------------------------------------------------------

#[test]
fn cli_render_events_to_json() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().join("out");

    let output = run(&["render", "pulse", "--window", "0..192", "--quiet", "--out-dir", out_dir.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let text = std::fs::read_to_string(out_dir.join("out_out.json")).unwrap();
    let events: Vec<Event> = serde_json::from_str(&text).unwrap();
    let starts: Vec<i64> = events.iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![0, 48, 96, 144]);
}

#[test]
fn cli_render_audio_to_wav() {
    let temp_dir = TempDir::new().unwrap();
    let out_dir = temp_dir.path().to_str().unwrap();

    let output = run(&["render", "sine", "--window", "0..96", "--chunk", "24", "-q", "--out-dir", out_dir]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let reader = hound::WavReader::open(temp_dir.path().join("out_out.wav")).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 48_000);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);
    assert_eq!(reader.len(), 24_000);
}

#[test]
fn cli_render_rejects_bad_window() {
    let output = run(&["render", "pulse", "--window", "96"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("FROM..TO"));
}

// ---------------------------------------------------------------------------
// `cardplay trace` / `replay`
// ---------------------------------------------------------------------------

#[test]
fn cli_trace_then_replay_matches() {
    let temp_dir = TempDir::new().unwrap();
    let trace = temp_dir.path().join("trace.json");
    let trace_str = trace.to_str().unwrap();

    let output = run(&["trace", "echo", "--window", "96..192", "--warmup", "96", "-o", trace_str]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = run(&["replay", "echo", trace_str]);
    assert!(output.status.success(), "{}", stdout(&output));
    assert!(stdout(&output).contains("match"));
}

#[test]
fn cli_replay_detects_edits() {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("pulse.toml");
    let project_str = project_path.to_str().unwrap();
    let trace = temp_dir.path().join("trace.json");
    let trace_str = trace.to_str().unwrap();

    assert!(run(&["projects", "export", "pulse", project_str]).status.success());
    assert!(run(&["trace", project_str, "--watch", "out:out", "-o", trace_str]).status.success());

    let mut project = ProjectFile::load(&project_path).unwrap();
    let up = project.cards.iter_mut().find(|c| c.id == "up").unwrap();
    up.params.insert("semitones".to_string(), ParamValue::Int(12));
    project.save(&project_path).unwrap();

    let output = run(&["replay", project_str, trace_str]);
    assert!(!output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("mismatch on 1 port(s)"), "{stdout}");
    assert!(stdout.contains("ReplayMismatch"));
}

#[test]
fn cli_unknown_project_fails() {
    let output = run(&["lint", "no-such-project"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
