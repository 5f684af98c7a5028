use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;

fn supercut() -> Command {
    let mut cmd = Command::cargo_bin("supercut").unwrap();
    cmd.env_remove("RUST_LOG").env_remove("SUPERCUT_VLC_PATH");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let assert = supercut().arg("--help").assert().success();
    let output = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for subcommand in ["render", "preview", "list", "names", "edit", "export", "check", "completions"] {
        assert!(output.contains(subcommand), "{subcommand} missing from:\n{output}");
    }
}

#[test]
fn render_requires_query_and_output() {
    supercut()
        .args(["render", "video.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--query"));
}

#[test]
fn completions_are_generated() {
    supercut()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("supercut"));
}

#[test]
fn list_reads_external_subtitles() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("episode.mkv");
    fs::write(&video, b"").unwrap();
    fs::write(
        video.with_extension("srt"),
        "1\n00:00:01,000 --> 00:00:02,000\nHello there\n\n2\n00:00:03,000 --> 00:00:04,000\nGoodbye\n\n3\n00:00:05,000 --> 00:00:06,000\n<i>hello</i> again\n",
    )
    .unwrap();

    supercut()
        .current_dir(dir.path())
        .args(["list", "--external-subs", "--query", "hello"])
        .arg(&video)
        .assert()
        .success()
        .stdout("   0 | : Hello there\n   1 | : hello again\n");
}

#[test]
fn edit_list_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("episode.mkv");
    fs::write(&video, b"").unwrap();
    fs::write(video.with_extension("srt"), "00:00:01,000 --> 00:00:02,000\nhello\n").unwrap();

    supercut()
        .current_dir(dir.path())
        .args(["edit", "preview", "--external-subs", "--query", "hello", "--listfile", "missing.txt"])
        .arg(&video)
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.txt"));
}

#[test]
fn export_edl_follows_edit_list() {
    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("episode.mkv");
    fs::write(&video, b"").unwrap();
    fs::write(
        video.with_extension("srt"),
        "00:00:01,000 --> 00:00:02,000\nhello one\n\n00:00:10,000 --> 00:00:10,500\nhello two\n",
    )
    .unwrap();
    fs::write(dir.path().join("list.txt"), "   1 | : hello two\n# 0 | : hello one\n").unwrap();

    let assert = supercut()
        .current_dir(dir.path())
        .args(["export", "edl", "--external-subs", "--query", "hello", "--listfile", "list.txt", "--title", "Demo"])
        .arg(&video)
        .assert()
        .success();
    let edl = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    assert!(edl.starts_with("TITLE: Demo\n\n000 BL V C 00:00:10:00 00:00:10:50 00:00:00:00 00:00:00:50\n"));
    assert!(!edl.contains("001 BL V C"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("supercut.json"), "{ not json").unwrap();

    supercut()
        .current_dir(dir.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("supercut.json"));
}

#[cfg(unix)]
#[test]
#[serial]
fn check_reports_missing_tools() {
    let dir = tempfile::tempdir().unwrap();

    supercut()
        .current_dir(dir.path())
        .env("PATH", dir.path())
        .env("SUPERCUT_VLC_PATH", dir.path().join("no-vlc"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not find ffmpeg or ffprobe in PATH."))
        .stderr(predicate::str::contains("Could not find vlc in PATH or SUPERCUT_VLC_PATH variable."));
}
