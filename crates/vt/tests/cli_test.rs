#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

fn lab() -> TestProject {
    let project = TestProject::new();
    project.add_template("dvwa", &["php", "mysql"], &["sqli", "xss"]);
    project.add_template("juice-shop", &["nodejs"], &["owasp-top10"]);
    project.add_template("example-template", &["none"], &["example"]);
    project
}

/// CLIヘルプにすべてのサブコマンドが表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("vt").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("ps"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("providers"));
}

/// start のヘルプに必須オプションが表示されることを確認
#[test]
fn test_start_help() {
    let mut cmd = Command::cargo_bin("vt").unwrap();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--provider"))
        .stdout(predicate::str::contains("--id"));
}

#[test]
fn test_start_requires_id() {
    let project = lab();
    project
        .vt()
        .args(["start", "--provider", "docker-compose"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--id"));
}

#[test]
fn test_validate_passes() {
    let project = lab();
    project
        .vt()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("dvwa"))
        .stdout(predicate::str::contains("3個のテンプレートはすべて正常です"));
}

/// 1件の不正なテンプレートがあっても残りは検証され、終了コードは1になる
#[test]
fn test_validate_reports_each_failure() {
    let project = lab();
    project.write_descriptor(
        "broken",
        "id: not-broken\nproviders:\n  docker-compose:\n    path: docker-compose.yml\n",
    );
    project.write_descriptor(
        "escape",
        "id: escape\nproviders:\n  docker-compose:\n    path: ../../etc/compose.yml\n",
    );

    project
        .vt()
        .arg("validate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("✓ dvwa"))
        .stdout(predicate::str::contains("broken"))
        .stdout(predicate::str::contains("escape"))
        .stderr(predicate::str::contains("5個中2個"));
}

#[test]
fn test_list_hides_example_template() {
    let project = lab();
    project
        .vt()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("dvwa"))
        .stdout(predicate::str::contains("juice-shop"))
        .stdout(predicate::str::contains("example-template").not());
}

#[test]
fn test_list_filter() {
    let project = lab();
    project
        .vt()
        .args(["list", "--filter", "SQLI"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dvwa"))
        .stdout(predicate::str::contains("juice-shop").not());

    project
        .vt()
        .args(["list", "-f", "nodejs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("juice-shop"))
        .stdout(predicate::str::contains("dvwa").not());
}

#[test]
fn test_list_filter_without_match() {
    let project = lab();
    project
        .vt()
        .args(["list", "--filter", "cobol"])
        .assert()
        .success()
        .stdout(predicate::str::contains("一致するテンプレートはありません"));
}

/// 不正なテンプレートが1件でもあれば起動時にエラー
#[test]
fn test_invalid_catalog_is_fatal() {
    let project = lab();
    project.write_descriptor("broken", "id: other\nproviders: {}\n");

    project
        .vt()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("テンプレートの読み込みに失敗しました"));
}

#[test]
fn test_start_unknown_template() {
    let project = lab();
    project
        .vt()
        .args(["start", "--provider", "docker-compose", "--id", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("テンプレート 'nope' が見つかりません"));
}

#[test]
fn test_start_unknown_provider() {
    let project = lab();
    project
        .vt()
        .args(["start", "-p", "podman", "--id", "dvwa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provider not registered: podman"));
}

/// 台帳に記録がなければ Docker に触れずに失敗する
#[test]
fn test_stop_not_running() {
    let project = lab();
    project
        .vt()
        .args(["stop", "-p", "docker-compose", "--id", "dvwa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not running"));
}

#[test]
fn test_providers_lists_both_names() {
    let project = lab();
    project
        .vt()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("docker-compose"))
        .stdout(predicate::str::contains("  - compose"));
}

#[test]
fn test_ps_without_deployments() {
    let project = lab();
    project
        .vt()
        .arg("ps")
        .assert()
        .success()
        .stdout(predicate::str::contains("起動中の環境はありません"));

    assert!(project.home_dir().join("deployments.db").exists());
}

#[test]
fn test_invalid_verbosity() {
    let project = lab();
    project
        .vt()
        .args(["-v", "loud", "list"])
        .assert()
        .failure();
}
