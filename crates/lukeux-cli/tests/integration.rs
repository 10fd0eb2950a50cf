use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn lukeux(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lukeux").unwrap();
    cmd.current_dir(dir.path())
        .env("LUKEUX_ROOT", dir.path())
        .env_remove("LUKEUX_PASSWORD");
    cmd
}

fn init_project(dir: &TempDir) {
    lukeux(dir).arg("init").assert().success();
}

fn add_user(dir: &TempDir, email: &str, extra: &[&str]) {
    lukeux(dir)
        .args(["user", "add", email, "--name", "Sam", "--password", "password123"])
        .args(extra)
        .assert()
        .success();
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.arg("--json").output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

const DUMP: &str = r#"{
  "users": [
    {"_id": {"$oid": "u1"}, "email": "ada@example.com", "name": "Ada", "password": "$2b$10$x", "role": "USER"}
  ],
  "promoSignups": [
    {"_id": {"$oid": "s1"}, "email": "early@example.com", "name": "Early, \"Bird\"", "status": "PENDING"},
    {"_id": {"$oid": "s2"}, "email": "odd@example.com", "status": "LOST"}
  ]
}"#;

// ---------------------------------------------------------------------------
// lukeux init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_store() {
    let dir = TempDir::new().unwrap();
    lukeux(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .lukeux/config.yaml"));

    assert!(dir.path().join(".lukeux/config.yaml").exists());
    assert!(dir.path().join(".lukeux/lukeux.redb").exists());
    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".lukeux/lukeux.redb"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    lukeux(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .lukeux/config.yaml"));
}

#[test]
fn commands_before_init_point_at_init() {
    let dir = TempDir::new().unwrap();
    lukeux(&dir)
        .args(["user", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lukeux init"));
}

// ---------------------------------------------------------------------------
// lukeux config
// ---------------------------------------------------------------------------

#[test]
fn config_show_and_validate() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let cfg = json_stdout(lukeux(&dir).args(["config", "show"]));
    assert_eq!(cfg["version"], 1);
    assert_eq!(cfg["server"]["port"], 3000);

    lukeux(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("figma.client_id is empty"));
}

#[test]
fn config_validate_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let path = dir.path().join(".lukeux/config.yaml");
    let text = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, text.replace("ttl_hours: 336", "ttl_hours: 0")).unwrap();

    lukeux(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("sessions.ttl_hours=0"));
}

// ---------------------------------------------------------------------------
// lukeux blueprint
// ---------------------------------------------------------------------------

#[test]
fn blueprint_parse_from_stdin() {
    let dir = TempDir::new().unwrap();
    let text = "Intro\n[[LUKEUX_BLUEPRINTS_V1]]\n[[C1]]\ntitle: Guided checkout\nsummary: One page\n[[/C1]]\n[[/LUKEUX_BLUEPRINTS_V1]]";
    lukeux(&dir)
        .args(["blueprint", "parse"])
        .write_stdin(text)
        .assert()
        .success()
        .stdout(predicate::str::contains("Guided checkout"));

    let parsed = json_stdout(lukeux(&dir).args(["blueprint", "parse"]).write_stdin(text));
    assert_eq!(parsed["concepts"].as_array().unwrap().len(), 1);
    assert_eq!(parsed["prose"], "Intro");
}

#[test]
fn blueprint_parse_without_markers() {
    let dir = TempDir::new().unwrap();
    lukeux(&dir)
        .args(["blueprint", "parse"])
        .write_stdin("just prose")
        .assert()
        .success()
        .stdout(predicate::str::contains("No blueprint concepts found."));
}

// ---------------------------------------------------------------------------
// lukeux user
// ---------------------------------------------------------------------------

#[test]
fn user_add_list_and_role() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    add_user(&dir, "Sam@Studio.io", &[]);

    lukeux(&dir)
        .args(["user", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sam@studio.io"))
        .stdout(predicate::str::contains("user"));

    let u = json_stdout(lukeux(&dir).args(["user", "role", "sam@studio.io", "admin"]));
    assert_eq!(u["role"], "admin");
    assert!(u.get("password_hash").is_none());
}

#[test]
fn user_add_rejects_duplicates_and_short_passwords() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    add_user(&dir, "sam@studio.io", &["--admin"]);

    lukeux(&dir)
        .args(["user", "add", "sam@studio.io", "--name", "Sam", "--password", "password123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    lukeux(&dir)
        .args(["user", "add", "kim@studio.io", "--name", "Kim", "--password", "x"])
        .assert()
        .failure();
}

#[test]
fn user_passwd_reads_env() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    add_user(&dir, "sam@studio.io", &[]);

    lukeux(&dir)
        .args(["user", "passwd", "sam@studio.io"])
        .env("LUKEUX_PASSWORD", "another-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("Password set for sam@studio.io"));

    lukeux(&dir)
        .args(["user", "passwd", "nobody@studio.io", "--password", "another-secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("user not found"));
}

// ---------------------------------------------------------------------------
// lukeux import / promo / export
// ---------------------------------------------------------------------------

#[test]
fn import_reports_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let dump = dir.path().join("dump.json");
    std::fs::write(&dump, DUMP).unwrap();

    lukeux(&dir)
        .args(["import", dump.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown promo status"))
        .stdout(predicate::str::contains("ada@example.com"));

    let again = json_stdout(lukeux(&dir).args(["import", dump.to_str().unwrap()]));
    let inserted: u64 = again["collections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["inserted"].as_u64().unwrap())
        .sum();
    assert_eq!(inserted, 0);
}

#[test]
fn promo_set_status_and_export() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let dump = dir.path().join("dump.json");
    std::fs::write(&dump, DUMP).unwrap();
    lukeux(&dir).args(["import", dump.to_str().unwrap()]).assert().success();

    let s = json_stdout(lukeux(&dir).args([
        "promo",
        "set-status",
        "early@example.com",
        "activated",
        "--days",
        "7",
    ]));
    assert_eq!(s["status"], "ACTIVATED");
    assert!(s["expires_at"].is_string());

    let pending = json_stdout(lukeux(&dir).args(["promo", "list", "--status", "pending"]));
    assert!(pending.as_array().unwrap().is_empty());

    lukeux(&dir)
        .args(["promo", "set-status", "early@example.com", "gone"])
        .assert()
        .failure();

    lukeux(&dir)
        .args(["export", "promo"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("id,email,name,code,status"))
        .stdout(predicate::str::contains("\"Early, \"\"Bird\"\"\""));
}

#[test]
fn export_writes_dated_file_into_directory() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    add_user(&dir, "sam@studio.io", &[]);
    let out = dir.path().join("exports");
    std::fs::create_dir_all(&out).unwrap();

    lukeux(&dir)
        .args(["export", "users", "--out", out.to_str().unwrap()])
        .assert()
        .success();

    let files: Vec<_> = std::fs::read_dir(&out).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("users-") && name.ends_with(".csv"), "{name}");
    let body = std::fs::read_to_string(&files[0]).unwrap();
    assert!(body.contains("sam@studio.io"));
    assert!(!body.contains("argon2"));
}
