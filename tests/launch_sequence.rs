// Library-level checks of the config -> search path hand-off.
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use rigclient_service::ErrorKind;
use rigclient_service::core::config::LauncherConfig;
use rigclient_service::core::search_path::{APPLICATION_ARCHIVE, SearchPath};

fn setup(config: &str) -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(temp.path().join("config")).expect("config dir");
    fs::write(temp.path().join("config").join("rigclient_service.ini"), config).expect("config");
    temp
}

fn load(dir: &Path) -> Result<LauncherConfig, rigclient_service::Error> {
    LauncherConfig::load(&dir.join("config").join("rigclient_service.ini"))
}

#[test]
fn n_extra_libraries_keep_their_order() {
    let engine_dir = tempfile::tempdir().expect("engine dir");
    let engine = engine_dir.path().join("libjvm.so");
    fs::write(&engine, b"").expect("engine");

    let extras = (0..7)
        .map(|i| OsString::from(format!("/opt/libs/{i}.jar")))
        .collect::<Vec<_>>();
    let mut text = format!("JVM_Location {}\n", engine.display());
    for extra in &extras {
        text.push_str(&format!("Extra_Lib {}\n", extra.to_string_lossy()));
    }
    let temp = setup(&text);

    let config = load(temp.path()).expect("config");
    assert_eq!(config.extra_libraries(), extras.as_slice());

    let search_path = SearchPath::build_in(temp.path(), &config);
    assert_eq!(
        search_path.entries()[0],
        temp.path().join(APPLICATION_ARCHIVE).into_os_string()
    );
    assert_eq!(&search_path.entries()[1..], extras.as_slice());
}

#[test]
fn missing_engine_builds_nothing() {
    let temp = setup("Extra_Lib /opt/libs/a.jar\n");
    let err = load(temp.path()).expect_err("missing engine");
    assert_eq!(err.kind(), ErrorKind::MissingEngine);
}

#[test]
fn scenario_engine_path_missing() {
    let temp = setup("JVM_Location /opt/engine/definitely-missing.so\nExtra_Lib /opt/libs/a.jar\n");
    let err = load(temp.path()).expect_err("engine not found");
    assert_eq!(err.kind(), ErrorKind::EngineNotFound);
}
