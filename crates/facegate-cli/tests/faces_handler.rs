use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use facegate_cli::cli::{
    FaceDeleteArgs, FaceEnrollArgs, FaceListArgs, FaceVerifyArgs, FacesCommands, OutputMode,
};
use facegate_cli::commands::{CommandHandler, FacesHandler, FacesHandlerDeps};
use facegate_cli::runtime::{build_engine, token_validator, CliEngine};
use facegate_config::{ConfigFile, ResolvedConfig};
use facegate_core::errors::{AppError, AppResult};
use facegate_core::faces::VerificationOutcome;
use serde_json::json;
use tempfile::TempDir;

fn settings(dir: &Path) -> ResolvedConfig {
    ResolvedConfig::from_raw(ConfigFile {
        store_dir: Some(dir.to_path_buf()),
        encoding_dimension: Some(3),
        token_secret: Some("handler-secret".into()),
        ..ConfigFile::default()
    })
}

fn features(embeddings: &[[f64; 3]]) -> Vec<u8> {
    let faces: Vec<_> = embeddings
        .iter()
        .map(|embedding| {
            json!({
                "bounding_box": {"left": 0, "top": 0, "right": 10, "bottom": 10},
                "embedding": embedding,
            })
        })
        .collect();
    json!({"success": true, "num_faces": faces.len(), "faces": faces})
        .to_string()
        .into_bytes()
}

fn token(settings: &ResolvedConfig, subject: &str, role: Option<&str>) -> String {
    token_validator(settings).issue(subject, None, role).unwrap()
}

/// Deps backed by a filesystem store in `dir`; rendered verification
/// outcomes are captured in `verified`.
fn deps(
    dir: &Path,
    payload: Vec<u8>,
    verified: Arc<Mutex<Vec<VerificationOutcome>>>,
) -> FacesHandlerDeps {
    let resolved = settings(dir);
    FacesHandlerDeps::new(
        move |_config: Option<&Path>| -> AppResult<CliEngine> { build_engine(&resolved) },
        move |_path: &Path| Ok(payload.clone()),
        |_outcome, _mode| Ok(()),
        move |outcome, _mode| {
            verified.lock().unwrap().push(outcome.clone());
            Ok(())
        },
        |_listing, _mode| Ok(()),
        |_outcome, _mode| Ok(()),
    )
}

#[test]
fn enroll_then_verify_through_handlers() {
    let tmp = TempDir::new().unwrap();
    let resolved = settings(tmp.path());
    let verified = Arc::new(Mutex::new(Vec::new()));
    let payload = features(&[[0.1, 0.2, 0.3]]);

    let enroll = FacesHandler::with_dependencies(
        FacesCommands::Enroll(FaceEnrollArgs {
            features: PathBuf::from("face.json"),
            token: Some(format!("Bearer {}", token(&resolved, "alice", None))),
        }),
        None,
        deps(tmp.path(), payload.clone(), Arc::clone(&verified)),
    );
    assert_eq!(enroll.execute(OutputMode::Json, false).unwrap(), ExitCode::SUCCESS);
    assert!(tmp.path().join("alice.json").exists());

    let verify = FacesHandler::with_dependencies(
        FacesCommands::Verify(FaceVerifyArgs {
            features: PathBuf::from("face.json"),
            token: None,
        }),
        None,
        deps(tmp.path(), payload, Arc::clone(&verified)),
    );
    assert_eq!(verify.execute(OutputMode::Human, false).unwrap(), ExitCode::SUCCESS);

    let outcomes = verified.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].accepted);
    assert_eq!(outcomes[0].identity_id.as_deref(), Some("alice"));
}

#[test]
fn unrecognized_face_exits_with_failure_code() {
    let tmp = TempDir::new().unwrap();
    let verified = Arc::new(Mutex::new(Vec::new()));
    let handler = FacesHandler::with_dependencies(
        FacesCommands::Verify(FaceVerifyArgs {
            features: PathBuf::from("face.json"),
            token: None,
        }),
        None,
        deps(tmp.path(), features(&[[0.9, 0.9, 0.9]]), Arc::clone(&verified)),
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(code, ExitCode::from(1));
    assert_eq!(verified.lock().unwrap()[0].confidence, 0.0);
}

#[test]
fn enroll_with_two_faces_surfaces_error() {
    let tmp = TempDir::new().unwrap();
    let resolved = settings(tmp.path());
    let handler = FacesHandler::with_dependencies(
        FacesCommands::Enroll(FaceEnrollArgs {
            features: PathBuf::from("face.json"),
            token: Some(token(&resolved, "bob", None)),
        }),
        None,
        deps(
            tmp.path(),
            features(&[[0.1, 0.1, 0.1], [0.5, 0.5, 0.5]]),
            Arc::new(Mutex::new(Vec::new())),
        ),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    match err {
        AppError::MultipleSubjectsDetected { count } => assert_eq!(count, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!tmp.path().join("bob.json").exists());
}

#[test]
fn missing_feature_file_fails_before_opening_store() {
    let deps = FacesHandlerDeps::new(
        |_config| panic!("store should not be opened"),
        |path| {
            Err(AppError::FeatureRead {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        },
        |_outcome, _mode| panic!("enroll render should not run"),
        |_outcome, _mode| panic!("verify render should not run"),
        |_listing, _mode| panic!("list render should not run"),
        |_outcome, _mode| panic!("delete render should not run"),
    );
    let handler = FacesHandler::with_dependencies(
        FacesCommands::Verify(FaceVerifyArgs {
            features: PathBuf::from("missing.json"),
            token: None,
        }),
        None,
        deps,
    );

    let err = handler.execute(OutputMode::Json, false).unwrap_err();
    assert!(matches!(err, AppError::FeatureRead { .. }));
    assert_eq!(err.exit_code(), ExitCode::from(2));
}

#[test]
fn delete_of_another_identity_is_forbidden() {
    let tmp = TempDir::new().unwrap();
    let resolved = settings(tmp.path());
    build_engine(&resolved)
        .unwrap()
        .enroll(Some(&token(&resolved, "u2", None)), &features(&[[0.2, 0.2, 0.2]]))
        .unwrap();

    let handler = FacesHandler::with_dependencies(
        FacesCommands::Delete(FaceDeleteArgs {
            identity: "u2".into(),
            token: Some(token(&resolved, "u1", Some("user"))),
        }),
        None,
        deps(tmp.path(), Vec::new(), Arc::new(Mutex::new(Vec::new()))),
    );
    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
    assert!(tmp.path().join("u2.json").exists());
}

#[test]
fn list_renders_enrolled_identities() {
    let tmp = TempDir::new().unwrap();
    let resolved = settings(tmp.path());
    let engine = build_engine(&resolved).unwrap();
    for subject in ["zoe", "adam"] {
        engine
            .enroll(Some(&token(&resolved, subject, None)), &features(&[[0.3, 0.3, 0.3]]))
            .unwrap();
    }

    let listed = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&listed);
    let resolved_for_engine = resolved.clone();
    let deps = FacesHandlerDeps::new(
        move |_config| build_engine(&resolved_for_engine),
        |_path| panic!("list does not read features"),
        |_outcome, _mode| Ok(()),
        |_outcome, _mode| Ok(()),
        move |listing, _mode| {
            captured.lock().unwrap().extend(listing.identities.clone());
            Ok(())
        },
        |_outcome, _mode| Ok(()),
    );
    let handler = FacesHandler::with_dependencies(
        FacesCommands::List(FaceListArgs {
            token: Some(token(&resolved, "adam", None)),
        }),
        None,
        deps,
    );

    assert_eq!(handler.execute(OutputMode::Json, false).unwrap(), ExitCode::SUCCESS);
    assert_eq!(*listed.lock().unwrap(), vec!["adam", "zoe"]);
}
