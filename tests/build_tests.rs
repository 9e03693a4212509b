//! Integration tests for the ROCm native build driver.

mod common;

use std::path::Path;

use common::{fake_rocm, Checkout, ScriptedRunner};
use magma_packager::build::driver::{BuildError, BuildOutcome, BuildStep, NativeBuildDriver};
use magma_packager::config::{LOCALE_VAR, MKL_ROOT_VAR, PATH_VAR, ROCM_PATH_VAR, TARGET_ARCH_VAR};
use magma_packager::exec::runner::ExecError;
use magma_packager::toolchain::detect::BackendKind;
use magma_packager::toolchain::env::MapEnv;

fn rocm_env(rocm: &Path) -> MapEnv {
    MapEnv::new()
        .with(ROCM_PATH_VAR, rocm.display().to_string())
        .with(MKL_ROOT_VAR, "/opt/intel/mkl")
        .with(PATH_VAR, "/usr/bin:/bin")
}

fn make_ok() -> ScriptedRunner {
    ScriptedRunner::new()
        .respond("rocm_agent_enumerator", &[], 0, "gfx90a\ngfx000\n\n")
        .respond("make", &["-f"], 0, "hip sources generated\n")
        .respond("make", &["lib/libmagma.so"], 0, "linked\n")
}

#[tokio::test]
async fn test_rocm_build_runs_both_steps_in_order() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = rocm_env(rocm.path());
    let runner = make_ok();

    let outcome = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap();

    let plan = match outcome {
        BuildOutcome::Built { plan } => plan,
        other => panic!("expected a build, got {other:?}"),
    };
    assert_eq!(plan.cpu_count, 4);
    assert_eq!(plan.target_architectures, vec!["gfx90a"]);
    assert_eq!(plan.mkl_root, Path::new("/opt/intel/mkl"));
    assert_eq!(plan.build_config_path, checkout.root().join("make.inc"));

    let calls = runner.calls();
    assert_eq!(runner.programs(), vec!["rocm_agent_enumerator", "make", "make"]);
    assert_eq!(calls[1].args, vec!["-f", "make.gen.hipMAGMA", "-j", "4"]);
    assert_eq!(
        calls[2].args,
        vec!["lib/libmagma.so", "-j", "4", "MKLROOT=/opt/intel/mkl"]
    );

    // ROCm compilers are reachable from both steps; the locale is only forced for the link.
    let rocm_bin = rocm.path().join("bin").display().to_string();
    for call in &calls[1..] {
        let path = call.env.get(PATH_VAR).unwrap();
        assert!(path.starts_with("/usr/bin:/bin"));
        assert!(path.ends_with(&rocm_bin));
        assert_eq!(call.cwd.as_deref(), Some(checkout.root()));
    }
    assert_eq!(calls[1].env.get(LOCALE_VAR), None);
    assert_eq!(calls[2].env.get(LOCALE_VAR).map(String::as_str), Some("C.UTF-8"));
}

#[tokio::test]
async fn test_make_inc_generated_from_template() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    std::fs::write(checkout.root().join("make.inc"), "stale\nDEVCCFLAGS += --offload-arch=gfx803").unwrap();

    let config = checkout.config();
    let env = rocm_env(rocm.path()).with(TARGET_ARCH_VAR, "gfx942;gfx90a");
    let runner = make_ok();

    NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap();

    let make_inc = std::fs::read_to_string(checkout.root().join("make.inc")).unwrap();
    assert_eq!(
        make_inc,
        "BACKEND = hip\nFORT = true\nDEVCCFLAGS += --offload-arch=gfx942\nDEVCCFLAGS += --offload-arch=gfx90a"
    );

    // Targets came from the environment, so the enumerator never ran.
    assert_eq!(runner.programs(), vec!["make", "make"]);
}

#[tokio::test]
async fn test_empty_arch_variable_falls_back_to_enumerator() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = rocm_env(rocm.path()).with(TARGET_ARCH_VAR, "");
    let runner = make_ok();

    let outcome = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap();

    assert_eq!(outcome.plan().unwrap().target_architectures, vec!["gfx90a"]);
    assert_eq!(runner.programs()[0], "rocm_agent_enumerator");
}

#[tokio::test]
async fn test_first_step_failure_stops_the_build() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = rocm_env(rocm.path());
    let runner = ScriptedRunner::new()
        .respond("rocm_agent_enumerator", &[], 0, "gfx90a\n")
        .respond("make", &["-f"], 2, "")
        .respond("make", &["lib/libmagma.so"], 0, "");

    let err = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap_err();

    match err {
        BuildError::Step {
            step: BuildStep::HipSources,
            source: ExecError::NonZeroExit { code, ref stderr, .. },
        } => {
            assert_eq!(code, Some(2));
            assert_eq!(stderr, "make failed");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(runner
        .calls()
        .iter()
        .all(|c| !c.args.iter().any(|a| a == "lib/libmagma.so")));
}

#[tokio::test]
async fn test_second_step_failure_is_fatal() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = rocm_env(rocm.path());
    let runner = ScriptedRunner::new()
        .respond("rocm_agent_enumerator", &[], 0, "gfx90a\n")
        .respond("make", &["-f"], 0, "")
        .respond("make", &["lib/libmagma.so"], 1, "");

    let err = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Step { step: BuildStep::SharedLibrary, .. }));
    assert!(err.to_string().contains("shared library"));
}

#[tokio::test]
async fn test_missing_mkl_root_runs_nothing() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = MapEnv::new().with(ROCM_PATH_VAR, rocm.path().display().to_string());
    let runner = make_ok();

    let err = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::MissingMklRoot));
    assert!(runner.calls().is_empty());
    assert!(!checkout.root().join("make.inc").exists());
}

#[tokio::test]
async fn test_enumerator_failure_is_fatal() {
    let checkout = Checkout::new();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = rocm_env(rocm.path());
    let runner = ScriptedRunner::new().missing("rocm_agent_enumerator", &[]);

    let err = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::ArchEnumeration(ExecError::Spawn { .. })));
    assert_eq!(runner.programs(), vec!["rocm_agent_enumerator"]);
}

#[tokio::test]
async fn test_missing_template_is_fatal() {
    let checkout = Checkout::new();
    std::fs::remove_dir_all(checkout.root().join("make.inc-examples")).unwrap();
    let rocm = fake_rocm(None);
    let config = checkout.config();
    let env = rocm_env(rocm.path());
    let runner = make_ok();

    let err = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Rocm)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::BuildConfig { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_cuda_branch_is_a_no_op() {
    let checkout = Checkout::new();
    let config = checkout.config();
    let env = MapEnv::new();
    let runner = ScriptedRunner::new();

    let outcome = NativeBuildDriver::new(&config, &env, &runner)
        .build(BackendKind::Cuda)
        .await
        .unwrap();

    assert_eq!(outcome, BuildOutcome::Skipped { backend: BackendKind::Cuda });
    assert!(runner.calls().is_empty());
    assert!(!checkout.root().join("make.inc").exists());
}
