use std::{path::Path, process::Command, time::Duration};

use bx_toolchain::{
    BenchmarkCase, BuildPartition, ExecuteFailure, ManagedRuntime, PipelineOutcome,
    RuntimeVariant, Toolchain, ToolchainRegistry,
};

fn host() -> RuntimeVariant {
    RuntimeVariant::StandardManaged(ManagedRuntime::host())
}

#[tokio::test]
async fn trivial_case_builds_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let case = BenchmarkCase::new("sum", "(0..100u64).sum::<u64>()")
        .with_setup("let offset = 1u64;")
        .with_iterations(50)
        .with_runtime(host());
    let partition = BuildPartition::new(vec![case], Duration::from_secs(30)).unwrap();
    let toolchain = ToolchainRegistry::default().get_or_create(&host());

    let generated = toolchain.generate(&partition, dir.path());
    assert!(generated.is_success(), "{:?}", generated.failure);
    let build = toolchain.build(&generated, &partition).await;
    assert!(build.is_build_success(), "{:?}", build.failure);

    let execution = toolchain.execute(&build, &partition, None).await;
    assert_eq!(execution.exit_code, Some(0), "{:?}", execution.stderr);
    let results = execution.result_lines();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].case, "sum");
    assert_eq!(results[0].iterations, 50);
}

#[tokio::test]
async fn every_case_of_a_partition_reports() {
    let dir = tempfile::tempdir().unwrap();
    let cases = vec![
        BenchmarkCase::new("first", "1u8").with_runtime(host()),
        BenchmarkCase::new("second case", "vec![0u8; 16].len()").with_runtime(host()),
    ];
    let partition = BuildPartition::new(cases, Duration::from_secs(30)).unwrap();

    let outcome = Toolchain::standard(Vec::new())
        .run(&partition, dir.path(), None)
        .await;
    let PipelineOutcome::Executed { execution, .. } = outcome else {
        panic!("pipeline did not execute: {outcome:?}");
    };
    let names: Vec<_> = execution.result_lines().into_iter().map(|r| r.case).collect();
    assert_eq!(names, vec!["first", "second case"]);
}

#[tokio::test]
async fn compile_errors_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let case = BenchmarkCase::new("broken", "undefined_value + 1").with_runtime(host());
    let partition = BuildPartition::new(vec![case], Duration::from_secs(30)).unwrap();

    let outcome = Toolchain::standard(Vec::new())
        .run(&partition, dir.path(), None)
        .await;
    let PipelineOutcome::BuildFailed(build) = outcome else {
        panic!("expected a build failure: {outcome:?}");
    };
    assert!(build.failure.unwrap().message.contains("E0425"));
}

#[tokio::test]
async fn missing_library_is_recovered_from_search_paths() {
    let dir = tempfile::tempdir().unwrap();
    let deps = dir.path().join("deps");
    std::fs::create_dir_all(&deps).unwrap();
    let lib_source = dir.path().join("fastmath.rs");
    std::fs::write(&lib_source, "pub fn double(x: u64) -> u64 { x * 2 }").unwrap();
    let status = Command::new("rustc")
        .args(["--edition", "2021", "--crate-type", "rlib", "--crate-name", "fastmath"])
        .arg(&lib_source)
        .arg("--out-dir")
        .arg(&deps)
        .status()
        .unwrap();
    assert!(status.success());

    // The case pulls the crate in itself, so the first compile cannot know it
    let case = BenchmarkCase::new("double", "fastmath::double(21)")
        .with_setup("extern crate fastmath;")
        .with_runtime(host());
    let partition = BuildPartition::new(vec![case], Duration::from_secs(60)).unwrap();

    let outcome = Toolchain::standard(vec![deps])
        .run(&partition, &dir.path().join("artifacts"), None)
        .await;
    assert!(outcome.is_success(), "{outcome:?}");
}

#[tokio::test]
async fn execution_is_killed_at_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let case = BenchmarkCase::new("sleepy", "std::thread::sleep(std::time::Duration::from_secs(120))")
        .with_iterations(1)
        .with_runtime(host());
    let partition = BuildPartition::new(vec![case], Duration::from_secs(10)).unwrap();
    let toolchain = Toolchain::standard(Vec::new());

    let generated = toolchain.generate(&partition, dir.path());
    let build = toolchain.build(&generated, &partition).await;
    assert!(build.is_build_success(), "{:?}", build.failure);

    let started = std::time::Instant::now();
    let execution = toolchain.execute(&build, &partition, None).await;
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(
        execution.failure,
        Some(ExecuteFailure::Timeout(Duration::from_secs(10)))
    );
    assert!(execution.failure.unwrap().to_string().contains("10s"));
}

#[test]
fn artifacts_stay_inside_the_partition_folder() {
    let dir = tempfile::tempdir().unwrap();
    let partition = BuildPartition::new(
        vec![BenchmarkCase::new("a", "1").with_runtime(host())],
        Duration::from_secs(1),
    )
    .unwrap();
    let generated = Toolchain::standard(Vec::new()).generate(&partition, dir.path());
    let folder = dir.path().join(partition.id());
    assert_eq!(generated.artifacts_paths.build_artifacts_directory, folder);
    assert!(Path::new(&generated.artifacts_paths.program_code_path).starts_with(&folder));
}
