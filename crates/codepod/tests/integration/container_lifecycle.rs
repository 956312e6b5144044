use codepod::container::{
    ContainerError, ContainerRuntime, ContainerSpec, Provisioned, build_archive, demultiplex,
    ensure_image,
};

use super::{ALPINE, docker};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_ensure_image_is_idempotent() {
    let runtime = docker();
    ensure_image(runtime.as_ref(), ALPINE)
        .await
        .expect("Failed to provision image");

    let second = ensure_image(runtime.as_ref(), ALPINE)
        .await
        .expect("Failed to provision image");
    assert_eq!(second, Provisioned::Present);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_pull_unknown_image_fails() {
    let runtime = docker();
    let result = ensure_image(runtime.as_ref(), "codepod-test/does-not-exist:0").await;
    assert!(matches!(result, Err(ContainerError::PullFailed { .. })));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_full_lifecycle_with_framed_logs() {
    let runtime = docker();
    ensure_image(runtime.as_ref(), ALPINE).await.unwrap();

    let spec = ContainerSpec::new(ALPINE)
        .command(["/bin/sh", "-c", "cat data.txt; echo oops >&2"])
        .working_dir("/workspace");
    let id = runtime
        .create_container(&spec)
        .await
        .expect("Failed to create container");

    let archive = build_archive("data.txt", b"payload").unwrap();
    runtime
        .upload_archive(&id, "/workspace", archive)
        .await
        .expect("Failed to upload archive");
    runtime.start_container(&id).await.unwrap();

    let code = runtime.wait_container(&id).await.unwrap();
    assert_eq!(code, 0);

    let logs = demultiplex(&runtime.container_logs(&id).await.unwrap());
    assert_eq!(logs.stdout, "payload");
    assert_eq!(logs.stderr, "oops");
    assert_eq!(logs.discarded, 0);

    runtime.remove_container(&id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_nonzero_exit_is_a_status() {
    let runtime = docker();
    ensure_image(runtime.as_ref(), ALPINE).await.unwrap();

    let spec = ContainerSpec::new(ALPINE).command(["/bin/sh", "-c", "exit 7"]);
    let id = runtime.create_container(&spec).await.unwrap();
    runtime.start_container(&id).await.unwrap();

    assert_eq!(runtime.wait_container(&id).await.unwrap(), 7);
    runtime.remove_container(&id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_cleanup_of_removed_container_errors_without_panicking() {
    let runtime = docker();
    ensure_image(runtime.as_ref(), ALPINE).await.unwrap();

    let spec = ContainerSpec::new(ALPINE).command(["true"]);
    let id = runtime.create_container(&spec).await.unwrap();
    runtime.remove_container(&id).await.unwrap();

    assert!(runtime.kill_container(&id).await.is_err());
    assert!(matches!(
        runtime.remove_container(&id).await,
        Err(ContainerError::NotFound(_))
    ));
}
