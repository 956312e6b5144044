use codepod::ExecutionOptions;

use super::{language_request, shell_request, test_config, test_runner};

fn short_timeout() -> ExecutionOptions {
    ExecutionOptions {
        timeout_ms: 2_000,
        ..ExecutionOptions::default()
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_infinite_loop_times_out() {
    let runner = test_runner();
    let result = runner
        .execute_with_options(&shell_request(None, "while :; do :; done", None), &short_timeout())
        .await;

    assert!(!result.is_success());
    assert!(result.output.is_empty());
    assert!(result.error.as_deref().unwrap().contains("2000ms"));
    assert!(result.execution_time >= 2_000);
    // Generous allowance for container start and teardown
    assert!(result.execution_time < 12_000, "took {}ms", result.execution_time);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_sleep_without_stdin_times_out() {
    let runner = test_runner();
    let result = runner
        .execute_with_options(&shell_request(None, "sleep 60", None), &short_timeout())
        .await;

    assert!(!result.is_success());
    assert!(result.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_python_spin_times_out() {
    let config = test_config();
    let request = language_request(&config, "python", "spin.py", None);
    let result = test_runner()
        .execute_with_options(&request, &short_timeout())
        .await;

    assert!(!result.is_success());
    assert!(result.error.as_deref().unwrap().contains("2000ms"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_network_is_disabled() {
    let config = test_config();
    let request = language_request(&config, "python", "network.py", None);
    let result = test_runner().execute(&request).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "offline");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_memory_hog_is_contained() {
    let config = test_config();
    let request = language_request(&config, "python", "hog.py", None);
    let result = test_runner().execute(&request).await;

    assert!(!result.is_success());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_cgroup_limits_applied() {
    let runner = test_runner();
    // cgroup v2 paths first, v1 as fallback
    let result = runner
        .execute(&shell_request(
            None,
            "cat /sys/fs/cgroup/pids.max 2>/dev/null || cat /sys/fs/cgroup/pids/pids.max; \
             cat /sys/fs/cgroup/memory.max 2>/dev/null || cat /sys/fs/cgroup/memory/memory.limit_in_bytes",
            None,
        ))
        .await;

    assert!(result.is_success(), "{result:?}");
    let lines: Vec<&str> = result.output.lines().map(str::trim).collect();
    assert_eq!(lines, ["50", "134217728"]);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_tmp_is_not_executable() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(
            None,
            "cp /bin/busybox /tmp/busybox && /tmp/busybox true && echo exec || echo noexec",
            None,
        ))
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "noexec");
}
