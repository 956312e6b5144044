use super::{language_request, shell_request, test_config, test_runner};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_prints_and_succeeds() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(None, "printf X", None))
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "X");
    assert_eq!(result.error, None);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_nonzero_exit_fails() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(None, "printf X; exit 1", None))
        .await;

    assert!(!result.is_success());
    assert_eq!(result.output, "X");
    assert_eq!(result.error.as_deref(), Some("Process exited with code 1"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_separates_stderr() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(
            None,
            "echo out; echo err >&2; echo more; exit 2",
            None,
        ))
        .await;

    assert!(!result.is_success());
    assert_eq!(result.output, "out\nmore");
    assert_eq!(result.error.as_deref(), Some("err"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_with_stdin_sees_eof() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(None, "cat", Some("hello")))
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "hello");
    assert!(result.execution_time < 10_000);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_source_file_is_in_workspace() {
    let runner = test_runner();
    let mut request = shell_request(None, "sh main.sh", None);
    request.code = "echo \"$(pwd) $(basename \"$0\")\"\n".to_owned();
    let result = runner.execute(&request).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "/workspace main.sh");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_python_hello() {
    let config = test_config();
    let request = language_request(&config, "python", "hello.py", None);
    let result = test_runner().execute(&request).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_run_python_echo_stdin() {
    let config = test_config();
    let request = language_request(&config, "python", "echo.py", Some("line one\nline two\n"));
    let result = test_runner().execute(&request).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "line one\nline two");
}
