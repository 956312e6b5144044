use super::{language_request, shell_request, test_config, test_runner};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_failed_compile_skips_run() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(
            Some("echo compiling; echo 'syntax error' >&2; exit 3"),
            "echo RAN",
            None,
        ))
        .await;

    assert!(!result.is_success());
    assert_eq!(result.output, "compiling");
    assert!(!result.output.contains("RAN"));
    assert_eq!(result.error.as_deref(), Some("syntax error"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_successful_compile_runs() {
    let runner = test_runner();
    let result = runner
        .execute(&shell_request(Some("cp main.sh prog.sh"), "sh prog.sh", None))
        .await;

    assert!(result.is_success(), "{result:?}");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_compile_and_run_c() {
    let config = test_config();
    let request = language_request(&config, "c", "hello.c", None);
    let result = test_runner().execute(&request).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.output, "Hello, World!");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_compile_error_c() {
    let config = test_config();
    let request = language_request(&config, "c", "broken.c", None);
    let result = test_runner().execute(&request).await;

    assert!(!result.is_success());
    assert!(!result.output.contains("never"));
    assert!(result.error.as_deref().unwrap().contains("error"));
}
