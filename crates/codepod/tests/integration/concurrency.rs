use super::{language_request, shell_request, test_config, test_runner};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_concurrent_port_binds_do_not_collide() {
    let config = test_config();
    let runner = test_runner();
    let request = language_request(&config, "python", "bind_port.py", None);

    let (a, b) = tokio::join!(runner.execute(&request), runner.execute(&request));

    assert!(a.is_success(), "{a:?}");
    assert!(b.is_success(), "{b:?}");
    assert_eq!(a.output, "bound");
    assert_eq!(b.output, "bound");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_concurrent_filesystems_are_separate() {
    let runner = test_runner();
    let first = shell_request(None, "echo one > /tmp/marker; sleep 1; cat /tmp/marker", None);
    let second = shell_request(None, "echo two > /tmp/marker; sleep 1; cat /tmp/marker", None);

    let (a, b) = tokio::join!(runner.execute(&first), runner.execute(&second));

    assert_eq!(a.output, "one");
    assert_eq!(b.output, "two");
}
