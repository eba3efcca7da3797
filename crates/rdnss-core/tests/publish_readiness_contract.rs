//! Contract Test: Publication and Readiness
//!
//! Constraints verified:
//! - Nothing is written before the first advertisement
//! - The first advertisement publishes servers and search domains
//! - An advertisement without usable options still makes the worker ready
//! - Link-local servers carry their interface, and vanish with it
//! - The table size bounds the published nameservers

mod common;

use std::time::Duration;

use common::*;
use rdnss_core::Daemon;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn nothing_is_written_before_first_advertisement() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (source, _feed) = ControlledSource::new();
    let token = CancellationToken::new();

    let daemon = Daemon::with_source(Box::new(source), &config, token.clone()).unwrap();
    let handle = tokio::spawn(daemon.run());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!config.resolv_path.exists(), "no file before any advertisement");

    token.cancel();
    assert_ok!(handle.await.unwrap());
    assert!(!config.resolv_path.exists());
}

#[tokio::test]
async fn first_advertisement_publishes_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (source, feed) = ControlledSource::new();
    let token = CancellationToken::new();

    let daemon = Daemon::with_source(Box::new(source), &config, token.clone()).unwrap();
    let handle = tokio::spawn(daemon.run());

    let mut options = rdnss_option(600, &["2001:db8::53", "2001:db8::54"]);
    options.extend(dnssl_option(600, &["example.com", "corp.example.net"]));
    feed.send(options);

    let content = wait_for_file(&config.resolv_path, WAIT, |c| c.contains("nameserver"))
        .await
        .expect("resolver file published");

    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "search example.com corp.example.net");
    assert!(lines.contains(&"nameserver 2001:db8::53"));
    assert!(lines.contains(&"nameserver 2001:db8::54"));
    assert_eq!(lines.len(), 3);

    token.cancel();
    assert_ok!(handle.await.unwrap());
}

#[tokio::test]
async fn advertisement_without_options_publishes_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (source, feed) = ControlledSource::new();
    let token = CancellationToken::new();

    let daemon = Daemon::with_source(Box::new(source), &config, token.clone()).unwrap();
    let handle = tokio::spawn(daemon.run());

    feed.send(Vec::new());

    let content = wait_for_file(&config.resolv_path, WAIT, |_| true)
        .await
        .expect("resolver file published");
    assert_eq!(content, "");

    token.cancel();
    assert_ok!(handle.await.unwrap());
}

#[tokio::test]
async fn link_local_server_is_scoped_to_interface() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (source, feed) = ControlledSource::new();
    let token = CancellationToken::new();

    let daemon = Daemon::with_source(Box::new(source), &config, token.clone())
        .unwrap()
        .with_interface_names(test_interface_names);
    let handle = tokio::spawn(daemon.run());

    feed.send(rdnss_option(600, &["fe80::1"]));

    let content = wait_for_file(&config.resolv_path, WAIT, |c| c.contains("nameserver"))
        .await
        .expect("resolver file published");
    assert_eq!(content, "nameserver fe80::1%eth0\n");

    token.cancel();
    assert_ok!(handle.await.unwrap());
}

#[tokio::test]
async fn link_local_server_without_interface_is_omitted() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let (source, feed) = ControlledSource::new();
    let token = CancellationToken::new();

    let daemon = Daemon::with_source(Box::new(source), &config, token.clone())
        .unwrap()
        .with_interface_names(no_interfaces);
    let handle = tokio::spawn(daemon.run());

    feed.send(rdnss_option(600, &["fe80::1", "2001:db8::53"]));

    let content = wait_for_file(&config.resolv_path, WAIT, |c| c.contains("nameserver"))
        .await
        .expect("resolver file published");
    assert_eq!(content, "nameserver 2001:db8::53\n");

    token.cancel();
    assert_ok!(handle.await.unwrap());
}

#[tokio::test]
async fn published_servers_are_bounded_by_table_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.cache.max_servers = 2;
    let (source, feed) = ControlledSource::new();
    let token = CancellationToken::new();

    let daemon = Daemon::with_source(Box::new(source), &config, token.clone()).unwrap();
    let handle = tokio::spawn(daemon.run());

    feed.send(rdnss_option(100, &["2001:db8::1"]));
    feed.send(rdnss_option(200, &["2001:db8::2"]));
    feed.send(rdnss_option(300, &["2001:db8::3"]));

    let content = wait_for_file(&config.resolv_path, WAIT, |c| c.contains("2001:db8::3"))
        .await
        .expect("longest-lived server published");
    assert_eq!(content, "nameserver 2001:db8::3\nnameserver 2001:db8::2\n");

    token.cancel();
    assert_ok!(handle.await.unwrap());
}
