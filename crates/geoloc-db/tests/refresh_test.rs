//! Integration tests for fetching and refreshing against a mock
//! distribution endpoint.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use common::{
    DOWNLOAD_PATH, Distribution, JsonOpener, archive, json_database, release, sha256_hex,
};
use geoloc_db::{
    ArchiveFetcher, DatabaseConfig, DistributionClient, RefreshError, RefreshPolicy,
    RefreshState,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn policy(config: DatabaseConfig) -> RefreshPolicy {
    RefreshPolicy::with_opener(config, Arc::new(JsonOpener)).unwrap()
}

fn install_existing(dist: &Distribution, database: &[u8], checksum: &str) {
    let path = dist.database_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, database).unwrap();
    std::fs::write(dist.config().checksum_path(), format!("{checksum}\n")).unwrap();
}

#[tokio::test]
async fn test_fetch_stages_member_byte_identical() {
    let dist = Distribution::start().await;
    let database = json_database(&[("81.2.69.142", "London")]);
    let body = release(&database);
    dist.serve_archive(body.clone(), 1).await;

    let config = dist.config();
    let client = DistributionClient::from_config(&config).unwrap();
    let fetcher = ArchiveFetcher::new(client, &config);

    let staged = fetcher.fetch(Duration::from_secs(5)).await.unwrap();
    assert_eq!(std::fs::read(staged.path()).unwrap(), database);
    assert_eq!(staged.archive_sha256(), sha256_hex(&body));
    assert_eq!(staged.path().parent(), dist.database_path().parent());

    drop(staged);
    assert_eq!(dist.files(), Vec::<String>::new());
}

#[tokio::test]
async fn test_fetch_without_database_member_is_corrupt() {
    let dist = Distribution::start().await;
    dist.serve_archive(
        archive(&[("GeoLite2-City_20240102/LICENSE.txt", b"license".as_slice())]),
        1,
    )
    .await;

    let config = dist.config();
    let fetcher = ArchiveFetcher::new(DistributionClient::from_config(&config).unwrap(), &config);

    let err = fetcher.fetch(Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, RefreshError::ArchiveCorrupt(_)), "{err:?}");
    assert_eq!(dist.files(), Vec::<String>::new());
}

#[tokio::test]
async fn test_first_run_installs_and_records_checksum() {
    let dist = Distribution::start().await;
    let database = json_database(&[("81.2.69.142", "London")]);
    dist.serve_archive(release(&database), 1).await;
    dist.serve_checksum("release-1").await;

    let policy = policy(dist.config());
    let status = policy.ensure_latest(false).await.unwrap();

    assert!(status.updated);
    assert_eq!(status.reason, "database file missing");
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), database);
    assert_eq!(
        std::fs::read_to_string(dist.config().checksum_path()).unwrap(),
        "release-1\n"
    );
    assert_eq!(
        dist.files(),
        vec!["GeoLite2-City.mmdb", "GeoLite2-City.mmdb.sha256"]
    );
    assert_eq!(policy.last_state(), Some(RefreshState::NeedsInstall));
}

#[tokio::test]
async fn test_second_run_with_unchanged_checksum_is_noop() {
    let dist = Distribution::start().await;
    dist.serve_archive(release(&json_database(&[])), 1).await;
    dist.serve_checksum("release-1").await;

    let policy = policy(dist.config());
    assert!(policy.ensure_latest(false).await.unwrap().updated);

    let status = policy.ensure_latest(false).await.unwrap();
    assert!(!status.updated);
    assert!(status.reason.contains("already up to date"), "{}", status.reason);
    assert_eq!(policy.last_state(), Some(RefreshState::UpToDate));
}

#[tokio::test]
async fn test_changed_checksum_installs() {
    let dist = Distribution::start().await;
    install_existing(&dist, b"old", "release-1");
    let database = json_database(&[("81.2.69.142", "London")]);
    dist.serve_archive(release(&database), 1).await;
    dist.serve_checksum("release-2").await;

    let policy = policy(dist.config());
    let status = policy.ensure_latest(false).await.unwrap();

    assert!(status.updated);
    assert_eq!(status.reason, "remote checksum changed");
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), database);
    assert_eq!(
        std::fs::read_to_string(dist.config().checksum_path()).unwrap(),
        "release-2\n"
    );
}

#[tokio::test]
async fn test_refresh_window_skips_network() {
    let dist = Distribution::start().await;
    dist.serve_archive(release(&json_database(&[])), 1).await;
    dist.serve_checksum("release-1").await;

    policy(dist.config())
        .ensure_latest(false)
        .await
        .unwrap();
    let requests = dist.request_count().await;

    let config = dist.config().with_min_refresh_interval(Duration::from_secs(3600));
    let policy = policy(config);
    let status = policy.ensure_latest(false).await.unwrap();

    assert!(!status.updated);
    assert!(status.reason.contains("minimum refresh window 1h0m0s"), "{}", status.reason);
    assert_eq!(dist.request_count().await, requests);
}

#[tokio::test]
async fn test_force_installs_inside_window_and_with_equal_checksum() {
    let dist = Distribution::start().await;
    install_existing(&dist, b"old", "release-1");
    let database = json_database(&[("81.2.69.142", "London")]);
    dist.serve_archive(release(&database), 2).await;
    dist.serve_checksum("release-1").await;

    let config = dist.config().with_min_refresh_interval(Duration::from_secs(3600));
    let policy = policy(config);

    for _ in 0..2 {
        let status = policy.ensure_latest(true).await.unwrap();
        assert!(status.updated);
        assert_eq!(status.reason, "force update requested");
    }
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), database);
}

#[tokio::test]
async fn test_checksum_comparison_ignores_case() {
    let dist = Distribution::start().await;
    install_existing(&dist, b"current", "ABCD");
    dist.serve_archive(release(b"unused"), 0).await;
    dist.serve_checksum("abcd").await;

    let policy = policy(dist.config());
    let status = policy.ensure_latest(false).await.unwrap();

    assert!(!status.updated);
    assert!(status.reason.contains("already up to date"));
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), b"current");
}

#[tokio::test]
async fn test_missing_record_downloads() {
    let dist = Distribution::start().await;
    let path = dist.database_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"unknown provenance").unwrap();
    let database = json_database(&[("81.2.69.142", "London")]);
    dist.serve_archive(release(&database), 1).await;
    dist.serve_checksum("release-1").await;

    let policy = policy(dist.config());
    let status = policy.ensure_latest(false).await.unwrap();

    assert!(status.updated);
    assert_eq!(std::fs::read(&path).unwrap(), database);
}

#[tokio::test]
async fn test_digest_token_does_not_gate_install_by_default() {
    let dist = Distribution::start().await;
    let database = json_database(&[("81.2.69.142", "London")]);
    dist.serve_archive(release(&database), 2).await;
    dist.serve_checksum(&"ab".repeat(32)).await;

    let policy = policy(dist.config());

    let status = policy.ensure_latest(false).await.unwrap();
    assert!(status.updated);
    assert_eq!(status.reason, "database file missing");
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), database);

    let status = policy.ensure_latest(true).await.unwrap();
    assert!(status.updated);
    assert_eq!(
        std::fs::read_to_string(dist.config().checksum_path()).unwrap(),
        format!("{}\n", "ab".repeat(32))
    );
}

#[tokio::test]
async fn test_published_sha256_is_verified() {
    let dist = Distribution::start().await;
    let body = release(&json_database(&[]));
    let token = format!("{}  GeoLite2-City_20240102.tar.gz", sha256_hex(&body).to_uppercase());
    dist.serve_archive(body, 1).await;
    dist.serve_checksum(&token).await;

    let policy = policy(dist.config().with_archive_digest_verification(true));
    assert!(policy.ensure_latest(true).await.unwrap().updated);
    assert_eq!(
        std::fs::read_to_string(dist.config().checksum_path()).unwrap(),
        format!("{token}\n")
    );
}

#[tokio::test]
async fn test_sha256_mismatch_leaves_previous_artifact() {
    let dist = Distribution::start().await;
    install_existing(&dist, b"previous", "release-1");
    dist.serve_archive(release(&json_database(&[])), 1).await;
    dist.serve_checksum(&format!("{}  GeoLite2-City.tar.gz", "0".repeat(64)))
        .await;

    let policy = policy(dist.config().with_archive_digest_verification(true));
    let err = policy.ensure_latest(true).await.unwrap_err();

    assert!(matches!(err, RefreshError::ChecksumMismatch { .. }), "{err:?}");
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), b"previous");
    assert_eq!(
        std::fs::read_to_string(dist.config().checksum_path()).unwrap(),
        "release-1\n"
    );
    assert_eq!(
        dist.files(),
        vec!["GeoLite2-City.mmdb", "GeoLite2-City.mmdb.sha256"]
    );
    assert_eq!(policy.last_state(), Some(RefreshState::Failed));
}

#[tokio::test]
async fn test_unusable_download_is_not_installed() {
    let dist = Distribution::start().await;
    let current = json_database(&[("81.2.69.142", "London")]);
    install_existing(&dist, &current, "release-1");
    dist.serve_archive(release(b"not a database"), 2).await;
    dist.serve_checksum("release-2").await;

    let policy = policy(dist.config());

    for _ in 0..2 {
        let err = policy.ensure_latest(false).await.unwrap_err();
        assert!(matches!(err, RefreshError::InvalidDatabase(_)), "{err:?}");
        assert_eq!(std::fs::read(dist.database_path()).unwrap(), current);
        assert_eq!(
            std::fs::read_to_string(dist.config().checksum_path()).unwrap(),
            "release-1\n"
        );
        assert_eq!(
            dist.files(),
            vec!["GeoLite2-City.mmdb", "GeoLite2-City.mmdb.sha256"]
        );
        assert_eq!(policy.last_state(), Some(RefreshState::Failed));
    }
}

#[tokio::test]
async fn test_unauthorized_is_credential_invalid() {
    let dist = Distribution::start().await;
    install_existing(&dist, b"current", "release-1");
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid license key"))
        .mount(&dist.server)
        .await;

    let policy = policy(dist.config());

    let err = policy.ensure_latest(false).await.unwrap_err();
    assert!(matches!(err, RefreshError::CredentialInvalid), "{err:?}");

    let err = policy.ensure_latest(true).await.unwrap_err();
    assert!(matches!(err, RefreshError::CredentialInvalid), "{err:?}");
    assert_eq!(std::fs::read(dist.database_path()).unwrap(), b"current");
}

#[tokio::test]
async fn test_server_error_is_http_status() {
    let dist = Distribution::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .and(query_param("suffix", "tar.gz"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&dist.server)
        .await;

    let config = dist
        .config()
        .with_download_url(format!("{}&license_key=operator-secret", dist.download_url()));
    let policy = policy(config);
    let err = policy.ensure_latest(false).await.unwrap_err();

    assert!(
        matches!(
            &err,
            RefreshError::HttpStatus { url, status }
                if status.as_u16() == 503 && !url.contains(common::LICENSE_KEY)
        ),
        "{err:?}"
    );
    assert!(!err.to_string().contains("operator-secret"), "{err}");
    assert!(!err.to_string().contains(common::LICENSE_KEY), "{err}");
    assert_eq!(dist.files(), Vec::<String>::new());
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let dist = Distribution::start().await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(release(b"late"))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&dist.server)
        .await;

    let config = dist.config().with_request_timeout(Duration::from_millis(200));
    let policy = policy(config);
    let err = policy.ensure_latest(true).await.unwrap_err();

    assert!(matches!(err, RefreshError::Timeout(_)), "{err:?}");
    assert!(!dist.database_path().exists());
    assert_eq!(dist.files(), Vec::<String>::new());
}
