//! Shared fixtures for the geoloc-db integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use geoloc_db::{DatabaseConfig, GeoReader, GeoRecord, LookupError, OpenError, ReaderOpener};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LICENSE_KEY: &str = "test-license";
pub const DOWNLOAD_PATH: &str = "/app/geoip_download";

/// Build a gzip-compressed tar holding `members`.
pub fn archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A release archive laid out like the real distribution.
pub fn release(database: &[u8]) -> Vec<u8> {
    archive(&[
        ("GeoLite2-City_20240102/COPYRIGHT.txt", b"copyright".as_slice()),
        ("GeoLite2-City_20240102/GeoLite2-City.mmdb", database),
    ])
}

/// JSON database mapping addresses to a city name.
pub fn json_database(entries: &[(&str, &str)]) -> Vec<u8> {
    let map: HashMap<&str, GeoRecord> = entries
        .iter()
        .map(|(ip, city)| {
            let record = GeoRecord {
                city: Some(geoloc_db::record::City {
                    geoname_id: None,
                    names: [("en".to_string(), (*city).to_string())].into(),
                }),
                ..GeoRecord::default()
            };
            (*ip, record)
        })
        .collect();
    serde_json::to_vec(&map).unwrap()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Reader over a JSON object keyed by address.
pub struct JsonReader {
    records: HashMap<IpAddr, GeoRecord>,
}

impl GeoReader for JsonReader {
    fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        self.records.get(&ip).cloned().ok_or(LookupError::NotFound(ip))
    }

    fn description(&self) -> String {
        format!("json ({} records)", self.records.len())
    }
}

/// Opens JSON databases written by [`json_database`].
#[derive(Debug, Default)]
pub struct JsonOpener;

impl ReaderOpener for JsonOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError> {
        let bytes = std::fs::read(path).map_err(|e| OpenError::from_io(path, e))?;
        let records: HashMap<IpAddr, GeoRecord> =
            serde_json::from_slice(&bytes).map_err(|e| OpenError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Arc::new(JsonReader { records }))
    }
}

/// Mock distribution endpoint plus a scratch database directory.
pub struct Distribution {
    pub server: MockServer,
    pub dir: TempDir,
}

impl Distribution {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn database_path(&self) -> std::path::PathBuf {
        self.dir.path().join("db").join("GeoLite2-City.mmdb")
    }

    pub fn download_url(&self) -> String {
        format!("{}{DOWNLOAD_PATH}?suffix=tar.gz", self.server.uri())
    }

    pub fn checksum_url(&self) -> String {
        format!("{}{DOWNLOAD_PATH}?suffix=tar.gz.sha256", self.server.uri())
    }

    /// Config pointing at the mock endpoint with the refresh window disabled.
    pub fn config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_path())
            .with_license_key(LICENSE_KEY)
            .with_download_url(self.download_url())
            .with_checksum_url(self.checksum_url())
            .with_request_timeout(Duration::from_secs(5))
            .with_min_refresh_interval(Duration::ZERO)
    }

    /// Serve `body` as the archive, expecting `calls` downloads.
    pub async fn serve_archive(&self, body: Vec<u8>, calls: u64) {
        Mock::given(method("GET"))
            .and(path(DOWNLOAD_PATH))
            .and(query_param("suffix", "tar.gz"))
            .and(query_param("license_key", LICENSE_KEY))
            .and(query_param("edition_id", "GeoLite2-City"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `token` as the checksum. Repeated calls are allowed.
    pub async fn serve_checksum(&self, token: &str) {
        Mock::given(method("GET"))
            .and(path(DOWNLOAD_PATH))
            .and(query_param("suffix", "tar.gz.sha256"))
            .and(query_param("license_key", LICENSE_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("{token}\n")))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the mock server has seen.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.unwrap_or_default().len()
    }

    /// Files in the database directory, sorted.
    pub fn files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.database_path().parent().unwrap()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
